//! POSIX backend: descriptor = `RawFd`, resolver = getaddrinfo/getnameinfo

use std::ffi::{CStr, CString};
use std::io;
use std::mem;
use std::os::raw::c_char;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr;

use socket2::{SockAddr, Socket};

use crate::core::{Family, IpVersion, Protocol, ResolveError};

pub(crate) use mio::unix::SourceFd as ReadinessSource;

pub(crate) type RawSocket = RawFd;

/// Kode resolver untuk query pada address yang invalid
pub(crate) const INVALID_ADDRESS_CODE: i32 = libc::EAI_FAIL;

// Ukuran buffer getnameinfo (NI_MAXHOST / NI_MAXSERV)
const HOST_BUFFER_LEN: usize = 1025;
const SERVICE_BUFFER_LEN: usize = 32;

#[inline(always)]
pub(crate) fn raw_descriptor(socket: &Socket) -> RawSocket {
    socket.as_raw_fd()
}

pub(crate) fn invalid_argument() -> io::Error {
    io::Error::from_raw_os_error(libc::EINVAL)
}

pub(crate) fn bad_descriptor() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

pub(crate) fn family_of(addr: &SockAddr) -> Family {
    match addr.family() as libc::c_int {
        libc::AF_INET => Family::Ipv4,
        libc::AF_INET6 => Family::Ipv6,
        _ => Family::Unspecified,
    }
}

/// Hints untuk satu lookup
pub(crate) struct LookupHints {
    pub protocol: Protocol,
    pub ip_version: IpVersion,
    /// `false` = hostname harus literal numerik (DNS lookup dimatikan)
    pub resolve_hostname: bool,
    /// Wildcard address untuk bind server
    pub passive: bool,
}

/// getaddrinfo, ambil endpoint pertama yang cocok
pub(crate) fn lookup(
    node: Option<&str>,
    port: u16,
    hints: &LookupHints,
) -> Result<SockAddr, ResolveError> {
    let node = node
        .map(CString::new)
        .transpose()
        .map_err(|_| ResolveError::new(libc::EAI_NONAME, "hostname contains a nul byte"))?;
    let service = CString::new(port.to_string())
        .map_err(|_| ResolveError::new(libc::EAI_SERVICE, "invalid service"))?;

    // SAFETY: addrinfo adalah POD, semua-nol = hints kosong
    let mut raw_hints: libc::addrinfo = unsafe { mem::zeroed() };
    raw_hints.ai_family = match hints.ip_version {
        IpVersion::Ipv4 => libc::AF_INET,
        IpVersion::Ipv6 => libc::AF_INET6,
        IpVersion::Any => libc::AF_UNSPEC,
    };
    raw_hints.ai_socktype = match hints.protocol {
        Protocol::Tcp => libc::SOCK_STREAM,
        Protocol::Udp => libc::SOCK_DGRAM,
        Protocol::Any => 0,
    };
    raw_hints.ai_flags = libc::AI_NUMERICSERV;
    if !hints.resolve_hostname {
        raw_hints.ai_flags |= libc::AI_NUMERICHOST;
    }
    if hints.passive {
        raw_hints.ai_flags |= libc::AI_PASSIVE;
    }

    let mut results: *mut libc::addrinfo = ptr::null_mut();
    // SAFETY: semua pointer valid selama call; results dibebaskan di bawah
    let code = unsafe {
        libc::getaddrinfo(
            node.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
            service.as_ptr(),
            &raw_hints,
            &mut results,
        )
    };
    if code != 0 {
        return Err(resolver_error(code));
    }

    let mut found = None;
    let mut cursor = results;
    while !cursor.is_null() {
        // SAFETY: cursor berasal dari linked list getaddrinfo yang masih hidup
        let info = unsafe { &*cursor };
        if !info.ai_addr.is_null()
            && (info.ai_addrlen as usize) <= mem::size_of::<libc::sockaddr_storage>()
        {
            // SAFETY: copy ai_addrlen bytes ke storage yang cukup besar
            let copied = unsafe {
                SockAddr::try_init(|storage, len| {
                    ptr::copy_nonoverlapping(
                        info.ai_addr as *const u8,
                        storage as *mut u8,
                        info.ai_addrlen as usize,
                    );
                    *len = info.ai_addrlen;
                    Ok(())
                })
            };
            if let Ok((_, addr)) = copied {
                found = Some(addr);
                break;
            }
        }
        cursor = info.ai_next;
    }

    // SAFETY: results dari getaddrinfo yang sukses, dibebaskan tepat sekali
    unsafe { libc::freeaddrinfo(results) };

    found.ok_or_else(|| ResolveError::new(libc::EAI_NONAME, "no usable address returned"))
}

/// Bagian address yang di-reverse-resolve oleh getnameinfo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NamePart {
    Host { numeric: bool },
    Service,
}

/// getnameinfo untuk host atau port
pub(crate) fn name_info(addr: &SockAddr, part: NamePart) -> Result<String, ResolveError> {
    let mut host = [0 as c_char; HOST_BUFFER_LEN];
    let mut service = [0 as c_char; SERVICE_BUFFER_LEN];

    let mut flags = libc::NI_NUMERICSERV;
    let (host_ptr, host_len, service_ptr, service_len) = match part {
        NamePart::Host { numeric } => {
            if numeric {
                flags |= libc::NI_NUMERICHOST;
            }
            (host.as_mut_ptr(), host.len(), ptr::null_mut(), 0)
        }
        NamePart::Service => (ptr::null_mut(), 0, service.as_mut_ptr(), service.len()),
    };

    // SAFETY: addr menunjuk ke storage valid sepanjang addr.len(); buffer milik stack
    let code = unsafe {
        libc::getnameinfo(
            addr.as_ptr(),
            addr.len(),
            host_ptr,
            host_len as libc::socklen_t,
            service_ptr,
            service_len as libc::socklen_t,
            flags,
        )
    };
    if code != 0 {
        return Err(resolver_error(code));
    }

    let buffer = match part {
        NamePart::Host { .. } => &host[..],
        NamePart::Service => &service[..],
    };
    // SAFETY: getnameinfo sukses menulis string nul-terminated ke buffer
    let value = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    Ok(value.to_string_lossy().into_owned())
}

fn resolver_error(code: i32) -> ResolveError {
    if code == libc::EAI_SYSTEM {
        let os = io::Error::last_os_error();
        return ResolveError::new(code, os.to_string());
    }
    // SAFETY: gai_strerror mengembalikan string statis
    let message = unsafe { CStr::from_ptr(libc::gai_strerror(code)) };
    ResolveError::new(code, message.to_string_lossy().into_owned())
}
