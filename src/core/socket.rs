//! Exclusive socket descriptor ownership
//!
//! `SocketHandle` memegang tepat satu descriptor OS (atau kosong). Tidak ada
//! `Clone`: descriptor adalah resource kernel yang unik. Satu-satunya cara
//! membungkus descriptor yang sudah ada adalah `From<socket2::Socket>`, yang
//! mengambil ownership, jadi dua wrapper untuk descriptor yang sama tidak
//! bisa dibuat tanpa `unsafe`.

use std::fmt;
use std::io;

use log::{debug, warn};
use socket2::{Domain, Socket, Type};

/// Transport protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Any,
}

impl Protocol {
    /// Socket type untuk protocol ini. `Any` jatuh ke datagram.
    pub(crate) fn socket_type(self) -> Type {
        match self {
            Protocol::Tcp => Type::STREAM,
            Protocol::Udp | Protocol::Any => Type::DGRAM,
        }
    }
}

/// IP version yang diminta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    Ipv4,
    Ipv6,
    Any,
}

impl IpVersion {
    /// Domain untuk socket baru. `Any` dibuat sebagai IPv4.
    pub(crate) fn domain(self) -> Domain {
        match self {
            IpVersion::Ipv6 => Domain::IPV6,
            IpVersion::Ipv4 | IpVersion::Any => Domain::IPV4,
        }
    }
}

/// Owner dari satu socket descriptor
#[derive(Default)]
pub struct SocketHandle {
    inner: Option<Socket>,
}

impl SocketHandle {
    /// Handle kosong (sentinel "uninitialized")
    pub const fn invalid() -> Self {
        Self { inner: None }
    }

    /// Membuat socket baru. Tetap invalid jika system call gagal;
    /// cek dengan `valid()`.
    pub fn new(protocol: Protocol, ip_version: IpVersion) -> Self {
        match Self::open(protocol, ip_version) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("socket({:?}, {:?}) failed: {}", protocol, ip_version, e);
                Self::invalid()
            }
        }
    }

    /// Seperti `new`, tapi mengembalikan error OS-nya
    pub(crate) fn open(protocol: Protocol, ip_version: IpVersion) -> io::Result<Self> {
        let socket = Socket::new(ip_version.domain(), protocol.socket_type(), None)?;
        Ok(Self::from(socket))
    }

    #[inline(always)]
    pub fn valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Release descriptor dan kembali ke sentinel. No-op jika sudah invalid.
    pub fn close(&mut self) {
        if let Some(socket) = self.inner.take() {
            debug!("closing socket {:?}", crate::sys::raw_descriptor(&socket));
            drop(socket);
        }
    }

    /// Transfer ownership: hasilnya memegang descriptor, `self` jadi invalid
    pub fn take(&mut self) -> SocketHandle {
        std::mem::take(self)
    }

    #[inline(always)]
    pub(crate) fn get(&self) -> Option<&Socket> {
        self.inner.as_ref()
    }

    /// Descriptor OS mentah, hanya untuk registrasi readiness
    pub(crate) fn raw(&self) -> Option<crate::sys::RawSocket> {
        self.inner.as_ref().map(crate::sys::raw_descriptor)
    }
}

impl From<Socket> for SocketHandle {
    fn from(socket: Socket) -> Self {
        Self {
            inner: Some(socket),
        }
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw() {
            Some(raw) => write!(f, "SocketHandle({})", raw),
            None => f.write_str("SocketHandle(invalid)"),
        }
    }
}
