//! Network address value + resolution
//!
//! `Address` hanya dibuat oleh resolusi (`create_address`,
//! `create_host_address`), accept, atau receive. Raw endpoint bytes
//! disimpan opaque di `SockAddr`; caller hanya melihatnya lewat
//! `host()`, `port()` dan `to_string_with()`.

use std::fmt;
use std::net::SocketAddr;

use log::debug;
use socket2::SockAddr;

use super::error::ResolveError;
use super::socket::{IpVersion, Protocol};
use crate::sys::{self, LookupHints, NamePart};

/// Address family dari endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Unspecified,
    Ipv4,
    Ipv6,
}

/// Hasil reverse resolution: `code == 0` berarti sukses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedString {
    pub code: i32,
    pub value: String,
}

impl ResolvedString {
    fn invalid() -> Self {
        Self {
            code: sys::INVALID_ADDRESS_CODE,
            value: "invalid".to_string(),
        }
    }

    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl From<Result<String, ResolveError>> for ResolvedString {
    fn from(result: Result<String, ResolveError>) -> Self {
        match result {
            Ok(value) => Self { code: 0, value },
            Err(e) => Self {
                code: e.code,
                value: e.message,
            },
        }
    }
}

/// Resolved network endpoint, immutable
#[derive(Clone)]
pub struct Address {
    inner: Option<SockAddr>,
}

impl Address {
    /// Singleton invalid address (`valid() == false`, family unspecified)
    pub const fn invalid() -> Self {
        Self { inner: None }
    }

    pub(crate) fn from_sock_addr(addr: SockAddr) -> Self {
        Self { inner: Some(addr) }
    }

    #[inline(always)]
    pub fn valid(&self) -> bool {
        self.inner.is_some()
    }

    pub fn family(&self) -> Family {
        self.inner.as_ref().map_or(Family::Unspecified, sys::family_of)
    }

    /// IP version untuk socket yang cocok dengan address ini
    pub fn ip_version(&self) -> IpVersion {
        match self.family() {
            Family::Ipv6 => IpVersion::Ipv6,
            _ => IpVersion::Ipv4,
        }
    }

    /// Panjang endpoint dalam bytes (0 untuk invalid)
    pub fn length(&self) -> usize {
        self.inner.as_ref().map_or(0, |a| a.len() as usize)
    }

    /// Host string. `numeric_only = false` mengizinkan reverse DNS.
    pub fn host(&self, numeric_only: bool) -> ResolvedString {
        match &self.inner {
            Some(addr) => {
                let part = NamePart::Host {
                    numeric: numeric_only,
                };
                sys::name_info(addr, part).into()
            }
            None => ResolvedString::invalid(),
        }
    }

    /// Port sebagai string numerik
    pub fn port(&self) -> ResolvedString {
        match &self.inner {
            Some(addr) => sys::name_info(addr, NamePart::Service).into(),
            None => ResolvedString::invalid(),
        }
    }

    /// `host:port`, IPv6 ditulis sebagai `[host]:port`
    pub fn to_string_with(&self, numeric_host_only: bool) -> ResolvedString {
        if !self.valid() {
            return ResolvedString::invalid();
        }

        let host = self.host(numeric_host_only);
        if !host.is_ok() {
            return host;
        }
        let port = self.port();
        if !port.is_ok() {
            return port;
        }

        let value = if self.family() == Family::Ipv6 {
            format!("[{}]:{}", host.value, port.value)
        } else {
            format!("{}:{}", host.value, port.value)
        };
        ResolvedString { code: 0, value }
    }

    /// Port sebagai integer; 0 jika resolusi atau parsing gagal
    pub fn port_number(&self) -> u16 {
        let port = self.port();
        if !port.is_ok() {
            return 0;
        }
        port.value.parse().unwrap_or(0)
    }

    #[inline(always)]
    pub(crate) fn sock_addr(&self) -> Option<&SockAddr> {
        self.inner.as_ref()
    }

    pub(crate) fn socket_addr(&self) -> Option<SocketAddr> {
        self.inner.as_ref().and_then(SockAddr::as_socket)
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.family() == b.family() && a.len() == b.len() && a.as_socket() == b.as_socket()
            }
            _ => false,
        }
    }
}

impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(true).value)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket_addr() {
            Some(addr) => write!(f, "Address({})", addr),
            None if self.valid() => write!(f, "Address({:?})", self.family()),
            None => f.write_str("Address(invalid)"),
        }
    }
}

/// Resolve hostname/port ke endpoint pertama yang cocok.
///
/// `resolve_hostname = false` berarti hostname harus literal numerik.
/// Mengembalikan `Address::invalid()` jika gagal; tidak pernah panic.
pub fn create_address(
    hostname: &str,
    port: u16,
    protocol: Protocol,
    resolve_hostname: bool,
    ip_version: IpVersion,
) -> Address {
    match try_create_address(hostname, port, protocol, resolve_hostname, ip_version) {
        Ok(addr) => addr,
        Err(e) => {
            debug!("create_address({}, {}) failed: {}", hostname, port, e);
            Address::invalid()
        }
    }
}

/// Seperti `create_address`, tapi resolver error tetap tersedia
pub fn try_create_address(
    hostname: &str,
    port: u16,
    protocol: Protocol,
    resolve_hostname: bool,
    ip_version: IpVersion,
) -> Result<Address, ResolveError> {
    let hints = LookupHints {
        protocol,
        ip_version,
        resolve_hostname,
        passive: false,
    };
    sys::lookup(Some(hostname), port, &hints).map(Address::from_sock_addr)
}

/// Wildcard (all-interfaces) address untuk bind server
pub fn create_host_address(port: u16, protocol: Protocol, ip_version: IpVersion) -> Address {
    try_create_host_address(port, protocol, ip_version).unwrap_or_else(|e| {
        debug!("create_host_address({}) failed: {}", port, e);
        Address::invalid()
    })
}

pub fn try_create_host_address(
    port: u16,
    protocol: Protocol,
    ip_version: IpVersion,
) -> Result<Address, ResolveError> {
    let hints = LookupHints {
        protocol,
        ip_version,
        resolve_hostname: false,
        passive: true,
    };
    sys::lookup(None, port, &hints).map(Address::from_sock_addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_address_tcp_ipv4() {
        let addr = create_address("127.0.0.1", 2048, Protocol::Tcp, false, IpVersion::Ipv4);

        assert!(addr.valid());
        assert_eq!(addr.family(), Family::Ipv4);
        assert_eq!(addr.port_number(), 2048);
        assert_eq!(addr.port().code, 0);
        assert_eq!(addr.port().value, "2048");
        assert_eq!(addr.host(true).code, 0);
        assert_eq!(addr.host(true).value, "127.0.0.1");
    }

    #[test]
    fn test_numeric_literals_round_trip() {
        let cases = [
            ("10.0.0.1", 1u16),
            ("192.168.1.254", 65535),
            ("0.0.0.0", 9999),
        ];
        for (host, port) in cases {
            let addr = create_address(host, port, Protocol::Udp, false, IpVersion::Any);
            assert!(addr.valid(), "{} should resolve", host);
            assert_eq!(addr.port_number(), port);
            assert_eq!(addr.host(true).value, host);
        }
    }

    #[test]
    fn test_create_address_tcp_ipv4_localhost() {
        let addr = create_address("localhost", 22, Protocol::Tcp, true, IpVersion::Ipv4);

        assert!(addr.valid());
        assert_eq!(addr.family(), Family::Ipv4);
        assert_eq!(addr.port_number(), 22);
        assert_eq!(addr.port().code, 0);
        assert_eq!(addr.port().value, "22");
        assert_eq!(addr.host(true).value, "127.0.0.1");

        // Reverse lookup lewat hosts file: "localhost" atau "localhost.<domain>"
        let host = addr.host(false);
        assert_eq!(host.code, 0);
        assert!(host.value.starts_with("localhost"), "got {}", host.value);
    }

    #[test]
    fn test_create_address_ipv6() {
        let addr = create_address("::1", 443, Protocol::Tcp, false, IpVersion::Ipv6);
        assert!(addr.valid());
        assert_eq!(addr.family(), Family::Ipv6);
        assert_eq!(addr.ip_version(), IpVersion::Ipv6);
        assert_eq!(addr.to_string_with(true).value, "[::1]:443");
    }

    #[test]
    fn test_non_numeric_hostname_without_resolution() {
        let addr = create_address("localhost", 80, Protocol::Tcp, false, IpVersion::Any);
        assert!(!addr.valid());

        let err = try_create_address("localhost", 80, Protocol::Tcp, false, IpVersion::Any)
            .unwrap_err();
        assert_ne!(err.code, 0);
    }

    #[test]
    fn test_version_mismatch_is_invalid() {
        let addr = create_address("127.0.0.1", 80, Protocol::Tcp, false, IpVersion::Ipv6);
        assert!(!addr.valid());
    }

    #[test]
    fn test_invalid_address_queries() {
        let addr = Address::invalid();
        assert!(!addr.valid());
        assert_eq!(addr.family(), Family::Unspecified);
        assert_eq!(addr.length(), 0);

        let results = [
            addr.host(true),
            addr.host(false),
            addr.port(),
            addr.to_string_with(true),
        ];
        for result in results {
            assert_eq!(result.code, sys::INVALID_ADDRESS_CODE);
            assert_eq!(result.value, "invalid");
        }
        assert_eq!(addr.port_number(), 0);
    }

    #[test]
    fn test_host_address_is_wildcard() {
        let addr = create_host_address(7000, Protocol::Tcp, IpVersion::Ipv4);
        assert!(addr.valid());
        assert_eq!(addr.host(true).value, "0.0.0.0");
        assert_eq!(addr.port_number(), 7000);

        let addr6 = create_host_address(7000, Protocol::Tcp, IpVersion::Ipv6);
        assert!(addr6.valid());
        assert_eq!(addr6.host(true).value, "::");
    }

    #[test]
    fn test_display_and_equality() {
        let a = create_address("127.0.0.1", 5000, Protocol::Udp, false, IpVersion::Ipv4);
        let b = create_address("127.0.0.1", 5000, Protocol::Tcp, false, IpVersion::Ipv4);
        let c = create_address("127.0.0.1", 5001, Protocol::Tcp, false, IpVersion::Ipv4);

        assert_eq!(a.to_string(), "127.0.0.1:5000");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Address::invalid());
        assert_eq!(Address::invalid(), Address::default());
    }
}
