//! TCP listener
//!
//! `Invalid -> Bound -> Listening -> Stopped`, `Error` terminal.
//! Koneksi yang di-accept dikirim ke `IncomingConnectionCallback` yang
//! di-borrow (listener tidak boleh hidup lebih lama dari callback-nya).

use std::fmt;
use std::time::Duration;

use log::{debug, warn};

use super::callback::IncomingConnectionCallback;
use super::connection::{ConnectionStatus, TcpConnection};
use super::poll_set::PollSet;
use crate::core::{create_host_address, Address, IpVersion, Protocol, SocketError, SocketHandle};
use crate::sys;

/// Status TCP listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerStatus {
    Invalid,
    /// Sudah bind, belum listen
    Bound,
    /// Sudah bind dan listen
    Listening,
    /// Socket ditutup
    Stopped,
    Error,
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListenerStatus::Invalid => "invalid",
            ListenerStatus::Bound => "bound",
            ListenerStatus::Listening => "listening",
            ListenerStatus::Stopped => "stopped",
            ListenerStatus::Error => "error",
        })
    }
}

/// Listening socket untuk menerima koneksi masuk
pub struct TcpListener<'cb> {
    socket: SocketHandle,
    status: ListenerStatus,
    error: SocketError,
    address: Address,
    // None: listener milik ConnectionManager, koneksi dikirim ke manager
    callback: Option<&'cb mut dyn IncomingConnectionCallback>,
}

impl<'cb> TcpListener<'cb> {
    /// Resolve wildcard address untuk `port`, buat socket, lalu bind.
    ///
    /// Port 0 meminta port dari OS; lihat `bound_address()`.
    pub fn new(
        callback: &'cb mut dyn IncomingConnectionCallback,
        port: u16,
        use_ipv6: bool,
    ) -> Self {
        Self::bind(Some(callback), port, use_ipv6)
    }

    /// Listener tanpa callback sendiri; hanya dipakai oleh `ConnectionManager`
    pub(crate) fn unrouted(port: u16, use_ipv6: bool) -> Self {
        Self::bind(None, port, use_ipv6)
    }

    fn bind(
        callback: Option<&'cb mut dyn IncomingConnectionCallback>,
        port: u16,
        use_ipv6: bool,
    ) -> Self {
        let ip_version = if use_ipv6 {
            IpVersion::Ipv6
        } else {
            IpVersion::Ipv4
        };

        let mut listener = Self {
            socket: SocketHandle::invalid(),
            status: ListenerStatus::Invalid,
            error: SocketError::none(),
            address: create_host_address(port, Protocol::Tcp, ip_version),
            callback,
        };

        match SocketHandle::open(Protocol::Tcp, listener.address.ip_version()) {
            Ok(socket) => listener.socket = socket,
            Err(e) => {
                listener.fail("socket", e);
                return listener;
            }
        }

        let result = match (listener.socket.get(), listener.address.sock_addr()) {
            (Some(socket), Some(local)) => socket.bind(local),
            _ => Err(sys::invalid_argument()),
        };

        match result {
            Ok(()) => {
                // Alamat yang benar-benar di-bind (port 0 -> port dari OS)
                if let Some(local) = listener.socket.get().and_then(|s| s.local_addr().ok()) {
                    listener.address = Address::from_sock_addr(local);
                }
                listener.status = ListenerStatus::Bound;
                debug!("listener bound to {}", listener.address);
            }
            Err(e) => listener.fail("bind", e),
        }

        listener
    }

    /// `Bound -> Listening`. Gagal -> `Error`.
    pub fn start(&mut self, backlog: u32) -> bool {
        let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        let result = match self.socket.get() {
            Some(socket) => socket.listen(backlog),
            None => Err(sys::bad_descriptor()),
        };

        match result {
            Ok(()) => {
                self.status = ListenerStatus::Listening;
                debug!("listening on {} (backlog {})", self.address, backlog);
                true
            }
            Err(e) => {
                self.fail("listen", e);
                false
            }
        }
    }

    /// Tutup socket dari `Bound`/`Listening`. Idempotent.
    pub fn stop(&mut self) {
        if matches!(self.status, ListenerStatus::Bound | ListenerStatus::Listening) {
            self.socket.close();
            self.status = ListenerStatus::Stopped;
            debug!("listener on {} stopped", self.address);
        }
    }

    /// Accept satu koneksi (blocking) dan kirim ke callback.
    ///
    /// Selalu `true` jika accept dicoba, termasuk saat gagal: koneksi yang
    /// dikirim berstatus `Error`. Cek status koneksi, bukan return value ini.
    pub fn accept(&mut self) -> bool {
        let connection = self.accept_connection();
        match self.callback.as_deref_mut() {
            Some(callback) => callback.on_new_connection(connection),
            None => warn!(
                "listener on {} has no callback, dropping connection",
                self.address
            ),
        }
        true
    }

    /// Tunggu readiness sampai `timeout_ms`, lalu `accept()`.
    ///
    /// `false` hanya jika tidak ada readiness dalam timeout.
    pub fn poll_accept(&mut self, timeout_ms: u64) -> bool {
        if self.wait_readable(timeout_ms) {
            self.accept()
        } else {
            false
        }
    }

    /// Accept untuk reactor: listener dengan callback sendiri tetap memakainya,
    /// listener milik manager mengirim ke `fallback`.
    pub(crate) fn accept_routed(&mut self, fallback: &mut dyn IncomingConnectionCallback) -> bool {
        let connection = self.accept_connection();
        match self.callback.as_deref_mut() {
            Some(callback) => callback.on_new_connection(connection),
            None => fallback.on_new_connection(connection),
        }
        true
    }

    fn accept_connection(&mut self) -> TcpConnection {
        let result = match self.socket.get() {
            Some(socket) => socket.accept(),
            None => Err(sys::bad_descriptor()),
        };

        match result {
            Ok((socket, peer)) => {
                let peer = Address::from_sock_addr(peer);
                debug!("accepted connection from {} on {}", peer, self.address);
                TcpConnection::from_accepted(
                    SocketHandle::from(socket),
                    peer,
                    ConnectionStatus::Open,
                    SocketError::none(),
                )
            }
            Err(e) => {
                warn!("accept on {} failed: {}", self.address, e);
                TcpConnection::from_accepted(
                    SocketHandle::invalid(),
                    Address::invalid(),
                    ConnectionStatus::Error,
                    SocketError::from_io(&e),
                )
            }
        }
    }

    fn wait_readable(&self, timeout_ms: u64) -> bool {
        let mut poll_set = PollSet::with_capacity(1);
        if let Err(e) = poll_set.rebuild(std::iter::once(&self.socket)) {
            warn!("poll_accept on {} failed: {}", self.address, e);
            return false;
        }
        match poll_set.wait(Duration::from_millis(timeout_ms)) {
            Ok(ready) => !ready.is_empty(),
            Err(e) => {
                warn!("poll_accept on {} failed: {}", self.address, e);
                false
            }
        }
    }

    fn fail(&mut self, operation: &str, err: std::io::Error) {
        warn!("{} on {} failed: {}", operation, self.address, err);
        self.error = SocketError::from_io(&err);
        self.status = ListenerStatus::Error;
    }

    #[inline(always)]
    pub fn state(&self) -> ListenerStatus {
        self.status
    }

    #[inline(always)]
    pub fn error(&self) -> &SocketError {
        &self.error
    }

    /// Alamat lokal listener (port dari OS jika dibuat dengan port 0)
    #[inline(always)]
    pub fn bound_address(&self) -> &Address {
        &self.address
    }

    #[inline(always)]
    pub fn socket(&self) -> &SocketHandle {
        &self.socket
    }
}

impl Drop for TcpListener<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for TcpListener<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpListener")
            .field("socket", &self.socket)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("address", &self.address)
            .field("routed", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{create_address, Family};

    #[derive(Default)]
    struct Inbox {
        connections: Vec<TcpConnection>,
    }

    impl IncomingConnectionCallback for Inbox {
        fn on_new_connection(&mut self, connection: TcpConnection) {
            self.connections.push(connection);
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut inbox = Inbox::default();
        let mut listener = TcpListener::new(&mut inbox, 0, false);
        assert_eq!(listener.state(), ListenerStatus::Bound);
        assert_ne!(listener.bound_address().port_number(), 0);
        assert_eq!(listener.bound_address().family(), Family::Ipv4);

        assert!(listener.start(10));
        assert_eq!(listener.state(), ListenerStatus::Listening);

        listener.stop();
        assert_eq!(listener.state(), ListenerStatus::Stopped);
        assert!(!listener.socket().valid());

        listener.stop();
        assert_eq!(listener.state(), ListenerStatus::Stopped);
    }

    #[test]
    fn test_poll_accept_times_out() {
        let mut inbox = Inbox::default();
        {
            let mut listener = TcpListener::new(&mut inbox, 0, false);
            assert!(listener.start(10));
            assert!(!listener.poll_accept(0));
            assert!(!listener.poll_accept(20));
        }
        assert!(inbox.connections.is_empty());
    }

    #[test]
    fn test_poll_accept_delivers_connection() {
        let mut inbox = Inbox::default();
        let client;
        {
            let mut listener = TcpListener::new(&mut inbox, 0, false);
            assert!(listener.start(10));
            let port = listener.bound_address().port_number();

            let target = create_address("127.0.0.1", port, Protocol::Tcp, false, IpVersion::Ipv4);
            client = TcpConnection::connect(&target);
            assert_eq!(client.state(), ConnectionStatus::Open);

            assert!(listener.poll_accept(1000));
        }
        assert_eq!(inbox.connections.len(), 1);
        assert_eq!(inbox.connections[0].state(), ConnectionStatus::Open);
        assert_eq!(inbox.connections[0].address().host(true).value, "127.0.0.1");
    }

    #[test]
    fn test_poll_accept_waits_on_bound_listener() {
        let mut inbox = Inbox::default();
        {
            // Belum listen: tidak ada readiness, timeout harus dijalani penuh
            let mut listener = TcpListener::new(&mut inbox, 0, false);
            assert_eq!(listener.state(), ListenerStatus::Bound);

            let start = std::time::Instant::now();
            assert!(!listener.poll_accept(100));
            assert!(start.elapsed() >= Duration::from_millis(80));
        }
        assert!(inbox.connections.is_empty());
    }

    #[test]
    fn test_ipv6_listener_accepts_loopback() {
        let mut inbox = Inbox::default();
        let client;
        {
            let mut listener = TcpListener::new(&mut inbox, 0, true);
            if listener.state() != ListenerStatus::Bound {
                // Host tanpa dukungan IPv6
                return;
            }
            assert_eq!(listener.bound_address().family(), Family::Ipv6);
            assert_eq!(listener.bound_address().host(true).value, "::");
            assert!(listener.start(10));
            let port = listener.bound_address().port_number();

            let target = create_address("::1", port, Protocol::Tcp, false, IpVersion::Ipv6);
            client = TcpConnection::connect(&target);
            if client.state() != ConnectionStatus::Open {
                // Loopback ::1 tidak dikonfigurasi
                return;
            }
            assert!(listener.poll_accept(1000));
        }
        assert_eq!(inbox.connections.len(), 1);
        let accepted = &inbox.connections[0];
        assert_eq!(accepted.state(), ConnectionStatus::Open);
        assert_eq!(accepted.address().family(), Family::Ipv6);
        assert_eq!(accepted.address().host(true).value, "::1");
        assert_eq!(client.address().ip_version(), IpVersion::Ipv6);
    }

    #[test]
    fn test_accept_failure_delivers_error_connection() {
        let mut inbox = Inbox::default();
        {
            // Bound tapi belum listen: accept gagal (EINVAL)
            let mut listener = TcpListener::new(&mut inbox, 0, false);
            assert_eq!(listener.state(), ListenerStatus::Bound);
            assert!(listener.accept());
        }
        assert_eq!(inbox.connections.len(), 1);
        assert_eq!(inbox.connections[0].state(), ConnectionStatus::Error);
        assert!(!inbox.connections[0].error().is_none());
    }

    #[test]
    fn test_bind_conflict_is_error() {
        let mut first_inbox = Inbox::default();
        let mut second_inbox = Inbox::default();

        let mut first = TcpListener::new(&mut first_inbox, 0, false);
        assert!(first.start(10));
        let port = first.bound_address().port_number();

        let second = TcpListener::new(&mut second_inbox, port, false);
        assert_eq!(second.state(), ListenerStatus::Error);
        assert_eq!(second.error().code, libc::EADDRINUSE);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ListenerStatus::Bound.to_string(), "bound");
        assert_eq!(ListenerStatus::Listening.to_string(), "listening");
        assert_eq!(ListenerStatus::Stopped.to_string(), "stopped");
    }
}
