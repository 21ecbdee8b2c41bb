//! UDP datagram socket
//!
//! Bind opsional: socket yang belum bind tetap bisa `send_to`.

use std::fmt;
use std::io;
use std::mem::MaybeUninit;

use log::{debug, warn};

use crate::core::{Address, IpVersion, Protocol, SocketError, SocketHandle};
use crate::sys;

/// Status UDP socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UdpStatus {
    Invalid,
    /// Open, belum bind
    Open,
    /// Open, sudah bind
    Bound,
    /// Bind gagal
    Error,
    Closed,
}

impl fmt::Display for UdpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UdpStatus::Invalid => "invalid",
            UdpStatus::Open => "open",
            UdpStatus::Bound => "bound",
            UdpStatus::Error => "error",
            UdpStatus::Closed => "closed",
        })
    }
}

#[derive(Debug)]
pub struct UdpSocket {
    socket: SocketHandle,
    bound: Address,
    status: UdpStatus,
    error: SocketError,
}

impl UdpSocket {
    /// Datagram socket baru (IPv4), belum bind
    pub fn new() -> Self {
        let mut udp = Self {
            socket: SocketHandle::invalid(),
            bound: Address::invalid(),
            status: UdpStatus::Invalid,
            error: SocketError::none(),
        };

        match SocketHandle::open(Protocol::Udp, IpVersion::Any) {
            Ok(socket) => {
                udp.socket = socket;
                udp.status = UdpStatus::Open;
            }
            Err(e) => {
                warn!("udp socket failed: {}", e);
                udp.error = SocketError::from_io(&e);
            }
        }
        udp
    }

    /// `Open -> Bound`. Gagal -> `Error`.
    pub fn bind(&mut self, target: &Address) -> bool {
        let result = match (self.socket.get(), target.sock_addr()) {
            (Some(socket), Some(local)) => socket.bind(local),
            (None, _) => Err(sys::bad_descriptor()),
            (_, None) => Err(sys::invalid_argument()),
        };

        match result {
            Ok(()) => {
                self.bound = self
                    .socket
                    .get()
                    .and_then(|s| s.local_addr().ok())
                    .map(Address::from_sock_addr)
                    .unwrap_or_else(|| target.clone());
                self.status = UdpStatus::Bound;
                debug!("udp socket bound to {}", self.bound);
                true
            }
            Err(e) => {
                warn!("udp bind to {} failed: {}", target, e);
                self.error = SocketError::from_io(&e);
                self.status = UdpStatus::Error;
                false
            }
        }
    }

    pub fn close(&mut self) {
        self.socket.close();
        self.status = UdpStatus::Closed;
    }

    /// Baca datagram berikutnya; `sender` diisi alamat pengirim.
    ///
    /// `Ok(0)` adalah datagram kosong yang valid, bukan shutdown.
    pub fn receive_from(&mut self, buffer: &mut [u8], sender: &mut Address) -> io::Result<usize> {
        let result = match self.socket.get() {
            Some(socket) => loop {
                // SAFETY: recv_from hanya menulis ke buffer, tidak pernah membaca
                // byte yang belum diinisialisasi; &mut [u8] sudah terinisialisasi
                let uninit = unsafe {
                    &mut *(buffer as *mut [u8] as *mut [MaybeUninit<u8>])
                };
                match socket.recv_from(uninit) {
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            },
            None => Err(sys::bad_descriptor()),
        };

        match result {
            Ok((received, from)) => {
                *sender = Address::from_sock_addr(from);
                Ok(received)
            }
            Err(e) => {
                self.error = SocketError::from_io(&e);
                Err(e)
            }
        }
    }

    /// Kirim satu datagram utuh ke `destination`
    pub fn send_to(&mut self, buffer: &[u8], destination: &Address) -> io::Result<usize> {
        let result = match (self.socket.get(), destination.sock_addr()) {
            (Some(socket), Some(peer)) => loop {
                match socket.send_to(buffer, peer) {
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            },
            (None, _) => Err(sys::bad_descriptor()),
            (_, None) => Err(sys::invalid_argument()),
        };

        if let Err(ref e) = result {
            self.error = SocketError::from_io(e);
        }
        result
    }

    #[inline(always)]
    pub fn valid(&self) -> bool {
        self.socket.valid()
    }

    /// Alamat lokal setelah bind, invalid jika belum bind
    #[inline(always)]
    pub fn bound_to(&self) -> &Address {
        &self.bound
    }

    #[inline(always)]
    pub fn state(&self) -> UdpStatus {
        self.status
    }

    #[inline(always)]
    pub fn error(&self) -> &SocketError {
        &self.error
    }

    #[inline(always)]
    pub fn socket(&self) -> &SocketHandle {
        &self.socket
    }
}

impl Default for UdpSocket {
    fn default() -> Self {
        Self::new()
    }
}
