//! TCP connection (active atau passive open)
//!
//! Status monotonic: `Open -> Shutdown -> Closed`, atau `Error`.
//! Setelah shutdown/closed/error objek harus dibuang, tidak dipakai ulang
//! untuk peer lain.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::Shutdown;

use log::{debug, warn};

use crate::core::{Address, Protocol, SocketError, SocketHandle};
use crate::sys;

/// Status TCP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Invalid,
    Open,
    Shutdown,
    Closed,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Invalid => "invalid",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Shutdown => "shutdown",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Error => "error",
        })
    }
}

/// Connection ke satu peer
#[derive(Debug)]
pub struct TcpConnection {
    address: Address,
    socket: SocketHandle,
    status: ConnectionStatus,
    error: SocketError,
}

impl TcpConnection {
    /// Active open: buat socket sesuai IP version target lalu connect (blocking).
    ///
    /// Gagal connect -> status `Error`, socket tetap dimiliki sampai drop.
    pub fn connect(target: &Address) -> Self {
        let mut connection = Self {
            address: target.clone(),
            socket: SocketHandle::invalid(),
            status: ConnectionStatus::Invalid,
            error: SocketError::none(),
        };

        match SocketHandle::open(Protocol::Tcp, target.ip_version()) {
            Ok(socket) => connection.socket = socket,
            Err(e) => {
                warn!("socket for {} failed: {}", target, e);
                connection.error = SocketError::from_io(&e);
                return connection;
            }
        }

        let result = match (connection.socket.get(), target.sock_addr()) {
            (Some(socket), Some(peer)) => socket.connect(peer),
            _ => Err(sys::invalid_argument()),
        };

        match result {
            Ok(()) => {
                debug!("connected to {}", target);
                connection.status = ConnectionStatus::Open;
            }
            Err(e) => {
                warn!("connect to {} failed: {}", target, e);
                connection.error = SocketError::from_io(&e);
                connection.status = ConnectionStatus::Error;
            }
        }

        connection
    }

    /// Passive open: bungkus socket yang sudah connected (hasil accept).
    ///
    /// Handle invalid menghasilkan status `Invalid`, kecuali status yang
    /// diminta memang `Error` (accept yang gagal).
    pub fn from_accepted(
        socket: SocketHandle,
        address: Address,
        status: ConnectionStatus,
        error: SocketError,
    ) -> Self {
        let status = if socket.valid() || status == ConnectionStatus::Error {
            status
        } else {
            ConnectionStatus::Invalid
        };

        Self {
            address,
            socket,
            status,
            error,
        }
    }

    /// Half-close kedua arah tanpa melepas descriptor.
    ///
    /// Data yang sudah ada di receive buffer tidak dibuang; caller tetap
    /// harus drain sebelum `close()`.
    pub fn shutdown(&mut self) {
        if self.status != ConnectionStatus::Open {
            debug!("shutdown ignored in state {}", self.status);
            return;
        }

        if let Some(socket) = self.socket.get() {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                warn!("shutdown of {} failed: {}", self.address, e);
                self.error = SocketError::from_io(&e);
            }
        }
        self.status = ConnectionStatus::Shutdown;
    }

    /// Tutup socket. Data yang belum dibaca dibuang.
    pub fn close(&mut self) {
        if self.status == ConnectionStatus::Closed {
            return;
        }
        self.socket.close();
        self.status = ConnectionStatus::Closed;
        debug!("connection to {} closed", self.address);
    }

    /// Baca sampai `buffer.len()` bytes.
    ///
    /// `Ok(0)` = peer melakukan orderly shutdown. Error juga dicatat di `error()`.
    pub fn receive(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let result = match self.socket.get() {
            Some(mut socket) => loop {
                match socket.read(buffer) {
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            },
            None => Err(sys::bad_descriptor()),
        };
        self.record(result)
    }

    /// Tulis sampai `buffer.len()` bytes. Partial write adalah hasil normal.
    pub fn send(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let result = match self.socket.get() {
            Some(mut socket) => loop {
                match socket.write(buffer) {
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            },
            None => Err(sys::bad_descriptor()),
        };
        self.record(result)
    }

    /// TCP_NODELAY. Mengembalikan `false` dan mencatat error jika gagal.
    pub fn set_nodelay(&mut self, nodelay: bool) -> bool {
        let result = match self.socket.get() {
            Some(socket) => socket.set_nodelay(nodelay),
            None => Err(sys::bad_descriptor()),
        };
        self.record(result).is_ok()
    }

    #[inline(always)]
    pub fn state(&self) -> ConnectionStatus {
        self.status
    }

    /// Error OS terakhir, `SocketError::none()` jika belum pernah gagal
    #[inline(always)]
    pub fn error(&self) -> &SocketError {
        &self.error
    }

    /// Peer address
    #[inline(always)]
    pub fn address(&self) -> &Address {
        &self.address
    }

    #[inline(always)]
    pub fn socket(&self) -> &SocketHandle {
        &self.socket
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(ref e) = result {
            self.error = SocketError::from_io(e);
        }
        result
    }
}
