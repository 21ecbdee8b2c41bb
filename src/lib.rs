//! Hermes Net - Portable Socket Primitives
//!
//! Arsitektur:
//! - Ownership: satu `SocketHandle` = satu descriptor, ditutup tepat sekali
//! - Non-throwing: kegagalan OS dicatat di objek (`error()`), bukan panic
//! - State machines: TCP connection / listener dan UDP socket dengan status eksplisit
//! - Reactor: `ConnectionManager` dengan satu readiness wait per `update()`
//!
//! Single-threaded. Tidak ada locking di dalam crate ini; satu handle hanya
//! boleh di-poll oleh satu reactor.

#[cfg(not(unix))]
compile_error!("hermes-net currently only provides a unix socket backend");

pub mod config;
pub mod core;
pub mod network;
mod sys;

pub use crate::config::{ManagerConfig, DEFAULT_BACKLOG, DEFAULT_TIMEOUT_MS};
pub use crate::core::{
    create_address, create_host_address, try_create_address, try_create_host_address, Address,
    Family, IpVersion, Protocol, ResolveError, ResolvedString, SocketError, SocketHandle,
};
pub use crate::network::{
    ConnectionManager, ConnectionStatus, DataReceivedCallback, IncomingConnectionCallback,
    ListenerStatus, TcpConnection, TcpListener, UdpSocket, UdpStatus,
};
