//! Network Layer: TCP/UDP state machines + reactor
//!
//! Menggunakan mio untuk readiness multiplexing.
//!
//! Fitur:
//! - TCP connection (active / passive open) dan listener dengan status eksplisit
//! - UDP datagram socket dengan bind opsional
//! - `ConnectionManager`: satu readiness wait per `update()`, listener
//!   dilayani sebelum connection

mod callback;
mod connection;
mod listener;
mod manager;
mod poll_set;
mod udp;

pub use callback::{DataReceivedCallback, IncomingConnectionCallback};
pub use connection::{ConnectionStatus, TcpConnection};
pub use listener::{ListenerStatus, TcpListener};
pub use manager::ConnectionManager;
pub use udp::{UdpSocket, UdpStatus};
