//! Capability interfaces untuk listener dan reactor

use super::TcpConnection;

/// Menerima koneksi baru dari `TcpListener::accept`.
///
/// Koneksi yang diterima bisa berstatus `Error`; cek `state()` sebelum dipakai.
pub trait IncomingConnectionCallback {
    fn on_new_connection(&mut self, connection: TcpConnection);
}

/// Dipanggil reactor untuk setiap koneksi yang readable
pub trait DataReceivedCallback {
    fn on_receive(&mut self, connection: &mut TcpConnection);
}
