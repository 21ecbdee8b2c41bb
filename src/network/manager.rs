//! Connection manager: single-threaded reactor
//!
//! Memegang listeners dan connections, satu readiness wait per `update()`.
//!
//! Invariant pollable set: selalu listeners (urut) lalu connections (urut).
//! Index `i` yang ready -> listener `i` jika `i < listener_count`,
//! selain itu connection `i - listener_count`.
//!
//! Callback tidak bisa masuk kembali ke manager selama `update()`: manager
//! memegang `&mut` ke data callback dan callback hanya menerima
//! `&mut TcpConnection`, jadi borrow checker menolak re-entrancy.

use std::time::Duration;

use log::{debug, error};

use super::callback::{DataReceivedCallback, IncomingConnectionCallback};
use super::connection::{ConnectionStatus, TcpConnection};
use super::listener::{ListenerStatus, TcpListener};
use super::poll_set::PollSet;
use crate::config::ManagerConfig;

/// Daftar koneksi milik manager
#[derive(Debug, Default)]
struct ConnectionSet {
    connections: Vec<TcpConnection>,
    changed: bool,
}

impl IncomingConnectionCallback for ConnectionSet {
    fn on_new_connection(&mut self, connection: TcpConnection) {
        debug!(
            "connection {} from {} added ({})",
            self.connections.len(),
            connection.address(),
            connection.state()
        );
        self.connections.push(connection);
        self.changed = true;
    }
}

/// Tujuan accept dari listener milik manager; TCP_NODELAY dipasang di sini
struct AcceptInbox<'a> {
    set: &'a mut ConnectionSet,
    nodelay: bool,
}

impl IncomingConnectionCallback for AcceptInbox<'_> {
    fn on_new_connection(&mut self, connection: TcpConnection) {
        if self.nodelay && connection.state() == ConnectionStatus::Open {
            // Gagal set_nodelay bukan error koneksi
            if let Some(Err(e)) = connection.socket().get().map(|s| s.set_nodelay(true)) {
                debug!("TCP_NODELAY on {} failed: {}", connection.address(), e);
            }
        }
        self.set.on_new_connection(connection);
    }
}

/// Reactor untuk banyak listener dan connection
///
/// Data callback di-borrow: caller memilikinya dan harus hidup lebih lama
/// dari manager. Manager sendiri mengimplementasikan
/// `IncomingConnectionCallback`.
pub struct ConnectionManager<'cb, D: DataReceivedCallback + ?Sized> {
    listeners: Vec<TcpListener<'cb>>,
    inbox: ConnectionSet,
    callback: &'cb mut D,
    poll_set: PollSet,
    // Jumlah listener saat pollable set terakhir dibangun
    listener_count: usize,
    dirty: bool,
    config: ManagerConfig,
}

impl<'cb, D: DataReceivedCallback + ?Sized> ConnectionManager<'cb, D> {
    pub fn new(callback: &'cb mut D) -> Self {
        Self::with_config(callback, ManagerConfig::default())
    }

    pub fn with_config(callback: &'cb mut D, config: ManagerConfig) -> Self {
        Self {
            listeners: Vec::new(),
            inbox: ConnectionSet::default(),
            callback,
            poll_set: PollSet::with_capacity(config.events_capacity),
            listener_count: 0,
            dirty: true,
            config,
        }
    }

    /// Buat listener yang mengirim koneksi baru ke manager ini.
    ///
    /// Listener langsung di-`start` dengan backlog dari config; cek `state()`
    /// pada listener yang dikembalikan.
    pub fn add_listener(&mut self, port: u16, use_ipv6: bool) -> &TcpListener<'cb> {
        let mut listener = TcpListener::unrouted(port, use_ipv6);
        if listener.state() == ListenerStatus::Bound {
            listener.start(self.config.backlog);
        }
        self.push_listener(listener)
    }

    /// Adopsi listener yang sudah dibuat di luar; koneksinya tetap dikirim
    /// ke callback milik listener itu.
    pub fn adopt_listener(&mut self, listener: TcpListener<'cb>) -> &TcpListener<'cb> {
        self.push_listener(listener)
    }

    /// Tambahkan koneksi yang sudah open seolah-olah baru di-accept
    pub fn add_connection(&mut self, connection: TcpConnection) {
        self.on_new_connection(connection);
    }

    /// Satu langkah reactor (blocking sampai `timeout_ms`, 0 = tidak blocking).
    ///
    /// `false` hanya jika readiness wait sendiri gagal; timeout dan error
    /// per-koneksi tetap `true`. Koneksi yang di-accept di sini baru ikut
    /// di-poll pada `update()` berikutnya.
    pub fn update(&mut self, timeout_ms: u64) -> bool {
        if (self.dirty || self.inbox.changed) && !self.rebuild() {
            return false;
        }

        let ready = match self.poll_set.wait(Duration::from_millis(timeout_ms)) {
            Ok(ready) => ready,
            Err(e) => {
                error!("readiness wait failed: {}", e);
                return false;
            }
        };

        // `ready` urut naik: semua listener dilayani sebelum connection
        let listener_count = self.listener_count;
        for index in ready {
            if index < listener_count {
                if let Some(listener) = self.listeners.get_mut(index) {
                    let mut accepted = AcceptInbox {
                        set: &mut self.inbox,
                        nodelay: self.config.nodelay,
                    };
                    listener.accept_routed(&mut accepted);
                }
            } else if let Some(connection) =
                self.inbox.connections.get_mut(index - listener_count)
            {
                self.callback.on_receive(connection);
                if !connection.socket().valid() {
                    self.dirty = true;
                }
            }
        }

        true
    }

    /// Buang connection yang closed/error/invalid dan listener yang
    /// stopped/error. Mengembalikan jumlah objek yang dibuang.
    pub fn remove_inactive(&mut self) -> usize {
        let before = self.listeners.len() + self.inbox.connections.len();

        self.listeners.retain(|l| {
            matches!(
                l.state(),
                ListenerStatus::Bound | ListenerStatus::Listening
            )
        });
        self.inbox.connections.retain(|c| {
            matches!(
                c.state(),
                ConnectionStatus::Open | ConnectionStatus::Shutdown
            )
        });

        let removed = before - (self.listeners.len() + self.inbox.connections.len());
        if removed > 0 {
            debug!("removed {} inactive sockets", removed);
            self.dirty = true;
        }
        removed
    }

    #[inline(always)]
    pub fn listeners(&self) -> &[TcpListener<'cb>] {
        &self.listeners
    }

    #[inline(always)]
    pub fn connections(&self) -> &[TcpConnection] {
        &self.inbox.connections
    }

    /// Akses mutable ke connections. Pollable set ditandai dirty karena
    /// caller bisa menutup descriptor.
    pub fn connections_mut(&mut self) -> &mut [TcpConnection] {
        self.dirty = true;
        &mut self.inbox.connections
    }

    #[inline(always)]
    pub fn callback(&self) -> &D {
        &*self.callback
    }

    #[inline(always)]
    pub fn callback_mut(&mut self) -> &mut D {
        &mut *self.callback
    }

    #[inline(always)]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn push_listener(&mut self, listener: TcpListener<'cb>) -> &TcpListener<'cb> {
        self.listeners.push(listener);
        self.dirty = true;
        &self.listeners[self.listeners.len() - 1]
    }

    fn rebuild(&mut self) -> bool {
        let sockets = self
            .listeners
            .iter()
            .map(|l| l.socket())
            .chain(self.inbox.connections.iter().map(|c| c.socket()));

        match self.poll_set.rebuild(sockets) {
            Ok(()) => {
                self.listener_count = self.listeners.len();
                debug_assert_eq!(
                    self.poll_set.len(),
                    self.listener_count + self.inbox.connections.len()
                );
                self.dirty = false;
                self.inbox.changed = false;
                true
            }
            Err(e) => {
                error!("failed to build pollable set: {}", e);
                self.dirty = true;
                false
            }
        }
    }
}

impl<D: DataReceivedCallback + ?Sized> IncomingConnectionCallback for ConnectionManager<'_, D> {
    fn on_new_connection(&mut self, connection: TcpConnection) {
        self.inbox.on_new_connection(connection);
    }
}
