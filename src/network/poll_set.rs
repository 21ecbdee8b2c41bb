//! Pollable set di atas mio
//!
//! Registrasi mio bersifat edge-triggered (epoll/kqueue). Entry yang
//! dilaporkan ready pada wait sebelumnya di-`reregister` sebelum wait
//! berikutnya, sehingga kernel melaporkan ulang descriptor yang masih
//! readable dan reactor melihat semantik level-triggered. Entry lain masih
//! armed dan tidak disentuh.
//!
//! Rebuild membuat `Poll` baru; biaya ini hanya dibayar saat set berubah
//! (dan sekali per `poll_accept`).
//!
//! Hanya `is_readable()` yang dihitung ready. Hang-up tanpa data (socket TCP
//! yang bind tapi belum listen) tidak dilaporkan; peer yang menutup atau
//! reset tetap memunculkan readable.

use std::io;
use std::time::Duration;

use log::debug;
use mio::{Events, Interest, Poll, Token};

use crate::core::SocketHandle;
use crate::sys::{RawSocket, ReadinessSource};

pub(crate) struct PollSet {
    poll: Option<Poll>,
    events: Events,
    capacity: usize,
    // Index = Token; None untuk handle invalid atau registrasi yang gagal
    entries: Vec<Option<RawSocket>>,
    // Index yang ready pada wait terakhir, perlu di-arm ulang
    last_ready: Vec<usize>,
}

impl PollSet {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            poll: None,
            events: Events::with_capacity(capacity),
            capacity,
            entries: Vec::new(),
            last_ready: Vec::new(),
        }
    }

    /// Bangun ulang set dengan urutan `sockets` sebagai index
    pub(crate) fn rebuild<'a, I>(&mut self, sockets: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a SocketHandle>,
    {
        // Poll lama di-drop: semua registrasi lama ikut hilang
        self.poll = None;
        self.entries.clear();
        self.last_ready.clear();

        let poll = Poll::new()?;
        for (index, socket) in sockets.into_iter().enumerate() {
            let entry = socket.raw().and_then(|raw| {
                let registered = poll.registry().register(
                    &mut ReadinessSource(&raw),
                    Token(index),
                    Interest::READABLE,
                );
                match registered {
                    Ok(()) => Some(raw),
                    Err(e) => {
                        debug!("register {:?} failed: {}", socket, e);
                        None
                    }
                }
            });
            self.entries.push(entry);
        }

        if self.entries.len() > self.capacity {
            self.capacity = self.entries.len();
            self.events = Events::with_capacity(self.capacity);
        }

        self.poll = Some(poll);
        debug!("pollable set rebuilt with {} entries", self.entries.len());
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Satu readiness wait. Mengembalikan index yang readable, urut naik.
    ///
    /// `timeout` nol = langsung kembali. Wait yang ter-interrupt dianggap
    /// tidak ada yang ready.
    pub(crate) fn wait(&mut self, timeout: Duration) -> io::Result<Vec<usize>> {
        let poll = match self.poll.as_mut() {
            Some(poll) => poll,
            None => return Err(io::Error::new(io::ErrorKind::Other, "pollable set not built")),
        };

        for index in self.last_ready.drain(..) {
            let entry = match self.entries.get_mut(index) {
                Some(entry) => entry,
                None => continue,
            };
            if let Some(raw) = *entry {
                let rearm = poll.registry().reregister(
                    &mut ReadinessSource(&raw),
                    Token(index),
                    Interest::READABLE,
                );
                if let Err(e) = rearm {
                    // Descriptor sudah ditutup sejak rebuild
                    debug!("re-arm of entry {} failed: {}", index, e);
                    *entry = None;
                }
            }
        }

        match poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        let mut ready: Vec<usize> = self
            .events
            .iter()
            .filter(|event| event.is_readable())
            .map(|event| event.token().0)
            .filter(|&index| index < self.entries.len())
            .collect();
        ready.sort_unstable();
        ready.dedup();
        self.last_ready.extend_from_slice(&ready);
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_wait_requires_build() {
        let mut set = PollSet::with_capacity(4);
        assert!(set.wait(Duration::ZERO).is_err());
    }

    #[test]
    fn test_empty_set_times_out() {
        let mut set = PollSet::with_capacity(4);
        set.rebuild(std::iter::empty()).unwrap();
        assert_eq!(set.len(), 0);
        assert!(set.wait(Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_handles_keep_their_index() {
        let handles = [SocketHandle::invalid(), SocketHandle::invalid()];
        let mut set = PollSet::with_capacity(1);
        set.rebuild(handles.iter()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.wait(Duration::from_millis(10)).unwrap().is_empty());
    }

    #[test]
    fn test_level_semantics_after_rearm() {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        let socket_a = socket2::Socket::from(a);
        let mut socket_b = socket2::Socket::from(b);
        let handles = [SocketHandle::from(socket_a)];

        let mut set = PollSet::with_capacity(1);
        set.rebuild(handles.iter()).unwrap();
        assert!(set.wait(Duration::ZERO).unwrap().is_empty());

        socket_b.write_all(b"x").unwrap();
        assert_eq!(set.wait(Duration::from_millis(500)).unwrap(), vec![0]);

        // Data belum dibaca: harus dilaporkan lagi
        assert_eq!(set.wait(Duration::from_millis(500)).unwrap(), vec![0]);
    }

    #[test]
    fn test_idle_entry_stays_armed() {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        let (c, d) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer_b = socket2::Socket::from(b);
        let mut writer_d = socket2::Socket::from(d);
        let handles = [
            SocketHandle::from(socket2::Socket::from(a)),
            SocketHandle::from(socket2::Socket::from(c)),
        ];

        let mut set = PollSet::with_capacity(2);
        set.rebuild(handles.iter()).unwrap();

        writer_b.write_all(b"x").unwrap();
        assert_eq!(set.wait(Duration::from_millis(500)).unwrap(), vec![0]);

        // Entry 1 tidak di-arm ulang, tapi data baru tetap terlihat
        writer_d.write_all(b"y").unwrap();
        assert_eq!(set.wait(Duration::from_millis(500)).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_peer_close_is_readable() {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        let handles = [SocketHandle::from(socket2::Socket::from(a))];

        let mut set = PollSet::with_capacity(1);
        set.rebuild(handles.iter()).unwrap();
        drop(b);
        assert_eq!(set.wait(Duration::from_millis(500)).unwrap(), vec![0]);
    }

    #[test]
    fn test_bound_tcp_socket_is_not_ready() {
        // Bind tanpa listen: kernel hanya melaporkan hang-up
        let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::STREAM, None)
            .unwrap();
        let local: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
        socket.bind(&local.into()).unwrap();
        let handles = [SocketHandle::from(socket)];

        let mut set = PollSet::with_capacity(1);
        set.rebuild(handles.iter()).unwrap();
        assert!(set.wait(Duration::ZERO).unwrap().is_empty());
        assert!(set.wait(Duration::from_millis(50)).unwrap().is_empty());
    }
}
