//! Reactor configuration

/// Backlog dipakai oleh `TcpListener::start` jika caller tidak punya preferensi
pub const DEFAULT_BACKLOG: u32 = 10;

/// Timeout default untuk `ConnectionManager::update` dan `TcpListener::poll_accept`
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Connection manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Backlog untuk listener yang dibuat lewat `add_listener`
    pub backlog: u32,
    /// Minimum kapasitas buffer readiness events
    pub events_capacity: usize,
    /// TCP_NODELAY untuk koneksi yang di-accept listener milik manager
    pub nodelay: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            events_capacity: 1024,
            nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.backlog, 10);
        assert_eq!(config.events_capacity, 1024);
        assert!(config.nodelay);
    }
}
