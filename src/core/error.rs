//! Captured OS and resolver failures
//!
//! Tidak ada yang di-throw melewati API: state machines menyimpan
//! `SocketError` terakhir dan caller memeriksanya lewat `error()`.

use std::io;

use thiserror::Error;

/// Informasi error dari socket API (`{code, message}`)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct SocketError {
    pub code: i32,
    pub message: String,
}

impl SocketError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Sentinel "No error" untuk objek yang belum pernah gagal
    pub fn none() -> Self {
        Self::new(0, "No error")
    }

    /// Capture dari `io::Error` hasil system call
    pub fn from_io(err: &io::Error) -> Self {
        Self::new(err.raw_os_error().unwrap_or(-1), err.to_string())
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.code == 0
    }
}

impl Default for SocketError {
    fn default() -> Self {
        Self::none()
    }
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        Self::from_io(&err)
    }
}

/// Resolver failure: kode getaddrinfo/getnameinfo beserta pesannya
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("address resolution failed: {message} (code {code})")]
pub struct ResolveError {
    pub code: i32,
    pub message: String,
}

impl ResolveError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_sentinel() {
        let err = SocketError::none();
        assert!(err.is_none());
        assert_eq!(err.message, "No error");
        assert_eq!(SocketError::default(), err);
    }

    #[test]
    fn test_capture_os_error() {
        let io_err = io::Error::from_raw_os_error(libc::ECONNREFUSED);
        let err = SocketError::from_io(&io_err);
        assert_eq!(err.code, libc::ECONNREFUSED);
        assert!(!err.is_none());
        assert!(err.to_string().contains(&format!("code {}", libc::ECONNREFUSED)));
    }

    #[test]
    fn test_non_os_error_code() {
        let err = SocketError::from(io::Error::new(io::ErrorKind::Other, "custom"));
        assert_eq!(err.code, -1);
        assert_eq!(err.message, "custom");
    }
}
