//! Platform shim
//!
//! Satu implementasi per build target. State machines di `network` tidak
//! pernah branch berdasarkan platform; semua system call spesifik OS
//! (resolver, raw descriptor, readiness source) ada di sini.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use unix::*;
