//! Core module: socket ownership, address values, error capture
//!
//! Prinsip desain:
//! - Ownership: descriptor hanya punya satu pemilik, release tepat sekali
//! - Immutable values: `Address` tidak berubah setelah dibuat
//! - Non-throwing: kegagalan menjadi data (`SocketError`, `ResolveError`)

mod address;
mod error;
mod socket;

pub use address::{
    create_address, create_host_address, try_create_address, try_create_host_address, Address,
    Family, ResolvedString,
};
pub use error::{ResolveError, SocketError};
pub use socket::{IpVersion, Protocol, SocketHandle};
