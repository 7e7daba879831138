//! Ledger Backends
//!
//! `PostgresBackend` is the real thing. `MemoryBackend` keeps the ledger in
//! process so the runner can be exercised without a server; it is only
//! built for tests or with the `testing` feature.

pub mod core;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod postgres;

pub use core::*;
#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryBackend, MemoryState};
pub use postgres::PostgresBackend;
