//! Session snapshots and their persistence.
//!
//! `SessionState` is what survives between operations: opaque cookie jars for
//! both realms, the validity flags, profile fields, the score cache and the
//! class period table. A `SessionStore` keeps one serialized snapshot per key.

pub mod state;
pub mod store;

pub use state::SessionState;
pub use store::{FileStore, MemoryStore, SessionStore};
