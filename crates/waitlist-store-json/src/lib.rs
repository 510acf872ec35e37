//! Flat-file JSON backend for the waitlist store.
//!
//! One file, one serialized array of records. `put` is
//! read-modify-write-whole-file, which is not safe under concurrent writers —
//! this backend is the last-resort fallback for low-traffic and local
//! scenarios, never the primary path.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::JsonStore;

#[cfg(test)]
mod tests;
