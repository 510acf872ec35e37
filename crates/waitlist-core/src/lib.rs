//! Core types and trait definitions for the Trinity Engine waitlist.
//!
//! This crate is deliberately free of HTTP and filesystem dependencies.
//! Storage backends and the notification dispatcher are injected behind the
//! [`SignupStore`](store::SignupStore) and [`Notifier`](notify::Notifier)
//! capability traits; the [`Waitlist`](waitlist::Waitlist) orchestrator is
//! the only piece that wires them together.

pub mod email;
pub mod error;
pub mod migrate;
pub mod notify;
pub mod record;
pub mod store;
pub mod waitlist;

pub use email::EmailAddress;
pub use error::{Error, Result};
pub use record::SignupRecord;
pub use waitlist::{OutagePolicy, SignupOutcome, Waitlist};
