//! Google Cloud collaborators for the waitlist service.
//!
//! Holds the two external capabilities the core calls over the network: the
//! Firestore REST document store (primary [`SignupStore`] backend) and the
//! Gmail REST notifier. Both authenticate through the [`TokenProvider`]
//! capability, so the choice between an explicit OAuth token and the ambient
//! service identity is made once at startup, not re-derived per call.
//!
//! [`SignupStore`]: waitlist_core::store::SignupStore

pub mod auth;
pub mod error;
pub mod firestore;
pub mod gmail;

pub use auth::{GcpTokenProvider, MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use error::{Error, Result};
pub use firestore::FirestoreStore;
pub use gmail::GmailNotifier;
