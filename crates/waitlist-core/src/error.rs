//! Error types for `waitlist-core`.

use thiserror::Error;

/// Input rejections surfaced to the caller of
/// [`Waitlist::signup`](crate::waitlist::Waitlist::signup).
///
/// Store and notifier failures are never raised through this type; they are
/// absorbed by the orchestrator and reported as
/// [`SignupOutcome`](crate::waitlist::SignupOutcome) variants instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  /// The submitted email trims to the empty string.
  #[error("email address is required")]
  EmailMissing,

  /// The submitted email does not match the address grammar.
  #[error("invalid email address format: {0:?}")]
  EmailInvalid(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
