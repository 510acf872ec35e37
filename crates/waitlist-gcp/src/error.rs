//! Error type for `waitlist-gcp`.
//!
//! Every failure from the remote collaborators lands here; the orchestrator
//! sees these as typed store/notifier errors, never as a panic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("credential provider unavailable: {0}")]
  Credentials(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("malformed document: {0}")]
  MalformedDocument(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
