//! The `Notifier` trait and the logging no-op implementation.

use std::{convert::Infallible, future::Future};

use crate::email::EmailAddress;

/// Best-effort notification of a new signup.
///
/// Implementations deliver one fixed-destination message per call. The
/// orchestrator swallows and logs every failure from this trait — a broken
/// mail capability must never change the outcome of the signup itself.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify<'a>(
    &'a self,
    email: &'a EmailAddress,
    total_count: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Notifier used when no mail capability is configured: logs the signup and
/// does nothing else.
#[derive(Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
  type Error = Infallible;

  async fn notify(&self, email: &EmailAddress, total_count: u64) -> Result<(), Infallible> {
    tracing::info!(%email, total_count, "notification skipped: no mail capability configured");
    Ok(())
  }
}
