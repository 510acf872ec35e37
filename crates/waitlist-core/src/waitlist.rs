//! The signup orchestrator.
//!
//! One request, one call to [`Waitlist::signup`]: validate, check membership,
//! write to the first usable store, fire the notification, report the
//! outcome. No state is kept across requests — the only shared mutable
//! resource is the store itself.

use crate::{
  email::EmailAddress,
  error::Error,
  notify::Notifier,
  record::SignupRecord,
  store::SignupStore,
};

// ─── Policy and outcome types ────────────────────────────────────────────────

/// What to do when the primary store is unavailable or failing.
///
/// A deployment picks exactly one policy; the two are never blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutagePolicy {
  /// Silently fall back to the secondary store and still report success.
  Degrade,
  /// Report the outage instead of falling back; no fallback write happens.
  FailClosed,
}

/// The result of a valid signup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
  /// A new record was durably written. `total` is the store's count read
  /// immediately after the write; under concurrent signups it may be off by
  /// one, which is accepted.
  Joined { total: u64 },
  /// The address was already on the waitlist. Not an error: no write, no
  /// duplicate notification.
  AlreadyJoined,
  /// No usable store (or the policy forbids falling back).
  Unavailable,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// The request-level core, parameterized by injected capabilities.
///
/// `primary` is the remote document store (absent in fallback-only
/// deployments); `fallback` is the flat-file or in-memory store tried when
/// the primary is unusable.
pub struct Waitlist<P, F, N> {
  primary:  Option<P>,
  fallback: F,
  notifier: N,
  policy:   OutagePolicy,
}

impl<P, F, N> Waitlist<P, F, N>
where
  P: SignupStore,
  F: SignupStore,
  N: Notifier,
{
  pub fn new(primary: Option<P>, fallback: F, notifier: N, policy: OutagePolicy) -> Self {
    Self { primary, fallback, notifier, policy }
  }

  /// Handle one signup.
  ///
  /// `Err` covers input rejections only. Store and notifier failures are
  /// absorbed here and reported through [`SignupOutcome`]; no collaborator
  /// error escapes this method.
  pub async fn signup(
    &self,
    raw_email: &str,
    source_ip: &str,
  ) -> Result<SignupOutcome, Error> {
    let email = EmailAddress::parse(raw_email)?;

    if let Some(primary) = &self.primary {
      match self.try_store(primary, &email, source_ip).await {
        Ok(outcome) => return Ok(self.finish(&email, outcome).await),
        Err(error) => {
          tracing::warn!(%email, %error, "primary store unusable");
        }
      }
    }

    if self.policy == OutagePolicy::FailClosed {
      return Ok(SignupOutcome::Unavailable);
    }

    match self.try_store(&self.fallback, &email, source_ip).await {
      Ok(outcome) => Ok(self.finish(&email, outcome).await),
      Err(error) => {
        tracing::error!(%email, %error, "fallback store unusable");
        Ok(SignupOutcome::Unavailable)
      }
    }
  }

  /// Existence check plus write against one store.
  ///
  /// The check and the write are one logical idempotent upsert, but they are
  /// not atomic: two concurrent requests for the same new address may both
  /// pass the check. The store's upsert-by-key semantics keep the final
  /// record single; the count read right after may be off by one.
  async fn try_store<S: SignupStore>(
    &self,
    store: &S,
    email: &EmailAddress,
    source_ip: &str,
  ) -> Result<SignupOutcome, S::Error> {
    if store.get(email).await?.is_some() {
      return Ok(SignupOutcome::AlreadyJoined);
    }

    let record = SignupRecord::new(email.clone(), source_ip);
    store.put(&record).await?;

    let total = match store.count().await {
      Ok(total) => total,
      Err(error) => {
        tracing::warn!(%email, %error, "count failed after write");
        0
      }
    };
    Ok(SignupOutcome::Joined { total })
  }

  /// Fire the notification for a fresh signup. Failures are logged and
  /// swallowed; the outcome passes through unchanged.
  async fn finish(&self, email: &EmailAddress, outcome: SignupOutcome) -> SignupOutcome {
    if let SignupOutcome::Joined { total } = outcome
      && let Err(error) = self.notifier.notify(email, total).await
    {
      tracing::warn!(%email, %error, "failed to send signup notification");
    }
    outcome
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
