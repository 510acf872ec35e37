//! The `SignupStore` trait and the in-memory implementation.
//!
//! The trait is implemented by storage backends (`waitlist-gcp` for the
//! hosted document store, `waitlist-store-json` for the flat-file fallback).
//! The orchestrator depends on this abstraction, not on any concrete backend.

use std::{
  convert::Infallible,
  future::Future,
  sync::{Arc, Mutex},
};

use crate::{email::EmailAddress, record::SignupRecord};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a waitlist storage backend.
///
/// Every operation is idempotent or safely retryable. Backends convert their
/// own transport and decode failures into `Self::Error`; a raw panic must
/// never cross this boundary.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (tokio with `axum`).
pub trait SignupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Exact-key lookup by normalized email. `Ok(None)` means absent.
  fn get<'a>(
    &'a self,
    email: &'a EmailAddress,
  ) -> impl Future<Output = Result<Option<SignupRecord>, Self::Error>> + Send + 'a;

  /// Upsert keyed by the record's normalized email.
  ///
  /// Calling twice with the same key must not create a duplicate; the second
  /// write replaces the first (last write wins on the same key).
  fn put<'a>(
    &'a self,
    record: &'a SignupRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Total record count.
  ///
  /// Implementers may compute this by full enumeration; callers must not
  /// assume it is cheap or strongly consistent under concurrent writes.
  fn count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All records, newest first by `created_at`, with the email as a
  /// deterministic tie-break within one call.
  fn list_all(
    &self,
  ) -> impl Future<Output = Result<Vec<SignupRecord>, Self::Error>> + Send + '_;
}

/// Newest-first ordering shared by the backends.
pub fn sort_newest_first(records: &mut [SignupRecord]) {
  records.sort_by(|a, b| {
    b.created_at
      .cmp(&a.created_at)
      .then_with(|| a.email.cmp(&b.email))
  });
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// An in-memory store: the last-resort end of the fallback chain, and the
/// test double for everything above the storage layer.
///
/// Cloning is cheap — the record list is reference-counted.
#[derive(Clone, Default)]
pub struct MemoryStore {
  records: Arc<Mutex<Vec<SignupRecord>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SignupStore for MemoryStore {
  type Error = Infallible;

  async fn get(&self, email: &EmailAddress) -> Result<Option<SignupRecord>, Infallible> {
    let records = self.records.lock().expect("memory store lock");
    Ok(records.iter().find(|r| &r.email == email).cloned())
  }

  async fn put(&self, record: &SignupRecord) -> Result<(), Infallible> {
    let mut records = self.records.lock().expect("memory store lock");
    match records.iter_mut().find(|r| r.email == record.email) {
      Some(existing) => *existing = record.clone(),
      None => records.push(record.clone()),
    }
    Ok(())
  }

  async fn count(&self) -> Result<u64, Infallible> {
    let records = self.records.lock().expect("memory store lock");
    Ok(records.len() as u64)
  }

  async fn list_all(&self) -> Result<Vec<SignupRecord>, Infallible> {
    let mut records = self.records.lock().expect("memory store lock").clone();
    sort_newest_first(&mut records);
    Ok(records)
  }
}
