//! One-shot replay of flat-file records into a durable store.
//!
//! A degenerate case of the orchestrator's idempotent insert, run without an
//! HTTP trigger: every record not already present in the destination is
//! written through the same upsert path; existing keys are skipped.

use thiserror::Error;

use crate::{record::SignupRecord, store::SignupStore};

/// Counts reported by [`migrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
  pub migrated: u64,
  pub skipped:  u64,
}

/// A destination-store failure during migration.
///
/// Unlike the serving path, migration fails loudly: a broken destination
/// aborts the run rather than silently under-migrating.
#[derive(Debug, Error)]
pub enum MigrateError<E: std::error::Error> {
  #[error("lookup of {email:?} in destination store failed: {source}")]
  Lookup { email: String, source: E },

  #[error("write of {email:?} to destination store failed: {source}")]
  Write { email: String, source: E },
}

/// Replay `records` into `dest`, skipping keys that already exist.
///
/// Idempotent: re-running over the same input migrates zero. Records whose
/// email is empty are skipped outright.
pub async fn migrate<D: SignupStore>(
  records: &[SignupRecord],
  dest: &D,
) -> Result<MigrationReport, MigrateError<D::Error>> {
  let mut report = MigrationReport::default();

  for record in records {
    let email = &record.email;
    if email.as_str().is_empty() {
      report.skipped += 1;
      continue;
    }

    let existing = dest.get(email).await.map_err(|source| MigrateError::Lookup {
      email: email.as_str().to_string(),
      source,
    })?;
    if existing.is_some() {
      tracing::debug!(%email, "already migrated, skipping");
      report.skipped += 1;
      continue;
    }

    dest.put(record).await.map_err(|source| MigrateError::Write {
      email: email.as_str().to_string(),
      source,
    })?;
    tracing::info!(%email, "migrated");
    report.migrated += 1;
  }

  Ok(report)
}
