//! [`JsonStore`] — the flat-file implementation of [`SignupStore`].

use std::path::{Path, PathBuf};

use waitlist_core::{
  email::EmailAddress,
  record::SignupRecord,
  store::{SignupStore, sort_newest_first},
};

use crate::{Error, Result};

/// A waitlist store backed by a single JSON file holding the full array of
/// records.
///
/// Reads on the serving path are lenient: a missing or malformed file yields
/// an empty collection, never an error. The migration utility uses
/// [`JsonStore::read_strict`] instead, which treats a non-array payload as a
/// hard input error.
#[derive(Clone)]
pub struct JsonStore {
  path: PathBuf,
}

impl JsonStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Lenient read for the serving path. Missing file → empty; undecodable
  /// file → empty, logged at warn.
  async fn load(&self) -> Vec<SignupRecord> {
    let bytes = match tokio::fs::read(&self.path).await {
      Ok(bytes) => bytes,
      Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
      Err(error) => {
        tracing::warn!(path = %self.path.display(), %error, "cannot read waitlist file");
        return Vec::new();
      }
    };
    match serde_json::from_slice(&bytes) {
      Ok(records) => records,
      Err(error) => {
        tracing::warn!(path = %self.path.display(), %error, "malformed waitlist file");
        Vec::new()
      }
    }
  }

  /// Strict read for the migration utility. Missing file means "nothing to
  /// migrate"; anything else that is not a record array is an error.
  pub async fn read_strict(path: impl AsRef<Path>) -> Result<Vec<SignupRecord>> {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
      Ok(bytes) => bytes,
      Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => return Err(Error::Io { path: path.to_path_buf(), source }),
    };
    serde_json::from_slice(&bytes).map_err(|source| Error::Malformed {
      path: path.to_path_buf(),
      source,
    })
  }

  async fn save(&self, records: &[SignupRecord]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(records).map_err(|source| Error::Malformed {
      path: self.path.clone(),
      source,
    })?;
    tokio::fs::write(&self.path, bytes)
      .await
      .map_err(|source| Error::Io { path: self.path.clone(), source })
  }
}

impl SignupStore for JsonStore {
  type Error = Error;

  async fn get(&self, email: &EmailAddress) -> Result<Option<SignupRecord>> {
    let records = self.load().await;
    Ok(records.into_iter().find(|r| &r.email == email))
  }

  async fn put(&self, record: &SignupRecord) -> Result<()> {
    // Whole-file read-modify-write. Concurrent writers can lose updates;
    // accepted for the fallback path only.
    let mut records = self.load().await;
    match records.iter_mut().find(|r| r.email == record.email) {
      Some(existing) => *existing = record.clone(),
      None => records.push(record.clone()),
    }
    self.save(&records).await
  }

  async fn count(&self) -> Result<u64> {
    Ok(self.load().await.len() as u64)
  }

  async fn list_all(&self) -> Result<Vec<SignupRecord>> {
    let mut records = self.load().await;
    sort_newest_first(&mut records);
    Ok(records)
  }
}
