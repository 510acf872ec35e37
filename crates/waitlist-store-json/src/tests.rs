//! Tests for `JsonStore` against a temporary directory.

use chrono::TimeZone as _;
use waitlist_core::{EmailAddress, SignupRecord, store::SignupStore};

use crate::JsonStore;

fn record(email: &str) -> SignupRecord {
  SignupRecord::new(EmailAddress::parse(email).unwrap(), "203.0.113.9")
}

fn store_in(dir: &tempfile::TempDir) -> JsonStore {
  JsonStore::new(dir.path().join("waitlist.json"))
}

// ─── Lenient serving-path reads ──────────────────────────────────────────────

#[tokio::test]
async fn missing_file_reads_as_empty() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);

  assert_eq!(store.count().await.unwrap(), 0);
  assert!(store.list_all().await.unwrap().is_empty());
  assert!(
    store
      .get(&EmailAddress::parse("a@b.co").unwrap())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn malformed_file_reads_as_empty() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);
  std::fs::write(store.path(), "definitely not json").unwrap();

  assert_eq!(store.count().await.unwrap(), 0);
  assert!(store.list_all().await.unwrap().is_empty());
}

// ─── Writes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_then_get_roundtrips() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);

  let original = record("a@b.co");
  store.put(&original).await.unwrap();

  let fetched = store
    .get(&EmailAddress::parse("a@b.co").unwrap())
    .await
    .unwrap()
    .expect("record present");
  assert_eq!(fetched, original);
}

#[tokio::test]
async fn put_same_key_does_not_duplicate() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);

  store.put(&record("a@b.co")).await.unwrap();
  store.put(&record("a@b.co")).await.unwrap();
  assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn put_overwrites_malformed_file() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);
  std::fs::write(store.path(), "[{\"broken\":").unwrap();

  store.put(&record("a@b.co")).await.unwrap();
  assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn written_file_is_a_json_array() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);
  store.put(&record("a@b.co")).await.unwrap();

  let value: serde_json::Value =
    serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
  let entries = value.as_array().expect("array payload");
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0]["email"], "a@b.co");
  assert_eq!(entries[0]["ip"], "203.0.113.9");
  assert!(entries[0].get("created_at").is_some());
}

// ─── Legacy flat files ───────────────────────────────────────────────────────

const LEGACY_FILE: &str = r#"[
  {"email":"old@user.com","timestamp":"2024-01-01T00:00:00Z","ip":"1.2.3.4"},
  {"email":"older@user.com","timestamp":"2023-06-01T08:00:00","ip":"unknown"}
]"#;

#[tokio::test]
async fn serving_path_reads_legacy_entries() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);
  std::fs::write(store.path(), LEGACY_FILE).unwrap();

  assert_eq!(store.count().await.unwrap(), 2);
  let fetched = store
    .get(&EmailAddress::parse("old@user.com").unwrap())
    .await
    .unwrap()
    .expect("legacy record present");
  assert_eq!(fetched.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
  assert_eq!(fetched.source_ip, "1.2.3.4");
}

#[tokio::test]
async fn put_preserves_legacy_entries() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);
  std::fs::write(store.path(), LEGACY_FILE).unwrap();

  store.put(&record("new@user.com")).await.unwrap();

  assert_eq!(store.count().await.unwrap(), 3);
  let reread = JsonStore::read_strict(store.path()).await.unwrap();
  assert_eq!(reread.len(), 3);
}

#[tokio::test]
async fn read_strict_reads_legacy_entries() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waitlist.json");
  std::fs::write(&path, LEGACY_FILE).unwrap();

  let records = JsonStore::read_strict(&path).await.unwrap();
  assert_eq!(records.len(), 2);
  assert_eq!(records[0].email.as_str(), "old@user.com");
  // Offset-free timestamps are taken as UTC.
  assert_eq!(
    records[1].created_at,
    chrono::Utc.with_ymd_and_hms(2023, 6, 1, 8, 0, 0).unwrap()
  );
}

// ─── Ordering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_all_is_newest_first() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);

  let mut older = record("older@example.com");
  older.created_at = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
  let mut newer = record("newer@example.com");
  newer.created_at = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

  store.put(&older).await.unwrap();
  store.put(&newer).await.unwrap();

  let all = store.list_all().await.unwrap();
  assert_eq!(all[0].email.as_str(), "newer@example.com");
  assert_eq!(all[1].email.as_str(), "older@example.com");
}

// ─── Strict reads for migration ──────────────────────────────────────────────

#[tokio::test]
async fn read_strict_missing_file_is_empty() {
  let dir = tempfile::tempdir().unwrap();
  let records = JsonStore::read_strict(dir.path().join("nope.json"))
    .await
    .unwrap();
  assert!(records.is_empty());
}

#[tokio::test]
async fn read_strict_rejects_non_array_payload() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("waitlist.json");
  std::fs::write(&path, "{\"email\":\"a@b.co\"}").unwrap();

  let err = JsonStore::read_strict(&path).await.unwrap_err();
  assert!(matches!(err, crate::Error::Malformed { .. }));
}

#[tokio::test]
async fn read_strict_reads_what_put_wrote() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir);
  store.put(&record("a@b.co")).await.unwrap();
  store.put(&record("c@d.co")).await.unwrap();

  let records = JsonStore::read_strict(store.path()).await.unwrap();
  assert_eq!(records.len(), 2);
}
