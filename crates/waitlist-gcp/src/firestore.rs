//! [`FirestoreStore`] — the Firestore REST implementation of [`SignupStore`].
//!
//! Documents live in the `waitlist` collection, keyed by the normalized
//! email, so a repeated `put` of the same address lands on the same document
//! (last write wins, no duplicates).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use waitlist_core::{
  email::EmailAddress,
  record::SignupRecord,
  store::{SignupStore, sort_newest_first},
};

use crate::{Error, Result, auth::TokenProvider};

const COLLECTION: &str = "waitlist";
const PAGE_SIZE: u32 = 300;

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StringValue {
  #[serde(rename = "stringValue")]
  string_value: String,
}

#[derive(Deserialize, Default)]
struct DocumentFields {
  email:      Option<StringValue>,
  ip:         Option<StringValue>,
  created_at: Option<StringValue>,
}

#[derive(Deserialize)]
struct Document {
  #[serde(default)]
  fields:      DocumentFields,
  #[serde(rename = "createTime")]
  create_time: Option<DateTime<Utc>>,
  #[serde(rename = "updateTime")]
  update_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ListDocumentsResponse {
  #[serde(default)]
  documents:       Vec<Document>,
  #[serde(rename = "nextPageToken")]
  next_page_token: Option<String>,
}

fn encode_fields(record: &SignupRecord) -> serde_json::Value {
  json!({
    "fields": {
      "email":      { "stringValue": record.email.as_str() },
      "ip":         { "stringValue": record.source_ip },
      "created_at": { "stringValue": record.created_at.to_rfc3339() },
    }
  })
}

fn decode_document(doc: Document) -> Result<SignupRecord> {
  let email = doc
    .fields
    .email
    .ok_or_else(|| Error::MalformedDocument("missing email field".to_string()))?;

  let created_at = match doc.fields.created_at {
    Some(raw) => DateTime::parse_from_rfc3339(&raw.string_value)
      .map_err(|e| Error::MalformedDocument(format!("bad created_at: {e}")))?
      .with_timezone(&Utc),
    // Old documents predate the created_at field; the store's own create
    // time is the next best thing.
    None => doc
      .create_time
      .ok_or_else(|| Error::MalformedDocument("no usable timestamp".to_string()))?,
  };

  Ok(SignupRecord {
    email: EmailAddress::normalized(&email.string_value),
    created_at,
    source_ip: doc
      .fields
      .ip
      .map(|v| v.string_value)
      .unwrap_or_else(|| waitlist_core::record::UNKNOWN_IP.to_string()),
    server_timestamp: doc.update_time,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A waitlist store backed by a hosted Firestore database.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct FirestoreStore<T> {
  http:          reqwest::Client,
  documents_url: String,
  token:         T,
}

impl<T: TokenProvider> FirestoreStore<T> {
  pub fn new(project_id: &str, http: reqwest::Client, token: T) -> Self {
    Self {
      http,
      documents_url: format!(
        "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents"
      ),
      token,
    }
  }

  fn collection_url(&self) -> String {
    format!("{}/{}", self.documents_url, COLLECTION)
  }

  fn document_url(&self, email: &EmailAddress) -> String {
    format!("{}/{}/{}", self.documents_url, COLLECTION, email.as_str())
  }

  /// Full enumeration of the collection, paged. Documents that fail to
  /// decode are skipped with a warning rather than poisoning the whole read.
  async fn fetch_all(&self) -> Result<Vec<SignupRecord>> {
    let token = self.token.access_token().await?;
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut request = self
        .http
        .get(self.collection_url())
        .bearer_auth(&token)
        .query(&[("pageSize", PAGE_SIZE.to_string())]);
      if let Some(t) = &page_token {
        request = request.query(&[("pageToken", t.as_str())]);
      }

      let page: ListDocumentsResponse = request
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

      for doc in page.documents {
        match decode_document(doc) {
          Ok(record) => records.push(record),
          Err(error) => tracing::warn!(%error, "skipping undecodable waitlist document"),
        }
      }

      page_token = page.next_page_token;
      if page_token.is_none() {
        break;
      }
    }

    Ok(records)
  }
}

impl<T: TokenProvider + 'static> SignupStore for FirestoreStore<T> {
  type Error = Error;

  async fn get(&self, email: &EmailAddress) -> Result<Option<SignupRecord>> {
    let token = self.token.access_token().await?;
    let response = self
      .http
      .get(self.document_url(email))
      .bearer_auth(token)
      .send()
      .await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }

    let doc: Document = response.error_for_status()?.json().await?;
    Ok(Some(decode_document(doc)?))
  }

  async fn put(&self, record: &SignupRecord) -> Result<()> {
    let token = self.token.access_token().await?;
    self
      .http
      .patch(self.document_url(&record.email))
      .bearer_auth(token)
      .json(&encode_fields(record))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  async fn count(&self) -> Result<u64> {
    Ok(self.fetch_all().await?.len() as u64)
  }

  async fn list_all(&self) -> Result<Vec<SignupRecord>> {
    let mut records = self.fetch_all().await?;
    sort_newest_first(&mut records);
    Ok(records)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn doc(value: serde_json::Value) -> Document {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn encode_uses_string_values() {
    let record = SignupRecord::new(
      EmailAddress::parse("a@b.co").unwrap(),
      "203.0.113.9",
    );
    let value = encode_fields(&record);
    assert_eq!(value["fields"]["email"]["stringValue"], "a@b.co");
    assert_eq!(value["fields"]["ip"]["stringValue"], "203.0.113.9");
    assert!(value["fields"]["created_at"]["stringValue"].is_string());
  }

  #[test]
  fn decode_roundtrips_encode() {
    let record = SignupRecord::new(
      EmailAddress::parse("a@b.co").unwrap(),
      "203.0.113.9",
    );
    let mut wire = encode_fields(&record);
    wire["updateTime"] = serde_json::json!("2024-06-01T12:00:00Z");

    let decoded = decode_document(doc(wire)).unwrap();
    assert_eq!(decoded.email, record.email);
    assert_eq!(decoded.source_ip, record.source_ip);
    assert_eq!(decoded.created_at, record.created_at);
    assert!(decoded.server_timestamp.is_some());
  }

  #[test]
  fn decode_missing_email_is_an_error() {
    let err = decode_document(doc(json!({
      "fields": { "ip": { "stringValue": "unknown" } },
      "createTime": "2024-01-01T00:00:00Z",
    })))
    .unwrap_err();
    assert!(matches!(err, Error::MalformedDocument(_)));
  }

  #[test]
  fn decode_falls_back_to_create_time() {
    let decoded = decode_document(doc(json!({
      "fields": { "email": { "stringValue": "A@B.co" } },
      "createTime": "2024-01-01T00:00:00Z",
    })))
    .unwrap();
    assert_eq!(decoded.email.as_str(), "a@b.co");
    assert_eq!(decoded.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    assert_eq!(decoded.source_ip, "unknown");
  }
}
