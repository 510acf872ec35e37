//! The signup record — one per unique email address.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::email::EmailAddress;

/// Recorded when the client address cannot be derived from request metadata.
pub const UNKNOWN_IP: &str = "unknown";

/// One waitlist signup. Created exactly once per normalized email address and
/// never mutated or deleted afterwards.
///
/// Serialized as `email`, `created_at`, `ip`, `timestamp`. Deserialization
/// also accepts the legacy flat-file shape, which carries only `email`,
/// `timestamp`, `ip`: when `created_at` is absent the entry's `timestamp`
/// stands in for it. Timestamps are read leniently — offset-free ISO 8601
/// strings (as older deployments wrote them) are taken as UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignupRecord {
  /// Normalized address; doubles as the store key.
  pub email: EmailAddress,

  /// Set at first insertion, immutable afterwards.
  pub created_at: DateTime<Utc>,

  /// Best-effort client address, [`UNKNOWN_IP`] if not derivable.
  #[serde(rename = "ip")]
  pub source_ip: String,

  /// Store-assigned timestamp, when the backend provides one.
  #[serde(rename = "timestamp", skip_serializing_if = "Option::is_none")]
  pub server_timestamp: Option<DateTime<Utc>>,
}

fn default_ip() -> String {
  UNKNOWN_IP.to_string()
}

impl SignupRecord {
  /// Build a new record stamped with the current time.
  pub fn new(email: EmailAddress, source_ip: impl Into<String>) -> Self {
    Self {
      email,
      created_at: Utc::now(),
      source_ip: source_ip.into(),
      server_timestamp: None,
    }
  }
}

// ─── Deserialization ─────────────────────────────────────────────────────────

/// A timestamp read leniently: RFC 3339, or a naive ISO 8601 string assumed
/// to be UTC.
struct Timestamp(DateTime<Utc>);

impl<'de> Deserialize<'de> for Timestamp {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| dt.with_timezone(&Utc))
      .or_else(|_| raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()))
      .map(Self)
      .map_err(|_| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
  }
}

#[derive(Deserialize)]
struct WireRecord {
  email:            EmailAddress,
  #[serde(default)]
  created_at:       Option<Timestamp>,
  #[serde(rename = "ip", default = "default_ip")]
  source_ip:        String,
  #[serde(rename = "timestamp", default)]
  server_timestamp: Option<Timestamp>,
}

impl<'de> Deserialize<'de> for SignupRecord {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let wire = WireRecord::deserialize(deserializer)?;
    let created_at = match (&wire.created_at, &wire.server_timestamp) {
      (Some(created), _) => created.0,
      // Legacy entries carry only `timestamp`.
      (None, Some(stamped)) => stamped.0,
      (None, None) => return Err(serde::de::Error::missing_field("created_at")),
    };
    Ok(Self {
      email: wire.email,
      created_at,
      source_ip: wire.source_ip,
      server_timestamp: wire.server_timestamp.map(|t| t.0),
    })
  }
}
