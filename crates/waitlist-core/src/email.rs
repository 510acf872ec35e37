//! Email address validation and normalization.
//!
//! Validation is purely syntactic — no DNS lookup, no deliverability check.
//! The accepted shape is `local-part@domain.tld` where the local part is one
//! or more of letters, digits and `. _ % + -`, the domain is dot-separated
//! labels of letters/digits/hyphens, and the TLD is at least two letters.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
    .expect("email regex is valid")
});

/// `true` iff `address` matches the address grammar. Pure and total.
pub fn is_valid(address: &str) -> bool {
  EMAIL_RE.is_match(address)
}

/// A normalized (trimmed, lower-cased) email address.
///
/// The normalized form is the identity of a signup: it is the store key, so
/// `"  USER@Example.COM "` and `"user@example.com"` name the same record.
///
/// [`EmailAddress::parse`] is the validated constructor used on the request
/// path. Deserialization (reading records back from a store) normalizes but
/// does not re-validate, so records written by earlier deployments are never
/// dropped on read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
  /// Normalize and validate `raw`.
  ///
  /// Distinguishes an empty submission from a malformed one so callers can
  /// report the two cases separately.
  pub fn parse(raw: &str) -> Result<Self, Error> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
      return Err(Error::EmailMissing);
    }
    if !is_valid(&normalized) {
      return Err(Error::EmailInvalid(normalized));
    }
    Ok(Self(normalized))
  }

  /// Normalize without validating.
  ///
  /// Used when reading records back from a store, where dropping an entry
  /// over a grammar mismatch would lose data.
  pub fn normalized(raw: &str) -> Self {
    Self(normalize(raw))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for EmailAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for EmailAddress {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

impl<'de> Deserialize<'de> for EmailAddress {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(Self::normalized(&raw))
  }
}

fn normalize(raw: &str) -> String {
  raw.trim().to_lowercase()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
