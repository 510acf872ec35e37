//! Access-token providers for the Google APIs.
//!
//! Two deployment flavours exist: an explicit OAuth access token handed in
//! through configuration, and the ambient service identity exposed by the
//! GCE/Cloud Functions metadata server. Both sit behind [`TokenProvider`] so
//! the store and the notifier never know which one is in play.

use std::{
  future::Future,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use serde::Deserialize;

use crate::Result;

const METADATA_TOKEN_URL: &str =
  "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// An opaque credential capability: yields a usable bearer token or an error
/// meaning "service unavailable".
pub trait TokenProvider: Send + Sync {
  fn access_token(&self) -> impl Future<Output = Result<String>> + Send + '_;
}

// ─── Static token ────────────────────────────────────────────────────────────

/// A fixed OAuth access token from configuration or the environment.
///
/// Token refresh is the operator's concern (re-deploy or rotate the config);
/// this provider never talks to the network.
#[derive(Clone)]
pub struct StaticTokenProvider {
  token: String,
}

impl StaticTokenProvider {
  pub fn new(token: impl Into<String>) -> Self {
    Self { token: token.into() }
  }
}

impl TokenProvider for StaticTokenProvider {
  async fn access_token(&self) -> Result<String> {
    Ok(self.token.clone())
  }
}

// ─── Metadata server ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MetadataToken {
  access_token: String,
  expires_in:   u64,
}

#[derive(Clone)]
struct CachedToken {
  token:      String,
  expires_at: Instant,
}

/// Ambient service identity via the GCE metadata server.
///
/// Tokens are cached until shortly before their reported expiry. Cloning is
/// cheap; clones share the cache.
#[derive(Clone)]
pub struct MetadataTokenProvider {
  http:  reqwest::Client,
  url:   String,
  cache: Arc<Mutex<Option<CachedToken>>>,
}

impl MetadataTokenProvider {
  pub fn new(http: reqwest::Client) -> Self {
    Self {
      http,
      url: METADATA_TOKEN_URL.to_string(),
      cache: Arc::new(Mutex::new(None)),
    }
  }

  fn cached(&self) -> Option<String> {
    let cache = self.cache.lock().expect("token cache lock");
    cache
      .as_ref()
      .filter(|c| c.expires_at > Instant::now())
      .map(|c| c.token.clone())
  }
}

impl TokenProvider for MetadataTokenProvider {
  async fn access_token(&self) -> Result<String> {
    if let Some(token) = self.cached() {
      return Ok(token);
    }

    let response: MetadataToken = self
      .http
      .get(&self.url)
      .header("Metadata-Flavor", "Google")
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    let expires_at = Instant::now()
      + Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
    *self.cache.lock().expect("token cache lock") = Some(CachedToken {
      token: response.access_token.clone(),
      expires_at,
    });
    Ok(response.access_token)
  }
}

// ─── Runtime selection ───────────────────────────────────────────────────────

/// The provider actually wired in at startup, chosen by configuration.
#[derive(Clone)]
pub enum GcpTokenProvider {
  Static(StaticTokenProvider),
  Metadata(MetadataTokenProvider),
}

impl TokenProvider for GcpTokenProvider {
  async fn access_token(&self) -> Result<String> {
    match self {
      Self::Static(p) => p.access_token().await,
      Self::Metadata(p) => p.access_token().await,
    }
  }
}
