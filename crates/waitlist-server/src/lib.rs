//! HTTP surface for the Trinity Engine waitlist.
//!
//! Exposes an axum [`Router`] with a single endpoint, `/api/waitlist`,
//! backed by any combination of [`SignupStore`] and [`Notifier`]
//! implementations. The response envelope is always
//! `{"success": bool, "message": string}` with permissive CORS headers, so
//! the browser widget on the marketing site can POST from anywhere.
//!
//! [`SignupStore`]: waitlist_core::store::SignupStore
//! [`Notifier`]: waitlist_core::notify::Notifier

use std::{net::SocketAddr, path::{Path, PathBuf}, sync::Arc};

use axum::{
  Json,
  Router,
  body::Body,
  extract::{ConnectInfo, Request, State},
  http::{HeaderName, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
  routing::any,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use waitlist_core::{
  notify::{Notifier, NullNotifier},
  record::UNKNOWN_IP,
  store::SignupStore,
  waitlist::{OutagePolicy, SignupOutcome, Waitlist},
};
use waitlist_gcp::{
  FirestoreStore, GcpTokenProvider, GmailNotifier, MetadataTokenProvider,
  StaticTokenProvider,
};

/// Requests larger than this are not waitlist signups.
const BODY_LIMIT: usize = 16 * 1024;

// ─── Configuration ────────────────────────────────────────────────────────────

/// How the Google APIs are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcpAuthMode {
  /// An explicit OAuth access token from `gcp_access_token` or the
  /// environment.
  Static,
  /// The ambient service identity from the metadata server (Cloud Functions,
  /// GCE).
  #[default]
  Metadata,
}

/// Runtime server configuration, deserialised from `config.toml` plus
/// `WAITLIST_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  /// The flat-file fallback store.
  #[serde(default = "default_store_path")]
  pub json_store_path:  PathBuf,
  /// What to do when the primary store is down. Pick one per deployment.
  #[serde(default = "default_policy")]
  pub outage_policy:    OutagePolicy,
  /// GCP project holding the Firestore database. Absent means fallback-only
  /// (local development).
  #[serde(default)]
  pub firestore_project: Option<String>,
  #[serde(default)]
  pub gcp_auth:         GcpAuthMode,
  #[serde(default)]
  pub gcp_access_token: Option<String>,
  /// Destination for signup notifications. Absent disables mail entirely.
  #[serde(default)]
  pub notify_to:        Option<String>,
}

fn default_host() -> String {
  "127.0.0.1".to_string()
}

fn default_port() -> u16 {
  8080
}

fn default_store_path() -> PathBuf {
  PathBuf::from("waitlist.json")
}

fn default_policy() -> OutagePolicy {
  OutagePolicy::Degrade
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot load configuration: {0}")]
  Load(#[from] config::ConfigError),

  #[error("gcp_auth = \"static\" requires gcp_access_token to be set")]
  MissingAccessToken,

  #[error("outage_policy = \"fail_closed\" requires firestore_project to be set")]
  FailClosedWithoutPrimary,
}

impl ServerConfig {
  /// Load from a TOML file (optional) layered under `WAITLIST_*` environment
  /// variables.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("WAITLIST"))
      .build()?;
    let cfg: Self = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.outage_policy == OutagePolicy::FailClosed && self.firestore_project.is_none() {
      return Err(ConfigError::FailClosedWithoutPrimary);
    }
    let needs_token = self.firestore_project.is_some() || self.notify_to.is_some();
    if needs_token && self.gcp_auth == GcpAuthMode::Static && self.gcp_access_token.is_none() {
      return Err(ConfigError::MissingAccessToken);
    }
    Ok(())
  }

  /// The credential capability selected by configuration, shared by the
  /// store and the notifier.
  pub fn token_provider(&self, http: &reqwest::Client) -> Result<GcpTokenProvider, ConfigError> {
    match self.gcp_auth {
      GcpAuthMode::Static => {
        let token = self
          .gcp_access_token
          .as_deref()
          .ok_or(ConfigError::MissingAccessToken)?;
        Ok(GcpTokenProvider::Static(StaticTokenProvider::new(token)))
      }
      GcpAuthMode::Metadata => Ok(GcpTokenProvider::Metadata(MetadataTokenProvider::new(
        http.clone(),
      ))),
    }
  }

  /// The primary store, if one is configured.
  pub fn primary_store(
    &self,
    http: &reqwest::Client,
  ) -> Result<Option<FirestoreStore<GcpTokenProvider>>, ConfigError> {
    let Some(project) = self.firestore_project.as_deref() else {
      return Ok(None);
    };
    let token = self.token_provider(http)?;
    Ok(Some(FirestoreStore::new(project, http.clone(), token)))
  }

  /// The notifier: Gmail when a destination is configured, logging otherwise.
  pub fn notifier(&self, http: &reqwest::Client) -> Result<AppNotifier, ConfigError> {
    let Some(to) = self.notify_to.as_deref() else {
      return Ok(AppNotifier::Null(NullNotifier));
    };
    let token = self.token_provider(http)?;
    Ok(AppNotifier::Gmail(GmailNotifier::new(to, http.clone(), token)))
  }
}

// ─── Notifier selection ──────────────────────────────────────────────────────

/// The notifier actually wired in at startup.
#[derive(Clone)]
pub enum AppNotifier {
  Gmail(GmailNotifier<GcpTokenProvider>),
  Null(NullNotifier),
}

impl Notifier for AppNotifier {
  type Error = waitlist_gcp::Error;

  async fn notify(
    &self,
    email: &waitlist_core::EmailAddress,
    total_count: u64,
  ) -> Result<(), Self::Error> {
    match self {
      Self::Gmail(n) => n.notify(email, total_count).await,
      Self::Null(n) => n.notify(email, total_count).await.map_err(|e| match e {}),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the handler.
pub struct AppState<P, F, N> {
  pub waitlist: Arc<Waitlist<P, F, N>>,
}

impl<P, F, N> Clone for AppState<P, F, N> {
  fn clone(&self) -> Self {
    Self { waitlist: Arc::clone(&self.waitlist) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the waitlist API.
pub fn router<P, F, N>(state: AppState<P, F, N>) -> Router
where
  P: SignupStore + 'static,
  F: SignupStore + 'static,
  N: Notifier + 'static,
{
  Router::new()
    .route("/api/waitlist", any(waitlist_handler::<P, F, N>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Response envelope ───────────────────────────────────────────────────────

/// Every response carries these, preflight or not.
fn cors_headers() -> [(HeaderName, HeaderValue); 4] {
  [
    (
      header::ACCESS_CONTROL_ALLOW_ORIGIN,
      HeaderValue::from_static("*"),
    ),
    (
      header::ACCESS_CONTROL_ALLOW_METHODS,
      HeaderValue::from_static("POST, OPTIONS"),
    ),
    (
      header::ACCESS_CONTROL_ALLOW_HEADERS,
      HeaderValue::from_static("Content-Type"),
    ),
    (
      header::CONTENT_TYPE,
      HeaderValue::from_static("application/json"),
    ),
  ]
}

fn envelope(status: StatusCode, success: bool, message: &str) -> Response {
  (
    status,
    cors_headers(),
    Json(json!({ "success": success, "message": message })),
  )
    .into_response()
}

// ─── Client address ──────────────────────────────────────────────────────────

/// First `X-Forwarded-For` hop, else the socket peer, else `"unknown"`.
fn client_ip(req: &Request<Body>) -> String {
  if let Some(forwarded) = req.headers().get("x-forwarded-for")
    && let Ok(value) = forwarded.to_str()
    && let Some(first) = value.split(',').next()
    && !first.trim().is_empty()
  {
    return first.trim().to_string();
  }
  req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip().to_string())
    .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

// ─── Handler ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SignupBody {
  #[serde(default)]
  email: String,
}

async fn waitlist_handler<P, F, N>(
  State(state): State<AppState<P, F, N>>,
  req: Request<Body>,
) -> Response
where
  P: SignupStore + 'static,
  F: SignupStore + 'static,
  N: Notifier + 'static,
{
  match req.method().as_str() {
    // Preflight: CORS headers, empty body.
    "OPTIONS" => (StatusCode::OK, cors_headers(), "").into_response(),
    "POST" => signup(state, req).await,
    _ => envelope(StatusCode::METHOD_NOT_ALLOWED, false, "Method not allowed"),
  }
}

async fn signup<P, F, N>(state: AppState<P, F, N>, req: Request<Body>) -> Response
where
  P: SignupStore + 'static,
  F: SignupStore + 'static,
  N: Notifier + 'static,
{
  let source_ip = client_ip(&req);

  let bytes = match axum::body::to_bytes(req.into_body(), BODY_LIMIT).await {
    Ok(bytes) => bytes,
    Err(error) => {
      tracing::error!(%error, "failed to read request body");
      return envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        false,
        "An error occurred. Please try again later.",
      );
    }
  };

  let body: SignupBody = match serde_json::from_slice(&bytes) {
    Ok(body) => body,
    Err(_) => return envelope(StatusCode::BAD_REQUEST, false, "Invalid request format"),
  };

  match state.waitlist.signup(&body.email, &source_ip).await {
    Ok(SignupOutcome::Joined { .. }) => envelope(
      StatusCode::OK,
      true,
      "Thank you for joining the waitlist! We'll notify you when Trinity Engine is ready.",
    ),
    Ok(SignupOutcome::AlreadyJoined) => {
      envelope(StatusCode::OK, true, "You are already on the waitlist!")
    }
    Ok(SignupOutcome::Unavailable) => envelope(
      StatusCode::SERVICE_UNAVAILABLE,
      false,
      "Service temporarily unavailable. Please try again later.",
    ),
    Err(waitlist_core::Error::EmailMissing) => {
      envelope(StatusCode::BAD_REQUEST, false, "Email address is required")
    }
    Err(waitlist_core::Error::EmailInvalid(_)) => {
      envelope(StatusCode::BAD_REQUEST, false, "Invalid email address format")
    }
  }
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use tower::ServiceExt as _;
  use waitlist_core::{EmailAddress, store::MemoryStore};

  fn test_state(
    primary: Option<MemoryStore>,
    fallback: MemoryStore,
    policy: OutagePolicy,
  ) -> AppState<MemoryStore, MemoryStore, NullNotifier> {
    AppState {
      waitlist: Arc::new(Waitlist::new(primary, fallback, NullNotifier, policy)),
    }
  }

  fn fallback_only(store: MemoryStore) -> AppState<MemoryStore, MemoryStore, NullNotifier> {
    test_state(None, store, OutagePolicy::Degrade)
  }

  async fn request(
    state: AppState<MemoryStore, MemoryStore, NullNotifier>,
    method: &str,
    headers: Vec<(&'static str, &str)>,
    body: &str,
  ) -> Response {
    let mut builder = axum::http::Request::builder()
      .method(method)
      .uri("/api/waitlist");
    for (name, value) in headers {
      builder = builder.header(name, value);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn assert_cors(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
    assert_eq!(headers["content-type"], "application/json");
  }

  // ── Method gate ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn options_preflight_is_empty_200_with_cors() {
    let resp = request(fallback_only(MemoryStore::new()), "OPTIONS", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_cors(&resp);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
  }

  #[tokio::test]
  async fn other_methods_are_405() {
    let resp = request(fallback_only(MemoryStore::new()), "GET", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_cors(&resp);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Method not allowed");
  }

  // ── Input validation ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn malformed_json_is_400() {
    let resp = request(
      fallback_only(MemoryStore::new()),
      "POST",
      vec![],
      "{not json",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Invalid request format");
  }

  #[tokio::test]
  async fn missing_email_field_is_400() {
    let resp = request(
      fallback_only(MemoryStore::new()),
      "POST",
      vec![],
      r#"{"name":"nobody"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Email address is required");
  }

  #[tokio::test]
  async fn invalid_email_is_400_and_writes_nothing() {
    let store = MemoryStore::new();
    let resp = request(
      fallback_only(store.clone()),
      "POST",
      vec![],
      r#"{"email":"not-an-email"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Invalid email address format");
    assert_eq!(store.count().await.unwrap(), 0);
  }

  // ── Signups ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn new_signup_is_recorded_normalized() {
    let store = MemoryStore::new();
    let resp = request(
      fallback_only(store.clone()),
      "POST",
      vec![("x-forwarded-for", "203.0.113.9, 10.0.0.1")],
      r#"{"email":"New@User.com"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_cors(&resp);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(
      body["message"],
      "Thank you for joining the waitlist! We'll notify you when Trinity Engine is ready."
    );

    let record = store
      .get(&EmailAddress::parse("new@user.com").unwrap())
      .await
      .unwrap()
      .expect("record created");
    // First forwarded-for hop wins.
    assert_eq!(record.source_ip, "203.0.113.9");
    assert_eq!(store.count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn duplicate_signup_is_200_already_on_waitlist() {
    let store = MemoryStore::new();
    let state = fallback_only(store.clone());

    request(state.clone(), "POST", vec![], r#"{"email":"user@example.com"}"#).await;
    let resp = request(
      state,
      "POST",
      vec![],
      r#"{"email":"  USER@Example.COM "}"#,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "You are already on the waitlist!");
    assert_eq!(store.count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn source_ip_defaults_to_unknown() {
    let store = MemoryStore::new();
    request(
      fallback_only(store.clone()),
      "POST",
      vec![],
      r#"{"email":"a@b.co"}"#,
    )
    .await;

    let record = store
      .get(&EmailAddress::parse("a@b.co").unwrap())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(record.source_ip, UNKNOWN_IP);
  }

  // ── Outage policy ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn fail_closed_outage_is_503_without_fallback_write() {
    let fallback = MemoryStore::new();
    let state = test_state(None, fallback.clone(), OutagePolicy::FailClosed);

    let resp = request(state, "POST", vec![], r#"{"email":"a@b.co"}"#).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(
      body["message"],
      "Service temporarily unavailable. Please try again later."
    );
    assert_eq!(fallback.count().await.unwrap(), 0);
  }
}
