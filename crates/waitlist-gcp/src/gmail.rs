//! [`GmailNotifier`] — the Gmail REST implementation of [`Notifier`].
//!
//! One HTML message per new signup, sent to a fixed operator address with
//! the running total in the subject line. The caller (the orchestrator)
//! swallows every error from here; a dead mail capability never fails a
//! signup.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use waitlist_core::{email::EmailAddress, notify::Notifier};

use crate::{Error, Result, auth::TokenProvider};

const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

fn subject(total_count: u64) -> String {
  format!("New Waitlist Signup - Trinity Engine ({total_count} total)")
}

fn body_html(email: &EmailAddress, total_count: u64) -> String {
  format!(
    r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <h2 style="color: #33e7ff;">New Waitlist Signup</h2>
  <p>A new person has joined the Trinity Engine waitlist:</p>
  <ul>
    <li><strong>Email:</strong> {email}</li>
    <li><strong>Total Waitlist Count:</strong> {total_count}</li>
  </ul>
  <p style="margin-top: 20px; color: #666; font-size: 0.9em;">
    This is an automated notification from the Trinity Engine website.
  </p>
</body>
</html>"#
  )
}

/// Assemble the RFC 2822 message and encode it the way the Gmail API wants
/// its `raw` field: url-safe base64, no padding.
fn compose_raw(to: &str, subject: &str, html: &str) -> String {
  let message = format!(
    "To: {to}\r\n\
     Subject: {subject}\r\n\
     MIME-Version: 1.0\r\n\
     Content-Type: text/html; charset=utf-8\r\n\
     \r\n\
     {html}"
  );
  URL_SAFE_NO_PAD.encode(message)
}

/// Sends the per-signup notification through the Gmail API.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct GmailNotifier<T> {
  http:  reqwest::Client,
  token: T,
  to:    String,
}

impl<T: TokenProvider> GmailNotifier<T> {
  pub fn new(to: impl Into<String>, http: reqwest::Client, token: T) -> Self {
    Self { http, token, to: to.into() }
  }
}

impl<T: TokenProvider + 'static> Notifier for GmailNotifier<T> {
  type Error = Error;

  async fn notify(&self, email: &EmailAddress, total_count: u64) -> Result<()> {
    let token = self.token.access_token().await?;
    let raw = compose_raw(
      &self.to,
      &subject(total_count),
      &body_html(email, total_count),
    );

    self
      .http
      .post(SEND_URL)
      .bearer_auth(token)
      .json(&serde_json::json!({ "raw": raw }))
      .send()
      .await?
      .error_for_status()?;

    tracing::debug!(%email, total_count, "signup notification sent");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subject_carries_the_running_total() {
    assert_eq!(subject(42), "New Waitlist Signup - Trinity Engine (42 total)");
  }

  #[test]
  fn body_embeds_signup_and_count() {
    let email = EmailAddress::parse("new@user.com").unwrap();
    let html = body_html(&email, 7);
    assert!(html.contains("new@user.com"));
    assert!(html.contains("<strong>Total Waitlist Count:</strong> 7"));
  }

  #[test]
  fn raw_message_decodes_to_an_html_mail() {
    let email = EmailAddress::parse("new@user.com").unwrap();
    let raw = compose_raw(
      "ops@example.com",
      &subject(1),
      &body_html(&email, 1),
    );

    let bytes = URL_SAFE_NO_PAD.decode(raw).unwrap();
    let message = String::from_utf8(bytes).unwrap();
    assert!(message.starts_with("To: ops@example.com\r\n"));
    assert!(message.contains("Subject: New Waitlist Signup - Trinity Engine (1 total)"));
    assert!(message.contains("Content-Type: text/html"));
    assert!(message.contains("new@user.com"));
  }
}
