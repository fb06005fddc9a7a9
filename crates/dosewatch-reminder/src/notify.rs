//! Outbound notification channel.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// Non-2xx response from the messaging provider.
  #[error("provider returned {status}: {body}")]
  Api { status: u16, body: String },
}

/// A channel that can deliver a reminder message to a contact address.
pub trait Notifier: Send + Sync {
  fn send<'a>(
    &'a self,
    to: &'a str,
    body: &'a str,
  ) -> impl Future<Output = Result<(), NotifyError>> + Send + 'a;
}

// ─── Twilio WhatsApp ─────────────────────────────────────────────────────────

/// Notifier delivering over WhatsApp via the Twilio Messages API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TwilioWhatsApp {
  client:      reqwest::Client,
  account_sid: String,
  auth_token:  String,
  /// E.164 sender number, without the `whatsapp:` prefix.
  from_number: String,
}

impl TwilioWhatsApp {
  pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .unwrap_or_default();
    Self { client, account_sid, auth_token, from_number }
  }

  fn url(&self) -> String {
    format!(
      "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
      self.account_sid
    )
  }
}

impl Notifier for TwilioWhatsApp {
  async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError> {
    let form = [
      ("From", format!("whatsapp:{}", self.from_number)),
      ("To", format!("whatsapp:{to}")),
      ("Body", body.to_string()),
    ];

    let resp = self
      .client
      .post(self.url())
      .basic_auth(&self.account_sid, Some(&self.auth_token))
      .form(&form)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(NotifyError::Api { status: status.as_u16(), body });
    }
    Ok(())
  }
}
