//! Vision model client.

use std::future::Future;
use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{Result, error::Error, parse::parse_reply, schema::{RawMedicine, SYSTEM_PROMPT}};

/// Anything that can turn a prescription image into raw medicine entries.
///
/// Abstracting the model call keeps the HTTP layer testable with a stub.
pub trait VisionExtractor: Send + Sync {
  fn extract<'a>(
    &'a self,
    image: &'a [u8],
    media_type: &'a str,
  ) -> impl Future<Output = Result<Vec<RawMedicine>>> + Send + 'a;
}

// ─── Gemini ──────────────────────────────────────────────────────────────────

/// Extractor backed by the Gemini `generateContent` REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GeminiExtractor {
  client:  reqwest::Client,
  api_key: String,
  model:   String,
}

impl GeminiExtractor {
  pub fn new(api_key: String, model: String) -> Self {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .unwrap_or_default();
    Self { client, api_key, model }
  }

  fn url(&self) -> String {
    format!(
      "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
      self.model, self.api_key
    )
  }
}

#[derive(Deserialize)]
struct GenerateReply {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
  text: Option<String>,
}

impl VisionExtractor for GeminiExtractor {
  async fn extract(&self, image: &[u8], media_type: &str) -> Result<Vec<RawMedicine>> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(image);
    let body = json!({
      "contents": [{
        "parts": [
          { "text": SYSTEM_PROMPT },
          { "inline_data": { "mime_type": media_type, "data": encoded } },
        ],
      }],
    });

    let resp = self.client.post(self.url()).json(&body).send().await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Api { status: status.as_u16(), body });
    }

    let reply: GenerateReply = resp.json().await?;
    let text = reply
      .candidates
      .into_iter()
      .filter_map(|c| c.content)
      .flat_map(|c| c.parts)
      .filter_map(|p| p.text)
      .collect::<String>();
    if text.is_empty() {
      return Err(Error::EmptyReply);
    }
    debug!(chars = text.len(), "model reply received");

    parse_reply(&text)
  }
}
