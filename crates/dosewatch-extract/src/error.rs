//! Error type for `dosewatch-extract`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The model replied, but no JSON object could be located in its text.
  #[error("no JSON object found in model reply")]
  MissingJson,

  #[error("malformed model reply: {0}")]
  Json(#[from] serde_json::Error),

  /// Non-2xx response from the extraction API.
  #[error("extraction API returned {status}: {body}")]
  Api { status: u16, body: String },

  /// The API answered 200 but the reply carried no candidate text.
  #[error("extraction API returned an empty reply")]
  EmptyReply,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
