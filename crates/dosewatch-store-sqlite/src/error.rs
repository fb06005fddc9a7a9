//! Error type for `dosewatch-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] dosewatch_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("subject not found: {0}")]
  SubjectNotFound(uuid::Uuid),

  /// A subject with this contact address already exists.
  #[error("contact already registered: {0}")]
  ContactTaken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
