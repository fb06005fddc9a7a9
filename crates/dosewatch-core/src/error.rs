//! Error types for `dosewatch-core`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("medicine name must not be empty")]
  EmptyName,

  #[error("medicine {0:?} has no dose times")]
  NoDoseTimes(String),

  #[error("medicine {name:?}: end date {end} precedes start date {start}")]
  InvalidDateRange {
    name:  String,
    start: NaiveDate,
    end:   NaiveDate,
  },

  #[error("invalid dose time: {0:?}")]
  InvalidDoseTime(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
