//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`,
//! intake times as a compact JSON array of canonical `HH:MM` strings. UUIDs
//! are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use dosewatch_core::{medicine::MedicineRecord, subject::Subject, timeparse::DoseTime};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Dose times ──────────────────────────────────────────────────────────────

pub fn encode_times(times: &[DoseTime]) -> Result<String> {
  Ok(serde_json::to_string(times)?)
}

pub fn decode_times(s: &str) -> Result<Vec<DoseTime>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id: String,
  pub contact:    String,
  pub created_at: String,
}

impl RawSubject {
  pub fn into_subject(self, medicines: Vec<MedicineRecord>) -> Result<Subject> {
    Ok(Subject {
      subject_id: decode_uuid(&self.subject_id)?,
      contact: self.contact,
      created_at: decode_dt(&self.created_at)?,
      medicines,
    })
  }
}

/// Raw strings read directly from a `medicines` row.
pub struct RawMedicine {
  pub record_id:   String,
  pub subject_id:  String,
  pub name:        String,
  pub times_json:  String,
  pub start_date:  String,
  pub end_date:    String,
  pub notes:       String,
  pub recorded_at: String,
}

impl RawMedicine {
  pub fn into_record(self) -> Result<(Uuid, MedicineRecord)> {
    let owner = decode_uuid(&self.subject_id)?;
    let record = MedicineRecord {
      record_id:   decode_uuid(&self.record_id)?,
      name:        self.name,
      times:       decode_times(&self.times_json)?,
      start_date:  decode_date(&self.start_date)?,
      end_date:    decode_date(&self.end_date)?,
      notes:       self.notes,
      recorded_at: decode_dt(&self.recorded_at)?,
    };
    Ok((owner, record))
  }
}
