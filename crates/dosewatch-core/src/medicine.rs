//! Medicine records — one prescribed medication's dosing schedule.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, timeparse::DoseTime};

// ─── MedicineRecord ──────────────────────────────────────────────────────────

/// A stored dosing schedule: intake times and the calendar range they apply
/// to. Upstream ingestion only ever appends records; the reconciler removes
/// them once `end_date` has passed.
///
/// `record_id` is store-assigned and is the identity that reminder jobs and
/// expiry removal key on — two records with the same display name never
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineRecord {
  pub record_id:   Uuid,
  pub name:        String,
  /// Canonical intake times, ordered, at least one.
  pub times:       Vec<DoseTime>,
  pub start_date:  NaiveDate,
  pub end_date:    NaiveDate,
  pub notes:       String,
  /// Server-assigned timestamp; never changes after creation.
  pub recorded_at: DateTime<Utc>,
}

impl MedicineRecord {
  /// Length of the course in days, inclusive of both endpoints.
  pub fn duration_days(&self) -> i64 {
    (self.end_date - self.start_date).num_days() + 1
  }
}

// ─── NewMedicine ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::SubjectStore::append_medicines`].
/// `record_id` and `recorded_at` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMedicine {
  pub name:       String,
  pub times:      Vec<DoseTime>,
  pub start_date: NaiveDate,
  pub end_date:   NaiveDate,
  pub notes:      String,
}

impl NewMedicine {
  /// Check the record-level invariants: non-empty name, at least one dose
  /// time, `start_date <= end_date`.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::EmptyName);
    }
    if self.times.is_empty() {
      return Err(Error::NoDoseTimes(self.name.clone()));
    }
    if self.end_date < self.start_date {
      return Err(Error::InvalidDateRange {
        name:  self.name.clone(),
        start: self.start_date,
        end:   self.end_date,
      });
    }
    Ok(())
  }
}
