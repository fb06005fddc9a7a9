//! Schedule materialization — from stored medicine records to the concrete
//! reminder jobs that should exist right now.
//!
//! Materialization is pure and deterministic: re-deriving the same record on
//! a later tick yields byte-identical job identities, which is what lets the
//! reconciler diff "desired" against "installed" without drift.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{medicine::MedicineRecord, subject::Subject, timeparse::DoseTime};

/// How far ahead of the nominal dose time the reminder fires.
pub const LEAD_TIME_MINUTES: u32 = 1;

const MINUTES_PER_DAY: u32 = 24 * 60;

// ─── Record status ───────────────────────────────────────────────────────────

/// Where a record's calendar range sits relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
  /// `start_date <= today <= end_date` — jobs are installed.
  Active,
  /// `today < start_date` — retained in the store, no jobs yet.
  Future,
  /// `today > end_date` — pruned from the store on the next tick.
  Expired,
}

pub fn record_status(record: &MedicineRecord, today: NaiveDate) -> RecordStatus {
  if today > record.end_date {
    RecordStatus::Expired
  } else if today < record.start_date {
    RecordStatus::Future
  } else {
    RecordStatus::Active
  }
}

// ─── Firing rule ─────────────────────────────────────────────────────────────

/// A daily hour/minute recurrence pattern, evaluated once per wall-clock
/// minute. Occurrences already past today are skipped implicitly — the rule
/// is only ever compared against the current time, never retroactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringRule {
  pub hour:   u8,
  pub minute: u8,
}

impl FiringRule {
  /// The rule firing `lead_minutes` before `dose`, wrapping across midnight.
  pub fn before(dose: DoseTime, lead_minutes: u32) -> Self {
    let nominal = u32::from(dose.hour) * 60 + u32::from(dose.minute);
    let shifted =
      (nominal + MINUTES_PER_DAY - lead_minutes % MINUTES_PER_DAY) % MINUTES_PER_DAY;
    Self {
      hour:   (shifted / 60) as u8,
      minute: (shifted % 60) as u8,
    }
  }

  pub fn matches(&self, at: NaiveDateTime) -> bool {
    at.hour() == u32::from(self.hour) && at.minute() == u32::from(self.minute)
  }
}

// ─── Job identity ────────────────────────────────────────────────────────────

/// Deterministic identity for one recurring notification obligation.
///
/// Keyed on `record_id` rather than the medicine's display name, so two
/// same-name records for the same subject schedule independently.
pub fn job_id(subject_id: Uuid, record_id: Uuid, time: DoseTime) -> String {
  format!("{subject_id}:{record_id}:{time}")
}

// ─── ReminderSpec ────────────────────────────────────────────────────────────

/// One fully-materialized reminder job: identity, firing rule, and everything
/// the notifier needs at fire time. Ephemeral and scheduler-owned; rebuilt
/// from the store on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSpec {
  pub job_id:        String,
  pub rule:          FiringRule,
  /// Messaging address of the subject.
  pub recipient:     String,
  pub medicine_name: String,
  pub notes:         String,
  /// The dose time printed in the message (the rule fires slightly earlier).
  pub nominal_time:  DoseTime,
}

/// Expand one record into reminder specs, one per intake time.
/// Empty unless the record is [`RecordStatus::Active`] today.
pub fn materialize_record(
  subject_id: Uuid,
  contact: &str,
  record: &MedicineRecord,
  today: NaiveDate,
) -> Vec<ReminderSpec> {
  if record_status(record, today) != RecordStatus::Active {
    return Vec::new();
  }
  record
    .times
    .iter()
    .map(|&time| ReminderSpec {
      job_id:        job_id(subject_id, record.record_id, time),
      rule:          FiringRule::before(time, LEAD_TIME_MINUTES),
      recipient:     contact.to_string(),
      medicine_name: record.name.clone(),
      notes:         record.notes.clone(),
      nominal_time:  time,
    })
    .collect()
}

/// Expand every record of a subject. The order is stable (record order, then
/// intake-time order) so the result is directly comparable across ticks.
pub fn materialize_subject(subject: &Subject, today: NaiveDate) -> Vec<ReminderSpec> {
  subject
    .medicines
    .iter()
    .flat_map(|record| {
      materialize_record(subject.subject_id, &subject.contact, record, today)
    })
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
