//! Subject — a reminder recipient and the medicines prescribed to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::medicine::MedicineRecord;

/// A recipient document: identity, the messaging address reminders are sent
/// to, and the current medicine list.
///
/// A subject never persists with an empty medicine list — the reconciler
/// deletes the document once every course has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: Uuid,
  /// WhatsApp-reachable phone number in E.164 form, e.g. `+919876543210`.
  pub contact:    String,
  pub created_at: DateTime<Utc>,
  pub medicines:  Vec<MedicineRecord>,
}
