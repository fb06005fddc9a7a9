//! The `SubjectStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `dosewatch-store-sqlite`). The reconciler and the HTTP API depend on this
//! abstraction, not on any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  medicine::{MedicineRecord, NewMedicine},
  subject::Subject,
};

/// Abstraction over the subject/medicine document store.
///
/// Writes are either appends (`append_medicines`) or idempotent full
/// replacements (`replace_medicines`); the reconciler relies on the latter
/// being safe to repeat with unchanged content.
pub trait SubjectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create and persist a new subject with the given contact address.
  fn add_subject(
    &self,
    contact: String,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject (with its medicine list) by UUID.
  /// Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Look a subject up by contact address. Used by prescription ingestion,
  /// which is keyed on the recipient's number rather than a UUID.
  fn find_by_contact<'a>(
    &'a self,
    contact: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// List all subjects with their medicine lists.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Medicines ─────────────────────────────────────────────────────────

  /// Validate and append new medicine records to a subject. Returns the
  /// persisted records with their store-assigned `record_id`s.
  fn append_medicines(
    &self,
    subject_id: Uuid,
    input: Vec<NewMedicine>,
  ) -> impl Future<Output = Result<Vec<MedicineRecord>, Self::Error>> + Send + '_;

  /// Replace a subject's entire medicine list. Idempotent — writing back an
  /// unchanged list is a no-op in effect.
  fn replace_medicines(
    &self,
    subject_id: Uuid,
    medicines: Vec<MedicineRecord>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove one medicine record. Removing an absent record is a no-op, not
  /// an error — the reconciler may race its own reads.
  fn remove_medicine(
    &self,
    subject_id: Uuid,
    record_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a subject document and all of its medicine records.
  fn delete_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
