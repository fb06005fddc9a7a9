//! JSON REST API for dosewatch.
//!
//! Exposes an axum [`Router`] backed by any
//! [`dosewatch_core::store::SubjectStore`] plus the shared [`JobScheduler`]
//! and a [`VisionExtractor`]. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", dosewatch_api::api_router(state))
//! ```

pub mod error;
pub mod medicines;
pub mod prescriptions;
pub mod reminders;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use dosewatch_core::store::SubjectStore;
use dosewatch_extract::VisionExtractor;
use dosewatch_reminder::JobScheduler;

pub use error::ApiError;

/// Shared state handed to every handler.
pub struct ApiState<S, X> {
  pub store:     Arc<S>,
  pub scheduler: Arc<JobScheduler>,
  pub extractor: Arc<X>,
}

// Derived Clone would demand S: Clone and X: Clone.
impl<S, X> Clone for ApiState<S, X> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      scheduler: Arc::clone(&self.scheduler),
      extractor: Arc::clone(&self.extractor),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, X>(state: ApiState<S, X>) -> Router<()>
where
  S: SubjectStore + 'static,
  X: VisionExtractor + 'static,
{
  Router::new()
    // Subjects
    .route(
      "/subjects",
      get(subjects::list::<S, X>).post(subjects::create::<S, X>),
    )
    .route("/subjects/{id}", get(subjects::get_one::<S, X>))
    // Medicines
    .route(
      "/subjects/{id}/medicines",
      get(medicines::list::<S, X>).post(medicines::create::<S, X>),
    )
    // Prescription upload
    .route("/prescriptions", post(prescriptions::upload::<S, X>))
    // Scheduled reminders
    .route("/reminders", get(reminders::list::<S, X>))
    // Phone photos of prescriptions run well past axum's 2 MB default.
    .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
