//! Handler for `GET /reminders` — the currently scheduled reminder jobs.

use axum::{Json, extract::State};
use dosewatch_core::{schedule::ReminderSpec, store::SubjectStore};
use dosewatch_extract::VisionExtractor;

use crate::{ApiState, error::ApiError};

/// `GET /reminders` — every installed job, ordered by job id.
pub async fn list<S, X>(
  State(state): State<ApiState<S, X>>,
) -> Result<Json<Vec<ReminderSpec>>, ApiError>
where
  S: SubjectStore,
  X: VisionExtractor,
{
  Ok(Json(state.scheduler.jobs()))
}
