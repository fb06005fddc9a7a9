//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | All subjects with their medicines |
//! | `POST` | `/subjects` | Body: `{"contact":"+15550001111"}` |
//! | `GET`  | `/subjects/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use dosewatch_core::{store::SubjectStore, subject::Subject};
use dosewatch_extract::VisionExtractor;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S, X>(
  State(state): State<ApiState<S, X>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: SubjectStore,
  X: VisionExtractor,
{
  let subjects = state
    .store
    .list_subjects()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(subjects))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub contact: String,
}

/// `POST /subjects` — body: `{"contact":"+15550001111"}`
pub async fn create<S, X>(
  State(state): State<ApiState<S, X>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubjectStore,
  X: VisionExtractor,
{
  let contact = body.contact.trim().to_string();
  if contact.is_empty() {
    return Err(ApiError::BadRequest("contact must not be blank".into()));
  }

  let existing = state
    .store
    .find_by_contact(&contact)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  if existing.is_some() {
    return Err(ApiError::Conflict(format!(
      "contact {contact} is already registered"
    )));
  }

  let subject = state
    .store
    .add_subject(contact)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S, X>(
  State(state): State<ApiState<S, X>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Subject>, ApiError>
where
  S: SubjectStore,
  X: VisionExtractor,
{
  let subject = state
    .store
    .get_subject(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(subject))
}
