//! Handlers for `/subjects/:id/medicines` — manual medicine entry.
//!
//! Manual entry is stricter than prescription extraction: a blank name or an
//! inverted date range is rejected rather than papered over with defaults,
//! since there is a human on the other end who can correct the input.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{Days, Local, NaiveDate};
use dosewatch_core::{
  medicine::{MedicineRecord, NewMedicine},
  store::SubjectStore,
  timeparse::{DoseTime, normalize_time},
};
use dosewatch_extract::VisionExtractor;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /subjects/:id/medicines`
pub async fn list<S, X>(
  State(state): State<ApiState<S, X>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<MedicineRecord>>, ApiError>
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
  Ok(Json(subject.medicines))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MedicineBody {
  pub name: String,
  #[serde(default)]
  pub times: Vec<String>,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
  #[serde(default)]
  pub end_date: Option<NaiveDate>,
  #[serde(default)]
  pub notes: String,
}

impl MedicineBody {
  fn into_new_medicine(self, today: NaiveDate) -> Result<NewMedicine, ApiError> {
    let name = self.name.trim().to_string();
    if name.is_empty() {
      return Err(ApiError::BadRequest("medicine name must not be blank".into()));
    }

    let mut times: Vec<DoseTime> = Vec::new();
    for raw in &self.times {
      if raw.trim().is_empty() {
        continue;
      }
      if let Ok(t) = normalize_time(raw).parse::<DoseTime>()
        && !times.contains(&t)
      {
        times.push(t);
      }
    }
    if times.is_empty() {
      times.push(DoseTime::fallback());
    }

    let start_date = self.start_date.unwrap_or(today);
    let end_date = self
      .end_date
      .unwrap_or_else(|| start_date + Days::new(6));
    if end_date < start_date {
      return Err(ApiError::BadRequest(format!(
        "end_date {end_date} precedes start_date {start_date}"
      )));
    }

    Ok(NewMedicine {
      name,
      times,
      start_date,
      end_date,
      notes: self.notes.trim().to_string(),
    })
  }
}

/// `POST /subjects/:id/medicines` — body: a JSON array of medicine entries.
pub async fn create<S, X>(
  State(state): State<ApiState<S, X>>,
  Path(id): Path<Uuid>,
  Json(body): Json<Vec<MedicineBody>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubjectStore,
  X: VisionExtractor,
{
  if body.is_empty() {
    return Err(ApiError::BadRequest("no medicines provided".into()));
  }

  state
    .store
    .get_subject(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;

  let today = Local::now().date_naive();
  let medicines = body
    .into_iter()
    .map(|entry| entry.into_new_medicine(today))
    .collect::<Result<Vec<_>, _>>()?;

  let records = state
    .store
    .append_medicines(id, medicines)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(records)))
}
