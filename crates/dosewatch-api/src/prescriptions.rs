//! Handler for `POST /prescriptions` — prescription image upload.
//!
//! Multipart form with two fields: `file` (the image) and `contact` (the
//! uploader's messaging address). An unknown contact is registered on the
//! fly, so the common flow is a single request from photo to scheduled
//! reminders on the next reconcile tick.

use axum::{
  Json,
  extract::{Multipart, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Local;
use dosewatch_core::store::SubjectStore;
use dosewatch_extract::{VisionExtractor, shape};
use serde_json::json;
use tracing::info;

use crate::{ApiState, error::ApiError};

/// File extensions we will hand to the vision model.
const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn media_type(extension: &str) -> &'static str {
  match extension {
    "png" => "image/png",
    _ => "image/jpeg",
  }
}

/// `POST /prescriptions` — multipart fields `file` and `contact`.
pub async fn upload<S, X>(
  State(state): State<ApiState<S, X>>,
  mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: SubjectStore,
  X: VisionExtractor,
{
  let mut image: Option<(String, Vec<u8>)> = None;
  let mut contact: Option<String> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
  {
    match field.name() {
      Some("file") => {
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
          .bytes()
          .await
          .map_err(|e| ApiError::BadRequest(format!("unreadable file field: {e}")))?;
        image = Some((filename, bytes.to_vec()));
      }
      Some("contact") => {
        let text = field
          .text()
          .await
          .map_err(|e| ApiError::BadRequest(format!("unreadable contact field: {e}")))?;
        contact = Some(text.trim().to_string());
      }
      _ => {}
    }
  }

  let (filename, image) =
    image.ok_or_else(|| ApiError::BadRequest("missing field 'file'".into()))?;
  let contact =
    contact.ok_or_else(|| ApiError::BadRequest("missing field 'contact'".into()))?;
  if contact.is_empty() {
    return Err(ApiError::BadRequest("contact must not be blank".into()));
  }

  let extension = filename
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
    return Err(ApiError::BadRequest(format!(
      "unsupported file type '{filename}', expected jpg, jpeg, or png"
    )));
  }

  let raws = state.extractor.extract(&image, media_type(&extension)).await?;
  let medicines = shape(raws, Local::now().date_naive());
  if medicines.is_empty() {
    return Err(ApiError::BadRequest(
      "no medicines recognized in the prescription".into(),
    ));
  }

  let subject = match state
    .store
    .find_by_contact(&contact)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
  {
    Some(subject) => subject,
    None => state
      .store
      .add_subject(contact)
      .await
      .map_err(|e| ApiError::Store(Box::new(e)))?,
  };

  let records = state
    .store
    .append_medicines(subject.subject_id, medicines)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  info!(
    subject_id = %subject.subject_id,
    medicines = records.len(),
    "prescription ingested"
  );

  Ok((
    StatusCode::CREATED,
    Json(json!({
      "subject_id": subject.subject_id,
      "medicines": records,
    })),
  ))
}
