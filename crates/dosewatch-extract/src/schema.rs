//! The extraction contract: what we ask the model for and what we accept
//! back.

use serde::Deserialize;

/// Instructions sent alongside every prescription image.
pub const SYSTEM_PROMPT: &str = r#"You read prescriptions (photo or scanned) and output ONLY valid JSON in this schema:

{
  "medicines": [
    {
      "name": "string",
      "time": ["HH:MM", "..."],
      "start_date": "YYYY-MM-DD",
      "end_date": "YYYY-MM-DD",
      "notes": "string"
    }
  ]
}

Rules:
- Times are 24-hour HH:MM (e.g., 8am -> "08:00", 8:30 pm -> "20:30").
- If dates are missing, omit them rather than guessing.
- Include brief instructions in notes (e.g., "after food", "1 tab").
- Output ONLY JSON. No commentary."#;

/// One medicine entry as the model reports it.
///
/// Every field is optional in practice; [`shape`](crate::shape) fills the
/// gaps with defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMedicine {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub time: Vec<String>,
  #[serde(default)]
  pub start_date: Option<String>,
  #[serde(default)]
  pub end_date: Option<String>,
  #[serde(default)]
  pub notes: String,
}
