//! Locating and decoding the JSON object inside a model reply.
//!
//! Models occasionally wrap their answer in markdown fences or a sentence of
//! commentary despite instructions, so we scan for the outermost `{…}` span
//! instead of parsing the reply verbatim.

use serde_json::Value;

use crate::{Error, Result, schema::RawMedicine};

/// Extract the medicine entries from raw model text.
pub fn parse_reply(text: &str) -> Result<Vec<RawMedicine>> {
  let start = text.find('{').ok_or(Error::MissingJson)?;
  let end = text.rfind('}').ok_or(Error::MissingJson)?;
  if end < start {
    return Err(Error::MissingJson);
  }

  let value: Value = serde_json::from_str(&text[start..=end])?;

  // Accept either of the keys models have been seen using.
  let items = value
    .get("medicines")
    .or_else(|| value.get("data"))
    .cloned()
    .unwrap_or(Value::Array(Vec::new()));

  Ok(serde_json::from_value(items)?)
}
