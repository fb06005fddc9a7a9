//! Time-of-day normalization.
//!
//! Intake times arrive as free-form strings — `"8am"`, `"8.30 PM"`,
//! `"14:00"` — from prescription extraction or manual entry. Everything is
//! normalized to canonical 24-hour `HH:MM`. A single unparseable entry falls
//! back to [`DoseTime::fallback`] rather than failing the whole record, so
//! one garbled time never aborts a prescription's ingestion.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{Error, Result};

// ─── DoseTime ────────────────────────────────────────────────────────────────

/// A canonical time of day at which a dose is taken.
///
/// Serialised as its `HH:MM` display form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoseTime {
  pub hour:   u8,
  pub minute: u8,
}

impl DoseTime {
  /// Construct from raw components; `None` if out of range.
  pub fn new(hour: u8, minute: u8) -> Option<Self> {
    (hour < 24 && minute < 60).then_some(Self { hour, minute })
  }

  /// The default applied when an intake time cannot be parsed: `08:00`.
  pub const fn fallback() -> Self { Self { hour: 8, minute: 0 } }
}

impl fmt::Display for DoseTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}:{:02}", self.hour, self.minute)
  }
}

impl FromStr for DoseTime {
  type Err = Error;

  /// Strict canonical parse (`HH:MM`, 24-hour). Free-form input goes through
  /// [`normalize_time`] instead.
  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidDoseTime(s.to_string());
    let (h, m) = s.split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.is_empty() || m.len() > 2 {
      return Err(invalid());
    }
    let hour: u8 = h.parse().map_err(|_| invalid())?;
    let minute: u8 = m.parse().map_err(|_| invalid())?;
    Self::new(hour, minute).ok_or_else(invalid)
  }
}

impl Serialize for DoseTime {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for DoseTime {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(de::Error::custom)
  }
}

// ─── Normalization ───────────────────────────────────────────────────────────

/// Normalize a free-form clock-time string to canonical `HH:MM`.
///
/// Accepted forms (case, spaces, and periods are ignored): `8`, `8am`,
/// `8 p.m.`, `8:30`, `8:30 pm`, `14:00`. Anything else yields `"08:00"`.
pub fn normalize_time(raw: &str) -> String {
  parse_free_form(raw).unwrap_or_else(DoseTime::fallback).to_string()
}

fn parse_free_form(raw: &str) -> Option<DoseTime> {
  let compact: String = raw
    .to_ascii_lowercase()
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '.')
    .collect();

  let (body, meridiem) = if let Some(b) = compact.strip_suffix("am") {
    (b, Some(Meridiem::Am))
  } else if let Some(b) = compact.strip_suffix("pm") {
    (b, Some(Meridiem::Pm))
  } else {
    (compact.as_str(), None)
  };

  let (hour_part, minute_part) = match body.split_once(':') {
    Some((h, m)) => (h, Some(m)),
    None => (body, None),
  };

  let hour = parse_component(hour_part)?;
  let minute = match minute_part {
    Some(m) => parse_component(m)?,
    None => 0,
  };
  if minute > 59 {
    return None;
  }

  let hour = match meridiem {
    // 12-hour clock: 12am is midnight, 12pm is noon.
    Some(Meridiem::Am) if (1..=12).contains(&hour) => hour % 12,
    Some(Meridiem::Pm) if (1..=12).contains(&hour) => hour % 12 + 12,
    Some(_) => return None,
    None if hour <= 23 => hour,
    None => return None,
  };

  DoseTime::new(hour, minute)
}

#[derive(Clone, Copy)]
enum Meridiem {
  Am,
  Pm,
}

/// Parse a 1–2 digit clock component.
fn parse_component(s: &str) -> Option<u8> {
  if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  s.parse().ok()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
