//! Shaping loosely-typed model output into validated domain input.

use chrono::{Days, NaiveDate};
use dosewatch_core::{
  medicine::NewMedicine,
  timeparse::{DoseTime, normalize_time},
};

use crate::schema::RawMedicine;

/// Length of the course assumed when the prescription carries no dates.
const DEFAULT_COURSE_DAYS: u64 = 7;

/// Convert raw model entries into [`NewMedicine`] values, filling gaps:
///
/// * blank name becomes `"Unknown"`;
/// * times are normalized to 24-hour `HH:MM`, deduplicated, and default to
///   a single `08:00` dose when none survive;
/// * missing dates each fall back to a 7-day course starting `today`.
///
/// The output always passes [`NewMedicine::validate`].
pub fn shape(raws: Vec<RawMedicine>, today: NaiveDate) -> Vec<NewMedicine> {
  raws.into_iter().map(|raw| shape_one(raw, today)).collect()
}

fn shape_one(raw: RawMedicine, today: NaiveDate) -> NewMedicine {
  let name = raw.name.trim();
  let name = if name.is_empty() { "Unknown".to_string() } else { name.to_string() };

  let mut times: Vec<DoseTime> = Vec::new();
  for entry in &raw.time {
    if entry.trim().is_empty() {
      continue;
    }
    if let Ok(t) = normalize_time(entry).parse::<DoseTime>()
      && !times.contains(&t)
    {
      times.push(t);
    }
  }
  if times.is_empty() {
    times.push(DoseTime::fallback());
  }

  let default_end = today + Days::new(DEFAULT_COURSE_DAYS - 1);
  let start_date = parse_date(raw.start_date.as_deref()).unwrap_or(today);
  let end_date = parse_date(raw.end_date.as_deref()).unwrap_or(default_end);
  // A model hallucinating end < start would fail validation downstream.
  let end_date = end_date.max(start_date);

  NewMedicine {
    name,
    times,
    start_date,
    end_date,
    notes: raw.notes.trim().to_string(),
  }
}

fn parse_date(s: Option<&str>) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(s?.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn raw(name: &str, time: &[&str]) -> RawMedicine {
    RawMedicine {
      name: name.into(),
      time: time.iter().map(|s| s.to_string()).collect(),
      ..RawMedicine::default()
    }
  }

  #[test]
  fn complete_entry_passes_through() {
    let today = day("2025-08-23");
    let shaped = shape(
      vec![RawMedicine {
        name:       "Paracetamol".into(),
        time:       vec!["09:00".into(), "21:00".into()],
        start_date: Some("2025-08-23".into()),
        end_date:   Some("2025-08-27".into()),
        notes:      " after food ".into(),
      }],
      today,
    );

    assert_eq!(shaped.len(), 1);
    let m = &shaped[0];
    assert_eq!(m.name, "Paracetamol");
    assert_eq!(m.times.len(), 2);
    assert_eq!(m.end_date, day("2025-08-27"));
    assert_eq!(m.notes, "after food");
    m.validate().unwrap();
  }

  #[test]
  fn blank_name_becomes_unknown() {
    let shaped = shape(vec![raw("  ", &["08:00"])], day("2025-08-23"));
    assert_eq!(shaped[0].name, "Unknown");
  }

  #[test]
  fn free_form_times_are_normalized_and_deduplicated() {
    let shaped = shape(
      vec![raw("X", &["8am", "08:00", "8:30 pm", "garbage"])],
      day("2025-08-23"),
    );
    // "8am" and "08:00" collapse, and "garbage" collapses into the 08:00
    // fallback too.
    assert_eq!(
      shaped[0].times,
      vec![
        DoseTime { hour: 8, minute: 0 },
        DoseTime { hour: 20, minute: 30 },
      ]
    );
  }

  #[test]
  fn no_times_defaults_to_morning_dose() {
    let shaped = shape(vec![raw("X", &[])], day("2025-08-23"));
    assert_eq!(shaped[0].times, vec![DoseTime::fallback()]);
  }

  #[test]
  fn missing_dates_default_to_seven_day_course() {
    let today = day("2025-08-23");
    let shaped = shape(vec![raw("X", &["08:00"])], today);
    assert_eq!(shaped[0].start_date, today);
    assert_eq!(shaped[0].end_date, day("2025-08-29"));
    let days = (shaped[0].end_date - shaped[0].start_date).num_days() + 1;
    assert_eq!(days, 7);
  }

  #[test]
  fn dates_fall_back_independently() {
    let today = day("2025-08-23");
    let shaped = shape(
      vec![RawMedicine {
        name: "X".into(),
        time: vec!["08:00".into()],
        start_date: Some("2025-08-25".into()),
        end_date: None,
        notes: String::new(),
      }],
      today,
    );
    assert_eq!(shaped[0].start_date, day("2025-08-25"));
    assert_eq!(shaped[0].end_date, day("2025-08-29"));
  }

  #[test]
  fn inverted_dates_are_clamped() {
    let shaped = shape(
      vec![RawMedicine {
        name: "X".into(),
        time: vec!["08:00".into()],
        start_date: Some("2025-09-10".into()),
        end_date: Some("2025-09-01".into()),
        notes: String::new(),
      }],
      day("2025-08-23"),
    );
    assert_eq!(shaped[0].end_date, shaped[0].start_date);
    shaped[0].validate().unwrap();
  }
}
