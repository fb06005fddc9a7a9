//! Time source abstraction.
//!
//! Reminder times are interpreted in the server's local timezone, matching
//! what subjects write on prescriptions.

use chrono::{Local, NaiveDate, NaiveDateTime};

pub trait Clock: Send + Sync {
  /// The current local wall-clock time.
  fn now(&self) -> NaiveDateTime;

  /// The current local calendar date.
  fn today(&self) -> NaiveDate { self.now().date() }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime { Local::now().naive_local() }
}
