//! In-process job scheduler.
//!
//! Jobs are plain data ([`ReminderSpec`]), not closures: the scheduler holds
//! a map keyed by job id, the reconcile loop edits it, and the firing loop
//! reads it once a minute. Nothing survives a restart — the reconciler
//! rebuilds the map from the store on its first tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike};
use dosewatch_core::schedule::ReminderSpec;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{TaskHandle, clock::Clock, notify::Notifier};

/// How often the firing loop samples the clock. Well under a minute so no
/// firing minute is skipped.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct JobScheduler {
  jobs: Mutex<HashMap<String, ReminderSpec>>,
}

impl JobScheduler {
  pub fn new() -> Self { Self::default() }

  fn locked(&self) -> MutexGuard<'_, HashMap<String, ReminderSpec>> {
    // A poisoned map is still structurally sound, keep going.
    self.jobs.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Install a job, replacing any existing job with the same id.
  pub fn install(&self, spec: ReminderSpec) {
    debug!(job_id = %spec.job_id, "installing reminder job");
    self.locked().insert(spec.job_id.clone(), spec);
  }

  /// Remove a job by id. Removing an absent id is a no-op.
  pub fn remove(&self, job_id: &str) -> bool {
    self.locked().remove(job_id).is_some()
  }

  pub fn contains(&self, job_id: &str) -> bool {
    self.locked().contains_key(job_id)
  }

  pub fn len(&self) -> usize { self.locked().len() }

  pub fn is_empty(&self) -> bool { self.locked().is_empty() }

  /// Snapshot of all installed jobs, ordered by job id.
  pub fn jobs(&self) -> Vec<ReminderSpec> {
    let mut jobs: Vec<_> = self.locked().values().cloned().collect();
    jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
    jobs
  }

  /// All jobs whose firing rule matches the given wall-clock minute.
  pub fn due(&self, at: NaiveDateTime) -> Vec<ReminderSpec> {
    self
      .locked()
      .values()
      .filter(|spec| spec.rule.matches(at))
      .cloned()
      .collect()
  }
}

// ─── Firing loop ─────────────────────────────────────────────────────────────

/// Spawn the loop that fires due jobs, at most once per wall-clock minute.
pub fn spawn_firing_loop<N, C>(
  scheduler: Arc<JobScheduler>,
  notifier: Arc<N>,
  clock: C,
) -> TaskHandle
where
  N: Notifier + 'static,
  C: Clock + 'static,
{
  let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

  let handle = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_fired: Option<(chrono::NaiveDate, u32, u32)> = None;

    loop {
      tokio::select! {
        _ = ticker.tick() => {}
        _ = shutdown_rx.changed() => {
          info!("firing loop shutting down");
          return;
        }
      }

      let now = clock.now();
      let minute = (now.date(), now.hour(), now.minute());
      if last_fired == Some(minute) {
        continue;
      }
      last_fired = Some(minute);

      for spec in scheduler.due(now) {
        let notifier = Arc::clone(&notifier);
        // Deliveries run concurrently; a slow provider must not delay the
        // next minute's jobs.
        tokio::spawn(async move { deliver(notifier.as_ref(), &spec).await });
      }
    }
  });

  TaskHandle::new(shutdown_tx, handle)
}

/// The message a subject receives, built from the job's data.
pub fn render_message(spec: &ReminderSpec) -> String {
  let mut body = format!(
    "Reminder: at {}, you need to take *{}*.",
    spec.nominal_time, spec.medicine_name
  );
  if !spec.notes.is_empty() {
    body.push_str("\nNotes: ");
    body.push_str(&spec.notes);
  }
  body
}

/// Send one reminder. Failures are logged, never propagated — delivery is
/// best effort and the job stays installed for its next occurrence.
pub async fn deliver<N: Notifier + ?Sized>(notifier: &N, spec: &ReminderSpec) {
  let body = render_message(spec);
  match notifier.send(&spec.recipient, &body).await {
    Ok(()) => info!(
      job_id = %spec.job_id,
      medicine = %spec.medicine_name,
      "reminder sent"
    ),
    Err(e) => warn!(
      job_id = %spec.job_id,
      medicine = %spec.medicine_name,
      "reminder delivery failed: {e}"
    ),
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod scheduler_tests {
  use chrono::NaiveDate;
  use dosewatch_core::{
    schedule::{FiringRule, ReminderSpec},
    timeparse::DoseTime,
  };

  use super::*;

  fn spec(job_id: &str, hour: u8, minute: u8) -> ReminderSpec {
    // Nominal dose time is one minute after the firing rule.
    let (nominal_hour, nominal_minute) = if minute == 59 {
      ((hour + 1) % 24, 0)
    } else {
      (hour, minute + 1)
    };
    ReminderSpec {
      job_id:        job_id.to_string(),
      rule:          FiringRule { hour, minute },
      recipient:     "+15550001111".into(),
      medicine_name: "Paracetamol".into(),
      notes:         "after food".into(),
      nominal_time:  DoseTime { hour: nominal_hour, minute: nominal_minute },
    }
  }

  fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 8, 23)
      .unwrap()
      .and_hms_opt(h, m, 30)
      .unwrap()
  }

  #[test]
  fn install_replaces_by_id() {
    let s = JobScheduler::new();
    s.install(spec("a", 8, 59));
    s.install(spec("a", 20, 59));

    assert_eq!(s.len(), 1);
    assert_eq!(s.jobs()[0].rule, FiringRule { hour: 20, minute: 59 });
  }

  #[test]
  fn remove_absent_is_noop() {
    let s = JobScheduler::new();
    s.install(spec("a", 8, 59));

    assert!(s.remove("a"));
    assert!(!s.remove("a"));
    assert!(s.is_empty());
  }

  #[test]
  fn due_matches_only_the_current_minute() {
    let s = JobScheduler::new();
    s.install(spec("morning", 8, 59));
    s.install(spec("evening", 20, 59));

    let due = s.due(at(8, 59));
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].job_id, "morning");
    assert!(s.due(at(9, 0)).is_empty());
  }

  #[test]
  fn jobs_are_sorted_by_id() {
    let s = JobScheduler::new();
    s.install(spec("b", 8, 59));
    s.install(spec("a", 8, 59));

    let ids: Vec<_> = s.jobs().into_iter().map(|j| j.job_id).collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[test]
  fn message_includes_nominal_time_and_notes() {
    let rendered = render_message(&spec("a", 8, 59));
    assert_eq!(
      rendered,
      "Reminder: at 09:00, you need to take *Paracetamol*.\nNotes: after food"
    );
  }

  #[test]
  fn message_omits_empty_notes() {
    let mut s = spec("a", 8, 59);
    s.notes.clear();
    assert!(!render_message(&s).contains("Notes:"));
  }
}
