//! Diff-and-converge reconciliation between the store and the scheduler.
//!
//! Each tick re-derives, per subject, the set of reminder jobs that should
//! exist today and converges the [`JobScheduler`] onto it. The comparison
//! runs against the previous *materialized* set, not the raw medicine list,
//! so calendar transitions (a future course becoming active at midnight)
//! register as changes even though no row was written.
//!
//! Along the way the tick prunes: expired courses are deleted from the
//! store, and a subject whose last course has expired is deleted outright.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use dosewatch_core::{
  schedule::{ReminderSpec, materialize_subject, record_status, RecordStatus},
  store::SubjectStore,
  subject::Subject,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{TaskHandle, clock::Clock, jobs::JobScheduler};

type Snapshots = HashMap<Uuid, Vec<ReminderSpec>>;

pub struct Reconciler<S, C> {
  store:     Arc<S>,
  scheduler: Arc<JobScheduler>,
  clock:     C,
  /// Last materialized set per subject, diffed against on each tick.
  snapshots: Mutex<Snapshots>,
}

impl<S, C> Reconciler<S, C>
where
  S: SubjectStore,
  C: Clock,
{
  pub fn new(store: Arc<S>, scheduler: Arc<JobScheduler>, clock: C) -> Self {
    Self {
      store,
      scheduler,
      clock,
      snapshots: Mutex::new(HashMap::new()),
    }
  }

  fn snapshots(&self) -> MutexGuard<'_, Snapshots> {
    self.snapshots.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Subjects currently tracked by a snapshot. Diagnostics only.
  pub fn tracked_subjects(&self) -> Vec<Uuid> {
    self.snapshots().keys().copied().collect()
  }

  /// One reconciliation pass over every subject.
  ///
  /// Failures are contained: a store error for one subject is logged and
  /// the others still reconcile. The next tick retries from scratch.
  pub async fn tick(&self) {
    let today = self.clock.today();
    let subjects = match self.store.list_subjects().await {
      Ok(subjects) => subjects,
      Err(e) => {
        warn!("reconcile tick skipped, cannot list subjects: {e}");
        return;
      }
    };
    debug!(subjects = subjects.len(), %today, "reconcile tick");

    for subject in subjects {
      let subject_id = subject.subject_id;
      if let Err(e) = self.reconcile_subject(subject, today).await {
        warn!(%subject_id, "reconcile failed for subject: {e}");
      }
    }
  }

  async fn reconcile_subject(
    &self,
    mut subject: Subject,
    today: NaiveDate,
  ) -> Result<(), S::Error> {
    let subject_id = subject.subject_id;

    let (expired, retained): (Vec<_>, Vec<_>) = subject
      .medicines
      .into_iter()
      .partition(|record| record_status(record, today) == RecordStatus::Expired);

    for record in &expired {
      self.store.remove_medicine(subject_id, record.record_id).await?;
      info!(%subject_id, medicine = %record.name, "expired course pruned");
    }

    if retained.is_empty() {
      let previous = self.snapshots().get(&subject_id).cloned();
      // A subject with no courses, nothing expiring, and no installed jobs
      // is freshly registered; leave them alone until they upload.
      if expired.is_empty() && previous.is_none() {
        return Ok(());
      }

      // The last course ran out (or a previous purge attempt failed
      // mid-way). Drop the subject entirely; they re-register by
      // uploading their next prescription.
      for spec in previous.iter().flatten() {
        self.scheduler.remove(&spec.job_id);
      }
      self.store.delete_subject(subject_id).await?;
      // The snapshot entry outlives a failed delete, so the purge is
      // retried on the next tick.
      self.snapshots().remove(&subject_id);
      info!(%subject_id, "subject purged, no remaining courses");
      return Ok(());
    }

    subject.medicines = retained;
    let desired = materialize_subject(&subject, today);

    // Lock only after all store awaits are done.
    let mut snapshots = self.snapshots();
    let previous = snapshots.get(&subject_id).map(Vec::as_slice).unwrap_or(&[]);
    if previous == desired.as_slice() {
      return Ok(());
    }

    // An empty desired set (all retained courses still future) holds no
    // snapshot entry rather than an empty one.
    let previous = if desired.is_empty() {
      snapshots.remove(&subject_id).unwrap_or_default()
    } else {
      snapshots.insert(subject_id, desired.clone()).unwrap_or_default()
    };
    for spec in &previous {
      self.scheduler.remove(&spec.job_id);
    }
    let jobs = desired.len();
    for spec in desired {
      self.scheduler.install(spec);
    }
    info!(%subject_id, jobs, "reminder jobs rebuilt");
    Ok(())
  }
}

/// Spawn the periodic reconcile loop. The first tick runs immediately, so
/// jobs are rebuilt from the store at startup.
pub fn spawn_reconcile_loop<S, C>(
  reconciler: Arc<Reconciler<S, C>>,
  interval: Duration,
) -> TaskHandle
where
  S: SubjectStore + 'static,
  C: Clock + 'static,
{
  let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

  let handle = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(interval);
    loop {
      tokio::select! {
        _ = ticker.tick() => reconciler.tick().await,
        _ = shutdown_rx.changed() => {
          info!("reconcile loop shutting down");
          return;
        }
      }
    }
  });

  TaskHandle::new(shutdown_tx, handle)
}
