//! Behavioural tests for the reminder subsystem, driven end to end against
//! the real SQLite store with a manual clock and a recording notifier.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicBool, Ordering},
};

use chrono::{NaiveDate, NaiveDateTime};
use dosewatch_core::{
  medicine::{MedicineRecord, NewMedicine},
  schedule::job_id,
  store::SubjectStore,
  subject::Subject,
  timeparse::DoseTime,
};
use dosewatch_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{
  clock::Clock,
  jobs::{JobScheduler, deliver},
  notify::{Notifier, NotifyError},
  reconcile::Reconciler,
};

// ─── Test doubles ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
  fn at(s: &str) -> Self {
    Self(Arc::new(Mutex::new(parse_dt(s))))
  }

  fn set(&self, s: &str) {
    *self.0.lock().unwrap() = parse_dt(s);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> NaiveDateTime { *self.0.lock().unwrap() }
}

fn parse_dt(s: &str) -> NaiveDateTime {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

#[derive(Default)]
struct RecordingNotifier {
  sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
  fn sent(&self) -> Vec<(String, String)> {
    self.sent.lock().unwrap().clone()
  }
}

impl Notifier for RecordingNotifier {
  async fn send(&self, to: &str, body: &str) -> Result<(), NotifyError> {
    self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
    Ok(())
  }
}

/// A `SqliteStore` wrapper with switchable fault injection, for exercising
/// the reconciler's error containment.
struct FaultStore {
  inner:            SqliteStore,
  fail_next_list:   AtomicBool,
  fail_next_delete: AtomicBool,
  broken_subject:   Mutex<Option<Uuid>>,
}

#[derive(Debug, thiserror::Error)]
enum FaultError {
  #[error("injected store failure")]
  Injected,
  #[error(transparent)]
  Store(#[from] dosewatch_store_sqlite::Error),
}

impl SubjectStore for FaultStore {
  type Error = FaultError;

  async fn add_subject(&self, contact: String) -> Result<Subject, FaultError> {
    Ok(self.inner.add_subject(contact).await?)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, FaultError> {
    Ok(self.inner.get_subject(id).await?)
  }

  async fn find_by_contact<'a>(
    &'a self,
    contact: &'a str,
  ) -> Result<Option<Subject>, FaultError> {
    Ok(self.inner.find_by_contact(contact).await?)
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>, FaultError> {
    if self.fail_next_list.swap(false, Ordering::SeqCst) {
      return Err(FaultError::Injected);
    }
    Ok(self.inner.list_subjects().await?)
  }

  async fn append_medicines(
    &self,
    subject_id: Uuid,
    input: Vec<NewMedicine>,
  ) -> Result<Vec<MedicineRecord>, FaultError> {
    Ok(self.inner.append_medicines(subject_id, input).await?)
  }

  async fn replace_medicines(
    &self,
    subject_id: Uuid,
    medicines: Vec<MedicineRecord>,
  ) -> Result<(), FaultError> {
    Ok(self.inner.replace_medicines(subject_id, medicines).await?)
  }

  async fn remove_medicine(
    &self,
    subject_id: Uuid,
    record_id: Uuid,
  ) -> Result<(), FaultError> {
    if *self.broken_subject.lock().unwrap() == Some(subject_id) {
      return Err(FaultError::Injected);
    }
    Ok(self.inner.remove_medicine(subject_id, record_id).await?)
  }

  async fn delete_subject(&self, subject_id: Uuid) -> Result<(), FaultError> {
    if self.fail_next_delete.swap(false, Ordering::SeqCst) {
      return Err(FaultError::Injected);
    }
    Ok(self.inner.delete_subject(subject_id).await?)
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct Harness {
  store:      Arc<SqliteStore>,
  scheduler:  Arc<JobScheduler>,
  clock:      ManualClock,
  reconciler: Reconciler<SqliteStore, ManualClock>,
}

async fn harness(now: &str) -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let scheduler = Arc::new(JobScheduler::new());
  let clock = ManualClock::at(now);
  let reconciler =
    Reconciler::new(Arc::clone(&store), Arc::clone(&scheduler), clock.clone());
  Harness { store, scheduler, clock, reconciler }
}

struct FaultHarness {
  store:      Arc<FaultStore>,
  scheduler:  Arc<JobScheduler>,
  clock:      ManualClock,
  reconciler: Reconciler<FaultStore, ManualClock>,
}

async fn fault_harness(now: &str) -> FaultHarness {
  let store = Arc::new(FaultStore {
    inner:            SqliteStore::open_in_memory().await.unwrap(),
    fail_next_list:   AtomicBool::new(false),
    fail_next_delete: AtomicBool::new(false),
    broken_subject:   Mutex::new(None),
  });
  let scheduler = Arc::new(JobScheduler::new());
  let clock = ManualClock::at(now);
  let reconciler =
    Reconciler::new(Arc::clone(&store), Arc::clone(&scheduler), clock.clone());
  FaultHarness { store, scheduler, clock, reconciler }
}

fn day(s: &str) -> NaiveDate { s.parse().unwrap() }

fn medicine(name: &str, times: &[(u8, u8)], start: &str, end: &str) -> NewMedicine {
  NewMedicine {
    name:       name.to_string(),
    times:      times
      .iter()
      .map(|&(hour, minute)| DoseTime { hour, minute })
      .collect(),
    start_date: day(start),
    end_date:   day(end),
    notes:      "after food".into(),
  }
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn tick_installs_jobs_for_active_courses() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  let records = h
    .store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0), (21, 0)], "2025-08-23", "2025-08-25")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;

  assert_eq!(h.scheduler.len(), 2);
  let morning = job_id(
    subject.subject_id,
    records[0].record_id,
    DoseTime { hour: 9, minute: 0 },
  );
  assert!(h.scheduler.contains(&morning));
}

#[tokio::test]
async fn tick_is_idempotent() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-25")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;
  let first = h.scheduler.jobs();
  h.reconciler.tick().await;

  assert_eq!(h.scheduler.jobs(), first);
  let stored = h.store.get_subject(subject.subject_id).await.unwrap().unwrap();
  assert_eq!(stored.medicines.len(), 1);
}

#[tokio::test]
async fn expired_course_is_pruned_from_store_and_scheduler() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![
        medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-24"),
        medicine("Vitamin D3", &[(7, 30)], "2025-08-23", "2025-09-23"),
      ],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 2);

  // Midnight passes the short course's end date.
  h.clock.set("2025-08-25 00:01");
  h.reconciler.tick().await;

  assert_eq!(h.scheduler.len(), 1);
  let stored = h.store.get_subject(subject.subject_id).await.unwrap().unwrap();
  assert_eq!(stored.medicines.len(), 1);
  assert_eq!(stored.medicines[0].name, "Vitamin D3");
}

#[tokio::test]
async fn subject_with_no_remaining_courses_is_purged() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-24")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 1);

  h.clock.set("2025-08-25 00:01");
  h.reconciler.tick().await;

  assert!(h.scheduler.is_empty());
  assert!(h.store.get_subject(subject.subject_id).await.unwrap().is_none());
  assert!(h.reconciler.tracked_subjects().is_empty());
}

#[tokio::test]
async fn freshly_registered_subject_is_not_purged() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();

  h.reconciler.tick().await;

  assert!(h.store.get_subject(subject.subject_id).await.unwrap().is_some());
  assert!(h.scheduler.is_empty());
}

#[tokio::test]
async fn future_course_activates_on_its_start_date() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Amoxicillin", &[(8, 0)], "2025-08-25", "2025-08-30")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;
  assert!(h.scheduler.is_empty());

  // Still future the next day, then active the day after.
  h.clock.set("2025-08-24 07:00");
  h.reconciler.tick().await;
  assert!(h.scheduler.is_empty());

  h.clock.set("2025-08-25 07:00");
  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 1);
}

/// Subjects with nothing to schedule today (fresh registrations, courses
/// that have not started) hold no snapshot entry. Tracking starts with the
/// first installed job.
#[tokio::test]
async fn subjects_without_jobs_hold_no_snapshot() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();

  h.reconciler.tick().await;
  assert!(h.reconciler.tracked_subjects().is_empty());

  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Amoxicillin", &[(8, 0)], "2025-08-25", "2025-08-30")],
    )
    .await
    .unwrap();
  h.reconciler.tick().await;
  assert!(h.reconciler.tracked_subjects().is_empty());

  h.clock.set("2025-08-25 07:00");
  h.reconciler.tick().await;
  assert_eq!(h.reconciler.tracked_subjects(), vec![subject.subject_id]);
}

#[tokio::test]
async fn unchanged_subjects_are_left_alone() {
  let h = harness("2025-08-23 07:00").await;
  let alice = h.store.add_subject("+15550001111".into()).await.unwrap();
  let bob = h.store.add_subject("+15550002222".into()).await.unwrap();
  let alice_records = h
    .store
    .append_medicines(
      alice.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-09-23")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;

  // Knock Alice's job out from under the reconciler. Her materialized set
  // has not changed, so a tick triggered by Bob must not touch it.
  let alice_job = job_id(
    alice.subject_id,
    alice_records[0].record_id,
    DoseTime { hour: 9, minute: 0 },
  );
  assert!(h.scheduler.remove(&alice_job));

  h.store
    .append_medicines(
      bob.subject_id,
      vec![medicine("Cetirizine", &[(22, 0)], "2025-08-23", "2025-09-23")],
    )
    .await
    .unwrap();
  h.reconciler.tick().await;

  assert!(!h.scheduler.contains(&alice_job));
  assert_eq!(h.scheduler.len(), 1);
}

#[tokio::test]
async fn appending_a_medicine_adds_jobs_without_disturbing_delivery_state() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-09-23")],
    )
    .await
    .unwrap();
  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 1);

  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Ibuprofen", &[(13, 0)], "2025-08-23", "2025-09-23")],
    )
    .await
    .unwrap();
  h.reconciler.tick().await;

  assert_eq!(h.scheduler.len(), 2);
}

// ─── Store failures ──────────────────────────────────────────────────────────

#[tokio::test]
async fn purge_is_retried_after_a_failed_delete() {
  let h = fault_harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-24")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 1);

  // The course expires and the purge's delete fails.
  h.clock.set("2025-08-25 00:01");
  h.store.fail_next_delete.store(true, Ordering::SeqCst);
  h.reconciler.tick().await;

  assert!(h.store.get_subject(subject.subject_id).await.unwrap().is_some());
  assert!(h.scheduler.is_empty());
  assert_eq!(h.reconciler.tracked_subjects(), vec![subject.subject_id]);

  // The next healthy tick finishes the purge, even though nothing is
  // expiring anymore.
  h.reconciler.tick().await;

  assert!(h.store.get_subject(subject.subject_id).await.unwrap().is_none());
  assert!(h.reconciler.tracked_subjects().is_empty());
}

#[tokio::test]
async fn one_subjects_store_failure_leaves_others_converged() {
  let h = fault_harness("2025-08-23 07:00").await;
  let alice = h.store.add_subject("+15550001111".into()).await.unwrap();
  let bob = h.store.add_subject("+15550002222".into()).await.unwrap();
  h.store
    .append_medicines(
      alice.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-24")],
    )
    .await
    .unwrap();
  let bob_records = h
    .store
    .append_medicines(
      bob.subject_id,
      vec![medicine("Vitamin D3", &[(7, 30)], "2025-08-23", "2025-09-23")],
    )
    .await
    .unwrap();

  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 2);

  // Alice's course expires, but every write to her document fails. Bob
  // picks up a second course at the same time.
  *h.store.broken_subject.lock().unwrap() = Some(alice.subject_id);
  let bob_new = h
    .store
    .append_medicines(
      bob.subject_id,
      vec![medicine("Cetirizine", &[(22, 0)], "2025-08-23", "2025-09-23")],
    )
    .await
    .unwrap();
  h.clock.set("2025-08-25 00:01");
  h.reconciler.tick().await;

  // Bob converged to both of his jobs despite Alice's failure.
  let vitamin = job_id(
    bob.subject_id,
    bob_records[0].record_id,
    DoseTime { hour: 7, minute: 30 },
  );
  let cetirizine = job_id(
    bob.subject_id,
    bob_new[0].record_id,
    DoseTime { hour: 22, minute: 0 },
  );
  assert!(h.scheduler.contains(&vitamin));
  assert!(h.scheduler.contains(&cetirizine));
  assert!(h.store.get_subject(alice.subject_id).await.unwrap().is_some());

  // Once her document heals, Alice's expired course is pruned and she is
  // purged as usual.
  *h.store.broken_subject.lock().unwrap() = None;
  h.reconciler.tick().await;

  assert!(h.store.get_subject(alice.subject_id).await.unwrap().is_none());
  assert_eq!(h.scheduler.len(), 2);
}

#[tokio::test]
async fn list_failure_skips_the_tick() {
  let h = fault_harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-25")],
    )
    .await
    .unwrap();

  h.store.fail_next_list.store(true, Ordering::SeqCst);
  h.reconciler.tick().await;
  assert!(h.scheduler.is_empty());

  h.reconciler.tick().await;
  assert_eq!(h.scheduler.len(), 1);
}

// ─── Firing and delivery ─────────────────────────────────────────────────────

#[tokio::test]
async fn due_jobs_deliver_one_minute_before_the_dose() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+919051330530".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0)], "2025-08-23", "2025-08-25")],
    )
    .await
    .unwrap();
  h.reconciler.tick().await;

  let notifier = RecordingNotifier::default();

  // Nothing due at 08:58.
  h.clock.set("2025-08-23 08:58");
  assert!(h.scheduler.due(h.clock.now()).is_empty());

  // The 09:00 dose fires at 08:59.
  h.clock.set("2025-08-23 08:59");
  for spec in h.scheduler.due(h.clock.now()) {
    deliver(&notifier, &spec).await;
  }

  let sent = notifier.sent();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].0, "+919051330530");
  assert!(sent[0].1.contains("09:00"));
  assert!(sent[0].1.contains("*Paracetamol*"));
  assert!(sent[0].1.contains("after food"));
}

/// A short course followed from registration to purge: jobs exist on every
/// day of the course and disappear, with the subject, once it ends.
#[tokio::test]
async fn three_day_course_lifecycle() {
  let h = harness("2025-08-23 07:00").await;
  let subject = h.store.add_subject("+15550001111".into()).await.unwrap();
  h.store
    .append_medicines(
      subject.subject_id,
      vec![medicine("Paracetamol", &[(9, 0), (21, 0)], "2025-08-23", "2025-08-25")],
    )
    .await
    .unwrap();

  let notifier = RecordingNotifier::default();

  for date in ["2025-08-23", "2025-08-24", "2025-08-25"] {
    h.clock.set(&format!("{date} 00:05"));
    h.reconciler.tick().await;
    assert_eq!(h.scheduler.len(), 2, "jobs missing on {date}");

    h.clock.set(&format!("{date} 20:59"));
    for spec in h.scheduler.due(h.clock.now()) {
      deliver(&notifier, &spec).await;
    }
  }
  assert_eq!(notifier.sent().len(), 3);

  h.clock.set("2025-08-26 00:05");
  h.reconciler.tick().await;

  assert!(h.scheduler.is_empty());
  assert!(h.store.get_subject(subject.subject_id).await.unwrap().is_none());
}
