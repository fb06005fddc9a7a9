//! The reminder subsystem: in-process job scheduling, store reconciliation,
//! and WhatsApp delivery.
//!
//! Two background loops cooperate around a shared [`JobScheduler`]:
//!
//! * the reconcile loop ([`Reconciler`]) periodically re-derives the set of
//!   reminder jobs that *should* exist from the store and converges the
//!   scheduler onto it, pruning expired courses along the way;
//! * the firing loop watches the clock and dispatches due jobs to a
//!   [`Notifier`].
//!
//! Everything takes a [`Clock`] so the whole subsystem is drivable from
//! tests without waiting on wall time.

pub mod clock;
pub mod jobs;
pub mod notify;
pub mod reconcile;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};
pub use jobs::{JobScheduler, spawn_firing_loop};
pub use notify::{Notifier, NotifyError, TwilioWhatsApp};
pub use reconcile::{Reconciler, spawn_reconcile_loop};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Handle to a spawned background loop, used for graceful shutdown.
pub struct TaskHandle {
  shutdown: watch::Sender<bool>,
  handle:   JoinHandle<()>,
}

impl TaskHandle {
  fn new(shutdown: watch::Sender<bool>, handle: JoinHandle<()>) -> Self {
    Self { shutdown, handle }
  }

  /// Signal the loop to stop and wait for it to finish.
  pub async fn stop(self) {
    let _ = self.shutdown.send(true);
    if let Err(e) = self.handle.await {
      warn!("background task aborted: {e}");
    }
  }
}
