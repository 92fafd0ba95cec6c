//! Batch progress tracking.
//!
//! [`ProgressTracker`] is the per-batch state machine (`Idle -> Polling ->
//! Done`); [`track`] drives it against the service on a fixed interval until
//! completion, cancellation or (optionally) too many failed polls.
//! [`Subscription`] runs that loop as a task tied to a cancellation token;
//! [`Subscriptions`] keeps at most one live or finished task per batch id.

use crate::batch::Batch;
use crate::config::Polling;
use crate::service::{percent, ProcessingService, ProgressSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Polling(String),
    Done(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Progress(Progress),
    /// Emitted once, on the snapshot where `processed == total > 0`.
    Completed(Batch),
    /// Not polling, wrong batch, or already done.
    Ignored,
}

#[derive(Debug)]
pub struct ProgressTracker {
    state: TrackerState,
    batch: Option<Batch>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Idle,
            batch: None,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    /// Starts polling `batch`. A no-op returning `false` if this tracker is
    /// already polling or done for the same id.
    pub fn subscribe(&mut self, batch: Batch) -> bool {
        if let TrackerState::Polling(id) | TrackerState::Done(id) = &self.state {
            if *id == batch.id {
                debug!(batch_id = %id, "already subscribed");
                return false;
            }
        }
        self.state = TrackerState::Polling(batch.id.clone());
        self.batch = Some(batch);
        true
    }

    pub fn unsubscribe(&mut self) {
        self.state = TrackerState::Idle;
        self.batch = None;
    }

    pub fn observe(&mut self, snap: &ProgressSnapshot) -> Observation {
        let id = match &self.state {
            TrackerState::Polling(id) => id.clone(),
            _ => return Observation::Ignored,
        };
        if !snap.batch_id.is_empty() && snap.batch_id != id {
            return Observation::Ignored;
        }
        let Some(batch) = self.batch.as_mut() else {
            return Observation::Ignored;
        };

        batch.apply(snap);
        if snap.is_complete() && batch.is_complete() {
            self.state = TrackerState::Done(id);
            return Observation::Completed(batch.clone());
        }
        Observation::Progress(Progress {
            processed: batch.processed,
            total: batch.total,
            percent: percent(batch.processed, batch.total),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub backoff_max: Duration,
    /// 0 means never give up.
    pub max_consecutive_failures: u32,
}

impl From<&Polling> for PollOptions {
    fn from(p: &Polling) -> Self {
        Self {
            interval: p.interval(),
            backoff_max: p.backoff_max(),
            max_consecutive_failures: p.max_consecutive_failures,
        }
    }
}

impl PollOptions {
    /// Wait after `failures` consecutive failed polls: doubles each time, capped.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let factor = 1u32 << failures.min(16);
        self.interval.saturating_mul(factor).min(self.backoff_max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Completed(Batch),
    Cancelled,
    Abandoned { failures: u32 },
    /// The tracker was idle or already done when tracking started.
    Inactive,
}

/// Polls until the tracker reaches `Done`. `on_done` runs at most once and
/// never after cancellation.
pub async fn track<S, P, D>(
    service: &S,
    tracker: &mut ProgressTracker,
    opts: &PollOptions,
    cancel: &CancellationToken,
    mut on_progress: P,
    on_done: D,
) -> TrackOutcome
where
    S: ProcessingService + ?Sized,
    P: FnMut(&Progress),
    D: FnOnce(&Batch),
{
    let batch_id = match tracker.state() {
        TrackerState::Polling(id) => id.clone(),
        _ => return TrackOutcome::Inactive,
    };
    let mut failures = 0u32;

    loop {
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracker.unsubscribe();
                return TrackOutcome::Cancelled;
            }
            res = service.progress(&batch_id) => res,
        };

        let delay = match res {
            Ok(snap) => {
                failures = 0;
                match tracker.observe(&snap) {
                    Observation::Completed(batch) => {
                        info!(batch_id = %batch_id, total = batch.total, "batch complete");
                        on_done(&batch);
                        return TrackOutcome::Completed(batch);
                    }
                    Observation::Progress(p) => {
                        debug!(
                            batch_id = %batch_id,
                            "processed {}/{} ({}%)",
                            p.processed, p.total, p.percent
                        );
                        on_progress(&p);
                        opts.interval
                    }
                    Observation::Ignored => opts.interval,
                }
            }
            Err(e) => {
                failures += 1;
                if opts.max_consecutive_failures > 0 && failures >= opts.max_consecutive_failures {
                    warn!(batch_id = %batch_id, "giving up after {failures} failed polls: {e}");
                    tracker.unsubscribe();
                    return TrackOutcome::Abandoned { failures };
                }
                let delay = opts.backoff(failures);
                warn!(batch_id = %batch_id, "poll failed ({failures} in a row), retrying in {:?}: {e}", delay);
                delay
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracker.unsubscribe();
                return TrackOutcome::Cancelled;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Batch ids that already have a polling task, running or completed.
#[derive(Debug, Default)]
pub struct Subscriptions {
    claimed: Mutex<HashSet<String>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, batch_id: &str) -> bool {
        self.lock().contains(batch_id)
    }

    fn claim(&self, batch_id: &str) -> bool {
        self.lock().insert(batch_id.to_string())
    }

    fn release(&self, batch_id: &str) {
        self.lock().remove(batch_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A background polling task. Dropping or cancelling it stops polling.
pub struct Subscription {
    cancel: CancellationToken,
    handle: Option<JoinHandle<TrackOutcome>>,
}

impl Subscription {
    /// Spawns the polling task for `batch`. If `registry` already holds the
    /// id, nothing is spawned and [`Subscription::join`] yields `Inactive`.
    /// A completed id stays claimed; a cancelled or abandoned one is released.
    pub fn spawn<S, P, D>(
        registry: &Arc<Subscriptions>,
        service: Arc<S>,
        batch: Batch,
        opts: PollOptions,
        parent: &CancellationToken,
        on_progress: P,
        on_done: D,
    ) -> Self
    where
        S: ProcessingService + ?Sized + 'static,
        P: FnMut(&Progress) + Send + 'static,
        D: FnOnce(&Batch) + Send + 'static,
    {
        let cancel = parent.child_token();
        if !registry.claim(&batch.id) {
            debug!(batch_id = %batch.id, "already subscribed");
            return Self {
                cancel,
                handle: None,
            };
        }

        let token = cancel.clone();
        let registry = Arc::clone(registry);
        let handle = tokio::spawn(async move {
            let batch_id = batch.id.clone();
            let mut tracker = ProgressTracker::new();
            tracker.subscribe(batch);
            let outcome =
                track(&*service, &mut tracker, &opts, &token, on_progress, on_done).await;
            if !matches!(outcome, TrackOutcome::Completed(_)) {
                registry.release(&batch_id);
            }
            outcome
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(mut self) -> TrackOutcome {
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(TrackOutcome::Cancelled),
            None => TrackOutcome::Inactive,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
