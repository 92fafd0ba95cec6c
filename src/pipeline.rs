use crate::{
    batch::{flatten, Batch, FlatItem},
    config::Config,
    dispatch::dispatch,
    error::SubmissionError,
    pending::PendingSet,
    service::{ProcessingService, SubmissionConfig},
    store::{BatchStore, StoredBatch},
    tracker::{PollOptions, Progress, Subscription, Subscriptions, TrackOutcome},
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives one batch from the pending set to the local store:
/// dispatch, track until done, save.
pub struct Pipeline<S: ProcessingService + ?Sized> {
    cfg: Config,
    service: Arc<S>,
    store: Arc<BatchStore>,
    subscriptions: Arc<Subscriptions>,
}

#[derive(Debug)]
pub enum BatchOutcome {
    /// Completed and written (or already present) in the store.
    Stored(StoredBatch),
    /// Dispatched, but tracking stopped before completion.
    Detached { batch_id: String, reason: TrackOutcome },
}

impl<S: ProcessingService + ?Sized + 'static> Pipeline<S> {
    pub fn new(cfg: &Config, service: Arc<S>, store: Arc<BatchStore>) -> Self {
        Self {
            cfg: cfg.clone(),
            service,
            store,
            subscriptions: Arc::new(Subscriptions::new()),
        }
    }

    pub async fn submit(
        &self,
        pending: &PendingSet,
        submission: &SubmissionConfig,
    ) -> Result<Batch, SubmissionError> {
        dispatch(&*self.service, pending, submission).await
    }

    /// Polls `batch` to completion and persists it. The store write happens
    /// in the completion callback, which fires at most once per batch id for
    /// the life of this pipeline; a second call for the same id is `Inactive`.
    pub async fn await_completion<P>(
        &self,
        batch: Batch,
        cancel: &CancellationToken,
        on_progress: P,
    ) -> BatchOutcome
    where
        P: FnMut(&Progress) + Send + 'static,
    {
        let started = Instant::now();
        let batch_id = batch.id.clone();
        let store = Arc::clone(&self.store);
        let sub = Subscription::spawn(
            &self.subscriptions,
            Arc::clone(&self.service),
            batch,
            PollOptions::from(&self.cfg.polling),
            cancel,
            on_progress,
            move |done: &Batch| {
                store.save(done.to_stored());
            },
        );

        match sub.join().await {
            TrackOutcome::Completed(done) => {
                info!(
                    batch_id = %done.id,
                    documents = done.results.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "batch stored"
                );
                BatchOutcome::Stored(done.to_stored())
            }
            other => {
                warn!(batch_id = %batch_id, "tracking ended without completion: {:?}", other);
                BatchOutcome::Detached {
                    batch_id,
                    reason: other,
                }
            }
        }
    }

    pub async fn run<P>(
        &self,
        pending: &PendingSet,
        submission: &SubmissionConfig,
        cancel: &CancellationToken,
        on_progress: P,
    ) -> Result<BatchOutcome, SubmissionError>
    where
        P: FnMut(&Progress) + Send + 'static,
    {
        let batch = self.submit(pending, submission).await?;
        Ok(self.await_completion(batch, cancel, on_progress).await)
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }
}

/// Items shown on the results page: the latest batch, or all of them.
pub fn view_items(store: &BatchStore, all: bool) -> Vec<FlatItem> {
    let batches = store.load_all();
    if all {
        flatten(&batches)
    } else {
        flatten(&batches[..batches.len().min(1)])
    }
}
