use crate::batch::Batch;
use crate::error::SubmissionError;
use crate::pending::{is_accepted, PendingSet};
use crate::service::{ProcessingService, SubmissionConfig};
use crate::util::{format_bytes, now_millis};
use tracing::{info, warn};

/// Sends the whole pending set as one batch.
///
/// Nothing local changes here; the returned [`Batch`] only carries the id
/// and document count until the tracker fills it in.
pub async fn dispatch<S: ProcessingService + ?Sized>(
    service: &S,
    pending: &PendingSet,
    config: &SubmissionConfig,
) -> Result<Batch, SubmissionError> {
    let docs = pending.current().ok_or(SubmissionError::EmptySelection)?;

    for doc in docs.iter().filter(|d| !is_accepted(&d.filename)) {
        warn!("{} has an unrecognized extension; the service may reject it", doc.filename);
    }

    let batch_id = service.submit(docs, config).await?;
    info!(
        batch_id = %batch_id,
        documents = docs.len(),
        size = %format_bytes(pending.total_bytes()),
        "batch dispatched"
    );
    Ok(Batch::new(batch_id, docs.len() as u64, now_millis()))
}
