pub mod http;
pub mod types;

use crate::error::{PollingError, SubmissionError};
use crate::pending::PendingDocument;
use async_trait::async_trait;

pub use types::{
    percent, PrivacyMode, ProgressSnapshot, ServiceDiag, SubmissionConfig, UploadAccepted,
};

/// The external document processor. Everything behind this is a black box.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    async fn doctor(&self) -> ServiceDiag;
    async fn submit(
        &self,
        documents: &[PendingDocument],
        config: &SubmissionConfig,
    ) -> Result<String, SubmissionError>;
    async fn progress(&self, batch_id: &str) -> Result<ProgressSnapshot, PollingError>;
}
