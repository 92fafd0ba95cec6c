use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("no documents selected")]
    EmptySelection,
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upload failed: {status} {body}")]
    Rejected { status: u16, body: String },
}

/// Failure of a single progress poll. Always treated as transient by the tracker.
#[derive(Error, Debug)]
pub enum PollingError {
    #[error("progress request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("progress request returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug)]
#[error("local storage unavailable: {0}")]
pub struct StorageUnavailable(pub String);
