#![allow(dead_code)]

use async_trait::async_trait;
use medvault_client::error::{PollingError, SubmissionError};
use medvault_client::pending::PendingDocument;
use medvault_client::service::{ProcessingService, ProgressSnapshot, ServiceDiag, SubmissionConfig};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone)]
pub enum Step {
    Snap(ProgressSnapshot),
    Fail(u16),
}

/// Replays a fixed list of poll responses; the last one repeats forever.
pub struct ScriptedService {
    pub batch_id: String,
    steps: Vec<Step>,
    pub polls: AtomicUsize,
    pub submitted: Mutex<Vec<(Vec<String>, SubmissionConfig)>>,
    pub reject_upload: Option<(u16, String)>,
}

impl ScriptedService {
    pub fn new(batch_id: &str, steps: Vec<Step>) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            steps,
            polls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            reject_upload: None,
        }
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessingService for ScriptedService {
    async fn doctor(&self) -> ServiceDiag {
        ServiceDiag {
            base_url: "mock://".into(),
            ok: true,
            message: None,
            error: None,
        }
    }

    async fn submit(
        &self,
        documents: &[PendingDocument],
        config: &SubmissionConfig,
    ) -> Result<String, SubmissionError> {
        if let Some((status, body)) = &self.reject_upload {
            return Err(SubmissionError::Rejected {
                status: *status,
                body: body.clone(),
            });
        }
        let names = documents.iter().map(|d| d.filename.clone()).collect();
        self.submitted.lock().unwrap().push((names, config.clone()));
        Ok(self.batch_id.clone())
    }

    async fn progress(&self, _batch_id: &str) -> Result<ProgressSnapshot, PollingError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps[n.min(self.steps.len() - 1)].clone();
        match step {
            Step::Snap(s) => Ok(s),
            Step::Fail(status) => Err(PollingError::Status {
                status,
                body: "unavailable".into(),
            }),
        }
    }
}

pub fn pdf_result(label: &str, risk: &str, violations: usize) -> Value {
    json!({
        "page_count": 2,
        "original_pages": ["a", "b"],
        "redacted_pages": ["x", "y"],
        "classification": {"label": label, "confidence": 0.9},
        "compliance": {"risk": risk, "violations": vec!["SSN"; violations]},
        "download_url": "/download/doc.pdf"
    })
}

pub fn snap(batch_id: &str, processed: u64, total: u64, done_files: &[&str]) -> Step {
    let results = done_files
        .iter()
        .map(|f| entry(f, pdf_result("Lab Report", "low", 0)))
        .collect();
    Step::Snap(ProgressSnapshot {
        batch_id: batch_id.to_string(),
        processed,
        total,
        results,
    })
}

/// A `{filename: payload}` result entry.
pub fn entry(filename: &str, payload: Value) -> Value {
    let mut m = serde_json::Map::new();
    m.insert(filename.to_string(), payload);
    Value::Object(m)
}
