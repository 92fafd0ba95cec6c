use super::{types::*, ProcessingService};
use crate::config::Config;
use crate::error::{PollingError, SubmissionError};
use crate::pending::PendingDocument;
use crate::util::service_url;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for the processor's `/upload` and `/upload/progress` endpoints.
pub struct HttpService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpService {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if cfg.service.request_timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.service.request_timeout_seconds));
        }
        let client = builder.build().with_context(|| "building HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.service.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        service_url(&self.base_url, path)
    }

    /// Fetches a processed artifact by its service-relative download reference.
    pub async fn download(&self, reference: &str) -> Result<Vec<u8>> {
        let url = self.url(reference);
        info!(url = %url, "downloading processed document");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("download failed: {} {}", status.as_u16(), body));
        }
        let bytes = resp.bytes().await.with_context(|| "reading download body")?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ProcessingService for HttpService {
    async fn doctor(&self) -> ServiceDiag {
        let url = self.url("/");
        let res = async {
            let resp = self.client.get(&url).send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;

        match res {
            Ok((status, body)) => {
                let message = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                    .or(Some(body));
                ServiceDiag {
                    base_url: self.base_url.clone(),
                    ok: status.is_success(),
                    message,
                    error: (!status.is_success()).then(|| format!("status {}", status.as_u16())),
                }
            }
            Err(e) => ServiceDiag {
                base_url: self.base_url.clone(),
                ok: false,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn submit(
        &self,
        documents: &[PendingDocument],
        config: &SubmissionConfig,
    ) -> Result<String, SubmissionError> {
        if documents.is_empty() {
            return Err(SubmissionError::EmptySelection);
        }

        let mut form = Form::new();
        for doc in documents {
            let part = Part::bytes(doc.bytes.clone()).file_name(doc.filename.clone());
            form = form.part("files", part);
        }
        form = form
            .text("privacy_mode", config.privacy_mode.as_str())
            .text("user", config.user.clone());

        let url = self.url("/upload");
        info!(url = %url, count = documents.len(), mode = %config.privacy_mode, "uploading batch");
        let resp = self.client.post(&url).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let accepted: UploadAccepted = resp.json().await?;
        debug!(batch_id = %accepted.batch_id, "upload accepted");
        Ok(accepted.batch_id)
    }

    async fn progress(&self, batch_id: &str) -> Result<ProgressSnapshot, PollingError> {
        let url = self.url(&format!("/upload/progress/{batch_id}"));
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PollingError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let snap: ProgressSnapshot = resp.json().await?;
        Ok(snap)
    }
}
