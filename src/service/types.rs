use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Submission-wide policy tag forwarded to the processor; not interpreted locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyMode {
    #[default]
    Research,
    Patient,
    Insurance,
    Legal,
}

impl PrivacyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyMode::Research => "research",
            PrivacyMode::Patient => "patient",
            PrivacyMode::Insurance => "insurance",
            PrivacyMode::Legal => "legal",
        }
    }
}

impl fmt::Display for PrivacyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "research" => Ok(PrivacyMode::Research),
            "patient" => Ok(PrivacyMode::Patient),
            "insurance" => Ok(PrivacyMode::Insurance),
            "legal" => Ok(PrivacyMode::Legal),
            other => Err(format!(
                "unknown privacy mode: {other} (expected research|patient|insurance|legal)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub privacy_mode: PrivacyMode,
    pub user: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            privacy_mode: PrivacyMode::Research,
            user: "admin".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAccepted {
    pub batch_id: String,
}

/// One `GET /upload/progress/{id}` response.
///
/// `results` entries are `{filename: payload}` objects, kept raw because
/// payload shapes are open-ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub batch_id: String,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed == self.total
    }

    pub fn percent(&self) -> u8 {
        percent(self.processed, self.total)
    }
}

/// `round(processed / total * 100)`, with `total == 0` giving 0.
pub fn percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDiag {
    pub base_url: String,
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
