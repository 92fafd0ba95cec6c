//! Session-wide user preferences.
//!
//! Read once from local storage at startup (defaults when absent or
//! unreadable) and held for the life of the process via [`init`] /
//! [`session`]. Updates are written back best-effort.

use crate::service::{PrivacyMode, SubmissionConfig};
use crate::storage::LocalStorage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};
use tracing::warn;

const PREFS_KEY: &str = "prefs";
const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {other} (expected light|dark)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub submission: SubmissionConfig,
    pub theme: Theme,
}

impl Preferences {
    pub fn load(storage: &LocalStorage) -> Self {
        let submission = storage
            .get(PREFS_KEY)
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str::<StoredPrefs>(&raw).ok())
            .map(StoredPrefs::into_submission)
            .unwrap_or_default();
        let theme = storage
            .get(THEME_KEY)
            .ok()
            .flatten()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        Self { submission, theme }
    }

    pub fn save(&self, storage: &LocalStorage) {
        let stored = StoredPrefs {
            privacy_mode: Some(self.submission.privacy_mode.as_str().to_string()),
            user: Some(self.submission.user.clone()),
        };
        match serde_json::to_string(&stored) {
            Ok(raw) => {
                if let Err(e) = storage.set(PREFS_KEY, &raw) {
                    warn!("preferences not persisted: {e}");
                }
            }
            Err(e) => warn!("could not serialize preferences: {e}"),
        }
        if let Err(e) = storage.set(THEME_KEY, self.theme.as_str()) {
            warn!("theme not persisted: {e}");
        }
    }
}

/// On-disk shape. Fields are loose so a bad value only resets that field.
#[derive(Debug, Serialize, Deserialize)]
struct StoredPrefs {
    #[serde(default)]
    privacy_mode: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

impl StoredPrefs {
    fn into_submission(self) -> SubmissionConfig {
        let defaults = SubmissionConfig::default();
        SubmissionConfig {
            privacy_mode: self
                .privacy_mode
                .and_then(|m| m.parse::<PrivacyMode>().ok())
                .unwrap_or(defaults.privacy_mode),
            user: self
                .user
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.user),
        }
    }
}

static SESSION: OnceLock<RwLock<Preferences>> = OnceLock::new();

/// Initializes the process-wide preferences from `storage`. Later calls are no-ops.
pub fn init(storage: &LocalStorage) -> &'static RwLock<Preferences> {
    SESSION.get_or_init(|| RwLock::new(Preferences::load(storage)))
}

/// The process-wide preferences; defaults if [`init`] was never called.
pub fn session() -> &'static RwLock<Preferences> {
    SESSION.get_or_init(|| RwLock::new(Preferences::default()))
}

/// Snapshot of the current session preferences.
pub fn current() -> Preferences {
    session()
        .read()
        .map(|p| p.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

/// Applies `f` to the session preferences and persists the result.
pub fn update(storage: &LocalStorage, f: impl FnOnce(&mut Preferences)) -> Preferences {
    let mut guard = session()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard);
    guard.save(storage);
    guard.clone()
}
