//! Core types for media-dl

use crate::classify::ClassifiedError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Identifier of one orchestration run
///
/// Runs started by the same [`crate::Orchestrator`] get increasing ids
/// starting at 1. Id 0 marks events sent outside any run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RunId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine option map as supplied by the caller
///
/// Untrusted: the orchestrator forwards only allow-listed keys, see
/// [`crate::engine::options::sanitize_options`].
pub type EngineOptions = BTreeMap<String, serde_json::Value>;

/// Input to one orchestration run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Raw URL as typed by the user
    pub url: String,

    /// Requested destination directory
    pub output_dir: PathBuf,

    /// Whether the URL is expected to be a playlist
    #[serde(default)]
    pub playlist_mode: bool,

    /// Engine options (sanitized before use)
    #[serde(default)]
    pub engine_options: EngineOptions,
}

impl DownloadRequest {
    /// Create a single-item request with no engine options
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            playlist_mode: false,
            engine_options: EngineOptions::new(),
        }
    }

    /// Set playlist mode
    pub fn playlist(mut self, playlist_mode: bool) -> Self {
        self.playlist_mode = playlist_mode;
        self
    }

    /// Add one engine option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.engine_options.insert(key.into(), value.into());
        self
    }
}

/// Terminal result of one run
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The engine finished successfully
    Succeeded,
    /// The user canceled the run
    Canceled,
    /// The run failed
    Failed(ClassifiedError),
}

impl DownloadOutcome {
    /// Whether the download completed
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Succeeded)
    }

    /// The failure, if the run failed
    pub fn error(&self) -> Option<&ClassifiedError> {
        match self {
            DownloadOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Raw progress figures reported by an engine
///
/// Engines fill whatever they know; missing values are left as `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineProgress {
    /// Percentage reported directly by the engine
    pub percent: Option<f32>,
    /// Bytes written so far
    pub downloaded_bytes: Option<u64>,
    /// Expected total bytes
    pub total_bytes: Option<u64>,
    /// Current speed in bytes per second
    pub speed_bps: Option<u64>,
    /// Estimated time remaining
    pub eta: Option<Duration>,
}

impl EngineProgress {
    /// Percentage in 0..=100, derived from byte counts when not reported directly
    pub fn resolved_percent(&self) -> f32 {
        let percent = match (self.percent, self.downloaded_bytes, self.total_bytes) {
            (Some(p), _, _) => p,
            (None, Some(done), Some(total)) if total > 0 => {
                (done as f64 / total as f64 * 100.0) as f32
            }
            _ => 0.0,
        };
        percent.clamp(0.0, 100.0)
    }

    /// Status line shown next to the progress bar
    pub fn status_text(&self) -> String {
        let mut text = format!("Downloading: {:.1}%", self.resolved_percent());
        match (self.speed_bps, self.eta) {
            (Some(speed), Some(eta)) => {
                text.push_str(&format!(
                    " (Speed: {:.1} MB/s, ETA: {}s)",
                    speed as f64 / (1024.0 * 1024.0),
                    eta.as_secs()
                ));
            }
            (Some(speed), None) => {
                text.push_str(&format!(
                    " (Speed: {:.1} MB/s)",
                    speed as f64 / (1024.0 * 1024.0)
                ));
            }
            _ => {}
        }
        text
    }
}

/// Event delivered to the UI dispatch loop
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Progress update
    Progress {
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Status line
        status: String,
    },

    /// Run finished successfully
    Succeeded,

    /// Run was canceled
    Canceled,

    /// Run failed
    Failed {
        /// User-safe message
        message: String,
    },

    /// Run is over; the start control may be re-enabled
    Ready,
}

impl UiEvent {
    /// Whether this event ends a run (success, cancel or failure)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UiEvent::Succeeded | UiEvent::Canceled | UiEvent::Failed { .. }
        )
    }
}

/// A [`UiEvent`] tagged with the run that produced it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Run the event belongs to
    pub run: RunId,
    /// The event itself
    #[serde(flatten)]
    pub event: UiEvent,
}
