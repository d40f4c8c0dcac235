//! Download engine trait and job description

use super::options::SanitizedOptions;
use crate::error::EngineError;
use crate::relay::ProgressSink;
use async_trait::async_trait;
use std::path::PathBuf;

/// Output file name template; titles are truncated to 200 characters
pub const OUTPUT_TEMPLATE: &str = "%(title).200s.%(ext)s";

/// Everything an engine needs for one invocation
///
/// Built only from validated values: the URL has passed
/// [`crate::validation::validate_url`], the directory has been confined and
/// created, and the options contain allow-listed keys only.
#[derive(Clone, Debug)]
pub struct EngineJob {
    /// Validated media URL
    pub url: String,
    /// Validated output directory
    pub output_dir: PathBuf,
    /// Location of the required external tool (ffmpeg)
    pub tool_location: PathBuf,
    /// Sanitized engine options
    pub options: SanitizedOptions,
}

impl EngineJob {
    /// Output template confined to the output directory
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_TEMPLATE)
    }
}

/// A media extraction/download backend
///
/// One call to [`DownloadEngine::download`] is one attempt. Retrying, cancel
/// handling and error classification happen in the orchestrator.
///
/// # Examples
///
/// ```no_run
/// use media_dl::engine::{DownloadEngine, YtDlpEngine};
///
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found in PATH");
/// println!("using {}", engine.name());
/// ```
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Perform one download attempt, reporting progress through `progress`
    async fn download(&self, job: &EngineJob, progress: &ProgressSink)
    -> Result<(), EngineError>;
}
