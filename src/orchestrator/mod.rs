//! Download orchestration
//!
//! The [`Orchestrator`] turns one [`DownloadRequest`] into one
//! [`DownloadOutcome`]:
//!
//! 1. clear the cancel flag
//! 2. validate the URL
//! 3. validate and create the output directory (falling back when it escapes)
//! 4. check free disk space
//! 5. locate the required external tool
//! 6. sanitize engine options
//! 7. drive the engine through the [`RetryController`]
//! 8. report the outcome to the UI, followed by a ready event
//!
//! Steps 2-6 live in [`preflight`]. Any failure there ends the run before the
//! engine is invoked.

mod handle;
mod preflight;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use handle::RunHandle;

use crate::cancel::CancelFlag;
use crate::classify::classify;
use crate::config::Config;
use crate::engine::{DownloadEngine, EngineJob};
use crate::error::{Error, Result};
use crate::relay::{ProgressSink, RelaySender, RunReporter};
use crate::resources::{DiskSpaceProbe, SystemDiskSpace};
use crate::retry::RetryController;
use crate::types::{DownloadOutcome, DownloadRequest, RunId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runs downloads safely against a [`DownloadEngine`]
///
/// Cheap to share: wrap it in an `Arc` and call [`Orchestrator::start`] for
/// each download, or call [`Orchestrator::run`] from a worker task you own.
/// Each run tags its UI events with its own [`RunId`].
pub struct Orchestrator {
    config: Arc<Config>,
    engine: Arc<dyn DownloadEngine>,
    relay: RelaySender,
    disk_probe: Arc<dyn DiskSpaceProbe>,
    next_run: AtomicU64,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// Fails with [`Error::Config`] if the configuration is unusable.
    pub fn new(config: Config, engine: Arc<dyn DownloadEngine>, relay: RelaySender) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            engine,
            relay,
            disk_probe: Arc::new(SystemDiskSpace),
            next_run: AtomicU64::new(1),
        })
    }

    /// Replace the free-space probe
    pub fn with_disk_probe(mut self, probe: Arc<dyn DiskSpaceProbe>) -> Self {
        self.disk_probe = probe;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one download to completion
    ///
    /// `cancel` is cleared first, so a flag left set by an earlier run does
    /// not cancel this one. Exactly one terminal UI event and one ready event
    /// are emitted, on every exit path.
    pub async fn run(&self, request: DownloadRequest, cancel: &CancelFlag) -> DownloadOutcome {
        cancel.clear();
        let run = self.next_run_id();
        self.run_with_flag(run, request, cancel).await
    }

    /// Spawn a download on the tokio runtime with a fresh cancel flag
    pub fn start(self: &Arc<Self>, request: DownloadRequest) -> RunHandle {
        let run = self.next_run_id();
        let cancel = CancelFlag::new();
        let orchestrator = Arc::clone(self);
        let flag = cancel.clone();
        let task =
            tokio::spawn(async move { orchestrator.run_with_flag(run, request, &flag).await });
        RunHandle::new(run, cancel, task)
    }

    fn next_run_id(&self) -> RunId {
        RunId(self.next_run.fetch_add(1, Ordering::Relaxed))
    }

    async fn run_with_flag(
        &self,
        run: RunId,
        request: DownloadRequest,
        cancel: &CancelFlag,
    ) -> DownloadOutcome {
        let relay = self.relay.for_run(run);
        let reporter = RunReporter::new(relay.clone(), cancel.clone());
        let outcome = self.execute(&relay, &request, cancel).await;
        reporter.report(&outcome);
        outcome
    }

    async fn execute(
        &self,
        relay: &RelaySender,
        request: &DownloadRequest,
        cancel: &CancelFlag,
    ) -> DownloadOutcome {
        let run = relay.run_id();
        let job = match preflight::prepare(&self.config, self.disk_probe.as_ref(), request) {
            Ok(job) => job,
            Err(e) => {
                let classified = classify(e);
                tracing::warn!(
                    run = %run,
                    kind = %classified.kind,
                    error = %classified.cause,
                    "Download request rejected before starting"
                );
                return DownloadOutcome::Failed(classified);
            }
        };

        tracing::info!(
            run = %run,
            engine = self.engine.name(),
            host = %preflight::host_of(&job.url),
            output_dir = %job.output_dir.display(),
            playlist = !job.options.no_playlist,
            "Starting download"
        );

        let sink = relay.progress_sink();
        let mut controller = RetryController::new(&self.config.retry, cancel);
        let result = controller
            .run(|_attempt| self.attempt(&job, &sink))
            .await;

        match &result.outcome {
            DownloadOutcome::Succeeded => {
                tracing::info!(run = %run, attempts = result.attempts, "Download completed")
            }
            DownloadOutcome::Canceled => {
                tracing::info!(run = %run, attempts = result.attempts, "Download canceled")
            }
            DownloadOutcome::Failed(e) => {
                tracing::error!(
                    run = %run,
                    attempts = result.attempts,
                    kind = %e.kind,
                    "Download failed"
                )
            }
        }
        result.outcome
    }

    async fn attempt(&self, job: &EngineJob, sink: &ProgressSink) -> Result<()> {
        self.engine.download(job, sink).await.map_err(Error::from)
    }
}
