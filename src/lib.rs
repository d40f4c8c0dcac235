//! # media-dl
//!
//! Safe orchestration of media downloads driven by an external extractor.
//!
//! ## Design Philosophy
//!
//! media-dl sits between a user interface and a download engine such as
//! `yt-dlp`. It is designed to be:
//! - **Strict about input** - URLs, output directories and engine options are
//!   validated before anything runs
//! - **Resilient** - transient failures are retried with exponential backoff
//! - **Cancelable** - a shared flag is honored between attempts and during backoff
//! - **UI-friendly** - progress and outcomes are relayed to a single UI thread,
//!   with user-safe messages only
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadRequest, Orchestrator, ProgressRelay, YtDlpEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = YtDlpEngine::from_path().ok_or("yt-dlp not found")?;
//!     let (relay, mut events) = ProgressRelay::channel();
//!     let orchestrator = Arc::new(Orchestrator::new(Config::default(), Arc::new(engine), relay)?);
//!
//!     // Drain UI events on their own task
//!     tokio::spawn(async move {
//!         while let Some(event) = events.next().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = DownloadRequest::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "");
//!     let outcome = orchestrator.start(request).wait().await;
//!     println!("success: {}", outcome.is_success());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cooperative cancellation
pub mod cancel;
/// Failure classification and user-facing messages
pub mod classify;
/// Configuration types
pub mod config;
/// Download engine abstraction and the yt-dlp engine
pub mod engine;
/// Error types
pub mod error;
/// Download orchestration
pub mod orchestrator;
/// Persisted user preferences
pub mod preferences;
/// Quality and format presets
pub mod presets;
/// Progress relay to the UI
pub mod relay;
/// Disk space and external tool checks
pub mod resources;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// URL and output directory validation
pub mod validation;

// Re-export commonly used types
pub use cancel::CancelFlag;
pub use classify::{ClassifiedError, ErrorKind, classify};
pub use config::{
    Config, DiskSpaceConfig, EngineLimits, OutputPolicy, RetryConfig, ToolsConfig, UrlPolicy,
};
pub use engine::{DownloadEngine, EngineJob, YtDlpEngine};
pub use error::{EngineError, Error, PreflightError, Result, ValidationError};
pub use orchestrator::{Orchestrator, RunHandle};
pub use preferences::{PreferenceStore, Preferences};
pub use presets::{AudioFormat, VideoQuality};
pub use relay::{ProgressRelay, ProgressSink, RelayReceiver, RelaySender, UiSurface};
pub use types::{
    DownloadOutcome, DownloadRequest, EngineOptions, EngineProgress, RunEvent, RunId, UiEvent,
};

/// Wait for a download with graceful signal handling.
///
/// If a termination signal arrives first, the run is canceled and its final
/// outcome is still awaited, so the UI receives its terminal and ready events.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, DownloadRequest, Orchestrator, ProgressRelay, YtDlpEngine, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let engine = Arc::new(YtDlpEngine::from_path().ok_or("yt-dlp not found")?);
///     let (relay, _events) = ProgressRelay::channel();
///     let orchestrator = Arc::new(Orchestrator::new(Config::default(), engine, relay)?);
///
///     let handle = orchestrator.start(DownloadRequest::new("https://youtu.be/dQw4w9WgXcQ", ""));
///     let outcome = run_with_shutdown(handle).await;
///     println!("success: {}", outcome.is_success());
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(handle: RunHandle) -> DownloadOutcome {
    let cancel = handle.cancel_flag().clone();
    let wait = handle.wait();
    tokio::pin!(wait);

    tokio::select! {
        outcome = &mut wait => return outcome,
        _ = wait_for_signal() => {
            tracing::info!("Canceling download after shutdown signal");
            cancel.cancel();
        }
    }

    wait.await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
