//! Download engine abstraction
//!
//! The orchestrator talks to the external media extractor only through the
//! [`DownloadEngine`] trait. One call is one attempt; everything around it
//! (validation, retries, cancellation, classification) lives outside the engine.
//!
//! - [`YtDlpEngine`]: drives the `yt-dlp` command-line program
//! - [`sanitize_options`]: turns caller-supplied options into [`SanitizedOptions`]
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::engine::{DownloadEngine, YtDlpEngine};
//! use std::path::PathBuf;
//!
//! // Explicit path, or discover from PATH
//! let engine = YtDlpEngine::new(PathBuf::from("/usr/local/bin/yt-dlp"));
//! let engine = YtDlpEngine::from_path().unwrap_or(engine);
//! assert_eq!(engine.name(), "yt-dlp");
//! ```

pub mod options;
mod parser;
mod traits;
mod ytdlp;

pub use options::{SanitizedOptions, sanitize_options};
pub use parser::{EngineLine, parse_line};
pub use traits::{DownloadEngine, EngineJob, OUTPUT_TEMPLATE};
pub use ytdlp::YtDlpEngine;
