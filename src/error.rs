//! Error types for media-dl
//!
//! This module provides the failure taxonomy used across the orchestration layer:
//! - [`ValidationError`] for rejected user input (URL, output directory, engine options)
//! - [`PreflightError`] for unmet environment preconditions
//! - [`EngineError`] for failures reported by the external download engine
//!
//! Validation and preflight messages are written to be shown to the user as-is.
//! Engine messages are raw and must go through [`crate::classify`] first.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// Request input was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Environment precondition failed before the engine was invoked
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// The download engine reported a failure
    #[error("download engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error for cases not covered by specific variants
    #[error("{0}")]
    Other(String),
}

/// Rejected request input
///
/// Every message here only echoes what the user supplied, so it is safe to display.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// URL is empty, too long, unparseable, not http(s), or has no host
    #[error("Invalid URL: {reason}")]
    EmptyOrMalformed {
        /// What was wrong with the input
        reason: String,
    },

    /// URL contains characters that are never valid in a media link
    #[error("URL contains disallowed characters")]
    DisallowedCharacters,

    /// URL host is not an allow-listed media service
    #[error("Unsupported site: {host}")]
    WrongHost {
        /// Host found in the URL
        host: String,
    },

    /// Playlist mode was requested but the URL is not a playlist
    #[error("Not a playlist URL (missing '{param}' parameter)")]
    PlaylistMismatch {
        /// Query parameter that marks a playlist
        param: String,
    },

    /// Output directory resolves outside the allowed roots
    #[error("Output directory is outside the allowed locations")]
    PathEscape {
        /// Resolved directory, for logs only
        path: PathBuf,
    },

    /// An allow-listed engine option carried an invalid value
    #[error("Unsupported value for option '{key}': {reason}")]
    UnsupportedOption {
        /// Option key
        key: String,
        /// Why the value was refused
        reason: String,
    },
}

/// Unmet environment precondition
#[derive(Debug, Error)]
pub enum PreflightError {
    /// Not enough free space in the output directory
    #[error(
        "Insufficient disk space: at least {} MiB must be free",
        .required / (1024 * 1024)
    )]
    InsufficientSpace {
        /// Required free bytes
        required: u64,
    },

    /// Required external executable could not be located
    #[error("Required tool '{name}' was not found. Install it or configure its path.")]
    ExecutableNotFound {
        /// Executable name
        name: String,
    },

    /// Output directory could not be created
    #[error("Cannot create the output directory")]
    DirectoryUnavailable {
        /// Directory that could not be created, for logs only
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a download engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine reported an error message
    #[error("{0}")]
    Reported(String),

    /// The engine process could not be started
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The engine process exited unsuccessfully without an error message
    #[error("engine exited with status {}", .code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    Exited {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
    },

    /// I/O error while talking to the engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
