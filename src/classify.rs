//! Failure classification
//!
//! Maps any [`Error`] into an [`ErrorKind`] and a message that is safe to show
//! to the user. Engine failures go through one ordered rule table. Validation
//! and preflight failures already carry user-safe text and keep it.

use crate::error::{Error, PreflightError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connectivity problem or timeout
    Network,
    /// Filesystem permission problem
    Permission,
    /// Not enough disk space
    DiskSpace,
    /// ffmpeg/ffprobe failure or absence
    ExternalTool,
    /// Content removed, private, or otherwise unavailable
    ContentUnavailable,
    /// Content requires age verification
    AgeRestricted,
    /// Request input was rejected before any download
    InvalidRequest,
    /// Anything not matched by a rule
    Unknown,
}

impl ErrorKind {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorKind::ContentUnavailable
                | ErrorKind::Permission
                | ErrorKind::AgeRestricted
                | ErrorKind::InvalidRequest
        )
    }

    /// Machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Permission => "permission",
            ErrorKind::DiskSpace => "disk_space",
            ErrorKind::ExternalTool => "external_tool",
            ErrorKind::ContentUnavailable => "content_unavailable",
            ErrorKind::AgeRestricted => "age_restricted",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Generic user-facing message for engine failures of this kind
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error occurred. Check your connection and try again.",
            ErrorKind::Permission => {
                "Permission error. Check write access to the output directory."
            }
            ErrorKind::DiskSpace => "Insufficient disk space. Free up space and try again.",
            ErrorKind::ExternalTool => "Required external tool error. Verify installation.",
            ErrorKind::ContentUnavailable => "Content is unavailable or private.",
            ErrorKind::AgeRestricted => "Content is age-restricted and cannot be downloaded.",
            ErrorKind::InvalidRequest => "The request was rejected. Check the URL and directory.",
            ErrorKind::Unknown => "Download failed. Check the URL and try again.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_code())
    }
}

/// A failure paired with its category and display text
///
/// `user_message` never contains raw engine output. `cause` is kept for logging.
#[derive(Debug, Error)]
#[error("{user_message}")]
pub struct ClassifiedError {
    /// Failure category
    pub kind: ErrorKind,
    /// Text safe to show in the UI
    pub user_message: String,
    /// Original error, for logs only
    #[source]
    pub cause: Error,
}

/// One classification rule
///
/// The rule matches when any group matches; a group matches when every term in
/// it occurs in the lowercased message.
struct Rule {
    groups: &'static [&'static [&'static str]],
    kind: ErrorKind,
}

/// Ordered rule table, first match wins
const RULES: &[Rule] = &[
    Rule {
        groups: &[&["network"], &["connection"], &["timeout"], &["timed out"]],
        kind: ErrorKind::Network,
    },
    Rule {
        groups: &[&["permission"], &["access denied"]],
        kind: ErrorKind::Permission,
    },
    Rule {
        groups: &[&["disk"], &["space"]],
        kind: ErrorKind::DiskSpace,
    },
    Rule {
        groups: &[&["ffmpeg"], &["ffprobe"]],
        kind: ErrorKind::ExternalTool,
    },
    Rule {
        groups: &[&["video unavailable"], &["private video"]],
        kind: ErrorKind::ContentUnavailable,
    },
    Rule {
        groups: &[&["age", "restricted"]],
        kind: ErrorKind::AgeRestricted,
    },
];

/// Categorize a raw failure message with the rule table
pub fn classify_message(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    RULES
        .iter()
        .find(|rule| {
            rule.groups
                .iter()
                .any(|group| group.iter().all(|term| lowered.contains(term)))
        })
        .map_or(ErrorKind::Unknown, |rule| rule.kind)
}

/// Classify an error into a kind and a user-safe message
pub fn classify(error: Error) -> ClassifiedError {
    let (kind, user_message) = match &error {
        Error::Validation(e) => (ErrorKind::InvalidRequest, e.to_string()),
        Error::Preflight(e) => {
            let kind = match e {
                PreflightError::InsufficientSpace { .. } => ErrorKind::DiskSpace,
                PreflightError::ExecutableNotFound { .. } => ErrorKind::ExternalTool,
                PreflightError::DirectoryUnavailable { .. } => ErrorKind::Permission,
            };
            (kind, e.to_string())
        }
        Error::Config { .. } => (ErrorKind::InvalidRequest, error.to_string()),
        other => {
            let kind = classify_message(&other.to_string());
            (kind, kind.user_message().to_string())
        }
    };

    ClassifiedError {
        kind,
        user_message,
        cause: error,
    }
}
