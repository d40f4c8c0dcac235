//! Engine option sanitization
//!
//! Callers hand the orchestrator an open key/value map. Only the keys listed in
//! [`ALLOWED_KEYS`] survive, each checked against an allow-list or clamped to
//! [`EngineLimits`]. Keys that could run commands or write outside the output
//! directory are removed outright.

use crate::config::EngineLimits;
use crate::error::ValidationError;
use crate::types::EngineOptions;
use serde_json::Value;
use std::time::Duration;

/// Keys that are always removed
pub const DENIED_KEYS: &[&str] = &[
    "exec",
    "exec_before_download",
    "external_downloader",
    "external_downloader_args",
    "ffmpeg_location",
    "outtmpl",
    "paths",
    "cookies",
    "cookiefile",
    "batchfile",
];

/// Keys that are forwarded after validation
pub const ALLOWED_KEYS: &[&str] = &[
    "format",
    "extract_audio",
    "audio_codec",
    "audio_quality",
    "merge_output_format",
    "concurrent_fragments",
    "postprocessor_args",
    "socket_timeout",
    "max_filesize",
    "playlist_end",
];

/// Accepted audio codecs
pub const AUDIO_CODECS: &[&str] = &["mp3", "aac", "opus", "vorbis", "flac", "wav", "m4a"];

/// Accepted merge containers
pub const MERGE_FORMATS: &[&str] = &["mp4", "webm", "mkv"];

/// Accepted postprocessor argument tokens, besides bare bitrates like `320k`
pub const POSTPROCESSOR_TOKENS: &[&str] = &[
    "-c:v", "-c:a", "copy", "-preset", "fast", "medium", "slow", "-crf", "18", "20", "22", "23",
    "24", "-b:v", "-b:a", "-vf", "-af",
];

const MAX_FORMAT_LEN: usize = 256;
const MAX_SOCKET_TIMEOUT_SECS: u64 = 300;
const MIN_AUDIO_QUALITY: u32 = 8;
const MAX_AUDIO_QUALITY: u32 = 320;

/// Engine options that passed sanitization
#[derive(Clone, Debug, PartialEq)]
pub struct SanitizedOptions {
    /// Format selector
    pub format: Option<String>,
    /// Extract the audio track
    pub extract_audio: bool,
    /// Target audio codec
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbit/s; 0 means best VBR
    pub audio_quality: Option<u32>,
    /// Container for merged video and audio
    pub merge_output_format: Option<String>,
    /// Parallel fragment downloads
    pub concurrent_fragments: Option<u32>,
    /// Arguments passed to ffmpeg postprocessing
    pub postprocessor_args: Vec<String>,
    /// Network socket timeout
    pub socket_timeout: Duration,
    /// Largest file the engine may write
    pub max_filesize: u64,
    /// Fetch only the single item even if the URL names a playlist
    pub no_playlist: bool,
    /// Last playlist item to fetch
    pub playlist_end: Option<u32>,
}

impl SanitizedOptions {
    /// Options with nothing set beyond the limits
    pub fn with_limits(limits: &EngineLimits) -> Self {
        Self {
            format: None,
            extract_audio: false,
            audio_codec: None,
            audio_quality: None,
            merge_output_format: None,
            concurrent_fragments: None,
            postprocessor_args: Vec::new(),
            socket_timeout: limits.socket_timeout,
            max_filesize: limits.max_filesize,
            no_playlist: true,
            playlist_end: None,
        }
    }
}

/// Filter and validate caller-supplied engine options
pub fn sanitize_options(
    raw: &EngineOptions,
    playlist_mode: bool,
    limits: &EngineLimits,
) -> Result<SanitizedOptions, ValidationError> {
    let mut out = SanitizedOptions::with_limits(limits);

    for (key, value) in raw {
        if DENIED_KEYS.contains(&key.as_str()) {
            tracing::warn!(option = %key, "Removed disallowed engine option");
            continue;
        }

        match key.as_str() {
            "format" => out.format = Some(format_selector(key, value)?),
            "extract_audio" => out.extract_audio = boolean(key, value)?,
            "audio_codec" => out.audio_codec = Some(one_of(key, value, AUDIO_CODECS)?),
            "audio_quality" => out.audio_quality = Some(audio_quality(key, value)?),
            "merge_output_format" => {
                out.merge_output_format = Some(one_of(key, value, MERGE_FORMATS)?)
            }
            "concurrent_fragments" => {
                let requested = unsigned(key, value)?;
                let max = u64::from(limits.max_concurrent_fragments.max(1));
                out.concurrent_fragments = Some(requested.clamp(1, max) as u32);
            }
            "postprocessor_args" => out.postprocessor_args = postprocessor_args(key, value)?,
            "socket_timeout" => {
                let secs = unsigned(key, value)?.clamp(1, MAX_SOCKET_TIMEOUT_SECS);
                out.socket_timeout = Duration::from_secs(secs);
            }
            "max_filesize" => out.max_filesize = unsigned(key, value)?.min(limits.max_filesize),
            "playlist_end" => {
                let end = unsigned(key, value)?.clamp(1, u64::from(u32::MAX));
                out.playlist_end = Some(end as u32);
            }
            _ => tracing::warn!(option = %key, "Removed unsupported engine option"),
        }
    }

    if playlist_mode {
        let cap = limits.max_playlist_items.max(1);
        out.no_playlist = false;
        out.playlist_end = Some(out.playlist_end.map_or(cap, |end| end.min(cap)));
    } else {
        out.no_playlist = true;
        out.playlist_end = None;
    }

    Ok(out)
}

fn unsupported(key: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::UnsupportedOption {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn format_selector(key: &str, value: &Value) -> Result<String, ValidationError> {
    let selector = value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| unsupported(key, "expected a string"))?;

    if selector.is_empty() || selector.len() > MAX_FORMAT_LEN {
        return Err(unsupported(
            key,
            format!("must be 1 to {MAX_FORMAT_LEN} characters"),
        ));
    }
    let valid = selector
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "[]<>=!*+/_-.,:()".contains(c));
    if !valid {
        return Err(unsupported(key, "contains characters not allowed in a format selector"));
    }
    Ok(selector.to_string())
}

fn boolean(key: &str, value: &Value) -> Result<bool, ValidationError> {
    value
        .as_bool()
        .ok_or_else(|| unsupported(key, "expected true or false"))
}

/// Non-negative integer, given as a number or a numeric string
fn unsigned(key: &str, value: &Value) -> Result<u64, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| unsupported(key, "expected a non-negative integer"))
}

fn one_of(key: &str, value: &Value, allowed: &[&str]) -> Result<String, ValidationError> {
    let choice = value
        .as_str()
        .map(|s| s.trim().to_ascii_lowercase())
        .ok_or_else(|| unsupported(key, "expected a string"))?;

    if allowed.contains(&choice.as_str()) {
        Ok(choice)
    } else {
        Err(unsupported(key, format!("must be one of {}", allowed.join(", "))))
    }
}

fn audio_quality(key: &str, value: &Value) -> Result<u32, ValidationError> {
    let requested = match value {
        Value::String(s) => s.trim().trim_end_matches(['k', 'K']).parse::<u64>().ok(),
        other => other.as_u64(),
    }
    .ok_or_else(|| unsupported(key, "expected a bitrate in kbit/s"))?;

    if requested == 0 {
        return Ok(0);
    }
    Ok(requested.clamp(u64::from(MIN_AUDIO_QUALITY), u64::from(MAX_AUDIO_QUALITY)) as u32)
}

fn postprocessor_args(key: &str, value: &Value) -> Result<Vec<String>, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| unsupported(key, "expected a list of arguments"))?;

    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let Some(arg) = item.as_str() else {
            return Err(unsupported(key, "expected a list of strings"));
        };
        if POSTPROCESSOR_TOKENS.contains(&arg) || is_bitrate(arg) {
            kept.push(arg.to_string());
        } else {
            tracing::warn!(argument = %arg, "Removed disallowed postprocessor argument");
        }
    }
    Ok(kept)
}

/// Digits with an optional k/M suffix, e.g. `192k`
fn is_bitrate(arg: &str) -> bool {
    let digits = arg.trim_end_matches(['k', 'K', 'm', 'M']);
    arg.len() - digits.len() <= 1 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
