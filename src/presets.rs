//! Quality and format presets
//!
//! Named choices a UI can offer in a dropdown, and builders that turn a choice
//! into a [`DownloadRequest`] with the matching engine options.

use crate::types::DownloadRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Fragments fetched in parallel for video downloads
pub const VIDEO_CONCURRENT_FRAGMENTS: u32 = 3;

/// Container video downloads are merged into
pub const VIDEO_MERGE_FORMAT: &str = "mp4";

/// Maximum video height
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoQuality {
    /// 360 lines
    #[serde(rename = "360p")]
    P360,
    /// 480 lines
    #[serde(rename = "480p")]
    P480,
    /// 720 lines
    #[serde(rename = "720p")]
    P720,
    /// 1080 lines
    #[default]
    #[serde(rename = "1080p")]
    P1080,
    /// 1440 lines
    #[serde(rename = "1440p (2K)")]
    P1440,
    /// 2160 lines
    #[serde(rename = "2160p (4K)")]
    P2160,
}

impl VideoQuality {
    /// Every preset, lowest first
    pub const ALL: [VideoQuality; 6] = [
        VideoQuality::P360,
        VideoQuality::P480,
        VideoQuality::P720,
        VideoQuality::P1080,
        VideoQuality::P1440,
        VideoQuality::P2160,
    ];

    /// Maximum frame height in pixels
    pub fn height(&self) -> u32 {
        match self {
            VideoQuality::P360 => 360,
            VideoQuality::P480 => 480,
            VideoQuality::P720 => 720,
            VideoQuality::P1080 => 1080,
            VideoQuality::P1440 => 1440,
            VideoQuality::P2160 => 2160,
        }
    }

    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            VideoQuality::P360 => "360p",
            VideoQuality::P480 => "480p",
            VideoQuality::P720 => "720p",
            VideoQuality::P1080 => "1080p",
            VideoQuality::P1440 => "1440p (2K)",
            VideoQuality::P2160 => "2160p (4K)",
        }
    }

    /// Format selector: best video and audio up to this height, else the best
    /// combined stream up to this height
    pub fn format_selector(&self) -> String {
        let h = self.height();
        format!("bv*[height<={h}]+ba/b[height<={h}]")
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VideoQuality {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|q| {
                q.label().eq_ignore_ascii_case(s)
                    || s.eq_ignore_ascii_case(&format!("{}p", q.height()))
            })
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// Audio extraction target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioFormat {
    /// MP3 at 320 kbit/s
    #[default]
    Mp3,
    /// AAC in an M4A container at 320 kbit/s
    M4a,
    /// Lossless FLAC
    Flac,
    /// Uncompressed WAV
    Wav,
    /// Opus at 320 kbit/s
    Opus,
}

impl AudioFormat {
    /// Every preset
    pub const ALL: [AudioFormat; 5] = [
        AudioFormat::Mp3,
        AudioFormat::M4a,
        AudioFormat::Flac,
        AudioFormat::Wav,
        AudioFormat::Opus,
    ];

    /// Codec name passed to the engine
    pub fn codec(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Opus => "opus",
        }
    }

    /// Bitrate in kbit/s, 0 for lossless formats
    pub fn quality(&self) -> u32 {
        match self {
            AudioFormat::Flac | AudioFormat::Wav => 0,
            AudioFormat::Mp3 | AudioFormat::M4a | AudioFormat::Opus => 320,
        }
    }

    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::M4a => "M4A",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Wav => "WAV",
            AudioFormat::Opus => "OPUS",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AudioFormat {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// A preset name that matches nothing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preset: {0}")]
pub struct UnknownPreset(pub String);

/// Request for a video download at `quality`, merged to mp4 with stream copy
pub fn video_request(
    url: impl Into<String>,
    output_dir: impl Into<PathBuf>,
    quality: VideoQuality,
    playlist_mode: bool,
) -> DownloadRequest {
    DownloadRequest::new(url, output_dir)
        .playlist(playlist_mode)
        .option("format", quality.format_selector())
        .option("merge_output_format", VIDEO_MERGE_FORMAT)
        .option("concurrent_fragments", VIDEO_CONCURRENT_FRAGMENTS)
        .option(
            "postprocessor_args",
            serde_json::json!(["-c:v", "copy", "-c:a", "copy"]),
        )
}

/// Request for audio extraction to `format`
pub fn audio_request(
    url: impl Into<String>,
    output_dir: impl Into<PathBuf>,
    format: AudioFormat,
    playlist_mode: bool,
) -> DownloadRequest {
    DownloadRequest::new(url, output_dir)
        .playlist(playlist_mode)
        .option("format", "bestaudio/best")
        .option("extract_audio", true)
        .option("audio_codec", format.codec())
        .option("audio_quality", format.quality())
}
