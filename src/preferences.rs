//! Persisted user preferences
//!
//! Remembers the last directory used for each kind of download and the last
//! chosen presets, as pretty-printed JSON at `~/.media-dl/preferences.json` by
//! default. A missing or unreadable file never blocks a download: defaults are
//! used and the problem is logged.

use crate::error::Result;
use crate::presets::{self, AudioFormat, VideoQuality};
use crate::types::DownloadRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the home directory holding the preferences file
pub const PREFERENCES_DIR: &str = ".media-dl";

/// Preferences file name
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Stored preferences
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Directory of the last video download
    pub last_video_dir: Option<PathBuf>,
    /// Directory of the last audio download
    pub last_audio_dir: Option<PathBuf>,
    /// Last chosen video quality
    pub video_quality: VideoQuality,
    /// Last chosen audio format
    pub audio_format: AudioFormat,
}

impl Preferences {
    /// Directory for the next video download
    pub fn video_dir(&self) -> PathBuf {
        self.last_video_dir.clone().unwrap_or_else(default_video_dir)
    }

    /// Directory for the next audio download
    pub fn audio_dir(&self) -> PathBuf {
        self.last_audio_dir.clone().unwrap_or_else(default_audio_dir)
    }

    /// Video request using the stored directory and quality
    pub fn video_request(&self, url: impl Into<String>, playlist_mode: bool) -> DownloadRequest {
        presets::video_request(url, self.video_dir(), self.video_quality, playlist_mode)
    }

    /// Audio request using the stored directory and format
    pub fn audio_request(&self, url: impl Into<String>, playlist_mode: bool) -> DownloadRequest {
        presets::audio_request(url, self.audio_dir(), self.audio_format, playlist_mode)
    }
}

/// Platform video folder, e.g. `~/Videos` or `~/Movies`
pub fn default_video_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Videos")))
        .unwrap_or_else(|| std::env::temp_dir().join("media-dl"))
}

/// Platform music folder, e.g. `~/Music`
pub fn default_audio_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
        .unwrap_or_else(|| std::env::temp_dir().join("media-dl"))
}

/// Preferences bound to a file
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    current: Preferences,
}

impl PreferenceStore {
    /// Default file location, if a home directory is known
    pub fn default_location() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(PREFERENCES_DIR).join(PREFERENCES_FILE))
    }

    /// Open the store at the default location
    pub fn open_default() -> Option<Self> {
        Self::default_location().map(Self::open)
    }

    /// Open the store at `path`, loading what is there
    ///
    /// A missing file is created with defaults. A file that cannot be read or
    /// parsed is left alone and defaults are used.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Invalid preferences file, using defaults");
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let store = Self {
                    path,
                    current: Preferences::default(),
                };
                store.save_logged();
                return store;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read preferences, using defaults");
                Preferences::default()
            }
        };

        Self { path, current }
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current preferences
    pub fn get(&self) -> &Preferences {
        &self.current
    }

    /// Change preferences and persist them
    ///
    /// A failed write is logged; the in-memory change is kept.
    pub fn update(&mut self, change: impl FnOnce(&mut Preferences)) {
        change(&mut self.current);
        self.save_logged();
    }

    /// Write preferences to disk, creating the parent directory
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.current)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }

    fn save_logged(&self) {
        if let Err(e) = self.save() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to save preferences");
        }
    }
}
