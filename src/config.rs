//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// URL acceptance rules
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UrlPolicy {
    /// Hosts accepted as media services; subdomains of each are accepted too
    /// (default: youtube.com, youtu.be)
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Maximum URL length in characters (default: 2048)
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,

    /// Query parameter that marks a playlist URL (default: "list")
    #[serde(default = "default_playlist_param")]
    pub playlist_param: String,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
            max_url_length: default_max_url_length(),
            playlist_param: default_playlist_param(),
        }
    }
}

/// Output directory confinement
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputPolicy {
    /// Directories output may be written under
    ///
    /// Empty means the user's home, the current working directory and the
    /// system temp directory.
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,

    /// Directory used when the requested one escapes the allowed roots
    /// (None = the platform download directory, or ~/Downloads)
    #[serde(default)]
    pub fallback_dir: Option<PathBuf>,
}

impl OutputPolicy {
    /// Allowed roots after applying the platform defaults
    ///
    /// Roots are not canonicalized here; see [`crate::validation::validate_output_dir`].
    pub fn roots(&self) -> Vec<PathBuf> {
        if !self.allowed_roots.is_empty() {
            return self.allowed_roots.clone();
        }

        let mut roots = Vec::with_capacity(3);
        if let Some(home) = dirs::home_dir() {
            roots.push(home);
        }
        if let Ok(cwd) = std::env::current_dir() {
            roots.push(cwd);
        }
        roots.push(std::env::temp_dir());
        roots
    }

    /// Fallback directory after applying the platform defaults
    pub fn fallback(&self) -> PathBuf {
        if let Some(dir) = &self.fallback_dir {
            return dir.clone();
        }
        dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .unwrap_or_else(|| std::env::temp_dir().join("media-dl"))
    }
}

/// Disk space checking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space in bytes (default: 500 MiB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
        }
    }
}

/// Required external executable
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Executable the engine needs for merging and conversion (default: "ffmpeg")
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Explicit path to the executable, tried first
    #[serde(default)]
    pub executable_path: Option<PathBuf>,

    /// Search the system PATH (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Extra locations tried after the platform defaults
    #[serde(default)]
    pub extra_candidates: Vec<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            executable_path: None,
            search_path: true,
            extra_candidates: Vec::new(),
        }
    }
}

/// Retry configuration for transient engine failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total engine invocations per run, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Hard limits applied to engine options
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Network socket timeout passed to the engine (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Largest file the engine may write, in bytes (default: 10 GiB)
    #[serde(default = "default_max_filesize")]
    pub max_filesize: u64,

    /// Upper bound for parallel fragment downloads (default: 10)
    #[serde(default = "default_max_concurrent_fragments")]
    pub max_concurrent_fragments: u32,

    /// Maximum items fetched from one playlist (default: 500)
    #[serde(default = "default_max_playlist_items")]
    pub max_playlist_items: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            socket_timeout: default_socket_timeout(),
            max_filesize: default_max_filesize(),
            max_concurrent_fragments: default_max_concurrent_fragments(),
            max_playlist_items: default_max_playlist_items(),
        }
    }
}

/// Main configuration for the download orchestrator
///
/// Every section has working defaults, so `Config::default()` is a complete
/// configuration for YouTube downloads through yt-dlp and ffmpeg.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// URL acceptance rules
    #[serde(default)]
    pub validation: UrlPolicy,

    /// Output directory confinement
    #[serde(default)]
    pub output: OutputPolicy,

    /// Disk space preflight
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,

    /// Required external executable
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry and backoff
    #[serde(default)]
    pub retry: RetryConfig,

    /// Engine option limits
    #[serde(default)]
    pub engine: EngineLimits,
}

impl Config {
    /// Parse a configuration from JSON text, then validate it
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the orchestrator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.validation.allowed_hosts.is_empty() {
            return Err(config_error(
                "at least one allowed host is required",
                "validation.allowed_hosts",
            ));
        }
        if self.validation.max_url_length == 0 {
            return Err(config_error(
                "max_url_length must be greater than zero",
                "validation.max_url_length",
            ));
        }
        if self.tools.executable.trim().is_empty() {
            return Err(config_error(
                "executable name must not be empty",
                "tools.executable",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error(
                "max_attempts must be at least 1",
                "retry.max_attempts",
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(config_error(
                "backoff_multiplier must be a finite number >= 1.0",
                "retry.backoff_multiplier",
            ));
        }
        if self.engine.max_concurrent_fragments == 0 {
            return Err(config_error(
                "max_concurrent_fragments must be at least 1",
                "engine.max_concurrent_fragments",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_true() -> bool {
    true
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["youtube.com".to_string(), "youtu.be".to_string()]
}

fn default_max_url_length() -> usize {
    2048
}

fn default_playlist_param() -> String {
    "list".to_string()
}

fn default_min_free_space() -> u64 {
    500 * 1024 * 1024 // 500 MiB
}

fn default_executable() -> String {
    "ffmpeg".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_filesize() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GiB
}

fn default_max_concurrent_fragments() -> u32 {
    10
}

fn default_max_playlist_items() -> u32 {
    500
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
