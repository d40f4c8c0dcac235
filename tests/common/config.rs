//! Test configuration helpers for building confined orchestrators

use super::fixtures::{FakeEngine, FixedSpace, MIB, fake_tool};
use media_dl::{Config, Orchestrator, ProgressRelay, RelayReceiver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Host accepted by [`test_config`]
pub const TEST_HOST: &str = "video.example";

/// Single-video URL on [`TEST_HOST`]
pub const VIDEO_URL: &str = "https://video.example/watch?v=abc123";

/// Playlist URL on [`TEST_HOST`]
pub const PLAYLIST_URL: &str = "https://video.example/playlist?list=PL123";

/// Config confined to `root`, accepting [`TEST_HOST`], using a fake ffmpeg,
/// with default retry timing
pub fn test_config(root: &TempDir) -> Config {
    let mut config = Config::default();
    config.validation.allowed_hosts = vec![TEST_HOST.to_string()];
    config.output.allowed_roots = vec![root.path().to_path_buf()];
    config.output.fallback_dir = Some(root.path().join("fallback"));
    config.tools.executable_path = Some(fake_tool(root.path()));
    config.tools.search_path = false;
    config
}

/// Same as [`test_config`] with millisecond backoff
pub fn fast_retry_config(root: &TempDir) -> Config {
    let mut config = test_config(root);
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config
}

/// An orchestrator wired to a fake engine and a recording relay
pub struct TestSetup {
    pub root: TempDir,
    pub engine: Arc<FakeEngine>,
    pub orchestrator: Arc<Orchestrator>,
    pub events: RelayReceiver,
}

impl TestSetup {
    /// Default output directory inside the allowed root
    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("downloads")
    }
}

/// Build a [`TestSetup`] with `free_space` bytes reported free
pub fn create_setup(
    engine: FakeEngine,
    free_space: u64,
    configure: impl FnOnce(&TempDir) -> Config,
) -> TestSetup {
    let root = tempfile::tempdir().unwrap();
    let config = configure(&root);
    let engine = Arc::new(engine);
    let (relay, events) = ProgressRelay::channel();

    let orchestrator = Orchestrator::new(config, engine.clone(), relay)
        .unwrap()
        .with_disk_probe(Arc::new(FixedSpace(free_space)));

    TestSetup {
        root,
        engine,
        orchestrator: Arc::new(orchestrator),
        events,
    }
}

/// [`create_setup`] with plenty of space and fast retries
pub fn create_fast_setup(engine: FakeEngine) -> TestSetup {
    create_setup(engine, 10_000 * MIB, fast_retry_config)
}

/// Environment for live tests, read from `.env` when present
///
/// - `MEDIA_DL_LIVE_URL` - a short, public video URL (required)
/// - `MEDIA_DL_YTDLP` - path to yt-dlp (default: discovered on PATH)
pub fn load_live_env() -> Option<(String, Option<PathBuf>)> {
    dotenvy::dotenv().ok();
    let url = std::env::var("MEDIA_DL_LIVE_URL").ok()?;
    let ytdlp = std::env::var("MEDIA_DL_YTDLP").ok().map(PathBuf::from);
    Some((url, ytdlp))
}
