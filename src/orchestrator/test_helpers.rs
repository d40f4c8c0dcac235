//! Shared test helpers for orchestrator tests.

use crate::config::Config;
use crate::engine::{DownloadEngine, EngineJob};
use crate::error::EngineError;
use crate::orchestrator::Orchestrator;
use crate::relay::{ProgressRelay, ProgressSink, RelayReceiver, UiSurface};
use crate::resources::DiskSpaceProbe;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub(crate) const MIB: u64 = 1024 * 1024;

/// Engine that replays a script of results, then succeeds
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    script: Mutex<VecDeque<Result<(), String>>>,
    calls: AtomicU32,
    jobs: Mutex<Vec<EngineJob>>,
    on_call: Option<Box<dyn Fn(u32) + Send + Sync>>,
}

impl ScriptedEngine {
    pub(crate) fn succeeding() -> Self {
        Self::default()
    }

    pub(crate) fn failing_with(messages: &[&str]) -> Self {
        let script = messages.iter().map(|m| Err(m.to_string())).collect();
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    pub(crate) fn always_failing(message: &str, times: usize) -> Self {
        Self::failing_with(&vec![message; times])
    }

    /// Run `hook` with the 1-based call number at the start of every call
    pub(crate) fn with_hook(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(hook));
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_job(&self) -> Option<EngineJob> {
        self.jobs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DownloadEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn download(&self, job: &EngineJob, progress: &ProgressSink) -> Result<(), EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.on_call {
            hook(call);
        }
        self.jobs.lock().unwrap().push(job.clone());
        progress.status(50.0, format!("attempt {call}"));

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Err(message)) => Err(EngineError::Reported(message)),
            Some(Ok(())) | None => Ok(()),
        }
    }
}

/// Probe reporting a fixed amount of free space
pub(crate) struct FixedSpace(pub(crate) u64);

impl DiskSpaceProbe for FixedSpace {
    fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// UI that records every callback as a string
#[derive(Default)]
pub(crate) struct RecordingUi {
    pub(crate) events: Vec<String>,
}

impl RecordingUi {
    pub(crate) fn terminal_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| *e == "success" || *e == "canceled" || e.starts_with("error:"))
            .count()
    }
}

impl UiSurface for RecordingUi {
    fn on_progress(&mut self, percent: f32, status: &str) {
        self.events.push(format!("progress:{percent:.0}:{status}"));
    }
    fn on_success(&mut self) {
        self.events.push("success".into());
    }
    fn on_canceled(&mut self) {
        self.events.push("canceled".into());
    }
    fn on_error(&mut self, message: &str) {
        self.events.push(format!("error:{message}"));
    }
    fn on_ready(&mut self) {
        self.events.push("ready".into());
    }
}

/// Write an executable stand-in for ffmpeg
pub(crate) fn fake_tool(dir: &Path) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(&path, b"#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// Config confined to `root`, accepting `video.example`, with a fake tool
/// and millisecond backoff
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.validation.allowed_hosts = vec!["video.example".to_string()];
    config.output.allowed_roots = vec![root.to_path_buf()];
    config.output.fallback_dir = Some(root.join("fallback"));
    config.tools.executable_path = Some(fake_tool(root));
    config.tools.search_path = false;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(10);
    config
}

/// Everything a test needs to run the orchestrator
pub(crate) struct Harness {
    pub(crate) root: TempDir,
    pub(crate) engine: Arc<ScriptedEngine>,
    pub(crate) orchestrator: Orchestrator,
    pub(crate) receiver: RelayReceiver,
}

impl Harness {
    pub(crate) fn new(engine: ScriptedEngine) -> Self {
        Self::with_config(engine, |_| {})
    }

    pub(crate) fn with_config(engine: ScriptedEngine, adjust: impl FnOnce(&mut Config)) -> Self {
        let root = TempDir::new().unwrap();
        let mut config = test_config(root.path());
        adjust(&mut config);

        let engine = Arc::new(engine);
        let (sender, receiver) = ProgressRelay::channel();
        let orchestrator = Orchestrator::new(config, engine.clone(), sender)
            .unwrap()
            .with_disk_probe(Arc::new(FixedSpace(10_000 * MIB)));

        Self {
            root,
            engine,
            orchestrator,
            receiver,
        }
    }

    pub(crate) fn output_dir(&self) -> PathBuf {
        self.root.path().join("downloads")
    }

    /// Dispatch everything queued so far to a fresh recording UI
    pub(crate) fn drain_ui(&mut self) -> RecordingUi {
        let mut ui = RecordingUi::default();
        self.receiver.pump(&mut ui);
        ui
    }
}
