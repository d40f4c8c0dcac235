//! Fake engines, probes and tools for driving the orchestrator without network access

use async_trait::async_trait;
use media_dl::resources::DiskSpaceProbe;
use media_dl::{DownloadEngine, EngineError, EngineJob, EngineProgress, ProgressSink};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Step an engine call takes
#[derive(Clone, Debug)]
pub enum Step {
    /// Report progress figures
    Progress(EngineProgress),
    /// Fail with this raw engine message
    Fail(String),
    /// Finish successfully
    Succeed,
}

/// Engine whose calls follow a script; each call consumes one script entry
///
/// Once the script runs out, every call succeeds.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<VecDeque<Vec<Step>>>,
    started: Mutex<Vec<Instant>>,
    jobs: Mutex<Vec<EngineJob>>,
    count: AtomicU32,
}

impl FakeEngine {
    /// Engine that always succeeds
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Engine whose first `times` calls fail with `message`
    pub fn failing(message: &str, times: usize) -> Self {
        let calls = (0..times)
            .map(|_| vec![Step::Fail(message.to_string())])
            .collect();
        Self::scripted(calls)
    }

    /// Engine following an explicit per-call script
    pub fn scripted(calls: Vec<Vec<Step>>) -> Self {
        Self {
            calls: Mutex::new(calls.into()),
            ..Self::default()
        }
    }

    /// Number of engine invocations
    pub fn calls(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Start time of every invocation
    pub fn start_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    /// Job from the most recent invocation
    pub fn last_job(&self) -> Option<EngineJob> {
        self.jobs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DownloadEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn download(&self, job: &EngineJob, progress: &ProgressSink) -> Result<(), EngineError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(Instant::now());
        self.jobs.lock().unwrap().push(job.clone());

        let steps = self.calls.lock().unwrap().pop_front().unwrap_or_default();
        for step in steps {
            match step {
                Step::Progress(p) => progress.report(&p),
                Step::Fail(message) => return Err(EngineError::Reported(message)),
                Step::Succeed => return Ok(()),
            }
        }
        Ok(())
    }
}

/// Probe reporting a fixed amount of free space
pub struct FixedSpace(pub u64);

impl DiskSpaceProbe for FixedSpace {
    fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// Probe that cannot determine free space
pub struct BrokenProbe;

impl DiskSpaceProbe for BrokenProbe {
    fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
        Err(std::io::Error::other("statvfs failed"))
    }
}

/// Write an executable stand-in for ffmpeg into `dir`
pub fn fake_tool(dir: &Path) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(&path, b"#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// Progress figures halfway through a 10 MiB file at 1 MiB/s
pub fn halfway_progress() -> EngineProgress {
    EngineProgress {
        downloaded_bytes: Some(5 * MIB),
        total_bytes: Some(10 * MIB),
        speed_bps: Some(MIB),
        eta: Some(Duration::from_secs(5)),
        ..EngineProgress::default()
    }
}
