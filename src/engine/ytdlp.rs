//! yt-dlp engine using the external `yt-dlp` binary

use super::options::SanitizedOptions;
use super::parser::{EngineLine, parse_line};
use super::traits::{DownloadEngine, EngineJob};
use crate::error::EngineError;
use crate::relay::ProgressSink;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

const DESTINATION_DISPLAY_CHARS: usize = 50;

/// Download engine driving the `yt-dlp` command-line program
///
/// Progress is read from stdout one line at a time (`--newline`). On failure
/// the last `ERROR:` line becomes the error text.
#[derive(Clone, Debug)]
pub struct YtDlpEngine {
    binary_path: PathBuf,
}

impl YtDlpEngine {
    /// Create an engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Path of the binary this engine runs
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    /// Command-line arguments for one job
    ///
    /// The URL always comes last, after `--`, so it is never read as a flag.
    pub fn build_args(job: &EngineJob) -> Vec<OsString> {
        let opts: &SanitizedOptions = &job.options;
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--no-update".into(),
            "--no-color".into(),
            "--ignore-config".into(),
            "--socket-timeout".into(),
            opts.socket_timeout.as_secs().to_string().into(),
            "--max-filesize".into(),
            opts.max_filesize.to_string().into(),
            "--ffmpeg-location".into(),
            job.tool_location.clone().into_os_string(),
            "--output".into(),
            job.output_template().into_os_string(),
        ];

        if let Some(format) = &opts.format {
            args.push("--format".into());
            args.push(format.into());
        }

        if opts.extract_audio {
            args.push("--extract-audio".into());
            if let Some(codec) = &opts.audio_codec {
                args.push("--audio-format".into());
                args.push(codec.into());
            }
            if let Some(quality) = opts.audio_quality {
                args.push("--audio-quality".into());
                args.push(if quality == 0 {
                    "0".into()
                } else {
                    format!("{quality}K").into()
                });
            }
        }

        if let Some(container) = &opts.merge_output_format {
            args.push("--merge-output-format".into());
            args.push(container.into());
        }

        if let Some(fragments) = opts.concurrent_fragments {
            args.push("--concurrent-fragments".into());
            args.push(fragments.to_string().into());
        }

        if !opts.postprocessor_args.is_empty() {
            args.push("--postprocessor-args".into());
            args.push(format!("ffmpeg:{}", opts.postprocessor_args.join(" ")).into());
        }

        if opts.no_playlist {
            args.push("--no-playlist".into());
        } else {
            args.push("--yes-playlist".into());
            if let Some(end) = opts.playlist_end {
                args.push("--playlist-end".into());
                args.push(end.to_string().into());
            }
        }

        args.push("--".into());
        args.push(job.url.clone().into());
        args
    }
}

#[async_trait]
impl DownloadEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn download(&self, job: &EngineJob, progress: &ProgressSink) -> Result<(), EngineError> {
        let mut child = Command::new(&self.binary_path)
            .args(Self::build_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.binary_path.display().to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("stdout was not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("stderr was not captured")))?;

        let (stdout_error, stderr_error) = tokio::join!(
            read_output(stdout, Some(progress)),
            read_output(stderr, None)
        );
        let status = child.wait().await?;

        if status.success() {
            return Ok(());
        }

        let message = stderr_error?.or(stdout_error?);
        tracing::debug!(code = ?status.code(), "yt-dlp exited unsuccessfully");
        Err(match message {
            Some(message) => EngineError::Reported(message),
            None => EngineError::Exited {
                code: status.code(),
            },
        })
    }
}

/// Drain one output stream, forwarding progress; returns the last error line
async fn read_output<R>(
    stream: R,
    progress: Option<&ProgressSink>,
) -> Result<Option<String>, EngineError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut last_error = None;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // Output is in the locale encoding, which need not be UTF-8
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        match parse_line(line) {
            EngineLine::Error(message) => last_error = Some(message),
            EngineLine::Other => tracing::trace!(line = %line, "yt-dlp output"),
            event => {
                if let Some(sink) = progress {
                    forward(sink, event);
                }
            }
        }
    }

    Ok(last_error)
}

fn forward(sink: &ProgressSink, event: EngineLine) {
    match event {
        EngineLine::Progress(figures) => sink.report(&figures),
        EngineLine::Destination(name) => {
            let short: String = name.chars().take(DESTINATION_DISPLAY_CHARS).collect();
            sink.status(0.0, format!("Starting: {short}"));
        }
        EngineLine::Merging => sink.status(99.0, "Merging video and audio..."),
        EngineLine::AlreadyDownloaded => sink.status(100.0, "File already downloaded"),
        EngineLine::PostProcessing(name) if name == "ExtractAudio" => {
            sink.status(100.0, "Processing audio...")
        }
        EngineLine::PostProcessing(_) => sink.status(100.0, "Processing..."),
        EngineLine::Error(_) | EngineLine::Other => {}
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineLimits;
    use crate::relay::ProgressRelay;
    use crate::types::UiEvent;
    use std::path::Path;

    fn job(options: SanitizedOptions) -> EngineJob {
        EngineJob {
            url: "https://www.youtube.com/watch?v=abc".into(),
            output_dir: PathBuf::from("/home/user/Music"),
            tool_location: PathBuf::from("/usr/bin/ffmpeg"),
            options,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn baseline_arguments() {
        let args = strings(&YtDlpEngine::build_args(&job(SanitizedOptions::with_limits(
            &EngineLimits::default(),
        ))));

        assert_eq!(value_after(&args, "--socket-timeout"), Some("30"));
        assert_eq!(value_after(&args, "--ffmpeg-location"), Some("/usr/bin/ffmpeg"));
        assert_eq!(
            value_after(&args, "--output"),
            Some("/home/user/Music/%(title).200s.%(ext)s")
        );
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(
            &args[args.len() - 2..],
            &["--", "https://www.youtube.com/watch?v=abc"]
        );
    }

    #[test]
    fn audio_extraction_arguments() {
        let options = SanitizedOptions {
            extract_audio: true,
            audio_codec: Some("mp3".into()),
            audio_quality: Some(320),
            ..SanitizedOptions::with_limits(&EngineLimits::default())
        };
        let args = strings(&YtDlpEngine::build_args(&job(options)));

        assert!(args.contains(&"--extract-audio".to_string()));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("320K"));
    }

    #[test]
    fn playlist_and_video_arguments() {
        let options = SanitizedOptions {
            format: Some("bv*[height<=720]+ba/b[height<=720]".into()),
            merge_output_format: Some("mp4".into()),
            concurrent_fragments: Some(3),
            postprocessor_args: vec!["-c:v".into(), "copy".into()],
            no_playlist: false,
            playlist_end: Some(500),
            ..SanitizedOptions::with_limits(&EngineLimits::default())
        };
        let args = strings(&YtDlpEngine::build_args(&job(options)));

        assert_eq!(
            value_after(&args, "--format"),
            Some("bv*[height<=720]+ba/b[height<=720]")
        );
        assert_eq!(value_after(&args, "--merge-output-format"), Some("mp4"));
        assert_eq!(value_after(&args, "--concurrent-fragments"), Some("3"));
        assert_eq!(
            value_after(&args, "--postprocessor-args"),
            Some("ffmpeg:-c:v copy")
        );
        assert_eq!(value_after(&args, "--playlist-end"), Some("500"));
        assert!(!args.contains(&"--no-playlist".to_string()));
    }

    #[test]
    fn from_path_consistency_with_which_crate() {
        assert_eq!(
            which::which("yt-dlp").is_ok(),
            YtDlpEngine::from_path().is_some()
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let engine = YtDlpEngine::new(PathBuf::from("/nonexistent/media-dl/yt-dlp"));
        let (tx, _rx) = ProgressRelay::channel();

        let err = engine
            .download(
                &job(SanitizedOptions::with_limits(&EngineLimits::default())),
                &tx.progress_sink(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn fake_binary(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn progress_lines_are_forwarded() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_binary(
            dir.path(),
            "echo '[download]  50.0% of 2.00MiB at 1.00MiB/s ETA 00:01'\nexit 0",
        );
        let engine = YtDlpEngine::new(binary);
        let (tx, mut rx) = ProgressRelay::channel();

        engine
            .download(
                &job(SanitizedOptions::with_limits(&EngineLimits::default())),
                &tx.progress_sink(),
            )
            .await
            .unwrap();

        match rx.try_next() {
            Some(UiEvent::Progress { percent, status }) => {
                assert_eq!(percent, 50.0);
                assert_eq!(status, "Downloading: 50.0% (Speed: 1.0 MB/s, ETA: 1s)");
            }
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn last_error_line_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_binary(
            dir.path(),
            "echo 'ERROR: first' >&2\necho 'ERROR: [youtube] abc: Video unavailable' >&2\nexit 1",
        );
        let engine = YtDlpEngine::new(binary);
        let (tx, _rx) = ProgressRelay::channel();

        let err = engine
            .download(
                &job(SanitizedOptions::with_limits(&EngineLimits::default())),
                &tx.progress_sink(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "ERROR: [youtube] abc: Video unavailable"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_does_not_fail_download() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_binary(
            dir.path(),
            "printf '[download] Destination: Caf\\351.mp3\\n'\n\
             printf 'WARNING: \\377\\376 odd bytes\\n' >&2\n\
             echo '[download] 100.0% of 2.00MiB at 1.00MiB/s ETA 00:00'\n\
             exit 0",
        );
        let engine = YtDlpEngine::new(binary);
        let (tx, mut rx) = ProgressRelay::channel();

        engine
            .download(
                &job(SanitizedOptions::with_limits(&EngineLimits::default())),
                &tx.progress_sink(),
            )
            .await
            .unwrap();

        let mut saw_full = false;
        while let Some(event) = rx.try_next() {
            if let UiEvent::Progress { percent, .. } = event {
                saw_full |= percent == 100.0;
            }
        }
        assert!(saw_full, "progress after the undecodable line was lost");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_failure_reports_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let binary = fake_binary(dir.path(), "exit 3");
        let engine = YtDlpEngine::new(binary);
        let (tx, _rx) = ProgressRelay::channel();

        let err = engine
            .download(
                &job(SanitizedOptions::with_limits(&EngineLimits::default())),
                &tx.progress_sink(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Exited { code: Some(3) }));
    }
}
