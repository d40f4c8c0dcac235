//! yt-dlp output line parsing

use crate::types::EngineProgress;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Meaning of one line of yt-dlp output
#[derive(Clone, Debug, PartialEq)]
pub enum EngineLine {
    /// `[download]  12.5% of ~10.00MiB at 1.00MiB/s ETA 00:05`
    Progress(EngineProgress),
    /// `[download] Destination: <file>` (file name only)
    Destination(String),
    /// Video and audio streams are being merged
    Merging,
    /// The file exists already and was skipped
    AlreadyDownloaded,
    /// A postprocessor started; carries the postprocessor name
    PostProcessing(String),
    /// `ERROR: ...`
    Error(String),
    /// Anything else
    Other,
}

struct Patterns {
    progress: Regex,
    destination: Regex,
    postprocessor: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                progress: Regex::new(
                    r"^\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\d+(?:\.\d+)?)\s*([KMGT]?i?B)(?:\s+at\s+(\d+(?:\.\d+)?)\s*([KMGT]?i?B)/s)?(?:\s+ETA\s+(\S+))?",
                )
                .ok()?,
                destination: Regex::new(r"^\[download\]\s+Destination:\s+(.+)$").ok()?,
                postprocessor: Regex::new(r"^\[(ExtractAudio|VideoConvertor|VideoRemuxer|FFmpeg\w*)\]")
                    .ok()?,
            })
        })
        .as_ref()
}

/// Classify one line of yt-dlp output
pub fn parse_line(line: &str) -> EngineLine {
    let line = line.trim_end();

    if let Some(message) = line.strip_prefix("ERROR:") {
        return EngineLine::Error(format!("ERROR:{message}"));
    }
    if line.starts_with("[Merger]") {
        return EngineLine::Merging;
    }
    if line.contains("has already been downloaded") {
        return EngineLine::AlreadyDownloaded;
    }

    let Some(patterns) = patterns() else {
        return EngineLine::Other;
    };

    if let Some(caps) = patterns.progress.captures(line) {
        let percent = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok());
        let total_bytes = match (caps.get(2), caps.get(3)) {
            (Some(size), Some(unit)) => to_bytes(size.as_str(), unit.as_str()),
            _ => None,
        };
        let downloaded_bytes = match (percent, total_bytes) {
            (Some(p), Some(total)) => Some((f64::from(p) / 100.0 * total as f64) as u64),
            _ => None,
        };
        let speed_bps = match (caps.get(4), caps.get(5)) {
            (Some(speed), Some(unit)) => to_bytes(speed.as_str(), unit.as_str()),
            _ => None,
        };
        let eta = caps.get(6).and_then(|m| parse_eta(m.as_str()));

        return EngineLine::Progress(EngineProgress {
            percent,
            downloaded_bytes,
            total_bytes,
            speed_bps,
            eta,
        });
    }

    if let Some(caps) = patterns.destination.captures(line) {
        let path = caps.get(1).map_or("", |m| m.as_str());
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        return EngineLine::Destination(name.to_string());
    }

    if let Some(caps) = patterns.postprocessor.captures(line) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        return EngineLine::PostProcessing(name.to_string());
    }

    EngineLine::Other
}

/// Size with a binary (`KiB`) or decimal (`KB`) unit, in bytes
fn to_bytes(value: &str, unit: &str) -> Option<u64> {
    let value: f64 = value.parse().ok()?;
    let multiplier = match unit {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

/// `SS`, `MM:SS` or `HH:MM:SS`
fn parse_eta(text: &str) -> Option<Duration> {
    let mut secs: u64 = 0;
    let mut fields = 0;
    for part in text.split(':') {
        secs = secs.checked_mul(60)?.checked_add(part.parse().ok()?)?;
        fields += 1;
    }
    (1..=3).contains(&fields).then(|| Duration::from_secs(secs))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_with_speed_and_eta() {
        let line = "[download]  12.5% of ~ 10.00MiB at  1.00MiB/s ETA 00:05 (frag 3/40)";
        let EngineLine::Progress(progress) = parse_line(line) else {
            panic!("expected progress");
        };

        assert_eq!(progress.percent, Some(12.5));
        assert_eq!(progress.total_bytes, Some(10 * 1024 * 1024));
        assert_eq!(progress.downloaded_bytes, Some(10 * 1024 * 1024 / 8));
        assert_eq!(progress.speed_bps, Some(1024 * 1024));
        assert_eq!(progress.eta, Some(Duration::from_secs(5)));
    }

    #[test]
    fn progress_line_with_unknown_speed() {
        let line = "[download]   0.0% of 3.50MiB at Unknown B/s ETA Unknown";
        let EngineLine::Progress(progress) = parse_line(line) else {
            panic!("expected progress");
        };
        assert_eq!(progress.percent, Some(0.0));
        assert_eq!(progress.speed_bps, None);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn final_progress_line() {
        let line = "[download] 100% of   42.00KiB in 00:00:01 at 40.00KiB/s";
        let EngineLine::Progress(progress) = parse_line(line) else {
            panic!("expected progress");
        };
        assert_eq!(progress.percent, Some(100.0));
        assert_eq!(progress.total_bytes, Some(42 * 1024));
    }

    #[test]
    fn destination_keeps_file_name_only() {
        assert_eq!(
            parse_line("[download] Destination: /home/user/Music/Song Title.webm"),
            EngineLine::Destination("Song Title.webm".into())
        );
    }

    #[test]
    fn other_markers() {
        assert_eq!(
            parse_line("[Merger] Merging formats into \"x.mp4\""),
            EngineLine::Merging
        );
        assert_eq!(
            parse_line("[download] x.mp4 has already been downloaded"),
            EngineLine::AlreadyDownloaded
        );
        assert_eq!(
            parse_line("[ExtractAudio] Destination: x.mp3"),
            EngineLine::PostProcessing("ExtractAudio".into())
        );
        assert_eq!(
            parse_line("ERROR: [youtube] abc: Video unavailable"),
            EngineLine::Error("ERROR: [youtube] abc: Video unavailable".into())
        );
        assert_eq!(parse_line("[youtube] abc: Downloading webpage"), EngineLine::Other);
    }

    #[test]
    fn eta_formats() {
        assert_eq!(parse_eta("07"), Some(Duration::from_secs(7)));
        assert_eq!(parse_eta("01:05"), Some(Duration::from_secs(65)));
        assert_eq!(parse_eta("1:00:00"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_eta("Unknown"), None);
        assert_eq!(parse_eta("1:2:3:4"), None);
    }
}
