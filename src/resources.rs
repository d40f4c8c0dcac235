//! Preflight resource checks: free disk space and the required external executable

use crate::config::ToolsConfig;
use crate::error::PreflightError;
use std::path::{Path, PathBuf};

/// Source of free-space measurements
///
/// The orchestrator takes this as a trait object so tests can report any figure.
pub trait DiskSpaceProbe: Send + Sync {
    /// Bytes available to the current user on the filesystem holding `path`
    fn available_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Probe backed by the operating system
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemDiskSpace;

impl DiskSpaceProbe for SystemDiskSpace {
    fn available_space(&self, path: &Path) -> std::io::Result<u64> {
        get_available_space(path)
    }
}

/// Whether `dir` has at least `min_free` bytes available
///
/// Never fails: if the measurement errors, a warning is logged and the check
/// passes, leaving a real shortage to surface as an engine failure.
pub fn check_disk_space(probe: &dyn DiskSpaceProbe, dir: &Path, min_free: u64) -> bool {
    match probe.available_space(dir) {
        Ok(available) => {
            tracing::debug!(
                dir = %dir.display(),
                available_mb = available / (1024 * 1024),
                required_mb = min_free / (1024 * 1024),
                "Disk space check"
            );
            available >= min_free
        }
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "Could not measure free disk space, continuing"
            );
            true
        }
    }
}

/// Get available disk space for a given path
///
/// Uses platform-specific APIs:
/// - Linux/macOS: statvfs
/// - Windows: GetDiskFreeSpaceExW
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zero-initialized,
        // and stat is only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail counts blocks available to unprivileged users, in f_frsize units
            #[allow(clippy::unnecessary_cast)]
            let available_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out-pointer refers to a live u64.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}

/// Locate the required executable and confirm it can be run
///
/// Candidates are tried in order: the configured path, the system PATH (when
/// enabled), the conventional install locations for this platform, then any
/// configured extra candidates. The first regular, executable file wins.
pub fn resolve_and_validate_executable(tools: &ToolsConfig) -> Result<PathBuf, PreflightError> {
    let name = tools.executable.as_str();

    if let Some(path) = &tools.executable_path {
        if is_usable_executable(path) {
            tracing::debug!(tool = name, path = %path.display(), "Using configured executable");
            return Ok(path.clone());
        }
        tracing::warn!(
            tool = name,
            path = %path.display(),
            "Configured executable is missing or not executable, searching elsewhere"
        );
    }

    if tools.search_path {
        if let Ok(path) = which::which(name) {
            if is_usable_executable(&path) {
                tracing::debug!(tool = name, path = %path.display(), "Found executable in PATH");
                return Ok(path);
            }
        }
    }

    let fallback = platform_candidates(name)
        .into_iter()
        .chain(tools.extra_candidates.iter().cloned())
        .find(|candidate| is_usable_executable(candidate));

    match fallback {
        Some(path) => {
            tracing::debug!(tool = name, path = %path.display(), "Found executable in known location");
            Ok(path)
        }
        None => {
            tracing::warn!(tool = name, "Required executable not found");
            Err(PreflightError::ExecutableNotFound {
                name: name.to_string(),
            })
        }
    }
}

/// Conventional install locations outside PATH
fn platform_candidates(name: &str) -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        let exe = format!("{name}.exe");
        vec![
            PathBuf::from(name).join("bin").join(&exe),
            PathBuf::from(r"C:\ffmpeg\bin").join(&exe),
            PathBuf::from(r"C:\Program Files\ffmpeg\bin").join(&exe),
        ]
    }

    #[cfg(not(windows))]
    {
        ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]
            .iter()
            .map(|dir| Path::new(dir).join(name))
            .collect()
    }
}

/// Exists, is a regular file, and (on Unix) has an execute bit
fn is_usable_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
