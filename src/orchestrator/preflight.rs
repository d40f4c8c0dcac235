//! Request validation and preflight checks

use crate::config::Config;
use crate::engine::{EngineJob, sanitize_options};
use crate::error::{Error, PreflightError, Result, ValidationError};
use crate::resources::{DiskSpaceProbe, check_disk_space, resolve_and_validate_executable};
use crate::types::DownloadRequest;
use crate::validation::{prepare_fallback_dir, validate_output_dir, validate_url};
use std::path::{Path, PathBuf};

/// Validate a request and build the engine job, or fail before any download
pub(super) fn prepare(
    config: &Config,
    disk_probe: &dyn DiskSpaceProbe,
    request: &DownloadRequest,
) -> Result<EngineJob> {
    let url = validate_url(&request.url, request.playlist_mode, &config.validation)?;
    tracing::debug!(host = %host_of(&url), playlist = request.playlist_mode, "URL validated");

    let output_dir = output_dir(config, &request.output_dir)?;

    if config.disk_space.enabled
        && !check_disk_space(disk_probe, &output_dir, config.disk_space.min_free_space)
    {
        return Err(PreflightError::InsufficientSpace {
            required: config.disk_space.min_free_space,
        }
        .into());
    }

    let tool_location = resolve_and_validate_executable(&config.tools)?;

    let options = sanitize_options(
        &request.engine_options,
        request.playlist_mode,
        &config.engine,
    )?;

    Ok(EngineJob {
        url,
        output_dir,
        tool_location,
        options,
    })
}

/// Validated output directory, substituting the fallback when the request escapes
fn output_dir(config: &Config, requested: &Path) -> Result<PathBuf> {
    if requested.as_os_str().is_empty() {
        tracing::debug!("No output directory given, using fallback");
        return fallback_dir(config);
    }

    match validate_output_dir(requested, &config.output) {
        Err(Error::Validation(ValidationError::PathEscape { path })) => {
            tracing::warn!(
                requested = %path.display(),
                "Output directory outside allowed locations, using fallback"
            );
            fallback_dir(config)
        }
        other => other,
    }
}

fn fallback_dir(config: &Config) -> Result<PathBuf> {
    let dir = prepare_fallback_dir(&config.output)?;
    tracing::debug!(fallback = %dir.display(), "Fallback output directory ready");
    Ok(dir)
}

/// Host part of a URL, for logs that must not carry the full link
pub(super) fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid>".to_string())
}
