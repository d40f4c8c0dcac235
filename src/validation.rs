//! Input validation for URLs and output directories
//!
//! Everything here runs before the engine sees the request. Results are
//! normalized so that later stages never re-read the raw input.

use crate::config::{OutputPolicy, UrlPolicy};
use crate::error::{PreflightError, Result, ValidationError};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Characters that never appear in a legitimate media link
pub const DISALLOWED_URL_CHARS: &[char] = &['<', '>', '"', '{', '}', '|', '\\', '^', '`'];

/// Validate a media URL
///
/// Returns the trimmed input unchanged, so validating the result again yields
/// the same value.
pub fn validate_url(
    raw: &str,
    playlist_mode: bool,
    policy: &UrlPolicy,
) -> std::result::Result<String, ValidationError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(malformed("URL is empty"));
    }
    if trimmed.chars().count() > policy.max_url_length {
        return Err(malformed(&format!(
            "URL is longer than {} characters",
            policy.max_url_length
        )));
    }

    let parsed = Url::parse(trimmed).map_err(|_| malformed("not an absolute URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(malformed("only http and https links are supported"));
    }
    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
        _ => return Err(malformed("URL has no host")),
    };

    if trimmed.contains(DISALLOWED_URL_CHARS) {
        return Err(ValidationError::DisallowedCharacters);
    }

    if !host_allowed(&host, &policy.allowed_hosts) {
        return Err(ValidationError::WrongHost { host });
    }

    // Single-item mode accepts playlist links; the engine is told to take one item
    if playlist_mode && !has_query_param(&parsed, &policy.playlist_param) {
        return Err(ValidationError::PlaylistMismatch {
            param: policy.playlist_param.clone(),
        });
    }

    Ok(trimmed.to_string())
}

fn malformed(reason: &str) -> ValidationError {
    ValidationError::EmptyOrMalformed {
        reason: reason.to_string(),
    }
}

/// Exact match or subdomain of an allowed host
fn host_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| {
        let entry = entry.trim().trim_end_matches('.').to_ascii_lowercase();
        !entry.is_empty()
            && (host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

fn has_query_param(url: &Url, name: &str) -> bool {
    url.query_pairs()
        .any(|(key, value)| key == name && !value.trim().is_empty())
}

/// Validate, confine and create an output directory
///
/// The directory is created with owner-only permissions on Unix. Errors are
/// [`ValidationError::PathEscape`] when the path leaves the allowed roots and
/// [`PreflightError::DirectoryUnavailable`] when it cannot be created.
pub fn validate_output_dir(candidate: &Path, policy: &OutputPolicy) -> Result<PathBuf> {
    let resolved = resolve_path(candidate).map_err(|source| PreflightError::DirectoryUnavailable {
        path: candidate.to_path_buf(),
        source,
    })?;

    let roots = canonical_roots(&policy.roots());
    if !roots.iter().any(|root| resolved.starts_with(root)) {
        return Err(ValidationError::PathEscape { path: resolved }.into());
    }

    create_private_dir(&resolved).map_err(|source| PreflightError::DirectoryUnavailable {
        path: resolved.clone(),
        source,
    })?;

    Ok(resolved)
}

/// Resolve and create the fallback output directory
///
/// The fallback comes from configuration rather than the request, so it is
/// not confined to the allowed roots; the default (`~/Downloads`) usually
/// lies outside custom roots.
pub fn prepare_fallback_dir(policy: &OutputPolicy) -> Result<PathBuf> {
    let fallback = policy.fallback();
    let resolved = resolve_path(&fallback).map_err(|source| PreflightError::DirectoryUnavailable {
        path: fallback.clone(),
        source,
    })?;

    create_private_dir(&resolved).map_err(|source| PreflightError::DirectoryUnavailable {
        path: resolved.clone(),
        source,
    })?;

    Ok(resolved)
}

/// Resolve a path to an absolute, symlink-free form
///
/// Works for paths that do not exist yet: the longest existing ancestor is
/// canonicalized and the remaining (already normalized) components appended.
pub fn resolve_path(candidate: &Path) -> io::Result<PathBuf> {
    let expanded = expand_home(candidate);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };
    let normalized = normalize_lexically(&absolute);

    let mut existing = normalized.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut base) => {
                base.extend(missing.iter().rev());
                return Ok(base);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Remove `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }
    out
}

fn canonical_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .filter_map(|root| match resolve_path(root) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::debug!(root = %root.display(), error = %e, "Skipping unresolvable root");
                None
            }
        })
        .collect()
}

fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}
