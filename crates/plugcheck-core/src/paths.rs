//! # Source Directory Resolution
//!
//! `srcDir` in a plugin config is written relative to the config file, not
//! to the process working directory.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Resolve the declared source directory against the config file's
/// location and return it as an absolute, lexically normalised path.
///
/// An absolute `src_dir` is used as-is (after normalisation).
///
/// # Errors
///
/// Returns [`PathError::DoesNotExist`] or [`PathError::NotADirectory`] when
/// the result is not an existing directory.
pub fn resolve_src_dir(config_path: &Path, src_dir: &str) -> Result<PathBuf, PathError> {
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    let joined = config_dir.join(src_dir);
    let absolute = if joined.is_absolute() {
        joined
    } else {
        std::env::current_dir()
            .map_err(PathError::CurrentDir)?
            .join(joined)
    };
    let resolved = normalize(&absolute);

    if !resolved.exists() {
        return Err(PathError::DoesNotExist(resolved));
    }
    if !resolved.is_dir() {
        return Err(PathError::NotADirectory(resolved));
    }
    Ok(resolved)
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
