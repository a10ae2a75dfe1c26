//! Path resolution module
//!
//! Turns a request path into a filesystem path under the document root.
//! Traversal is rejected on the normalized string, before anything is
//! joined with the root, so a bad path never reaches the filesystem.

use std::path::{Path, PathBuf};

use crate::http::mime::extension_of;

/// Request path confined to the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Normalized path relative to the root (`.` for the root itself)
    pub relative: String,
    /// `root` joined with `relative`
    pub full: PathBuf,
    /// Lowercased extension
    pub extension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Path traversal rejected: {0}")]
pub struct TraversalError(pub String);

/// Collapse `.` and `..` segments and redundant separators.
///
/// `..` segments that climb above the start are kept, so callers can see
/// that the path escapes. An empty result becomes `.`.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(is_separator) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

#[cfg(windows)]
const fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[cfg(not(windows))]
const fn is_separator(c: char) -> bool {
    c == '/'
}

/// True when a normalized path escapes its base
pub fn is_traversal(normalized: &str) -> bool {
    normalized.starts_with("..") || normalized.contains("/../")
}

/// Normalize a request path relative to the root.
///
/// `/` maps to the main file.
pub fn normalize_request_path(request_path: &str, main_file: &str) -> String {
    if request_path == "/" {
        normalize(main_file)
    } else {
        normalize(request_path.strip_prefix('/').unwrap_or(request_path))
    }
}

/// Resolve a request path under `root`
pub fn resolve(
    root: &Path,
    main_file: &str,
    request_path: &str,
) -> Result<ResolvedTarget, TraversalError> {
    let relative = normalize_request_path(request_path, main_file);
    if is_traversal(&relative) {
        return Err(TraversalError(request_path.to_string()));
    }

    let full = if relative == "." {
        root.to_path_buf()
    } else {
        root.join(&relative)
    };
    let extension = extension_of(&full);

    Ok(ResolvedTarget {
        relative,
        full,
        extension,
    })
}
