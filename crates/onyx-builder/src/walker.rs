//! Repository walking with standard and user-supplied ignore patterns

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, warn};

use onyx_core::{Language, OnyxError};

/// Always skipped, regardless of user configuration.
pub const DEFAULT_IGNORES: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/*.db",
    "**/.onyx-graphdb/**",
];

/// Compile the default plus user glob patterns. Bare patterns also match
/// anywhere in the tree (`foo` behaves like `**/foo/**` and `**/foo`).
pub fn ignore_set(user_patterns: &[String]) -> Result<GlobSet, OnyxError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_IGNORES {
        builder.add(Glob::new(pattern).expect("default ignore glob"));
    }
    for pattern in user_patterns {
        for expanded in [
            pattern.clone(),
            format!("**/{}", pattern),
            format!("**/{}/**", pattern),
        ] {
            match Glob::new(&expanded) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    warn!("ignoring bad glob pattern {}: {}", expanded, e);
                }
            }
        }
    }
    builder
        .build()
        .map_err(|e| OnyxError::store(format!("ignore patterns: {}", e)))
}

/// Collect analyzable source files under a root, repo-relative.
pub fn collect_source_files(
    root: &Path,
    user_patterns: &[String],
) -> Result<Vec<PathBuf>, OnyxError> {
    let ignores = ignore_set(user_patterns)?;
    let mut files = Vec::new();

    for entry in WalkBuilder::new(root).hidden(true).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("walk error: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if Language::from_path(path).is_none() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if ignores.is_match(relative) {
            continue;
        }
        files.push(relative.to_path_buf());
    }

    files.sort();
    debug!("collected {} source files under {}", files.len(), root.display());
    Ok(files)
}

/// Repo-relative path as a forward-slash string (the id form).
pub fn path_key(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
