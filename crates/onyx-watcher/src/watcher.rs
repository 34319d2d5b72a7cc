//! Filesystem watcher bridge
//!
//! Translates notify's event stream into the engine's `WatchEvent`s,
//! filtering by extension and ignore patterns before anything reaches the
//! dispatcher.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error};

use onyx_core::OnyxError;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Owns the notify handle for one watched root. Events are filtered and
/// forwarded to the dispatcher channel; dropping this stops the watch.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn start(
        root: impl AsRef<Path>,
        extensions: Vec<String>,
        ignores: GlobSet,
        event_tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self, OnyxError> {
        let root = root.as_ref().to_path_buf();
        let filter_root = root.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        forward(event, &filter_root, &extensions, &ignores, &event_tx);
                    }
                    Err(e) => {
                        error!("filesystem watch error: {}", e);
                    }
                }
            })
            .map_err(|e| OnyxError::watcher(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| OnyxError::watcher(e.to_string()))?;
        debug!("watching {}", root.display());

        Ok(FileWatcher {
            _watcher: watcher,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn forward(
    event: notify::Event,
    root: &Path,
    extensions: &[String],
    ignores: &GlobSet,
    event_tx: &mpsc::UnboundedSender<WatchEvent>,
) {
    let make = |path: PathBuf| match event.kind {
        notify::EventKind::Create(_) => Some(WatchEvent::Created(path)),
        notify::EventKind::Modify(_) => Some(WatchEvent::Modified(path)),
        notify::EventKind::Remove(_) => Some(WatchEvent::Removed(path)),
        _ => None,
    };
    for path in event.paths {
        if !watchable(&path, root, extensions, ignores) {
            continue;
        }
        if let Some(watch_event) = make(path) {
            debug!("fs event: {:?}", watch_event);
            // A closed channel just means the engine is shutting down.
            let _ = event_tx.send(watch_event);
        }
    }
}

/// Whether a path is one the engine should care about.
pub fn watchable(path: &Path, root: &Path, extensions: &[String], ignores: &GlobSet) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let dotted = format!(".{}", ext);
    if !extensions.iter().any(|e| e == &dotted) {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    !ignores.is_match(relative)
}
