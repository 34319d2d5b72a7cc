//! Onyx Watcher — live incremental analysis
//!
//! Watches repository roots, coalesces rapid filesystem events per path,
//! re-analyzes changed files on a bounded worker pool, and applies diffs
//! to the graph store through a single writer task. Subscribers observe
//! committed updates; they are invoked from the writer task and must not
//! block or call back into the engine.

pub mod differ;
pub mod watcher;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use globset::GlobSet;
use tokio::sync::{Mutex, RwLock, Semaphore, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use onyx_analyzer::{FileAnalysis, analyzer_for_path};
use onyx_builder::correlator::{self, FileSource};
use onyx_builder::resolver::{self, NameIndex};
use onyx_builder::walker;
use onyx_core::{Entity, OnyxError, UpdateStats};
use onyx_store::{GraphStore, QueryRows};

pub use watcher::{FileWatcher, WatchEvent};

/// Live-engine configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Only dispatch for these extensions (dotted form).
    pub watched_extensions: Vec<String>,
    /// Extra ignore globs on top of the standard skip list.
    pub ignore_patterns: Vec<String>,
    /// Coalescing window for rapid events on one path.
    pub debounce_interval: Duration,
    /// Bounded worker pool size for per-file analysis.
    pub max_concurrent_analyses: usize,
    /// Soft per-file analysis timeout; exceeding it preserves prior state.
    pub analysis_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            watched_extensions: [".py", ".go", ".ts", ".tsx", ".js", ".jsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: Vec::new(),
            debounce_interval: Duration::from_millis(200),
            max_concurrent_analyses: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            analysis_timeout: Duration::from_secs(10),
        }
    }
}

/// What happened to a file, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Observer of committed graph updates. Callbacks run on the writer task:
/// keep them short, and never call back into the engine from one.
pub trait Subscriber: Send + Sync {
    fn on_file_changed(&self, _path: &str, _change: ChangeKind) {}
    fn on_graph_updated(&self, _stats: &UpdateStats) {}
    fn on_error(&self, _error: &OnyxError) {}
}

/// Per-file lifecycle. `Deleted` is represented by removal from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    Queued,
    Analyzing,
    Tracked,
}

enum WriterMsg {
    Apply {
        path: String,
        change: ChangeKind,
        analysis: FileAnalysis,
        source_text: String,
        started: Instant,
        ack: Option<oneshot::Sender<Result<UpdateStats, OnyxError>>>,
    },
    Prune {
        path: String,
        ack: Option<oneshot::Sender<Result<UpdateStats, OnyxError>>>,
    },
    Fail {
        error: OnyxError,
    },
}

struct EngineInner {
    root: PathBuf,
    config: WatchConfig,
    store: Mutex<GraphStore>,
    states: RwLock<HashMap<String, FileState>>,
    subscribers: std::sync::Mutex<Vec<Arc<dyn Subscriber>>>,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
    event_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<WatchEvent>>>,
    writer_tx: mpsc::UnboundedSender<WriterMsg>,
    writer_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<WriterMsg>>>,
    semaphore: Semaphore,
    cancel: AtomicBool,
    ignores: GlobSet,
    watcher: std::sync::Mutex<Option<FileWatcher>>,
}

/// The live-analysis engine for one repository root.
pub struct LiveEngine {
    inner: Arc<EngineInner>,
}

impl LiveEngine {
    pub fn new(
        root: impl AsRef<Path>,
        store: GraphStore,
        config: WatchConfig,
    ) -> Result<Self, OnyxError> {
        let ignores = onyx_builder::walker::ignore_set(&config.ignore_patterns)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let permits = config.max_concurrent_analyses.max(1);

        Ok(LiveEngine {
            inner: Arc::new(EngineInner {
                root: root.as_ref().to_path_buf(),
                config,
                store: Mutex::new(store),
                states: RwLock::new(HashMap::new()),
                subscribers: std::sync::Mutex::new(Vec::new()),
                event_tx,
                event_rx: std::sync::Mutex::new(Some(event_rx)),
                writer_tx,
                writer_rx: std::sync::Mutex::new(Some(writer_rx)),
                semaphore: Semaphore::new(permits),
                cancel: AtomicBool::new(false),
                ignores,
                watcher: std::sync::Mutex::new(None),
            }),
        })
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.inner.subscribers.lock().unwrap().push(subscriber);
    }

    /// Spawn the dispatcher and writer tasks. Events flow once `watch()`
    /// attaches the filesystem watcher (or via `enqueue_event`).
    pub fn start(&self) -> Result<(), OnyxError> {
        let writer_rx = self
            .inner
            .writer_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| OnyxError::watcher("engine already started"))?;
        let event_rx = self
            .inner
            .event_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| OnyxError::watcher("engine already started"))?;

        tokio::spawn(writer_loop(self.inner.clone(), writer_rx));
        tokio::spawn(dispatch_loop(self.inner.clone(), event_rx));
        Ok(())
    }

    /// Attach the filesystem watcher to the root.
    pub fn watch(&self) -> Result<(), OnyxError> {
        let file_watcher = FileWatcher::start(
            &self.inner.root,
            self.inner.config.watched_extensions.clone(),
            self.inner.ignores.clone(),
            self.inner.event_tx.clone(),
        )?;
        *self.inner.watcher.lock().unwrap() = Some(file_watcher);
        info!("live engine watching {}", self.inner.root.display());
        Ok(())
    }

    /// Feed an event directly into the dispatcher, as the filesystem
    /// watcher does. Useful for deterministic exercising of the pipeline.
    pub fn enqueue_event(&self, event: WatchEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    /// Analyze one file immediately, bypassing the debounce window, and
    /// wait for the committed update.
    pub async fn update_file(&self, path: impl AsRef<Path>) -> Result<UpdateStats, OnyxError> {
        let inner = &self.inner;
        let key = relative_key(&inner.root, path.as_ref());
        let absolute = inner.root.join(&key);

        let (ack_tx, ack_rx) = oneshot::channel();
        if !absolute.exists() {
            inner
                .writer_tx
                .send(WriterMsg::Prune {
                    path: key,
                    ack: Some(ack_tx),
                })
                .map_err(|_| OnyxError::watcher("writer stopped"))?;
        } else {
            let started = Instant::now();
            let (analysis, text) =
                analyze_path(inner, &key, &absolute).await?;
            inner
                .writer_tx
                .send(WriterMsg::Apply {
                    path: key,
                    change: ChangeKind::Modified,
                    analysis,
                    source_text: text,
                    started,
                    ack: Some(ack_tx),
                })
                .map_err(|_| OnyxError::watcher("writer stopped"))?;
        }
        ack_rx
            .await
            .map_err(|_| OnyxError::watcher("writer dropped update"))?
    }

    /// Stop watching and cancel in-flight work at the next suspension point.
    pub fn shutdown(&self) {
        self.inner.cancel.store(true, Ordering::Relaxed);
        self.inner.watcher.lock().unwrap().take();
        info!("live engine stopped");
    }

    /// Read-only query against the current graph.
    pub async fn query(&self, text: &str) -> Result<QueryRows, OnyxError> {
        self.inner.store.lock().await.execute_query(text)
    }

    pub async fn entity_count(&self) -> usize {
        self.inner.store.lock().await.entity_count()
    }

    /// Look up one entity by id, cloned out of the store.
    pub async fn get_entity(&self, id: &str) -> Option<Entity> {
        self.inner.store.lock().await.get_entity(id).cloned()
    }

    /// Release the engine and hand the store back, persisted.
    pub async fn into_store(self) -> Result<GraphStore, OnyxError> {
        self.shutdown();
        let inner = Arc::try_unwrap(self.inner)
            .map_err(|_| OnyxError::watcher("engine tasks still hold references"))?;
        let mut store = inner.store.into_inner();
        store.save()?;
        Ok(store)
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    walker::path_key(relative)
}

/// Event dispatcher: owns the per-path debounce deadlines. Nothing else
/// touches them.
async fn dispatch_loop(
    inner: Arc<EngineInner>,
    mut event_rx: mpsc::UnboundedReceiver<WatchEvent>,
) {
    let mut pending: HashMap<String, (ChangeKind, Instant)> = HashMap::new();

    loop {
        if inner.cancel.load(Ordering::Relaxed) {
            break;
        }
        let next_deadline = pending
            .values()
            .map(|(_, deadline)| *deadline)
            .min()
            .unwrap_or_else(|| Instant::now() + Duration::from_millis(500));

        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let key = relative_key(&inner.root, event.path());
                let change = match event {
                    WatchEvent::Created(_) => ChangeKind::Created,
                    WatchEvent::Modified(_) => ChangeKind::Modified,
                    WatchEvent::Removed(_) => ChangeKind::Deleted,
                };
                let deadline = Instant::now() + inner.config.debounce_interval;
                // Later events win the kind; the window restarts each time.
                pending.insert(key.clone(), (change, deadline));
                let mut states = inner.states.write().await;
                let state = states.entry(key).or_insert(FileState::Queued);
                if *state != FileState::Analyzing {
                    *state = FileState::Queued;
                }
            }
            _ = tokio::time::sleep_until(next_deadline) => {
                let now = Instant::now();
                let due: Vec<(String, ChangeKind)> = pending
                    .iter()
                    .filter(|(_, (_, deadline))| *deadline <= now)
                    .map(|(path, (change, _))| (path.clone(), *change))
                    .collect();
                for (path, change) in due {
                    pending.remove(&path);
                    let mut states = inner.states.write().await;
                    if states.get(&path) == Some(&FileState::Analyzing) {
                        // Strict per-file serialisation: finish first, then
                        // pick the newer event up in a fresh window.
                        pending.insert(
                            path.clone(),
                            (change, now + inner.config.debounce_interval),
                        );
                        continue;
                    }
                    states.insert(path.clone(), FileState::Analyzing);
                    drop(states);
                    tokio::spawn(run_analysis(inner.clone(), path, change));
                }
            }
        }
    }
    debug!("dispatcher stopped");
}

/// One unit of work on the bounded pool: read, parse, hand to the writer.
async fn run_analysis(inner: Arc<EngineInner>, path: String, change: ChangeKind) {
    let Ok(_permit) = inner.semaphore.acquire().await else {
        return;
    };
    if inner.cancel.load(Ordering::Relaxed) {
        return;
    }

    let absolute = inner.root.join(&path);
    if change == ChangeKind::Deleted || !absolute.exists() {
        let _ = inner.writer_tx.send(WriterMsg::Prune { path, ack: None });
        return;
    }

    let started = Instant::now();
    match analyze_path(&inner, &path, &absolute).await {
        Ok((analysis, text)) => {
            if inner.cancel.load(Ordering::Relaxed) {
                // Cancelled: discard partial results, prior state stands.
                return;
            }
            let _ = inner.writer_tx.send(WriterMsg::Apply {
                path,
                change,
                analysis,
                source_text: text,
                started,
                ack: None,
            });
        }
        Err(error) => {
            inner.states.write().await.insert(path, FileState::Tracked);
            let _ = inner.writer_tx.send(WriterMsg::Fail { error });
        }
    }
}

/// Read and analyze one file under the soft timeout. Pure CPU work runs
/// on the blocking pool.
async fn analyze_path(
    inner: &EngineInner,
    key: &str,
    absolute: &Path,
) -> Result<(FileAnalysis, String), OnyxError> {
    let Some(analyzer) = analyzer_for_path(absolute) else {
        return Err(OnyxError::watcher(format!(
            "no analyzer for {}",
            absolute.display()
        )));
    };
    if inner.cancel.load(Ordering::Relaxed) {
        return Err(OnyxError::watcher("cancelled"));
    }
    let bytes = tokio::fs::read(absolute).await?;
    if inner.cancel.load(Ordering::Relaxed) {
        return Err(OnyxError::watcher("cancelled"));
    }

    let key_owned = key.to_string();
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let work = tokio::task::spawn_blocking(move || analyzer.analyze_file(&key_owned, &bytes));
    let analysis = tokio::time::timeout(inner.config.analysis_timeout, work)
        .await
        .map_err(|_| OnyxError::AnalysisTimeout {
            path: key.to_string(),
            limit_secs: inner.config.analysis_timeout.as_secs(),
        })?
        .map_err(|e| OnyxError::watcher(format!("analysis task failed: {}", e)))?;
    Ok((analysis, text))
}

/// The single writer: every store mutation happens here, and subscriber
/// callbacks fire only after the mutation has committed.
async fn writer_loop(inner: Arc<EngineInner>, mut writer_rx: mpsc::UnboundedReceiver<WriterMsg>) {
    while let Some(msg) = writer_rx.recv().await {
        if inner.cancel.load(Ordering::Relaxed) {
            break;
        }
        match msg {
            WriterMsg::Apply {
                path,
                change,
                analysis,
                source_text,
                started,
                ack,
            } => {
                let result = apply_analysis(&inner, &path, analysis, source_text, started).await;
                match &result {
                    Ok(stats) => {
                        inner
                            .states
                            .write()
                            .await
                            .insert(path.clone(), FileState::Tracked);
                        notify(&inner, |s| s.on_file_changed(&path, change));
                        let stats = stats.clone();
                        notify(&inner, |s| s.on_graph_updated(&stats));
                    }
                    Err(error) => {
                        // Prior state for the file is preserved.
                        inner
                            .states
                            .write()
                            .await
                            .insert(path.clone(), FileState::Tracked);
                        notify(&inner, |s| s.on_error(error));
                    }
                }
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
            }
            WriterMsg::Prune { path, ack } => {
                let started = Instant::now();
                let mut store = inner.store.lock().await;
                let (entities_removed, relationships_removed) =
                    store.delete_entities_by_file(&path);
                let save_result = store.save();
                drop(store);
                inner.states.write().await.remove(&path);

                let result = match save_result {
                    Ok(()) => {
                        let stats = UpdateStats {
                            entities_removed,
                            relationships_removed,
                            files_updated: 1,
                            processing_time: started.elapsed(),
                            ..Default::default()
                        };
                        notify(&inner, |s| s.on_file_changed(&path, ChangeKind::Deleted));
                        let cloned = stats.clone();
                        notify(&inner, |s| s.on_graph_updated(&cloned));
                        Ok(stats)
                    }
                    Err(error) => {
                        notify(&inner, |s| s.on_error(&error));
                        Err(error)
                    }
                };
                if let Some(ack) = ack {
                    let _ = ack.send(result);
                }
            }
            WriterMsg::Fail { error } => {
                warn!("analysis failed: {}", error);
                notify(&inner, |s| s.on_error(&error));
            }
        }
    }
    debug!("writer stopped");
}

fn notify(inner: &EngineInner, f: impl Fn(&dyn Subscriber)) {
    let subscribers = inner.subscribers.lock().unwrap().clone();
    for subscriber in subscribers {
        f(subscriber.as_ref());
    }
}

/// Diff one file's fresh analysis into the store: supersede its prior
/// entities, re-resolve the fresh edges against the updated graph, and
/// re-derive correlation links.
async fn apply_analysis(
    inner: &EngineInner,
    path: &str,
    analysis: FileAnalysis,
    source_text: String,
    started: Instant,
) -> Result<UpdateStats, OnyxError> {
    let mut store = inner.store.lock().await;

    let source = FileSource {
        path: path.to_string(),
        language: analysis.file.language,
        text: source_text,
    };
    let mut fresh_entities: Vec<Entity> = analysis.all_entities().cloned().collect();
    let mut fresh_rels = analysis.relationships.clone();
    let outcome = correlator::correlate(std::slice::from_ref(&source), &fresh_entities);
    fresh_entities.extend(outcome.entities);
    fresh_rels.extend(outcome.relationships);

    let diff = {
        let prior = store.entities_for_file(path);
        differ::diff_entities(&prior, &fresh_entities)
    };
    let stale: Vec<String> = store
        .relationships_touching_file(path)
        .iter()
        .map(|r| r.id.clone())
        .collect();

    for id in &diff.removed_ids {
        store.delete_entity(id);
    }
    for rel_id in &stale {
        store.delete_relationship(rel_id);
    }
    for entity in diff.added.iter().chain(diff.changed.iter()) {
        store.store_entity(entity)?;
    }

    // Resolve names against the whole updated graph, then re-derive the
    // cross-language and test links that may now involve this file.
    let all: Vec<Entity> = store.all_entities().cloned().collect();
    let index = NameIndex::build(&all);
    resolver::resolve_relationships(&index, &mut fresh_rels);
    fresh_rels.extend(resolver::link_import_files(&index, &fresh_entities));
    fresh_rels.extend(correlator::relink_entities(&all));
    fresh_rels.extend(correlator::link_tests(&all));

    let mut relationships_added = 0;
    for rel in &fresh_rels {
        match store.store_relationship(rel) {
            Ok(()) => relationships_added += 1,
            Err(OnyxError::SchemaViolation { .. }) => {}
            Err(other) => return Err(other),
        }
    }
    store.save()?;

    Ok(UpdateStats {
        entities_added: diff.added.len(),
        entities_removed: diff.removed_ids.len(),
        relationships_added,
        relationships_removed: stale.len(),
        files_updated: 1,
        processing_time: started.elapsed(),
    })
}
