//! Onyx Builder — full-repository graph construction
//!
//! Walks a repository, dispatches per-file analysis across a rayon pool,
//! resolves cross-file names, runs the cross-language correlator, and
//! persists everything through the store adapter.

pub mod correlator;
pub mod resolver;
pub mod walker;


use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use onyx_analyzer::{FileAnalysis, analyzer_for_path};
use onyx_core::{BuildStats, Entity, OnyxError, Relationship};
use onyx_store::{GraphStore, QueryRows};

use correlator::FileSource;

/// Environment variable overriding the implicit repository root.
pub const WORK_DIR_ENV: &str = "ONYX_WORK_DIR";

/// Default store directory name under the repository root.
pub const DEFAULT_DB_DIR: &str = ".onyx-graphdb";

/// Options for a full graph build.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Repository root. Falls back to `ONYX_WORK_DIR`, then the current
    /// directory.
    pub repo_path: Option<PathBuf>,
    /// Store directory. Defaults to `<repo>/.onyx-graphdb`.
    pub db_path: Option<PathBuf>,
    /// Remove any existing store directory before building.
    pub cleanup_db: bool,
    /// Load a `.env` file from the working directory first.
    pub load_env_file: bool,
    /// Extra ignore globs on top of the standard skip list.
    pub ignore_patterns: Vec<String>,
}

/// A completed build: statistics plus the open store handle.
pub struct BuildResult {
    pub stats: BuildStats,
    pub db_path: PathBuf,
    store: GraphStore,
}

impl BuildResult {
    /// Run a read-only query against the built graph.
    pub fn query_graph(&self, text: &str) -> Result<QueryRows, OnyxError> {
        self.store.execute_query(text)
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Persist and release the store handle.
    pub fn close(self) -> Result<(), OnyxError> {
        self.store.close()
    }

    /// Take ownership of the open store, e.g. to hand it to the live
    /// engine after a full build.
    pub fn into_store(self) -> GraphStore {
        self.store
    }
}

/// Build the code knowledge graph for a repository.
///
/// Per-file failures are collected, not raised: the result carries
/// `stats.errors_encountered` and the graph holds everything that parsed.
pub fn build_graph(options: BuildOptions) -> Result<BuildResult, OnyxError> {
    if options.load_env_file {
        let _ = dotenvy::dotenv();
    }

    let root = resolve_root(&options)?;
    let db_path = options
        .db_path
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_DB_DIR));
    if options.cleanup_db && db_path.exists() {
        std::fs::remove_dir_all(&db_path)?;
    }

    info!("building graph for {}", root.display());
    let files = walker::collect_source_files(&root, &options.ignore_patterns)?;

    let mut stats = BuildStats::default();
    let (analyses, sources, io_errors) = analyze_files(&root, &files);
    stats.errors_encountered += io_errors;

    let mut entities: Vec<Entity> = Vec::new();
    let mut relationships: Vec<Relationship> = Vec::new();
    for analysis in &analyses {
        stats.files_processed += 1;
        if analysis.error.is_some() {
            stats.errors_encountered += 1;
        }
        stats.record_entity(analysis.file.kind);
        entities.push(analysis.file.clone());
        for entity in &analysis.entities {
            stats.record_entity(entity.kind);
            entities.push(entity.clone());
        }
        relationships.extend(analysis.relationships.iter().cloned());
    }

    // Cross-file name resolution over the aggregated batch.
    let index = resolver::NameIndex::build(&entities);
    resolver::resolve_relationships(&index, &mut relationships);
    relationships.extend(resolver::link_import_files(&index, &entities));

    // Cross-language correlation and test linking.
    let outcome = correlator::correlate(&sources, &entities);
    for entity in &outcome.entities {
        stats.record_entity(entity.kind);
    }
    entities.extend(outcome.entities);
    relationships.extend(outcome.relationships);
    relationships.extend(correlator::link_tests(&entities));

    // Single-writer persistence.
    let mut store = GraphStore::open(&db_path)?;
    store.create_schema()?;
    for entity in &entities {
        store.store_entity(entity)?;
    }
    for rel in &relationships {
        match store.store_relationship(rel) {
            Ok(()) => {}
            Err(OnyxError::SchemaViolation { .. }) => {
                // Analyzer bug: logged by the store, dropped here.
                stats.errors_encountered += 1;
            }
            Err(other) => return Err(other),
        }
    }
    stats.relationships_found = store.relationship_count();
    store.save()?;

    info!(
        "graph built: {} files, {} entities, {} relationships, {} errors",
        stats.files_processed,
        stats.total_entities(),
        stats.relationships_found,
        stats.errors_encountered
    );
    for (kind, count) in &stats.entities_by_kind {
        info!("  {:>14}: {}", kind, count);
    }

    Ok(BuildResult {
        stats,
        db_path,
        store,
    })
}

fn resolve_root(options: &BuildOptions) -> Result<PathBuf, OnyxError> {
    if let Some(root) = &options.repo_path {
        return Ok(root.clone());
    }
    if let Ok(dir) = std::env::var(WORK_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    Ok(std::env::current_dir()?)
}

/// Run the pure analyzers over the batch in parallel. Returns analyses
/// in deterministic path order plus retained sources for the correlator.
fn analyze_files(
    root: &Path,
    files: &[PathBuf],
) -> (Vec<FileAnalysis>, Vec<FileSource>, usize) {
    let results: Vec<Option<(FileAnalysis, FileSource)>> = files
        .par_iter()
        .map(|relative| {
            let analyzer = analyzer_for_path(relative)?;
            let absolute = root.join(relative);
            let bytes = match std::fs::read(&absolute) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("skipping {}: {}", absolute.display(), e);
                    return None;
                }
            };
            let key = walker::path_key(relative);
            let analysis = analyzer.analyze_file(&key, &bytes);
            let source = FileSource {
                path: key,
                language: analysis.file.language,
                text: String::from_utf8_lossy(&bytes).into_owned(),
            };
            Some((analysis, source))
        })
        .collect();

    let attempted = results.len();
    let mut analyses = Vec::new();
    let mut sources = Vec::new();
    let mut succeeded = 0;
    for result in results.into_iter().flatten() {
        succeeded += 1;
        analyses.push(result.0);
        sources.push(result.1);
    }
    (analyses, sources, attempted - succeeded)
}
