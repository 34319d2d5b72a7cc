//! CLI command implementations

use std::path::PathBuf;

use anyhow::Context;

use onyx_builder::{BuildOptions, build_graph};
use onyx_store::GraphStore;
use onyx_watcher::{LiveEngine, WatchConfig};

pub fn build(
    root: Option<PathBuf>,
    db_path: Option<PathBuf>,
    ignore: Vec<String>,
    cleanup: bool,
    load_env: bool,
) -> anyhow::Result<()> {
    let result = build_graph(BuildOptions {
        repo_path: root,
        db_path,
        cleanup_db: cleanup,
        load_env_file: load_env,
        ignore_patterns: ignore,
    })
    .context("graph build failed")?;

    println!("store: {}", result.db_path.display());
    println!("files processed:     {}", result.stats.files_processed);
    println!("entities:            {}", result.stats.total_entities());
    for (kind, count) in &result.stats.entities_by_kind {
        println!("  {:<14} {}", kind, count);
    }
    println!("relationships:       {}", result.stats.relationships_found);
    println!("errors encountered:  {}", result.stats.errors_encountered);

    result.close().context("closing store")?;
    Ok(())
}

pub async fn watch(
    root: Option<PathBuf>,
    db_path: Option<PathBuf>,
    ignore: Vec<String>,
) -> anyhow::Result<()> {
    let result = build_graph(BuildOptions {
        repo_path: root.clone(),
        db_path,
        cleanup_db: false,
        load_env_file: false,
        ignore_patterns: ignore.clone(),
    })
    .context("initial build failed")?;
    tracing::info!(
        "initial build: {} entities, {} relationships",
        result.stats.total_entities(),
        result.stats.relationships_found
    );

    let repo_root = root
        .or_else(|| std::env::var(onyx_builder::WORK_DIR_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let config = WatchConfig {
        ignore_patterns: ignore,
        ..Default::default()
    };
    let engine = LiveEngine::new(&repo_root, result.into_store(), config)
        .context("creating live engine")?;
    engine.start().context("starting engine tasks")?;
    engine.watch().context("attaching filesystem watcher")?;

    tracing::info!("watching for changes; press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    engine.shutdown();
    Ok(())
}

pub fn query(
    root: Option<PathBuf>,
    db_path: Option<PathBuf>,
    text: &str,
) -> anyhow::Result<()> {
    let root = root
        .or_else(|| std::env::var(onyx_builder::WORK_DIR_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let db_path = db_path.unwrap_or_else(|| root.join(onyx_builder::DEFAULT_DB_DIR));

    let store = GraphStore::open(&db_path).context("opening store")?;
    let rows = store.execute_query(text).context("executing query")?;
    println!("{}", rows.to_tsv());
    Ok(())
}
