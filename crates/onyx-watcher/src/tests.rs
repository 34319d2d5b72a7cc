//! Unit tests for the live-analysis engine

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::sleep;

use crate::{ChangeKind, LiveEngine, Subscriber, WatchConfig, WatchEvent};
use onyx_core::{OnyxError, UpdateStats};
use onyx_store::GraphStore;

fn engine_for(dir: &TempDir, config: WatchConfig) -> LiveEngine {
    let store = GraphStore::open(dir.path().join(".onyx-graphdb")).unwrap();
    let engine = LiveEngine::new(dir.path(), store, config).unwrap();
    engine.start().unwrap();
    engine
}

#[derive(Default)]
struct CountingSubscriber {
    files_changed: AtomicUsize,
    graph_updates: AtomicUsize,
    errors: AtomicUsize,
}

impl Subscriber for CountingSubscriber {
    fn on_file_changed(&self, _path: &str, _change: ChangeKind) {
        self.files_changed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_graph_updated(&self, _stats: &UpdateStats) {
        self.graph_updates.fetch_add(1, Ordering::SeqCst);
    }
    fn on_error(&self, _error: &OnyxError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_update_populates_store() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("types.go"),
        "package main\n\ntype Foo struct {\n    Name string\n}\n",
    )
    .unwrap();

    let engine = engine_for(&dir, WatchConfig::default());
    let stats = engine.update_file(dir.path().join("types.go")).await.unwrap();
    assert!(stats.entities_added >= 2, "file + struct expected");
    assert_eq!(stats.files_updated, 1);

    let rows = engine
        .query("MATCH (n:Struct) RETURN n.name")
        .await
        .unwrap();
    assert_eq!(rows.rows, vec![vec!["Foo"]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn live_update_supersedes_prior_entities() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("types.go");
    fs::write(&file, "package main\n\ntype Foo struct{}\n").unwrap();

    let engine = engine_for(&dir, WatchConfig::default());
    engine.update_file(&file).await.unwrap();

    fs::write(&file, "package main\n\ntype Bar struct{}\n").unwrap();
    let stats = engine.update_file(&file).await.unwrap();
    assert!(stats.entities_removed >= 1, "Foo should be superseded");
    assert!(stats.entities_added >= 1, "Bar should be inserted");

    let rows = engine
        .query("MATCH (n:Struct) RETURN n.name")
        .await
        .unwrap();
    assert_eq!(rows.rows, vec![vec!["Bar"]]);

    // The fresh struct keeps its Contains edge from the file.
    let contains = engine
        .query("MATCH (a:File)-[r:CONTAINS]->(b:Struct) RETURN a.path, b.name")
        .await
        .unwrap();
    assert_eq!(contains.rows, vec![vec!["types.go", "Bar"]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_a_file_prunes_its_entities() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("gone.py");
    fs::write(&file, "def vanish():\n    return 1\n").unwrap();

    let engine = engine_for(&dir, WatchConfig::default());
    engine.update_file(&file).await.unwrap();
    assert!(engine.get_entity("gone.py").await.is_some());

    fs::remove_file(&file).unwrap();
    let stats = engine.update_file(&file).await.unwrap();
    assert!(stats.entities_removed >= 2, "file + function pruned");
    assert!(engine.get_entity("gone.py").await.is_none());

    let rows = engine
        .query("MATCH (n) WHERE n.file_path = \"gone.py\" RETURN n.id")
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn debounce_coalesces_rapid_events() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("busy.py");
    fs::write(&file, "def busy():\n    return 1\n").unwrap();

    let config = WatchConfig {
        debounce_interval: Duration::from_millis(150),
        ..Default::default()
    };
    let engine = engine_for(&dir, config);
    let subscriber = Arc::new(CountingSubscriber::default());
    engine.subscribe(subscriber.clone());

    // Five modifications inside the window: one re-analysis.
    for _ in 0..5 {
        engine.enqueue_event(WatchEvent::Modified(file.clone()));
        sleep(Duration::from_millis(10)).await;
    }
    sleep(Duration::from_millis(700)).await;

    assert_eq!(subscriber.graph_updates.load(Ordering::SeqCst), 1);
    assert_eq!(subscriber.files_changed.load(Ordering::SeqCst), 1);
    assert_eq!(subscriber.errors.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn events_after_the_window_trigger_again() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("twice.py");
    fs::write(&file, "def twice():\n    return 2\n").unwrap();

    let config = WatchConfig {
        debounce_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let engine = engine_for(&dir, config);
    let subscriber = Arc::new(CountingSubscriber::default());
    engine.subscribe(subscriber.clone());

    engine.enqueue_event(WatchEvent::Modified(file.clone()));
    sleep(Duration::from_millis(500)).await;
    engine.enqueue_event(WatchEvent::Modified(file.clone()));
    sleep(Duration::from_millis(500)).await;

    assert_eq!(subscriber.graph_updates.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn removal_events_flow_through_the_dispatcher() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("temp.py");
    fs::write(&file, "def temp():\n    return 3\n").unwrap();

    let config = WatchConfig {
        debounce_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let engine = engine_for(&dir, config);
    engine.update_file(&file).await.unwrap();
    assert!(engine.get_entity("temp.py").await.is_some());

    fs::remove_file(&file).unwrap();
    engine.enqueue_event(WatchEvent::Removed(file.clone()));
    sleep(Duration::from_millis(600)).await;

    assert!(engine.get_entity("temp.py").await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn cross_language_links_appear_incrementally() {
    let dir = TempDir::new().unwrap();
    let py = dir.path().join("api.py");
    let ts = dir.path().join("client.ts");
    fs::write(
        &py,
        "@app.route(\"/items\", methods=[\"GET\"])\ndef list_items():\n    return []\n",
    )
    .unwrap();

    let engine = engine_for(&dir, WatchConfig::default());
    engine.update_file(&py).await.unwrap();

    // The TS client arrives later; the relink pass joins the two sides.
    fs::write(
        &ts,
        "export async function loadItems() {\n    return fetch(\"/items\", { method: \"GET\" });\n}\n",
    )
    .unwrap();
    engine.update_file(&ts).await.unwrap();

    let rows = engine
        .query("MATCH (a:APICall)-[r:CALLS]->(b:Endpoint) RETURN r.cross_language, r.api_path")
        .await
        .unwrap();
    assert_eq!(rows.rows, vec![vec!["true", "/items"]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_on_unwatchable_path_reports_watcher_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "not source code").unwrap();

    let engine = engine_for(&dir, WatchConfig::default());
    let err = engine.update_file(&file).await.unwrap_err();
    assert!(matches!(err, OnyxError::Watcher(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_accepting_work() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("late.py");
    fs::write(&file, "def late():\n    return 9\n").unwrap();

    let config = WatchConfig {
        debounce_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let engine = engine_for(&dir, config);
    let subscriber = Arc::new(CountingSubscriber::default());
    engine.subscribe(subscriber.clone());

    engine.shutdown();
    engine.enqueue_event(WatchEvent::Modified(file.clone()));
    sleep(Duration::from_millis(400)).await;

    assert_eq!(subscriber.graph_updates.load(Ordering::SeqCst), 0);
}
