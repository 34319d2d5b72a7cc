//! End-to-end scenarios across the workspace crates

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use onyx_builder::{BuildOptions, build_graph};
use onyx_watcher::{LiveEngine, WatchConfig};

fn write_repo(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
    }
    dir
}

fn build(dir: &TempDir) -> onyx_builder::BuildResult {
    build_graph(BuildOptions {
        repo_path: Some(dir.path().to_path_buf()),
        db_path: Some(dir.path().join(".onyx-graphdb")),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn python_repository_end_to_end() {
    let dir = write_repo(&[(
        "processor.py",
        r#"def utility_function(data):
    return sorted(data)

class DataProcessor:
    def add_data(self, item):
        self.items.append(item)

    def process_data(self):
        return utility_function(self.items)
"#,
    )]);
    let result = build(&dir);

    let classes = result
        .query_graph("MATCH (n:Class) RETURN n.name, n.file_path")
        .unwrap();
    assert_eq!(classes.rows, vec![vec!["DataProcessor", "processor.py"]]);

    let methods = result
        .query_graph("MATCH (n:Method) RETURN n.name")
        .unwrap();
    assert_eq!(methods.rows.len(), 2);

    let call = result
        .query_graph(
            "MATCH (a:Method)-[r:CALLS]->(b:Function) \
             WHERE b.name = \"utility_function\" RETURN a.name, r.confidence_score",
        )
        .unwrap();
    assert_eq!(call.rows, vec![vec!["process_data", "1.00"]]);

    result.close().unwrap();
}

#[test]
fn go_struct_embedding_end_to_end() {
    let dir = write_repo(&[(
        "types.go",
        "package main\n\ntype B struct {\n    Name string\n}\n\ntype A struct {\n    B\n}\n",
    )]);
    let result = build(&dir);

    let structs = result
        .query_graph("MATCH (n:Struct) RETURN n.name")
        .unwrap();
    assert_eq!(structs.rows.len(), 2);

    let embeds = result
        .query_graph("MATCH (a:Struct)-[r:EMBEDS]->(b:Struct) RETURN a.name, b.name")
        .unwrap();
    assert_eq!(embeds.rows.len(), 1);
    assert_eq!(embeds.rows[0][0], "A");
    // The embedded side resolved to the concrete declaration of B.
    assert_eq!(embeds.rows[0][1], "B");

    result.close().unwrap();
}

#[test]
fn go_interface_implementation_end_to_end() {
    let dir = write_repo(&[(
        "person.go",
        r#"package main

import "fmt"

type Stringer interface {
    String() string
}

type Person struct {
    Name string
}

func (p Person) String() string {
    return fmt.Sprintf("person %s", p.Name)
}
"#,
    )]);
    let result = build(&dir);

    let implements = result
        .query_graph("MATCH (a:Struct)-[r:IMPLEMENTS]->(b:Interface) RETURN a.name, b.name")
        .unwrap();
    assert_eq!(implements.rows, vec![vec!["Person", "Stringer"]]);

    result.close().unwrap();
}

#[test]
fn cross_language_wiring_end_to_end() {
    let dir = write_repo(&[
        (
            "server/app.py",
            "@app.route(\"/users\", methods=[\"GET\"])\ndef list_users():\n    return []\n",
        ),
        (
            "web/api.ts",
            "export async function loadUsers() {\n    const res = await fetch(\"/users\", { method: \"GET\" });\n    return res.json();\n}\n",
        ),
    ]);
    let result = build(&dir);

    let endpoints = result
        .query_graph("MATCH (n:Endpoint) RETURN n.language, n.path, n.http_method")
        .unwrap();
    assert_eq!(endpoints.rows, vec![vec!["python", "/users", "GET"]]);

    let calls = result
        .query_graph("MATCH (n:APICall) RETURN n.language, n.path")
        .unwrap();
    assert_eq!(calls.rows, vec![vec!["typescript", "/users"]]);

    let links = result
        .query_graph(
            "MATCH (a:APICall)-[r:CALLS]->(b:Endpoint) \
             RETURN r.cross_language, r.api_method, r.api_path",
        )
        .unwrap();
    assert_eq!(links.rows, vec![vec!["true", "GET", "/users"]]);

    result.close().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn live_update_matches_fresh_build() {
    let dir = write_repo(&[(
        "types.go",
        "package main\n\ntype Foo struct {\n    Name string\n}\n",
    )]);

    // Full build, then hand the store to the live engine.
    let result = build(&dir);
    let engine = LiveEngine::new(dir.path(), result.into_store(), WatchConfig::default()).unwrap();
    engine.start().unwrap();

    // Replace Foo with Bar on disk and push the change through.
    fs::write(
        dir.path().join("types.go"),
        "package main\n\ntype Bar struct {\n    Name string\n}\n",
    )
    .unwrap();
    let stats = engine.update_file(dir.path().join("types.go")).await.unwrap();
    assert!(stats.entities_removed >= 1);
    assert!(stats.entities_added >= 1);

    let structs = engine.query("MATCH (n:Struct) RETURN n.name").await.unwrap();
    assert_eq!(structs.rows, vec![vec!["Bar"]]);
    let contains = engine
        .query("MATCH (a:File)-[r:CONTAINS]->(b:Struct) RETURN b.name")
        .await
        .unwrap();
    assert_eq!(contains.rows, vec![vec!["Bar"]]);

    // The store now matches what a fresh build of the final tree produces.
    let fresh_dir = write_repo(&[(
        "types.go",
        "package main\n\ntype Bar struct {\n    Name string\n}\n",
    )]);
    let fresh = build(&fresh_dir);
    let mut live_ids: Vec<String> = Vec::new();
    let live_rows = engine.query("MATCH (n) RETURN n.id").await.unwrap();
    for row in live_rows.rows {
        live_ids.push(row[0].clone());
    }
    live_ids.sort();
    let mut fresh_ids: Vec<String> = fresh
        .store()
        .all_entities()
        .map(|e| e.id.clone())
        .collect();
    fresh_ids.sort();
    assert_eq!(live_ids, fresh_ids);
}

#[tokio::test(flavor = "multi_thread")]
async fn file_deletion_empties_its_slice_of_the_graph() {
    let dir = write_repo(&[
        ("keep.py", "def keep():\n    return 1\n"),
        ("drop.py", "def drop():\n    return 2\n"),
    ]);
    let result = build(&dir);
    let engine = LiveEngine::new(dir.path(), result.into_store(), WatchConfig::default()).unwrap();
    engine.start().unwrap();

    fs::remove_file(dir.path().join("drop.py")).unwrap();
    engine.update_file(dir.path().join("drop.py")).await.unwrap();

    let gone = engine
        .query("MATCH (n) WHERE n.file_path = \"drop.py\" RETURN n.id")
        .await
        .unwrap();
    assert!(gone.is_empty());
    let kept = engine
        .query("MATCH (n:Function) RETURN n.name")
        .await
        .unwrap();
    assert_eq!(kept.rows, vec![vec!["keep"]]);
}

#[test]
fn store_directory_lands_at_the_default_location() {
    let dir = write_repo(&[("app.py", "def app():\n    return 0\n")]);
    let result = build_graph(BuildOptions {
        repo_path: Some(dir.path().to_path_buf()),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        result.db_path,
        dir.path().join(onyx_builder::DEFAULT_DB_DIR)
    );
    result.close().unwrap();
    assert!(Path::new(&dir.path().join(".onyx-graphdb").join("meta.json")).exists());
}
