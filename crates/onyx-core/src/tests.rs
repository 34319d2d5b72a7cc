//! Unit tests for the core model and schema

use crate::model::*;
use crate::schema;
use crate::stats::BuildStats;
use std::path::Path;

#[test]
fn entity_id_is_deterministic() {
    let a = Entity::new(
        EntityKind::Function,
        "process_data",
        "src/pipeline.py",
        Language::Python,
        Span::new(10, 42),
    );
    let b = Entity::new(
        EntityKind::Function,
        "process_data",
        "src/pipeline.py",
        Language::Python,
        Span::new(10, 42),
    );
    assert_eq!(a.id, b.id);
    assert_eq!(a.id, "src/pipeline.py:10-42:process_data");

    let moved = Entity::new(
        EntityKind::Function,
        "process_data",
        "src/pipeline.py",
        Language::Python,
        Span::new(11, 43),
    );
    assert_ne!(a.id, moved.id);
}

#[test]
fn file_entity_id_is_the_path() {
    let file = Entity::new_file("api/server.go", Language::Go, 120);
    assert_eq!(file.id, "api/server.go");
    assert_eq!(file.kind, EntityKind::File);
    assert_eq!(file.name, "server.go");
    assert_eq!(file.span, Span::new(1, 120));
}

#[test]
fn relationship_id_encodes_type() {
    let rel = Relationship::new(
        RelationType::Calls,
        "a.py:1-2:f",
        "a.py:4-9:g",
        EntityKind::Function,
        EntityKind::Function,
    );
    assert_eq!(rel.id, "a.py:1-2:f::CALLS::a.py:4-9:g");
}

#[test]
fn confidence_is_clamped_and_parsed() {
    let rel = Relationship::new(
        RelationType::Calls,
        "s",
        "t",
        EntityKind::Function,
        EntityKind::Function,
    )
    .with_confidence(1.7);
    assert_eq!(rel.get_confidence_score(), Some(1.0));

    let unscored = Relationship::new(
        RelationType::Contains,
        "f",
        "e",
        EntityKind::File,
        EntityKind::Function,
    );
    assert_eq!(unscored.get_confidence_score(), None);
}

#[test]
fn language_detection() {
    let cases = [
        ("lib.py", Some(Language::Python)),
        ("types.pyi", Some(Language::Python)),
        ("main.go", Some(Language::Go)),
        ("app.ts", Some(Language::TypeScript)),
        ("view.tsx", Some(Language::TypeScript)),
        ("index.js", Some(Language::JavaScript)),
        ("widget.jsx", Some(Language::JavaScript)),
        ("mod.mjs", Some(Language::JavaScript)),
        ("README.md", None),
        ("Makefile", None),
    ];
    for (name, expected) in cases {
        assert_eq!(Language::from_path(Path::new(name)), expected, "{}", name);
    }
}

#[test]
fn test_file_detection() {
    assert!(Entity::is_test_file("src/test_utils.py"));
    assert!(Entity::is_test_file("pkg/server_test.go"));
    assert!(Entity::is_test_file("src/app.test.ts"));
    assert!(Entity::is_test_file("src/app.spec.ts"));
    assert!(Entity::is_test_file("src/__tests__/app.ts"));
    assert!(!Entity::is_test_file("src/app.ts"));
    assert!(!Entity::is_test_file("pkg/server.go"));
}

#[test]
fn schema_permits_the_documented_excerpt() {
    use EntityKind::*;
    use RelationType::*;

    assert!(schema::is_valid_for_schema(File, Contains, Function));
    assert!(schema::is_valid_for_schema(File, Contains, TestSuite));
    assert!(!schema::is_valid_for_schema(File, Contains, File));
    assert!(!schema::is_valid_for_schema(Function, Contains, Function));

    assert!(schema::is_valid_for_schema(Function, Calls, Method));
    assert!(schema::is_valid_for_schema(TestFunction, Calls, Function));
    assert!(schema::is_valid_for_schema(ApiCall, Calls, Endpoint));
    assert!(!schema::is_valid_for_schema(Class, Calls, Function));

    assert!(schema::is_valid_for_schema(File, Imports, File));
    assert!(schema::is_valid_for_schema(Class, Inherits, Class));
    assert!(schema::is_valid_for_schema(Struct, Embeds, Struct));
    assert!(schema::is_valid_for_schema(Struct, Implements, Interface));
    assert!(!schema::is_valid_for_schema(Interface, Implements, Struct));
    assert!(schema::is_valid_for_schema(Interface, Defines, Method));
    assert!(schema::is_valid_for_schema(TestFunction, Tests, Class));
    assert!(schema::is_valid_for_schema(TestCase, Covers, Method));
    assert!(schema::is_valid_for_schema(Mock, Mocks, Function));
    assert!(schema::is_valid_for_schema(TestFunction, Asserts, Assertion));
    assert!(schema::is_valid_for_schema(Method, CallsApi, Function));
    assert!(schema::is_valid_for_schema(Function, HandlesRoute, Variable));
    assert!(!schema::is_valid_for_schema(Variable, HandlesRoute, Function));
}

#[test]
fn relationship_schema_helper_matches_table() {
    let good = Relationship::new(
        RelationType::Tests,
        "t",
        "f",
        EntityKind::TestFunction,
        EntityKind::Function,
    );
    assert!(good.is_valid_for_schema());

    let bad = Relationship::new(
        RelationType::Embeds,
        "a",
        "b",
        EntityKind::Class,
        EntityKind::Class,
    );
    assert!(!bad.is_valid_for_schema());
}

#[test]
fn every_relation_type_has_at_least_one_permitted_pair() {
    for table in schema::rel_tables() {
        assert!(
            !table.pairs.is_empty(),
            "{} permits no kind pairs",
            table.name
        );
    }
}

#[test]
fn node_tables_cover_every_kind() {
    let tables = schema::node_tables();
    assert_eq!(tables.len(), EntityKind::all().len());
    assert!(tables.iter().any(|t| t.name == "APICall"));
}

#[test]
fn property_hash_tracks_mutable_surface() {
    let base = Entity::new(
        EntityKind::Function,
        "f",
        "a.py",
        Language::Python,
        Span::new(1, 3),
    );
    let mut changed = base.clone();
    assert_eq!(base.property_hash(), changed.property_hash());

    changed.set_property("complexity", "4");
    assert_ne!(base.property_hash(), changed.property_hash());
}

#[test]
fn build_stats_merge() {
    let mut a = BuildStats::default();
    a.files_processed = 2;
    a.record_entity(EntityKind::Function);
    a.record_entity(EntityKind::Function);
    a.relationships_found = 3;

    let mut b = BuildStats::default();
    b.files_processed = 1;
    b.record_entity(EntityKind::Class);
    b.errors_encountered = 1;

    a.merge(&b);
    assert_eq!(a.files_processed, 3);
    assert_eq!(a.total_entities(), 3);
    assert_eq!(a.entities_by_kind["Function"], 2);
    assert_eq!(a.errors_encountered, 1);
}

#[test]
fn entity_serialization_round_trip() {
    let entity = Entity::new(
        EntityKind::Method,
        "add_data",
        "src/proc.py",
        Language::Python,
        Span::new(5, 9),
    )
    .with_signature("def add_data(self, item):")
    .with_parent("src/proc.py:3-20:DataProcessor")
    .with_property("is_exported", "false");

    let json = serde_json::to_string(&entity).unwrap();
    let back: Entity = serde_json::from_str(&json).unwrap();
    assert_eq!(entity, back);
}
