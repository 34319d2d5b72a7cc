//! Unit tests for the per-language analyzers

use crate::{Analyzer, FileAnalysis, analyzer_for_path, unresolved};
use onyx_core::{EntityKind, Language, RelationType};
use std::path::Path;

fn analyze(path: &str, source: &str) -> FileAnalysis {
    let analyzer = analyzer_for_path(Path::new(path)).expect("analyzer for path");
    analyzer.analyze_file(path, source.as_bytes())
}

fn kinds_of(analysis: &FileAnalysis, kind: EntityKind) -> Vec<&str> {
    analysis
        .entities
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.name.as_str())
        .collect()
}

fn has_rel(analysis: &FileAnalysis, rel: RelationType, source: &str, target: &str) -> bool {
    analysis
        .relationships
        .iter()
        .any(|r| r.rel_type == rel && r.source_id.contains(source) && r.target_id.contains(target))
}

// ── Python ──────────────────────────────────────────────────────────────

const PYTHON_PROCESSOR: &str = r#"
def utility_function(data):
    return sorted(data)

class DataProcessor:
    def add_data(self, item):
        self.items.append(item)

    def process_data(self):
        return utility_function(self.items)
"#;

#[test]
fn python_entities_and_containment() {
    let analysis = analyze("src/processor.py", PYTHON_PROCESSOR);
    assert!(analysis.error.is_none());
    assert_eq!(analysis.file.kind, EntityKind::File);
    assert_eq!(analysis.file.language, Language::Python);

    assert_eq!(kinds_of(&analysis, EntityKind::Class), vec!["DataProcessor"]);
    assert_eq!(
        kinds_of(&analysis, EntityKind::Function),
        vec!["utility_function"]
    );
    let mut methods = kinds_of(&analysis, EntityKind::Method);
    methods.sort();
    assert_eq!(methods, vec!["add_data", "process_data"]);

    // One Contains edge per non-file entity, all from the file.
    let contains: Vec<_> = analysis
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationType::Contains)
        .collect();
    assert_eq!(contains.len(), analysis.entities.len());
    assert!(contains.iter().all(|r| r.source_id == analysis.file.id));
}

#[test]
fn python_call_edge_uses_simple_name() {
    let analysis = analyze("src/processor.py", PYTHON_PROCESSOR);
    let call = analysis
        .relationships
        .iter()
        .find(|r| {
            r.rel_type == RelationType::Calls
                && r.source_id.contains("process_data")
                && r.target_id == unresolved("utility_function")
        })
        .expect("process_data → utility_function call");
    assert_eq!(call.source_kind, EntityKind::Method);
    assert_eq!(call.property("callee_name"), Some("utility_function"));
}

#[test]
fn python_methods_have_class_parent() {
    let analysis = analyze("src/processor.py", PYTHON_PROCESSOR);
    let class_id = &analysis
        .entities
        .iter()
        .find(|e| e.kind == EntityKind::Class)
        .unwrap()
        .id;
    for method in analysis
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Method)
    {
        assert_eq!(method.parent_id.as_ref(), Some(class_id));
    }
}

#[test]
fn python_inheritance_and_decorators() {
    let source = r#"
import functools

class Base:
    pass

class Child(Base):
    pass

@functools.cache
def cached(x):
    return x * 2
"#;
    let analysis = analyze("src/inherit.py", source);
    assert!(has_rel(
        &analysis,
        RelationType::Inherits,
        "Child",
        &unresolved("Base"),
    ));
    let decorates = analysis
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationType::Decorates)
        .expect("decorator edge");
    assert_eq!(decorates.source_id, unresolved("cache"));
    assert!(decorates.target_id.contains("cached"));
    assert_eq!(decorates.property("decorator"), Some("functools.cache"));
}

#[test]
fn python_test_detection_pytest_and_unittest() {
    let source = r#"
import unittest

def test_process_data():
    assert utility_function([2, 1]) == [1, 2]

class TestProcessor(unittest.TestCase):
    def test_add(self):
        self.assertEqual(1 + 1, 2)
        self.assertTrue(True)
"#;
    let analysis = analyze("tests/test_processor.py", source);
    let tests: Vec<_> = analysis
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::TestFunction)
        .collect();
    assert_eq!(tests.len(), 2);

    let pytest = tests.iter().find(|e| e.name == "test_process_data").unwrap();
    assert_eq!(pytest.property("test_framework"), Some("pytest"));
    assert_eq!(pytest.property("test_target"), Some("process_data"));
    assert_eq!(pytest.property("assertion_count"), Some("1"));

    let unit = tests.iter().find(|e| e.name == "test_add").unwrap();
    assert_eq!(unit.property("test_framework"), Some("unittest"));
    assert_eq!(unit.property("assertion_count"), Some("2"));
}

#[test]
fn python_imports_and_variables() {
    let source = r#"
import os
import numpy as np
from collections import OrderedDict

MAX_RETRIES = 3
"#;
    let analysis = analyze("src/config.py", source);
    let imports = kinds_of(&analysis, EntityKind::Import);
    assert_eq!(imports, vec!["os", "numpy", "collections"]);

    let aliased = analysis
        .entities
        .iter()
        .find(|e| e.name == "numpy")
        .unwrap();
    assert_eq!(aliased.property("alias"), Some("np"));

    let from_import = analysis
        .entities
        .iter()
        .find(|e| e.name == "collections")
        .unwrap();
    assert_eq!(from_import.property("symbols"), Some("OrderedDict"));

    let var = analysis
        .entities
        .iter()
        .find(|e| e.kind == EntityKind::Variable)
        .unwrap();
    assert_eq!(var.name, "MAX_RETRIES");
    assert_eq!(var.property("value"), Some("3"));

    // Every import also produced a File → Import edge.
    let import_edges = analysis
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationType::Imports)
        .count();
    assert_eq!(import_edges, 3);
}

#[test]
fn python_unparseable_still_yields_file_entity() {
    let analysis = analyze("src/broken.py", "def broken(:\n  ???");
    assert_eq!(analysis.file.kind, EntityKind::File);
    assert!(analysis.error.is_some());
}

#[test]
fn python_ids_are_stable_across_reparse() {
    let a = analyze("src/processor.py", PYTHON_PROCESSOR);
    let b = analyze("src/processor.py", PYTHON_PROCESSOR);
    let ids_a: Vec<_> = a.entities.iter().map(|e| &e.id).collect();
    let ids_b: Vec<_> = b.entities.iter().map(|e| &e.id).collect();
    assert_eq!(ids_a, ids_b);
}

// ── Go ──────────────────────────────────────────────────────────────────

#[test]
fn go_struct_embedding() {
    let source = r#"package main

type B struct {
    Name string
}

type A struct {
    B
    Count int
}
"#;
    let analysis = analyze("pkg/types.go", source);
    let mut structs = kinds_of(&analysis, EntityKind::Struct);
    structs.sort();
    assert_eq!(structs, vec!["A", "B"]);

    let embeds: Vec<_> = analysis
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationType::Embeds)
        .collect();
    assert_eq!(embeds.len(), 1);
    assert!(embeds[0].source_id.contains(":A"));
    assert_eq!(embeds[0].target_id, unresolved("B"));
}

#[test]
fn go_interface_implementation_by_method_set() {
    let source = r#"package main

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
"#;
    let analysis = analyze("pkg/person.go", source);
    let implements: Vec<_> = analysis
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationType::Implements)
        .collect();
    assert_eq!(implements.len(), 1);
    assert!(implements[0].source_id.contains(":Person"));
    assert!(implements[0].target_id.contains(":Stringer"));
    assert_eq!(implements[0].source_kind, EntityKind::Struct);
    assert_eq!(implements[0].target_kind, EntityKind::Interface);
}

#[test]
fn go_interface_without_matching_methods_is_not_implemented() {
    let source = r#"package main

type Writer interface {
    Write(p []byte) (int, error)
}

type Person struct{}

func (p Person) String() string { return "" }
"#;
    let analysis = analyze("pkg/person.go", source);
    assert!(
        !analysis
            .relationships
            .iter()
            .any(|r| r.rel_type == RelationType::Implements)
    );
}

#[test]
fn go_method_receiver_and_defines() {
    let source = r#"package main

type Server struct{}

func (s *Server) Start(port int) error {
    return nil
}
"#;
    let analysis = analyze("pkg/server.go", source);
    let method = analysis
        .entities
        .iter()
        .find(|e| e.kind == EntityKind::Method)
        .unwrap();
    assert_eq!(method.name, "Start");
    assert_eq!(method.property("receiver_type"), Some("Server"));
    assert_eq!(method.property("is_exported"), Some("true"));

    let struct_id = &analysis
        .entities
        .iter()
        .find(|e| e.kind == EntityKind::Struct)
        .unwrap()
        .id;
    assert!(has_rel(&analysis, RelationType::Defines, struct_id, "Start"));
    assert_eq!(method.parent_id.as_deref(), Some(struct_id.as_str()));
}

#[test]
fn go_test_function_extraction() {
    let source = r#"package main

import "testing"

func TestParseConfig(t *testing.T) {
    cfg, err := ParseConfig("testdata/config.json")
    if err != nil {
        t.Fatalf("parse: %v", err)
    }
    if cfg == nil {
        t.Error("nil config")
    }
}

func helperFunc(t *testing.T) {}
"#;
    let analysis = analyze("pkg/config_test.go", source);
    let test = analysis
        .entities
        .iter()
        .find(|e| e.kind == EntityKind::TestFunction)
        .unwrap();
    assert_eq!(test.name, "TestParseConfig");
    assert_eq!(test.property("test_target"), Some("ParseConfig"));
    assert_eq!(test.property("test_framework"), Some("go_testing"));
    assert_eq!(test.property("assertion_count"), Some("2"));

    // helperFunc is not TestXxx-shaped.
    assert_eq!(kinds_of(&analysis, EntityKind::Function), vec!["helperFunc"]);
}

#[test]
fn go_goroutines_and_channels_surface_as_properties() {
    let source = r#"package main

func fanOut(jobs []int) chan int {
    out := make(chan int)
    for _, j := range jobs {
        go func(n int) {
            out <- n * 2
        }(j)
    }
    return out
}
"#;
    let analysis = analyze("pkg/fan.go", source);
    let func = analysis
        .entities
        .iter()
        .find(|e| e.name == "fanOut")
        .unwrap();
    assert_eq!(func.property("uses_goroutines"), Some("true"));
    assert_eq!(func.property("uses_channels"), Some("true"));
}

#[test]
fn go_imports_and_package_variables() {
    let source = r#"package main

import (
    "fmt"
    nethttp "net/http"
)

var DefaultTimeout = 30

const maxRetries = 5
"#;
    let analysis = analyze("pkg/vars.go", source);
    let imports = kinds_of(&analysis, EntityKind::Import);
    assert!(imports.contains(&"fmt"));
    assert!(imports.contains(&"net/http"));

    let aliased = analysis
        .entities
        .iter()
        .find(|e| e.name == "net/http")
        .unwrap();
    assert_eq!(aliased.property("alias"), Some("nethttp"));

    let mut vars = kinds_of(&analysis, EntityKind::Variable);
    vars.sort();
    assert_eq!(vars, vec!["DefaultTimeout", "maxRetries"]);
}

// ── TypeScript / JavaScript ─────────────────────────────────────────────

#[test]
fn typescript_class_interface_and_props() {
    let source = r#"
export interface User {
    id: number;
    name: string;
}

export class UserService {
    private cache: Map<number, User> = new Map();

    async loadUsers(): Promise<User[]> {
        return fetchAll();
    }
}
"#;
    let analysis = analyze("src/users.ts", source);
    assert_eq!(kinds_of(&analysis, EntityKind::Interface), vec!["User"]);
    assert_eq!(kinds_of(&analysis, EntityKind::Class), vec!["UserService"]);
    assert_eq!(kinds_of(&analysis, EntityKind::Method), vec!["loadUsers"]);

    // Interface properties and the class field become Variables with HasProps.
    let props = analysis
        .relationships
        .iter()
        .filter(|r| r.rel_type == RelationType::HasProps)
        .count();
    assert_eq!(props, 3);

    assert!(has_rel(
        &analysis,
        RelationType::Calls,
        "loadUsers",
        &unresolved("fetchAll"),
    ));
}

#[test]
fn typescript_inherits_and_constrains() {
    let source = r#"
interface Repository {
    find(id: number): unknown;
}

class BaseRepo {}

export class UserRepo extends BaseRepo implements Repository {
    find(id: number) { return null; }
}
"#;
    let analysis = analyze("src/repo.ts", source);
    assert!(has_rel(
        &analysis,
        RelationType::Inherits,
        "UserRepo",
        &unresolved("BaseRepo"),
    ));
    let constrains = analysis
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationType::Constrains)
        .expect("implements clause");
    assert_eq!(constrains.source_id, unresolved("Repository"));
    assert!(constrains.target_id.contains("UserRepo"));
}

#[test]
fn typescript_arrow_function_component_renders_jsx() {
    let source = r#"
const Header = () => {
    return <Banner title="hi" />;
};

export const Page = () => (
    <div>
        <Header />
        <Footer />
    </div>
);
"#;
    let analysis = analyze("src/page.tsx", source);
    let mut fns = kinds_of(&analysis, EntityKind::Function);
    fns.sort();
    assert_eq!(fns, vec!["Header", "Page"]);

    let header = analysis.entities.iter().find(|e| e.name == "Header").unwrap();
    assert_eq!(header.property("is_component"), Some("true"));

    assert!(has_rel(
        &analysis,
        RelationType::RendersJsx,
        "Header",
        &unresolved("Banner"),
    ));
    assert!(has_rel(
        &analysis,
        RelationType::RendersJsx,
        "Page",
        &unresolved("Footer"),
    ));
}

#[test]
fn typescript_imports_reexports_and_dynamic_imports() {
    let source = r#"
import { useState } from 'react';
import * as path from 'path';

export { helper } from './helper';

async function lazyLoad() {
    const mod = await import('./heavy');
    return mod;
}
"#;
    let analysis = analyze("src/index.ts", source);
    let imports = kinds_of(&analysis, EntityKind::Import);
    assert!(imports.contains(&"react"));
    assert!(imports.contains(&"path"));
    assert!(imports.contains(&"./helper"));
    assert!(imports.contains(&"./heavy"));

    assert!(
        analysis
            .relationships
            .iter()
            .any(|r| r.rel_type == RelationType::ReExports && r.target_id.contains("helper"))
    );
    assert!(
        analysis
            .relationships
            .iter()
            .any(|r| r.rel_type == RelationType::DynamicImport && r.target_id.contains("heavy"))
    );
}

#[test]
fn typescript_jest_suites_and_cases() {
    let source = r#"
describe('UserService', () => {
    it('loadUsers returns data', async () => {
        const users = await service.loadUsers();
        expect(users).toHaveLength(2);
        expect(users[0].name).toBe('ada');
    });

    it('handles errors', () => {
        expect(() => service.fail()).toThrow();
    });

    describe('cache', () => {
        it('hits on second call', () => {
            expect(service.cached()).toBe(true);
        });
    });
});
"#;
    let analysis = analyze("src/users.test.ts", source);
    let suites = kinds_of(&analysis, EntityKind::TestSuite);
    assert_eq!(suites, vec!["UserService", "cache"]);

    let cases: Vec<_> = analysis
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::TestCase)
        .collect();
    assert_eq!(cases.len(), 3);

    let load = cases
        .iter()
        .find(|e| e.name == "loadUsers returns data")
        .unwrap();
    assert_eq!(load.property("assertion_count"), Some("2"));
    assert_eq!(load.property("test_framework"), Some("jest"));
    assert_eq!(load.property("test_target"), Some("loadUsers"));

    // Outer suite groups the inner one and runs its direct cases.
    assert!(has_rel(&analysis, RelationType::GroupsTests, "UserService", "cache"));
    assert!(has_rel(
        &analysis,
        RelationType::RunsTest,
        "UserService",
        "loadUsers returns data",
    ));
    assert!(has_rel(&analysis, RelationType::RunsTest, "cache", "hits on second call"));
}

#[test]
fn typescript_constructor_injection() {
    let source = r#"
export class OrderController {
    constructor(private orders: OrderService, log: Logger) {}
}
"#;
    let analysis = analyze("src/orders.ts", source);
    let injects = analysis
        .relationships
        .iter()
        .find(|r| r.rel_type == RelationType::Injects)
        .expect("injection edge");
    assert!(injects.source_id.contains("OrderController"));
    assert_eq!(injects.target_id, unresolved("OrderService"));

    assert!(
        analysis
            .relationships
            .iter()
            .any(|r| r.rel_type == RelationType::ConsumesService
                && r.target_id == unresolved("OrderService"))
    );
}

#[test]
fn javascript_function_and_calls() {
    let source = r#"
function main() {
    const data = loadData();
    render(data);
}

const helper = (x) => x * 2;
"#;
    let analysis = analyze("src/app.js", source);
    let mut fns = kinds_of(&analysis, EntityKind::Function);
    fns.sort();
    assert_eq!(fns, vec!["helper", "main"]);
    assert!(has_rel(&analysis, RelationType::Calls, "main", &unresolved("loadData")));
    assert!(has_rel(&analysis, RelationType::Calls, "main", &unresolved("render")));
}

// ── Shared behaviour ────────────────────────────────────────────────────

#[test]
fn dispatch_covers_supported_extensions() {
    assert_eq!(
        analyzer_for_path(Path::new("a.py")).unwrap().language(),
        Language::Python
    );
    assert_eq!(
        analyzer_for_path(Path::new("a.go")).unwrap().language(),
        Language::Go
    );
    assert_eq!(
        analyzer_for_path(Path::new("a.tsx")).unwrap().language(),
        Language::TypeScript
    );
    assert_eq!(
        analyzer_for_path(Path::new("a.jsx")).unwrap().language(),
        Language::JavaScript
    );
    assert!(analyzer_for_path(Path::new("a.rb")).is_none());
}

#[test]
fn colliding_ids_get_ordinals() {
    // Two one-line defs on the same line via semicolons parse to the same
    // span only in pathological sources; exercise the sink directly instead.
    let file = onyx_core::Entity::new_file("x.py", Language::Python, 1);
    let mut sink = crate::EntitySink::new(&file);
    let e1 = onyx_core::Entity::new(
        EntityKind::Function,
        "f",
        "x.py",
        Language::Python,
        onyx_core::Span::new(1, 1),
    );
    let e2 = e1.clone();
    let id1 = sink.push_entity(e1);
    let id2 = sink.push_entity(e2);
    assert_eq!(id1, "x.py:1-1:f");
    assert_eq!(id2, "x.py:1-1:f#2");
}
