//! Python analyzer using tree-sitter
//!
//! Emits Class/Function/Method/Import/Variable entities, Inherits and
//! Decorates edges, and best-effort Calls edges. Test functions are
//! recognised by the `test_*` naming pattern or by membership in a
//! `unittest.TestCase` subclass.

use onyx_core::{Entity, EntityKind, Language, OnyxError, RelationType, Relationship, Span};
use tree_sitter::Node;

use crate::parser::{self, complexity, end_line, header_line, simple_name, start_line, text};
use crate::{Analyzer, EntitySink, FileAnalysis, unresolved};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "boolean_operator",
    "conditional_expression",
    "match_statement",
];

pub struct PythonAnalyzer;

impl Analyzer for PythonAnalyzer {
    fn language(&self) -> Language {
        Language::Python
    }

    fn analyze_file(&self, path: &str, bytes: &[u8]) -> FileAnalysis {
        let line_count = bytes.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let mut file = Entity::new_file(path, Language::Python, line_count);
        if Entity::is_test_file(path) {
            file.set_property("is_test", "true");
        }

        let source = match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                return FileAnalysis {
                    file,
                    entities: Vec::new(),
                    relationships: Vec::new(),
                    error: Some(OnyxError::parse(path, format!("invalid utf-8: {}", e))),
                };
            }
        };

        let Some(tree) = parser::parse(Language::Python, path, source) else {
            tracing::warn!("parser returned no tree for {}", path);
            return FileAnalysis {
                file,
                entities: Vec::new(),
                relationships: Vec::new(),
                error: Some(OnyxError::parse(path, "tree-sitter produced no tree")),
            };
        };

        let mut sink = EntitySink::new(&file);
        let mut walker = Walker {
            path,
            source,
            sink: &mut sink,
        };
        walker.visit_module(tree.root_node());

        let error = tree
            .root_node()
            .has_error()
            .then(|| OnyxError::parse(path, "syntax errors; entities may be partial"));
        sink.finish(file, error)
    }
}

/// Enclosing class context while walking a class body.
struct ClassCtx {
    id: String,
    is_test_case: bool,
}

struct Walker<'a, 'b> {
    path: &'a str,
    source: &'a str,
    sink: &'b mut EntitySink,
}

impl Walker<'_, '_> {
    fn visit_module(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            self.visit_statement(child, &[]);
        }
    }

    /// One top-level or class-body statement. `decorators` carries the
    /// decorator names of an enclosing `decorated_definition`.
    fn visit_statement(&mut self, node: Node<'_>, decorators: &[String]) {
        match node.kind() {
            "decorated_definition" => {
                let names = self.decorator_names(node);
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.visit_statement(definition, &names);
                }
            }
            "function_definition" => {
                self.visit_function(node, None, decorators);
            }
            "class_definition" => {
                self.visit_class(node, decorators);
            }
            "import_statement" | "import_from_statement" => {
                self.visit_import(node);
            }
            "expression_statement" => {
                self.visit_module_assignment(node);
            }
            _ => {}
        }
    }

    fn decorator_names(&self, node: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                // Text after '@': a name, dotted path, or call like app.route(...)
                let raw = text(child, self.source).trim_start_matches('@');
                let callee = raw.split('(').next().unwrap_or(raw).trim();
                if !callee.is_empty() {
                    names.push(callee.to_string());
                }
            }
        }
        names
    }

    fn visit_class(&mut self, node: Node<'_>, decorators: &[String]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let class_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));

        let bases = self.base_classes(node);
        let is_test_case = bases.iter().any(|b| b.ends_with("TestCase"));

        let mut entity = Entity::new(
            EntityKind::Class,
            class_name,
            self.path,
            Language::Python,
            span,
        )
        .with_signature(header_line(node, self.source))
        .with_property("is_exported", exported(class_name));
        if !decorators.is_empty() {
            entity = entity.with_property("decorators", decorators.join(","));
        }
        if is_test_case {
            entity = entity.with_property("is_test", "true");
        }
        let class_id = self.sink.push_entity(entity);

        for base in &bases {
            let simple = simple_name(base);
            self.sink.push_relationship(
                Relationship::new(
                    RelationType::Inherits,
                    class_id.clone(),
                    unresolved(simple),
                    EntityKind::Class,
                    EntityKind::Class,
                )
                .with_property("base_name", simple),
            );
        }
        self.emit_decorates(decorators, &class_id, EntityKind::Class);

        let ctx = ClassCtx {
            id: class_id,
            is_test_case,
        };
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                match child.kind() {
                    "function_definition" => self.visit_function(child, Some(&ctx), &[]),
                    "decorated_definition" => {
                        let names = self.decorator_names(child);
                        if let Some(def) = child.child_by_field_name("definition") {
                            if def.kind() == "function_definition" {
                                self.visit_function(def, Some(&ctx), &names);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn base_classes(&self, class_node: Node<'_>) -> Vec<String> {
        let mut bases = Vec::new();
        if let Some(supers) = class_node.child_by_field_name("superclasses") {
            let mut cursor = supers.walk();
            for child in supers.children(&mut cursor) {
                match child.kind() {
                    "identifier" | "attribute" => {
                        bases.push(text(child, self.source).to_string());
                    }
                    // keyword arguments (metaclass=...) are not bases
                    _ => {}
                }
            }
        }
        bases
    }

    fn visit_function(&mut self, node: Node<'_>, class: Option<&ClassCtx>, decorators: &[String]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let fn_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));

        let is_test = fn_name.starts_with("test_") || (class.is_some_and(|c| c.is_test_case) && fn_name.starts_with("test"));
        let kind = if is_test {
            EntityKind::TestFunction
        } else if class.is_some() {
            EntityKind::Method
        } else {
            EntityKind::Function
        };

        let mut entity = Entity::new(kind, fn_name, self.path, Language::Python, span)
            .with_signature(header_line(node, self.source))
            .with_body(text(node, self.source))
            .with_property("is_exported", exported(fn_name))
            .with_property(
                "complexity",
                complexity(node, BRANCH_KINDS).to_string(),
            );
        if let Some(ctx) = class {
            entity = entity.with_parent(ctx.id.clone());
        }
        if !decorators.is_empty() {
            entity = entity.with_property("decorators", decorators.join(","));
        }
        if is_test {
            let framework = if class.is_some_and(|c| c.is_test_case) {
                "unittest"
            } else {
                "pytest"
            };
            entity = entity
                .with_property("is_test", "true")
                .with_property("test_framework", framework)
                .with_property("test_type", "unit")
                .with_property(
                    "assertion_count",
                    self.count_assertions(node).to_string(),
                );
            if let Some(target) = test_target(fn_name) {
                entity = entity.with_property("test_target", target);
            }
        }

        let fn_id = self.sink.push_entity(entity);
        self.emit_decorates(decorators, &fn_id, kind);

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &fn_id, kind);
        }
    }

    /// Decorator edges: the (usually external) decorator function wraps the
    /// declared entity.
    fn emit_decorates(&mut self, decorators: &[String], target_id: &str, target_kind: EntityKind) {
        // Decorates only admits callable/class targets.
        if !matches!(
            target_kind,
            EntityKind::Function | EntityKind::Method | EntityKind::Class
        ) {
            return;
        }
        for dec in decorators {
            let simple = simple_name(dec);
            self.sink.push_relationship(
                Relationship::new(
                    RelationType::Decorates,
                    unresolved(simple),
                    target_id.to_string(),
                    EntityKind::Function,
                    target_kind,
                )
                .with_property("decorator", dec.clone()),
            );
        }
    }

    /// Best-effort call edges: every call expression inside `body`, keyed by
    /// the callee's simple name. Nested defs attribute to the nearest
    /// enclosing function, so stop at inner definitions.
    fn collect_calls(&mut self, body: Node<'_>, caller_id: &str, caller_kind: EntityKind) {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            match child.kind() {
                "function_definition" | "class_definition" | "decorated_definition" => continue,
                "call" => {
                    if let Some(callee_node) = child.child_by_field_name("function") {
                        let callee = text(callee_node, self.source);
                        let simple = simple_name(callee);
                        if !simple.is_empty() {
                            self.sink.push_relationship(
                                Relationship::new(
                                    RelationType::Calls,
                                    caller_id.to_string(),
                                    unresolved(simple),
                                    caller_kind,
                                    EntityKind::Function,
                                )
                                .with_property("callee_name", simple)
                                .with_property("call_line", start_line(child).to_string()),
                            );
                        }
                    }
                    // arguments can contain further calls
                    self.collect_calls(child, caller_id, caller_kind);
                }
                _ => self.collect_calls(child, caller_id, caller_kind),
            }
        }
    }

    fn count_assertions(&self, node: Node<'_>) -> usize {
        let mut count = parser::count_descendants(node, &["assert_statement"]);
        count += self.count_assert_calls(node);
        count
    }

    fn count_assert_calls(&self, node: Node<'_>) -> usize {
        let mut count = 0;
        if node.kind() == "call" {
            if let Some(callee) = node.child_by_field_name("function") {
                if simple_name(text(callee, self.source)).starts_with("assert") {
                    count += 1;
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            count += self.count_assert_calls(child);
        }
        count
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let span = Span::new(start_line(node), end_line(node));
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "dotted_name" => {
                            let module = text(child, self.source);
                            self.emit_import(module, None, span);
                        }
                        "aliased_import" => {
                            let module = child
                                .child_by_field_name("name")
                                .map(|n| text(n, self.source))
                                .unwrap_or_default();
                            let alias = child
                                .child_by_field_name("alias")
                                .map(|n| text(n, self.source).to_string());
                            if !module.is_empty() {
                                self.emit_import(module, alias, span);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module_node) = node.child_by_field_name("module_name") {
                    let module = text(module_node, self.source);
                    // Collect the imported symbols for later name resolution.
                    let mut symbols = Vec::new();
                    let mut cursor = node.walk();
                    for child in node.children(&mut cursor) {
                        if child.kind() == "dotted_name" && child.byte_range() != module_node.byte_range() {
                            symbols.push(text(child, self.source).to_string());
                        } else if child.kind() == "aliased_import" {
                            if let Some(n) = child.child_by_field_name("name") {
                                symbols.push(text(n, self.source).to_string());
                            }
                        }
                    }
                    let id = self.emit_import(module, None, span);
                    if !symbols.is_empty() {
                        if let Some(entity) = self.find_entity_mut(&id) {
                            entity.set_property("symbols", symbols.join(","));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn emit_import(&mut self, module: &str, alias: Option<String>, span: Span) -> String {
        let mut entity = Entity::new(
            EntityKind::Import,
            module,
            self.path,
            Language::Python,
            span,
        )
        .with_property("path", module);
        if let Some(alias) = alias {
            entity = entity.with_property("alias", alias);
        }
        let id = self.sink.push_entity(entity);
        self.sink.push_relationship(Relationship::new(
            RelationType::Imports,
            self.path.to_string(),
            id.clone(),
            EntityKind::File,
            EntityKind::Import,
        ));
        id
    }

    fn find_entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.sink.entities_mut().iter_mut().find(|e| e.id == id)
    }

    /// Module-level `NAME = value` assignments become Variable entities.
    fn visit_module_assignment(&mut self, stmt: Node<'_>) {
        let Some(expr) = stmt.child(0) else { return };
        if expr.kind() != "assignment" {
            return;
        }
        let Some(left) = expr.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = text(left, self.source);
        let span = Span::new(start_line(stmt), end_line(stmt));
        let mut entity = Entity::new(
            EntityKind::Variable,
            name,
            self.path,
            Language::Python,
            span,
        )
        .with_property("is_exported", exported(name));
        if let Some(ty) = expr.child_by_field_name("type") {
            entity = entity.with_property("type", text(ty, self.source));
        }
        if let Some(right) = expr.child_by_field_name("right") {
            let value = text(right, self.source);
            let first_line = value.lines().next().unwrap_or_default();
            entity = entity.with_property("value", first_line);
        }
        self.sink.push_entity(entity);
    }
}

fn exported(name: &str) -> &'static str {
    if name.starts_with('_') { "false" } else { "true" }
}

/// `test_process_data` → `process_data`; bare `test` has no target.
fn test_target(test_name: &str) -> Option<&str> {
    let target = test_name.strip_prefix("test_").or_else(|| test_name.strip_prefix("test"))?;
    (!target.is_empty()).then_some(target)
}
