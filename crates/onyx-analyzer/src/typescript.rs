//! TypeScript/JavaScript analyzer using tree-sitter
//!
//! One analyzer drives both grammars; `.tsx` files use the TSX grammar
//! variant. Emits Class/Interface/Function/Method/Variable/Import
//! entities, ReExports/Decorates/HasProps/RendersJSX/Injects/
//! ConsumesService edges, and jest-style test suites and cases.

use onyx_core::{Entity, EntityKind, Language, OnyxError, RelationType, Relationship, Span};
use tree_sitter::Node;

use crate::parser::{self, complexity, end_line, header_line, simple_name, start_line, text, unquote};
use crate::{Analyzer, EntitySink, FileAnalysis, unresolved};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "for_in_statement",
    "while_statement",
    "switch_case",
    "catch_clause",
    "ternary_expression",
    "binary_expression",
];

pub struct ScriptAnalyzer {
    pub language: Language,
}

impl Analyzer for ScriptAnalyzer {
    fn language(&self) -> Language {
        self.language
    }

    fn analyze_file(&self, path: &str, bytes: &[u8]) -> FileAnalysis {
        let line_count = bytes.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let mut file = Entity::new_file(path, self.language, line_count);
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

        let Some(tree) = parser::parse(self.language, path, source) else {
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
            language: self.language,
            sink: &mut sink,
        };
        walker.visit_program(tree.root_node());

        let error = tree
            .root_node()
            .has_error()
            .then(|| OnyxError::parse(path, "syntax errors; entities may be partial"));
        sink.finish(file, error)
    }
}

struct Walker<'a, 'b> {
    path: &'a str,
    source: &'a str,
    language: Language,
    sink: &'b mut EntitySink,
}

impl Walker<'_, '_> {
    fn visit_program(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            self.visit_statement(child, false, &[]);
        }
    }

    fn visit_statement(&mut self, node: Node<'_>, exported: bool, decorators: &[String]) {
        match node.kind() {
            "export_statement" => self.visit_export(node),
            "import_statement" => self.visit_import(node),
            "function_declaration" | "generator_function_declaration" => {
                self.visit_function(node, exported, decorators);
            }
            "class_declaration" => self.visit_class(node, exported, decorators),
            "interface_declaration" => self.visit_interface(node, exported),
            "lexical_declaration" | "variable_declaration" => {
                self.visit_declaration(node, exported);
            }
            "expression_statement" => {
                if let Some(expr) = node.child(0) {
                    if expr.kind() == "call_expression" {
                        if self.visit_test_call(expr, None) {
                            return;
                        }
                        self.scan_dynamic_imports(expr);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_export(&mut self, node: Node<'_>) {
        // Re-export: `export { x } from './mod'` / `export * from './mod'`.
        if let Some(source_node) = node.child_by_field_name("source") {
            let module = unquote(text(source_node, self.source)).to_string();
            let span = Span::new(start_line(node), end_line(node));
            let import_id = self.emit_import_entity(&module, span);
            self.sink.push_relationship(Relationship::new(
                RelationType::ReExports,
                self.path.to_string(),
                import_id,
                EntityKind::File,
                EntityKind::Import,
            ));
            return;
        }
        let decorators = self.decorator_names(node);
        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.visit_statement(declaration, true, &decorators);
        }
    }

    fn decorator_names(&self, node: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                let raw = text(child, self.source).trim_start_matches('@');
                let callee = raw.split('(').next().unwrap_or(raw).trim();
                if !callee.is_empty() {
                    names.push(callee.to_string());
                }
            }
        }
        names
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let module = unquote(text(source_node, self.source)).to_string();
        let span = Span::new(start_line(node), end_line(node));

        let mut symbols = Vec::new();
        let mut alias = None;
        let mut idents = Vec::new();
        collect_kind(node, "import_specifier", &mut idents);
        for spec in &idents {
            if let Some(name) = spec.child_by_field_name("name") {
                symbols.push(text(name, self.source).to_string());
            }
        }
        let mut namespaces = Vec::new();
        collect_kind(node, "namespace_import", &mut namespaces);
        if let Some(ns) = namespaces.first() {
            let mut cursor = ns.walk();
            for child in ns.children(&mut cursor) {
                if child.kind() == "identifier" {
                    alias = Some(text(child, self.source).to_string());
                }
            }
        }

        let mut entity = Entity::new(
            EntityKind::Import,
            module.clone(),
            self.path,
            self.language,
            span,
        )
        .with_property("path", module);
        if !symbols.is_empty() {
            entity = entity.with_property("symbols", symbols.join(","));
        }
        if let Some(alias) = alias {
            entity = entity.with_property("alias", alias);
        }
        let id = self.sink.push_entity(entity);
        self.sink.push_relationship(Relationship::new(
            RelationType::Imports,
            self.path.to_string(),
            id,
            EntityKind::File,
            EntityKind::Import,
        ));
    }

    fn emit_import_entity(&mut self, module: &str, span: Span) -> String {
        let entity = Entity::new(
            EntityKind::Import,
            module,
            self.path,
            self.language,
            span,
        )
        .with_property("path", module);
        self.sink.push_entity(entity)
    }

    fn visit_function(&mut self, node: Node<'_>, exported: bool, decorators: &[String]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let fn_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));

        let mut entity = Entity::new(
            EntityKind::Function,
            fn_name,
            self.path,
            self.language,
            span,
        )
        .with_signature(header_line(node, self.source))
        .with_body(text(node, self.source))
        .with_property("is_exported", exported.to_string())
        .with_property("complexity", complexity(node, BRANCH_KINDS).to_string());
        if node.kind() == "generator_function_declaration" {
            entity = entity.with_property("is_generator", "true");
        }
        if !decorators.is_empty() {
            entity = entity.with_property("decorators", decorators.join(","));
        }
        let fn_id = self.sink.push_entity(entity);
        self.emit_decorates(decorators, &fn_id, EntityKind::Function);

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &fn_id, EntityKind::Function);
            self.emit_jsx_renders(body, &fn_id, EntityKind::Function);
        }
    }

    fn visit_class(&mut self, node: Node<'_>, exported: bool, decorators: &[String]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let class_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));

        let mut entity = Entity::new(
            EntityKind::Class,
            class_name,
            self.path,
            self.language,
            span,
        )
        .with_signature(header_line(node, self.source))
        .with_property("is_exported", exported.to_string());
        if !decorators.is_empty() {
            entity = entity.with_property("decorators", decorators.join(","));
        }
        let class_id = self.sink.push_entity(entity);
        self.emit_decorates(decorators, &class_id, EntityKind::Class);

        // extends → Inherits; implements → the interface constrains the class.
        for (clause_kind, names) in self.heritage(node) {
            for base in names {
                let simple = simple_name(&base);
                match clause_kind {
                    HeritageKind::Extends => {
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
                    HeritageKind::Implements => {
                        self.sink.push_relationship(
                            Relationship::new(
                                RelationType::Constrains,
                                unresolved(simple),
                                class_id.clone(),
                                EntityKind::Interface,
                                EntityKind::Class,
                            )
                            .with_property("interface_name", simple),
                        );
                    }
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                match member.kind() {
                    "method_definition" => {
                        self.visit_method(member, class_name, &class_id);
                    }
                    "public_field_definition" | "field_definition" => {
                        self.visit_field(member, &class_id);
                    }
                    _ => {}
                }
            }
        }
    }

    fn visit_method(&mut self, node: Node<'_>, class_name: &str, class_id: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let method_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));
        let decorators = self.decorator_names(node);

        let mut entity = Entity::new(
            EntityKind::Method,
            method_name,
            self.path,
            self.language,
            span,
        )
        .with_signature(header_line(node, self.source))
        .with_body(text(node, self.source))
        .with_parent(class_id.to_string())
        .with_property("receiver_type", class_name)
        .with_property("complexity", complexity(node, BRANCH_KINDS).to_string());
        if !decorators.is_empty() {
            entity = entity.with_property("decorators", decorators.join(","));
        }
        let method_id = self.sink.push_entity(entity);
        self.emit_decorates(&decorators, &method_id, EntityKind::Method);

        if method_name == "constructor" {
            self.emit_injections(node, class_id);
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &method_id, EntityKind::Method);
            self.emit_jsx_renders(body, &method_id, EntityKind::Method);
        }
    }

    /// Constructor parameter injection: `constructor(private users: UserService)`
    /// declares a dependency on the parameter's type.
    fn emit_injections(&mut self, constructor: Node<'_>, class_id: &str) {
        let Some(params) = constructor.child_by_field_name("parameters") else {
            return;
        };
        let mut required = Vec::new();
        collect_kind(params, "required_parameter", &mut required);
        for param in required {
            let has_modifier = {
                let mut cursor = param.walk();
                param
                    .children(&mut cursor)
                    .any(|c| c.kind() == "accessibility_modifier")
            };
            let Some(type_ann) = param.child_by_field_name("type") else {
                continue;
            };
            let type_name = simple_name(
                text(type_ann, self.source)
                    .trim_start_matches(':')
                    .trim()
                    .split('<')
                    .next()
                    .unwrap_or_default(),
            )
            .to_string();
            if type_name.is_empty() || !starts_uppercase(&type_name) {
                continue;
            }
            if has_modifier {
                self.sink.push_relationship(
                    Relationship::new(
                        RelationType::Injects,
                        class_id.to_string(),
                        unresolved(&type_name),
                        EntityKind::Class,
                        EntityKind::Class,
                    )
                    .with_property("injected_type", type_name.clone()),
                );
            }
            if type_name.ends_with("Service") {
                self.sink.push_relationship(
                    Relationship::new(
                        RelationType::ConsumesService,
                        class_id.to_string(),
                        unresolved(&type_name),
                        EntityKind::Class,
                        EntityKind::Class,
                    )
                    .with_property("service_type", type_name),
                );
            }
        }
    }

    fn visit_field(&mut self, node: Node<'_>, class_id: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let field_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));
        let mut entity = Entity::new(
            EntityKind::Variable,
            field_name,
            self.path,
            self.language,
            span,
        )
        .with_parent(class_id.to_string())
        .with_property("is_property", "true");
        if let Some(ty) = node.child_by_field_name("type") {
            entity = entity.with_property(
                "type",
                text(ty, self.source).trim_start_matches(':').trim(),
            );
        }
        if let Some(value) = node.child_by_field_name("value") {
            let first_line = text(value, self.source).lines().next().unwrap_or_default();
            entity = entity.with_property("value", first_line);
        }
        let field_id = self.sink.push_entity(entity);
        self.sink.push_relationship(Relationship::new(
            RelationType::HasProps,
            class_id.to_string(),
            field_id,
            EntityKind::Class,
            EntityKind::Variable,
        ));
    }

    fn visit_interface(&mut self, node: Node<'_>, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let iface_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));
        let entity = Entity::new(
            EntityKind::Interface,
            iface_name,
            self.path,
            self.language,
            span,
        )
        .with_signature(header_line(node, self.source))
        .with_property("type_definition", text(node, self.source))
        .with_property("is_exported", exported.to_string());
        let iface_id = self.sink.push_entity(entity);

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                if member.kind() == "property_signature" {
                    let Some(prop_name) = member.child_by_field_name("name") else {
                        continue;
                    };
                    let prop = text(prop_name, self.source);
                    let m_span = Span::new(start_line(member), end_line(member));
                    let mut var = Entity::new(
                        EntityKind::Variable,
                        prop,
                        self.path,
                        self.language,
                        m_span,
                    )
                    .with_parent(iface_id.clone())
                    .with_property("is_property", "true");
                    if let Some(ty) = member.child_by_field_name("type") {
                        var = var.with_property(
                            "type",
                            text(ty, self.source).trim_start_matches(':').trim(),
                        );
                    }
                    let var_id = self.sink.push_entity(var);
                    self.sink.push_relationship(Relationship::new(
                        RelationType::HasProps,
                        iface_id.clone(),
                        var_id,
                        EntityKind::Interface,
                        EntityKind::Variable,
                    ));
                }
            }
        }
    }

    /// Top-level `const`/`let`/`var`. Arrow and function expressions become
    /// Function entities; everything else is a Variable.
    fn visit_declaration(&mut self, node: Node<'_>, exported: bool) {
        let mut declarators = Vec::new();
        collect_kind(node, "variable_declarator", &mut declarators);
        for decl in declarators {
            let Some(name_node) = decl.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            let var_name = text(name_node, self.source);
            let span = Span::new(start_line(decl), end_line(decl));
            let value = decl.child_by_field_name("value");
            let is_function = value.is_some_and(|v| {
                matches!(v.kind(), "arrow_function" | "function_expression" | "function")
            });

            if is_function {
                let value = value.unwrap();
                let mut entity = Entity::new(
                    EntityKind::Function,
                    var_name,
                    self.path,
                    self.language,
                    span,
                )
                .with_signature(header_line(decl, self.source))
                .with_body(text(decl, self.source))
                .with_property("is_exported", exported.to_string())
                .with_property("is_arrow", (value.kind() == "arrow_function").to_string())
                .with_property(
                    "complexity",
                    complexity(value, BRANCH_KINDS).to_string(),
                );
                if starts_uppercase(var_name) && contains_jsx(value) {
                    entity = entity.with_property("is_component", "true");
                }
                let fn_id = self.sink.push_entity(entity);
                if let Some(body) = value.child_by_field_name("body") {
                    self.collect_calls(body, &fn_id, EntityKind::Function);
                    self.emit_jsx_renders(body, &fn_id, EntityKind::Function);
                }
            } else {
                let mut entity = Entity::new(
                    EntityKind::Variable,
                    var_name,
                    self.path,
                    self.language,
                    span,
                )
                .with_property("is_exported", exported.to_string());
                if let Some(ty) = decl.child_by_field_name("type") {
                    entity = entity.with_property(
                        "type",
                        text(ty, self.source).trim_start_matches(':').trim(),
                    );
                }
                if let Some(v) = value {
                    let first_line = text(v, self.source).lines().next().unwrap_or_default();
                    entity = entity.with_property("value", first_line);
                }
                self.sink.push_entity(entity);
            }
        }
    }

    /// A `describe`/`it`/`test` invocation. Returns true when handled.
    fn visit_test_call(&mut self, call: Node<'_>, suite_id: Option<&str>) -> bool {
        let Some(callee_node) = call.child_by_field_name("function") else {
            return false;
        };
        let callee = text(callee_node, self.source);
        // `describe.skip` / `it.each(...)` count too.
        let base = callee.split('.').next().unwrap_or(callee);
        if !matches!(base, "describe" | "it" | "test") {
            return false;
        }
        let Some(args) = call.child_by_field_name("arguments") else {
            return false;
        };
        let mut arg_nodes = Vec::new();
        let mut cursor = args.walk();
        for arg in args.children(&mut cursor) {
            if arg.is_named() {
                arg_nodes.push(arg);
            }
        }
        let label = arg_nodes
            .first()
            .map(|n| unquote(text(*n, self.source)).to_string())
            .unwrap_or_else(|| base.to_string());
        let callback = arg_nodes.iter().find(|n| {
            matches!(n.kind(), "arrow_function" | "function_expression" | "function")
        });
        let span = Span::new(start_line(call), end_line(call));
        let skipped = callee.contains(".skip");

        if base == "describe" {
            let mut entity = Entity::new(
                EntityKind::TestSuite,
                label,
                self.path,
                self.language,
                span,
            )
            .with_signature(header_line(call, self.source))
            .with_property("is_test", "true")
            .with_property("test_framework", "jest")
            .with_property("test_type", "unit");
            if skipped {
                entity = entity.with_property("skipped", "true");
            }
            let new_suite = self.sink.push_entity(entity);
            if let Some(parent) = suite_id {
                self.sink.push_relationship(Relationship::new(
                    RelationType::GroupsTests,
                    parent.to_string(),
                    new_suite.clone(),
                    EntityKind::TestSuite,
                    EntityKind::TestSuite,
                ));
            }
            let mut case_count = 0;
            if let Some(cb) = callback {
                if let Some(body) = cb.child_by_field_name("body") {
                    case_count = self.scan_test_body(body, &new_suite);
                }
            }
            if let Some(entity) = self
                .sink
                .entities_mut()
                .iter_mut()
                .find(|e| e.id == new_suite)
            {
                entity.set_property("test_count", case_count.to_string());
            }
        } else {
            let assertions = callback
                .map(|cb| self.count_expects(*cb))
                .unwrap_or(0);
            let mut entity = Entity::new(
                EntityKind::TestCase,
                label.clone(),
                self.path,
                self.language,
                span,
            )
            .with_signature(header_line(call, self.source))
            .with_property("is_test", "true")
            .with_property("test_framework", "jest")
            .with_property("test_type", "unit")
            .with_property("assertion_count", assertions.to_string());
            if skipped {
                entity = entity.with_property("skipped", "true");
            }
            if let Some(target) = camel_test_target(&label) {
                entity = entity.with_property("test_target", target);
            }
            if let Some(parent) = suite_id {
                entity = entity.with_parent(parent.to_string());
            }
            let case_id = self.sink.push_entity(entity);
            if let Some(parent) = suite_id {
                self.sink.push_relationship(Relationship::new(
                    RelationType::RunsTest,
                    parent.to_string(),
                    case_id.clone(),
                    EntityKind::TestSuite,
                    EntityKind::TestCase,
                ));
            }
            if let Some(cb) = callback {
                if let Some(body) = cb.child_by_field_name("body") {
                    self.collect_calls(body, &case_id, EntityKind::TestCase);
                }
            }
        }
        true
    }

    /// Walk a describe callback body: nested suites, cases, and plain calls.
    /// Returns the number of direct cases found.
    fn scan_test_body(&mut self, body: Node<'_>, suite_id: &str) -> usize {
        let mut cases = 0;
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            if child.kind() == "expression_statement" {
                if let Some(expr) = child.child(0) {
                    if expr.kind() == "call_expression" {
                        let callee = expr
                            .child_by_field_name("function")
                            .map(|n| text(n, self.source))
                            .unwrap_or_default();
                        let base = callee.split('.').next().unwrap_or(callee);
                        if matches!(base, "it" | "test") {
                            cases += 1;
                        }
                        if self.visit_test_call(expr, Some(suite_id)) {
                            continue;
                        }
                    }
                }
            }
            cases += self.scan_test_body(child, suite_id);
        }
        cases
    }

    fn count_expects(&self, node: Node<'_>) -> usize {
        let mut count = 0;
        if node.kind() == "call_expression" {
            if let Some(callee) = node.child_by_field_name("function") {
                if text(callee, self.source) == "expect" {
                    count += 1;
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            count += self.count_expects(child);
        }
        count
    }

    fn emit_decorates(&mut self, decorators: &[String], target_id: &str, target_kind: EntityKind) {
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

    /// RendersJSX edges: one per distinct capitalised JSX tag in the body.
    fn emit_jsx_renders(&mut self, body: Node<'_>, source_id: &str, source_kind: EntityKind) {
        let mut tags = Vec::new();
        collect_jsx_tags(body, self.source, &mut tags);
        tags.sort();
        tags.dedup();
        for tag in tags {
            self.sink.push_relationship(
                Relationship::new(
                    RelationType::RendersJsx,
                    source_id.to_string(),
                    unresolved(&tag),
                    source_kind,
                    EntityKind::Function,
                )
                .with_property("component", tag),
            );
        }
    }

    fn collect_calls(&mut self, node: Node<'_>, caller_id: &str, caller_kind: EntityKind) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                // Inner declarations own their call sites.
                "function_declaration" | "class_declaration" => continue,
                "call_expression" => {
                    if let Some(callee_node) = child.child_by_field_name("function") {
                        let callee = text(callee_node, self.source);
                        if callee == "import" {
                            self.emit_dynamic_import(child);
                        } else {
                            let simple = simple_name(callee);
                            if !simple.is_empty() && !matches!(simple, "describe" | "it" | "test") {
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
                    }
                    self.collect_calls(child, caller_id, caller_kind);
                }
                _ => self.collect_calls(child, caller_id, caller_kind),
            }
        }
    }

    fn scan_dynamic_imports(&mut self, node: Node<'_>) {
        if node.kind() == "call_expression" {
            if let Some(callee) = node.child_by_field_name("function") {
                if text(callee, self.source) == "import" {
                    self.emit_dynamic_import(node);
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.scan_dynamic_imports(child);
        }
    }

    fn emit_dynamic_import(&mut self, call: Node<'_>) {
        let Some(args) = call.child_by_field_name("arguments") else {
            return;
        };
        let mut cursor = args.walk();
        for arg in args.children(&mut cursor) {
            if arg.kind() == "string" {
                let module = unquote(text(arg, self.source)).to_string();
                let span = Span::new(start_line(call), end_line(call));
                let import_id = self.emit_import_entity(&module, span);
                self.sink.push_relationship(
                    Relationship::new(
                        RelationType::DynamicImport,
                        self.path.to_string(),
                        import_id,
                        EntityKind::File,
                        EntityKind::Import,
                    )
                    .with_property("lazy", "true"),
                );
                return;
            }
        }
    }

    fn heritage(&self, class_node: Node<'_>) -> Vec<(HeritageKind, Vec<String>)> {
        let mut clauses = Vec::new();
        let mut heritage_nodes = Vec::new();
        collect_kind(class_node, "class_heritage", &mut heritage_nodes);
        for heritage in heritage_nodes {
            let mut extends_nodes = Vec::new();
            collect_kind(heritage, "extends_clause", &mut extends_nodes);
            for clause in extends_nodes {
                clauses.push((HeritageKind::Extends, self.heritage_names(clause)));
            }
            let mut implements_nodes = Vec::new();
            collect_kind(heritage, "implements_clause", &mut implements_nodes);
            for clause in implements_nodes {
                clauses.push((HeritageKind::Implements, self.heritage_names(clause)));
            }
            // JS grammar: class_heritage is just `extends <expr>`.
            if clauses.is_empty() {
                let raw = text(heritage, self.source);
                let name = raw.trim_start_matches("extends").trim();
                if !name.is_empty() {
                    clauses.push((HeritageKind::Extends, vec![name.to_string()]));
                }
            }
        }
        clauses
    }

    fn heritage_names(&self, clause: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "identifier" | "member_expression" | "type_identifier" | "generic_type"
                | "nested_type_identifier" => {
                    let raw = text(child, self.source);
                    let name = raw.split('<').next().unwrap_or(raw).trim();
                    if !name.is_empty() {
                        names.push(name.to_string());
                    }
                }
                _ => {}
            }
        }
        names
    }
}

#[derive(Clone, Copy, PartialEq)]
enum HeritageKind {
    Extends,
    Implements,
}

fn collect_kind<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    if node.kind() == kind {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_kind(child, kind, out);
    }
}

fn contains_jsx(node: Node<'_>) -> bool {
    parser::has_descendant(node, "jsx_element")
        || parser::has_descendant(node, "jsx_self_closing_element")
}

fn collect_jsx_tags(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "jsx_opening_element" | "jsx_self_closing_element" => {
            if let Some(name) = node.child_by_field_name("name") {
                let tag = text(name, source);
                if starts_uppercase(tag) {
                    out.push(tag.to_string());
                }
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_jsx_tags(child, source, out);
    }
}

fn starts_uppercase(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_uppercase())
}

/// `"adds two numbers"` has no single target; `"loadUsers returns data"`
/// yields `loadUsers` when the first word looks like an identifier.
fn camel_test_target(label: &str) -> Option<String> {
    let first = label.split_whitespace().next()?;
    let identifier = first
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    let looks_named = first.chars().any(|c| c.is_uppercase()) || first.contains('_');
    (identifier && looks_named).then(|| first.to_string())
}
