//! Go analyzer using tree-sitter
//!
//! Emits Struct/Interface/Method/Function/Import/Variable entities, Embeds
//! edges for anonymous fields, Defines edges for method ownership, and
//! Implements edges computed by method-set inclusion. `TestXxx(t
//! *testing.T)` functions become TestFunction entities.

use std::collections::HashSet;

use onyx_core::{Entity, EntityKind, Language, OnyxError, RelationType, Relationship, Span};
use tree_sitter::Node;

use crate::parser::{self, complexity, end_line, header_line, simple_name, start_line, text, unquote};
use crate::{Analyzer, EntitySink, FileAnalysis, unresolved};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
    "expression_case",
    "type_case",
    "communication_case",
];

pub struct GoAnalyzer;

impl Analyzer for GoAnalyzer {
    fn language(&self) -> Language {
        Language::Go
    }

    fn analyze_file(&self, path: &str, bytes: &[u8]) -> FileAnalysis {
        let line_count = bytes.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let mut file = Entity::new_file(path, Language::Go, line_count);
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

        let Some(tree) = parser::parse(Language::Go, path, source) else {
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
            structs: Vec::new(),
            interfaces: Vec::new(),
        };
        walker.visit_file(tree.root_node());
        walker.link_method_ownership();
        walker.link_implements();

        let error = tree
            .root_node()
            .has_error()
            .then(|| OnyxError::parse(path, "syntax errors; entities may be partial"));
        sink.finish(file, error)
    }
}

/// A method's identity for set-inclusion checks: name plus the parameter
/// and result types with whitespace collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodSig {
    name: String,
    params: String,
    result: String,
}

struct StructInfo {
    name: String,
    id: String,
    methods: Vec<(MethodSig, String)>,
}

struct InterfaceInfo {
    name: String,
    id: String,
    required: Vec<MethodSig>,
}

struct Walker<'a, 'b> {
    path: &'a str,
    source: &'a str,
    sink: &'b mut EntitySink,
    structs: Vec<StructInfo>,
    interfaces: Vec<InterfaceInfo>,
}

impl Walker<'_, '_> {
    fn visit_file(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "function_declaration" => self.visit_function(child),
                "method_declaration" => self.visit_method(child),
                "type_declaration" => self.visit_type_declaration(child),
                "import_declaration" => self.visit_imports(child),
                "var_declaration" | "const_declaration" => self.visit_variables(child),
                _ => {}
            }
        }
    }

    fn visit_function(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let fn_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));

        let is_test = is_go_test(fn_name, node, self.source);
        let kind = if is_test {
            EntityKind::TestFunction
        } else {
            EntityKind::Function
        };

        let mut entity = Entity::new(kind, fn_name, self.path, Language::Go, span)
            .with_signature(header_line(node, self.source))
            .with_body(text(node, self.source))
            .with_property("is_exported", exported(fn_name))
            .with_property("complexity", complexity(node, BRANCH_KINDS).to_string());
        entity = self.concurrency_properties(entity, node);
        if let Some(type_params) = node.child_by_field_name("type_parameters") {
            entity = entity.with_property("type_params", text(type_params, self.source));
        }
        if is_test {
            entity = entity
                .with_property("is_test", "true")
                .with_property("test_framework", "go_testing")
                .with_property("test_type", "unit")
                .with_property("assertion_count", count_t_calls(node, self.source).to_string());
            let target = &fn_name["Test".len()..];
            if !target.is_empty() {
                entity = entity.with_property("test_target", target);
            }
        }

        let fn_id = self.sink.push_entity(entity);
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &fn_id, kind);
        }
    }

    fn visit_method(&mut self, node: Node<'_>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let method_name = text(name_node, self.source);
        let span = Span::new(start_line(node), end_line(node));

        let receiver_type = node
            .child_by_field_name("receiver")
            .and_then(|r| receiver_type_name(r, self.source))
            .unwrap_or_default();

        let mut entity = Entity::new(
            EntityKind::Method,
            method_name,
            self.path,
            Language::Go,
            span,
        )
        .with_signature(header_line(node, self.source))
        .with_body(text(node, self.source))
        .with_property("receiver_type", receiver_type.clone())
        .with_property("is_exported", exported(method_name))
        .with_property("complexity", complexity(node, BRANCH_KINDS).to_string());
        entity = self.concurrency_properties(entity, node);

        let sig = MethodSig {
            name: method_name.to_string(),
            params: self.param_types(node.child_by_field_name("parameters")),
            result: self.result_types(node.child_by_field_name("result")),
        };

        let method_id = self.sink.push_entity(entity);
        if let Some(info) = self.structs.iter_mut().find(|s| s.name == receiver_type) {
            info.methods.push((sig, method_id.clone()));
        } else if !receiver_type.is_empty() {
            // Receiver declared later in the file; reconcile afterwards.
            self.structs.push(StructInfo {
                name: receiver_type,
                id: String::new(),
                methods: vec![(sig, method_id.clone())],
            });
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &method_id, EntityKind::Method);
        }
    }

    fn visit_type_declaration(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for spec in node.children(&mut cursor) {
            if spec.kind() != "type_spec" {
                continue;
            }
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let type_name = text(name_node, self.source);
            let Some(type_node) = spec.child_by_field_name("type") else {
                continue;
            };
            let span = Span::new(start_line(spec), end_line(spec));

            match type_node.kind() {
                "struct_type" => self.visit_struct(spec, type_node, type_name, span),
                "interface_type" => self.visit_interface(spec, type_node, type_name, span),
                _ => {
                    // Named types (aliases, func types) surface as variables
                    // of kind `type` so references still resolve somewhere.
                    let entity = Entity::new(
                        EntityKind::Variable,
                        type_name,
                        self.path,
                        Language::Go,
                        span,
                    )
                    .with_property("type", text(type_node, self.source))
                    .with_property("is_exported", exported(type_name));
                    self.sink.push_entity(entity);
                }
            }
        }
    }

    fn visit_struct(&mut self, spec: Node<'_>, struct_type: Node<'_>, name: &str, span: Span) {
        let mut entity = Entity::new(EntityKind::Struct, name, self.path, Language::Go, span)
            .with_signature(header_line(spec, self.source))
            .with_property("type_definition", text(struct_type, self.source))
            .with_property("is_exported", exported(name));
        if let Some(type_params) = spec.child_by_field_name("type_parameters") {
            entity = entity.with_property("type_params", text(type_params, self.source));
        }
        let struct_id = self.sink.push_entity(entity);

        // Anonymous fields are embeddings.
        for embedded in embedded_fields(struct_type, self.source) {
            self.sink.push_relationship(
                Relationship::new(
                    RelationType::Embeds,
                    struct_id.clone(),
                    unresolved(&embedded),
                    EntityKind::Struct,
                    EntityKind::Struct,
                )
                .with_property("embedded_type", embedded),
            );
        }

        if let Some(existing) = self.structs.iter_mut().find(|s| s.name == name) {
            existing.id = struct_id;
        } else {
            self.structs.push(StructInfo {
                name: name.to_string(),
                id: struct_id,
                methods: Vec::new(),
            });
        }
    }

    fn visit_interface(&mut self, spec: Node<'_>, interface_type: Node<'_>, name: &str, span: Span) {
        let entity = Entity::new(EntityKind::Interface, name, self.path, Language::Go, span)
            .with_signature(header_line(spec, self.source))
            .with_property("type_definition", text(interface_type, self.source))
            .with_property("is_exported", exported(name));
        let interface_id = self.sink.push_entity(entity);

        let mut required = Vec::new();
        let mut cursor = interface_type.walk();
        for elem in interface_type.children(&mut cursor) {
            // Grammar versions differ on the element name.
            if elem.kind() != "method_elem" && elem.kind() != "method_spec" {
                continue;
            }
            let Some(m_name) = elem.child_by_field_name("name") else {
                continue;
            };
            let method_name = text(m_name, self.source);
            let sig = MethodSig {
                name: method_name.to_string(),
                params: self.param_types(elem.child_by_field_name("parameters")),
                result: self.result_types(elem.child_by_field_name("result")),
            };

            let m_span = Span::new(start_line(elem), end_line(elem));
            let method_entity = Entity::new(
                EntityKind::Method,
                method_name,
                self.path,
                Language::Go,
                m_span,
            )
            .with_signature(text(elem, self.source).trim())
            .with_parent(interface_id.clone())
            .with_property("receiver_type", name)
            .with_property("is_exported", exported(method_name))
            .with_property("is_abstract", "true");
            let method_id = self.sink.push_entity(method_entity);

            self.sink.push_relationship(Relationship::new(
                RelationType::Defines,
                interface_id.clone(),
                method_id,
                EntityKind::Interface,
                EntityKind::Method,
            ));
            required.push(sig);
        }

        self.interfaces.push(InterfaceInfo {
            name: name.to_string(),
            id: interface_id,
            required,
        });
    }

    /// Struct → Method Defines edges, once both sides are known.
    fn link_method_ownership(&mut self) {
        let mut edges = Vec::new();
        for info in &self.structs {
            if info.id.is_empty() {
                continue;
            }
            for (_, method_id) in &info.methods {
                edges.push(Relationship::new(
                    RelationType::Defines,
                    info.id.clone(),
                    method_id.clone(),
                    EntityKind::Struct,
                    EntityKind::Method,
                ));
            }
        }
        for edge in edges {
            self.sink.push_relationship(edge);
        }
        // Parent the methods onto their struct now that its id is final.
        let parents: Vec<(String, String)> = self
            .structs
            .iter()
            .filter(|s| !s.id.is_empty())
            .flat_map(|s| {
                s.methods
                    .iter()
                    .map(|(_, mid)| (mid.clone(), s.id.clone()))
            })
            .collect();
        for (method_id, struct_id) in parents {
            if let Some(entity) = self.sink.entities_mut().iter_mut().find(|e| e.id == method_id) {
                entity.parent_id = Some(struct_id);
            }
        }
    }

    /// A struct implements an interface when its method set is a superset
    /// of the interface's required set. Signature comparison is exact, so
    /// the edge carries no heuristic confidence.
    fn link_implements(&mut self) {
        let mut edges = Vec::new();
        for s in &self.structs {
            if s.id.is_empty() {
                continue;
            }
            let have: HashSet<&MethodSig> = s.methods.iter().map(|(sig, _)| sig).collect();
            for i in &self.interfaces {
                if i.required.is_empty() {
                    continue;
                }
                if i.required.iter().all(|req| have.contains(req)) {
                    edges.push(
                        Relationship::new(
                            RelationType::Implements,
                            s.id.clone(),
                            i.id.clone(),
                            EntityKind::Struct,
                            EntityKind::Interface,
                        )
                        .with_property("interface_name", i.name.clone()),
                    );
                }
            }
        }
        for edge in edges {
            self.sink.push_relationship(edge);
        }
    }

    fn visit_imports(&mut self, node: Node<'_>) {
        let mut specs = Vec::new();
        collect_kind(node, "import_spec", &mut specs);
        for spec in specs {
            let Some(path_node) = spec.child_by_field_name("path") else {
                continue;
            };
            let import_path = unquote(text(path_node, self.source)).to_string();
            let alias = spec
                .child_by_field_name("name")
                .map(|n| text(n, self.source).to_string());
            let span = Span::new(start_line(spec), end_line(spec));

            let mut entity = Entity::new(
                EntityKind::Import,
                import_path.clone(),
                self.path,
                Language::Go,
                span,
            )
            .with_property("path", import_path);
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
    }

    fn visit_variables(&mut self, node: Node<'_>) {
        let mut specs = Vec::new();
        collect_kind(node, "var_spec", &mut specs);
        collect_kind(node, "const_spec", &mut specs);
        for spec in specs {
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let var_name = text(name_node, self.source);
            let span = Span::new(start_line(spec), end_line(spec));
            let mut entity = Entity::new(
                EntityKind::Variable,
                var_name,
                self.path,
                Language::Go,
                span,
            )
            .with_property("is_exported", exported(var_name))
            .with_property(
                "is_const",
                (node.kind() == "const_declaration").to_string(),
            );
            if let Some(ty) = spec.child_by_field_name("type") {
                entity = entity.with_property("type", text(ty, self.source));
            }
            if let Some(value) = spec.child_by_field_name("value") {
                let first_line = text(value, self.source).lines().next().unwrap_or_default();
                entity = entity.with_property("value", first_line);
            }
            self.sink.push_entity(entity);
        }
    }

    fn collect_calls(&mut self, node: Node<'_>, caller_id: &str, caller_kind: EntityKind) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "call_expression" {
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
            }
            self.collect_calls(child, caller_id, caller_kind);
        }
    }

    fn concurrency_properties(&self, mut entity: Entity, node: Node<'_>) -> Entity {
        if parser::has_descendant(node, "go_statement") {
            entity = entity.with_property("uses_goroutines", "true");
        }
        if parser::has_descendant(node, "channel_type")
            || parser::has_descendant(node, "send_statement")
        {
            entity = entity.with_property("uses_channels", "true");
        }
        entity
    }

    /// Parameter types with whitespace collapsed: `(a int, b int)` → `int,int`.
    fn param_types(&self, params: Option<Node<'_>>) -> String {
        let Some(params) = params else {
            return String::new();
        };
        let mut types = Vec::new();
        let mut cursor = params.walk();
        for param in params.children(&mut cursor) {
            if param.kind() == "parameter_declaration"
                || param.kind() == "variadic_parameter_declaration"
            {
                if let Some(ty) = param.child_by_field_name("type") {
                    types.push(collapse(text(ty, self.source)));
                }
            }
        }
        types.join(",")
    }

    fn result_types(&self, result: Option<Node<'_>>) -> String {
        let Some(result) = result else {
            return String::new();
        };
        if result.kind() == "parameter_list" {
            self.param_types(Some(result))
        } else {
            collapse(text(result, self.source))
        }
    }
}

/// `func TestXxx(t *testing.T)` — exported Test prefix plus the testing
/// parameter.
fn is_go_test(name: &str, node: Node<'_>, source: &str) -> bool {
    if !name.starts_with("Test") || name.len() == 4 {
        return false;
    }
    if !name.chars().nth(4).is_some_and(|c| c.is_uppercase() || c == '_') {
        return false;
    }
    node.child_by_field_name("parameters")
        .map(|p| text(p, source).contains("*testing.T"))
        .unwrap_or(false)
}

/// `t.Error`/`t.Fatal`/`t.Errorf`… call count inside a test body.
fn count_t_calls(node: Node<'_>, source: &str) -> usize {
    let mut count = 0;
    if node.kind() == "call_expression" {
        if let Some(callee) = node.child_by_field_name("function") {
            let callee_text = text(callee, source);
            if let Some(rest) = callee_text.strip_prefix("t.") {
                if ["Error", "Errorf", "Fatal", "Fatalf", "Fail", "FailNow"]
                    .iter()
                    .any(|m| rest == *m)
                {
                    count += 1;
                }
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count += count_t_calls(child, source);
    }
    count
}

/// Receiver type name, with pointer stars and type arguments stripped:
/// `(s *Server[T])` → `Server`.
fn receiver_type_name(receiver: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = receiver.walk();
    for param in receiver.children(&mut cursor) {
        if param.kind() == "parameter_declaration" {
            if let Some(ty) = param.child_by_field_name("type") {
                let raw = text(ty, source)
                    .trim_start_matches('*')
                    .trim();
                let name = raw.split('[').next().unwrap_or(raw).trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

/// Anonymous (embedded) field type names of a struct body.
fn embedded_fields(struct_type: Node<'_>, source: &str) -> Vec<String> {
    let mut embedded = Vec::new();
    let mut fields = Vec::new();
    collect_kind(struct_type, "field_declaration", &mut fields);
    for field in fields {
        let has_name = {
            let mut cursor = field.walk();
            field
                .children(&mut cursor)
                .any(|c| c.kind() == "field_identifier")
        };
        if has_name {
            continue;
        }
        if let Some(ty) = field.child_by_field_name("type") {
            let raw = text(ty, source).trim_start_matches('*');
            let name = simple_name(raw.split('[').next().unwrap_or(raw));
            if !name.is_empty() {
                embedded.push(name.to_string());
            }
        }
    }
    embedded
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

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn exported(name: &str) -> &'static str {
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        "true"
    } else {
        "false"
    }
}
