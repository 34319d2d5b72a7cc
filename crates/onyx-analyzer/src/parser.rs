//! Grammar selection and tree-sitter helpers shared by the analyzers

use std::path::Path;

use onyx_core::Language;
use tree_sitter::Node;

/// The tree-sitter grammar for a language. `.tsx` needs the TSX variant of
/// the TypeScript grammar or JSX constructs fail to parse.
pub fn grammar_for(language: Language, path: &str) -> tree_sitter::Language {
    match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::TypeScript => {
            if Path::new(path).extension().and_then(|e| e.to_str()) == Some("tsx") {
                tree_sitter_typescript::LANGUAGE_TSX.into()
            } else {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
            }
        }
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
    }
}

/// Parse source with a fresh parser. Returns `None` when the grammar could
/// not be loaded or the parse produced no tree.
pub fn parse(language: Language, path: &str, source: &str) -> Option<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&grammar_for(language, path)).ok()?;
    parser.parse(source.as_bytes(), None)
}

/// Source text of a node.
pub fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// 1-based first line of a node.
pub fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based last line of a node.
pub fn end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

/// First line of a node's source, as a signature string.
pub fn header_line<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    text(node, source).lines().next().unwrap_or_default().trim_end()
}

/// Whether any descendant of `node` has the given kind.
pub fn has_descendant(node: Node<'_>, kind: &str) -> bool {
    if node.kind() == kind {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if has_descendant(child, kind) {
            return true;
        }
    }
    false
}

/// Count descendants of `node` matching any of the given kinds.
pub fn count_descendants(node: Node<'_>, kinds: &[&str]) -> usize {
    let mut count = usize::from(kinds.contains(&node.kind()));
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count += count_descendants(child, kinds);
    }
    count
}

/// Approximate cyclomatic complexity: one plus the number of branching
/// constructs in the node's subtree.
pub fn complexity(node: Node<'_>, branch_kinds: &[&str]) -> usize {
    1 + count_descendants(node, branch_kinds)
}

/// The simple (rightmost) name of a possibly dotted callee expression:
/// `requests.get` → `get`, `foo` → `foo`.
pub fn simple_name(callee: &str) -> &str {
    callee
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(callee)
        .trim()
}

/// Strip string-literal quotes from a token.
pub fn unquote(raw: &str) -> &str {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}
