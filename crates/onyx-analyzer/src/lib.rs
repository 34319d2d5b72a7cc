//! Per-language source analyzers
//!
//! Each analyzer turns one file's bytes into typed entities and intra-file
//! relationships. Analyzers are pure: no I/O beyond the bytes they are
//! handed, no shared state, a fresh parser per invocation.

pub mod go;
pub mod parser;
pub mod python;
pub mod typescript;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::Path;

use onyx_core::{Entity, EntityKind, Language, OnyxError, RelationType, Relationship};

/// Everything one file's analysis produced.
#[derive(Debug)]
pub struct FileAnalysis {
    /// The `File` entity. Always present, even when parsing failed.
    pub file: Entity,
    /// Every non-File entity declared in the file.
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// Parse failure, if any. Entities may still be partially populated.
    pub error: Option<OnyxError>,
}

impl FileAnalysis {
    /// All entities including the file itself.
    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        std::iter::once(&self.file).chain(self.entities.iter())
    }
}

pub trait Analyzer: Send + Sync {
    fn language(&self) -> Language;

    /// Analyze one file. Must not panic on malformed input: unparseable
    /// bytes yield a `File` entity plus an error in the result.
    fn analyze_file(&self, path: &str, bytes: &[u8]) -> FileAnalysis;
}

static PYTHON: python::PythonAnalyzer = python::PythonAnalyzer;
static GO: go::GoAnalyzer = go::GoAnalyzer;
static TYPESCRIPT: typescript::ScriptAnalyzer = typescript::ScriptAnalyzer {
    language: Language::TypeScript,
};
static JAVASCRIPT: typescript::ScriptAnalyzer = typescript::ScriptAnalyzer {
    language: Language::JavaScript,
};

/// Look up the analyzer for a language.
pub fn analyzer_for_language(language: Language) -> &'static dyn Analyzer {
    match language {
        Language::Python => &PYTHON,
        Language::Go => &GO,
        Language::TypeScript => &TYPESCRIPT,
        Language::JavaScript => &JAVASCRIPT,
    }
}

/// Look up the analyzer for a path by extension. `None` for unsupported files.
pub fn analyzer_for_path(path: &Path) -> Option<&'static dyn Analyzer> {
    Language::from_path(path).map(analyzer_for_language)
}

/// Prefix used for call/inheritance targets the analyzer could not resolve
/// to a concrete entity. The graph builder replaces these where it can.
pub const UNRESOLVED_PREFIX: &str = "unresolved:";

pub fn unresolved(name: &str) -> String {
    format!("{}{}", UNRESOLVED_PREFIX, name)
}

/// Collects a file's entities and relationships during an AST walk.
///
/// Owns id uniqueness (positional collisions get an `#<ordinal>` suffix)
/// and emits the mandatory `Contains` edge from the file to every entity.
pub(crate) struct EntitySink {
    file_id: String,
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
    seen_ids: HashMap<String, u32>,
    seen_rels: HashMap<String, usize>,
}

impl EntitySink {
    pub(crate) fn new(file: &Entity) -> Self {
        EntitySink {
            file_id: file.id.clone(),
            entities: Vec::new(),
            relationships: Vec::new(),
            seen_ids: HashMap::new(),
            seen_rels: HashMap::new(),
        }
    }

    /// Add an entity, disambiguating its id if the position collides, and
    /// record the File-Contains edge. Returns the final id.
    pub(crate) fn push_entity(&mut self, mut entity: Entity) -> String {
        let count = self.seen_ids.entry(entity.id.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            entity.id = format!("{}#{}", entity.id, *count);
        }
        let id = entity.id.clone();
        self.relationships.push(Relationship::new(
            RelationType::Contains,
            self.file_id.clone(),
            id.clone(),
            EntityKind::File,
            entity.kind,
        ));
        self.entities.push(entity);
        id
    }

    /// Add a relationship, keeping the last write for a repeated id so a
    /// re-emitted edge carries the freshest properties.
    pub(crate) fn push_relationship(&mut self, rel: Relationship) {
        if let Some(&idx) = self.seen_rels.get(&rel.id) {
            self.relationships[idx] = rel;
        } else {
            self.seen_rels.insert(rel.id.clone(), self.relationships.len());
            self.relationships.push(rel);
        }
    }

    pub(crate) fn entities_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.entities
    }

    pub(crate) fn finish(self, file: Entity, error: Option<OnyxError>) -> FileAnalysis {
        FileAnalysis {
            file,
            entities: self.entities,
            relationships: self.relationships,
            error,
        }
    }
}
