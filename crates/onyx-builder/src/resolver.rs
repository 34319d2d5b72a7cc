//! Cross-file name resolution
//!
//! Analyzers leave call/inheritance/decorator endpoints as
//! `unresolved:<name>`. After the whole batch is parsed, the resolver
//! replaces those with concrete entity ids where it can, scoring each
//! resolution with a confidence in [0,1].

use std::collections::HashMap;
use std::path::Path;

use dashmap::DashMap;
use onyx_analyzer::UNRESOLVED_PREFIX;
use onyx_core::{Entity, EntityKind, Language, RelationType, Relationship, is_valid_for_schema};
use tracing::debug;

/// One resolvable declaration.
#[derive(Debug, Clone)]
pub struct NameEntry {
    pub id: String,
    pub kind: EntityKind,
    pub file_path: String,
    pub language: Language,
    pub start_line: u32,
}

/// Import recorded for one file: the module path plus any named symbols.
#[derive(Debug, Clone)]
struct ImportInfo {
    module: String,
    symbols: Vec<String>,
}

/// Name index over a parsed batch, shared across resolver passes.
pub struct NameIndex {
    by_name: DashMap<String, Vec<NameEntry>>,
    /// Anchor info per entity id: (language, file_path, kind).
    by_id: HashMap<String, (Language, String, EntityKind)>,
    imports_by_file: HashMap<String, Vec<ImportInfo>>,
    file_paths: Vec<String>,
}

impl NameIndex {
    pub fn build(entities: &[Entity]) -> Self {
        let by_name: DashMap<String, Vec<NameEntry>> = DashMap::new();
        let mut by_id = HashMap::new();
        let mut imports_by_file: HashMap<String, Vec<ImportInfo>> = HashMap::new();
        let mut file_paths = Vec::new();

        for entity in entities {
            by_id.insert(
                entity.id.clone(),
                (entity.language, entity.file_path.clone(), entity.kind),
            );
            match entity.kind {
                EntityKind::File => file_paths.push(entity.file_path.clone()),
                EntityKind::Import => {
                    let module = entity
                        .property("path")
                        .unwrap_or(entity.name.as_str())
                        .to_string();
                    let symbols = entity
                        .property("symbols")
                        .map(|s| s.split(',').map(str::to_string).collect())
                        .unwrap_or_default();
                    imports_by_file
                        .entry(entity.file_path.clone())
                        .or_default()
                        .push(ImportInfo { module, symbols });
                }
                _ => {
                    by_name.entry(entity.name.clone()).or_default().push(NameEntry {
                        id: entity.id.clone(),
                        kind: entity.kind,
                        file_path: entity.file_path.clone(),
                        language: entity.language,
                        start_line: entity.span.start,
                    });
                }
            }
        }

        NameIndex {
            by_name,
            by_id,
            imports_by_file,
            file_paths,
        }
    }

    fn anchor(&self, id: &str) -> Option<&(Language, String, EntityKind)> {
        self.by_id.get(id)
    }
}

/// How a resolution was found, in decreasing confidence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    SameFile,
    Import,
    Global,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Scope::SameFile => "same_file",
            Scope::Import => "import",
            Scope::Global => "global",
        }
    }
}

/// Resolve unresolved endpoints in place. Unresolvable edges keep their
/// `unresolved:` target and get `confidence_score = 0`.
pub fn resolve_relationships(index: &NameIndex, relationships: &mut [Relationship]) {
    let mut resolved = 0usize;
    let mut unresolved = 0usize;

    for rel in relationships.iter_mut() {
        let target_pending = rel.target_id.starts_with(UNRESOLVED_PREFIX);
        let source_pending = rel.source_id.starts_with(UNRESOLVED_PREFIX);
        if !target_pending && !source_pending {
            continue;
        }

        if target_pending {
            // The source end anchors the search scope.
            if let Some((language, file, source_kind)) = index.anchor(&rel.source_id).cloned() {
                let name = rel.target_id[UNRESOLVED_PREFIX.len()..].to_string();
                match resolve_name(index, &name, &file, language, |cand| {
                    is_valid_for_schema(source_kind, rel.rel_type, cand.kind)
                }) {
                    Some((entry, confidence, scope, candidates)) => {
                        rel.target_id = entry.id.clone();
                        rel.target_kind = entry.kind;
                        rel.id =
                            Relationship::derive_id(&rel.source_id, rel.rel_type, &rel.target_id);
                        annotate(rel, confidence, scope, candidates);
                        resolved += 1;
                    }
                    None => {
                        rel.properties
                            .insert("confidence_score".into(), "0.00".into());
                        unresolved += 1;
                    }
                }
            }
        } else if source_pending {
            // Decorator-style edges anchor on the target end instead.
            if let Some((language, file, target_kind)) = index.anchor(&rel.target_id).cloned() {
                let name = rel.source_id[UNRESOLVED_PREFIX.len()..].to_string();
                match resolve_name(index, &name, &file, language, |cand| {
                    is_valid_for_schema(cand.kind, rel.rel_type, target_kind)
                }) {
                    Some((entry, confidence, scope, candidates)) => {
                        rel.source_id = entry.id.clone();
                        rel.source_kind = entry.kind;
                        rel.id =
                            Relationship::derive_id(&rel.source_id, rel.rel_type, &rel.target_id);
                        annotate(rel, confidence, scope, candidates);
                        resolved += 1;
                    }
                    None => {
                        rel.properties
                            .insert("confidence_score".into(), "0.00".into());
                        unresolved += 1;
                    }
                }
            }
        }
    }
    debug!("name resolution: {} resolved, {} left", resolved, unresolved);
}

fn annotate(rel: &mut Relationship, confidence: f64, scope: Scope, candidates: usize) {
    rel.properties
        .insert("confidence_score".into(), format!("{:.2}", confidence));
    rel.properties
        .insert("resolution".into(), scope.as_str().into());
    if candidates > 1 {
        rel.properties
            .insert("candidates".into(), candidates.to_string());
    }
}

/// Same-file scope, then imported-module scope, then project-global scope.
/// Ambiguity picks the shortest directory distance, then the
/// lexicographically smallest path, then the smallest start line.
fn resolve_name(
    index: &NameIndex,
    name: &str,
    anchor_file: &str,
    anchor_language: Language,
    accepts: impl Fn(&NameEntry) -> bool,
) -> Option<(NameEntry, f64, Scope, usize)> {
    let all = index.by_name.get(name)?;
    let candidates: Vec<&NameEntry> = all
        .iter()
        .filter(|c| c.language == anchor_language && accepts(c))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    // (a) same file
    let mut same_file: Vec<&&NameEntry> = candidates
        .iter()
        .filter(|c| c.file_path == anchor_file)
        .collect();
    if !same_file.is_empty() {
        same_file.sort_by_key(|c| c.start_line);
        return Some(((*same_file[0]).clone(), 1.0, Scope::SameFile, same_file.len()));
    }

    // (b) imported-module scope
    if let Some(imports) = index.imports_by_file.get(anchor_file) {
        let mut imported: Vec<&&NameEntry> = candidates
            .iter()
            .filter(|c| {
                imports
                    .iter()
                    .any(|imp| import_covers(imp, name, &c.file_path))
            })
            .collect();
        if !imported.is_empty() {
            imported.sort_by(|a, b| {
                a.file_path
                    .cmp(&b.file_path)
                    .then(a.start_line.cmp(&b.start_line))
            });
            return Some(((*imported[0]).clone(), 0.9, Scope::Import, imported.len()));
        }
    }

    // (c) project-global scope
    let count = candidates.len();
    if count == 1 {
        return Some((candidates[0].clone(), 0.8, Scope::Global, 1));
    }
    let mut ranked = candidates;
    ranked.sort_by(|a, b| {
        directory_distance(anchor_file, &a.file_path)
            .cmp(&directory_distance(anchor_file, &b.file_path))
            .then(a.file_path.cmp(&b.file_path))
            .then(a.start_line.cmp(&b.start_line))
    });
    let confidence = (0.8 / count as f64).max(0.5);
    Some((ranked[0].clone(), confidence, Scope::Global, count))
}

/// Whether an import statement plausibly brings `name` (declared in
/// `candidate_file`) into scope.
fn import_covers(import: &ImportInfo, name: &str, candidate_file: &str) -> bool {
    if import.symbols.iter().any(|s| s == name) {
        return true;
    }
    module_matches_file(&import.module, candidate_file)
}

/// Match a module path against a file path across the languages' habits:
/// `pkg.mod` → `pkg/mod.py`, `./helper` → `helper.ts`, `repo/util` →
/// `util/…`.
fn module_matches_file(module: &str, file_path: &str) -> bool {
    let module = module.trim_start_matches("./").trim_start_matches('/');
    if module.is_empty() {
        return false;
    }
    let slashed = module.replace('.', "/");
    let stem = Path::new(file_path)
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/");
    stem == slashed
        || stem.ends_with(&format!("/{}", slashed))
        || file_path.starts_with(&format!("{}/", slashed))
        || Path::new(file_path)
            .parent()
            .is_some_and(|dir| dir.to_string_lossy().ends_with(module))
}

/// Components by which two files' directories differ.
fn directory_distance(a: &str, b: &str) -> usize {
    let dir = |p: &str| -> Vec<String> {
        Path::new(p)
            .parent()
            .map(|d| {
                d.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    };
    let da = dir(a);
    let db = dir(b);
    let common = da.iter().zip(db.iter()).take_while(|(x, y)| x == y).count();
    (da.len() - common) + (db.len() - common)
}

/// Upgrade `Imports` edges to File → File where the module resolves to a
/// walked file. The File → Import edge stays; consumers get both views.
pub fn link_import_files(index: &NameIndex, entities: &[Entity]) -> Vec<Relationship> {
    let mut extra = Vec::new();
    for entity in entities.iter().filter(|e| e.kind == EntityKind::Import) {
        let module = entity.property("path").unwrap_or(&entity.name);
        let importing_dir = Path::new(&entity.file_path)
            .parent()
            .map(|d| d.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let mut matches: Vec<&String> = index
            .file_paths
            .iter()
            .filter(|f| f.as_str() != entity.file_path)
            .filter(|f| {
                if let Some(rel) = module.strip_prefix("./") {
                    // Relative import: resolve against the importing dir.
                    let base = if importing_dir.is_empty() {
                        rel.to_string()
                    } else {
                        format!("{}/{}", importing_dir, rel)
                    };
                    let stem = Path::new(f.as_str())
                        .with_extension("")
                        .to_string_lossy()
                        .replace('\\', "/");
                    stem == base || stem == format!("{}/index", base)
                } else {
                    module_matches_file(module, f)
                }
            })
            .collect();
        matches.sort();
        if let Some(target_file) = matches.first() {
            extra.push(
                Relationship::new(
                    RelationType::Imports,
                    entity.file_path.clone(),
                    (*target_file).clone(),
                    EntityKind::File,
                    EntityKind::File,
                )
                .with_property("module", module),
            );
        }
    }
    extra
}
