//! Graph store: schema creation, type-aware upserts, and persistence

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use onyx_core::{
    Entity, EntityKind, NodeTable, OnyxError, RelTable, Relationship, Span, node_tables,
    rel_tables,
};

use crate::query::{self, QueryRows};

const SNAPSHOT_FILE: &str = "graph.bin";
const META_FILE: &str = "meta.json";
const SCHEMA_VERSION: u32 = 1;

/// Snapshot metadata persisted next to the binary graph image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub schema_created: bool,
}

impl StoreMeta {
    fn new() -> Self {
        let now = Utc::now();
        StoreMeta {
            schema_version: SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
            entity_count: 0,
            relationship_count: 0,
            schema_created: false,
        }
    }
}

/// The node and relationship tables the store exposes.
#[derive(Debug, Clone)]
pub struct SchemaInfo {
    pub node_tables: Vec<NodeTable>,
    pub rel_tables: Vec<RelTable>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
}

/// The graph store handle. All writes go through the typed methods here;
/// callers enforce single-writer discipline (§ concurrency model).
pub struct GraphStore {
    path: PathBuf,
    inner: StableDiGraph<Entity, Relationship>,
    id_index: HashMap<String, NodeIndex>,
    rel_index: HashMap<String, EdgeIndex>,
    meta: StoreMeta,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("path", &self.path)
            .field("entities", &self.inner.node_count())
            .field("relationships", &self.inner.edge_count())
            .finish()
    }
}

impl GraphStore {
    /// Open (or create) a store directory and load any existing snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OnyxError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }

        let mut store = GraphStore {
            path: path.clone(),
            inner: StableDiGraph::new(),
            id_index: HashMap::new(),
            rel_index: HashMap::new(),
            meta: StoreMeta::new(),
        };

        let snapshot_path = path.join(SNAPSHOT_FILE);
        if snapshot_path.exists() {
            store.load_snapshot(&snapshot_path)?;
            info!(
                "opened store at {} ({} entities, {} relationships)",
                path.display(),
                store.inner.node_count(),
                store.inner.edge_count()
            );
        } else {
            debug!("created empty store at {}", path.display());
        }
        Ok(store)
    }

    fn load_snapshot(&mut self, snapshot_path: &Path) -> Result<(), OnyxError> {
        let meta_path = self.path.join(META_FILE);
        if meta_path.exists() {
            let raw = fs::read_to_string(&meta_path)?;
            let meta: StoreMeta = serde_json::from_str(&raw)
                .map_err(|e| OnyxError::store(format!("corrupt {}: {}", META_FILE, e)))?;
            if meta.schema_version != SCHEMA_VERSION {
                return Err(OnyxError::store(format!(
                    "snapshot schema version {} does not match {}",
                    meta.schema_version, SCHEMA_VERSION
                )));
            }
            self.meta = meta;
        }

        let bytes = fs::read(snapshot_path)?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)
            .map_err(|e| OnyxError::store(format!("corrupt snapshot: {}", e)))?;
        for entity in snapshot.entities {
            self.insert_entity(entity);
        }
        for rel in snapshot.relationships {
            self.insert_relationship(rel)?;
        }
        Ok(())
    }

    /// Idempotent schema creation. The engine's tables are logical; this
    /// records that consumers may now write and introspect.
    pub fn create_schema(&mut self) -> Result<(), OnyxError> {
        if !self.meta.schema_created {
            self.meta.schema_created = true;
            debug!(
                "schema created: {} node tables, {} relationship tables",
                node_tables().len(),
                rel_tables().len()
            );
        }
        Ok(())
    }

    /// Node and relationship table metadata.
    pub fn introspect_schema(&self) -> SchemaInfo {
        SchemaInfo {
            node_tables: node_tables(),
            rel_tables: rel_tables(),
        }
    }

    /// Upsert an entity by id.
    pub fn store_entity(&mut self, entity: &Entity) -> Result<(), OnyxError> {
        if let Some(&idx) = self.id_index.get(&entity.id) {
            if let Some(existing) = self.inner.node_weight_mut(idx) {
                *existing = entity.clone();
            }
        } else {
            self.insert_entity(entity.clone());
        }
        Ok(())
    }

    fn insert_entity(&mut self, entity: Entity) {
        let id = entity.id.clone();
        let idx = self.inner.add_node(entity);
        self.id_index.insert(id, idx);
    }

    /// Validated upsert of a relationship. Fails with `SchemaViolation`
    /// when the (source_kind, type, target_kind) triple is not permitted;
    /// in debug builds this also asserts, since an analyzer emitting an
    /// illegal edge is a programmer error.
    pub fn store_relationship(&mut self, rel: &Relationship) -> Result<(), OnyxError> {
        if !rel.is_valid_for_schema() {
            warn!(
                "dropping illegal edge {} -[{}]-> {}",
                rel.source_kind, rel.rel_type, rel.target_kind
            );
            return Err(OnyxError::SchemaViolation {
                source_kind: rel.source_kind,
                rel_type: rel.rel_type,
                target_kind: rel.target_kind,
            });
        }
        if let Some(&idx) = self.rel_index.get(&rel.id) {
            if let Some(existing) = self.inner.edge_weight_mut(idx) {
                *existing = rel.clone();
            }
            return Ok(());
        }
        self.insert_relationship(rel.clone())
    }

    fn insert_relationship(&mut self, rel: Relationship) -> Result<(), OnyxError> {
        let source = self.ensure_endpoint(&rel.source_id, rel.source_kind);
        let target = self.ensure_endpoint(&rel.target_id, rel.target_kind);
        let id = rel.id.clone();
        let idx = self.inner.add_edge(source, target, rel);
        self.rel_index.insert(id, idx);
        Ok(())
    }

    /// Endpoints that do not exist yet (unresolved names, forward
    /// references within a batch) get a synthetic placeholder node.
    fn ensure_endpoint(&mut self, id: &str, kind: EntityKind) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(id) {
            return idx;
        }
        let name = id.rsplit(':').next().unwrap_or(id).to_string();
        // Placeholders have no file and no meaningful language.
        let mut placeholder =
            Entity::new(kind, name, "", onyx_core::Language::Python, Span::new(0, 0));
        placeholder.id = id.to_string();
        placeholder.set_property("is_synthetic", "true");
        let idx = self.inner.add_node(placeholder);
        self.id_index.insert(id.to_string(), idx);
        idx
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.id_index
            .get(id)
            .and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn get_relationship(&self, id: &str) -> Option<&Relationship> {
        self.rel_index
            .get(id)
            .and_then(|&idx| self.inner.edge_weight(idx))
    }

    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        self.inner
            .node_indices()
            .filter_map(|idx| self.inner.node_weight(idx))
    }

    pub fn all_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.inner
            .edge_indices()
            .filter_map(|idx| self.inner.edge_weight(idx))
    }

    /// Entities declared in one file, including its File entity.
    pub fn entities_for_file(&self, file_path: &str) -> Vec<&Entity> {
        self.all_entities()
            .filter(|e| e.file_path == file_path)
            .collect()
    }

    /// Relationships whose source or target lives in the given file.
    pub fn relationships_touching_file(&self, file_path: &str) -> Vec<&Relationship> {
        let ids: std::collections::HashSet<&str> = self
            .entities_for_file(file_path)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        self.all_relationships()
            .filter(|r| ids.contains(r.source_id.as_str()) || ids.contains(r.target_id.as_str()))
            .collect()
    }

    /// Remove one entity and its incident edges. Returns the number of
    /// relationships that went with it, or `None` for an unknown id.
    pub fn delete_entity(&mut self, id: &str) -> Option<usize> {
        let idx = self.id_index.remove(id)?;
        let incident: Vec<String> = self
            .inner
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .chain(self.inner.edges_directed(idx, petgraph::Direction::Incoming))
            .map(|e| e.weight().id.clone())
            .collect();
        for rel_id in &incident {
            self.rel_index.remove(rel_id);
        }
        self.inner.remove_node(idx);
        Some(incident.len())
    }

    /// Remove one relationship by id.
    pub fn delete_relationship(&mut self, id: &str) -> bool {
        match self.rel_index.remove(id) {
            Some(idx) => self.inner.remove_edge(idx).is_some(),
            None => false,
        }
    }

    /// Remove every entity whose `file_path` matches, along with all
    /// incident edges. Returns (entities_removed, relationships_removed).
    pub fn delete_entities_by_file(&mut self, file_path: &str) -> (usize, usize) {
        let doomed: Vec<(String, NodeIndex)> = self
            .inner
            .node_indices()
            .filter_map(|idx| {
                self.inner
                    .node_weight(idx)
                    .filter(|e| e.file_path == file_path)
                    .map(|e| (e.id.clone(), idx))
            })
            .collect();

        let mut removed_rels = 0;
        for (id, idx) in &doomed {
            let incident: Vec<String> = self
                .inner
                .edges_directed(*idx, petgraph::Direction::Outgoing)
                .chain(self.inner.edges_directed(*idx, petgraph::Direction::Incoming))
                .map(|e| e.weight().id.clone())
                .collect();
            for rel_id in incident {
                self.rel_index.remove(&rel_id);
                removed_rels += 1;
            }
            // remove_node drops incident edges from the graph itself.
            self.inner.remove_node(*idx);
            self.id_index.remove(id);
        }
        debug!(
            "pruned {}: {} entities, {} relationships",
            file_path,
            doomed.len(),
            removed_rels
        );
        (doomed.len(), removed_rels)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn relationship_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Execute a read-only query and return tabular rows.
    pub fn execute_query(&self, text: &str) -> Result<QueryRows, OnyxError> {
        query::execute(self, text)
    }

    /// Persist the snapshot and metadata. Contents are opaque to consumers.
    pub fn save(&mut self) -> Result<(), OnyxError> {
        let snapshot = Snapshot {
            entities: self.all_entities().cloned().collect(),
            relationships: self.all_relationships().cloned().collect(),
        };
        let bytes = bincode::serialize(&snapshot)
            .map_err(|e| OnyxError::store(format!("serialize snapshot: {}", e)))?;
        fs::write(self.path.join(SNAPSHOT_FILE), bytes)?;

        self.meta.updated_at = Utc::now();
        self.meta.entity_count = self.inner.node_count();
        self.meta.relationship_count = self.inner.edge_count();
        let meta_json = serde_json::to_string_pretty(&self.meta)
            .map_err(|e| OnyxError::store(format!("serialize meta: {}", e)))?;
        fs::write(self.path.join(META_FILE), meta_json)?;
        debug!("saved snapshot to {}", self.path.display());
        Ok(())
    }

    /// Persist and release the handle.
    pub fn close(mut self) -> Result<(), OnyxError> {
        self.save()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }
}
