//! Build and live-update statistics

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::EntityKind;

/// Counters accumulated over a full repository build.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildStats {
    pub files_processed: usize,
    /// Entity counts keyed by node-table name.
    pub entities_by_kind: BTreeMap<String, usize>,
    pub relationships_found: usize,
    pub errors_encountered: usize,
}

impl BuildStats {
    pub fn record_entity(&mut self, kind: EntityKind) {
        *self
            .entities_by_kind
            .entry(kind.table_name().to_string())
            .or_insert(0) += 1;
    }

    pub fn total_entities(&self) -> usize {
        self.entities_by_kind.values().sum()
    }

    /// Fold another stats block into this one (parallel batch aggregation).
    pub fn merge(&mut self, other: &BuildStats) {
        self.files_processed += other.files_processed;
        for (kind, count) in &other.entities_by_kind {
            *self.entities_by_kind.entry(kind.clone()).or_insert(0) += count;
        }
        self.relationships_found += other.relationships_found;
        self.errors_encountered += other.errors_encountered;
    }
}

/// What one committed live-update batch changed in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateStats {
    pub entities_added: usize,
    pub entities_removed: usize,
    pub relationships_added: usize,
    pub relationships_removed: usize,
    pub files_updated: usize,
    pub processing_time: Duration,
}

impl UpdateStats {
    pub fn is_empty(&self) -> bool {
        self.entities_added == 0
            && self.entities_removed == 0
            && self.relationships_added == 0
            && self.relationships_removed == 0
    }

    pub fn merge(&mut self, other: &UpdateStats) {
        self.entities_added += other.entities_added;
        self.entities_removed += other.entities_removed;
        self.relationships_added += other.relationships_added;
        self.relationships_removed += other.relationships_removed;
        self.files_updated += other.files_updated;
        self.processing_time += other.processing_time;
    }
}
