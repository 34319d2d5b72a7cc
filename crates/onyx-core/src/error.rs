//! Error taxonomy shared across the workspace

use crate::model::{EntityKind, RelationType};
use thiserror::Error;

/// Everything that can go wrong in the analysis pipeline.
///
/// Per-file failures are collected into build statistics rather than
/// propagated; the variants here surface where a caller has to react.
#[derive(Debug, Error)]
pub enum OnyxError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("schema violation: {source_kind} -[{rel_type}]-> {target_kind} is not permitted")]
    SchemaViolation {
        source_kind: EntityKind,
        rel_type: RelationType,
        target_kind: EntityKind,
    },

    #[error("ambiguous reference `{name}` resolved to {candidates} candidates")]
    AmbiguousReference { name: String, candidates: usize },

    #[error("analysis of {path} exceeded the {limit_secs}s soft timeout")]
    AnalysisTimeout { path: String, limit_secs: u64 },

    #[error("store error: {0}")]
    Store(String),

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("watcher error: {0}")]
    Watcher(String),
}

impl OnyxError {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        OnyxError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        OnyxError::Store(message.into())
    }

    pub fn watcher(message: impl Into<String>) -> Self {
        OnyxError::Watcher(message.into())
    }
}
