//! Onyx Core — entity/relationship data model, schema adjacency, and error taxonomy

pub mod error;
pub mod model;
pub mod schema;
pub mod stats;

#[cfg(test)]
mod tests;

pub use error::OnyxError;
pub use model::{Entity, EntityKind, Language, RelationType, Relationship, Span};
pub use schema::{NodeTable, RelTable, is_valid_for_schema, node_tables, rel_tables};
pub use stats::{BuildStats, UpdateStats};
