//! Onyx Store — labelled-property graph adapter
//!
//! Owns the schema and the write/query contract. The in-process engine
//! keeps the graph in a petgraph `StableDiGraph` and persists an opaque
//! snapshot under the store directory.

pub mod query;
pub mod store;


pub use query::QueryRows;
pub use store::{GraphStore, SchemaInfo, StoreMeta};
