//! Graph Store (C5) and Graph Builder (C3): a persistent, typed property
//! graph over documents/sections/chunks, with a small Cypher-subset query
//! language and deterministic k-hop traversal.

mod builder;
mod migrations;
mod query;
mod store;

pub use builder::{build_edges, strip_derivation_keyword};
pub use migrations::MIGRATIONS;
pub use query::{parse_query, QueryAst, QueryError};
pub use store::{GraphStore, RelatedNode};

/// Errors internal to the graph store; converted into [`crate::error::MemoryError`]
/// at the facade boundary.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node or edge not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("migration error: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
