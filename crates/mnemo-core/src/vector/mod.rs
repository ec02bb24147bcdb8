//! Vector Store (C4): a tiered dense index supporting upsert, filtered
//! k-NN cosine search, and delete, with deterministic tie-breaking and a
//! single on-disk persistence path.

#[cfg(feature = "vector-search")]
mod index;
mod store;

#[cfg(feature = "vector-search")]
pub use index::HnswIndex;
pub use store::{SearchHit, Tier, VectorStore};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("failed to create index: {0}")]
    IndexCreation(String),
    #[error("failed to add to index: {0}")]
    IndexAdd(String),
    #[error("failed to search index: {0}")]
    IndexSearch(String),
    #[error("failed to persist index: {0}")]
    IndexPersistence(String),
    #[error("expected {0}-dimension vector, got {1}")]
    InvalidDimensions(usize, usize),
    #[error("key not found: {0}")]
    KeyNotFound(String),
}

pub type Result<T> = std::result::Result<T, VectorError>;
