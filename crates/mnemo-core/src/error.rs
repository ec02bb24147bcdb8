//! Stable error taxonomy for the memory core.
//!
//! Every public operation returns [`MemoryError`] (or a `Result` alias of
//! it). Submodule error types convert into it via `#[from]`.

use crate::cognitive::CognitiveError;
use crate::embeddings::EmbeddingError;
use crate::graph::{GraphError, QueryError as GraphQueryError};
use crate::parser::ParseError;
use crate::search::SearchError;
use crate::vector::VectorError;

pub type Result<T> = std::result::Result<T, MemoryError>;

/// The stable error taxonomy callers are expected to match on.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A referenced id (document, section, chunk, node, edge, pattern,
    /// pyramid item) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-supplied argument violates a precondition (empty text,
    /// out-of-range weight, unknown enum variant, malformed id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation requires an external collaborator (text extractor,
    /// embedding provider, rerank model) that was never registered.
    #[error("missing endpoint: {0}")]
    MissingEndpoint(String),

    /// `addDocument` was called with a content hash that already belongs to
    /// a different document id.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// Persisted state failed an internal consistency check on load.
    #[error("store corruption: {0}")]
    StoreCorruption(String),

    /// The embedding provider failed or is not ready.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A caller explicitly requested reranking but no rerank model is
    /// available; never silently downgraded to an un-reranked result.
    #[error("rerank unavailable: {0}")]
    RerankUnavailable(String),

    /// A query used a construct outside the supported query sublanguage.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// A well-formed query failed during execution (e.g. a backing store
    /// error surfaced while walking the graph).
    #[error("query error: {0}")]
    QueryError(String),

    /// An operation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// An operation was cancelled by its caller before completing.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<EmbeddingError> for MemoryError {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::InvalidInput(msg) => MemoryError::InvalidArgument(msg),
            other => MemoryError::EmbeddingUnavailable(other.to_string()),
        }
    }
}

impl From<GraphError> for MemoryError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::NotFound(id) => MemoryError::NotFound(id),
            GraphError::InvalidArgument(msg) => MemoryError::InvalidArgument(msg),
            other => MemoryError::StoreCorruption(other.to_string()),
        }
    }
}

impl From<GraphQueryError> for MemoryError {
    fn from(e: GraphQueryError) -> Self {
        match e {
            GraphQueryError::Unsupported(msg) => MemoryError::UnsupportedQuery(msg),
            GraphQueryError::Execution(msg) => MemoryError::QueryError(msg),
        }
    }
}

impl From<VectorError> for MemoryError {
    fn from(e: VectorError) -> Self {
        match e {
            VectorError::InvalidDimensions(expected, got) => MemoryError::InvalidArgument(
                format!("expected {expected}-dimension vector, got {got}"),
            ),
            VectorError::KeyNotFound(key) => MemoryError::NotFound(key),
            other => MemoryError::StoreCorruption(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for MemoryError {
    fn from(e: rusqlite::Error) -> Self {
        MemoryError::StoreCorruption(e.to_string())
    }
}

impl From<std::io::Error> for MemoryError {
    fn from(e: std::io::Error) -> Self {
        MemoryError::StoreCorruption(e.to_string())
    }
}

impl From<ParseError> for MemoryError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Empty => MemoryError::InvalidArgument("document text is empty".to_string()),
            ParseError::Malformed(kind, msg) => {
                MemoryError::InvalidArgument(format!("malformed {kind}: {msg}"))
            }
        }
    }
}

impl From<SearchError> for MemoryError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::EmbeddingUnavailable(msg) => MemoryError::EmbeddingUnavailable(msg),
            SearchError::Vector(v) => v.into(),
            SearchError::Graph(g) => g.into(),
        }
    }
}

impl From<CognitiveError> for MemoryError {
    fn from(e: CognitiveError) -> Self {
        match e {
            CognitiveError::Disabled => {
                MemoryError::MissingEndpoint("cognitive engine is disabled".to_string())
            }
            CognitiveError::NoSuchTrajectory(id) => MemoryError::NotFound(id),
            CognitiveError::AlreadyClosed(id) => {
                MemoryError::InvalidArgument(format!("trajectory {id} is already closed"))
            }
            CognitiveError::RerankUnavailable(rerank_err) => {
                MemoryError::RerankUnavailable(rerank_err.to_string())
            }
        }
    }
}
