//! # Mnemo Core
//!
//! Unified cognitive knowledge memory: a local, document-centric retrieval
//! engine fusing a tiered vector store over learned embeddings, a property
//! graph of documents/sections/citations, and an optional online-learning
//! cognitive layer that records query trajectories and reranks candidates.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mnemo_core::{UnifiedMemory, MemoryConfig, DocumentType, HashingEmbeddingProvider};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> mnemo_core::Result<()> {
//! let memory = UnifiedMemory::new(
//!     MemoryConfig::in_memory(),
//!     Arc::new(HashingEmbeddingProvider::new(256)),
//! )?;
//!
//! let id = memory
//!     .add_document("# Notes\nsome content", DocumentType::Markdown, None, CancellationToken::new())
//!     .await?;
//!
//! let hits = memory
//!     .search("content", Default::default(), CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `embeddings` (default): local ONNX embeddings via `fastembed`, in addition
//!   to the always-available deterministic hashing provider.
//! - `vector-search` (default): HNSW vector search via `usearch` for the warm
//!   and cold tiers; without it every tier falls back to a brute-force scan.
//! - `bundled-sqlite` (default): statically link SQLite rather than requiring
//!   a system library.
//! - `rerank`: cross-encoder reranking via `fastembed`'s `TextRerank`.
//! - `full`: all of the above.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cognitive;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod memory;
pub mod model;
pub mod parser;
pub mod pyramid;
pub mod search;
pub mod vector;

pub use config::MemoryConfig;
pub use embeddings::{CachedEmbeddingProvider, Embedding, EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{MemoryError, Result};
pub use cognitive::{RerankCandidate, ScoredPattern};
pub use graph::{GraphStore, RelatedNode};
pub use memory::{CognitiveCapabilities, MemoryStats, UnifiedMemory};
pub use model::{
    Chunk, Document, DocumentType, EdgeType, GraphEdge, GraphNode, LearnedPattern, NodeKind,
    PyramidItem, PyramidLevel, Section, Trajectory, TrajectoryStep,
};
pub use pyramid::{Alignment, AlignmentBucket, DriftSeverity, PyramidEntity};
pub use search::{HybridHit, SearchOptions, Provenance};
pub use vector::{SearchHit, VectorStore};

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub use embeddings::FastEmbedProvider;

/// Commonly used types, re-exported for `use mnemo_core::prelude::*;`.
pub mod prelude {
    pub use crate::cognitive::{CognitiveEngine, RerankCandidate, Reranker};
    pub use crate::config::MemoryConfig;
    pub use crate::embeddings::{EmbeddingProvider, HashingEmbeddingProvider};
    pub use crate::error::{MemoryError, Result};
    pub use crate::graph::GraphStore;
    pub use crate::memory::UnifiedMemory;
    pub use crate::model::{Document, DocumentType, EdgeType, GraphEdge, GraphNode, NodeKind};
    pub use crate::pyramid::{self, Alignment, AlignmentBucket, PyramidEntity};
    pub use crate::search::{HybridHit, SearchOptions};
    pub use crate::vector::VectorStore;
}
