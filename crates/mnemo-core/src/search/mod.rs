//! Hybrid Search Engine (C6): fuses the vector store (C4) and graph store
//! (C5) into one ranked list with per-hit provenance scores.
//!
//! Algorithm: embed the query -> vector top-`k*` -> optional graph
//! expansion from each hit (per-path graph score) -> weighted fusion of
//! vector/graph scores -> optional rerank -> top-`k` with provenance.
//! Ties break on id ascending, same as the vector and graph stores
//! themselves.

pub mod fusion;

pub use fusion::{linear_combination, reciprocal_rank_fusion, HybridSearchConfig};

use crate::embeddings::EmbeddingProvider;
use crate::graph::GraphStore;
use crate::model::{EdgeType, NodeKind};
use crate::vector::VectorStore;
use std::collections::HashSet;

/// Per-hit score provenance, so a caller can see how a result was ranked.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub vector_score: f32,
    pub graph_score: f32,
    pub combined_score: f32,
    pub rerank_score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct HybridHit {
    pub id: String,
    pub metadata: serde_json::Value,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub k: usize,
    /// Weight given to the vector score in `[0.0, 1.0]`; the graph score
    /// gets `1.0 - vector_weight`. Defaults to [`crate::config::MemoryConfig::default_vector_weight`].
    pub vector_weight: f32,
    pub include_related: bool,
    pub graph_depth: u32,
    pub edge_type_filter: Option<EdgeType>,
    pub metadata_filter: Option<serde_json::Value>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 10,
            vector_weight: 0.6,
            include_related: true,
            graph_depth: 1,
            edge_type_filter: None,
            metadata_filter: None,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("vector store error: {0}")]
    Vector(#[from] crate::vector::VectorError),
    #[error("graph store error: {0}")]
    Graph(#[from] crate::graph::GraphError),
}

/// Runs the fuse step of hybrid search over an already-embedded query and a
/// set of vector hits, expanding each through the graph when requested.
/// Split out from the embedding step so the cognitive engine can re-run
/// fusion against cached vector hits during a learning tick without paying
/// for another embedding call.
pub fn fuse(
    vector_hits: Vec<(String, f32, serde_json::Value)>,
    graph: &GraphStore,
    options: &SearchOptions,
) -> Result<Vec<HybridHit>, SearchError> {
    let mut hits = Vec::with_capacity(vector_hits.len());

    for (id, vector_score, metadata) in vector_hits {
        let mut graph_score = 0.0f32;

        if options.include_related && options.graph_depth > 0 {
            let mut related = graph
                .find_related(&id, options.graph_depth, options.edge_type_filter)
                .unwrap_or_default();

            // A vector hit is usually a chunk, but citation/tag/relation edges are
            // attached at the section or document level the chunk belongs to — walk
            // up to that owning document (chunk -> section -> document, both hops
            // `Contains`) and fold its neighborhood in too, so a chunk's graph score
            // reflects the relationships of the passage it came from.
            if let Ok(ancestors) = graph.find_incoming_related(&id, 2, Some(EdgeType::Contains)) {
                if let Some(document) = ancestors.iter().find(|r| r.node.kind == NodeKind::Document) {
                    if let Ok(from_document) = graph.find_related(&document.node.id, options.graph_depth, options.edge_type_filter) {
                        let seen: HashSet<String> = related.iter().map(|r| r.node.id.clone()).collect();
                        related.extend(from_document.into_iter().filter(|r| !seen.contains(&r.node.id)));
                    }
                }
            }

            if !related.is_empty() {
                let total: f32 = related.iter().map(|r| r.via_edge.weight / r.depth as f32).sum();
                graph_score = (total / related.len() as f32).min(1.0);
            }
        }

        let combined = options.vector_weight * vector_score + (1.0 - options.vector_weight) * graph_score;
        hits.push(HybridHit {
            id,
            metadata,
            provenance: Provenance {
                vector_score,
                graph_score,
                combined_score: combined,
                rerank_score: None,
            },
        });
    }

    hits.sort_by(|a, b| {
        b.provenance
            .combined_score
            .partial_cmp(&a.provenance.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(options.k);
    Ok(hits)
}

/// End-to-end hybrid search: embed `query`, fetch `k * source_limit_multiplier`
/// vector candidates, and fuse them against the graph. Reranking (if
/// requested) is applied by the caller (the facade), which has access to
/// the cognitive engine.
pub async fn search(
    query: &str,
    provider: &dyn EmbeddingProvider,
    vector_store: &mut VectorStore,
    graph: &GraphStore,
    options: &SearchOptions,
) -> Result<Vec<HybridHit>, SearchError> {
    let embedding = provider
        .embed(query)
        .await
        .map_err(|e| SearchError::EmbeddingUnavailable(e.to_string()))?;

    let fetch_k = options.k.saturating_mul(3).max(options.k);
    let filter: Option<Box<dyn Fn(&serde_json::Value) -> bool>> =
        options.metadata_filter.clone().map(|want| {
            let f: Box<dyn Fn(&serde_json::Value) -> bool> = Box::new(move |m: &serde_json::Value| {
                want.as_object()
                    .map(|wants| {
                        wants.iter().all(|(k, v)| m.get(k) == Some(v))
                    })
                    .unwrap_or(true)
            });
            f
        });

    let vector_hits = vector_store
        .search(&embedding.vector, fetch_k, filter.as_deref())?
        .into_iter()
        .map(|h| (h.key, h.score, h.metadata))
        .collect();

    fuse(vector_hits, graph, options).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphEdge, GraphNode, NodeKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            kind: NodeKind::Chunk,
            label: id.to_string(),
            properties: serde_json::json!({}),
            embedding_id: None,
            created_at: Utc::now(),
        }
    }

    fn edge(from: &str, to: &str, weight: f32) -> GraphEdge {
        GraphEdge {
            id: Uuid::new_v4().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            edge_type: EdgeType::LinksTo,
            weight,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fuse_combines_vector_and_graph_scores() {
        let graph = GraphStore::in_memory().unwrap();
        graph.add_node(&node("a")).unwrap();
        graph.add_node(&node("b")).unwrap();
        graph.add_edge(&edge("a", "b", 1.0)).unwrap();

        let options = SearchOptions {
            vector_weight: 0.5,
            ..Default::default()
        };
        let hits = fuse(
            vec![("a".to_string(), 0.8, serde_json::json!({}))],
            &graph,
            &options,
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].provenance.combined_score - 0.4).abs() < 1e-6);
    }

    #[test]
    fn fuse_folds_in_owning_documents_graph_neighborhood() {
        let graph = GraphStore::in_memory().unwrap();
        let mut doc = node("doc");
        doc.kind = NodeKind::Document;
        let mut section = node("sec");
        section.kind = NodeKind::Section;
        graph.add_node(&doc).unwrap();
        graph.add_node(&section).unwrap();
        graph.add_node(&node("chunk")).unwrap();
        graph.add_node(&node("other")).unwrap();
        graph.add_edge(&GraphEdge { edge_type: EdgeType::Contains, ..edge("doc", "sec", 1.0) }).unwrap();
        graph.add_edge(&GraphEdge { edge_type: EdgeType::Contains, ..edge("sec", "chunk", 1.0) }).unwrap();
        graph.add_edge(&edge("doc", "other", 0.8)).unwrap();

        let options = SearchOptions { vector_weight: 0.5, graph_depth: 1, ..Default::default() };
        let hits = fuse(
            vec![("chunk".to_string(), 0.2, serde_json::json!({}))],
            &graph,
            &options,
        )
        .unwrap();
        assert!((hits[0].provenance.graph_score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn fuse_is_deterministic_on_ties() {
        let graph = GraphStore::in_memory().unwrap();
        let options = SearchOptions { k: 2, include_related: false, ..Default::default() };
        let hits = fuse(
            vec![
                ("z".to_string(), 0.5, serde_json::json!({})),
                ("a".to_string(), 0.5, serde_json::json!({})),
            ],
            &graph,
            &options,
        )
        .unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "z");
    }
}
