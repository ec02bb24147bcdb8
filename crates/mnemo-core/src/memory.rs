//! Unified Memory Facade (C8): the single transactional entry point
//! coordinating the document parser, graph builder, vector store, graph
//! store, and cognitive engine.
//!
//! A single `Mutex<Inner>` serializes writes, guarding the whole
//! cross-store write path (vector insert then graph insert) rather than a
//! single connection, since ingest must keep both stores in lockstep.

use crate::cognitive::CognitiveEngine;
use crate::config::MemoryConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::graph::GraphStore;
use crate::model::{DocumentType, EdgeType as GraphEdgeType, GraphEdge, PyramidLevel};
use crate::parser;
use crate::pyramid::{self, Alignment, PyramidEntity};
use crate::search::{self, HybridHit, SearchOptions};
use crate::vector::VectorStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub node_count: u64,
    pub edge_count: u64,
    pub vector_count: usize,
    pub open_trajectories: usize,
    pub learned_patterns: usize,
    pub cognitive_state: String,
}

/// `Cognitive::getCognitiveCapabilities()`: what a caller can ask the engine
/// to do before it asks, rather than discovering via a `RerankUnavailable`.
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveCapabilities {
    pub enabled: bool,
    pub has_cross_encoder: bool,
}

struct Inner {
    graph: GraphStore,
    vectors: VectorStore,
    cognitive: CognitiveEngine,
    provider: Arc<dyn EmbeddingProvider>,
}

/// The facade callers construct. Writes are serialized through a single
/// async mutex around `Inner`; reads that only touch the vector store's
/// tiers can bypass it once the store is made internally concurrent, but
/// for now we keep the simpler single lock.
pub struct UnifiedMemory {
    inner: Mutex<Inner>,
    config: MemoryConfig,
}

impl UnifiedMemory {
    pub fn new(config: MemoryConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let graph = GraphStore::open(config.store_path.as_deref())?;
        let vectors = VectorStore::new(
            config.embedding_dimensions,
            config.hot_tier_capacity,
            config.warm_tier_capacity,
        )?;
        let cognitive = CognitiveEngine::new(
            config.max_buffered_trajectories,
            config.max_patterns,
            crate::cognitive::Reranker::similarity_based(1.0),
        );
        Ok(Self {
            inner: Mutex::new(Inner {
                graph,
                vectors,
                cognitive,
                provider,
            }),
            config,
        })
    }

    /// `addDocument`: parse, embed, insert vectors then graph nodes/edges.
    /// On any failure after the vector insert, the inserted vectors are
    /// rolled back so no observer sees a partial document.
    pub async fn add_document(
        &self,
        raw_text: &str,
        doc_type: DocumentType,
        source: Option<String>,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.run_with_timeout(cancel, async {
            let parsed = parser::parse(raw_text, doc_type, source)?;
            let mut inner = self.inner.lock().await;

            if let Some(existing_id) = inner.graph.find_node_by_content_hash(&parsed.document.content_hash)? {
                if existing_id == parsed.document.id {
                    return Ok(existing_id);
                }
                return Err(MemoryError::DuplicateId(existing_id));
            }

            let build = crate::graph::build_edges(&parsed);

            // The builder can't consult the store, so every wikilink/markdown-link/
            // citation/reference-definition target it couldn't resolve locally comes
            // back as an `unresolved` placeholder `Tag` node. Now that we hold the
            // lock, check whether any of those targets actually name a document
            // already in the corpus (by title, case-insensitively) and rewrite the
            // edge to point at the real document instead of the placeholder.
            let existing_documents = inner.graph.nodes_by_kind(crate::model::NodeKind::Document)?;
            let mut resolved: std::collections::HashMap<String, String> = std::collections::HashMap::new();
            for node in &build.nodes {
                if node.kind != crate::model::NodeKind::Tag {
                    continue;
                }
                if node.properties.get("unresolved").and_then(|v| v.as_bool()) != Some(true) {
                    continue;
                }
                if let Some(target) = existing_documents.iter().find(|d| d.label.eq_ignore_ascii_case(&node.label)) {
                    resolved.insert(node.id.clone(), target.id.clone());
                }
            }
            let nodes: Vec<_> = build.nodes.into_iter().filter(|n| !resolved.contains_key(&n.id)).collect();
            let edges: Vec<_> = build
                .edges
                .into_iter()
                .map(|mut e| {
                    if let Some(real) = resolved.get(&e.to) {
                        e.to = real.clone();
                    }
                    if let Some(real) = resolved.get(&e.from) {
                        e.from = real.clone();
                    }
                    e
                })
                .collect();

            let mut inserted_keys: Vec<String> = Vec::new();
            let rollback = |inner: &mut Inner, keys: &[String]| {
                for key in keys {
                    let _ = inner.vectors.delete(key);
                }
            };

            for chunk in &build.chunks {
                let embedding = match inner.provider.embed(&chunk.text).await {
                    Ok(e) => e,
                    Err(e) => {
                        rollback(&mut inner, &inserted_keys);
                        return Err(e.into());
                    }
                };
                if let Err(e) = inner
                    .vectors
                    .upsert(&chunk.id, &embedding.vector, serde_json::json!({ "documentId": parsed.document.id }))
                {
                    rollback(&mut inner, &inserted_keys);
                    return Err(e.into());
                }
                inserted_keys.push(chunk.id.clone());
            }

            for node in &nodes {
                if let Err(e) = inner.graph.add_node(node) {
                    rollback(&mut inner, &inserted_keys);
                    return Err(e.into());
                }
            }
            for edge in &edges {
                if let Err(e) = inner.graph.add_edge(edge) {
                    rollback(&mut inner, &inserted_keys);
                    return Err(e.into());
                }
            }
            // Semantic-tag relating: any existing document sharing at least one tag
            // with the new one gets a `RelatesTo` edge weighted by tag-set overlap
            // (Jaccard-by-max, capped at 0.9 so shared tags never outrank a direct
            // citation or link).
            let new_tags = document_tag_ids(&inner.graph, &parsed.document.id)?;
            if !new_tags.is_empty() {
                for other in &existing_documents {
                    let other_tags = document_tag_ids(&inner.graph, &other.id)?;
                    let shared = new_tags.intersection(&other_tags).count();
                    if shared == 0 {
                        continue;
                    }
                    let ratio = shared as f32 / new_tags.len().max(other_tags.len()) as f32;
                    if let Err(e) = inner.graph.add_edge(&GraphEdge {
                        id: Uuid::new_v4().to_string(),
                        from: parsed.document.id.clone(),
                        to: other.id.clone(),
                        edge_type: GraphEdgeType::RelatesTo,
                        weight: ratio.min(0.9),
                        metadata: serde_json::Value::Null,
                        created_at: Utc::now(),
                    }) {
                        rollback(&mut inner, &inserted_keys);
                        return Err(e.into());
                    }
                }
            }

            // `DerivedFrom` (rule 5): a title like "Summary of Quarterly Report"
            // strips to "of Quarterly Report" / "Quarterly Report", which we then
            // substring-match (either direction) against every existing
            // document's title.
            let title = parsed.document.title.as_deref().unwrap_or(&parsed.document.id);
            if let Some(stripped) = crate::graph::strip_derivation_keyword(title) {
                let stripped_lower = stripped.to_lowercase();
                for other in &existing_documents {
                    let other_lower = other.label.to_lowercase();
                    if other_lower.is_empty() {
                        continue;
                    }
                    if other_lower.contains(&stripped_lower) || stripped_lower.contains(&other_lower) {
                        if let Err(e) = inner.graph.add_edge(&GraphEdge {
                            id: Uuid::new_v4().to_string(),
                            from: parsed.document.id.clone(),
                            to: other.id.clone(),
                            edge_type: GraphEdgeType::DerivedFrom,
                            weight: 0.85,
                            metadata: serde_json::Value::Null,
                            created_at: Utc::now(),
                        }) {
                            rollback(&mut inner, &inserted_keys);
                            return Err(e.into());
                        }
                    }
                }
            }

            inner.graph.record_content_hash(&parsed.document.content_hash, &parsed.document.id)?;

            Ok(parsed.document.id)
        })
        .await
    }

    /// `addRelationship`: fails with `MissingEndpoint` if either side is
    /// absent from the graph.
    pub async fn add_relationship(
        &self,
        from: &str,
        to: &str,
        edge_type: GraphEdgeType,
        weight: f32,
        properties: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            inner
                .graph
                .get_node(from)
                .map_err(|_| MemoryError::MissingEndpoint(from.to_string()))?;
            inner
                .graph
                .get_node(to)
                .map_err(|_| MemoryError::MissingEndpoint(to.to_string()))?;
            inner.graph.add_edge(&GraphEdge {
                id: Uuid::new_v4().to_string(),
                from: from.to_string(),
                to: to.to_string(),
                edge_type,
                weight,
                metadata: properties,
                created_at: Utc::now(),
            })?;
            Ok(())
        })
        .await
    }

    /// `deleteDocument`: removes the graph node (cascading edges) and every
    /// vector keyed under it. Atomic in the sense that a failure on one
    /// side does not remove the other.
    pub async fn delete_document(&self, id: &str, cancel: CancellationToken) -> Result<()> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;

            let descendants = inner.graph.find_related(id, 16, Some(GraphEdgeType::Contains))?;
            let mut node_ids: Vec<String> = descendants
                .iter()
                .map(|r| r.node.id.clone())
                .collect();
            node_ids.push(id.to_string());

            for node_id in &node_ids {
                if inner.vectors.contains(node_id) {
                    inner.vectors.delete(node_id)?;
                }
            }

            // Deepest descendants first: deleting a node only cascades its
            // own edges, so a parent must outlive its children in this loop
            // or they'd be orphaned with no path back to the document.
            let mut by_depth: Vec<(u32, String)> = descendants
                .into_iter()
                .map(|r| (r.depth, r.node.id))
                .collect();
            by_depth.sort_by(|a, b| b.0.cmp(&a.0));
            for (_, node_id) in by_depth {
                inner.graph.delete_node(&node_id)?;
            }
            inner.graph.delete_node(id)?;
            Ok(())
        })
        .await
    }

    pub async fn search(&self, query: &str, options: SearchOptions, cancel: CancellationToken) -> Result<Vec<HybridHit>> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            let Inner { graph, vectors, provider, .. } = &mut *inner;
            let hits = search::search(query, provider.as_ref(), vectors, graph, &options).await?;
            Ok(hits)
        })
        .await
    }

    /// `addDocuments`: batch `addDocument`, each call still an independent
    /// transaction against the same `Inner` lock. Fails fast on the first
    /// error, leaving documents already inserted in place.
    pub async fn add_documents(
        &self,
        documents: Vec<(String, DocumentType, Option<String>)>,
        cancel: CancellationToken,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());
        for (raw_text, doc_type, source) in documents {
            let id = self.add_document(&raw_text, doc_type, source, cancel.clone()).await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// `vectorSearch`: the vector store's tiered k-NN directly, bypassing
    /// graph fusion and rerank. Embeds `query` with the same provider
    /// `search` uses so callers never need to embed themselves.
    pub async fn vector_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&dyn Fn(&serde_json::Value) -> bool>,
        cancel: CancellationToken,
    ) -> Result<Vec<crate::vector::SearchHit>> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            let embedding = inner.provider.embed(query).await?;
            Ok(inner.vectors.search(&embedding.vector, k, filter)?)
        })
        .await
    }

    /// `graphQuery`: the graph store's Cypher-subset query language.
    pub async fn graph_query(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<std::collections::HashMap<String, crate::model::GraphNode>>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            Ok(inner.graph.query(query)?)
        })
        .await
    }

    /// `findRelated`: breadth-first traversal from `node_id`, optionally
    /// filtered to a single edge type.
    pub async fn find_related(
        &self,
        node_id: &str,
        depth: u32,
        edge_type: Option<GraphEdgeType>,
        cancel: CancellationToken,
    ) -> Result<Vec<crate::graph::RelatedNode>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            Ok(inner.graph.find_related(node_id, depth, edge_type)?)
        })
        .await
    }

    /// `createEntity`: add a node to the strategic-alignment pyramid.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_pyramid_entity(
        &self,
        org_id: &str,
        level: PyramidLevel,
        parent_id: Option<&str>,
        name: &str,
        description: Option<String>,
        document_ids: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::create_entity(&inner.graph, org_id, level, parent_id, name, description, document_ids)
        })
        .await
    }

    pub async fn get_pyramid_entity(&self, id: &str, cancel: CancellationToken) -> Result<PyramidEntity> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::get_entity(&inner.graph, id)
        })
        .await
    }

    pub async fn update_pyramid_entity(
        &self,
        id: &str,
        name: Option<String>,
        description: Option<Option<String>>,
        document_ids: Option<Vec<String>>,
        cancel: CancellationToken,
    ) -> Result<PyramidEntity> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::update_entity(&inner.graph, id, name, description, document_ids)
        })
        .await
    }

    pub async fn delete_pyramid_entity(&self, id: &str, cancel: CancellationToken) -> Result<()> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::delete_entity(&inner.graph, id)
        })
        .await
    }

    pub async fn get_pyramid_tree(&self, org_id: &str, cancel: CancellationToken) -> Result<Vec<PyramidEntity>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::get_pyramid_tree(&inner.graph, org_id)
        })
        .await
    }

    pub async fn get_pyramid_children(&self, id: &str, depth: u32, cancel: CancellationToken) -> Result<Vec<PyramidEntity>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::get_children(&inner.graph, id, depth)
        })
        .await
    }

    pub async fn get_path_to_mission(&self, id: &str, cancel: CancellationToken) -> Result<Vec<PyramidEntity>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::get_path_to_mission(&inner.graph, id)
        })
        .await
    }

    pub async fn calculate_alignment(&self, id: &str, cancel: CancellationToken) -> Result<Alignment> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            pyramid::calculate_alignment(&inner.graph, inner.provider.as_ref(), id, self.config.pyramid_weights).await
        })
        .await
    }

    /// `Cognitive::begin`: open a new trajectory, returning its id.
    pub async fn begin_trajectory(&self, cancel: CancellationToken) -> Result<String> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            Ok(inner.cognitive.begin()?)
        })
        .await
    }

    /// `Cognitive::step`: append one query/outcome step to an open trajectory.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_trajectory_step(
        &self,
        trajectory_id: &str,
        query: String,
        candidate_ids: Vec<String>,
        chosen_id: Option<String>,
        score: f32,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            Ok(inner.cognitive.step(trajectory_id, query, candidate_ids, chosen_id, score)?)
        })
        .await
    }

    /// `Cognitive::end`: close a trajectory with a final reward in `[-1.0, 1.0]`.
    pub async fn end_trajectory(&self, trajectory_id: &str, reward: f32, cancel: CancellationToken) -> Result<()> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            Ok(inner.cognitive.end(trajectory_id, reward)?)
        })
        .await
    }

    /// `Cognitive::tick`: distill buffered closed trajectories into learned
    /// patterns, looking candidate embeddings up from the vector store.
    pub async fn tick(&self, cancel: CancellationToken) -> Result<usize> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            let Inner { cognitive, vectors, .. } = &mut *inner;
            Ok(cognitive.tick(|key| vectors.embedding_of(key))?)
        })
        .await
    }

    /// `Cognitive::forceLearn`: run a learning tick regardless of buffer fill.
    pub async fn force_learn(&self, cancel: CancellationToken) -> Result<usize> {
        self.run_with_timeout(cancel, async {
            let mut inner = self.inner.lock().await;
            let Inner { cognitive, vectors, .. } = &mut *inner;
            Ok(cognitive.force_learn(|key| vectors.embedding_of(key))?)
        })
        .await
    }

    /// `Cognitive::findPatterns`: nearest learned patterns to a query's
    /// embedding, for callers that want to inspect what the engine has
    /// consolidated rather than only feeding it into rerank.
    pub async fn find_patterns(
        &self,
        query: &str,
        k: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<crate::cognitive::patterns::ScoredPattern>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            let embedding = inner.provider.embed(query).await?;
            Ok(inner.cognitive.find_patterns(&embedding.vector, k))
        })
        .await
    }

    /// `Cognitive::rerank`: neural (or similarity-based) rerank of candidates.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<crate::cognitive::RerankCandidate>,
        cancel: CancellationToken,
    ) -> Result<Vec<crate::cognitive::RerankCandidate>> {
        self.run_with_timeout(cancel, async {
            let inner = self.inner.lock().await;
            Ok(inner.cognitive.rerank(query, candidates).await?)
        })
        .await
    }

    /// `Cognitive::getCognitiveCapabilities`: whether the engine is enabled
    /// and whether a cross-encoder rerank model is loaded, for callers that
    /// need to branch before requesting a capability that isn't there.
    pub async fn get_cognitive_capabilities(&self) -> CognitiveCapabilities {
        let inner = self.inner.lock().await;
        CognitiveCapabilities {
            enabled: inner.cognitive.state() != crate::cognitive::EngineState::Disabled,
            has_cross_encoder: inner.cognitive.has_cross_encoder(),
        }
    }

    pub async fn get_stats(&self) -> Result<MemoryStats> {
        let inner = self.inner.lock().await;
        Ok(MemoryStats {
            node_count: inner.graph.node_count()?,
            edge_count: inner.graph.edge_count()?,
            vector_count: inner.vectors.len(),
            open_trajectories: inner.cognitive.open_trajectory_count(),
            learned_patterns: inner.cognitive.pattern_count(),
            cognitive_state: format!("{:?}", inner.cognitive.state()),
        })
    }

    /// Flush and release both stores. Idempotent: calling twice is a no-op
    /// the second time.
    pub async fn close(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        inner.vectors.persist()?;
        Ok(())
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    async fn run_with_timeout<T>(
        &self,
        cancel: CancellationToken,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(MemoryError::Cancelled),
            result = timeout(self.config.operation_timeout, fut) => {
                result.map_err(|_| MemoryError::Timeout)?
            }
        }
    }
}

/// A document's semantic tag set for rule 4's "any pair sharing >= 1 tag"
/// comparison: inline `#hashtag` mentions (by label, lowercased) unioned
/// with the document's own frontmatter `tags` list (stashed on the document
/// node's properties by the graph builder), so two documents that only
/// share a frontmatter tag with no inline hashtag still relate.
fn document_tag_ids(graph: &GraphStore, doc_id: &str) -> Result<std::collections::HashSet<String>> {
    let mut tags: std::collections::HashSet<String> = graph
        .find_related(doc_id, 2, None)?
        .into_iter()
        .filter(|r| r.node.kind == crate::model::NodeKind::Tag && r.via_edge.edge_type == GraphEdgeType::TaggedWith)
        .map(|r| r.node.label.to_lowercase())
        .collect();

    if let Ok(node) = graph.get_node(doc_id) {
        if let Some(arr) = node.properties.get("tags").and_then(|v| v.as_array()) {
            tags.extend(arr.iter().filter_map(|v| v.as_str().map(|s| s.to_lowercase())));
        }
    }
    Ok(tags)
}
