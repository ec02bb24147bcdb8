//! Pyramid Overlay (C9): a domain-typed strategic-alignment subgraph over
//! eight ordered levels (mission down to task), with alignment scoring and
//! drift detection.
//!
//! Stored entirely as `PyramidItem` graph nodes plus `AlignsTo` (child ->
//! parent) and `Supports` (entity -> backing document) edges, so the
//! overlay rides on C5 rather than maintaining its own storage — the same
//! "typed subgraph as one concrete consumer of the graph" framing the
//! original system describes.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::error::{MemoryError, Result};
use crate::graph::GraphStore;
use crate::model::{EdgeType, GraphEdge, GraphNode, NodeKind, PyramidLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidEntity {
    pub id: String,
    pub org_id: String,
    pub level: PyramidLevel,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub document_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignmentBucket {
    Aligned,
    AtRisk,
    Drifting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftSeverity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy)]
pub struct Alignment {
    pub direct_fit: f32,
    pub graph_coherence: f32,
    pub ancestor_chain: f32,
    pub score: f32,
    pub bucket: AlignmentBucket,
    pub drift_score: f32,
    pub drift_severity: DriftSeverity,
}

impl Alignment {
    /// `score` on a 0-100 scale, for callers that want one. The engine
    /// itself stays on the `[0.0, 1.0]` scale throughout.
    pub fn as_percent(&self) -> f32 {
        self.score * 100.0
    }
}

/// Default weights, used when a caller has no [`crate::config::MemoryConfig`]
/// override handy (e.g. in tests).
pub const DEFAULT_WEIGHTS: (f32, f32, f32) = (0.5, 0.2, 0.3);

fn entity_from_node(node: &GraphNode) -> Result<PyramidEntity> {
    let props = node.properties.as_object().ok_or_else(|| {
        MemoryError::StoreCorruption(format!("pyramid node {} has non-object properties", node.id))
    })?;
    let org_id = props
        .get("orgId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| MemoryError::StoreCorruption(format!("pyramid node {} missing orgId", node.id)))?
        .to_string();
    let level = props
        .get("level")
        .and_then(|v| v.as_str())
        .and_then(|s| PyramidLevel::from_str(s).ok())
        .ok_or_else(|| MemoryError::StoreCorruption(format!("pyramid node {} missing level", node.id)))?;
    let description = props.get("description").and_then(|v| v.as_str()).map(str::to_string);
    let parent_id = props.get("parentId").and_then(|v| v.as_str()).map(str::to_string);
    let document_ids = props
        .get("documentIds")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    Ok(PyramidEntity {
        id: node.id.clone(),
        org_id,
        level,
        name: node.label.clone(),
        description,
        parent_id,
        document_ids,
        created_at: node.created_at,
    })
}

/// `createEntity`: validates level ordering (`mission` has no parent; every
/// other level requires a parent whose level is strictly less), attaches
/// referenced documents via `Supports` edges, and creates the child ->
/// parent `AlignsTo` edge.
pub fn create_entity(
    graph: &GraphStore,
    org_id: &str,
    level: PyramidLevel,
    parent_id: Option<&str>,
    name: &str,
    description: Option<String>,
    document_ids: Vec<String>,
) -> Result<String> {
    if name.trim().is_empty() {
        return Err(MemoryError::InvalidArgument("pyramid entity name must not be empty".to_string()));
    }

    match (level, parent_id) {
        (PyramidLevel::Mission, Some(_)) => {
            return Err(MemoryError::InvalidArgument("mission entities may not have a parent".to_string()));
        }
        (PyramidLevel::Mission, None) => {}
        (_, None) => {
            return Err(MemoryError::InvalidArgument(format!(
                "{level} entities require a parent"
            )));
        }
        (_, Some(parent_id)) => {
            let parent_node = graph
                .get_node(parent_id)
                .map_err(|_| MemoryError::MissingEndpoint(parent_id.to_string()))?;
            let parent_entity = entity_from_node(&parent_node)?;
            if !level.is_valid_child_of(parent_entity.level) {
                return Err(MemoryError::InvalidArgument(format!(
                    "{level} may not sit beneath {}",
                    parent_entity.level
                )));
            }
        }
    }

    for doc_id in &document_ids {
        graph
            .get_node(doc_id)
            .map_err(|_| MemoryError::MissingEndpoint(doc_id.clone()))?;
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let properties = serde_json::json!({
        "orgId": org_id,
        "level": level.to_string(),
        "description": description,
        "parentId": parent_id,
        "documentIds": document_ids,
    });
    graph.add_node(&GraphNode {
        id: id.clone(),
        kind: NodeKind::PyramidItem,
        label: name.to_string(),
        properties,
        embedding_id: None,
        created_at: now,
    })?;

    for doc_id in &document_ids {
        graph.add_edge(&GraphEdge {
            id: Uuid::new_v4().to_string(),
            from: id.clone(),
            to: doc_id.clone(),
            edge_type: EdgeType::Supports,
            weight: 1.0,
            metadata: serde_json::Value::Null,
            created_at: now,
        })?;
    }

    if let Some(parent_id) = parent_id {
        graph.add_edge(&GraphEdge {
            id: Uuid::new_v4().to_string(),
            from: id.clone(),
            to: parent_id.to_string(),
            edge_type: EdgeType::AlignsTo,
            weight: 1.0,
            metadata: serde_json::Value::Null,
            created_at: now,
        })?;
    }

    Ok(id)
}

/// `getEntity`: fetch a single pyramid entity by id.
pub fn get_entity(graph: &GraphStore, id: &str) -> Result<PyramidEntity> {
    let node = graph.get_node(id)?;
    entity_from_node(&node)
}

/// `updateEntity`: rewrites name/description/document set in place. The
/// level and parent are immutable after creation — moving an entity across
/// levels or parents would invalidate any already-computed alignment chain,
/// so that requires deleting and recreating the entity instead.
pub fn update_entity(
    graph: &GraphStore,
    id: &str,
    name: Option<String>,
    description: Option<Option<String>>,
    document_ids: Option<Vec<String>>,
) -> Result<PyramidEntity> {
    let node = graph.get_node(id)?;
    let mut entity = entity_from_node(&node)?;

    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(MemoryError::InvalidArgument("pyramid entity name must not be empty".to_string()));
        }
        entity.name = name;
    }
    if let Some(description) = description {
        entity.description = description;
    }
    if let Some(document_ids) = document_ids {
        for doc_id in &document_ids {
            graph
                .get_node(doc_id)
                .map_err(|_| MemoryError::MissingEndpoint(doc_id.clone()))?;
        }
        entity.document_ids = document_ids;
    }

    let properties = serde_json::json!({
        "orgId": entity.org_id,
        "level": entity.level.to_string(),
        "description": entity.description,
        "parentId": entity.parent_id,
        "documentIds": entity.document_ids,
    });
    graph.add_node(&GraphNode {
        id: entity.id.clone(),
        kind: NodeKind::PyramidItem,
        label: entity.name.clone(),
        properties,
        embedding_id: None,
        created_at: entity.created_at,
    })?;

    for doc_id in &entity.document_ids {
        graph.add_edge(&GraphEdge {
            id: Uuid::new_v4().to_string(),
            from: entity.id.clone(),
            to: doc_id.clone(),
            edge_type: EdgeType::Supports,
            weight: 1.0,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        })?;
    }

    Ok(entity)
}

/// `deleteEntity`: removes the node (cascading its edges); leaves children
/// dangling with an `AlignsTo` edge to a now-missing parent, matching
/// `deleteDocument`'s non-recursive-by-default stance — callers that want
/// to prune a whole subtree call this bottom-up themselves.
pub fn delete_entity(graph: &GraphStore, id: &str) -> Result<()> {
    graph.delete_node(id)
}

/// `getPyramidTree`: every entity for `org_id`, ordered by level then
/// insertion time.
pub fn get_pyramid_tree(graph: &GraphStore, org_id: &str) -> Result<Vec<PyramidEntity>> {
    let mut entities: Vec<PyramidEntity> = graph
        .nodes_by_kind(NodeKind::PyramidItem)?
        .iter()
        .map(entity_from_node)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|e| e.org_id == org_id)
        .collect();
    entities.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.created_at.cmp(&b.created_at)));
    Ok(entities)
}

/// `getPathToMission`: the upward chain of ancestors via `AlignsTo`,
/// nearest parent first. Empty if `id` is unknown.
pub fn get_path_to_mission(graph: &GraphStore, id: &str) -> Result<Vec<PyramidEntity>> {
    if graph.get_node(id).is_err() {
        return Ok(Vec::new());
    }
    let related = graph.find_related(id, 8, Some(EdgeType::AlignsTo))?;
    related.iter().map(|r| entity_from_node(&r.node)).collect()
}

/// `getChildren`: downward BFS restricted to `AlignsTo`, walked against the
/// child -> parent direction the edges are stored in.
pub fn get_children(graph: &GraphStore, id: &str, depth: u32) -> Result<Vec<PyramidEntity>> {
    let related = graph.find_incoming_related(id, depth, Some(EdgeType::AlignsTo))?;
    related.iter().map(|r| entity_from_node(&r.node)).collect()
}

fn bucket(score: f32) -> AlignmentBucket {
    if score >= 0.70 {
        AlignmentBucket::Aligned
    } else if score >= 0.40 {
        AlignmentBucket::AtRisk
    } else {
        AlignmentBucket::Drifting
    }
}

fn severity(drift: f32) -> DriftSeverity {
    if drift < 0.20 {
        DriftSeverity::Critical
    } else if drift < 0.40 {
        DriftSeverity::High
    } else if drift < 0.60 {
        DriftSeverity::Medium
    } else {
        DriftSeverity::Low
    }
}

/// `calculateAlignment`: the weighted blend of direct parent-child fit,
/// graph coherence (supporting-document fan-out), and the geometric mean of
/// direct fit along the full ancestor chain.
pub async fn calculate_alignment(
    graph: &GraphStore,
    provider: &dyn EmbeddingProvider,
    id: &str,
    weights: (f32, f32, f32),
) -> Result<Alignment> {
    let (direct_fit_weight, graph_coherence_weight, ancestor_chain_weight) = weights;
    let node = graph.get_node(id)?;
    let entity = entity_from_node(&node)?;

    let direct_fit = match &entity.parent_id {
        None => 1.0,
        Some(parent_id) => {
            let parent_node = graph.get_node(parent_id)?;
            let parent_entity = entity_from_node(&parent_node)?;
            description_similarity(provider, entity.description.as_deref(), parent_entity.description.as_deref()).await?
        }
    };

    let supports = graph.find_related(id, 1, Some(EdgeType::Supports))?;
    let graph_coherence = (supports.len() as f32 / 5.0).min(1.0);

    let path = get_path_to_mission(graph, id)?;
    let ancestor_chain = if path.is_empty() {
        direct_fit
    } else {
        let mut product = 1.0f64;
        let mut prev_description = entity.description.clone();
        for ancestor in &path {
            let fit = description_similarity(provider, prev_description.as_deref(), ancestor.description.as_deref())
                .await?;
            product *= fit.max(0.0) as f64;
            prev_description = ancestor.description.clone();
        }
        (product.powf(1.0 / path.len() as f64)) as f32
    };

    let score = (direct_fit_weight * direct_fit
        + graph_coherence_weight * graph_coherence
        + ancestor_chain_weight * ancestor_chain)
        .clamp(0.0, 1.0);
    let drift_score = 1.0 - score;

    Ok(Alignment {
        direct_fit,
        graph_coherence,
        ancestor_chain,
        score,
        bucket: bucket(score),
        drift_score,
        drift_severity: severity(drift_score),
    })
}

async fn description_similarity(
    provider: &dyn EmbeddingProvider,
    a: Option<&str>,
    b: Option<&str>,
) -> Result<f32> {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
            let ea = provider.embed(a).await?;
            let eb = provider.embed(b).await?;
            Ok(cosine_similarity(&ea.vector, &eb.vector))
        }
        _ => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbeddingProvider;

    fn provider() -> HashingEmbeddingProvider {
        HashingEmbeddingProvider::new(64)
    }

    #[test]
    fn mission_with_parent_is_rejected() {
        let graph = GraphStore::in_memory().unwrap();
        let err = create_entity(&graph, "org1", PyramidLevel::Mission, Some("anything"), "M", None, vec![])
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
    }

    #[test]
    fn non_mission_without_parent_is_rejected() {
        let graph = GraphStore::in_memory().unwrap();
        let err = create_entity(&graph, "org1", PyramidLevel::Vision, None, "V", None, vec![]).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
    }

    #[test]
    fn valid_chain_creates_aligns_to_edges() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "Mission", Some("grow".to_string()), vec![])
            .unwrap();
        let vision = create_entity(
            &graph,
            "org1",
            PyramidLevel::Vision,
            Some(&mission),
            "Vision",
            Some("grow fast".to_string()),
            vec![],
        )
        .unwrap();
        let tree = get_pyramid_tree(&graph, "org1").unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, mission);
        assert_eq!(tree[1].id, vision);
    }

    #[test]
    fn skipping_a_level_is_allowed() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let objective = create_entity(&graph, "org1", PyramidLevel::Objective, Some(&mission), "O", None, vec![])
            .unwrap();
        let entity = get_entity(&graph, &objective).unwrap();
        assert_eq!(entity.parent_id.as_deref(), Some(mission.as_str()));
    }

    #[test]
    fn shallower_or_equal_parent_is_rejected() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let objective = create_entity(&graph, "org1", PyramidLevel::Objective, Some(&mission), "O", None, vec![]).unwrap();

        // Same level as its parent.
        let err = create_entity(&graph, "org1", PyramidLevel::Objective, Some(&objective), "O2", None, vec![])
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));

        // Shallower than its parent.
        let err2 = create_entity(&graph, "org1", PyramidLevel::Mission, Some(&objective), "M2", None, vec![])
            .unwrap_err();
        assert!(matches!(err2, MemoryError::InvalidArgument(_)));
    }

    #[test]
    fn path_to_mission_is_empty_for_unknown_id() {
        let graph = GraphStore::in_memory().unwrap();
        let path = get_path_to_mission(&graph, "nonexistent").unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn get_children_finds_direct_descendants() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let vision = create_entity(&graph, "org1", PyramidLevel::Vision, Some(&mission), "V", None, vec![]).unwrap();
        let children = get_children(&graph, &mission, 1).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, vision);
    }

    #[tokio::test]
    async fn mission_has_direct_fit_of_one() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let alignment = calculate_alignment(&graph, &provider(), &mission, DEFAULT_WEIGHTS).await.unwrap();
        assert!((alignment.direct_fit - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn aligned_bucket_for_high_score() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let alignment = calculate_alignment(&graph, &provider(), &mission, DEFAULT_WEIGHTS).await.unwrap();
        assert_eq!(alignment.bucket, AlignmentBucket::Aligned);
        assert_eq!(alignment.drift_severity, DriftSeverity::Low);
    }

    #[test]
    fn get_entity_returns_created_entity() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", Some("grow".to_string()), vec![])
            .unwrap();
        let entity = get_entity(&graph, &mission).unwrap();
        assert_eq!(entity.name, "M");
        assert_eq!(entity.description.as_deref(), Some("grow"));
    }

    #[test]
    fn update_entity_rewrites_name_and_description() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let updated = update_entity(&graph, &mission, Some("Mission Renamed".to_string()), Some(Some("new desc".to_string())), None)
            .unwrap();
        assert_eq!(updated.name, "Mission Renamed");
        assert_eq!(updated.description.as_deref(), Some("new desc"));
        assert_eq!(get_entity(&graph, &mission).unwrap().name, "Mission Renamed");
    }

    #[test]
    fn update_entity_rejects_blank_name() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        let err = update_entity(&graph, &mission, Some("   ".to_string()), None, None).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));
    }

    #[test]
    fn delete_entity_removes_node() {
        let graph = GraphStore::in_memory().unwrap();
        let mission = create_entity(&graph, "org1", PyramidLevel::Mission, None, "M", None, vec![]).unwrap();
        delete_entity(&graph, &mission).unwrap();
        assert!(get_entity(&graph, &mission).is_err());
    }
}
