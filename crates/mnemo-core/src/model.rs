//! Core data model: `Document`, `Section`, `Chunk`, `GraphNode`, `GraphEdge`,
//! `Trajectory`, `LearnedPattern`, `PyramidItem`.
//!
//! Enum `Display`/`FromStr` pairs and `#[non_exhaustive]` on public structs
//! keep these types forward-compatible as more node/edge kinds are added.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input document type understood by the parser (C2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Markdown,
    Text,
    Json,
    Jsonl,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentType::Markdown => "markdown",
            DocumentType::Text => "text",
            DocumentType::Json => "json",
            DocumentType::Jsonl => "jsonl",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(DocumentType::Markdown),
            "text" | "txt" => Ok(DocumentType::Text),
            "json" => Ok(DocumentType::Json),
            "jsonl" | "ndjson" => Ok(DocumentType::Jsonl),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// A document as ingested: raw content plus dedup/provenance metadata.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub doc_type: DocumentType,
    pub content: String,
    /// sha256 hex digest of normalized content, used for duplicate detection.
    pub content_hash: String,
    pub title: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A heading-delimited region of a document.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub document_id: String,
    pub heading: Option<String>,
    /// Heading depth; 0 for a document with no headings (a single section).
    pub level: u8,
    pub content: String,
    /// Order among sibling sections within the document.
    pub order: u32,
}

/// A fixed-size retrieval unit carved out of a section for embedding.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub section_id: String,
    pub document_id: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub order: u32,
}

/// Discriminates what a [`GraphNode`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Section,
    Chunk,
    Tag,
    PyramidItem,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Document => "document",
            NodeKind::Section => "section",
            NodeKind::Chunk => "chunk",
            NodeKind::Tag => "tag",
            NodeKind::PyramidItem => "pyramid_item",
        };
        write!(f, "{s}")
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(NodeKind::Document),
            "section" => Ok(NodeKind::Section),
            "chunk" => Ok(NodeKind::Chunk),
            "tag" => Ok(NodeKind::Tag),
            "pyramid_item" => Ok(NodeKind::PyramidItem),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

/// A typed node in the property graph (C5).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    pub embedding_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Relationship type between two graph nodes, built by the graph builder (C3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Document -> Section, Section -> Chunk containment.
    Contains,
    /// Citation or reference-definition link.
    Cites,
    /// Intra-corpus wikilink or markdown link.
    LinksTo,
    /// Node -> Tag semantic-tag association.
    TaggedWith,
    /// One node was derived from another (e.g. a summary chunk).
    DerivedFrom,
    /// Document <-> document edge inferred from shared tags.
    RelatesTo,
    /// Pyramid child -> parent alignment edge (C9).
    AlignsTo,
    /// Pyramid entity -> document edge (C9): the document backs the entity.
    Supports,
    Custom,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeType::Contains => "contains",
            EdgeType::Cites => "cites",
            EdgeType::LinksTo => "links_to",
            EdgeType::TaggedWith => "tagged_with",
            EdgeType::DerivedFrom => "derived_from",
            EdgeType::RelatesTo => "relates_to",
            EdgeType::AlignsTo => "aligns_to",
            EdgeType::Supports => "supports",
            EdgeType::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(EdgeType::Contains),
            "cites" => Ok(EdgeType::Cites),
            "links_to" => Ok(EdgeType::LinksTo),
            "tagged_with" => Ok(EdgeType::TaggedWith),
            "derived_from" => Ok(EdgeType::DerivedFrom),
            "relates_to" => Ok(EdgeType::RelatesTo),
            "aligns_to" => Ok(EdgeType::AlignsTo),
            "supports" => Ok(EdgeType::Supports),
            "custom" => Ok(EdgeType::Custom),
            other => Err(format!("unknown edge type: {other}")),
        }
    }
}

/// A weighted, typed, directed edge in the property graph.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    pub weight: f32,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl GraphEdge {
    /// The dedup key the graph builder collapses parallel edges on:
    /// `(from, to, type)` keeping the max weight.
    pub fn dedup_key(&self) -> (String, String, EdgeType) {
        (self.from.clone(), self.to.clone(), self.edge_type)
    }
}

/// One step recorded while a cognitive-engine trajectory is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryStep {
    pub query: String,
    pub candidate_ids: Vec<String>,
    pub chosen_id: Option<String>,
    pub score: f32,
    pub at: DateTime<Utc>,
}

/// A recorded query-to-outcome trajectory, the raw material the cognitive
/// engine's learning tick distills into [`LearnedPattern`]s.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub id: String,
    pub steps: Vec<TrajectoryStep>,
    /// Reward in `[-1.0, 1.0]`; `None` while the trajectory is still open.
    pub reward: Option<f32>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trajectory {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A distilled query/result pattern the cognitive engine has learned from
/// repeated trajectories, used to bias reranking.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    pub id: String,
    pub centroid: Vec<f32>,
    pub frequency: u32,
    /// Exponential moving average of observed reward for queries matching
    /// this pattern.
    pub reward_ema: f32,
    pub created_at: DateTime<Utc>,
    pub last_reinforced_at: DateTime<Utc>,
}

/// Strategic-alignment hierarchy level. Strictly ordered
/// mission > vision > objective > goal > portfolio > program > project > task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PyramidLevel {
    Mission,
    Vision,
    Objective,
    Goal,
    Portfolio,
    Program,
    Project,
    Task,
}

impl PyramidLevel {
    /// 0 for `Mission` through 7 for `Task`; lower ordinal is "higher" in the
    /// hierarchy.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Whether `self` may legally sit beneath `parent` in the pyramid.
    /// Skip-level parents are legal: only strict descent is required.
    pub fn is_valid_child_of(self, parent: PyramidLevel) -> bool {
        self.ordinal() > parent.ordinal()
    }
}

impl fmt::Display for PyramidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PyramidLevel::Mission => "mission",
            PyramidLevel::Vision => "vision",
            PyramidLevel::Objective => "objective",
            PyramidLevel::Goal => "goal",
            PyramidLevel::Portfolio => "portfolio",
            PyramidLevel::Program => "program",
            PyramidLevel::Project => "project",
            PyramidLevel::Task => "task",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PyramidLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mission" => Ok(PyramidLevel::Mission),
            "vision" => Ok(PyramidLevel::Vision),
            "objective" => Ok(PyramidLevel::Objective),
            "goal" => Ok(PyramidLevel::Goal),
            "portfolio" => Ok(PyramidLevel::Portfolio),
            "program" => Ok(PyramidLevel::Program),
            "project" => Ok(PyramidLevel::Project),
            "task" => Ok(PyramidLevel::Task),
            other => Err(format!("unknown pyramid level: {other}")),
        }
    }
}

/// A node in the strategic-alignment overlay (C9).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidItem {
    pub id: String,
    pub level: PyramidLevel,
    pub title: String,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
