//! Graph Builder (C3): parsed documents -> nodes, chunks, and typed,
//! deduplicated, weighted edges.
//!
//! Edge rules:
//! - `Contains`: Document -> Section -> Chunk hierarchy.
//! - `Cites`: citation and reference-definition links.
//! - `LinksTo`: wikilinks and markdown links (intra-corpus references).
//! - `TaggedWith`: inline `#tag` mentions in section bodies.
//! - `DerivedFrom`: decided by the facade via [`strip_derivation_keyword`],
//!   since it requires comparing this document's title against every other
//!   document already in the corpus.
//!
//! Parallel edges are deduplicated on `(from, to, type)` keeping the max
//! weight, mirroring [`crate::graph::GraphStore::add_edge`]'s own dedup so
//! the two paths agree.

use crate::model::{Chunk, EdgeType, GraphEdge, GraphNode, NodeKind};
use crate::parser::{CitationKind, LinkType, ParsedDocument};
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

const CHUNK_SIZE: usize = 500;
const CHUNK_OVERLAP: usize = 50;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([A-Za-z][\w-]{1,40})\b").unwrap())
}

pub struct BuildResult {
    pub nodes: Vec<GraphNode>,
    pub chunks: Vec<Chunk>,
    pub edges: Vec<GraphEdge>,
}

fn new_edge(from: &str, to: &str, edge_type: EdgeType, weight: f32) -> GraphEdge {
    GraphEdge {
        id: Uuid::new_v4().to_string(),
        from: from.to_string(),
        to: to.to_string(),
        edge_type,
        weight,
        metadata: serde_json::Value::Null,
        created_at: Utc::now(),
    }
}

fn chunk_section(section_id: &str, document_id: &str, content: &str) -> Vec<Chunk> {
    if content.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= CHUNK_SIZE {
        return vec![Chunk {
            id: Uuid::new_v4().to_string(),
            section_id: section_id.to_string(),
            document_id: document_id.to_string(),
            text: content.to_string(),
            start_offset: 0,
            end_offset: chars.len(),
            order: 0,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut order = 0u32;
    let step = CHUNK_SIZE - CHUNK_OVERLAP;
    while start < chars.len() {
        let end = (start + CHUNK_SIZE).min(chars.len());
        let text: String = chars[start..end].iter().collect();
        chunks.push(Chunk {
            id: Uuid::new_v4().to_string(),
            section_id: section_id.to_string(),
            document_id: document_id.to_string(),
            text,
            start_offset: start,
            end_offset: end,
            order,
        });
        order += 1;
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn link_edge_type(link_type: LinkType) -> EdgeType {
    match link_type {
        LinkType::Citation(_) | LinkType::ReferenceDefinition => EdgeType::Cites,
        LinkType::Wikilink | LinkType::MarkdownLink => EdgeType::LinksTo,
    }
}

fn link_weight(link_type: LinkType) -> f32 {
    match link_type {
        LinkType::Wikilink => 0.85,
        LinkType::MarkdownLink => 0.9,
        LinkType::Citation(CitationKind::Numeric) => 0.8,
        LinkType::Citation(CitationKind::AuthorYear) => 0.9,
        LinkType::Citation(CitationKind::Bibtex) => 0.95,
        LinkType::ReferenceDefinition => 0.6,
    }
}

const DERIVATION_KEYWORDS: &[&str] = &["summary", "abstract", "notes", "translation", "digest"];

/// If `title` contains one of [`DERIVATION_KEYWORDS`] (case-insensitively),
/// returns the title with that keyword and the punctuation/whitespace
/// immediately around it removed, ready to substring-match against another
/// document's title. Returns `None` if no keyword is present.
pub fn strip_derivation_keyword(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    for keyword in DERIVATION_KEYWORDS {
        if let Some(pos) = lower.find(keyword) {
            let is_boundary = |c: char| c.is_whitespace() || matches!(c, '-' | ':' | '_' | ',');
            let before = title[..pos].trim_end_matches(is_boundary);
            let after = title[pos + keyword.len()..].trim_start_matches(is_boundary);
            let stripped = format!("{before} {after}");
            let trimmed = stripped.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn tag_node_id(label: &str) -> String {
    format!("tag:{}", label.to_lowercase())
}

fn external_ref_node_id(link_type: LinkType, target: &str) -> String {
    let prefix = match link_type {
        LinkType::Citation(_) | LinkType::ReferenceDefinition => "ref",
        LinkType::Wikilink | LinkType::MarkdownLink => "link",
    };
    format!("{prefix}:{}", target.to_lowercase())
}

/// Build the node/chunk/edge set for one parsed document. Does not consult
/// any store: resolving `LinksTo`/`Cites` targets against other documents
/// already in the corpus is the facade's job (it rewrites placeholder
/// `link:`/`ref:` node ids to real document ids when a match exists).
pub fn build_edges(parsed: &ParsedDocument) -> BuildResult {
    let mut nodes = Vec::new();
    let mut chunks = Vec::new();
    let mut edges: HashMap<(String, String, EdgeType), GraphEdge> = HashMap::new();
    let mut placeholder_nodes: HashMap<String, GraphNode> = HashMap::new();

    let mut insert_edge = |edge: GraphEdge| {
        let key = edge.dedup_key();
        edges
            .entry(key)
            .and_modify(|existing| {
                if edge.weight > existing.weight {
                    *existing = edge.clone();
                }
            })
            .or_insert(edge);
    };

    // Frontmatter/metadata tag set, stashed on the document node itself so
    // the facade's semantic-tagging pass (rule 4) can compare two documents'
    // tag sets without re-parsing metadata neither store retains otherwise.
    let metadata_tags: Vec<String> = parsed
        .document
        .metadata
        .as_object()
        .and_then(|o| o.get("tags"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| s.to_lowercase())).collect())
        .unwrap_or_default();

    nodes.push(GraphNode {
        id: parsed.document.id.clone(),
        kind: NodeKind::Document,
        label: parsed
            .document
            .title
            .clone()
            .unwrap_or_else(|| parsed.document.id.clone()),
        properties: serde_json::json!({ "contentHash": parsed.document.content_hash, "tags": metadata_tags }),
        embedding_id: None,
        created_at: parsed.document.created_at,
    });

    for section in &parsed.sections {
        nodes.push(GraphNode {
            id: section.id.clone(),
            kind: NodeKind::Section,
            label: section.heading.clone().unwrap_or_else(|| "untitled".to_string()),
            properties: serde_json::json!({ "level": section.level, "order": section.order }),
            embedding_id: None,
            created_at: parsed.document.created_at,
        });
        insert_edge(new_edge(&parsed.document.id, &section.id, EdgeType::Contains, 1.0));

        let section_chunks = chunk_section(&section.id, &parsed.document.id, &section.content);
        for chunk in &section_chunks {
            nodes.push(GraphNode {
                id: chunk.id.clone(),
                kind: NodeKind::Chunk,
                label: chunk.text.chars().take(60).collect(),
                properties: serde_json::json!({ "order": chunk.order }),
                embedding_id: None,
                created_at: parsed.document.created_at,
            });
            insert_edge(new_edge(&section.id, &chunk.id, EdgeType::Contains, 1.0));
        }
        chunks.extend(section_chunks);

        for tag_match in tag_re().captures_iter(&section.content) {
            let label = tag_match.get(1).unwrap().as_str();
            let tag_id = tag_node_id(label);
            placeholder_nodes.entry(tag_id.clone()).or_insert_with(|| GraphNode {
                id: tag_id.clone(),
                kind: NodeKind::Tag,
                label: label.to_string(),
                properties: serde_json::Value::Null,
                embedding_id: None,
                created_at: Utc::now(),
            });
            insert_edge(new_edge(&section.id, &tag_id, EdgeType::TaggedWith, 1.0));
        }
    }

    for link in &parsed.links {
        let target_id = external_ref_node_id(link.link_type, &link.target);
        placeholder_nodes
            .entry(target_id.clone())
            .or_insert_with(|| GraphNode {
                id: target_id.clone(),
                kind: NodeKind::Tag,
                label: link.target.clone(),
                properties: serde_json::json!({ "unresolved": true, "context": link.context }),
                embedding_id: None,
                created_at: Utc::now(),
            });
        insert_edge(new_edge(
            &link.section_id,
            &target_id,
            link_edge_type(link.link_type),
            link_weight(link.link_type),
        ));
    }

    // `DerivedFrom` (rule 5) needs another document's title to match
    // against, so it can't be decided from this document alone; the facade
    // resolves it against the rest of the corpus via
    // `strip_derivation_keyword` once it holds the store lock.

    nodes.extend(placeholder_nodes.into_values());

    BuildResult {
        nodes,
        chunks,
        edges: edges.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentType;
    use crate::parser::parse;

    #[test]
    fn hierarchy_edges_connect_document_through_chunks() {
        let parsed = parse("# Title\nsome short body", DocumentType::Markdown, None).unwrap();
        let result = build_edges(&parsed);
        assert!(result
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::Contains && e.from == parsed.document.id));
        assert!(!result.chunks.is_empty());
    }

    #[test]
    fn long_section_is_chunked_with_overlap() {
        let body = "word ".repeat(400);
        let parsed = parse(&body, DocumentType::Text, None).unwrap();
        let result = build_edges(&parsed);
        assert!(result.chunks.len() > 1);
        assert_eq!(result.chunks[0].end_offset - result.chunks[1].start_offset, 50);
    }

    #[test]
    fn wikilink_creates_links_to_edge_and_placeholder_node() {
        let parsed = parse("see [[Other Doc]] for context", DocumentType::Text, None).unwrap();
        let result = build_edges(&parsed);
        assert!(result
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::LinksTo));
        assert!(result
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::Tag && n.label == "Other Doc"));
    }

    #[test]
    fn hashtag_creates_tagged_with_edge() {
        let parsed = parse("this is about #budgeting and savings", DocumentType::Text, None).unwrap();
        let result = build_edges(&parsed);
        assert!(result
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::TaggedWith));
    }

    #[test]
    fn duplicate_links_dedup_to_max_weight() {
        let parsed = parse(
            "[[Same Target]] appears twice: [[Same Target]]",
            DocumentType::Text,
            None,
        )
        .unwrap();
        let result = build_edges(&parsed);
        let matching: Vec<_> = result
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::LinksTo)
            .collect();
        assert_eq!(matching.len(), 1);
    }

    #[test]
    fn strip_derivation_keyword_finds_remainder() {
        assert_eq!(
            strip_derivation_keyword("Summary of Quarterly Report").as_deref(),
            Some("of Quarterly Report")
        );
        assert_eq!(
            strip_derivation_keyword("Quarterly Report: Notes").as_deref(),
            Some("Quarterly Report")
        );
        assert_eq!(strip_derivation_keyword("Quarterly Report"), None);
    }
}
