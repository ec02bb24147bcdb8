//! Document Parser (C2): raw text + type tag -> structured document.
//!
//! Produces a heading-tree of [`Section`]s and a flat list of detected links
//! with surrounding context, which the graph builder (C3) turns into edges.
//! Malformed input never aborts ingestion: each stage degrades to the
//! simplest structure it can still produce (see `parse_markdown`'s fallback
//! to a single untitled section).

mod frontmatter;
mod links;
mod markdown;

pub use frontmatter::parse_frontmatter;
pub use links::{detect_links, CitationKind, DetectedLink, LinkType};

use crate::model::{Document, DocumentType, Section};
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Parsing never produces an error a caller can't recover from gracefully.
/// `Malformed` never escapes [`parse`] itself: malformed `json` falls back
/// to treating the body as plain text, matching `markdown`'s no-headings
/// fallback to a single untitled section.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("malformed {0}: {1}")]
    Malformed(String, String),
}

/// The output of parsing one raw input: the document record, its sections,
/// and every link detected across those sections.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: Document,
    pub sections: Vec<Section>,
    pub links: Vec<DetectedLink>,
}

fn normalize_for_hash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_for_hash(text).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse raw input of the given declared type into a document plus its
/// section tree and detected links.
pub fn parse(
    raw_text: &str,
    doc_type: DocumentType,
    source: Option<String>,
) -> Result<ParsedDocument, ParseError> {
    if raw_text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let (front, body) = parse_frontmatter(raw_text);
    let mut title = front
        .as_object()
        .and_then(|o| o.get("title"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let mut metadata = front;

    let sections = match doc_type {
        DocumentType::Markdown => markdown::split_sections(body),
        DocumentType::Text => markdown::single_section(body),
        DocumentType::Json => match parse_json_sections(body) {
            Ok((sections, extracted_title, custom)) => {
                title = title.or(extracted_title);
                metadata = custom;
                sections
            }
            Err(_) => markdown::single_section(body),
        },
        DocumentType::Jsonl => parse_jsonl_sections(body, &mut metadata),
    };

    let document_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let document = Document {
        id: document_id.clone(),
        doc_type,
        content: raw_text.to_string(),
        content_hash: content_hash(raw_text),
        title,
        source,
        metadata,
        created_at: now,
        updated_at: now,
    };

    let mut built_sections = Vec::with_capacity(sections.len());
    let mut links = Vec::new();
    for (order, s) in sections.into_iter().enumerate() {
        let section_id = Uuid::new_v4().to_string();
        links.extend(detect_links(&s.content, &section_id));
        built_sections.push(Section {
            id: section_id,
            document_id: document_id.clone(),
            heading: s.heading,
            level: s.level,
            content: s.content,
            order: order as u32,
        });
    }

    Ok(ParsedDocument {
        document,
        sections: built_sections,
        links,
    })
}

const TITLE_FIELDS: &[&str] = &["title", "name"];
const CONTENT_FIELDS: &[&str] = &["text", "content", "summary"];

/// First matching field's string value, in priority order.
fn first_str_field(obj: &serde_json::Map<String, serde_json::Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| obj.get(*f)).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// For `json`: title from `title`/`name`, content from `text`/`content`/
/// `summary`, every field retained in the returned custom map. Non-object
/// JSON (arrays, scalars) has no fields to extract from, so it falls back to
/// a pretty-printed dump of the whole value with no extracted title.
fn parse_json_sections(
    body: &str,
) -> std::result::Result<(Vec<markdown::RawSection>, Option<String>, serde_json::Value), ParseError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ParseError::Malformed("json".into(), e.to_string()))?;

    let Some(obj) = value.as_object() else {
        let content = serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string());
        return Ok((
            vec![markdown::RawSection { heading: None, level: 0, content }],
            None,
            serde_json::Value::Null,
        ));
    };

    let title = first_str_field(obj, TITLE_FIELDS);
    let content = first_str_field(obj, CONTENT_FIELDS)
        .unwrap_or_else(|| serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()));

    Ok((
        vec![markdown::RawSection { heading: None, level: 0, content }],
        title,
        value,
    ))
}

/// For `jsonl`: each line's object is reduced to its content field the same
/// way `json` is, and every line's content is concatenated with a blank line
/// between records. Lines that aren't valid JSON are kept verbatim so one bad
/// line can't take down the whole document. The parsed item list is stashed
/// under `items` in `metadata` (replacing or extending whatever frontmatter
/// already put there).
fn parse_jsonl_sections(body: &str, metadata: &mut serde_json::Value) -> Vec<markdown::RawSection> {
    let mut pieces = Vec::new();
    let mut items = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => {
                let piece = value
                    .as_object()
                    .and_then(|obj| first_str_field(obj, CONTENT_FIELDS))
                    .unwrap_or_else(|| serde_json::to_string_pretty(&value).unwrap_or_else(|_| line.to_string()));
                pieces.push(piece);
                items.push(value);
            }
            Err(_) => pieces.push(line.to_string()),
        }
    }

    let mut map = metadata.as_object().cloned().unwrap_or_default();
    map.insert("items".to_string(), serde_json::Value::Array(items));
    *metadata = serde_json::Value::Object(map);

    vec![markdown::RawSection {
        heading: None,
        level: 0,
        content: pieces.join("\n\n"),
    }]
}
