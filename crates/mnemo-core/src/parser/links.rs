//! Link detection: wikilinks, markdown links, citations, and reference
//! definitions, each carried with a short context window for the graph
//! builder to attach to the edge it creates.

use regex::Regex;
use std::sync::OnceLock;

const CONTEXT_RADIUS: usize = 50;

/// Which of the three citation forms matched, since each carries its own
/// edge weight downstream (numeric 0.8, author-year 0.9, bibtex 0.95).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    /// A bare numeric marker like `[1]`.
    Numeric,
    /// `(Author, Year)`.
    AuthorYear,
    /// `[@key]`.
    Bibtex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// `[[target]]` or `[[target|alias]]`
    Wikilink,
    /// `[text](url)`
    MarkdownLink,
    /// `[@key]`, `(Author, Year)`, or a numeric marker like `[1]`
    Citation(CitationKind),
    /// `[id]: url` reference-style link definition
    ReferenceDefinition,
}

#[derive(Debug, Clone)]
pub struct DetectedLink {
    pub section_id: String,
    pub link_type: LinkType,
    pub target: String,
    /// Up to [`CONTEXT_RADIUS`] characters of surrounding text on each side.
    pub context: String,
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").unwrap())
}

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)(?:\s+\"[^\"]*\")?\)").unwrap())
}

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[@([A-Za-z0-9_:-]+)\]|\(([A-Z][A-Za-z'-]+(?:\s+(?:&|and)\s+[A-Z][A-Za-z'-]+)?,?\s+\d{4}[a-z]?)\)|\[(\d{1,3})\]",
        )
        .unwrap()
    })
}

fn reference_definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*\[([^\]]+)\]:\s*(\S+)").unwrap())
}

fn context_window(text: &str, start: usize, end: usize) -> String {
    let before_start = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_RADIUS)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let after_end = text[end..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[before_start..after_end].trim().to_string()
}

/// Find every link-like construct in `content`, each tagged with
/// `section_id` for the caller to attribute edges to.
pub fn detect_links(content: &str, section_id: &str) -> Vec<DetectedLink> {
    let mut links = Vec::new();

    for m in reference_definition_re().captures_iter(content) {
        let whole = m.get(0).unwrap();
        links.push(DetectedLink {
            section_id: section_id.to_string(),
            link_type: LinkType::ReferenceDefinition,
            target: m.get(2).unwrap().as_str().to_string(),
            context: context_window(content, whole.start(), whole.end()),
        });
    }

    for m in wikilink_re().captures_iter(content) {
        let whole = m.get(0).unwrap();
        links.push(DetectedLink {
            section_id: section_id.to_string(),
            link_type: LinkType::Wikilink,
            target: m.get(1).unwrap().as_str().trim().to_string(),
            context: context_window(content, whole.start(), whole.end()),
        });
    }

    for m in markdown_link_re().captures_iter(content) {
        let whole = m.get(0).unwrap();
        links.push(DetectedLink {
            section_id: section_id.to_string(),
            link_type: LinkType::MarkdownLink,
            target: m.get(2).unwrap().as_str().to_string(),
            context: context_window(content, whole.start(), whole.end()),
        });
    }

    for m in citation_re().captures_iter(content) {
        let whole = m.get(0).unwrap();
        let (kind, target) = if let Some(g) = m.get(1) {
            (CitationKind::Bibtex, g.as_str().to_string())
        } else if let Some(g) = m.get(2) {
            (CitationKind::AuthorYear, g.as_str().to_string())
        } else {
            (CitationKind::Numeric, m.get(3).map(|g| g.as_str().to_string()).unwrap_or_default())
        };
        links.push(DetectedLink {
            section_id: section_id.to_string(),
            link_type: LinkType::Citation(kind),
            target,
            context: context_window(content, whole.start(), whole.end()),
        });
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wikilink() {
        let links = detect_links("see [[Other Page]] for more", "s1");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Wikilink);
        assert_eq!(links[0].target, "Other Page");
    }

    #[test]
    fn detects_wikilink_with_alias() {
        let links = detect_links("see [[target|Display Text]]", "s1");
        assert_eq!(links[0].target, "target");
    }

    #[test]
    fn detects_markdown_link() {
        let links = detect_links("read [the docs](https://example.com/x)", "s1");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::MarkdownLink);
        assert_eq!(links[0].target, "https://example.com/x");
    }

    #[test]
    fn detects_pandoc_style_citation() {
        let links = detect_links("as shown [@smith2020]", "s1");
        assert_eq!(links[0].link_type, LinkType::Citation(CitationKind::Bibtex));
        assert_eq!(links[0].target, "smith2020");
    }

    #[test]
    fn detects_author_year_citation() {
        let links = detect_links("prior work (Smith, 2020) found", "s1");
        assert!(links
            .iter()
            .any(|l| l.link_type == LinkType::Citation(CitationKind::AuthorYear) && l.target.contains("2020")));
    }

    #[test]
    fn detects_numeric_citation_marker() {
        let links = detect_links("see [1] for details", "s1");
        assert!(links
            .iter()
            .any(|l| l.link_type == LinkType::Citation(CitationKind::Numeric) && l.target == "1"));
    }

    #[test]
    fn detects_reference_definition() {
        let links = detect_links("[ref1]: https://example.com", "s1");
        assert_eq!(links[0].link_type, LinkType::ReferenceDefinition);
        assert_eq!(links[0].target, "https://example.com");
    }

    #[test]
    fn context_window_is_bounded() {
        let long = "a".repeat(200) + "[[Target]]" + &"b".repeat(200);
        let links = detect_links(&long, "s1");
        assert!(links[0].context.len() < 200);
    }
}
