//! Heading-tree sectioning for markdown and plain text.

/// A section before it has been assigned an id; [`super::parse`] fills in
/// `document_id`/`order` and mints the id.
#[derive(Debug, Clone)]
pub struct RawSection {
    pub heading: Option<String>,
    pub level: u8,
    pub content: String,
}

/// Split markdown body text into sections at ATX (`#`..`######`) headings.
/// Content preceding the first heading becomes an untitled section (level
/// 0) when non-empty. Falls back to [`single_section`] when there are no
/// headings at all.
pub fn split_sections(body: &str) -> Vec<RawSection> {
    let mut sections = Vec::new();
    let mut current_heading: Option<String> = None;
    let mut current_level: u8 = 0;
    let mut current_lines: Vec<&str> = Vec::new();

    let flush = |heading: Option<String>, level: u8, lines: &mut Vec<&str>, out: &mut Vec<RawSection>| {
        let content = lines.join("\n").trim().to_string();
        if !content.is_empty() || heading.is_some() {
            out.push(RawSection {
                heading,
                level,
                content,
            });
        }
        lines.clear();
    };

    for line in body.lines() {
        if let Some((level, heading)) = parse_atx_heading(line) {
            flush(
                current_heading.take(),
                current_level,
                &mut current_lines,
                &mut sections,
            );
            current_heading = Some(heading);
            current_level = level;
        } else {
            current_lines.push(line);
        }
    }
    flush(current_heading, current_level, &mut current_lines, &mut sections);

    if sections.is_empty() {
        return single_section(body);
    }
    sections
}

/// Treat the entire body as one untitled section (used for plain text and
/// as the no-headings fallback for markdown).
pub fn single_section(body: &str) -> Vec<RawSection> {
    vec![RawSection {
        heading: None,
        level: 0,
        content: body.trim().to_string(),
    }]
}

fn parse_atx_heading(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        // e.g. "#tag" is not a heading.
        return None;
    }
    Some((hashes as u8, rest.trim().to_string()))
}
