//! Minimal YAML-frontmatter extraction.
//!
//! Only flat `key: value` scalar pairs between a leading `---`/`---` fence
//! are understood; nested maps/sequences pass through as raw strings rather
//! than erroring, since a retrieval engine cares about recovering `title`/
//! `tags`-style metadata, not round-tripping arbitrary YAML.

/// Split `raw` into `(frontmatter as JSON object, remaining body)`. Returns
/// `(Value::Null, raw)` unchanged when there's no frontmatter fence.
pub fn parse_frontmatter(raw: &str) -> (serde_json::Value, &str) {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with("---") {
        return (serde_json::Value::Null, raw);
    }

    let after_fence = &trimmed[3..];
    let Some(end) = after_fence.find("\n---") else {
        return (serde_json::Value::Null, raw);
    };

    let block = &after_fence[..end];
    let body_start_in_trimmed = trimmed.len() - after_fence.len() + end + 4;
    let body = trimmed[body_start_in_trimmed..].trim_start_matches('\n');

    let mut map = serde_json::Map::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().trim_matches('"').to_string();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }
            map.insert(key, parse_scalar(value));
        }
    }

    (serde_json::Value::Object(map), body)
}

fn parse_scalar(value: &str) -> serde_json::Value {
    let value = value.trim().trim_matches('"').trim_matches('\'');
    if value.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(b) = value.parse::<bool>() {
        return serde_json::Value::Bool(b);
    }
    if let Ok(n) = value.parse::<i64>() {
        return serde_json::Value::Number(n.into());
    }
    if let Ok(f) = value.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    if value.starts_with('[') && value.ends_with(']') {
        let items: Vec<serde_json::Value> = value[1..value.len() - 1]
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(parse_scalar)
            .collect();
        return serde_json::Value::Array(items);
    }
    serde_json::Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_fence_returns_whole_body() {
        let (front, body) = parse_frontmatter("# just markdown");
        assert!(front.is_null());
        assert_eq!(body, "# just markdown");
    }

    #[test]
    fn extracts_scalar_fields() {
        let raw = "---\ntitle: My Doc\ncount: 3\npublished: true\n---\nbody here";
        let (front, body) = parse_frontmatter(raw);
        assert_eq!(front["title"], "My Doc");
        assert_eq!(front["count"], 3);
        assert_eq!(front["published"], true);
        assert_eq!(body.trim(), "body here");
    }

    #[test]
    fn extracts_inline_array() {
        let raw = "---\ntags: [a, b, c]\n---\nbody";
        let (front, _) = parse_frontmatter(raw);
        assert_eq!(front["tags"], serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn unterminated_fence_falls_back_to_raw() {
        let raw = "---\ntitle: oops\nno closing fence";
        let (front, body) = parse_frontmatter(raw);
        assert!(front.is_null());
        assert_eq!(body, raw);
    }
}
