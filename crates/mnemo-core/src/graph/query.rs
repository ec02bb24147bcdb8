//! A deliberately tiny Cypher subset: exactly two shapes are understood.
//!
//! ```text
//! MATCH (n:<Type>) RETURN n
//! MATCH (n)-[r:<TYPE>]->(m) RETURN n, r, m
//! ```
//!
//! each optionally followed by `WHERE <var>.<property> = '<value>'` or
//! `WHERE <var>.<property> CONTAINS '<value>'`. Anything else is rejected
//! with [`QueryError::Unsupported`] rather than guessed at — this is a
//! deliberately small sublanguage, not a general graph query engine.

use regex::Regex;
use std::sync::OnceLock;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unsupported query: {0}")]
    Unsupported(String),
    #[error("query execution error: {0}")]
    Execution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOp {
    Eq,
    Contains,
}

#[derive(Debug, Clone)]
pub struct WhereClause {
    pub variable: String,
    pub property: String,
    pub op: WhereOp,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct EdgePattern {
    pub edge_var: Option<String>,
    pub edge_type: Option<String>,
    pub target_var: String,
}

/// The parsed form of one of the two supported MATCH shapes.
#[derive(Debug, Clone)]
pub struct QueryAst {
    pub node_var: String,
    pub node_label: Option<String>,
    pub edge: Option<EdgePattern>,
    pub where_clause: Option<WhereClause>,
    pub return_vars: Vec<String>,
}

fn one_hop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^MATCH\s*\(\s*(\w+)\s*(?::\s*(\w+))?\s*\)\s*-\s*\[\s*(\w+)?\s*(?::\s*(\w+))?\s*\]\s*->\s*\(\s*(\w+)\s*\)\s*(.*)$"#,
        )
        .unwrap()
    })
}

fn single_node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^MATCH\s*\(\s*(\w+)\s*(?::\s*(\w+))?\s*\)\s*(.*)$").unwrap())
}

fn where_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)WHERE\s+(\w+)\.(\w+)\s*(=|CONTAINS)\s*'([^']*)'"#).unwrap()
    })
}

fn return_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)RETURN\s+(.+)$").unwrap())
}

fn parse_tail(tail: &str) -> Result<(Option<WhereClause>, Vec<String>), QueryError> {
    let where_clause = if let Some(caps) = where_re().captures(tail) {
        let op = match caps.get(3).unwrap().as_str().to_uppercase().as_str() {
            "=" => WhereOp::Eq,
            "CONTAINS" => WhereOp::Contains,
            other => return Err(QueryError::Unsupported(format!("unsupported WHERE operator {other}"))),
        };
        Some(WhereClause {
            variable: caps.get(1).unwrap().as_str().to_string(),
            property: caps.get(2).unwrap().as_str().to_string(),
            op,
            value: caps.get(4).unwrap().as_str().to_string(),
        })
    } else {
        None
    };

    let Some(ret) = return_re().captures(tail) else {
        return Err(QueryError::Unsupported("query is missing a RETURN clause".into()));
    };
    let return_vars = ret
        .get(1)
        .unwrap()
        .as_str()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok((where_clause, return_vars))
}

/// Parse a query string against the two supported shapes.
pub fn parse_query(query: &str) -> Result<QueryAst, QueryError> {
    let query = query.trim();

    if let Some(caps) = one_hop_re().captures(query) {
        let (where_clause, return_vars) = parse_tail(caps.get(6).unwrap().as_str())?;
        return Ok(QueryAst {
            node_var: caps.get(1).unwrap().as_str().to_string(),
            node_label: caps.get(2).map(|m| m.as_str().to_string()),
            edge: Some(EdgePattern {
                edge_var: caps.get(3).map(|m| m.as_str().to_string()),
                edge_type: caps.get(4).map(|m| m.as_str().to_string()),
                target_var: caps.get(5).unwrap().as_str().to_string(),
            }),
            where_clause,
            return_vars,
        });
    }

    if let Some(caps) = single_node_re().captures(query) {
        let (where_clause, return_vars) = parse_tail(caps.get(3).unwrap().as_str())?;
        return Ok(QueryAst {
            node_var: caps.get(1).unwrap().as_str().to_string(),
            node_label: caps.get(2).map(|m| m.as_str().to_string()),
            edge: None,
            where_clause,
            return_vars,
        });
    }

    Err(QueryError::Unsupported(format!(
        "query does not match either supported MATCH shape: {query}"
    )))
}
