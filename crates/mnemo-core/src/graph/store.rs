//! Persistent property graph store (C5) backed by SQLite.
//!
//! A writer and a reader connection each sit behind their own `Mutex`, so
//! `GraphStore` is `Send + Sync` and callers can hold it behind
//! `Arc<GraphStore>` rather than `Arc<Mutex<GraphStore>>`.

use super::migrations::run_migrations;
use super::query::{parse_query, QueryAst, QueryError, WhereOp};
use super::GraphError;
use crate::model::{EdgeType, GraphEdge, GraphNode, NodeKind};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

type Result<T> = super::Result<T>;

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}

/// A node reached during a k-hop traversal, with the edge that reached it
/// and the hop distance from the origin.
#[derive(Debug, Clone)]
pub struct RelatedNode {
    pub node: GraphNode,
    pub via_edge: GraphEdge,
    pub depth: u32,
}

pub struct GraphStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl GraphStore {
    /// Open (or create) a graph store at `path`, or an in-memory one when
    /// `path` is `None`.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let (writer, reader) = match path {
            Some(p) => {
                if let Some(parent) = p.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        GraphError::Migration(format!("failed to create store directory: {e}"))
                    })?;
                    #[cfg(unix)]
                    {
                        use std::os::unix::fs::PermissionsExt;
                        let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
                    }
                }
                (Connection::open(p)?, Connection::open(p)?)
            }
            None => (Connection::open_in_memory()?, Connection::open_in_memory()?),
        };

        configure_connection(&writer)?;
        configure_connection(&reader)?;
        run_migrations(&writer).map_err(|e| GraphError::Migration(e.to_string()))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(None)
    }

    /// Insert a node. Inserting a node with an id that already exists
    /// overwrites it (idempotent re-ingestion).
    pub fn add_node(&self, node: &GraphNode) -> Result<()> {
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT INTO graph_nodes (id, kind, label, properties, embedding_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                label = excluded.label,
                properties = excluded.properties,
                embedding_id = excluded.embedding_id",
            params![
                node.id,
                node.kind.to_string(),
                node.label,
                node.properties.to_string(),
                node.embedding_id,
                node.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert an edge, deduplicating on `(from, to, type)` by keeping the
    /// higher weight — mirrors the graph builder's own dedup rule so a
    /// direct store write can't bypass it.
    pub fn add_edge(&self, edge: &GraphEdge) -> Result<()> {
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT INTO graph_edges (id, from_id, to_id, edge_type, weight, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(from_id, to_id, edge_type) DO UPDATE SET
                weight = MAX(weight, excluded.weight),
                metadata = excluded.metadata",
            params![
                edge.id,
                edge.from,
                edge.to,
                edge.edge_type.to_string(),
                edge.weight,
                edge.metadata.to_string(),
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Result<GraphNode> {
        let conn = self.reader.lock().unwrap();
        conn.query_row(
            "SELECT id, kind, label, properties, embedding_id, created_at FROM graph_nodes WHERE id = ?1",
            params![id],
            row_to_node,
        )
        .optional()?
        .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }

    pub fn find_node_by_content_hash(&self, hash: &str) -> Result<Option<String>> {
        let conn = self.reader.lock().unwrap();
        conn.query_row(
            "SELECT document_id FROM content_hashes WHERE content_hash = ?1",
            params![hash],
            |r| r.get(0),
        )
        .optional()
        .map_err(GraphError::from)
    }

    pub fn record_content_hash(&self, hash: &str, document_id: &str) -> Result<()> {
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO content_hashes (content_hash, document_id) VALUES (?1, ?2)",
            params![hash, document_id],
        )?;
        Ok(())
    }

    /// Delete a node and, via `ON DELETE CASCADE`, every edge touching it.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        let conn = self.writer.lock().unwrap();
        let affected = conn.execute("DELETE FROM graph_nodes WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(GraphError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Breadth-first traversal up to `max_depth` hops, optionally filtered
    /// to a single edge type. Ordering at each level is edge weight
    /// descending then target id ascending; a visited set prevents cycles
    /// from producing duplicate or infinite results.
    pub fn find_related(
        &self,
        origin: &str,
        max_depth: u32,
        edge_type_filter: Option<EdgeType>,
    ) -> Result<Vec<RelatedNode>> {
        let conn = self.reader.lock().unwrap();
        let mut visited: HashSet<String> = HashSet::from([origin.to_string()]);
        let mut frontier: VecDeque<(String, u32)> = VecDeque::from([(origin.to_string(), 0)]);
        let mut results = Vec::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }

            let mut stmt = conn.prepare(
                "SELECT e.id, e.from_id, e.to_id, e.edge_type, e.weight, e.metadata, e.created_at,
                        n.id, n.kind, n.label, n.properties, n.embedding_id, n.created_at
                 FROM graph_edges e JOIN graph_nodes n ON n.id = e.to_id
                 WHERE e.from_id = ?1
                 ORDER BY e.weight DESC, n.id ASC",
            )?;
            let rows = stmt.query_map(params![current], |row| {
                let edge = GraphEdge {
                    id: row.get(0)?,
                    from: row.get(1)?,
                    to: row.get(2)?,
                    edge_type: EdgeType::from_str(&row.get::<_, String>(3)?)
                        .unwrap_or(EdgeType::Custom),
                    weight: row.get(4)?,
                    metadata: serde_json::from_str(&row.get::<_, String>(5)?)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: parse_ts(&row.get::<_, String>(6)?),
                };
                let node = GraphNode {
                    id: row.get(7)?,
                    kind: NodeKind::from_str(&row.get::<_, String>(8)?)
                        .unwrap_or(NodeKind::Chunk),
                    label: row.get(9)?,
                    properties: serde_json::from_str(&row.get::<_, String>(10)?)
                        .unwrap_or(serde_json::Value::Null),
                    embedding_id: row.get(11)?,
                    created_at: parse_ts(&row.get::<_, String>(12)?),
                };
                Ok((edge, node))
            })?;

            for row in rows {
                let (edge, node) = row?;
                if let Some(filter) = edge_type_filter {
                    if edge.edge_type != filter {
                        continue;
                    }
                }
                if visited.contains(&node.id) {
                    continue;
                }
                visited.insert(node.id.clone());
                frontier.push_back((node.id.clone(), depth + 1));
                results.push(RelatedNode {
                    node,
                    via_edge: edge,
                    depth: depth + 1,
                });
            }
        }

        Ok(results)
    }

    /// Like [`Self::find_related`] but walks edges backwards: from `origin`,
    /// follows every edge that points *at* the current node rather than
    /// away from it. Used by the pyramid overlay's `getChildren`, since
    /// `AlignsTo` edges point child -> parent and children are discovered
    /// by walking against that direction.
    pub fn find_incoming_related(
        &self,
        origin: &str,
        max_depth: u32,
        edge_type_filter: Option<EdgeType>,
    ) -> Result<Vec<RelatedNode>> {
        let conn = self.reader.lock().unwrap();
        let mut visited: HashSet<String> = HashSet::from([origin.to_string()]);
        let mut frontier: VecDeque<(String, u32)> = VecDeque::from([(origin.to_string(), 0)]);
        let mut results = Vec::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }

            let mut stmt = conn.prepare(
                "SELECT e.id, e.from_id, e.to_id, e.edge_type, e.weight, e.metadata, e.created_at,
                        n.id, n.kind, n.label, n.properties, n.embedding_id, n.created_at
                 FROM graph_edges e JOIN graph_nodes n ON n.id = e.from_id
                 WHERE e.to_id = ?1
                 ORDER BY e.weight DESC, n.id ASC",
            )?;
            let rows = stmt.query_map(params![current], |row| {
                let edge = GraphEdge {
                    id: row.get(0)?,
                    from: row.get(1)?,
                    to: row.get(2)?,
                    edge_type: EdgeType::from_str(&row.get::<_, String>(3)?)
                        .unwrap_or(EdgeType::Custom),
                    weight: row.get(4)?,
                    metadata: serde_json::from_str(&row.get::<_, String>(5)?)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: parse_ts(&row.get::<_, String>(6)?),
                };
                let node = row_to_node_at(row, 7)?;
                Ok((edge, node))
            })?;

            for row in rows {
                let (edge, node) = row?;
                if let Some(filter) = edge_type_filter {
                    if edge.edge_type != filter {
                        continue;
                    }
                }
                if visited.contains(&node.id) {
                    continue;
                }
                visited.insert(node.id.clone());
                frontier.push_back((node.id.clone(), depth + 1));
                results.push(RelatedNode {
                    node,
                    via_edge: edge,
                    depth: depth + 1,
                });
            }
        }

        Ok(results)
    }

    /// Execute one of the two supported Cypher-subset shapes.
    pub fn query(&self, query: &str) -> Result<Vec<std::collections::HashMap<String, GraphNode>>> {
        let ast = parse_query(query).map_err(map_query_error)?;
        match &ast.edge {
            None => self.execute_single_node(&ast),
            Some(_) => self.execute_one_hop(&ast),
        }
    }

    fn execute_single_node(
        &self,
        ast: &QueryAst,
    ) -> Result<Vec<std::collections::HashMap<String, GraphNode>>> {
        let conn = self.reader.lock().unwrap();
        let mut sql = "SELECT id, kind, label, properties, embedding_id, created_at FROM graph_nodes".to_string();
        let mut clauses = Vec::new();
        if let Some(label) = &ast.node_label {
            clauses.push(format!("kind = '{}'", label.replace('\'', "''")));
        }
        if let Some(w) = &ast.where_clause {
            if w.variable != ast.node_var {
                return Err(GraphError::InvalidArgument(format!(
                    "WHERE references unbound variable {}",
                    w.variable
                )));
            }
            clauses.push(where_sql(w)?);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_node)?;
        let mut out = Vec::new();
        for row in rows {
            let node = row?;
            let mut map = std::collections::HashMap::new();
            map.insert(ast.node_var.clone(), node);
            out.push(map);
        }
        Ok(out)
    }

    fn execute_one_hop(
        &self,
        ast: &QueryAst,
    ) -> Result<Vec<std::collections::HashMap<String, GraphNode>>> {
        let edge = ast.edge.as_ref().unwrap();
        let conn = self.reader.lock().unwrap();
        let mut sql = "SELECT n.id, n.kind, n.label, n.properties, n.embedding_id, n.created_at,
                              m.id, m.kind, m.label, m.properties, m.embedding_id, m.created_at
                       FROM graph_edges e
                       JOIN graph_nodes n ON n.id = e.from_id
                       JOIN graph_nodes m ON m.id = e.to_id"
            .to_string();
        let mut clauses = Vec::new();
        if let Some(label) = &ast.node_label {
            clauses.push(format!("n.kind = '{}'", label.replace('\'', "''")));
        }
        if let Some(edge_type) = &edge.edge_type {
            clauses.push(format!("e.edge_type = '{}'", edge_type.replace('\'', "''")));
        }
        if let Some(w) = &ast.where_clause {
            let prefix = if w.variable == ast.node_var {
                "n"
            } else if w.variable == edge.target_var {
                "m"
            } else {
                return Err(GraphError::InvalidArgument(format!(
                    "WHERE references unbound variable {}",
                    w.variable
                )));
            };
            clauses.push(where_sql_prefixed(w, prefix)?);
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY e.weight DESC, n.id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let n = row_to_node_at(row, 0)?;
            let m = row_to_node_at(row, 6)?;
            Ok((n, m))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (n, m) = row?;
            let mut map = std::collections::HashMap::new();
            map.insert(ast.node_var.clone(), n);
            map.insert(edge.target_var.clone(), m);
            out.push(map);
        }
        Ok(out)
    }

    /// All nodes of one kind, ordered by id ascending. Used by the pyramid
    /// overlay to list entities without going through the Cypher subset
    /// (which only supports a single `label` predicate, not kind + extra
    /// property filtering).
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<GraphNode>> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, label, properties, embedding_id, created_at FROM graph_nodes WHERE kind = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([kind.to_string()], row_to_node)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn node_count(&self) -> Result<u64> {
        let conn = self.reader.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM graph_nodes", [], |r| r.get::<_, i64>(0))? as u64)
    }

    pub fn edge_count(&self) -> Result<u64> {
        let conn = self.reader.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM graph_edges", [], |r| r.get::<_, i64>(0))? as u64)
    }
}

fn where_sql(w: &super::query::WhereClause) -> Result<String> {
    where_sql_prefixed(w, "")
}

fn where_sql_prefixed(w: &super::query::WhereClause, prefix: &str) -> Result<String> {
    let col = if prefix.is_empty() {
        "label".to_string()
    } else {
        format!("{prefix}.label")
    };
    // Only `label` is queryable today; richer property predicates are a
    // follow-up once `properties` gets indexed JSON extraction.
    if w.property != "label" {
        return Err(GraphError::InvalidArgument(format!(
            "only the `label` property is queryable in WHERE, got `{}`",
            w.property
        )));
    }
    let escaped = w.value.replace('\'', "''");
    Ok(match w.op {
        WhereOp::Eq => format!("{col} = '{escaped}'"),
        WhereOp::Contains => format!("{col} LIKE '%{escaped}%'"),
    })
}

fn map_query_error(e: QueryError) -> GraphError {
    match e {
        QueryError::Unsupported(msg) => GraphError::InvalidArgument(msg),
        QueryError::Execution(msg) => GraphError::InvalidArgument(msg),
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<GraphNode> {
    row_to_node_at(row, 0)
}

fn row_to_node_at(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<GraphNode> {
    Ok(GraphNode {
        id: row.get(offset)?,
        kind: NodeKind::from_str(&row.get::<_, String>(offset + 1)?).unwrap_or(NodeKind::Chunk),
        label: row.get(offset + 2)?,
        properties: serde_json::from_str(&row.get::<_, String>(offset + 3)?)
            .unwrap_or(serde_json::Value::Null),
        embedding_id: row.get(offset + 4)?,
        created_at: parse_ts(&row.get::<_, String>(offset + 5)?),
    })
}
