//! Schema migrations for the graph store, applied sequentially against a
//! `schema_version` tracking table.

/// One forward-only schema migration.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS graph_nodes (
    id              TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    label           TEXT NOT NULL,
    properties      TEXT NOT NULL DEFAULT '{}',
    embedding_id    TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_graph_nodes_kind ON graph_nodes(kind);
CREATE INDEX IF NOT EXISTS idx_graph_nodes_label ON graph_nodes(label);

CREATE TABLE IF NOT EXISTS graph_edges (
    id              TEXT PRIMARY KEY,
    from_id         TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
    to_id           TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
    edge_type       TEXT NOT NULL,
    weight          REAL NOT NULL DEFAULT 1.0,
    metadata        TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL,
    UNIQUE(from_id, to_id, edge_type)
);

CREATE INDEX IF NOT EXISTS idx_graph_edges_from ON graph_edges(from_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_to ON graph_edges(to_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_type ON graph_edges(edge_type);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL
);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS content_hashes (
    content_hash    TEXT PRIMARY KEY,
    document_id     TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create graph_nodes, graph_edges, schema_version",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "create content_hashes for duplicate-id detection",
        up: MIGRATION_V2_UP,
    },
];

/// Apply every migration whose version exceeds the current `schema_version`
/// max, in order, inside one transaction.
pub fn run_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
    )?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        conn.execute_batch(migration.up)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(version = migration.version, desc = migration.description, "applied migration");
    }

    Ok(())
}
