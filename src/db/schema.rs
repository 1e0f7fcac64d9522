//! SQL DDL for the relational schema.
//!
//! Defines `memories`, `memory_details`, `meta`, and the external-content
//! `memories_fts` FTS5 index with its synchronization triggers. The
//! `memories_vec` vec0 table is created separately because its dimension is
//! only known once an embedding provider has produced a vector — see
//! [`crate::db::ensure_vec_table`].

use rusqlite::Connection;

use crate::error::{Result, StorageContext};

/// All static DDL. Idempotent (uses IF NOT EXISTS).
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    rowid          INTEGER PRIMARY KEY AUTOINCREMENT,
    id             TEXT UNIQUE NOT NULL,
    title          TEXT NOT NULL,
    what           TEXT NOT NULL,
    why            TEXT,
    impact         TEXT,
    tags           TEXT,
    category       TEXT,
    project        TEXT NOT NULL,
    source         TEXT,
    related_files  TEXT,
    file_path      TEXT NOT NULL,
    section_anchor TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    updated_count  INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS memory_details (
    memory_id TEXT PRIMARY KEY REFERENCES memories(id),
    body      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    title, what, why, impact, tags, category, project, source,
    content='memories', content_rowid='rowid',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, title, what, why, impact, tags, category, project, source)
    VALUES (new.rowid, new.title, new.what, new.why, new.impact, new.tags, new.category, new.project, new.source);
END;

CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, title, what, why, impact, tags, category, project, source)
    VALUES ('delete', old.rowid, old.title, old.what, old.why, old.impact, old.tags, old.category, old.project, old.source);
    INSERT INTO memories_fts(rowid, title, what, why, impact, tags, category, project, source)
    VALUES (new.rowid, new.title, new.what, new.why, new.impact, new.tags, new.category, new.project, new.source);
END;

CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, title, what, why, impact, tags, category, project, source)
    VALUES ('delete', old.rowid, old.title, old.what, old.why, old.impact, old.tags, old.category, old.project, old.source);
END;
"#;

/// Initialize all static tables and triggers.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
        .storage_context("init_schema")
}
