//! SQLite database management: open/init, the sqlite-vec extension, the
//! vector-table lifecycle, and the `meta` key-value store.

pub mod schema;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Once;

use crate::error::{Error, Result, StorageContext};

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the index database at `path`, with the extension loaded,
/// pragmas applied, and the schema initialized. If an embedding dimension was
/// persisted by a previous run, the vector table is recreated to match.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path).storage_context("open database")?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .storage_context("set journal_mode")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .storage_context("set foreign_keys")?;
    conn.pragma_update(None, "busy_timeout", "5000")
        .storage_context("set busy_timeout")?;

    schema::init_schema(&conn)?;

    if let Some(dim) = get_embedding_dim(&conn)? {
        create_vec_table(&conn, dim)?;
    }

    tracing::debug!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with the schema applied. Used by tests.
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().storage_context("open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .storage_context("set foreign_keys")?;
    schema::init_schema(&conn)?;
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Vector table lifecycle
// ---------------------------------------------------------------------------

/// Create the vec0 virtual table with the given embedding dimension.
/// Safe to call when the table already exists.
pub fn create_vec_table(conn: &Connection, dim: usize) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memories_vec USING vec0(
            rowid INTEGER PRIMARY KEY,
            embedding float[{dim}]
        )"
    ))
    .storage_context("create vec table")
}

/// True if the `memories_vec` table exists.
pub fn has_vec_table(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='memories_vec'",
            [],
            |row| row.get(0),
        )
        .storage_context("check vec table")?;
    Ok(count > 0)
}

/// Drop the `memories_vec` table if it exists.
pub fn drop_vec_table(conn: &Connection) -> Result<()> {
    conn.execute_batch("DROP TABLE IF EXISTS memories_vec")
        .storage_context("drop vec table")
}

/// Read the persisted embedding dimension from the meta table.
pub fn get_embedding_dim(conn: &Connection) -> Result<Option<usize>> {
    match get_meta(conn, "embedding_dim")? {
        Some(val) => {
            let dim = val
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("invalid embedding_dim in meta: {val}")))?;
            Ok(Some(dim))
        }
        None => Ok(None),
    }
}

/// Persist the embedding dimension in the meta table.
pub fn set_embedding_dim(conn: &Connection, dim: usize) -> Result<()> {
    set_meta(conn, "embedding_dim", &dim.to_string())
}

/// Ensure the vector table exists with the given dimension.
///
/// First write persists the dimension and creates the table; a matching
/// stored dimension is a no-op; a differing one fails with
/// [`Error::DimensionMismatch`].
pub fn ensure_vec_table(conn: &Connection, dim: usize) -> Result<()> {
    match get_embedding_dim(conn)? {
        None => {
            set_embedding_dim(conn, dim)?;
            create_vec_table(conn, dim)
        }
        Some(stored) if stored == dim => Ok(()),
        Some(stored) => Err(Error::DimensionMismatch { stored, got: dim }),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Result of a full database health check.
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub sqlite_vec_version: String,
    pub memory_count: i64,
    pub detail_count: i64,
    pub embedding_dim: Option<usize>,
    /// None when the vector table has not been created yet.
    pub vector_count: Option<i64>,
}

/// Run a comprehensive health check on the database.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .pragma_query_value(None, "integrity_check", |row| row.get(0))
        .storage_context("integrity check")?;
    let integrity_ok = integrity_details == "ok";

    let sqlite_vec_version: String = conn
        .query_row("SELECT vec_version()", [], |row| row.get(0))
        .storage_context("vec version")?;

    let memory_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap_or(0);
    let detail_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memory_details", [], |row| row.get(0))
        .unwrap_or(0);

    let vector_count = if has_vec_table(conn)? {
        Some(
            conn.query_row("SELECT COUNT(*) FROM memories_vec", [], |row| row.get(0))
                .unwrap_or(0),
        )
    } else {
        None
    };

    Ok(HealthReport {
        integrity_ok,
        integrity_details,
        sqlite_vec_version,
        memory_count,
        detail_count,
        embedding_dim: get_embedding_dim(conn)?,
        vector_count,
    })
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

/// Read a value from the meta table.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    use rusqlite::OptionalExtension;
    conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
    .storage_context("get meta")
}

/// Upsert a key-value pair in the meta table.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )
    .storage_context("set meta")?;
    Ok(())
}
