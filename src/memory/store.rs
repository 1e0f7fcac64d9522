//! Relational CRUD for memories: insert, fetch, merge-update, replace,
//! targeted and bulk deletion, and the reindex listing.
//!
//! ID arguments accept either a full UUID or a unique prefix; prefix
//! resolution always picks the lowest matching rowid. Deletion order is
//! details → vector → memory row, so the FTS trigger fires last and vector
//! rows never outlive their memory row.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::error::{Result, StorageContext};
use crate::memory::embedding_to_bytes;
use crate::memory::types::{Category, Memory, MemoryDetail, RawMemoryInput};

/// A memory row as fetched from the `memories` table.
#[derive(Debug, Clone)]
pub struct StoredMemory {
    pub rowid: i64,
    pub id: String,
    pub title: String,
    pub what: String,
    pub why: String,
    pub impact: String,
    pub tags: Vec<String>,
    pub category: Option<Category>,
    pub project: String,
    pub source: String,
    pub related_files: Vec<String>,
    pub file_path: String,
    pub section_anchor: String,
    pub created_at: String,
    pub updated_at: String,
    pub updated_count: i64,
    pub has_details: bool,
}

/// A row from the reindex listing, carrying only the embeddable fields.
#[derive(Debug, Clone)]
pub struct ReindexRow {
    pub rowid: i64,
    pub title: String,
    pub what: String,
    pub why: String,
    pub impact: String,
    pub tags: Vec<String>,
}

impl ReindexRow {
    /// The text embedded for this memory: title, what, why, impact, tags.
    pub fn embed_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.title,
            self.what,
            self.why,
            self.impact,
            self.tags.join(" ")
        )
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".into())
}

/// Parse a JSON array column, tolerating NULL and malformed content.
pub(crate) fn parse_string_array(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Resolve a full or prefix ID to `(id, rowid)`. When more than one record
/// matches, the lowest rowid wins.
pub fn resolve_id(conn: &Connection, id: &str) -> Result<Option<(String, i64)>> {
    conn.query_row(
        "SELECT id, rowid FROM memories WHERE id LIKE ?1 || '%' ORDER BY rowid LIMIT 1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .storage_context("resolve_id")
}

/// Insert a memory record and optional details body. Returns the new rowid.
pub fn insert_memory(conn: &mut Connection, mem: &Memory, details: &str) -> Result<i64> {
    let tx = conn.transaction().storage_context("insert_memory begin")?;

    tx.execute(
        "INSERT INTO memories (
            id, title, what, why, impact, tags, category, project,
            source, related_files, file_path, section_anchor,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            mem.id,
            mem.title,
            mem.what,
            mem.why,
            mem.impact,
            tags_json(&mem.tags),
            mem.category.map(|c| c.as_str()).unwrap_or(""),
            mem.project,
            mem.source,
            tags_json(&mem.related_files),
            mem.file_path,
            mem.section_anchor,
            rfc3339(mem.created_at),
            rfc3339(mem.updated_at),
        ],
    )
    .storage_context("insert_memory")?;

    let rowid = tx.last_insert_rowid();

    if !details.is_empty() {
        tx.execute(
            "INSERT INTO memory_details (memory_id, body) VALUES (?1, ?2)",
            params![mem.id, details],
        )
        .storage_context("insert_memory details")?;
    }

    tx.commit().storage_context("insert_memory commit")?;
    Ok(rowid)
}

/// Store an embedding vector for the given memory rowid. Silently skips when
/// the vector table does not exist.
pub fn insert_vector(conn: &Connection, rowid: i64, embedding: &[f32]) -> Result<()> {
    if !db::has_vec_table(conn)? {
        return Ok(());
    }
    conn.execute(
        "INSERT OR REPLACE INTO memories_vec (rowid, embedding) VALUES (?1, ?2)",
        params![rowid, embedding_to_bytes(embedding)],
    )
    .storage_context("insert_vector")?;
    Ok(())
}

/// Fetch a single memory by exact ID.
pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<StoredMemory>> {
    conn.query_row(
        "SELECT m.rowid, m.id, m.title, m.what, m.why, m.impact, m.tags, m.category,
                m.project, m.source, m.related_files, m.file_path, m.section_anchor,
                m.created_at, m.updated_at, m.updated_count,
                EXISTS(SELECT 1 FROM memory_details WHERE memory_id = m.id) AS has_details
         FROM memories m WHERE m.id = ?1",
        [id],
        read_stored_memory,
    )
    .optional()
    .storage_context("get_memory")
}

fn read_stored_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMemory> {
    let tags: Option<String> = row.get(6)?;
    let category: Option<String> = row.get(7)?;
    let related: Option<String> = row.get(10)?;
    Ok(StoredMemory {
        rowid: row.get(0)?,
        id: row.get(1)?,
        title: row.get(2)?,
        what: row.get(3)?,
        why: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        impact: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        tags: parse_string_array(tags),
        category: category.and_then(|c| c.parse().ok()),
        project: row.get(8)?,
        source: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        related_files: parse_string_array(related),
        file_path: row.get(11)?,
        section_anchor: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        updated_count: row.get(15)?,
        has_details: row.get(16)?,
    })
}

/// Fetch the details body for a memory by ID or prefix.
pub fn get_details(conn: &Connection, id: &str) -> Result<Option<MemoryDetail>> {
    let Some((full_id, _)) = resolve_id(conn, id)? else {
        return Ok(None);
    };
    conn.query_row(
        "SELECT memory_id, body FROM memory_details WHERE memory_id = ?1",
        [&full_id],
        |row| {
            Ok(MemoryDetail {
                memory_id: row.get(0)?,
                body: row.get(1)?,
            })
        },
    )
    .optional()
    .storage_context("get_details")
}

/// Merge-update an existing memory (prefix-matched ID). Empty string fields
/// are left untouched; `tags` replaces the stored set when given; a non-empty
/// `details_append` is appended to the existing body. Returns false when the
/// ID resolves to nothing.
pub fn update_memory(
    conn: &mut Connection,
    id: &str,
    what: &str,
    why: &str,
    impact: &str,
    tags: Option<&[String]>,
    details_append: &str,
) -> Result<bool> {
    let Some((full_id, _)) = resolve_id(conn, id)? else {
        return Ok(false);
    };

    let tx = conn.transaction().storage_context("update_memory begin")?;

    let mut sets = vec!["updated_count = updated_count + 1", "updated_at = ?"];
    let mut values: Vec<String> = vec![rfc3339(Utc::now())];

    if !what.is_empty() {
        sets.push("what = ?");
        values.push(what.to_string());
    }
    if !why.is_empty() {
        sets.push("why = ?");
        values.push(why.to_string());
    }
    if !impact.is_empty() {
        sets.push("impact = ?");
        values.push(impact.to_string());
    }
    if let Some(tags) = tags {
        sets.push("tags = ?");
        values.push(tags_json(tags));
    }
    values.push(full_id.clone());

    let sql = format!("UPDATE memories SET {} WHERE id = ?", sets.join(", "));
    tx.execute(&sql, rusqlite::params_from_iter(values.iter()))
        .storage_context("update_memory")?;

    if !details_append.is_empty() {
        let existing: Option<String> = tx
            .query_row(
                "SELECT body FROM memory_details WHERE memory_id = ?1",
                [&full_id],
                |row| row.get(0),
            )
            .optional()
            .storage_context("update_memory read details")?;
        match existing {
            Some(body) => {
                tx.execute(
                    "UPDATE memory_details SET body = ?1 WHERE memory_id = ?2",
                    params![format!("{body}\n\n{details_append}"), full_id],
                )
                .storage_context("update_memory details")?;
            }
            None => {
                tx.execute(
                    "INSERT INTO memory_details (memory_id, body) VALUES (?1, ?2)",
                    params![full_id, details_append],
                )
                .storage_context("update_memory details")?;
            }
        }
    }

    tx.commit().storage_context("update_memory commit")?;
    Ok(true)
}

/// Fully overwrite all mutable fields of an existing memory (prefix-matched
/// ID), replacing the details body or removing it when the new one is empty.
/// Returns false when the ID resolves to nothing.
pub fn replace_memory(conn: &mut Connection, id: &str, raw: &RawMemoryInput) -> Result<bool> {
    let Some((full_id, _)) = resolve_id(conn, id)? else {
        return Ok(false);
    };

    let tx = conn.transaction().storage_context("replace_memory begin")?;

    tx.execute(
        "UPDATE memories
         SET title = ?1, what = ?2, why = ?3, impact = ?4, tags = ?5,
             related_files = ?6, category = ?7,
             updated_at = ?8, updated_count = updated_count + 1
         WHERE id = ?9",
        params![
            raw.title,
            raw.what,
            raw.why,
            raw.impact,
            tags_json(&raw.tags),
            tags_json(&raw.related_files),
            raw.category.map(|c| c.as_str()).unwrap_or(""),
            rfc3339(Utc::now()),
            full_id,
        ],
    )
    .storage_context("replace_memory")?;

    if raw.details.is_empty() {
        tx.execute(
            "DELETE FROM memory_details WHERE memory_id = ?1",
            [&full_id],
        )
        .storage_context("replace_memory details")?;
    } else {
        tx.execute(
            "INSERT OR REPLACE INTO memory_details (memory_id, body) VALUES (?1, ?2)",
            params![full_id, raw.details],
        )
        .storage_context("replace_memory details")?;
    }

    tx.commit().storage_context("replace_memory commit")?;
    Ok(true)
}

/// Delete the vector row for `rowid`, tolerating a missing vec table.
fn delete_vector_row(conn: &Connection, rowid: i64) {
    if let Err(e) = conn.execute("DELETE FROM memories_vec WHERE rowid = ?1", [rowid]) {
        tracing::debug!(rowid, err = %e, "vec cleanup skipped");
    }
}

/// Delete a memory and its details by exact ID or prefix.
/// Returns true if a record was found and deleted.
pub fn delete_memory(conn: &mut Connection, id: &str) -> Result<bool> {
    let Some((full_id, rowid)) = resolve_id(conn, id)? else {
        return Ok(false);
    };

    let tx = conn.transaction().storage_context("delete_memory begin")?;
    tx.execute(
        "DELETE FROM memory_details WHERE memory_id = ?1",
        [&full_id],
    )
    .storage_context("delete_memory details")?;
    delete_vector_row(&tx, rowid);
    tx.execute("DELETE FROM memories WHERE id = ?1", [&full_id])
        .storage_context("delete_memory")?;
    tx.commit().storage_context("delete_memory commit")?;
    Ok(true)
}

/// Delete all memories created before `before`, optionally filtered by
/// project and/or category. Returns the number of deleted records.
pub fn delete_by_filter(
    conn: &mut Connection,
    project: Option<&str>,
    category: Option<&str>,
    before: DateTime<Utc>,
) -> Result<usize> {
    let entries: Vec<(String, i64)> = {
        let mut stmt = conn
            .prepare(
                "SELECT id, rowid FROM memories
                 WHERE created_at < ?1
                   AND (?2 IS NULL OR project = ?2)
                   AND (?3 IS NULL OR category = ?3)",
            )
            .storage_context("delete_by_filter prepare")?;
        let rows = stmt
            .query_map(params![rfc3339(before), project, category], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .storage_context("delete_by_filter query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .storage_context("delete_by_filter scan")?;
        rows
    };

    let tx = conn.transaction().storage_context("delete_by_filter begin")?;
    for (id, rowid) in &entries {
        tx.execute("DELETE FROM memory_details WHERE memory_id = ?1", [id])
            .storage_context("delete_by_filter details")?;
        delete_vector_row(&tx, *rowid);
        tx.execute("DELETE FROM memories WHERE id = ?1", [id])
            .storage_context("delete_by_filter memory")?;
    }
    tx.commit().storage_context("delete_by_filter commit")?;
    Ok(entries.len())
}

/// Count memories matching the optional project/source filters.
pub fn count_memories(
    conn: &Connection,
    project: Option<&str>,
    source: Option<&str>,
) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM memories
         WHERE (?1 IS NULL OR project = ?1) AND (?2 IS NULL OR source = ?2)",
        params![project, source],
        |row| row.get(0),
    )
    .storage_context("count_memories")
}

/// List all memories with the fields needed for re-embedding, in rowid order.
pub fn list_all_for_reindex(conn: &Connection) -> Result<Vec<ReindexRow>> {
    let mut stmt = conn
        .prepare("SELECT rowid, title, what, why, impact, tags FROM memories ORDER BY rowid")
        .storage_context("list_all_for_reindex prepare")?;
    let rows = stmt
        .query_map([], |row| {
            let tags: Option<String> = row.get(5)?;
            Ok(ReindexRow {
                rowid: row.get(0)?,
                title: row.get(1)?,
                what: row.get(2)?,
                why: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                impact: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                tags: parse_string_array(tags),
            })
        })
        .storage_context("list_all_for_reindex query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .storage_context("list_all_for_reindex scan")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::memory::types::RawMemoryInput;

    fn raw(title: &str, what: &str) -> RawMemoryInput {
        RawMemoryInput {
            title: title.into(),
            what: what.into(),
            ..Default::default()
        }
    }

    fn insert(conn: &mut Connection, title: &str, what: &str, project: &str) -> (String, i64) {
        let mem = Memory::from_raw(&raw(title, what), project, "/vault/p/2026-08-02-session.md");
        let rowid = insert_memory(conn, &mem, "").unwrap();
        (mem.id, rowid)
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let mut conn = open_memory_database().unwrap();
        let mut input = raw("Use WAL mode", "Set journal_mode pragma");
        input.tags = vec!["sqlite".into(), "perf".into()];
        input.category = Some(Category::Decision);
        let mem = Memory::from_raw(&input, "echovault", "/vault/echovault/f.md");
        insert_memory(&mut conn, &mem, "long body").unwrap();

        let stored = get_memory(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(stored.title, "Use WAL mode");
        assert_eq!(stored.tags, vec!["sqlite", "perf"]);
        assert_eq!(stored.category, Some(Category::Decision));
        assert_eq!(stored.updated_count, 0);
        assert!(stored.has_details);
    }

    #[test]
    fn get_missing_memory_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_memory(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn details_via_prefix() {
        let mut conn = open_memory_database().unwrap();
        let mem = Memory::from_raw(&raw("T", "W"), "p", "/f.md");
        insert_memory(&mut conn, &mem, "the full story").unwrap();

        let detail = get_details(&conn, &mem.id[..8]).unwrap().unwrap();
        assert_eq!(detail.memory_id, mem.id);
        assert_eq!(detail.body, "the full story");
        assert!(get_details(&conn, "ffffffff").unwrap().is_none());
    }

    #[test]
    fn update_skips_empty_fields_and_appends_details() {
        let mut conn = open_memory_database().unwrap();
        let mut input = raw("Title", "original what");
        input.why = "original why".into();
        let mem = Memory::from_raw(&input, "p", "/f.md");
        insert_memory(&mut conn, &mem, "first body").unwrap();

        let found = update_memory(&mut conn, &mem.id, "new what", "", "", None, "second body")
            .unwrap();
        assert!(found);

        let stored = get_memory(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(stored.what, "new what");
        assert_eq!(stored.why, "original why");
        assert_eq!(stored.updated_count, 1);

        let detail = get_details(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(detail.body, "first body\n\nsecond body");
    }

    #[test]
    fn update_creates_details_when_absent() {
        let mut conn = open_memory_database().unwrap();
        let (id, _) = insert(&mut conn, "T", "W", "p");
        update_memory(&mut conn, &id, "", "", "", None, "fresh body").unwrap();
        assert_eq!(get_details(&conn, &id).unwrap().unwrap().body, "fresh body");
    }

    #[test]
    fn update_missing_returns_false() {
        let mut conn = open_memory_database().unwrap();
        assert!(!update_memory(&mut conn, "absent", "w", "", "", None, "").unwrap());
    }

    #[test]
    fn update_without_tags_keeps_stored_tags() {
        let mut conn = open_memory_database().unwrap();
        let mut input = raw("T", "W");
        input.tags = vec!["keep".into()];
        let mem = Memory::from_raw(&input, "p", "/f.md");
        insert_memory(&mut conn, &mem, "").unwrap();

        update_memory(&mut conn, &mem.id, "changed", "", "", None, "").unwrap();
        let stored = get_memory(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(stored.tags, vec!["keep"]);
    }

    #[test]
    fn related_files_roundtrip_as_json() {
        let mut conn = open_memory_database().unwrap();
        let mut input = raw("T", "W");
        input.related_files = vec!["src/main.rs".into(), "src/lib.rs".into()];
        let mem = Memory::from_raw(&input, "p", "/f.md");
        insert_memory(&mut conn, &mem, "").unwrap();

        let stored = get_memory(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(stored.related_files, vec!["src/main.rs", "src/lib.rs"]);
    }

    #[test]
    fn replace_overwrites_everything() {
        let mut conn = open_memory_database().unwrap();
        let mut input = raw("Old title", "old what");
        input.why = "old why".into();
        input.tags = vec!["old".into()];
        let mem = Memory::from_raw(&input, "p", "/f.md");
        insert_memory(&mut conn, &mem, "old body").unwrap();

        let mut replacement = raw("New title", "new what");
        replacement.tags = vec!["new".into()];
        replacement.category = Some(Category::Bug);
        replacement.details = "new body".into();
        assert!(replace_memory(&mut conn, &mem.id, &replacement).unwrap());

        let stored = get_memory(&conn, &mem.id).unwrap().unwrap();
        assert_eq!(stored.title, "New title");
        assert_eq!(stored.why, "");
        assert_eq!(stored.tags, vec!["new"]);
        assert_eq!(stored.category, Some(Category::Bug));
        assert_eq!(stored.updated_count, 1);
        assert_eq!(stored.file_path, "/f.md");
        assert_eq!(get_details(&conn, &mem.id).unwrap().unwrap().body, "new body");
    }

    #[test]
    fn replace_with_empty_details_removes_body() {
        let mut conn = open_memory_database().unwrap();
        let mem = Memory::from_raw(&raw("T", "W"), "p", "/f.md");
        insert_memory(&mut conn, &mem, "body").unwrap();

        replace_memory(&mut conn, &mem.id, &raw("T2", "W2")).unwrap();
        assert!(get_details(&conn, &mem.id).unwrap().is_none());
        assert!(!get_memory(&conn, &mem.id).unwrap().unwrap().has_details);
    }

    #[test]
    fn delete_by_prefix_removes_one_row() {
        let mut conn = open_memory_database().unwrap();
        let (id, _) = insert(&mut conn, "T", "W", "p");
        assert!(delete_memory(&mut conn, &id[..6]).unwrap());
        assert!(get_memory(&conn, &id).unwrap().is_none());
        assert!(!delete_memory(&mut conn, &id[..6]).unwrap());
    }

    #[test]
    fn prefix_resolution_prefers_lowest_rowid() {
        let mut conn = open_memory_database().unwrap();
        // Two rows sharing a forced common prefix.
        let mem_a = Memory {
            id: "abc12300-0000-4000-8000-000000000001".into(),
            ..Memory::from_raw(&raw("A", "first"), "p", "/f.md")
        };
        let mem_b = Memory {
            id: "abc12400-0000-4000-8000-000000000002".into(),
            ..Memory::from_raw(&raw("B", "second"), "p", "/f.md")
        };
        insert_memory(&mut conn, &mem_a, "").unwrap();
        insert_memory(&mut conn, &mem_b, "").unwrap();

        let (resolved, _) = resolve_id(&conn, "abc").unwrap().unwrap();
        assert_eq!(resolved, mem_a.id);

        assert!(delete_memory(&mut conn, "abc").unwrap());
        assert!(get_memory(&conn, &mem_a.id).unwrap().is_none());
        assert!(get_memory(&conn, &mem_b.id).unwrap().is_some());

        assert!(delete_memory(&mut conn, "abc").unwrap());
        assert!(get_memory(&conn, &mem_b.id).unwrap().is_none());
    }

    #[test]
    fn delete_by_filter_honours_cutoff_and_filters() {
        let mut conn = open_memory_database().unwrap();
        let (old_id, _) = insert(&mut conn, "Old", "W", "alpha");
        let (other_project, _) = insert(&mut conn, "Other", "W", "beta");

        // Backdate the rows we want the filter to catch.
        conn.execute(
            "UPDATE memories SET created_at = '2020-01-01T00:00:00Z' WHERE id IN (?1, ?2)",
            params![old_id, other_project],
        )
        .unwrap();
        let (recent_id, _) = insert(&mut conn, "Recent", "W", "alpha");

        let cutoff = Utc::now() - chrono::Duration::days(30);
        let deleted = delete_by_filter(&mut conn, Some("alpha"), None, cutoff).unwrap();
        assert_eq!(deleted, 1);
        assert!(get_memory(&conn, &old_id).unwrap().is_none());
        assert!(get_memory(&conn, &other_project).unwrap().is_some());
        assert!(get_memory(&conn, &recent_id).unwrap().is_some());
    }

    #[test]
    fn count_with_filters() {
        let mut conn = open_memory_database().unwrap();
        insert(&mut conn, "A", "W", "alpha");
        insert(&mut conn, "B", "W", "alpha");
        insert(&mut conn, "C", "W", "beta");
        assert_eq!(count_memories(&conn, None, None).unwrap(), 3);
        assert_eq!(count_memories(&conn, Some("alpha"), None).unwrap(), 2);
        assert_eq!(count_memories(&conn, Some("gamma"), None).unwrap(), 0);
    }

    #[test]
    fn reindex_listing_is_rowid_ordered() {
        let mut conn = open_memory_database().unwrap();
        insert(&mut conn, "First", "a", "p");
        insert(&mut conn, "Second", "b", "p");
        let rows = list_all_for_reindex(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].rowid < rows[1].rowid);
        assert_eq!(rows[0].title, "First");
        assert_eq!(rows[0].embed_text(), "First a   ");
    }

    #[test]
    fn vector_insert_skips_without_table() {
        let mut conn = open_memory_database().unwrap();
        let (_, rowid) = insert(&mut conn, "T", "W", "p");
        // No vec table yet — must not error.
        insert_vector(&conn, rowid, &[1.0, 0.0]).unwrap();

        crate::db::ensure_vec_table(&conn, 2).unwrap();
        insert_vector(&conn, rowid, &[1.0, 0.0]).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories_vec", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }
}
