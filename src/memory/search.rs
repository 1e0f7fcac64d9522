//! Hybrid search: FTS5 BM25 keyword ranking, sqlite-vec nearest-neighbour
//! lookup, and the tiered/weighted merge between them.
//!
//! Keyword search is the contractual floor. Tiered search only calls the
//! embedding provider when FTS comes back sparse, and every failure in the
//! vector path degrades to the FTS result set instead of erroring.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::embedding::Provider;
use crate::error::{Result, StorageContext};
use crate::memory::embedding_to_bytes;
use crate::memory::store::parse_string_array;

/// FTS merge weight in the hybrid score.
pub const FTS_WEIGHT: f64 = 0.3;
/// Vector merge weight in the hybrid score.
pub const VEC_WEIGHT: f64 = 0.7;
/// FTS hit count at which tiered search skips the embedding call.
pub const DEFAULT_MIN_FTS: usize = 3;

/// A single search hit with a combined relevance score (higher is better).
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub title: String,
    pub what: String,
    pub why: String,
    pub impact: String,
    pub category: String,
    pub tags: Vec<String>,
    pub project: String,
    pub source: String,
    pub created_at: String,
    pub has_details: bool,
    pub file_path: String,
}

fn lock(db: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(|e| e.into_inner())
}

/// Escape a user query for FTS5: quote each whitespace-delimited term
/// (doubling embedded quotes) and append `*` for prefix matching, joined
/// with OR.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

const HIT_COLUMNS: &str = "m.id, m.title, m.what, m.why, m.impact, m.category, m.tags, \
     m.project, m.source, m.created_at, m.file_path, \
     EXISTS(SELECT 1 FROM memory_details WHERE memory_id = m.id) AS has_details";

fn read_hit(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    let tags: Option<String> = row.get(6)?;
    Ok(SearchHit {
        id: row.get(0)?,
        title: row.get(1)?,
        what: row.get(2)?,
        why: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        impact: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        category: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        tags: parse_string_array(tags),
        project: row.get(7)?,
        source: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        created_at: row.get(9)?,
        file_path: row.get(10)?,
        has_details: row.get(11)?,
        score: row.get(12)?,
    })
}

/// BM25 full-text search. Scores are `-rank`, so higher is better.
pub fn fts_search(
    conn: &Connection,
    query: &str,
    limit: usize,
    project: Option<&str>,
    source: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let fts_query = escape_fts_query(query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {HIT_COLUMNS}, -fts.rank AS score
         FROM memories_fts fts
         JOIN memories m ON m.rowid = fts.rowid
         WHERE fts.memories_fts MATCH ?1
           AND (?2 IS NULL OR m.project = ?2)
           AND (?3 IS NULL OR m.source = ?3)
         ORDER BY fts.rank
         LIMIT ?4"
    );
    let mut stmt = conn.prepare(&sql).storage_context("fts_search prepare")?;
    let hits = stmt
        .query_map(params![fts_query, project, source, limit as i64], read_hit)
        .storage_context("fts_search query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .storage_context("fts_search scan")?;
    Ok(hits)
}

/// Approximate nearest-neighbour search via sqlite-vec. Returns an empty set
/// when the vector table does not exist. The project/source filters are
/// applied after ranking because the vec0 MATCH operator does not accept
/// arbitrary predicates.
pub fn vector_search(
    conn: &Connection,
    query_embedding: &[f32],
    k: usize,
    project: Option<&str>,
    source: Option<&str>,
) -> Result<Vec<SearchHit>> {
    if !crate::db::has_vec_table(conn)? {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {HIT_COLUMNS}, v.distance
         FROM memories_vec v
         JOIN memories m ON m.rowid = v.rowid
         WHERE v.embedding MATCH ?1 AND k = ?2
         ORDER BY v.distance"
    );
    let mut stmt = conn.prepare(&sql).storage_context("vector_search prepare")?;
    let all = stmt
        .query_map(
            params![embedding_to_bytes(query_embedding), k as i64],
            read_hit,
        )
        .storage_context("vector_search query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .storage_context("vector_search scan")?;

    let hits = all
        .into_iter()
        .filter(|h| project.is_none_or(|p| h.project == p))
        .filter(|h| source.is_none_or(|s| h.source == s))
        .map(|mut h| {
            // read_hit put the raw distance in `score`.
            h.score = 1.0 - h.score;
            h
        })
        .collect();
    Ok(hits)
}

/// List recently created memories, newest first. Only summary fields are
/// populated; `score` is 0.
pub fn list_recent(
    conn: &Connection,
    limit: usize,
    project: Option<&str>,
    source: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let mut stmt = conn
        .prepare(
            "SELECT m.id, m.title, m.category, m.tags, m.project, m.source, m.created_at,
                    EXISTS(SELECT 1 FROM memory_details WHERE memory_id = m.id) AS has_details
             FROM memories m
             WHERE (?1 IS NULL OR m.project = ?1) AND (?2 IS NULL OR m.source = ?2)
             ORDER BY m.created_at DESC
             LIMIT ?3",
        )
        .storage_context("list_recent prepare")?;
    let hits = stmt
        .query_map(params![project, source, limit as i64], |row| {
            let tags: Option<String> = row.get(3)?;
            Ok(SearchHit {
                id: row.get(0)?,
                title: row.get(1)?,
                category: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                tags: parse_string_array(tags),
                project: row.get(4)?,
                source: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                created_at: row.get(6)?,
                has_details: row.get(7)?,
                score: 0.0,
                what: String::new(),
                why: String::new(),
                impact: String::new(),
                file_path: String::new(),
            })
        })
        .storage_context("list_recent query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .storage_context("list_recent scan")?;
    Ok(hits)
}

/// Normalize scores in place to `[0, 1]` by dividing by the maximum, with a
/// safe floor of 1.
pub fn normalize_scores(hits: &mut [SearchHit]) {
    let mut max = hits.iter().map(|h| h.score).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        max = 1.0;
    }
    for h in hits {
        h.score /= max;
    }
}

/// Merge FTS and vector hits with weighted scoring, keyed by memory ID.
/// Both sets are normalized independently before weighting; hits present in
/// both sets get the sum of their weighted scores.
pub fn merge_results(
    mut fts: Vec<SearchHit>,
    mut vec: Vec<SearchHit>,
    fts_weight: f64,
    vec_weight: f64,
    limit: usize,
) -> Vec<SearchHit> {
    normalize_scores(&mut fts);
    normalize_scores(&mut vec);

    let mut combined: HashMap<String, SearchHit> = HashMap::with_capacity(fts.len() + vec.len());
    for mut hit in fts {
        hit.score *= fts_weight;
        combined.insert(hit.id.clone(), hit);
    }
    for mut hit in vec {
        match combined.get_mut(&hit.id) {
            Some(existing) => existing.score += vec_weight * hit.score,
            None => {
                hit.score *= vec_weight;
                combined.insert(hit.id.clone(), hit);
            }
        }
    }

    let mut merged: Vec<SearchHit> = combined.into_values().collect();
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    if limit > 0 && merged.len() > limit {
        merged.truncate(limit);
    }
    merged
}

/// FTS first; embed only when keyword results are sparse.
///
/// `min_fts` is the hit count at which the embedding call is skipped entirely
/// (0 uses [`DEFAULT_MIN_FTS`]). Embedding and vector-search failures are
/// non-fatal: the FTS result set is returned instead.
pub async fn tiered_search(
    db: &Mutex<Connection>,
    provider: Option<&dyn Provider>,
    query: &str,
    limit: usize,
    min_fts: usize,
    project: Option<&str>,
    source: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let min_fts = if min_fts == 0 { DEFAULT_MIN_FTS } else { min_fts };

    let mut fts_rows = fts_search(&lock(db), query, limit * 2, project, source)?;
    normalize_scores(&mut fts_rows);

    // Enough keyword hits — skip the network round-trip.
    if fts_rows.len() >= min_fts {
        fts_rows.truncate(limit);
        return Ok(fts_rows);
    }

    let Some(provider) = provider else {
        fts_rows.truncate(limit);
        return Ok(fts_rows);
    };

    let embedding = match provider.embed(query).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(err = %e, "tiered search: embedding failed, returning FTS results");
            fts_rows.truncate(limit);
            return Ok(fts_rows);
        }
    };

    let vec_rows = match vector_search(&lock(db), &embedding, limit * 2, project, source) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(err = %e, "tiered search: vector search failed, returning FTS results");
            fts_rows.truncate(limit);
            return Ok(fts_rows);
        }
    };

    Ok(merge_results(fts_rows, vec_rows, FTS_WEIGHT, VEC_WEIGHT, limit))
}

/// Always run both branches (when a provider is available); embedding and
/// vector errors propagate to the caller.
pub async fn hybrid_search(
    db: &Mutex<Connection>,
    provider: Option<&dyn Provider>,
    query: &str,
    limit: usize,
    project: Option<&str>,
    source: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let mut fts_rows = fts_search(&lock(db), query, limit * 2, project, source)?;

    let Some(provider) = provider else {
        normalize_scores(&mut fts_rows);
        fts_rows.truncate(limit);
        return Ok(fts_rows);
    };

    let embedding = provider.embed(query).await?;
    let vec_rows = vector_search(&lock(db), &embedding, limit * 2, project, source)?;

    Ok(merge_results(fts_rows, vec_rows, FTS_WEIGHT, VEC_WEIGHT, limit))
}
