//! The memory service: wires configuration, storage, redaction, markdown,
//! embeddings, and search into the save/search/context/replace/reindex
//! operations the tool surface and CLI expose.

use chrono::{Duration, Utc};
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{self, MemoryConfig};
use crate::db;
use crate::embedding::{self, Provider};
use crate::error::{Error, Result};
use crate::markdown;
use crate::memory::search::{self, SearchHit};
use crate::memory::store;
use crate::memory::types::{Category, Memory, MemoryDetail, RawMemoryInput, ReindexResult, SaveResult};
use crate::redaction;

/// Normalized FTS score above which a same-titled save is treated as an
/// update of the existing memory rather than a new record.
pub const DEDUP_SCORE_THRESHOLD: f64 = 0.7;

/// Compute-once state shared across operations. The mutex is held only for
/// the initialization check, never across an HTTP call.
#[derive(Default)]
struct LazyState {
    provider: Option<Option<Arc<dyn Provider>>>,
    patterns: Option<Arc<Vec<Regex>>>,
    /// None = unknown, Some(true) = usable, Some(false) = unavailable.
    vectors_ok: Option<bool>,
}

/// Orchestrates all memory operations for one vault.
pub struct MemoryService {
    pub memory_home: PathBuf,
    pub vault_dir: PathBuf,
    pub config: MemoryConfig,
    db: Mutex<Connection>,
    state: Mutex<LazyState>,
}

impl MemoryService {
    /// Initialize a service rooted at `memory_home`. When `None`, the home is
    /// resolved via the env → global config → default chain.
    pub fn new(memory_home: Option<&Path>) -> Result<Self> {
        let memory_home = match memory_home {
            Some(p) => p.to_path_buf(),
            None => config::resolve_memory_home(None).0,
        };

        let vault_dir = memory_home.join("vault");
        std::fs::create_dir_all(&vault_dir).map_err(|e| Error::io(&vault_dir, e))?;

        let cfg = MemoryConfig::load(&memory_home.join("config.yaml"))?;
        let conn = db::open_database(memory_home.join("index.db"))?;

        Ok(Self {
            memory_home,
            vault_dir,
            config: cfg,
            db: Mutex::new(conn),
            state: Mutex::new(LazyState::default()),
        })
    }

    /// Like [`MemoryService::new`] but with a pre-constructed embedding
    /// provider, bypassing the config-driven factory.
    pub fn with_provider(
        memory_home: &Path,
        provider: Option<Arc<dyn Provider>>,
    ) -> Result<Self> {
        let svc = Self::new(Some(memory_home))?;
        svc.lock_state().provider = Some(provider);
        Ok(svc)
    }

    fn lock_db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_state(&self) -> MutexGuard<'_, LazyState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Lazy helpers
    // -----------------------------------------------------------------------

    /// The embedding provider, constructed once from config. `Ok(None)` means
    /// embeddings are disabled.
    fn provider(&self) -> Result<Option<Arc<dyn Provider>>> {
        let mut state = self.lock_state();
        if let Some(cached) = &state.provider {
            return Ok(cached.clone());
        }
        let provider = embedding::create_provider(&self.config.embedding)?;
        state.provider = Some(provider.clone());
        Ok(provider)
    }

    /// Redaction patterns from `.memoryignore`, loaded once. A failed load is
    /// logged and treated as an empty set.
    fn ignore_patterns(&self) -> Arc<Vec<Regex>> {
        let mut state = self.lock_state();
        if let Some(cached) = &state.patterns {
            return cached.clone();
        }
        let patterns = match redaction::load_memory_ignore(&self.memory_home.join(".memoryignore"))
        {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(err = %e, "failed to load .memoryignore");
                Vec::new()
            }
        };
        let patterns = Arc::new(patterns);
        state.patterns = Some(patterns.clone());
        patterns
    }

    /// Whether the vector table is currently usable, cached per process.
    ///
    /// The state and db locks are never held together: lookups are
    /// idempotent, so a racing recomputation is harmless.
    fn vectors_available(&self) -> bool {
        if let Some(ok) = self.lock_state().vectors_ok {
            return ok;
        }
        let ok = db::has_vec_table(&self.lock_db()).unwrap_or(false);
        self.lock_state().vectors_ok = Some(ok);
        ok
    }

    fn set_vectors_ok(&self, ok: bool) {
        self.lock_state().vectors_ok = Some(ok);
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn redact_input(&self, raw: &mut RawMemoryInput) {
        let patterns = self.ignore_patterns();
        raw.title = redaction::redact(&raw.title, &patterns);
        raw.what = redaction::redact(&raw.what, &patterns);
        if !raw.why.is_empty() {
            raw.why = redaction::redact(&raw.why, &patterns);
        }
        if !raw.impact.is_empty() {
            raw.impact = redaction::redact(&raw.impact, &patterns);
        }
        if !raw.details.is_empty() {
            raw.details = redaction::redact(&raw.details, &patterns);
        }
    }

    /// Set up the vec table for the given embedding dimension. Returns false
    /// (and caches the unavailability) on a dimension mismatch.
    fn ensure_vectors(&self, dim: usize) -> bool {
        // The db guard must be released before touching the state lock.
        let ensured = {
            let conn = self.lock_db();
            db::ensure_vec_table(&conn, dim)
        };
        match ensured {
            Ok(()) => {
                self.set_vectors_ok(true);
                true
            }
            Err(Error::DimensionMismatch { .. }) => {
                self.set_vectors_ok(false);
                false
            }
            Err(e) => {
                tracing::warn!(err = %e, "ensure vectors");
                false
            }
        }
    }

    /// Re-embed an existing memory and store its vector. All errors are
    /// logged as warnings; the caller never fails because of this.
    async fn reembed_memory(&self, id: &str, embed_text: &str) {
        let provider = match self.provider() {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(err = %e, "re-embed: provider unavailable");
                return;
            }
        };
        let embedding = match provider.embed(embed_text).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(err = %e, "re-embed: embedding failed");
                return;
            }
        };
        if !self.ensure_vectors(embedding.len()) {
            return;
        }
        let conn = self.lock_db();
        match store::get_memory(&conn, id) {
            Ok(Some(mem)) => {
                if let Err(e) = store::insert_vector(&conn, mem.rowid, &embedding) {
                    tracing::warn!(err = %e, "re-embed: insert vector");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(err = %e, "re-embed: fetch memory"),
        }
    }

    // -----------------------------------------------------------------------
    // Save
    // -----------------------------------------------------------------------

    /// Store a memory with the full pipeline:
    /// redact → dedup probe → markdown → insert → embed.
    pub async fn save(&self, mut raw: RawMemoryInput, project: &str) -> Result<SaveResult> {
        if project.is_empty() {
            return Err(Error::InvalidArgument("project name is required".into()));
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let vault_project_dir = self.vault_dir.join(project);
        std::fs::create_dir_all(&vault_project_dir)
            .map_err(|e| Error::io(&vault_project_dir, e))?;

        let warnings = details_warnings(&raw);
        self.redact_input(&mut raw);

        // Dedup probe via FTS on title + what.
        let dedup_query = format!("{} {}", raw.title, raw.what);
        let candidates =
            match search::fts_search(&self.lock_db(), &dedup_query, 5, Some(project), None) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(err = %e, "save: dedup search failed");
                    Vec::new()
                }
            };

        if let Some(top) = candidates.first() {
            // Normalize the top score against a broader search so the
            // threshold is meaningful when the project has a single match.
            let broad = if candidates.len() == 1 {
                match search::fts_search(&self.lock_db(), &dedup_query, 5, None, None) {
                    Ok(wider) if !wider.is_empty() => wider,
                    _ => candidates.clone(),
                }
            } else {
                candidates.clone()
            };
            let max_score = broad.iter().map(|c| c.score).fold(0.0_f64, f64::max);
            let normalized = if max_score > 0.0 {
                top.score / max_score
            } else {
                0.0
            };
            let title_match =
                raw.title.trim().to_lowercase() == top.title.trim().to_lowercase();

            if normalized >= DEDUP_SCORE_THRESHOLD && title_match {
                let existing_id = top.id.clone();
                let existing_file_path = top.file_path.clone();
                let merged_tags = merge_tags(&top.tags, &raw.tags);

                let details_append = if raw.details.is_empty() {
                    String::new()
                } else {
                    format!("--- updated {today} ---\n{}", raw.details)
                };

                {
                    let mut conn = self.lock_db();
                    store::update_memory(
                        &mut conn,
                        &existing_id,
                        &raw.what,
                        &raw.why,
                        &raw.impact,
                        Some(&merged_tags),
                        &details_append,
                    )?;
                }

                let text =
                    embed_text(&top.title, &raw.what, &raw.why, &raw.impact, &merged_tags);
                self.reembed_memory(&existing_id, &text).await;

                return Ok(SaveResult {
                    id: existing_id,
                    file_path: existing_file_path,
                    action: "updated".into(),
                    warnings,
                });
            }
        }

        // Normal save path: create a new memory.
        let file_path = vault_project_dir.join(format!("{today}-session.md"));
        let mem = Memory::from_raw(&raw, project, &file_path.to_string_lossy());

        markdown::write_session_memory(&vault_project_dir, &mem, &today, &raw.details)?;

        let rowid = {
            let mut conn = self.lock_db();
            store::insert_memory(&mut conn, &mem, &raw.details)?
        };

        // Best-effort embed; nothing past this point can fail the save.
        match self.provider() {
            Ok(Some(provider)) => {
                let text = embed_text(&mem.title, &mem.what, &mem.why, &mem.impact, &mem.tags);
                match provider.embed(&text).await {
                    Ok(embedding) => {
                        if !self.ensure_vectors(embedding.len()) {
                            tracing::warn!(
                                "save: vector dimension mismatch — run 'echovault reindex' to rebuild"
                            );
                        } else if let Err(e) =
                            store::insert_vector(&self.lock_db(), rowid, &embedding)
                        {
                            tracing::warn!(err = %e, "save: insert vector");
                        }
                    }
                    Err(e) => tracing::warn!(err = %e, "save: embedding failed"),
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(err = %e, "save: embedding provider error"),
        }

        Ok(SaveResult {
            id: mem.id,
            file_path: file_path.to_string_lossy().into_owned(),
            action: "created".into(),
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Search / context
    // -----------------------------------------------------------------------

    /// Tiered FTS + vector search, falling back to FTS-only when vectors are
    /// unavailable or `use_vectors` is false.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        project: Option<&str>,
        source: Option<&str>,
        use_vectors: bool,
    ) -> Result<Vec<SearchHit>> {
        if !use_vectors {
            return search::hybrid_search(&self.db, None, query, limit, project, source).await;
        }

        if self.vectors_available() {
            let provider = match self.provider() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(err = %e, "search: embedding provider error");
                    None
                }
            };
            match search::tiered_search(
                &self.db,
                provider.as_deref(),
                query,
                limit,
                0,
                project,
                source,
            )
            .await
            {
                Ok(results) => return Ok(results),
                Err(Error::DimensionMismatch { .. }) => self.set_vectors_ok(false),
                Err(e) => tracing::warn!(err = %e, "search: tiered search error"),
            }
        }

        // FTS-only fallback.
        search::tiered_search(&self.db, None, query, limit, 0, project, source).await
    }

    /// Whether semantic (vector) search should run for the given mode.
    /// "auto" with the Ollama provider requires the model to be currently
    /// loaded; "auto" with any other provider assumes availability.
    async fn should_use_semantic(&self, mode: &str) -> bool {
        match mode {
            "never" => false,
            "always" => true,
            _ => {
                if self.config.embedding.provider == "ollama" {
                    let base_url = if self.config.embedding.base_url.is_empty() {
                        "http://localhost:11434"
                    } else {
                        &self.config.embedding.base_url
                    };
                    embedding::is_model_loaded(&self.config.embedding.model, base_url).await
                } else {
                    true
                }
            }
        }
    }

    /// Memory summaries for context injection, plus the total count.
    ///
    /// An empty query lists recent memories. `semantic_mode` falls back to
    /// the configured value; unknown modes resolve to "auto". With
    /// `topup_recent`, sparse search results are filled from recent memories
    /// not already present.
    pub async fn get_context(
        &self,
        limit: usize,
        project: Option<&str>,
        source: Option<&str>,
        query: &str,
        semantic_mode: &str,
        topup_recent: bool,
    ) -> Result<(Vec<SearchHit>, i64)> {
        let total = store::count_memories(&self.lock_db(), project, source)?;

        let mode = if semantic_mode.is_empty() {
            self.config.context.semantic.as_str()
        } else {
            semantic_mode
        };
        let mode = match mode {
            "auto" | "always" | "never" => mode,
            _ => "auto",
        };

        if query.is_empty() {
            let recent = search::list_recent(&self.lock_db(), limit, project, source)?;
            return Ok((recent, total));
        }

        let use_vectors = self.should_use_semantic(mode).await;
        let mut results = self.search(query, limit, project, source, use_vectors).await?;

        if topup_recent && results.len() < limit {
            if let Ok(recent) = search::list_recent(&self.lock_db(), limit, project, source) {
                let seen: HashSet<String> = results.iter().map(|r| r.id.clone()).collect();
                for r in recent {
                    if seen.contains(&r.id) {
                        continue;
                    }
                    results.push(r);
                    if results.len() >= limit {
                        break;
                    }
                }
            }
        }

        Ok((results, total))
    }

    // -----------------------------------------------------------------------
    // Details / delete / replace / count
    // -----------------------------------------------------------------------

    /// Fetch the extended body for a memory by ID or prefix.
    pub fn get_details(&self, id: &str) -> Result<Option<MemoryDetail>> {
        store::get_details(&self.lock_db(), id)
    }

    /// Remove a memory by ID or prefix. Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        store::delete_memory(&mut self.lock_db(), id)
    }

    /// Remove all memories older than `older_than_days`, optionally filtered
    /// by project and/or category. Returns the number of deleted records.
    pub fn delete_by_filter(
        &self,
        project: Option<&str>,
        category: Option<Category>,
        older_than_days: i64,
    ) -> Result<usize> {
        let before = Utc::now() - Duration::days(older_than_days);
        store::delete_by_filter(
            &mut self.lock_db(),
            project,
            category.map(|c| c.as_str()),
            before,
        )
    }

    /// Fully overwrite an existing memory's content and re-embed it.
    pub async fn replace(&self, id: &str, mut raw: RawMemoryInput) -> Result<SaveResult> {
        self.redact_input(&mut raw);

        let full_id = {
            let mut conn = self.lock_db();
            let Some((full_id, _)) = store::resolve_id(&conn, id)? else {
                return Err(Error::NotFound(id.to_string()));
            };
            store::replace_memory(&mut conn, &full_id, &raw)?;
            full_id
        };

        let text = embed_text(&raw.title, &raw.what, &raw.why, &raw.impact, &raw.tags);
        self.reembed_memory(&full_id, &text).await;

        Ok(SaveResult {
            id: full_id,
            file_path: String::new(),
            action: "replaced".into(),
            warnings: Vec::new(),
        })
    }

    /// Total count of memories matching the optional filters.
    pub fn count_memories(&self, project: Option<&str>, source: Option<&str>) -> Result<i64> {
        store::count_memories(&self.lock_db(), project, source)
    }

    // -----------------------------------------------------------------------
    // Reindex
    // -----------------------------------------------------------------------

    /// Rebuild the vector table with the configured provider. `progress` is
    /// called with `(current, total)` after each memory is embedded.
    ///
    /// Unlike the save path, embedding errors here abort and surface: the
    /// caller explicitly asked for a rebuild and can retry.
    pub async fn reindex(
        &self,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<ReindexResult> {
        let provider = self
            .provider()?
            .ok_or_else(|| Error::Config("no embedding provider configured".into()))?;

        let probe = provider.embed("dimension probe").await?;
        let dim = probe.len();

        {
            let conn = self.lock_db();
            db::drop_vec_table(&conn)?;
            db::set_embedding_dim(&conn, dim)?;
            db::create_vec_table(&conn, dim)?;
        }

        let rows = store::list_all_for_reindex(&self.lock_db())?;
        let total = rows.len();

        for (i, row) in rows.iter().enumerate() {
            let embedding = provider.embed(&row.embed_text()).await?;
            store::insert_vector(&self.lock_db(), row.rowid, &embedding)?;
            progress(i + 1, total);
        }

        self.set_vectors_ok(true);
        Ok(ReindexResult {
            count: total,
            dim,
            model: self.config.embedding.model.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Combine existing and extra tags, deduplicating case-insensitively while
/// preserving first-seen order.
pub fn merge_tags(existing: &[String], extra: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = existing.iter().map(|t| t.to_lowercase()).collect();
    let mut result: Vec<String> = existing.to_vec();
    for t in extra {
        if seen.insert(t.to_lowercase()) {
            result.push(t.clone());
        }
    }
    result
}

/// The text embedded for a memory: title, what, why, impact, joined tags.
fn embed_text(title: &str, what: &str, why: &str, impact: &str, tags: &[String]) -> String {
    format!("{title} {what} {why} {impact} {}", tags.join(" "))
}

/// Quality warnings for memory details. These are advice, never errors.
fn details_warnings(raw: &RawMemoryInput) -> Vec<String> {
    let mut warnings = Vec::new();
    let details = raw.details.trim();

    if let Some(category @ (Category::Decision | Category::Bug)) = raw.category {
        if details.is_empty() {
            warnings.push(format!(
                "'{category}' memories should include details. Capture context, options considered, decision, tradeoffs, and follow-up.",
            ));
            return warnings;
        }
    }

    if details.is_empty() {
        return warnings;
    }

    const MIN_CHARS: usize = 120;
    if details.len() < MIN_CHARS {
        warnings.push(format!(
            "Details are brief ({} chars). Aim for at least {MIN_CHARS} chars for future-session context.",
            details.len(),
        ));
    }

    let recommended = ["context", "options considered", "decision", "tradeoffs", "follow-up"];
    let details_lc = details.to_lowercase();
    let missing: Vec<&str> = recommended
        .iter()
        .filter(|s| !details_lc.contains(**s))
        .copied()
        .collect();
    if !missing.is_empty() {
        warnings.push(format!(
            "Details are missing recommended sections: {}.",
            missing.join(", ")
        ));
    }

    warnings
}
