//! MCP tool surface: five tools over the memory service.

pub mod memory_context;
pub mod memory_delete;
pub mod memory_replace;
pub mod memory_save;
pub mod memory_search;

use rmcp::handler::server::tool::Parameters;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::future::Future;
use std::sync::Arc;

use memory_context::MemoryContextParams;
use memory_delete::MemoryDeleteParams;
use memory_replace::MemoryReplaceParams;
use memory_save::MemorySaveParams;
use memory_search::MemorySearchParams;

use crate::memory::types::{Category, RawMemoryInput};
use crate::service::MemoryService;

/// The MCP tool handler. Holds the shared service and exposes all tools via
/// the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MemoryTools {
    tool_router: ToolRouter<Self>,
    service: Arc<MemoryService>,
}

#[tool_router]
impl MemoryTools {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    #[tool(description = "Save a memory for future sessions. You MUST call this before ending any session where you made changes, fixed bugs, made decisions, or learned something. Save when you: made an architectural decision, fixed a bug (include root cause and solution), discovered a non-obvious pattern or gotcha, learned something about the codebase not obvious from code, set up infrastructure, or the user corrected you. Do NOT save trivial changes, info obvious from the code, or duplicates. Write for a future agent with zero context.")]
    async fn memory_save(
        &self,
        Parameters(params): Parameters<MemorySaveParams>,
    ) -> Result<String, String> {
        let project = params.project.filter(|p| !p.is_empty()).unwrap_or_else(cwd_project);

        let raw = RawMemoryInput {
            title: truncate_chars(&params.title, 60),
            what: params.what,
            why: params.why.unwrap_or_default(),
            impact: params.impact.unwrap_or_default(),
            tags: params.tags.unwrap_or_default(),
            category: Some(Category::coerce(params.category.as_deref().unwrap_or(""))),
            related_files: params.related_files.unwrap_or_default(),
            details: params.details.unwrap_or_default(),
            source: String::new(),
        };

        tracing::info!(title = %raw.title, project = %project, "memory_save called");

        let result = self
            .service
            .save(raw, &project)
            .await
            .map_err(|e| e.to_string())?;

        json_result(&serde_json::json!({
            "id": result.id,
            "file_path": result.file_path,
            "action": result.action,
            "warnings": result.warnings,
        }))
    }

    #[tool(description = "Search memories using keyword and semantic search. Returns matching memories ranked by relevance. You MUST call this at session start before doing any work, and whenever the user's request relates to a topic that may have prior context.")]
    async fn memory_search(
        &self,
        Parameters(params): Parameters<MemorySearchParams>,
    ) -> Result<String, String> {
        let limit = params.limit.filter(|l| *l > 0).unwrap_or(5);
        let project = params.project.filter(|p| !p.is_empty());

        tracing::info!(query = %params.query, limit, "memory_search called");

        let results = self
            .service
            .search(&params.query, limit, project.as_deref(), None, true)
            .await
            .map_err(|e| e.to_string())?;

        let clean: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "title": r.title,
                    "what": r.what,
                    "why": r.why,
                    "impact": r.impact,
                    "category": r.category,
                    "tags": r.tags,
                    "project": r.project,
                    "created_at": date_part(&r.created_at),
                    "score": round_two(r.score),
                    "has_details": r.has_details,
                })
            })
            .collect();
        json_result(&clean)
    }

    #[tool(description = "Get memory context for the current project. You MUST call this at session start to load prior decisions, bugs, and context. Use memory_search for specific topics.")]
    async fn memory_context(
        &self,
        Parameters(params): Parameters<MemoryContextParams>,
    ) -> Result<String, String> {
        let project = params.project.filter(|p| !p.is_empty()).unwrap_or_else(cwd_project);
        let limit = params.limit.filter(|l| *l > 0).unwrap_or(10);

        let (results, total) = self
            .service
            .get_context(limit, Some(&project), None, "", "never", false)
            .await
            .map_err(|e| e.to_string())?;

        let memories: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "title": r.title,
                    "category": r.category,
                    "tags": r.tags,
                    "date": format_date(&r.created_at),
                })
            })
            .collect();

        let mut message = String::from(
            "Use memory_search for specific topics. IMPORTANT: You MUST call memory_save before this session ends if you make any changes, decisions, or discoveries.",
        );
        if total == 0 {
            message.push_str(&format!(
                " No memories found for project \"{project}\". If this is unexpected, retry with an explicit project name (e.g. memory_context(project: \"myproject\"))."
            ));
        }

        json_result(&serde_json::json!({
            "total": total,
            "showing": memories.len(),
            "memories": memories,
            "message": message,
        }))
    }

    #[tool(description = "Delete memories by ID, or in bulk by age with optional project/category filters. Requires either ids or older_than_days.")]
    async fn memory_delete(
        &self,
        Parameters(params): Parameters<MemoryDeleteParams>,
    ) -> Result<String, String> {
        match (params.ids, params.older_than_days) {
            (Some(ids), _) if !ids.is_empty() => {
                let mut deleted = 0usize;
                for id in &ids {
                    if self.service.delete(id).map_err(|e| e.to_string())? {
                        deleted += 1;
                    }
                }
                json_result(&serde_json::json!({"deleted": deleted}))
            }
            (_, Some(days)) => {
                let category = match params.category.as_deref().filter(|c| !c.is_empty()) {
                    Some(c) => Some(c.parse::<Category>()?),
                    None => None,
                };
                let deleted = self
                    .service
                    .delete_by_filter(
                        params.project.as_deref().filter(|p| !p.is_empty()),
                        category,
                        days,
                    )
                    .map_err(|e| e.to_string())?;
                json_result(&serde_json::json!({
                    "deleted": deleted,
                    "older_than_days": days,
                }))
            }
            _ => Err("either ids or older_than_days is required".into()),
        }
    }

    #[tool(description = "Fully overwrite an existing memory's content by ID. Use when a memory is outdated or wrong; for incremental additions prefer memory_save, which merges into same-titled memories.")]
    async fn memory_replace(
        &self,
        Parameters(params): Parameters<MemoryReplaceParams>,
    ) -> Result<String, String> {
        let raw = RawMemoryInput {
            title: truncate_chars(&params.title, 60),
            what: params.what,
            why: params.why.unwrap_or_default(),
            impact: params.impact.unwrap_or_default(),
            tags: params.tags.unwrap_or_default(),
            category: Some(Category::coerce(params.category.as_deref().unwrap_or(""))),
            related_files: params.related_files.unwrap_or_default(),
            details: params.details.unwrap_or_default(),
            source: String::new(),
        };

        let result = self
            .service
            .replace(&params.id, raw)
            .await
            .map_err(|e| e.to_string())?;

        json_result(&serde_json::json!({
            "id": result.id,
            "action": result.action,
        }))
    }
}

#[tool_handler]
impl ServerHandler for MemoryTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "EchoVault is a persistent memory store for coding agents. Call memory_context \
                 at session start, memory_search for specific topics, and memory_save before \
                 the session ends."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn json_result<T: serde::Serialize>(v: &T) -> Result<String, String> {
    serde_json::to_string(v).map_err(|e| format!("serialization failed: {e}"))
}

/// Basename of the current working directory, the default project name.
fn cwd_project() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// First 10 characters of an RFC-3339 timestamp (the date part).
fn date_part(timestamp: &str) -> String {
    timestamp.chars().take(10).collect()
}

/// Render an RFC-3339 timestamp as "Aug 02" for compact context listings.
fn format_date(timestamp: &str) -> String {
    let date = date_part(timestamp);
    match chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        Ok(d) => d.format("%b %d").to_string(),
        Err(_) => date,
    }
}

/// Round to two decimal places for display.
fn round_two(f: f64) -> f64 {
    (f * 100.0).round() / 100.0
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 60), "hello");
        assert_eq!(truncate_chars("ab", 1), "a");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
    }

    #[test]
    fn date_helpers() {
        assert_eq!(date_part("2026-08-02T10:30:00Z"), "2026-08-02");
        assert_eq!(format_date("2026-08-02T10:30:00Z"), "Aug 02");
        assert_eq!(format_date("garbage"), "garbage");
    }

    #[test]
    fn round_two_rounds() {
        assert_eq!(round_two(0.666), 0.67);
        assert_eq!(round_two(1.0), 1.0);
    }
}
