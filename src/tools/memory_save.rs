//! MCP `memory_save` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_save` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemorySaveParams {
    /// Short title, max 60 chars.
    #[schemars(description = "Short title, max 60 chars")]
    pub title: String,

    /// 1-2 sentences. The essence a future agent needs.
    #[schemars(description = "1-2 sentences. The essence a future agent needs.")]
    pub what: String,

    /// Reasoning behind the decision or fix.
    #[schemars(description = "Reasoning behind the decision or fix")]
    pub why: Option<String>,

    /// What changed as a result.
    #[schemars(description = "What changed as a result")]
    pub impact: Option<String>,

    /// Relevant tags.
    #[schemars(description = "Relevant tags")]
    pub tags: Option<Vec<String>>,

    /// One of: decision, bug, pattern, learning, context.
    #[schemars(
        description = "decision: chose X over Y. bug: fixed a problem. pattern: reusable gotcha. learning: non-obvious discovery. context: project setup/architecture."
    )]
    pub category: Option<String>,

    /// File paths involved.
    #[schemars(description = "File paths involved")]
    pub related_files: Option<Vec<String>>,

    /// Full context for a future agent with zero context.
    #[schemars(
        description = "Full context for a future agent with zero context. Prefer: Context, Options considered, Decision, Tradeoffs, Follow-up."
    )]
    pub details: Option<String>,

    /// Project name. Auto-detected from cwd if omitted.
    #[schemars(description = "Project name. Auto-detected from cwd if omitted.")]
    pub project: Option<String>,
}
