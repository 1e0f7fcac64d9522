//! MCP `memory_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_context` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryContextParams {
    /// Project name. Auto-detected from cwd if omitted.
    #[schemars(description = "Project name. Auto-detected from cwd if omitted.")]
    pub project: Option<String>,

    /// Max memories (default 10).
    #[schemars(description = "Max memories (default 10)")]
    pub limit: Option<usize>,
}
