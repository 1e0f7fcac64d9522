//! MCP `memory_search` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_search` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemorySearchParams {
    /// Search terms.
    #[schemars(description = "Search terms")]
    pub query: String,

    /// Max results (default 5).
    #[schemars(description = "Max results (default 5)")]
    pub limit: Option<usize>,

    /// Filter to project.
    #[schemars(description = "Filter to project")]
    pub project: Option<String>,
}
