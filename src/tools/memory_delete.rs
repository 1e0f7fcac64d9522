//! MCP `memory_delete` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_delete` MCP tool. Requires either `ids` or
/// `older_than_days`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryDeleteParams {
    /// Memory IDs (or unique prefixes) to delete.
    #[schemars(description = "Memory IDs (or unique prefixes) to delete")]
    pub ids: Option<Vec<String>>,

    /// Delete memories created more than this many days ago.
    #[schemars(description = "Delete memories created more than this many days ago")]
    pub older_than_days: Option<i64>,

    /// Restrict age-based deletion to this project.
    #[schemars(description = "Restrict age-based deletion to this project")]
    pub project: Option<String>,

    /// Restrict age-based deletion to this category.
    #[schemars(description = "Restrict age-based deletion to this category")]
    pub category: Option<String>,
}
