//! MCP `memory_replace` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_replace` MCP tool. Every mutable field of the
/// target memory is overwritten with these values.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryReplaceParams {
    /// ID (or unique prefix) of the memory to replace.
    #[schemars(description = "ID (or unique prefix) of the memory to replace")]
    pub id: String,

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
    #[schemars(description = "One of: decision, bug, pattern, learning, context")]
    pub category: Option<String>,

    /// File paths involved.
    #[schemars(description = "File paths involved")]
    pub related_files: Option<Vec<String>>,

    /// Replacement extended body; empty removes the existing one.
    #[schemars(description = "Replacement extended body; empty removes the existing one")]
    pub details: Option<String>,
}
