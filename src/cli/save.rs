//! `echovault save` — store a memory from the command line.

use anyhow::{bail, Result};

use crate::memory::types::{Category, RawMemoryInput};
use crate::service::MemoryService;

/// Skeleton printed by `--details-template`.
pub const DETAILS_TEMPLATE: &str = "Context:

Options considered:
- Option A:
- Option B:

Decision:

Tradeoffs:

Follow-up:
";

pub struct SaveArgs {
    pub title: String,
    pub what: String,
    pub why: String,
    pub impact: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub related_files: Vec<String>,
    pub details: Option<String>,
    pub details_file: Option<String>,
    pub source: String,
    pub project: String,
}

pub async fn run(service: &MemoryService, args: SaveArgs) -> Result<()> {
    let details = match (&args.details, &args.details_file) {
        (Some(_), Some(_)) => {
            bail!("invalid argument: --details and --details-file are mutually exclusive")
        }
        (Some(d), None) => d.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => String::new(),
    };

    let category = match args.category.as_deref().filter(|c| !c.is_empty()) {
        Some(c) => Some(
            c.parse::<Category>()
                .map_err(|e| anyhow::anyhow!("invalid argument: {e} (expected one of: decision, pattern, bug, context, learning)"))?,
        ),
        None => None,
    };

    let raw = RawMemoryInput {
        title: args.title,
        what: args.what,
        why: args.why,
        impact: args.impact,
        tags: args.tags,
        category,
        related_files: args.related_files,
        details,
        source: args.source,
    };

    let result = service.save(raw, &args.project).await?;

    match result.action.as_str() {
        "updated" => println!("Updated memory {} ({})", short_id(&result.id), result.file_path),
        _ => println!("Saved memory {} → {}", short_id(&result.id), result.file_path),
    }
    for w in &result.warnings {
        eprintln!("warning: {w}");
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
