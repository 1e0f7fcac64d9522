//! Core memory type definitions.
//!
//! Defines [`Category`] (the five memory categories and their session-file
//! headings), [`RawMemoryInput`] (caller-supplied data before redaction),
//! [`Memory`] (a fully processed record), and the result types returned by
//! the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The five memory categories, in canonical session-file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Chose X over Y — architectural or design decisions.
    Decision,
    /// Reusable gotcha or convention discovered in the codebase.
    Pattern,
    /// A fixed problem, with root cause and solution.
    Bug,
    /// Project setup, architecture, or environment knowledge.
    Context,
    /// Non-obvious discovery that is not a pattern or a bug.
    Learning,
}

/// Canonical category ordering used for section placement in session files.
pub const ALL_CATEGORIES: [Category; 5] = [
    Category::Decision,
    Category::Pattern,
    Category::Bug,
    Category::Context,
    Category::Learning,
];

impl Category {
    /// SQL- and YAML-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Pattern => "pattern",
            Self::Bug => "bug",
            Self::Context => "context",
            Self::Learning => "learning",
        }
    }

    /// Markdown H2 heading used in session files.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Decision => "Decisions",
            Self::Pattern => "Patterns",
            Self::Bug => "Bugs Fixed",
            Self::Context => "Context",
            Self::Learning => "Learnings",
        }
    }

    /// Position in the canonical ordering.
    pub fn index(&self) -> usize {
        ALL_CATEGORIES
            .iter()
            .position(|c| c == self)
            .unwrap_or(ALL_CATEGORIES.len())
    }

    /// Resolve a category from its H2 heading text.
    pub fn from_heading(heading: &str) -> Option<Self> {
        ALL_CATEGORIES.into_iter().find(|c| c.heading() == heading)
    }

    /// Tool-surface coercion: unknown or empty input becomes `Context`.
    pub fn coerce(s: &str) -> Self {
        s.parse().unwrap_or(Self::Context)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(Self::Decision),
            "pattern" => Ok(Self::Pattern),
            "bug" => Ok(Self::Bug),
            "context" => Ok(Self::Context),
            "learning" => Ok(Self::Learning),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}

/// Caller-supplied memory data, before redaction and ID generation.
#[derive(Debug, Clone, Default)]
pub struct RawMemoryInput {
    pub title: String,
    pub what: String,
    pub why: String,
    pub impact: String,
    pub tags: Vec<String>,
    pub category: Option<Category>,
    pub related_files: Vec<String>,
    /// Extended body stored in `memory_details`.
    pub details: String,
    /// Agent identifier, e.g. "claude-code".
    pub source: String,
}

/// A fully processed memory record, matching the `memories` table.
#[derive(Debug, Clone)]
pub struct Memory {
    /// Canonical 36-character UUID v4.
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
    /// Absolute path of the Markdown session file containing this record.
    pub file_path: String,
    /// Lowercase hyphenated slug derived from the title.
    pub section_anchor: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    /// Construct a `Memory` from raw input: assigns a fresh UUID, derives the
    /// section anchor, and stamps creation/update times.
    pub fn from_raw(raw: &RawMemoryInput, project: &str, file_path: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: raw.title.clone(),
            what: raw.what.clone(),
            why: raw.why.clone(),
            impact: raw.impact.clone(),
            tags: raw.tags.clone(),
            category: raw.category,
            project: project.to_string(),
            source: raw.source.clone(),
            related_files: raw.related_files.clone(),
            file_path: file_path.to_string(),
            section_anchor: section_anchor(&raw.title),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Extended body text for a memory. At most one per memory.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryDetail {
    pub memory_id: String,
    pub body: String,
}

/// Returned from save and replace operations.
#[derive(Debug, Clone, Serialize)]
pub struct SaveResult {
    pub id: String,
    pub file_path: String,
    /// "created", "updated", or "replaced".
    pub action: String,
    pub warnings: Vec<String>,
}

/// Returned from reindex.
#[derive(Debug, Clone, Serialize)]
pub struct ReindexResult {
    pub count: usize,
    pub dim: usize,
    pub model: String,
}

static NON_ALNUM: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Convert a title to a lowercase hyphenated anchor slug.
pub fn section_anchor(title: &str) -> String {
    let lower = title.to_lowercase();
    NON_ALNUM
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}
