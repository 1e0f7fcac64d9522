//! Obsidian-compatible session markdown files.
//!
//! One file per project per day (`YYYY-MM-DD-session.md`). Sections are
//! additive: the emitter re-reads the file on every write and only ever
//! appends — existing sections are never rewritten.

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::memory::types::{Category, Memory};

/// Render a single `### Title` block for a memory.
pub fn render_section(mem: &Memory, details: &str) -> String {
    let mut s = String::new();
    s.push_str("### ");
    s.push_str(&mem.title);
    s.push_str("\n**What:** ");
    s.push_str(&mem.what);
    if !mem.why.is_empty() {
        s.push_str("\n**Why:** ");
        s.push_str(&mem.why);
    }
    if !mem.impact.is_empty() {
        s.push_str("\n**Impact:** ");
        s.push_str(&mem.impact);
    }
    if !mem.source.is_empty() {
        s.push_str("\n**Source:** ");
        s.push_str(&mem.source);
    }
    if !details.is_empty() {
        s.push_str("\n\n<details>\n");
        s.push_str(details);
        s.push_str("\n</details>");
    }
    s
}

/// Create or append to the `<date_str>-session.md` file inside
/// `vault_project_dir`. The directory must already exist.
pub fn write_session_memory(
    vault_project_dir: &Path,
    mem: &Memory,
    date_str: &str,
    details: &str,
) -> Result<()> {
    let file_path = vault_project_dir.join(format!("{date_str}-session.md"));
    let section = render_section(mem, details);

    let content = if file_path.exists() {
        let existing =
            std::fs::read_to_string(&file_path).map_err(|e| Error::io(&file_path, e))?;
        append_to_session_file(&existing, mem, &section)
    } else {
        create_new_session_file(mem, date_str, &section)
    };

    std::fs::write(&file_path, content).map_err(|e| Error::io(&file_path, e))
}

// ---------------------------------------------------------------------------
// File creation
// ---------------------------------------------------------------------------

fn create_new_session_file(mem: &Memory, date_str: &str, section: &str) -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let tags = sorted_uniq(mem.tags.iter().cloned());

    let mut s = String::new();
    s.push_str("---\n");
    s.push_str("project: ");
    s.push_str(&mem.project);
    s.push('\n');
    if mem.source.is_empty() {
        s.push_str("sources: []\n");
    } else {
        s.push_str("sources: [");
        s.push_str(&mem.source);
        s.push_str("]\n");
    }
    s.push_str("created: ");
    s.push_str(&now);
    s.push('\n');
    s.push_str("tags: [");
    s.push_str(&tags.join(", "));
    s.push_str("]\n");
    s.push_str("---\n");
    s.push_str("\n# ");
    s.push_str(date_str);
    s.push_str(" Session\n");

    if let Some(category) = mem.category {
        s.push_str("\n## ");
        s.push_str(category.heading());
        s.push('\n');
    }

    s.push('\n');
    s.push_str(section);
    s.push('\n');
    s
}

// ---------------------------------------------------------------------------
// File appending
// ---------------------------------------------------------------------------

fn append_to_session_file(content: &str, mem: &Memory, section: &str) -> String {
    let (frontmatter, body) = split_frontmatter(content);
    let updated_fm = update_frontmatter(&frontmatter, mem);
    let updated_body = insert_section_in_body(&body, mem, section);
    format!("{updated_fm}\n{updated_body}")
}

/// Split YAML front-matter from the body. Returns `("", content)` when no
/// front-matter is detected.
fn split_frontmatter(content: &str) -> (String, String) {
    let parts: Vec<&str> = content.splitn(3, "---\n").collect();
    if parts.len() >= 3 {
        (format!("---\n{}---", parts[1]), parts[2].to_string())
    } else {
        (String::new(), content.to_string())
    }
}

/// Extracts the contents of `[...]` on a YAML line.
static INLINE_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]").expect("valid regex"));

fn parse_inline_array(line: &str) -> Vec<String> {
    INLINE_ARRAY
        .captures(line)
        .map(|m| {
            m[1].split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Merge the new memory's tags and source into the existing front-matter.
fn update_frontmatter(frontmatter: &str, mem: &Memory) -> String {
    let lines: Vec<&str> = frontmatter.split('\n').collect();

    let mut existing_tags = Vec::new();
    let mut existing_sources = Vec::new();
    for line in &lines {
        if line.starts_with("tags:") {
            existing_tags = parse_inline_array(line);
        } else if line.starts_with("sources:") {
            existing_sources = parse_inline_array(line);
        }
    }

    let all_tags = sorted_uniq(existing_tags.into_iter().chain(mem.tags.iter().cloned()));

    let mut all_sources = existing_sources;
    if !mem.source.is_empty() && !all_sources.contains(&mem.source) {
        all_sources.push(mem.source.clone());
    }

    lines
        .iter()
        .map(|line| {
            if line.starts_with("tags:") {
                format!("tags: [{}]", all_tags.join(", "))
            } else if line.starts_with("sources:") {
                format!("sources: [{}]", all_sources.join(", "))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Body insertion
// ---------------------------------------------------------------------------

fn insert_section_in_body(body: &str, mem: &Memory, section: &str) -> String {
    let Some(category) = mem.category else {
        return format!("{}\n\n{}\n", body.trim_end_matches('\n'), section);
    };

    let h2_marker = format!("## {}", category.heading());
    if body.contains(&h2_marker) {
        append_under_existing_category(body, category.heading(), section)
    } else {
        insert_new_category(body, category, section)
    }
}

/// Append `section` after the last existing content under the matching H2,
/// just before the next H2 or EOF.
fn append_under_existing_category(body: &str, heading: &str, section: &str) -> String {
    let target = format!("## {heading}");
    let lines: Vec<&str> = body.split('\n').collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len() + 4);
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        result.push(line.to_string());

        if line == target {
            i += 1;
            // Copy trailing blank lines after the heading.
            while i < lines.len() && lines[i].trim().is_empty() {
                result.push(lines[i].to_string());
                i += 1;
            }
            // Copy all content until the next H2 (or EOF).
            while i < lines.len() && !lines[i].starts_with("## ") {
                result.push(lines[i].to_string());
                i += 1;
            }
            result.push(String::new());
            result.push(section.to_string());
            continue;
        }
        i += 1;
    }

    format!("{}\n", result.join("\n"))
}

/// Insert a new `## <heading>` block in canonical category order.
fn insert_new_category(body: &str, category: Category, section: &str) -> String {
    let target_idx = category.index();
    let lines: Vec<&str> = body.split('\n').collect();
    let mut insert_pos = lines.len();

    for (i, line) in lines.iter().enumerate() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some(existing) = Category::from_heading(heading) {
                if existing.index() > target_idx {
                    insert_pos = i;
                }
            }
            if insert_pos < lines.len() {
                break;
            }
        }
    }

    let mut merged: Vec<String> = lines[..insert_pos].iter().map(|s| s.to_string()).collect();
    merged.push(format!("## {}", category.heading()));
    merged.push(String::new());
    merged.push(section.to_string());
    merged.push(String::new());
    merged.extend(lines[insert_pos..].iter().map(|s| s.to_string()));

    format!("{}\n", merged.join("\n").trim_end_matches('\n'))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sorted_uniq(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<String> = items
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect();
    out.sort();
    out
}
