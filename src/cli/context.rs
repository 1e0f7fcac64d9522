//! `echovault context` and `echovault sessions`.

use anyhow::Result;

use crate::service::MemoryService;

pub async fn run_context(
    service: &MemoryService,
    limit: usize,
    project: Option<&str>,
    query: &str,
) -> Result<()> {
    let (results, total) = service
        .get_context(
            limit,
            project,
            None,
            query,
            "",
            service.config.context.topup_recent,
        )
        .await?;

    if results.is_empty() {
        match project {
            Some(p) => println!("No memories found for project \"{p}\""),
            None => println!("No memories found"),
        }
        return Ok(());
    }

    println!("Showing {} of {} memories:", results.len(), total);
    for r in &results {
        let date: String = r.created_at.chars().take(10).collect();
        let category = if r.category.is_empty() {
            String::new()
        } else {
            format!(" [{}]", r.category)
        };
        let tags = if r.tags.is_empty() {
            String::new()
        } else {
            format!("  #{}", r.tags.join(" #"))
        };
        println!(
            "{}  {}  {}{}{}",
            &r.id[..8.min(r.id.len())],
            date,
            r.title,
            category,
            tags,
        );
    }
    Ok(())
}

/// List recent session markdown files across the vault, newest first.
pub fn run_sessions(service: &MemoryService, limit: usize, project: Option<&str>) -> Result<()> {
    let mut sessions: Vec<(String, String)> = Vec::new();

    let entries = match std::fs::read_dir(&service.vault_dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No sessions found");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let proj = entry.file_name().to_string_lossy().into_owned();
        if project.is_some_and(|p| p != proj) {
            continue;
        }
        for file in std::fs::read_dir(entry.path())?.flatten() {
            let name = file.file_name().to_string_lossy().into_owned();
            if name.ends_with("-session.md") {
                sessions.push((proj.clone(), name));
            }
        }
    }

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    // Filenames are date-prefixed, so a lexicographic sort is a date sort.
    sessions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sessions.truncate(limit);

    for (proj, name) in &sessions {
        let date = name.trim_end_matches("-session.md");
        println!("{date}  {proj}  {}", service.vault_dir.join(proj).join(name).display());
    }
    Ok(())
}
