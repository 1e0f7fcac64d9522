//! `echovault search` and `echovault details`.

use anyhow::Result;

use crate::service::MemoryService;

pub async fn run_search(
    service: &MemoryService,
    query: &str,
    limit: usize,
    project: Option<&str>,
    source: Option<&str>,
    no_vectors: bool,
) -> Result<()> {
    let results = service
        .search(query, limit, project, source, !no_vectors)
        .await?;

    if results.is_empty() {
        println!("No memories found for \"{query}\"");
        return Ok(());
    }

    for r in &results {
        let date: String = r.created_at.chars().take(10).collect();
        let category = if r.category.is_empty() {
            String::new()
        } else {
            format!(" [{}]", r.category)
        };
        println!(
            "{}  {:.2}  {}{}  ({}, {})",
            &r.id[..8.min(r.id.len())],
            r.score,
            r.title,
            category,
            r.project,
            date,
        );
        if !r.what.is_empty() {
            println!("          {}", r.what);
        }
        if r.has_details {
            println!("          (details available: echovault details {})", &r.id[..8.min(r.id.len())]);
        }
    }
    Ok(())
}

pub fn run_details(service: &MemoryService, id: &str) -> Result<()> {
    match service.get_details(id)? {
        Some(detail) => {
            println!("{}", detail.body);
            Ok(())
        }
        None => {
            println!("No details found for {id}");
            Ok(())
        }
    }
}
