//! Session-file behavior through the full save pipeline: one file per
//! project per day, category-ordered sections, merged front-matter.

mod helpers;

use chrono::Utc;
use echovault::memory::types::{Category, RawMemoryInput};
use helpers::{raw, service_without_embeddings};

fn categorized(title: &str, what: &str, category: Category, source: &str) -> RawMemoryInput {
    RawMemoryInput {
        category: Some(category),
        source: source.into(),
        ..raw(title, what)
    }
}

#[tokio::test]
async fn one_file_per_project_per_day() {
    let (_dir, service) = service_without_embeddings();

    let first = service
        .save(categorized("Alpha memory", "first", Category::Context, "claude-code"), "proj")
        .await
        .unwrap();
    let second = service
        .save(categorized("Beta memory", "second", Category::Context, "claude-code"), "proj")
        .await
        .unwrap();

    assert_eq!(first.file_path, second.file_path);
    let today = Utc::now().format("%Y-%m-%d").to_string();
    assert!(first.file_path.ends_with(&format!("proj/{today}-session.md")));

    let content = std::fs::read_to_string(&first.file_path).unwrap();
    assert_eq!(content.matches("## Context").count(), 1);
    assert!(content.contains("### Alpha memory"));
    assert!(content.contains("### Beta memory"));
}

#[tokio::test]
async fn projects_get_separate_files() {
    let (_dir, service) = service_without_embeddings();

    let a = service.save(raw("In alpha", "w"), "alpha").await.unwrap();
    let b = service.save(raw("In beta", "w"), "beta").await.unwrap();
    assert_ne!(a.file_path, b.file_path);
    assert!(a.file_path.contains("/alpha/"));
    assert!(b.file_path.contains("/beta/"));
}

#[tokio::test]
async fn sections_follow_canonical_category_order() {
    let (_dir, service) = service_without_embeddings();

    // Saved out of order on purpose.
    for (title, category) in [
        ("Learned thing", Category::Learning),
        ("Fixed crash", Category::Bug),
        ("Chose sqlite", Category::Decision),
    ] {
        service
            .save(categorized(title, "body", category, ""), "proj")
            .await
            .unwrap();
    }

    let (results, _) = service
        .get_context(10, Some("proj"), None, "", "never", false)
        .await
        .unwrap();
    let content = std::fs::read_to_string(
        service_path(&service, "proj"),
    )
    .unwrap();
    assert_eq!(results.len(), 3);

    let decisions = content.find("## Decisions").unwrap();
    let bugs = content.find("## Bugs Fixed").unwrap();
    let learnings = content.find("## Learnings").unwrap();
    assert!(decisions < bugs);
    assert!(bugs < learnings);
}

#[tokio::test]
async fn frontmatter_accumulates_tags_and_sources() {
    let (_dir, service) = service_without_embeddings();

    let mut first = categorized("First entry", "w", Category::Context, "claude-code");
    first.tags = vec!["rust".into(), "sqlite".into()];
    service.save(first, "proj").await.unwrap();

    let mut second = categorized("Second entry", "w", Category::Context, "codex");
    second.tags = vec!["fts".into(), "rust".into()];
    service.save(second, "proj").await.unwrap();

    let content = std::fs::read_to_string(service_path(&service, "proj")).unwrap();
    assert!(content.starts_with("---\n"));
    assert!(content.contains("tags: [fts, rust, sqlite]"));
    assert!(content.contains("sources: [claude-code, codex]"));
    assert!(content.contains("**Source:** codex"));
}

#[tokio::test]
async fn details_render_collapsed() {
    let (_dir, service) = service_without_embeddings();

    let mut input = categorized("With body", "w", Category::Learning, "");
    input.details = "Context: the long form explanation".into();
    service.save(input, "proj").await.unwrap();

    let content = std::fs::read_to_string(service_path(&service, "proj")).unwrap();
    assert!(content.contains("<details>\nContext: the long form explanation\n</details>"));
}

fn service_path(service: &echovault::service::MemoryService, project: &str) -> std::path::PathBuf {
    let today = Utc::now().format("%Y-%m-%d").to_string();
    service
        .vault_dir
        .join(project)
        .join(format!("{today}-session.md"))
}
