//! End-to-end save pipeline: markdown emission, relational insert,
//! deduplication, redaction, and graceful embedding degradation.

mod helpers;

use chrono::Utc;
use echovault::error::Error;
use echovault::memory::store;
use echovault::memory::types::{Category, RawMemoryInput};
use echovault::service::MemoryService;
use helpers::{raw, service_with_stub, service_without_embeddings};

#[tokio::test]
async fn happy_ingest_creates_memory_and_session_file() {
    let (_dir, service) = service_without_embeddings();

    let mut input = raw("Use make for builds", "All builds go through make targets");
    input.category = Some(Category::Pattern);
    let result = service.save(input, "echovault").await.unwrap();

    assert_eq!(result.action, "created");
    assert_eq!(result.id.len(), 36);

    let content = std::fs::read_to_string(&result.file_path).unwrap();
    assert!(content.contains("## Patterns"));
    assert!(content.contains("### Use make for builds"));
    assert!(content.contains("**What:** All builds go through make targets"));

    let hits = service
        .search("make", 5, Some("echovault"), None, false)
        .await
        .unwrap();
    assert_eq!(hits[0].title, "Use make for builds");
    assert_eq!(hits[0].id, result.id);
}

#[tokio::test]
async fn save_rejects_empty_project() {
    let (_dir, service) = service_without_embeddings();
    let err = service.save(raw("T", "W"), "").await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn dedup_merge_updates_existing_memory() {
    let (dir, service) = service_without_embeddings();

    let mut first = raw("Switch to WAL journaling", "Concurrent readers blocked on writes");
    first.tags = vec!["sqlite".into()];
    let created = service.save(first, "echovault").await.unwrap();
    assert_eq!(created.action, "created");

    let mut second = raw("Switch to WAL journaling", "Concurrent readers blocked on writes");
    second.tags = vec!["SQLITE".into(), "perf".into()];
    second.details = "More context discovered later".into();
    let updated = service.save(second, "echovault").await.unwrap();

    assert_eq!(updated.action, "updated");
    assert_eq!(updated.id, created.id);
    assert_eq!(service.count_memories(None, None).unwrap(), 1);

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let detail = service.get_details(&created.id).unwrap().unwrap();
    assert!(detail.body.contains(&format!("--- updated {today} ---")));
    assert!(detail.body.contains("More context discovered later"));

    // Tag merge is case-insensitive and order-preserving.
    let conn = helpers::open_index(&dir);
    let stored = store::get_memory(&conn, &created.id).unwrap().unwrap();
    assert_eq!(stored.tags, vec!["sqlite", "perf"]);
    assert_eq!(stored.updated_count, 1);
}

#[tokio::test]
async fn different_titles_do_not_merge() {
    let (_dir, service) = service_without_embeddings();

    service
        .save(raw("First topic", "shared keywords in both"), "p")
        .await
        .unwrap();
    let second = service
        .save(raw("Second topic", "shared keywords in both"), "p")
        .await
        .unwrap();

    assert_eq!(second.action, "created");
    assert_eq!(service.count_memories(None, None).unwrap(), 2);
}

#[tokio::test]
async fn redaction_scrubs_secrets_before_persistence() {
    let (dir, service) = service_without_embeddings();

    let mut input = raw("Credentials cleanup", "token=sk_live_abcdef123456 was committed");
    input.details = "found <redacted>hunter2</redacted> in history".into();
    let result = service.save(input, "p").await.unwrap();

    let conn = helpers::open_index(&dir);
    let stored = store::get_memory(&conn, &result.id).unwrap().unwrap();
    assert!(stored.what.contains("[REDACTED]"));
    assert!(!stored.what.contains("sk_live_"));

    let detail = service.get_details(&result.id).unwrap().unwrap();
    assert_eq!(detail.body, "found [REDACTED] in history");

    let markdown = std::fs::read_to_string(&result.file_path).unwrap();
    assert!(!markdown.contains("sk_live_"));
    assert!(!markdown.contains("hunter2"));
}

#[tokio::test]
async fn memoryignore_patterns_extend_redaction() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yaml"), "embedding:\n  provider: none\n").unwrap();
    std::fs::write(dir.path().join(".memoryignore"), "# internal tickets\nJIRA-[0-9]+\n").unwrap();
    let service = MemoryService::new(Some(dir.path())).unwrap();

    let result = service
        .save(raw("Ticket reference", "fixed under JIRA-4711 last week"), "p")
        .await
        .unwrap();

    let conn = echovault::db::open_database(dir.path().join("index.db")).unwrap();
    let stored = store::get_memory(&conn, &result.id).unwrap().unwrap();
    assert!(stored.what.contains("[REDACTED]"));
    assert!(!stored.what.contains("JIRA-4711"));
}

#[tokio::test]
async fn decision_without_details_carries_warning() {
    let (_dir, service) = service_without_embeddings();
    let mut input = raw("Chose rusqlite over sqlx", "Bundled build, no async ORM needed");
    input.category = Some(Category::Decision);
    let result = service.save(input, "p").await.unwrap();
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("should include details"));
}

#[tokio::test]
async fn save_with_unreachable_provider_still_succeeds() {
    // Ollama configured but nothing is listening: embedding must be a
    // non-fatal warning and FTS search must keep working.
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "embedding:\n  provider: ollama\n  base_url: http://127.0.0.1:1\n",
    )
    .unwrap();
    let service = MemoryService::new(Some(dir.path())).unwrap();

    let result = service
        .save(raw("Sqlite tips", "FTS5 with porter stemming"), "p")
        .await
        .unwrap();
    assert_eq!(result.action, "created");

    let hits = service.search("sqlite", 5, Some("p"), None, true).await.unwrap();
    assert_eq!(hits.len(), 1);

    // context.semantic=auto must not promote to vector search either: the
    // reachability probe fails and the query is served from keywords.
    let (ctx, total) = service
        .get_context(5, Some("p"), None, "sqlite", "auto", false)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(ctx.len(), 1);
}

#[tokio::test]
async fn save_with_stub_provider_stores_vector() {
    let (dir, service) = service_with_stub(4);
    service.save(raw("Vector backed", "memory"), "p").await.unwrap();

    let conn = helpers::open_index(&dir);
    assert_eq!(echovault::db::get_embedding_dim(&conn).unwrap(), Some(4));
    let vectors: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories_vec", [], |r| r.get(0))
        .unwrap();
    assert_eq!(vectors, 1);
}

#[tokio::test]
async fn count_follows_operation_log() {
    let (_dir, service) = service_without_embeddings();

    let a = service.save(raw("Alpha entry", "a"), "p").await.unwrap();
    service.save(raw("Beta entry", "b"), "p").await.unwrap();
    assert_eq!(service.count_memories(None, None).unwrap(), 2);

    assert!(service.delete(&a.id).unwrap());
    assert_eq!(service.count_memories(None, None).unwrap(), 1);
    assert!(!service.delete(&a.id).unwrap());
    assert_eq!(service.count_memories(None, None).unwrap(), 1);
}

#[tokio::test]
async fn tool_style_category_coercion_stores_context() {
    let (dir, service) = service_without_embeddings();
    let mut input = RawMemoryInput {
        category: Some(Category::coerce("nonexistent")),
        ..raw("Coerced", "category test")
    };
    input.source = "claude-code".into();
    let result = service.save(input, "p").await.unwrap();
    assert_eq!(result.action, "created");

    let conn = helpers::open_index(&dir);
    let stored = store::get_memory(&conn, &result.id).unwrap().unwrap();
    assert_eq!(stored.category, Some(Category::Context));
}
