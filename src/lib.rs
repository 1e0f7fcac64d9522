//! Persistent memory for coding agents.
//!
//! EchoVault stores short structured records captured during agent sessions —
//! decisions, bug fixes, patterns, learnings, project context — and lets
//! future sessions retrieve them through hybrid keyword + semantic search.
//! Every memory is written twice: as a human-readable Markdown session file
//! (Obsidian-compatible) and as indexed rows in an embedded SQLite database.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with FTS5 (BM25, porter stemmer) for keyword search
//!   and [sqlite-vec](https://github.com/asg017/sqlite-vec) for vector search
//! - **Embeddings**: remote HTTP providers (Ollama, OpenAI, OpenRouter)
//!   behind one trait; the store degrades gracefully without them
//! - **Search**: tiered — FTS first, vectors only when keyword results are
//!   sparse, merged with 0.3/0.7 weighting
//! - **Transport**: MCP over stdio, plus a small CLI
//!
//! # Modules
//!
//! - [`config`] — per-vault YAML configuration and memory-home resolution
//! - [`db`] — SQLite initialization, FTS triggers, vector-table lifecycle
//! - [`embedding`] — embedding provider trait and HTTP implementations
//! - [`markdown`] — session-file emitter
//! - [`memory`] — types, relational CRUD, and hybrid search
//! - [`redaction`] — three-layer secret scrubbing
//! - [`service`] — the orchestrator tying everything together

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod markdown;
pub mod memory;
pub mod redaction;
pub mod service;
