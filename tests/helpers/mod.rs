#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

use echovault::embedding::Provider;
use echovault::error::{Error, Result};
use echovault::memory::types::RawMemoryInput;
use echovault::service::MemoryService;

/// Deterministic embedding provider for tests: a unit spike whose position
/// is derived from the text, so equal texts embed equally and the dimension
/// is fixed.
#[derive(Debug)]
pub struct StubProvider {
    pub dim: usize,
    pub fail: bool,
}

impl StubProvider {
    pub fn with_dim(dim: usize) -> Self {
        Self { dim, fail: false }
    }

    pub fn failing() -> Self {
        Self { dim: 4, fail: true }
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(Error::Embedding("stub provider offline".into()));
        }
        Ok(deterministic_embedding(self.dim, text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// Unit spike at a text-derived position.
pub fn deterministic_embedding(dim: usize, text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    let pos = text.bytes().map(|b| b as usize).sum::<usize>() % dim;
    v[pos] = 1.0;
    v
}

/// A temp vault with embeddings disabled.
pub fn service_without_embeddings() -> (TempDir, MemoryService) {
    let dir = tempfile::tempdir().unwrap();
    write_none_config(dir.path());
    let service = MemoryService::new(Some(dir.path())).unwrap();
    (dir, service)
}

/// A temp vault with an injected stub provider of the given dimension.
pub fn service_with_stub(dim: usize) -> (TempDir, MemoryService) {
    let dir = tempfile::tempdir().unwrap();
    write_none_config(dir.path());
    let service =
        MemoryService::with_provider(dir.path(), Some(Arc::new(StubProvider::with_dim(dim))))
            .unwrap();
    (dir, service)
}

/// Re-open an existing vault with a different injected provider.
pub fn reopen_with_provider(
    dir: &TempDir,
    provider: Option<Arc<dyn Provider>>,
) -> MemoryService {
    MemoryService::with_provider(dir.path(), provider).unwrap()
}

fn write_none_config(home: &std::path::Path) {
    std::fs::write(home.join("config.yaml"), "embedding:\n  provider: none\n").unwrap();
}

/// Minimal raw input with the given title and what.
pub fn raw(title: &str, what: &str) -> RawMemoryInput {
    RawMemoryInput {
        title: title.into(),
        what: what.into(),
        ..Default::default()
    }
}

/// Open a second connection to the vault's index for direct assertions.
pub fn open_index(dir: &TempDir) -> rusqlite::Connection {
    echovault::db::open_database(dir.path().join("index.db")).unwrap()
}
