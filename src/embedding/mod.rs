//! Embedding provider abstraction and the config-driven factory.
//!
//! The service consumes only the [`Provider`] capability; the concrete
//! implementations are thin HTTP clients over provider-specific wire shapes.

pub mod http;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

pub use ollama::{is_model_loaded, OllamaProvider};
pub use openai::OpenAiProvider;

const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434";

/// Capability for turning text into fixed-width f32 vectors.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Embed a single text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Construct a provider from the embedding configuration.
///
/// Returns `Ok(None)` when the provider is `""` or `"none"` — running
/// without embeddings is a supported mode, not an error.
pub fn create_provider(cfg: &EmbeddingConfig) -> Result<Option<Arc<dyn Provider>>> {
    match cfg.provider.as_str() {
        "ollama" => {
            let base_url = if cfg.base_url.is_empty() {
                OLLAMA_DEFAULT_BASE
            } else {
                &cfg.base_url
            };
            Ok(Some(Arc::new(OllamaProvider::new(&cfg.model, base_url)?)))
        }
        "openai" => Ok(Some(Arc::new(OpenAiProvider::new(
            &cfg.model,
            &cfg.api_key,
            &cfg.base_url,
        )?))),
        "openrouter" => {
            let base_url = if cfg.base_url.is_empty() {
                OPENROUTER_BASE
            } else {
                &cfg.base_url
            };
            Ok(Some(Arc::new(OpenAiProvider::new(
                &cfg.model,
                &cfg.api_key,
                base_url,
            )?)))
        }
        "" | "none" => Ok(None),
        other => Err(Error::Config(format!("unknown embedding provider: {other}"))),
    }
}
