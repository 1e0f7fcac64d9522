//! Embedding provider backed by a local Ollama daemon.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::http::{build_client, get_json, post_json, HTTP_TIMEOUT, PROBE_TIMEOUT};
use crate::embedding::Provider;
use crate::error::{Error, Result};

/// Calls `POST /api/embeddings` on a local Ollama server.
#[derive(Debug)]
pub struct OllamaProvider {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaProvider {
    pub fn new(model: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(HTTP_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let resp: EmbedResponse = post_json(
            &self.client,
            &url,
            None,
            &EmbedRequest {
                model: &self.model,
                prompt: text,
            },
        )
        .await
        .map_err(|e| Error::Embedding(format!("ollama embed: {e}")))?;

        if resp.embedding.is_empty() {
            return Err(Error::Embedding("ollama embed: empty embedding returned".into()));
        }
        Ok(resp.embedding)
    }

    /// Ollama has no batch endpoint; embed sequentially, failing on the
    /// first error.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for t in texts {
            results.push(self.embed(t).await?);
        }
        Ok(results)
    }
}

#[derive(Deserialize)]
struct PsResponse {
    #[serde(default)]
    models: Vec<PsModel>,
}

#[derive(Deserialize)]
struct PsModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    model: String,
}

/// True if `model` is currently loaded in the Ollama server.
///
/// Probes `GET /api/ps` with a 500 ms deadline; any error yields `false`.
pub async fn is_model_loaded(model: &str, base_url: &str) -> bool {
    let Ok(client) = build_client(PROBE_TIMEOUT) else {
        return false;
    };
    let url = format!("{}/api/ps", base_url.trim_end_matches('/'));
    let Ok(resp) = get_json::<PsResponse>(&client, &url).await else {
        return false;
    };

    let target = normalize_model_name(model);
    resp.models.iter().any(|m| {
        let name = if m.name.is_empty() { &m.model } else { &m.name };
        normalize_model_name(name) == target
    })
}

/// Strip the `:tag` suffix (e.g. "nomic-embed-text:latest" → "nomic-embed-text").
fn normalize_model_name(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}
