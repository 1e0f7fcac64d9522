//! Embedding provider speaking the OpenAI embeddings wire shape.
//!
//! OpenRouter uses the same shape with a different base URL, so the factory
//! reuses this provider for both.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::http::{build_client, post_json, HTTP_TIMEOUT};
use crate::embedding::Provider;
use crate::error::{Error, Result};

pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug)]
pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedEntry>,
}

#[derive(Deserialize)]
struct EmbedEntry {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    /// `base_url` falls back to the OpenAI endpoint when empty.
    pub fn new(model: &str, api_key: &str, base_url: &str) -> Result<Self> {
        let base_url = if base_url.is_empty() {
            DEFAULT_OPENAI_BASE
        } else {
            base_url
        };
        Ok(Self {
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(HTTP_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| Error::Embedding("openai embed: empty response".into()))
    }

    /// Embed all texts in a single API call. The response must contain
    /// exactly one entry per input; vectors are placed by their `index`
    /// field, not arrival order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let resp: EmbedResponse = post_json(
            &self.client,
            &url,
            Some(&self.api_key),
            &EmbedRequest {
                model: &self.model,
                input: texts,
            },
        )
        .await
        .map_err(|e| Error::Embedding(format!("openai embed: {e}")))?;

        if resp.data.is_empty() {
            return Err(Error::Embedding("openai embed: empty data in response".into()));
        }
        if resp.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "openai embed: expected {} embeddings, got {}",
                texts.len(),
                resp.data.len()
            )));
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for entry in resp.data {
            if entry.index >= texts.len() {
                return Err(Error::Embedding(format!(
                    "openai embed: index {} out of range for {} inputs",
                    entry.index,
                    texts.len()
                )));
            }
            results[entry.index] = Some(entry.embedding);
        }
        results
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    Error::Embedding(format!("openai embed: missing embedding for index {i}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base: &str) -> OpenAiProvider {
        OpenAiProvider::new("text-embedding-3-small", "sk-test", base).unwrap()
    }

    #[tokio::test]
    async fn embed_batch_places_vectors_by_index() {
        let server = MockServer::start().await;
        // Entries arrive out of order; placement must follow `index`.
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [2.0]},
                    {"index": 0, "embedding": [1.0]}
                ]
            })))
            .mount(&server)
            .await;

        let vs = provider(&server.uri())
            .embed_batch(&["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(vs, vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn embed_batch_rejects_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .embed_batch(&["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 embeddings"));
    }

    #[tokio::test]
    async fn embed_batch_rejects_out_of_range_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 5, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .embed_batch(&["a".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn embed_batch_rejects_missing_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .embed_batch(&["a".into()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty data"));
    }

    #[tokio::test]
    async fn embed_unwraps_single_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .mount(&server)
            .await;

        let v = provider(&server.uri()).embed("hello").await.unwrap();
        assert_eq!(v, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn non_2xx_includes_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("{\"error\":\"invalid api key\"}"),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri()).embed("x").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid api key"));
    }
}
