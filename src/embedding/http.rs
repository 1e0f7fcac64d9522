//! Shared HTTP+JSON plumbing for embedding providers.
//!
//! One client shape for every provider: JSON in, JSON out, a hard timeout,
//! and at most 256 bytes of error-body snippet on non-2xx responses.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::{Error, Result};

/// Timeout for embedding requests.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for reachability probes.
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

const ERROR_SNIPPET_LIMIT: usize = 256;

/// Build a reqwest client with the given timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Embedding(format!("build http client: {e}")))
}

/// POST `body` as JSON and decode the response, with optional bearer auth.
pub(crate) async fn post_json<B, T>(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &B,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let mut req = client.post(url).json(body);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| Error::Embedding(format!("request {url}: {e}")))?;
    decode_response(url, resp).await
}

/// GET `url` and decode the JSON response.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Embedding(format!("request {url}: {e}")))?;
    decode_response(url, resp).await
}

async fn decode_response<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.bytes().await.unwrap_or_default();
        let snippet = String::from_utf8_lossy(&body[..body.len().min(ERROR_SNIPPET_LIMIT)])
            .trim()
            .to_string();
        return Err(Error::Embedding(format!(
            "HTTP {} from {url}: {snippet}",
            status.as_u16()
        )));
    }
    resp.json::<T>()
        .await
        .map_err(|e| Error::Embedding(format!("decode response from {url}: {e}")))
}
