//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and two implementations:
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible `/embeddings`
//!   endpoint with batching, retry, and backoff.
//! - **[`DisabledEmbedder`]** — fails with `BackendUnavailable`; used when
//!   embeddings are not configured.
//!
//! Every vector handed to callers is L2-normalized, so cosine similarity and
//! inner product coincide downstream.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::RagError;

/// Capability interface for embedding backends. Same text + same model
/// version must yield the same vector; the pipeline treats the backend as a
/// pure function.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one unit-norm vector per text in
    /// input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier (e.g. `"BAAI/bge-m3"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality.
    fn dims(&self) -> usize;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Inner product of two vectors; on unit-norm inputs this is cosine
/// similarity. Returns 0.0 for mismatched lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============ Disabled Embedder ============

/// Placeholder embedder used when no provider is configured. Any embedding
/// attempt fails with `BackendUnavailable`, which the index build treats as
/// fatal.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::backend_unavailable(
            "embedding",
            "provider is disabled; set [embedding] provider in config",
        )
        .into())
    }

    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }
}

// ============ OpenAI-compatible Embedder ============

/// Embedding provider for OpenAI-compatible APIs.
///
/// Posts to `{base_url}/embeddings` with the configured model. The API key
/// is taken from the `OPENAI_API_KEY` environment variable when the client
/// is constructed.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("embedding.model required for openai provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            RagError::Configuration("embedding.dims required for openai provider".to_string())
        })?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let url = format!("{}/embeddings", self.base_url);

        let mut last_err: Option<anyhow::Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("embedding API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("embedding API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(
                        RagError::backend_unavailable("embedding", e.to_string()).into(),
                    );
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            RagError::backend_unavailable("embedding", "all retries exhausted").into()
        }))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = self.embed_batch(texts).await?;
        for v in vectors.iter_mut() {
            l2_normalize(v);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Extract the `data[].embedding` arrays from an embeddings API response,
/// in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Create the configured [`Embedder`].
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => Err(RagError::Configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))
        .into()),
    }
}
