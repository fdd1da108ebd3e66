use crate::circuit_breaker::{create_embedding_circuit_breaker, EmbeddingCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use failsafe::futures::CircuitBreaker;
use moka::future::Cache;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Turns text into fixed-length vectors.
pub trait Embedder: Send + Sync {
    /// Embeds one text. Never returns an empty vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, AppError>> + Send;

    /// Embeds several texts in one call; output order matches input order.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, AppError>> + Send;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Embeddings are deterministic per model, so single-text results are cached
/// (1 hour TTL, 10k entries) under a SHA-256 of model and text. Requests go
/// through a circuit breaker shared by all clones.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    cache: Cache<String, Arc<Vec<f32>>>,
    breaker: EmbeddingCircuitBreaker,
}

impl EmbeddingClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create embedding client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.embedding_base_url.trim_end_matches('/').to_string(),
            api_key: config.embedding_api_key.clone(),
            model: config.embedding_model.clone(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(3600))
                .max_capacity(10_000)
                .build(),
            breaker: create_embedding_circuit_breaker(),
        })
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model.as_bytes());
        hasher.update(b"\n");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        match self.breaker.call(self.call_service(texts)).await {
            Ok(vectors) => Ok(vectors),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Embedding circuit breaker is OPEN, rejecting request");
                Err(AppError::ExternalApiError(
                    "Embedding service unavailable (circuit open)".to_string(),
                ))
            }
        }
    }

    async fn call_service(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ExternalApiError("Embedding API key is not configured".to_string())
        })?;

        let url = format!("{}/embeddings", self.base_url);
        tracing::info!(
            "Requesting {} embedding(s) from model {}",
            texts.len(),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Embedding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Embedding service returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Embedding service returned status {}: {}",
                status, error_text
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse embedding response: {}", e))
        })?;

        let vectors = parse_embedding_response(&data)?;
        if vectors.len() != texts.len() {
            return Err(AppError::ExternalApiError(format!(
                "Embedding service returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }
}

impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let key = self.cache_key(text);
        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("Embedding cache hit");
            return Ok(cached.as_ref().clone());
        }

        let vector = self
            .request_embeddings(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::ExternalApiError("Embedding response contained no vectors".to_string())
            })?;

        self.cache.insert(key, Arc::new(vector.clone())).await;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }
}

/// Extracts vectors from `{"data": [{"index", "embedding"}]}`, ordered by index.
pub fn parse_embedding_response(data: &Value) -> Result<Vec<Vec<f32>>, AppError> {
    let items = data.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        AppError::ExternalApiError("Embedding response is missing data array".to_string())
    })?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(items.len());
    for (fallback_index, item) in items.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(fallback_index);
        let values = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                AppError::ExternalApiError("Embedding item missing embedding array".to_string())
            })?;

        let vector = values
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    AppError::ExternalApiError("Embedding value must be numeric".to_string())
                })
            })
            .collect::<Result<Vec<f32>, AppError>>()?;

        if vector.is_empty() {
            return Err(AppError::ExternalApiError(
                "Embedding service returned an empty vector".to_string(),
            ));
        }
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}
