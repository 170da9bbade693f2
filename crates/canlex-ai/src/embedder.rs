//! HTTP client for the external multilingual embedding provider.
//!
//! The provider takes a batch of texts and returns one 1024-dimensional
//! vector per text. Responses are cached by SHA-1 of the input text for a
//! day; errors always surface to the caller (ingest retries externally,
//! the query path refuses to proceed without a query vector).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AiError;
use crate::cache::{TtlCache, sha1_hex};

/// Expected embedding dimensionality.
pub const EMBEDDING_DIM: usize = 1024;

pub struct EmbedderClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    cache: TtlCache,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl EmbedderClient {
    /// `base_url` is like `http://localhost:8801` (no trailing slash).
    pub fn new(base_url: String, model: String, cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            cache: TtlCache::new(8192, cache_ttl),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        Ok(self.embed_batch(&[text]).await?.remove(0))
    }

    /// Embed a batch, returning one vector per input in order. Cached
    /// inputs are served locally; only the misses go to the provider.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts
            .iter()
            .map(|t| format!("emb:{}:{}", self.model, sha1_hex(t)))
            .collect();

        let mut results: Vec<Option<Vec<f32>>> =
            keys.iter().map(|k| self.cache.get::<Vec<f32>>(k)).collect();

        let miss_indexes: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();

        if !miss_indexes.is_empty() {
            let miss_texts: Vec<&str> = miss_indexes.iter().map(|&i| texts[i]).collect();
            let fetched = self.request(&miss_texts).await?;
            if fetched.len() != miss_texts.len() {
                return Err(AiError::CountMismatch {
                    got: fetched.len(),
                    want: miss_texts.len(),
                });
            }
            for (&i, vector) in miss_indexes.iter().zip(fetched) {
                if vector.len() != EMBEDDING_DIM {
                    return Err(AiError::BadDimension {
                        got: vector.len(),
                        want: EMBEDDING_DIM,
                    });
                }
                self.cache.put(keys[i].clone(), &vector);
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|r| r.expect("filled above")).collect())
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        let url = format!("{}/embed", self.base_url);
        info!(count = texts.len(), url = %url, "requesting embeddings");
        let resp = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                texts: texts.to_vec(),
            })
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: EmbedResponse = resp.json().await?;
        Ok(parsed.embeddings)
    }
}
