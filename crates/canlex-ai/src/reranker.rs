//! HTTP client for the external cross-encoder reranking provider.
//!
//! Scores (query, document) pairs jointly. Caching, threshold filtering
//! and the similarity-order fallback live in the search crate; this client
//! only speaks the wire protocol.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AiError;

pub struct CrossEncoderClient {
    client: reqwest::Client,
    base_url: String,
    model_en: String,
    model_fr: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

impl CrossEncoderClient {
    /// `base_url` is like `http://localhost:8802` (no trailing slash).
    /// Each language gets its preferred model variant.
    pub fn new(base_url: String, model_en: String, model_fr: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_en,
            model_fr,
        }
    }

    pub fn model_for(&self, language: canlex_core::types::Language) -> &str {
        match language {
            canlex_core::types::Language::En => &self.model_en,
            canlex_core::types::Language::Fr => &self.model_fr,
        }
    }

    /// Relevance scores for each document against the query, in input
    /// order.
    pub async fn scores(
        &self,
        model: &str,
        query: &str,
        documents: &[&str],
    ) -> Result<Vec<f32>, AiError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/rerank", self.base_url);
        info!(count = documents.len(), model, url = %url, "requesting rerank scores");
        let resp = self
            .client
            .post(&url)
            .json(&RerankRequest {
                model,
                query,
                documents: documents.to_vec(),
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
        let parsed: RerankResponse = resp.json().await?;
        if parsed.scores.len() != documents.len() {
            return Err(AiError::CountMismatch {
                got: parsed.scores.len(),
                want: documents.len(),
            });
        }
        Ok(parsed.scores)
    }
}
