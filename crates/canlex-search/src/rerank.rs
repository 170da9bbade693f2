//! Cross-encoder reranking with caching and graceful degradation.
//!
//! The provider scores (query, document) pairs jointly; scores replace the
//! hybrid similarity on the surviving results. When the provider errors,
//! candidates come back sorted by their original similarity instead — a
//! silently degraded request beats a failed one, so the fallback logs at
//! debug level only.

use std::sync::Arc;

use tracing::debug;

use canlex_core::RetrievalConfig;
use canlex_core::types::Language;
use canlex_ai::{CrossEncoderClient, TtlCache, sha1_hex};

use crate::result::SearchResult;

pub struct Reranker {
    client: Arc<CrossEncoderClient>,
    cache: TtlCache,
    config: RetrievalConfig,
}

impl Reranker {
    pub fn new(client: Arc<CrossEncoderClient>, config: RetrievalConfig) -> Self {
        let cache = TtlCache::new(1024, config.rerank_cache_ttl);
        Self {
            client,
            cache,
            config,
        }
    }

    /// Rerank candidates, returning at most `top_n`, each carrying its
    /// original similarity and rerank score (with `similarity` set to the
    /// rerank score). Entries scoring below the floor are dropped.
    pub async fn rerank(
        &self,
        query: &str,
        language: Language,
        candidates: Vec<SearchResult>,
        top_n: usize,
    ) -> Vec<SearchResult> {
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let model = self.client.model_for(language).to_string();
        let cache_key = self.cache_key(query, &model, &candidates, top_n);
        if !self.config.cache_bypass {
            if let Some(cached) = self.cache.get::<Vec<SearchResult>>(&cache_key) {
                debug!(key = %cache_key, "rerank cache hit");
                return cached;
            }
        }

        let documents: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
        let scores = match self.client.scores(&model, query, &documents).await {
            Ok(scores) => scores,
            Err(e) => {
                debug!(error = %e, "reranker unavailable; falling back to similarity order");
                return similarity_fallback(candidates, top_n);
            }
        };

        let mut reranked: Vec<SearchResult> = candidates
            .into_iter()
            .zip(scores)
            .map(|(mut result, score)| {
                result.original_similarity = Some(result.similarity);
                result.rerank_score = Some(score);
                result.similarity = score;
                result
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(top_n);
        reranked.retain(|r| r.similarity >= self.config.min_rerank_score);

        if !self.config.cache_bypass {
            self.cache.put(cache_key, &reranked);
        }
        reranked
    }

    fn cache_key(
        &self,
        query: &str,
        model: &str,
        candidates: &[SearchResult],
        top_n: usize,
    ) -> String {
        let ids: String = candidates
            .iter()
            .map(|c| c.resource_key.as_str())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}:rerank:{}:{}:{}:{}",
            self.config.cache_namespace,
            model,
            sha1_hex(query),
            sha1_hex(&ids),
            top_n
        )
    }
}

/// Provider failure path: original similarity order, no score filtering.
fn similarity_fallback(mut candidates: Vec<SearchResult>, top_n: usize) -> Vec<SearchResult> {
    for candidate in &mut candidates {
        candidate.original_similarity = Some(candidate.similarity);
    }
    candidates.sort_by(|a, b| {
        b.original_similarity
            .partial_cmp(&a.original_similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_n);
    candidates
}
