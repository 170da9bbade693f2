//! Retrieval pipeline configuration knobs and their defaults.

use std::time::Duration;

/// Tunable parameters for chunking, search, reranking, assembly and
/// hydration. One instance is shared across the pipeline; constructing it
/// with [`Default::default`] gives the production values.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Chunk token budget for long section content.
    pub chunk_token_budget: usize,
    /// Token overlap between consecutive chunks.
    pub chunk_token_overlap: usize,
    /// Hard ceiling on any search `limit`.
    pub max_limit: usize,
    /// Vector-similarity floor when the caller does not set one.
    pub default_similarity_threshold: f32,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    /// Cross-encoder scores below this are dropped after reranking.
    pub min_rerank_score: f32,
    /// How many candidates the facade fetches before reranking.
    pub candidate_limit: usize,
    /// Defined-term similarity boost in `search_with_definitions`.
    pub defined_term_boost: f32,
    pub max_sections_to_hydrate: usize,
    /// Hard cap on hydrated markdown size, in characters.
    pub max_markdown_size: usize,
    /// A table of contents is rendered only above this section count.
    pub toc_min_sections: usize,
    pub toc_max_entries: usize,
    pub embedding_cache_ttl: Duration,
    pub search_cache_ttl: Duration,
    pub rerank_cache_ttl: Duration,
    /// Citation id prefix; the Parliament sibling uses `P`.
    pub citation_prefix: &'static str,
    /// Bumping this invalidates every cache at once.
    pub cache_namespace: String,
    /// Skip cache reads and writes entirely.
    pub cache_bypass: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_token_budget: 1536,
            chunk_token_overlap: 256,
            max_limit: 100,
            default_similarity_threshold: 0.4,
            vector_weight: 0.7,
            keyword_weight: 0.3,
            min_rerank_score: 0.1,
            candidate_limit: 50,
            defined_term_boost: 0.15,
            max_sections_to_hydrate: 150,
            max_markdown_size: 100_000,
            toc_min_sections: 10,
            toc_max_entries: 30,
            embedding_cache_ttl: Duration::from_secs(24 * 60 * 60),
            search_cache_ttl: Duration::from_secs(60 * 60),
            rerank_cache_ttl: Duration::from_secs(60 * 60),
            citation_prefix: "L",
            cache_namespace: "leg:v1".to_string(),
            cache_bypass: false,
        }
    }
}

impl RetrievalConfig {
    /// Clamp a requested result limit into `[1, max_limit]`.
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.clamp(1, self.max_limit)
    }
}
