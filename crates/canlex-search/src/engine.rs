//! Hybrid search engine: dense-vector similarity fused with full-text
//! keyword scoring over the embedding store, hydrated from the resource
//! store, with language fallback and result caching.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use canlex_core::RetrievalConfig;
use canlex_core::normalize::{flatten_whitespace, normalize_for_embedding};
use canlex_core::types::SourceType;
use canlex_ai::{EmbedderClient, TtlCache, sha1_hex};
use canlex_store::{
    EmbeddingHit, EmbeddingStore, MetadataField, MetadataQuery, ResourceRow, ResourceStore,
};

use crate::SearchError;
use crate::citation::build_citation;
use crate::options::SearchOptions;
use crate::result::{
    PairedResource, SearchResult, dedup_results, hybrid_score, passes_threshold,
};

const DEFAULT_LIMIT: usize = 10;
/// Overfetch factor for the vector and keyword passes, so the merge still
/// has `limit` eligible rows after thresholding.
const FETCH_FACTOR: usize = 4;

pub struct SearchEngine {
    resources: Arc<ResourceStore>,
    embeddings: Arc<EmbeddingStore>,
    embedder: Arc<EmbedderClient>,
    cache: TtlCache,
    config: RetrievalConfig,
}

impl SearchEngine {
    pub fn new(
        resources: Arc<ResourceStore>,
        embeddings: Arc<EmbeddingStore>,
        embedder: Arc<EmbedderClient>,
        config: RetrievalConfig,
    ) -> Self {
        let cache = TtlCache::new(2048, config.search_cache_ttl);
        Self {
            resources,
            embeddings,
            embedder,
            cache,
            config,
        }
    }

    pub fn resources(&self) -> &Arc<ResourceStore> {
        &self.resources
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    // ── Base search ──

    /// Hybrid search. Zero hits under a language filter trigger exactly
    /// one retry without it; both passes are cached under their own keys.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let limit = self.config.clamp_limit(options.limit.unwrap_or(DEFAULT_LIMIT));
        let threshold = options
            .similarity_threshold
            .unwrap_or(self.config.default_similarity_threshold);

        let cache_key = self.cache_key(query, options, limit, threshold);
        if !self.config.cache_bypass {
            if let Some(cached) = self.cache.get::<Vec<SearchResult>>(&cache_key) {
                debug!(key = %cache_key, "search cache hit");
                return Ok(cached);
            }
        }

        let query_vector = self.embedder.embed(&normalize_for_embedding(query)).await?;
        let results = self
            .scored_pass(query, &query_vector, options, threshold, limit)
            .await?;
        if !self.config.cache_bypass {
            self.cache.put(cache_key, &results);
        }

        if results.is_empty() && options.language.is_some() {
            // Full retry path with the same scoring, language constraint
            // removed. Once, never recursive.
            debug!("zero hits under language filter; retrying unfiltered");
            let fallback_options = options.without_language();
            let fallback_key = self.cache_key(query, &fallback_options, limit, threshold);
            let fallback = self
                .scored_pass(query, &query_vector, &fallback_options, threshold, limit)
                .await?;
            if !self.config.cache_bypass {
                self.cache.put(fallback_key, &fallback);
            }
            return Ok(fallback);
        }

        Ok(results)
    }

    /// Base search plus the opposite-language counterpart of each result
    /// that has one, fetched in a single batch.
    pub async fn search_bilingual(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let mut results = self.search(query, options).await?;

        let paired_keys: Vec<String> = results
            .iter()
            .filter_map(|r| r.paired_resource_key.clone())
            .collect();
        if paired_keys.is_empty() {
            return Ok(results);
        }

        let rows = self.resources.get_by_keys(&paired_keys)?;
        let by_key: HashMap<String, ResourceRow> =
            rows.into_iter().map(|r| (r.resource_key.clone(), r)).collect();

        for result in &mut results {
            if let Some(key) = result.paired_resource_key.clone() {
                if let Some(row) = by_key.get(&key) {
                    result.paired_result = Some(PairedResource {
                        resource_key: row.resource_key.clone(),
                        content: row.content.clone(),
                        citation: build_citation(&row.metadata),
                        metadata: row.metadata.clone(),
                    });
                }
            }
        }
        Ok(results)
    }

    // ── Composite helpers ──

    /// One base search per act-related source type, in parallel; merged,
    /// deduplicated, sorted, sliced.
    pub async fn search_acts(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.multi_source_search(query, options, SourceType::ACT_RELATED)
            .await
    }

    pub async fn search_regulations(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.multi_source_search(query, options, SourceType::REGULATION_RELATED)
            .await
    }

    pub async fn search_defined_terms(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.search(query, &options.with_source_type(SourceType::DefinedTerm))
            .await
    }

    /// Parallel defined-term and all-sources searches; defined-term
    /// similarities get an additive boost (clamped to 1.0) before the
    /// merge, so definitions surface for definitional queries.
    pub async fn search_with_definitions(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let limit = self.config.clamp_limit(options.limit.unwrap_or(DEFAULT_LIMIT));
        let mut unrestricted = options.clone();
        unrestricted.source_type = None;

        let defined_term_options = options.with_source_type(SourceType::DefinedTerm);
        let (terms, all) = tokio::join!(
            self.search(query, &defined_term_options),
            self.search(query, &unrestricted),
        );

        let mut combined = terms?;
        for term in &mut combined {
            term.similarity = (term.similarity + self.config.defined_term_boost).min(1.0);
        }
        combined.extend(all?);

        let mut deduped = dedup_results(combined);
        deduped.truncate(limit);
        Ok(deduped)
    }

    async fn multi_source_search(
        &self,
        query: &str,
        options: &SearchOptions,
        source_types: &[SourceType],
    ) -> Result<Vec<SearchResult>, SearchError> {
        let limit = self.config.clamp_limit(options.limit.unwrap_or(DEFAULT_LIMIT));
        let searches = source_types.iter().map(|st| {
            let scoped = options.with_source_type(*st);
            async move { self.search(query, &scoped).await }
        });
        let outcomes = futures::future::join_all(searches).await;

        let mut all = Vec::new();
        for outcome in outcomes {
            all.extend(outcome?);
        }
        let mut deduped = dedup_results(all);
        deduped.truncate(limit);
        Ok(deduped)
    }

    // ── Metadata-only search ──

    pub fn search_by_metadata(
        &self,
        query: &MetadataQuery,
    ) -> Result<Vec<ResourceRow>, SearchError> {
        Ok(self.resources.search_by_metadata(query)?)
    }

    pub fn count_by_metadata(&self, query: &MetadataQuery) -> Result<usize, SearchError> {
        Ok(self.resources.count_by_metadata(query)?)
    }

    pub fn list_distinct_metadata_values(
        &self,
        field: MetadataField,
        query: &MetadataQuery,
    ) -> Result<Vec<String>, SearchError> {
        Ok(self.resources.list_distinct_values(field, query)?)
    }

    // ── Internals ──

    fn cache_key(
        &self,
        query: &str,
        options: &SearchOptions,
        limit: usize,
        threshold: f32,
    ) -> String {
        format!(
            "{}:search:{}:{}",
            self.config.cache_namespace,
            sha1_hex(query),
            options.cache_fragment(limit, threshold)
        )
    }

    /// One scored pass: vector and keyword candidates fetched in parallel,
    /// fused, thresholded, and joined back to resource rows.
    async fn scored_pass(
        &self,
        query: &str,
        query_vector: &[f32],
        options: &SearchOptions,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let filter = options.embedding_filter();
        let fetch = (limit * FETCH_FACTOR).clamp(limit, 200);

        let flattened_query = flatten_whitespace(query);
        let (vector_hits, keyword_hits) = tokio::join!(
            self.embeddings
                .vector_search(query_vector, filter.as_deref(), fetch),
            self.embeddings
                .keyword_search(&flattened_query, filter.as_deref(), fetch),
        );
        let vector_hits = vector_hits?;
        // A missing FTS index degrades to vector-only scoring rather than
        // failing the query.
        let keyword_hits = match keyword_hits {
            Ok(hits) => hits,
            Err(e) => {
                debug!(error = %e, "keyword search unavailable; scoring vector-only");
                Vec::new()
            }
        };

        let scored = fuse_candidates(
            vector_hits,
            keyword_hits,
            query_vector,
            threshold,
            self.config.vector_weight,
            self.config.keyword_weight,
            limit,
        );

        let keys: Vec<String> = scored.iter().map(|s| s.resource_key.clone()).collect();
        let rows = self.resources.get_by_keys(&keys)?;
        let by_key: HashMap<String, ResourceRow> =
            rows.into_iter().map(|r| (r.resource_key.clone(), r)).collect();

        let mut results = Vec::with_capacity(scored.len());
        for candidate in scored {
            let Some(row) = by_key.get(&candidate.resource_key) else {
                warn!(key = %candidate.resource_key, "embedding row without resource row");
                continue;
            };
            results.push(SearchResult {
                resource_key: row.resource_key.clone(),
                content: row.content.clone(),
                similarity: candidate.hybrid,
                vector_similarity: candidate.vector_similarity,
                keyword_rank: candidate.keyword_rank,
                original_similarity: None,
                rerank_score: None,
                citation: build_citation(&row.metadata),
                metadata: row.metadata.clone(),
                paired_resource_key: row.paired_resource_key.clone(),
                paired_result: None,
            });
        }
        Ok(results)
    }
}

/// A fused candidate before the resource join.
#[derive(Debug, PartialEq)]
pub(crate) struct FusedCandidate {
    pub resource_key: String,
    pub hybrid: f32,
    pub vector_similarity: f32,
    pub keyword_rank: f32,
}

/// Merge vector and keyword hits by resource key, score, filter by the
/// eligibility rule, sort, and slice.
pub(crate) fn fuse_candidates(
    vector_hits: Vec<EmbeddingHit>,
    keyword_hits: Vec<EmbeddingHit>,
    query_vector: &[f32],
    threshold: f32,
    vector_weight: f32,
    keyword_weight: f32,
    limit: usize,
) -> Vec<FusedCandidate> {
    struct Partial {
        vector_similarity: f32,
        keyword_score: Option<f32>,
    }

    let mut merged: HashMap<String, Partial> = HashMap::new();
    for hit in vector_hits {
        let vector_similarity = hit.distance.map(|d| 1.0 - d).unwrap_or(0.0);
        merged.insert(
            hit.resource_key,
            Partial {
                vector_similarity,
                keyword_score: None,
            },
        );
    }
    for hit in keyword_hits {
        let entry = merged.entry(hit.resource_key).or_insert_with(|| Partial {
            // Keyword-only rows never came back with a distance; compute
            // their similarity from the stored vector.
            vector_similarity: cosine_similarity(query_vector, &hit.embedding),
            keyword_score: None,
        });
        entry.keyword_score = hit.score;
    }

    let mut candidates: Vec<FusedCandidate> = merged
        .into_iter()
        .filter(|(_, p)| passes_threshold(p.vector_similarity, p.keyword_score.is_some(), threshold))
        .map(|(resource_key, p)| {
            let keyword_rank = p.keyword_score.map(squash_bm25).unwrap_or(0.0);
            FusedCandidate {
                hybrid: hybrid_score(
                    p.vector_similarity,
                    keyword_rank,
                    vector_weight,
                    keyword_weight,
                ),
                vector_similarity: p.vector_similarity,
                keyword_rank,
                resource_key,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.hybrid
            .partial_cmp(&a.hybrid)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.resource_key.cmp(&b.resource_key))
    });
    candidates.truncate(limit);
    candidates
}

/// BM25 scores are unbounded; squash into (0, 1) so the keyword term is
/// commensurate with a ts_rank-style weight.
fn squash_bm25(score: f32) -> f32 {
    let score = score.max(0.0);
    score / (score + 1.0)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_hit(key: &str, distance: f32) -> EmbeddingHit {
        EmbeddingHit {
            resource_key: key.to_string(),
            content: String::new(),
            embedding: vec![1.0, 0.0],
            distance: Some(distance),
            score: None,
        }
    }

    fn keyword_hit(key: &str, score: f32, embedding: Vec<f32>) -> EmbeddingHit {
        EmbeddingHit {
            resource_key: key.to_string(),
            content: String::new(),
            embedding,
            distance: None,
            score: Some(score),
        }
    }

    #[test]
    fn vector_only_candidate_above_threshold_passes() {
        let out = fuse_candidates(
            vec![vector_hit("a", 0.5)], // vectorSim 0.5
            vec![],
            &[1.0, 0.0],
            0.4,
            0.7,
            0.3,
            10,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].hybrid - 0.35).abs() < 1e-6);
        assert!((out[0].vector_similarity - 0.5).abs() < 1e-6);
    }

    #[test]
    fn vector_only_candidate_below_threshold_dropped() {
        let out = fuse_candidates(
            vec![vector_hit("a", 0.7)], // vectorSim 0.3
            vec![],
            &[1.0, 0.0],
            0.4,
            0.7,
            0.3,
            10,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn keyword_match_passes_even_when_semantically_distant() {
        // Orthogonal vector, so vectorSim is 0; the keyword match alone
        // keeps it eligible.
        let out = fuse_candidates(
            vec![],
            vec![keyword_hit("a", 3.0, vec![0.0, 1.0])],
            &[1.0, 0.0],
            0.4,
            0.7,
            0.3,
            10,
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].vector_similarity.abs() < 1e-6);
        assert!(out[0].keyword_rank > 0.0);
    }

    #[test]
    fn both_signals_fuse_additively() {
        // Same row from both passes: vectorSim 0.5, bm25 squashed.
        let out = fuse_candidates(
            vec![vector_hit("a", 0.5)],
            vec![keyword_hit("a", 1.0, vec![1.0, 0.0])], // squash(1.0) = 0.5
            &[1.0, 0.0],
            0.4,
            0.7,
            0.3,
            10,
        );
        assert_eq!(out.len(), 1);
        let expected = 0.7 * 0.5 + 0.3 * 0.5;
        assert!((out[0].hybrid - expected).abs() < 1e-6);
    }

    #[test]
    fn ordered_by_hybrid_descending_and_limited() {
        let out = fuse_candidates(
            vec![vector_hit("low", 0.55), vector_hit("high", 0.1), vector_hit("mid", 0.3)],
            vec![],
            &[1.0, 0.0],
            0.4,
            0.7,
            0.3,
            2,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].resource_key, "high");
        assert_eq!(out[1].resource_key, "mid");
    }

    #[test]
    fn keyword_only_row_gets_vector_similarity_from_stored_embedding() {
        let out = fuse_candidates(
            vec![],
            vec![keyword_hit("a", 2.0, vec![1.0, 0.0])],
            &[1.0, 0.0],
            0.4,
            0.7,
            0.3,
            10,
        );
        assert!((out[0].vector_similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn squash_is_monotonic_and_bounded() {
        assert_eq!(squash_bm25(0.0), 0.0);
        assert!(squash_bm25(1.0) < squash_bm25(5.0));
        assert!(squash_bm25(1000.0) < 1.0);
        assert_eq!(squash_bm25(-3.0), 0.0);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    // ── Store-backed scored pass ──

    use std::time::Duration;

    use canlex_core::ResourceMetadata;
    use canlex_core::types::Language;
    use canlex_store::{NewEmbedding, NewResource};
    use tempfile::TempDir;

    fn section_resource(key: &str, label: &str, language: Language) -> NewResource {
        let source_type = SourceType::ActSection;
        let mut m = ResourceMetadata::new(source_type, language);
        m.act_id = Some("C-46".into());
        m.section_id = Some(format!("C-46/{}/section/0/s{label}", language.as_str()));
        m.section_label = Some(label.to_string());
        m.title = Some("Criminal Code".into());
        NewResource {
            resource_key: key.to_string(),
            content: format!("Section {label} text."),
            metadata: m,
            paired_resource_key: None,
        }
    }

    fn section_embedding(key: &str, language: Language, vector: Vec<f32>) -> NewEmbedding {
        NewEmbedding {
            resource_key: key.to_string(),
            language: language.as_str().to_string(),
            source_type: "act_section".into(),
            act_id: Some("C-46".into()),
            regulation_id: None,
            section_label: None,
            scope_type: None,
            scope_sections: None,
            status: None,
            chunk_index: 0,
            content: String::new(),
            embedding: vector,
            embedding_model: "test".into(),
        }
    }

    async fn engine_with_rows(
        rows: Vec<(NewResource, NewEmbedding)>,
    ) -> (SearchEngine, TempDir) {
        let dir = TempDir::new().unwrap();
        let resources = Arc::new(ResourceStore::open().unwrap());
        let embeddings = Arc::new(
            EmbeddingStore::open(&dir.path().join("lance"), 4)
                .await
                .unwrap(),
        );
        let (resource_rows, embedding_rows): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        resources.upsert(&resource_rows).unwrap();
        embeddings.upsert(&embedding_rows).await.unwrap();

        let embedder = Arc::new(EmbedderClient::new(
            "http://localhost:1".into(),
            "test".into(),
            Duration::from_secs(60),
        ));
        let engine = SearchEngine::new(resources, embeddings, embedder, RetrievalConfig::default());
        (engine, dir)
    }

    #[tokio::test]
    async fn scored_pass_joins_resources_and_orders_by_score() {
        let (engine, _dir) = engine_with_rows(vec![
            (
                section_resource("a:en:0", "91", Language::En),
                section_embedding("a:en:0", Language::En, vec![1.0, 0.0, 0.0, 0.0]),
            ),
            (
                section_resource("b:en:0", "92", Language::En),
                section_embedding("b:en:0", Language::En, vec![0.8, 0.6, 0.0, 0.0]),
            ),
            (
                section_resource("c:en:0", "93", Language::En),
                section_embedding("c:en:0", Language::En, vec![0.0, 0.0, 0.0, 1.0]),
            ),
        ])
        .await;

        let results = engine
            .scored_pass(
                "query",
                &[1.0, 0.0, 0.0, 0.0],
                &SearchOptions::default(),
                0.4,
                10,
            )
            .await
            .unwrap();

        // The orthogonal row falls below the threshold; the rest come back
        // best-first with metadata and citation attached.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.section_label.as_deref(), Some("91"));
        assert!(results[0].similarity > results[1].similarity);
        assert!(results[0].vector_similarity > 0.99);
        assert_eq!(results[0].content, "Section 91 text.");
        assert!(results[0].citation.url_en.ends_with("#sec91"));
    }

    #[tokio::test]
    async fn scored_pass_pushes_language_filter_down() {
        let (engine, _dir) = engine_with_rows(vec![
            (
                section_resource("a:en:0", "91", Language::En),
                section_embedding("a:en:0", Language::En, vec![1.0, 0.0, 0.0, 0.0]),
            ),
            (
                section_resource("a:fr:0", "91", Language::Fr),
                section_embedding("a:fr:0", Language::Fr, vec![1.0, 0.0, 0.0, 0.0]),
            ),
        ])
        .await;

        let options = SearchOptions {
            language: Some(Language::Fr),
            ..Default::default()
        };
        let results = engine
            .scored_pass("query", &[1.0, 0.0, 0.0, 0.0], &options, 0.4, 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].resource_key, "a:fr:0");
    }

    #[tokio::test]
    async fn scored_pass_skips_embeddings_without_resources() {
        let (engine, _dir) = engine_with_rows(vec![(
            section_resource("a:en:0", "91", Language::En),
            section_embedding("a:en:0", Language::En, vec![1.0, 0.0, 0.0, 0.0]),
        )])
        .await;
        // An embedding row with no resource row behind it.
        engine
            .embeddings
            .upsert(&[section_embedding(
                "ghost:en:0",
                Language::En,
                vec![1.0, 0.0, 0.0, 0.0],
            )])
            .await
            .unwrap();

        let results = engine
            .scored_pass(
                "query",
                &[1.0, 0.0, 0.0, 0.0],
                &SearchOptions::default(),
                0.4,
                10,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].resource_key, "a:en:0");
    }
}
