//! Search result shape, hybrid scoring, and deduplication.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use canlex_core::ResourceMetadata;

use crate::citation::Citation;

/// One ranked search hit, citation attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub resource_key: String,
    /// Stored resource content (the contextualized chunk).
    pub content: String,
    pub metadata: ResourceMetadata,
    /// The ranking score: hybrid score after search, rerank score after
    /// reranking.
    pub similarity: f32,
    pub vector_similarity: f32,
    pub keyword_rank: f32,
    /// Pre-rerank similarity, set by the reranker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_similarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    pub citation: Citation,
    /// Opposite-language key from the resource row, when pairing exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_resource_key: Option<String>,
    /// Opposite-language counterpart, attached by bilingual search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_result: Option<PairedResource>,
}

/// The opposite-language counterpart of a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedResource {
    pub resource_key: String,
    pub content: String,
    pub metadata: ResourceMetadata,
    pub citation: Citation,
}

/// `VECTOR_WEIGHT · vectorSim + KEYWORD_WEIGHT · keywordRank`.
pub fn hybrid_score(
    vector_similarity: f32,
    keyword_rank: f32,
    vector_weight: f32,
    keyword_weight: f32,
) -> f32 {
    vector_weight * vector_similarity + keyword_weight * keyword_rank
}

/// Eligibility: above the vector threshold, or a keyword match (even when
/// semantically distant).
pub fn passes_threshold(vector_similarity: f32, keyword_match: bool, threshold: f32) -> bool {
    vector_similarity >= threshold || keyword_match
}

/// Collapse duplicates by identity key, keeping the higher-similarity copy
/// of each, and return the survivors sorted by similarity descending.
pub fn dedup_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut best: HashMap<String, SearchResult> = HashMap::new();
    for result in results {
        let key = result.metadata.identity_key();
        match best.get(&key) {
            Some(existing) if existing.similarity >= result.similarity => {}
            _ => {
                best.insert(key, result);
            }
        }
    }
    let mut out: Vec<SearchResult> = best.into_values().collect();
    sort_by_similarity(&mut out);
    out
}

/// Descending similarity, key as a deterministic tiebreaker.
pub fn sort_by_similarity(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.resource_key.cmp(&b.resource_key))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::build_citation;
    use canlex_core::types::{Language, SourceType};

    pub(crate) fn result(key: &str, label: &str, chunk: u32, similarity: f32) -> SearchResult {
        let mut m = ResourceMetadata::new(SourceType::ActSection, Language::En);
        m.act_id = Some("C-46".into());
        m.section_id = Some(format!("C-46/en/section/0/s{label}"));
        m.section_label = Some(label.to_string());
        m.title = Some("Criminal Code".into());
        m.chunk_index = chunk;
        let citation = build_citation(&m);
        SearchResult {
            resource_key: key.to_string(),
            content: format!("Section {label} content."),
            metadata: m,
            similarity,
            vector_similarity: similarity,
            keyword_rank: 0.0,
            original_similarity: None,
            rerank_score: None,
            citation,
            paired_resource_key: None,
            paired_result: None,
        }
    }

    #[test]
    fn hybrid_score_normative_example() {
        // vectorSim 0.5, keywordRank 0.2, weights 0.7/0.3 → 0.41.
        let score = hybrid_score(0.5, 0.2, 0.7, 0.3);
        assert!((score - 0.41).abs() < 1e-6);
    }

    #[test]
    fn threshold_passes_on_vector_or_keyword() {
        // Passes only because vectorSim ≥ threshold.
        assert!(passes_threshold(0.5, false, 0.4));
        // Would also pass on a keyword match alone.
        assert!(passes_threshold(0.1, true, 0.4));
        assert!(!passes_threshold(0.1, false, 0.4));
    }

    #[test]
    fn dedup_keeps_higher_similarity() {
        let input = vec![
            result("a:en:0", "91", 0, 0.5),
            result("a:en:0", "91", 0, 0.9),
            result("b:en:0", "92", 0, 0.7),
        ];
        let out = dedup_results(input);
        assert_eq!(out.len(), 2);
        assert!((out[0].similarity - 0.9).abs() < f32::EPSILON);
        assert_eq!(out[0].metadata.section_label.as_deref(), Some("91"));
    }

    #[test]
    fn dedup_never_grows_and_drops_share_key_with_better_kept() {
        let input = vec![
            result("a:en:0", "91", 0, 0.5),
            result("a:en:0", "91", 0, 0.6),
            result("a:en:0", "91", 0, 0.4),
        ];
        let out = dedup_results(input.clone());
        assert!(out.len() <= input.len());
        assert_eq!(out.len(), 1);
        let kept = &out[0];
        for dropped in &input {
            assert_eq!(
                dropped.metadata.identity_key(),
                kept.metadata.identity_key()
            );
            assert!(kept.similarity >= dropped.similarity);
        }
    }

    #[test]
    fn different_chunks_do_not_collapse() {
        let input = vec![
            result("a:en:0", "91", 0, 0.5),
            result("a:en:1", "91", 1, 0.6),
        ];
        assert_eq!(dedup_results(input).len(), 2);
    }

    #[test]
    fn languages_do_not_collapse() {
        let mut fr = result("a:fr:0", "91", 0, 0.5);
        fr.metadata.language = Language::Fr;
        let input = vec![result("a:en:0", "91", 0, 0.5), fr];
        assert_eq!(dedup_results(input).len(), 2);
    }

    #[test]
    fn sorted_descending() {
        let out = dedup_results(vec![
            result("a:en:0", "1", 0, 0.2),
            result("b:en:0", "2", 0, 0.9),
            result("c:en:0", "3", 0, 0.5),
        ]);
        let sims: Vec<f32> = out.iter().map(|r| r.similarity).collect();
        assert_eq!(sims, vec![0.9, 0.5, 0.2]);
    }
}
