//! Context assembly: reranked results → cited, LLM-ready prompt.
//!
//! Deterministic pipeline: deduplicate, build snippets, skip repeated
//! snippets, assign sequential `L`-prefixed citation ids, emit the prompt
//! with a sources block. Hydrated sources are filled in afterwards by the
//! retrieval facade.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use canlex_core::RetrievalConfig;
use canlex_core::normalize::flatten_whitespace;
use canlex_core::types::Language;

use crate::citation::Citation;
use crate::hydrate::HydratedSource;
use crate::result::{SearchResult, dedup_results};

/// Snippets aim at this many characters.
const SNIPPET_TARGET: usize = 480;
/// A sentence boundary only counts once the snippet has this much text.
const SNIPPET_MIN_SENTENCE_END: usize = 200;

/// The assembled, citation-bearing context for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub language: Language,
    pub prompt: String,
    pub citations: Vec<Citation>,
    pub hydrated_sources: Vec<HydratedSource>,
}

/// Assemble the prompt and citations from reranked results.
pub fn assemble_context(
    results: &[SearchResult],
    language: Language,
    config: &RetrievalConfig,
) -> AssembledContext {
    let deduped = dedup_results(results.to_vec());

    let mut citations: Vec<Citation> = Vec::new();
    let mut entry_lines: Vec<String> = Vec::new();
    let mut seen_snippets: HashSet<String> = HashSet::new();

    for result in &deduped {
        let (snippet, truncated) = build_snippet(&result.content);
        if snippet.is_empty() {
            continue;
        }
        // Two sources reading the same is one source as far as the model
        // is concerned; the later (lower-scored) copy is skipped entirely.
        if !seen_snippets.insert(snippet.to_lowercase()) {
            continue;
        }

        let id = citations.len() as u32 + 1;
        let mut citation = result.citation.clone();
        citation.id = id;
        citation.prefixed_id = format!("{}{}", config.citation_prefix, id);

        let title = result.metadata.title.clone().unwrap_or_default();
        let section_part = match (&result.metadata.section_label, language) {
            (Some(label), Language::En) => format!(", s {label}"),
            (Some(label), Language::Fr) => format!(", art {label}"),
            (None, _) => String::new(),
        };
        let note_part = result
            .metadata
            .marginal_note
            .as_deref()
            .map(|n| format!(" — {n}"))
            .unwrap_or_default();
        let ellipsis = if truncated { "…" } else { "" };
        entry_lines.push(format!(
            "- [{}] ({}) {title}{section_part}{note_part}\n  {snippet}{ellipsis}",
            citation.prefixed_id, result.metadata.source_type
        ));
        citations.push(citation);
    }

    let header = match language {
        Language::En => "Legislative context:",
        Language::Fr => "Contexte législatif:",
    };
    let mut prompt = String::new();
    prompt.push_str(header);
    prompt.push('\n');
    for line in &entry_lines {
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt.push_str("\nSources:\n");
    for citation in &citations {
        prompt.push_str(&format!(
            "[{}] {} ({})\n",
            citation.prefixed_id,
            citation.text_in(language),
            citation.url_in(language)
        ));
    }

    AssembledContext {
        language,
        prompt,
        citations,
        hydrated_sources: Vec::new(),
    }
}

/// First ~480 characters of the whitespace-flattened content, pulled back
/// to the nearest sentence end when one lands after character 200.
/// Returns `(snippet, truncated)`.
fn build_snippet(content: &str) -> (String, bool) {
    let flat = flatten_whitespace(content);
    if flat.chars().count() <= SNIPPET_TARGET {
        return (flat, false);
    }

    let cut: String = flat.chars().take(SNIPPET_TARGET).collect();
    let sentence_end = [". ", "? ", "! "]
        .iter()
        .filter_map(|terminator| cut.rfind(terminator))
        .max();

    match sentence_end {
        Some(pos) if pos >= SNIPPET_MIN_SENTENCE_END => {
            // Keep the terminator character, drop the trailing space.
            (cut[..=pos].to_string(), true)
        }
        _ => (cut, true),
    }
}
