//! Retrieval facade: one call from query to cited context plus a
//! hydrated display document.

use std::sync::Arc;

use tracing::info;

use canlex_core::RetrievalConfig;
use canlex_core::types::Language;
use canlex_ai::detect_language;

use crate::SearchError;
use crate::assembler::{AssembledContext, assemble_context};
use crate::engine::SearchEngine;
use crate::hydrate::{HydratedSource, hydrate_document, hydrate_top_source};
use crate::options::SearchOptions;
use crate::rerank::Reranker;

pub struct RetrievalFacade {
    engine: Arc<SearchEngine>,
    reranker: Reranker,
    config: RetrievalConfig,
}

impl RetrievalFacade {
    pub fn new(engine: Arc<SearchEngine>, reranker: Reranker, config: RetrievalConfig) -> Self {
        Self {
            engine,
            reranker,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    /// Grounded context for one query: detect language, fetch a generous
    /// candidate set, rerank down to `limit`, assemble the cited prompt,
    /// hydrate the top source for display.
    pub async fn get_context(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<AssembledContext, SearchError> {
        let language = detect_language(query);
        let limit = self.config.clamp_limit(limit);
        info!(language = %language, limit, "building retrieval context");

        let candidates = self
            .engine
            .search(
                query,
                &SearchOptions {
                    limit: Some(self.config.candidate_limit),
                    language: Some(language),
                    ..Default::default()
                },
            )
            .await?;

        let reranked = self.reranker.rerank(query, language, candidates, limit).await;

        let mut context = assemble_context(&reranked, language, &self.config);
        context.hydrated_sources =
            hydrate_top_source(self.engine.resources(), &reranked, language, &self.config)?;
        Ok(context)
    }

    /// Full markdown view of an act, with opposite-language fallback.
    pub fn get_hydrated_act_markdown(
        &self,
        act_id: &str,
        language: Language,
    ) -> Result<Option<HydratedSource>, SearchError> {
        hydrate_document(self.engine.resources(), act_id, language, &self.config)
    }

    /// Full markdown view of a regulation, with opposite-language
    /// fallback.
    pub fn get_hydrated_regulation_markdown(
        &self,
        regulation_id: &str,
        language: Language,
    ) -> Result<Option<HydratedSource>, SearchError> {
        hydrate_document(self.engine.resources(), regulation_id, language, &self.config)
    }
}
