//! Search options and their compilation to cache keys and filter SQL.

use canlex_core::types::{Language, ScopeType, SourceType};

/// Caller-facing knobs for one hybrid search.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Max results; clamped to `[1, MAX_LIMIT]`.
    pub limit: Option<usize>,
    /// Floor for vector similarity; the config default applies when unset.
    pub similarity_threshold: Option<f32>,
    /// Restrict to one language. Zero hits trigger one retry without it.
    pub language: Option<Language>,
    pub source_type: Option<SourceType>,
    pub act_id: Option<String>,
    pub regulation_id: Option<String>,
    /// Restrict defined-term results by scope type.
    pub scope_type: Option<ScopeType>,
    /// Return defined terms that are document-scoped or that list this
    /// section among their scope sections.
    pub section_scope: Option<String>,
    /// Attach each result's opposite-language counterpart.
    pub include_paired_language: bool,
}

impl SearchOptions {
    pub fn without_language(&self) -> SearchOptions {
        SearchOptions {
            language: None,
            ..self.clone()
        }
    }

    pub fn with_source_type(&self, source_type: SourceType) -> SearchOptions {
        SearchOptions {
            source_type: Some(source_type),
            ..self.clone()
        }
    }

    /// Deterministic fragment covering every option that affects the
    /// result set; combined with the query hash to form the cache key.
    pub fn cache_fragment(&self, limit: usize, threshold: f32) -> String {
        format!(
            "l{limit}|t{threshold}|lang:{}|st:{}|act:{}|reg:{}|scope:{}|sec:{}|paired:{}",
            self.language.map(|l| l.as_str()).unwrap_or("*"),
            self.source_type.map(|s| s.as_str()).unwrap_or("*"),
            self.act_id.as_deref().unwrap_or("*"),
            self.regulation_id.as_deref().unwrap_or("*"),
            self.scope_type.map(|s| s.as_str()).unwrap_or("*"),
            self.section_scope.as_deref().unwrap_or("*"),
            self.include_paired_language,
        )
    }

    /// SQL filter pushed down into the embedding store scan. `None` when
    /// no constraint applies.
    pub fn embedding_filter(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(lang) = self.language {
            parts.push(format!("language = '{}'", lang.as_str()));
        }
        if let Some(st) = self.source_type {
            parts.push(format!("source_type = '{}'", st.as_str()));
        }
        if let Some(act) = &self.act_id {
            parts.push(format!("act_id = '{}'", sql_escape(act)));
        }
        if let Some(reg) = &self.regulation_id {
            parts.push(format!("regulation_id = '{}'", sql_escape(reg)));
        }
        if let Some(scope) = self.scope_type {
            parts.push(format!("scope_type = '{}'", scope.as_str()));
        }
        if let Some(section) = &self.section_scope {
            parts.push(format!(
                "(scope_type IN ('act', 'regulation') OR scope_sections LIKE '%|{}|%')",
                sql_escape(section)
            ));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        }
    }
}

fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}
