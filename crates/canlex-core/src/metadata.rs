//! Denormalized resource metadata stored alongside indexed content.
//!
//! One [`ResourceMetadata`] per resource row. Carries every field the query
//! filters, citation builders, and hydrators need, so the engine never has
//! to re-open source XML at query time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{
    CrossRefTargetType, DocStatus, Language, ScopeType, SectionType, SourceType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub source_type: SourceType,
    pub language: Language,
    /// Document title in the record's own language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulation_id: Option<String>,
    /// Canonical section id for section-rooted rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marginal_note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hierarchy_path: Vec<String>,
    /// Defined-term fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<ScopeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_sections: Vec<String>,
    /// Cross-reference fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<CrossRefTargetType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_subref: Option<String>,
    /// Preamble enumeration index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble_index: Option<u32>,
    /// Enumeration index for treaties, tables of provisions, signature
    /// blocks, footnotes and the other positional records; also what makes
    /// their opposite-language keys reconstructible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DocStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabling_act_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabling_act_title: Option<String>,
    // Indexed dates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_amended_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enacted_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_force_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consolidation_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<NaiveDate>,
}

impl ResourceMetadata {
    /// A metadata shell with only the discriminating fields set.
    pub fn new(source_type: SourceType, language: Language) -> Self {
        Self {
            source_type,
            language,
            title: None,
            long_title: None,
            act_id: None,
            regulation_id: None,
            section_id: None,
            section_label: None,
            section_type: None,
            section_order: None,
            marginal_note: None,
            hierarchy_path: Vec::new(),
            term: None,
            term_id: None,
            paired_term: None,
            scope_type: None,
            scope_sections: Vec::new(),
            cross_ref_id: None,
            target_type: None,
            target_ref: None,
            target_subref: None,
            preamble_index: None,
            position: None,
            chunk_index: 0,
            status: None,
            enabling_act_id: None,
            enabling_act_title: None,
            last_amended_date: None,
            enacted_date: None,
            in_force_date: None,
            consolidation_date: None,
            registration_date: None,
        }
    }

    /// The document identifier this row belongs to, whichever root applies.
    pub fn doc_id(&self) -> Option<&str> {
        self.act_id.as_deref().or(self.regulation_id.as_deref())
    }

    /// Deduplication key: source type, language, and every identifying id.
    ///
    /// Distinct records never collide; the same chunk surfacing from two
    /// parallel sub-searches does, and the caller keeps the higher-scored
    /// copy.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.source_type.as_str(),
            self.language.as_str(),
            self.act_id.as_deref().unwrap_or(""),
            self.regulation_id.as_deref().unwrap_or(""),
            self.section_id.as_deref().unwrap_or(""),
            self.term_id.as_deref().unwrap_or(""),
            self.cross_ref_id.as_deref().unwrap_or(""),
            self.preamble_index
                .or(self.position)
                .map(|i| i.to_string())
                .unwrap_or_default(),
            self.chunk_index,
        )
    }

    /// Derive the per-source-type identifier used inside resource keys.
    pub fn source_id(&self) -> Option<String> {
        match self.source_type {
            SourceType::Act => self.act_id.clone(),
            SourceType::Regulation => self.regulation_id.clone(),
            SourceType::ActSection | SourceType::RegulationSection => self.section_id.clone(),
            SourceType::DefinedTerm => self.term_id.clone(),
            SourceType::CrossReference => self.cross_ref_id.clone(),
            SourceType::Preamble => {
                let doc = self.doc_id()?;
                let idx = self.preamble_index.or(self.position)?;
                Some(format!("{doc}:{idx}"))
            }
            SourceType::Schedule
            | SourceType::Treaty
            | SourceType::Footnote
            | SourceType::RelatedProvisions
            | SourceType::PublicationItem
            | SourceType::MarginalNote
            | SourceType::TableOfProvisions
            | SourceType::SignatureBlock => {
                let doc = self.doc_id()?;
                let idx = self.position?;
                Some(format!("{doc}:{idx}"))
            }
        }
    }
}
