//! Parsed-record types emitted by the LIMS XML parser.
//!
//! All records are immutable after parsing and carry a [`Language`]. The
//! parser emits one [`ParsedDocument`] per source XML file; re-ingestion
//! replaces stored rows by resource key, so none of these types have a
//! mutation lifecycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Enums ──

/// Document language. Justice Canada publishes every instrument in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
        }
    }

    /// The other official language.
    pub fn opposite(&self) -> Language {
        match self {
            Language::En => Language::Fr,
            Language::Fr => Language::En,
        }
    }

    pub fn parse(s: &str) -> Option<Language> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "eng" => Some(Language::En),
            "fr" | "fra" => Some(Language::Fr),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consolidation status of a document or section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocStatus {
    InForce,
    NotInForce,
    Repealed,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::InForce => "in-force",
            DocStatus::NotInForce => "not-in-force",
            DocStatus::Repealed => "repealed",
        }
    }
}

/// Structural kind of an emitted section record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Section,
    Schedule,
    Amending,
    Provision,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Section => "section",
            SectionType::Schedule => "schedule",
            SectionType::Amending => "amending",
            SectionType::Provision => "provision",
        }
    }
}

/// Where a defined term's meaning applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Act,
    Regulation,
    Part,
    Section,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Act => "act",
            ScopeType::Regulation => "regulation",
            ScopeType::Part => "part",
            ScopeType::Section => "section",
        }
    }

    pub fn parse(s: &str) -> Option<ScopeType> {
        match s {
            "act" => Some(ScopeType::Act),
            "regulation" => Some(ScopeType::Regulation),
            "part" => Some(ScopeType::Part),
            "section" => Some(ScopeType::Section),
            _ => None,
        }
    }
}

/// LIMS `@change` marker on amended content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Ins,
    Del,
    Off,
    Alt,
}

impl ChangeType {
    pub fn parse(s: &str) -> Option<ChangeType> {
        match s {
            "ins" => Some(ChangeType::Ins),
            "del" => Some(ChangeType::Del),
            "off" => Some(ChangeType::Off),
            "alt" => Some(ChangeType::Alt),
            _ => None,
        }
    }
}

/// Every kind of content the index serves. One resource row per value of
/// this enum per source record (per chunk for long sections).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Act,
    Regulation,
    ActSection,
    RegulationSection,
    Schedule,
    DefinedTerm,
    CrossReference,
    Preamble,
    Treaty,
    Footnote,
    RelatedProvisions,
    PublicationItem,
    MarginalNote,
    TableOfProvisions,
    SignatureBlock,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Act => "act",
            SourceType::Regulation => "regulation",
            SourceType::ActSection => "act_section",
            SourceType::RegulationSection => "regulation_section",
            SourceType::Schedule => "schedule",
            SourceType::DefinedTerm => "defined_term",
            SourceType::CrossReference => "cross_reference",
            SourceType::Preamble => "preamble",
            SourceType::Treaty => "treaty",
            SourceType::Footnote => "footnote",
            SourceType::RelatedProvisions => "related_provisions",
            SourceType::PublicationItem => "publication_item",
            SourceType::MarginalNote => "marginal_note",
            SourceType::TableOfProvisions => "table_of_provisions",
            SourceType::SignatureBlock => "signature_block",
        }
    }

    pub fn parse(s: &str) -> Option<SourceType> {
        Some(match s {
            "act" => SourceType::Act,
            "regulation" => SourceType::Regulation,
            "act_section" => SourceType::ActSection,
            "regulation_section" => SourceType::RegulationSection,
            "schedule" => SourceType::Schedule,
            "defined_term" => SourceType::DefinedTerm,
            "cross_reference" => SourceType::CrossReference,
            "preamble" => SourceType::Preamble,
            "treaty" => SourceType::Treaty,
            "footnote" => SourceType::Footnote,
            "related_provisions" => SourceType::RelatedProvisions,
            "publication_item" => SourceType::PublicationItem,
            "marginal_note" => SourceType::MarginalNote,
            "table_of_provisions" => SourceType::TableOfProvisions,
            "signature_block" => SourceType::SignatureBlock,
            _ => return None,
        })
    }

    /// Source types that belong to an act-rooted document.
    pub const ACT_RELATED: &'static [SourceType] = &[
        SourceType::Act,
        SourceType::ActSection,
        SourceType::Schedule,
        SourceType::DefinedTerm,
        SourceType::Preamble,
        SourceType::Treaty,
        SourceType::CrossReference,
        SourceType::TableOfProvisions,
        SourceType::SignatureBlock,
        SourceType::RelatedProvisions,
        SourceType::Footnote,
        SourceType::MarginalNote,
    ];

    /// Source types that belong to a regulation-rooted document.
    pub const REGULATION_RELATED: &'static [SourceType] = &[
        SourceType::Regulation,
        SourceType::RegulationSection,
        SourceType::Schedule,
        SourceType::DefinedTerm,
        SourceType::Preamble,
        SourceType::Treaty,
        SourceType::CrossReference,
        SourceType::TableOfProvisions,
        SourceType::SignatureBlock,
        SourceType::RelatedProvisions,
        SourceType::Footnote,
        SourceType::MarginalNote,
    ];

    /// Every source type, for all-sources searches.
    pub const ALL: &'static [SourceType] = &[
        SourceType::Act,
        SourceType::Regulation,
        SourceType::ActSection,
        SourceType::RegulationSection,
        SourceType::Schedule,
        SourceType::DefinedTerm,
        SourceType::CrossReference,
        SourceType::Preamble,
        SourceType::Treaty,
        SourceType::Footnote,
        SourceType::RelatedProvisions,
        SourceType::PublicationItem,
        SourceType::MarginalNote,
        SourceType::TableOfProvisions,
        SourceType::SignatureBlock,
    ];
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── LIMS metadata ──

/// Machine-readable editorial metadata carried on `lims:`-namespaced
/// attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimsMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enacted_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_force_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_amended_date: Option<NaiveDate>,
}

impl LimsMetadata {
    pub fn is_empty(&self) -> bool {
        self.fid.is_none()
            && self.id.is_none()
            && self.enacted_date.is_none()
            && self.in_force_start_date.is_none()
            && self.last_amended_date.is_none()
    }
}

// ── Documents ──

/// A federal statute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Act {
    pub act_id: String,
    pub language: Language,
    pub title: String,
    pub long_title: Option<String>,
    pub short_title: Option<String>,
    pub status: DocStatus,
    pub consolidation_date: Option<NaiveDate>,
    pub lims: Option<LimsMetadata>,
}

/// Delegated legislation made under an enabling act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regulation {
    pub regulation_id: String,
    pub language: Language,
    pub title: String,
    pub long_title: Option<String>,
    pub short_title: Option<String>,
    pub status: DocStatus,
    pub consolidation_date: Option<NaiveDate>,
    pub registration_date: Option<NaiveDate>,
    pub enabling_act_id: Option<String>,
    pub enabling_act_title: Option<String>,
    pub lims: Option<LimsMetadata>,
}

// ── Sections ──

/// Schedule the emitting traversal is currently inside, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleContext {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_type: Option<String>,
}

impl ScheduleContext {
    /// Slug used in canonical section ids: lowercased label, whitespace → `-`.
    pub fn slug(&self) -> String {
        self.label
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Enactment / coming-into-force / amendment dates attached to a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionDates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enacted_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_force_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_amended_date: Option<NaiveDate>,
}

/// Footnote attached to a section's text (as opposed to the standalone
/// [`Footnote`] record emitted for document-level footnotes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionFootnote {
    pub label: String,
    pub text: String,
}

/// One numbered provision of an act or regulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSection {
    /// Globally unique:
    /// `{docId}/{lang}/{sectionType}/{order}/s{label}` or, inside a
    /// schedule, `{docId}/{lang}/{sectionType}/{order}/sch-{slug}/s{label}`.
    pub canonical_section_id: String,
    pub section_label: String,
    /// Monotonic within the document; never resets across sub-containers.
    pub section_order: u32,
    pub language: Language,
    pub section_type: SectionType,
    /// Heading strings from the root down to this section.
    pub hierarchy_path: Vec<String>,
    pub marginal_note: Option<String>,
    /// Plain text content.
    pub content: String,
    pub content_html: Option<String>,
    pub status: DocStatus,
    pub change_type: Option<ChangeType>,
    pub dates: SectionDates,
    pub lims: Option<LimsMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub historical_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub footnotes: Vec<SectionFootnote>,
    /// Section labels this section's text refers to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_references: Vec<String>,
    pub schedule_context: Option<ScheduleContext>,
    pub act_id: Option<String>,
    pub regulation_id: Option<String>,
}

impl ParsedSection {
    /// The document identifier, whichever root this section came from.
    pub fn doc_id(&self) -> Option<&str> {
        self.act_id.as_deref().or(self.regulation_id.as_deref())
    }
}

// ── Defined terms ──

/// A word or phrase whose meaning is fixed by an explicit definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDefinedTerm {
    pub language: Language,
    pub term: String,
    /// Cross-lingual matching form; see `normalize_term_for_matching`.
    pub term_normalized: String,
    /// Opposite-language spelling, when the source pairs them.
    pub paired_term: Option<String>,
    pub definition: String,
    pub act_id: Option<String>,
    pub regulation_id: Option<String>,
    pub section_label: Option<String>,
    pub scope_type: ScopeType,
    /// Ordered section labels the definition applies to, for
    /// `scope_type == Section`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_sections: Vec<String>,
    pub scope_raw_text: Option<String>,
    pub lims: Option<LimsMetadata>,
}

impl ParsedDefinedTerm {
    pub fn doc_id(&self) -> Option<&str> {
        self.act_id.as_deref().or(self.regulation_id.as_deref())
    }
}

// ── Cross-references ──

/// Target kind of a cross-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossRefTargetType {
    Act,
    Regulation,
}

/// A reference from one document's section to another instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCrossReference {
    pub source_doc_id: String,
    pub source_section_label: String,
    pub language: Language,
    pub target_type: CrossRefTargetType,
    /// Identifier of the referenced instrument, e.g. `C-46` or `SOR-86-304`.
    pub target_ref: String,
    pub target_subref: Option<String>,
    /// Link text as it appears in the source.
    pub text: String,
}

// ── Positional records ──

/// Treaty text reproduced in a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treaty {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub title: Option<String>,
    pub content: String,
}

/// Non-operative introductory text stating purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preamble {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub content: String,
}

/// Appended tabular or list-structured material forming part of the statute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSchedule {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub label: String,
    pub title: Option<String>,
    pub schedule_type: Option<String>,
    pub content: String,
}

/// Document-level footnote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footnote {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub label: Option<String>,
    pub content: String,
}

/// Related-provisions block (transitional and consequential material).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedProvision {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub label: Option<String>,
    pub content: String,
}

/// Gazette publication history item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationItem {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub content: String,
}

/// Marginal note emitted as its own searchable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginalNoteRecord {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub section_label: Option<String>,
    pub content: String,
}

/// Table of provisions (analytical index at the front of an instrument).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOfProvisions {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub content: String,
}

/// Signature block (minister / governor in council attestation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub doc_id: String,
    pub language: Language,
    pub position: u32,
    pub content: String,
}

// ── Parser output ──

/// Everything the parser extracts from one LIMS XML document, in
/// deterministic traversal order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub acts: Vec<Act>,
    pub regulations: Vec<Regulation>,
    pub sections: Vec<ParsedSection>,
    pub defined_terms: Vec<ParsedDefinedTerm>,
    pub cross_references: Vec<ParsedCrossReference>,
    pub preambles: Vec<Preamble>,
    pub treaties: Vec<Treaty>,
    pub schedules: Vec<ParsedSchedule>,
    pub footnotes: Vec<Footnote>,
    pub related_provisions: Vec<RelatedProvision>,
    pub publication_items: Vec<PublicationItem>,
    pub marginal_notes: Vec<MarginalNoteRecord>,
    pub tables_of_provisions: Vec<TableOfProvisions>,
    pub signature_blocks: Vec<SignatureBlock>,
}

impl ParsedDocument {
    /// The root document identifier (act or regulation).
    pub fn doc_id(&self) -> Option<&str> {
        self.acts
            .first()
            .map(|a| a.act_id.as_str())
            .or_else(|| self.regulations.first().map(|r| r.regulation_id.as_str()))
    }

    pub fn language(&self) -> Option<Language> {
        self.acts
            .first()
            .map(|a| a.language)
            .or_else(|| self.regulations.first().map(|r| r.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_opposite_is_involution() {
        assert_eq!(Language::En.opposite(), Language::Fr);
        assert_eq!(Language::Fr.opposite().opposite(), Language::Fr);
    }

    #[test]
    fn language_parses_iso_and_justice_codes() {
        assert_eq!(Language::parse("en"), Some(Language::En));
        assert_eq!(Language::parse("fra"), Some(Language::Fr));
        assert_eq!(Language::parse("de"), None);
    }

    #[test]
    fn status_serde_uses_kebab_case() {
        let json = serde_json::to_string(&DocStatus::NotInForce).unwrap();
        assert_eq!(json, "\"not-in-force\"");
        let back: DocStatus = serde_json::from_str("\"repealed\"").unwrap();
        assert_eq!(back, DocStatus::Repealed);
    }

    #[test]
    fn source_type_round_trips_through_strings() {
        for st in SourceType::ALL {
            assert_eq!(SourceType::parse(st.as_str()), Some(*st));
        }
    }

    #[test]
    fn act_related_excludes_regulation_types() {
        assert!(!SourceType::ACT_RELATED.contains(&SourceType::Regulation));
        assert!(!SourceType::ACT_RELATED.contains(&SourceType::RegulationSection));
        assert!(SourceType::ACT_RELATED.contains(&SourceType::DefinedTerm));
    }

    #[test]
    fn schedule_slug_lowercases_and_dashes() {
        let ctx = ScheduleContext {
            label: "SCHEDULE III Part 1".into(),
            schedule_id: None,
            schedule_type: None,
        };
        assert_eq!(ctx.slug(), "schedule-iii-part-1");
    }

    #[test]
    fn section_doc_id_prefers_act() {
        let mut s = sample_section();
        assert_eq!(s.doc_id(), Some("C-46"));
        s.act_id = None;
        s.regulation_id = Some("SOR-86-304".into());
        assert_eq!(s.doc_id(), Some("SOR-86-304"));
    }

    #[test]
    fn parsed_section_serde_round_trip() {
        let s = sample_section();
        let json = serde_json::to_string(&s).unwrap();
        let back: ParsedSection = serde_json::from_str(&json).unwrap();
        assert_eq!(back.canonical_section_id, s.canonical_section_id);
        assert_eq!(back.section_order, 3);
        assert_eq!(back.hierarchy_path, s.hierarchy_path);
    }

    fn sample_section() -> ParsedSection {
        ParsedSection {
            canonical_section_id: "C-46/en/section/3/s91".into(),
            section_label: "91".into(),
            section_order: 3,
            language: Language::En,
            section_type: SectionType::Section,
            hierarchy_path: vec!["Part I Offences".into()],
            marginal_note: Some("Possession of weapon".into()),
            content: "Every person commits an offence who...".into(),
            content_html: None,
            status: DocStatus::InForce,
            change_type: None,
            dates: SectionDates::default(),
            lims: None,
            historical_notes: vec![],
            footnotes: vec![],
            internal_references: vec![],
            schedule_context: None,
            act_id: Some("C-46".into()),
            regulation_id: None,
        }
    }
}
