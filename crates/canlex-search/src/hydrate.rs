//! Full-document and single-source hydration.
//!
//! The display panel wants a whole act or regulation for context, so the
//! top-source rule prefers documents; single-source hydrators cover the
//! record types that have no document view. Size caps keep the markdown
//! inside an LLM context window; they are static bounds, not time bounds.

use serde::{Deserialize, Serialize};
use tracing::warn;

use canlex_core::types::{DocStatus, Language, SectionType, SourceType};
use canlex_core::{ResourceMetadata, RetrievalConfig};
use canlex_store::{ResourceRow, ResourceStore};

use crate::SearchError;
use crate::result::SearchResult;

/// A hydrated "full document" view for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratedSource {
    pub id: String,
    pub source_type: SourceType,
    pub language: Language,
    pub title: String,
    pub markdown: String,
    /// Set when the preferred language was unavailable and the opposite
    /// one was substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ── Document hydration ──

/// Hydrate an act or regulation: metadata, optional table of contents,
/// then section-by-section content under a hard size cap. Falls back to
/// the opposite language (with a note) when the preferred one is not
/// indexed.
pub fn hydrate_document(
    resources: &ResourceStore,
    doc_id: &str,
    preferred: Language,
    config: &RetrievalConfig,
) -> Result<Option<HydratedSource>, SearchError> {
    let doc_row = match resources.get_document(doc_id, preferred)? {
        Some(row) => row,
        None => match resources.get_document(doc_id, preferred.opposite())? {
            Some(row) => row,
            None => return Ok(None),
        },
    };
    let lang_used = doc_row.language;

    let sections =
        resources.sections_for_document(doc_id, lang_used, config.max_sections_to_hydrate)?;
    let total = resources.count_sections(doc_id, lang_used)?;

    let meta = &doc_row.metadata;
    let title = meta.title.clone().unwrap_or_else(|| doc_id.to_string());
    let mut markdown = format!("# {title}\n\n");

    if let Some(long_title) = &meta.long_title {
        if long_title != &title {
            markdown.push_str(&format!("*{long_title}*\n\n"));
        }
    }

    if sections.len() < total {
        markdown.push_str(&truncated_fetch_notice(sections.len(), total, lang_used));
    }

    markdown.push_str(&metadata_bullets(meta, lang_used));

    if total > config.toc_min_sections {
        markdown.push_str(&table_of_contents(&sections, config.toc_max_entries, lang_used));
    }

    let mut current_heading: Option<String> = None;
    for section in &sections {
        let mut addition = String::new();
        let heading = section.metadata.hierarchy_path.first().cloned();
        if heading != current_heading {
            if let Some(h) = &heading {
                addition.push_str(&format!("## {h}\n\n"));
            }
            current_heading = heading;
        }
        addition.push_str(&section_heading(&section.metadata, lang_used));
        addition.push_str(&section.content);
        addition.push_str("\n\n");

        if markdown.len() + addition.len() > config.max_markdown_size {
            markdown.push_str(&size_cap_notice(lang_used));
            break;
        }
        markdown.push_str(&addition);
    }

    let note = (lang_used != preferred).then(|| language_fallback_note(preferred));
    Ok(Some(HydratedSource {
        id: doc_id.to_string(),
        source_type: doc_row.source_type,
        language: lang_used,
        title,
        markdown,
        note,
    }))
}

fn truncated_fetch_notice(shown: usize, total: usize, language: Language) -> String {
    match language {
        Language::En => format!("*Showing the first {shown} of {total} sections.*\n\n"),
        Language::Fr => format!("*Affichage des {shown} premiers articles sur {total}.*\n\n"),
    }
}

fn metadata_bullets(meta: &ResourceMetadata, language: Language) -> String {
    let mut out = String::new();
    if let Some(status) = meta.status {
        let label = match (language, status) {
            (Language::En, DocStatus::InForce) => "In force",
            (Language::En, DocStatus::NotInForce) => "Not in force",
            (Language::En, DocStatus::Repealed) => "Repealed",
            (Language::Fr, DocStatus::InForce) => "En vigueur",
            (Language::Fr, DocStatus::NotInForce) => "Non en vigueur",
            (Language::Fr, DocStatus::Repealed) => "Abrogé",
        };
        match language {
            Language::En => out.push_str(&format!("- Status: {label}\n")),
            Language::Fr => out.push_str(&format!("- Statut : {label}\n")),
        }
    }
    if let Some(date) = meta.consolidation_date {
        match language {
            Language::En => out.push_str(&format!("- Consolidated to: {date}\n")),
            Language::Fr => out.push_str(&format!("- Codifié au : {date}\n")),
        }
    }
    if let Some(enabling) = meta.enabling_act_title.as_ref().or(meta.enabling_act_id.as_ref()) {
        match language {
            Language::En => out.push_str(&format!("- Enabling act: {enabling}\n")),
            Language::Fr => out.push_str(&format!("- Loi habilitante : {enabling}\n")),
        }
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn table_of_contents(sections: &[ResourceRow], max_entries: usize, language: Language) -> String {
    let header = match language {
        Language::En => "## Table of Contents\n\n",
        Language::Fr => "## Table des matières\n\n",
    };
    let mut out = String::from(header);
    let mut entries = 0usize;
    let mut current_heading: Option<&String> = None;

    for section in sections {
        if entries >= max_entries {
            break;
        }
        let heading = section.metadata.hierarchy_path.first();
        if heading != current_heading {
            if let Some(h) = heading {
                out.push_str(&format!("**{h}**\n"));
                entries += 1;
                if entries >= max_entries {
                    break;
                }
            }
            current_heading = heading;
        }
        let label = section
            .metadata
            .section_label
            .clone()
            .unwrap_or_default();
        let note = section.metadata.marginal_note.as_deref().unwrap_or("");
        if note.is_empty() {
            out.push_str(&format!("- {label}\n"));
        } else {
            out.push_str(&format!("- {label} — {note}\n"));
        }
        entries += 1;
    }
    out.push('\n');
    out
}

fn section_heading(meta: &ResourceMetadata, language: Language) -> String {
    let label = meta.section_label.clone().unwrap_or_default();
    let note = meta.marginal_note.as_deref();
    match meta.section_type {
        Some(SectionType::Schedule) => match note {
            Some(n) => format!("## {label}\n*{n}*\n\n"),
            None => format!("## {label}\n\n"),
        },
        _ => {
            let word = match language {
                Language::En => "Section",
                Language::Fr => "Article",
            };
            match note {
                Some(n) => format!("### {word} {label} — {n}\n\n"),
                None => format!("### {word} {label}\n\n"),
            }
        }
    }
}

fn size_cap_notice(language: Language) -> String {
    match language {
        Language::En => "\n*Document truncated: size limit reached.*\n".to_string(),
        Language::Fr => "\n*Document tronqué : limite de taille atteinte.*\n".to_string(),
    }
}

fn language_fallback_note(preferred: Language) -> String {
    match preferred {
        Language::En => {
            "The English version of this document is not available; showing French.".to_string()
        }
        Language::Fr => {
            "La version française de ce document n'est pas disponible; affichage en anglais."
                .to_string()
        }
    }
}

// ── Single-source hydration ──

type Formatter = fn(&ResourceMetadata, &str, Language) -> String;

/// Per-source-type hydrator. The bilingual fallback note is shared across
/// types and attached by [`hydrate_single`].
struct SourceHydrator {
    formatter: Formatter,
}

fn hydrator_for(source_type: SourceType) -> Option<SourceHydrator> {
    let formatter: Formatter = match source_type {
        SourceType::DefinedTerm => format_defined_term,
        SourceType::Preamble => format_preamble,
        SourceType::CrossReference => format_cross_reference,
        SourceType::Act
        | SourceType::Regulation
        | SourceType::ActSection
        | SourceType::RegulationSection
        | SourceType::Schedule
        | SourceType::Treaty
        | SourceType::Footnote
        | SourceType::RelatedProvisions
        | SourceType::PublicationItem
        | SourceType::MarginalNote
        | SourceType::TableOfProvisions
        | SourceType::SignatureBlock => format_generic,
    };
    Some(SourceHydrator { formatter })
}

fn format_defined_term(meta: &ResourceMetadata, content: &str, language: Language) -> String {
    let term = meta.term.as_deref().unwrap_or_default();
    let title = meta.title.as_deref().unwrap_or_default();
    let location = match (&meta.section_label, language) {
        (Some(label), Language::En) => format!("{title}, s {label}"),
        (Some(label), Language::Fr) => format!("{title}, art {label}"),
        (None, _) => title.to_string(),
    };
    format!("## \"{term}\"\n\n*{location}*\n\n{content}\n")
}

fn format_preamble(meta: &ResourceMetadata, content: &str, language: Language) -> String {
    let title = meta.title.as_deref().unwrap_or_default();
    let header = match language {
        Language::En => "Preamble",
        Language::Fr => "Préambule",
    };
    format!("## {header} — {title}\n\n{content}\n")
}

fn format_cross_reference(meta: &ResourceMetadata, content: &str, language: Language) -> String {
    let title = meta.title.as_deref().unwrap_or_default();
    let target = meta.target_ref.as_deref().unwrap_or_default();
    let header = match language {
        Language::En => "Cross-reference",
        Language::Fr => "Renvoi",
    };
    format!("## {header} — {title}\n\n{content}\n\n*Target: {target}*\n")
}

fn format_generic(meta: &ResourceMetadata, content: &str, _language: Language) -> String {
    let title = meta.title.as_deref().unwrap_or_default();
    format!("## {title} ({})\n\n{content}\n", meta.source_type)
}

/// Hydrate one result through its source-type hydrator. `None` for a
/// source type without one.
pub fn hydrate_single(result: &SearchResult, preferred: Language) -> Option<HydratedSource> {
    let hydrator = hydrator_for(result.metadata.source_type)?;
    let lang_used = result.metadata.language;
    let markdown = (hydrator.formatter)(&result.metadata, &result.content, lang_used);
    let note = (lang_used != preferred).then(|| language_fallback_note(preferred));
    Some(HydratedSource {
        id: result.resource_key.clone(),
        source_type: result.metadata.source_type,
        language: lang_used,
        title: result.metadata.title.clone().unwrap_or_default(),
        markdown,
        note,
    })
}

// ── Top-source selection ──

/// Choose what the display panel shows for a result set. Always returns
/// zero or one hydrated source:
///
/// 1. a defined term on top hydrates as itself;
/// 2. otherwise the first act-bearing result hydrates its whole act;
/// 3. otherwise the first regulation-bearing result hydrates its
///    regulation;
/// 4. otherwise the top result hydrates through its own source hydrator.
pub fn hydrate_top_source(
    resources: &ResourceStore,
    results: &[SearchResult],
    preferred: Language,
    config: &RetrievalConfig,
) -> Result<Vec<HydratedSource>, SearchError> {
    let Some(top) = results.first() else {
        return Ok(Vec::new());
    };

    if top.metadata.source_type == SourceType::DefinedTerm {
        return Ok(hydrate_single(top, preferred).into_iter().collect());
    }

    if let Some(act_id) = results.iter().find_map(|r| r.metadata.act_id.clone()) {
        if let Some(hydrated) = hydrate_document(resources, &act_id, preferred, config)? {
            return Ok(vec![hydrated]);
        }
    }

    if let Some(reg_id) = results.iter().find_map(|r| r.metadata.regulation_id.clone()) {
        if let Some(hydrated) = hydrate_document(resources, &reg_id, preferred, config)? {
            return Ok(vec![hydrated]);
        }
    }

    match hydrate_single(top, preferred) {
        Some(hydrated) => Ok(vec![hydrated]),
        None => {
            warn!(source_type = %top.metadata.source_type, "no hydrator for source type");
            Ok(Vec::new())
        }
    }
}
