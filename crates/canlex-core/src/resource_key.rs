//! Stable resource keys and opposite-language pairing.
//!
//! Every indexed record gets `{sourceType}:{sourceId}:{lang}:{chunkIndex}`.
//! Re-ingestion upserts by this key. The paired key points at the same
//! conceptual record in the other official language; pairing is
//! bidirectional, so either both rows carry it or neither does.

use crate::docid::translate_doc_id;
use crate::metadata::ResourceMetadata;
use crate::types::{Language, SourceType};

/// Build the stable key for one stored resource row.
pub fn resource_key(
    source_type: SourceType,
    source_id: &str,
    language: Language,
    chunk_index: u32,
) -> String {
    format!(
        "{}:{}:{}:{}",
        source_type.as_str(),
        source_id,
        language.as_str(),
        chunk_index
    )
}

/// Reconstruct the opposite-language resource key for a row, when enough
/// metadata survives to do so.
///
/// Document identifiers inside the source id are translated between the
/// English and French conventions; the language segment flips; chunk index
/// is preserved. Positional records (treaties, tables of provisions,
/// signature blocks, ...) rely on their stored enumeration index, so rows
/// ingested without one simply stay unpaired.
pub fn paired_resource_key(meta: &ResourceMetadata) -> Option<String> {
    let other = meta.language.opposite();
    let source_id = meta.source_id()?;
    let translated = match meta.source_type {
        SourceType::Act | SourceType::Regulation => translate_doc_id(&source_id, other),
        SourceType::ActSection | SourceType::RegulationSection => {
            translate_section_id(&source_id, other)?
        }
        SourceType::DefinedTerm => translate_prefixed_id(&source_id, other),
        SourceType::CrossReference => translate_prefixed_id(&source_id, other),
        SourceType::Preamble
        | SourceType::Schedule
        | SourceType::Treaty
        | SourceType::Footnote
        | SourceType::RelatedProvisions
        | SourceType::PublicationItem
        | SourceType::MarginalNote
        | SourceType::TableOfProvisions
        | SourceType::SignatureBlock => translate_prefixed_id(&source_id, other),
    };
    Some(resource_key(
        meta.source_type,
        &translated,
        other,
        meta.chunk_index,
    ))
}

/// Canonical section ids embed both the document id and the language:
/// `{docId}/{lang}/{sectionType}/{order}/…`. Translate the first, flip the
/// second, keep the rest.
fn translate_section_id(section_id: &str, target: Language) -> Option<String> {
    let parts: Vec<&str> = section_id.split('/').collect();
    if parts.len() < 4 {
        return None;
    }
    let doc = translate_doc_id(parts[0], target);
    let rest = parts[2..].join("/");
    Some(format!("{doc}/{}/{rest}", target.as_str()))
}

/// `{docId}:{rest}` ids (terms, cross-references, positional records):
/// translate the document id, keep the remainder verbatim.
fn translate_prefixed_id(id: &str, target: Language) -> String {
    match id.split_once(':') {
        Some((doc, rest)) => format!("{}:{rest}", translate_doc_id(doc, target)),
        None => translate_doc_id(id, target),
    }
}
