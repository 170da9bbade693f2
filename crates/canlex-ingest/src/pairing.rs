//! Cross-document bilingual term pairing.
//!
//! Pairing happens in two phases: during parse, `Definition` markup pairs
//! the i-th English and French spellings positionally; after a batch has
//! parsed both language versions of an instrument, this pass links any
//! terms the markup left unpaired by matching their normalized spelling
//! across the two documents.

use std::collections::HashMap;

use tracing::debug;

use canlex_core::docid::translate_doc_id;
use canlex_core::types::{Language, ParsedDocument};

/// Link opposite-language defined terms that share a normalized spelling
/// and belong to the same instrument. Returns how many new pairs were
/// made. Already-paired terms are left alone.
pub fn pair_defined_terms(documents: &mut [ParsedDocument]) -> usize {
    // Index French terms by (doc id in the English convention, normalized
    // spelling). Terms already paired by markup are not candidates.
    let mut french: HashMap<(String, String), (usize, usize)> = HashMap::new();
    for (d, doc) in documents.iter().enumerate() {
        for (t, term) in doc.defined_terms.iter().enumerate() {
            if term.language == Language::Fr && term.paired_term.is_none() {
                let Some(doc_id) = term.doc_id() else { continue };
                let key = (
                    translate_doc_id(doc_id, Language::En),
                    term.term_normalized.clone(),
                );
                french.entry(key).or_insert((d, t));
            }
        }
    }

    let mut links: Vec<((usize, usize), (usize, usize))> = Vec::new();
    for (d, doc) in documents.iter().enumerate() {
        for (t, term) in doc.defined_terms.iter().enumerate() {
            if term.language != Language::En || term.paired_term.is_some() {
                continue;
            }
            let Some(doc_id) = term.doc_id() else { continue };
            let key = (
                translate_doc_id(doc_id, Language::En),
                term.term_normalized.clone(),
            );
            if let Some(&fr_pos) = french.get(&key) {
                links.push(((d, t), fr_pos));
            }
        }
    }

    let count = links.len();
    for ((en_d, en_t), (fr_d, fr_t)) in links {
        let fr_spelling = documents[fr_d].defined_terms[fr_t].term.clone();
        let en_spelling = documents[en_d].defined_terms[en_t].term.clone();
        documents[en_d].defined_terms[en_t].paired_term = Some(fr_spelling);
        documents[fr_d].defined_terms[fr_t].paired_term = Some(en_spelling);
    }
    if count > 0 {
        debug!(pairs = count, "linked bilingual defined terms");
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use canlex_core::normalize::normalize_term_for_matching;
    use canlex_core::types::{ParsedDefinedTerm, ScopeType};

    fn term(
        language: Language,
        term: &str,
        doc: (&str, bool),
        paired: Option<&str>,
    ) -> ParsedDefinedTerm {
        let (doc_id, is_regulation) = doc;
        ParsedDefinedTerm {
            language,
            term: term.to_string(),
            term_normalized: normalize_term_for_matching(term),
            paired_term: paired.map(str::to_string),
            definition: format!("{term} means…"),
            act_id: (!is_regulation).then(|| doc_id.to_string()),
            regulation_id: is_regulation.then(|| doc_id.to_string()),
            section_label: Some("2".into()),
            scope_type: ScopeType::Act,
            scope_sections: Vec::new(),
            scope_raw_text: None,
            lims: None,
        }
    }

    fn doc_with_terms(terms: Vec<ParsedDefinedTerm>) -> ParsedDocument {
        ParsedDocument {
            defined_terms: terms,
            ..Default::default()
        }
    }

    #[test]
    fn matching_normalized_terms_pair_across_documents() {
        let mut docs = vec![
            doc_with_terms(vec![term(Language::En, "Décret", ("C-46", false), None)]),
            doc_with_terms(vec![term(Language::Fr, "décret", ("C-46", false), None)]),
        ];
        let paired = pair_defined_terms(&mut docs);
        assert_eq!(paired, 1);
        assert_eq!(
            docs[0].defined_terms[0].paired_term.as_deref(),
            Some("décret")
        );
        assert_eq!(
            docs[1].defined_terms[0].paired_term.as_deref(),
            Some("Décret")
        );
    }

    #[test]
    fn regulation_ids_translate_before_matching() {
        let mut docs = vec![
            doc_with_terms(vec![term(
                Language::En,
                "Canada–Colombia",
                ("SOR-86-304", true),
                None,
            )]),
            doc_with_terms(vec![term(
                Language::Fr,
                "Canada-Colombia",
                ("DORS-86-304", true),
                None,
            )]),
        ];
        assert_eq!(pair_defined_terms(&mut docs), 1);
        assert!(docs[0].defined_terms[0].paired_term.is_some());
    }

    #[test]
    fn different_documents_do_not_pair() {
        let mut docs = vec![
            doc_with_terms(vec![term(Language::En, "Décret", ("C-46", false), None)]),
            doc_with_terms(vec![term(Language::Fr, "décret", ("C-45", false), None)]),
        ];
        assert_eq!(pair_defined_terms(&mut docs), 0);
        assert!(docs[0].defined_terms[0].paired_term.is_none());
    }

    #[test]
    fn markup_paired_terms_are_untouched() {
        let mut docs = vec![
            doc_with_terms(vec![term(
                Language::En,
                "firearm",
                ("C-46", false),
                Some("arme à feu"),
            )]),
            doc_with_terms(vec![term(
                Language::Fr,
                "arme à feu",
                ("C-46", false),
                Some("firearm"),
            )]),
        ];
        assert_eq!(pair_defined_terms(&mut docs), 0);
        assert_eq!(
            docs[0].defined_terms[0].paired_term.as_deref(),
            Some("arme à feu")
        );
    }

    #[test]
    fn non_matching_spellings_stay_unpaired() {
        let mut docs = vec![
            doc_with_terms(vec![term(Language::En, "firearm", ("C-46", false), None)]),
            doc_with_terms(vec![term(
                Language::Fr,
                "arme à feu",
                ("C-46", false),
                None,
            )]),
        ];
        assert_eq!(pair_defined_terms(&mut docs), 0);
    }
}
