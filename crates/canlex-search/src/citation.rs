//! Bilingual citation construction.
//!
//! One builder per source type behind a single dispatcher. The URLs are
//! public-facing Justice Canada links and must be byte-exact; display text
//! is a bracketed compact descriptor in each language.

use serde::{Deserialize, Serialize};

use canlex_core::ResourceMetadata;
use canlex_core::types::{CrossRefTargetType, Language, SourceType};

/// A bilingual citation for one retrieved source. `id` and `prefixed_id`
/// are zero/empty until the context assembler assigns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: u32,
    pub prefixed_id: String,
    pub text_en: String,
    pub text_fr: String,
    pub url_en: String,
    pub url_fr: String,
    pub title_en: String,
    pub title_fr: String,
    pub source_type: SourceType,
}

impl Citation {
    pub fn text_in(&self, language: Language) -> &str {
        match language {
            Language::En => &self.text_en,
            Language::Fr => &self.text_fr,
        }
    }

    pub fn url_in(&self, language: Language) -> &str {
        match language {
            Language::En => &self.url_en,
            Language::Fr => &self.url_fr,
        }
    }
}

const BASE: &str = "https://laws-lois.justice.gc.ca";

/// Act landing page: language-dependent path segments.
fn act_url(act_id: &str, language: Language) -> String {
    match language {
        Language::En => format!("{BASE}/eng/acts/{act_id}/page-1.html"),
        Language::Fr => format!("{BASE}/fra/lois/{act_id}/page-1.html"),
    }
}

fn regulation_url(regulation_id: &str, language: Language) -> String {
    match language {
        Language::En => format!("{BASE}/eng/regulations/{regulation_id}/page-1.html"),
        Language::Fr => format!("{BASE}/fra/reglements/{regulation_id}/page-1.html"),
    }
}

/// `#sec{label}` with non-alphanumerics stripped from the label.
fn section_anchor(label: &str) -> String {
    let stripped: String = label.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("#sec{stripped}")
}

/// Document URL for whichever root the metadata names, with an optional
/// section anchor.
fn doc_url(meta: &ResourceMetadata, language: Language, anchored: bool) -> String {
    let mut url = if let Some(act) = &meta.act_id {
        act_url(act, language)
    } else if let Some(reg) = &meta.regulation_id {
        regulation_url(reg, language)
    } else {
        String::new()
    };
    if anchored {
        if let Some(label) = &meta.section_label {
            url.push_str(&section_anchor(label));
        }
    }
    url
}

/// Build the citation for one resource. Dispatches by source type.
pub fn build_citation(meta: &ResourceMetadata) -> Citation {
    let title = meta.title.clone().unwrap_or_default();
    let label = meta.section_label.clone().unwrap_or_default();

    let (text_en, text_fr, url_en, url_fr) = match meta.source_type {
        SourceType::Act | SourceType::Regulation => (
            format!("[{title}]"),
            format!("[{title}]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::ActSection | SourceType::RegulationSection => (
            format!("[{title}, s {label}]"),
            format!("[{title}, art {label}]"),
            doc_url(meta, Language::En, true),
            doc_url(meta, Language::Fr, true),
        ),
        SourceType::DefinedTerm => {
            let term = meta.term.clone().unwrap_or_default();
            let (en, fr) = if label.is_empty() {
                (
                    format!("[\"{term}\" - {title}]"),
                    format!("[\"{term}\" - {title}]"),
                )
            } else {
                (
                    format!("[\"{term}\" - {title}, s {label}]"),
                    format!("[\"{term}\" - {title}, art {label}]"),
                )
            };
            (
                en,
                fr,
                doc_url(meta, Language::En, true),
                doc_url(meta, Language::Fr, true),
            )
        }
        SourceType::CrossReference => {
            // The URL points at the referenced instrument.
            let target = meta.target_ref.clone().unwrap_or_default();
            let (url_en, url_fr) = match meta.target_type {
                Some(CrossRefTargetType::Regulation) => (
                    regulation_url(&target, Language::En),
                    regulation_url(&target, Language::Fr),
                ),
                _ => (act_url(&target, Language::En), act_url(&target, Language::Fr)),
            };
            (
                format!("[{title}, s {label} ref {target}]"),
                format!("[{title}, art {label} renvoi {target}]"),
                url_en,
                url_fr,
            )
        }
        SourceType::Schedule => (
            format!("[{title}, Schedule]"),
            format!("[{title}, annexe]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::Preamble => (
            format!("[{title}, Preamble]"),
            format!("[{title}, préambule]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::Treaty => (
            format!("[{title}, Treaty]"),
            format!("[{title}, traité]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::Footnote => (
            format!("[{title}, footnote]"),
            format!("[{title}, note]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::RelatedProvisions => (
            format!("[{title}, related provisions]"),
            format!("[{title}, dispositions connexes]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::PublicationItem => (
            format!("[{title}, publication]"),
            format!("[{title}, publication]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::MarginalNote => (
            format!("[{title}, s {label} note]"),
            format!("[{title}, art {label} note]"),
            doc_url(meta, Language::En, true),
            doc_url(meta, Language::Fr, true),
        ),
        SourceType::TableOfProvisions => (
            format!("[{title}, table of provisions]"),
            format!("[{title}, table analytique]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
        SourceType::SignatureBlock => (
            format!("[{title}, signature]"),
            format!("[{title}, signature]"),
            doc_url(meta, Language::En, false),
            doc_url(meta, Language::Fr, false),
        ),
    };

    Citation {
        id: 0,
        prefixed_id: String::new(),
        text_en,
        text_fr,
        url_en,
        url_fr,
        title_en: title.clone(),
        title_fr: title,
        source_type: meta.source_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_meta() -> ResourceMetadata {
        let mut m = ResourceMetadata::new(SourceType::ActSection, Language::En);
        m.act_id = Some("C-46".into());
        m.section_label = Some("91".into());
        m.title = Some("Criminal Code".into());
        m
    }

    #[test]
    fn act_section_urls_are_byte_exact() {
        let c = build_citation(&section_meta());
        assert_eq!(
            c.url_en,
            "https://laws-lois.justice.gc.ca/eng/acts/C-46/page-1.html#sec91"
        );
        assert_eq!(
            c.url_fr,
            "https://laws-lois.justice.gc.ca/fra/lois/C-46/page-1.html#sec91"
        );
    }

    #[test]
    fn act_section_text() {
        let c = build_citation(&section_meta());
        assert_eq!(c.text_en, "[Criminal Code, s 91]");
        assert_eq!(c.text_fr, "[Criminal Code, art 91]");
    }

    #[test]
    fn section_anchor_strips_non_alphanumerics() {
        let mut m = section_meta();
        m.section_label = Some("2.1".into());
        let c = build_citation(&m);
        assert!(c.url_en.ends_with("#sec21"));

        m.section_label = Some("46(1)(a)".into());
        let c = build_citation(&m);
        assert!(c.url_en.ends_with("#sec461a"));
    }

    #[test]
    fn regulation_urls() {
        let mut m = ResourceMetadata::new(SourceType::Regulation, Language::En);
        m.regulation_id = Some("SOR-86-304".into());
        m.title = Some("Migratory Birds Regulations".into());
        let c = build_citation(&m);
        assert_eq!(
            c.url_en,
            "https://laws-lois.justice.gc.ca/eng/regulations/SOR-86-304/page-1.html"
        );
        assert_eq!(
            c.url_fr,
            "https://laws-lois.justice.gc.ca/fra/reglements/SOR-86-304/page-1.html"
        );
        assert_eq!(c.text_en, "[Migratory Birds Regulations]");
    }

    #[test]
    fn defined_term_text_quotes_the_term() {
        let mut m = ResourceMetadata::new(SourceType::DefinedTerm, Language::En);
        m.act_id = Some("F-11.6".into());
        m.section_label = Some("2".into());
        m.title = Some("Firearms Act".into());
        m.term = Some("transfer".into());
        let c = build_citation(&m);
        assert_eq!(c.text_en, "[\"transfer\" - Firearms Act, s 2]");
        assert_eq!(c.text_fr, "[\"transfer\" - Firearms Act, art 2]");
        assert!(c.url_en.ends_with("#sec2"));
    }

    #[test]
    fn cross_reference_links_to_target() {
        let mut m = ResourceMetadata::new(SourceType::CrossReference, Language::En);
        m.act_id = Some("F-11.6".into());
        m.section_label = Some("4".into());
        m.title = Some("Firearms Act".into());
        m.target_type = Some(CrossRefTargetType::Act);
        m.target_ref = Some("C-46".into());
        let c = build_citation(&m);
        assert_eq!(
            c.url_en,
            "https://laws-lois.justice.gc.ca/eng/acts/C-46/page-1.html"
        );
        assert_eq!(
            c.url_fr,
            "https://laws-lois.justice.gc.ca/fra/lois/C-46/page-1.html"
        );
    }

    #[test]
    fn new_citation_is_unassigned() {
        let c = build_citation(&section_meta());
        assert_eq!(c.id, 0);
        assert!(c.prefixed_id.is_empty());
    }

    #[test]
    fn language_accessors() {
        let c = build_citation(&section_meta());
        assert_eq!(c.text_in(Language::Fr), "[Criminal Code, art 91]");
        assert!(c.url_in(Language::En).contains("/eng/"));
    }
}
