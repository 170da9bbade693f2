//! Query-language detection.
//!
//! A lightweight heuristic is enough here: count French-distinctive
//! function words and accented characters, defaulting to English. Queries
//! are short, so a couple of signals decide it.

use canlex_core::types::Language;

/// French function words that rarely appear in English queries.
const FRENCH_WORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "et", "est", "que", "qui", "quoi",
    "dans", "pour", "sur", "avec", "sans", "être", "avoir", "quel", "quelle", "quels",
    "quelles", "comment", "pourquoi", "loi", "lois", "règlement", "article", "définition",
];

const FRENCH_ACCENTS: &[char] = &[
    'à', 'â', 'ç', 'é', 'è', 'ê', 'ë', 'î', 'ï', 'ô', 'ù', 'û', 'ü', 'œ',
];

/// Detect the language of a query. Defaults to English.
pub fn detect_language(query: &str) -> Language {
    let lower = query.to_lowercase();

    let word_hits = lower
        .split(|c: char| !c.is_alphanumeric() && !FRENCH_ACCENTS.contains(&c) && c != '\'')
        .filter(|w| !w.is_empty())
        .filter(|w| FRENCH_WORDS.contains(w))
        .count();

    let accent_hits = lower.chars().filter(|c| FRENCH_ACCENTS.contains(c)).count();

    if word_hits + accent_hits * 2 >= 3 {
        Language::Fr
    } else {
        Language::En
    }
}
