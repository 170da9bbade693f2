//! Text normalization: cross-lingual term matching and embedding input.

use unicode_normalization::UnicodeNormalization;

/// Normalize a defined term for cross-lingual matching.
///
/// Two defined terms from opposite languages that share this form (and are
/// scoped to the same document) are treated as a bilingual pair.
///
/// # Algorithm
///
/// 1. Expand ligatures (`œ` → `oe`, `æ` → `ae`) — before decomposition,
///    since NFD leaves ligatures intact.
/// 2. Unicode canonical decomposition (NFD).
/// 3. Strip combining marks in the diacritical range.
/// 4. Lowercase.
/// 5. En-dash, em-dash, hyphen → space.
/// 6. Drop everything outside `[a-z0-9 ]`.
/// 7. Collapse whitespace runs; trim.
pub fn normalize_term_for_matching(term: &str) -> String {
    let expanded: String = term
        .chars()
        .flat_map(|c| match c {
            'œ' => vec!['o', 'e'],
            'Œ' => vec!['O', 'E'],
            'æ' => vec!['a', 'e'],
            'Æ' => vec!['A', 'E'],
            other => vec![other],
        })
        .collect();

    let stripped: String = expanded
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();

    let dashed: String = stripped
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' | '-' => ' ',
            other => other,
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();

    collapse_spaces(&dashed)
}

/// Normalization applied to text immediately before embedding. The stored
/// embedding-row content is exactly this form, so the stored text and its
/// vector can never drift apart.
pub fn normalize_for_embedding(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    collapse_spaces(&flat)
}

/// Replace every whitespace run with a single space and trim.
pub fn flatten_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of three or more newlines down to a blank line and trim.
/// Used by the chunker's pre-pass; everything else is preserved as-is.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push('\n');
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
