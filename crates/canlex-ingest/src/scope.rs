//! Definition-scope interpretation.
//!
//! A definitions section usually opens with text such as "The following
//! definitions apply in this Act." or "Les définitions qui suivent
//! s'appliquent aux articles 17 à 19." The lowercased text is matched
//! against an ordered pattern table; the first match wins.

use canlex_core::types::ScopeType;

/// Result of interpreting a definitions section's introductory text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScope {
    pub scope_type: ScopeType,
    /// Ordered section labels, for `scope_type == Section`.
    pub scope_sections: Vec<String>,
    pub raw_text: Option<String>,
}

/// Interpret scope text. `current_section` is the label of the section the
/// definitions live in; `root_scope` is `Act` or `Regulation` depending on
/// the document root and is the fallback when nothing matches.
pub fn parse_scope(scope_text: &str, current_section: &str, root_scope: ScopeType) -> ParsedScope {
    let repaired = repair_reference_artifacts(scope_text);
    let lower = repaired.to_lowercase();
    let refs = parse_section_refs(&lower);
    let raw = Some(repaired.trim().to_string()).filter(|s| !s.is_empty());

    // "in this act", unless it continues "…and the regulations".
    let act_match = lower
        .find("in this act")
        .map(|i| !lower[i..].starts_with("in this act and"))
        .unwrap_or(false)
        || lower.contains("dans la présente loi");
    if act_match {
        return ParsedScope {
            scope_type: ScopeType::Act,
            scope_sections: Vec::new(),
            raw_text: raw,
        };
    }

    let regulation_match = (lower.contains("in this regulation")
        || lower.contains("in these regulations")
        || lower.contains("dans le présent règlement"))
        && refs.is_empty();
    if regulation_match {
        return ParsedScope {
            scope_type: ScopeType::Regulation,
            scope_sections: Vec::new(),
            raw_text: raw,
        };
    }

    let part_match = (lower.contains("in this part") || lower.contains("dans la présente partie"))
        && refs.is_empty();
    if part_match {
        return ParsedScope {
            scope_type: ScopeType::Part,
            scope_sections: Vec::new(),
            raw_text: raw,
        };
    }

    if lower.contains("in this section")
        || lower.contains("apply in this section")
        || lower.contains("au présent article")
    {
        // Scoped to the defining section itself, plus anything referenced.
        let mut sections = vec![current_section.to_string()];
        for r in refs {
            if !sections.contains(&r) {
                sections.push(r);
            }
        }
        return ParsedScope {
            scope_type: ScopeType::Section,
            scope_sections: sections,
            raw_text: raw,
        };
    }

    if (lower.contains("apply in section")
        || lower.contains("s'appliquent aux articles")
        || lower.contains("s'appliquent à l'article"))
        && !refs.is_empty()
    {
        return ParsedScope {
            scope_type: ScopeType::Section,
            scope_sections: refs,
            raw_text: raw,
        };
    }

    ParsedScope {
        scope_type: root_scope,
        scope_sections: Vec::new(),
        raw_text: raw,
    }
}

/// Extract section references from scope text, expanding integer ranges.
///
/// `17 to 19` and `17-19` enumerate to `17, 18, 19`; decimal ranges like
/// `90.02 to 90.24` keep endpoints only (consumers range-check those).
/// Ranges wider than 500 labels also keep endpoints only.
pub fn parse_section_refs(text: &str) -> Vec<String> {
    let tokens = tokenize_refs(text);
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            RefToken::Number(a) => {
                if i + 2 < tokens.len()
                    && tokens[i + 1] == RefToken::RangeSep
                    && matches!(tokens[i + 2], RefToken::Number(_))
                {
                    let RefToken::Number(b) = &tokens[i + 2] else {
                        unreachable!()
                    };
                    push_range(&mut out, a, b);
                    i += 3;
                } else {
                    push_unique(&mut out, a.clone());
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    out
}

#[derive(Debug, PartialEq)]
enum RefToken {
    Number(String),
    RangeSep,
    Word,
}

fn tokenize_refs(text: &str) -> Vec<RefToken> {
    let mut tokens = Vec::new();
    for raw in text.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '(' || c == ')')
    {
        if raw.is_empty() {
            continue;
        }
        // The French range separator is a bare accented word; test before
        // the ASCII trim strips it.
        if raw.eq_ignore_ascii_case("to") || raw == "à" {
            tokens.push(RefToken::RangeSep);
            continue;
        }
        let word = raw.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-');
        if word.is_empty() {
            continue;
        }
        if let Some((a, b)) = hyphen_range(word) {
            tokens.push(RefToken::Number(a));
            tokens.push(RefToken::RangeSep);
            tokens.push(RefToken::Number(b));
        } else if is_section_number(word) {
            tokens.push(RefToken::Number(trim_label(word)));
        } else {
            tokens.push(RefToken::Word);
        }
    }
    tokens
}

/// `17-19` → two numbers around a range separator. A lone hyphen between
/// digits is a range; anything else is not.
fn hyphen_range(word: &str) -> Option<(String, String)> {
    let (a, b) = word.split_once('-')?;
    if is_section_number(a) && is_section_number(b) {
        Some((trim_label(a), trim_label(b)))
    } else {
        None
    }
}

/// Section labels are digits with an optional decimal insertion part:
/// `17`, `90.02`, `21.1`.
fn is_section_number(s: &str) -> bool {
    let s = s.trim_end_matches('.');
    if s.is_empty() {
        return false;
    }
    let mut dots = 0;
    for c in s.chars() {
        if c == '.' {
            dots += 1;
            if dots > 1 {
                return false;
            }
        } else if !c.is_ascii_digit() {
            return false;
        }
    }
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn trim_label(s: &str) -> String {
    s.trim_end_matches('.').to_string()
}

const MAX_ENUMERATED_RANGE: u64 = 500;

fn push_range(out: &mut Vec<String>, a: &str, b: &str) {
    let ints = (a.parse::<u64>(), b.parse::<u64>());
    match ints {
        (Ok(lo), Ok(hi)) if lo <= hi && hi - lo <= MAX_ENUMERATED_RANGE => {
            for n in lo..=hi {
                push_unique(out, n.to_string());
            }
        }
        _ => {
            // Decimal sections (or degenerate ranges): endpoints only.
            push_unique(out, a.to_string());
            push_unique(out, b.to_string());
        }
    }
}

fn push_unique(out: &mut Vec<String>, label: String) {
    if !out.contains(&label) {
        out.push(label);
    }
}

/// Repair concatenated XML text artifacts such as `sectionsto.73 80`,
/// which should read `sections 73 to 80`.
pub fn repair_reference_artifacts(text: &str) -> String {
    let mut out = text.to_string();
    for marker in ["sectionsto.", "sectionto."] {
        while let Some(start) = out.find(marker) {
            let after = &out[start + marker.len()..];
            let mut nums = after.split_whitespace();
            let (Some(a), Some(b)) = (nums.next(), nums.next()) else {
                break;
            };
            if !is_section_number(a) || !is_section_number(b) {
                break;
            }
            // Length of "{a} … {b}" with original whitespace between.
            let a_end = match after.find(a) {
                Some(i) => i + a.len(),
                None => break,
            };
            let consumed_len = match after[a_end..].find(b) {
                Some(i) => a_end + i + b.len(),
                None => break,
            };
            let keyword = if marker.starts_with("sections") {
                "sections"
            } else {
                "section"
            };
            let replacement = format!("{keyword} {a} to {b}");
            out.replace_range(start..start + marker.len() + consumed_len, &replacement);
        }
    }
    out
}
