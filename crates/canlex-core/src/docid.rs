//! Document-identifier translation between parallel bilingual instruments.
//!
//! Justice Canada publishes each regulation under language-specific
//! identifier conventions (`SOR-86-304` / `DORS-86-304`). Cross-lingual
//! resource pairing needs to map one onto the other. Consolidated act
//! chapter numbers (`C-46`) are shared between languages and pass through
//! unchanged, as does any format this table does not recognise.

use crate::types::Language;

/// Translate a document identifier into its opposite-language convention.
///
/// | English | French |
/// |---|---|
/// | `C.R.C._c. X` | `C.R.C._ch. X` |
/// | `SOR-YYYY-N` | `DORS-YYYY-N` |
/// | `SI-YYYY-N` | `TR-YYYY-N` |
/// | `YYYY_c. X_s. Y` | `YYYY_ch. X_art. Y` |
///
/// Identifiers already in the target convention, and unknown formats, are
/// returned unchanged.
pub fn translate_doc_id(id: &str, target: Language) -> String {
    match target {
        Language::Fr => to_french(id),
        Language::En => to_english(id),
    }
}

fn to_french(id: &str) -> String {
    if let Some(rest) = id.strip_prefix("C.R.C._c. ") {
        return format!("C.R.C._ch. {rest}");
    }
    if let Some(rest) = id.strip_prefix("SOR-") {
        return format!("DORS-{rest}");
    }
    if let Some(rest) = id.strip_prefix("SI-") {
        return format!("TR-{rest}");
    }
    if let Some((year, rest)) = annual_statute_parts(id, "_c. ") {
        return format!("{year}_ch. {}", rest.replace("_s. ", "_art. "));
    }
    id.to_string()
}

fn to_english(id: &str) -> String {
    if let Some(rest) = id.strip_prefix("C.R.C._ch. ") {
        return format!("C.R.C._c. {rest}");
    }
    if let Some(rest) = id.strip_prefix("DORS-") {
        return format!("SOR-{rest}");
    }
    if let Some(rest) = id.strip_prefix("TR-") {
        return format!("SI-{rest}");
    }
    if let Some((year, rest)) = annual_statute_parts(id, "_ch. ") {
        return format!("{year}_c. {}", rest.replace("_art. ", "_s. "));
    }
    id.to_string()
}

/// Split `YYYY_c. …` / `YYYY_ch. …` into the year and the remainder after
/// the chapter marker. Returns `None` unless the id starts with a 4-digit
/// year followed by the given marker.
fn annual_statute_parts<'a>(id: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let (year, tail) = id.split_at_checked(4)?;
    if year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()) {
        tail.strip_prefix(marker).map(|rest| (year, rest))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_chapter_to_french() {
        assert_eq!(
            translate_doc_id("C.R.C._c. 870", Language::Fr),
            "C.R.C._ch. 870"
        );
    }

    #[test]
    fn crc_chapter_to_english() {
        assert_eq!(
            translate_doc_id("C.R.C._ch. 870", Language::En),
            "C.R.C._c. 870"
        );
    }

    #[test]
    fn sor_to_dors_and_back() {
        assert_eq!(translate_doc_id("SOR-86-304", Language::Fr), "DORS-86-304");
        assert_eq!(translate_doc_id("DORS-86-304", Language::En), "SOR-86-304");
    }

    #[test]
    fn si_to_tr_and_back() {
        assert_eq!(translate_doc_id("SI-2023-45", Language::Fr), "TR-2023-45");
        assert_eq!(translate_doc_id("TR-2023-45", Language::En), "SI-2023-45");
    }

    #[test]
    fn annual_statute_to_french() {
        assert_eq!(
            translate_doc_id("2019_c. 28_s. 10", Language::Fr),
            "2019_ch. 28_art. 10"
        );
    }

    #[test]
    fn annual_statute_to_english() {
        assert_eq!(
            translate_doc_id("2019_ch. 28_art. 10", Language::En),
            "2019_c. 28_s. 10"
        );
    }

    #[test]
    fn already_in_target_language_unchanged() {
        assert_eq!(translate_doc_id("DORS-86-304", Language::Fr), "DORS-86-304");
        assert_eq!(translate_doc_id("SOR-86-304", Language::En), "SOR-86-304");
    }

    #[test]
    fn consolidated_act_chapter_unchanged() {
        assert_eq!(translate_doc_id("C-46", Language::Fr), "C-46");
        assert_eq!(translate_doc_id("C-46", Language::En), "C-46");
    }

    #[test]
    fn unknown_format_unchanged() {
        assert_eq!(
            translate_doc_id("NOT-A-KNOWN-ID", Language::Fr),
            "NOT-A-KNOWN-ID"
        );
    }

    #[test]
    fn short_ids_do_not_panic() {
        assert_eq!(translate_doc_id("x", Language::Fr), "x");
        assert_eq!(translate_doc_id("", Language::En), "");
    }

    #[test]
    fn round_trip_is_identity() {
        for id in ["C.R.C._c. 870", "SOR-86-304", "SI-2023-45", "2019_c. 28_s. 10"] {
            let fr = translate_doc_id(id, Language::Fr);
            assert_eq!(translate_doc_id(&fr, Language::En), id);
        }
    }
}
