//! Defined-term extraction from definitions sections.
//!
//! A `Definition` element carries the defined expression in both languages
//! as inline `DefinedTermEn` / `DefinedTermFr` markup; the i-th English
//! term pairs with the i-th French term. Sections that inline defined
//! terms without a `Definition` wrapper get one synthetic definition built
//! from their own text.

use roxmltree::Node;

use canlex_core::normalize::normalize_term_for_matching;
use canlex_core::types::{Language, ParsedDefinedTerm, ScopeType};

use crate::scope::parse_scope;
use crate::text::node_text;

/// Extract every defined term from one section.
pub fn extract_defined_terms(
    section: Node,
    section_label: &str,
    language: Language,
    act_id: Option<&str>,
    regulation_id: Option<&str>,
    root_scope: ScopeType,
) -> Vec<ParsedDefinedTerm> {
    let definitions: Vec<Node> = section
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Definition")
        .collect();

    let intro = intro_text(section);
    let scope = parse_scope(intro.as_deref().unwrap_or(""), section_label, root_scope);

    let mut out = Vec::new();
    if definitions.is_empty() {
        // No wrapper: synthesize a single definition from the section text
        // when inline terms are present.
        if has_inline_terms(section) {
            emit_terms(
                section,
                &node_text(section),
                section_label,
                language,
                act_id,
                regulation_id,
                &scope,
                &mut out,
            );
        }
        return out;
    }

    for def in definitions {
        let definition_text = node_text(def);
        emit_terms(
            def,
            &definition_text,
            section_label,
            language,
            act_id,
            regulation_id,
            &scope,
            &mut out,
        );
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn emit_terms(
    node: Node,
    definition_text: &str,
    section_label: &str,
    language: Language,
    act_id: Option<&str>,
    regulation_id: Option<&str>,
    scope: &crate::scope::ParsedScope,
    out: &mut Vec<ParsedDefinedTerm>,
) {
    let en = term_texts(node, "DefinedTermEn");
    let fr = term_texts(node, "DefinedTermFr");
    let (own, other) = match language {
        Language::En => (&en, &fr),
        Language::Fr => (&fr, &en),
    };

    for (i, term) in own.iter().enumerate() {
        out.push(ParsedDefinedTerm {
            language,
            term: term.clone(),
            term_normalized: normalize_term_for_matching(term),
            paired_term: other.get(i).cloned(),
            definition: definition_text.to_string(),
            act_id: act_id.map(str::to_string),
            regulation_id: regulation_id.map(str::to_string),
            section_label: Some(section_label.to_string()),
            scope_type: scope.scope_type,
            scope_sections: scope.scope_sections.clone(),
            scope_raw_text: scope.raw_text.clone(),
            lims: None,
        });
    }
}

fn term_texts(node: Node, tag: &str) -> Vec<String> {
    node.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == tag)
        .map(|n| {
            n.descendants()
                .filter_map(|d| if d.is_text() { d.text() } else { None })
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn has_inline_terms(section: Node) -> bool {
    section.descendants().any(|n| {
        n.is_element()
            && matches!(n.tag_name().name(), "DefinedTermEn" | "DefinedTermFr")
    })
}

/// The section's introductory text: the first `Text` element that is not
/// itself inside a `Definition`.
fn intro_text(section: Node) -> Option<String> {
    section
        .descendants()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == "Text"
                && !n.ancestors().any(|a| a.tag_name().name() == "Definition")
        })
        .map(node_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_section(doc: &roxmltree::Document) -> Node<'_, '_> {
        doc.descendants()
            .find(|n| n.tag_name().name() == "Section")
            .unwrap()
    }

    #[test]
    fn paired_terms_positional() {
        let xml = r#"<Section><Label>2</Label>
            <Text>The following definitions apply in this Act.</Text>
            <Definition>
              <Text><DefinedTermEn>firearm</DefinedTermEn> means a barrelled weapon (<DefinedTermFr>arme à feu</DefinedTermFr>)</Text>
            </Definition>
            <Definition>
              <Text><DefinedTermEn>peace officer</DefinedTermEn> includes a mayor (<DefinedTermFr>agent de la paix</DefinedTermFr>)</Text>
            </Definition>
        </Section>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let terms = extract_defined_terms(
            first_section(&doc),
            "2",
            Language::En,
            Some("C-46"),
            None,
            ScopeType::Act,
        );
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term, "firearm");
        assert_eq!(terms[0].paired_term.as_deref(), Some("arme à feu"));
        assert_eq!(terms[0].term_normalized, "firearm");
        assert_eq!(terms[0].scope_type, ScopeType::Act);
        assert_eq!(terms[1].term, "peace officer");
        assert_eq!(terms[1].paired_term.as_deref(), Some("agent de la paix"));
    }

    #[test]
    fn french_document_emits_french_terms() {
        let xml = r#"<Section><Label>2</Label>
            <Text>Les définitions qui suivent s'appliquent dans la présente loi.</Text>
            <Definition>
              <Text><DefinedTermFr>arme à feu</DefinedTermFr> Toute arme susceptible (<DefinedTermEn>firearm</DefinedTermEn>)</Text>
            </Definition>
        </Section>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let terms = extract_defined_terms(
            first_section(&doc),
            "2",
            Language::Fr,
            Some("C-46"),
            None,
            ScopeType::Act,
        );
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term, "arme à feu");
        assert_eq!(terms[0].term_normalized, "arme a feu");
        assert_eq!(terms[0].paired_term.as_deref(), Some("firearm"));
    }

    #[test]
    fn multiple_terms_in_one_definition_pair_by_index() {
        let xml = r#"<Section><Label>3</Label>
            <Definition><Text>
              <DefinedTermEn>sell</DefinedTermEn> or <DefinedTermEn>offer</DefinedTermEn>
              (<DefinedTermFr>vendre</DefinedTermFr> ou <DefinedTermFr>offrir</DefinedTermFr>)
            </Text></Definition>
        </Section>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let terms = extract_defined_terms(
            first_section(&doc),
            "3",
            Language::En,
            Some("C-46"),
            None,
            ScopeType::Act,
        );
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term, "sell");
        assert_eq!(terms[0].paired_term.as_deref(), Some("vendre"));
        assert_eq!(terms[1].term, "offer");
        assert_eq!(terms[1].paired_term.as_deref(), Some("offrir"));
    }

    #[test]
    fn synthetic_definition_without_wrapper() {
        let xml = r#"<Section><Label>4</Label>
            <Text>In this section, <DefinedTermEn>vessel</DefinedTermEn> means a boat (<DefinedTermFr>bâtiment</DefinedTermFr>).</Text>
        </Section>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let terms = extract_defined_terms(
            first_section(&doc),
            "4",
            Language::En,
            Some("C-46"),
            None,
            ScopeType::Act,
        );
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].term, "vessel");
        assert_eq!(terms[0].scope_type, ScopeType::Section);
        assert_eq!(terms[0].scope_sections, vec!["4".to_string()]);
        assert!(terms[0].definition.contains("means a boat"));
    }

    #[test]
    fn no_terms_no_records() {
        let xml = "<Section><Label>5</Label><Text>No definitions here.</Text></Section>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let terms = extract_defined_terms(
            first_section(&doc),
            "5",
            Language::En,
            Some("C-46"),
            None,
            ScopeType::Act,
        );
        assert!(terms.is_empty());
    }

    #[test]
    fn scope_sections_recorded_for_ranged_scope() {
        let xml = r#"<Section><Label>15</Label>
            <Text>The following definitions apply in sections 17 to 19 and 21 to 28.</Text>
            <Definition><Text><DefinedTermEn>analyst</DefinedTermEn> means… (<DefinedTermFr>analyste</DefinedTermFr>)</Text></Definition>
        </Section>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let terms = extract_defined_terms(
            first_section(&doc),
            "15",
            Language::En,
            None,
            Some("SOR-86-304"),
            ScopeType::Regulation,
        );
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].scope_type, ScopeType::Section);
        assert_eq!(terms[0].scope_sections.len(), 11);
        assert_eq!(terms[0].scope_sections[0], "17");
        assert_eq!(terms[0].scope_sections[10], "28");
    }
}
