//! Text and attribute extraction over the order-preserving XML tree.
//!
//! LIMS content is mixed: a `Text` element interleaves raw text with inline
//! markup (`DefinedTermEn`, `XRefExternal`, `Repealed`, ...). roxmltree
//! keeps the child sequence, so plain-text and HTML extraction both walk
//! children in document order.

use chrono::NaiveDate;
use roxmltree::Node;

/// Tags treated as block-level when flattening to plain text: each one
/// contributes a line of its own.
const BLOCK_TAGS: &[&str] = &[
    "Text",
    "Subsection",
    "Paragraph",
    "Subparagraph",
    "Clause",
    "Subclause",
    "Definition",
    "Item",
    "ListItem",
    "Row",
    "Provision",
    "List",
    "FormGroup",
    "TableGroup",
    "HistoricalNote",
    "ScheduleFormHeading",
    "TitleText",
];

/// Tags whose content never belongs in a section's running text.
const SKIP_TAGS: &[&str] = &["Label", "MarginalNote", "FootnoteRef"];

/// Flatten an element to plain text, one line per block-level child,
/// preserving document order of mixed content.
pub fn node_text(node: Node) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    // Tidy line boundaries without disturbing intra-line spacing.
    let lines: Vec<&str> = out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.join("\n")
}

fn collect_text(node: Node, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            if let Some(t) = child.text() {
                out.push_str(t);
            }
        } else if child.is_element() {
            let tag = child.tag_name().name();
            if SKIP_TAGS.contains(&tag) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&tag);
            // A trailing space means an inline label was just emitted; the
            // block's text continues on the same line.
            if block && !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
                out.push('\n');
            }
            // Numbered blocks keep their label inline: "(1) ...".
            if block {
                if let Some(label) = child_text(child, "Label") {
                    out.push_str(&label);
                    out.push(' ');
                }
            }
            collect_text(child, out);
            if block && !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
}

/// Render an element to minimal HTML, escaping text and preserving the
/// interleaving of text and inline elements.
pub fn node_html(node: Node) -> String {
    let mut out = String::new();
    collect_html(node, &mut out);
    out.trim().to_string()
}

fn collect_html(node: Node, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            if let Some(t) = child.text() {
                out.push_str(&escape_html(t));
            }
        } else if child.is_element() {
            let tag = child.tag_name().name();
            match tag {
                "Label" | "MarginalNote" | "FootnoteRef" => {}
                "DefinedTermEn" | "DefinedTermFr" => {
                    out.push_str("<dfn>");
                    collect_html(child, out);
                    out.push_str("</dfn>");
                }
                "Repealed" => {
                    out.push_str("<s>");
                    collect_html(child, out);
                    out.push_str("</s>");
                }
                "Emphasis" => {
                    out.push_str("<em>");
                    collect_html(child, out);
                    out.push_str("</em>");
                }
                t if BLOCK_TAGS.contains(&t) => {
                    out.push_str("<p>");
                    if let Some(label) = child_text(child, "Label") {
                        out.push_str(&escape_html(&label));
                        out.push(' ');
                    }
                    collect_html(child, out);
                    out.push_str("</p>");
                }
                _ => collect_html(child, out),
            }
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// First direct element child with the given tag name.
pub fn direct_child<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
}

/// Trimmed full text of the first direct child with the given tag.
pub fn child_text(node: Node, tag: &str) -> Option<String> {
    direct_child(node, tag).map(|c| {
        let mut s = String::new();
        collect_text(c, &mut s);
        // Labels and headings are single-line.
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    })
}

/// Attribute lookup by local name, so `lims:fid` and plain `fid` both
/// resolve.
pub fn attr_local<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

/// Parse an ISO `YYYY-MM-DD` attribute value; anything else is ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Path of an element from the root, for parse-error reporting.
pub fn node_path(node: Node) -> String {
    let mut parts = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if n.is_element() {
            parts.push(n.tag_name().name().to_string());
        }
        current = n.parent();
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}
