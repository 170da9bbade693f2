//! LIMS XML document parser.
//!
//! One deterministic traversal over the parsed tree emits every record the
//! index stores: the document itself, sections, defined terms,
//! cross-references, preambles, treaties, schedules and the positional
//! records. Traversal state is three things: a monotonic section-order
//! counter, the heading hierarchy stack, and the enclosing schedule
//! context.

use roxmltree::{Document, Node};
use tracing::debug;

use canlex_core::types::{
    Act, ChangeType, CrossRefTargetType, DocStatus, Footnote, Language, LimsMetadata,
    MarginalNoteRecord, ParsedCrossReference, ParsedDocument, ParsedSection, ParsedSchedule,
    Preamble, PublicationItem, Regulation, RelatedProvision, ScheduleContext, ScopeType,
    SectionDates, SectionFootnote, SectionType, SignatureBlock, TableOfProvisions, Treaty,
};

use crate::definitions::extract_defined_terms;
use crate::error::{ParseError, ParseErrorKind};
use crate::text::{attr_local, child_text, direct_child, node_html, node_path, node_text, parse_date};

/// Parse one LIMS XML document into typed records.
///
/// Recognised roots are `Statute` and `Regulation`. Anything else, or a
/// document with no usable identification block, is a [`ParseError`];
/// missing optional subcomponents are silent.
pub fn parse_document(xml: &str) -> Result<ParsedDocument, ParseError> {
    let doc = Document::parse(xml).map_err(|e| ParseError::new(e, "/"))?;
    let root = doc.root_element();
    match root.tag_name().name() {
        "Statute" => parse_statute(root),
        "Regulation" => parse_regulation(root),
        other => Err(ParseError::new(
            ParseErrorKind::UnknownRoot(other.to_string()),
            node_path(root),
        )),
    }
}

fn parse_statute(root: Node) -> Result<ParsedDocument, ParseError> {
    let language = root_language(root);
    let ident = direct_child(root, "Identification").ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MissingIdentification("Identification"),
            node_path(root),
        )
    })?;

    let act_id = ident
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "Chapter")
        .find_map(|ch| child_text(ch, "ConsolidatedNumber").or_else(|| Some(node_text(ch))))
        .filter(|s| !s.is_empty())
        .or_else(|| child_text(ident, "BillNumber"))
        .ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MissingIdentification("Chapter"),
                node_path(ident),
            )
        })?;

    let long_title = child_text(ident, "LongTitle");
    let short_title = child_text(ident, "ShortTitle");
    let title = short_title
        .clone()
        .or_else(|| long_title.clone())
        .unwrap_or_else(|| act_id.clone());

    let lims = lims_metadata(root);
    let act = Act {
        act_id: act_id.clone(),
        language,
        title: title.clone(),
        long_title,
        short_title,
        status: root_status(root),
        consolidation_date: attr_local(root, "consolidation-date")
            .or_else(|| attr_local(root, "current-date"))
            .and_then(parse_date),
        lims,
    };

    let mut traversal = Traversal::new(act_id, title, language, false);
    traversal.out.acts.push(act);
    traversal.walk(root);
    debug!(
        sections = traversal.out.sections.len(),
        terms = traversal.out.defined_terms.len(),
        "parsed statute"
    );
    Ok(traversal.out)
}

fn parse_regulation(root: Node) -> Result<ParsedDocument, ParseError> {
    let language = root_language(root);
    let ident = direct_child(root, "Identification").ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MissingIdentification("Identification"),
            node_path(root),
        )
    })?;

    let regulation_id = child_text(ident, "InstrumentNumber")
        .map(|s| normalize_instrument_id(&s))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::MissingIdentification("InstrumentNumber"),
                node_path(ident),
            )
        })?;

    let long_title = child_text(ident, "LongTitle");
    let short_title = child_text(ident, "ShortTitle");
    let title = short_title
        .clone()
        .or_else(|| long_title.clone())
        .unwrap_or_else(|| regulation_id.clone());

    let enabling = direct_child(ident, "EnablingAuthority").and_then(|ea| {
        ea.descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "XRefExternal")
    });

    let regulation = Regulation {
        regulation_id: regulation_id.clone(),
        language,
        title: title.clone(),
        long_title,
        short_title,
        status: root_status(root),
        consolidation_date: attr_local(root, "consolidation-date")
            .or_else(|| attr_local(root, "current-date"))
            .and_then(parse_date),
        registration_date: child_text(ident, "RegistrationDate").as_deref().and_then(parse_date),
        enabling_act_id: enabling.and_then(|x| attr_local(x, "link").map(str::to_string)),
        enabling_act_title: enabling.map(node_text).filter(|t| !t.is_empty()),
        lims: lims_metadata(root),
    };

    let mut traversal = Traversal::new(regulation_id, title, language, true);
    traversal.out.regulations.push(regulation);
    traversal.walk(root);
    debug!(
        sections = traversal.out.sections.len(),
        terms = traversal.out.defined_terms.len(),
        "parsed regulation"
    );
    Ok(traversal.out)
}

fn root_language(root: Node) -> Language {
    attr_local(root, "lang")
        .and_then(Language::parse)
        .unwrap_or(Language::En)
}

fn root_status(root: Node) -> DocStatus {
    match attr_local(root, "in-force") {
        Some("no") => DocStatus::NotInForce,
        _ => DocStatus::InForce,
    }
}

fn lims_metadata(node: Node) -> Option<LimsMetadata> {
    let meta = LimsMetadata {
        fid: attr_local(node, "fid").map(str::to_string),
        id: attr_local(node, "id").map(str::to_string),
        enacted_date: attr_local(node, "enacted-date").and_then(parse_date),
        in_force_start_date: attr_local(node, "inforce-start-date").and_then(parse_date),
        last_amended_date: attr_local(node, "lastamended-date").and_then(parse_date),
    };
    (!meta.is_empty()).then_some(meta)
}

/// `SOR/86-304` → `SOR-86-304`, `C.R.C., c. 870` → `C.R.C._c. 870`.
fn normalize_instrument_id(raw: &str) -> String {
    raw.trim()
        .replace(", c. ", "_c. ")
        .replace(", ch. ", "_ch. ")
        .replace('/', "-")
}

// ── Traversal ──

struct Traversal {
    doc_id: String,
    doc_title: String,
    language: Language,
    is_regulation: bool,
    section_order: u32,
    hierarchy: Vec<String>,
    schedule: Option<ScheduleContext>,
    out: ParsedDocument,
}

impl Traversal {
    fn new(doc_id: String, doc_title: String, language: Language, is_regulation: bool) -> Self {
        Self {
            doc_id,
            doc_title,
            language,
            is_regulation,
            section_order: 0,
            hierarchy: Vec::new(),
            schedule: None,
            out: ParsedDocument::default(),
        }
    }

    fn root_scope(&self) -> ScopeType {
        if self.is_regulation {
            ScopeType::Regulation
        } else {
            ScopeType::Act
        }
    }

    fn walk(&mut self, node: Node) {
        for child in node.children().filter(|c| c.is_element()) {
            self.dispatch(child);
        }
    }

    fn dispatch(&mut self, node: Node) {
        match node.tag_name().name() {
            "Heading" => self.apply_heading(node),
            "Section" => {
                self.emit_section(node, None);
                // Nested sections (amending schedules embed them) still
                // need their own records.
                self.walk(node);
            }
            "Provision" => self.emit_provision(node),
            "Schedule" => self.handle_schedule(node),
            "Body" | "Order" | "BilingualGroup" | "Introduction" => self.walk(node),
            "BillPiece" | "RelatedOrNotInForce" => {
                if self.schedule.is_some() {
                    self.extract_schedule_content(node);
                }
                self.walk(node);
            }
            "Preamble" => {
                let content = node_text(node);
                if !content.is_empty() {
                    self.out.preambles.push(Preamble {
                        doc_id: self.doc_id.clone(),
                        language: self.language,
                        position: self.out.preambles.len() as u32,
                        content,
                    });
                }
            }
            "RelatedProvs" => {
                self.out.related_provisions.push(RelatedProvision {
                    doc_id: self.doc_id.clone(),
                    language: self.language,
                    position: self.out.related_provisions.len() as u32,
                    label: child_text(node, "Label"),
                    content: node_text(node),
                });
            }
            "PublicationItem" => {
                self.out.publication_items.push(PublicationItem {
                    doc_id: self.doc_id.clone(),
                    language: self.language,
                    position: self.out.publication_items.len() as u32,
                    content: node_text(node),
                });
            }
            "TableOfProvisions" => {
                self.out.tables_of_provisions.push(TableOfProvisions {
                    doc_id: self.doc_id.clone(),
                    language: self.language,
                    position: self.out.tables_of_provisions.len() as u32,
                    content: node_text(node),
                });
            }
            "SignatureBlock" => {
                self.out.signature_blocks.push(SignatureBlock {
                    doc_id: self.doc_id.clone(),
                    language: self.language,
                    position: self.out.signature_blocks.len() as u32,
                    content: node_text(node),
                });
            }
            "Footnote" => {
                // Section-level footnotes ride on their section; only
                // free-standing ones become document records.
                if !inside_section(node) {
                    self.out.footnotes.push(Footnote {
                        doc_id: self.doc_id.clone(),
                        language: self.language,
                        position: self.out.footnotes.len() as u32,
                        label: attr_local(node, "id")
                            .map(str::to_string)
                            .or_else(|| child_text(node, "Label")),
                        content: node_text(node),
                    });
                }
            }
            "Identification" => {}
            _ => self.walk(node),
        }
    }

    fn apply_heading(&mut self, node: Node) {
        let level: usize = attr_local(node, "level")
            .and_then(|v| v.parse().ok())
            .filter(|&l| l >= 1)
            .unwrap_or(1);
        let mut parts = Vec::new();
        if let Some(label) = child_text(node, "Label") {
            parts.push(label);
        }
        if let Some(title) = child_text(node, "TitleText") {
            parts.push(title);
        }
        if parts.is_empty() {
            let text = node_text(node);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        self.hierarchy.truncate(level - 1);
        if !parts.is_empty() {
            self.hierarchy.push(parts.join(" "));
        }
    }

    fn next_order(&mut self) -> u32 {
        let order = self.section_order;
        self.section_order += 1;
        order
    }

    fn canonical_id(&self, section_type: SectionType, order: u32, label: &str) -> String {
        match &self.schedule {
            None => format!(
                "{}/{}/{}/{}/s{}",
                self.doc_id,
                self.language,
                section_type.as_str(),
                order,
                label
            ),
            Some(ctx) => format!(
                "{}/{}/{}/{}/sch-{}/s{}",
                self.doc_id,
                self.language,
                section_type.as_str(),
                order,
                ctx.slug(),
                label
            ),
        }
    }

    fn section_type_for(&self, node: Node) -> SectionType {
        match attr_local(node, "type") {
            Some("amending") | Some("CIF") => return SectionType::Amending,
            _ => {}
        }
        if let Some(ctx) = &self.schedule {
            let nif = ctx.schedule_id.as_deref() == Some("NifProvs");
            let amending = ctx.schedule_type.as_deref() == Some("amending");
            if nif || amending {
                return SectionType::Amending;
            }
        }
        SectionType::Section
    }

    fn emit_section(&mut self, node: Node, forced_type: Option<SectionType>) {
        let order = self.next_order();
        let section_type = forced_type.unwrap_or_else(|| self.section_type_for(node));
        let label = child_text(node, "Label")
            .map(|l| l.trim_end_matches('.').to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("order-{order}"));

        let status = if is_repealed(node) {
            DocStatus::Repealed
        } else if attr_local(node, "in-force") == Some("no") {
            DocStatus::NotInForce
        } else {
            DocStatus::InForce
        };

        let marginal_note = child_text(node, "MarginalNote");
        if let Some(note) = &marginal_note {
            self.out.marginal_notes.push(MarginalNoteRecord {
                doc_id: self.doc_id.clone(),
                language: self.language,
                position: self.out.marginal_notes.len() as u32,
                section_label: Some(label.clone()),
                content: note.clone(),
            });
        }

        let content = node_text(node);
        let content_html = Some(node_html(node)).filter(|h| !h.is_empty());

        let historical_notes: Vec<String> = own_descendants(node, "HistoricalNote")
            .into_iter()
            .map(node_text)
            .filter(|t| !t.is_empty())
            .collect();

        let footnotes: Vec<SectionFootnote> = own_descendants(node, "Footnote")
            .into_iter()
            .map(|f| SectionFootnote {
                label: attr_local(f, "id")
                    .map(str::to_string)
                    .or_else(|| child_text(f, "Label"))
                    .unwrap_or_default(),
                text: node_text(f),
            })
            .filter(|f| !f.text.is_empty())
            .collect();

        let internal_references: Vec<String> = own_descendants(node, "XRefInternal")
            .into_iter()
            .map(node_text)
            .filter(|t| !t.is_empty())
            .collect();

        for xref in own_descendants(node, "XRefExternal") {
            let target_type = match attr_local(xref, "reference-type") {
                Some("regulation") => CrossRefTargetType::Regulation,
                _ => CrossRefTargetType::Act,
            };
            let text = node_text(xref);
            let target_ref = attr_local(xref, "link")
                .map(str::to_string)
                .unwrap_or_else(|| text.clone());
            if target_ref.is_empty() {
                continue;
            }
            self.out.cross_references.push(ParsedCrossReference {
                source_doc_id: self.doc_id.clone(),
                source_section_label: label.clone(),
                language: self.language,
                target_type,
                target_ref,
                target_subref: attr_local(xref, "target-section").map(str::to_string),
                text,
            });
        }

        let (act_id, regulation_id) = self.doc_ids();
        let terms = extract_defined_terms(
            node,
            &label,
            self.language,
            act_id.as_deref(),
            regulation_id.as_deref(),
            self.root_scope(),
        );
        self.out.defined_terms.extend(terms);

        self.out.sections.push(ParsedSection {
            canonical_section_id: self.canonical_id(section_type, order, &label),
            section_label: label,
            section_order: order,
            language: self.language,
            section_type,
            hierarchy_path: self.hierarchy.clone(),
            marginal_note,
            content,
            content_html,
            status,
            change_type: attr_local(node, "change").and_then(ChangeType::parse),
            dates: section_dates(node),
            lims: lims_metadata(node),
            historical_notes,
            footnotes,
            internal_references,
            schedule_context: self.schedule.clone(),
            act_id,
            regulation_id,
        });
    }

    fn emit_provision(&mut self, node: Node) {
        let order = self.next_order();
        let label = format!("order-{order}");
        let content = node_text(node);
        let (act_id, regulation_id) = self.doc_ids();
        self.out.sections.push(ParsedSection {
            canonical_section_id: self.canonical_id(SectionType::Provision, order, &label),
            section_label: label,
            section_order: order,
            language: self.language,
            section_type: SectionType::Provision,
            hierarchy_path: self.hierarchy.clone(),
            marginal_note: child_text(node, "MarginalNote"),
            content,
            content_html: Some(node_html(node)).filter(|h| !h.is_empty()),
            status: DocStatus::InForce,
            change_type: attr_local(node, "change").and_then(ChangeType::parse),
            dates: section_dates(node),
            lims: lims_metadata(node),
            historical_notes: Vec::new(),
            footnotes: Vec::new(),
            internal_references: Vec::new(),
            schedule_context: self.schedule.clone(),
            act_id,
            regulation_id,
        });
    }

    fn handle_schedule(&mut self, node: Node) {
        let heading = direct_child(node, "ScheduleFormHeading");
        let label = heading
            .and_then(|h| child_text(h, "Label"))
            .or_else(|| child_text(node, "Label"))
            .or_else(|| attr_local(node, "id").map(str::to_string))
            .unwrap_or_else(|| "Schedule".to_string());
        let title = heading.and_then(|h| child_text(h, "TitleText"));
        let schedule_type = attr_local(node, "type").map(str::to_string);
        let schedule_id = attr_local(node, "id").map(str::to_string);

        let ctx = ScheduleContext {
            label: label.clone(),
            schedule_id,
            schedule_type: schedule_type.clone(),
        };

        // Treaty schedules additionally produce a treaty record.
        let treaty_child = direct_child(node, "Treaty");
        if schedule_type.as_deref() == Some("treaty") || treaty_child.is_some() {
            let content = treaty_child.map(node_text).unwrap_or_else(|| node_text(node));
            if !content.is_empty() {
                self.out.treaties.push(Treaty {
                    doc_id: self.doc_id.clone(),
                    language: self.language,
                    position: self.out.treaties.len() as u32,
                    title: title.clone(),
                    content,
                });
            }
        }

        let content = node_text(node);
        if !content.is_empty() {
            self.out.schedules.push(ParsedSchedule {
                doc_id: self.doc_id.clone(),
                language: self.language,
                position: self.out.schedules.len() as u32,
                label: label.clone(),
                title: title.clone(),
                schedule_type,
                content,
            });
        }

        let hierarchy_entry = match &title {
            Some(t) => format!("{label} {t}"),
            None => label,
        };
        self.hierarchy.push(hierarchy_entry);
        let previous = self.schedule.replace(ctx);

        self.extract_schedule_content(node);
        self.walk(node);

        self.schedule = previous;
        self.hierarchy.pop();
    }

    /// Lists, forms and tables inside a schedule become synthetic sections
    /// so their content is retrievable on its own.
    fn extract_schedule_content(&mut self, node: Node) {
        for child in node.children().filter(|c| c.is_element()) {
            let tag = child.tag_name().name();
            if matches!(tag, "List" | "Form" | "FormGroup" | "TableGroup" | "table") {
                let content = node_text(child);
                if content.is_empty() {
                    continue;
                }
                let order = self.next_order();
                let label = format!("order-{order}");
                let (act_id, regulation_id) = self.doc_ids();
                self.out.sections.push(ParsedSection {
                    canonical_section_id: self.canonical_id(SectionType::Schedule, order, &label),
                    section_label: label,
                    section_order: order,
                    language: self.language,
                    section_type: SectionType::Schedule,
                    hierarchy_path: self.hierarchy.clone(),
                    marginal_note: None,
                    content,
                    content_html: Some(node_html(child)).filter(|h| !h.is_empty()),
                    status: DocStatus::InForce,
                    change_type: None,
                    dates: SectionDates::default(),
                    lims: None,
                    historical_notes: Vec::new(),
                    footnotes: Vec::new(),
                    internal_references: Vec::new(),
                    schedule_context: self.schedule.clone(),
                    act_id,
                    regulation_id,
                });
            }
        }
    }

    fn doc_ids(&self) -> (Option<String>, Option<String>) {
        if self.is_regulation {
            (None, Some(self.doc_id.clone()))
        } else {
            (Some(self.doc_id.clone()), None)
        }
    }
}

fn section_dates(node: Node) -> SectionDates {
    SectionDates {
        enacted_date: attr_local(node, "enacted-date").and_then(parse_date),
        in_force_date: attr_local(node, "inforce-start-date").and_then(parse_date),
        last_amended_date: attr_local(node, "lastamended-date").and_then(parse_date),
    }
}

/// A section is repealed iff it has a direct repealed marker child, or its
/// only substantive child is a `Text` whose entire content is repealed
/// markers. A section with some repealed subcontent but other active text
/// is not repealed.
fn is_repealed(section: Node) -> bool {
    if section
        .children()
        .any(|c| c.is_element() && c.tag_name().name() == "Repealed")
    {
        return true;
    }

    let substantive: Vec<Node> = section
        .children()
        .filter(|c| {
            c.is_element()
                && !matches!(
                    c.tag_name().name(),
                    "Label" | "MarginalNote" | "HistoricalNote" | "FootnoteRef"
                )
        })
        .collect();

    if substantive.len() != 1 || substantive[0].tag_name().name() != "Text" {
        return false;
    }

    let text = substantive[0];
    let mut saw_repealed = false;
    for child in text.children() {
        if child.is_element() {
            if child.tag_name().name() == "Repealed" {
                saw_repealed = true;
            } else {
                return false;
            }
        } else if child.is_text() && !child.text().unwrap_or("").trim().is_empty() {
            return false;
        }
    }
    saw_repealed
}

/// Is this node inside a `Section` element?
fn inside_section(node: Node) -> bool {
    node.ancestors()
        .skip(1)
        .any(|a| a.tag_name().name() == "Section")
}

/// Descendants with the given tag that do not belong to a nested `Section`
/// (those are extracted when the nested section is emitted).
fn own_descendants<'a, 'input>(section: Node<'a, 'input>, tag: &str) -> Vec<Node<'a, 'input>> {
    section
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == tag)
        .filter(|n| {
            !n.ancestors()
                .skip(1)
                .take_while(|a| a.id() != section.id())
                .any(|a| a.tag_name().name() == "Section")
        })
        .collect()
}
