//! Writes parsed documents into the resource and embedding stores.
//!
//! Every record becomes one resource row per chunk (keyed by resource key,
//! so re-ingestion upserts in place) plus one embedding row whose content
//! is exactly the text that was embedded. Denormalized filter columns are
//! mirrored onto both stores.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use canlex_core::normalize::{normalize_for_embedding, normalize_term_for_matching};
use canlex_core::types::{Language, ParsedDocument, ParsedSection, SourceType};
use canlex_core::{RetrievalConfig, ResourceMetadata, paired_resource_key, resource_key};
use canlex_ai::EmbedderClient;
use canlex_store::{EmbeddingStore, NewEmbedding, NewResource, ResourceStore};

use crate::chunker::Chunker;
use crate::error::IngestError;
use crate::pairing::pair_defined_terms;
use crate::parser::parse_document;

const EMBED_BATCH: usize = 64;

/// Totals from one ingest run.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub failed_documents: usize,
    pub resources: usize,
    pub embeddings: usize,
}

/// One record on its way into the stores: the resource row plus the text
/// that will be embedded for it.
struct PendingRecord {
    resource: NewResource,
    embed_text: String,
}

pub struct Indexer {
    resources: Arc<ResourceStore>,
    embeddings: Arc<EmbeddingStore>,
    embedder: Arc<EmbedderClient>,
    chunker: Chunker,
}

impl Indexer {
    pub fn new(
        resources: Arc<ResourceStore>,
        embeddings: Arc<EmbeddingStore>,
        embedder: Arc<EmbedderClient>,
        config: &RetrievalConfig,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            resources,
            embeddings,
            embedder,
            chunker: Chunker::new(config.chunk_token_budget, config.chunk_token_overlap)?,
        })
    }

    /// Parse and index every `.xml` file under a directory. A file that
    /// fails to parse is reported and skipped; the batch keeps going.
    /// Bilingual term pairing runs after all files have parsed, before
    /// anything is written.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let mut documents = Vec::new();

        for path in xml_files(dir)? {
            let xml = std::fs::read_to_string(&path)?;
            match parse_document(&xml) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unparseable document");
                    report.failed_documents += 1;
                }
            }
        }

        pair_defined_terms(&mut documents);

        for doc in &documents {
            let (resources, embeddings) = self.index_document(doc).await?;
            report.documents += 1;
            report.resources += resources;
            report.embeddings += embeddings;
        }

        if report.embeddings > 0 {
            self.embeddings.create_indices().await?;
        }
        info!(
            documents = report.documents,
            failed = report.failed_documents,
            resources = report.resources,
            "ingest complete"
        );
        Ok(report)
    }

    /// Index one parsed document. Returns `(resource_rows, embedding_rows)`
    /// written.
    pub async fn index_document(
        &self,
        doc: &ParsedDocument,
    ) -> Result<(usize, usize), IngestError> {
        let pending = self.collect_records(doc);
        let total = pending.len();

        // Embed in batches; the embedding row content is exactly what goes
        // to the provider.
        let mut embedding_rows = Vec::with_capacity(total);
        for chunk in pending.chunks(EMBED_BATCH) {
            let texts: Vec<&str> = chunk.iter().map(|p| p.embed_text.as_str()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for (record, vector) in chunk.iter().zip(vectors) {
                embedding_rows.push(embedding_row(
                    record,
                    vector,
                    self.embedder.model().to_string(),
                ));
            }
        }

        let resource_rows: Vec<NewResource> =
            pending.into_iter().map(|p| p.resource).collect();
        self.resources.upsert(&resource_rows)?;
        self.embeddings.upsert(&embedding_rows).await?;
        Ok((resource_rows.len(), embedding_rows.len()))
    }

    // ── Record collection ──

    fn collect_records(&self, doc: &ParsedDocument) -> Vec<PendingRecord> {
        let mut pending = Vec::new();
        let doc_title = doc
            .acts
            .first()
            .map(|a| a.title.clone())
            .or_else(|| doc.regulations.first().map(|r| r.title.clone()))
            .unwrap_or_default();

        for act in &doc.acts {
            let mut m = ResourceMetadata::new(SourceType::Act, act.language);
            m.title = Some(act.title.clone());
            m.long_title = act.long_title.clone();
            m.act_id = Some(act.act_id.clone());
            m.status = Some(act.status);
            m.consolidation_date = act.consolidation_date;
            if let Some(lims) = &act.lims {
                m.enacted_date = lims.enacted_date;
                m.in_force_date = lims.in_force_start_date;
                m.last_amended_date = lims.last_amended_date;
            }
            let content = match &act.long_title {
                Some(long) if long != &act.title => format!("{}\n{}", act.title, long),
                _ => act.title.clone(),
            };
            push_single(&mut pending, m, content);
        }

        for reg in &doc.regulations {
            let mut m = ResourceMetadata::new(SourceType::Regulation, reg.language);
            m.title = Some(reg.title.clone());
            m.long_title = reg.long_title.clone();
            m.regulation_id = Some(reg.regulation_id.clone());
            m.status = Some(reg.status);
            m.consolidation_date = reg.consolidation_date;
            m.registration_date = reg.registration_date;
            m.enabling_act_id = reg.enabling_act_id.clone();
            m.enabling_act_title = reg.enabling_act_title.clone();
            let content = match &reg.long_title {
                Some(long) if long != &reg.title => format!("{}\n{}", reg.title, long),
                _ => reg.title.clone(),
            };
            push_single(&mut pending, m, content);
        }

        for section in &doc.sections {
            self.collect_section(&mut pending, doc, &doc_title, section);
        }

        for term in &doc.defined_terms {
            let Some(doc_id) = term.doc_id() else { continue };
            let mut m = ResourceMetadata::new(SourceType::DefinedTerm, term.language);
            m.title = Some(doc_title.clone());
            m.act_id = term.act_id.clone();
            m.regulation_id = term.regulation_id.clone();
            m.section_label = term.section_label.clone();
            m.term = Some(term.term.clone());
            m.term_id = Some(term_id(doc_id, &term.term_normalized, term.section_label.as_deref()));
            m.paired_term = term.paired_term.clone();
            m.scope_type = Some(term.scope_type);
            m.scope_sections = term.scope_sections.clone();
            push_term(&mut pending, m, term.definition.clone(), term.language);
        }

        for xref in &doc.cross_references {
            let mut m = ResourceMetadata::new(SourceType::CrossReference, xref.language);
            m.title = Some(doc_title.clone());
            if doc.acts.is_empty() {
                m.regulation_id = Some(xref.source_doc_id.clone());
            } else {
                m.act_id = Some(xref.source_doc_id.clone());
            }
            m.section_label = Some(xref.source_section_label.clone());
            m.cross_ref_id = Some(format!(
                "{}:{}:{}",
                xref.source_doc_id, xref.source_section_label, xref.target_ref
            ));
            m.target_type = Some(xref.target_type);
            m.target_ref = Some(xref.target_ref.clone());
            m.target_subref = xref.target_subref.clone();
            let content = format!(
                "Section {} of {} refers to {} ({})",
                xref.source_section_label, doc_title, xref.text, xref.target_ref
            );
            push_single(&mut pending, m, content);
        }

        for preamble in &doc.preambles {
            let mut m = positional_meta(doc, SourceType::Preamble, preamble.language, preamble.position, &doc_title);
            m.preamble_index = Some(preamble.position);
            push_single(&mut pending, m, preamble.content.clone());
        }

        for treaty in &doc.treaties {
            let m = positional_meta(doc, SourceType::Treaty, treaty.language, treaty.position, &doc_title);
            let content = match &treaty.title {
                Some(t) => format!("{t}\n{}", treaty.content),
                None => treaty.content.clone(),
            };
            self.push_chunked(&mut pending, m, &content, &[&doc_title, "Treaty"]);
        }

        for schedule in &doc.schedules {
            let m = positional_meta(doc, SourceType::Schedule, schedule.language, schedule.position, &doc_title);
            self.push_chunked(&mut pending, m, &schedule.content, &[&doc_title, &schedule.label]);
        }

        for footnote in &doc.footnotes {
            let m = positional_meta(doc, SourceType::Footnote, footnote.language, footnote.position, &doc_title);
            push_single(&mut pending, m, footnote.content.clone());
        }

        for related in &doc.related_provisions {
            let m = positional_meta(
                doc,
                SourceType::RelatedProvisions,
                related.language,
                related.position,
                &doc_title,
            );
            push_single(&mut pending, m, related.content.clone());
        }

        for item in &doc.publication_items {
            let m = positional_meta(
                doc,
                SourceType::PublicationItem,
                item.language,
                item.position,
                &doc_title,
            );
            push_single(&mut pending, m, item.content.clone());
        }

        for note in &doc.marginal_notes {
            let mut m = positional_meta(
                doc,
                SourceType::MarginalNote,
                note.language,
                note.position,
                &doc_title,
            );
            m.section_label = note.section_label.clone();
            push_single(&mut pending, m, note.content.clone());
        }

        for toc in &doc.tables_of_provisions {
            let m = positional_meta(
                doc,
                SourceType::TableOfProvisions,
                toc.language,
                toc.position,
                &doc_title,
            );
            self.push_chunked(&mut pending, m, &toc.content, &[&doc_title, "Table of Provisions"]);
        }

        for sig in &doc.signature_blocks {
            let m = positional_meta(
                doc,
                SourceType::SignatureBlock,
                sig.language,
                sig.position,
                &doc_title,
            );
            push_single(&mut pending, m, sig.content.clone());
        }

        pending
    }

    fn collect_section(
        &self,
        pending: &mut Vec<PendingRecord>,
        doc: &ParsedDocument,
        doc_title: &str,
        section: &ParsedSection,
    ) {
        let source_type = if section.regulation_id.is_some() {
            SourceType::RegulationSection
        } else {
            SourceType::ActSection
        };
        let mut m = ResourceMetadata::new(source_type, section.language);
        m.title = Some(doc_title.to_string());
        m.act_id = section.act_id.clone();
        m.regulation_id = section.regulation_id.clone();
        m.section_id = Some(section.canonical_section_id.clone());
        m.section_label = Some(section.section_label.clone());
        m.section_type = Some(section.section_type);
        m.section_order = Some(section.section_order);
        m.marginal_note = section.marginal_note.clone();
        m.hierarchy_path = section.hierarchy_path.clone();
        m.status = Some(section.status);
        m.enacted_date = section.dates.enacted_date;
        m.in_force_date = section.dates.in_force_date;
        m.last_amended_date = section.dates.last_amended_date;
        m.consolidation_date = doc
            .acts
            .first()
            .and_then(|a| a.consolidation_date)
            .or_else(|| doc.regulations.first().and_then(|r| r.consolidation_date));

        let part = section.hierarchy_path.first().map(String::as_str).unwrap_or("");
        let schedule_label = section
            .schedule_context
            .as_ref()
            .map(|c| c.label.as_str())
            .unwrap_or("");
        let section_part = format!("s {}", section.section_label);
        let header: Vec<&str> = vec![doc_title, part, schedule_label, &section_part];
        self.push_chunked(pending, m, &section.content, &header);
    }

    /// Chunk long content under a contextual header; one resource +
    /// embedding row per chunk.
    fn push_chunked(
        &self,
        pending: &mut Vec<PendingRecord>,
        meta: ResourceMetadata,
        content: &str,
        header_parts: &[&str],
    ) {
        if content.trim().is_empty() {
            return;
        }
        let section_id = meta.section_id.clone();
        for chunk in self.chunker.chunk(header_parts, content, section_id.as_deref()) {
            let mut m = meta.clone();
            m.chunk_index = chunk.index;
            let Some(source_id) = m.source_id() else {
                warn!(source_type = %m.source_type, "record without source id; skipped");
                return;
            };
            let key = resource_key(m.source_type, &source_id, m.language, m.chunk_index);
            // The stored content is the contextualized chunk; the embedded
            // text is exactly its embedding-normalized form, so the two
            // can never drift apart.
            let embed_text = normalize_for_embedding(&chunk.content);
            let paired = paired_resource_key(&m);
            pending.push(PendingRecord {
                resource: NewResource {
                    resource_key: key,
                    content: chunk.content,
                    metadata: m,
                    paired_resource_key: paired,
                },
                embed_text,
            });
        }
    }
}

/// `{docId}:{termNormalized}` with the defining section appended when
/// known, so redefinitions in different sections stay distinct.
fn term_id(doc_id: &str, term_normalized: &str, section_label: Option<&str>) -> String {
    match section_label {
        Some(label) => format!("{doc_id}:{term_normalized}:{label}"),
        None => format!("{doc_id}:{term_normalized}"),
    }
}

fn positional_meta(
    doc: &ParsedDocument,
    source_type: SourceType,
    language: Language,
    position: u32,
    doc_title: &str,
) -> ResourceMetadata {
    let mut m = ResourceMetadata::new(source_type, language);
    m.title = Some(doc_title.to_string());
    if doc.acts.is_empty() {
        m.regulation_id = doc.regulations.first().map(|r| r.regulation_id.clone());
    } else {
        m.act_id = doc.acts.first().map(|a| a.act_id.clone());
    }
    m.position = Some(position);
    m
}

fn push_single(pending: &mut Vec<PendingRecord>, meta: ResourceMetadata, content: String) {
    if content.trim().is_empty() {
        return;
    }
    let Some(source_id) = meta.source_id() else {
        warn!(source_type = %meta.source_type, "record without source id; skipped");
        return;
    };
    let key = resource_key(meta.source_type, &source_id, meta.language, meta.chunk_index);
    let paired = paired_resource_key(&meta);
    let embed_text = normalize_for_embedding(&content);
    pending.push(PendingRecord {
        resource: NewResource {
            resource_key: key,
            content,
            metadata: meta,
            paired_resource_key: paired,
        },
        embed_text,
    });
}

/// Defined terms pair through their opposite-language spelling rather than
/// the generic key translation.
fn push_term(
    pending: &mut Vec<PendingRecord>,
    meta: ResourceMetadata,
    definition: String,
    language: Language,
) {
    if definition.trim().is_empty() {
        return;
    }
    let Some(source_id) = meta.source_id() else {
        warn!("defined term without source id; skipped");
        return;
    };
    let key = resource_key(meta.source_type, &source_id, language, 0);
    let paired = meta.paired_term.as_ref().and_then(|paired_spelling| {
        let doc_id = meta.doc_id()?;
        let other = language.opposite();
        let translated_doc = canlex_core::translate_doc_id(doc_id, other);
        let paired_id = term_id(
            &translated_doc,
            &normalize_term_for_matching(paired_spelling),
            meta.section_label.as_deref(),
        );
        Some(resource_key(SourceType::DefinedTerm, &paired_id, other, 0))
    });
    let embed_text = normalize_for_embedding(&definition);
    pending.push(PendingRecord {
        resource: NewResource {
            resource_key: key,
            content: definition,
            metadata: meta,
            paired_resource_key: paired,
        },
        embed_text,
    });
}

fn embedding_row(record: &PendingRecord, vector: Vec<f32>, model: String) -> NewEmbedding {
    let m = &record.resource.metadata;
    NewEmbedding {
        resource_key: record.resource.resource_key.clone(),
        language: m.language.as_str().to_string(),
        source_type: m.source_type.as_str().to_string(),
        act_id: m.act_id.clone(),
        regulation_id: m.regulation_id.clone(),
        section_label: m.section_label.clone(),
        scope_type: m.scope_type.map(|s| s.as_str().to_string()),
        scope_sections: if m.scope_sections.is_empty() {
            None
        } else {
            Some(format!("|{}|", m.scope_sections.join("|")))
        },
        status: m.status.map(|s| s.as_str().to_string()),
        chunk_index: m.chunk_index as i32,
        content: record.embed_text.clone(),
        embedding: vector,
        embedding_model: model,
    }
}

fn xml_files(base_dir: &Path) -> Result<Vec<std::path::PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let path = entry?.path();
        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == "xml") {
                files.push(path);
            }
        } else if path.is_dir() {
            files.extend(xml_files(&path)?);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canlex_core::types::ScopeType;

    fn test_indexer() -> (Indexer, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let resources = Arc::new(ResourceStore::open().unwrap());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let lance_path = dir.path().join("lance");
        let embeddings = rt.block_on(async {
            Arc::new(EmbeddingStore::open(&lance_path, 4).await.unwrap())
        });
        let embedder = Arc::new(EmbedderClient::new(
            "http://localhost:1".into(),
            "test".into(),
            std::time::Duration::from_secs(60),
        ));
        let indexer =
            Indexer::new(resources, embeddings, embedder, &RetrievalConfig::default()).unwrap();
        (indexer, dir)
    }

    fn parsed_fixture() -> ParsedDocument {
        parse_document(
            r#"<Statute xml:lang="en">
                <Identification>
                    <ShortTitle>Firearms Act</ShortTitle>
                    <Chapter><ConsolidatedNumber>F-11.6</ConsolidatedNumber></Chapter>
                </Identification>
                <Body>
                    <Section><Label>2</Label>
                        <Text>The following definitions apply in this Act.</Text>
                        <Definition><Text><DefinedTermEn>transfer</DefinedTermEn> means sell or barter (<DefinedTermFr>cession</DefinedTermFr>)</Text></Definition>
                    </Section>
                    <Section><Label>5</Label><MarginalNote>Public safety</MarginalNote>
                        <Text>A person is not eligible to hold a licence.</Text>
                    </Section>
                </Body>
            </Statute>"#,
        )
        .unwrap()
    }

    #[test]
    fn record_collection_covers_every_type_present() {
        let doc = parsed_fixture();
        // The indexer is only constructed to reach collect_records; no
        // network access happens there.
        let (indexer, _dir) = test_indexer();

        let pending = indexer.collect_records(&doc);
        let keys: Vec<&str> = pending
            .iter()
            .map(|p| p.resource.resource_key.as_str())
            .collect();

        assert!(keys.contains(&"act:F-11.6:en:0"));
        assert!(keys.iter().any(|k| k.starts_with("act_section:F-11.6/en/section/0/s2:en:")));
        assert!(keys.iter().any(|k| k.starts_with("defined_term:F-11.6:transfer:2:en:")));
        assert!(keys.iter().any(|k| k.starts_with("marginal_note:F-11.6:")));
    }

    #[test]
    fn section_chunks_carry_contextual_header_and_match_embedded_text() {
        let doc = parsed_fixture();
        let (indexer, _dir) = test_indexer();

        let pending = indexer.collect_records(&doc);
        let section = pending
            .iter()
            .find(|p| p.resource.resource_key.starts_with("act_section:F-11.6/en/section/1/s5"))
            .unwrap();
        assert!(section.resource.content.starts_with("Firearms Act | s 5\n\n"));
        assert!(section.resource.content.ends_with("hold a licence."));
        // The embedded text is exactly the stored content after
        // embedding-normalization.
        assert_eq!(
            section.embed_text,
            normalize_for_embedding(&section.resource.content)
        );
        assert!(!section.embed_text.contains('\n'));
    }

    #[test]
    fn bilingual_ingest_pairs_term_keys_both_ways() {
        let en = parse_document(
            r#"<Regulation xml:lang="en">
                <Identification><InstrumentNumber>SOR/86-304</InstrumentNumber>
                <ShortTitle>Migratory Birds Regulations</ShortTitle></Identification>
                <Body><Section><Label>2</Label>
                    <Text>The following definitions apply in these Regulations.</Text>
                    <Definition><Text><DefinedTermEn>Convention</DefinedTermEn> means the treaty set out in the schedule</Text></Definition>
                </Section></Body>
            </Regulation>"#,
        )
        .unwrap();
        let fr = parse_document(
            r#"<Regulation xml:lang="fr">
                <Identification><InstrumentNumber>DORS/86-304</InstrumentNumber>
                <ShortTitle>Règlement sur les oiseaux migrateurs</ShortTitle></Identification>
                <Body><Section><Label>2</Label>
                    <Text>Les définitions qui suivent s'appliquent dans le présent règlement.</Text>
                    <Definition><Text><DefinedTermFr>convention</DefinedTermFr> Le traité reproduit à l'annexe</Text></Definition>
                </Section></Body>
            </Regulation>"#,
        )
        .unwrap();

        let mut docs = vec![en, fr];
        assert_eq!(pair_defined_terms(&mut docs), 1);

        let (indexer, _dir) = test_indexer();
        let en_term = indexer
            .collect_records(&docs[0])
            .into_iter()
            .find(|p| p.resource.resource_key.starts_with("defined_term:"))
            .unwrap()
            .resource;
        let fr_term = indexer
            .collect_records(&docs[1])
            .into_iter()
            .find(|p| p.resource.resource_key.starts_with("defined_term:"))
            .unwrap()
            .resource;

        // Pairing is bidirectional: each side's paired key is the other
        // side's key.
        assert_eq!(en_term.resource_key, "defined_term:SOR-86-304:convention:2:en:0");
        assert_eq!(fr_term.resource_key, "defined_term:DORS-86-304:convention:2:fr:0");
        assert_eq!(
            en_term.paired_resource_key.as_deref(),
            Some(fr_term.resource_key.as_str())
        );
        assert_eq!(
            fr_term.paired_resource_key.as_deref(),
            Some(en_term.resource_key.as_str())
        );
    }

    #[test]
    fn term_paired_key_uses_paired_spelling() {
        let mut m = ResourceMetadata::new(SourceType::DefinedTerm, Language::En);
        m.act_id = Some("F-11.6".into());
        m.section_label = Some("2".into());
        m.term = Some("transfer".into());
        m.term_id = Some("F-11.6:transfer:2".into());
        m.paired_term = Some("cession".into());
        m.scope_type = Some(ScopeType::Act);

        let mut pending = Vec::new();
        push_term(&mut pending, m, "transfer means sell or barter".into(), Language::En);
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].resource.paired_resource_key.as_deref(),
            Some("defined_term:F-11.6:cession:2:fr:0")
        );
    }

    #[test]
    fn unpaired_term_has_no_paired_key() {
        let mut m = ResourceMetadata::new(SourceType::DefinedTerm, Language::En);
        m.act_id = Some("F-11.6".into());
        m.term = Some("vessel".into());
        m.term_id = Some("F-11.6:vessel".into());
        let mut pending = Vec::new();
        push_term(&mut pending, m, "vessel means a boat".into(), Language::En);
        assert!(pending[0].resource.paired_resource_key.is_none());
    }
}
