//! DuckDB storage for resource rows — the relational half of the index.
//!
//! One row per indexed record chunk, keyed by `resource_key`. Writes are
//! idempotent upserts: batches ride through a temp Parquet file into
//! DuckDB's native `read_parquet()`, so re-ingestion replaces rows in
//! place. Metadata is stored twice: the full structured blob as JSON, and
//! the filterable fields denormalized into indexed columns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use duckdb::{Connection, params_from_iter};
use parquet::arrow::ArrowWriter;
use tracing::info;

use canlex_core::ResourceMetadata;
use canlex_core::types::{Language, SourceType};

use crate::StoreError;
use crate::metadata_query::{MetadataField, MetadataQuery};

/// A resource row as read back from storage.
#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub id: i64,
    pub resource_key: String,
    pub language: Language,
    pub source_type: SourceType,
    pub content: String,
    pub metadata: ResourceMetadata,
    pub paired_resource_key: Option<String>,
}

/// A resource row about to be written. Denormalized columns are derived
/// from `metadata` at write time.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub resource_key: String,
    pub content: String,
    pub metadata: ResourceMetadata,
    pub paired_resource_key: Option<String>,
}

const ROW_COLUMNS: &str =
    "id, resource_key, language, source_type, content, metadata, paired_resource_key";

/// DuckDB-backed resource store.
///
/// Supports in-memory (ephemeral) and persistent (file-backed) modes, in
/// the same shape as the embedding store. The connection sits behind a
/// mutex so the store can be shared across request tasks.
pub struct ResourceStore {
    conn: Mutex<Connection>,
}

impl ResourceStore {
    /// Open an in-memory store with the schema created.
    pub fn open() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open or create a persistent store at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE SEQUENCE IF NOT EXISTS resources_id_seq;
             CREATE TABLE IF NOT EXISTS resources (
                id BIGINT PRIMARY KEY DEFAULT nextval('resources_id_seq'),
                resource_key VARCHAR NOT NULL UNIQUE,
                language VARCHAR NOT NULL,
                source_type VARCHAR NOT NULL,
                content VARCHAR NOT NULL,
                metadata VARCHAR NOT NULL,
                paired_resource_key VARCHAR,
                act_id VARCHAR,
                regulation_id VARCHAR,
                section_id VARCHAR,
                section_label VARCHAR,
                section_order INTEGER,
                section_type VARCHAR,
                chunk_index INTEGER NOT NULL DEFAULT 0,
                scope_type VARCHAR,
                scope_sections VARCHAR,
                status VARCHAR,
                title VARCHAR,
                last_amended_date DATE,
                enacted_date DATE,
                in_force_date DATE,
                consolidation_date DATE,
                registration_date DATE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp
             );
             CREATE INDEX IF NOT EXISTS idx_resources_act ON resources (act_id);
             CREATE INDEX IF NOT EXISTS idx_resources_regulation ON resources (regulation_id);
             CREATE INDEX IF NOT EXISTS idx_resources_type_lang ON resources (source_type, language);
             CREATE INDEX IF NOT EXISTS idx_resources_section ON resources (section_label);
             CREATE INDEX IF NOT EXISTS idx_resources_status ON resources (status);",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    /// Whether any resources have been ingested (persistent reopen check).
    pub fn has_rows(&self) -> bool {
        self.count_all().map(|c| c > 0).unwrap_or(false)
    }

    // ── Writes ──

    /// Idempotently write a batch of resources, keyed by `resource_key`.
    ///
    /// The batch is written to a temp Parquet file and bulk-inserted
    /// through DuckDB's native `read_parquet()`, upserting on key
    /// collisions. Returns the number of rows written.
    pub fn upsert(&self, rows: &[NewResource]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        // The conflict target may only be hit once per statement, so a key
        // repeated within one batch keeps its last copy.
        let mut last_by_key: HashMap<&str, usize> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            last_by_key.insert(row.resource_key.as_str(), i);
        }
        let mut keep: Vec<usize> = last_by_key.into_values().collect();
        keep.sort_unstable();
        let deduped: Vec<&NewResource> = keep.into_iter().map(|i| &rows[i]).collect();

        let batch = resource_batch(&deduped)?;
        let tmp = tempfile::Builder::new().suffix(".parquet").tempfile()?;
        {
            let mut writer =
                ArrowWriter::try_new(tmp.as_file().try_clone()?, batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
        }

        let sql = format!(
            "INSERT INTO resources (
                resource_key, language, source_type, content, metadata,
                paired_resource_key, act_id, regulation_id, section_id,
                section_label, section_order, section_type, chunk_index,
                scope_type, scope_sections, status, title,
                last_amended_date, enacted_date, in_force_date,
                consolidation_date, registration_date
             )
             SELECT resource_key, language, source_type, content, metadata,
                paired_resource_key, act_id, regulation_id, section_id,
                section_label, section_order, section_type, chunk_index,
                scope_type, scope_sections, status, title,
                CAST(last_amended_date AS DATE), CAST(enacted_date AS DATE),
                CAST(in_force_date AS DATE), CAST(consolidation_date AS DATE),
                CAST(registration_date AS DATE)
             FROM read_parquet('{}')
             ON CONFLICT (resource_key) DO UPDATE SET
                language = EXCLUDED.language,
                source_type = EXCLUDED.source_type,
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                paired_resource_key = EXCLUDED.paired_resource_key,
                act_id = EXCLUDED.act_id,
                regulation_id = EXCLUDED.regulation_id,
                section_id = EXCLUDED.section_id,
                section_label = EXCLUDED.section_label,
                section_order = EXCLUDED.section_order,
                section_type = EXCLUDED.section_type,
                chunk_index = EXCLUDED.chunk_index,
                scope_type = EXCLUDED.scope_type,
                scope_sections = EXCLUDED.scope_sections,
                status = EXCLUDED.status,
                title = EXCLUDED.title,
                last_amended_date = EXCLUDED.last_amended_date,
                enacted_date = EXCLUDED.enacted_date,
                in_force_date = EXCLUDED.in_force_date,
                consolidation_date = EXCLUDED.consolidation_date,
                registration_date = EXCLUDED.registration_date,
                updated_at = current_timestamp",
            tmp.path().display()
        );
        let conn = self.lock()?;
        conn.execute_batch(&sql)?;
        info!(count = deduped.len(), "upserted resources");
        Ok(deduped.len())
    }

    // ── Lookups ──

    /// Fetch one resource by key.
    pub fn get_by_key(&self, resource_key: &str) -> Result<Option<ResourceRow>, StoreError> {
        let rows = self.query_rows(
            &format!("SELECT {ROW_COLUMNS} FROM resources WHERE resource_key = ?"),
            vec![resource_key.to_string()],
        )?;
        Ok(rows.into_iter().next())
    }

    /// Batch fetch by key set (bilingual pairing, hydration).
    pub fn get_by_keys(&self, keys: &[String]) -> Result<Vec<ResourceRow>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        self.query_rows(
            &format!(
                "SELECT {ROW_COLUMNS} FROM resources WHERE resource_key IN ({placeholders})"
            ),
            keys.to_vec(),
        )
    }

    /// The document-level row (act or regulation) for an instrument in one
    /// language.
    pub fn get_document(
        &self,
        doc_id: &str,
        language: Language,
    ) -> Result<Option<ResourceRow>, StoreError> {
        let rows = self.query_rows(
            &format!(
                "SELECT {ROW_COLUMNS} FROM resources
                 WHERE source_type IN ('act', 'regulation')
                   AND (act_id = ? OR regulation_id = ?)
                   AND language = ?
                 LIMIT 1"
            ),
            vec![
                doc_id.to_string(),
                doc_id.to_string(),
                language.as_str().to_string(),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    /// Section rows of a document ordered by traversal order, first chunk
    /// of each section only.
    pub fn sections_for_document(
        &self,
        doc_id: &str,
        language: Language,
        limit: usize,
    ) -> Result<Vec<ResourceRow>, StoreError> {
        self.query_rows(
            &format!(
                "SELECT {ROW_COLUMNS} FROM resources
                 WHERE source_type IN ('act_section', 'regulation_section')
                   AND (act_id = ? OR regulation_id = ?)
                   AND language = ?
                   AND chunk_index = 0
                 ORDER BY section_order
                 LIMIT {limit}"
            ),
            vec![
                doc_id.to_string(),
                doc_id.to_string(),
                language.as_str().to_string(),
            ],
        )
    }

    /// Total section count for a document (first chunks only).
    pub fn count_sections(&self, doc_id: &str, language: Language) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT count(*) FROM resources
             WHERE source_type IN ('act_section', 'regulation_section')
               AND (act_id = ? OR regulation_id = ?)
               AND language = ?
               AND chunk_index = 0",
        )?;
        let count: i64 = stmt.query_row(
            duckdb::params![doc_id, doc_id, language.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ── Metadata-only search ──

    /// Resources matching a typed metadata filter set.
    pub fn search_by_metadata(&self, query: &MetadataQuery) -> Result<Vec<ResourceRow>, StoreError> {
        let (clause, params) = query.where_clause();
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM resources WHERE {clause}{}",
            query.tail_clause()
        );
        self.query_rows(&sql, params)
    }

    /// Row count for a metadata filter set (ordering and limits ignored).
    pub fn count_by_metadata(&self, query: &MetadataQuery) -> Result<usize, StoreError> {
        let (clause, params) = query.where_clause();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT count(*) FROM resources WHERE {clause}"
        ))?;
        let count: i64 = stmt.query_row(params_from_iter(params), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Distinct non-null values of one indexed column under a filter set.
    pub fn list_distinct_values(
        &self,
        field: MetadataField,
        query: &MetadataQuery,
    ) -> Result<Vec<String>, StoreError> {
        let (clause, params) = query.where_clause();
        let column = field.column();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM resources
             WHERE {clause} AND {column} IS NOT NULL
             ORDER BY {column}"
        ))?;
        let values = stmt
            .query_map(params_from_iter(params), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    // ── Stats ──

    pub fn count_all(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT count(*) FROM resources")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// `(value, count)` breakdown over one indexed column.
    pub fn counts_grouped(
        &self,
        field: MetadataField,
    ) -> Result<Vec<(String, usize)>, StoreError> {
        let column = field.column();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT coalesce({column}, '(none)') AS v, count(*) AS c
             FROM resources GROUP BY v ORDER BY c DESC"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Internal ──

    fn query_rows(&self, sql: &str, params: Vec<String>) -> Result<Vec<ResourceRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mapped = stmt.query_map(params_from_iter(params), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut rows = Vec::new();
        for item in mapped {
            let (id, resource_key, language, source_type, content, metadata, paired) = item?;
            let language = Language::parse(&language)
                .ok_or_else(|| StoreError::Other(format!("bad language column: {language}")))?;
            let source_type = SourceType::parse(&source_type).ok_or_else(|| {
                StoreError::Other(format!("bad source_type column: {source_type}"))
            })?;
            rows.push(ResourceRow {
                id,
                resource_key,
                language,
                source_type,
                content,
                metadata: serde_json::from_str(&metadata)?,
                paired_resource_key: paired,
            });
        }
        Ok(rows)
    }
}

/// One Arrow batch covering every resources column. Dates ride as ISO
/// strings and are cast on insert; the table's NOT NULL constraints do the
/// enforcing, so the Parquet schema is uniformly nullable.
fn resource_batch(rows: &[&NewResource]) -> Result<RecordBatch, StoreError> {
    let utf8 = |name: &str| Field::new(name, DataType::Utf8, true);
    let schema = Arc::new(Schema::new(vec![
        utf8("resource_key"),
        utf8("language"),
        utf8("source_type"),
        utf8("content"),
        utf8("metadata"),
        utf8("paired_resource_key"),
        utf8("act_id"),
        utf8("regulation_id"),
        utf8("section_id"),
        utf8("section_label"),
        Field::new("section_order", DataType::Int32, true),
        utf8("section_type"),
        Field::new("chunk_index", DataType::Int32, true),
        utf8("scope_type"),
        utf8("scope_sections"),
        utf8("status"),
        utf8("title"),
        utf8("last_amended_date"),
        utf8("enacted_date"),
        utf8("in_force_date"),
        utf8("consolidation_date"),
        utf8("registration_date"),
    ]));

    let metadata_json = rows
        .iter()
        .map(|r| serde_json::to_string(&r.metadata))
        .collect::<Result<Vec<String>, _>>()?;

    let strings = |f: &dyn Fn(&NewResource) -> Option<String>| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|r| f(r)).collect::<Vec<Option<String>>>(),
        ))
    };

    let columns: Vec<ArrayRef> = vec![
        strings(&|r| Some(r.resource_key.clone())),
        strings(&|r| Some(r.metadata.language.as_str().to_string())),
        strings(&|r| Some(r.metadata.source_type.as_str().to_string())),
        strings(&|r| Some(r.content.clone())),
        Arc::new(StringArray::from(metadata_json)),
        strings(&|r| r.paired_resource_key.clone()),
        strings(&|r| r.metadata.act_id.clone()),
        strings(&|r| r.metadata.regulation_id.clone()),
        strings(&|r| r.metadata.section_id.clone()),
        strings(&|r| r.metadata.section_label.clone()),
        Arc::new(Int32Array::from(
            rows.iter()
                .map(|r| r.metadata.section_order.map(|o| o as i32))
                .collect::<Vec<Option<i32>>>(),
        )),
        strings(&|r| r.metadata.section_type.map(|t| t.as_str().to_string())),
        Arc::new(Int32Array::from(
            rows.iter()
                .map(|r| r.metadata.chunk_index as i32)
                .collect::<Vec<i32>>(),
        )),
        strings(&|r| r.metadata.scope_type.map(|s| s.as_str().to_string())),
        strings(&|r| scope_sections_column(&r.metadata)),
        strings(&|r| r.metadata.status.map(|s| s.as_str().to_string())),
        strings(&|r| r.metadata.title.clone()),
        strings(&|r| r.metadata.last_amended_date.map(|d| d.to_string())),
        strings(&|r| r.metadata.enacted_date.map(|d| d.to_string())),
        strings(&|r| r.metadata.in_force_date.map(|d| d.to_string())),
        strings(&|r| r.metadata.consolidation_date.map(|d| d.to_string())),
        strings(&|r| r.metadata.registration_date.map(|d| d.to_string())),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Pipe-delimited containment form (`|17|18|19|`) for LIKE pushdown.
fn scope_sections_column(meta: &ResourceMetadata) -> Option<String> {
    if meta.scope_sections.is_empty() {
        None
    } else {
        Some(format!("|{}|", meta.scope_sections.join("|")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_query::{DateField, DateFilter, SortDirection};
    use chrono::NaiveDate;

    fn section_resource(key: &str, label: &str, order: u32) -> NewResource {
        let mut m = ResourceMetadata::new(SourceType::ActSection, Language::En);
        m.act_id = Some("C-46".into());
        m.section_id = Some(format!("C-46/en/section/{order}/s{label}"));
        m.section_label = Some(label.to_string());
        m.section_order = Some(order);
        m.title = Some("Criminal Code".into());
        NewResource {
            resource_key: key.to_string(),
            content: format!("Section {label} content."),
            metadata: m,
            paired_resource_key: None,
        }
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let store = ResourceStore::open().unwrap();
        let row = section_resource("act_section:C-46/en/section/0/s1:en:0", "1", 0);
        store.upsert(&[row.clone()]).unwrap();

        let got = store
            .get_by_key("act_section:C-46/en/section/0/s1:en:0")
            .unwrap()
            .unwrap();
        assert_eq!(got.content, "Section 1 content.");
        assert_eq!(got.source_type, SourceType::ActSection);
        assert_eq!(got.metadata.section_label.as_deref(), Some("1"));
    }

    #[test]
    fn upsert_replaces_by_key() {
        let store = ResourceStore::open().unwrap();
        let mut row = section_resource("k:en:0", "1", 0);
        store.upsert(&[row.clone()]).unwrap();
        row.content = "Updated content.".into();
        store.upsert(&[row]).unwrap();

        assert_eq!(store.count_all().unwrap(), 1);
        let got = store.get_by_key("k:en:0").unwrap().unwrap();
        assert_eq!(got.content, "Updated content.");
    }

    #[test]
    fn duplicate_keys_within_one_batch_keep_last_copy() {
        let store = ResourceStore::open().unwrap();
        let first = section_resource("k:en:0", "1", 0);
        let mut second = section_resource("k:en:0", "1", 0);
        second.content = "Second copy.".into();

        let written = store.upsert(&[first, second]).unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count_all().unwrap(), 1);
        let got = store.get_by_key("k:en:0").unwrap().unwrap();
        assert_eq!(got.content, "Second copy.");
    }

    #[test]
    fn get_missing_is_none() {
        let store = ResourceStore::open().unwrap();
        assert!(store.get_by_key("nope").unwrap().is_none());
    }

    #[test]
    fn batch_get_by_keys() {
        let store = ResourceStore::open().unwrap();
        store
            .upsert(&[
                section_resource("a:en:0", "1", 0),
                section_resource("b:en:0", "2", 1),
                section_resource("c:en:0", "3", 2),
            ])
            .unwrap();
        let rows = store
            .get_by_keys(&["a:en:0".into(), "c:en:0".into(), "zzz".into()])
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn sections_ordered_by_section_order() {
        let store = ResourceStore::open().unwrap();
        store
            .upsert(&[
                section_resource("s2:en:0", "2", 1),
                section_resource("s1:en:0", "1", 0),
                section_resource("s3:en:0", "3", 2),
            ])
            .unwrap();
        let rows = store
            .sections_for_document("C-46", Language::En, 150)
            .unwrap();
        let labels: Vec<_> = rows
            .iter()
            .map(|r| r.metadata.section_label.clone().unwrap())
            .collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
        assert_eq!(store.count_sections("C-46", Language::En).unwrap(), 3);
    }

    #[test]
    fn later_chunks_excluded_from_section_fetch() {
        let store = ResourceStore::open().unwrap();
        let mut chunk1 = section_resource("s1:en:1", "1", 0);
        chunk1.metadata.chunk_index = 1;
        store
            .upsert(&[section_resource("s1:en:0", "1", 0), chunk1])
            .unwrap();
        assert_eq!(
            store
                .sections_for_document("C-46", Language::En, 150)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(store.count_sections("C-46", Language::En).unwrap(), 1);
    }

    #[test]
    fn document_lookup_by_language() {
        let store = ResourceStore::open().unwrap();
        let mut en = ResourceMetadata::new(SourceType::Act, Language::En);
        en.act_id = Some("C-46".into());
        en.title = Some("Criminal Code".into());
        let mut fr = ResourceMetadata::new(SourceType::Act, Language::Fr);
        fr.act_id = Some("C-46".into());
        fr.title = Some("Code criminel".into());
        store
            .upsert(&[
                NewResource {
                    resource_key: "act:C-46:en:0".into(),
                    content: "Criminal Code".into(),
                    metadata: en,
                    paired_resource_key: Some("act:C-46:fr:0".into()),
                },
                NewResource {
                    resource_key: "act:C-46:fr:0".into(),
                    content: "Code criminel".into(),
                    metadata: fr,
                    paired_resource_key: Some("act:C-46:en:0".into()),
                },
            ])
            .unwrap();

        let doc = store.get_document("C-46", Language::Fr).unwrap().unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Code criminel"));
        assert!(store.get_document("X-1", Language::En).unwrap().is_none());
    }

    #[test]
    fn metadata_search_with_date_range() {
        let store = ResourceStore::open().unwrap();
        let mut amended_2023 = section_resource("a:en:0", "1", 0);
        amended_2023.metadata.last_amended_date = NaiveDate::from_ymd_opt(2023, 6, 1);
        let mut amended_2020 = section_resource("b:en:0", "2", 1);
        amended_2020.metadata.last_amended_date = NaiveDate::from_ymd_opt(2020, 1, 15);
        store.upsert(&[amended_2023, amended_2020]).unwrap();

        let q = MetadataQuery {
            dates: vec![(
                DateField::LastAmended,
                DateFilter {
                    after: NaiveDate::from_ymd_opt(2022, 12, 31),
                    ..Default::default()
                },
            )],
            ..Default::default()
        };
        let rows = store.search_by_metadata(&q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metadata.section_label.as_deref(), Some("1"));
        assert_eq!(store.count_by_metadata(&q).unwrap(), 1);
    }

    #[test]
    fn metadata_search_ordering() {
        let store = ResourceStore::open().unwrap();
        let mut a = section_resource("a:en:0", "1", 0);
        a.metadata.enacted_date = NaiveDate::from_ymd_opt(1995, 1, 1);
        let mut b = section_resource("b:en:0", "2", 1);
        b.metadata.enacted_date = NaiveDate::from_ymd_opt(2005, 1, 1);
        store.upsert(&[a, b]).unwrap();

        let q = MetadataQuery {
            order_by: Some((DateField::Enacted, SortDirection::Desc)),
            ..Default::default()
        };
        let rows = store.search_by_metadata(&q).unwrap();
        assert_eq!(rows[0].metadata.section_label.as_deref(), Some("2"));
    }

    #[test]
    fn scope_section_filter() {
        let store = ResourceStore::open().unwrap();
        let mut scoped = ResourceMetadata::new(SourceType::DefinedTerm, Language::En);
        scoped.act_id = Some("C-46".into());
        scoped.term = Some("analyst".into());
        scoped.term_id = Some("C-46:analyst".into());
        scoped.scope_type = Some(canlex_core::types::ScopeType::Section);
        scoped.scope_sections = vec!["17".into(), "18".into(), "19".into()];
        let mut doc_wide = ResourceMetadata::new(SourceType::DefinedTerm, Language::En);
        doc_wide.act_id = Some("C-46".into());
        doc_wide.term = Some("firearm".into());
        doc_wide.term_id = Some("C-46:firearm".into());
        doc_wide.scope_type = Some(canlex_core::types::ScopeType::Act);

        store
            .upsert(&[
                NewResource {
                    resource_key: "defined_term:C-46:analyst:en:0".into(),
                    content: "analyst means…".into(),
                    metadata: scoped,
                    paired_resource_key: None,
                },
                NewResource {
                    resource_key: "defined_term:C-46:firearm:en:0".into(),
                    content: "firearm means…".into(),
                    metadata: doc_wide,
                    paired_resource_key: None,
                },
            ])
            .unwrap();

        // Section 18 sees both the scoped term and the document-wide one.
        let q = MetadataQuery {
            source_type: Some(SourceType::DefinedTerm),
            section_scope: Some("18".into()),
            ..Default::default()
        };
        assert_eq!(store.search_by_metadata(&q).unwrap().len(), 2);

        // Section 99 sees only the document-wide term.
        let q = MetadataQuery {
            source_type: Some(SourceType::DefinedTerm),
            section_scope: Some("99".into()),
            ..Default::default()
        };
        let rows = store.search_by_metadata(&q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metadata.term.as_deref(), Some("firearm"));
    }

    #[test]
    fn distinct_values_and_grouped_counts() {
        let store = ResourceStore::open().unwrap();
        store
            .upsert(&[
                section_resource("a:en:0", "1", 0),
                section_resource("b:en:0", "2", 1),
            ])
            .unwrap();
        let acts = store
            .list_distinct_values(MetadataField::ActId, &MetadataQuery::default())
            .unwrap();
        assert_eq!(acts, vec!["C-46"]);

        let by_type = store.counts_grouped(MetadataField::SourceType).unwrap();
        assert_eq!(by_type, vec![("act_section".to_string(), 2)]);
    }

    #[test]
    fn persistent_reopen_keeps_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("resources.duckdb");
        {
            let store = ResourceStore::open_persistent(&path).unwrap();
            assert!(!store.has_rows());
            store
                .upsert(&[section_resource("a:en:0", "1", 0)])
                .unwrap();
        }
        let store = ResourceStore::open_persistent(&path).unwrap();
        assert!(store.has_rows());
        assert_eq!(store.count_all().unwrap(), 1);
    }
}
