//! Typed metadata-only queries over the resources table.
//!
//! These cover questions that need no semantic understanding ("all acts
//! amended in 2023"): exact-match filters on the denormalized columns,
//! date range filters, and ordering on any indexed date field.

use chrono::NaiveDate;

use canlex_core::types::{DocStatus, Language, ScopeType, SourceType};

/// An indexed date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    LastAmended,
    Enacted,
    InForce,
    Consolidation,
    Registration,
}

impl DateField {
    pub fn column(&self) -> &'static str {
        match self {
            DateField::LastAmended => "last_amended_date",
            DateField::Enacted => "enacted_date",
            DateField::InForce => "in_force_date",
            DateField::Consolidation => "consolidation_date",
            DateField::Registration => "registration_date",
        }
    }

    pub fn parse(s: &str) -> Option<DateField> {
        Some(match s {
            "last_amended_date" | "last-amended" => DateField::LastAmended,
            "enacted_date" | "enacted" => DateField::Enacted,
            "in_force_date" | "in-force" => DateField::InForce,
            "consolidation_date" | "consolidation" => DateField::Consolidation,
            "registration_date" | "registration" => DateField::Registration,
            _ => return None,
        })
    }
}

/// Range constraints on one date column. `before`/`after` are exclusive;
/// `on` is an exact match; combining `after` and `before` gives a
/// between-filter.
#[derive(Debug, Clone, Default)]
pub struct DateFilter {
    pub before: Option<NaiveDate>,
    pub after: Option<NaiveDate>,
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filter set compiled into one SQL WHERE clause. Every field is optional;
/// an empty query matches everything (bounded by `limit`).
#[derive(Debug, Clone, Default)]
pub struct MetadataQuery {
    pub language: Option<Language>,
    pub source_type: Option<SourceType>,
    pub act_id: Option<String>,
    pub regulation_id: Option<String>,
    pub section_label: Option<String>,
    pub scope_type: Option<ScopeType>,
    pub status: Option<DocStatus>,
    /// Match defined terms that are document-scoped or list this section
    /// among their scope sections.
    pub section_scope: Option<String>,
    pub dates: Vec<(DateField, DateFilter)>,
    pub order_by: Option<(DateField, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl MetadataQuery {
    /// Compile to `(where_clause, params)`. The clause never includes the
    /// `WHERE` keyword; with no filters it is `1 = 1`.
    pub fn where_clause(&self) -> (String, Vec<String>) {
        let mut parts: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();

        let mut eq = |column: &str, value: Option<String>| {
            if let Some(v) = value {
                parts.push(format!("{column} = ?"));
                params.push(v);
            }
        };
        eq("language", self.language.map(|l| l.as_str().to_string()));
        eq(
            "source_type",
            self.source_type.map(|s| s.as_str().to_string()),
        );
        eq("act_id", self.act_id.clone());
        eq("regulation_id", self.regulation_id.clone());
        eq("section_label", self.section_label.clone());
        eq(
            "scope_type",
            self.scope_type.map(|s| s.as_str().to_string()),
        );
        eq("status", self.status.map(|s| s.as_str().to_string()));

        if let Some(section) = &self.section_scope {
            parts.push(
                "(scope_type IN ('act', 'regulation') OR scope_sections LIKE ?)".to_string(),
            );
            params.push(format!("%|{section}|%"));
        }

        for (field, filter) in &self.dates {
            let col = field.column();
            if let Some(on) = filter.on {
                parts.push(format!("{col} = CAST(? AS DATE)"));
                params.push(on.to_string());
            }
            if let Some(after) = filter.after {
                parts.push(format!("{col} > CAST(? AS DATE)"));
                params.push(after.to_string());
            }
            if let Some(before) = filter.before {
                parts.push(format!("{col} < CAST(? AS DATE)"));
                params.push(before.to_string());
            }
        }

        if parts.is_empty() {
            ("1 = 1".to_string(), params)
        } else {
            (parts.join(" AND "), params)
        }
    }

    /// `ORDER BY … LIMIT … OFFSET …` suffix, empty when unset.
    pub fn tail_clause(&self) -> String {
        let mut tail = String::new();
        if let Some((field, dir)) = &self.order_by {
            let dir_sql = match dir {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            tail.push_str(&format!(
                " ORDER BY {} {} NULLS LAST",
                field.column(),
                dir_sql
            ));
        }
        if let Some(limit) = self.limit {
            tail.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            tail.push_str(&format!(" OFFSET {offset}"));
        }
        tail
    }
}

/// Columns `list_distinct_values` may target. An allowlist, not string
/// interpolation of caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    ActId,
    RegulationId,
    SourceType,
    Language,
    Status,
    ScopeType,
    SectionLabel,
}

impl MetadataField {
    pub fn column(&self) -> &'static str {
        match self {
            MetadataField::ActId => "act_id",
            MetadataField::RegulationId => "regulation_id",
            MetadataField::SourceType => "source_type",
            MetadataField::Language => "language",
            MetadataField::Status => "status",
            MetadataField::ScopeType => "scope_type",
            MetadataField::SectionLabel => "section_label",
        }
    }

    pub fn parse(s: &str) -> Option<MetadataField> {
        Some(match s {
            "act_id" => MetadataField::ActId,
            "regulation_id" => MetadataField::RegulationId,
            "source_type" => MetadataField::SourceType,
            "language" => MetadataField::Language,
            "status" => MetadataField::Status,
            "scope_type" => MetadataField::ScopeType,
            "section_label" => MetadataField::SectionLabel,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        let q = MetadataQuery::default();
        let (clause, params) = q.where_clause();
        assert_eq!(clause, "1 = 1");
        assert!(params.is_empty());
        assert_eq!(q.tail_clause(), "");
    }

    #[test]
    fn equality_filters_compile_in_order() {
        let q = MetadataQuery {
            language: Some(Language::Fr),
            source_type: Some(SourceType::DefinedTerm),
            act_id: Some("C-46".into()),
            ..Default::default()
        };
        let (clause, params) = q.where_clause();
        assert_eq!(
            clause,
            "language = ? AND source_type = ? AND act_id = ?"
        );
        assert_eq!(params, vec!["fr", "defined_term", "C-46"]);
    }

    #[test]
    fn section_scope_matches_document_wide_or_listed() {
        let q = MetadataQuery {
            section_scope: Some("15".into()),
            ..Default::default()
        };
        let (clause, params) = q.where_clause();
        assert!(clause.contains("scope_type IN ('act', 'regulation')"));
        assert!(clause.contains("scope_sections LIKE ?"));
        assert_eq!(params, vec!["%|15|%"]);
    }

    #[test]
    fn between_is_after_plus_before() {
        let q = MetadataQuery {
            dates: vec![(
                DateField::LastAmended,
                DateFilter {
                    after: NaiveDate::from_ymd_opt(2023, 1, 1),
                    before: NaiveDate::from_ymd_opt(2024, 1, 1),
                    on: None,
                },
            )],
            ..Default::default()
        };
        let (clause, params) = q.where_clause();
        assert_eq!(
            clause,
            "last_amended_date > CAST(? AS DATE) AND last_amended_date < CAST(? AS DATE)"
        );
        assert_eq!(params, vec!["2023-01-01", "2024-01-01"]);
    }

    #[test]
    fn order_limit_offset_tail() {
        let q = MetadataQuery {
            order_by: Some((DateField::Enacted, SortDirection::Asc)),
            limit: Some(25),
            offset: Some(50),
            ..Default::default()
        };
        assert_eq!(
            q.tail_clause(),
            " ORDER BY enacted_date ASC NULLS LAST LIMIT 25 OFFSET 50"
        );
    }

    #[test]
    fn date_field_parse_accepts_both_spellings() {
        assert_eq!(DateField::parse("last_amended_date"), Some(DateField::LastAmended));
        assert_eq!(DateField::parse("in-force"), Some(DateField::InForce));
        assert_eq!(DateField::parse("bogus"), None);
    }
}
