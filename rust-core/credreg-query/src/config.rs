// SPDX-License-Identifier: PMPL-1.0-or-later
//! Compiler configuration.
//!
//! Defaults match the registry's PostgreSQL layout:
//! - primary table: indexed_envelope_resources
//! - relation table: indexed_envelope_resource_references (with a `path` column)
//! - dictionaries: es* → spanish, fr* → french, otherwise english
//! - runs: take 10, skip 0, 30s statement timeout

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::plan::Direction;

/// Physical table and column names the renderer emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    /// Flattened resource table every top-level query selects from.
    pub resources: String,
    /// Resource → subresource relation table used for reference traversal.
    pub references: String,
    /// Relation column holding the referring resource's URI.
    pub resource_uri_column: String,
    /// Relation column holding the referenced subresource's URI.
    pub subresource_uri_column: String,
    /// Relation column naming the property a reference came from.
    /// `None` when the relation table carries no path discriminator.
    pub path_column: Option<String>,
    /// Join table from indexed rows to stored envelope resources.
    pub envelope_resources: String,
    /// Envelope table carrying timestamps and organization ids.
    pub envelopes: String,
    /// Organization table (joined twice, as owners and publishers).
    pub organizations: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            resources: "indexed_envelope_resources".to_string(),
            references: "indexed_envelope_resource_references".to_string(),
            resource_uri_column: "resource_uri".to_string(),
            subresource_uri_column: "subresource_uri".to_string(),
            path_column: Some("path".to_string()),
            envelope_resources: "envelope_resources".to_string(),
            envelopes: "envelopes".to_string(),
            organizations: "organizations".to_string(),
        }
    }
}

impl TableLayout {
    /// Relation columns for a traversal: `(projected, matched)`.
    ///
    /// The projected column identifies the scope's owner; the matched column
    /// is compared against the nested value.
    pub fn uri_columns(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::Forward => (&self.resource_uri_column, &self.subresource_uri_column),
            Direction::Reverse => (&self.subresource_uri_column, &self.resource_uri_column),
        }
    }
}

/// Maps a locale prefix to a PostgreSQL text search configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryRule {
    pub locale_prefix: String,
    pub dictionary: String,
}

impl DictionaryRule {
    pub fn new(locale_prefix: impl Into<String>, dictionary: impl Into<String>) -> Self {
        Self {
            locale_prefix: locale_prefix.into(),
            dictionary: dictionary.into(),
        }
    }
}

/// Configuration for the query compiler and runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Physical layout the SQL is rendered against.
    pub tables: TableLayout,
    /// Locale rules checked in order; first matching prefix wins.
    pub dictionaries: Vec<DictionaryRule>,
    /// Dictionary for plain strings and unmatched locales.
    pub default_dictionary: String,
    /// Columns projected by data queries.
    pub data_columns: Vec<String>,
    /// Page size when a run does not specify one.
    pub default_take: u64,
    /// Offset when a run does not specify one.
    pub default_skip: u64,
    /// Upper bound for a single executed statement.
    pub statement_timeout_ms: u64,
}

impl CompilerConfig {
    /// Pick the full-text dictionary for a locale tag such as `es-MX`.
    pub fn dictionary_for(&self, locale: &str) -> &str {
        self.dictionaries
            .iter()
            .find(|rule| locale.starts_with(rule.locale_prefix.as_str()))
            .map(|rule| rule.dictionary.as_str())
            .unwrap_or(self.default_dictionary.as_str())
    }

    /// Reject configurations that cannot produce runnable SQL.
    pub fn validate(&self) -> Result<(), QueryError> {
        let tables = &self.tables;
        let required = [
            ("tables.resources", &tables.resources),
            ("tables.references", &tables.references),
            ("tables.resource_uri_column", &tables.resource_uri_column),
            ("tables.subresource_uri_column", &tables.subresource_uri_column),
            ("tables.envelope_resources", &tables.envelope_resources),
            ("tables.envelopes", &tables.envelopes),
            ("tables.organizations", &tables.organizations),
            ("default_dictionary", &self.default_dictionary),
        ];

        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(QueryError::Schema(format!("{field} must not be empty")));
        }

        if self.data_columns.is_empty() {
            return Err(QueryError::Schema(
                "data_columns must name at least one column".to_string(),
            ));
        }

        if self.statement_timeout_ms == 0 {
            return Err(QueryError::Schema(
                "statement_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            tables: TableLayout::default(),
            dictionaries: vec![
                DictionaryRule::new("es", "spanish"),
                DictionaryRule::new("fr", "french"),
            ],
            default_dictionary: "english".to_string(),
            data_columns: vec![
                "@id".to_string(),
                "ceterms:ctid".to_string(),
                "payload".to_string(),
            ],
            default_take: 10,
            default_skip: 0,
            statement_timeout_ms: 30_000,
        }
    }
}
