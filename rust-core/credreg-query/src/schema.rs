// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property metadata: the schema context and the column catalog.
//!
//! Both tables are loaded once at startup (from the JSON-LD context and the
//! indexed table's column list) and are read-only afterwards. Resolving a key
//! is two `HashMap` lookups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// Keys whose values are resource identifiers rather than text.
pub const IDENTIFIER_KEYS: [&str; 2] = ["@id", "ceterms:ctid"];

/// A column of the flattened resource table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Whether the column is a PostgreSQL array.
    #[serde(default)]
    pub array: bool,
    /// Element SQL type (`varchar`, `integer`, ...), used to cast array literals.
    #[serde(rename = "type", default = "default_sql_type")]
    pub sql_type: String,
}

fn default_sql_type() -> String {
    "varchar".to_string()
}

impl ColumnInfo {
    pub fn scalar(sql_type: impl Into<String>) -> Self {
        Self {
            array: false,
            sql_type: sql_type.into(),
        }
    }

    pub fn array(sql_type: impl Into<String>) -> Self {
        Self {
            array: true,
            sql_type: sql_type.into(),
        }
    }
}

/// Columns of the indexed table, keyed by property name.
#[derive(Debug, Clone, Default)]
pub struct ColumnCatalog {
    columns: HashMap<String, ColumnInfo>,
}

impl ColumnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"<column>": {"array": bool, "type": "<sql type>"}, ...}`.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        let obj = value
            .as_object()
            .ok_or_else(|| QueryError::Schema("column catalog must be a JSON object".into()))?;

        let mut catalog = Self::new();
        for (name, info) in obj {
            let info: ColumnInfo = serde_json::from_value(info.clone())
                .map_err(|e| QueryError::Schema(format!("column `{name}`: {e}")))?;
            catalog.insert(name.clone(), info);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, name: impl Into<String>, info: ColumnInfo) {
        self.columns.insert(name.into(), info);
    }

    pub fn with_column(mut self, name: impl Into<String>, info: ColumnInfo) -> Self {
        self.insert(name, info);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One entry of the JSON-LD context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(rename = "@container", default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl ContextEntry {
    pub fn typed(value_type: impl Into<String>) -> Self {
        Self {
            value_type: Some(value_type.into()),
            container: None,
        }
    }

    pub fn language() -> Self {
        Self {
            value_type: None,
            container: Some("@language".to_string()),
        }
    }

    pub fn reference() -> Self {
        Self::typed("@id")
    }
}

/// Read-only map from property key to its context entry.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    entries: HashMap<String, ContextEntry>,
}

impl SchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON-LD context, either bare or wrapped in `{"@context": ...}`.
    ///
    /// Prefix declarations (`"ceterms": "https://..."`) are accepted as untyped
    /// entries.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        let value = value.get("@context").unwrap_or(value);
        let obj = value
            .as_object()
            .ok_or_else(|| QueryError::Schema("schema context must be a JSON object".into()))?;

        let mut context = Self::new();
        for (key, entry) in obj {
            let entry = match entry {
                Value::Object(_) => serde_json::from_value(entry.clone())
                    .map_err(|e| QueryError::Schema(format!("context entry `{key}`: {e}")))?,
                _ => ContextEntry::default(),
            };
            context.insert(key.clone(), entry);
        }
        Ok(context)
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ContextEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn with_entry(mut self, key: impl Into<String>, entry: ContextEntry) -> Self {
        self.insert(key, entry);
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&ContextEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scalar datatypes recognised for typed properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Date,
    Decimal,
    DateTime,
    Float,
    Integer,
    /// Anything without a recognised XSD type.
    String,
}

impl ScalarType {
    pub fn from_xsd(value_type: Option<&str>) -> Self {
        match value_type {
            Some("xsd:boolean") => ScalarType::Boolean,
            Some("xsd:date") => ScalarType::Date,
            Some("xsd:decimal") => ScalarType::Decimal,
            Some("xsd:dateTime") => ScalarType::DateTime,
            Some("xsd:float") => ScalarType::Float,
            Some("xsd:integer") => ScalarType::Integer,
            _ => ScalarType::String,
        }
    }
}

/// How a property's values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    PlainString,
    LangString,
    Identifier,
    Typed(ScalarType),
    Reference,
}

/// Everything the condition builder needs to know about one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
    /// Present in either the catalog or the context.
    pub exists: bool,
    /// Backing column, if the key is stored on the indexed table.
    pub column: Option<ColumnInfo>,
    pub value_type: ValueType,
}

impl PropertyMeta {
    pub fn is_column(&self) -> bool {
        self.column.is_some()
    }

    pub fn is_array_column(&self) -> bool {
        self.column.as_ref().is_some_and(|c| c.array)
    }
}

/// Schema context plus column catalog, shared read-only by all compilations.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    context: SchemaContext,
    columns: ColumnCatalog,
}

impl Schema {
    pub fn new(context: SchemaContext, columns: ColumnCatalog) -> Self {
        Self { context, columns }
    }

    pub fn context(&self) -> &SchemaContext {
        &self.context
    }

    pub fn columns(&self) -> &ColumnCatalog {
        &self.columns
    }

    /// Resolve a key's metadata.
    ///
    /// Fails with [`QueryError::UnsupportedProperty`] only when the key is in
    /// neither table.
    pub fn resolve(&self, key: &str) -> Result<PropertyMeta, QueryError> {
        let column = self.columns.get(key).cloned();
        let entry = self.context.lookup(key);

        if column.is_none() && entry.is_none() {
            return Err(QueryError::UnsupportedProperty(key.to_string()));
        }

        let value_type = entry.and_then(|e| e.value_type.as_deref());
        let container = entry.and_then(|e| e.container.as_deref());

        let value_type = if value_type == Some("@id") {
            ValueType::Reference
        } else if IDENTIFIER_KEYS.contains(&key) {
            ValueType::Identifier
        } else if container == Some("@language") {
            ValueType::LangString
        } else if value_type == Some("xsd:string") {
            ValueType::PlainString
        } else {
            ValueType::Typed(ScalarType::from_xsd(value_type))
        };

        Ok(PropertyMeta {
            exists: true,
            column,
            value_type,
        })
    }
}
