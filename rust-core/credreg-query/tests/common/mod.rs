// SPDX-License-Identifier: PMPL-1.0-or-later
//! Shared fixture schema for integration tests.

#![allow(dead_code)]

use credreg_query::{ColumnCatalog, CompilerConfig, QueryCompiler, Schema, SchemaContext};
use serde_json::{json, Value};

pub const TABLE: &str = "\"indexed_envelope_resources\"";
pub const REFS: &str = "\"indexed_envelope_resource_references\"";

pub fn context_json() -> Value {
    json!({
        "@context": {
            "ceterms": "https://purl.org/ctdl/terms/",
            "ceterms:name": {"@type": "xsd:string"},
            "ceterms:description": {"@container": "@language"},
            "ceterms:keyword": {"@container": "@language"},
            "ceterms:credits": {"@type": "xsd:integer"},
            "ceterms:dateEffective": {"@type": "xsd:date"},
            "ceterms:tags": {},
            "ceterms:audienceLevel": {},
            "ceterms:isActive": {"@type": "xsd:boolean"},
            "ceterms:hasPart": {"@type": "@id"},
            "ceterms:isPartOf": {"@type": "@id"},
            "ceterms:ownedBy": {"@type": "@id"},
            "ceterms:subject": {"@type": "@id"},
            "ceterms:ctid": {"@type": "xsd:string"},
            "ceterms:inLanguage": {"@type": "xsd:language"},
            "ceterms:deprecatedNote": {"@type": "xsd:string"}
        }
    })
}

pub fn columns_json() -> Value {
    json!({
        "@id": {"type": "varchar"},
        "ceterms:ctid": {"type": "varchar"},
        "ceterms:name": {"type": "varchar"},
        "ceterms:description_en": {"type": "varchar"},
        "ceterms:description_en_us": {"type": "varchar"},
        "ceterms:description_es": {"type": "varchar"},
        "ceterms:keyword": {"type": "varchar"},
        "ceterms:credits": {"array": true, "type": "integer"},
        "ceterms:dateEffective": {"array": true, "type": "date"},
        "ceterms:tags": {"array": true, "type": "varchar"},
        "ceterms:audienceLevel": {"type": "varchar"},
        "ceterms:isActive": {"type": "boolean"},
        "ceterms:inLanguage": {"type": "varchar"},
        "payload": {"type": "jsonb"}
    })
}

pub fn schema() -> Schema {
    let context = SchemaContext::from_json(&context_json()).unwrap();
    let columns = ColumnCatalog::from_json(&columns_json()).unwrap();
    Schema::new(context, columns)
}

/// Render the count statement for `query`.
pub fn count_sql(schema: &Schema, config: &CompilerConfig, query: &Value) -> String {
    let compiler = QueryCompiler::new(schema, config);
    compiler.to_sql(&compiler.count_query(query).unwrap())
}

pub fn col(name: &str) -> String {
    format!("{TABLE}.\"{name}\"")
}
