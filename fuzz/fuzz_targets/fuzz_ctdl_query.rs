// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for CTDL query compilation

#![no_main]

use std::sync::OnceLock;

use credreg_query::{
    ColumnCatalog, ColumnInfo, CompilerConfig, ContextEntry, QueryCompiler, Schema, SchemaContext,
};
use libfuzzer_sys::fuzz_target;

fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let context = SchemaContext::new()
            .with_entry("ceterms:name", ContextEntry::typed("xsd:string"))
            .with_entry("ceterms:description", ContextEntry::language())
            .with_entry("ceterms:credits", ContextEntry::typed("xsd:integer"))
            .with_entry("ceterms:tags", ContextEntry::default())
            .with_entry("ceterms:hasPart", ContextEntry::reference())
            .with_entry("ceterms:isPartOf", ContextEntry::reference());
        let columns = ColumnCatalog::new()
            .with_column("@id", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:ctid", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:name", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:description_en", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:credits", ColumnInfo::array("integer"))
            .with_column("ceterms:tags", ColumnInfo::array("varchar"));
        Schema::new(context, columns)
    })
}

fuzz_target!(|data: &[u8]| {
    // Any JSON document must compile or fail with an error, never panic.
    if let Ok(query) = serde_json::from_slice::<serde_json::Value>(data) {
        let config = CompilerConfig::default();
        let compiler = QueryCompiler::new(schema(), &config);
        if let Ok(compiled) = compiler.count_query(&query) {
            let _ = compiler.to_sql(&compiled);
        }
    }
});
