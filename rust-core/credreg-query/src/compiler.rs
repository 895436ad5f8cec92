// SPDX-License-Identifier: PMPL-1.0-or-later
//! Compiler façade: query document in, [`CompiledQuery`] / SQL out.

use serde_json::Value;
use tracing::debug;

use crate::builder::ConditionBuilder;
use crate::config::CompilerConfig;
use crate::error::QueryError;
use crate::plan::{CompileOptions, CompiledQuery, Pagination, QueryScope};
use crate::render::SqlRenderer;
use crate::schema::Schema;

/// Compiles query documents against one schema and configuration.
///
/// Holds only shared references; one compiler can serve any number of
/// concurrent compilations.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    schema: &'a Schema,
    config: &'a CompilerConfig,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(schema: &'a Schema, config: &'a CompilerConfig) -> Self {
        Self { schema, config }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn config(&self) -> &'a CompilerConfig {
        self.config
    }

    /// Compile a document into a top-level query.
    pub fn compile(
        &self,
        query: &Value,
        options: CompileOptions,
    ) -> Result<CompiledQuery, QueryError> {
        let output = ConditionBuilder::new(self.schema, self.config, None).compile(query)?;

        debug!(
            subqueries = output.subqueries.len(),
            constrained = output.condition.is_some(),
            projection = ?options.projection,
            "Compiled CTDL query"
        );

        Ok(CompiledQuery {
            name: None,
            subqueries: output.subqueries,
            condition: output.condition,
            scope: QueryScope::Root(options),
        })
    }

    /// `SELECT COUNT(*)` over every match.
    pub fn count_query(&self, query: &Value) -> Result<CompiledQuery, QueryError> {
        self.compile(query, CompileOptions::count())
    }

    /// One page of the configured data columns.
    pub fn data_query(
        &self,
        query: &Value,
        skip: u64,
        take: u64,
        with_metadata: bool,
    ) -> Result<CompiledQuery, QueryError> {
        self.compile(query, self.data_options(skip, take, with_metadata))
    }

    pub(crate) fn data_options(&self, skip: u64, take: u64, with_metadata: bool) -> CompileOptions {
        CompileOptions::columns(self.config.data_columns.clone())
            .paginate(Pagination::new(skip, take))
            .with_metadata(with_metadata)
    }

    pub fn renderer(&self) -> SqlRenderer<'a> {
        SqlRenderer::new(&self.config.tables)
    }

    pub fn to_sql(&self, query: &CompiledQuery) -> String {
        self.renderer().render(query)
    }

    /// Compile and render in one step.
    pub fn compile_to_sql(
        &self,
        query: &Value,
        options: CompileOptions,
    ) -> Result<String, QueryError> {
        Ok(self.to_sql(&self.compile(query, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnCatalog, ColumnInfo, ContextEntry, SchemaContext};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(
            SchemaContext::new().with_entry("ceterms:name", ContextEntry::typed("xsd:string")),
            ColumnCatalog::new()
                .with_column("@id", ColumnInfo::scalar("varchar"))
                .with_column("ceterms:name", ColumnInfo::scalar("varchar")),
        )
    }

    #[test]
    fn test_count_query() {
        let schema = schema();
        let config = CompilerConfig::default();
        let compiler = QueryCompiler::new(&schema, &config);

        let sql = compiler
            .to_sql(&compiler.count_query(&json!({"ceterms:name": "search:anyValue"})).unwrap());
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS count FROM \"indexed_envelope_resources\" \
             WHERE \"indexed_envelope_resources\".\"ceterms:name\" IS NOT NULL"
        );
    }

    #[test]
    fn test_data_query_projects_configured_columns() {
        let schema = schema();
        let config = CompilerConfig::default();
        let compiler = QueryCompiler::new(&schema, &config);

        let sql = compiler
            .to_sql(&compiler.data_query(&json!({}), 0, 10, false).unwrap());
        assert_eq!(
            sql,
            "SELECT \"indexed_envelope_resources\".\"@id\", \
             \"indexed_envelope_resources\".\"ceterms:ctid\", \
             \"indexed_envelope_resources\".\"payload\" \
             FROM \"indexed_envelope_resources\" LIMIT 10 OFFSET 0"
        );
    }

    #[test]
    fn test_errors_surface_before_rendering() {
        let schema = schema();
        let config = CompilerConfig::default();
        let compiler = QueryCompiler::new(&schema, &config);

        let err = compiler
            .compile_to_sql(&json!({"ceterms:unknown": "x"}), CompileOptions::count())
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedProperty(_)));
    }
}
