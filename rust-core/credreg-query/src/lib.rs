// SPDX-License-Identifier: PMPL-1.0-or-later
//! Credential Registry Query
//!
//! Compiles CTDL JSON query documents into PostgreSQL over the registry's
//! flattened resource table. A document is a tree of property filters; each
//! property resolves through the schema context and column catalog to a
//! full-text, pattern, range, set, equality or reference condition.
//! References become named subqueries over the relation table.
//!
//! ```no_run
//! use credreg_query::{CompilerConfig, QueryCompiler, Schema};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), credreg_query::QueryError> {
//! let schema = Schema::default();
//! let config = CompilerConfig::default();
//! let compiler = QueryCompiler::new(&schema, &config);
//! let query = compiler.count_query(&json!({"ceterms:name": "nursing"}))?;
//! println!("{}", compiler.to_sql(&query));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod error;
pub mod identifier;
pub mod plan;
pub mod reference;
pub mod render;
pub mod runner;
pub mod schema;
pub mod value;

pub use builder::{ConditionBuilder, ScopeOutput};
pub use compiler::QueryCompiler;
pub use condition::{ColumnRef, Combinator, ComparisonOp, Condition, Relation, SetMode};
pub use config::{CompilerConfig, DictionaryRule, TableLayout};
pub use error::{ExecutionError, QueryError};
pub use plan::{
    CompileOptions, CompiledQuery, Direction, Pagination, Projection, QueryScope, Subquery,
};
pub use render::SqlRenderer;
pub use runner::{QueryExecutor, QueryResult, QueryRunner, ResultMetadata, Row, RunOptions};
pub use schema::{
    ColumnCatalog, ColumnInfo, ContextEntry, PropertyMeta, ScalarType, Schema, SchemaContext,
    ValueType,
};
pub use value::{Literal, MatchType, SearchItem, ValueSpec};
