// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query execution and result shaping.
//!
//! The runner compiles a count statement and a data statement from the same
//! document, executes both through a [`QueryExecutor`], and shapes the rows
//! into the response body the registry API returns.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::compiler::QueryCompiler;
use crate::config::CompilerConfig;
use crate::error::{ExecutionError, QueryError};
use crate::plan::CompileOptions;
use crate::schema::Schema;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Runs rendered SQL against a database.
///
/// Implementations must be `Send + Sync` for sharing across Tokio tasks.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, ExecutionError>;
}

/// Paging and shaping options for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Rows to skip; the configured default when `None`.
    pub skip: Option<u64>,
    /// Page size; the configured default when `None`.
    pub take: Option<u64>,
    pub include_results_metadata: bool,
}

/// Per-row envelope metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMetadata {
    pub resource_uri: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub owned_by: Option<String>,
    pub published_by: Option<String>,
}

/// Response body of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Parsed `payload` of each matched resource, in row order.
    pub data: Vec<Value>,
    /// Number of matches ignoring pagination.
    pub total: u64,
    /// The data statement that produced `data`.
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_metadata: Option<Vec<ResultMetadata>>,
}

/// Compiles, executes and shapes CTDL queries.
pub struct QueryRunner<'a, E> {
    compiler: QueryCompiler<'a>,
    executor: E,
}

impl<'a, E: QueryExecutor> QueryRunner<'a, E> {
    pub fn new(schema: &'a Schema, config: &'a CompilerConfig, executor: E) -> Self {
        Self {
            compiler: QueryCompiler::new(schema, config),
            executor,
        }
    }

    pub fn compiler(&self) -> &QueryCompiler<'a> {
        &self.compiler
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `query` and return one page of results plus the total count.
    ///
    /// Compilation errors surface before any statement is executed.
    #[instrument(
        skip_all,
        fields(skip = ?options.skip, take = ?options.take, metadata = options.include_results_metadata)
    )]
    pub async fn run(&self, query: &Value, options: RunOptions) -> Result<QueryResult, QueryError> {
        match self.try_run(query, options).await {
            Ok(result) => {
                info!(
                    rows = result.data.len(),
                    total = result.total,
                    "CTDL query completed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "CTDL query failed");
                Err(e)
            }
        }
    }

    async fn try_run(&self, query: &Value, options: RunOptions) -> Result<QueryResult, QueryError> {
        let config = self.compiler.config();
        let skip = options.skip.unwrap_or(config.default_skip);
        let take = options.take.unwrap_or(config.default_take);

        let data_query =
            self.compiler
                .data_query(query, skip, take, options.include_results_metadata)?;
        let count_query = data_query.reproject(CompileOptions::count());

        let sql = self.compiler.to_sql(&data_query);
        let count_sql = self.compiler.to_sql(&count_query);

        let rows = self.fetch(&sql).await?;
        let count_rows = self.fetch(&count_sql).await?;

        let data = rows.iter().map(payload).collect::<Result<Vec<_>, _>>()?;
        let total = total(&count_rows)?;
        let results_metadata = if options.include_results_metadata {
            Some(rows.iter().map(metadata).collect::<Result<Vec<_>, _>>()?)
        } else {
            None
        };

        Ok(QueryResult {
            data,
            total,
            sql,
            results_metadata,
        })
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<Row>, ExecutionError> {
        let timeout_ms = self.compiler.config().statement_timeout_ms;
        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.executor.fetch_rows(sql),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms, "Statement timed out");
                Err(ExecutionError::Timeout { timeout_ms })
            }
        }
    }
}

/// `payload` column as JSON; text columns are parsed, JSON columns pass through.
fn payload(row: &Row) -> Result<Value, ExecutionError> {
    match row.get("payload") {
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|e| ExecutionError::MalformedRow(format!("payload is not JSON: {e}"))),
        Some(Value::Null) | None => Err(ExecutionError::MalformedRow(
            "row has no payload".to_string(),
        )),
        Some(value) => Ok(value.clone()),
    }
}

fn total(rows: &[Row]) -> Result<u64, ExecutionError> {
    let Some(row) = rows.first() else {
        return Ok(0);
    };

    let count = match row.get("count") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| ExecutionError::MalformedRow("count row has no numeric `count`".to_string()))
}

fn metadata(row: &Row) -> Result<ResultMetadata, ExecutionError> {
    Ok(ResultMetadata {
        resource_uri: text(row, "@id")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
        owned_by: text(row, "owned_by")?,
        published_by: text(row, "published_by")?,
    })
}

fn text(row: &Row, column: &str) -> Result<Option<String>, ExecutionError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ExecutionError::MalformedRow(format!(
            "`{column}` should be text, got {other}"
        ))),
    }
}

fn timestamp(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>, ExecutionError> {
    let Some(raw) = text(row, column)? else {
        return Ok(None);
    };
    parse_timestamp(&raw).map(Some).ok_or_else(|| {
        ExecutionError::MalformedRow(format!("`{column}` is not a timestamp: {raw}"))
    })
}

/// RFC 3339, or PostgreSQL's `YYYY-MM-DD HH:MM:SS[.f]` taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
