// SPDX-License-Identifier: PMPL-1.0-or-later
//! Compiler and execution error types.

use thiserror::Error;

/// Errors that abort a compilation (or a run built on top of one).
///
/// Compilation is deterministic, so none of these are retryable: the same
/// document against the same schema always fails the same way.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("unsupported property: `{0}`")]
    UnsupportedProperty(String),

    #[error("malformed search value: {0}")]
    MalformedSearchValue(String),

    #[error("unsupported search:matchType: `{0}`")]
    UnsupportedMatchType(String),

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QueryError {
    /// Whether the failure was caused by the submitted document rather than
    /// the schema or the database. The surrounding service maps these to 4xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QueryError::UnsupportedProperty(_)
                | QueryError::MalformedSearchValue(_)
                | QueryError::UnsupportedMatchType(_)
        )
    }
}

/// Errors raised by a [`QueryExecutor`](crate::runner::QueryExecutor).
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("database error: {0}")]
    Database(String),

    #[error("statement timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("malformed row: {0}")]
    MalformedRow(String),
}
