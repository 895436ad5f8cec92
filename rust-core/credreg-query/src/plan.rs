// SPDX-License-Identifier: PMPL-1.0-or-later
//! Compiled query types.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Direction a reference is traversed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Resource → subresource (the property points at the nested value).
    Forward,
    /// Subresource → resource (`^` prefix: the nested value points at us).
    Reverse,
}

impl Direction {
    /// Split a leading `^` off a property key.
    pub fn from_key(key: &str) -> (Direction, &str) {
        match key.strip_prefix('^') {
            Some(stripped) => (Direction::Reverse, stripped),
            None => (Direction::Forward, key),
        }
    }
}

/// What the top-level statement selects. Reference scopes always select
/// the relation table's URI column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// `COUNT(*) AS count`.
    Count,
    /// Raw columns of the resource table.
    Columns(Vec<String>),
}

/// Row window for the top-level statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl Pagination {
    pub fn new(skip: u64, take: u64) -> Self {
        Self {
            skip: Some(skip),
            take: Some(take),
        }
    }
}

/// Caller intent for a top-level compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    pub projection: Projection,
    pub pagination: Option<Pagination>,
    /// Join envelope timestamps and owning/publishing organizations.
    pub with_metadata: bool,
}

impl CompileOptions {
    pub fn count() -> Self {
        Self {
            projection: Projection::Count,
            pagination: None,
            with_metadata: false,
        }
    }

    pub fn columns(columns: Vec<String>) -> Self {
        Self {
            projection: Projection::Columns(columns),
            pagination: None,
            with_metadata: false,
        }
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_metadata(mut self, with_metadata: bool) -> Self {
        self.with_metadata = with_metadata;
        self
    }
}

/// Whether a compiled query is the request itself or a reference traversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum QueryScope {
    Root(CompileOptions),
    Reference {
        /// Property key the reference was reached through.
        path: String,
        direction: Direction,
        /// Set when the nested value was a flat list of URIs; the scope then
        /// scans the relation table directly instead of joining resources.
        uri_values: Option<Vec<String>>,
    },
}

/// A named CTE produced by a reference traversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subquery {
    pub name: String,
    pub query: CompiledQuery,
}

impl Subquery {
    pub fn path(&self) -> Option<&str> {
        match &self.query.scope {
            QueryScope::Reference { path, .. } => Some(path),
            QueryScope::Root(_) => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match &self.query.scope {
            QueryScope::Reference { direction, .. } => Some(*direction),
            QueryScope::Root(_) => None,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.query.condition.as_ref()
    }
}

/// The immutable result of compiling one scope.
///
/// Subqueries are nested: a reference scope owns the subqueries its own
/// condition refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub name: Option<String>,
    pub subqueries: Vec<Subquery>,
    /// `None` when the document places no constraint.
    pub condition: Option<Condition>,
    pub scope: QueryScope,
}

impl CompiledQuery {
    pub fn is_reference(&self) -> bool {
        matches!(self.scope, QueryScope::Reference { .. })
    }

    /// The same condition tree with a different top-level projection.
    ///
    /// Lets a count statement and a data statement share one compilation.
    pub fn reproject(&self, options: CompileOptions) -> CompiledQuery {
        CompiledQuery {
            scope: QueryScope::Root(options),
            ..self.clone()
        }
    }

    /// Names of every subquery in this tree, depth-first.
    pub fn subquery_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        for subquery in &self.subqueries {
            names.push(subquery.name.as_str());
            subquery.query.collect_names(names);
        }
    }
}
