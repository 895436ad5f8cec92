// SPDX-License-Identifier: PMPL-1.0-or-later
//! Reference traversal.
//!
//! A reference-valued property becomes a named subquery over the relation
//! table, and the enclosing scope tests `"@id" IN (SELECT resource_uri FROM
//! <name>)`. The nested value is compiled by a fresh [`ConditionBuilder`]
//! whose name prefixes any subqueries it registers in turn.
//!
//! When the nested value is just a list of URI strings, the subquery skips
//! the join to the resource table and matches the relation table directly.

use serde_json::Value;
use tracing::debug;

use crate::builder::{escape_like, ConditionBuilder};
use crate::condition::{ColumnRef, Combinator, Condition};
use crate::error::QueryError;
use crate::plan::{CompiledQuery, Direction, QueryScope, Subquery};
use crate::value::{MatchType, ANY_VALUE, SEARCH_VALUE};

impl ConditionBuilder<'_> {
    /// Register a subquery for `key` and return the membership test against it.
    pub(crate) fn reference_condition(
        &mut self,
        key: &str,
        value: &Value,
        direction: Direction,
    ) -> Result<Condition, QueryError> {
        let name = subquery_name(self.name.as_deref(), key, &self.subqueries);
        let query = self.reference_scope(&name, key, value, direction)?;

        debug!(
            subquery = %name,
            path = key,
            ?direction,
            nested = query.subqueries.len(),
            "Registered reference subquery"
        );

        self.subqueries.push(Subquery {
            name: name.clone(),
            query,
        });

        Ok(Condition::InSubquery {
            column: ColumnRef::resource("@id"),
            subquery: name,
        })
    }

    fn reference_scope(
        &self,
        name: &str,
        key: &str,
        value: &Value,
        direction: Direction,
    ) -> Result<CompiledQuery, QueryError> {
        if let Some(uris) = uri_list(value) {
            let (_, matched) = self.config.tables.uri_columns(direction);
            let condition = if uris.iter().any(|uri| uri == ANY_VALUE) {
                None
            } else {
                Condition::combine(
                    uris.iter().map(|uri| {
                        Some(Condition::Pattern {
                            column: ColumnRef::reference(matched),
                            pattern: MatchType::ExactMatch.pattern(&escape_like(uri)),
                            case_sensitive: false,
                        })
                    }),
                    Combinator::Or,
                )
            };

            return Ok(CompiledQuery {
                name: Some(name.to_string()),
                subqueries: Vec::new(),
                condition,
                scope: QueryScope::Reference {
                    path: key.to_string(),
                    direction,
                    uri_values: Some(uris),
                },
            });
        }

        let output =
            ConditionBuilder::new(self.schema, self.config, Some(name.to_string())).compile(value)?;

        Ok(CompiledQuery {
            name: Some(name.to_string()),
            subqueries: output.subqueries,
            condition: output.condition,
            scope: QueryScope::Reference {
                path: key.to_string(),
                direction,
                uri_values: None,
            },
        })
    }
}

/// Deterministic subquery name: `<parent>_<key>`, with every character
/// outside `[A-Za-z0-9_]` replaced by `_`.
///
/// Repeats among siblings get the smallest unused `_N` suffix, so the second
/// `ceterms:hasPart` of a scope is `ceterms_hasPart_1`.
pub fn subquery_name(parent: Option<&str>, key: &str, siblings: &[Subquery]) -> String {
    let key = sanitize(key);
    let base = match parent {
        Some(parent) => format!("{parent}_{key}"),
        None => key,
    };

    let taken: Vec<usize> = siblings
        .iter()
        .filter_map(|sibling| suffix_index(&sibling.name, &base))
        .collect();

    let mut index = 0;
    while taken.contains(&index) {
        index += 1;
    }

    match index {
        0 => base,
        n => format!("{base}_{n}"),
    }
}

fn sanitize(key: &str) -> String {
    key.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect()
}

/// `base` ⇒ 0, `base_N` ⇒ N.
fn suffix_index(name: &str, base: &str) -> Option<usize> {
    if name == base {
        return Some(0);
    }
    name.strip_prefix(base)?.strip_prefix('_')?.parse().ok()
}

/// A flat list of URI strings: a string, an array of strings, or an object
/// whose `search:value` is one of those.
fn uri_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<&Value> = match value {
        Value::String(_) => vec![value],
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get(SEARCH_VALUE)? {
            Value::Array(items) => items.iter().collect(),
            Value::String(s) if !s.trim().is_empty() => return Some(vec![s.clone()]),
            _ => return None,
        },
        _ => return None,
    };

    if items.is_empty() {
        return None;
    }

    items
        .into_iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}
