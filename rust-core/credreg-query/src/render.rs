// SPDX-License-Identifier: PMPL-1.0-or-later
//! PostgreSQL rendering of compiled queries.
//!
//! Statement shape:
//!
//! ```text
//! [WITH "name" AS (<scope>), ...]
//! SELECT <projection> FROM <table>
//!   [INNER JOIN <relation> ON ...] [metadata joins]
//!   [WHERE <condition>] [LIMIT n] [OFFSET n]
//! ```
//!
//! Each reference scope is rendered recursively, so a subquery with nested
//! references carries its own `WITH` inside its parentheses.

use crate::condition::{ColumnRef, Combinator, ComparisonOp, Condition, Relation, SetMode};
use crate::config::TableLayout;
use crate::plan::{CompileOptions, CompiledQuery, Direction, Projection, QueryScope};
use crate::value::Literal;

const OWNERS_ALIAS: &str = "owners";
const PUBLISHERS_ALIAS: &str = "publishers";

/// Renders [`CompiledQuery`] trees against one table layout.
#[derive(Debug, Clone, Copy)]
pub struct SqlRenderer<'a> {
    layout: &'a TableLayout,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(layout: &'a TableLayout) -> Self {
        Self { layout }
    }

    /// Full SQL text for `query`, including its subqueries.
    pub fn render(&self, query: &CompiledQuery) -> String {
        let mut sql = String::new();

        if !query.subqueries.is_empty() {
            let ctes: Vec<String> = query
                .subqueries
                .iter()
                .map(|subquery| {
                    format!("{} AS ({})", quote_ident(&subquery.name), self.render(&subquery.query))
                })
                .collect();
            sql.push_str("WITH ");
            sql.push_str(&ctes.join(", "));
            sql.push(' ');
        }

        match &query.scope {
            QueryScope::Root(options) => self.render_root(&mut sql, query, options),
            QueryScope::Reference {
                path,
                direction,
                uri_values,
            } => self.render_reference(&mut sql, query, path, *direction, uri_values.is_some()),
        }

        sql
    }

    /// SQL for a condition on its own, as it appears after `WHERE`.
    pub fn render_condition(&self, condition: &Condition) -> String {
        self.condition_sql(condition, false)
    }

    fn render_root(&self, sql: &mut String, query: &CompiledQuery, options: &CompileOptions) {
        let resources = &self.layout.resources;

        let mut projection = match &options.projection {
            Projection::Count => vec!["COUNT(*) AS count".to_string()],
            Projection::Columns(columns) => columns
                .iter()
                .map(|column| qualified(resources, column))
                .collect(),
        };
        if options.with_metadata {
            projection.extend(self.metadata_columns());
        }

        sql.push_str("SELECT ");
        sql.push_str(&projection.join(", "));
        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(resources));

        if options.with_metadata {
            sql.push(' ');
            sql.push_str(&self.metadata_joins());
        }

        if let Some(condition) = &query.condition {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_condition(condition));
        }

        if let Some(pagination) = options.pagination {
            if let Some(take) = pagination.take {
                sql.push_str(&format!(" LIMIT {take}"));
            }
            if let Some(skip) = pagination.skip {
                sql.push_str(&format!(" OFFSET {skip}"));
            }
        }
    }

    fn render_reference(
        &self,
        sql: &mut String,
        query: &CompiledQuery,
        path: &str,
        direction: Direction,
        shortcut: bool,
    ) {
        let layout = self.layout;
        let references = &layout.references;
        let (projected, matched) = layout.uri_columns(direction);

        sql.push_str(&format!(
            "SELECT {} AS resource_uri FROM ",
            qualified(references, projected)
        ));

        if shortcut {
            sql.push_str(&quote_ident(references));
        } else {
            sql.push_str(&format!(
                "{} INNER JOIN {} ON {} = {}",
                quote_ident(&layout.resources),
                quote_ident(references),
                qualified(&layout.resources, "@id"),
                qualified(references, matched),
            ));
        }

        let mut predicates = Vec::with_capacity(2);
        if let Some(condition) = &query.condition {
            predicates.push(self.condition_sql(condition, false));
        }
        if let Some(path_column) = &layout.path_column {
            predicates.push(format!(
                "{} = {}",
                qualified(references, path_column),
                quote_literal(path)
            ));
        }

        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
    }

    fn metadata_columns(&self) -> Vec<String> {
        let envelopes = &self.layout.envelopes;
        vec![
            qualified(envelopes, "created_at"),
            qualified(envelopes, "updated_at"),
            format!("{} AS owned_by", qualified(OWNERS_ALIAS, "_ctid")),
            format!("{} AS published_by", qualified(PUBLISHERS_ALIAS, "_ctid")),
        ]
    }

    fn metadata_joins(&self) -> String {
        let layout = self.layout;
        let envelope_resources = &layout.envelope_resources;
        let envelopes = &layout.envelopes;
        let organizations = quote_ident(&layout.organizations);

        [
            format!(
                "INNER JOIN {} ON {} = {}",
                quote_ident(envelope_resources),
                qualified(envelope_resources, "id"),
                qualified(&layout.resources, "envelope_resource_id"),
            ),
            format!(
                "INNER JOIN {} ON {} = {}",
                quote_ident(envelopes),
                qualified(envelopes, "id"),
                qualified(envelope_resources, "envelope_id"),
            ),
            format!(
                "LEFT OUTER JOIN {organizations} {} ON {} = {}",
                quote_ident(OWNERS_ALIAS),
                qualified(OWNERS_ALIAS, "id"),
                qualified(envelopes, "organization_id"),
            ),
            format!(
                "LEFT OUTER JOIN {organizations} {} ON {} = {}",
                quote_ident(PUBLISHERS_ALIAS),
                qualified(PUBLISHERS_ALIAS, "id"),
                qualified(envelopes, "publishing_organization_id"),
            ),
        ]
        .join(" ")
    }

    /// OR groups are always parenthesized; AND groups only when nested.
    fn condition_sql(&self, condition: &Condition, nested: bool) -> String {
        match condition {
            Condition::Comparison { column, op, values } => {
                let column = self.column(column);
                match (op, values.as_slice()) {
                    (_, []) => "0 = 1".to_string(),
                    (ComparisonOp::Eq, [value, ..]) => format!("{column} = {}", literal(value)),
                    (ComparisonOp::In, values) => {
                        let list: Vec<String> = values.iter().map(literal).collect();
                        format!("{column} IN ({})", list.join(", "))
                    }
                }
            }
            Condition::FullText {
                column,
                dictionary,
                term,
            } => {
                let dictionary = quote_literal(dictionary);
                format!(
                    "to_tsvector({dictionary}, translate({}, '/.', ' ')) @@ plainto_tsquery({dictionary}, translate({}, '/.', ' '))",
                    self.column(column),
                    quote_literal(term),
                )
            }
            Condition::Pattern {
                column,
                pattern,
                case_sensitive,
            } => {
                let operator = if *case_sensitive { "LIKE" } else { "ILIKE" };
                format!("{} {operator} {}", self.column(column), quote_literal(pattern))
            }
            Condition::Range { column, low, high } => format!(
                "{}[1] BETWEEN {} AND {}",
                self.column(column),
                literal(low),
                literal(high)
            ),
            Condition::SetTest {
                column,
                mode,
                items,
                element_type,
            } => {
                let operator = match mode {
                    SetMode::Contains => "@>",
                    SetMode::Overlap => "&&",
                };
                let items: Vec<String> = items.iter().map(literal).collect();
                format!(
                    "{} {operator} ARRAY[{}]::{element_type}[]",
                    self.column(column),
                    items.join(", ")
                )
            }
            Condition::NotNull { column } => format!("{} IS NOT NULL", self.column(column)),
            Condition::NotEmpty { column } => format!("{} <> '{{}}'", self.column(column)),
            Condition::InSubquery { column, subquery } => {
                format!(
                    "{} IN (SELECT resource_uri FROM {})",
                    self.column(column),
                    quote_ident(subquery)
                )
            }
            Condition::Impossible => "0 = 1".to_string(),
            Condition::Group {
                combinator,
                children,
            } => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|child| self.condition_sql(child, true))
                    .collect();
                let joined = parts.join(format!(" {combinator} ").as_str());
                match combinator {
                    Combinator::Or => format!("({joined})"),
                    Combinator::And if nested => format!("({joined})"),
                    Combinator::And => joined,
                }
            }
        }
    }

    fn column(&self, column: &ColumnRef) -> String {
        let table = match column.relation {
            Relation::Resources => &self.layout.resources,
            Relation::References => &self.layout.references,
        };
        qualified(table, &column.name)
    }
}

/// `"table"."column"`.
fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::Text(text) => quote_literal(text),
        Literal::Number(number) => number.to_string(),
        Literal::Bool(true) => "TRUE".to_string(),
        Literal::Bool(false) => "FALSE".to_string(),
    }
}
