// SPDX-License-Identifier: PMPL-1.0-or-later
//! Boolean condition tree.
//!
//! The condition builder produces a [`Condition`]; the renderer turns it into
//! SQL. Keeping the two apart lets the boolean structure be tested without
//! looking at SQL text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Literal;

/// How sibling conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

/// Which table a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The flattened resource table.
    Resources,
    /// The resource → subresource relation table.
    References,
}

/// A table-qualified column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub relation: Relation,
    pub name: String,
}

impl ColumnRef {
    pub fn resource(name: impl Into<String>) -> Self {
        Self {
            relation: Relation::Resources,
            name: name.into(),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            relation: Relation::References,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    /// `column = value` (exactly one value).
    Eq,
    /// `column IN (values...)`.
    In,
}

/// Array set test mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetMode {
    /// Every item present (`@>`).
    Contains,
    /// At least one item present (`&&`).
    Overlap,
}

/// A node of the boolean condition tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Comparison {
        column: ColumnRef,
        op: ComparisonOp,
        values: Vec<Literal>,
    },
    FullText {
        column: ColumnRef,
        dictionary: String,
        term: String,
    },
    /// LIKE test; `pattern` already carries escaped text and wildcards.
    Pattern {
        column: ColumnRef,
        pattern: String,
        case_sensitive: bool,
    },
    /// Inclusive range over the first element of an array column.
    Range {
        column: ColumnRef,
        low: Literal,
        high: Literal,
    },
    SetTest {
        column: ColumnRef,
        mode: SetMode,
        items: Vec<Literal>,
        element_type: String,
    },
    NotNull {
        column: ColumnRef,
    },
    NotEmpty {
        column: ColumnRef,
    },
    /// `column IN (SELECT resource_uri FROM <subquery>)`.
    InSubquery {
        column: ColumnRef,
        subquery: String,
    },
    /// Always false.
    Impossible,
    Group {
        combinator: Combinator,
        children: Vec<Condition>,
    },
}

impl Condition {
    /// Combine optional children.
    ///
    /// `None` means "unconstrained". Under AND it is dropped; under OR it
    /// makes the whole group unconstrained. Zero remaining children yield
    /// `None`, one yields that child unwrapped.
    pub fn combine(
        children: impl IntoIterator<Item = Option<Condition>>,
        combinator: Combinator,
    ) -> Option<Condition> {
        let mut kept = Vec::new();
        for child in children {
            match (child, combinator) {
                (Some(condition), _) => kept.push(condition),
                (None, Combinator::And) => {}
                (None, Combinator::Or) => return None,
            }
        }

        match kept.len() {
            0 => None,
            1 => kept.pop(),
            _ => Some(Condition::Group {
                combinator,
                children: kept,
            }),
        }
    }

    /// Number of leaf predicates in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Condition::Group { children, .. } => children.iter().map(Condition::leaf_count).sum(),
            _ => 1,
        }
    }

    /// Depth-first visit of every node.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        visit(self);
        if let Condition::Group { children, .. } = self {
            for child in children {
                child.walk(visit);
            }
        }
    }
}
