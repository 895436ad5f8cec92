// SPDX-License-Identifier: PMPL-1.0-or-later
//! Search value normalization.
//!
//! Property values in a query document come in several shapes: a bare
//! literal, a list of literals, a locale map (`{"en": "...", "es": "..."}`),
//! or an object carrying `search:value` with an optional operator and match
//! type. [`ValueSpec::from_json`] folds all of them into one tagged form the
//! condition builder can dispatch on.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::condition::Combinator;
use crate::error::QueryError;

/// Literal meaning "the property is present", regardless of its value.
pub const ANY_VALUE: &str = "search:anyValue";
pub const SEARCH_VALUE: &str = "search:value";
pub const SEARCH_OPERATOR: &str = "search:operator";
pub const SEARCH_MATCH_TYPE: &str = "search:matchType";
pub const SEARCH_TERM_GROUP: &str = "search:termGroup";
pub const OR_TERMS: &str = "search:orTerms";

/// How text items are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    /// Full-text match (the default).
    Contain,
    StartsWith,
    EndsWith,
    ExactMatch,
}

impl MatchType {
    pub fn is_full_text(self) -> bool {
        self == MatchType::Contain
    }

    /// Build a LIKE pattern around already-escaped text.
    ///
    /// `Contain` never reaches pattern matching; it is mapped to a substring
    /// pattern for completeness.
    pub fn pattern(self, escaped: &str) -> String {
        match self {
            MatchType::StartsWith => format!("{escaped}%"),
            MatchType::EndsWith => format!("%{escaped}"),
            MatchType::ExactMatch | MatchType::Contain => format!("%{escaped}%"),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Contain => write!(f, "search:contain"),
            MatchType::StartsWith => write!(f, "search:startsWith"),
            MatchType::EndsWith => write!(f, "search:endsWith"),
            MatchType::ExactMatch => write!(f, "search:exactMatch"),
        }
    }
}

impl FromStr for MatchType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search:contain" => Ok(MatchType::Contain),
            "search:startsWith" => Ok(MatchType::StartsWith),
            "search:endsWith" => Ok(MatchType::EndsWith),
            "search:exactMatch" => Ok(MatchType::ExactMatch),
            _ => Err(QueryError::UnsupportedMatchType(s.to_string())),
        }
    }
}

/// A primitive value from the query document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Literal {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Literal::Text(s.clone())),
            Value::Number(n) => Some(Literal::Number(n.clone())),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_any_value(&self) -> bool {
        self.as_text() == Some(ANY_VALUE)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(s) => f.write_str(s),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// One element of a [`ValueSpec`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchItem {
    Literal(Literal),
    /// Locale tag → term, for language-tagged properties.
    Localized {
        terms: Vec<(String, ValueSpec)>,
        operator: Combinator,
    },
    /// A nested value with its own operator and match type.
    Nested(ValueSpec),
}

impl SearchItem {
    fn from_json(value: &Value) -> Result<Self, QueryError> {
        if let Some(literal) = Literal::from_json(value) {
            return Ok(SearchItem::Literal(literal));
        }
        Ok(SearchItem::Nested(ValueSpec::from_json(value)?))
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            SearchItem::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

/// Normalized property value: items, how they combine, how text matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSpec {
    pub items: Vec<SearchItem>,
    pub operator: Combinator,
    pub match_type: Option<MatchType>,
}

impl ValueSpec {
    fn single(item: SearchItem) -> Self {
        Self {
            items: vec![item],
            operator: Combinator::Or,
            match_type: None,
        }
    }

    /// Normalize a raw property value.
    ///
    /// - a literal becomes a one-item list;
    /// - an array becomes an `or` list (nested arrays/objects become nested specs);
    /// - an object with `search:value` takes its operator (`search:orTerms` ⇒
    ///   `or`, otherwise `and`) and match type from the object;
    /// - a blank `search:value` next to locale keys is ignored and the object
    ///   is read as a locale map; with no locale keys it yields no items;
    /// - any other object is a locale map.
    pub fn from_json(value: &Value) -> Result<Self, QueryError> {
        match value {
            Value::Array(values) => Ok(Self {
                items: values
                    .iter()
                    .map(SearchItem::from_json)
                    .collect::<Result<_, _>>()?,
                operator: Combinator::Or,
                match_type: None,
            }),
            Value::Object(obj) => match obj.get(SEARCH_VALUE) {
                Some(inner) if !is_present(inner) && has_locale_terms(obj) => {
                    Ok(Self::single(localized(obj)?))
                }
                Some(inner) if !is_present(inner) => Ok(Self {
                    items: Vec::new(),
                    operator: operator_of(obj),
                    match_type: match_type_of(obj)?,
                }),
                Some(inner) => {
                    let items = match inner {
                        Value::Array(values) => values
                            .iter()
                            .map(SearchItem::from_json)
                            .collect::<Result<_, _>>()?,
                        Value::Object(map) => vec![localized(map)?],
                        other => vec![SearchItem::from_json(other)?],
                    };
                    Ok(Self {
                        items,
                        operator: operator_of(obj),
                        match_type: match_type_of(obj)?,
                    })
                }
                None => Ok(Self::single(localized(obj)?)),
            },
            Value::Null => Err(QueryError::MalformedSearchValue(
                "null is not a searchable value".to_string(),
            )),
            literal => Ok(Self::single(SearchItem::from_json(literal)?)),
        }
    }

    /// `true` when the value is exactly `search:anyValue`.
    pub fn is_any_value(&self) -> bool {
        matches!(self.items.as_slice(), [SearchItem::Literal(l)] if l.is_any_value())
    }

    pub fn has_any_value(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.as_literal().is_some_and(Literal::is_any_value))
    }

    /// All items as literals, or an error naming the property that needed them.
    pub fn literals(&self, key: &str) -> Result<Vec<&Literal>, QueryError> {
        self.items
            .iter()
            .map(|item| {
                item.as_literal().ok_or_else(|| {
                    QueryError::MalformedSearchValue(format!(
                        "`{key}` expects literal values, got a nested object or array"
                    ))
                })
            })
            .collect()
    }

    /// The items as plain strings, if every item is a text literal.
    pub fn text_items(&self) -> Option<Vec<&str>> {
        if self.items.is_empty() {
            return None;
        }
        self.items
            .iter()
            .map(|item| item.as_literal().and_then(Literal::as_text))
            .collect()
    }
}

fn localized(obj: &Map<String, Value>) -> Result<SearchItem, QueryError> {
    let terms = obj
        .iter()
        .filter(|(locale, _)| !locale.starts_with("search:"))
        .map(|(locale, term)| -> Result<(String, ValueSpec), QueryError> {
            Ok((locale.clone(), ValueSpec::from_json(term)?))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SearchItem::Localized {
        terms,
        operator: if obj.contains_key(SEARCH_OPERATOR) {
            operator_of(obj)
        } else {
            Combinator::Or
        },
    })
}

/// `search:operator` of an object node; arrays are always `or`.
pub fn operator_of_node(node: &Value) -> Combinator {
    match node {
        Value::Object(obj) => operator_of(obj),
        _ => Combinator::Or,
    }
}

fn operator_of(obj: &Map<String, Value>) -> Combinator {
    match obj.get(SEARCH_OPERATOR).and_then(Value::as_str) {
        Some(OR_TERMS) => Combinator::Or,
        _ => Combinator::And,
    }
}

fn match_type_of(obj: &Map<String, Value>) -> Result<Option<MatchType>, QueryError> {
    match obj.get(SEARCH_MATCH_TYPE) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) => token.parse().map(Some),
        Some(other) => Err(QueryError::UnsupportedMatchType(other.to_string())),
    }
}

fn has_locale_terms(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|key| !key.starts_with("search:"))
}

/// Blank strings, empty arrays and empty objects count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}
