// SPDX-License-Identifier: PMPL-1.0-or-later
//! Condition builder: turns a query document into a [`Condition`] tree.
//!
//! One builder exists per query scope: the request itself, plus one per
//! reference traversal (see [`crate::reference`]). Each builder returns the
//! subqueries it registered alongside its condition; nothing is shared
//! between scopes.
//!
//! Leaf dispatch by resolved value type:
//! - identifier (`@id`, `ceterms:ctid`): `=` for well-formed ids, else `LIKE '%v%'`
//! - language string: full-text per locale column, or ILIKE with a match type
//! - plain string: full-text with the default dictionary, or ILIKE
//! - array column: non-empty / two-item range / containment or overlap
//! - other scalar: `IN (...)`
//! - reference: named subquery

use serde_json::{Map, Value};
use tracing::debug;

use crate::condition::{
    ColumnRef, Combinator, ComparisonOp, Condition, SetMode,
};
use crate::config::CompilerConfig;
use crate::error::QueryError;
use crate::identifier;
use crate::plan::{Direction, Subquery};
use crate::schema::{ColumnInfo, ScalarType, Schema, ValueType};
use crate::value::{
    operator_of_node, Literal, MatchType, SearchItem, ValueSpec, SEARCH_OPERATOR,
    SEARCH_TERM_GROUP, SEARCH_VALUE,
};

/// Condition and subqueries produced by one scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeOutput {
    pub condition: Option<Condition>,
    pub subqueries: Vec<Subquery>,
}

/// Builds the condition tree of one query scope.
pub struct ConditionBuilder<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) config: &'a CompilerConfig,
    /// Scope name; `None` for the top-level request.
    pub(crate) name: Option<String>,
    /// Subqueries registered by this scope so far, in document order.
    pub(crate) subqueries: Vec<Subquery>,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(schema: &'a Schema, config: &'a CompilerConfig, name: Option<String>) -> Self {
        Self {
            schema,
            config,
            name,
            subqueries: Vec::new(),
        }
    }

    /// Compile `node` and hand back the scope's condition and subqueries.
    pub fn compile(mut self, node: &Value) -> Result<ScopeOutput, QueryError> {
        let condition = self.build(node)?;

        debug!(
            scope = self.name.as_deref().unwrap_or("root"),
            subqueries = self.subqueries.len(),
            leaves = condition.as_ref().map_or(0, Condition::leaf_count),
            "Compiled query scope"
        );

        Ok(ScopeOutput {
            condition,
            subqueries: self.subqueries,
        })
    }

    fn build(&mut self, node: &Value) -> Result<Option<Condition>, QueryError> {
        let children = self.build_node(node)?;
        Ok(Condition::combine(children, operator_of_node(node)))
    }

    fn build_node(&mut self, node: &Value) -> Result<Vec<Option<Condition>>, QueryError> {
        match node {
            Value::Array(items) => self.build_from_array(items),
            Value::Object(obj) => self.build_from_object(obj),
            other => Err(QueryError::MalformedSearchValue(format!(
                "either an array or an object is expected, `{other}` is neither"
            ))),
        }
    }

    fn build_from_array(&mut self, items: &[Value]) -> Result<Vec<Option<Condition>>, QueryError> {
        items.iter().map(|item| self.build(item)).collect()
    }

    fn build_from_object(
        &mut self,
        obj: &Map<String, Value>,
    ) -> Result<Vec<Option<Condition>>, QueryError> {
        if let Some(inner) = obj.get(SEARCH_VALUE) {
            return match inner {
                Value::Array(items) => self.build_from_array(items),
                Value::Object(inner) => self.build_from_object(inner),
                other => Err(QueryError::MalformedSearchValue(format!(
                    "`{SEARCH_VALUE}` of a query node must be an array or an object, got `{other}`"
                ))),
            };
        }

        let mut conditions = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if key == SEARCH_OPERATOR || key == SEARCH_TERM_GROUP {
                continue;
            }
            conditions.push(self.build_property(key, value)?);
        }

        if let Some(term_group) = obj.get(SEARCH_TERM_GROUP) {
            conditions.push(self.build(term_group)?);
        }

        Ok(conditions)
    }

    fn build_property(&mut self, raw_key: &str, value: &Value) -> Result<Option<Condition>, QueryError> {
        let (direction, key) = Direction::from_key(raw_key);
        let meta = self.schema.resolve(key)?;

        if meta.value_type == ValueType::Reference {
            return self.reference_condition(key, value, direction).map(Some);
        }

        // Described by the context but not stored: this branch matches nothing.
        let Some(column) = meta.column else {
            return Ok(Some(Condition::Impossible));
        };

        let spec = ValueSpec::from_json(value)?;

        match meta.value_type {
            ValueType::Identifier => self.identifier_condition(key, &spec),
            ValueType::LangString => {
                self.text_condition(key, &spec, &self.config.default_dictionary, true, None)
            }
            ValueType::PlainString => {
                self.text_condition(key, &spec, &self.config.default_dictionary, false, None)
            }
            ValueType::Typed(scalar) if column.array => {
                self.array_condition(key, &column, scalar, &spec)
            }
            ValueType::Typed(_) | ValueType::Reference => self.scalar_condition(key, &spec),
        }
    }

    /// Exact ids compare with `=`, everything else with a case-sensitive
    /// substring test. Items always combine with OR.
    fn identifier_condition(&self, key: &str, spec: &ValueSpec) -> Result<Option<Condition>, QueryError> {
        let conditions = spec.literals(key)?.into_iter().map(|literal| {
            let text = literal.to_string();
            let condition = if literal.is_any_value() {
                Condition::NotNull {
                    column: ColumnRef::resource(key),
                }
            } else if identifier::is_exact(key, &text) {
                Condition::Comparison {
                    column: ColumnRef::resource(key),
                    op: ComparisonOp::Eq,
                    values: vec![Literal::Text(text)],
                }
            } else {
                Condition::Pattern {
                    column: ColumnRef::resource(key),
                    pattern: MatchType::ExactMatch.pattern(&escape_like(&text)),
                    case_sensitive: true,
                }
            };
            Some(condition)
        });

        Ok(Condition::combine(conditions, Combinator::Or))
    }

    /// Full-text or pattern conditions against a text column.
    ///
    /// A nested value inherits the enclosing match type unless it names its
    /// own. Locale maps are only accepted when `locales` is set and resolve to
    /// `<column>_<locale>` columns.
    fn text_condition(
        &self,
        column: &str,
        spec: &ValueSpec,
        dictionary: &str,
        locales: bool,
        inherited: Option<MatchType>,
    ) -> Result<Option<Condition>, QueryError> {
        let match_type = spec.match_type.or(inherited);
        let pattern_type = match_type.filter(|mt| !mt.is_full_text());

        let mut conditions = Vec::with_capacity(spec.items.len());
        for item in &spec.items {
            let condition = match item {
                SearchItem::Literal(literal) if literal.is_any_value() => Some(Condition::NotNull {
                    column: ColumnRef::resource(column),
                }),
                SearchItem::Literal(literal) => Some(match pattern_type {
                    Some(mt) => Condition::Pattern {
                        column: ColumnRef::resource(column),
                        pattern: mt.pattern(&escape_like(&literal.to_string())),
                        case_sensitive: false,
                    },
                    None => Condition::FullText {
                        column: ColumnRef::resource(column),
                        dictionary: dictionary.to_string(),
                        term: literal.to_string(),
                    },
                }),
                SearchItem::Nested(nested) => {
                    self.text_condition(column, nested, dictionary, locales, match_type)?
                }
                SearchItem::Localized { terms, operator } if locales => {
                    self.localized_condition(column, terms, *operator, match_type)?
                }
                SearchItem::Localized { .. } => {
                    return Err(QueryError::MalformedSearchValue(format!(
                        "`{column}` is not language-tagged, a locale map cannot be searched"
                    )))
                }
            };
            conditions.push(condition);
        }

        Ok(Condition::combine(conditions, spec.operator))
    }

    fn localized_condition(
        &self,
        key: &str,
        terms: &[(String, ValueSpec)],
        operator: Combinator,
        inherited: Option<MatchType>,
    ) -> Result<Option<Condition>, QueryError> {
        let mut conditions = Vec::with_capacity(terms.len());
        for (locale, term) in terms {
            let column = locale_column(key, locale);
            if !self.schema.columns().contains(&column) {
                conditions.push(Some(Condition::Impossible));
                continue;
            }

            let dictionary = self.config.dictionary_for(locale);
            conditions.push(self.text_condition(&column, term, dictionary, false, inherited)?);
        }
        Ok(Condition::combine(conditions, operator))
    }

    /// Array columns: `search:anyValue` ⇒ non-empty; two items on a
    /// non-string column ⇒ range over the first element; otherwise
    /// containment (`and`) or overlap (`or`).
    fn array_condition(
        &self,
        key: &str,
        column: &ColumnInfo,
        scalar: ScalarType,
        spec: &ValueSpec,
    ) -> Result<Option<Condition>, QueryError> {
        let (any, literals) = split_any_value(spec.literals(key)?);

        // The range reading needs exactly two concrete bounds in the value as written.
        if !any && scalar != ScalarType::String {
            if let [low, high] = literals.as_slice() {
                return Ok(Some(Condition::Range {
                    column: ColumnRef::resource(key),
                    low: low.clone(),
                    high: high.clone(),
                }));
            }
        }

        let not_empty = any.then(|| Condition::NotEmpty {
            column: ColumnRef::resource(key),
        });

        let test = match literals.len() {
            0 => None,
            _ => Some(Condition::SetTest {
                column: ColumnRef::resource(key),
                mode: match spec.operator {
                    Combinator::And => SetMode::Contains,
                    Combinator::Or => SetMode::Overlap,
                },
                items: literals,
                element_type: column.sql_type.clone(),
            }),
        };

        Ok(combine_any(not_empty, test, spec.operator))
    }

    fn scalar_condition(&self, key: &str, spec: &ValueSpec) -> Result<Option<Condition>, QueryError> {
        let (any, literals) = split_any_value(spec.literals(key)?);
        let not_null = any.then(|| Condition::NotNull {
            column: ColumnRef::resource(key),
        });

        let test = (!literals.is_empty()).then(|| Condition::Comparison {
            column: ColumnRef::resource(key),
            op: ComparisonOp::In,
            values: literals,
        });

        Ok(combine_any(not_null, test, Combinator::Or))
    }
}

/// Separate `search:anyValue` from the concrete literals.
fn split_any_value(literals: Vec<&Literal>) -> (bool, Vec<Literal>) {
    let any = literals.iter().any(|l| l.is_any_value());
    let rest = literals
        .into_iter()
        .filter(|l| !l.is_any_value())
        .cloned()
        .collect();
    (any, rest)
}

/// Presence test alongside the test on the remaining items.
fn combine_any(
    presence: Option<Condition>,
    test: Option<Condition>,
    combinator: Combinator,
) -> Option<Condition> {
    match (presence, test) {
        (presence, None) => presence,
        (None, test) => test,
        (presence, test) => Condition::combine([presence, test], combinator),
    }
}

/// Physical column for a locale: `ceterms:name` + `en-US` ⇒ `ceterms:name_en_us`.
pub fn locale_column(key: &str, locale: &str) -> String {
    format!("{key}_{}", locale.replace('-', "_").to_lowercase())
}

/// Escape LIKE metacharacters so user text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnCatalog, ContextEntry, SchemaContext};
    use serde_json::json;

    fn schema() -> Schema {
        let context = SchemaContext::new()
            .with_entry("ceterms:name", ContextEntry::language())
            .with_entry("ceterms:description", ContextEntry::typed("xsd:string"))
            .with_entry("ceterms:credits", ContextEntry::typed("xsd:integer"))
            .with_entry("ceterms:keyword", ContextEntry::default())
            .with_entry("ceterms:audience", ContextEntry::default())
            .with_entry("ceterms:virtualOnly", ContextEntry::typed("xsd:string"));
        let columns = ColumnCatalog::new()
            .with_column("@id", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:ctid", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:name", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:name_en_us", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:name_es", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:description", ColumnInfo::scalar("varchar"))
            .with_column("ceterms:credits", ColumnInfo::array("integer"))
            .with_column("ceterms:keyword", ColumnInfo::array("varchar"))
            .with_column("ceterms:audience", ColumnInfo::scalar("varchar"));
        Schema::new(context, columns)
    }

    fn compile(query: Value) -> Result<Option<Condition>, QueryError> {
        let schema = schema();
        let config = CompilerConfig::default();
        ConditionBuilder::new(&schema, &config, None)
            .compile(&query)
            .map(|output| output.condition)
    }

    #[test]
    fn test_plain_string_is_full_text() {
        let condition = compile(json!({"ceterms:description": "Welding"})).unwrap().unwrap();
        assert_eq!(
            condition,
            Condition::FullText {
                column: ColumnRef::resource("ceterms:description"),
                dictionary: "english".to_string(),
                term: "Welding".to_string(),
            }
        );
    }

    #[test]
    fn test_starts_with_is_pattern() {
        let condition = compile(json!({
            "ceterms:description": {"search:value": "Weld", "search:matchType": "search:startsWith"}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(
            condition,
            Condition::Pattern {
                column: ColumnRef::resource("ceterms:description"),
                pattern: "Weld%".to_string(),
                case_sensitive: false,
            }
        );
    }

    #[test]
    fn test_locale_map_uses_locale_columns_and_dictionaries() {
        let condition = compile(json!({"ceterms:name": {"en-US": "Nursing", "es": "Enfermería"}}))
            .unwrap()
            .unwrap();
        let Condition::Group { combinator, children } = condition else {
            panic!("expected a group");
        };
        assert_eq!(combinator, Combinator::Or);
        assert!(matches!(
            &children[0],
            Condition::FullText { column, dictionary, .. }
                if column.name == "ceterms:name_en_us" && dictionary == "english"
        ));
        assert!(matches!(
            &children[1],
            Condition::FullText { column, dictionary, .. }
                if column.name == "ceterms:name_es" && dictionary == "spanish"
        ));
    }

    #[test]
    fn test_missing_locale_column_is_impossible() {
        let condition = compile(json!({"ceterms:name": {"fr": "Soudure"}})).unwrap();
        assert_eq!(condition, Some(Condition::Impossible));
    }

    #[test]
    fn test_locale_map_on_plain_string_is_malformed() {
        let err = compile(json!({"ceterms:description": {"en": "x"}})).unwrap_err();
        assert!(matches!(err, QueryError::MalformedSearchValue(_)));
    }

    #[test]
    fn test_any_value_is_not_null() {
        let condition = compile(json!({"ceterms:description": "search:anyValue"})).unwrap();
        assert_eq!(
            condition,
            Some(Condition::NotNull {
                column: ColumnRef::resource("ceterms:description")
            })
        );
    }

    #[test]
    fn test_integer_array_two_items_is_range() {
        let condition = compile(json!({"ceterms:credits": [3, 12]})).unwrap().unwrap();
        assert!(matches!(
            condition,
            Condition::Range { low: Literal::Number(ref l), high: Literal::Number(ref h), .. }
                if l.as_u64() == Some(3) && h.as_u64() == Some(12)
        ));
    }

    #[test]
    fn test_any_value_never_counts_as_range_bound() {
        let condition = compile(json!({"ceterms:credits": ["search:anyValue", 3, 12]}))
            .unwrap()
            .unwrap();
        let Condition::Group { combinator, children } = condition else {
            panic!("expected a group");
        };
        assert_eq!(combinator, Combinator::Or);
        assert!(matches!(children[0], Condition::NotEmpty { .. }));
        assert!(matches!(
            children[1],
            Condition::SetTest { mode: SetMode::Overlap, ref items, .. } if items.len() == 2
        ));

        let condition = compile(json!({"ceterms:credits": ["search:anyValue", 3]})).unwrap();
        assert!(!matches!(condition, Some(Condition::Range { .. })));
    }

    #[test]
    fn test_string_array_two_items_is_overlap() {
        let condition = compile(json!({"ceterms:keyword": ["a", "b"]})).unwrap().unwrap();
        assert!(matches!(
            condition,
            Condition::SetTest { mode: SetMode::Overlap, ref items, .. } if items.len() == 2
        ));
    }

    #[test]
    fn test_array_and_operator_is_contains() {
        let condition = compile(json!({
            "ceterms:keyword": {"search:value": ["a", "b", "c"]}
        }))
        .unwrap()
        .unwrap();
        assert!(matches!(condition, Condition::SetTest { mode: SetMode::Contains, .. }));
    }

    #[test]
    fn test_array_any_value_is_not_empty() {
        let condition = compile(json!({"ceterms:credits": "search:anyValue"})).unwrap();
        assert!(matches!(condition, Some(Condition::NotEmpty { .. })));
    }

    #[test]
    fn test_any_value_mixed_with_items() {
        let condition = compile(json!({
            "ceterms:keyword": {"search:value": ["search:anyValue", "a", "b", "c"]}
        }))
        .unwrap()
        .unwrap();
        let Condition::Group { combinator, children } = condition else {
            panic!("expected a group");
        };
        assert_eq!(combinator, Combinator::And);
        assert!(matches!(children[0], Condition::NotEmpty { .. }));
        assert!(matches!(children[1], Condition::SetTest { mode: SetMode::Contains, .. }));

        let condition = compile(json!({"ceterms:audience": ["search:anyValue", "b"]})).unwrap();
        assert!(matches!(
            condition,
            Some(Condition::Group { combinator: Combinator::Or, ref children }) if children.len() == 2
        ));
    }

    #[test]
    fn test_scalar_is_in_list() {
        let condition = compile(json!({"ceterms:audience": ["a", "b"]})).unwrap().unwrap();
        assert!(matches!(
            condition,
            Condition::Comparison { op: ComparisonOp::In, ref values, .. } if values.len() == 2
        ));
    }

    #[test]
    fn test_identifier_exact_and_fuzzy() {
        let exact = compile(json!({"@id": "https://example.org/resources/123"})).unwrap();
        assert!(matches!(exact, Some(Condition::Comparison { op: ComparisonOp::Eq, .. })));

        let fuzzy = compile(json!({"@id": "123"})).unwrap();
        assert_eq!(
            fuzzy,
            Some(Condition::Pattern {
                column: ColumnRef::resource("@id"),
                pattern: "%123%".to_string(),
                case_sensitive: true,
            })
        );
    }

    #[test]
    fn test_context_only_property_is_impossible() {
        let condition = compile(json!({"ceterms:virtualOnly": "x"})).unwrap();
        assert_eq!(condition, Some(Condition::Impossible));
    }

    #[test]
    fn test_unknown_property_fails() {
        let err = compile(json!([{"ceterms:description": "x"}, {"ceterms:nope": "y"}])).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedProperty(key) if key == "ceterms:nope"));
    }

    #[test]
    fn test_object_siblings_and_by_default() {
        let condition = compile(json!({"ceterms:description": "a", "ceterms:audience": "b"}))
            .unwrap()
            .unwrap();
        assert!(matches!(condition, Condition::Group { combinator: Combinator::And, .. }));
    }

    #[test]
    fn test_or_terms_operator() {
        let condition = compile(json!({
            "ceterms:description": "a",
            "ceterms:audience": "b",
            "search:operator": "search:orTerms"
        }))
        .unwrap()
        .unwrap();
        assert!(matches!(condition, Condition::Group { combinator: Combinator::Or, ref children } if children.len() == 2));
    }

    #[test]
    fn test_term_group_is_extra_child() {
        let condition = compile(json!({
            "ceterms:description": "a",
            "search:termGroup": {
                "ceterms:audience": "b",
                "ceterms:keyword": "c",
                "search:operator": "search:orTerms"
            }
        }))
        .unwrap()
        .unwrap();
        let Condition::Group { combinator, children } = condition else {
            panic!("expected a group");
        };
        assert_eq!(combinator, Combinator::And);
        assert_eq!(children.len(), 2);
        assert!(matches!(&children[1], Condition::Group { combinator: Combinator::Or, .. }));
    }

    #[test]
    fn test_top_level_array_is_or() {
        let condition = compile(json!([{"ceterms:description": "a"}, {"ceterms:audience": "b"}]))
            .unwrap()
            .unwrap();
        assert!(matches!(condition, Condition::Group { combinator: Combinator::Or, .. }));
    }

    #[test]
    fn test_scalar_node_is_malformed() {
        let err = compile(json!(["ceterms:description"])).unwrap_err();
        assert!(matches!(err, QueryError::MalformedSearchValue(_)));
    }

    #[test]
    fn test_empty_document_is_unconstrained() {
        assert_eq!(compile(json!({})).unwrap(), None);
        assert_eq!(compile(json!([])).unwrap(), None);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_locale_column() {
        assert_eq!(locale_column("ceterms:name", "en-US"), "ceterms:name_en_us");
    }
}
