//! Shorthand compiler: turns strings, field maps and prepared trees into a
//! [`Predicate`].
//!
//! | input                         | values          | result                         |
//! |-------------------------------|-----------------|--------------------------------|
//! | `"a=? OR b=?"`                | matching count  | template expression            |
//! | `"age"`                       | one scalar      | `` `age`=? ``                  |
//! | `"age"` / `"!age"`            | `Null`          | `IS NULL` / `IS NOT NULL`      |
//! | `"!age"`                      | one scalar      | `` `age`!=? ``                 |
//! | `"age"` / `"!age"`            | several or list | `IN (...)` / `NOT IN (...)`    |
//! | `"1=1"`                       | none            | raw fragment                   |
//! | field map                     | -               | the rules above per key, AND   |
//! | [`Predicate`] / [`Clause`]    | -               | attached as one entry          |

use crate::qb::expr::{Combinator, Expression, Predicate};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Input accepted by the compiler and by every builder's `filter`.
#[derive(Clone, Debug)]
pub enum ClauseInput {
    Text(String),
    Fields(Vec<(String, Value)>),
    Tree(Predicate),
}

impl From<&str> for ClauseInput {
    fn from(s: &str) -> Self {
        ClauseInput::Text(s.to_string())
    }
}

impl From<String> for ClauseInput {
    fn from(s: String) -> Self {
        ClauseInput::Text(s)
    }
}

impl From<Predicate> for ClauseInput {
    fn from(p: Predicate) -> Self {
        ClauseInput::Tree(p)
    }
}

impl From<Clause> for ClauseInput {
    fn from(c: Clause) -> Self {
        ClauseInput::Tree(c.into_predicate())
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for ClauseInput {
    fn from(fields: Vec<(K, V)>) -> Self {
        ClauseInput::Fields(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for ClauseInput {
    fn from(fields: [(K, V); N]) -> Self {
        ClauseInput::Fields(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for ClauseInput {
    fn from(fields: BTreeMap<K, V>) -> Self {
        ClauseInput::Fields(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Keys are sorted so the rendered SQL is stable across runs.
impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for ClauseInput {
    fn from(fields: HashMap<K, V>) -> Self {
        let mut fields: Vec<(String, Value)> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        ClauseInput::Fields(fields)
    }
}

impl ClauseInput {
    /// The tree a builder attaches: prepared trees as-is, everything else compiled.
    pub(crate) fn into_predicate(self, values: Vec<Value>) -> Predicate {
        match self {
            ClauseInput::Tree(tree) => tree,
            other => compile(other, values),
        }
    }
}

fn split_negation(column: &str) -> (&str, bool) {
    match column.trim().strip_prefix('!') {
        Some(rest) => (rest.trim(), true),
        None => (column.trim(), false),
    }
}

/// One `column` / `!column` key bound to one value.
fn compile_field(key: &str, value: Value) -> Expression {
    if key.contains('?') {
        return Expression::new(key.trim(), vec![value]);
    }
    let (column, negated) = split_negation(key);
    match value {
        Value::Null => Expression::null_check(column, negated),
        Value::List(items) => Expression::in_list(column, items, negated),
        scalar => Expression::compare(column, if negated { "!=" } else { "=" }, scalar),
    }
}

fn compile_text(text: &str, mut values: Vec<Value>) -> Expression {
    if text.contains('?') {
        return Expression::new(text.trim(), values);
    }
    match values.len() {
        0 => Expression::raw(text.trim()),
        1 => match values.pop() {
            Some(value) => compile_field(text, value),
            None => Expression::raw(text.trim()),
        },
        _ => {
            let (column, negated) = split_negation(text);
            Expression::in_list(column, values, negated)
        }
    }
}

/// Compile `input` into a fresh predicate tree.
///
/// A prepared tree becomes the single entry of the new tree, so it keeps its
/// own grouping when rendered.
pub fn compile(input: impl Into<ClauseInput>, values: Vec<Value>) -> Predicate {
    let mut tree = Predicate::new();
    match input.into() {
        ClauseInput::Text(text) => tree.push_expression(compile_text(&text, values)),
        ClauseInput::Fields(fields) => {
            for (key, value) in fields {
                tree.push_expression(compile_field(&key, value));
            }
        }
        ClauseInput::Tree(sub) => tree.push_predicate(sub),
    }
    tree
}

/// A compiled tree that can be extended with further AND / OR groups.
///
/// # Example
/// ```ignore
/// use sessorm::qb::Clause;
///
/// let either = Clause::empty()
///     .or(Clause::new([("aa", 11)]))
///     .or(Clause::new([("cc", 7)]));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Clause {
    tree: Predicate,
}

impl Clause {
    pub fn new(input: impl Into<ClauseInput>) -> Self {
        Self::with_values(input, Vec::new())
    }

    /// Compile a template or shorthand that binds `values`.
    pub fn with_values(input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        Self {
            tree: compile(input, values),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Append `input` as one group joined with AND.
    pub fn and(self, input: impl Into<ClauseInput>) -> Self {
        self.append(Combinator::And, compile(input, Vec::new()))
    }

    /// Append `input` as one group joined with OR.
    pub fn or(self, input: impl Into<ClauseInput>) -> Self {
        self.append(Combinator::Or, compile(input, Vec::new()))
    }

    pub fn and_with(self, input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        self.append(Combinator::And, compile(input, values))
    }

    pub fn or_with(self, input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        self.append(Combinator::Or, compile(input, values))
    }

    fn append(mut self, combinator: Combinator, group: Predicate) -> Self {
        self.tree.set_next(combinator);
        self.tree.push_predicate(group);
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.tree
    }

    pub fn into_predicate(self) -> Predicate {
        self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Shorthand for [`Clause::new`].
pub fn clause(input: impl Into<ClauseInput>) -> Clause {
    Clause::new(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use crate::{fields, values};

    fn render(p: &Predicate) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = p.build(&mut params).unwrap();
        (sql, params)
    }

    #[test]
    fn text_single_value() {
        assert_eq!(render(&compile("age", values![3])).0, "`age`=?");
        assert_eq!(render(&compile("!age", values![3])).0, "`age`!=?");
        assert_eq!(render(&compile("age", values![None::<i32>])).0, "`age` IS NULL");
        assert_eq!(
            render(&compile("!age", vec![Value::Null])).0,
            "`age` IS NOT NULL"
        );
    }

    #[test]
    fn text_many_values_is_in_list() {
        let (sql, params) = render(&compile("age", values![1, 3, 5, 7, 9]));
        assert_eq!(sql, "`age` IN (?,?,?,?,?)");
        assert_eq!(params, values![1, 3, 5, 7, 9]);
        assert_eq!(
            render(&compile("!age", values![vec![1, 2]])).0,
            "`age` NOT IN (?,?)"
        );
    }

    #[test]
    fn text_template_and_raw() {
        let (sql, params) = render(&compile("`a`>? OR `b`<?", values![1, 2]));
        assert_eq!(sql, "`a`>? OR `b`<?");
        assert_eq!(params.len(), 2);
        assert_eq!(render(&compile("1=1", Vec::new())).0, "1=1");
    }

    #[test]
    fn template_values_are_flattened() {
        let (_, params) = render(&compile("`a` BETWEEN ? AND ?", values![vec![1, 2]]));
        assert_eq!(params, values![1, 2]);
    }

    #[test]
    fn fields_in_order() {
        let input: Vec<(&str, Value)> = vec![
            ("foo", "bar".into()),
            ("age", Value::list([1, 3])),
            ("!faith", "x".into()),
            ("gone", Value::Null),
            ("`foo2` BETWEEN ? AND ?", Value::list([1, 2])),
        ];
        let (sql, params) = render(&compile(input, Vec::new()));
        assert_eq!(
            sql,
            "`foo`=? AND `age` IN (?,?) AND `faith`!=? AND `gone` IS NULL AND `foo2` BETWEEN ? AND ?"
        );
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn field_template_with_empty_list_errors() {
        let p = compile([("`foo2`=?", Value::List(vec![]))], Vec::new());
        assert!(matches!(
            p.build(&mut Vec::new()),
            Err(OrmError::PlaceholderMismatch { .. })
        ));
    }

    #[test]
    fn or_groups_nest_with_parentheses() {
        let either = Clause::empty()
            .or(Clause::new(fields! { "aa" => 11, "bb" => "xswl" }))
            .or(Clause::new(fields! { "cc" => "234", "dd" => vec![7, 8] }));
        let filter = Clause::new(fields! { "foo" => "bar" }).and(either);
        let (sql, params) = render(filter.predicate());
        assert_eq!(
            sql,
            "`foo`=? AND ((`aa`=? AND `bb`=?) OR (`cc`=? AND `dd` IN (?,?)))"
        );
        assert_eq!(params.len(), 6);
    }

    #[test]
    fn hashmap_keys_are_sorted() {
        let mut m = HashMap::new();
        m.insert("b", 2);
        m.insert("a", 1);
        assert_eq!(render(&compile(m, Vec::new())).0, "`a`=? AND `b`=?");
    }
}
