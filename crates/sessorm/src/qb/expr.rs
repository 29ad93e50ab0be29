//! Expression leaves and the predicate tree used for WHERE / HAVING.
//!
//! An [`Expression`] is a SQL fragment with `?` placeholders plus the values
//! bound to them. A [`Predicate`] is an ordered list of entries, each joined to
//! its predecessor by AND or OR, whose payload is either an expression or a
//! nested predicate. Nested predicates with more than one entry render inside
//! parentheses, so grouping always survives rendering.
//!
//! # Example
//! ```ignore
//! use sessorm::qb::Predicate;
//!
//! let p = Predicate::new()
//!     .equal_to("aa", 1)
//!     .or()
//!     .add_predicate(Predicate::new().equal_to("bb", 2).equal_to("cc", 3));
//! // `aa`=? OR (`bb`=? AND `cc`=?)
//! ```

use crate::error::{OrmError, OrmResult};
use crate::ident::quote_identifier;
use crate::value::Value;

/// Count `?` placeholders in a template.
pub fn count_placeholders(spec: &str) -> usize {
    spec.bytes().filter(|b| *b == b'?').count()
}

fn placeholder_list(n: usize) -> String {
    vec!["?"; n].join(",")
}

// ==================== Expression ====================

/// A single SQL fragment and its positional values.
///
/// Construction never fails; a malformed expression carries its error and
/// surfaces it when the owning statement is built.
#[derive(Clone, Debug)]
pub struct Expression {
    spec: String,
    values: Vec<Value>,
    error: Option<OrmError>,
}

impl Expression {
    /// Template expression; `values` are flattened and must match the `?` count.
    pub fn new(spec: impl Into<String>, values: Vec<Value>) -> Self {
        let spec = spec.into();
        let values = Value::flatten(values);
        let placeholders = count_placeholders(&spec);
        let error = (placeholders != values.len())
            .then(|| OrmError::placeholder_mismatch(&spec, placeholders, values.len()));
        Self {
            spec,
            values,
            error,
        }
    }

    /// Parameterless fragment, rendered verbatim.
    pub fn raw(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            values: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn failed(spec: impl Into<String>, error: OrmError) -> Self {
        Self {
            spec: spec.into(),
            values: Vec::new(),
            error: Some(error),
        }
    }

    /// `` `column` op ? ``
    pub fn compare(column: &str, op: &str, value: impl Into<Value>) -> Self {
        Self::new(
            format!("{}{op}?", quote_identifier(column)),
            vec![value.into()],
        )
    }

    /// `` `column` LIKE ? `` / `` `column` NOT LIKE ? ``
    pub fn like(column: &str, pattern: impl Into<Value>, negated: bool) -> Self {
        let kw = if negated { "NOT LIKE" } else { "LIKE" };
        Self::new(
            format!("{} {kw} ?", quote_identifier(column)),
            vec![pattern.into()],
        )
    }

    /// `` `column` IN (?,?) `` / `` `column` NOT IN (?,?) ``
    pub fn in_list(column: &str, values: Vec<Value>, negated: bool) -> Self {
        let values = Value::flatten(values);
        let kw = if negated { "NOT IN" } else { "IN" };
        let spec = format!(
            "{} {kw} ({})",
            quote_identifier(column),
            placeholder_list(values.len())
        );
        if values.is_empty() {
            let label = if negated { "NOT IN" } else { "IN" };
            return Self::failed(spec, OrmError::EmptyValueList(label));
        }
        Self::new(spec, values)
    }

    /// `` `column` BETWEEN ? AND ? `` / `` `column` NOT BETWEEN ? AND ? ``
    pub fn between(
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
        negated: bool,
    ) -> Self {
        let kw = if negated { "NOT BETWEEN" } else { "BETWEEN" };
        Self::new(
            format!("{} {kw} ? AND ?", quote_identifier(column)),
            vec![low.into(), high.into()],
        )
    }

    /// `` `column` IS NULL `` / `` `column` IS NOT NULL ``
    pub fn null_check(column: &str, negated: bool) -> Self {
        let kw = if negated { "IS NOT NULL" } else { "IS NULL" };
        Self::raw(format!("{} {kw}", quote_identifier(column)))
    }

    /// `EXISTS(sub)` / `NOT EXISTS(sub)`.
    ///
    /// Surplus values are ignored; fewer values than placeholders is an error.
    pub fn exists(sub: &str, values: Vec<Value>, negated: bool) -> Self {
        let kw = if negated { "NOT EXISTS" } else { "EXISTS" };
        let spec = format!("{kw}({sub})");
        let mut values = Value::flatten(values);
        let placeholders = count_placeholders(sub);
        if placeholders > values.len() {
            let err = OrmError::placeholder_mismatch(&spec, placeholders, values.len());
            return Self::failed(spec, err);
        }
        values.truncate(placeholders);
        Self::new(spec, values)
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn error(&self) -> Option<&OrmError> {
        self.error.as_ref()
    }

    /// Nothing to render and nothing to report.
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.spec.trim().is_empty()
    }

    /// Render into SQL text, appending values to `params` in placeholder order.
    pub fn build(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        params.extend(self.values.iter().cloned());
        Ok(self.spec.clone())
    }
}

// ==================== Predicate ====================

/// How an entry joins the entry before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    fn as_sql(self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        }
    }
}

/// Payload of a predicate entry.
#[derive(Clone, Debug)]
pub enum Payload {
    Expr(Expression),
    Tree(Predicate),
}

#[derive(Clone, Debug)]
pub struct PredicateEntry {
    pub combinator: Combinator,
    pub payload: Payload,
}

/// Ordered boolean tree of expressions.
///
/// Entries are joined with AND unless [`Predicate::or`] is called immediately
/// before an insertion; the OR applies to that one insertion only.
#[derive(Clone, Debug, Default)]
pub struct Predicate {
    entries: Vec<PredicateEntry>,
    next: Combinator,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PredicateEntry] {
        &self.entries
    }

    /// First error carried by any leaf, depth-first.
    pub fn error(&self) -> Option<&OrmError> {
        self.entries.iter().find_map(|e| match &e.payload {
            Payload::Expr(expr) => expr.error(),
            Payload::Tree(tree) => tree.error(),
        })
    }

    // ==================== Combinators ====================

    /// Join the next insertion with AND (the default).
    pub fn and(mut self) -> Self {
        self.next = Combinator::And;
        self
    }

    /// Join the next insertion with OR.
    pub fn or(mut self) -> Self {
        self.next = Combinator::Or;
        self
    }

    pub(crate) fn set_next(&mut self, combinator: Combinator) {
        self.next = combinator;
    }

    pub(crate) fn push_expression(&mut self, expr: Expression) {
        if expr.is_empty() {
            self.next = Combinator::And;
            return;
        }
        self.push(Payload::Expr(expr));
    }

    pub(crate) fn push_predicate(&mut self, tree: Predicate) {
        if tree.is_empty() {
            self.next = Combinator::And;
            return;
        }
        self.push(Payload::Tree(tree));
    }

    fn push(&mut self, payload: Payload) {
        let combinator = std::mem::take(&mut self.next);
        self.entries.push(PredicateEntry {
            combinator,
            payload,
        });
    }

    /// Adopt `tree` when empty, otherwise attach it as one AND entry.
    pub(crate) fn merge(&mut self, tree: Predicate) {
        if self.is_empty() {
            *self = tree;
        } else {
            self.set_next(Combinator::And);
            self.push_predicate(tree);
        }
    }

    /// Append a prepared expression.
    pub fn add_expression(mut self, expr: Expression) -> Self {
        self.push_expression(expr);
        self
    }

    /// Append a nested tree as one entry. Empty trees are skipped.
    pub fn add_predicate(mut self, tree: Predicate) -> Self {
        self.push_predicate(tree);
        self
    }

    // ==================== Leaves ====================

    pub fn equal_to(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_expression(Expression::compare(column, "=", value))
    }

    pub fn not_equal_to(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_expression(Expression::compare(column, "!=", value))
    }

    pub fn less_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_expression(Expression::compare(column, "<", value))
    }

    pub fn less_than_or_equal_to(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_expression(Expression::compare(column, "<=", value))
    }

    pub fn greater_than(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_expression(Expression::compare(column, ">", value))
    }

    pub fn greater_than_or_equal_to(self, column: &str, value: impl Into<Value>) -> Self {
        self.add_expression(Expression::compare(column, ">=", value))
    }

    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.add_expression(Expression::like(column, pattern, false))
    }

    pub fn not_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.add_expression(Expression::like(column, pattern, true))
    }

    pub fn between(self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.add_expression(Expression::between(column, low, high, false))
    }

    pub fn not_between(
        self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.add_expression(Expression::between(column, low, high, true))
    }

    pub fn in_list<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.add_expression(Expression::in_list(column, values, false))
    }

    pub fn not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.add_expression(Expression::in_list(column, values, true))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.add_expression(Expression::null_check(column, false))
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.add_expression(Expression::null_check(column, true))
    }

    pub fn exists(self, sub: &str, values: Vec<Value>) -> Self {
        self.add_expression(Expression::exists(sub, values, false))
    }

    pub fn not_exists(self, sub: &str, values: Vec<Value>) -> Self {
        self.add_expression(Expression::exists(sub, values, true))
    }

    /// Template with `?` placeholders.
    pub fn expression(self, spec: &str, values: Vec<Value>) -> Self {
        self.add_expression(Expression::new(spec, values))
    }

    /// Raw SQL fragment without parameters.
    pub fn raw(self, sql: &str) -> Self {
        self.add_expression(Expression::raw(sql))
    }

    // ==================== Rendering ====================

    /// Render the tree; values are appended to `params` in placeholder order.
    pub fn build(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let mut sql = String::new();
        for entry in &self.entries {
            let fragment = match &entry.payload {
                Payload::Expr(expr) => expr.build(params)?,
                Payload::Tree(tree) => {
                    let inner = tree.build(params)?;
                    if tree.len() > 1 && !inner.is_empty() {
                        format!("({inner})")
                    } else {
                        inner
                    }
                }
            };
            if fragment.is_empty() {
                continue;
            }
            if !sql.is_empty() {
                sql.push_str(entry.combinator.as_sql());
            }
            sql.push_str(&fragment);
        }
        Ok(sql)
    }

    /// `"<keyword> <tree>"`, or `""` when the tree renders nothing.
    pub(crate) fn build_prefixed(&self, keyword: &str, params: &mut Vec<Value>) -> OrmResult<String> {
        let sql = self.build(params)?;
        if sql.is_empty() {
            return Ok(sql);
        }
        Ok(format!("{keyword} {sql}"))
    }
}
