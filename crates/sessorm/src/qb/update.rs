//! UPDATE statement builder.

use crate::error::{OrmError, OrmResult};
use crate::ident::{quote_identifier, quote_table};
use crate::qb::clause::ClauseInput;
use crate::qb::expr::{Predicate, count_placeholders};
use crate::qb::join::{JoinRegistry, join_methods};
use crate::qb::traits::{BuiltQuery, Statement, Step, run_pipeline};
use crate::value::Value;

/// UPDATE builder.
///
/// Pipeline: UPDATE table, JOIN, SET, WHERE.
#[derive(Clone, Debug, Default)]
pub struct UpdateBuilder {
    table: String,
    joins: JoinRegistry,
    /// Ordered `(column or raw assignment, value)` pairs
    set: Vec<(String, Value)>,
    where_tree: Predicate,
}

const UPDATE_STEPS: &[Step<UpdateBuilder>] = &[
    UpdateBuilder::step_table,
    UpdateBuilder::step_joins,
    UpdateBuilder::step_set,
    UpdateBuilder::step_where,
];

impl UpdateBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    // ==================== SET ====================

    /// Add one assignment.
    ///
    /// A key containing `?` is a raw assignment (`` "`inc`=`inc`+?" ``) bound to
    /// `value`; any other key renders as `` `key`=? ``.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set.push((key.to_string(), value.into()));
        self
    }

    /// Replace all assignments.
    pub fn set_all<K, V>(mut self, assignments: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.set = assignments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    // ==================== JOIN ====================

    join_methods!();

    // ==================== WHERE ====================

    pub fn filter(self, input: impl Into<ClauseInput>) -> Self {
        self.filter_with(input, Vec::new())
    }

    pub fn filter_with(mut self, input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        self.where_tree.merge(input.into().into_predicate(values));
        self
    }

    // ==================== Pipeline steps ====================

    fn step_table(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(format!("UPDATE {}", quote_table(&self.table)))
    }

    fn step_joins(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(self.joins.render())
    }

    fn step_set(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        if self.set.is_empty() {
            return Err(OrmError::EmptySet);
        }
        let mut parts = Vec::with_capacity(self.set.len());
        for (key, value) in &self.set {
            if key.contains('?') {
                let bound = Value::flatten([value.clone()]);
                let placeholders = count_placeholders(key);
                if placeholders != bound.len() {
                    return Err(OrmError::placeholder_mismatch(key, placeholders, bound.len()));
                }
                parts.push(key.trim().to_string());
                params.extend(bound);
            } else {
                parts.push(format!("{}=?", quote_identifier(key)));
                params.push(value.clone());
            }
        }
        Ok(format!("SET {}", parts.join(", ")))
    }

    fn step_where(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        self.where_tree.build_prefixed("WHERE", params)
    }
}

impl Statement for UpdateBuilder {
    fn build(&self) -> OrmResult<BuiltQuery> {
        run_pipeline(self, UPDATE_STEPS)
    }
}
