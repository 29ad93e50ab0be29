//! DELETE statement builder.

use crate::error::OrmResult;
use crate::ident::quote_table;
use crate::qb::clause::ClauseInput;
use crate::qb::expr::Predicate;
use crate::qb::traits::{BuiltQuery, Statement, Step, run_pipeline};
use crate::value::Value;

/// DELETE builder.
///
/// A DELETE without any filter is allowed and affects every row.
#[derive(Clone, Debug, Default)]
pub struct DeleteBuilder {
    table: String,
    where_tree: Predicate,
}

const DELETE_STEPS: &[Step<DeleteBuilder>] = &[DeleteBuilder::step_table, DeleteBuilder::step_where];

impl DeleteBuilder {
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

    pub fn filter(self, input: impl Into<ClauseInput>) -> Self {
        self.filter_with(input, Vec::new())
    }

    pub fn filter_with(mut self, input: impl Into<ClauseInput>, values: Vec<Value>) -> Self {
        self.where_tree.merge(input.into().into_predicate(values));
        self
    }

    fn step_table(&self, _params: &mut Vec<Value>) -> OrmResult<String> {
        Ok(format!("DELETE FROM {}", quote_table(&self.table)))
    }

    fn step_where(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        self.where_tree.build_prefixed("WHERE", params)
    }
}

impl Statement for DeleteBuilder {
    fn build(&self) -> OrmResult<BuiltQuery> {
        run_pipeline(self, DELETE_STEPS)
    }
}
