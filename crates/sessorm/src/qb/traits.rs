//! Trait definitions for statement builders.

use crate::error::OrmResult;
use crate::value::Value;

/// SQL text with its positional parameters.
///
/// `params[i]` binds the `i`-th `?` in `sql`.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// One pipeline step: renders a fragment and appends the values it binds.
pub(crate) type Step<B> = fn(&B, &mut Vec<Value>) -> OrmResult<String>;

/// Run `steps` in order, skipping empty fragments and joining the rest with single spaces.
///
/// Each run owns a fresh parameter list, so building twice yields identical output.
pub(crate) fn run_pipeline<B>(builder: &B, steps: &[Step<B>]) -> OrmResult<BuiltQuery> {
    let mut params = Vec::new();
    let mut parts = Vec::with_capacity(steps.len());
    for step in steps {
        let fragment = step(builder, &mut params)?;
        if !fragment.is_empty() {
            parts.push(fragment);
        }
    }
    Ok(BuiltQuery {
        sql: parts.join(" "),
        params,
    })
}

/// Base trait for all statement builders.
pub trait Statement: Send + Sync {
    /// Render SQL and parameters.
    fn build(&self) -> OrmResult<BuiltQuery>;

    /// Debug helper to get the SQL string.
    fn to_sql(&self) -> OrmResult<String> {
        self.build().map(|q| q.sql)
    }
}

impl Statement for BuiltQuery {
    fn build(&self) -> OrmResult<BuiltQuery> {
        Ok(self.clone())
    }
}
