//! INSERT statement builder.

use crate::error::{OrmError, OrmResult};
use crate::ident::{quote_identifier, quote_table};
use crate::qb::traits::{BuiltQuery, Statement, Step, run_pipeline};
use crate::value::Value;

/// Multi-row INSERT builder.
///
/// The first row fixes the column list. Later rows are aligned to it by name:
/// missing columns bind `NULL`, columns the first row does not have are dropped
/// with a warning.
#[derive(Clone, Debug, Default)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

const INSERT_STEPS: &[Step<InsertBuilder>] = &[InsertBuilder::step_insert];

impl InsertBuilder {
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

    /// Replace all rows.
    pub fn values<R, K, V>(mut self, rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.columns.clear();
        self.rows.clear();
        for row in rows {
            self = self.add_row(row);
        }
        self
    }

    /// Append one row.
    pub fn add_row<K, V>(mut self, row: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut row: Vec<(String, Value)> =
            row.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

        if self.rows.is_empty() {
            self.columns = row.iter().map(|(k, _)| k.clone()).collect();
            self.rows.push(row.into_iter().map(|(_, v)| v).collect());
            return self;
        }

        let mut aligned = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match row.iter().position(|(k, _)| k == column) {
                Some(pos) => aligned.push(row.swap_remove(pos).1),
                None => aligned.push(Value::Null),
            }
        }
        if !row.is_empty() {
            let dropped: Vec<&str> = row.iter().map(|(k, _)| k.as_str()).collect();
            tracing::warn!(
                table = %self.table,
                dropped = ?dropped,
                "insert row has columns outside the first row; they are ignored"
            );
        }
        self.rows.push(aligned);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn step_insert(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        if self.rows.is_empty() || self.columns.is_empty() {
            return Err(OrmError::EmptyInsert);
        }
        let cols: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
        let group = format!("({})", vec!["?"; self.columns.len()].join(","));
        let groups = vec![group; self.rows.len()].join(", ");
        for row in &self.rows {
            params.extend(row.iter().cloned());
        }
        Ok(format!(
            "INSERT INTO {}({}) VALUES{}",
            quote_table(&self.table),
            cols.join(", "),
            groups
        ))
    }
}

impl Statement for InsertBuilder {
    fn build(&self) -> OrmResult<BuiltQuery> {
        run_pipeline(self, INSERT_STEPS)
    }
}
