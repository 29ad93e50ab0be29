//! Driver-facing traits.
//!
//! The crate never talks to a database itself. A driver adapter implements
//! [`Executor`] for anything that can run SQL, [`Connector`] for the pooled
//! entry point that can open transactions, and [`TxHandle`] for an open
//! transaction. Driver errors should be wrapped with [`OrmError::driver`] and are
//! passed through unchanged.

use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use std::future::Future;

/// Outcome of a non-query statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Auto-increment id generated by an INSERT, when the driver reports one.
    pub last_insert_id: Option<u64>,
}

/// Anything that can run parameterized SQL.
pub trait Executor: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value])
    -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a statement and report affected rows / generated id.
    fn exec(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<ExecResult>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// Returns `OrmError::NotFound` if no rows are returned.
    fn query_one(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<Row>> + Send {
        async move {
            self.query(sql, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("Expected 1 row, got 0"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }
}

/// An open transaction.
pub trait TxHandle: Executor {
    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send;

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send;
}

/// Pooled entry point: runs statements outside a transaction and opens new ones.
pub trait Connector: Executor + 'static {
    type Tx: TxHandle + 'static;

    fn begin(&self) -> impl Future<Output = OrmResult<Self::Tx>> + Send;
}
