//! # sessorm
//!
//! A session-scoped, identity-mapped ORM core for MySQL-style databases.
//!
//! ## Features
//!
//! - **Statement builders**: SELECT / INSERT / UPDATE / DELETE rendered with backtick-quoted
//!   identifiers and positional `?` placeholders
//! - **Composable filters**: field maps, raw fragments and nested AND/OR clauses compile into
//!   one predicate tree
//! - **Identity cache**: one shared record per row per session, bounded by an LRU
//! - **Flattened transactions**: nested `run_in_transaction` calls join the outermost one
//! - **Driver-agnostic**: bring any driver by implementing [`Connector`]
//!
//! ## Query Builder (qb)
//!
//! ```ignore
//! use sessorm::{fields, qb, Statement};
//!
//! let q = qb::select("users AS u")
//!     .columns(&["id", "name"])
//!     .filter(fields! { "status" => "active", "age > ?" => 18 })
//!     .order_by(&["created_at DESC"])
//!     .limit(10)
//!     .build()?;
//!
//! let rows = session.query(&q.sql, &q.params).await?;
//! ```
//!
//! ## Sessions and records
//!
//! ```ignore
//! use sessorm::{values, Session};
//!
//! let session = Session::new(connector);
//! let users = session.dao::<User>();
//!
//! sessorm::transaction!(session, {
//!     let user = users.select_for_update(&values![1]).await?;
//!     users.update(&user, sessorm::fields! { "visits" => user.read().visits + 1 }).await?;
//!     Ok(())
//! })?;
//! ```

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```ignore
/// let params = sessorm::values![1, "two", None::<i64>];
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::Value::from($v)),+]
    };
}

/// Build an ordered `Vec<(String, Value)>` of field assignments or filters.
///
/// ```ignore
/// let filter = sessorm::fields! { "status" => "active", "!role" => "guest" };
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Value)>::new()
    };
    ($($k:expr => $v:expr),+ $(,)?) => {
        vec![$((::std::string::String::from($k), $crate::Value::from($v))),+]
    };
}

pub mod cache;
pub mod client;
pub mod config;
pub mod dao;
pub mod error;
pub mod ident;
pub mod qb;
pub mod row;
pub mod session;
pub mod transaction;
pub mod value;

pub use cache::{IdentityCache, build_key};
pub use client::{Connector, ExecResult, Executor, TxHandle};
pub use config::SessionConfig;
pub use dao::{Dao, Model, Record};
pub use error::{DriverError, OrmError, OrmResult};
pub use row::{FromRow, Row};
pub use session::{Session, SessionPool, TableMeta};
pub use value::{FromValue, Value};

// Re-export qb module for easy access
pub use qb::{
    BuiltQuery, Clause, ClauseInput, DeleteBuilder, InsertBuilder, JoinKind, Predicate,
    SelectBuilder, Statement, UpdateBuilder, clause, delete, insert, select, update,
};
