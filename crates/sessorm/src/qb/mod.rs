//! Statement builders for a MySQL-style dialect.
//!
//! Identifiers are quoted with backticks and every value is bound through a
//! positional `?` placeholder. Each builder runs a fixed, ordered pipeline of
//! fragment steps; `build()` joins the non-empty fragments with single spaces
//! and returns the parameters in placeholder order.
//!
//! # Usage
//!
//! ```ignore
//! use sessorm::qb::{self, Clause, Statement};
//! use sessorm::fields;
//!
//! let either = Clause::empty()
//!     .or(Clause::new(fields! { "aa" => 11, "bb" => "xswl" }))
//!     .or(Clause::new(fields! { "cc" => "234" }));
//!
//! let q = qb::select("tb")
//!     .columns(&["id", "name"])
//!     .filter(fields! { "foo" => "bar", "!faith" => "x" })
//!     .filter(either)
//!     .order_by(&["age DESC"])
//!     .limit(10)
//!     .build()?;
//! // q.sql: SELECT `tb`.`id`, `tb`.`name` FROM `tb` WHERE `foo`=? AND `faith`!=?
//! //        AND ((`aa`=? AND `bb`=?) OR `cc`=?) ORDER BY `age` DESC LIMIT ?
//! # Ok::<(), sessorm::OrmError>(())
//! ```

mod clause;
mod delete;
mod expr;
mod insert;
mod join;
mod select;
mod traits;
mod update;

pub use clause::{Clause, ClauseInput, clause, compile};
pub use delete::DeleteBuilder;
pub use expr::{Combinator, Expression, Payload, Predicate, PredicateEntry, count_placeholders};
pub use insert::InsertBuilder;
pub use join::{JoinKind, JoinRegistry, JoinSpec};
pub use select::SelectBuilder;
pub use traits::{BuiltQuery, Statement};
pub use update::UpdateBuilder;

/// Create a SELECT builder for the given table.
///
/// # Example
/// ```ignore
/// let q = sessorm::qb::select("users AS u").filter(sessorm::fields! { "id" => 1 });
/// ```
pub fn select(table: &str) -> SelectBuilder {
    SelectBuilder::new(table)
}

/// Create an INSERT builder for the given table.
pub fn insert(table: &str) -> InsertBuilder {
    InsertBuilder::new(table)
}

/// Create an UPDATE builder for the given table.
pub fn update(table: &str) -> UpdateBuilder {
    UpdateBuilder::new(table)
}

/// Create a DELETE builder for the given table.
///
/// Unlike UPDATE, no filter is required: an unfiltered DELETE removes every row.
pub fn delete(table: &str) -> DeleteBuilder {
    DeleteBuilder::new(table)
}
