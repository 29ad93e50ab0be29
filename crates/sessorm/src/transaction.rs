//! Transaction coordination on a [`Session`].
//!
//! A session is either idle or inside exactly one transaction. Nested
//! [`Session::run_in_transaction`] calls flatten into the outermost one: only
//! the call that opened the transaction commits or rolls it back.
//!
//! # Example
//!
//! ```ignore
//! use sessorm::{OrmResult, Session};
//!
//! # async fn demo<C: sessorm::Connector>(session: &Session<C>) -> OrmResult<()> {
//! sessorm::transaction!(session, {
//!     session.exec("UPDATE `accounts` SET `balance`=`balance`-? WHERE `id`=?", &sessorm::values![100, 1]).await?;
//!     session.exec("UPDATE `accounts` SET `balance`=`balance`+? WHERE `id`=?", &sessorm::values![100, 2]).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::client::{Connector, TxHandle};
use crate::error::OrmResult;
use crate::session::Session;
use std::future::Future;
use std::sync::{Arc, PoisonError};

/// Runs the given block inside a session transaction.
///
/// - Begins a transaction unless one is already open (then the block joins it).
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the block's error.
///
/// The block must evaluate to `sessorm::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($session:expr, $body:block) => {
        ($session).run_in_transaction(|| async { $body }).await
    };
}

impl<C: Connector> Session<C> {
    pub fn in_transaction(&self) -> bool {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Open a transaction. Calling this while one is open logs a warning and does nothing.
    pub async fn begin_transaction(&self) -> OrmResult<()> {
        self.open_transaction().await.map(|_| ())
    }

    /// Returns `true` when this call opened the transaction.
    async fn open_transaction(&self) -> OrmResult<bool> {
        if self.in_transaction() {
            tracing::warn!("begin_transaction: a transaction is already open; ignored");
            return Ok(false);
        }

        let tx = match self.connector().begin().await {
            Ok(tx) => Arc::new(tx),
            Err(e) => {
                tracing::error!(error = %e, "begin_transaction failed");
                return Err(e);
            }
        };

        let surplus = {
            let mut slot = self.tx.write().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                Some(tx)
            } else {
                *slot = Some(tx);
                None
            }
        };

        match surplus {
            None => Ok(true),
            Some(tx) => {
                tracing::warn!("begin_transaction: lost a concurrent begin; rolling back the extra transaction");
                if let Err(e) = tx.rollback().await {
                    tracing::error!(error = %e, "rollback of extra transaction failed");
                }
                Ok(false)
            }
        }
    }

    fn take_tx(&self) -> Option<Arc<C::Tx>> {
        self.tx
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Commit the open transaction. No-op when idle.
    pub async fn commit_transaction(&self) -> OrmResult<()> {
        let Some(tx) = self.take_tx() else {
            return Ok(());
        };
        tx.commit().await.inspect_err(|e| {
            tracing::error!(error = %e, "commit_transaction failed");
        })
    }

    /// Roll back the open transaction. No-op when idle.
    pub async fn rollback_transaction(&self) -> OrmResult<()> {
        let Some(tx) = self.take_tx() else {
            return Ok(());
        };
        tx.rollback().await.inspect_err(|e| {
            tracing::error!(error = %e, "rollback_transaction failed");
        })
    }

    /// Run `f` atomically.
    ///
    /// Inside an open transaction `f` simply runs as part of it. Otherwise a
    /// transaction is opened, committed when `f` succeeds (a failed commit is
    /// the result) and rolled back when `f` fails (`f`'s error is the result).
    pub async fn run_in_transaction<T, F, Fut>(&self, f: F) -> OrmResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        if self.in_transaction() {
            return f().await;
        }
        let owned = self.open_transaction().await?;
        let result = f().await;
        if !owned {
            return result;
        }
        match result {
            Ok(value) => {
                self.commit_transaction().await?;
                Ok(value)
            }
            Err(error) => {
                // A rollback failure is logged; the caller sees the closure's error.
                let _ = self.rollback_transaction().await;
                Err(error)
            }
        }
    }
}
