//! Session: the unit of identity and transactional scope.
//!
//! A session owns at most one open transaction, an identity cache of loaded
//! records and a per-type table registry. Statements run on the open
//! transaction when there is one and on the connector otherwise. Locks are
//! never held across an `.await`: the dispatch target is snapshotted under the
//! read lock and the lock is released before any I/O.
//!
//! Sessions are recycled through a [`SessionPool`]; releasing a session rolls
//! back a forgotten transaction and clears its caches.

use crate::cache::IdentityCache;
use crate::client::{Connector, ExecResult, Executor};
use crate::config::SessionConfig;
use crate::error::{OrmError, OrmResult};
use crate::qb::Statement;
use crate::row::{FromRow, Row};
use crate::value::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Type-erased cached record.
pub(crate) type CachedRecord = Arc<dyn Any + Send + Sync>;

/// Table facts registered once per model type and session.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub table: &'static str,
    pub index_fields: &'static [&'static str],
    pub columns: &'static [&'static str],
}

/// A unit of work over one [`Connector`].
pub struct Session<C: Connector> {
    connector: Arc<C>,
    pub(crate) tx: RwLock<Option<Arc<C::Tx>>>,
    cache: IdentityCache<CachedRecord>,
    tables: RwLock<HashMap<TypeId, Arc<TableMeta>>>,
    deadline: Mutex<Option<Instant>>,
    config: SessionConfig,
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("in_transaction", &self.in_transaction())
            .field("cached", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Session<C> {
    /// Create a session with default configuration.
    pub fn new(connector: Arc<C>) -> Self {
        Self::with_config(connector, SessionConfig::default())
    }

    pub fn with_config(connector: Arc<C>, config: SessionConfig) -> Self {
        Self {
            connector,
            tx: RwLock::new(None),
            cache: IdentityCache::new(config.cache_capacity),
            tables: RwLock::new(HashMap::new()),
            deadline: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    pub(crate) fn cache(&self) -> &IdentityCache<CachedRecord> {
        &self.cache
    }

    /// Drop every cached record.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of records currently cached.
    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }

    // ==================== Deadline ====================

    /// Fail statements that have not completed by `deadline` with [`OrmError::Timeout`].
    pub fn set_deadline(&self, deadline: Instant) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = Some(deadline);
    }

    pub fn with_deadline(self, deadline: Instant) -> Self {
        self.set_deadline(deadline);
        self
    }

    /// Convenience for `set_deadline(Instant::now() + timeout)`.
    pub fn set_timeout(&self, timeout: Duration) {
        self.set_deadline(Instant::now() + timeout);
    }

    pub fn clear_deadline(&self) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = OrmResult<T>>) -> OrmResult<T> {
        match self.deadline() {
            Some(deadline) => {
                let budget = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout_at(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(OrmError::Timeout(budget)),
                }
            }
            None => fut.await,
        }
    }

    // ==================== Table registry ====================

    /// Registered table facts for `T`, created on first use.
    pub(crate) fn table_meta<T: 'static>(&self, make: impl FnOnce() -> TableMeta) -> Arc<TableMeta> {
        let id = TypeId::of::<T>();
        {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(meta) = tables.get(&id) {
                return Arc::clone(meta);
            }
        }
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(tables.entry(id).or_insert_with(|| Arc::new(make())))
    }

    // ==================== Execution ====================

    pub(crate) fn current_tx(&self) -> Option<Arc<C::Tx>> {
        self.tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run a query on the open transaction, or on the connector when idle.
    pub async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let tx = self.current_tx();
        let started = Instant::now();
        let result = self
            .bounded(async {
                match &tx {
                    Some(tx) => tx.query(sql, params).await,
                    None => self.connector.query(sql, params).await,
                }
            })
            .await;
        self.observe("query", sql, params.len(), tx.is_some(), started.elapsed(), &result);
        result
    }

    /// Run a statement on the open transaction, or on the connector when idle.
    pub async fn exec(&self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        let tx = self.current_tx();
        let started = Instant::now();
        let result = self
            .bounded(async {
                match &tx {
                    Some(tx) => tx.exec(sql, params).await,
                    None => self.connector.exec(sql, params).await,
                }
            })
            .await;
        self.observe("exec", sql, params.len(), tx.is_some(), started.elapsed(), &result);
        result
    }

    /// Build `stmt`, run it and map every row to `T`.
    pub async fn fetch<T: FromRow>(&self, stmt: &impl Statement) -> OrmResult<Vec<T>> {
        let built = stmt.build()?;
        let rows = self.query(&built.sql, &built.params).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Build `stmt` and execute it.
    pub async fn execute(&self, stmt: &impl Statement) -> OrmResult<ExecResult> {
        let built = stmt.build()?;
        self.exec(&built.sql, &built.params).await
    }

    fn observe<T>(
        &self,
        kind: &'static str,
        sql: &str,
        params: usize,
        in_transaction: bool,
        elapsed: Duration,
        result: &OrmResult<T>,
    ) {
        if self.config.log_statements {
            tracing::debug!(
                target: "sessorm::sql",
                kind,
                sql,
                params,
                in_transaction,
                elapsed_us = elapsed.as_micros() as u64,
                ok = result.is_ok(),
                "statement"
            );
        }
        if let Some(threshold) = self.config.slow_statement_threshold
            && elapsed > threshold
        {
            tracing::warn!(
                target: "sessorm::sql",
                kind,
                sql,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                "slow statement"
            );
        }
    }

    // ==================== Lifecycle ====================

    /// Roll back an open transaction and drop all per-session state.
    pub async fn reset(&self) {
        if self.in_transaction() {
            tracing::warn!("session reset with an open transaction; rolling back");
            // Failure is already logged by rollback_transaction.
            let _ = self.rollback_transaction().await;
        }
        self.cache.clear();
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.clear_deadline();
    }
}

/// Recycles sessions over one connector.
pub struct SessionPool<C: Connector> {
    connector: Arc<C>,
    config: SessionConfig,
    idle: Mutex<Vec<Session<C>>>,
}

impl<C: Connector> SessionPool<C> {
    pub fn new(connector: Arc<C>) -> Self {
        Self::with_config(connector, SessionConfig::default())
    }

    pub fn with_config(connector: Arc<C>, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take an idle session or create a fresh one.
    pub fn acquire(&self) -> Session<C> {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        recycled.unwrap_or_else(|| {
            Session::with_config(Arc::clone(&self.connector), self.config.clone())
        })
    }

    /// Reset `session` and keep it for reuse.
    pub async fn release(&self, session: Session<C>) {
        session.reset().await;
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.config.max_idle_sessions {
            idle.push(session);
        }
    }

    pub fn idle_sessions(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
