//! Identity-mapped data access for one model type.
//!
//! Every row a [`Dao`] materializes goes through the session's identity cache,
//! so loading the same logical row twice yields the same [`Record`]. A fresh
//! load overwrites the cached record in place: every holder observes the new
//! data.
//!
//! # Example
//!
//! ```ignore
//! use sessorm::{fields, values, Model};
//!
//! let users = session.dao::<User>();
//! let a = users.select(&values![7]).await?;
//! let b = users.select(&values![7]).await?;
//! assert!(a.ptr_eq(&b));
//!
//! users.update(&a, fields! { "name" => "bob" }).await?;
//! assert_eq!(b.read().name, "bob");
//! ```

use crate::cache::build_key;
use crate::client::{Connector, ExecResult};
use crate::error::{OrmError, OrmResult};
use crate::ident::quote_identifier;
use crate::qb::{BuiltQuery, ClauseInput, DeleteBuilder, InsertBuilder, SelectBuilder, Statement, UpdateBuilder};
use crate::row::{FromRow, Row};
use crate::session::{CachedRecord, Session, TableMeta};
use crate::value::Value;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A table-backed type managed by a [`Dao`].
pub trait Model: FromRow + Send + Sync + 'static {
    /// Table name, optionally aliased (`"users AS u"`).
    const TABLE: &'static str;
    /// Columns that identify a row, in key order.
    const INDEX_FIELDS: &'static [&'static str];
    /// Columns selected on load. Empty selects `*`.
    const COLUMNS: &'static [&'static str] = &[];

    /// Values of [`INDEX_FIELDS`](Self::INDEX_FIELDS), in the same order.
    fn index_values(&self) -> Vec<Value>;

    /// Apply columns that were just written to the row.
    fn merge_row(&mut self, row: &Row) -> OrmResult<()>;
}

/// Shared handle to one identity-mapped row.
pub struct Record<M>(Arc<RwLock<M>>);

impl<M> Clone for Record<M> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Record").field(&*self.read()).finish()
    }
}

impl<M> Record<M> {
    fn new(model: M) -> Self {
        Self(Arc::new(RwLock::new(model)))
    }

    /// Shared access. Do not hold the guard across an `.await`.
    pub fn read(&self) -> RwLockReadGuard<'_, M> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access. Do not hold the guard across an `.await`.
    pub fn write(&self) -> RwLockWriteGuard<'_, M> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<M: Clone> Record<M> {
    /// Clone the current payload.
    pub fn snapshot(&self) -> M {
        self.read().clone()
    }
}

impl<C: Connector> Session<C> {
    /// Data access object for `M`, bound to this session.
    pub fn dao<M: Model>(&self) -> Dao<'_, C, M> {
        let meta = self.table_meta::<M>(|| TableMeta {
            table: M::TABLE,
            index_fields: M::INDEX_FIELDS,
            columns: M::COLUMNS,
        });
        Dao {
            session: self,
            meta,
            _model: PhantomData,
        }
    }
}

/// Data access object for model `M` within one session.
pub struct Dao<'s, C: Connector, M: Model> {
    session: &'s Session<C>,
    meta: Arc<TableMeta>,
    _model: PhantomData<fn() -> M>,
}

impl<'s, C: Connector, M: Model> Dao<'s, C, M> {
    pub fn session(&self) -> &'s Session<C> {
        self.session
    }

    pub fn table(&self) -> &'static str {
        self.meta.table
    }

    // ==================== Identity cache ====================

    fn cache_key(&self, index: &[Value]) -> OrmResult<String> {
        build_key(self.meta.table, index)
    }

    fn cached(&self, key: &str) -> Option<Record<M>> {
        let entry = self.session.cache().get(key)?;
        entry.downcast_ref::<Record<M>>().cloned()
    }

    fn save(&self, key: String, record: &Record<M>) {
        let entry: CachedRecord = Arc::new(record.clone());
        self.session.cache().put(key, entry);
    }

    /// Look up a cached record without touching the database.
    pub fn query_cache(&self, index: &[Value]) -> OrmResult<Record<M>> {
        let key = self.cache_key(index)?;
        self.cached(&key)
            .ok_or_else(|| OrmError::not_found(format!("{} not cached", self.meta.table)))
    }

    /// Map `model` onto its identity: an existing record is overwritten in place.
    ///
    /// The lookup and the insert are one cache operation, so concurrent loads
    /// of the same row settle on a single record.
    fn intern(&self, model: M) -> OrmResult<Record<M>> {
        let key = self.cache_key(&model.index_values())?;
        let fresh = Record::new(model);
        let entry = self.session.cache().get_or_insert_with(key.clone(), || {
            let entry: CachedRecord = Arc::new(fresh.clone());
            entry
        });
        match entry.downcast_ref::<Record<M>>() {
            Some(existing) if existing.ptr_eq(&fresh) => Ok(fresh),
            Some(existing) => {
                // `fresh` was never published; move its payload into the cached record.
                std::mem::swap(&mut *existing.write(), &mut *fresh.write());
                Ok(existing.clone())
            }
            None => {
                // another model type registered the same table name
                self.save(key, &fresh);
                Ok(fresh)
            }
        }
    }

    fn intern_rows(&self, rows: &[Row]) -> OrmResult<Vec<Record<M>>> {
        rows.iter()
            .map(|row| M::from_row(row).and_then(|m| self.intern(m)))
            .collect()
    }

    // ==================== Statement helpers ====================

    fn index_filter(&self, index: &[Value]) -> OrmResult<Vec<(String, Value)>> {
        if index.len() != self.meta.index_fields.len() {
            return Err(OrmError::validation(format!(
                "{} expects {} index value(s), got {}",
                self.meta.table,
                self.meta.index_fields.len(),
                index.len()
            )));
        }
        Ok(self
            .meta
            .index_fields
            .iter()
            .map(|f| f.to_string())
            .zip(index.iter().cloned())
            .collect())
    }

    fn select_builder(&self) -> SelectBuilder {
        SelectBuilder::new(self.meta.table).columns(self.meta.columns)
    }

    fn not_found(&self) -> OrmError {
        OrmError::not_found(format!("{} record", self.meta.table))
    }

    async fn fetch_rows(&self, stmt: &impl Statement) -> OrmResult<Vec<Row>> {
        let BuiltQuery { sql, params } = stmt.build()?;
        self.session.query(&sql, &params).await
    }

    // ==================== Reads ====================

    /// Record for `index`, served from the identity cache when possible.
    pub async fn select(&self, index: &[Value]) -> OrmResult<Record<M>> {
        let key = self.cache_key(index)?;
        if let Some(record) = self.cached(&key) {
            return Ok(record);
        }
        self.load(index).await
    }

    /// Always read `index` from the database and refresh the cached record.
    pub async fn load(&self, index: &[Value]) -> OrmResult<Record<M>> {
        self.cache_key(index)?;
        let stmt = self.select_builder().filter(self.index_filter(index)?);
        let rows = self.fetch_rows(&stmt).await?;
        let row = rows.first().ok_or_else(|| self.not_found())?;
        self.intern(M::from_row(row)?)
    }

    /// Read `index` with `FOR UPDATE`. Requires an open transaction.
    pub async fn select_for_update(&self, index: &[Value]) -> OrmResult<Record<M>> {
        if !self.session.in_transaction() {
            return Err(OrmError::Transaction(format!(
                "select for update on {} outside a transaction",
                self.meta.table
            )));
        }
        let stmt = self
            .select_builder()
            .filter(self.index_filter(index)?)
            .tail("FOR UPDATE");
        let rows = self.fetch_rows(&stmt).await?;
        let row = rows.first().ok_or_else(|| self.not_found())?;
        self.intern(M::from_row(row)?)
    }

    /// First record matching `filter`.
    pub async fn select_one(&self, filter: impl Into<ClauseInput>) -> OrmResult<Record<M>> {
        let stmt = self.select_builder().filter(filter).limit(1);
        let rows = self.fetch_rows(&stmt).await?;
        let row = rows.first().ok_or_else(|| self.not_found())?;
        self.intern(M::from_row(row)?)
    }

    /// Every record matching `filter`.
    pub async fn select_multi(&self, filter: impl Into<ClauseInput>) -> OrmResult<Vec<Record<M>>> {
        let stmt = self.select_builder().filter(filter);
        let rows = self.fetch_rows(&stmt).await?;
        self.intern_rows(&rows)
    }

    /// First record produced by hand-written SQL.
    pub async fn select_one_with_sql(&self, sql: &str, params: &[Value]) -> OrmResult<Record<M>> {
        let rows = self.session.query(sql, params).await?;
        let row = rows.first().ok_or_else(|| self.not_found())?;
        self.intern(M::from_row(row)?)
    }

    /// Every record produced by hand-written SQL.
    pub async fn select_multi_with_sql(
        &self,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<Vec<Record<M>>> {
        let rows = self.session.query(sql, params).await?;
        self.intern_rows(&rows)
    }

    /// `COUNT(column)` over rows matching `filter`.
    pub async fn count(&self, column: &str, filter: impl Into<ClauseInput>) -> OrmResult<i64> {
        let expr = format!("COUNT({})", quote_identifier(column));
        self.aggregate(&expr, "c", filter)
            .await
            .map(|v| v.unwrap_or(0))
    }

    /// `SUM(column)` over rows matching `filter`; no rows sum to `0`.
    pub async fn sum(&self, column: &str, filter: impl Into<ClauseInput>) -> OrmResult<i64> {
        let expr = format!("SUM({})", quote_identifier(column));
        self.aggregate(&expr, "s", filter)
            .await
            .map(|v| v.unwrap_or(0))
    }

    async fn aggregate(
        &self,
        expr: &str,
        alias: &str,
        filter: impl Into<ClauseInput>,
    ) -> OrmResult<Option<i64>> {
        let stmt = SelectBuilder::new(self.meta.table)
            .computed_column(expr, alias)
            .filter(filter);
        let rows = self.fetch_rows(&stmt).await?;
        let row = rows.first().ok_or_else(|| self.not_found())?;
        row.get::<Option<i64>>(alias)
    }

    // ==================== Writes ====================

    /// Insert one row and return its record.
    ///
    /// Runs inside [`Session::run_in_transaction`]. The identity comes from
    /// `index` when given, from `data` when it holds every index column, and
    /// otherwise from the driver's last insert id (single-column keys only).
    pub async fn insert(
        &self,
        data: Vec<(String, Value)>,
        index: &[Value],
    ) -> OrmResult<Record<M>> {
        let mut fields = data;
        if !index.is_empty() {
            for (field, value) in self.index_filter(index)? {
                match fields.iter_mut().find(|(k, _)| *k == field) {
                    Some(slot) => slot.1 = value,
                    None => fields.push((field, value)),
                }
            }
        }
        let stmt = InsertBuilder::new(self.meta.table).add_row(fields.clone());
        let BuiltQuery { sql, params } = stmt.build()?;

        self.session
            .run_in_transaction(move || async move {
                let result = self.session.exec(&sql, &params).await?;
                if result.rows_affected != 1 {
                    return Err(OrmError::Other(format!(
                        "insert into {} affected {} rows",
                        self.meta.table, result.rows_affected
                    )));
                }
                if let [field] = self.meta.index_fields
                    && !fields.iter().any(|(k, _)| k == field)
                {
                    let id = result.last_insert_id.ok_or_else(|| {
                        OrmError::Other(format!(
                            "insert into {} returned no id for `{field}`",
                            self.meta.table
                        ))
                    })?;
                    fields.push((field.to_string(), Value::UInt(id)));
                }
                let model = M::from_row(&Row::from_fields(fields))?;
                self.intern(model)
            })
            .await
    }

    /// Write `set` to the record's row; on a single-row hit the record and cache are refreshed.
    ///
    /// Returns the number of affected rows.
    pub async fn update(&self, record: &Record<M>, set: Vec<(String, Value)>) -> OrmResult<u64> {
        let index = record.read().index_values();
        let stmt = UpdateBuilder::new(self.meta.table)
            .set_all(set.clone())
            .filter(self.index_filter(&index)?);
        let result = self.execute(&stmt).await?;
        if result.rows_affected == 1 {
            let written = Row::from_fields(set.into_iter().filter(|(k, _)| !k.contains('?')));
            record.write().merge_row(&written)?;
            let key = self.cache_key(&record.read().index_values())?;
            self.save(key, record);
        }
        Ok(result.rows_affected)
    }

    /// Delete the record's row and evict it from the cache.
    pub async fn remove(&self, record: &Record<M>) -> OrmResult<()> {
        let index = record.read().index_values();
        let stmt = DeleteBuilder::new(self.meta.table).filter(self.index_filter(&index)?);
        let result = self.execute(&stmt).await?;
        if result.rows_affected == 0 {
            return Err(self.not_found());
        }
        self.session.cache().remove(&self.cache_key(&index)?);
        Ok(())
    }

    // ==================== Raw SQL ====================

    async fn execute(&self, stmt: &impl Statement) -> OrmResult<ExecResult> {
        self.session.execute(stmt).await
    }

    pub async fn exec_sql(&self, sql: &str, params: &[Value]) -> OrmResult<ExecResult> {
        self.session.exec(sql, params).await
    }

    pub async fn query_sql(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.session.query(sql, params).await
    }
}
