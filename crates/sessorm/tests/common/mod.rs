//! In-memory connector that records statements and replays scripted results.

#![allow(dead_code)]

use sessorm::{
    Connector, ExecResult, Executor, FromRow, Model, OrmError, OrmResult, Row, TxHandle, Value,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Logged {
    pub sql: String,
    pub params: Vec<Value>,
    pub in_tx: bool,
}

#[derive(Default)]
struct State {
    log: Vec<Logged>,
    rows: VecDeque<Vec<Row>>,
    execs: VecDeque<ExecResult>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
    fail_begin: bool,
    fail_exec: bool,
    fail_commit: bool,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<State>>,
}

pub struct FakeTx {
    state: Arc<Mutex<State>>,
}

impl FakeDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.with_state(|s| s.rows.push_back(rows));
    }

    /// Queue the result of the next exec.
    pub fn push_exec(&self, rows_affected: u64, last_insert_id: Option<u64>) {
        self.with_state(|s| {
            s.execs.push_back(ExecResult {
                rows_affected,
                last_insert_id,
            })
        });
    }

    pub fn fail_begin(&self) {
        self.with_state(|s| s.fail_begin = true);
    }

    pub fn fail_exec(&self) {
        self.with_state(|s| s.fail_exec = true);
    }

    /// Make every commit fail after it is counted.
    pub fn fail_commit(&self) {
        self.with_state(|s| s.fail_commit = true);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.with_state(|s| s.delay = Some(delay));
    }

    pub fn log(&self) -> Vec<Logged> {
        self.with_state(|s| s.log.clone())
    }

    pub fn statements(&self) -> Vec<String> {
        self.with_state(|s| s.log.iter().map(|l| l.sql.clone()).collect())
    }

    pub fn begins(&self) -> usize {
        self.with_state(|s| s.begins)
    }

    pub fn commits(&self) -> usize {
        self.with_state(|s| s.commits)
    }

    pub fn rollbacks(&self) -> usize {
        self.with_state(|s| s.rollbacks)
    }
}

fn run_query(
    state: Arc<Mutex<State>>,
    sql: &str,
    params: &[Value],
    in_tx: bool,
) -> impl Future<Output = OrmResult<Vec<Row>>> + Send + 'static {
    let entry = Logged {
        sql: sql.to_string(),
        params: params.to_vec(),
        in_tx,
    };
    async move {
        let delay = {
            let mut s = state.lock().unwrap();
            s.log.push(entry);
            s.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(state.lock().unwrap().rows.pop_front().unwrap_or_default())
    }
}

fn run_exec(
    state: Arc<Mutex<State>>,
    sql: &str,
    params: &[Value],
    in_tx: bool,
) -> impl Future<Output = OrmResult<ExecResult>> + Send + 'static {
    let entry = Logged {
        sql: sql.to_string(),
        params: params.to_vec(),
        in_tx,
    };
    async move {
        let mut s = state.lock().unwrap();
        s.log.push(entry);
        if s.fail_exec {
            return Err(OrmError::driver(std::io::Error::other("exec failed")));
        }
        Ok(s.execs.pop_front().unwrap_or(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        }))
    }
}

impl Executor for FakeDb {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        run_query(Arc::clone(&self.state), sql, params, false)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<ExecResult>> + Send {
        run_exec(Arc::clone(&self.state), sql, params, false)
    }
}

impl Connector for FakeDb {
    type Tx = FakeTx;

    fn begin(&self) -> impl Future<Output = OrmResult<FakeTx>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let mut s = state.lock().unwrap();
            if s.fail_begin {
                return Err(OrmError::driver(std::io::Error::other("begin failed")));
            }
            s.begins += 1;
            drop(s);
            Ok(FakeTx { state })
        }
    }
}

impl Executor for FakeTx {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        run_query(Arc::clone(&self.state), sql, params, true)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<ExecResult>> + Send {
        run_exec(Arc::clone(&self.state), sql, params, true)
    }
}

impl TxHandle for FakeTx {
    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let mut s = state.lock().unwrap();
            s.commits += 1;
            if s.fail_commit {
                return Err(OrmError::driver(std::io::Error::other("commit failed")));
            }
            Ok(())
        }
    }

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            state.lock().unwrap().rollbacks += 1;
            Ok(())
        }
    }
}

// ── Model ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub visits: i64,
}

impl FromRow for User {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            visits: row.try_get("visits")?.unwrap_or(0),
        })
    }
}

impl Model for User {
    const TABLE: &'static str = "users";
    const INDEX_FIELDS: &'static [&'static str] = &["id"];
    const COLUMNS: &'static [&'static str] = &["id", "name", "visits"];

    fn index_values(&self) -> Vec<Value> {
        vec![Value::Int(self.id)]
    }

    fn merge_row(&mut self, row: &Row) -> OrmResult<()> {
        if let Some(name) = row.try_get("name")? {
            self.name = name;
        }
        if let Some(visits) = row.try_get("visits")? {
            self.visits = visits;
        }
        Ok(())
    }
}

pub fn user_row(id: i64, name: &str, visits: i64) -> Row {
    Row::from_fields(sessorm::fields! { "id" => id, "name" => name, "visits" => visits })
}
