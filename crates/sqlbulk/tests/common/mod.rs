//! Recording connection shared by the integration tests.

#![allow(dead_code)]

pub mod sqlite;

use asupersync::runtime::RuntimeBuilder;
use sqlbulk::{Connection, Cx, Dialect, Error, Outcome, Row, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    statements: Vec<(String, Vec<Value>)>,
    rows: Vec<Row>,
    counts: VecDeque<u64>,
}

/// Returns scripted rows for every query and scripted affected-row counts
/// for every statement, recording everything it is asked to run.
#[derive(Debug, Clone)]
pub struct RecordingConnection {
    state: Arc<Mutex<State>>,
    dialect: Dialect,
}

impl RecordingConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            dialect,
        }
    }

    /// Rows returned by the matching-id select.
    pub fn matching(self, rows: Vec<Row>) -> Self {
        self.state.lock().expect("lock poisoned").rows = rows;
        self
    }

    /// Affected-row counts, one per executed statement. Once exhausted,
    /// statements report zero rows.
    pub fn counts(self, counts: &[u64]) -> Self {
        self.state.lock().expect("lock poisoned").counts = counts.iter().copied().collect();
        self
    }

    /// Every statement issued, queries included, in order.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().expect("lock poisoned").statements.clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }
}

impl Connection for RecordingConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[allow(clippy::manual_async_fn)]
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let state = Arc::clone(&self.state);
        let entry = (sql.to_string(), params.to_vec());
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.statements.push(entry);
            Outcome::Ok(guard.rows.clone())
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let state = Arc::clone(&self.state);
        let entry = (sql.to_string(), params.to_vec());
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.statements.push(entry);
            Outcome::Ok(guard.counts.pop_front().unwrap_or(0))
        }
    }
}

pub fn rows(columns: &[&str], values: Vec<Vec<Value>>) -> Vec<Row> {
    let names: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
    values
        .into_iter()
        .map(|vals| Row::new(names.clone(), vals))
        .collect()
}

pub fn ids(ids: &[i64]) -> Vec<Row> {
    rows(&["id"], ids.iter().map(|id| vec![Value::BigInt(*id)]).collect())
}

pub fn block_on<F: Future>(future: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(future)
}

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}
