//! Scripted connection for handler tests.

use asupersync::runtime::RuntimeBuilder;
use asupersync::{Cx, Outcome};
use sqlbulk_core::{Connection, Dialect, Error, Row, Value};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub queries: Vec<(String, Vec<Value>)>,
    pub executed: Vec<(String, Vec<Value>)>,
    pub rows: Vec<Row>,
    /// Affected-row counts handed out in order. Once exhausted, a statement
    /// reports as many rows as it binds.
    pub counts: VecDeque<u64>,
    pub fail_execute_at: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
    dialect: Dialect,
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            dialect,
        }
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.state.lock().expect("lock poisoned").rows = rows;
        self
    }

    pub fn with_counts(self, counts: &[u64]) -> Self {
        self.state.lock().expect("lock poisoned").counts = counts.iter().copied().collect();
        self
    }

    pub fn failing_execute_at(self, index: usize) -> Self {
        self.state.lock().expect("lock poisoned").fail_execute_at = Some(index);
        self
    }

    pub fn executed_sql(&self) -> Vec<String> {
        let guard = self.state.lock().expect("lock poisoned");
        guard.executed.iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().expect("lock poisoned").executed.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").queries.len()
    }
}

impl Connection for MockConnection {
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
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            guard.queries.push((sql, params));
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
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut guard = state.lock().expect("lock poisoned");
            let index = guard.executed.len();
            let bound = params.len() as u64;
            guard.executed.push((sql, params));
            if guard.fail_execute_at == Some(index) {
                return Outcome::Err(Error::Custom("scripted failure".to_string()));
            }
            Outcome::Ok(guard.counts.pop_front().unwrap_or(bound))
        }
    }
}

pub(crate) fn id_rows(ids: &[i64]) -> Vec<Row> {
    ids.iter()
        .map(|id| Row::new(vec!["id".to_string()], vec![Value::BigInt(*id)]))
        .collect()
}

pub(crate) fn run<F: Future>(future: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(future)
}

pub(crate) fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}
