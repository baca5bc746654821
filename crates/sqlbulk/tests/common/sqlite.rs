//! In-memory SQLite connection with foreign keys enforced.

use sqlbulk::{Connection, Cx, Dialect, Error, Outcome, QueryError, QueryErrorKind, Row, Value};
use std::future::Future;
use std::sync::Mutex;

use rusqlite::types::{Value as SqliteValue, ValueRef};

pub struct SqliteConnection {
    inner: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open a fresh database and run `schema` against it.
    pub fn open_memory(schema: &str) -> Self {
        let conn = rusqlite::Connection::open_in_memory().expect("open sqlite memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("enable foreign keys");
        conn.execute_batch(schema).expect("create schema");
        Self {
            inner: Mutex::new(conn),
        }
    }

    /// Run a query outside the handlers, for setup and assertions.
    pub fn rows(&self, sql: &str) -> Vec<Vec<Value>> {
        match self.run_query(sql, &[]) {
            Ok(rows) => rows
                .iter()
                .map(|row| row.values().cloned().collect())
                .collect(),
            Err(e) => panic!("query failed: {e}"),
        }
    }

    /// Run a statement outside the handlers.
    pub fn exec(&self, sql: &str) -> Result<u64, Error> {
        self.run_execute(sql, &[])
    }

    fn run_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let conn = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(sql).map_err(|e| query_error(sql, &e))?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| (*n).to_string()).collect();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| query_error(sql, &e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| query_error(sql, &e))? {
            let mut values = Vec::with_capacity(names.len());
            for i in 0..names.len() {
                let value = row.get_ref(i).map_err(|e| query_error(sql, &e))?;
                values.push(from_sqlite(value));
            }
            out.push(Row::new(names.clone(), values));
        }
        Ok(out)
    }

    fn run_execute(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let conn = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let changed = conn
            .execute(sql, rusqlite::params_from_iter(params.iter().map(to_sqlite)))
            .map_err(|e| query_error(sql, &e))?;
        Ok(changed as u64)
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    #[allow(clippy::manual_async_fn)]
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.run_query(sql, params);
        async move {
            match result {
                Ok(rows) => Outcome::Ok(rows),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.run_execute(sql, params);
        async move {
            match result {
                Ok(n) => Outcome::Ok(n),
                Err(e) => Outcome::Err(e),
            }
        }
    }
}

fn query_error(sql: &str, err: &rusqlite::Error) -> Error {
    let kind = match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => QueryErrorKind::Constraint,
        _ => QueryErrorKind::Database,
    };
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        sqlstate: None,
        message: err.to_string(),
        source: None,
    })
}

fn to_sqlite(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(n) | Value::Date(n) => SqliteValue::Integer(i64::from(*n)),
        Value::BigInt(n) | Value::Timestamp(n) => SqliteValue::Integer(*n),
        Value::Double(f) => SqliteValue::Real(*f),
        Value::Decimal(s) | Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
        Value::Uuid(u) => SqliteValue::Blob(u.to_vec()),
        Value::Json(j) => SqliteValue::Text(j.to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::BigInt(n),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}
