//! Database connection trait.
//!
//! The bulk mutation executor never opens connections of its own. Drivers
//! (or a transaction wrapper) implement [`Connection`] and the executor
//! issues every statement through it, so failures and cancellation surface
//! at the caller's transaction boundary untouched.
//!
//! All operations integrate with asupersync's structured concurrency via
//! `Cx` context for cancellation and timeout handling.

use crate::dialect::Dialect;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;

/// A database connection capable of executing queries.
///
/// # Example
///
/// ```rust,ignore
/// let sql = "SELECT \"id\" FROM \"person\" WHERE \"age\" > $1";
/// let rows = conn.query(&cx, sql, &[Value::Int(18)]).await;
///
/// let sql = "DELETE FROM \"person\" WHERE \"id\" IN ($1)";
/// let deleted = conn.execute(&cx, sql, &[Value::BigInt(7)]).await;
/// ```
pub trait Connection: Send + Sync {
    /// The SQL dialect statements must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;
}

impl<C: Connection> Connection for &C {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send {
        (**self).query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send {
        (**self).execute(cx, sql, params)
    }
}
