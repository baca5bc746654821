//! Statement execution shared by the handlers.

use asupersync::{Cx, Outcome};
use sqlbulk_core::{ConfigError, Connection, Dialect, Error, Value};
use sqlbulk_query::CompiledStatement;

/// Fail when a handler compiled for one dialect runs on a connection of another.
#[allow(clippy::result_large_err)]
pub(crate) fn ensure_dialect<C: Connection>(compiled_for: Dialect, conn: &C) -> Result<(), Error> {
    let actual = conn.dialect();
    if actual == compiled_for {
        Ok(())
    } else {
        Err(Error::Config(ConfigError {
            message: format!(
                "handler was compiled for {:?} but the connection speaks {:?}",
                compiled_for, actual
            ),
            source: None,
        }))
    }
}

/// Bind and execute one DML statement, returning the affected row count.
pub(crate) async fn execute_compiled<C: Connection>(
    cx: &Cx,
    conn: &C,
    statement: &CompiledStatement,
    params: &[Value],
) -> Outcome<u64, Error> {
    let bound = match statement.bind(params) {
        Ok(bound) => bound,
        Err(e) => return Outcome::Err(e),
    };
    tracing::trace!(sql = %statement.sql, params = bound.len(), "Executing statement");
    conn.execute(cx, &statement.sql, &bound).await
}
