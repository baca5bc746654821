//! Handler cache and entry point for bulk mutations.

use crate::config::MutationConfig;
use crate::delete::DeleteHandler;
use crate::statement::{BulkDelete, BulkUpdate};
use crate::update::UpdateHandler;
use asupersync::{Cx, Outcome};
use sqlbulk_core::{Connection, Dialect, Error, Result, Value};
use sqlbulk_query::{StatementCache, cache_key};
use std::sync::{Arc, Mutex};

/// Builds bulk mutation handlers and caches them by statement name.
///
/// Handlers are immutable once built, so one executor can be shared across
/// tasks; each execution only borrows the handler.
#[derive(Debug)]
pub struct MutationExecutor {
    dialect: Dialect,
    config: MutationConfig,
    deletes: Mutex<StatementCache<Arc<DeleteHandler>>>,
    updates: Mutex<StatementCache<Arc<UpdateHandler>>>,
}

impl MutationExecutor {
    /// Create an executor rendering statements for `dialect`.
    pub fn new(dialect: Dialect, config: MutationConfig) -> Self {
        let size = config.handler_cache_size.max(1);
        Self {
            dialect,
            config,
            deletes: Mutex::new(StatementCache::new(size)),
            updates: Mutex::new(StatementCache::new(size)),
        }
    }

    /// The dialect handlers are compiled for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The configuration handlers are compiled with.
    pub fn config(&self) -> &MutationConfig {
        &self.config
    }

    /// The delete handler registered under `name`, compiling it on first use.
    ///
    /// Later calls with the same name return the cached handler and ignore
    /// `statement`.
    #[allow(clippy::result_large_err)]
    pub fn delete_handler(&self, name: &str, statement: &BulkDelete) -> Result<Arc<DeleteHandler>> {
        let key = cache_key(&name);
        {
            let mut cache = self.deletes.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(handler) = cache.get(key) {
                tracing::trace!(name, "Delete handler cache hit");
                return Ok(Arc::clone(handler));
            }
        }

        let handler = Arc::new(DeleteHandler::new(statement, self.dialect, &self.config)?);
        let mut cache = self.deletes.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.get_or_insert(key, || handler)))
    }

    /// The update handler registered under `name`, compiling it on first use.
    #[allow(clippy::result_large_err)]
    pub fn update_handler(&self, name: &str, statement: &BulkUpdate) -> Result<Arc<UpdateHandler>> {
        let key = cache_key(&name);
        {
            let mut cache = self.updates.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(handler) = cache.get(key) {
                tracing::trace!(name, "Update handler cache hit");
                return Ok(Arc::clone(handler));
            }
        }

        let handler = Arc::new(UpdateHandler::new(statement, self.dialect, &self.config)?);
        let mut cache = self.updates.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.get_or_insert(key, || handler)))
    }

    /// Execute a bulk delete, returning the number of matched entities.
    pub async fn execute_delete<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        name: &str,
        statement: &BulkDelete,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        let handler = match self.delete_handler(name, statement) {
            Ok(handler) => handler,
            Err(e) => return Outcome::Err(e),
        };
        handler.execute(cx, conn, params).await
    }

    /// Execute a bulk update, returning the number of matched entities.
    pub async fn execute_update<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        name: &str,
        statement: &BulkUpdate,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        let handler = match self.update_handler(name, statement) {
            Ok(handler) => handler,
            Err(e) => return Outcome::Err(e),
        };
        handler.execute(cx, conn, params).await
    }

    /// Number of cached handlers.
    pub fn cached_handlers(&self) -> usize {
        let deletes = self.deletes.lock().unwrap_or_else(|e| e.into_inner()).len();
        let updates = self.updates.lock().unwrap_or_else(|e| e.into_inner()).len();
        deletes + updates
    }

    /// Drop every cached handler.
    pub fn clear_cache(&self) {
        self.deletes.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.updates.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnection, id_rows, run, unwrap_outcome};
    use sqlbulk_core::{EntityMapping, EntityTable};
    use sqlbulk_query::Expr;

    fn tag() -> EntityMapping {
        EntityMapping::new("Tag", EntityTable::new("tag", &["id"]).columns(&["label"]))
    }

    #[test]
    fn test_handlers_cached_by_name() {
        let executor = MutationExecutor::new(Dialect::Postgres, MutationConfig::default());
        let statement = BulkDelete::new(tag());
        let first = executor.delete_handler("Tag.purge", &statement).unwrap();
        let second = executor.delete_handler("Tag.purge", &statement).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        executor
            .update_handler("Tag.relabel", &BulkUpdate::new(tag()).set("label", "x"))
            .unwrap();
        assert_eq!(executor.cached_handlers(), 2);

        executor.clear_cache();
        assert_eq!(executor.cached_handlers(), 0);
    }

    #[test]
    fn test_failed_compile_not_cached() {
        let executor = MutationExecutor::new(Dialect::Postgres, MutationConfig::default());
        let err = executor
            .update_handler("Tag.nothing", &BulkUpdate::new(tag()))
            .unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
        assert_eq!(executor.cached_handlers(), 0);
    }

    #[test]
    fn test_execute_through_executor() {
        let executor = MutationExecutor::new(Dialect::Postgres, MutationConfig::default());
        let conn = MockConnection::new(Dialect::Postgres).with_rows(id_rows(&[4, 5]));
        let statement = BulkDelete::new(tag()).filter(Expr::col("label").eq(Expr::placeholder(1)));

        let matched = run(async {
            let cx = Cx::for_testing();
            unwrap_outcome(
                executor
                    .execute_delete(&cx, &conn, "Tag.byLabel", &statement, &[Value::from("old")])
                    .await,
            )
        });
        assert_eq!(matched, 2);
        assert_eq!(
            conn.executed_sql(),
            vec!["DELETE FROM \"tag\" WHERE \"id\" IN ($1, $2)"]
        );
    }
}
