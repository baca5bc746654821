//! Multi-table bulk DELETE.
//!
//! A bulk delete runs in two phases. The matching-id select materializes
//! the identifiers of every entity the statement targets; then one DELETE
//! per table removes the rows keyed by those identifiers. Collection
//! tables go first, followed by the entity's own tables in
//! foreign-key safe order (children before the root).
//!
//! Entities with a soft-delete indicator are never physically deleted: a
//! single UPDATE of the root table marks the matched rows as deleted.

use crate::config::MutationConfig;
use crate::dml::{ensure_dialect, execute_compiled};
use crate::matching::MatchingIdInterpretation;
use crate::report::{MutationReport, StatementKind};
use crate::restriction::{MatchingIdRestrictionProducer, RestrictionTarget};
use crate::soft_delete;
use crate::statement::BulkDelete;
use asupersync::{Cx, Outcome};
use sqlbulk_core::{
    Connection, Dialect, EntityMapping, Error, Result, Row, SoftDeleteMapping, Value,
};
use sqlbulk_query::{CompiledStatement, Delete, Update};
use std::time::Instant;

/// What a [`TableDeleter`] does to the matched rows of its table.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteAction {
    /// `DELETE FROM table WHERE <restriction>`.
    Delete,
    /// `UPDATE table SET indicator = <deleted> WHERE <restriction> AND <live>`.
    SoftDelete(SoftDeleteMapping),
}

/// One per-table statement of a bulk delete.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDeleter {
    table: String,
    target: RestrictionTarget,
    action: DeleteAction,
    collection: bool,
}

impl TableDeleter {
    /// Target table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Key columns and their positions in a matched row.
    pub fn target(&self) -> &RestrictionTarget {
        &self.target
    }

    /// Delete or soft delete.
    pub fn action(&self) -> &DeleteAction {
        &self.action
    }

    /// Whether the table is a collection table.
    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// Kind of statement issued.
    pub fn kind(&self) -> StatementKind {
        match self.action {
            DeleteAction::Delete => StatementKind::Delete,
            DeleteAction::SoftDelete(_) => StatementKind::SoftDelete,
        }
    }

    /// Render the statement for a batch of matched rows.
    #[allow(clippy::result_large_err)]
    pub fn statement(
        &self,
        rows: &[Row],
        producer: &dyn MatchingIdRestrictionProducer,
        dialect: Dialect,
    ) -> Result<CompiledStatement> {
        let restriction = producer.produce_restriction(rows, &self.target)?;
        Ok(match &self.action {
            DeleteAction::Delete => Delete::new(self.table.as_str())
                .filter(restriction)
                .build_with_dialect(dialect),
            DeleteAction::SoftDelete(mapping) => Update::new(self.table.as_str())
                .set(mapping.column.as_str(), soft_delete::deleted_value(mapping))
                .filter(restriction)
                .filter(soft_delete::live_predicate(mapping, None))
                .build_with_dialect(dialect),
        })
    }
}

/// Executes one bulk DELETE against a multi-table entity.
///
/// Built once per statement and dialect, then executed any number of times
/// with different parameters.
#[derive(Debug)]
pub struct DeleteHandler {
    entity: String,
    dialect: Dialect,
    matching: MatchingIdInterpretation,
    deleters: Vec<TableDeleter>,
    producer: &'static dyn MatchingIdRestrictionProducer,
    batch_size: usize,
}

impl DeleteHandler {
    /// Compile a bulk delete.
    ///
    /// Fails if the mapping is invalid or the restriction cannot be
    /// resolved against it.
    #[allow(clippy::result_large_err)]
    pub fn new(statement: &BulkDelete, dialect: Dialect, config: &MutationConfig) -> Result<Self> {
        let mapping = &statement.mapping;
        mapping.validate()?;

        let matching =
            MatchingIdInterpretation::compile(mapping, statement.restriction.as_ref(), dialect)?;
        let deleters = Self::build_deleters(mapping, &matching)?;

        let key_width = deleters.iter().map(|d| d.target.width()).max().unwrap_or(1);
        // indicator value and live predicate
        let reserved = deleters
            .iter()
            .filter(|d| matches!(d.action, DeleteAction::SoftDelete(_)))
            .map(|_| 2)
            .max()
            .unwrap_or(0);
        let batch_size = config.effective_batch_size(dialect, key_width, reserved);
        let strategy = config.restriction_strategy(dialect);

        tracing::debug!(
            entity = %mapping.name,
            tables = deleters.len(),
            batch_size,
            strategy = ?strategy,
            "Compiled bulk delete"
        );

        Ok(Self {
            entity: mapping.name.clone(),
            dialect,
            matching,
            deleters,
            producer: strategy.producer(),
            batch_size,
        })
    }

    #[allow(clippy::result_large_err)]
    fn build_deleters(
        mapping: &EntityMapping,
        matching: &MatchingIdInterpretation,
    ) -> Result<Vec<TableDeleter>> {
        let layout = matching.layout();
        let root = &mapping.root;

        if let Some(soft_delete) = &mapping.soft_delete {
            return Ok(vec![TableDeleter {
                table: root.name.clone(),
                target: layout.id_target(&root.key_columns),
                action: DeleteAction::SoftDelete(soft_delete.clone()),
                collection: false,
            }]);
        }

        let mut deleters = Vec::new();
        for collection in &mapping.collection_tables {
            if collection.cascade_delete {
                tracing::trace!(table = %collection.name, "Skipping cascade-deleted collection");
                continue;
            }
            deleters.push(TableDeleter {
                table: collection.name.clone(),
                target: layout.collection_target(&collection.key_target, &collection.key_columns)?,
                action: match &collection.soft_delete {
                    Some(soft_delete) => DeleteAction::SoftDelete(soft_delete.clone()),
                    None => DeleteAction::Delete,
                },
                collection: true,
            });
        }
        for table in mapping.constraint_ordered_tables()? {
            deleters.push(TableDeleter {
                table: table.name.clone(),
                target: layout.id_target(&table.key_columns),
                action: DeleteAction::Delete,
                collection: false,
            });
        }
        Ok(deleters)
    }

    /// Name of the target entity.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Dialect the statements are rendered for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The compiled matching-id select.
    pub fn matching_id_interpretation(&self) -> &MatchingIdInterpretation {
        &self.matching
    }

    /// Per-table statements, in execution order.
    pub fn table_deleters(&self) -> &[TableDeleter] {
        &self.deleters
    }

    /// Matched rows per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Execute the delete and return the number of matched entities.
    pub async fn execute<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        self.execute_with_report(cx, conn, params)
            .await
            .map(|report| report.matched)
    }

    /// Execute the delete and report every statement issued.
    ///
    /// Statements run through `conn` in order; the first failure or
    /// cancellation is returned as is and no further statement runs.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, conn, params),
        fields(entity = %self.entity)
    )]
    pub async fn execute_with_report<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        params: &[Value],
    ) -> Outcome<MutationReport, Error> {
        if let Err(e) = ensure_dialect(self.dialect, conn) {
            return Outcome::Err(e);
        }
        let start = Instant::now();

        let rows = match self.matching.execute(cx, conn, params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let mut report = MutationReport {
            matched: rows.len() as u64,
            ..MutationReport::default()
        };
        if rows.is_empty() {
            tracing::debug!("No matching ids, nothing to delete");
            return Outcome::Ok(report);
        }

        for (batch, chunk) in rows.chunks(self.batch_size).enumerate() {
            tracing::trace!(batch, rows = chunk.len(), "Deleting batch");
            for deleter in &self.deleters {
                let statement = match deleter.statement(chunk, self.producer, self.dialect) {
                    Ok(statement) => statement,
                    Err(e) => return Outcome::Err(e),
                };
                match execute_compiled(cx, conn, &statement, params).await {
                    Outcome::Ok(count) => {
                        tracing::trace!(
                            table = %deleter.table,
                            rows = count,
                            "Table statement done"
                        );
                        report.record(&deleter.table, deleter.kind(), count);
                    }
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
        }

        tracing::info!(
            matched = report.matched,
            statements = report.statements.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Bulk delete complete"
        );
        Outcome::Ok(report)
    }
}
