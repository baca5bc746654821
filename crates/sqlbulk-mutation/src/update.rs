//! Multi-table bulk UPDATE.
//!
//! Assignments are split by the table owning each column. After the
//! matching-id select, every table with assignments gets one UPDATE
//! restricted to the matched ids. Optional tables may lack a row for some
//! matched entities; for those, an `INSERT ... SELECT` creates the missing
//! rows with the assigned values.

use crate::assignment::{TableAssignments, segment_assignments};
use crate::config::MutationConfig;
use crate::dml::{ensure_dialect, execute_compiled};
use crate::matching::{MatchingIdInterpretation, MatchingIdLayout};
use crate::report::{MutationReport, RowCountMismatch, StatementKind};
use crate::restriction::{MatchingIdRestrictionProducer, RestrictionTarget};
use crate::statement::BulkUpdate;
use asupersync::{Cx, Outcome};
use sqlbulk_core::{Connection, Dialect, EntityTable, Error, Result, Row, Value};
use sqlbulk_query::{CompiledStatement, Expr, FromItem, InsertSelect, Join, Select, Update};
use std::time::Instant;

const MATCHED_ALIAS: &str = "matched_ids";

/// Row source the fallback insert reads matched ids from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// An inline `VALUES` list of the matched ids.
    Values,
    /// The root table, restricted to the matched ids.
    RootTable,
}

/// `INSERT ... SELECT` creating missing rows of an optional table.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackInsert {
    table: String,
    key_columns: Vec<String>,
    root_table: String,
    id_columns: Vec<String>,
    values: Vec<(String, Expr)>,
    source: FallbackSource,
}

impl FallbackInsert {
    #[allow(clippy::result_large_err)]
    fn new(
        table: &EntityTable,
        root: &EntityTable,
        sets: &[(String, Expr)],
        source: FallbackSource,
    ) -> Result<Self> {
        // The target row is absent, so its own columns read as NULL here.
        let values = sets
            .iter()
            .map(|(column, value)| {
                value
                    .try_map_columns(&mut |_, c| Ok(Expr::qualified(table.name.as_str(), c)))
                    .map(|value| (column.clone(), value))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            table: table.name.clone(),
            key_columns: table.key_columns.clone(),
            root_table: root.name.clone(),
            id_columns: root.key_columns.clone(),
            values,
            source,
        })
    }

    /// Row source of the insert.
    pub fn source(&self) -> FallbackSource {
        self.source
    }

    /// Render the insert for a batch of matched rows.
    #[allow(clippy::result_large_err)]
    pub fn statement(
        &self,
        rows: &[Row],
        producer: &dyn MatchingIdRestrictionProducer,
        dialect: Dialect,
    ) -> Result<CompiledStatement> {
        let ids = RestrictionTarget::contiguous(&self.id_columns, 0);
        let source_table = match self.source {
            FallbackSource::Values => MATCHED_ALIAS,
            FallbackSource::RootTable => self.root_table.as_str(),
        };

        let mut select = match self.source {
            FallbackSource::Values => {
                let values = rows
                    .iter()
                    .map(|row| {
                        ids.values(row)
                            .map(|vals| vals.into_iter().map(Expr::Literal).collect())
                    })
                    .collect::<Result<Vec<_>>>()?;
                Select::from(FromItem::Values {
                    rows: values,
                    alias: MATCHED_ALIAS.to_string(),
                    columns: self.id_columns.clone(),
                })
            }
            FallbackSource::RootTable => Select::from_table(self.root_table.as_str()),
        };

        select = select
            .columns(
                self.id_columns
                    .iter()
                    .map(|id| Expr::qualified(source_table, id.as_str())),
            )
            .columns(self.values.iter().map(|(_, value)| value.clone()));

        let on = Expr::and_all(self.key_columns.iter().zip(&self.id_columns).map(|(key, id)| {
            Expr::qualified(self.table.as_str(), key.as_str())
                .eq(Expr::qualified(source_table, id.as_str()))
        }))
        .unwrap_or_else(|| Expr::raw("1 = 1"));
        select = select.join(Join::left(self.table.as_str(), on));

        if self.source == FallbackSource::RootTable {
            select = select.filter(
                producer.produce_restriction(rows, &ids.qualified(self.root_table.as_str()))?,
            );
        }
        if let Some(first_key) = self.key_columns.first() {
            select =
                select.filter(Expr::qualified(self.table.as_str(), first_key.as_str()).is_null());
        }

        let columns = self
            .key_columns
            .iter()
            .cloned()
            .chain(self.values.iter().map(|(column, _)| column.clone()))
            .collect();
        Ok(InsertSelect::new(self.table.as_str(), columns, select).build_with_dialect(dialect))
    }
}

/// One per-table statement of a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub struct TableUpdater {
    table: String,
    target: RestrictionTarget,
    sets: Vec<(String, Expr)>,
    fallback: Option<FallbackInsert>,
}

impl TableUpdater {
    /// Target table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Assignments applied to the table.
    pub fn assignments(&self) -> &[(String, Expr)] {
        &self.sets
    }

    /// Insert for missing rows, present for optional tables.
    pub fn fallback(&self) -> Option<&FallbackInsert> {
        self.fallback.as_ref()
    }

    /// Render the update for a batch of matched rows.
    #[allow(clippy::result_large_err)]
    pub fn statement(
        &self,
        rows: &[Row],
        producer: &dyn MatchingIdRestrictionProducer,
        dialect: Dialect,
    ) -> Result<CompiledStatement> {
        let restriction = producer.produce_restriction(rows, &self.target)?;
        let update = self
            .sets
            .iter()
            .fold(Update::new(self.table.as_str()), |update, (column, value)| {
                update.set(column.as_str(), value.clone())
            });
        Ok(update.filter(restriction).build_with_dialect(dialect))
    }
}

/// Executes one bulk UPDATE against a multi-table entity.
#[derive(Debug)]
pub struct UpdateHandler {
    entity: String,
    dialect: Dialect,
    matching: MatchingIdInterpretation,
    updaters: Vec<TableUpdater>,
    producer: &'static dyn MatchingIdRestrictionProducer,
    batch_size: usize,
}

impl UpdateHandler {
    /// Compile a bulk update.
    ///
    /// Fails if the mapping is invalid, or if an assignment or the
    /// restriction cannot be resolved against it.
    #[allow(clippy::result_large_err)]
    pub fn new(statement: &BulkUpdate, dialect: Dialect, config: &MutationConfig) -> Result<Self> {
        let mapping = &statement.mapping;
        mapping.validate()?;

        let segments = segment_assignments(mapping, &statement.assignments)?;
        let matching =
            MatchingIdInterpretation::compile(mapping, statement.restriction.as_ref(), dialect)?;

        let source = if config.use_values_row_source && dialect.supports_values_row_source() {
            FallbackSource::Values
        } else {
            FallbackSource::RootTable
        };

        // Parents before children so fallback inserts find their parent rows.
        let mut ordered = mapping.constraint_ordered_tables()?;
        ordered.reverse();

        let layout = matching.layout();
        let mut updaters = Vec::with_capacity(segments.len());
        for table in ordered {
            let Some(segment) = segments.iter().find(|s| s.table == table.name) else {
                continue;
            };
            updaters.push(Self::build_updater(table, &mapping.root, segment, layout, source)?);
        }

        let reserved = segments
            .iter()
            .map(TableAssignments::placeholder_count)
            .max()
            .unwrap_or(0);
        let batch_size = config.effective_batch_size(dialect, layout.id_width(), reserved);
        let strategy = config.restriction_strategy(dialect);

        tracing::debug!(
            entity = %mapping.name,
            tables = updaters.len(),
            batch_size,
            strategy = ?strategy,
            "Compiled bulk update"
        );

        Ok(Self {
            entity: mapping.name.clone(),
            dialect,
            matching,
            updaters,
            producer: strategy.producer(),
            batch_size,
        })
    }

    #[allow(clippy::result_large_err)]
    fn build_updater(
        table: &EntityTable,
        root: &EntityTable,
        segment: &TableAssignments,
        layout: &MatchingIdLayout,
        source: FallbackSource,
    ) -> Result<TableUpdater> {
        let fallback = if table.optional {
            Some(FallbackInsert::new(table, root, &segment.sets, source)?)
        } else {
            None
        };
        Ok(TableUpdater {
            table: table.name.clone(),
            target: layout.id_target(&table.key_columns),
            sets: segment.sets.clone(),
            fallback,
        })
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
    pub fn table_updaters(&self) -> &[TableUpdater] {
        &self.updaters
    }

    /// Matched rows per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Execute the update and return the number of matched entities.
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

    /// Execute the update and report every statement issued.
    ///
    /// A row-count mismatch on an optional table is logged and recorded in
    /// the report; it does not fail the update.
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
            tracing::debug!("No matching ids, nothing to update");
            return Outcome::Ok(report);
        }

        for chunk in rows.chunks(self.batch_size) {
            let expected = chunk.len() as u64;
            for updater in &self.updaters {
                let statement = match updater.statement(chunk, self.producer, self.dialect) {
                    Ok(statement) => statement,
                    Err(e) => return Outcome::Err(e),
                };
                let updated = match execute_compiled(cx, conn, &statement, params).await {
                    Outcome::Ok(count) => count,
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                };
                report.record(&updater.table, StatementKind::Update, updated);

                let Some(fallback) = &updater.fallback else {
                    continue;
                };
                let mut inserted = 0;
                if updated < expected {
                    let statement = match fallback.statement(chunk, self.producer, self.dialect) {
                        Ok(statement) => statement,
                        Err(e) => return Outcome::Err(e),
                    };
                    inserted = match execute_compiled(cx, conn, &statement, params).await {
                        Outcome::Ok(count) => count,
                        Outcome::Err(e) => return Outcome::Err(e),
                        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                        Outcome::Panicked(p) => return Outcome::Panicked(p),
                    };
                    report.record(&updater.table, StatementKind::Insert, inserted);
                }
                if updated + inserted != expected {
                    tracing::warn!(
                        table = %updater.table,
                        expected,
                        updated,
                        inserted,
                        "Optional table row count does not match matched ids"
                    );
                    report.mismatches.push(RowCountMismatch {
                        table: updater.table.clone(),
                        expected,
                        updated,
                        inserted,
                    });
                }
            }
        }

        tracing::info!(
            matched = report.matched,
            statements = report.statements.len(),
            mismatches = report.mismatches.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Bulk update complete"
        );
        Outcome::Ok(report)
    }
}
