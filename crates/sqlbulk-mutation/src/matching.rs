//! The matching-id selection.
//!
//! Before any per-table statement runs, a single SELECT against the root
//! table materializes the identifiers of the rows the bulk statement
//! targets, plus any non-identifier root columns that collection tables
//! reference. [`MatchingIdInterpretation`] is the compiled form of that
//! SELECT; a handler compiles it once and reuses it for every execution.

use crate::restriction::RestrictionTarget;
use crate::soft_delete;
use asupersync::{Cx, Outcome};
use sqlbulk_core::error::{SchemaErrorKind, TypeError};
use sqlbulk_core::{Connection, Dialect, EntityMapping, Error, KeyTarget, Result, Row, Value};
use sqlbulk_query::{CompiledStatement, Expr, Join, Select};
use std::collections::HashSet;

/// Column layout of the rows returned by the matching-id select.
///
/// Identifier columns come first, followed by the extra root columns
/// referenced by collection tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingIdLayout {
    id_columns: Vec<String>,
    extra_columns: Vec<String>,
}

impl MatchingIdLayout {
    /// Layout for an entity mapping.
    pub fn for_mapping(mapping: &EntityMapping) -> Self {
        Self {
            id_columns: mapping.identifier_columns().to_vec(),
            extra_columns: mapping.collection_key_target_columns(),
        }
    }

    /// Number of identifier columns.
    pub fn id_width(&self) -> usize {
        self.id_columns.len()
    }

    /// Total number of selected columns.
    pub fn width(&self) -> usize {
        self.id_columns.len() + self.extra_columns.len()
    }

    /// Selected column names, in order.
    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.id_columns.iter().chain(self.extra_columns.iter())
    }

    /// Restriction target for a table keyed by the identifier.
    pub fn id_target(&self, key_columns: &[String]) -> RestrictionTarget {
        RestrictionTarget::contiguous(key_columns, 0)
    }

    /// Restriction target for a collection table.
    #[allow(clippy::result_large_err)]
    pub fn collection_target(
        &self,
        key_target: &KeyTarget,
        key_columns: &[String],
    ) -> Result<RestrictionTarget> {
        match key_target {
            KeyTarget::Identifier => Ok(self.id_target(key_columns)),
            KeyTarget::Columns(columns) => {
                let positions = columns
                    .iter()
                    .map(|column| {
                        self.extra_columns
                            .iter()
                            .position(|c| c == column)
                            .map(|i| self.id_width() + i)
                            .ok_or_else(|| {
                                Error::schema(
                                    SchemaErrorKind::ColumnNotFound,
                                    format!("column '{}' is not selected as a matching id", column),
                                )
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(RestrictionTarget::at_positions(key_columns, positions))
            }
        }
    }
}

/// Compiled matching-id select.
#[derive(Debug, Clone)]
pub struct MatchingIdInterpretation {
    entity: String,
    statement: CompiledStatement,
    layout: MatchingIdLayout,
}

impl MatchingIdInterpretation {
    /// Compile the matching-id select for a mapping and restriction.
    ///
    /// Required entity tables are inner joined so that only complete
    /// entities match; optional tables are left joined only when the
    /// restriction reads their columns. The discriminator and the
    /// soft-delete live predicate are added to the restriction.
    #[allow(clippy::result_large_err)]
    pub fn compile(
        mapping: &EntityMapping,
        restriction: Option<&Expr>,
        dialect: Dialect,
    ) -> Result<Self> {
        let root = &mapping.root;
        let layout = MatchingIdLayout::for_mapping(mapping);

        let (restriction, referenced) = match restriction {
            Some(expr) => {
                let (qualified, referenced) = qualify_columns(mapping, expr)?;
                (Some(qualified), referenced)
            }
            None => (None, HashSet::new()),
        };

        let mut select = Select::from_table(root.name.as_str())
            .columns(layout.columns().map(|c| Expr::qualified(root.name.as_str(), c.as_str())));

        for table in &mapping.tables {
            if !table.optional || referenced.contains(table.name.as_str()) {
                let on = Expr::and_all(table.key_columns.iter().zip(&root.key_columns).map(
                    |(key, id)| {
                        Expr::qualified(table.name.as_str(), key.as_str())
                            .eq(Expr::qualified(root.name.as_str(), id.as_str()))
                    },
                ));
                let Some(on) = on else { continue };
                select = select.join(if table.optional {
                    Join::left(table.name.as_str(), on)
                } else {
                    Join::inner(table.name.as_str(), on)
                });
            }
        }

        if let Some(expr) = restriction {
            select = select.filter(expr);
        }
        if let Some(discriminator) = &mapping.discriminator {
            select = select.filter(
                Expr::qualified(root.name.as_str(), discriminator.column.as_str())
                    .eq(Expr::Literal(discriminator.value.clone())),
            );
        }
        if let Some(soft_delete) = &mapping.soft_delete {
            select = select.filter(soft_delete::live_predicate(
                soft_delete,
                Some(root.name.as_str()),
            ));
        }

        let statement = select.build_with_dialect(dialect);
        tracing::trace!(
            entity = %mapping.name,
            sql = %statement.sql,
            "Compiled matching-id select"
        );

        Ok(Self {
            entity: mapping.name.clone(),
            statement,
            layout,
        })
    }

    /// The rendered SQL.
    pub fn sql(&self) -> &str {
        &self.statement.sql
    }

    /// The compiled statement.
    pub fn statement(&self) -> &CompiledStatement {
        &self.statement
    }

    /// Layout of the returned rows.
    pub fn layout(&self) -> &MatchingIdLayout {
        &self.layout
    }

    /// Run the select and return the matching rows.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, conn, params),
        fields(entity = %self.entity)
    )]
    pub async fn execute<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        params: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        let bound = match self.statement.bind(params) {
            Ok(bound) => bound,
            Err(e) => return Outcome::Err(e),
        };

        tracing::debug!(sql = %self.statement.sql, "Selecting matching ids");
        let rows = match conn.query(cx, &self.statement.sql, &bound).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        if let Some(row) = rows.iter().find(|row| row.len() < self.layout.width()) {
            return Outcome::Err(Error::Type(TypeError {
                expected: "matching-id row",
                actual: format!(
                    "{} columns, layout needs {}",
                    row.len(),
                    self.layout.width()
                ),
                column: None,
            }));
        }

        tracing::debug!(matched = rows.len(), "Matching ids selected");
        Outcome::Ok(rows)
    }
}

/// Qualify every column of `expr` with the entity table owning it.
///
/// Returns the rewritten expression and the names of the tables it reads.
#[allow(clippy::result_large_err)]
pub(crate) fn qualify_columns(
    mapping: &EntityMapping,
    expr: &Expr,
) -> Result<(Expr, HashSet<String>)> {
    let mut referenced = HashSet::new();
    let qualified = expr.try_map_columns(&mut |table, column| {
        let owner = mapping.resolve_column(table, column)?;
        referenced.insert(owner.name.clone());
        Ok(Expr::qualified(owner.name.as_str(), column))
    })?;
    Ok((qualified, referenced))
}
