//! Bulk UPDATE and DELETE statements against one entity.

use crate::assignment::Assignment;
use sqlbulk_core::EntityMapping;
use sqlbulk_query::Expr;

/// `DELETE FROM <entity> [WHERE ...]`.
///
/// Columns in the restriction may be unqualified (resolved against every
/// table of the entity) or qualified with a table name.
/// [`Expr::Placeholder`] refers to an execution-time parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDelete {
    /// Target entity.
    pub mapping: EntityMapping,
    /// WHERE clause.
    pub restriction: Option<Expr>,
}

impl BulkDelete {
    /// Delete every row of the entity.
    pub fn new(mapping: EntityMapping) -> Self {
        Self {
            mapping,
            restriction: None,
        }
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.restriction = Some(match self.restriction.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }
}

/// `UPDATE <entity> SET ... [WHERE ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdate {
    /// Target entity.
    pub mapping: EntityMapping,
    /// SET items.
    pub assignments: Vec<Assignment>,
    /// WHERE clause.
    pub restriction: Option<Expr>,
}

impl BulkUpdate {
    /// Update rows of the entity.
    pub fn new(mapping: EntityMapping) -> Self {
        Self {
            mapping,
            assignments: Vec::new(),
            restriction: None,
        }
    }

    /// Add `column = value`; the column may be qualified as `table.column`.
    pub fn set(mut self, column: &str, value: impl Into<Expr>) -> Self {
        self.assignments.push(Assignment::new(column, value));
        self
    }

    /// Add `(c1, c2, ...) = (v1, v2, ...)`.
    pub fn set_tuple(mut self, columns: &[&str], values: Vec<Expr>) -> Self {
        self.assignments.push(Assignment::tuple(columns, values));
        self
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.restriction = Some(match self.restriction.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }
}
