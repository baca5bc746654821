//! Soft-delete indicator predicates and assignments.

use sqlbulk_core::{SoftDeleteIndicator, SoftDeleteMapping};
use sqlbulk_query::Expr;

fn indicator_column(mapping: &SoftDeleteMapping, table: Option<&str>) -> Expr {
    match table {
        Some(table) => Expr::qualified(table, mapping.column.as_str()),
        None => Expr::col(mapping.column.as_str()),
    }
}

/// Predicate true for rows that are not soft-deleted.
pub fn live_predicate(mapping: &SoftDeleteMapping, table: Option<&str>) -> Expr {
    let column = indicator_column(mapping, table);
    match mapping.indicator() {
        SoftDeleteIndicator::Flag { live, .. } => column.eq(Expr::Literal(live)),
        SoftDeleteIndicator::Timestamp => column.is_null(),
    }
}

/// Value assigned to the indicator column when soft-deleting.
pub fn deleted_value(mapping: &SoftDeleteMapping) -> Expr {
    match mapping.indicator() {
        SoftDeleteIndicator::Flag { deleted, .. } => Expr::Literal(deleted),
        SoftDeleteIndicator::Timestamp => Expr::CurrentTimestamp,
    }
}
