//! Update assignments and their segmentation by table.

use sqlbulk_core::error::SemanticErrorKind;
use sqlbulk_core::{Dialect, EntityMapping, Error, Result};
use sqlbulk_query::Expr;

/// A column reference naming an assignment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTarget {
    /// Table qualifier, if given.
    pub table: Option<String>,
    /// Column name.
    pub column: String,
}

impl AssignmentTarget {
    /// Parse `column` or `table.column`.
    pub fn parse(path: &str) -> Self {
        match path.rsplit_once('.') {
            Some((table, column)) => Self {
                table: Some(table.to_string()),
                column: column.to_string(),
            },
            None => Self {
                table: None,
                column: path.to_string(),
            },
        }
    }
}

/// One `SET` item of a bulk update: a column (or tuple of columns) and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target columns; more than one for a tuple assignment.
    pub targets: Vec<AssignmentTarget>,
    /// Assigned value; an [`Expr::Tuple`] of matching arity for tuple assignments.
    pub value: Expr,
}

impl Assignment {
    /// `column = value`. The column may be qualified as `table.column`.
    pub fn new(column: &str, value: impl Into<Expr>) -> Self {
        Self {
            targets: vec![AssignmentTarget::parse(column)],
            value: value.into(),
        }
    }

    /// `(c1, c2, ...) = (v1, v2, ...)`.
    pub fn tuple(columns: &[&str], values: Vec<Expr>) -> Self {
        Self {
            targets: columns.iter().map(|c| AssignmentTarget::parse(c)).collect(),
            value: Expr::Tuple(values),
        }
    }

    /// Split into per-column assignments.
    #[allow(clippy::result_large_err)]
    fn expand(&self) -> Result<Vec<(&AssignmentTarget, &Expr)>> {
        if self.targets.len() == 1 {
            return Ok(vec![(&self.targets[0], &self.value)]);
        }
        match &self.value {
            Expr::Tuple(values) if values.len() == self.targets.len() => {
                Ok(self.targets.iter().zip(values.iter()).collect())
            }
            Expr::Tuple(values) => Err(Error::semantic(
                SemanticErrorKind::ArityMismatch,
                format!(
                    "tuple assignment of {} columns given {} values",
                    self.targets.len(),
                    values.len()
                ),
            )),
            _ => Err(Error::semantic(
                SemanticErrorKind::ArityMismatch,
                format!(
                    "tuple assignment of {} columns needs a tuple value",
                    self.targets.len()
                ),
            )),
        }
    }
}

/// The assignments of a bulk update that target one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableAssignments {
    /// Table name.
    pub table: String,
    /// `(column, value)` pairs; columns and value references are unqualified.
    pub sets: Vec<(String, Expr)>,
}

impl TableAssignments {
    /// Number of placeholders the assigned values render.
    pub fn placeholder_count(&self) -> usize {
        self.sets
            .iter()
            .map(|(_, value)| value.build_with_dialect(Dialect::default()).placeholder_count())
            .sum()
    }
}

/// Attribute every assignment to exactly one entity table.
///
/// Returns one [`TableAssignments`] per table that has assignments, in the
/// mapping's table declaration order.
///
/// Fails with a semantic error when there are no assignments, a column is
/// unknown or ambiguous, one assignment spans several tables, a key column
/// is assigned, or a value reads columns of another table.
#[allow(clippy::result_large_err)]
pub fn segment_assignments(
    mapping: &EntityMapping,
    assignments: &[Assignment],
) -> Result<Vec<TableAssignments>> {
    if assignments.is_empty() {
        return Err(Error::semantic(
            SemanticErrorKind::EmptyAssignments,
            format!("bulk update of '{}' has no assignments", mapping.name),
        ));
    }

    let mut segments: Vec<TableAssignments> = mapping
        .all_tables()
        .map(|t| TableAssignments {
            table: t.name.clone(),
            sets: Vec::new(),
        })
        .collect();

    for assignment in assignments {
        let mut owner: Option<&str> = None;
        for (target, value) in assignment.expand()? {
            let table = mapping.resolve_column(target.table.as_deref(), &target.column)?;
            if table.key_columns.contains(&target.column) {
                return Err(Error::semantic(
                    SemanticErrorKind::KeyAssignment,
                    format!(
                        "column '{}.{}' is a key column and cannot be assigned",
                        table.name, target.column
                    ),
                ));
            }
            match owner {
                Some(previous) if previous != table.name => {
                    return Err(Error::semantic(
                        SemanticErrorKind::MultiTableAssignment,
                        format!(
                            "assignment spans tables '{}' and '{}'",
                            previous, table.name
                        ),
                    ));
                }
                _ => owner = Some(table.name.as_str()),
            }

            let value = value.try_map_columns(&mut |qualifier, column| {
                let source = mapping.resolve_column(qualifier, column)?;
                if source.name != table.name {
                    return Err(Error::semantic(
                        SemanticErrorKind::CrossTableReference,
                        format!(
                            "value assigned to '{}.{}' reads '{}.{}'",
                            table.name, target.column, source.name, column
                        ),
                    ));
                }
                Ok(Expr::col(column))
            })?;

            if let Some(segment) = segments.iter_mut().find(|s| s.table == table.name) {
                segment.sets.push((target.column.clone(), value));
            }
        }
    }

    segments.retain(|s| !s.sets.is_empty());
    Ok(segments)
}
