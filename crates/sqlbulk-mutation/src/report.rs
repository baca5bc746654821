//! Per-statement results of a bulk mutation.

use serde::Serialize;

/// Kind of statement a handler issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Physical DELETE.
    Delete,
    /// UPDATE of a soft-delete indicator.
    SoftDelete,
    /// UPDATE applying assignments.
    Update,
    /// Fallback INSERT ... SELECT for an optional table.
    Insert,
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementReport {
    /// Target table.
    pub table: String,
    /// Statement kind.
    pub kind: StatementKind,
    /// Rows affected as reported by the connection.
    pub rows: u64,
}

/// Optional-table update whose updated plus inserted rows differ from the
/// number of matched entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCountMismatch {
    /// Target table.
    pub table: String,
    /// Matched entities in the batch.
    pub expected: u64,
    /// Rows updated.
    pub updated: u64,
    /// Rows inserted by the fallback.
    pub inserted: u64,
}

/// Outcome of one bulk mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    /// Entities matched by the matching-id select.
    pub matched: u64,
    /// Executed statements, in execution order. Excludes the matching-id select.
    pub statements: Vec<StatementReport>,
    /// Row-count mismatches detected on optional tables.
    pub mismatches: Vec<RowCountMismatch>,
}

impl MutationReport {
    pub(crate) fn record(&mut self, table: &str, kind: StatementKind, rows: u64) {
        self.statements.push(StatementReport {
            table: table.to_string(),
            kind,
            rows,
        });
    }

    /// Rows affected in a table by statements of one kind.
    pub fn rows_for(&self, table: &str, kind: StatementKind) -> u64 {
        self.statements
            .iter()
            .filter(|s| s.table == table && s.kind == kind)
            .map(|s| s.rows)
            .sum()
    }

    /// Number of executed statements of one kind.
    pub fn count_of(&self, kind: StatementKind) -> usize {
        self.statements.iter().filter(|s| s.kind == kind).count()
    }

    /// Tables touched, in first-execution order.
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for s in &self.statements {
            if !tables.contains(&s.table.as_str()) {
                tables.push(&s.table);
            }
        }
        tables
    }

    /// Whether updated and inserted rows matched expectations everywhere.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates() {
        let mut report = MutationReport {
            matched: 3,
            ..MutationReport::default()
        };
        report.record("person_tags", StatementKind::Delete, 5);
        report.record("person", StatementKind::Delete, 2);
        report.record("person", StatementKind::Delete, 1);
        assert_eq!(report.rows_for("person", StatementKind::Delete), 3);
        assert_eq!(report.count_of(StatementKind::Delete), 3);
        assert_eq!(report.count_of(StatementKind::Insert), 0);
        assert_eq!(report.tables(), vec!["person_tags", "person"]);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_serializes_kinds_snake_case() {
        let mut report = MutationReport::default();
        report.record("person", StatementKind::SoftDelete, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["statements"][0]["kind"], "soft_delete");
    }
}
