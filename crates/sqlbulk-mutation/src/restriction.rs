//! Matching-id restriction producers.
//!
//! Given the rows returned by the matching-id select, a producer builds the
//! predicate that restricts one per-table statement to exactly those rows.
//! Single-column and composite keys are handled the same way: a
//! [`RestrictionTarget`] names the key columns and the positions of their
//! values within each matched row.

use crate::config::RestrictionStrategy;
use sqlbulk_core::{Dialect, Error, Result, Row, Value};
use sqlbulk_query::Expr;
use std::fmt;

/// Key columns of one table and where their values sit in a matched row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionTarget {
    /// Table qualifier for the key columns, if the statement needs one.
    pub qualifier: Option<String>,
    /// Key columns.
    pub columns: Vec<String>,
    /// For each key column, the index of its value in a matched row.
    pub positions: Vec<usize>,
}

impl RestrictionTarget {
    /// Key columns whose values are consecutive, starting at `offset`.
    pub fn contiguous(columns: &[String], offset: usize) -> Self {
        Self {
            qualifier: None,
            columns: columns.to_vec(),
            positions: (offset..offset + columns.len()).collect(),
        }
    }

    /// Key columns with explicit value positions.
    pub fn at_positions(columns: &[String], positions: Vec<usize>) -> Self {
        Self {
            qualifier: None,
            columns: columns.to_vec(),
            positions,
        }
    }

    /// Qualify the key columns with a table name.
    pub fn qualified(mut self, table: impl Into<String>) -> Self {
        self.qualifier = Some(table.into());
        self
    }

    /// Number of key columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    fn column(&self, index: usize) -> Expr {
        match &self.qualifier {
            Some(table) => Expr::qualified(table.as_str(), self.columns[index].as_str()),
            None => Expr::col(self.columns[index].as_str()),
        }
    }

    /// Key values of one matched row, in key column order.
    #[allow(clippy::result_large_err)]
    pub fn values(&self, row: &Row) -> Result<Vec<Value>> {
        self.positions
            .iter()
            .map(|&pos| row.require(pos).cloned())
            .collect()
    }
}

/// Builds the predicate restricting a statement to the matched rows.
pub trait MatchingIdRestrictionProducer: Send + Sync + fmt::Debug {
    /// The strategy this producer implements.
    fn strategy(&self) -> RestrictionStrategy;

    /// Build a predicate matching exactly the key values of `matching_rows`.
    #[allow(clippy::result_large_err)]
    fn produce_restriction(
        &self,
        matching_rows: &[Row],
        target: &RestrictionTarget,
    ) -> Result<Expr>;
}

/// `key IN (...)` restriction.
#[derive(Debug, Clone, Copy, Default)]
pub struct InListRestrictionProducer;

impl MatchingIdRestrictionProducer for InListRestrictionProducer {
    fn strategy(&self) -> RestrictionStrategy {
        RestrictionStrategy::InList
    }

    fn produce_restriction(
        &self,
        matching_rows: &[Row],
        target: &RestrictionTarget,
    ) -> Result<Expr> {
        if target.width() == 1 {
            let values = matching_rows
                .iter()
                .map(|row| row.require(target.positions[0]).cloned().map(Expr::Literal))
                .collect::<Result<Vec<_>>>()?;
            return Ok(target.column(0).in_list(values));
        }

        let key = Expr::tuple((0..target.width()).map(|i| target.column(i)).collect());
        let tuples = matching_rows
            .iter()
            .map(|row| {
                target
                    .values(row)
                    .map(|vals| Expr::tuple(vals.into_iter().map(Expr::Literal).collect()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(key.in_list(tuples))
    }
}

/// `(key = v1) OR (key = v2) OR ...` restriction.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisjunctionRestrictionProducer;

impl MatchingIdRestrictionProducer for DisjunctionRestrictionProducer {
    fn strategy(&self) -> RestrictionStrategy {
        RestrictionStrategy::Disjunction
    }

    fn produce_restriction(
        &self,
        matching_rows: &[Row],
        target: &RestrictionTarget,
    ) -> Result<Expr> {
        let mut disjuncts = Vec::with_capacity(matching_rows.len());
        for row in matching_rows {
            let values = target.values(row)?;
            let conjunction = Expr::and_all(
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| target.column(i).eq(Expr::Literal(value))),
            );
            if let Some(conjunction) = conjunction {
                disjuncts.push(conjunction.paren());
            }
        }
        Ok(Expr::or_all(disjuncts).map_or_else(|| Expr::raw("1 = 0"), Expr::paren))
    }
}

/// Restriction through a table value constructor. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableValueConstructorRestrictionProducer;

impl MatchingIdRestrictionProducer for TableValueConstructorRestrictionProducer {
    fn strategy(&self) -> RestrictionStrategy {
        RestrictionStrategy::TableValueConstructor
    }

    fn produce_restriction(
        &self,
        _matching_rows: &[Row],
        _target: &RestrictionTarget,
    ) -> Result<Expr> {
        Err(Error::NotYetImplemented(
            "table value constructor matching-id restriction",
        ))
    }
}

impl RestrictionStrategy {
    /// The producer implementing this strategy.
    pub fn producer(self) -> &'static dyn MatchingIdRestrictionProducer {
        match self {
            RestrictionStrategy::InList => &InListRestrictionProducer,
            RestrictionStrategy::Disjunction => &DisjunctionRestrictionProducer,
            RestrictionStrategy::TableValueConstructor => &TableValueConstructorRestrictionProducer,
        }
    }
}

/// Default restriction strategy for a dialect.
///
/// Every supported dialect accepts row-value IN lists, so this is always
/// [`RestrictionStrategy::InList`]; the disjunction producer is only used
/// when configured explicitly.
pub fn default_strategy(dialect: Dialect) -> RestrictionStrategy {
    match dialect {
        Dialect::Postgres | Dialect::Sqlite | Dialect::Mysql => RestrictionStrategy::InList,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbulk_query::{BinaryOp, Binding};
    use std::collections::HashMap;

    fn id_rows(ids: &[(i64, &str)]) -> Vec<Row> {
        ids.iter()
            .map(|(a, b)| {
                Row::new(
                    vec!["region".into(), "no".into()],
                    vec![Value::BigInt(*a), Value::Text((*b).to_string())],
                )
            })
            .collect()
    }

    /// Evaluates the restriction shapes producers emit against one table row.
    fn eval(expr: &Expr, row: &HashMap<&str, Value>) -> Value {
        match expr {
            Expr::Column { name, .. } => row.get(name.as_str()).cloned().unwrap_or(Value::Null),
            Expr::Literal(v) => v.clone(),
            Expr::Paren(inner) => eval(inner, row),
            Expr::Raw(sql) if sql == "1 = 0" => Value::Bool(false),
            Expr::Tuple(items) => Value::Json(serde_json::Value::Array(
                items
                    .iter()
                    .map(|i| serde_json::to_value(eval(i, row)).unwrap())
                    .collect(),
            )),
            Expr::In { expr, values, negated } => {
                let needle = eval(expr, row);
                let found = values.iter().any(|v| eval(v, row) == needle);
                Value::Bool(found != *negated)
            }
            Expr::Binary { left, op, right } => {
                let l = eval(left, row);
                let r = eval(right, row);
                match op {
                    BinaryOp::Eq => Value::Bool(l == r),
                    BinaryOp::And => {
                        Value::Bool(l.as_bool() == Some(true) && r.as_bool() == Some(true))
                    }
                    BinaryOp::Or => {
                        Value::Bool(l.as_bool() == Some(true) || r.as_bool() == Some(true))
                    }
                    other => panic!("unsupported operator {other:?}"),
                }
            }
            other => panic!("unsupported expression {other:?}"),
        }
    }

    fn composite_target() -> RestrictionTarget {
        RestrictionTarget::contiguous(&["region".to_string(), "no".to_string()], 0)
    }

    #[test]
    fn test_in_list_single_column() {
        let rows = vec![
            Row::new(vec!["id".into()], vec![Value::BigInt(1)]),
            Row::new(vec!["id".into()], vec![Value::BigInt(2)]),
        ];
        let target = RestrictionTarget::contiguous(&["id".to_string()], 0);
        let expr = InListRestrictionProducer.produce_restriction(&rows, &target).unwrap();
        let stmt = expr.build_with_dialect(Dialect::Postgres);
        assert_eq!(stmt.sql, "\"id\" IN ($1, $2)");
        assert_eq!(
            stmt.bindings,
            vec![Binding::Value(Value::BigInt(1)), Binding::Value(Value::BigInt(2))]
        );
    }

    #[test]
    fn test_in_list_composite() {
        let rows = id_rows(&[(1, "a"), (2, "b")]);
        let expr = InListRestrictionProducer
            .produce_restriction(&rows, &composite_target().qualified("orders"))
            .unwrap();
        assert_eq!(
            expr.build_with_dialect(Dialect::Sqlite).sql,
            "(\"orders\".\"region\", \"orders\".\"no\") IN ((?1, ?2), (?3, ?4))"
        );
    }

    #[test]
    fn test_disjunction_composite() {
        let rows = id_rows(&[(1, "a"), (2, "b")]);
        let expr = DisjunctionRestrictionProducer
            .produce_restriction(&rows, &composite_target())
            .unwrap();
        assert_eq!(
            expr.build_with_dialect(Dialect::Postgres).sql,
            "((\"region\" = $1 AND \"no\" = $2) OR (\"region\" = $3 AND \"no\" = $4))"
        );
    }

    #[test]
    fn test_disjunction_composes_under_and() {
        let rows = vec![
            Row::new(vec!["id".into()], vec![Value::BigInt(1)]),
            Row::new(vec!["id".into()], vec![Value::BigInt(2)]),
        ];
        let target = RestrictionTarget::contiguous(&["id".to_string()], 0);
        let expr = DisjunctionRestrictionProducer
            .produce_restriction(&rows, &target)
            .unwrap()
            .and(Expr::col("deleted").eq(false));
        assert_eq!(
            expr.build_with_dialect(Dialect::Postgres).sql,
            "((\"id\" = $1) OR (\"id\" = $2)) AND \"deleted\" = $3"
        );
    }

    #[test]
    fn test_producers_select_same_rows_for_composite_keys() {
        let matched = id_rows(&[(1, "a"), (2, "b"), (1, "c")]);
        let target = composite_target();
        let in_list = InListRestrictionProducer.produce_restriction(&matched, &target).unwrap();
        let disjunction = DisjunctionRestrictionProducer
            .produce_restriction(&matched, &target)
            .unwrap();

        let keys = [(1, "a"), (1, "b"), (2, "b"), (2, "a"), (1, "c"), (3, "c")];
        let table: Vec<HashMap<&str, Value>> = keys
            .iter()
            .map(|(r, n)| {
                HashMap::from([
                    ("region", Value::BigInt(*r)),
                    ("no", Value::Text((*n).to_string())),
                ])
            })
            .collect();

        let select = |expr: &Expr| -> Vec<usize> {
            table
                .iter()
                .enumerate()
                .filter(|(_, row)| eval(expr, row) == Value::Bool(true))
                .map(|(i, _)| i)
                .collect()
        };
        assert_eq!(select(&in_list), vec![0, 2, 4]);
        assert_eq!(select(&in_list), select(&disjunction));
    }

    #[test]
    fn test_values_at_positions() {
        let row = Row::new(
            vec!["id".into(), "email".into(), "code".into()],
            vec![Value::BigInt(1), Value::Text("x@y".into()), Value::Int(9)],
        );
        let target =
            RestrictionTarget::at_positions(&["c".to_string(), "e".to_string()], vec![2, 1]);
        assert_eq!(
            target.values(&row).unwrap(),
            vec![Value::Int(9), Value::Text("x@y".into())]
        );
        let narrow = RestrictionTarget::contiguous(&["x".to_string()], 5);
        assert!(narrow.values(&row).is_err());
    }

    #[test]
    fn test_table_value_constructor_always_fails() {
        let rows = id_rows(&[(1, "a")]);
        let err = TableValueConstructorRestrictionProducer
            .produce_restriction(&rows, &composite_target())
            .unwrap_err();
        assert!(matches!(err, Error::NotYetImplemented(_)));
    }

    #[test]
    fn test_default_strategy_is_in_list_everywhere() {
        for dialect in [Dialect::Postgres, Dialect::Sqlite, Dialect::Mysql] {
            assert_eq!(default_strategy(dialect), RestrictionStrategy::InList);
            assert_eq!(
                default_strategy(dialect).producer().strategy(),
                RestrictionStrategy::InList
            );
        }
    }
}
