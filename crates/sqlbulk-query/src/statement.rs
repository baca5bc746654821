//! SELECT, DELETE, UPDATE and INSERT ... SELECT statements.

use crate::expr::Expr;
use crate::render::{CompiledStatement, SqlWriter};
use sqlbulk_core::Dialect;

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Type of join
    pub join_type: JoinType,
    /// Table to join
    pub table: String,
    /// ON condition
    pub on: Expr,
}

impl Join {
    /// Create an INNER JOIN.
    pub fn inner(table: impl Into<String>, on: Expr) -> Self {
        Self {
            join_type: JoinType::Inner,
            table: table.into(),
            on,
        }
    }

    /// Create a LEFT JOIN.
    pub fn left(table: impl Into<String>, on: Expr) -> Self {
        Self {
            join_type: JoinType::Left,
            table: table.into(),
            on,
        }
    }

    fn write(&self, w: &mut SqlWriter) {
        w.push(" ");
        w.push(self.join_type.as_str());
        w.push(" ");
        w.push_identifier(&self.table);
        w.push(" ON ");
        self.on.write(w);
    }
}

/// Row source of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// A table.
    Table(String),
    /// An inline `(VALUES (...), ...) AS alias (columns)` derived table.
    Values {
        rows: Vec<Vec<Expr>>,
        alias: String,
        columns: Vec<String>,
    },
}

impl FromItem {
    fn write(&self, w: &mut SqlWriter) {
        match self {
            FromItem::Table(name) => w.push_identifier(name),
            FromItem::Values {
                rows,
                alias,
                columns,
            } => {
                w.push("(VALUES ");
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    w.push("(");
                    for (j, value) in row.iter().enumerate() {
                        if j > 0 {
                            w.push(", ");
                        }
                        value.write(w);
                    }
                    w.push(")");
                }
                w.push(") AS ");
                w.push_identifier(alias);
                w.push(" (");
                w.push_identifier_list(columns);
                w.push(")");
            }
        }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    columns: Vec<Expr>,
    from: FromItem,
    joins: Vec<Join>,
    filter: Option<Expr>,
}

impl Select {
    /// Select from a row source.
    pub fn from(from: FromItem) -> Self {
        Self {
            columns: Vec::new(),
            from,
            joins: Vec::new(),
            filter: None,
        }
    }

    /// Select from a table.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self::from(FromItem::Table(table.into()))
    }

    /// Add a select-list item.
    pub fn column(mut self, expr: Expr) -> Self {
        self.columns.push(expr);
        self
    }

    /// Add several select-list items.
    pub fn columns(mut self, exprs: impl IntoIterator<Item = Expr>) -> Self {
        self.columns.extend(exprs);
        self
    }

    /// Add a join.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Joins added so far.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Render into a writer.
    pub fn write(&self, w: &mut SqlWriter) {
        w.push("SELECT ");
        if self.columns.is_empty() {
            w.push("*");
        }
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            col.write(w);
        }
        w.push(" FROM ");
        self.from.write(w);
        for join in &self.joins {
            join.write(w);
        }
        write_where(self.filter.as_ref(), w);
    }

    /// Build the SELECT SQL with its bindings.
    pub fn build_with_dialect(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect);
        self.write(&mut w);
        w.finish()
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    filter: Option<Expr>,
}

impl Delete {
    /// Create a DELETE for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Build the DELETE SQL with its bindings.
    pub fn build_with_dialect(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect);
        w.push("DELETE FROM ");
        w.push_identifier(&self.table);
        write_where(self.filter.as_ref(), &mut w);
        w.finish()
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    sets: Vec<(String, Expr)>,
    filter: Option<Expr>,
}

impl Update {
    /// Create an UPDATE for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            filter: None,
        }
    }

    /// Add a `column = value` assignment.
    pub fn set(mut self, column: impl Into<String>, value: Expr) -> Self {
        self.sets.push((column.into(), value));
        self
    }

    /// Add a WHERE condition, ANDed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Build the UPDATE SQL with its bindings.
    pub fn build_with_dialect(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect);
        w.push("UPDATE ");
        w.push_identifier(&self.table);
        w.push(" SET ");
        for (i, (column, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push_column(None, column);
            w.push(" = ");
            value.write(&mut w);
        }
        write_where(self.filter.as_ref(), &mut w);
        w.finish()
    }
}

/// An `INSERT INTO table (columns) SELECT ...` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSelect {
    table: String,
    columns: Vec<String>,
    select: Select,
}

impl InsertSelect {
    /// Create an INSERT ... SELECT.
    pub fn new(table: impl Into<String>, columns: Vec<String>, select: Select) -> Self {
        Self {
            table: table.into(),
            columns,
            select,
        }
    }

    /// Build the INSERT SQL with its bindings.
    pub fn build_with_dialect(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect);
        w.push("INSERT INTO ");
        w.push_identifier(&self.table);
        w.push(" (");
        w.push_identifier_list(&self.columns);
        w.push(") ");
        self.select.write(&mut w);
        w.finish()
    }
}

fn write_where(filter: Option<&Expr>, w: &mut SqlWriter) {
    if let Some(expr) = filter {
        w.push(" WHERE ");
        expr.write(w);
    }
}
