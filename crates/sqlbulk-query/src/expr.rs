//! SQL expressions.
//!
//! [`Expr`] is used for restrictions (WHERE), assignment values (SET) and
//! select lists. Expressions are rendered through a [`SqlWriter`], which
//! numbers placeholders and records what each one is bound to.

use crate::render::{CompiledStatement, SqlWriter};
use sqlbulk_core::{Dialect, Result, Value};

/// A SQL expression that can be used in WHERE, SET, select lists, etc.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference with optional table qualifier
    Column {
        /// Optional table name
        table: Option<String>,
        /// Column name
        name: String,
    },

    /// Literal value, bound when rendered
    Literal(Value),

    /// The n-th (1-based) execution-time parameter
    Placeholder(usize),

    /// Dialect-specific current timestamp
    CurrentTimestamp,

    /// Binary operation (e.g., a = b, a > b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation (e.g., NOT a, -a)
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Function call (e.g., UPPER(name))
    Function { name: String, args: Vec<Expr> },

    /// IN expression
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// BETWEEN expression
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE / NOT LIKE pattern
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },

    /// Row value constructor: (a, b, c)
    Tuple(Vec<Expr>),

    /// Raw SQL fragment (escape hatch)
    Raw(String),

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// String concatenation (||)
    Concat,
}

impl BinaryOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "||",
        }
    }

    /// Get the precedence of this operator (higher = binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 7,
            BinaryOp::Mul | BinaryOp::Div => 8,
        }
    }

    /// Whether `a op (b op c)` equals `(a op b) op c`.
    pub const fn is_associative(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Add | BinaryOp::Mul | BinaryOp::Concat
        )
    }

    const fn is_comparison(self) -> bool {
        self.precedence() == 3
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A column referenced by an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef<'a> {
    /// Table qualifier, if any.
    pub table: Option<&'a str>,
    /// Column name.
    pub name: &'a str,
}

impl Expr {
    // ==================== Constructors ====================

    /// Create a column reference expression.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Create a qualified column reference (table.column).
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Create a literal value expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create a NULL literal.
    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    /// Create a raw SQL expression (escape hatch).
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Reference the n-th (1-based) execution-time parameter.
    pub fn placeholder(index: usize) -> Self {
        Expr::Placeholder(index)
    }

    /// Row value constructor.
    pub fn tuple(items: Vec<Expr>) -> Self {
        Expr::Tuple(items)
    }

    /// Function call.
    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// Wrap in parentheses.
    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    // ==================== Comparison Operators ====================

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ==================== Logical Operators ====================

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self),
        }
    }

    /// AND together all expressions; `None` when there are none.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(|acc, e| acc.and(e))
    }

    /// OR together all expressions; `None` when there are none.
    pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(|acc, e| acc.or(e))
    }

    // ==================== Arithmetic ====================

    /// Addition (+)
    pub fn add(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    /// Subtraction (-)
    pub fn sub(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Sub, other)
    }

    /// Multiplication (*)
    pub fn mul(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Mul, other)
    }

    /// Division (/)
    pub fn div(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Div, other)
    }

    /// String concatenation (||)
    pub fn concat(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Concat, other)
    }

    /// Negation (-a)
    pub fn neg(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(self),
        }
    }

    // ==================== Predicates ====================

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// IN (values). An empty list renders as an always-false predicate.
    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        if values.is_empty() {
            return Expr::raw("1 = 0");
        }
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// NOT IN (values). An empty list renders as an always-true predicate.
    pub fn not_in(self, values: Vec<impl Into<Expr>>) -> Self {
        if values.is_empty() {
            return Expr::raw("1 = 1");
        }
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// BETWEEN low AND high
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    /// LIKE pattern match
    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// NOT LIKE pattern match
    pub fn not_like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: true,
        }
    }

    // ==================== Inspection ====================

    /// All column references, in rendering order.
    pub fn columns(&self) -> Vec<ColumnRef<'_>> {
        let mut out = Vec::new();
        self.visit(&mut |e| {
            if let Expr::Column { table, name } = e {
                out.push(ColumnRef {
                    table: table.as_deref(),
                    name,
                });
            }
        });
        out
    }

    /// Whether the expression references any column.
    pub fn has_columns(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Column { .. }));
        found
    }

    /// Whether the expression references any execution-time parameter.
    pub fn has_placeholders(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| found |= matches!(e, Expr::Placeholder(_)));
        found
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Unary { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Like { expr, .. }
            | Expr::Paren(expr) => expr.visit(f),
            Expr::Function { args: items, .. } | Expr::Tuple(items) => {
                for item in items {
                    item.visit(f);
                }
            }
            Expr::In { expr, values, .. } => {
                expr.visit(f);
                for v in values {
                    v.visit(f);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.visit(f);
                low.visit(f);
                high.visit(f);
            }
            Expr::Column { .. }
            | Expr::Literal(_)
            | Expr::Placeholder(_)
            | Expr::CurrentTimestamp
            | Expr::Raw(_) => {}
        }
    }

    /// Rebuild the expression, replacing every column reference with the
    /// result of `f(table, name)`.
    #[allow(clippy::result_large_err)]
    pub fn try_map_columns<F>(&self, f: &mut F) -> Result<Expr>
    where
        F: FnMut(Option<&str>, &str) -> Result<Expr>,
    {
        Ok(match self {
            Expr::Column { table, name } => f(table.as_deref(), name)?,
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(left.try_map_columns(f)?),
                op: *op,
                right: Box::new(right.try_map_columns(f)?),
            },
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.try_map_columns(f)?),
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.try_map_columns(f))
                    .collect::<Result<_>>()?,
            },
            Expr::In {
                expr,
                values,
                negated,
            } => Expr::In {
                expr: Box::new(expr.try_map_columns(f)?),
                values: values
                    .iter()
                    .map(|v| v.try_map_columns(f))
                    .collect::<Result<_>>()?,
                negated: *negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: Box::new(expr.try_map_columns(f)?),
                low: Box::new(low.try_map_columns(f)?),
                high: Box::new(high.try_map_columns(f)?),
                negated: *negated,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(expr.try_map_columns(f)?),
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: Box::new(expr.try_map_columns(f)?),
                pattern: pattern.clone(),
                negated: *negated,
            },
            Expr::Tuple(items) => Expr::Tuple(
                items
                    .iter()
                    .map(|i| i.try_map_columns(f))
                    .collect::<Result<_>>()?,
            ),
            Expr::Paren(expr) => Expr::Paren(Box::new(expr.try_map_columns(f)?)),
            Expr::Literal(_) | Expr::Placeholder(_) | Expr::CurrentTimestamp | Expr::Raw(_) => {
                self.clone()
            }
        })
    }

    // ==================== SQL Generation ====================

    /// Render this expression into a writer.
    pub fn write(&self, w: &mut SqlWriter) {
        match self {
            Expr::Column { table, name } => w.push_column(table.as_deref(), name),

            Expr::Literal(value) => w.bind_value(value.clone()),

            Expr::Placeholder(idx) => w.bind_param(*idx),

            Expr::CurrentTimestamp => {
                let ts = w.dialect().current_timestamp();
                w.push(ts);
            }

            Expr::Binary { left, op, right } => {
                if *op == BinaryOp::Concat && w.dialect() == Dialect::Mysql {
                    w.push("CONCAT(");
                    left.write(w);
                    w.push(", ");
                    right.write(w);
                    w.push(")");
                } else {
                    write_operand(left, *op, Side::Left, w);
                    w.push(" ");
                    w.push(op.as_str());
                    w.push(" ");
                    write_operand(right, *op, Side::Right, w);
                }
            }

            Expr::Unary { op, expr } => {
                match op {
                    UnaryOp::Not => w.push("NOT "),
                    UnaryOp::Neg => w.push("-"),
                }
                let wrap = matches!(**expr, Expr::Binary { .. });
                if wrap {
                    w.push("(");
                }
                expr.write(w);
                if wrap {
                    w.push(")");
                }
            }

            Expr::Function { name, args } => {
                w.push(name);
                w.push("(");
                write_list(args, w);
                w.push(")");
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                expr.write(w);
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                write_list(values, w);
                w.push(")");
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                expr.write(w);
                w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                low.write(w);
                w.push(" AND ");
                high.write(w);
            }

            Expr::IsNull { expr, negated } => {
                expr.write(w);
                w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                expr.write(w);
                w.push(if *negated { " NOT LIKE " } else { " LIKE " });
                w.bind_value(Value::Text(pattern.clone()));
            }

            Expr::Tuple(items) => {
                w.push("(");
                write_list(items, w);
                w.push(")");
            }

            Expr::Raw(sql) => w.push(sql),

            Expr::Paren(expr) => {
                w.push("(");
                expr.write(w);
                w.push(")");
            }
        }
    }

    /// Render this expression on its own.
    pub fn build_with_dialect(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect);
        self.write(&mut w);
        w.finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Operators group to the left, so a right operand of equal precedence keeps
/// its parentheses unless both sides use the same associative operator.
/// Comparisons never chain.
fn needs_parens(child: BinaryOp, parent: BinaryOp, side: Side) -> bool {
    if child.precedence() != parent.precedence() {
        return child.precedence() < parent.precedence();
    }
    match side {
        Side::Left => parent.is_comparison(),
        Side::Right => !(child == parent && parent.is_associative()),
    }
}

fn write_operand(operand: &Expr, parent: BinaryOp, side: Side, w: &mut SqlWriter) {
    let wrap = matches!(operand, Expr::Binary { op, .. } if needs_parens(*op, parent, side));
    if wrap {
        w.push("(");
    }
    operand.write(w);
    if wrap {
        w.push(")");
    }
}

fn write_list(items: &[Expr], w: &mut SqlWriter) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        item.write(w);
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}
