//! SQL text rendering with deferred parameter binding.
//!
//! Statements are rendered once into a [`CompiledStatement`]: the SQL text
//! plus one [`Binding`] per placeholder. A binding is either a value fixed
//! at render time (a literal) or a reference to an execution-time parameter,
//! resolved by [`CompiledStatement::bind`]. This lets a handler compile its
//! statements when it is created and reuse them for every execution.

use sqlbulk_core::error::SemanticErrorKind;
use sqlbulk_core::{Dialect, Error, Result, Value};

/// Source of the value bound to one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Value known when the statement was rendered.
    Value(Value),
    /// The n-th (1-based) execution-time parameter.
    Param(usize),
}

/// Accumulates SQL text and placeholder bindings for one statement.
#[derive(Debug)]
pub struct SqlWriter {
    dialect: Dialect,
    sql: String,
    bindings: Vec<Binding>,
}

impl SqlWriter {
    /// Create an empty writer for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            bindings: Vec::new(),
        }
    }

    /// The dialect being rendered.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Append a quoted identifier. A `schema.name` identifier is quoted per part.
    pub fn push_identifier(&mut self, name: &str) {
        for (i, part) in name.split('.').enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            let quoted = self.dialect.quote_identifier(part);
            self.sql.push_str(&quoted);
        }
    }

    /// Append a column reference, qualified when a table is given.
    pub fn push_column(&mut self, table: Option<&str>, column: &str) {
        if let Some(table) = table {
            self.push_identifier(table);
            self.sql.push('.');
        }
        let quoted = self.dialect.quote_identifier(column);
        self.sql.push_str(&quoted);
    }

    /// Append a comma separated list of quoted identifiers.
    pub fn push_identifier_list<S: AsRef<str>>(&mut self, names: &[S]) {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            let quoted = self.dialect.quote_identifier(name.as_ref());
            self.sql.push_str(&quoted);
        }
    }

    /// Append a placeholder bound to a literal value.
    pub fn bind_value(&mut self, value: Value) {
        self.bind(Binding::Value(value));
    }

    /// Append a placeholder bound to an execution-time parameter.
    pub fn bind_param(&mut self, index: usize) {
        self.bind(Binding::Param(index));
    }

    fn bind(&mut self, binding: Binding) {
        self.bindings.push(binding);
        let placeholder = self.dialect.placeholder(self.bindings.len());
        self.sql.push_str(&placeholder);
    }

    /// SQL rendered so far.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Finish rendering.
    pub fn finish(self) -> CompiledStatement {
        CompiledStatement {
            sql: self.sql,
            bindings: self.bindings,
        }
    }
}

/// Rendered SQL with its placeholder bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// SQL text.
    pub sql: String,
    /// One binding per placeholder, in placeholder order.
    pub bindings: Vec<Binding>,
}

impl CompiledStatement {
    /// Number of placeholders.
    pub fn placeholder_count(&self) -> usize {
        self.bindings.len()
    }

    /// Highest execution-time parameter index referenced, or 0.
    pub fn max_param_index(&self) -> usize {
        self.bindings
            .iter()
            .filter_map(|b| match b {
                Binding::Param(i) => Some(*i),
                Binding::Value(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Resolve bindings against execution-time parameters.
    ///
    /// Returns a `MissingParameter` semantic error if a referenced parameter
    /// was not supplied.
    #[allow(clippy::result_large_err)]
    pub fn bind(&self, params: &[Value]) -> Result<Vec<Value>> {
        self.bindings
            .iter()
            .map(|binding| match binding {
                Binding::Value(v) => Ok(v.clone()),
                Binding::Param(i) => i
                    .checked_sub(1)
                    .and_then(|idx| params.get(idx))
                    .cloned()
                    .ok_or_else(|| {
                        Error::semantic(
                            SemanticErrorKind::MissingParameter,
                            format!(
                                "statement references parameter {} but {} were supplied",
                                i,
                                params.len()
                            ),
                        )
                    }),
            })
            .collect()
    }
}
