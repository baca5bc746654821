//! Error types for sqlbulk operations.

use std::fmt;

/// The primary error type for all sqlbulk operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors raised by drivers
    Connection(ConnectionError),
    /// Query execution errors raised by drivers
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Invalid entity mapping
    Schema(SchemaError),
    /// Statement cannot be interpreted against the entity mapping
    Semantic(SemanticError),
    /// Configuration errors
    Config(ConfigError),
    /// A strategy or feature that is deliberately not implemented
    NotYetImplemented(&'static str),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Deadlock detected
    Deadlock,
    /// Serialization failure
    Serialization,
    /// Statement timeout
    Timeout,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// A referenced table is not part of the mapping
    TableNotFound,
    /// A referenced column is not part of the mapping
    ColumnNotFound,
    /// Table foreign keys form a cycle
    CyclicDependency,
    /// Invalid mapping definition
    Invalid,
}

#[derive(Debug)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    /// Column name not found on any table of the entity
    UnknownColumn,
    /// Unqualified column name present on several tables
    AmbiguousColumn,
    /// One assignment targets columns of more than one table
    MultiTableAssignment,
    /// Assignment targets a key column
    KeyAssignment,
    /// Assignment value reads columns outside the assigned table
    CrossTableReference,
    /// Tuple assignment arity does not match its value
    ArityMismatch,
    /// UPDATE without any assignment
    EmptyAssignments,
    /// Execution-time parameter referenced but not supplied
    MissingParameter,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Shorthand for a schema error.
    pub fn schema(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Error::Schema(SchemaError {
            kind,
            message: message.into(),
        })
    }

    /// Shorthand for a semantic error.
    pub fn semantic(kind: SemanticErrorKind, message: impl Into<String>) -> Self {
        Error::Semantic(SemanticError {
            kind,
            message: message.into(),
        })
    }

    /// Get SQLSTATE if available (e.g., "23503" for foreign key violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// The semantic error kind, if this is a semantic error.
    pub fn semantic_kind(&self) -> Option<SemanticErrorKind> {
        match self {
            Error::Semantic(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The schema error kind, if this is a schema error.
    pub fn schema_kind(&self) -> Option<SchemaErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a foreign key violation?
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23503")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Schema(e) => write!(f, "Mapping error: {}", e.message),
            Error::Semantic(e) => write!(f, "Semantic error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::NotYetImplemented(what) => write!(f, "Not yet implemented: {}", what),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<SemanticError> for Error {
    fn from(err: SemanticError) -> Self {
        Error::Semantic(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for sqlbulk operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_helpers() {
        let query = QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("DELETE FROM \"person\"".to_string()),
            sqlstate: Some("23503".to_string()),
            message: "foreign key violation".to_string(),
            source: None,
        };
        assert!(query.is_foreign_key_violation());

        let err = Error::Query(query);
        assert_eq!(err.sqlstate(), Some("23503"));
        assert_eq!(err.sql(), Some("DELETE FROM \"person\""));
    }

    #[test]
    fn driver_errors_keep_their_source() {
        use std::error::Error as _;

        let err = Error::from(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "server closed the connection".to_string(),
            source: Some("broken pipe".into()),
        });
        assert_eq!(err.to_string(), "Connection error: server closed the connection");
        assert_eq!(err.source().map(|e| e.to_string()), Some("broken pipe".to_string()));
        assert!(Error::NotYetImplemented("x").source().is_none());
    }

    #[test]
    fn semantic_and_schema_kinds() {
        let err = Error::semantic(SemanticErrorKind::AmbiguousColumn, "column 'name' is ambiguous");
        assert_eq!(err.semantic_kind(), Some(SemanticErrorKind::AmbiguousColumn));
        assert_eq!(err.schema_kind(), None);
        assert_eq!(err.to_string(), "Semantic error: column 'name' is ambiguous");

        let err = Error::schema(SchemaErrorKind::CyclicDependency, "cycle");
        assert_eq!(err.schema_kind(), Some(SchemaErrorKind::CyclicDependency));
    }

    #[test]
    fn not_yet_implemented_display() {
        let err = Error::NotYetImplemented("table value constructor restriction");
        assert_eq!(
            err.to_string(),
            "Not yet implemented: table value constructor restriction"
        );
    }
}
