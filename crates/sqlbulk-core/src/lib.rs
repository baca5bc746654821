//! Core types and traits for sqlbulk.
//!
//! This crate provides the foundations shared by the query renderer and the
//! bulk mutation handlers:
//!
//! - `EntityMapping` metadata describing an entity's tables
//! - `TableOrderer` for foreign-key aware table ordering
//! - `Connection` trait the handlers execute statements through
//! - `Value` and `Row` for parameters and results
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod dialect;
pub mod error;
pub mod mapping;
pub mod ordering;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use dialect::Dialect;
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind, Result,
    SchemaError, SchemaErrorKind, SemanticError, SemanticErrorKind, TypeError,
};
pub use mapping::{
    CollectionTable, DiscriminatorMapping, EntityMapping, EntityTable, KeyTarget,
    SoftDeleteIndicator, SoftDeleteMapping, SoftDeleteStrategy,
};
pub use ordering::TableOrderer;
pub use row::{ColumnInfo, Row};
pub use value::Value;
