//! SQL rendering for sqlbulk.
//!
//! `sqlbulk-query` is the **statement construction layer**. It provides the
//! expression DSL and the statement shapes the bulk mutation handlers emit:
//!
//! - **Expressions**: `Expr` for restrictions, assignment values and select lists.
//! - **Statements**: `Select` (with joins and `VALUES` row sources), `Delete`,
//!   `Update` and `InsertSelect`.
//! - **Deferred binding**: statements compile once into a `CompiledStatement`
//!   whose placeholders are bound to literals or execution-time parameters.
//! - **Caching**: `StatementCache`, a small LRU keyed by `cache_key`.
//!
//! All SQL is rendered for a `Dialect` from `sqlbulk-core`.

pub mod cache;
pub mod expr;
pub mod render;
pub mod statement;

pub use cache::{StatementCache, cache_key};
pub use expr::{BinaryOp, ColumnRef, Expr, UnaryOp};
pub use render::{Binding, CompiledStatement, SqlWriter};
pub use statement::{Delete, FromItem, InsertSelect, Join, JoinType, Select, Update};
