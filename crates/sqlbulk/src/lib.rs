//! sqlbulk - multi-table bulk UPDATE and DELETE for Rust ORMs.
//!
//! An entity mapped onto several tables (joined inheritance, secondary
//! tables, element collections) cannot be bulk-mutated with one SQL
//! statement. sqlbulk selects the identifiers of the target rows once and
//! then issues one restricted statement per table, in foreign-key safe
//! order, through a connection you supply.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlbulk::prelude::*;
//!
//! let person = EntityMapping::new(
//!     "Person",
//!     EntityTable::new("person", &["id"]).columns(&["name", "age"]),
//! )
//! .with_table(EntityTable::new("employee", &["person_id"]).columns(&["salary"]))
//! .with_collection(CollectionTable::new("person_tags", &["person_id"]));
//!
//! async fn purge(cx: &Cx, conn: &impl Connection, person: EntityMapping) -> Outcome<u64, Error> {
//!     let statement = BulkDelete::new(person).filter(Expr::col("age").gt(Expr::placeholder(1)));
//!     let config = MutationConfig::default();
//!     let handler = match DeleteHandler::new(&statement, conn.dialect(), &config) {
//!         Ok(handler) => handler,
//!         Err(e) => return Outcome::Err(e),
//!     };
//!     // SELECT "person"."id" FROM "person" INNER JOIN "employee" ... WHERE "person"."age" > $1
//!     // DELETE FROM "person_tags" WHERE "person_id" IN (...)
//!     // DELETE FROM "employee" WHERE "person_id" IN (...)
//!     // DELETE FROM "person" WHERE "id" IN (...)
//!     handler.execute(cx, conn, &[Value::Int(90)]).await
//! }
//! ```
//!
//! # Crates
//!
//! - `sqlbulk-core`: entity mappings, table ordering, the `Connection` trait, values and errors
//! - `sqlbulk-query`: expression DSL and statement rendering per dialect
//! - `sqlbulk-mutation`: the matching-id select, restriction producers and the handlers

pub use sqlbulk_core::{
    CollectionTable, ColumnInfo, Connection, Cx, Dialect, DiscriminatorMapping, EntityMapping,
    EntityTable, Error, KeyTarget, Outcome, Result, Row, SoftDeleteIndicator, SoftDeleteMapping,
    SoftDeleteStrategy, TableOrderer, Value,
};
pub use sqlbulk_core::error::{
    ConfigError, ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind, SchemaError,
    SchemaErrorKind, SemanticError, SemanticErrorKind, TypeError,
};
pub use sqlbulk_mutation::{
    Assignment, BulkDelete, BulkUpdate, DeleteAction, DeleteHandler, DisjunctionRestrictionProducer,
    FallbackInsert, FallbackSource, InListRestrictionProducer, MatchingIdInterpretation,
    MatchingIdLayout, MatchingIdRestrictionProducer, MutationConfig, MutationExecutor,
    MutationReport, RestrictionStrategy, RestrictionTarget, RowCountMismatch, StatementKind,
    StatementReport, TableDeleter, TableUpdater, TableValueConstructorRestrictionProducer,
    UpdateHandler,
};
pub use sqlbulk_query::{CompiledStatement, Expr};

/// Everything needed to describe and run bulk mutations.
///
/// ```ignore
/// use sqlbulk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Assignment,
        BulkDelete,
        BulkUpdate,
        CollectionTable,
        Connection,
        Cx,
        DeleteHandler,
        Dialect,
        EntityMapping,
        EntityTable,
        Error,
        Expr,
        MutationConfig,
        MutationExecutor,
        MutationReport,
        Outcome,
        RestrictionStrategy,
        Result,
        Row,
        SoftDeleteMapping,
        SoftDeleteStrategy,
        StatementKind,
        UpdateHandler,
        Value,
    };
}
