//! Multi-table bulk UPDATE and DELETE for sqlbulk.
//!
//! An entity may span several tables: a root table holding the identifier,
//! secondary tables keyed by the same identifier (some of them optional),
//! and collection tables keyed by the identifier or by other root columns.
//! A single bulk statement against such an entity cannot be expressed as
//! one SQL statement portably, so the handlers here run it as:
//!
//! 1. A **matching-id select** ([`MatchingIdInterpretation`]) that applies
//!    the restriction once and returns the identifiers of every target row.
//! 2. One **per-table statement** per affected table, restricted to those
//!    identifiers by a [`MatchingIdRestrictionProducer`].
//!
//! [`DeleteHandler`] deletes collection rows first and then the entity's
//! tables children-first, or soft-deletes the root row when the entity has
//! a soft-delete indicator. [`UpdateHandler`] splits assignments by table
//! and inserts rows missing from optional tables.
//!
//! Every statement goes through the caller's [`Connection`]; the handlers
//! never begin or commit transactions.
//!
//! [`Connection`]: sqlbulk_core::Connection

pub mod assignment;
pub mod config;
pub mod delete;
mod dml;
pub mod executor;
pub mod matching;
pub mod report;
pub mod restriction;
pub mod soft_delete;
pub mod statement;
pub mod update;

#[cfg(test)]
mod testing;

pub use assignment::{Assignment, AssignmentTarget, TableAssignments, segment_assignments};
pub use config::{MutationConfig, RestrictionStrategy};
pub use delete::{DeleteAction, DeleteHandler, TableDeleter};
pub use executor::MutationExecutor;
pub use matching::{MatchingIdInterpretation, MatchingIdLayout};
pub use report::{MutationReport, RowCountMismatch, StatementKind, StatementReport};
pub use restriction::{
    DisjunctionRestrictionProducer, InListRestrictionProducer, MatchingIdRestrictionProducer,
    RestrictionTarget, TableValueConstructorRestrictionProducer, default_strategy,
};
pub use statement::{BulkDelete, BulkUpdate};
pub use update::{FallbackInsert, FallbackSource, TableUpdater, UpdateHandler};
