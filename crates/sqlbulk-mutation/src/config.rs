//! Bulk mutation configuration.

use serde::{Deserialize, Serialize};
use sqlbulk_core::Dialect;

/// How per-table statements are restricted to the matched ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionStrategy {
    /// `key IN (...)`, or `(k1, k2) IN ((...), ...)` for composite keys.
    InList,
    /// `(key = v1) OR (key = v2) OR ...`.
    Disjunction,
    /// Join against a table value constructor. Not implemented.
    TableValueConstructor,
}

/// Configuration for bulk mutation handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Restriction strategy; `None` selects the dialect default.
    pub restriction: Option<RestrictionStrategy>,
    /// Maximum matched rows per batch of per-table statements.
    pub batch_size: usize,
    /// Use a `VALUES` row source for fallback inserts where the dialect
    /// supports one.
    pub use_values_row_source: bool,
    /// Maximum handlers cached by the executor.
    pub handler_cache_size: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            restriction: None,
            batch_size: 1000,
            use_values_row_source: true,
            handler_cache_size: 256,
        }
    }
}

impl MutationConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a restriction strategy.
    pub fn restriction(mut self, strategy: RestrictionStrategy) -> Self {
        self.restriction = Some(strategy);
        self
    }

    /// Set the batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Enable or disable `VALUES` row sources for fallback inserts.
    pub fn use_values_row_source(mut self, enabled: bool) -> Self {
        self.use_values_row_source = enabled;
        self
    }

    /// Set the executor's handler cache size.
    pub fn handler_cache_size(mut self, size: usize) -> Self {
        self.handler_cache_size = size;
        self
    }

    /// The restriction strategy for a dialect.
    pub fn restriction_strategy(&self, dialect: Dialect) -> RestrictionStrategy {
        self.restriction
            .unwrap_or_else(|| crate::restriction::default_strategy(dialect))
    }

    /// Rows per batch given the key width and the placeholders a statement
    /// needs besides the restriction.
    ///
    /// Never less than one.
    pub fn effective_batch_size(
        &self,
        dialect: Dialect,
        key_width: usize,
        reserved: usize,
    ) -> usize {
        let budget = dialect.max_bind_parameters().saturating_sub(reserved);
        let by_params = budget / key_width.max(1);
        self.batch_size.min(by_params).max(1)
    }
}
