//! Foreign-key aware ordering of entity tables.
//!
//! Rows in tables holding a foreign key must be removed before the rows they
//! reference. [`TableOrderer`] records table dependencies and produces a
//! deletion order (children first) and an insertion order (parents first).

use crate::Result;
use crate::error::{Error, SchemaErrorKind};

/// Orders tables by their foreign-key dependencies.
///
/// Ties are broken by registration order, so the result is deterministic.
/// Self references are ignored.
#[derive(Debug, Default)]
pub struct TableOrderer {
    /// (table, tables it depends on), in registration order.
    tables: Vec<(String, Vec<String>)>,
}

impl TableOrderer {
    /// Create a new orderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table and the tables it holds foreign keys to.
    ///
    /// Registering the same table twice merges its dependencies.
    pub fn register_table<'a>(
        &mut self,
        table: &str,
        depends_on: impl IntoIterator<Item = &'a str>,
    ) {
        let idx = match self.tables.iter().position(|(name, _)| name == table) {
            Some(idx) => idx,
            None => {
                self.tables.push((table.to_string(), Vec::new()));
                self.tables.len() - 1
            }
        };
        let deps = &mut self.tables[idx].1;
        for dep in depends_on {
            if dep != table && !deps.iter().any(|d| d == dep) {
                deps.push(dep.to_string());
            }
        }
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table was registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables ordered so that every table precedes the tables it depends on.
    ///
    /// Dependencies on unregistered tables are ignored. Returns a
    /// `CyclicDependency` schema error if the dependencies form a cycle.
    #[allow(clippy::result_large_err)]
    pub fn delete_order(&self) -> Result<Vec<String>> {
        let n = self.tables.len();
        // dependents[i]: number of not-yet-emitted tables depending on table i
        let mut dependents = vec![0usize; n];
        let edges: Vec<Vec<usize>> = self
            .tables
            .iter()
            .map(|(_, deps)| deps.iter().filter_map(|d| self.index_of(d)).collect())
            .collect();
        for targets in &edges {
            for &t in targets {
                dependents[t] += 1;
            }
        }

        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let next = (0..n).find(|&i| !emitted[i] && dependents[i] == 0);
            let Some(i) = next else {
                let remaining: Vec<&str> = (0..n)
                    .filter(|&i| !emitted[i])
                    .map(|i| self.tables[i].0.as_str())
                    .collect();
                return Err(Error::schema(
                    SchemaErrorKind::CyclicDependency,
                    format!(
                        "foreign keys between tables form a cycle: {}",
                        remaining.join(", ")
                    ),
                ));
            };
            emitted[i] = true;
            for &t in &edges[i] {
                dependents[t] -= 1;
            }
            order.push(self.tables[i].0.clone());
        }

        tracing::trace!(order = ?order, "Computed table delete order");
        Ok(order)
    }

    /// Tables ordered so that every table follows the tables it depends on.
    #[allow(clippy::result_large_err)]
    pub fn insert_order(&self) -> Result<Vec<String>> {
        let mut order = self.delete_order()?;
        order.reverse();
        Ok(order)
    }

    fn index_of(&self, table: &str) -> Option<usize> {
        self.tables.iter().position(|(name, _)| name == table)
    }
}
