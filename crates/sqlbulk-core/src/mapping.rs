//! Entity mapping metadata.
//!
//! An [`EntityMapping`] describes how one logical entity is spread across
//! physical tables:
//!
//! - the **root** table, whose key columns are the entity identifier,
//! - additional entity tables (secondary tables, joined-subclass tables),
//!   each keyed by columns that reference the root identifier positionally,
//! - **collection** tables (element collections, many-to-many join tables)
//!   keyed by a foreign key to the identifier or to another root column set,
//! - an optional soft-delete indicator and an optional discriminator.
//!
//! Mappings are plain data: they can be built in code or loaded from JSON
//! with [`EntityMapping::from_json`], which validates them.

use crate::Result;
use crate::error::{Error, SchemaErrorKind, SemanticErrorKind};
use crate::ordering::TableOrderer;
use crate::value::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$";

static IDENTIFIER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN));

/// A physical table holding part of an entity's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTable {
    /// Table name (optionally schema-qualified as `schema.table`).
    pub name: String,
    /// Key columns. For the root table these are the identifier columns;
    /// for other tables they reference the identifier positionally.
    pub key_columns: Vec<String>,
    /// Non-key columns mapped to this table.
    #[serde(default)]
    pub columns: Vec<String>,
    /// The row in this table may be absent (nullable secondary table or
    /// joined-subclass table seen from a supertype).
    #[serde(default)]
    pub optional: bool,
    /// Other tables of the same entity this table holds a foreign key to.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl EntityTable {
    /// Create a table with the given key columns.
    pub fn new(name: impl Into<String>, key_columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            key_columns: key_columns.iter().map(|c| (*c).to_string()).collect(),
            columns: Vec::new(),
            optional: false,
            depends_on: Vec::new(),
        }
    }

    /// Set the non-key columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Mark the table as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Add a foreign-key dependency on another table of the entity.
    pub fn depends_on(mut self, table: impl Into<String>) -> Self {
        self.depends_on.push(table.into());
        self
    }

    /// Whether the column is one of this table's key or non-key columns.
    pub fn has_column(&self, column: &str) -> bool {
        self.key_columns.iter().any(|c| c == column) || self.columns.iter().any(|c| c == column)
    }
}

/// The columns a collection table's foreign key points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTarget {
    /// The entity identifier.
    #[default]
    Identifier,
    /// Other (unique) columns of the root table.
    Columns(Vec<String>),
}

/// A separate table holding collection rows owned by the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTable {
    /// Table name.
    pub name: String,
    /// Foreign-key columns referencing [`key_target`](Self::key_target).
    pub key_columns: Vec<String>,
    /// What the foreign key references.
    #[serde(default)]
    pub key_target: KeyTarget,
    /// Rows are removed by the database (`ON DELETE CASCADE`).
    #[serde(default)]
    pub cascade_delete: bool,
    /// Collection rows are soft-deleted rather than removed.
    #[serde(default)]
    pub soft_delete: Option<SoftDeleteMapping>,
}

impl CollectionTable {
    /// Create a collection table keyed by the entity identifier.
    pub fn new(name: impl Into<String>, key_columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            key_columns: key_columns.iter().map(|c| (*c).to_string()).collect(),
            key_target: KeyTarget::Identifier,
            cascade_delete: false,
            soft_delete: None,
        }
    }

    /// Key the collection by root columns other than the identifier.
    pub fn targeting(mut self, columns: &[&str]) -> Self {
        self.key_target = KeyTarget::Columns(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// Mark the collection rows as removed by `ON DELETE CASCADE`.
    pub fn cascade_delete(mut self) -> Self {
        self.cascade_delete = true;
        self
    }

    /// Soft-delete collection rows.
    pub fn soft_delete(mut self, mapping: SoftDeleteMapping) -> Self {
        self.soft_delete = Some(mapping);
        self
    }
}

/// How the soft-delete indicator column encodes deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftDeleteStrategy {
    /// Indicator holds the "deleted" value once the row is deleted.
    #[default]
    Deleted,
    /// Indicator holds the "active" value while the row is live.
    Active,
    /// Indicator is NULL while live and receives the deletion timestamp.
    Timestamp,
}

/// Resolved indicator semantics of a [`SoftDeleteMapping`].
#[derive(Debug, Clone, PartialEq)]
pub enum SoftDeleteIndicator {
    /// Boolean-like flag column.
    Flag {
        /// Value written when deleting.
        deleted: Value,
        /// Value identifying live rows.
        live: Value,
    },
    /// Timestamp column, NULL while live.
    Timestamp,
}

/// Soft-delete indicator of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftDeleteMapping {
    /// Indicator column.
    pub column: String,
    /// Indicator encoding.
    #[serde(default)]
    pub strategy: SoftDeleteStrategy,
    /// Custom (deleted, live) values for flag strategies, e.g. `'Y'`/`'N'`.
    #[serde(default)]
    pub values: Option<(Value, Value)>,
}

impl SoftDeleteMapping {
    /// Create a soft-delete mapping on the given column.
    pub fn new(column: impl Into<String>, strategy: SoftDeleteStrategy) -> Self {
        Self {
            column: column.into(),
            strategy,
            values: None,
        }
    }

    /// Use custom (deleted, live) indicator values.
    pub fn with_values(mut self, deleted: impl Into<Value>, live: impl Into<Value>) -> Self {
        self.values = Some((deleted.into(), live.into()));
        self
    }

    /// Resolve the indicator semantics.
    pub fn indicator(&self) -> SoftDeleteIndicator {
        match (self.strategy, &self.values) {
            (SoftDeleteStrategy::Timestamp, _) => SoftDeleteIndicator::Timestamp,
            (_, Some((deleted, live))) => SoftDeleteIndicator::Flag {
                deleted: deleted.clone(),
                live: live.clone(),
            },
            (SoftDeleteStrategy::Deleted, None) => SoftDeleteIndicator::Flag {
                deleted: Value::Bool(true),
                live: Value::Bool(false),
            },
            (SoftDeleteStrategy::Active, None) => SoftDeleteIndicator::Flag {
                deleted: Value::Bool(false),
                live: Value::Bool(true),
            },
        }
    }
}

/// Single-table inheritance discriminator restricting rows to one subtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorMapping {
    /// Discriminator column on the root table.
    pub column: String,
    /// Value identifying this entity's rows.
    pub value: Value,
}

/// Mapping of one entity onto its physical tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    /// Entity name, used in diagnostics and logs.
    pub name: String,
    /// Root table; its key columns are the identifier.
    pub root: EntityTable,
    /// Secondary and joined-subclass tables.
    #[serde(default)]
    pub tables: Vec<EntityTable>,
    /// Collection tables owned by the entity.
    #[serde(default)]
    pub collection_tables: Vec<CollectionTable>,
    /// Soft-delete indicator on the root table.
    #[serde(default)]
    pub soft_delete: Option<SoftDeleteMapping>,
    /// Discriminator restriction.
    #[serde(default)]
    pub discriminator: Option<DiscriminatorMapping>,
}

impl EntityMapping {
    /// Create a mapping with only a root table.
    pub fn new(name: impl Into<String>, root: EntityTable) -> Self {
        Self {
            name: name.into(),
            root,
            tables: Vec::new(),
            collection_tables: Vec::new(),
            soft_delete: None,
            discriminator: None,
        }
    }

    /// Add a secondary or joined-subclass table.
    pub fn with_table(mut self, table: EntityTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Add a collection table.
    pub fn with_collection(mut self, table: CollectionTable) -> Self {
        self.collection_tables.push(table);
        self
    }

    /// Enable soft delete on the root table.
    pub fn with_soft_delete(mut self, mapping: SoftDeleteMapping) -> Self {
        self.soft_delete = Some(mapping);
        self
    }

    /// Restrict the entity to rows carrying a discriminator value.
    pub fn with_discriminator(
        mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.discriminator = Some(DiscriminatorMapping {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Parse and validate a mapping from JSON.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        let mapping: Self = serde_json::from_str(json)?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Identifier columns (the root table's key columns).
    pub fn identifier_columns(&self) -> &[String] {
        &self.root.key_columns
    }

    /// All entity tables, root first, in declaration order.
    pub fn all_tables(&self) -> impl Iterator<Item = &EntityTable> {
        std::iter::once(&self.root).chain(self.tables.iter())
    }

    /// Look up an entity table by name.
    pub fn table(&self, name: &str) -> Option<&EntityTable> {
        self.all_tables().find(|t| t.name == name)
    }

    /// Whether `name` is the root table.
    pub fn is_root(&self, name: &str) -> bool {
        self.root.name == name
    }

    /// Resolve a (possibly unqualified) column reference to the entity table owning it.
    ///
    /// Qualified references must name an entity table that maps the column.
    /// Unqualified references must be found on exactly one table; key columns
    /// of non-root tables only take part in qualified resolution since they
    /// repeat the identifier.
    #[allow(clippy::result_large_err)]
    pub fn resolve_column(&self, table: Option<&str>, column: &str) -> Result<&EntityTable> {
        if let Some(table_name) = table {
            let owner = self.table(table_name).ok_or_else(|| {
                Error::semantic(
                    SemanticErrorKind::UnknownColumn,
                    format!(
                        "table '{}' is not mapped by entity '{}'",
                        table_name, self.name
                    ),
                )
            })?;
            if !owner.has_column(column) {
                return Err(Error::semantic(
                    SemanticErrorKind::UnknownColumn,
                    format!("column '{}.{}' is not mapped", table_name, column),
                ));
            }
            return Ok(owner);
        }

        let mut candidates = self.all_tables().filter(|t| {
            t.columns.iter().any(|c| c == column)
                || (self.is_root(&t.name) && t.key_columns.iter().any(|c| c == column))
        });
        let first = candidates.next().ok_or_else(|| {
            Error::semantic(
                SemanticErrorKind::UnknownColumn,
                format!("column '{}' is not mapped by entity '{}'", column, self.name),
            )
        })?;
        if let Some(second) = candidates.next() {
            return Err(Error::semantic(
                SemanticErrorKind::AmbiguousColumn,
                format!(
                    "column '{}' is ambiguous between tables '{}' and '{}'",
                    column, first.name, second.name
                ),
            ));
        }
        Ok(first)
    }

    /// Root columns referenced by collection tables that are not the identifier,
    /// in first-use order without duplicates.
    pub fn collection_key_target_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for collection in &self.collection_tables {
            if let KeyTarget::Columns(columns) = &collection.key_target {
                for column in columns {
                    if seen.insert(column.clone()) {
                        out.push(column.clone());
                    }
                }
            }
        }
        out
    }

    /// Entity tables ordered so that tables holding foreign keys come before
    /// the tables they reference (deletion order).
    #[allow(clippy::result_large_err)]
    pub fn constraint_ordered_tables(&self) -> Result<Vec<&EntityTable>> {
        let mut orderer = TableOrderer::new();
        orderer.register_table(&self.root.name, self.root.depends_on.iter().map(String::as_str));
        for table in &self.tables {
            let deps = std::iter::once(self.root.name.as_str())
                .chain(table.depends_on.iter().map(String::as_str));
            orderer.register_table(&table.name, deps);
        }
        let order = orderer.delete_order()?;
        Ok(order
            .iter()
            .filter_map(|name| self.table(name))
            .collect())
    }

    /// Validate the mapping.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        let id_arity = self.root.key_columns.len();
        if id_arity == 0 {
            return Err(invalid(format!(
                "entity '{}' has no identifier columns",
                self.name
            )));
        }

        let mut table_names = HashSet::new();
        for table in self.all_tables() {
            check_identifier(&table.name)?;
            if !table_names.insert(table.name.as_str()) {
                return Err(invalid(format!("table '{}' is mapped twice", table.name)));
            }
            if table.key_columns.len() != id_arity {
                return Err(invalid(format!(
                    "table '{}' has {} key columns, identifier has {}",
                    table.name,
                    table.key_columns.len(),
                    id_arity
                )));
            }
            for column in table.key_columns.iter().chain(table.columns.iter()) {
                check_identifier(column)?;
            }
        }
        if self.root.optional {
            return Err(invalid(format!(
                "root table '{}' cannot be optional",
                self.root.name
            )));
        }

        for table in self.all_tables() {
            for dep in &table.depends_on {
                if !table_names.contains(dep.as_str()) {
                    return Err(Error::schema(
                        SchemaErrorKind::TableNotFound,
                        format!(
                            "table '{}' depends on '{}', which entity '{}' does not map",
                            table.name, dep, self.name
                        ),
                    ));
                }
            }
        }

        for collection in &self.collection_tables {
            check_identifier(&collection.name)?;
            let target_arity = match &collection.key_target {
                KeyTarget::Identifier => id_arity,
                KeyTarget::Columns(columns) => {
                    for column in columns {
                        if !self.root.has_column(column) {
                            return Err(Error::schema(
                                SchemaErrorKind::ColumnNotFound,
                                format!(
                                    "collection '{}' targets '{}', which is not a root column",
                                    collection.name, column
                                ),
                            ));
                        }
                    }
                    columns.len()
                }
            };
            if collection.key_columns.len() != target_arity || target_arity == 0 {
                return Err(invalid(format!(
                    "collection '{}' has {} key columns for a {}-column target",
                    collection.name,
                    collection.key_columns.len(),
                    target_arity
                )));
            }
            for column in &collection.key_columns {
                check_identifier(column)?;
            }
            if let Some(soft_delete) = &collection.soft_delete {
                check_identifier(&soft_delete.column)?;
            }
        }

        if let Some(soft_delete) = &self.soft_delete {
            check_identifier(&soft_delete.column)?;
        }
        if let Some(discriminator) = &self.discriminator {
            check_identifier(&discriminator.column)?;
        }

        self.constraint_ordered_tables().map(|_| ())
    }
}

fn invalid(message: String) -> Error {
    Error::schema(SchemaErrorKind::Invalid, message)
}

#[allow(clippy::result_large_err)]
fn check_identifier(name: &str) -> Result<()> {
    let regex = IDENTIFIER
        .as_ref()
        .map_err(|e| invalid(format!("identifier pattern failed to compile: {e}")))?;
    if regex.is_match(name) {
        Ok(())
    } else {
        Err(invalid(format!("'{}' is not a valid SQL identifier", name)))
    }
}
