//! Tables, indexes and sequence definitions.

use std::collections::HashSet;

use bitflags::bitflags;
use jogasaki_common::DefinitionId;

use super::column::Column;
use super::{CatalogError, CatalogResult};
use crate::codec::Order;

/// A table: an ordered list of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    id: DefinitionId,
    name: String,
    columns: Vec<Column>,
}

impl Table {
    /// Creates a table; the id is assigned when the provider adds it.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            id: DefinitionId::INVALID,
            name: name.into(),
            columns,
        }
    }

    /// Replaces the id.
    #[must_use]
    pub fn with_id(mut self, id: DefinitionId) -> Self {
        self.id = id;
        self
    }

    /// Definition id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> DefinitionId {
        self.id
    }

    /// Table name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Position of the column named `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Column named `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Position of `name`, or `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> CatalogResult<usize> {
        self.column_index(name).ok_or_else(|| CatalogError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    /// Checks names and column types.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.name.is_empty() {
            return Err(CatalogError::InvalidDefinition("table name is empty".into()));
        }
        if self.columns.is_empty() {
            return Err(CatalogError::InvalidDefinition(format!(
                "table '{}' has no columns",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for c in &self.columns {
            if !seen.insert(c.name()) {
                return Err(CatalogError::InvalidDefinition(format!(
                    "duplicate column '{}' in table '{}'",
                    c.name(),
                    self.name
                )));
            }
            c.field_type().validate().map_err(|e| {
                CatalogError::InvalidDefinition(format!("column '{}': {e}", c.name()))
            })?;
        }
        Ok(())
    }
}

/// Direction of an index key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Ascending,
    /// Descending.
    Descending,
}

impl From<SortDirection> for Order {
    fn from(d: SortDirection) -> Self {
        match d {
            SortDirection::Ascending => Order::Ascending,
            SortDirection::Descending => Order::Descending,
        }
    }
}

/// A key column of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    /// Column name.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

impl IndexKey {
    /// Ascending key on `column`.
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending key on `column`.
    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

bitflags! {
    /// Index features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IndexFeatures: u8 {
        /// The table's primary index.
        const PRIMARY = 0b0000_0001;
        /// Keys are unique.
        const UNIQUE = 0b0000_0010;
        /// Uniqueness is a declared constraint.
        const UNIQUE_CONSTRAINT = 0b0000_0100;
        /// Usable for point lookups.
        const FIND = 0b0000_1000;
        /// Usable for range scans.
        const SCAN = 0b0001_0000;
    }
}

/// An index over a table.
///
/// The primary index carries the table's name; every index is stored in a
/// KV storage of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    id: DefinitionId,
    name: String,
    table_name: String,
    keys: Vec<IndexKey>,
    values: Vec<String>,
    features: IndexFeatures,
    description: String,
}

impl Index {
    /// Creates an index from its parts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        keys: Vec<IndexKey>,
        values: Vec<String>,
        features: IndexFeatures,
    ) -> Self {
        Self {
            id: DefinitionId::INVALID,
            name: name.into(),
            table_name: table_name.into(),
            keys,
            values,
            features,
            description: String::new(),
        }
    }

    /// The primary index of `table`: every non-key column is a value column.
    #[must_use]
    pub fn primary(table: &Table, keys: Vec<IndexKey>) -> Self {
        let values = table
            .columns()
            .iter()
            .map(Column::name)
            .filter(|name| !keys.iter().any(|k| k.column == *name))
            .map(str::to_string)
            .collect();
        Self::new(
            table.name(),
            table.name(),
            keys,
            values,
            IndexFeatures::PRIMARY
                | IndexFeatures::UNIQUE
                | IndexFeatures::UNIQUE_CONSTRAINT
                | IndexFeatures::FIND
                | IndexFeatures::SCAN,
        )
    }

    /// A non-unique secondary index.
    #[must_use]
    pub fn secondary(name: impl Into<String>, table_name: impl Into<String>, keys: Vec<IndexKey>) -> Self {
        Self::new(
            name,
            table_name,
            keys,
            Vec::new(),
            IndexFeatures::FIND | IndexFeatures::SCAN,
        )
    }

    /// Replaces the id.
    #[must_use]
    pub fn with_id(mut self, id: DefinitionId) -> Self {
        self.id = id;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Definition id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> DefinitionId {
        self.id
    }

    /// Index name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the KV storage holding the entries.
    #[inline]
    #[must_use]
    pub fn storage_name(&self) -> &str {
        &self.name
    }

    /// Name of the indexed table.
    #[inline]
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Key columns in order.
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    /// Value column names.
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Features.
    #[inline]
    #[must_use]
    pub fn features(&self) -> IndexFeatures {
        self.features
    }

    /// Description.
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true for the primary index.
    #[inline]
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.features.contains(IndexFeatures::PRIMARY)
    }

    /// Resolves key columns against `table`.
    pub fn key_positions(&self, table: &Table) -> CatalogResult<Vec<(usize, SortDirection)>> {
        self.keys
            .iter()
            .map(|k| Ok((table.require_column(&k.column)?, k.direction)))
            .collect()
    }

    /// Resolves value columns against `table`.
    pub fn value_positions(&self, table: &Table) -> CatalogResult<Vec<usize>> {
        self.values.iter().map(|v| table.require_column(v)).collect()
    }

    /// Checks the index against its table.
    pub fn validate(&self, table: &Table) -> CatalogResult<()> {
        if self.keys.is_empty() {
            return Err(CatalogError::InvalidDefinition(format!(
                "index '{}' has no key columns",
                self.name
            )));
        }
        for (pos, _) in self.key_positions(table)? {
            let column = &table.columns()[pos];
            if column.field_type().kind().is_lob() {
                return Err(CatalogError::InvalidDefinition(format!(
                    "column '{}' of kind {} cannot be an index key",
                    column.name(),
                    column.field_type().kind()
                )));
            }
        }
        self.value_positions(table)?;
        Ok(())
    }
}

/// A sequence definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDefinition {
    id: DefinitionId,
    name: String,
    /// First value handed out.
    pub initial_value: i64,
    /// Step between values.
    pub increment: i64,
    /// Lower bound.
    pub min_value: i64,
    /// Upper bound.
    pub max_value: i64,
    /// Wrap around at the bounds instead of failing.
    pub cycle: bool,
}

impl SequenceDefinition {
    /// `1, 2, 3, ...` up to `i64::MAX`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DefinitionId::INVALID,
            name: name.into(),
            initial_value: 1,
            increment: 1,
            min_value: 1,
            max_value: i64::MAX,
            cycle: false,
        }
    }

    /// Replaces the id.
    #[must_use]
    pub fn with_id(mut self, id: DefinitionId) -> Self {
        self.id = id;
        self
    }

    /// Definition id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> DefinitionId {
        self.id
    }

    /// Sequence name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks the bounds.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.increment == 0 {
            return Err(CatalogError::InvalidDefinition(format!(
                "sequence '{}' has a zero increment",
                self.name
            )));
        }
        if !(self.min_value <= self.initial_value && self.initial_value <= self.max_value) {
            return Err(CatalogError::InvalidDefinition(format!(
                "sequence '{}' initial value {} outside [{}, {}]",
                self.name, self.initial_value, self.min_value, self.max_value
            )));
        }
        Ok(())
    }
}
