//! In-memory catalog provider.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use jogasaki_common::DefinitionId;
use parking_lot::RwLock;
use tracing::debug;

use super::column::ColumnDefault;
use super::table::{Index, SequenceDefinition, Table};
use super::{CatalogError, CatalogResult};

/// A catalog object addressed by definition id.
#[derive(Debug, Clone)]
pub enum CatalogObject {
    /// A table.
    Table(Arc<Table>),
    /// An index.
    Index(Arc<Index>),
    /// A sequence.
    Sequence(Arc<SequenceDefinition>),
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, Arc<Table>>,
    indexes: BTreeMap<String, Arc<Index>>,
    sequences: BTreeMap<String, Arc<SequenceDefinition>>,
    by_id: HashMap<DefinitionId, CatalogObject>,
}

/// Owner of every table, index and sequence definition.
///
/// Objects are immutable once added; DDL replaces them under the write lock
/// and readers keep the `Arc` they looked up.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::catalog::{Column, Index, IndexKey, StorageProvider, Table};
/// use jogasaki_sql::meta::FieldType;
///
/// let provider = StorageProvider::new();
/// let t = provider
///     .add_table(Table::new("T", vec![Column::new("C0", FieldType::Int4).not_null()]), false)
///     .unwrap();
/// provider.add_index(Index::primary(&t, vec![IndexKey::asc("C0")]), false).unwrap();
/// assert!(provider.find_primary_index("T").is_some());
/// ```
#[derive(Debug)]
pub struct StorageProvider {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl Default for StorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn assign_id(next: &AtomicU64, id: DefinitionId) -> DefinitionId {
    if id.is_valid() {
        next.fetch_max(id.as_u64() + 1, Ordering::Relaxed);
        id
    } else {
        DefinitionId::new(next.fetch_add(1, Ordering::Relaxed))
    }
}

impl StorageProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Adds a table, assigning an id if it has none.
    pub fn add_table(&self, table: Table, overwrite: bool) -> CatalogResult<Arc<Table>> {
        table.validate()?;
        let mut inner = self.inner.write();
        if let Some(old) = inner.tables.get(table.name()) {
            if !overwrite {
                return Err(CatalogError::AlreadyExists {
                    kind: "table",
                    name: table.name().to_string(),
                });
            }
            let old_id = old.id();
            inner.by_id.remove(&old_id);
        }
        let id = assign_id(&self.next_id, table.id());
        let table = Arc::new(table.with_id(id));
        inner
            .tables
            .insert(table.name().to_string(), Arc::clone(&table));
        inner.by_id.insert(id, CatalogObject::Table(Arc::clone(&table)));
        debug!(table = table.name(), %id, "table added");
        Ok(table)
    }

    /// Looks up a table.
    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        self.inner.read().tables.get(name).cloned()
    }

    /// Removes a table. Its indexes must be removed first.
    pub fn remove_table(&self, name: &str) -> CatalogResult<Arc<Table>> {
        let mut inner = self.inner.write();
        if let Some(index) = inner.indexes.values().find(|i| i.table_name() == name) {
            return Err(CatalogError::InUse {
                name: name.to_string(),
                by: index.name().to_string(),
            });
        }
        let table = inner.tables.remove(name).ok_or_else(|| CatalogError::NotFound {
            kind: "table",
            name: name.to_string(),
        })?;
        inner.by_id.remove(&table.id());
        debug!(table = name, "table removed");
        Ok(table)
    }

    /// All tables in name order.
    #[must_use]
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.inner.read().tables.values().cloned().collect()
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Adds an index. Its table must already exist.
    pub fn add_index(&self, index: Index, overwrite: bool) -> CatalogResult<Arc<Index>> {
        let mut inner = self.inner.write();
        let table = inner
            .tables
            .get(index.table_name())
            .ok_or_else(|| CatalogError::NotFound {
                kind: "table",
                name: index.table_name().to_string(),
            })?;
        index.validate(table)?;
        if let Some(old) = inner.indexes.get(index.name()) {
            if !overwrite {
                return Err(CatalogError::AlreadyExists {
                    kind: "index",
                    name: index.name().to_string(),
                });
            }
            let old_id = old.id();
            inner.by_id.remove(&old_id);
        }
        let id = assign_id(&self.next_id, index.id());
        let index = Arc::new(index.with_id(id));
        inner
            .indexes
            .insert(index.name().to_string(), Arc::clone(&index));
        inner.by_id.insert(id, CatalogObject::Index(Arc::clone(&index)));
        debug!(index = index.name(), table = index.table_name(), %id, "index added");
        Ok(index)
    }

    /// Looks up an index.
    #[must_use]
    pub fn find_index(&self, name: &str) -> Option<Arc<Index>> {
        self.inner.read().indexes.get(name).cloned()
    }

    /// The primary index of `table`.
    #[must_use]
    pub fn find_primary_index(&self, table: &str) -> Option<Arc<Index>> {
        self.find_index(table)
            .filter(|i| i.is_primary() && i.table_name() == table)
    }

    /// Secondary indexes of `table` in name order.
    #[must_use]
    pub fn secondary_indexes(&self, table: &str) -> Vec<Arc<Index>> {
        self.inner
            .read()
            .indexes
            .values()
            .filter(|i| i.table_name() == table && !i.is_primary())
            .cloned()
            .collect()
    }

    /// Removes an index.
    pub fn remove_index(&self, name: &str) -> CatalogResult<Arc<Index>> {
        let mut inner = self.inner.write();
        let index = inner.indexes.remove(name).ok_or_else(|| CatalogError::NotFound {
            kind: "index",
            name: name.to_string(),
        })?;
        inner.by_id.remove(&index.id());
        debug!(index = name, "index removed");
        Ok(index)
    }

    /// All indexes in name order.
    #[must_use]
    pub fn indexes(&self) -> Vec<Arc<Index>> {
        self.inner.read().indexes.values().cloned().collect()
    }

    // =========================================================================
    // Sequences
    // =========================================================================

    /// Adds a sequence definition.
    pub fn add_sequence(
        &self,
        sequence: SequenceDefinition,
        overwrite: bool,
    ) -> CatalogResult<Arc<SequenceDefinition>> {
        sequence.validate()?;
        let mut inner = self.inner.write();
        if let Some(old) = inner.sequences.get(sequence.name()) {
            if !overwrite {
                return Err(CatalogError::AlreadyExists {
                    kind: "sequence",
                    name: sequence.name().to_string(),
                });
            }
            let old_id = old.id();
            inner.by_id.remove(&old_id);
        }
        let id = assign_id(&self.next_id, sequence.id());
        let sequence = Arc::new(sequence.with_id(id));
        inner
            .sequences
            .insert(sequence.name().to_string(), Arc::clone(&sequence));
        inner
            .by_id
            .insert(id, CatalogObject::Sequence(Arc::clone(&sequence)));
        debug!(sequence = sequence.name(), %id, "sequence added");
        Ok(sequence)
    }

    /// Looks up a sequence.
    #[must_use]
    pub fn find_sequence(&self, name: &str) -> Option<Arc<SequenceDefinition>> {
        self.inner.read().sequences.get(name).cloned()
    }

    /// Removes a sequence no column default refers to.
    pub fn remove_sequence(&self, name: &str) -> CatalogResult<Arc<SequenceDefinition>> {
        let mut inner = self.inner.write();
        for table in inner.tables.values() {
            let referenced = table
                .columns()
                .iter()
                .any(|c| matches!(c.default_value(), ColumnDefault::Sequence(s) if s == name));
            if referenced {
                return Err(CatalogError::InUse {
                    name: name.to_string(),
                    by: table.name().to_string(),
                });
            }
        }
        let sequence = inner
            .sequences
            .remove(name)
            .ok_or_else(|| CatalogError::NotFound {
                kind: "sequence",
                name: name.to_string(),
            })?;
        inner.by_id.remove(&sequence.id());
        debug!(sequence = name, "sequence removed");
        Ok(sequence)
    }

    /// All sequences in name order.
    #[must_use]
    pub fn sequences(&self) -> Vec<Arc<SequenceDefinition>> {
        self.inner.read().sequences.values().cloned().collect()
    }

    // =========================================================================
    // Ids
    // =========================================================================

    /// Looks up any object by id.
    #[must_use]
    pub fn find_by_id(&self, id: DefinitionId) -> Option<CatalogObject> {
        self.inner.read().by_id.get(&id).cloned()
    }

    /// Removes everything.
    pub fn clear(&self) {
        *self.inner.write() = Inner::default();
    }
}
