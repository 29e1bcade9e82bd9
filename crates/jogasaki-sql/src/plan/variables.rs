//! Variable tables and block scopes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::data::Value;
use crate::meta::{FieldType, RecordMeta};

/// Name to index binding of host variables (`:name`).
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::meta::FieldType;
/// use jogasaki_sql::plan::VariableTable;
///
/// let mut vars = VariableTable::new();
/// let p0 = vars.add("p0", FieldType::Int4);
/// assert_eq!(vars.index_of("p0"), Some(p0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    entries: Vec<(String, FieldType)>,
    index: HashMap<String, usize>,
}

impl VariableTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` with `field_type` and returns its index. Declaring a
    /// name twice replaces its type and keeps the index.
    pub fn add(&mut self, name: impl Into<String>, field_type: FieldType) -> usize {
        let name = name.into();
        if let Some(&i) = self.index.get(&name) {
            self.entries[i].1 = field_type;
            return i;
        }
        let i = self.entries.len();
        self.index.insert(name.clone(), i);
        self.entries.push((name, field_type));
        i
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.add(name, field_type);
        self
    }

    /// Index of `name`.
    #[inline]
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Declared type of variable `index`.
    #[must_use]
    pub fn field_type(&self, index: usize) -> Option<&FieldType> {
        self.entries.get(index).map(|(_, t)| t)
    }

    /// Declared names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of declared variables.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is declared.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layout of the bound values; every variable is nullable.
    #[must_use]
    pub fn meta(&self) -> Arc<RecordMeta> {
        RecordMeta::all_nullable(self.entries.iter().map(|(_, t)| *t)).shared()
    }
}

/// Values supplied for host variables, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: BTreeMap<String, Value>,
}

impl Parameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Number of values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no value is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Layout of the stream variables live in one basic block.
///
/// Live variables are those the block defines minus those it kills, in
/// definition order. Each gets a slot in the block's record; operators
/// address variables through [`index_of`](Self::index_of).
///
/// ```text
///   defined: [k, v, tmp]   killed: [tmp]
///   scope:   k -> 0, v -> 1
/// ```
#[derive(Debug, Clone)]
pub struct BlockScope {
    names: Vec<String>,
    meta: Arc<RecordMeta>,
}

impl BlockScope {
    /// Builds the scope of a block from its definitions and kills.
    #[must_use]
    pub fn new(defined: Vec<(String, FieldType)>, killed: &[&str]) -> Self {
        let killed: HashSet<&str> = killed.iter().copied().collect();
        let mut seen = HashSet::new();
        let (names, types): (Vec<String>, Vec<FieldType>) = defined
            .into_iter()
            .filter(|(name, _)| !killed.contains(name.as_str()) && seen.insert(name.clone()))
            .unzip();
        // nullability of stream variables is not tracked
        let meta = RecordMeta::all_nullable(types).shared();
        Self { names, meta }
    }

    /// Slot of `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Live variable names in slot order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Layout of the block record.
    #[inline]
    #[must_use]
    pub fn meta(&self) -> &Arc<RecordMeta> {
        &self.meta
    }

    /// Number of live variables.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if nothing is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
