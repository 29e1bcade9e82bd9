//! Transaction, put and scan options.

use jogasaki_common::Key;
use std::ops::Bound;

/// Kind of transaction requested at begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionType {
    /// Short optimistic transaction.
    #[default]
    Short,
    /// Long transaction declaring its write preserves up front.
    Long,
    /// Read-only transaction.
    ReadOnly,
}

/// Options passed to [`crate::KvsDatabase::begin`].
///
/// # Example
///
/// ```rust
/// use jogasaki_kvs::{TransactionOptions, TransactionType};
///
/// let opts = TransactionOptions::long(["T0"]).with_label("batch");
/// assert_eq!(opts.transaction_type, TransactionType::Long);
/// assert!(opts.is_write_preserved("T0"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Transaction kind.
    pub transaction_type: TransactionType,
    /// Storages a long transaction intends to write.
    pub write_preserves: Vec<String>,
    /// Storages the transaction may read (empty means any).
    pub read_areas_inclusive: Vec<String>,
    /// Storages the transaction will not read.
    pub read_areas_exclusive: Vec<String>,
    /// Free-form label for diagnostics.
    pub label: Option<String>,
    /// Whether the transaction modifies table definitions.
    pub modifies_definitions: bool,
}

impl TransactionOptions {
    /// Options for a short transaction.
    #[must_use]
    pub fn short() -> Self {
        Self::default()
    }

    /// Options for a long transaction writing the given storages.
    #[must_use]
    pub fn long<I, S>(write_preserves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transaction_type: TransactionType::Long,
            write_preserves: write_preserves.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Options for a read-only transaction.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            transaction_type: TransactionType::ReadOnly,
            ..Self::default()
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the transaction as modifying definitions.
    #[must_use]
    pub fn with_modifies_definitions(mut self, modifies: bool) -> Self {
        self.modifies_definitions = modifies;
        self
    }

    /// Returns true if `storage` may be written by this transaction.
    #[must_use]
    pub fn is_write_preserved(&self, storage: &str) -> bool {
        match self.transaction_type {
            TransactionType::Short => true,
            TransactionType::ReadOnly => false,
            TransactionType::Long => self.write_preserves.iter().any(|s| s == storage),
        }
    }
}

/// Conflict policy of a `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOption {
    /// Fails with `AlreadyExists` if the key exists.
    Create,
    /// Inserts or overwrites.
    CreateOrUpdate,
    /// Fails with `NotFound` if the key does not exist.
    Update,
}

/// Key range of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    /// Lower bound.
    pub begin: Bound<Key>,
    /// Upper bound.
    pub end: Bound<Key>,
}

impl ScanRange {
    /// The whole storage.
    #[must_use]
    pub fn all() -> Self {
        Self {
            begin: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Every key starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: Key) -> Self {
        let end = match prefix.prefix_successor() {
            Some(next) => Bound::Excluded(next),
            None => Bound::Unbounded,
        };
        Self {
            begin: Bound::Included(prefix),
            end,
        }
    }

    /// Explicit bounds.
    #[must_use]
    pub fn new(begin: Bound<Key>, end: Bound<Key>) -> Self {
        Self { begin, end }
    }

    /// Returns true if no key can lie in the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let (b, b_inclusive) = match &self.begin {
            Bound::Included(b) => (b, true),
            Bound::Excluded(b) => (b, false),
            Bound::Unbounded => return false,
        };
        let (e, e_inclusive) = match &self.end {
            Bound::Included(e) => (e, true),
            Bound::Excluded(e) => (e, false),
            Bound::Unbounded => return false,
        };
        b > e || (b == e && !(b_inclusive && e_inclusive))
    }

    /// Returns true if `key` lies in the range.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        let lower = match &self.begin {
            Bound::Included(b) => key >= b.as_bytes(),
            Bound::Excluded(b) => key > b.as_bytes(),
            Bound::Unbounded => true,
        };
        let upper = match &self.end {
            Bound::Included(e) => key <= e.as_bytes(),
            Bound::Excluded(e) => key < e.as_bytes(),
            Bound::Unbounded => true,
        };
        lower && upper
    }
}

impl Default for ScanRange {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_preserve_rules() {
        assert!(TransactionOptions::short().is_write_preserved("any"));
        assert!(!TransactionOptions::read_only().is_write_preserved("any"));
        let long = TransactionOptions::long(vec!["A".to_string()]);
        assert!(long.is_write_preserved("A"));
        assert!(!long.is_write_preserved("B"));
    }

    #[test]
    fn test_prefix_range() {
        let range = ScanRange::prefix(Key::from_vec(vec![0x01]));
        assert!(range.contains(&[0x01]));
        assert!(range.contains(&[0x01, 0xFF, 0xFF]));
        assert!(!range.contains(&[0x02]));
        assert!(!range.contains(&[0x00, 0xFF]));
    }

    #[test]
    fn test_empty_range() {
        let a = Key::from_bytes(b"a");
        let b = Key::from_bytes(b"b");
        assert!(ScanRange::new(Bound::Included(b.clone()), Bound::Included(a.clone())).is_empty());
        assert!(ScanRange::new(Bound::Included(a.clone()), Bound::Excluded(a.clone())).is_empty());
        assert!(!ScanRange::new(Bound::Included(a.clone()), Bound::Included(a)).is_empty());
        assert!(!ScanRange::all().is_empty());
    }
}
