//! Prepared statement handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use jogasaki_common::{ErrorCode, ErrorInfo, JogasakiResult};
use jogasaki_sql::PreparedStatement;

/// Opaque reference to a statement registered with
/// [`Database::prepare`](super::Database::prepare).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementHandle(u64);

impl StatementHandle {
    /// Creates a handle from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatementHandle({})", self.0)
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt-{}", self.0)
    }
}

/// Registry of prepared statements.
#[derive(Debug, Default)]
pub(crate) struct StatementStore {
    statements: DashMap<StatementHandle, Arc<PreparedStatement>>,
    next: AtomicU64,
}

impl StatementStore {
    pub(crate) fn insert(&self, statement: PreparedStatement) -> StatementHandle {
        let handle = StatementHandle(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        self.statements.insert(handle, Arc::new(statement));
        handle
    }

    pub(crate) fn get(&self, handle: StatementHandle) -> JogasakiResult<Arc<PreparedStatement>> {
        self.statements
            .get(&handle)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| {
                ErrorInfo::new(
                    ErrorCode::InvalidArgument,
                    format!("statement handle {handle} is not registered"),
                )
            })
    }

    pub(crate) fn remove(&self, handle: StatementHandle) -> bool {
        self.statements.remove(&handle).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.statements.len()
    }

    pub(crate) fn clear(&self) {
        self.statements.clear();
    }
}

#[cfg(test)]
mod tests {
    use jogasaki_sql::{Statement, VariableTable};

    use super::*;

    #[test]
    fn test_handles_are_distinct() {
        let store = StatementStore::default();
        let a = store.insert(PreparedStatement::new(Statement::Empty, VariableTable::new()));
        let b = store.insert(PreparedStatement::new(Statement::Empty, VariableTable::new()));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(store.get(a).is_ok());
    }

    #[test]
    fn test_removed_handle_is_rejected() {
        let store = StatementStore::default();
        let h = store.insert(PreparedStatement::new(Statement::Empty, VariableTable::new()));
        assert!(store.remove(h));
        assert!(!store.remove(h));
        assert_eq!(store.get(h).unwrap_err().code(), ErrorCode::InvalidArgument);
        assert_eq!(h.to_string(), format!("stmt-{}", h.as_u64()));
    }
}
