//! Append-only columnar value store.
//!
//! ```text
//!   values   ┌─────────┬─────────┐   ┌─────────┐
//!            │ page #4 │ page #5 │   │ page #9 │     pages from PagePool
//!            └─────────┴─────────┘   └─────────┘
//!            └────── range 0 ─────┘  └ range 1 ┘     new range on a non-adjacent page
//!   nulls    ┌─────────┐
//!            │ flags   │                             one byte per entry (nullable only)
//!            └─────────┘
//!   varlen   LifoArena                               character / octet payloads
//! ```
//!
//! Iterators borrow the store, so an append while an iterator is alive does
//! not compile.

use std::sync::Arc;

use jogasaki_common::memory::{LifoArena, Page, PagePool};

use super::runtime::{load_value, store_value, DataError};
use super::value::Value;
use crate::meta::FieldTypeKind;

/// A run of entries stored in physically adjacent pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    /// Index of the first page (into the store's page list).
    pub first_page: usize,
    /// Number of pages in the run.
    pub page_count: usize,
    /// Index of the first entry.
    pub begin: usize,
    /// Number of entries.
    pub count: usize,
}

/// Append-only store of values of one kind.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use jogasaki_common::memory::PagePool;
/// use jogasaki_sql::data::{Value, ValueStore};
/// use jogasaki_sql::meta::FieldTypeKind;
///
/// let pool = Arc::new(PagePool::new(4096));
/// let mut store = ValueStore::new(FieldTypeKind::Int4, pool, true, 1024);
/// store.append(&Value::Int4(1)).unwrap();
/// store.append_null().unwrap();
/// let values: Vec<Value> = store.iter().collect();
/// assert_eq!(values, vec![Value::Int4(1), Value::Null]);
/// ```
#[derive(Debug)]
pub struct ValueStore {
    kind: FieldTypeKind,
    nullable: bool,
    pool: Arc<PagePool>,
    element_size: usize,
    per_page: usize,
    pages: Vec<Page>,
    null_pages: Vec<Page>,
    ranges: Vec<ValueRange>,
    varlen: LifoArena,
    count: usize,
}

impl ValueStore {
    /// Creates an empty store; pages are acquired on first append.
    #[must_use]
    pub fn new(
        kind: FieldTypeKind,
        pool: Arc<PagePool>,
        nullable: bool,
        varlen_page_size: usize,
    ) -> Self {
        let element_size = kind.runtime_size();
        let per_page = (pool.page_size() / element_size).max(1);
        Self {
            kind,
            nullable,
            pool,
            element_size,
            per_page,
            pages: Vec::new(),
            null_pages: Vec::new(),
            ranges: Vec::new(),
            varlen: LifoArena::new(varlen_page_size),
            count: 0,
        }
    }

    /// Kind of the stored values.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> FieldTypeKind {
        self.kind
    }

    /// Returns true if NULL may be appended.
    #[inline]
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns true if the store holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Contiguous ranges of the stored entries.
    #[must_use]
    pub fn ranges(&self) -> &[ValueRange] {
        &self.ranges
    }

    /// Number of value pages held, including pages kept across `reset`.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Appends a value; `Value::Null` behaves as [`append_null`](Self::append_null).
    pub fn append(&mut self, value: &Value) -> Result<(), DataError> {
        if value.is_null() {
            return self.append_null();
        }
        let (page, offset) = self.slot_for_next();
        let slot = &mut self.pages[page].data_mut()[offset..offset + self.element_size];
        store_value(self.kind, slot, value, &mut self.varlen)?;
        self.set_null_flag(false);
        self.commit_append(page, offset);
        Ok(())
    }

    /// Appends NULL.
    pub fn append_null(&mut self) -> Result<(), DataError> {
        if !self.nullable {
            return Err(DataError::NotNullable);
        }
        let (page, offset) = self.slot_for_next();
        self.pages[page].data_mut()[offset..offset + self.element_size].fill(0);
        self.set_null_flag(true);
        self.commit_append(page, offset);
        Ok(())
    }

    /// Returns the entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.count {
            return None;
        }
        if self.is_null_at(index) {
            return Some(Value::Null);
        }
        let page = index / self.per_page;
        let offset = (index % self.per_page) * self.element_size;
        let slot = &self.pages[page].data()[offset..offset + self.element_size];
        Some(load_value(self.kind, slot, &self.varlen))
    }

    /// Iterates over the entries in append order.
    #[must_use]
    pub fn iter(&self) -> ValueStoreIter<'_> {
        ValueStoreIter {
            store: self,
            index: 0,
        }
    }

    /// Drops all entries. Pages stay with the store and are reused.
    pub fn reset(&mut self) {
        self.count = 0;
        self.ranges.clear();
        self.varlen.reset();
    }

    fn is_null_at(&self, index: usize) -> bool {
        if !self.nullable {
            return false;
        }
        let page_size = self.pool.page_size();
        self.null_pages[index / page_size].data()[index % page_size] != 0
    }

    fn set_null_flag(&mut self, null: bool) {
        if !self.nullable {
            return;
        }
        let page_size = self.pool.page_size();
        let page = self.count / page_size;
        if page == self.null_pages.len() {
            self.null_pages.push(self.pool.acquire());
        }
        self.null_pages[page].data_mut()[self.count % page_size] = u8::from(null);
    }

    /// Locates the slot of the next entry, acquiring a page when needed.
    ///
    /// Ranges are untouched until the entry is committed, so a failed store
    /// leaves no trace beyond the page kept for reuse.
    fn slot_for_next(&mut self) -> (usize, usize) {
        let page = self.count / self.per_page;
        let offset = (self.count % self.per_page) * self.element_size;
        if offset == 0 && page == self.pages.len() {
            self.pages.push(self.pool.acquire());
        }
        (page, offset)
    }

    fn commit_append(&mut self, page: usize, offset: usize) {
        if offset == 0 {
            let extends = page > 0 && self.pages[page - 1].is_adjacent_to(&self.pages[page]);
            match self.ranges.last_mut() {
                Some(range) if extends => range.page_count += 1,
                _ => self.ranges.push(ValueRange {
                    first_page: page,
                    page_count: 1,
                    begin: self.count,
                    count: 0,
                }),
            }
        }
        self.count += 1;
        if let Some(range) = self.ranges.last_mut() {
            range.count += 1;
        }
    }
}

impl Drop for ValueStore {
    fn drop(&mut self) {
        for page in self.pages.drain(..).chain(self.null_pages.drain(..)) {
            self.pool.release(page);
        }
    }
}

impl<'a> IntoIterator for &'a ValueStore {
    type Item = Value;
    type IntoIter = ValueStoreIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`ValueStore`].
#[derive(Debug)]
pub struct ValueStoreIter<'a> {
    store: &'a ValueStore,
    index: usize,
}

impl Iterator for ValueStoreIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let value = self.store.get(self.index)?;
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.store.count.saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ValueStoreIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use jogasaki_common::MIN_PAGE_SIZE;

    fn pool() -> Arc<PagePool> {
        Arc::new(PagePool::new(MIN_PAGE_SIZE))
    }

    #[test]
    fn test_append_and_iterate() {
        let mut store = ValueStore::new(FieldTypeKind::Int8, pool(), false, 256);
        for i in 0..100 {
            store.append(&Value::Int8(i)).unwrap();
        }
        assert_eq!(store.count(), 100);
        let values: Vec<i64> = store.iter().filter_map(|v| v.as_i64()).collect();
        assert_eq!(values, (0..100).collect::<Vec<_>>());
        assert_eq!(store.iter().len(), 100);
    }

    #[test]
    fn test_ranges_follow_page_adjacency() {
        let pool = pool();
        let mut store = ValueStore::new(FieldTypeKind::Int8, pool.clone(), false, 256);
        let per_page = MIN_PAGE_SIZE / 8;
        for i in 0..per_page {
            store.append(&Value::Int8(i as i64)).unwrap();
        }
        // a page taken by someone else breaks adjacency
        let foreign = pool.acquire();
        store.append(&Value::Int8(-1)).unwrap();
        assert_eq!(store.ranges().len(), 2);
        assert_eq!(store.ranges()[0].count, per_page);
        assert_eq!(store.ranges()[1].begin, per_page);
        assert_eq!(store.ranges()[1].count, 1);
        pool.release(foreign);
    }

    #[test]
    fn test_adjacent_pages_share_a_range() {
        let mut store = ValueStore::new(FieldTypeKind::Int4, pool(), false, 256);
        let per_page = MIN_PAGE_SIZE / 4;
        for i in 0..(per_page * 3) {
            store.append(&Value::Int4(i as i32)).unwrap();
        }
        assert_eq!(store.ranges().len(), 1);
        assert_eq!(store.ranges()[0].page_count, 3);
        assert_eq!(store.ranges()[0].count, per_page * 3);
    }

    #[test]
    fn test_nulls_and_varlen() {
        let mut store = ValueStore::new(FieldTypeKind::Character, pool(), true, 256);
        store.append(&Value::from("a")).unwrap();
        store.append(&Value::Null).unwrap();
        store.append(&Value::from("")).unwrap();
        assert_eq!(store.get(0), Some(Value::from("a")));
        assert_eq!(store.get(1), Some(Value::Null));
        assert_eq!(store.get(2), Some(Value::from("")));
        assert_eq!(store.get(3), None);
    }

    #[test]
    fn test_not_nullable_and_type_mismatch() {
        let mut store = ValueStore::new(FieldTypeKind::Int4, pool(), false, 256);
        assert_eq!(store.append_null(), Err(DataError::NotNullable));
        assert!(store.append(&Value::from("x")).is_err());
        assert!(store.is_empty());
        assert!(store.ranges().is_empty());

        store.append(&Value::Int4(1)).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(
            store.ranges(),
            &[ValueRange {
                first_page: 0,
                page_count: 1,
                begin: 0,
                count: 1,
            }]
        );
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![Value::Int4(1)]);
    }

    #[test]
    fn test_reset_keeps_pages() {
        let pool = pool();
        let mut store = ValueStore::new(FieldTypeKind::Int8, pool.clone(), true, 256);
        for i in 0..200 {
            store.append(&Value::Int8(i)).unwrap();
        }
        let pages = store.page_count();
        let in_use = pool.in_use();
        store.reset();
        assert!(store.is_empty());
        assert!(store.ranges().is_empty());
        assert_eq!(store.page_count(), pages);
        store.append(&Value::Int8(7)).unwrap();
        assert_eq!(pool.in_use(), in_use);
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![Value::Int8(7)]);
        drop(store);
        assert_eq!(pool.in_use(), 0);
    }
}
