use std::fmt;
use std::sync::Arc;

use jogasaki_common::memory::{Checkpoint, LifoArena};
use jogasaki_common::DEFAULT_LIFO_PAGE_SIZE;

use crate::data::runtime::{load_value, store_value, DataError};
use crate::data::Value;
use crate::meta::RecordMeta;

/// A record buffer owning its bytes and varlen arena.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::accessor::RecordBuffer;
/// use jogasaki_sql::data::Value;
/// use jogasaki_sql::meta::{FieldType, RecordMeta};
///
/// let meta = RecordMeta::new(vec![(FieldType::Int4, false), (FieldType::varchar(None), true)]);
/// let mut rec = RecordBuffer::new(meta.shared());
/// rec.set_value(0, &Value::Int4(1)).unwrap();
/// rec.set_value(1, &Value::Null).unwrap();
/// assert_eq!(rec.values(), vec![Value::Int4(1), Value::Null]);
/// ```
pub struct RecordBuffer {
    meta: Arc<RecordMeta>,
    data: Vec<u8>,
    varlen: LifoArena,
}

impl RecordBuffer {
    /// Creates a zeroed record; nullable fields start as NULL.
    #[must_use]
    pub fn new(meta: Arc<RecordMeta>) -> Self {
        Self::with_arena(meta, LifoArena::new(DEFAULT_LIFO_PAGE_SIZE))
    }

    /// Creates a record whose varlen payloads go to `varlen`.
    #[must_use]
    pub fn with_arena(meta: Arc<RecordMeta>, varlen: LifoArena) -> Self {
        let mut rec = Self {
            data: vec![0u8; meta.record_size()],
            meta,
            varlen,
        };
        rec.clear();
        rec
    }

    /// Builds a record from one value per field.
    pub fn from_values(meta: Arc<RecordMeta>, values: &[Value]) -> Result<Self, DataError> {
        let mut rec = Self::new(meta);
        for (i, value) in values.iter().enumerate().take(rec.meta.field_count()) {
            rec.set_value(i, value)?;
        }
        Ok(rec)
    }

    /// Layout of the record.
    #[inline]
    #[must_use]
    pub fn meta(&self) -> &Arc<RecordMeta> {
        &self.meta
    }

    /// Read-only view.
    #[must_use]
    pub fn as_record_ref(&self) -> RecordRef<'_> {
        RecordRef {
            meta: &self.meta,
            data: &self.data,
            varlen: &self.varlen,
        }
    }

    /// Returns true if field `index` is NULL.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.as_record_ref().is_null(index)
    }

    /// Sets or clears the nullity bit of field `index`. Non-nullable fields
    /// have no bit and are left untouched.
    pub fn set_null(&mut self, index: usize, null: bool) {
        if let Some(bit) = self.meta.nullity_offset(index) {
            let mask = 1u8 << (bit % 8);
            if null {
                self.data[bit / 8] |= mask;
            } else {
                self.data[bit / 8] &= !mask;
            }
        }
    }

    /// Stores `value` into field `index`.
    pub fn set_value(&mut self, index: usize, value: &Value) -> Result<(), DataError> {
        if value.is_null() {
            if !self.meta.nullable(index) {
                return Err(DataError::NotNullable);
            }
            self.set_null(index, true);
            return Ok(());
        }
        let kind = self.meta.field_type(index).kind();
        let offset = self.meta.value_offset(index);
        let slot = &mut self.data[offset..offset + kind.runtime_size()];
        store_value(kind, slot, value, &mut self.varlen)?;
        self.set_null(index, false);
        Ok(())
    }

    /// Returns the value of field `index`.
    #[must_use]
    pub fn get_value(&self, index: usize) -> Value {
        self.as_record_ref().get_value(index)
    }

    /// Returns all field values in order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.as_record_ref().values()
    }

    /// Raw slot bytes of field `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> &[u8] {
        let offset = self.meta.value_offset(index);
        let size = self.meta.field_type(index).kind().runtime_size();
        &self.data[offset..offset + size]
    }

    /// Raw bytes of the whole record.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Varlen arena.
    #[inline]
    pub fn varlen_mut(&mut self) -> &mut LifoArena {
        &mut self.varlen
    }

    /// Saves the varlen arena position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.varlen.checkpoint()
    }

    /// Drops varlen payloads allocated after `checkpoint`.
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.varlen.rewind(checkpoint);
    }

    /// Zeroes every slot, marks nullable fields NULL and resets the arena.
    pub fn clear(&mut self) {
        self.data.fill(0);
        for i in 0..self.meta.field_count() {
            self.set_null(i, true);
        }
        self.varlen.reset();
    }
}

impl fmt::Debug for RecordBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_record_ref(), f)
    }
}

/// Borrowed view of a record.
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
    meta: &'a RecordMeta,
    data: &'a [u8],
    varlen: &'a LifoArena,
}

impl<'a> RecordRef<'a> {
    /// Layout of the record.
    #[inline]
    #[must_use]
    pub fn meta(&self) -> &'a RecordMeta {
        self.meta
    }

    /// Returns true if field `index` is NULL.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.meta
            .nullity_offset(index)
            .is_some_and(|bit| self.data[bit / 8] & (1u8 << (bit % 8)) != 0)
    }

    /// Returns the value of field `index`.
    #[must_use]
    pub fn get_value(&self, index: usize) -> Value {
        if self.is_null(index) {
            return Value::Null;
        }
        let kind = self.meta.field_type(index).kind();
        let offset = self.meta.value_offset(index);
        load_value(kind, &self.data[offset..offset + kind.runtime_size()], self.varlen)
    }

    /// Returns all field values in order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        (0..self.meta.field_count()).map(|i| self.get_value(i)).collect()
    }
}

impl fmt::Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}
