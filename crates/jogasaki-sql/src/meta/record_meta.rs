//! Record metadata.
//!
//! Lays out a packed record buffer: field values first, each at an offset
//! aligned for its kind, followed by a bitset holding one nullity bit per
//! nullable field.
//!
//! ```text
//! ┌──────┬───┬──────────┬──────────────┬──────────┐
//! │ int4 │pad│  int8    │ char handle  │ null bits│
//! └──────┴───┴──────────┴──────────────┴──────────┘
//!  0      4   8          16             28
//! ```

use std::sync::Arc;

use super::field_type::FieldType;

/// Immutable layout of a record.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::meta::{FieldType, RecordMeta};
///
/// let meta = RecordMeta::new(vec![(FieldType::Int4, false), (FieldType::Int8, true)]);
/// assert_eq!(meta.value_offset(0), 0);
/// assert_eq!(meta.value_offset(1), 8);
/// assert_eq!(meta.nullity_offset(0), None);
/// assert_eq!(meta.nullity_offset(1), Some(16 * 8));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    fields: Vec<FieldType>,
    nullable: Vec<bool>,
    value_offsets: Vec<usize>,
    /// Bit offsets from the start of the record.
    nullity_offsets: Vec<Option<usize>>,
    record_size: usize,
    record_alignment: usize,
}

fn align_up(offset: usize, alignment: usize) -> usize {
    offset.div_ceil(alignment) * alignment
}

impl RecordMeta {
    /// Builds the layout for `(type, nullable)` fields in order.
    #[must_use]
    pub fn new(fields: Vec<(FieldType, bool)>) -> Self {
        let mut offset = 0usize;
        let mut record_alignment = 1usize;
        let mut value_offsets = Vec::with_capacity(fields.len());
        for (ty, _) in &fields {
            let kind = ty.kind();
            offset = align_up(offset, kind.runtime_alignment());
            value_offsets.push(offset);
            offset += kind.runtime_size();
            record_alignment = record_alignment.max(kind.runtime_alignment());
        }
        let bits_start = offset * 8;
        let mut next_bit = 0usize;
        let nullity_offsets = fields
            .iter()
            .map(|(_, nullable)| {
                nullable.then(|| {
                    let bit = bits_start + next_bit;
                    next_bit += 1;
                    bit
                })
            })
            .collect();
        let record_size = align_up(offset + next_bit.div_ceil(8), record_alignment);
        let (fields, nullable) = fields.into_iter().unzip();
        Self {
            fields,
            nullable,
            value_offsets,
            nullity_offsets,
            record_size,
            record_alignment,
        }
    }

    /// Builds a layout where every field is nullable.
    #[must_use]
    pub fn all_nullable(types: impl IntoIterator<Item = FieldType>) -> Self {
        Self::new(types.into_iter().map(|t| (t, true)).collect())
    }

    /// Returns a shared handle.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of fields.
    #[inline]
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Type of field `index`.
    #[inline]
    #[must_use]
    pub fn field_type(&self, index: usize) -> &FieldType {
        &self.fields[index]
    }

    /// All field types.
    #[inline]
    #[must_use]
    pub fn field_types(&self) -> &[FieldType] {
        &self.fields
    }

    /// Whether field `index` is nullable.
    #[inline]
    #[must_use]
    pub fn nullable(&self, index: usize) -> bool {
        self.nullable[index]
    }

    /// Byte offset of field `index`.
    #[inline]
    #[must_use]
    pub fn value_offset(&self, index: usize) -> usize {
        self.value_offsets[index]
    }

    /// Bit offset of the nullity flag of field `index`, if nullable.
    #[inline]
    #[must_use]
    pub fn nullity_offset(&self, index: usize) -> Option<usize> {
        self.nullity_offsets[index]
    }

    /// Size of a record buffer.
    #[inline]
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Alignment of a record buffer.
    #[inline]
    #[must_use]
    pub fn record_alignment(&self) -> usize {
        self.record_alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_respect_alignment() {
        let meta = RecordMeta::new(vec![
            (FieldType::Int1, false),
            (FieldType::Int4, true),
            (FieldType::Int2, false),
            (FieldType::decimal(None, None), true),
            (FieldType::varchar(None), true),
        ]);
        assert_eq!(meta.value_offset(0), 0);
        assert_eq!(meta.value_offset(1), 4);
        assert_eq!(meta.value_offset(2), 8);
        assert_eq!(meta.value_offset(3), 16);
        assert_eq!(meta.value_offset(4), 40);
        // values end at 52; three nullable bits in one byte
        assert_eq!(meta.nullity_offset(1), Some(52 * 8));
        assert_eq!(meta.nullity_offset(3), Some(52 * 8 + 1));
        assert_eq!(meta.nullity_offset(4), Some(52 * 8 + 2));
        assert_eq!(meta.record_size(), 56);
        assert_eq!(meta.record_alignment(), 8);
    }

    #[test]
    fn test_empty_meta() {
        let meta = RecordMeta::new(Vec::new());
        assert_eq!(meta.field_count(), 0);
        assert_eq!(meta.record_size(), 0);
    }

    #[test]
    fn test_all_nullable() {
        let meta = RecordMeta::all_nullable([FieldType::Int4, FieldType::Float8]);
        assert!(meta.nullable(0) && meta.nullable(1));
        assert_eq!(meta.nullity_offset(0), Some(16 * 8));
    }
}
