//! Index codecs derived from catalog definitions.
//!
//! Every codec addresses fields by table column position, so a single row
//! (one value per table column) feeds the primary key, the primary value
//! and every secondary key.
//!
//! ```text
//!   row:        [c0, c1, c2, c3]
//!   primary:    key(c0)        value(c1, c2, c3)
//!   secondary:  key(c2 || c0)  value()
//! ```

use std::sync::Arc;

use jogasaki_common::{ErrorInfo, JogasakiResult};
use jogasaki_kvs::StorageHandle;

use super::context::RequestContext;
use crate::catalog::{Index, Table};
use crate::codec::{CodingSpec, FieldOp, RecordCodec};
use crate::data::Value;

fn key_ops(table: &Table, index: &Index) -> JogasakiResult<Vec<FieldOp>> {
    index
        .key_positions(table)?
        .into_iter()
        .map(|(pos, direction)| -> JogasakiResult<FieldOp> {
            let column = &table.columns()[pos];
            Ok(FieldOp::new(
                pos,
                *column.field_type(),
                column.nullable(),
                CodingSpec::key(direction.into()),
            )?)
        })
        .collect()
}

/// Key codec of a primary index.
pub(crate) fn primary_key_codec(table: &Table, primary: &Index) -> JogasakiResult<RecordCodec> {
    Ok(RecordCodec::new(key_ops(table, primary)?))
}

/// Versioned value codec of a primary index.
pub(crate) fn primary_value_codec(table: &Table, primary: &Index) -> JogasakiResult<RecordCodec> {
    let ops = primary
        .value_positions(table)?
        .into_iter()
        .map(|pos| -> JogasakiResult<FieldOp> {
            let column = &table.columns()[pos];
            Ok(FieldOp::new(
                pos,
                *column.field_type(),
                column.nullable(),
                CodingSpec::VALUE,
            )?)
        })
        .collect::<JogasakiResult<Vec<_>>>()?;
    Ok(RecordCodec::versioned(ops))
}

/// Key codec of a secondary index: its own keys followed by the primary key.
pub(crate) fn secondary_key_codec(
    table: &Table,
    secondary: &Index,
    primary: &Index,
) -> JogasakiResult<RecordCodec> {
    let mut ops = key_ops(table, secondary)?;
    ops.extend(key_ops(table, primary)?);
    Ok(RecordCodec::new(ops))
}

/// Opens the storage backing `index`.
pub(crate) fn index_storage(ctx: &RequestContext, index: &Index) -> JogasakiResult<StorageHandle> {
    ctx.kvs().get_storage(index.storage_name()).ok_or_else(|| {
        ErrorInfo::target_not_found(format!("storage of index '{}' not found", index.name()))
    })
}

/// Rebuilds a table row from a primary entry.
pub(crate) fn decode_row(
    column_count: usize,
    key_codec: &RecordCodec,
    value_codec: &RecordCodec,
    key: &[u8],
    value: &[u8],
) -> JogasakiResult<Vec<Value>> {
    let mut row = vec![Value::Null; column_count];
    for (codec, bytes) in [(key_codec, key), (value_codec, value)] {
        let values = codec.decode_values(bytes)?;
        for (op, v) in codec.ops().iter().zip(values) {
            row[op.index()] = v;
        }
    }
    Ok(row)
}

/// A primary index with its codecs and storage.
#[derive(Debug, Clone)]
pub(crate) struct PrimaryTarget {
    pub(crate) index: Arc<Index>,
    pub(crate) storage: StorageHandle,
    pub(crate) key: RecordCodec,
    pub(crate) value: RecordCodec,
}

impl PrimaryTarget {
    pub(crate) fn open(ctx: &RequestContext, table: &Table) -> JogasakiResult<Self> {
        let index = ctx.provider().find_primary_index(table.name()).ok_or_else(|| {
            ErrorInfo::internal(format!("table '{}' has no primary index", table.name()))
        })?;
        Ok(Self {
            storage: index_storage(ctx, &index)?,
            key: primary_key_codec(table, &index)?,
            value: primary_value_codec(table, &index)?,
            index,
        })
    }
}

/// A secondary index with its key codec and storage.
#[derive(Debug, Clone)]
pub(crate) struct SecondaryTarget {
    pub(crate) index: Arc<Index>,
    pub(crate) storage: StorageHandle,
    pub(crate) key: RecordCodec,
}

impl SecondaryTarget {
    pub(crate) fn open(
        ctx: &RequestContext,
        table: &Table,
        index: Arc<Index>,
        primary: &Index,
    ) -> JogasakiResult<Self> {
        Ok(Self {
            storage: index_storage(ctx, &index)?,
            key: secondary_key_codec(table, &index, primary)?,
            index,
        })
    }

    /// Every secondary index of `table`.
    pub(crate) fn open_all(
        ctx: &RequestContext,
        table: &Table,
        primary: &Index,
    ) -> JogasakiResult<Vec<Self>> {
        ctx.provider()
            .secondary_indexes(table.name())
            .into_iter()
            .map(|index| Self::open(ctx, table, index, primary))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, IndexKey};
    use crate::meta::FieldType;

    fn table() -> Table {
        Table::new(
            "T",
            vec![
                Column::new("K", FieldType::Int4).not_null(),
                Column::new("A", FieldType::varchar(None)),
                Column::new("B", FieldType::Int8),
            ],
        )
    }

    #[test]
    fn test_primary_codecs_address_table_positions() {
        let t = table();
        let primary = Index::primary(&t, vec![IndexKey::asc("K")]);
        let key = primary_key_codec(&t, &primary).unwrap();
        let value = primary_value_codec(&t, &primary).unwrap();
        assert_eq!(key.ops().len(), 1);
        assert_eq!(key.ops()[0].index(), 0);
        assert_eq!(
            value.ops().iter().map(|o| o.index()).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let row = vec![Value::Int4(7), Value::Character("x".into()), Value::Null];
        let mut k = Vec::new();
        let mut v = Vec::new();
        key.encode_to_vec(&row, &mut k).unwrap();
        value.encode_to_vec(&row, &mut v).unwrap();
        assert_eq!(decode_row(3, &key, &value, &k, &v).unwrap(), row);
    }

    #[test]
    fn test_secondary_key_appends_primary_key() {
        let t = table();
        let primary = Index::primary(&t, vec![IndexKey::asc("K")]);
        let secondary = Index::secondary("T_B", "T", vec![IndexKey::desc("B")]);
        let codec = secondary_key_codec(&t, &secondary, &primary).unwrap();
        assert_eq!(
            codec.ops().iter().map(|o| o.index()).collect::<Vec<_>>(),
            vec![2, 0]
        );
    }
}
