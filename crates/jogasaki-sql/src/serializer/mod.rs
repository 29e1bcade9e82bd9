//! Metadata serializer.
//!
//! Turns catalog entries into self-describing byte strings stored in the
//! system storage, and rebuilds them into a [`StorageProvider`].
//!
//! ```text
//! entry := version:u8 field*
//!   field 1: index     { name, id, features, key*, value*, description,
//!                        table (primary) | table_name (secondary), sequence* }
//!   field 2: sequence  { name, id, initial, increment, min, max, cycle }
//! ```
//!
//! A primary index entry embeds its whole table and the sequences the
//! table's defaults refer to; a secondary index entry names its table only.
//! System-storage keys start with an [`EntryKind`] byte, so a key-ordered
//! scan yields sequences, then tables, then secondary indexes.

mod wire;

use std::sync::Arc;

use bytes::Bytes;
use jogasaki_common::{DefinitionId, ErrorCode, ErrorInfo, METADATA_FORMAT_VERSION};
use thiserror::Error;
use tracing::debug;

use crate::catalog::{
    CatalogError, Column, ColumnDefault, ColumnFeatures, DefaultFunction, Index, IndexFeatures,
    IndexKey, SequenceDefinition, SortDirection, StorageProvider, Table,
};
use crate::data::{Date, TimeOfDay, TimePoint, Triple, Value};
use crate::meta::{FieldType, FieldTypeKind};

use wire::{parse_fields, Field, MessageWriter};

/// Errors raised by the metadata serializer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializerError {
    /// Bytes that do not form a valid entry.
    #[error("malformed metadata: {0}")]
    Malformed(String),

    /// Entry written by an unknown format.
    #[error("unsupported metadata format version {0}")]
    UnsupportedVersion(u8),

    /// A value that has no metadata representation.
    #[error("cannot serialize {0}")]
    Unsupported(String),

    /// Catalog rejected the rebuilt object.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result type for serializer operations.
pub type SerializerResult<T> = std::result::Result<T, SerializerError>;

impl From<SerializerError> for ErrorInfo {
    fn from(err: SerializerError) -> Self {
        match err {
            SerializerError::Catalog(e) => e.into(),
            SerializerError::Unsupported(_) => {
                ErrorInfo::new(ErrorCode::UnsupportedRuntimeFeature, err.to_string())
            }
            SerializerError::Malformed(_) | SerializerError::UnsupportedVersion(_) => {
                ErrorInfo::new(ErrorCode::DataCorruption, err.to_string())
            }
        }
    }
}

/// Kind of a system-storage entry; the first byte of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EntryKind {
    /// A sequence definition.
    Sequence = 0,
    /// A primary index with its table.
    Table = 1,
    /// A secondary index.
    SecondaryIndex = 2,
}

impl EntryKind {
    /// Kind of the entry stored under `key`.
    #[must_use]
    pub fn of_key(key: &[u8]) -> Option<Self> {
        match key.first()? {
            0 => Some(EntryKind::Sequence),
            1 => Some(EntryKind::Table),
            2 => Some(EntryKind::SecondaryIndex),
            _ => None,
        }
    }

    /// System-storage key of the entry named `name`.
    #[must_use]
    pub fn key(self, name: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(name.len() + 1);
        key.push(self as u8);
        key.extend_from_slice(name.as_bytes());
        key
    }
}

const TOP_INDEX: u8 = 1;
const TOP_SEQUENCE: u8 = 2;

fn malformed(what: impl Into<String>) -> SerializerError {
    SerializerError::Malformed(what.into())
}

fn find(fields: &[Field], tag: u8) -> Option<&Field> {
    fields.iter().find(|f| f.tag == tag)
}

fn require<'a>(fields: &'a [Field], tag: u8, what: &str) -> SerializerResult<&'a Field> {
    find(fields, tag).ok_or_else(|| malformed(format!("missing {what}")))
}

fn all(fields: &[Field], tag: u8) -> impl Iterator<Item = &Field> {
    fields.iter().filter(move |f| f.tag == tag)
}

fn small<T: TryFrom<u64>>(v: u64, what: &str) -> SerializerResult<T> {
    T::try_from(v).map_err(|_| malformed(format!("{what} out of range")))
}

// -----------------------------------------------------------------------------
// values
// -----------------------------------------------------------------------------

fn write_value(value: &Value) -> SerializerResult<MessageWriter> {
    let mut w = MessageWriter::new();
    w.uint(1, value.kind() as u64);
    match value {
        Value::Null => {}
        Value::Boolean(v) => {
            w.int(2, i64::from(*v));
        }
        Value::Int1(_) | Value::Int2(_) | Value::Int4(_) | Value::Int8(_) => {
            w.int(2, value.as_i64().unwrap_or_default());
        }
        Value::Float4(v) => {
            w.uint(3, u64::from(v.to_bits()));
        }
        Value::Float8(v) => {
            w.uint(3, v.to_bits());
        }
        Value::Decimal(t) => {
            let be = t.coefficient().to_be_bytes();
            let first = be.iter().position(|b| *b != 0).unwrap_or(be.len());
            w.int(2, i64::from(t.sign()))
                .bytes(4, &be[first..])
                .int(5, i64::from(t.exponent()));
        }
        Value::Character(s) => {
            w.string(4, s);
        }
        Value::Octet(b) => {
            w.bytes(4, b);
        }
        Value::Date(d) => {
            w.int(2, d.days());
        }
        Value::TimeOfDay(t) => {
            w.uint(6, t.nanos());
        }
        Value::TimePoint(t) => {
            w.int(2, t.seconds()).uint(6, u64::from(t.subsecond_nanos()));
        }
        Value::Blob(_) | Value::Clob(_) => {
            return Err(SerializerError::Unsupported(format!("{} default value", value.kind())));
        }
    }
    Ok(w)
}

fn read_value(fields: &[Field]) -> SerializerResult<Value> {
    let kind = FieldTypeKind::from_u8(small(require(fields, 1, "value kind")?.uint()?, "kind")?)
        .ok_or_else(|| malformed("unknown value kind"))?;
    let int = || -> SerializerResult<i64> { require(fields, 2, "integer payload")?.int() };
    let nanos = || -> SerializerResult<u64> {
        find(fields, 6).map_or(Ok(0), Field::uint)
    };
    // zone-qualified values are rebased to UTC
    let offset = find(fields, 7).map_or(Ok(0), Field::int)?;
    let offset = i32::try_from(offset).map_err(|_| malformed("zone offset out of range"))?;
    Ok(match kind {
        FieldTypeKind::Unknown => Value::Null,
        FieldTypeKind::Boolean => Value::Boolean(int()? != 0),
        FieldTypeKind::Int1 => Value::Int1(i8::try_from(int()?).map_err(|_| malformed("int1"))?),
        FieldTypeKind::Int2 => Value::Int2(i16::try_from(int()?).map_err(|_| malformed("int2"))?),
        FieldTypeKind::Int4 => Value::Int4(i32::try_from(int()?).map_err(|_| malformed("int4"))?),
        FieldTypeKind::Int8 => Value::Int8(int()?),
        FieldTypeKind::Float4 => {
            let bits: u32 = small(require(fields, 3, "float bits")?.uint()?, "float4 bits")?;
            Value::Float4(f32::from_bits(bits))
        }
        FieldTypeKind::Float8 => Value::Float8(f64::from_bits(require(fields, 3, "float bits")?.uint()?)),
        FieldTypeKind::Decimal => {
            let bytes = require(fields, 4, "decimal coefficient")?.bytes();
            if bytes.len() > 16 {
                return Err(malformed("decimal coefficient too wide"));
            }
            let mut be = [0u8; 16];
            be[16 - bytes.len()..].copy_from_slice(bytes);
            let coefficient = u128::from_be_bytes(be);
            if coefficient > Triple::MAX_COEFFICIENT {
                return Err(malformed("decimal coefficient exceeds 38 digits"));
            }
            let exponent = i32::try_from(require(fields, 5, "decimal exponent")?.int()?)
                .map_err(|_| malformed("decimal exponent"))?;
            let sign = int()?.signum() as i8;
            Value::Decimal(Triple::new(sign, coefficient, exponent))
        }
        FieldTypeKind::Character => Value::Character(require(fields, 4, "text")?.string()?),
        FieldTypeKind::Octet => Value::Octet(require(fields, 4, "octets")?.bytes().to_vec()),
        FieldTypeKind::Date => Value::Date(Date::from_days(int()?)),
        FieldTypeKind::TimeOfDay => {
            Value::TimeOfDay(TimeOfDay::from_nanos(nanos()?).shift_minutes(-offset))
        }
        FieldTypeKind::TimePoint => {
            let n: u32 = small(nanos()?, "nanoseconds")?;
            Value::TimePoint(TimePoint::new(int()?, n).shift_minutes(-offset))
        }
        FieldTypeKind::Blob | FieldTypeKind::Clob => {
            return Err(malformed(format!("{kind} default value")));
        }
    })
}

// -----------------------------------------------------------------------------
// types, columns, tables
// -----------------------------------------------------------------------------

fn write_type(ty: &FieldType) -> MessageWriter {
    let mut w = MessageWriter::new();
    w.uint(1, ty.kind() as u64);
    match ty {
        FieldType::Decimal(opt) => {
            if let Some(p) = opt.precision {
                w.uint(2, u64::from(p));
            }
            if let Some(s) = opt.scale {
                w.uint(3, u64::from(s));
            }
        }
        FieldType::Character(opt) => {
            w.flag(4, opt.varying);
            if let Some(n) = opt.length {
                w.uint(5, u64::from(n));
            }
        }
        FieldType::Octet(opt) => {
            w.flag(4, opt.varying);
            if let Some(n) = opt.length {
                w.uint(5, u64::from(n));
            }
        }
        FieldType::TimeOfDay(_) | FieldType::TimePoint(_) => {
            w.flag(6, ty.with_offset());
        }
        _ => {}
    }
    w
}

fn read_type(fields: &[Field]) -> SerializerResult<FieldType> {
    let kind = FieldTypeKind::from_u8(small(require(fields, 1, "type kind")?.uint()?, "kind")?)
        .ok_or_else(|| malformed("unknown type kind"))?;
    let opt_u8 = |tag| -> SerializerResult<Option<u8>> {
        find(fields, tag).map(|f| small(f.uint()?, "type parameter")).transpose()
    };
    let opt_u32 = |tag| -> SerializerResult<Option<u32>> {
        find(fields, tag).map(|f| small(f.uint()?, "length")).transpose()
    };
    let flag = |tag| -> SerializerResult<bool> { find(fields, tag).map_or(Ok(false), Field::flag) };
    Ok(match kind {
        FieldTypeKind::Decimal => FieldType::decimal(opt_u8(2)?, opt_u8(3)?),
        FieldTypeKind::Character => {
            let length = opt_u32(5)?;
            if flag(4)? {
                FieldType::varchar(length)
            } else {
                FieldType::character(length.unwrap_or(1))
            }
        }
        FieldTypeKind::Octet => {
            let length = opt_u32(5)?;
            if flag(4)? {
                FieldType::varbinary(length)
            } else {
                FieldType::binary(length.unwrap_or(1))
            }
        }
        FieldTypeKind::TimeOfDay => FieldType::time_of_day(flag(6)?),
        FieldTypeKind::TimePoint => FieldType::time_point(flag(6)?),
        other => FieldType::from(other),
    })
}

fn write_column(column: &Column) -> SerializerResult<MessageWriter> {
    let mut default = MessageWriter::new();
    match column.default_value() {
        ColumnDefault::Nothing => {
            default.uint(1, 0);
        }
        ColumnDefault::Immediate(v) => {
            default.uint(1, 1).message(2, write_value(v)?);
        }
        ColumnDefault::Sequence(name) => {
            default.uint(1, 2).string(3, name);
        }
        ColumnDefault::Function(f) => {
            default.uint(1, 3).uint(4, u64::from(f.id()));
        }
    }
    let mut w = MessageWriter::new();
    w.string(1, column.name())
        .message(2, write_type(column.field_type()))
        .flag(3, column.nullable())
        .uint(4, u64::from(column.features().bits()))
        .message(5, default);
    Ok(w)
}

fn read_column(fields: &[Field]) -> SerializerResult<Column> {
    let name = require(fields, 1, "column name")?.string()?;
    let ty = read_type(&require(fields, 2, "column type")?.message()?)?;
    let nullable = find(fields, 3).map_or(Ok(true), Field::flag)?;
    let features = find(fields, 4).map_or(Ok(0), Field::uint)?;
    let features = ColumnFeatures::from_bits_truncate(small(features, "column features")?);
    let default = match find(fields, 5) {
        None => ColumnDefault::Nothing,
        Some(f) => {
            let d = f.message()?;
            match require(&d, 1, "default kind")?.uint()? {
                0 => ColumnDefault::Nothing,
                1 => ColumnDefault::Immediate(read_value(&require(&d, 2, "default value")?.message()?)?),
                2 => ColumnDefault::Sequence(require(&d, 3, "default sequence")?.string()?),
                3 => {
                    let id = small(require(&d, 4, "default function")?.uint()?, "function id")?;
                    ColumnDefault::Function(
                        DefaultFunction::from_id(id)
                            .ok_or_else(|| malformed(format!("unknown default function {id}")))?,
                    )
                }
                other => return Err(malformed(format!("unknown default kind {other}"))),
            }
        }
    };
    Ok(Column::new(name, ty)
        .with_nullable(nullable)
        .with_features(features)
        .with_default(default))
}

fn write_table(table: &Table) -> SerializerResult<MessageWriter> {
    let mut w = MessageWriter::new();
    w.string(1, table.name()).uint(2, table.id().as_u64());
    for c in table.columns() {
        w.message(3, write_column(c)?);
    }
    Ok(w)
}

fn read_table(fields: &[Field]) -> SerializerResult<Table> {
    let name = require(fields, 1, "table name")?.string()?;
    let id = find(fields, 2).map_or(Ok(DefinitionId::INVALID.as_u64()), Field::uint)?;
    let columns = all(fields, 3)
        .map(|f| -> SerializerResult<Column> { read_column(&f.message()?) })
        .collect::<SerializerResult<Vec<_>>>()?;
    Ok(Table::new(name, columns).with_id(DefinitionId::new(id)))
}

fn write_sequence(seq: &SequenceDefinition) -> MessageWriter {
    let mut w = MessageWriter::new();
    w.string(1, seq.name())
        .uint(2, seq.id().as_u64())
        .int(3, seq.initial_value)
        .int(4, seq.increment)
        .int(5, seq.min_value)
        .int(6, seq.max_value)
        .flag(7, seq.cycle);
    w
}

fn read_sequence(fields: &[Field]) -> SerializerResult<SequenceDefinition> {
    let mut seq = SequenceDefinition::new(require(fields, 1, "sequence name")?.string()?);
    if let Some(f) = find(fields, 2) {
        seq = seq.with_id(DefinitionId::new(f.uint()?));
    }
    if let Some(f) = find(fields, 3) {
        seq.initial_value = f.int()?;
    }
    if let Some(f) = find(fields, 4) {
        seq.increment = f.int()?;
    }
    if let Some(f) = find(fields, 5) {
        seq.min_value = f.int()?;
    }
    if let Some(f) = find(fields, 6) {
        seq.max_value = f.int()?;
    }
    if let Some(f) = find(fields, 7) {
        seq.cycle = f.flag()?;
    }
    Ok(seq)
}

// -----------------------------------------------------------------------------
// entries
// -----------------------------------------------------------------------------

fn frame(top: u8, body: MessageWriter) -> Bytes {
    let mut out = vec![METADATA_FORMAT_VERSION];
    let mut w = MessageWriter::new();
    w.message(top, body);
    out.extend_from_slice(&w.finish());
    Bytes::from(out)
}

fn unframe(bytes: &[u8], top: u8) -> SerializerResult<Vec<Field>> {
    let (&version, rest) = bytes.split_first().ok_or_else(|| malformed("empty entry"))?;
    if version != METADATA_FORMAT_VERSION {
        return Err(SerializerError::UnsupportedVersion(version));
    }
    let fields = parse_fields(Bytes::copy_from_slice(rest))?;
    require(&fields, top, "entry body")?.message()
}

/// Serializes `index`. A primary index carries its table and every sequence
/// the table's defaults refer to, looked up in `provider`.
pub fn serialize_index(index: &Index, provider: &StorageProvider) -> SerializerResult<Bytes> {
    let mut w = MessageWriter::new();
    w.string(1, index.name())
        .uint(2, index.id().as_u64())
        .uint(3, u64::from(index.features().bits()));
    for key in index.keys() {
        let mut k = MessageWriter::new();
        k.string(1, &key.column)
            .uint(2, u64::from(key.direction == SortDirection::Descending));
        w.message(4, k);
    }
    for value in index.values() {
        w.string(5, value);
    }
    w.string(6, index.description());
    if index.is_primary() {
        let table = provider
            .find_table(index.table_name())
            .ok_or_else(|| CatalogError::NotFound {
                kind: "table",
                name: index.table_name().to_string(),
            })?;
        w.message(7, write_table(&table)?);
        for column in table.columns() {
            if let ColumnDefault::Sequence(name) = column.default_value() {
                let seq = provider.find_sequence(name).ok_or_else(|| CatalogError::NotFound {
                    kind: "sequence",
                    name: name.clone(),
                })?;
                w.message(9, write_sequence(&seq));
            }
        }
    } else {
        w.string(8, index.table_name());
    }
    Ok(frame(TOP_INDEX, w))
}

/// Rebuilds an index entry into `provider`.
///
/// An existing object with the same name is replaced when `overwrite` is
/// set; otherwise the call fails with `AlreadyExists`. Embedded sequences
/// identical to ones already present are left alone.
pub fn deserialize_index(
    bytes: &[u8],
    provider: &StorageProvider,
    overwrite: bool,
) -> SerializerResult<Arc<Index>> {
    let fields = unframe(bytes, TOP_INDEX)?;
    let name = require(&fields, 1, "index name")?.string()?;
    let id = find(&fields, 2).map_or(Ok(DefinitionId::INVALID.as_u64()), Field::uint)?;
    let features = IndexFeatures::from_bits_truncate(small(
        find(&fields, 3).map_or(Ok(0), Field::uint)?,
        "index features",
    )?);
    let keys = all(&fields, 4)
        .map(|f| -> SerializerResult<IndexKey> {
            let k = f.message()?;
            let direction = match find(&k, 2).map_or(Ok(0), Field::uint)? {
                0 => SortDirection::Ascending,
                _ => SortDirection::Descending,
            };
            Ok(IndexKey {
                column: require(&k, 1, "key column")?.string()?,
                direction,
            })
        })
        .collect::<SerializerResult<Vec<_>>>()?;
    let values = all(&fields, 5)
        .map(Field::string)
        .collect::<SerializerResult<Vec<_>>>()?;
    let description = find(&fields, 6).map_or(Ok(String::new()), Field::string)?;

    let table_name = if features.contains(IndexFeatures::PRIMARY) {
        for f in all(&fields, 9) {
            let seq = read_sequence(&f.message()?)?;
            let same = provider
                .find_sequence(seq.name())
                .is_some_and(|existing| *existing == seq.clone().with_id(existing.id()));
            if !same {
                provider.add_sequence(seq, overwrite)?;
            }
        }
        let table = read_table(&require(&fields, 7, "table")?.message()?)?;
        let table = provider.add_table(table, overwrite)?;
        table.name().to_string()
    } else {
        require(&fields, 8, "table name")?.string()?
    };
    let index = Index::new(name, table_name, keys, values, features)
        .with_id(DefinitionId::new(id))
        .with_description(description);
    let index = provider.add_index(index, overwrite)?;
    debug!(index = index.name(), "index deserialized");
    Ok(index)
}

/// Serializes a sequence definition.
#[must_use]
pub fn serialize_sequence(sequence: &SequenceDefinition) -> Bytes {
    frame(TOP_SEQUENCE, write_sequence(sequence))
}

/// Rebuilds a sequence entry into `provider`.
pub fn deserialize_sequence(
    bytes: &[u8],
    provider: &StorageProvider,
    overwrite: bool,
) -> SerializerResult<Arc<SequenceDefinition>> {
    let seq = read_sequence(&unframe(bytes, TOP_SEQUENCE)?)?;
    Ok(provider.add_sequence(seq, overwrite)?)
}
