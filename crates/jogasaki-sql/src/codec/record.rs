//! Field operations and record-level coding.

use jogasaki_common::VALUE_FORMAT_VERSION;

use super::key::{decode_key_field, encode_key_field};
use super::stream::{encode_with_retry, ReadableStream, WritableStream};
use super::value::{decode_value_field, encode_value_field};
use super::{CodecError, CodecResult, CodingSpec, NullOrder, StreamKind};
use crate::accessor::{RecordBuffer, RecordRef};
use crate::data::{DataError, Value};
use crate::meta::{FieldType, FieldTypeKind};

type EncodeFn = fn(&Value, &FieldType, CodingSpec, &mut WritableStream<'_>) -> CodecResult<()>;
type DecodeFn = fn(&FieldType, CodingSpec, &mut ReadableStream<'_>) -> CodecResult<Value>;

fn encode_value(
    value: &Value,
    ty: &FieldType,
    _: CodingSpec,
    out: &mut WritableStream<'_>,
) -> CodecResult<()> {
    encode_value_field(value, ty, out)
}

fn decode_value(ty: &FieldType, _: CodingSpec, input: &mut ReadableStream<'_>) -> CodecResult<Value> {
    decode_value_field(ty, input)
}

/// How one field of a record is written to and read from a stream.
///
/// The coder function is chosen once, when the operation is built.
#[derive(Clone, Copy)]
pub struct FieldOp {
    index: usize,
    field_type: FieldType,
    nullable: bool,
    spec: CodingSpec,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl std::fmt::Debug for FieldOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldOp")
            .field("index", &self.index)
            .field("field_type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("spec", &self.spec)
            .finish()
    }
}

impl FieldOp {
    /// Builds the operation for field `index` of a record.
    ///
    /// Fails for kinds that cannot be used in a key stream.
    pub fn new(
        index: usize,
        field_type: FieldType,
        nullable: bool,
        spec: CodingSpec,
    ) -> CodecResult<Self> {
        let kind = field_type.kind();
        let (encode, decode): (EncodeFn, DecodeFn) = match spec.stream {
            StreamKind::Key => {
                if kind.is_lob() || kind == FieldTypeKind::Unknown {
                    return Err(CodecError::UnsupportedKeyType(kind));
                }
                (encode_key_field as EncodeFn, decode_key_field as DecodeFn)
            }
            StreamKind::Value => (encode_value as EncodeFn, decode_value as DecodeFn),
        };
        Ok(Self {
            index,
            field_type,
            nullable,
            spec,
            encode,
            decode,
        })
    }

    /// Index of the field in the record.
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Type of the field.
    #[inline]
    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Whether the field carries a nullity flag.
    #[inline]
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Coding spec.
    #[inline]
    #[must_use]
    pub fn spec(&self) -> CodingSpec {
        self.spec
    }

    /// (null flag, present flag)
    fn flags(&self) -> (u8, u8) {
        match (self.spec.stream, self.spec.null_order) {
            (StreamKind::Value, _) | (StreamKind::Key, NullOrder::First) => (0, 1),
            (StreamKind::Key, NullOrder::Last) => (1, 0),
        }
    }

    /// Writes `value`.
    pub fn encode(&self, value: &Value, out: &mut WritableStream<'_>) -> CodecResult<()> {
        if self.nullable {
            let (null, present) = self.flags();
            if value.is_null() {
                out.write_u8(null);
                return Ok(());
            }
            out.write_u8(present);
        } else if value.is_null() {
            return Err(CodecError::NullInNonNullable(self.index));
        }
        (self.encode)(value, &self.field_type, self.spec, out)
    }

    /// Reads one value.
    pub fn decode(&self, input: &mut ReadableStream<'_>) -> CodecResult<Value> {
        if self.nullable {
            let (null, present) = self.flags();
            let flag = input.read_u8()?;
            if flag == null {
                return Ok(Value::Null);
            }
            if flag != present {
                return Err(CodecError::DataCorruption(format!(
                    "invalid nullity flag {flag:#04x}"
                )));
            }
        }
        (self.decode)(&self.field_type, self.spec, input)
    }
}

/// A sequence of field operations forming one encoded stream.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::codec::{CodingSpec, FieldOp, RecordCodec};
/// use jogasaki_sql::data::Value;
/// use jogasaki_sql::meta::FieldType;
///
/// let codec = RecordCodec::new(vec![
///     FieldOp::new(0, FieldType::Int4, false, CodingSpec::KEY_ASCENDING).unwrap(),
/// ]);
/// let mut buf = Vec::new();
/// codec.encode_to_vec(&[Value::Int4(1)], &mut buf).unwrap();
/// assert_eq!(codec.decode_values(&buf).unwrap(), vec![Value::Int4(1)]);
/// ```
#[derive(Debug, Clone)]
pub struct RecordCodec {
    ops: Vec<FieldOp>,
    versioned: bool,
}

impl RecordCodec {
    /// Creates a codec without a header.
    #[must_use]
    pub fn new(ops: Vec<FieldOp>) -> Self {
        Self {
            ops,
            versioned: false,
        }
    }

    /// Creates a codec whose stream starts with the value format version.
    #[must_use]
    pub fn versioned(ops: Vec<FieldOp>) -> Self {
        Self {
            ops,
            versioned: true,
        }
    }

    /// Field operations in stream order.
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[FieldOp] {
        &self.ops
    }

    fn write_header(&self, out: &mut WritableStream<'_>) {
        if self.versioned {
            out.write_u8(VALUE_FORMAT_VERSION);
        }
    }

    fn read_header(&self, input: &mut ReadableStream<'_>) -> CodecResult<()> {
        if self.versioned {
            let version = input.read_u8()?;
            if version != VALUE_FORMAT_VERSION {
                return Err(CodecError::UnknownFormatVersion(version));
            }
        }
        Ok(())
    }

    /// Encodes `values`, taking each operation's field by index.
    /// Missing trailing values are NULL.
    pub fn encode_values(&self, values: &[Value], out: &mut WritableStream<'_>) -> CodecResult<()> {
        self.write_header(out);
        let null = Value::Null;
        for op in &self.ops {
            op.encode(values.get(op.index).unwrap_or(&null), out)?;
        }
        Ok(())
    }

    /// Encodes the fields of a record.
    pub fn encode_record(&self, record: RecordRef<'_>, out: &mut WritableStream<'_>) -> CodecResult<()> {
        self.write_header(out);
        for op in &self.ops {
            op.encode(&record.get_value(op.index), out)?;
        }
        Ok(())
    }

    /// Encodes `values` into `buf`, growing it as needed. Returns the length.
    pub fn encode_to_vec(&self, values: &[Value], buf: &mut Vec<u8>) -> CodecResult<usize> {
        encode_with_retry(buf, |out| self.encode_values(values, out))
    }

    /// Decodes all fields in stream order.
    pub fn decode_values(&self, bytes: &[u8]) -> CodecResult<Vec<Value>> {
        let mut input = ReadableStream::new(bytes);
        self.read_header(&mut input)?;
        self.ops.iter().map(|op| op.decode(&mut input)).collect()
    }

    /// Decodes into the fields of `record`. Returns the bytes consumed.
    pub fn decode_into(&self, bytes: &[u8], record: &mut RecordBuffer) -> CodecResult<usize> {
        let mut input = ReadableStream::new(bytes);
        self.read_header(&mut input)?;
        for op in &self.ops {
            let value = op.decode(&mut input)?;
            record
                .set_value(op.index, &value)
                .map_err(|e| match e {
                    DataError::KindMismatch { expected, actual } => {
                        CodecError::TypeMismatch { expected, actual }
                    }
                    DataError::NotNullable => CodecError::NullInNonNullable(op.index),
                    DataError::UnresolvedLob => CodecError::UnresolvedLob,
                })?;
        }
        Ok(input.position())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::Order;
    use crate::meta::RecordMeta;

    fn key_codec(specs: &[(FieldType, bool, CodingSpec)]) -> RecordCodec {
        RecordCodec::new(
            specs
                .iter()
                .enumerate()
                .map(|(i, (t, n, s))| FieldOp::new(i, *t, *n, *s).unwrap())
                .collect(),
        )
    }

    fn encode(codec: &RecordCodec, values: &[Value]) -> Vec<u8> {
        let mut buf = Vec::new();
        codec.encode_to_vec(values, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_null_placement() {
        let first = key_codec(&[(FieldType::Int4, true, CodingSpec::KEY_ASCENDING)]);
        assert!(encode(&first, &[Value::Null]) < encode(&first, &[Value::Int4(i32::MIN)]));

        let last_spec = CodingSpec {
            null_order: NullOrder::Last,
            ..CodingSpec::KEY_ASCENDING
        };
        let last = key_codec(&[(FieldType::Int4, true, last_spec)]);
        assert!(encode(&last, &[Value::Null]) > encode(&last, &[Value::Int4(i32::MAX)]));
        assert_eq!(last.decode_values(&encode(&last, &[Value::Null])).unwrap(), vec![Value::Null]);
    }

    #[test]
    fn test_composite_key_order() {
        let codec = key_codec(&[
            (FieldType::Int4, false, CodingSpec::KEY_ASCENDING),
            (FieldType::varchar(None), false, CodingSpec::key(Order::Descending)),
        ]);
        let a = encode(&codec, &[Value::Int4(1), Value::from("b")]);
        let b = encode(&codec, &[Value::Int4(1), Value::from("a")]);
        let c = encode(&codec, &[Value::Int4(2), Value::from("z")]);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_lob_key_op_rejected() {
        assert_eq!(
            FieldOp::new(0, FieldType::Clob, false, CodingSpec::KEY_ASCENDING).unwrap_err(),
            CodecError::UnsupportedKeyType(FieldTypeKind::Clob)
        );
        assert!(FieldOp::new(0, FieldType::Clob, true, CodingSpec::VALUE).is_ok());
    }

    #[test]
    fn test_null_in_non_nullable() {
        let codec = key_codec(&[(FieldType::Int8, false, CodingSpec::VALUE)]);
        let mut buf = Vec::new();
        assert_eq!(
            codec.encode_to_vec(&[Value::Null], &mut buf),
            Err(CodecError::NullInNonNullable(0))
        );
    }

    #[test]
    fn test_versioned_value_stream() {
        let ops = vec![
            FieldOp::new(1, FieldType::varchar(None), true, CodingSpec::VALUE).unwrap(),
            FieldOp::new(2, FieldType::Float8, true, CodingSpec::VALUE).unwrap(),
        ];
        let codec = RecordCodec::versioned(ops);
        let bytes = encode(&codec, &[Value::Int4(0), Value::from("x"), Value::Null]);
        assert_eq!(bytes[0], VALUE_FORMAT_VERSION);

        let meta = Arc::new(RecordMeta::new(vec![
            (FieldType::Int4, false),
            (FieldType::varchar(None), true),
            (FieldType::Float8, true),
        ]));
        let mut record = RecordBuffer::new(meta);
        let used = codec.decode_into(&bytes, &mut record).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(record.get_value(1), Value::from("x"));
        assert!(record.is_null(2));

        let mut bad = bytes.clone();
        bad[0] = 99;
        assert_eq!(codec.decode_values(&bad), Err(CodecError::UnknownFormatVersion(99)));
    }

    #[test]
    fn test_encode_record() {
        let meta = Arc::new(RecordMeta::new(vec![(FieldType::Int8, false), (FieldType::Boolean, true)]));
        let record = RecordBuffer::from_values(meta, &[Value::Int8(5), Value::Boolean(true)]).unwrap();
        let codec = key_codec(&[
            (FieldType::Int8, false, CodingSpec::KEY_ASCENDING),
            (FieldType::Boolean, true, CodingSpec::KEY_ASCENDING),
        ]);
        let mut buf = vec![0u8; 32];
        let mut out = WritableStream::new(&mut buf);
        codec.encode_record(record.as_record_ref(), &mut out).unwrap();
        let n = out.required_size();
        assert_eq!(
            codec.decode_values(&buf[..n]).unwrap(),
            vec![Value::Int8(5), Value::Boolean(true)]
        );
    }
}
