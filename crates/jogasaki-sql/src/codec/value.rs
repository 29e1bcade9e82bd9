//! Compact value-stream encoding.

use jogasaki_common::BlobId;

use super::stream::{ReadableStream, WritableStream};
use super::{CodecError, CodecResult};
use crate::data::{
    BlobReference, ClobReference, Date, LobProvenance, TimeOfDay, TimePoint, Triple, Value,
    NANOS_PER_DAY, NANOS_PER_SECOND,
};
use crate::meta::FieldType;

fn corrupt(what: &str) -> CodecError {
    CodecError::DataCorruption(format!("malformed {what} value"))
}

fn write_string(bytes: &[u8], fixed: Option<u32>, pad: u8, out: &mut WritableStream<'_>) {
    match fixed {
        Some(n) => {
            let n = n as usize;
            let len = bytes.len().min(n);
            out.write_bytes(&bytes[..len]);
            for _ in len..n {
                out.write_u8(pad);
            }
        }
        None => {
            out.write_varint(bytes.len() as u128);
            out.write_bytes(bytes);
        }
    }
}

fn read_string<'a>(fixed: Option<u32>, input: &mut ReadableStream<'a>) -> CodecResult<&'a [u8]> {
    let len = match fixed {
        Some(n) => n as usize,
        None => input.read_length()?,
    };
    input.read_bytes(len)
}

fn write_lob(id: BlobId, provenance: &LobProvenance, out: &mut WritableStream<'_>) -> CodecResult<()> {
    if matches!(provenance, LobProvenance::Provided(_)) {
        return Err(CodecError::UnresolvedLob);
    }
    out.write_varint(u128::from(id.as_u64()));
    out.write_u8(provenance.tag());
    Ok(())
}

fn read_lob(input: &mut ReadableStream<'_>) -> CodecResult<BlobId> {
    let id = BlobId::new(input.read_varint_u64()?);
    match input.read_u8()? {
        1 | 2 => Ok(id),
        _ => Err(corrupt("lob")),
    }
}

/// Encodes a non-null value of `ty` into a value stream.
pub fn encode_value_field(value: &Value, ty: &FieldType, out: &mut WritableStream<'_>) -> CodecResult<()> {
    match (ty, value) {
        (FieldType::Boolean, Value::Boolean(v)) => out.write_u8(u8::from(*v)),
        (FieldType::Int1, Value::Int1(v)) => out.write_u8(*v as u8),
        (FieldType::Int2, Value::Int2(v)) => out.write_bytes(&v.to_le_bytes()),
        (FieldType::Int4, Value::Int4(v)) => out.write_signed_varint(i64::from(*v)),
        (FieldType::Int8, Value::Int8(v)) => out.write_signed_varint(*v),
        (FieldType::Float4, Value::Float4(v)) => out.write_bytes(&v.to_bits().to_le_bytes()),
        (FieldType::Float8, Value::Float8(v)) => out.write_bytes(&v.to_bits().to_le_bytes()),
        (FieldType::Decimal(_), Value::Decimal(v)) => {
            out.write_u8((v.sign() + 1) as u8);
            out.write_signed_varint(i64::from(v.exponent()));
            out.write_varint(v.coefficient());
        }
        (FieldType::Character(_), Value::Character(v)) => {
            write_string(v.as_bytes(), ty.fixed_length(), b' ', out);
        }
        (FieldType::Octet(_), Value::Octet(v)) => write_string(v, ty.fixed_length(), 0, out),
        (FieldType::Date, Value::Date(v)) => out.write_signed_varint(v.days()),
        (FieldType::TimeOfDay(_), Value::TimeOfDay(v)) => out.write_varint(u128::from(v.nanos())),
        (FieldType::TimePoint(_), Value::TimePoint(v)) => {
            out.write_signed_varint(v.seconds());
            out.write_varint(u128::from(v.subsecond_nanos()));
        }
        (FieldType::Blob, Value::Blob(v)) => write_lob(v.id(), v.provenance(), out)?,
        (FieldType::Clob, Value::Clob(v)) => write_lob(v.id(), v.provenance(), out)?,
        _ => {
            return Err(CodecError::TypeMismatch {
                expected: ty.kind(),
                actual: value.kind(),
            })
        }
    }
    Ok(())
}

/// Decodes a non-null value of `ty` from a value stream.
///
/// LOB references come back as fetched.
pub fn decode_value_field(ty: &FieldType, input: &mut ReadableStream<'_>) -> CodecResult<Value> {
    Ok(match ty {
        FieldType::Boolean => match input.read_u8()? {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            _ => return Err(corrupt("boolean")),
        },
        FieldType::Int1 => Value::Int1(input.read_u8()? as i8),
        FieldType::Int2 => Value::Int2(i16::from_le_bytes(input.read_array_masked(0)?)),
        FieldType::Int4 => Value::Int4(
            i32::try_from(input.read_signed_varint()?).map_err(|_| corrupt("int4"))?,
        ),
        FieldType::Int8 => Value::Int8(input.read_signed_varint()?),
        FieldType::Float4 => {
            Value::Float4(f32::from_bits(u32::from_le_bytes(input.read_array_masked(0)?)))
        }
        FieldType::Float8 => {
            Value::Float8(f64::from_bits(u64::from_le_bytes(input.read_array_masked(0)?)))
        }
        FieldType::Decimal(_) => {
            let sign = match input.read_u8()? {
                b @ 0..=2 => b as i8 - 1,
                _ => return Err(corrupt("decimal")),
            };
            let exponent =
                i32::try_from(input.read_signed_varint()?).map_err(|_| corrupt("decimal"))?;
            let coefficient = input.read_varint()?;
            if coefficient > Triple::MAX_COEFFICIENT {
                return Err(corrupt("decimal"));
            }
            Value::Decimal(Triple::new(sign, coefficient, exponent))
        }
        FieldType::Character(_) => {
            let bytes = read_string(ty.fixed_length(), input)?;
            Value::Character(
                std::str::from_utf8(bytes)
                    .map_err(|_| corrupt("character"))?
                    .to_string(),
            )
        }
        FieldType::Octet(_) => Value::Octet(read_string(ty.fixed_length(), input)?.to_vec()),
        FieldType::Date => Value::Date(Date::from_days(input.read_signed_varint()?)),
        FieldType::TimeOfDay(_) => {
            let nanos = input.read_varint_u64()?;
            if nanos >= NANOS_PER_DAY {
                return Err(corrupt("time"));
            }
            Value::TimeOfDay(TimeOfDay::from_nanos(nanos))
        }
        FieldType::TimePoint(_) => {
            let seconds = input.read_signed_varint()?;
            let nanos = input.read_varint_u64()?;
            if nanos >= NANOS_PER_SECOND {
                return Err(corrupt("timestamp"));
            }
            Value::TimePoint(TimePoint::new(seconds, nanos as u32))
        }
        FieldType::Blob => Value::Blob(BlobReference::fetched(read_lob(input)?)),
        FieldType::Clob => Value::Clob(ClobReference::fetched(read_lob(input)?)),
        FieldType::Unknown => return Err(corrupt("unknown")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LobLocator;

    fn encode(value: &Value, ty: &FieldType) -> Vec<u8> {
        let mut buf = vec![0u8; 256];
        let mut out = WritableStream::new(&mut buf);
        encode_value_field(value, ty, &mut out).unwrap();
        let n = out.required_size();
        buf.truncate(n);
        buf
    }

    fn decode(bytes: &[u8], ty: &FieldType) -> Value {
        let mut input = ReadableStream::new(bytes);
        let v = decode_value_field(ty, &mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        v
    }

    #[test]
    fn test_compact_integers() {
        assert_eq!(encode(&Value::Int8(-1), &FieldType::Int8), vec![1]);
        assert_eq!(encode(&Value::Int4(64), &FieldType::Int4), vec![0x80, 0x01]);
        assert_eq!(decode(&[0x80, 0x01], &FieldType::Int4), Value::Int4(64));
    }

    #[test]
    fn test_decimal_keeps_scale() {
        let ty = FieldType::decimal(Some(5), Some(2));
        let v = Value::Decimal("-1.50".parse().unwrap());
        match decode(&encode(&v, &ty), &ty) {
            Value::Decimal(t) => assert_eq!(t.to_string(), "-1.50"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_strings() {
        let ty = FieldType::varchar(Some(10));
        assert_eq!(encode(&Value::from("héllo"), &ty)[0], 6);
        assert_eq!(decode(&encode(&Value::from("héllo"), &ty), &ty), Value::from("héllo"));
        let fixed = FieldType::character(3);
        assert_eq!(encode(&Value::from("a"), &fixed), b"a  ");
    }

    #[test]
    fn test_lob_reference() {
        let v = Value::Clob(ClobReference::resolved(BlobId::new(300)));
        assert_eq!(
            decode(&encode(&v, &FieldType::Clob), &FieldType::Clob),
            Value::Clob(ClobReference::fetched(BlobId::new(300)))
        );
        let provided = Value::Blob(BlobReference::provided(LobLocator::Data(bytes::Bytes::from_static(b"x"))));
        let mut buf = [0u8; 16];
        let mut out = WritableStream::new(&mut buf);
        assert_eq!(
            encode_value_field(&provided, &FieldType::Blob, &mut out),
            Err(CodecError::UnresolvedLob)
        );
    }

    #[test]
    fn test_length_prefix_overrun() {
        let mut input = ReadableStream::new(&[9, b'a']);
        assert!(matches!(
            decode_value_field(&FieldType::varchar(None), &mut input),
            Err(CodecError::DataCorruption(_))
        ));
    }

    #[test]
    fn test_temporal_validation() {
        let mut out = vec![0u8; 16];
        let mut w = WritableStream::new(&mut out);
        w.write_varint(u128::from(NANOS_PER_DAY));
        let n = w.required_size();
        let mut input = ReadableStream::new(&out[..n]);
        assert!(decode_value_field(&FieldType::time_of_day(false), &mut input).is_err());
    }
}
