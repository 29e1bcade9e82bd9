//! In-memory byte layout of runtime values.
//!
//! Record buffers and value stores hold each field in a fixed slot of
//! [`FieldTypeKind::runtime_size`] bytes. Variable-length payloads live in a
//! [`LifoArena`] and the slot keeps the [`ArenaSlice`] handle.
//!
//! | kind | slot layout (little endian) |
//! |---|---|
//! | boolean, int1 | 1 byte |
//! | int2 / int4 / int8 | 2 / 4 / 8 bytes |
//! | float4 / float8 | IEEE bits, 4 / 8 bytes |
//! | decimal | coefficient u128, exponent i32, sign i8 |
//! | character, octet | arena handle (12 bytes) |
//! | date | days i64 |
//! | time_of_day | nanoseconds u64 |
//! | time_point | seconds i64, nanoseconds u32 |
//! | blob, clob | object id u64, provenance u8 |

use jogasaki_common::memory::{ArenaSlice, LifoArena};
use jogasaki_common::{BlobId, ErrorCode, ErrorInfo};
use thiserror::Error;

use super::decimal::Triple;
use super::lob::{BlobReference, ClobReference, LobProvenance};
use super::temporal::{Date, TimeOfDay, TimePoint};
use super::value::Value;
use crate::meta::FieldTypeKind;

/// Errors raised when storing a runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// The value does not match the slot's kind.
    #[error("type mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// Kind of the slot.
        expected: FieldTypeKind,
        /// Kind of the value.
        actual: FieldTypeKind,
    },
    /// NULL stored into a non-nullable slot.
    #[error("NULL is not allowed here")]
    NotNullable,
    /// A LOB reference that has not been registered yet.
    #[error("LOB reference is not resolved")]
    UnresolvedLob,
}

impl From<DataError> for ErrorInfo {
    fn from(err: DataError) -> Self {
        let code = match err {
            DataError::KindMismatch { .. } => ErrorCode::ValueEvaluationFailure,
            DataError::NotNullable => ErrorCode::NotNullConstraintViolation,
            DataError::UnresolvedLob => ErrorCode::Internal,
        };
        ErrorInfo::new(code, err.to_string())
    }
}

fn le<const N: usize>(src: &[u8], at: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&src[at..at + N]);
    buf
}

fn lob_slot(dst: &mut [u8], id: BlobId, provenance: &LobProvenance) -> Result<(), DataError> {
    if matches!(provenance, LobProvenance::Provided(_)) {
        return Err(DataError::UnresolvedLob);
    }
    dst[..8].copy_from_slice(&id.as_u64().to_le_bytes());
    dst[8] = provenance.tag();
    Ok(())
}

/// Writes `value` into `dst`, a slot of `kind`. Varlen payloads are copied
/// into `arena`. `dst` must hold at least `kind.runtime_size()` bytes.
pub fn store_value(
    kind: FieldTypeKind,
    dst: &mut [u8],
    value: &Value,
    arena: &mut LifoArena,
) -> Result<(), DataError> {
    let mismatch = || DataError::KindMismatch {
        expected: kind,
        actual: value.kind(),
    };
    match (kind, value) {
        (FieldTypeKind::Boolean, Value::Boolean(v)) => dst[0] = u8::from(*v),
        (FieldTypeKind::Int1, Value::Int1(v)) => dst[0] = *v as u8,
        (FieldTypeKind::Int2, Value::Int2(v)) => dst[..2].copy_from_slice(&v.to_le_bytes()),
        (FieldTypeKind::Int4, Value::Int4(v)) => dst[..4].copy_from_slice(&v.to_le_bytes()),
        (FieldTypeKind::Int8, Value::Int8(v)) => dst[..8].copy_from_slice(&v.to_le_bytes()),
        (FieldTypeKind::Float4, Value::Float4(v)) => {
            dst[..4].copy_from_slice(&v.to_bits().to_le_bytes());
        }
        (FieldTypeKind::Float8, Value::Float8(v)) => {
            dst[..8].copy_from_slice(&v.to_bits().to_le_bytes());
        }
        (FieldTypeKind::Decimal, Value::Decimal(v)) => {
            dst[..16].copy_from_slice(&v.coefficient().to_le_bytes());
            dst[16..20].copy_from_slice(&v.exponent().to_le_bytes());
            dst[20] = v.sign() as u8;
        }
        (FieldTypeKind::Character, Value::Character(v)) => {
            let handle = arena.alloc_copy(v.as_bytes());
            dst[..ArenaSlice::ENCODED_SIZE].copy_from_slice(&handle.to_le_bytes());
        }
        (FieldTypeKind::Octet, Value::Octet(v)) => {
            let handle = arena.alloc_copy(v);
            dst[..ArenaSlice::ENCODED_SIZE].copy_from_slice(&handle.to_le_bytes());
        }
        (FieldTypeKind::Date, Value::Date(v)) => dst[..8].copy_from_slice(&v.days().to_le_bytes()),
        (FieldTypeKind::TimeOfDay, Value::TimeOfDay(v)) => {
            dst[..8].copy_from_slice(&v.nanos().to_le_bytes());
        }
        (FieldTypeKind::TimePoint, Value::TimePoint(v)) => {
            dst[..8].copy_from_slice(&v.seconds().to_le_bytes());
            dst[8..12].copy_from_slice(&v.subsecond_nanos().to_le_bytes());
        }
        (FieldTypeKind::Blob, Value::Blob(v)) => lob_slot(dst, v.id(), v.provenance())?,
        (FieldTypeKind::Clob, Value::Clob(v)) => lob_slot(dst, v.id(), v.provenance())?,
        _ => return Err(mismatch()),
    }
    Ok(())
}

/// Reads the value of `kind` held in `src`.
#[must_use]
pub fn load_value(kind: FieldTypeKind, src: &[u8], arena: &LifoArena) -> Value {
    match kind {
        FieldTypeKind::Unknown => Value::Null,
        FieldTypeKind::Boolean => Value::Boolean(src[0] != 0),
        FieldTypeKind::Int1 => Value::Int1(src[0] as i8),
        FieldTypeKind::Int2 => Value::Int2(i16::from_le_bytes(le(src, 0))),
        FieldTypeKind::Int4 => Value::Int4(i32::from_le_bytes(le(src, 0))),
        FieldTypeKind::Int8 => Value::Int8(i64::from_le_bytes(le(src, 0))),
        FieldTypeKind::Float4 => Value::Float4(f32::from_bits(u32::from_le_bytes(le(src, 0)))),
        FieldTypeKind::Float8 => Value::Float8(f64::from_bits(u64::from_le_bytes(le(src, 0)))),
        FieldTypeKind::Decimal => Value::Decimal(Triple::new(
            src[20] as i8,
            u128::from_le_bytes(le(src, 0)),
            i32::from_le_bytes(le(src, 16)),
        )),
        FieldTypeKind::Character => {
            let handle = ArenaSlice::from_le_bytes(le(src, 0));
            Value::Character(String::from_utf8_lossy(arena.get(handle)).into_owned())
        }
        FieldTypeKind::Octet => {
            let handle = ArenaSlice::from_le_bytes(le(src, 0));
            Value::Octet(arena.get(handle).to_vec())
        }
        FieldTypeKind::Date => Value::Date(Date::from_days(i64::from_le_bytes(le(src, 0)))),
        FieldTypeKind::TimeOfDay => {
            Value::TimeOfDay(TimeOfDay::from_nanos(u64::from_le_bytes(le(src, 0))))
        }
        FieldTypeKind::TimePoint => Value::TimePoint(TimePoint::new(
            i64::from_le_bytes(le(src, 0)),
            u32::from_le_bytes(le(src, 8)),
        )),
        FieldTypeKind::Blob | FieldTypeKind::Clob => {
            let id = BlobId::new(u64::from_le_bytes(le(src, 0)));
            let fetched = src[8] == LobProvenance::Fetched.tag();
            if kind == FieldTypeKind::Blob {
                Value::Blob(if fetched {
                    BlobReference::fetched(id)
                } else {
                    BlobReference::resolved(id)
                })
            } else {
                Value::Clob(if fetched {
                    ClobReference::fetched(id)
                } else {
                    ClobReference::resolved(id)
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LobLocator;

    fn round_trip(kind: FieldTypeKind, value: Value) -> Value {
        let mut arena = LifoArena::new(256);
        let mut slot = vec![0u8; kind.runtime_size()];
        store_value(kind, &mut slot, &value, &mut arena).unwrap();
        load_value(kind, &slot, &arena)
    }

    #[test]
    fn test_fixed_slots() {
        for v in [
            Value::Boolean(true),
            Value::Int1(-5),
            Value::Int2(-300),
            Value::Int4(70_000),
            Value::Int8(i64::MIN),
            Value::Float4(1.5),
            Value::Float8(-0.25),
            Value::Date(Date::from_days(-3)),
            Value::TimeOfDay(TimeOfDay::from_nanos(123)),
            Value::TimePoint(TimePoint::new(-10, 5)),
        ] {
            assert_eq!(round_trip(v.kind(), v.clone()), v);
        }
    }

    #[test]
    fn test_decimal_and_varlen_slots() {
        let d: Triple = "-12.345".parse().unwrap();
        assert_eq!(round_trip(FieldTypeKind::Decimal, Value::Decimal(d)), Value::Decimal(d));
        let s = Value::from("héllo");
        assert_eq!(round_trip(FieldTypeKind::Character, s.clone()), s);
        let o = Value::Octet(vec![0, 1, 2]);
        assert_eq!(round_trip(FieldTypeKind::Octet, o.clone()), o);
    }

    #[test]
    fn test_mismatch_and_unresolved_lob() {
        let mut arena = LifoArena::new(256);
        let mut slot = [0u8; 16];
        let err = store_value(FieldTypeKind::Int4, &mut slot, &Value::Int8(1), &mut arena);
        assert!(matches!(err, Err(DataError::KindMismatch { .. })));
        let lob = Value::Blob(BlobReference::provided(LobLocator::Data(Default::default())));
        assert_eq!(
            store_value(FieldTypeKind::Blob, &mut slot, &lob, &mut arena),
            Err(DataError::UnresolvedLob)
        );
        let resolved = Value::Blob(BlobReference::resolved(BlobId::new(9)));
        assert_eq!(round_trip(FieldTypeKind::Blob, resolved.clone()), resolved);
    }
}
