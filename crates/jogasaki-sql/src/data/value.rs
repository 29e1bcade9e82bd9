//! Tagged runtime values.

use std::cmp::Ordering;
use std::fmt;

use super::decimal::Triple;
use super::lob::{BlobReference, ClobReference};
use super::temporal::{Date, TimeOfDay, TimePoint};
use crate::meta::FieldTypeKind;

/// A runtime value: `Null` or one variant per field kind.
///
/// Equality is structural (`1.0` and `1.00` differ as decimals); use
/// [`Value::compare`] for SQL comparison.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Boolean(bool),
    /// 1-byte integer.
    Int1(i8),
    /// 2-byte integer.
    Int2(i16),
    /// 4-byte integer.
    Int4(i32),
    /// 8-byte integer.
    Int8(i64),
    /// Single precision float.
    Float4(f32),
    /// Double precision float.
    Float8(f64),
    /// Exact decimal.
    Decimal(Triple),
    /// Character string.
    Character(String),
    /// Octet string.
    Octet(Vec<u8>),
    /// Calendar date.
    Date(Date),
    /// Time of day (UTC for zoned types).
    TimeOfDay(TimeOfDay),
    /// Point in time (UTC for zoned types).
    TimePoint(TimePoint),
    /// BLOB reference.
    Blob(BlobReference),
    /// CLOB reference.
    Clob(ClobReference),
}

impl Value {
    /// Kind of the value; `Unknown` for NULL.
    #[must_use]
    pub fn kind(&self) -> FieldTypeKind {
        match self {
            Value::Null => FieldTypeKind::Unknown,
            Value::Boolean(_) => FieldTypeKind::Boolean,
            Value::Int1(_) => FieldTypeKind::Int1,
            Value::Int2(_) => FieldTypeKind::Int2,
            Value::Int4(_) => FieldTypeKind::Int4,
            Value::Int8(_) => FieldTypeKind::Int8,
            Value::Float4(_) => FieldTypeKind::Float4,
            Value::Float8(_) => FieldTypeKind::Float8,
            Value::Decimal(_) => FieldTypeKind::Decimal,
            Value::Character(_) => FieldTypeKind::Character,
            Value::Octet(_) => FieldTypeKind::Octet,
            Value::Date(_) => FieldTypeKind::Date,
            Value::TimeOfDay(_) => FieldTypeKind::TimeOfDay,
            Value::TimePoint(_) => FieldTypeKind::TimePoint,
            Value::Blob(_) => FieldTypeKind::Blob,
            Value::Clob(_) => FieldTypeKind::Clob,
        }
    }

    /// Returns true for NULL.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integral value widened to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int1(v) => Some(i64::from(v)),
            Value::Int2(v) => Some(i64::from(v)),
            Value::Int4(v) => Some(i64::from(v)),
            Value::Int8(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Character value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Character(s) => Some(s),
            _ => None,
        }
    }

    /// SQL comparison. `None` when either side is NULL, a float is NaN, or
    /// the kinds are not comparable. Integers of different widths compare
    /// numerically.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
            return Some(a.cmp(&b));
        }
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Float4(a), Value::Float4(b)) => a.partial_cmp(b),
            (Value::Float8(a), Value::Float8(b)) => a.partial_cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.compare(b)),
            (Value::Character(a), Value::Character(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Octet(a), Value::Octet(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => Some(a.cmp(b)),
            (Value::TimePoint(a), Value::TimePoint(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from!(
    bool => Boolean,
    i8 => Int1,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    Triple => Decimal,
    String => Character,
    Vec<u8> => Octet,
    Date => Date,
    TimeOfDay => TimeOfDay,
    TimePoint => TimePoint,
    BlobReference => Blob,
    ClobReference => Clob,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Character(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int1(v) => write!(f, "{v}"),
            Value::Int2(v) => write!(f, "{v}"),
            Value::Int4(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Float4(v) => write!(f, "{v}"),
            Value::Float8(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Character(v) => f.write_str(v),
            Value::Octet(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Date(v) => write!(f, "{v}"),
            Value::TimeOfDay(v) => write!(f, "{v}"),
            Value::TimePoint(v) => write!(f, "{v}"),
            Value::Blob(v) => write!(f, "{v:?}"),
            Value::Clob(v) => write!(f, "{v:?}"),
        }
    }
}
