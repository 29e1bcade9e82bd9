//! Field types.

use std::fmt;

use jogasaki_common::constants::MAX_DECIMAL_PRECISION;

/// Kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FieldTypeKind {
    /// Type of a bare NULL literal.
    Unknown = 0,
    /// Boolean.
    Boolean = 1,
    /// 1-byte integer.
    Int1 = 2,
    /// 2-byte integer.
    Int2 = 3,
    /// 4-byte integer.
    Int4 = 4,
    /// 8-byte integer.
    Int8 = 5,
    /// Single precision float.
    Float4 = 6,
    /// Double precision float.
    Float8 = 7,
    /// Exact decimal.
    Decimal = 8,
    /// Character string.
    Character = 9,
    /// Octet string.
    Octet = 10,
    /// Calendar date.
    Date = 11,
    /// Time of day.
    TimeOfDay = 12,
    /// Point in time.
    TimePoint = 13,
    /// Binary large object reference.
    Blob = 14,
    /// Character large object reference.
    Clob = 15,
}

impl FieldTypeKind {
    /// Returns the kind for a stored tag value.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        use FieldTypeKind::*;
        Some(match value {
            0 => Unknown,
            1 => Boolean,
            2 => Int1,
            3 => Int2,
            4 => Int4,
            5 => Int8,
            6 => Float4,
            7 => Float8,
            8 => Decimal,
            9 => Character,
            10 => Octet,
            11 => Date,
            12 => TimeOfDay,
            13 => TimePoint,
            14 => Blob,
            15 => Clob,
            _ => return None,
        })
    }

    /// Returns the symbolic name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldTypeKind::Unknown => "unknown",
            FieldTypeKind::Boolean => "boolean",
            FieldTypeKind::Int1 => "int1",
            FieldTypeKind::Int2 => "int2",
            FieldTypeKind::Int4 => "int4",
            FieldTypeKind::Int8 => "int8",
            FieldTypeKind::Float4 => "float4",
            FieldTypeKind::Float8 => "float8",
            FieldTypeKind::Decimal => "decimal",
            FieldTypeKind::Character => "character",
            FieldTypeKind::Octet => "octet",
            FieldTypeKind::Date => "date",
            FieldTypeKind::TimeOfDay => "time_of_day",
            FieldTypeKind::TimePoint => "time_point",
            FieldTypeKind::Blob => "blob",
            FieldTypeKind::Clob => "clob",
        }
    }

    /// Returns true for int1..int8.
    #[inline]
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            FieldTypeKind::Int1 | FieldTypeKind::Int2 | FieldTypeKind::Int4 | FieldTypeKind::Int8
        )
    }

    /// Returns true for float4/float8.
    #[inline]
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, FieldTypeKind::Float4 | FieldTypeKind::Float8)
    }

    /// Returns true for integral, float and decimal kinds.
    #[inline]
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integral() || self.is_float() || matches!(self, FieldTypeKind::Decimal)
    }

    /// Returns true for kinds whose payload lives outside the fixed record part.
    #[inline]
    #[must_use]
    pub const fn is_varlen(self) -> bool {
        matches!(self, FieldTypeKind::Character | FieldTypeKind::Octet)
    }

    /// Returns true for BLOB/CLOB.
    #[inline]
    #[must_use]
    pub const fn is_lob(self) -> bool {
        matches!(self, FieldTypeKind::Blob | FieldTypeKind::Clob)
    }

    /// Size of the runtime representation inside a record buffer.
    #[must_use]
    pub const fn runtime_size(self) -> usize {
        match self {
            FieldTypeKind::Unknown | FieldTypeKind::Boolean | FieldTypeKind::Int1 => 1,
            FieldTypeKind::Int2 => 2,
            FieldTypeKind::Int4 | FieldTypeKind::Float4 => 4,
            FieldTypeKind::Int8 | FieldTypeKind::Float8 | FieldTypeKind::Date => 8,
            // coefficient (16) + exponent (4) + sign (1), padded
            FieldTypeKind::Decimal => 24,
            // arena handle: page, offset, length
            FieldTypeKind::Character | FieldTypeKind::Octet => 12,
            FieldTypeKind::TimeOfDay => 8,
            // seconds (8) + nanos (4), padded
            FieldTypeKind::TimePoint => 16,
            // object id (8) + provenance (1), padded
            FieldTypeKind::Blob | FieldTypeKind::Clob => 16,
        }
    }

    /// Alignment of the runtime representation inside a record buffer.
    #[must_use]
    pub const fn runtime_alignment(self) -> usize {
        match self {
            FieldTypeKind::Unknown | FieldTypeKind::Boolean | FieldTypeKind::Int1 => 1,
            FieldTypeKind::Int2 => 2,
            FieldTypeKind::Int4
            | FieldTypeKind::Float4
            | FieldTypeKind::Character
            | FieldTypeKind::Octet => 4,
            _ => 8,
        }
    }
}

impl fmt::Display for FieldTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options of a decimal field. `None` means unspecified (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DecimalFieldOption {
    /// Total number of digits.
    pub precision: Option<u8>,
    /// Digits after the decimal point.
    pub scale: Option<u8>,
}

/// Options of a character field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CharacterFieldOption {
    /// `VARCHAR` when true, `CHAR` otherwise.
    pub varying: bool,
    /// Maximum (varying) or exact (fixed) length in octets; `None` is unbounded.
    pub length: Option<u32>,
}

/// Options of an octet field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OctetFieldOption {
    /// `VARBINARY` when true, `BINARY` otherwise.
    pub varying: bool,
    /// Maximum (varying) or exact (fixed) length; `None` is unbounded.
    pub length: Option<u32>,
}

/// Options of a time-of-day field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeOfDayFieldOption {
    /// `WITH TIME ZONE`.
    pub with_offset: bool,
}

/// Options of a time-point field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimePointFieldOption {
    /// `WITH TIME ZONE`.
    pub with_offset: bool,
}

/// A field type: a kind plus the parameters it needs.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::meta::{FieldType, FieldTypeKind};
///
/// let t = FieldType::decimal(Some(5), Some(2));
/// assert_eq!(t.kind(), FieldTypeKind::Decimal);
/// assert_eq!(t.to_string(), "decimal(5,2)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Type of a bare NULL literal.
    Unknown,
    /// Boolean.
    Boolean,
    /// 1-byte integer.
    Int1,
    /// 2-byte integer.
    Int2,
    /// 4-byte integer.
    Int4,
    /// 8-byte integer.
    Int8,
    /// Single precision float.
    Float4,
    /// Double precision float.
    Float8,
    /// Exact decimal.
    Decimal(DecimalFieldOption),
    /// Character string.
    Character(CharacterFieldOption),
    /// Octet string.
    Octet(OctetFieldOption),
    /// Calendar date.
    Date,
    /// Time of day.
    TimeOfDay(TimeOfDayFieldOption),
    /// Point in time.
    TimePoint(TimePointFieldOption),
    /// BLOB reference.
    Blob,
    /// CLOB reference.
    Clob,
}

impl FieldType {
    /// `DECIMAL(p, s)`. Use `None` for `*`.
    #[must_use]
    pub const fn decimal(precision: Option<u8>, scale: Option<u8>) -> Self {
        FieldType::Decimal(DecimalFieldOption { precision, scale })
    }

    /// `VARCHAR(n)`; `None` is unbounded.
    #[must_use]
    pub const fn varchar(length: Option<u32>) -> Self {
        FieldType::Character(CharacterFieldOption {
            varying: true,
            length,
        })
    }

    /// `CHAR(n)`.
    #[must_use]
    pub const fn character(length: u32) -> Self {
        FieldType::Character(CharacterFieldOption {
            varying: false,
            length: Some(length),
        })
    }

    /// `VARBINARY(n)`; `None` is unbounded.
    #[must_use]
    pub const fn varbinary(length: Option<u32>) -> Self {
        FieldType::Octet(OctetFieldOption {
            varying: true,
            length,
        })
    }

    /// `BINARY(n)`.
    #[must_use]
    pub const fn binary(length: u32) -> Self {
        FieldType::Octet(OctetFieldOption {
            varying: false,
            length: Some(length),
        })
    }

    /// `TIME [WITH TIME ZONE]`.
    #[must_use]
    pub const fn time_of_day(with_offset: bool) -> Self {
        FieldType::TimeOfDay(TimeOfDayFieldOption { with_offset })
    }

    /// `TIMESTAMP [WITH TIME ZONE]`.
    #[must_use]
    pub const fn time_point(with_offset: bool) -> Self {
        FieldType::TimePoint(TimePointFieldOption { with_offset })
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> FieldTypeKind {
        match self {
            FieldType::Unknown => FieldTypeKind::Unknown,
            FieldType::Boolean => FieldTypeKind::Boolean,
            FieldType::Int1 => FieldTypeKind::Int1,
            FieldType::Int2 => FieldTypeKind::Int2,
            FieldType::Int4 => FieldTypeKind::Int4,
            FieldType::Int8 => FieldTypeKind::Int8,
            FieldType::Float4 => FieldTypeKind::Float4,
            FieldType::Float8 => FieldTypeKind::Float8,
            FieldType::Decimal(_) => FieldTypeKind::Decimal,
            FieldType::Character(_) => FieldTypeKind::Character,
            FieldType::Octet(_) => FieldTypeKind::Octet,
            FieldType::Date => FieldTypeKind::Date,
            FieldType::TimeOfDay(_) => FieldTypeKind::TimeOfDay,
            FieldType::TimePoint(_) => FieldTypeKind::TimePoint,
            FieldType::Blob => FieldTypeKind::Blob,
            FieldType::Clob => FieldTypeKind::Clob,
        }
    }

    /// Returns the fixed length of `CHAR(n)` / `BINARY(n)`.
    #[must_use]
    pub const fn fixed_length(&self) -> Option<u32> {
        match self {
            FieldType::Character(CharacterFieldOption {
                varying: false,
                length,
            })
            | FieldType::Octet(OctetFieldOption {
                varying: false,
                length,
            }) => match length {
                Some(n) => Some(*n),
                None => Some(1),
            },
            _ => None,
        }
    }

    /// Returns the length bound of a character/octet field, if any.
    #[must_use]
    pub const fn length_bound(&self) -> Option<u32> {
        match self {
            FieldType::Character(opt) => opt.length,
            FieldType::Octet(opt) => opt.length,
            _ => None,
        }
    }

    /// Returns true if the type carries a time zone offset.
    #[must_use]
    pub const fn with_offset(&self) -> bool {
        matches!(
            self,
            FieldType::TimeOfDay(TimeOfDayFieldOption { with_offset: true })
                | FieldType::TimePoint(TimePointFieldOption { with_offset: true })
        )
    }

    /// Validates type parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            FieldType::Decimal(DecimalFieldOption { precision, scale }) => match (precision, scale) {
                (None, Some(_)) => Err("decimal scale requires precision".to_string()),
                (Some(p), s) => {
                    if *p == 0 || *p > MAX_DECIMAL_PRECISION {
                        return Err(format!(
                            "decimal precision {p} out of range [1, {MAX_DECIMAL_PRECISION}]"
                        ));
                    }
                    if let Some(s) = s {
                        if s > p {
                            return Err(format!("decimal scale {s} exceeds precision {p}"));
                        }
                    }
                    Ok(())
                }
                (None, None) => Ok(()),
            },
            FieldType::Character(CharacterFieldOption {
                length: Some(0), ..
            })
            | FieldType::Octet(OctetFieldOption {
                length: Some(0), ..
            }) => Err("length must be positive".to_string()),
            _ => Ok(()),
        }
    }
}

impl From<FieldTypeKind> for FieldType {
    /// Default type of a kind; parameterized kinds get unbounded options.
    fn from(kind: FieldTypeKind) -> Self {
        match kind {
            FieldTypeKind::Unknown => FieldType::Unknown,
            FieldTypeKind::Boolean => FieldType::Boolean,
            FieldTypeKind::Int1 => FieldType::Int1,
            FieldTypeKind::Int2 => FieldType::Int2,
            FieldTypeKind::Int4 => FieldType::Int4,
            FieldTypeKind::Int8 => FieldType::Int8,
            FieldTypeKind::Float4 => FieldType::Float4,
            FieldTypeKind::Float8 => FieldType::Float8,
            FieldTypeKind::Decimal => FieldType::decimal(None, None),
            FieldTypeKind::Character => FieldType::varchar(None),
            FieldTypeKind::Octet => FieldType::varbinary(None),
            FieldTypeKind::Date => FieldType::Date,
            FieldTypeKind::TimeOfDay => FieldType::time_of_day(false),
            FieldTypeKind::TimePoint => FieldType::time_point(false),
            FieldTypeKind::Blob => FieldType::Blob,
            FieldTypeKind::Clob => FieldType::Clob,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: Option<u32>| v.map_or_else(|| "*".to_string(), |n| n.to_string());
        match self {
            FieldType::Decimal(DecimalFieldOption { precision, scale }) => write!(
                f,
                "decimal({},{})",
                opt(precision.map(u32::from)),
                opt(scale.map(u32::from))
            ),
            FieldType::Character(o) => {
                let name = if o.varying { "varchar" } else { "char" };
                write!(f, "{name}({})", opt(o.length))
            }
            FieldType::Octet(o) => {
                let name = if o.varying { "varbinary" } else { "binary" };
                write!(f, "{name}({})", opt(o.length))
            }
            FieldType::TimeOfDay(o) if o.with_offset => write!(f, "time_of_day_with_time_zone"),
            FieldType::TimePoint(o) if o.with_offset => write!(f, "time_point_with_time_zone"),
            other => f.write_str(other.kind().name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_tag() {
        for tag in 0..=15u8 {
            let kind = FieldTypeKind::from_u8(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
        assert!(FieldTypeKind::from_u8(16).is_none());
    }

    #[test]
    fn test_fixed_length() {
        assert_eq!(FieldType::character(5).fixed_length(), Some(5));
        assert_eq!(FieldType::varchar(Some(5)).fixed_length(), None);
        assert_eq!(FieldType::binary(3).fixed_length(), Some(3));
        assert_eq!(FieldType::varchar(Some(5)).length_bound(), Some(5));
    }

    #[test]
    fn test_validate_decimal() {
        assert!(FieldType::decimal(Some(38), Some(38)).validate().is_ok());
        assert!(FieldType::decimal(None, None).validate().is_ok());
        assert!(FieldType::decimal(None, Some(1)).validate().is_err());
        assert!(FieldType::decimal(Some(39), None).validate().is_err());
        assert!(FieldType::decimal(Some(3), Some(4)).validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldType::varchar(None).to_string(), "varchar(*)");
        assert_eq!(FieldType::character(5).to_string(), "char(5)");
        assert_eq!(FieldType::Int4.to_string(), "int4");
        assert_eq!(
            FieldType::time_point(true).to_string(),
            "time_point_with_time_zone"
        );
    }

    #[test]
    fn test_runtime_layout() {
        assert_eq!(FieldTypeKind::Int8.runtime_size(), 8);
        assert_eq!(FieldTypeKind::Decimal.runtime_alignment(), 8);
        assert_eq!(FieldTypeKind::Character.runtime_size(), 12);
    }
}
