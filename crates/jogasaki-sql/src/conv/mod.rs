//! Cast and assignment conversion between field types.
//!
//! Casts are pure functions over [`Value`]s. A cast that produces a value
//! which does not faithfully represent its source still succeeds but sets
//! [`CastContext::lost_precision`]; [`assign`] turns that flag into an error
//! for targets that forbid it.
//!
//! ```text
//!              ┌─────────┐  lossless   ┌──────────┐
//!   source ──▶ │  cast   │ ──────────▶ │  value   │
//!              └────┬────┘             └──────────┘
//!                   │ lossy: saturate / round / truncate
//!                   ▼
//!         ctx.lost_precision = true ──▶ assign: value_too_long / out of range
//! ```

pub mod numeric;
pub mod text;

use jogasaki_common::{ErrorCode, ErrorInfo};
use thiserror::Error;

use crate::data::{
    parse_time_point_with_offset, parse_time_with_offset, format_offset, BlobReference,
    ClobReference, Date, LobLocator, TimeOfDay, TimePoint, Triple, Value,
};
use crate::meta::{DecimalFieldOption, FieldType, FieldTypeKind};

/// Errors raised by casts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    /// NaN, overflow or another arithmetic failure.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    /// Malformed text for the target type.
    #[error("cannot parse '{text}' as {target}")]
    Format {
        /// Target type name.
        target: String,
        /// Offending text.
        text: String,
    },
    /// No conversion exists between the two types.
    #[error("unsupported conversion from {from} to {to}")]
    Unsupported {
        /// Source type.
        from: String,
        /// Target type.
        to: String,
    },
    /// Assignment would lose digits or characters.
    #[error("value too long for {0}")]
    ValueTooLong(String),
    /// Assignment target cannot represent the value.
    #[error("value out of range for {0}")]
    OutOfRange(String),
}

/// Result of a cast.
pub type CastResult<T> = std::result::Result<T, CastError>;

impl From<CastError> for ErrorInfo {
    fn from(err: CastError) -> Self {
        let code = match &err {
            CastError::Arithmetic(_) => ErrorCode::ArithmeticError,
            CastError::ValueTooLong(_) => ErrorCode::ValueTooLong,
            CastError::Format { .. } | CastError::Unsupported { .. } | CastError::OutOfRange(_) => {
                ErrorCode::ValueEvaluationFailure
            }
        };
        ErrorInfo::new(code, err.to_string())
    }
}

/// Per-evaluation cast state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CastContext {
    /// Set when a cast produced a value that does not round-trip.
    pub lost_precision: bool,
    /// Session zone offset in minutes, used for `WITH TIME ZONE` conversions.
    pub zone_offset: i32,
    /// Applied when a decimal target omits precision and scale.
    pub default_decimal: DecimalFieldOption,
}

impl CastContext {
    /// Creates a context with the given defaults.
    #[must_use]
    pub fn new(zone_offset: i32, default_decimal: DecimalFieldOption) -> Self {
        Self {
            lost_precision: false,
            zone_offset,
            default_decimal,
        }
    }

    /// Returns and clears the lost-precision flag.
    pub fn take_lost_precision(&mut self) -> bool {
        std::mem::take(&mut self.lost_precision)
    }

    fn decimal_bounds(&self, opt: DecimalFieldOption) -> CastResult<Option<(u8, u8)>> {
        let opt = if opt.precision.is_none() && opt.scale.is_none() {
            self.default_decimal
        } else {
            opt
        };
        match (opt.precision, opt.scale) {
            (Some(p), s) => Ok(Some((p, s.unwrap_or(0).min(p)))),
            (None, Some(_)) => Err(CastError::Unsupported {
                from: "decimal".to_string(),
                to: "decimal with scale but no precision".to_string(),
            }),
            (None, None) => Ok(None),
        }
    }
}

fn unsupported(from: &FieldType, to: &FieldType) -> CastError {
    CastError::Unsupported {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Casts `value` to `target`, taking the source type from the value.
pub fn cast(value: &Value, target: &FieldType, ctx: &mut CastContext) -> CastResult<Value> {
    cast_with_source(value, &FieldType::from(value.kind()), target, ctx)
}

/// Casts `value` of type `source` to `target`.
///
/// The source type only matters for zoned temporal values.
pub fn cast_with_source(
    value: &Value,
    source: &FieldType,
    target: &FieldType,
    ctx: &mut CastContext,
) -> CastResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if let Value::Character(s) = value {
        return from_text(s, source, target, ctx);
    }
    match target {
        FieldType::Unknown => Err(unsupported(source, target)),
        FieldType::Boolean => match value {
            Value::Boolean(b) => Ok(Value::Boolean(*b)),
            v => v
                .as_i64()
                .map(|i| Value::Boolean(i != 0))
                .ok_or_else(|| unsupported(source, target)),
        },
        FieldType::Int1 | FieldType::Int2 | FieldType::Int4 | FieldType::Int8 => {
            to_integral(value, source, target, ctx)
        }
        FieldType::Float4 | FieldType::Float8 => to_float(value, source, target, ctx),
        FieldType::Decimal(opt) => {
            let bounds = ctx.decimal_bounds(*opt)?;
            let t = match value {
                Value::Decimal(t) => numeric::decimal_to_decimal(*t, bounds, ctx)?,
                Value::Float4(f) => numeric::float_to_decimal(f64::from(*f), true, bounds, ctx)?,
                Value::Float8(f) => numeric::float_to_decimal(*f, false, bounds, ctx)?,
                Value::Boolean(b) => numeric::decimal_to_decimal(Triple::from_i64(i64::from(*b)), bounds, ctx)?,
                v => match v.as_i64() {
                    Some(i) => numeric::decimal_to_decimal(Triple::from_i64(i), bounds, ctx)?,
                    None => return Err(unsupported(source, target)),
                },
            };
            Ok(Value::Decimal(t))
        }
        FieldType::Character(opt) => {
            let s = format_value(value, source, ctx)?;
            Ok(Value::Character(text::fit_character(s, *opt, ctx)))
        }
        FieldType::Octet(opt) => match value {
            Value::Octet(b) => Ok(Value::Octet(text::fit_octet(b.clone(), *opt, ctx))),
            _ => Err(unsupported(source, target)),
        },
        FieldType::Date => match value {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::TimePoint(tp) => Ok(Value::Date(local_time_point(*tp, source, ctx).date())),
            _ => Err(unsupported(source, target)),
        },
        FieldType::TimeOfDay(opt) => {
            let local = match value {
                Value::TimeOfDay(t) => local_time(*t, source, ctx),
                Value::TimePoint(tp) => local_time_point(*tp, source, ctx).time_of_day(),
                _ => return Err(unsupported(source, target)),
            };
            Ok(Value::TimeOfDay(if opt.with_offset {
                local.shift_minutes(-ctx.zone_offset)
            } else {
                local
            }))
        }
        FieldType::TimePoint(opt) => {
            let local = match value {
                Value::TimePoint(tp) => local_time_point(*tp, source, ctx),
                Value::Date(d) => TimePoint::from_date_time(*d, TimeOfDay::default()),
                _ => return Err(unsupported(source, target)),
            };
            Ok(Value::TimePoint(if opt.with_offset {
                local.shift_minutes(-ctx.zone_offset)
            } else {
                local
            }))
        }
        FieldType::Blob => match value {
            Value::Blob(r) => Ok(Value::Blob(r.clone())),
            Value::Octet(b) => Ok(Value::Blob(BlobReference::provided(LobLocator::Data(
                b.clone().into(),
            )))),
            _ => Err(unsupported(source, target)),
        },
        FieldType::Clob => match value {
            Value::Clob(r) => Ok(Value::Clob(r.clone())),
            _ => Err(unsupported(source, target)),
        },
    }
}

/// Local wall-clock time of a time value of type `source`.
fn local_time(t: TimeOfDay, source: &FieldType, ctx: &CastContext) -> TimeOfDay {
    if source.with_offset() {
        t.shift_minutes(ctx.zone_offset)
    } else {
        t
    }
}

fn local_time_point(tp: TimePoint, source: &FieldType, ctx: &CastContext) -> TimePoint {
    if source.with_offset() {
        tp.shift_minutes(ctx.zone_offset)
    } else {
        tp
    }
}

fn to_integral(
    value: &Value,
    source: &FieldType,
    target: &FieldType,
    ctx: &mut CastContext,
) -> CastResult<Value> {
    let kind = target.kind();
    match value {
        Value::Boolean(b) => Ok(numeric::int_to_int(i128::from(*b), kind, ctx)),
        Value::Float4(f) => numeric::float_to_int(f64::from(*f), kind, ctx),
        Value::Float8(f) => numeric::float_to_int(*f, kind, ctx),
        Value::Decimal(t) => Ok(numeric::decimal_to_int(t, kind, ctx)),
        v => v
            .as_i64()
            .map(|i| numeric::int_to_int(i128::from(i), kind, ctx))
            .ok_or_else(|| unsupported(source, target)),
    }
}

fn to_float(
    value: &Value,
    source: &FieldType,
    target: &FieldType,
    ctx: &mut CastContext,
) -> CastResult<Value> {
    let kind = target.kind();
    match value {
        Value::Float4(f) => Ok(numeric::float_to_float(f64::from(*f), kind, ctx)),
        Value::Float8(f) => Ok(numeric::float_to_float(*f, kind, ctx)),
        Value::Decimal(t) => Ok(numeric::decimal_to_float(t, kind, ctx)),
        Value::Boolean(b) => Ok(numeric::int_to_float(i64::from(*b), kind, ctx)),
        v => v
            .as_i64()
            .map(|i| numeric::int_to_float(i, kind, ctx))
            .ok_or_else(|| unsupported(source, target)),
    }
}

/// Formats a non-null value as text.
fn format_value(value: &Value, source: &FieldType, ctx: &CastContext) -> CastResult<String> {
    Ok(match value {
        Value::Float4(f) if f.is_finite() => f.to_string(),
        Value::Float4(f) => text::format_float(f64::from(*f)),
        Value::Float8(f) => text::format_float(*f),
        Value::Octet(b) => text::to_hex(b),
        Value::TimeOfDay(t) if source.with_offset() => {
            format!("{}{}", local_time(*t, source, ctx), format_offset(ctx.zone_offset))
        }
        Value::TimePoint(tp) if source.with_offset() => format!(
            "{}{}",
            local_time_point(*tp, source, ctx),
            format_offset(ctx.zone_offset)
        ),
        Value::Blob(_) | Value::Clob(_) => {
            return Err(unsupported(source, &FieldType::varchar(None)));
        }
        other => other.to_string(),
    })
}

fn format_error(target: &FieldType, text: &str) -> CastError {
    CastError::Format {
        target: target.to_string(),
        text: text.to_string(),
    }
}

/// Casts character text to `target`.
fn from_text(
    s: &str,
    source: &FieldType,
    target: &FieldType,
    ctx: &mut CastContext,
) -> CastResult<Value> {
    match target {
        FieldType::Character(opt) => Ok(Value::Character(text::fit_character(s.to_string(), *opt, ctx))),
        FieldType::Boolean => text::parse_bool(s).map(Value::Boolean),
        FieldType::Int1 | FieldType::Int2 | FieldType::Int4 | FieldType::Int8 => {
            let t: Triple = s.trim().parse().map_err(|_| format_error(target, s))?;
            Ok(numeric::decimal_to_int(&t, target.kind(), ctx))
        }
        FieldType::Float4 | FieldType::Float8 => {
            let f = text::parse_float(s).map_err(|_| format_error(target, s))?;
            Ok(numeric::float_to_float(f, target.kind(), ctx))
        }
        FieldType::Decimal(opt) => {
            let bounds = ctx.decimal_bounds(*opt)?;
            let t: Triple = s.trim().parse().map_err(|e| match e {
                crate::data::DecimalError::Overflow => CastError::Arithmetic(e.to_string()),
                _ => format_error(target, s),
            })?;
            numeric::decimal_to_decimal(t, bounds, ctx).map(Value::Decimal)
        }
        FieldType::Octet(opt) => {
            let bytes = text::from_hex(s).map_err(|_| format_error(target, s))?;
            Ok(Value::Octet(text::fit_octet(bytes, *opt, ctx)))
        }
        FieldType::Date => s
            .parse::<Date>()
            .map(Value::Date)
            .map_err(|_| format_error(target, s)),
        FieldType::TimeOfDay(opt) => {
            let (local, offset) = parse_time_with_offset(s).map_err(|_| format_error(target, s))?;
            let offset = offset.unwrap_or(ctx.zone_offset);
            let utc = local.shift_minutes(-offset);
            Ok(Value::TimeOfDay(if opt.with_offset {
                utc
            } else {
                utc.shift_minutes(ctx.zone_offset)
            }))
        }
        FieldType::TimePoint(opt) => {
            let (local, offset) =
                parse_time_point_with_offset(s).map_err(|_| format_error(target, s))?;
            let offset = offset.unwrap_or(ctx.zone_offset);
            let utc = local.shift_minutes(-offset);
            Ok(Value::TimePoint(if opt.with_offset {
                utc
            } else {
                utc.shift_minutes(ctx.zone_offset)
            }))
        }
        FieldType::Clob => Ok(Value::Clob(ClobReference::provided(LobLocator::Data(
            s.as_bytes().to_vec().into(),
        )))),
        FieldType::Blob | FieldType::Unknown => Err(unsupported(source, target)),
    }
}

/// Assignment conversion used when storing into a column.
///
/// Performs [`cast_with_source`] and rejects lossy results: length or
/// precision bounded targets fail with [`CastError::ValueTooLong`], numeric
/// targets that saturated fail with [`CastError::OutOfRange`]. Rounding of
/// floats and of decimal digits beyond the scale is accepted.
pub fn assign(
    value: &Value,
    source: &FieldType,
    target: &FieldType,
    ctx: &mut CastContext,
) -> CastResult<Value> {
    let saved = ctx.take_lost_precision();
    let result = cast_with_source(value, source, target, ctx)?;
    let lost = ctx.take_lost_precision();
    ctx.lost_precision = saved;
    if !lost {
        return Ok(result);
    }
    match target.kind() {
        FieldTypeKind::Decimal | FieldTypeKind::Character | FieldTypeKind::Octet => {
            Err(CastError::ValueTooLong(target.to_string()))
        }
        FieldTypeKind::Float4 | FieldTypeKind::Float8 => {
            let overflowed = match result {
                Value::Float4(f) => f.is_infinite(),
                Value::Float8(f) => f.is_infinite(),
                _ => false,
            };
            if overflowed {
                Err(CastError::OutOfRange(target.to_string()))
            } else {
                Ok(result)
            }
        }
        _ => Err(CastError::OutOfRange(target.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CastContext {
        CastContext::default()
    }

    fn d(s: &str) -> Triple {
        s.parse().unwrap()
    }

    #[test]
    fn test_null_casts_to_null() {
        let mut c = ctx();
        assert_eq!(cast(&Value::Null, &FieldType::Int4, &mut c).unwrap(), Value::Null);
    }

    #[test]
    fn test_integer_widening_is_lossless() {
        let mut c = ctx();
        assert_eq!(cast(&Value::Int1(-3), &FieldType::Int8, &mut c).unwrap(), Value::Int8(-3));
        assert!(!c.lost_precision);
    }

    #[test]
    fn test_int_to_decimal_saturates() {
        let mut c = ctx();
        let r = cast(&Value::Int4(123_456), &FieldType::decimal(Some(5), Some(2)), &mut c).unwrap();
        assert_eq!(r, Value::Decimal(d("999.99")));
        assert!(c.lost_precision);
    }

    #[test]
    fn test_decimal_scale_without_precision_is_unsupported() {
        let mut c = ctx();
        let r = cast(&Value::Int4(1), &FieldType::decimal(None, Some(2)), &mut c);
        assert!(matches!(r, Err(CastError::Unsupported { .. })));
    }

    #[test]
    fn test_default_decimal_applies_to_unbounded_target() {
        let mut c = CastContext::new(
            0,
            DecimalFieldOption {
                precision: Some(4),
                scale: Some(1),
            },
        );
        let r = cast(&Value::Decimal(d("12.36")), &FieldType::decimal(None, None), &mut c).unwrap();
        assert_eq!(r.to_string(), "12.4");
    }

    #[test]
    fn test_text_round_trip() {
        let mut c = ctx();
        let v = cast(&Value::from(" 42 "), &FieldType::Int4, &mut c).unwrap();
        assert_eq!(v, Value::Int4(42));
        let s = cast(&Value::Decimal(d("-1.50")), &FieldType::varchar(None), &mut c).unwrap();
        assert_eq!(s, Value::from("-1.50"));
        assert!(cast(&Value::from("4x"), &FieldType::Int4, &mut c).is_err());
        let b = cast(&Value::from("true"), &FieldType::Boolean, &mut c).unwrap();
        assert_eq!(b, Value::Boolean(true));
        let o = cast(&Value::from("0aff"), &FieldType::varbinary(None), &mut c).unwrap();
        assert_eq!(o, Value::Octet(vec![0x0a, 0xff]));
        assert!(!c.lost_precision);
    }

    #[test]
    fn test_text_to_integer_saturates() {
        let mut c = ctx();
        assert_eq!(cast(&Value::from("300"), &FieldType::Int1, &mut c).unwrap(), Value::Int1(127));
        assert!(c.lost_precision);
    }

    #[test]
    fn test_temporal_casts() {
        let mut c = ctx();
        let tp = cast(&Value::from("2020-01-02 03:04:05"), &FieldType::time_point(false), &mut c)
            .unwrap();
        let date = cast(&tp, &FieldType::Date, &mut c).unwrap();
        assert_eq!(date.to_string(), "2020-01-02");
        let back = cast(&date, &FieldType::time_point(false), &mut c).unwrap();
        assert_eq!(back.to_string(), "2020-01-02 00:00:00");
        let tod = cast(&tp, &FieldType::time_of_day(false), &mut c).unwrap();
        assert_eq!(tod.to_string(), "03:04:05");
    }

    #[test]
    fn test_zoned_time_point() {
        let mut c = CastContext::new(540, DecimalFieldOption::default());
        let tz = FieldType::time_point(true);
        let v = cast(&Value::from("2020-01-01 09:00:00"), &tz, &mut c).unwrap();
        assert_eq!(v.to_string(), "2020-01-01 00:00:00");
        let text = cast_with_source(&v, &tz, &FieldType::varchar(None), &mut c).unwrap();
        assert_eq!(text, Value::from("2020-01-01 09:00:00+09:00"));
        let explicit = cast(&Value::from("2020-01-01 09:00:00Z"), &tz, &mut c).unwrap();
        assert_eq!(explicit.to_string(), "2020-01-01 09:00:00");
    }

    #[test]
    fn test_bool_int_conversions() {
        let mut c = ctx();
        assert_eq!(cast(&Value::Boolean(true), &FieldType::Int4, &mut c).unwrap(), Value::Int4(1));
        assert_eq!(cast(&Value::Int8(0), &FieldType::Boolean, &mut c).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_unsupported() {
        let mut c = ctx();
        let r = cast(&Value::Date(Date::from_days(1)), &FieldType::Int4, &mut c);
        assert!(matches!(r, Err(CastError::Unsupported { .. })));
    }

    #[test]
    fn test_assign_rejects_lossy_values() {
        let mut c = ctx();
        let r = assign(&Value::from("AAAAAA"), &FieldType::varchar(None), &FieldType::varchar(Some(5)), &mut c);
        assert!(matches!(r, Err(CastError::ValueTooLong(_))));
        let r = assign(&Value::Int8(1 << 40), &FieldType::Int8, &FieldType::Int4, &mut c);
        assert!(matches!(r, Err(CastError::OutOfRange(_))));
        let r = assign(&Value::Decimal(d("1.005")), &FieldType::decimal(None, None), &FieldType::decimal(Some(5), Some(2)), &mut c)
            .unwrap();
        assert_eq!(r.to_string(), "1.00");
        let r = assign(&Value::Int8((1 << 53) + 1), &FieldType::Int8, &FieldType::Float8, &mut c);
        assert!(r.is_ok());
        let r = assign(&Value::Float8(1e300), &FieldType::Float8, &FieldType::Float4, &mut c);
        assert!(matches!(r, Err(CastError::OutOfRange(_))));
        assert!(!c.lost_precision);
    }

    #[test]
    fn test_error_codes() {
        let info: ErrorInfo = CastError::ValueTooLong("x".into()).into();
        assert_eq!(info.code(), ErrorCode::ValueTooLong);
        let info: ErrorInfo = CastError::Arithmetic("nan".into()).into();
        assert_eq!(info.code(), ErrorCode::ArithmeticError);
    }
}
