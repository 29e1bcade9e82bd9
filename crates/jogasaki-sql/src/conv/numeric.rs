//! Numeric casts.
//!
//! Every narrowing saturates instead of wrapping and reports the saturation
//! through [`CastContext::lost_precision`].

use super::{CastContext, CastError};
use crate::data::{RoundingMode, Triple, Value, MAX_DIGITS};
use crate::meta::FieldTypeKind;

/// Bounds of an integral kind.
#[must_use]
pub fn int_bounds(kind: FieldTypeKind) -> (i64, i64) {
    match kind {
        FieldTypeKind::Int1 => (i64::from(i8::MIN), i64::from(i8::MAX)),
        FieldTypeKind::Int2 => (i64::from(i16::MIN), i64::from(i16::MAX)),
        FieldTypeKind::Int4 => (i64::from(i32::MIN), i64::from(i32::MAX)),
        _ => (i64::MIN, i64::MAX),
    }
}

/// Wraps an in-range integer into the variant of `kind`.
fn int_value(kind: FieldTypeKind, v: i64) -> Value {
    match kind {
        FieldTypeKind::Int1 => Value::Int1(v as i8),
        FieldTypeKind::Int2 => Value::Int2(v as i16),
        FieldTypeKind::Int4 => Value::Int4(v as i32),
        _ => Value::Int8(v),
    }
}

/// Clamps `v` into `kind`, flagging lost precision when it does not fit.
pub fn int_to_int(v: i128, kind: FieldTypeKind, ctx: &mut CastContext) -> Value {
    let (min, max) = int_bounds(kind);
    let clamped = if v < i128::from(min) {
        ctx.lost_precision = true;
        min
    } else if v > i128::from(max) {
        ctx.lost_precision = true;
        max
    } else {
        v as i64
    };
    int_value(kind, clamped)
}

/// Converts an integer to a float; precision is lost outside the range the
/// mantissa represents exactly.
pub fn int_to_float(v: i64, kind: FieldTypeKind, ctx: &mut CastContext) -> Value {
    if kind == FieldTypeKind::Float4 {
        let f = v as f32;
        if f as i128 != i128::from(v) {
            ctx.lost_precision = true;
        }
        Value::Float4(f)
    } else {
        let f = v as f64;
        if f as i128 != i128::from(v) {
            ctx.lost_precision = true;
        }
        Value::Float8(f)
    }
}

/// Converts a float to an integer, truncating toward zero.
pub fn float_to_int(v: f64, kind: FieldTypeKind, ctx: &mut CastContext) -> Result<Value, CastError> {
    if v.is_nan() {
        return Err(CastError::Arithmetic(format!("NaN cannot be cast to {kind}")));
    }
    if v.is_infinite() {
        ctx.lost_precision = true;
        let (min, max) = int_bounds(kind);
        return Ok(int_value(kind, if v < 0.0 { min } else { max }));
    }
    // `as` saturates at the i128 bounds, which lie beyond every target
    Ok(int_to_int(v.trunc() as i128, kind, ctx))
}

/// Converts between float widths.
pub fn float_to_float(v: f64, kind: FieldTypeKind, ctx: &mut CastContext) -> Value {
    if kind == FieldTypeKind::Float4 {
        let f = v as f32;
        if f.is_infinite() && v.is_finite() {
            ctx.lost_precision = true;
        }
        Value::Float4(f)
    } else {
        Value::Float8(v)
    }
}

/// Converts a decimal to an integer, truncating toward zero.
pub fn decimal_to_int(t: &Triple, kind: FieldTypeKind, ctx: &mut CastContext) -> Value {
    if !t.is_zero() && t.exponent() < -(MAX_DIGITS as i32) && t.adjusted_exponent() < -1 {
        // digits lie entirely beyond the representable scale
        ctx.lost_precision = true;
        return int_value(kind, 0);
    }
    match t.to_i128_truncated() {
        Some(v) => int_to_int(v, kind, ctx),
        None => int_to_int(if t.is_negative() { i128::MIN } else { i128::MAX }, kind, ctx),
    }
}

/// Converts a decimal to a float; magnitudes beyond the float range become
/// infinite with lost precision.
pub fn decimal_to_float(t: &Triple, kind: FieldTypeKind, ctx: &mut CastContext) -> Value {
    if kind == FieldTypeKind::Float4 {
        let f = t.to_f32();
        if f.is_infinite() {
            ctx.lost_precision = true;
        }
        Value::Float4(f)
    } else {
        let f = t.to_f64();
        if f.is_infinite() {
            ctx.lost_precision = true;
        }
        Value::Float8(f)
    }
}

/// Fits a decimal into `DECIMAL(p, s)`; `None` keeps the value as is.
///
/// Digits beyond the scale are rounded half-to-even. A value whose integral
/// part needs more than `p - s` digits saturates.
pub fn decimal_to_decimal(
    t: Triple,
    bounds: Option<(u8, u8)>,
    ctx: &mut CastContext,
) -> Result<Triple, CastError> {
    let Some((precision, scale)) = bounds else {
        return Ok(t);
    };
    let max = Triple::max_of(precision, scale);
    let saturated = |ctx: &mut CastContext| {
        ctx.lost_precision = true;
        if t.is_negative() {
            max.negate()
        } else {
            max
        }
    };
    let integral_digits = u32::from(precision - scale);
    if t.integral_digits_exceed(integral_digits) {
        return Ok(saturated(ctx));
    }
    let (rounded, _) = t
        .rescale(-i32::from(scale), RoundingMode::HalfEven)
        .map_err(|e| CastError::Arithmetic(e.to_string()))?;
    if rounded.digits() > u32::from(precision) {
        return Ok(saturated(ctx));
    }
    Ok(rounded)
}

/// Converts a float to a decimal. NaN fails; infinities saturate.
pub fn float_to_decimal(
    v: f64,
    single: bool,
    bounds: Option<(u8, u8)>,
    ctx: &mut CastContext,
) -> Result<Triple, CastError> {
    if v.is_nan() {
        return Err(CastError::Arithmetic("NaN cannot be cast to decimal".to_string()));
    }
    if v.is_infinite() {
        ctx.lost_precision = true;
        let max = bounds.map_or(Triple::MAX, |(p, s)| Triple::max_of(p, s));
        return Ok(if v < 0.0 { max.negate() } else { max });
    }
    let t = if single {
        Triple::from_f32(v as f32)
    } else {
        Triple::from_f64(v)
    };
    let t = t.ok_or_else(|| CastError::Arithmetic(format!("{v} cannot be cast to decimal")))?;
    decimal_to_decimal(t, bounds, ctx)
}
