//! Order-preserving key encoding.
//!
//! Every encoding compares with `memcmp` in value order; a descending field
//! has all its bytes complemented.
//!
//! | kind            | bytes                                                    |
//! |-----------------|----------------------------------------------------------|
//! | integers, dates | big-endian, sign bit flipped                             |
//! | floats          | sign-magnitude to unsigned; NaN canonical, -0 as +0      |
//! | decimal         | sign byte, base-100 exponent, digit pairs, `00`          |
//! | varchar/varbin  | `00` escaped as `00 FF`, terminated by `00 00`           |
//! | char/binary(n)  | exactly `n` padded bytes                                 |

use super::stream::{ReadableStream, WritableStream};
use super::{CodecError, CodecResult, CodingSpec};
use crate::data::{
    Date, RoundingMode, TimeOfDay, TimePoint, Triple, Value, MAX_DIGITS, NANOS_PER_DAY,
    NANOS_PER_SECOND,
};
use crate::meta::FieldType;

const SIGN_BIT_64: u64 = 1 << 63;

#[inline]
fn flip_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ SIGN_BIT_64).to_be_bytes()
}

#[inline]
fn unflip_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_BIT_64) as i64
}

fn f64_bits(v: f64) -> u64 {
    let v = if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    };
    let bits = v.to_bits();
    if bits & SIGN_BIT_64 != 0 {
        !bits
    } else {
        bits | SIGN_BIT_64
    }
}

fn f64_from_bits(bits: u64) -> f64 {
    f64::from_bits(if bits & SIGN_BIT_64 != 0 {
        bits & !SIGN_BIT_64
    } else {
        !bits
    })
}

fn f32_bits(v: f32) -> u32 {
    let v = if v.is_nan() {
        f32::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    };
    let bits = v.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

fn f32_from_bits(bits: u32) -> f32 {
    f32::from_bits(if bits & 0x8000_0000 != 0 {
        bits & 0x7fff_ffff
    } else {
        !bits
    })
}

fn corrupt(what: &str) -> CodecError {
    CodecError::DataCorruption(format!("malformed {what} key"))
}

fn encode_decimal(t: Triple, mask: u8, out: &mut WritableStream<'_>) {
    if t.is_zero() {
        out.write_u8(0x01 ^ mask);
        return;
    }
    let negative = t.is_negative();
    out.write_u8(if negative { 0x00 } else { 0x02 } ^ mask);
    let m = mask ^ if negative { 0xff } else { 0x00 };

    // value = 0.d1d2.. * 10^k with d1 != 0; make k even for base 100
    let r = t.reduce();
    let mut digits: Vec<u8> = r.coefficient().to_string().bytes().map(|b| b - b'0').collect();
    let mut k = digits.len() as i64 + i64::from(r.exponent());
    if k.rem_euclid(2) != 0 {
        digits.insert(0, 0);
        k += 1;
    }
    if digits.len() % 2 != 0 {
        digits.push(0);
    }
    let exp100 = (k / 2) as i16;
    out.write_masked(&((exp100 as u16) ^ 0x8000).to_be_bytes(), m);
    for pair in digits.chunks(2) {
        out.write_u8((pair[0] * 10 + pair[1] + 1) ^ m);
    }
    out.write_u8(m);
}

fn decode_decimal(mask: u8, input: &mut ReadableStream<'_>) -> CodecResult<Triple> {
    let negative = match input.read_u8_masked(mask)? {
        0x01 => return Ok(Triple::ZERO),
        0x00 => true,
        0x02 => false,
        _ => return Err(corrupt("decimal")),
    };
    let m = mask ^ if negative { 0xff } else { 0x00 };
    let exp100 = (u16::from_be_bytes(input.read_array_masked::<2>(m)?) ^ 0x8000) as i16;
    let mut digits = Vec::new();
    loop {
        match input.read_u8_masked(m)? {
            0 => break,
            b @ 1..=100 => {
                digits.push((b - 1) / 10);
                digits.push((b - 1) % 10);
            }
            _ => return Err(corrupt("decimal")),
        }
    }
    let mut exponent = 2 * i64::from(exp100) - digits.len() as i64;
    while digits.last() == Some(&0) {
        digits.pop();
        exponent += 1;
    }
    let first = digits.iter().position(|d| *d != 0).ok_or_else(|| corrupt("decimal"))?;
    let significant = &digits[first..];
    if significant.len() > MAX_DIGITS as usize {
        return Err(corrupt("decimal"));
    }
    let coefficient = significant
        .iter()
        .fold(0u128, |acc, d| acc * 10 + u128::from(*d));
    let exponent = i32::try_from(exponent).map_err(|_| corrupt("decimal"))?;
    Ok(Triple::new(if negative { -1 } else { 1 }, coefficient, exponent))
}

fn encode_escaped(bytes: &[u8], mask: u8, out: &mut WritableStream<'_>) {
    for &b in bytes {
        if b == 0 {
            out.write_u8(mask);
            out.write_u8(0xff ^ mask);
        } else {
            out.write_u8(b ^ mask);
        }
    }
    out.write_u8(mask);
    out.write_u8(mask);
}

fn decode_escaped(mask: u8, input: &mut ReadableStream<'_>) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    loop {
        match input.read_u8_masked(mask)? {
            0 => match input.read_u8_masked(mask)? {
                0 => return Ok(bytes),
                0xff => bytes.push(0),
                _ => return Err(corrupt("string")),
            },
            b => bytes.push(b),
        }
    }
}

fn write_fixed(bytes: &[u8], len: usize, pad: u8, mask: u8, out: &mut WritableStream<'_>) {
    let n = bytes.len().min(len);
    out.write_masked(&bytes[..n], mask);
    for _ in n..len {
        out.write_u8(pad ^ mask);
    }
}

fn read_fixed(len: usize, mask: u8, input: &mut ReadableStream<'_>) -> CodecResult<Vec<u8>> {
    Ok(input.read_bytes(len)?.iter().map(|b| b ^ mask).collect())
}

/// Encodes a non-null value of `ty` into a key stream.
pub fn encode_key_field(
    value: &Value,
    ty: &FieldType,
    spec: CodingSpec,
    out: &mut WritableStream<'_>,
) -> CodecResult<()> {
    let mask = spec.mask();
    match (ty, value) {
        (FieldType::Boolean, Value::Boolean(v)) => out.write_u8(u8::from(*v) ^ mask),
        (FieldType::Int1, Value::Int1(v)) => out.write_u8((*v as u8 ^ 0x80) ^ mask),
        (FieldType::Int2, Value::Int2(v)) => {
            out.write_masked(&((*v as u16) ^ 0x8000).to_be_bytes(), mask);
        }
        (FieldType::Int4, Value::Int4(v)) => {
            out.write_masked(&((*v as u32) ^ 0x8000_0000).to_be_bytes(), mask);
        }
        (FieldType::Int8, Value::Int8(v)) => out.write_masked(&flip_i64(*v), mask),
        (FieldType::Float4, Value::Float4(v)) => out.write_masked(&f32_bits(*v).to_be_bytes(), mask),
        (FieldType::Float8, Value::Float8(v)) => out.write_masked(&f64_bits(*v).to_be_bytes(), mask),
        (FieldType::Decimal(_), Value::Decimal(v)) => encode_decimal(*v, mask, out),
        (FieldType::Character(_), Value::Character(v)) => match ty.fixed_length() {
            Some(n) => write_fixed(v.as_bytes(), n as usize, b' ', mask, out),
            None => encode_escaped(v.as_bytes(), mask, out),
        },
        (FieldType::Octet(_), Value::Octet(v)) => match ty.fixed_length() {
            Some(n) => write_fixed(v, n as usize, 0, mask, out),
            None => encode_escaped(v, mask, out),
        },
        (FieldType::Date, Value::Date(v)) => out.write_masked(&flip_i64(v.days()), mask),
        (FieldType::TimeOfDay(_), Value::TimeOfDay(v)) => {
            out.write_masked(&flip_i64(v.nanos() as i64), mask);
        }
        (FieldType::TimePoint(_), Value::TimePoint(v)) => {
            out.write_masked(&flip_i64(v.seconds()), mask);
            out.write_masked(&v.subsecond_nanos().to_be_bytes(), mask);
        }
        (FieldType::Blob | FieldType::Clob | FieldType::Unknown, _) => {
            return Err(CodecError::UnsupportedKeyType(ty.kind()));
        }
        _ => {
            return Err(CodecError::TypeMismatch {
                expected: ty.kind(),
                actual: value.kind(),
            })
        }
    }
    Ok(())
}

/// Decodes a non-null value of `ty` from a key stream.
pub fn decode_key_field(
    ty: &FieldType,
    spec: CodingSpec,
    input: &mut ReadableStream<'_>,
) -> CodecResult<Value> {
    let mask = spec.mask();
    Ok(match ty {
        FieldType::Boolean => match input.read_u8_masked(mask)? {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            _ => return Err(corrupt("boolean")),
        },
        FieldType::Int1 => Value::Int1((input.read_u8_masked(mask)? ^ 0x80) as i8),
        FieldType::Int2 => {
            Value::Int2((u16::from_be_bytes(input.read_array_masked(mask)?) ^ 0x8000) as i16)
        }
        FieldType::Int4 => {
            Value::Int4((u32::from_be_bytes(input.read_array_masked(mask)?) ^ 0x8000_0000) as i32)
        }
        FieldType::Int8 => Value::Int8(unflip_i64(input.read_array_masked(mask)?)),
        FieldType::Float4 => {
            Value::Float4(f32_from_bits(u32::from_be_bytes(input.read_array_masked(mask)?)))
        }
        FieldType::Float8 => {
            Value::Float8(f64_from_bits(u64::from_be_bytes(input.read_array_masked(mask)?)))
        }
        FieldType::Decimal(opt) => {
            let t = decode_decimal(mask, input)?;
            match opt.scale {
                // keys drop trailing zeros; restore the column scale
                Some(s) => Value::Decimal(
                    t.rescale(-i32::from(s), RoundingMode::HalfEven)
                        .map_err(|_| corrupt("decimal"))?
                        .0,
                ),
                None => Value::Decimal(t),
            }
        }
        FieldType::Character(_) => {
            let bytes = match ty.fixed_length() {
                Some(n) => read_fixed(n as usize, mask, input)?,
                None => decode_escaped(mask, input)?,
            };
            Value::Character(String::from_utf8(bytes).map_err(|_| corrupt("character"))?)
        }
        FieldType::Octet(_) => Value::Octet(match ty.fixed_length() {
            Some(n) => read_fixed(n as usize, mask, input)?,
            None => decode_escaped(mask, input)?,
        }),
        FieldType::Date => Value::Date(Date::from_days(unflip_i64(input.read_array_masked(mask)?))),
        FieldType::TimeOfDay(_) => {
            let nanos = unflip_i64(input.read_array_masked(mask)?);
            let nanos = u64::try_from(nanos)
                .ok()
                .filter(|n| *n < NANOS_PER_DAY)
                .ok_or_else(|| corrupt("time"))?;
            Value::TimeOfDay(TimeOfDay::from_nanos(nanos))
        }
        FieldType::TimePoint(_) => {
            let seconds = unflip_i64(input.read_array_masked(mask)?);
            let nanos = u32::from_be_bytes(input.read_array_masked(mask)?);
            if u64::from(nanos) >= NANOS_PER_SECOND {
                return Err(corrupt("timestamp"));
            }
            Value::TimePoint(TimePoint::new(seconds, nanos))
        }
        FieldType::Blob | FieldType::Clob | FieldType::Unknown => {
            return Err(CodecError::UnsupportedKeyType(ty.kind()));
        }
    })
}
