//! Character and octet conversions.

use super::{CastContext, CastError};
use crate::meta::{CharacterFieldOption, OctetFieldOption};

/// Fits a string to `CHAR(n)` / `VARCHAR(n)`.
///
/// Truncation sets lost precision unless only spaces are cut. Fixed-length
/// targets are padded with spaces. Lengths count octets; truncation never
/// splits a character.
pub fn fit_character(mut s: String, opt: CharacterFieldOption, ctx: &mut CastContext) -> String {
    let limit = match (opt.varying, opt.length) {
        (true, None) => return s,
        (false, None) => 1,
        (_, Some(n)) => n as usize,
    };
    if s.len() > limit {
        let mut cut = limit;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        if s[cut..].bytes().any(|b| b != b' ') {
            ctx.lost_precision = true;
        }
        s.truncate(cut);
    }
    if !opt.varying {
        let pad = limit - s.len();
        s.extend(std::iter::repeat(' ').take(pad));
    }
    s
}

/// Fits octets to `BINARY(n)` / `VARBINARY(n)`; fixed targets are zero padded.
pub fn fit_octet(mut b: Vec<u8>, opt: OctetFieldOption, ctx: &mut CastContext) -> Vec<u8> {
    let limit = match (opt.varying, opt.length) {
        (true, None) => return b,
        (false, None) => 1,
        (_, Some(n)) => n as usize,
    };
    if b.len() > limit {
        ctx.lost_precision = true;
        b.truncate(limit);
    }
    if !opt.varying {
        b.resize(limit, 0);
    }
    b
}

/// Lower-case hex.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push(DIGITS[usize::from(b >> 4)] as char);
        s.push(DIGITS[usize::from(b & 0x0f)] as char);
    }
    s
}

/// Parses hex digits; an optional `x'..'`/`0x` wrapper is not accepted.
pub fn from_hex(text: &str) -> Result<Vec<u8>, CastError> {
    let err = || CastError::Format {
        target: "octet".to_string(),
        text: text.to_string(),
    };
    let s = text.trim();
    if s.len() % 2 != 0 {
        return Err(err());
    }
    let nibble = |c: u8| -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    };
    s.as_bytes()
        .chunks(2)
        .map(|pair| Some((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(err)
}

/// Parses a boolean literal.
pub fn parse_bool(text: &str) -> Result<bool, CastError> {
    let s = text.trim();
    if s.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(CastError::Format {
            target: "boolean".to_string(),
            text: text.to_string(),
        })
    }
}

/// Parses a float literal, accepting `NaN` and `[+-]Infinity`.
pub fn parse_float(text: &str) -> Result<f64, CastError> {
    text.trim().parse::<f64>().map_err(|_| CastError::Format {
        target: "float".to_string(),
        text: text.to_string(),
    })
}

/// Formats a float the way SQL clients expect (`NaN`, `Infinity`).
#[must_use]
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v < 0.0 { "-Infinity" } else { "Infinity" }.to_string()
    } else {
        v.to_string()
    }
}
