//! Built-in scalar functions and `LIKE`.

use super::evaluator::arithmetic;
use super::{BinaryOperator, BuiltinFunction, EvalError, EvalResult};
use crate::conv::CastContext;
use crate::data::{RoundingMode, Triple, Value};

fn arity(function: BuiltinFunction, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        return Err(EvalError::ValueEvaluation(format!(
            "{} expects {} argument(s), got {}",
            function.name(),
            if min == max { min.to_string() } else { format!("{min}..{max}") },
            args.len()
        )));
    }
    Ok(())
}

fn wrong_type(function: BuiltinFunction, v: &Value) -> EvalError {
    EvalError::ValueEvaluation(format!("{} is not defined for {}", function.name(), v.kind()))
}

fn overflow() -> EvalError {
    EvalError::Arithmetic("numeric overflow".to_string())
}

/// Calls a built-in function. Any NULL argument yields NULL.
pub(super) fn call(
    function: BuiltinFunction,
    args: &[Value],
    ctx: &mut CastContext,
) -> EvalResult<Value> {
    let (min, max) = match function {
        BuiltinFunction::Round => (1, 2),
        BuiltinFunction::Substring => (2, 3),
        BuiltinFunction::Mod => (2, 2),
        _ => (1, 1),
    };
    arity(function, args, min, max)?;
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let x = &args[0];
    match function {
        BuiltinFunction::Abs => abs(x),
        BuiltinFunction::Round => {
            let scale = match args.get(1) {
                Some(s) => s.as_i64().ok_or_else(|| wrong_type(function, s))?,
                None => 0,
            };
            round(x, scale)
        }
        BuiltinFunction::Ceil => integral_part(function, x, RoundingMode::Ceiling),
        BuiltinFunction::Floor => integral_part(function, x, RoundingMode::Floor),
        BuiltinFunction::Upper => match x {
            Value::Character(s) => Ok(Value::Character(s.to_uppercase())),
            other => Err(wrong_type(function, other)),
        },
        BuiltinFunction::Lower => match x {
            Value::Character(s) => Ok(Value::Character(s.to_lowercase())),
            other => Err(wrong_type(function, other)),
        },
        BuiltinFunction::CharacterLength => match x {
            Value::Character(s) => Ok(Value::Int8(s.chars().count() as i64)),
            other => Err(wrong_type(function, other)),
        },
        BuiltinFunction::OctetLength => match x {
            Value::Character(s) => Ok(Value::Int8(s.len() as i64)),
            Value::Octet(b) => Ok(Value::Int8(b.len() as i64)),
            other => Err(wrong_type(function, other)),
        },
        BuiltinFunction::Substring => {
            let start = args[1].as_i64().ok_or_else(|| wrong_type(function, &args[1]))?;
            let length = match args.get(2) {
                Some(l) => Some(l.as_i64().ok_or_else(|| wrong_type(function, l))?),
                None => None,
            };
            substring(x, start, length)
        }
        BuiltinFunction::Mod => arithmetic(BinaryOperator::Remainder, x, &args[1], ctx),
    }
}

fn abs(x: &Value) -> EvalResult<Value> {
    Ok(match x {
        Value::Int1(i) => Value::Int1(i.checked_abs().ok_or_else(overflow)?),
        Value::Int2(i) => Value::Int2(i.checked_abs().ok_or_else(overflow)?),
        Value::Int4(i) => Value::Int4(i.checked_abs().ok_or_else(overflow)?),
        Value::Int8(i) => Value::Int8(i.checked_abs().ok_or_else(overflow)?),
        Value::Float4(f) => Value::Float4(f.abs()),
        Value::Float8(f) => Value::Float8(f.abs()),
        Value::Decimal(t) => Value::Decimal(t.abs()),
        other => return Err(wrong_type(BuiltinFunction::Abs, other)),
    })
}

/// Rewraps `v` into the integral kind of `like`, failing on overflow.
fn same_int_kind(like: &Value, v: i128) -> EvalResult<Value> {
    Ok(match like {
        Value::Int1(_) => Value::Int1(i8::try_from(v).map_err(|_| overflow())?),
        Value::Int2(_) => Value::Int2(i16::try_from(v).map_err(|_| overflow())?),
        Value::Int4(_) => Value::Int4(i32::try_from(v).map_err(|_| overflow())?),
        _ => Value::Int8(i64::try_from(v).map_err(|_| overflow())?),
    })
}

/// `round(x, scale)`, half away from zero.
fn round(x: &Value, scale: i64) -> EvalResult<Value> {
    let scale = i32::try_from(scale).map_err(|_| overflow())?;
    match x {
        Value::Decimal(t) => Ok(Value::Decimal(t.round(scale, RoundingMode::HalfUp)?)),
        v @ (Value::Int1(_) | Value::Int2(_) | Value::Int4(_) | Value::Int8(_)) => {
            if scale >= 0 {
                return Ok(v.clone());
            }
            let i = v.as_i64().unwrap_or_default();
            let rounded = Triple::from_i64(i).round(scale, RoundingMode::HalfUp)?;
            same_int_kind(v, rounded.to_i128_truncated().ok_or_else(overflow)?)
        }
        Value::Float4(f) => Ok(Value::Float4(round_float(f64::from(*f), scale) as f32)),
        Value::Float8(f) => Ok(Value::Float8(round_float(*f, scale))),
        other => Err(wrong_type(BuiltinFunction::Round, other)),
    }
}

fn round_float(f: f64, scale: i32) -> f64 {
    if !f.is_finite() {
        return f;
    }
    let factor = 10f64.powi(scale);
    (f * factor).round() / factor
}

fn integral_part(function: BuiltinFunction, x: &Value, mode: RoundingMode) -> EvalResult<Value> {
    let up = mode == RoundingMode::Ceiling;
    Ok(match x {
        Value::Decimal(t) => Value::Decimal(t.round(0, mode)?),
        Value::Int1(_) | Value::Int2(_) | Value::Int4(_) | Value::Int8(_) => x.clone(),
        Value::Float4(f) => Value::Float4(if up { f.ceil() } else { f.floor() }),
        Value::Float8(f) => Value::Float8(if up { f.ceil() } else { f.floor() }),
        other => return Err(wrong_type(function, other)),
    })
}

/// 1-based `substring`; positions before the start shorten the result.
fn substring(x: &Value, start: i64, length: Option<i64>) -> EvalResult<Value> {
    if let Some(l) = length {
        if l < 0 {
            return Err(EvalError::ValueEvaluation(format!(
                "substring length must not be negative: {l}"
            )));
        }
    }
    let window = |n: usize| -> (usize, usize) {
        let n = n as i64;
        let end = length.map_or(i64::MAX, |l| start.saturating_add(l));
        let b = start.max(1);
        let e = end.min(n + 1);
        if e <= b {
            (0, 0)
        } else {
            ((b - 1) as usize, (e - 1) as usize)
        }
    };
    Ok(match x {
        Value::Character(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (b, e) = window(chars.len());
            Value::Character(chars[b..e].iter().collect())
        }
        Value::Octet(bytes) => {
            let (b, e) = window(bytes.len());
            Value::Octet(bytes[b..e].to_vec())
        }
        other => return Err(wrong_type(BuiltinFunction::Substring, other)),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Any,
    One,
    Literal(char),
}

fn tokenize(pattern: &str, escape: Option<char>) -> EvalResult<Vec<Token>> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            let escaped = chars.next().ok_or_else(|| {
                EvalError::ValueEvaluation("LIKE pattern ends with the escape character".to_string())
            })?;
            tokens.push(Token::Literal(escaped));
            continue;
        }
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            other => Token::Literal(other),
        });
    }
    Ok(tokens)
}

/// SQL `LIKE` matching with `%`, `_` and an optional escape character.
///
/// ```rust
/// use jogasaki_sql::expr::like_match;
///
/// assert!(like_match("abcde", "a%e", None).unwrap());
/// assert!(like_match("a%", "a!%", Some('!')).unwrap());
/// assert!(!like_match("ab", "a_c", None).unwrap());
/// ```
pub fn like_match(text: &str, pattern: &str, escape: Option<char>) -> EvalResult<bool> {
    let tokens = tokenize(pattern, escape)?;
    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some(Token::One) => {
                t += 1;
                p += 1;
                continue;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((bp, bt)) => {
                backtrack = Some((bp, bt + 1));
                p = bp + 1;
                t = bt + 1;
            }
            None => return Ok(false),
        }
    }
    Ok(tokens[p..].iter().all(|tok| *tok == Token::Any))
}

/// Evaluates `input [NOT] LIKE pattern [ESCAPE escape]` on evaluated operands.
pub(super) fn like(
    input: &Value,
    pattern: &Value,
    escape: Option<&Value>,
    negated: bool,
) -> EvalResult<Value> {
    if input.is_null() || pattern.is_null() || escape.is_some_and(Value::is_null) {
        return Ok(Value::Null);
    }
    let (Some(text), Some(pat)) = (input.as_str(), pattern.as_str()) else {
        return Err(EvalError::ValueEvaluation(format!(
            "LIKE is not defined for {} and {}",
            input.kind(),
            pattern.kind()
        )));
    };
    let escape = match escape {
        Some(e) => {
            let s = e.as_str().unwrap_or_default();
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => {
                    return Err(EvalError::ValueEvaluation(
                        "LIKE escape must be a single character".to_string(),
                    ))
                }
            }
        }
        None => None,
    };
    Ok(Value::Boolean(like_match(text, pat, escape)? != negated))
}
