use std::cmp::Ordering;

use super::functions;
use super::{BinaryOperator, CompareOperator, EvalError, EvalResult, Expression, UnaryOperator};
use crate::accessor::RecordRef;
use crate::conv::{cast_with_source, CastContext};
use crate::data::{Triple, Value};
use crate::meta::{FieldType, FieldTypeKind};

/// Evaluation state carried across expressions of one statement.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cast: CastContext,
    last_error: Option<EvalError>,
}

impl EvalContext {
    /// Creates a context using `cast` for conversions.
    #[must_use]
    pub fn new(cast: CastContext) -> Self {
        Self {
            cast,
            last_error: None,
        }
    }

    /// Cast state.
    #[inline]
    #[must_use]
    pub fn cast_context(&self) -> &CastContext {
        &self.cast
    }

    /// Cast state, mutably.
    #[inline]
    pub fn cast_context_mut(&mut self) -> &mut CastContext {
        &mut self.cast
    }

    /// Returns true if a cast since the last reset lost precision.
    #[inline]
    #[must_use]
    pub fn lost_precision(&self) -> bool {
        self.cast.lost_precision
    }

    /// The error raised by the most recent failed evaluation.
    #[must_use]
    pub fn last_error(&self) -> Option<&EvalError> {
        self.last_error.as_ref()
    }

    /// Clears lost precision and the last error.
    pub fn reset(&mut self) {
        self.cast.lost_precision = false;
        self.last_error = None;
    }
}

/// Variables visible to an expression.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    variables: Option<RecordRef<'a>>,
    host_variables: Option<RecordRef<'a>>,
}

impl<'a> Scope<'a> {
    /// An empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block's stream variables.
    #[must_use]
    pub fn with_variables(mut self, variables: RecordRef<'a>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Sets the bound host variables.
    #[must_use]
    pub fn with_host_variables(mut self, host_variables: RecordRef<'a>) -> Self {
        self.host_variables = Some(host_variables);
        self
    }

    fn variable(&self, index: usize) -> EvalResult<(Value, FieldType)> {
        match self.variables {
            Some(r) if index < r.meta().field_count() => {
                Ok((r.get_value(index), *r.meta().field_type(index)))
            }
            _ => Err(EvalError::ValueEvaluation(format!(
                "stream variable #{index} is not in scope"
            ))),
        }
    }

    fn host_variable(&self, index: usize) -> EvalResult<(Value, FieldType)> {
        match self.host_variables {
            Some(r) if index < r.meta().field_count() => {
                Ok((r.get_value(index), *r.meta().field_type(index)))
            }
            _ => Err(EvalError::UnresolvedPlaceholder(format!("host variable #{index}"))),
        }
    }
}

/// Evaluates `expr`. A failure is also recorded as the context's last error.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::data::Value;
/// use jogasaki_sql::expr::{evaluate, BinaryOperator, EvalContext, Expression, Scope};
///
/// let e = Expression::binary(
///     BinaryOperator::Multiply,
///     Expression::immediate(6i32),
///     Expression::immediate(7i32),
/// );
/// let mut ctx = EvalContext::default();
/// assert_eq!(evaluate(&e, &mut ctx, &Scope::new()).unwrap(), Value::Int4(42));
/// ```
pub fn evaluate(expr: &Expression, ctx: &mut EvalContext, scope: &Scope<'_>) -> EvalResult<Value> {
    evaluate_typed(expr, ctx, scope).map(|(v, _)| v)
}

/// Like [`evaluate`], also returning the static type of the result.
///
/// Variables keep the type declared by their scope, so a zoned host
/// variable reports `with_offset` even though its value is a plain UTC
/// time point.
pub fn evaluate_typed(
    expr: &Expression,
    ctx: &mut EvalContext,
    scope: &Scope<'_>,
) -> EvalResult<(Value, FieldType)> {
    let result = eval(expr, ctx, scope);
    if let Err(e) = &result {
        ctx.last_error = Some(e.clone());
    }
    result
}

/// Evaluates a node, returning its value and static type.
fn eval(expr: &Expression, ctx: &mut EvalContext, scope: &Scope<'_>) -> EvalResult<(Value, FieldType)> {
    let value = match expr {
        Expression::Immediate(v) => v.clone(),
        Expression::Variable(i) => return scope.variable(*i),
        Expression::HostVariable(i) => return scope.host_variable(*i),
        Expression::Placeholder(name) => {
            return Err(EvalError::UnresolvedPlaceholder(format!(":{name}")));
        }
        Expression::Unary { op, operand } => {
            let v = value_of(operand, ctx, scope)?;
            unary(*op, v)?
        }
        Expression::Binary { op, left, right } => match op {
            BinaryOperator::And | BinaryOperator::Or => logical(*op, left, right, ctx, scope)?,
            BinaryOperator::Concat => {
                let l = value_of(left, ctx, scope)?;
                let r = value_of(right, ctx, scope)?;
                concat(l, r)?
            }
            _ => {
                let l = value_of(left, ctx, scope)?;
                let r = value_of(right, ctx, scope)?;
                arithmetic(*op, &l, &r, &mut ctx.cast)?
            }
        },
        Expression::Compare { op, left, right } => {
            let l = value_of(left, ctx, scope)?;
            let r = value_of(right, ctx, scope)?;
            compare(*op, &l, &r, &mut ctx.cast)?
        }
        Expression::Cast { operand, target } => {
            let (v, source) = eval(operand, ctx, scope)?;
            let result = cast_with_source(&v, &source, target, &mut ctx.cast)?;
            return Ok((result, *target));
        }
        Expression::Conditional {
            alternatives,
            default,
        } => {
            for (condition, result) in alternatives {
                if truth(&value_of(condition, ctx, scope)?)? == Some(true) {
                    return eval(result, ctx, scope);
                }
            }
            match default {
                Some(d) => return eval(d, ctx, scope),
                None => Value::Null,
            }
        }
        Expression::Coalesce(args) => {
            for a in args {
                let (v, ty) = eval(a, ctx, scope)?;
                if !v.is_null() {
                    return Ok((v, ty));
                }
            }
            Value::Null
        }
        Expression::Like {
            input,
            pattern,
            escape,
            negated,
        } => {
            let i = value_of(input, ctx, scope)?;
            let p = value_of(pattern, ctx, scope)?;
            let e = match escape {
                Some(e) => Some(value_of(e, ctx, scope)?),
                None => None,
            };
            functions::like(&i, &p, e.as_ref(), *negated)?
        }
        Expression::FunctionCall {
            function,
            arguments,
        } => {
            let args = arguments
                .iter()
                .map(|a| value_of(a, ctx, scope))
                .collect::<EvalResult<Vec<_>>>()?;
            functions::call(*function, &args, &mut ctx.cast)?
        }
        Expression::AggregateCall { name, .. } => {
            return Err(EvalError::Unsupported(format!(
                "function '{name}' cannot be evaluated as a scalar expression"
            )));
        }
    };
    let ty = FieldType::from(value.kind());
    Ok((value, ty))
}

fn value_of(expr: &Expression, ctx: &mut EvalContext, scope: &Scope<'_>) -> EvalResult<Value> {
    eval(expr, ctx, scope).map(|(v, _)| v)
}

/// Three-valued truth of a boolean operand.
pub(super) fn truth(v: &Value) -> EvalResult<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(EvalError::ValueEvaluation(format!(
            "boolean expected, got {}",
            other.kind()
        ))),
    }
}

fn logical(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    ctx: &mut EvalContext,
    scope: &Scope<'_>,
) -> EvalResult<Value> {
    let dominant = op == BinaryOperator::Or;
    let l = truth(&value_of(left, ctx, scope)?)?;
    if l == Some(dominant) {
        return Ok(Value::Boolean(dominant));
    }
    let r = truth(&value_of(right, ctx, scope)?)?;
    Ok(match (l, r) {
        (_, Some(b)) if b == dominant => Value::Boolean(dominant),
        (Some(_), Some(_)) => Value::Boolean(!dominant),
        _ => Value::Null,
    })
}

fn unary(op: UnaryOperator, v: Value) -> EvalResult<Value> {
    Ok(match op {
        UnaryOperator::IsNull => Value::Boolean(v.is_null()),
        UnaryOperator::IsNotNull => Value::Boolean(!v.is_null()),
        UnaryOperator::IsTrue => Value::Boolean(truth(&v)? == Some(true)),
        UnaryOperator::IsNotTrue => Value::Boolean(truth(&v)? != Some(true)),
        UnaryOperator::IsFalse => Value::Boolean(truth(&v)? == Some(false)),
        UnaryOperator::IsNotFalse => Value::Boolean(truth(&v)? != Some(false)),
        UnaryOperator::Not => match truth(&v)? {
            Some(b) => Value::Boolean(!b),
            None => Value::Null,
        },
        UnaryOperator::Plus => {
            if !v.is_null() && !v.kind().is_numeric() {
                return Err(mismatch("unary +", &v, &Value::Null));
            }
            v
        }
        UnaryOperator::Minus => negate(v)?,
    })
}

fn overflow() -> EvalError {
    EvalError::Arithmetic("numeric overflow".to_string())
}

fn negate(v: Value) -> EvalResult<Value> {
    Ok(match v {
        Value::Null => Value::Null,
        Value::Int1(i) => Value::Int1(i.checked_neg().ok_or_else(overflow)?),
        Value::Int2(i) => Value::Int2(i.checked_neg().ok_or_else(overflow)?),
        Value::Int4(i) => Value::Int4(i.checked_neg().ok_or_else(overflow)?),
        Value::Int8(i) => Value::Int8(i.checked_neg().ok_or_else(overflow)?),
        Value::Float4(f) => Value::Float4(-f),
        Value::Float8(f) => Value::Float8(-f),
        Value::Decimal(t) => Value::Decimal(t.negate()),
        other => return Err(mismatch("unary -", &other, &Value::Null)),
    })
}

fn mismatch(what: &str, a: &Value, b: &Value) -> EvalError {
    EvalError::ValueEvaluation(format!("{what} is not defined for {} and {}", a.kind(), b.kind()))
}

/// Operands after binary numeric promotion.
enum Promoted {
    /// Integral; `wide` when either side was int8.
    Int(i64, i64, bool),
    Float(f64, f64),
    Decimal(Triple, Triple),
}

fn numeric_rank(v: &Value) -> Option<u8> {
    match v {
        Value::Int1(_) | Value::Int2(_) | Value::Int4(_) => Some(0),
        Value::Int8(_) => Some(1),
        Value::Decimal(_) => Some(2),
        Value::Float4(_) | Value::Float8(_) => Some(3),
        _ => None,
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Float4(f) => f64::from(*f),
        Value::Float8(f) => *f,
        Value::Decimal(t) => t.to_f64(),
        other => other.as_i64().map_or(f64::NAN, |i| i as f64),
    }
}

fn as_triple(v: &Value) -> Triple {
    match v {
        Value::Decimal(t) => *t,
        other => other.as_i64().map_or(Triple::ZERO, Triple::from_i64),
    }
}

/// Coerces character operands of a numeric operation to decimal.
fn coerce_text(v: &Value, ctx: &mut CastContext) -> EvalResult<Value> {
    match v {
        Value::Character(_) => cast_with_source(
            v,
            &FieldType::varchar(None),
            &FieldType::decimal(None, None),
            &mut CastContext {
                default_decimal: Default::default(),
                ..*ctx
            },
        )
        .map_err(|e| EvalError::ValueEvaluation(e.to_string())),
        other => Ok(other.clone()),
    }
}

fn promote(a: &Value, b: &Value) -> Option<Promoted> {
    let rank = numeric_rank(a)?.max(numeric_rank(b)?);
    Some(match rank {
        0 | 1 => Promoted::Int(a.as_i64()?, b.as_i64()?, rank == 1),
        2 => Promoted::Decimal(as_triple(a), as_triple(b)),
        _ => Promoted::Float(as_f64(a), as_f64(b)),
    })
}

fn promote_coerced(a: &Value, b: &Value, ctx: &mut CastContext) -> EvalResult<Option<Promoted>> {
    let text_with_number = |x: &Value, y: &Value| {
        x.kind() == FieldTypeKind::Character && numeric_rank(y).is_some()
    };
    if text_with_number(a, b) || text_with_number(b, a) {
        let a = coerce_text(a, ctx)?;
        let b = coerce_text(b, ctx)?;
        return Ok(promote(&a, &b));
    }
    Ok(promote(a, b))
}

/// Binary arithmetic with numeric promotion.
pub(super) fn arithmetic(
    op: BinaryOperator,
    a: &Value,
    b: &Value,
    ctx: &mut CastContext,
) -> EvalResult<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let division_by_zero = || EvalError::Arithmetic("division by zero".to_string());
    let promoted = promote_coerced(a, b, ctx)?.ok_or_else(|| mismatch("arithmetic", a, b))?;
    Ok(match promoted {
        Promoted::Int(x, y, wide) => {
            let r = match op {
                BinaryOperator::Add => x.checked_add(y),
                BinaryOperator::Subtract => x.checked_sub(y),
                BinaryOperator::Multiply => x.checked_mul(y),
                BinaryOperator::Divide if y == 0 => return Err(division_by_zero()),
                BinaryOperator::Divide => x.checked_div(y),
                BinaryOperator::Remainder if y == 0 => return Err(division_by_zero()),
                BinaryOperator::Remainder => x.checked_rem(y),
                _ => return Err(mismatch("operator", a, b)),
            }
            .ok_or_else(overflow)?;
            if wide {
                Value::Int8(r)
            } else {
                Value::Int4(i32::try_from(r).map_err(|_| overflow())?)
            }
        }
        Promoted::Float(x, y) => {
            let r = match op {
                BinaryOperator::Add => x + y,
                BinaryOperator::Subtract => x - y,
                BinaryOperator::Multiply => x * y,
                BinaryOperator::Divide if y == 0.0 => return Err(division_by_zero()),
                BinaryOperator::Divide => x / y,
                BinaryOperator::Remainder if y == 0.0 => return Err(division_by_zero()),
                BinaryOperator::Remainder => x % y,
                _ => return Err(mismatch("operator", a, b)),
            };
            // infinite operands may yield infinity, never NaN
            if r.is_nan() || (r.is_infinite() && x.is_finite() && y.is_finite()) {
                return Err(overflow());
            }
            Value::Float8(r)
        }
        Promoted::Decimal(x, y) => Value::Decimal(match op {
            BinaryOperator::Add => x.checked_add(y)?,
            BinaryOperator::Subtract => x.checked_sub(y)?,
            BinaryOperator::Multiply => x.checked_mul(y)?,
            BinaryOperator::Divide => x.checked_div(y)?,
            BinaryOperator::Remainder => x.checked_rem(y)?,
            _ => return Err(mismatch("operator", a, b)),
        }),
    })
}

fn concat(a: Value, b: Value) -> EvalResult<Value> {
    Ok(match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Character(mut x), Value::Character(y)) => {
            x.push_str(&y);
            Value::Character(x)
        }
        (Value::Octet(mut x), Value::Octet(y)) => {
            x.extend_from_slice(&y);
            Value::Octet(x)
        }
        (x, y) => return Err(mismatch("||", &x, &y)),
    })
}

/// Orders two non-null values, coercing text to the other operand's kind.
pub(super) fn order(a: &Value, b: &Value, ctx: &mut CastContext) -> EvalResult<Option<Ordering>> {
    if let Some(p) = promote_coerced(a, b, ctx)? {
        return Ok(match p {
            Promoted::Int(x, y, _) => Some(x.cmp(&y)),
            Promoted::Float(x, y) => x.partial_cmp(&y),
            Promoted::Decimal(x, y) => Some(x.compare(&y)),
        });
    }
    if a.kind() == b.kind() {
        return Ok(a.compare(b));
    }
    let convert = |text: &Value, other: &Value, ctx: &mut CastContext| {
        cast_with_source(
            text,
            &FieldType::varchar(None),
            &FieldType::from(other.kind()),
            ctx,
        )
        .map_err(|e| EvalError::ValueEvaluation(e.to_string()))
    };
    match (a.kind(), b.kind()) {
        (FieldTypeKind::Character, _) => Ok(convert(a, b, ctx)?.compare(b)),
        (_, FieldTypeKind::Character) => Ok(a.compare(&convert(b, a, ctx)?)),
        _ => Err(mismatch("comparison", a, b)),
    }
}

fn compare(op: CompareOperator, a: &Value, b: &Value, ctx: &mut CastContext) -> EvalResult<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }
    let ordering = order(a, b, ctx)?;
    let result = match ordering {
        // NaN is unordered: only `<>` holds
        None => op == CompareOperator::NotEqual,
        Some(o) => match op {
            CompareOperator::Equal => o == Ordering::Equal,
            CompareOperator::NotEqual => o != Ordering::Equal,
            CompareOperator::Less => o == Ordering::Less,
            CompareOperator::LessEqual => o != Ordering::Greater,
            CompareOperator::Greater => o == Ordering::Greater,
            CompareOperator::GreaterEqual => o != Ordering::Less,
        },
    };
    Ok(Value::Boolean(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::RecordBuffer;
    use crate::expr::BuiltinFunction;
    use crate::meta::RecordMeta;

    fn eval_plain(e: &Expression) -> EvalResult<Value> {
        evaluate(e, &mut EvalContext::default(), &Scope::new())
    }

    fn lit(v: impl Into<Value>) -> Expression {
        Expression::immediate(v)
    }

    fn bin(op: BinaryOperator, l: Expression, r: Expression) -> Expression {
        Expression::binary(op, l, r)
    }

    fn dec(s: &str) -> Value {
        Value::Decimal(s.parse().unwrap())
    }

    #[test]
    fn test_integer_promotion() {
        let e = bin(BinaryOperator::Add, lit(1i8), lit(2i16));
        assert_eq!(eval_plain(&e).unwrap(), Value::Int4(3));
        let e = bin(BinaryOperator::Add, lit(1i32), lit(2i64));
        assert_eq!(eval_plain(&e).unwrap(), Value::Int8(3));
        let e = bin(BinaryOperator::Multiply, lit(i32::MAX), lit(2i32));
        assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));
    }

    #[test]
    fn test_decimal_and_float_promotion() {
        let e = bin(BinaryOperator::Add, lit(1i32), Expression::Immediate(dec("0.5")));
        assert_eq!(eval_plain(&e).unwrap().to_string(), "1.5");
        let e = bin(BinaryOperator::Multiply, Expression::Immediate(dec("2")), lit(0.25f64));
        assert_eq!(eval_plain(&e).unwrap(), Value::Float8(0.5));
    }

    #[test]
    fn test_division_by_zero() {
        for op in [BinaryOperator::Divide, BinaryOperator::Remainder] {
            let e = bin(op, lit(1i32), lit(0i32));
            assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));
        }
        let e = bin(BinaryOperator::Divide, Expression::Immediate(dec("1")), Expression::Immediate(dec("0")));
        assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));
    }

    #[test]
    fn test_float_overflow_is_arithmetic_error() {
        let e = bin(BinaryOperator::Multiply, lit(f64::MAX), lit(2.0f64));
        assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));
        let e = bin(BinaryOperator::Add, lit(f64::MAX), lit(f64::MAX));
        assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));
        let e = bin(BinaryOperator::Multiply, lit(0.0f64), lit(f64::INFINITY));
        assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));

        let e = bin(BinaryOperator::Add, lit(f64::INFINITY), lit(1.0f64));
        assert_eq!(eval_plain(&e).unwrap(), Value::Float8(f64::INFINITY));
        let e = bin(BinaryOperator::Multiply, lit(1.5f64), lit(2i32));
        assert_eq!(eval_plain(&e).unwrap(), Value::Float8(3.0));
    }

    #[test]
    fn test_null_propagation() {
        for op in [
            BinaryOperator::Add,
            BinaryOperator::Subtract,
            BinaryOperator::Multiply,
            BinaryOperator::Divide,
            BinaryOperator::Concat,
        ] {
            let e = bin(op, lit(Value::Null), lit(1i32));
            assert_eq!(eval_plain(&e).unwrap(), Value::Null);
        }
        let e = Expression::call(BuiltinFunction::Upper, vec![lit(Value::Null)]);
        assert_eq!(eval_plain(&e).unwrap(), Value::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        let t = || lit(true);
        let f = || lit(false);
        let n = || lit(Value::Null);
        assert_eq!(eval_plain(&bin(BinaryOperator::And, n(), f())).unwrap(), Value::Boolean(false));
        assert_eq!(eval_plain(&bin(BinaryOperator::And, n(), t())).unwrap(), Value::Null);
        assert_eq!(eval_plain(&bin(BinaryOperator::Or, n(), t())).unwrap(), Value::Boolean(true));
        assert_eq!(eval_plain(&bin(BinaryOperator::Or, f(), n())).unwrap(), Value::Null);
        assert_eq!(
            eval_plain(&Expression::unary(UnaryOperator::Not, n())).unwrap(),
            Value::Null
        );
        assert_eq!(
            eval_plain(&Expression::unary(UnaryOperator::IsNotTrue, n())).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_comparison() {
        let cmp = |op, l, r| eval_plain(&Expression::compare(op, l, r)).unwrap();
        assert_eq!(cmp(CompareOperator::Less, lit(1i32), Expression::Immediate(dec("1.5"))), Value::Boolean(true));
        assert_eq!(cmp(CompareOperator::Equal, lit(""), lit("")), Value::Boolean(true));
        assert_eq!(cmp(CompareOperator::Equal, lit(""), lit(Value::Null)), Value::Null);
        assert_eq!(cmp(CompareOperator::Equal, lit(f64::NAN), lit(f64::NAN)), Value::Boolean(false));
        assert_eq!(cmp(CompareOperator::GreaterEqual, lit("10"), lit(9i32)), Value::Boolean(true));
        let e = Expression::compare(CompareOperator::Equal, lit(true), lit(1.0f64));
        assert!(matches!(eval_plain(&e), Err(EvalError::ValueEvaluation(_))));
    }

    #[test]
    fn test_variables_and_host_variables() {
        let meta = RecordMeta::all_nullable([FieldType::Int4, FieldType::time_point(true)]).shared();
        let rec = RecordBuffer::from_values(meta, &[Value::Int4(5), Value::Null]).unwrap();
        let host_meta = RecordMeta::all_nullable([FieldType::Int4]).shared();
        let host = RecordBuffer::from_values(host_meta, &[Value::Int4(10)]).unwrap();
        let scope = Scope::new()
            .with_variables(rec.as_record_ref())
            .with_host_variables(host.as_record_ref());
        let e = bin(BinaryOperator::Add, Expression::Variable(0), Expression::HostVariable(0));
        let mut ctx = EvalContext::default();
        assert_eq!(evaluate(&e, &mut ctx, &scope).unwrap(), Value::Int4(15));

        let missing = Expression::HostVariable(3);
        assert!(matches!(
            evaluate(&missing, &mut ctx, &scope),
            Err(EvalError::UnresolvedPlaceholder(_))
        ));
        assert!(ctx.last_error().is_some());
        let unbound = Expression::Placeholder("p".into());
        assert!(matches!(
            evaluate(&unbound, &mut ctx, &scope),
            Err(EvalError::UnresolvedPlaceholder(_))
        ));
    }

    #[test]
    fn test_cast_records_lost_precision() {
        let e = Expression::cast(lit(300i32), FieldType::Int1);
        let mut ctx = EvalContext::default();
        assert_eq!(evaluate(&e, &mut ctx, &Scope::new()).unwrap(), Value::Int1(127));
        assert!(ctx.lost_precision());
        ctx.reset();
        assert!(!ctx.lost_precision());
    }

    #[test]
    fn test_conditional_and_coalesce() {
        let e = Expression::Conditional {
            alternatives: vec![
                (lit(Value::Null), lit(1i32)),
                (lit(false), lit(2i32)),
                (lit(true), lit(3i32)),
            ],
            default: Some(Box::new(lit(4i32))),
        };
        assert_eq!(eval_plain(&e).unwrap(), Value::Int4(3));
        let e = Expression::Coalesce(vec![lit(Value::Null), lit("x"), lit("y")]);
        assert_eq!(eval_plain(&e).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_aggregate_is_unsupported() {
        let e = Expression::AggregateCall {
            name: "sum".into(),
            arguments: vec![Expression::Variable(0)],
        };
        assert!(matches!(eval_plain(&e), Err(EvalError::Unsupported(_))));
    }

    #[test]
    fn test_negation_overflow() {
        let e = Expression::unary(UnaryOperator::Minus, lit(i64::MIN));
        assert!(matches!(eval_plain(&e), Err(EvalError::Arithmetic(_))));
        let e = Expression::unary(UnaryOperator::Minus, Expression::Immediate(dec("1.5")));
        assert_eq!(eval_plain(&e).unwrap().to_string(), "-1.5");
    }
}
