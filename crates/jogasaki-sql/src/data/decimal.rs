//! Exact decimal values.
//!
//! A [`Triple`] is `sign × coefficient × 10^exponent` with a 128-bit unsigned
//! coefficient. Arithmetic keeps at most 38 significant digits, rounding
//! half-to-even when a result needs more.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Maximum number of significant digits kept by arithmetic.
pub const MAX_DIGITS: u32 = 38;

/// Smallest exponent a triple may carry.
pub const MIN_EXPONENT: i32 = -6176;

/// Largest exponent a triple may carry.
pub const MAX_EXPONENT: i32 = 6111;

/// Errors raised by decimal operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    /// Result does not fit into the representation.
    #[error("decimal overflow")]
    Overflow,
    /// Division by zero.
    #[error("decimal division by zero")]
    DivisionByZero,
    /// Malformed text.
    #[error("invalid decimal literal '{0}'")]
    Format(String),
}

/// Rounding modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    /// Round half to even (banker's rounding).
    HalfEven,
    /// Round half away from zero.
    HalfUp,
    /// Truncate toward zero.
    Down,
    /// Toward negative infinity.
    Floor,
    /// Toward positive infinity.
    Ceiling,
}

/// Returns `10^n`, or `None` if it does not fit into `u128`.
#[must_use]
pub fn pow10(n: u32) -> Option<u128> {
    10u128.checked_pow(n)
}

/// Number of decimal digits of `v` (0 has one digit).
#[must_use]
pub fn digit_count(v: u128) -> u32 {
    if v == 0 {
        1
    } else {
        v.ilog10() + 1
    }
}

/// 256-bit unsigned helper used for products and long division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Wide {
    hi: u128,
    lo: u128,
}

impl Wide {
    fn from_u128(v: u128) -> Self {
        Self { hi: 0, lo: v }
    }

    fn mul(a: u128, b: u128) -> Self {
        let mask = u64::MAX as u128;
        let (a1, a0) = (a >> 64, a & mask);
        let (b1, b0) = (b >> 64, b & mask);
        let p00 = a0 * b0;
        let p01 = a0 * b1;
        let p10 = a1 * b0;
        let p11 = a1 * b1;
        let mid = (p00 >> 64) + (p01 & mask) + (p10 & mask);
        let lo = (p00 & mask) | (mid << 64);
        let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
        Self { hi, lo }
    }

    fn mul_small(self, m: u64) -> Self {
        let lo = Self::mul(self.lo, m as u128);
        Self {
            hi: self.hi.wrapping_mul(m as u128).wrapping_add(lo.hi),
            lo: lo.lo,
        }
    }

    fn sub(self, other: Self) -> Self {
        let (lo, borrow) = self.lo.overflowing_sub(other.lo);
        Self {
            hi: self.hi - other.hi - u128::from(borrow),
            lo,
        }
    }

    /// Divides by a small divisor, returning quotient and remainder.
    fn div_rem_small(self, d: u64) -> (Self, u64) {
        let d = d as u128;
        let mask = u64::MAX as u128;
        let limbs = [self.hi >> 64, self.hi & mask, self.lo >> 64, self.lo & mask];
        let mut q = [0u128; 4];
        let mut rem = 0u128;
        for (i, limb) in limbs.iter().enumerate() {
            let cur = (rem << 64) | limb;
            q[i] = cur / d;
            rem = cur % d;
        }
        (
            Self {
                hi: (q[0] << 64) | q[1],
                lo: (q[2] << 64) | q[3],
            },
            rem as u64,
        )
    }

    fn to_u128(self) -> Option<u128> {
        (self.hi == 0).then_some(self.lo)
    }
}

/// Decides whether a truncated magnitude must be incremented.
///
/// `last_digit` is the least significant kept digit, `first_dropped` the
/// most significant dropped digit and `sticky` whether any further dropped
/// digit is nonzero.
fn round_increment(
    mode: RoundingMode,
    negative: bool,
    last_digit: u128,
    first_dropped: u128,
    sticky: bool,
) -> bool {
    let inexact = first_dropped != 0 || sticky;
    match mode {
        RoundingMode::Down => false,
        RoundingMode::HalfUp => first_dropped >= 5,
        RoundingMode::HalfEven => {
            first_dropped > 5 || (first_dropped == 5 && (sticky || last_digit % 2 == 1))
        }
        RoundingMode::Floor => negative && inexact,
        RoundingMode::Ceiling => !negative && inexact,
    }
}

/// An exact decimal number.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::data::Triple;
///
/// let a: Triple = "123.456".parse().unwrap();
/// assert_eq!(a.coefficient(), 123456);
/// assert_eq!(a.exponent(), -3);
/// assert_eq!(a.to_string(), "123.456");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triple {
    /// -1, 0 or 1; 0 exactly when the coefficient is zero.
    sign: i8,
    coefficient: u128,
    exponent: i32,
}

impl Triple {
    /// Zero.
    pub const ZERO: Self = Self {
        sign: 0,
        coefficient: 0,
        exponent: 0,
    };

    /// Largest coefficient with [`MAX_DIGITS`] digits.
    pub const MAX_COEFFICIENT: u128 = 99_999_999_999_999_999_999_999_999_999_999_999_999;

    /// Largest representable value.
    pub const MAX: Self = Self {
        sign: 1,
        coefficient: Self::MAX_COEFFICIENT,
        exponent: MAX_EXPONENT,
    };

    /// Smallest representable value.
    pub const MIN: Self = Self {
        sign: -1,
        coefficient: Self::MAX_COEFFICIENT,
        exponent: MAX_EXPONENT,
    };

    /// Creates a triple. The sign of a zero coefficient is forced to 0; for
    /// other values only the sign of `sign` matters.
    #[must_use]
    pub const fn new(sign: i8, coefficient: u128, exponent: i32) -> Self {
        let sign = if coefficient == 0 {
            0
        } else if sign < 0 {
            -1
        } else {
            1
        };
        Self {
            sign,
            coefficient,
            exponent,
        }
    }

    /// Creates an integral triple.
    #[must_use]
    pub const fn from_i128(v: i128) -> Self {
        let sign = if v < 0 { -1 } else { 1 };
        Self::new(sign, v.unsigned_abs(), 0)
    }

    /// Creates an integral triple.
    #[must_use]
    pub const fn from_i64(v: i64) -> Self {
        Self::from_i128(v as i128)
    }

    /// Sign: -1, 0 or 1.
    #[inline]
    #[must_use]
    pub const fn sign(&self) -> i8 {
        self.sign
    }

    /// Unsigned coefficient.
    #[inline]
    #[must_use]
    pub const fn coefficient(&self) -> u128 {
        self.coefficient
    }

    /// Exponent.
    #[inline]
    #[must_use]
    pub const fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Returns true for zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.sign == 0
    }

    /// Returns true for values below zero.
    #[inline]
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.sign < 0
    }

    /// Number of digits of the coefficient.
    #[must_use]
    pub fn digits(&self) -> u32 {
        digit_count(self.coefficient)
    }

    /// Exponent of the most significant digit (`digits + exponent - 1`).
    #[must_use]
    pub fn adjusted_exponent(&self) -> i64 {
        i64::from(self.digits()) + i64::from(self.exponent) - 1
    }

    /// Negation.
    #[must_use]
    pub const fn negate(self) -> Self {
        Self {
            sign: -self.sign,
            ..self
        }
    }

    /// Absolute value.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self {
            sign: self.sign.abs(),
            ..self
        }
    }

    /// Removes trailing zeros from the coefficient.
    #[must_use]
    pub fn reduce(self) -> Self {
        if self.coefficient == 0 {
            return Self::ZERO;
        }
        let mut c = self.coefficient;
        let mut e = self.exponent;
        while c % 10 == 0 && e < MAX_EXPONENT {
            c /= 10;
            e += 1;
        }
        Self::new(self.sign, c, e)
    }

    /// Largest value of `DECIMAL(precision, scale)`.
    #[must_use]
    pub fn max_of(precision: u8, scale: u8) -> Self {
        let coefficient = pow10(u32::from(precision)).map_or(Self::MAX_COEFFICIENT, |p| p - 1);
        Self::new(1, coefficient, -i32::from(scale))
    }

    /// Returns true if the integral part has more than `digits` digits.
    #[must_use]
    pub fn integral_digits_exceed(&self, digits: u32) -> bool {
        if self.is_zero() {
            return false;
        }
        self.adjusted_exponent() >= i64::from(digits)
    }

    /// Changes the exponent, rounding with `mode` when digits are dropped.
    ///
    /// Returns the result and whether it is inexact.
    pub fn rescale(self, exponent: i32, mode: RoundingMode) -> Result<(Self, bool), DecimalError> {
        if self.is_zero() {
            return Ok((Self::new(0, 0, exponent), false));
        }
        match exponent.cmp(&self.exponent) {
            Ordering::Equal => Ok((self, false)),
            Ordering::Less => {
                let shift = (self.exponent - exponent) as u32;
                let factor = pow10(shift).ok_or(DecimalError::Overflow)?;
                let c = self
                    .coefficient
                    .checked_mul(factor)
                    .ok_or(DecimalError::Overflow)?;
                Ok((Self::new(self.sign, c, exponent), false))
            }
            Ordering::Greater => {
                let shift = (exponent as i64 - self.exponent as i64) as u32;
                let (kept, first_dropped, sticky) = if shift > 39 {
                    (0, 0, true)
                } else {
                    let divisor = pow10(shift - 1).ok_or(DecimalError::Overflow)?;
                    let head = self.coefficient / divisor;
                    let tail = self.coefficient % divisor;
                    (head / 10, head % 10, tail != 0)
                };
                let mut c = kept;
                if round_increment(mode, self.is_negative(), kept % 10, first_dropped, sticky) {
                    c += 1;
                }
                let inexact = first_dropped != 0 || sticky;
                Ok((Self::new(self.sign, c, exponent), inexact))
            }
        }
    }

    /// Rounds to `scale` digits after the decimal point.
    pub fn round(self, scale: i32, mode: RoundingMode) -> Result<Self, DecimalError> {
        if self.exponent >= -scale {
            return Ok(self);
        }
        self.rescale(-scale, mode).map(|(t, _)| t)
    }

    /// Rounds the coefficient to at most [`MAX_DIGITS`] digits.
    fn fit(self) -> Result<Self, DecimalError> {
        let digits = self.digits();
        let t = if digits > MAX_DIGITS {
            let excess = (digits - MAX_DIGITS) as i32;
            let (t, _) = self.rescale(self.exponent + excess, RoundingMode::HalfEven)?;
            // rounding up may add a digit
            if t.digits() > MAX_DIGITS {
                t.rescale(t.exponent + 1, RoundingMode::HalfEven)?.0
            } else {
                t
            }
        } else {
            self
        };
        if t.exponent > MAX_EXPONENT {
            return Err(DecimalError::Overflow);
        }
        if t.exponent < MIN_EXPONENT {
            let (r, _) = t.rescale(MIN_EXPONENT, RoundingMode::HalfEven)?;
            return Ok(r);
        }
        Ok(t)
    }

    fn from_wide(sign: i8, c: Wide, exponent: i32) -> Result<Self, DecimalError> {
        let mut c = c;
        let mut e = exponent;
        let mut first_dropped = 0u64;
        let mut sticky = false;
        while c.hi != 0 || c.lo > Self::MAX_COEFFICIENT {
            let (q, r) = c.div_rem_small(10);
            sticky |= first_dropped != 0;
            first_dropped = r;
            c = q;
            e += 1;
        }
        let mut lo = c.to_u128().ok_or(DecimalError::Overflow)?;
        if round_increment(
            RoundingMode::HalfEven,
            sign < 0,
            lo % 10,
            u128::from(first_dropped),
            sticky,
        ) {
            lo += 1;
        }
        Self::new(sign, lo, e).fit()
    }

    /// Brings both magnitudes to a common exponent. When exact alignment
    /// would overflow, the operand with the smaller exponent is rounded.
    fn aligned(a: &Self, b: &Self) -> Result<(u128, u128, i32), DecimalError> {
        let (high, low) = if a.exponent >= b.exponent { (a, b) } else { (b, a) };
        let headroom = MAX_DIGITS.saturating_sub(high.digits()) as i32;
        let e = low.exponent.max(high.exponent - headroom);
        let (rh, _) = high.abs().rescale(e, RoundingMode::Down)?;
        let (rl, _) = low.abs().rescale(e, RoundingMode::HalfEven)?;
        if a.exponent >= b.exponent {
            Ok((rh.coefficient, rl.coefficient, e))
        } else {
            Ok((rl.coefficient, rh.coefficient, e))
        }
    }

    /// Sum.
    pub fn checked_add(self, other: Self) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Ok(if self.is_zero() {
                Self::new(0, 0, self.exponent.min(other.exponent))
            } else {
                self
            });
        }
        if self.is_zero() {
            return Ok(other);
        }
        let (a, b, e) = Self::aligned(&self, &other)?;
        if self.sign == other.sign {
            let sum = Wide::from_u128(a).add_u128(b);
            return Self::from_wide(self.sign, sum, e);
        }
        match a.cmp(&b) {
            Ordering::Equal => Ok(Self::new(0, 0, e)),
            Ordering::Greater => Self::new(self.sign, a - b, e).fit(),
            Ordering::Less => Self::new(other.sign, b - a, e).fit(),
        }
    }

    /// Difference.
    pub fn checked_sub(self, other: Self) -> Result<Self, DecimalError> {
        self.checked_add(other.negate())
    }

    /// Product.
    pub fn checked_mul(self, other: Self) -> Result<Self, DecimalError> {
        let exponent = self.exponent + other.exponent;
        if self.is_zero() || other.is_zero() {
            return Ok(Self::new(0, 0, exponent.clamp(MIN_EXPONENT, MAX_EXPONENT)));
        }
        let product = Wide::mul(self.coefficient, other.coefficient);
        Self::from_wide(self.sign * other.sign, product, exponent)
    }

    /// Quotient with up to [`MAX_DIGITS`] significant digits.
    pub fn checked_div(self, other: Self) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Self::ZERO);
        }
        let d = other.coefficient;
        let divisor = Wide::from_u128(d);
        // next quotient digit and remainder for a remainder `r < d`
        let next_digit = |r: u128| {
            let mut r10 = Wide::from_u128(r).mul_small(10);
            let mut digit = 0u128;
            while r10 >= divisor {
                r10 = r10.sub(divisor);
                digit += 1;
            }
            (digit, r10.lo)
        };
        let mut q = self.coefficient / d;
        let mut r = self.coefficient % d;
        let mut exponent = self.exponent - other.exponent;
        while r != 0 && (q == 0 || digit_count(q) < MAX_DIGITS) {
            let (digit, rest) = next_digit(r);
            q = q * 10 + digit;
            r = rest;
            exponent -= 1;
        }
        let sign = self.sign * other.sign;
        if r == 0 {
            return Self::new(sign, q, exponent).fit().map(Self::reduce_fraction);
        }
        let (first_dropped, rest) = next_digit(r);
        let mut c = q;
        if round_increment(RoundingMode::HalfEven, sign < 0, q % 10, first_dropped, rest != 0) {
            c += 1;
        }
        Self::new(sign, c, exponent).fit().map(Self::reduce_fraction)
    }

    /// Strips trailing fractional zeros introduced by division.
    fn reduce_fraction(self) -> Self {
        let mut t = self;
        while t.exponent < 0 && t.coefficient != 0 && t.coefficient % 10 == 0 {
            t.coefficient /= 10;
            t.exponent += 1;
        }
        t
    }

    /// Remainder with the sign of the dividend.
    pub fn checked_rem(self, other: Self) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let (a, b, e) = Self::aligned(&self, &other)?;
        Ok(Self::new(self.sign, a % b, e))
    }

    /// Numeric comparison.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match self.sign.cmp(&other.sign) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        if self.sign == 0 {
            return Ordering::Equal;
        }
        let magnitude = self.compare_magnitude(other);
        if self.sign < 0 {
            magnitude.reverse()
        } else {
            magnitude
        }
    }

    fn compare_magnitude(&self, other: &Self) -> Ordering {
        match self.adjusted_exponent().cmp(&other.adjusted_exponent()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        let a = self.coefficient.to_string();
        let b = other.coefficient.to_string();
        let width = a.len().max(b.len());
        format!("{a:0<width$}").cmp(&format!("{b:0<width$}"))
    }

    /// Integral part, truncated toward zero; `None` if it exceeds `i128`.
    #[must_use]
    pub fn to_i128_truncated(&self) -> Option<i128> {
        if self.is_zero() {
            return Some(0);
        }
        let magnitude = if self.exponent >= 0 {
            let factor = pow10(self.exponent as u32)?;
            self.coefficient.checked_mul(factor)?
        } else {
            let shift = self.exponent.unsigned_abs();
            match pow10(shift) {
                Some(divisor) => self.coefficient / divisor,
                None => 0,
            }
        };
        if self.sign < 0 {
            if magnitude == i128::MAX as u128 + 1 {
                Some(i128::MIN)
            } else {
                i128::try_from(magnitude).ok().map(|v| -v)
            }
        } else {
            i128::try_from(magnitude).ok()
        }
    }

    /// Nearest `f64`; out-of-range magnitudes become infinite.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let text = format!(
            "{}{}e{}",
            if self.sign < 0 { "-" } else { "" },
            self.coefficient,
            self.exponent
        );
        text.parse().unwrap_or(f64::NAN)
    }

    /// Nearest `f32`; out-of-range magnitudes become infinite.
    #[must_use]
    pub fn to_f32(&self) -> f32 {
        if self.is_zero() {
            return 0.0;
        }
        let text = format!(
            "{}{}e{}",
            if self.sign < 0 { "-" } else { "" },
            self.coefficient,
            self.exponent
        );
        text.parse().unwrap_or(f32::NAN)
    }

    /// Shortest decimal that reads back as `v`; `None` for NaN and infinities.
    #[must_use]
    pub fn from_f64(v: f64) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }
        if v == 0.0 {
            return Some(Self::ZERO);
        }
        format!("{v:e}").parse().ok()
    }

    /// Shortest decimal that reads back as `v`; `None` for NaN and infinities.
    #[must_use]
    pub fn from_f32(v: f32) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }
        if v == 0.0 {
            return Some(Self::ZERO);
        }
        format!("{v:e}").parse().ok()
    }
}

impl Wide {
    fn add_u128(self, v: u128) -> Self {
        let (lo, carry) = self.lo.overflowing_add(v);
        Self {
            hi: self.hi + u128::from(carry),
            lo,
        }
    }
}

impl Default for Triple {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialOrd for Triple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl From<i64> for Triple {
    fn from(v: i64) -> Self {
        Self::from_i64(v)
    }
}

impl std::str::FromStr for Triple {
    type Err = DecimalError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let err = || DecimalError::Format(text.to_string());
        let s = text.trim();
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (mantissa, exp_part) = match body.find(['e', 'E']) {
            Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
            None => (body, None),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let mut exponent: i64 = match exp_part {
            Some(e) => e.parse::<i64>().map_err(|_| err())?,
            None => 0,
        };
        exponent -= frac_part.len() as i64;

        let digits: String = int_part.chars().chain(frac_part.chars()).collect();
        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            let e = exponent.clamp(i64::from(MIN_EXPONENT), i64::from(MAX_EXPONENT));
            return Ok(Self::new(0, 0, e as i32));
        }
        let keep = (MAX_DIGITS as usize).min(digits.len());
        let (head, tail) = digits.split_at(keep);
        exponent += tail.len() as i64;
        let mut coefficient: u128 = head.parse().map_err(|_| err())?;
        let first_dropped = tail.bytes().next().map_or(0, |b| u128::from(b - b'0'));
        let sticky = tail.bytes().skip(1).any(|b| b != b'0');
        if round_increment(RoundingMode::HalfEven, negative, coefficient % 10, first_dropped, sticky) {
            coefficient += 1;
        }
        if exponent > i64::from(MAX_EXPONENT) + i64::from(MAX_DIGITS) {
            return Err(DecimalError::Overflow);
        }
        if exponent < i64::from(MIN_EXPONENT) - 2 * i64::from(MAX_DIGITS) {
            return Ok(Self::new(0, 0, MIN_EXPONENT));
        }
        let sign = if negative { -1 } else { 1 };
        Self::new(sign, coefficient, exponent as i32).fit()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.sign < 0 { "-" } else { "" };
        let digits = self.coefficient.to_string();
        let exp = self.exponent as i64;
        if exp >= 0 {
            if exp > 50 {
                return write!(f, "{sign}{digits}E+{exp}");
            }
            return write!(f, "{sign}{digits}{}", "0".repeat(exp as usize));
        }
        let frac = (-exp) as usize;
        if frac > digits.len() + 50 {
            return write!(f, "{sign}{digits}E{exp}");
        }
        if frac >= digits.len() {
            write!(f, "{sign}0.{}{digits}", "0".repeat(frac - digits.len()))
        } else {
            let (int, fraction) = digits.split_at(digits.len() - frac);
            write!(f, "{sign}{int}.{fraction}")
        }
    }
}

impl fmt::Debug for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Triple({}, {}, {})",
            self.sign, self.coefficient, self.exponent
        )
    }
}
