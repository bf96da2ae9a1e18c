//! Logarithm, exponential and fractional power on `BigDecimal`.
//!
//! Series are summed at the hundred significant digits `/` produces, and
//! results are rounded to [`RESULT_DIGITS`] so the digits shown are digits
//! that hold.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::OpError;

const WORKING_DIGITS: u64 = 100;

/// Significant digits of a fractional power.
pub const RESULT_DIGITS: u64 = 90;

/// Largest `|exponent · ln(base)|` a power may reach.
const MAX_EXP_ARGUMENT: i64 = 10_000_000;

fn int(n: i64) -> BigDecimal {
    BigDecimal::new(BigInt::from(n), 0)
}

fn round(x: BigDecimal) -> BigDecimal {
    x.with_prec(WORKING_DIGITS)
}

/// Terms below this no longer reach the working digits of an O(1) sum.
fn epsilon() -> BigDecimal {
    BigDecimal::new(BigInt::one(), WORKING_DIGITS as i64 + 5)
}

/// `atanh(z) = z + z³/3 + z⁵/5 + ...` for `|z|` well below one.
fn atanh(z: &BigDecimal) -> BigDecimal {
    let z2 = round(z * z);
    let epsilon = epsilon();
    let mut power = z.clone();
    let mut sum = z.clone();
    let mut k = 1;
    loop {
        power = round(&power * &z2);
        k += 2;
        let term = power.clone() / int(k);
        if term.abs() < epsilon {
            break;
        }
        sum += term;
    }
    round(sum)
}

/// `ln 2 = 2·atanh(1/3)`
fn ln2() -> BigDecimal {
    int(2) * atanh(&(int(1) / int(3)))
}

/// `ln 10 = 3·ln 2 + ln 1.25`, with `ln 1.25 = 2·atanh(1/9)`
fn ln10(ln2: &BigDecimal) -> BigDecimal {
    round(int(3) * ln2 + int(2) * atanh(&(int(1) / int(9))))
}

/// Natural logarithm of a positive value.
///
/// The argument is split into `m · 2^h · 10^p` with `m` close to one, so
/// `ln m = 2·atanh((m - 1) / (m + 1))` converges quickly.
pub fn ln(x: &BigDecimal) -> BigDecimal {
    let (digits, scale) = x.as_bigint_and_exponent();
    let count = digits.to_string().len() as i64;
    let tens = count - 1 - scale;

    let mut mantissa = BigDecimal::new(digits, count - 1);
    let threshold = BigDecimal::new(BigInt::from(13), 1);
    let mut halvings = 0;
    while mantissa > threshold {
        mantissa = mantissa / int(2);
        halvings += 1;
    }

    let z = (mantissa.clone() - BigDecimal::one()) / (mantissa + BigDecimal::one());
    let ln2 = ln2();
    let ln10 = ln10(&ln2);
    round(int(2) * atanh(&z) + int(halvings) * &ln2 + int(tens) * ln10)
}

/// `e^x = 1 + x + x²/2! + ...` for `|x| < 1`.
fn exp_series(x: &BigDecimal) -> BigDecimal {
    let epsilon = epsilon();
    let mut term = BigDecimal::one();
    let mut sum = BigDecimal::one();
    let mut k = 0;
    loop {
        k += 1;
        term = round(&term * x) / int(k);
        if term.abs() < epsilon {
            break;
        }
        sum += term.clone();
    }
    round(sum)
}

/// Repeated squaring, rounded to the working digits at every step.
fn powi_rounded(base: BigDecimal, mut n: u64) -> BigDecimal {
    let mut acc = BigDecimal::one();
    let mut square = base;
    while n > 0 {
        if n & 1 == 1 {
            acc = round(&acc * &square);
        }
        n >>= 1;
        if n > 0 {
            square = round(&square * &square);
        }
    }
    acc
}

/// `e^y` for `|y|` within `i64`: `e^n · e^f` with `n` the integer part of `y`.
pub fn exp(y: &BigDecimal) -> BigDecimal {
    let whole = y.with_scale(0);
    let fraction = y - &whole;
    let mut result = exp_series(&fraction);
    let n = whole.to_i64().unwrap_or(0);
    if n != 0 {
        let e = exp_series(&BigDecimal::one());
        let mut factor = powi_rounded(e, n.unsigned_abs());
        if n < 0 {
            factor = BigDecimal::one() / factor;
        }
        result = round(result * factor);
    }
    result
}

/// `base^exponent` for a non-negative base, as `e^(exponent · ln base)`.
pub fn pow(base: &BigDecimal, exponent: &BigDecimal) -> Result<BigDecimal, OpError> {
    if base < &BigDecimal::zero() {
        return Err(OpError::NotReal);
    }
    if base.is_zero() {
        return if exponent < &BigDecimal::zero() {
            Err(OpError::DivisionByZero)
        } else if exponent.is_zero() {
            Ok(BigDecimal::one())
        } else {
            Ok(BigDecimal::zero())
        };
    }
    let y = round(ln(base) * exponent);
    if y.abs() > int(MAX_EXP_ARGUMENT) {
        return Err(OpError::ExponentTooLarge(exponent.to_string()));
    }
    Ok(exp(&y).with_prec(RESULT_DIGITS).normalized())
}
