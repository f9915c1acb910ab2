// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arbitrary-precision fixed point.
//!
//! A `BigFixed<BITS>` is a `BigInt` count of `2^-BITS` units.  Sums
//! and differences are exact; products and quotients are floored back
//! onto the grid, so the unit of least precision is the same
//! everywhere (world coordinates stay within a few units of the
//! origin, so relative precision is never the issue).  Values own
//! their integer outright and `Clone` copies it.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use num::{BigInt, Integer, One, Signed, ToPrimitive, Zero};

use crate::error::RenderError;
use crate::numeric::{Real, Scalar, WORKING_BITS};

/// Decimal exponents outside this range are refused rather than
/// allocating a power of ten the size of the input's ambition.
const MAX_DECIMAL_EXPONENT: i64 = 4096;

/// Signed fixed-point value with `BITS` fractional bits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigFixed<const BITS: u32>(BigInt);

/// Shift left for positive counts, floor-shift right for negative.
fn shift(value: BigInt, by: i64) -> BigInt {
    if by >= 0 {
        value << by as usize
    } else {
        value >> (-by) as usize
    }
}

/// `value * 2^exp` without leaving the range of `f64` halfway through.
fn ldexp(mut value: f64, mut exp: i64) -> f64 {
    while exp < -1000 {
        value *= 2f64.powi(-1000);
        exp += 1000;
    }
    while exp > 1000 {
        value *= 2f64.powi(1000);
        exp -= 1000;
    }
    value * 2f64.powi(exp as i32)
}

fn pow10(exp: i64) -> BigInt {
    num::pow(BigInt::from(10), exp as usize)
}

impl<const BITS: u32> BigFixed<BITS> {
    /// Decimal digits needed after the point to pin down one unit.
    pub const DIGITS: usize = (BITS as usize * 30_103) / 100_000 + 2;

    /// Zero.
    pub fn zero() -> Self {
        BigFixed(BigInt::zero())
    }

    /// One.
    pub fn one() -> Self {
        BigFixed(BigInt::one() << BITS as usize)
    }

    /// One unit of least precision.
    pub fn ulp() -> Self {
        BigFixed(BigInt::one())
    }

    /// An exact integer.
    pub fn from_int(value: i64) -> Self {
        BigFixed(BigInt::from(value) << BITS as usize)
    }

    /// Exact for every finite double whose lowest set bit is no finer
    /// than `2^-BITS`; floors otherwise.
    pub fn from_f64(value: f64) -> Self {
        assert!(value.is_finite(), "non-finite coordinate {}", value);
        if value == 0.0 {
            return Self::zero();
        }
        let bits = value.to_bits();
        let biased = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & ((1u64 << 52) - 1);
        let (mantissa, exponent) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1u64 << 52), biased - 1075)
        };
        let mut units = BigInt::from(mantissa);
        if value.is_sign_negative() {
            units = -units;
        }
        BigFixed(shift(units, exponent + i64::from(BITS)))
    }

    /// Nearest double.
    pub fn to_f64(&self) -> f64 {
        let units = self.0.to_f64().unwrap_or(if self.0.is_negative() {
            std::f64::NEG_INFINITY
        } else {
            std::f64::INFINITY
        });
        ldexp(units, -i64::from(BITS))
    }

    /// Move onto a grid with a different number of fractional bits,
    /// flooring when the target is coarser.
    pub fn rescale<const OTHER: u32>(&self) -> BigFixed<OTHER> {
        BigFixed(shift(self.0.clone(), i64::from(OTHER) - i64::from(BITS)))
    }

    /// Render with at most `digits` decimals, truncated toward zero
    /// and with trailing zeros dropped.
    pub fn to_decimal(&self, digits: usize) -> String {
        let mut text = String::new();
        if self.0.is_negative() {
            text.push('-');
        }
        let magnitude = self.0.abs();
        let mask = (BigInt::one() << BITS as usize) - 1u32;
        let whole = &magnitude >> BITS as usize;
        let mut fraction = magnitude & &mask;
        text.push_str(&whole.to_string());

        let mut decimals = String::new();
        for _ in 0..digits {
            if fraction.is_zero() {
                break;
            }
            fraction *= 10u32;
            let digit = (&fraction >> BITS as usize).to_u8().unwrap_or(0);
            decimals.push(char::from(b'0' + digit));
            fraction &= &mask;
        }
        let decimals = decimals.trim_end_matches('0');
        if !decimals.is_empty() {
            text.push('.');
            text.push_str(decimals);
        }
        text
    }

    /// Parse `[+-]digits[.digits][e[+-]digits]`, rounding to the
    /// nearest unit.
    pub fn parse_decimal(text: &str) -> Result<Self, RenderError> {
        let fail = || RenderError::ParseNumber(text.to_string());
        let body = text.trim();
        let (negative, body) = match body.as_bytes().first() {
            Some(b'-') => (true, &body[1..]),
            Some(b'+') => (false, &body[1..]),
            _ => (false, body),
        };
        let (mantissa, exponent) = match body.find(|c| c == 'e' || c == 'E') {
            Some(at) => (
                &body[..at],
                body[at + 1..].parse::<i64>().map_err(|_| fail())?,
            ),
            None => (body, 0),
        };
        let (whole, fraction) = match mantissa.find('.') {
            Some(at) => (&mantissa[..at], &mantissa[at + 1..]),
            None => (mantissa, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(fail());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(fail());
        }

        let digits: String = whole.chars().chain(fraction.chars()).collect();
        let count = digits.parse::<BigInt>().map_err(|_| fail())?;
        let scale = exponent - fraction.len() as i64;
        if scale.abs() > MAX_DECIMAL_EXPONENT {
            return Err(fail());
        }

        let scaled = count << BITS as usize;
        let units = if scale >= 0 {
            scaled * pow10(scale)
        } else {
            let divisor = pow10(-scale);
            (scaled * 2u32 + &divisor).div_floor(&(divisor * 2u32))
        };
        Ok(BigFixed(if negative { -units } else { units }))
    }
}

impl<const BITS: u32> Add for BigFixed<BITS> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        BigFixed(self.0 + rhs.0)
    }
}

impl<const BITS: u32> Sub for BigFixed<BITS> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        BigFixed(self.0 - rhs.0)
    }
}

impl<const BITS: u32> Mul for BigFixed<BITS> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        BigFixed((self.0 * rhs.0) >> BITS as usize)
    }
}

impl<const BITS: u32> Div for BigFixed<BITS> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        BigFixed((self.0 << BITS as usize).div_floor(&rhs.0))
    }
}

impl<const BITS: u32> Neg for BigFixed<BITS> {
    type Output = Self;

    fn neg(self) -> Self {
        BigFixed(-self.0)
    }
}

impl<const BITS: u32> fmt::Display for BigFixed<BITS> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_decimal(f.precision().unwrap_or(Self::DIGITS)))
    }
}

impl<const BITS: u32> FromStr for BigFixed<BITS> {
    type Err = RenderError;

    fn from_str(text: &str) -> Result<Self, RenderError> {
        Self::parse_decimal(text)
    }
}

impl<const BITS: u32> Scalar for BigFixed<BITS> {
    fn from_f64(value: f64) -> Self {
        BigFixed::from_f64(value)
    }

    fn to_f64(&self) -> f64 {
        BigFixed::to_f64(self)
    }

    fn from_real(value: &Real) -> Self {
        value.rescale::<BITS>()
    }

    fn to_real(&self) -> Real {
        self.rescale::<WORKING_BITS>()
    }

    fn epsilon() -> Self {
        Self::ulp()
    }

    fn parse(text: &str) -> Result<Self, RenderError> {
        Self::parse_decimal(text)
    }
}
