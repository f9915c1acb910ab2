// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Compensated ("double-double") arithmetic.
//!
//! A value is an unevaluated sum `hi + lo` of two hardware floats,
//! where `lo` holds the rounding error `hi` could not.  The
//! error-free transformations below (Knuth's two-sum, Dekker's
//! two-product) recover that error exactly, giving roughly twice the
//! mantissa of the base type for four to ten times the work.  Results
//! are renormalised with a quick two-sum so that `|lo| <= ulp(hi)/2`,
//! which keeps the field-wise ordering below meaningful.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use num::Float;

use crate::error::RenderError;
use crate::numeric::{Real, Scalar};

/// A hardware float that can carry the halves of a compensated pair.
pub trait PairBase: Float + fmt::Debug + Send + Sync + 'static {
    /// `2^ceil(p/2) + 1`, used to split a mantissa in two.
    const SPLITTER: Self;

    /// Decimals printed for a pair, enough to round-trip within
    /// `epsilon^2`.
    const DIGITS: usize;

    /// Exact widening to `f64`.
    fn widen(self) -> f64;

    /// Rounding narrow from `f64`.
    fn narrow(value: f64) -> Self;
}

impl PairBase for f32 {
    const SPLITTER: f32 = 4097.0;
    const DIGITS: usize = 18;

    fn widen(self) -> f64 {
        f64::from(self)
    }

    fn narrow(value: f64) -> f32 {
        value as f32
    }
}

impl PairBase for f64 {
    const SPLITTER: f64 = 134_217_729.0;
    const DIGITS: usize = 34;

    fn widen(self) -> f64 {
        self
    }

    fn narrow(value: f64) -> f64 {
        value
    }
}

/// The unevaluated sum `hi + lo`.  Fields compare in order, which is
/// the numeric order for normalised pairs.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Compensated<F> {
    /// Leading component.
    pub hi: F,
    /// Trailing error term.
    pub lo: F,
}

/// `x + y` and its exact rounding error.
pub fn two_sum<F: PairBase>(x: F, y: F) -> Compensated<F> {
    let hi = x + y;
    let t = hi - x;
    let lo = (x - (hi - t)) + (y - t);
    Compensated { hi, lo }
}

/// Two-sum for `|x| >= |y|`, three operations instead of six.
pub fn quick_two_sum<F: PairBase>(x: F, y: F) -> Compensated<F> {
    let hi = x + y;
    Compensated {
        hi,
        lo: y - (hi - x),
    }
}

/// `x - y` and its exact rounding error.
pub fn two_difference<F: PairBase>(x: F, y: F) -> Compensated<F> {
    let hi = x - y;
    let t = hi - x;
    let lo = (x - (hi - t)) - (y + t);
    Compensated { hi, lo }
}

/// `x * y` and its exact rounding error, by Dekker splitting.
pub fn two_product<F: PairBase>(x: F, y: F) -> Compensated<F> {
    let u = x * F::SPLITTER;
    let v = y * F::SPLITTER;
    let s = u - (u - x);
    let t = v - (v - y);
    let f = x - s;
    let g = y - t;
    let hi = x * y;
    let lo = ((s * t - hi) + s * g + f * t) + f * g;
    Compensated { hi, lo }
}

impl<F: PairBase> From<F> for Compensated<F> {
    fn from(hi: F) -> Self {
        Compensated { hi, lo: F::zero() }
    }
}

impl<F: PairBase> Add for Compensated<F> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let sum = two_sum(self.hi, rhs.hi);
        quick_two_sum(sum.hi, sum.lo + (self.lo + rhs.lo))
    }
}

impl<F: PairBase> Sub for Compensated<F> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let difference = two_difference(self.hi, rhs.hi);
        quick_two_sum(difference.hi, difference.lo + (self.lo - rhs.lo))
    }
}

impl<F: PairBase> Mul for Compensated<F> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let product = two_product(self.hi, rhs.hi);
        quick_two_sum(
            product.hi,
            product.lo + (self.hi * rhs.lo + self.lo * rhs.hi),
        )
    }
}

impl<F: PairBase> Mul<F> for Compensated<F> {
    type Output = Self;

    fn mul(self, rhs: F) -> Self {
        let product = two_product(rhs, self.hi);
        quick_two_sum(product.hi, product.lo + rhs * self.lo)
    }
}

impl<F: PairBase> Div for Compensated<F> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let hi = self.hi / rhs.hi;
        let back = two_product(hi, rhs.hi);
        let lo = (self.hi - back.hi - back.lo + self.lo - hi * rhs.lo) / rhs.hi;
        quick_two_sum(hi, lo)
    }
}

impl<F: PairBase> Neg for Compensated<F> {
    type Output = Self;

    fn neg(self) -> Self {
        Compensated {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl<F: PairBase> fmt::Display for Compensated<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let digits = f.precision().unwrap_or(F::DIGITS);
        f.write_str(&self.to_real().to_decimal(digits))
    }
}

impl<F: PairBase> FromStr for Compensated<F> {
    type Err = RenderError;

    fn from_str(text: &str) -> Result<Self, RenderError> {
        <Self as Scalar>::parse(text)
    }
}

impl<F: PairBase> Scalar for Compensated<F> {
    fn from_f64(value: f64) -> Self {
        assert!(value.is_finite(), "non-finite coordinate {}", value);
        let hi = F::narrow(value);
        let lo = F::narrow(value - hi.widen());
        Compensated { hi, lo }
    }

    fn to_f64(&self) -> f64 {
        self.hi.widen() + self.lo.widen()
    }

    fn from_real(value: &Real) -> Self {
        let hi = F::narrow(value.to_f64());
        let rest = value.clone() - Real::from_f64(hi.widen());
        quick_two_sum(hi, F::narrow(rest.to_f64()))
    }

    fn to_real(&self) -> Real {
        Real::from_f64(self.hi.widen()) + Real::from_f64(self.lo.widen())
    }

    fn epsilon() -> Self {
        Compensated::from(F::epsilon() * F::epsilon())
    }

    fn parse(text: &str) -> Result<Self, RenderError> {
        Real::parse_decimal(text).map(|value| Self::from_real(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type DoubleDouble = Compensated<f64>;

    #[test]
    fn two_sum_of_opposites_is_exactly_zero() {
        for &x in &[1.0f64, -3.5, 1e-300, 0.1, 6.02e23] {
            let sum = two_sum(x, -x);
            assert_eq!(sum.hi, 0.0);
            assert_eq!(sum.lo, 0.0);
        }
    }

    #[test]
    fn two_sum_captures_what_rounding_dropped() {
        let sum = two_sum(1.0f64, 1e-20);
        assert_eq!(sum.hi, 1.0);
        assert_eq!(sum.lo, 1e-20);

        let sum = two_sum(0.1f64, 0.2);
        let exact = Real::from_f64(0.1) + Real::from_f64(0.2);
        assert_eq!(Real::from_f64(sum.hi) + Real::from_f64(sum.lo), exact);
    }

    #[test]
    fn two_product_is_exact() {
        let x = 1.0f64 + f64::EPSILON;
        let product = two_product(x, x);
        let exact = Real::from_f64(x) * Real::from_f64(x);
        assert_eq!(
            Real::from_f64(product.hi) + Real::from_f64(product.lo),
            exact
        );

        let x = 1.0f32 + std::f32::EPSILON;
        let product = two_product(x, x);
        assert_eq!(
            f64::from(product.hi) + f64::from(product.lo),
            f64::from(x) * f64::from(x)
        );
    }

    #[test]
    fn tiny_increments_accumulate() {
        let step = 1e-20;
        let mut compensated = DoubleDouble::from_f64(1.0);
        let mut plain = 1.0f64;
        for _ in 0..1000 {
            compensated = compensated + DoubleDouble::from_f64(step);
            plain += step;
        }
        assert_eq!(plain, 1.0);
        let gained = (compensated - DoubleDouble::from_f64(1.0)).to_f64();
        assert!((gained - 1e-17).abs() < 1e-25, "gained {}", gained);
    }

    #[test]
    fn division_inverts_multiplication() {
        let a = DoubleDouble::from_f64(1.0) / DoubleDouble::from_f64(3.0);
        let b = a * DoubleDouble::from_f64(3.0);
        let error = (b - DoubleDouble::from_f64(1.0)).to_f64().abs();
        assert!(error <= 2.0 * DoubleDouble::epsilon().hi);
    }

    #[test]
    fn scalar_multiply_matches_pair_multiply() {
        let a = DoubleDouble::from_f64(0.1) + DoubleDouble::from_f64(1e-18);
        assert_eq!(a * 2.0, a * DoubleDouble::from_f64(2.0));
    }

    #[test]
    fn ordering_looks_at_the_trailing_term() {
        let one = DoubleDouble::from_f64(1.0);
        let above = one + DoubleDouble::epsilon();
        let below = one - DoubleDouble::epsilon();
        assert!(below < one && one < above);
        assert_eq!(above.hi, 1.0);
    }

    #[test]
    fn text_round_trips_within_epsilon() {
        let third = DoubleDouble::from_f64(1.0) / DoubleDouble::from_f64(3.0);
        let back: DoubleDouble = third.to_string().parse().unwrap();
        let error = (back - third).to_f64().abs();
        assert!(error <= DoubleDouble::epsilon().hi, "error {}", error);

        let single = Compensated::<f32>::from_f64(-0.7);
        let back: Compensated<f32> = single.to_string().parse().unwrap();
        let error = (back - single).to_f64().abs();
        assert!(error <= f64::from(Compensated::<f32>::epsilon().hi));
    }

    #[test]
    fn from_f64_keeps_what_f32_cannot() {
        let value = Compensated::<f32>::from_f64(0.1);
        assert_eq!(value.hi, 0.1f32);
        assert!((value.to_f64() - 0.1).abs() < 1e-15);
    }
}
