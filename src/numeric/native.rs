// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The hardware tiers.

use crate::error::RenderError;
use crate::numeric::{Real, Scalar};

impl Scalar for f32 {
    fn from_f64(value: f64) -> Self {
        assert!(value.is_finite(), "non-finite coordinate {}", value);
        value as f32
    }

    fn to_f64(&self) -> f64 {
        f64::from(*self)
    }

    fn from_real(value: &Real) -> Self {
        value.to_f64() as f32
    }

    fn to_real(&self) -> Real {
        Real::from_f64(f64::from(*self))
    }

    fn epsilon() -> Self {
        std::f32::EPSILON
    }

    fn parse(text: &str) -> Result<Self, RenderError> {
        text.trim()
            .parse()
            .map_err(|_| RenderError::ParseNumber(text.to_string()))
    }
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        assert!(value.is_finite(), "non-finite coordinate {}", value);
        value
    }

    fn to_f64(&self) -> f64 {
        *self
    }

    fn from_real(value: &Real) -> Self {
        value.to_f64()
    }

    fn to_real(&self) -> Real {
        Real::from_f64(*self)
    }

    fn epsilon() -> Self {
        std::f64::EPSILON
    }

    fn parse(text: &str) -> Result<Self, RenderError> {
        text.trim()
            .parse()
            .map_err(|_| RenderError::ParseNumber(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Halve until adding to one no longer registers.
    fn measured_epsilon<T: Scalar>() -> T {
        let one = T::from_f64(1.0);
        let half = T::from_f64(0.5);
        let mut epsilon = T::from_f64(1.0);
        while one.clone() + half.clone() * epsilon.clone() != one {
            epsilon = half.clone() * epsilon;
        }
        epsilon
    }

    #[test]
    fn declared_epsilon_matches_the_hardware() {
        assert_eq!(measured_epsilon::<f32>(), <f32 as Scalar>::epsilon());
        assert_eq!(measured_epsilon::<f64>(), <f64 as Scalar>::epsilon());
    }

    #[test]
    fn display_round_trips() {
        for &value in &[0.1f64, -1.7499999999999998, 6.02e23, 1e-300] {
            let text = format!("{}", value);
            assert_eq!(<f64 as Scalar>::parse(&text).unwrap(), value);
        }
        let single = 0.3f32;
        assert_eq!(<f32 as Scalar>::parse(&single.to_string()).unwrap(), single);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(<f64 as Scalar>::parse("one point five").is_err());
    }
}
