// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time kernel.
//!
//! Iterate `z <- z^2 + c` from `z = c` until `|z|^2` reaches the
//! bailout or the iteration limit runs out.  Points in the main
//! cardioid and the period-2 bulb never escape and make up most of
//! the overview, so they are recognised geometrically and skipped.
//! Escaped orbits run four iterations past the bailout; the larger
//! final modulus makes the continuous (smooth) iteration estimate
//! much less sensitive to where exactly the orbit crossed the circle.

use crate::numeric::Scalar;

/// Default iteration limit.
pub const LIMIT: u32 = 2048;

/// Squared escape radius.
pub const BAILOUT: f64 = 4.0;

/// Iterations run after the bailout to steady the smooth estimate.
pub const EXTRA_ITERATIONS: usize = 4;

/// Where the orbit of `c` ended up.
#[derive(Clone, Debug, PartialEq)]
pub struct Escape<T> {
    /// Iterations before escape, or the limit for interior points.
    pub iterations: u32,
    /// Final `x^2`.
    pub x2: T,
    /// Final `y^2`.
    pub y2: T,
}

impl<T: Scalar> Escape<T> {
    /// True when the orbit never escaped.
    pub fn is_interior(&self, limit: u32) -> bool {
        self.iterations >= limit
    }

    /// The fractional iteration count of an escaped orbit.  Computed
    /// in double precision whatever tier produced the orbit.
    pub fn smooth_iterations(&self) -> f64 {
        f64::from(self.iterations) + fraction(self.x2.to_f64() + self.y2.to_f64())
    }
}

/// Continuous correction for a final squared modulus, normalised for
/// the extra iterations so that bands line up with whole counts.
pub fn fraction(modulus2: f64) -> f64 {
    let log2_inverse = 1.0 / 2f64.ln();
    let log_half_log2_inverse = 0.5f64.ln() * log2_inverse;
    let correction = 5.0 - log_half_log2_inverse - modulus2.ln().ln() * log2_inverse;
    if correction.is_finite() {
        correction
    } else {
        0.0
    }
}

/// True for points inside the main cardioid or the period-2 bulb.
pub fn is_inside<T: Scalar>(x: &T, y: &T) -> bool {
    let near_x = x.to_f64();
    let abs_y = y.to_f64().abs();
    if near_x > -0.75 && abs_y < 0.75 {
        // q(q + (x - 1/4)) < y^2 / 4, expanded with q = (x - 1/4)^2 + y^2
        let quarter = T::from_f64(0.25);
        let x = x.clone() - quarter.clone();
        let y2 = y.clone() * y.clone();
        let q = x.clone() * x.clone() + y2.clone();
        let c2 = q.clone() * q.clone() + x * q - quarter * y2;
        c2 < T::from_f64(0.0)
    } else if near_x > -1.25 && abs_y < 0.25 {
        let x = x.clone() + T::from_f64(1.0);
        x.clone() * x + y.clone() * y.clone() < T::from_f64(0.0625)
    } else {
        false
    }
}

struct Orbit<T> {
    x: T,
    y: T,
    x2: T,
    y2: T,
}

impl<T: Scalar> Orbit<T> {
    fn start(cx: &T, cy: &T) -> Self {
        Orbit {
            x: cx.clone(),
            y: cy.clone(),
            x2: cx.clone() * cx.clone(),
            y2: cy.clone() * cy.clone(),
        }
    }

    fn modulus2(&self) -> T {
        self.x2.clone() + self.y2.clone()
    }

    fn advance(&mut self, cx: &T, cy: &T, two: &T) {
        self.y = self.x.clone() * self.y.clone() * two.clone() + cy.clone();
        self.x = self.x2.clone() - self.y2.clone() + cx.clone();
        self.x2 = self.x.clone() * self.x.clone();
        self.y2 = self.y.clone() * self.y.clone();
    }
}

/// Run the escape-time loop for `c = cx + i cy`.
pub fn iterate<T: Scalar>(cx: &T, cy: &T, limit: u32) -> Escape<T> {
    if is_inside(cx, cy) {
        return Escape {
            iterations: limit,
            x2: T::from_f64(0.0),
            y2: T::from_f64(0.0),
        };
    }

    let two = T::from_f64(2.0);
    let bailout = T::from_f64(BAILOUT);
    let mut orbit = Orbit::start(cx, cy);
    let mut iterations = 0;
    while orbit.modulus2() < bailout {
        iterations += 1;
        if iterations >= limit {
            return Escape {
                iterations,
                x2: orbit.x2,
                y2: orbit.y2,
            };
        }
        orbit.advance(cx, cy, &two);
    }

    for _ in 0..EXTRA_ITERATIONS {
        orbit.advance(cx, cy, &two);
    }
    Escape {
        iterations,
        x2: orbit.x2,
        y2: orbit.y2,
    }
}
