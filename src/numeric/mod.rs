// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interchangeable scalar types for the escape-time loop.
//!
//! Deep zooms need more mantissa than an `f64` carries, but every bit
//! of precision past what a pixel can resolve is wasted time.  The
//! renderer therefore keeps a small, closed family of scalar types
//! (the [`Tier`]s), from hardware `f32` up to big-integer fixed point,
//! all speaking the same [`Scalar`] contract.  The viewport itself is
//! held in [`Real`], a fixed-point type finer than any tier, and each
//! render cycle converts its bounds down into whichever tier the
//! precision selector picked.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::RenderError;

pub mod bigfixed;
pub mod compensated;
mod native;
pub mod tier;

pub use self::bigfixed::BigFixed;
pub use self::compensated::Compensated;
pub use self::tier::{Tier, TierVisitor};

/// Fractional bits of the working representation.
pub const WORKING_BITS: u32 = 320;

/// The working representation of world coordinates.  Viewport
/// centers, sizes, and per-cycle bounds live here; tiers convert to
/// and from it.
pub type Real = BigFixed<WORKING_BITS>;

/// The uniform operation table every tier provides.
///
/// Arithmetic is by value; tiers backed by heap storage pay for a
/// clone at each use, which the kernel accepts since those tiers are
/// already the slow path.
pub trait Scalar:
    Clone
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Nearest (or next lower) value to a reference double.  Panics
    /// on NaN or infinity.
    fn from_f64(value: f64) -> Self;

    /// Nearest reference double.
    fn to_f64(&self) -> f64;

    /// Narrow a working-precision value into this tier.
    fn from_real(value: &Real) -> Self;

    /// Widen into the working precision.  Exact for every tier whose
    /// resolution is no finer than `2^-WORKING_BITS`.
    fn to_real(&self) -> Real;

    /// The unit of least precision at 1.0.
    fn epsilon() -> Self;

    /// Parse the textual form produced by `Display`.
    fn parse(text: &str) -> Result<Self, RenderError>;
}

/// Convert between any two tiers through the working precision.
pub fn convert<A: Scalar, B: Scalar>(value: &A) -> B {
    B::from_real(&value.to_real())
}
