// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The closed set of precision tiers.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::error::RenderError;
use crate::numeric::{BigFixed, Compensated, Real, Scalar};

/// Work that is generic over the scalar type and is handed a tier at
/// run time.  `Tier::visit` picks the concrete type.
pub trait TierVisitor {
    /// What the work produces.
    type Output;

    /// Do the work in `T`.
    fn visit<T: Scalar>(self) -> Self::Output;
}

struct Epsilon;

impl TierVisitor for Epsilon {
    type Output = Real;

    fn visit<T: Scalar>(self) -> Real {
        T::epsilon().to_real()
    }
}

/// One arithmetic representation the renderer can iterate in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Hardware single precision.
    F32,
    /// Hardware double precision.
    F64,
    /// A pair of singles.
    CompensatedF32,
    /// A pair of doubles.
    CompensatedF64,
    /// Fixed point with 128 fractional bits.
    Big128,
    /// Fixed point with 256 fractional bits.
    Big256,
}

impl Tier {
    /// Every tier, in declaration order.
    pub const ALL: [Tier; 6] = [
        Tier::F32,
        Tier::F64,
        Tier::CompensatedF32,
        Tier::CompensatedF64,
        Tier::Big128,
        Tier::Big256,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Tier::F32 => "float",
            Tier::F64 => "double",
            Tier::CompensatedF32 => "doubledouble<float>",
            Tier::CompensatedF64 => "doubledouble<double>",
            Tier::Big128 => "bigfixed<128>",
            Tier::Big256 => "bigfixed<256>",
        }
    }

    /// The tier's unit of least precision at 1.0, in working precision.
    pub fn epsilon(self) -> Real {
        self.visit(Epsilon)
    }

    /// Run `visitor` in this tier's scalar type.  The only place a tier
    /// becomes a type.
    pub fn visit<V: TierVisitor>(self, visitor: V) -> V::Output {
        match self {
            Tier::F32 => visitor.visit::<f32>(),
            Tier::F64 => visitor.visit::<f64>(),
            Tier::CompensatedF32 => visitor.visit::<Compensated<f32>>(),
            Tier::CompensatedF64 => visitor.visit::<Compensated<f64>>(),
            Tier::Big128 => visitor.visit::<BigFixed<128>>(),
            Tier::Big256 => visitor.visit::<BigFixed<256>>(),
        }
    }

    /// Rough cost of one kernel iteration relative to `F32`.  Only the
    /// ordering matters.
    pub fn cost(self) -> u32 {
        match self {
            Tier::F32 => 1,
            Tier::F64 => 2,
            Tier::CompensatedF32 => 8,
            Tier::CompensatedF64 => 10,
            Tier::Big128 => 120,
            Tier::Big256 => 160,
        }
    }

    /// Every tier from coarsest to finest epsilon.
    pub fn by_precision() -> Vec<Tier> {
        Tier::ALL
            .iter()
            .cloned()
            .sorted_by(|a, b| b.epsilon().cmp(&a.epsilon()))
            .collect()
    }

    /// The tiers automatic selection considers: coarsest first, minus
    /// any tier that a finer tier beats on cost.  `CompensatedF32` is
    /// the casualty, since `F64` is both cheaper and finer.
    pub fn selectable() -> Vec<Tier> {
        let ordered = Tier::by_precision();
        ordered
            .iter()
            .enumerate()
            .filter(|&(at, tier)| {
                !ordered[at + 1..]
                    .iter()
                    .any(|finer| finer.cost() <= tier.cost())
            })
            .map(|(_, &tier)| tier)
            .collect()
    }

    /// The finest tier, used when nothing else resolves a pixel.
    pub fn finest() -> Tier {
        Tier::by_precision()
            .last()
            .cloned()
            .unwrap_or(Tier::Big256)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = RenderError;

    fn from_str(text: &str) -> Result<Tier, RenderError> {
        let wanted = text.trim().to_ascii_lowercase();
        let short = match wanted.as_str() {
            "f32" | "single" => Some(Tier::F32),
            "f64" => Some(Tier::F64),
            "dd32" | "dd-f32" => Some(Tier::CompensatedF32),
            "dd64" | "dd-f64" => Some(Tier::CompensatedF64),
            "big128" => Some(Tier::Big128),
            "big256" => Some(Tier::Big256),
            _ => None,
        };
        short
            .or_else(|| Tier::ALL.iter().cloned().find(|tier| tier.name() == wanted))
            .ok_or_else(|| RenderError::UnknownTier(text.to_string()))
    }
}

/// Parse a user precision choice; `auto` means no override.
pub fn parse_precision(text: &str) -> Result<Option<Tier>, RenderError> {
    if text.trim().eq_ignore_ascii_case("auto") {
        Ok(None)
    } else {
        text.parse().map(Some)
    }
}
