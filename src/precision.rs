// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Picking the cheapest tier that can still tell neighbouring pixels
//! apart.
//!
//! A tier whose epsilon is at least the world-space size of a pixel
//! collapses neighbouring pixels onto the same coordinate and the
//! image turns to blocks; a tier much finer than the pixel costs time
//! and shows nothing new.  Selection walks the selectable tiers from
//! coarsest to finest and stops at the first one whose epsilon is
//! strictly smaller than the pixel.

use crate::numeric::{Real, Tier};

/// Choose the tier for a render cycle.  A forced tier wins outright,
/// even when it is too coarse for the zoom.  When no tier is fine
/// enough the finest is used anyway; the render is slow and blocky
/// but it proceeds.
pub fn select(pixel_size: &Real, forced: Option<Tier>) -> Tier {
    if let Some(tier) = forced {
        return tier;
    }
    Tier::selectable()
        .into_iter()
        .find(|tier| tier.epsilon() < *pixel_size)
        .unwrap_or_else(Tier::finest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(value: f64) -> Real {
        Real::from_f64(value)
    }

    #[test]
    fn an_overview_uses_single_precision() {
        assert_eq!(select(&pixel(2.0 / 768.0), None), Tier::F32);
    }

    #[test]
    fn the_override_always_wins() {
        assert_eq!(select(&pixel(1e-30), Some(Tier::F32)), Tier::F32);
        assert_eq!(select(&pixel(1.0), Some(Tier::Big256)), Tier::Big256);
    }

    #[test]
    fn selection_flips_exactly_at_each_boundary() {
        let selectable = Tier::selectable();
        for (at, &tier) in selectable.iter().enumerate() {
            let epsilon = tier.epsilon();

            let just_above = epsilon.clone() + Real::ulp();
            assert_eq!(select(&just_above, None), tier);

            // At the boundary the tier no longer qualifies.
            let chosen = select(&epsilon, None);
            match selectable.get(at + 1) {
                Some(&next) => assert_eq!(chosen, next),
                None => assert_eq!(chosen, Tier::finest()),
            }
        }
    }

    #[test]
    fn never_picks_a_tier_as_coarse_as_the_pixel() {
        let mut size = Real::from_f64(1.0);
        let half = Real::from_f64(0.5);
        for _ in 0..300 {
            let tier = select(&size, None);
            if tier != Tier::finest() {
                assert!(tier.epsilon() < size);
            }
            size = size * half.clone();
        }
    }

    #[test]
    fn exhausted_precision_falls_back_to_the_finest_tier() {
        let below = Tier::finest().epsilon() * Real::from_f64(0.25);
        assert_eq!(select(&below, None), Tier::Big256);
        assert_eq!(select(&Real::zero(), None), Tier::Big256);
    }
}
