// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Colour for escaped points.
//!
//! Pixels are packed `0x00RRGGBB` words.  The smooth iteration count
//! picks two neighbouring entries of a 256-colour cyclic palette and
//! blends them by its fractional part.  Interior points are left as
//! zero.

use std::f64::consts::PI;

use num::clamp;

use crate::escape::Escape;
use crate::numeric::Scalar;

/// Entries in the cyclic palette.
pub const PALETTE_SIZE: usize = 256;

/// Colour of points that never escape.
pub const INTERIOR: u32 = 0;

fn rgb(r: u32, g: u32, b: u32) -> u32 {
    (r << 16) | (g << 8) | b
}

/// Hue in degrees, saturation and value in `[0, 1]`.
pub fn hsv_to_rgb(hue: u32, saturation: f64, value: f64) -> u32 {
    let sector = f64::from(hue % 360) / 60.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - ((sector % 2.0) - 1.0).abs());
    let c = (255.999 * chroma) as u32;
    let x = (255.999 * x) as u32;
    match sector as u32 {
        0 => rgb(c, x, 0),
        1 => rgb(x, c, 0),
        2 => rgb(0, c, x),
        3 => rgb(0, x, c),
        4 => rgb(x, 0, c),
        _ => rgb(c, 0, x),
    }
}

/// Mix two packed colours channel by channel; `weight` is the share
/// of `first`.
pub fn blend(first: u32, second: u32, weight: f64) -> u32 {
    let share = clamp((255.0 * weight) as u32, 0, 255);
    let rest = 255 - share;
    (0..4).fold(0, |mixed, channel| {
        let shift = channel * 8;
        let a = (first >> shift) & 0xff;
        let b = (second >> shift) & 0xff;
        mixed | (((a * share + b * rest) / 256) << shift)
    })
}

/// A cyclic colour table.
#[derive(Clone)]
pub struct Palette {
    colors: Vec<u32>,
}

impl Default for Palette {
    /// Hue turns every 64 entries while saturation and value wobble
    /// at different rates, so neighbouring bands stay distinct.
    fn default() -> Self {
        let colors = (0..PALETTE_SIZE)
            .map(|i| {
                let i = i as f64;
                let hue = ((i * 360.0) / 64.0) % 360.0;
                let value = 0.6 + 0.3 * (i / 16.0 * PI).sin();
                let saturation = 0.75 + 0.23 * (i / 8.0 * PI).cos();
                hsv_to_rgb(hue as u32, saturation, value)
            })
            .collect();
        Palette { colors }
    }
}

impl Palette {
    /// The entry at `index`, wrapping around.
    pub fn get(&self, index: usize) -> u32 {
        self.colors[index % PALETTE_SIZE]
    }

    /// Colour for a fractional iteration count.
    pub fn smooth(&self, sum: f64) -> u32 {
        let whole = sum.floor();
        let fraction = sum - whole;
        let index = (whole as i64).rem_euclid(PALETTE_SIZE as i64) as usize;
        blend(self.get(index), self.get(index + 1), 1.0 - fraction)
    }

    /// Colour for a finished orbit.
    pub fn colorize<T: Scalar>(&self, escape: &Escape<T>, limit: u32) -> u32 {
        if escape.is_interior(limit) {
            INTERIOR
        } else {
            self.smooth(escape.smooth_iterations())
        }
    }
}
