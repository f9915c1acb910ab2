// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Viewport, which describes where on the complex plane
//! the user is looking, and Bounds, which pins that view to a pixel
//! grid for the duration of one render cycle and maps points from one
//! plane to the other.

use crate::error::RenderError;
use crate::numeric::{Real, Scalar};

/// Largest center coordinate or screen size a view may have.  The
/// hardware tiers narrow every coordinate through a double, and
/// nothing out here is near the set anyway.
pub const MAX_COORDINATE: f64 = 1.0e6;

/// The part of the complex plane on screen.  `screen_size` is the
/// world-space height of the window; the width follows from the
/// aspect ratio of the output.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Real part of the screen center.
    pub center_x: Real,
    /// Imaginary part of the screen center.
    pub center_y: Real,
    /// World-space height of the screen.
    pub screen_size: Real,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            center_x: Real::from_f64(-0.6),
            center_y: Real::zero(),
            screen_size: Real::from_int(2),
        }
    }
}

impl Viewport {
    /// A view centered on `(x, y)`, `size` units tall.
    pub fn new(center_x: Real, center_y: Real, screen_size: Real) -> Self {
        Viewport {
            center_x,
            center_y,
            screen_size,
        }
    }

    /// Move the center by fractions of the screen height.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.center_x =
            self.center_x.clone() + self.screen_size.clone() * Real::from_f64(dx);
        self.center_y =
            self.center_y.clone() + self.screen_size.clone() * Real::from_f64(dy);
    }

    /// Accept only views every tier can represent: a positive screen
    /// size and no coordinate beyond `MAX_COORDINATE`.
    pub fn check(&self) -> Result<(), RenderError> {
        let (center_x, center_y, screen_size) = (
            self.center_x.to_f64(),
            self.center_y.to_f64(),
            self.screen_size.to_f64(),
        );
        // NaN and the infinities fail the comparison too.
        let near = |value: f64| value.abs() <= MAX_COORDINATE;
        if self.screen_size > Real::zero() && near(center_x) && near(center_y) && near(screen_size) {
            Ok(())
        } else {
            Err(RenderError::UnrenderableView {
                center_x,
                center_y,
                screen_size,
            })
        }
    }

    /// Scale the view by `scale` (below one zooms in) while keeping
    /// the world point under pixel `(x, y)` where it is.  A surface
    /// with no rows has no pixel size and is refused.
    pub fn zoom_at(
        &mut self,
        x: i64,
        y: i64,
        width: usize,
        height: usize,
        scale: f64,
    ) -> Result<(), RenderError> {
        if height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        let rows = Real::from_int(height as i64);
        let offset_x = Real::from_int(x - width as i64 / 2);
        let offset_y = Real::from_int(y - height as i64 / 2);
        let old_pixel = self.screen_size.clone() / rows.clone();
        self.screen_size = self.screen_size.clone() * Real::from_f64(scale);
        let new_pixel = self.screen_size.clone() / rows;
        let shift = old_pixel - new_pixel;
        self.center_x = self.center_x.clone() + offset_x * shift.clone();
        self.center_y = self.center_y.clone() + offset_y * shift;
        Ok(())
    }

    /// Pin the view to a `width` by `rows` pixel grid.  `rows` must be
    /// non-zero; the engine checks its dimensions before asking.
    pub fn bounds(&self, width: usize, rows: usize) -> Bounds {
        let pixel_size = self.screen_size.clone() / Real::from_int(rows as i64);
        let half = Real::from_f64(0.5);
        let min_x = self.center_x.clone()
            - Real::from_int(width as i64) * pixel_size.clone() * half.clone();
        let min_y =
            self.center_y.clone() - Real::from_int(rows as i64) * pixel_size.clone() * half;
        Bounds {
            width,
            rows,
            min_x,
            min_y,
            pixel_size,
        }
    }
}

/// A viewport fixed to a pixel grid.  Immutable for the whole of a
/// render cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub rows: usize,
    /// World x of column zero.
    pub min_x: Real,
    /// World y of row zero.
    pub min_y: Real,
    /// World-space size of one pixel.
    pub pixel_size: Real,
}

impl Bounds {
    /// Given the column and row of a pixel, return the point on the
    /// complex plane at its corner.
    pub fn pixel_to_point(&self, column: usize, row: usize) -> (Real, Real) {
        (
            self.min_x.clone() + Real::from_int(column as i64) * self.pixel_size.clone(),
            self.min_y.clone() + Real::from_int(row as i64) * self.pixel_size.clone(),
        )
    }

    /// The same mapping narrowed into a tier, ready for one row.
    pub fn row_in<T: Scalar>(&self, row: usize) -> RowMapper<T> {
        let scale = T::from_real(&self.pixel_size);
        let y = T::from_real(&self.min_y) + T::from_f64(row as f64) * scale.clone();
        RowMapper {
            min_x: T::from_real(&self.min_x),
            scale,
            y,
        }
    }
}

/// World coordinates of one row's pixels in a particular tier.
pub struct RowMapper<T> {
    min_x: T,
    scale: T,
    /// World y shared by the whole row.
    pub y: T,
}

impl<T: Scalar> RowMapper<T> {
    /// World x of a column.
    pub fn x(&self, column: usize) -> T {
        self.min_x.clone() + T::from_f64(column as f64) * self.scale.clone()
    }
}
