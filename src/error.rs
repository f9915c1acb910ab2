// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The errors a caller can recover from.  Anything else (a non-finite
//! coordinate reaching a tier, a division by zero inside the kernel)
//! is a bug and panics; a worker's panic is resumed on the thread that
//! next waits on or cancels the cycle.

use failure::Fail;
use std::io;

/// Everything the engine can reject.
#[derive(Debug, Fail)]
pub enum RenderError {
    /// The output surface must be non-empty and small enough to address.
    #[fail(display = "invalid output dimensions {}x{}", width, height)]
    InvalidDimensions {
        /// Requested width in pixels.
        width: usize,
        /// Requested height in pixels.
        height: usize,
    },

    /// The escape-time loop needs at least one iteration.
    #[fail(display = "iteration limit must be at least 1")]
    InvalidLimit,

    /// A pool with no workers would never drain.
    #[fail(display = "the worker pool needs at least one thread")]
    NoWorkers,

    /// The view lies where the hardware tiers cannot follow it, or has
    /// no area.
    #[fail(
        display = "view at ({:e}, {:e}) with screen size {:e} is outside the renderable range",
        center_x, center_y, screen_size
    )]
    UnrenderableView {
        /// Real part of the center, to the nearest double.
        center_x: f64,
        /// Imaginary part of the center, to the nearest double.
        center_y: f64,
        /// Screen height, to the nearest double.
        screen_size: f64,
    },

    /// A pixel copy asked for bytes past the end of the buffer.
    #[fail(
        display = "byte range {}..{} is outside the {} byte pixel buffer",
        start, end, len
    )]
    OutOfRange {
        /// First requested byte.
        start: usize,
        /// One past the last requested byte.
        end: usize,
        /// Size of the pixel buffer.
        len: usize,
    },

    /// The name does not match any precision tier.
    #[fail(display = "unknown precision tier: {}", _0)]
    UnknownTier(String),

    /// The text is not a decimal number.
    #[fail(display = "could not parse number: {}", _0)]
    ParseNumber(String),

    /// The operating system refused to start a worker thread.
    #[fail(display = "could not start render worker: {}", _0)]
    Spawn(#[cause] io::Error),
}
