#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Adaptive-precision Mandelbrot renderer
//!
//! The Mandelbrot set takes a point on the complex plane and
//! repeatedly squares it, adding the original point back each time,
//! measuring how quickly the result runs away to infinity.  That
//! "velocity" colours the image; points that never run away are the
//! black heart of the set.
//!
//! Zooming in is the interesting part, and the hard one.  At the
//! overview a single-precision float resolves neighbouring pixels
//! comfortably; a few dozen zoom steps later two adjacent pixels have
//! the same `f32` coordinate and the picture turns to blocks.  This
//! crate keeps a ladder of arithmetic tiers, from hardware floats
//! through compensated float pairs to wide fixed-point integers, and
//! for every render picks the cheapest one that can still tell one
//! pixel from the next.
//!
//! Rendering happens on a fixed pool of worker threads pulling rows
//! from a cancellable job queue.  Rows go out in bit-reversed order,
//! so a slow render fills in across the whole screen at once instead
//! of crawling down from the top.

extern crate failure;
#[macro_use]
extern crate log;
extern crate crossbeam;
extern crate itertools;
extern crate num;
extern crate num_cpus;

pub mod error;
pub mod escape;
pub mod numeric;
pub mod palette;
pub mod precision;
pub mod queue;
pub mod render;
pub mod schedule;
pub mod viewport;

pub use error::RenderError;
pub use numeric::{BigFixed, Compensated, Real, Scalar, Tier, TierVisitor};
pub use render::{DiscardRows, Engine, EngineConfig, RowComplete, RowSink};
pub use viewport::{Bounds, Viewport};
