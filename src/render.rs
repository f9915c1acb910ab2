// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The render engine: a fixed pool of worker threads, the pixel
//! buffer they share, and the render-cycle lifecycle that drives them.
//!
//! A cycle is one pass over a frozen viewport.  `start_render` takes a
//! snapshot of everything a worker needs (bounds, tier, schedule, the
//! buffer) and publishes one job per virtual row; `cancel_render`
//! drains whatever is left.  Anything that would change what a worker
//! sees cancels first, so a running cycle never observes a mutation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::Sender;

use crate::error::RenderError;
use crate::escape::{iterate, LIMIT};
use crate::numeric::{Scalar, Tier, TierVisitor};
use crate::palette::Palette;
use crate::precision::select;
use crate::queue::JobQueue;
use crate::schedule::RowSchedule;
use crate::viewport::{Bounds, Viewport};

/// Widest or tallest surface the engine will allocate.
pub const MAX_DIMENSION: usize = 32_768;

/// Bytes per pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Worker pool and kernel settings, fixed for the engine's lifetime.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Worker threads.
    pub threads: usize,
    /// Iteration limit; points still bounded after this are interior.
    pub limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            threads: num_cpus::get(),
            limit: LIMIT,
        }
    }
}

/// One finished job.  `row` may be a padding row past the bottom of
/// the screen; `cycle` tells stale notifications from current ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowComplete {
    /// The render cycle the job belonged to.
    pub cycle: u64,
    /// The row the job was mapped to.
    pub row: usize,
}

/// Where workers report finished rows.  Called from worker threads,
/// in no particular row order.
pub trait RowSink: Send + Sync {
    /// A job has finished.
    fn row_complete(&self, event: RowComplete);
}

impl RowSink for Sender<RowComplete> {
    fn row_complete(&self, event: RowComplete) {
        // A consumer that hung up has stopped caring.
        let _ = self.send(event);
    }
}

/// A sink for callers that only poll `remaining_jobs`.
pub struct DiscardRows;

impl RowSink for DiscardRows {
    fn row_complete(&self, _event: RowComplete) {}
}

/// Packed `0x00RRGGBB` pixels, row-major.  Each row is written by one
/// worker at a time, so relaxed stores are enough; the job queue's
/// completion handshake publishes them to readers.
pub struct PixelBuffer {
    width: usize,
    rows: usize,
    pixels: Box<[AtomicU32]>,
}

impl PixelBuffer {
    /// A black buffer.
    pub fn new(width: usize, rows: usize) -> Self {
        PixelBuffer {
            width,
            rows,
            pixels: (0..width * rows).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Bytes per row.
    pub fn pitch(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }

    /// Total size in bytes.
    pub fn len_bytes(&self) -> usize {
        self.pixels.len() * BYTES_PER_PIXEL
    }

    /// The packed colour at a pixel, if the pixel exists.
    pub fn get(&self, column: usize, row: usize) -> Option<u32> {
        if column >= self.width || row >= self.rows {
            return None;
        }
        Some(self.pixels[row * self.width + column].load(Ordering::Relaxed))
    }

    fn write_row(&self, row: usize, colors: &[u32]) {
        let start = row * self.width;
        for (slot, &color) in self.pixels[start..start + self.width].iter().zip(colors) {
            slot.store(color, Ordering::Relaxed);
        }
    }

    /// Copy `dest.len()` bytes starting at byte `offset`.  Pixels are
    /// little-endian, so each one reads B, G, R, A.
    pub fn copy_bytes(&self, dest: &mut [u8], offset: usize) -> Result<(), RenderError> {
        let len = self.len_bytes();
        let end = offset.checked_add(dest.len()).filter(|&end| end <= len);
        let end = match end {
            Some(end) => end,
            None => {
                return Err(RenderError::OutOfRange {
                    start: offset,
                    end: offset.saturating_add(dest.len()),
                    len,
                })
            }
        };
        for (at, byte) in (offset..end).zip(dest.iter_mut()) {
            let word = self.pixels[at / BYTES_PER_PIXEL].load(Ordering::Relaxed);
            *byte = word.to_le_bytes()[at % BYTES_PER_PIXEL];
        }
        Ok(())
    }

    /// The whole buffer as bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| pixel.load(Ordering::Relaxed).to_le_bytes().to_vec())
            .collect()
    }
}

// Everything a worker needs for one cycle, frozen at start_render.
struct Cycle {
    id: u64,
    schedule: RowSchedule,
    bounds: Bounds,
    tier: Tier,
    limit: u32,
    pixels: Arc<PixelBuffer>,
}

struct RenderRow<'a> {
    bounds: &'a Bounds,
    row: usize,
    limit: u32,
    palette: &'a Palette,
}

impl<'a> TierVisitor for RenderRow<'a> {
    type Output = Vec<u32>;

    fn visit<T: Scalar>(self) -> Vec<u32> {
        let mapper = self.bounds.row_in::<T>(self.row);
        let (limit, palette) = (self.limit, self.palette);
        (0..self.bounds.width)
            .map(|column| palette.colorize(&iterate(&mapper.x(column), &mapper.y, limit), limit))
            .collect()
    }
}

impl Cycle {
    fn run(&self, job: usize, palette: &Palette, sink: &dyn RowSink) {
        let row = self.schedule.map(job);
        if self.schedule.is_visible(row) {
            let colors = self.tier.visit(RenderRow {
                bounds: &self.bounds,
                row,
                limit: self.limit,
                palette,
            });
            self.pixels.write_row(row, &colors);
        }
        trace!("cycle {} job {} -> row {}", self.id, job, row);
        sink.row_complete(RowComplete { cycle: self.id, row });
    }
}

type Panic = Box<dyn Any + Send + 'static>;

struct Shared {
    queue: JobQueue,
    cycle: Mutex<Option<Arc<Cycle>>>,
    sink: Box<dyn RowSink>,
    palette: Palette,
    // First panic out of a job, held until the engine next waits.
    panic: Mutex<Option<Panic>>,
}

impl Shared {
    fn current(&self) -> Option<Arc<Cycle>> {
        self.cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, cycle: Cycle) {
        *self.cycle.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(cycle));
    }

    fn panicked(&self) -> bool {
        self.panic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn record_panic(&self, payload: Panic) {
        let mut slot = self.panic.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(payload);
        }
    }

    fn take_panic(&self) -> Option<Panic> {
        self.panic.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

// Every job taken is completed, even one that panics, or the queue
// never drains.  After a panic the rest of the cycle is skipped.
fn worker(shared: Arc<Shared>) {
    while let Some(job) = shared.queue.take() {
        if !shared.panicked() {
            if let Some(cycle) = shared.current() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    cycle.run(job, &shared.palette, shared.sink.as_ref())
                }));
                if let Err(payload) = outcome {
                    error!("cycle {} job {} panicked", cycle.id, job);
                    shared.record_panic(payload);
                }
            }
        }
        shared.queue.complete();
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<(), RenderError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// The render-cycle coordinator.  Owns the worker pool, the pixel
/// buffer, the viewport and the precision choice.
///
/// Every `&mut self` method that changes what a cycle would render
/// cancels the active cycle first; a running cycle's snapshot is never
/// touched.
pub struct Engine {
    config: EngineConfig,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    viewport: Viewport,
    forced: Option<Tier>,
    tier: Tier,
    schedule: RowSchedule,
    pixels: Arc<PixelBuffer>,
    width: usize,
    cycle: u64,
    started: Option<Instant>,
}

impl Engine {
    /// Start a worker pool rendering onto a `width` by `height`
    /// surface, reporting finished rows to `sink`.
    pub fn new<S>(
        config: EngineConfig,
        width: usize,
        height: usize,
        sink: S,
    ) -> Result<Engine, RenderError>
    where
        S: RowSink + 'static,
    {
        if config.limit == 0 {
            return Err(RenderError::InvalidLimit);
        }
        if config.threads == 0 {
            return Err(RenderError::NoWorkers);
        }
        check_dimensions(width, height)?;

        let viewport = Viewport::default();
        let tier = select(&viewport.bounds(width, height).pixel_size, None);
        let threads = config.threads;
        let mut engine = Engine {
            config,
            shared: Arc::new(Shared {
                queue: JobQueue::new(),
                cycle: Mutex::new(None),
                sink: Box::new(sink),
                palette: Palette::default(),
                panic: Mutex::new(None),
            }),
            workers: Vec::with_capacity(threads),
            viewport,
            forced: None,
            tier,
            schedule: RowSchedule::new(height),
            pixels: Arc::new(PixelBuffer::new(width, height)),
            width,
            cycle: 0,
            started: None,
        };

        // On failure, dropping the engine stops whatever did start.
        for index in 0..threads {
            let shared = engine.shared.clone();
            let handle = thread::Builder::new()
                .name(format!("render-{}", index))
                .spawn(move || worker(shared))
                .map_err(RenderError::Spawn)?;
            engine.workers.push(handle);
        }
        info!("started {} render workers", threads);
        Ok(engine)
    }

    /// Resize the output.  Rejects empty or oversized surfaces and
    /// keeps the previous buffer when it does.
    pub fn reconfigure(&mut self, width: usize, height: usize) -> Result<(), RenderError> {
        check_dimensions(width, height)?;
        self.cancel_render();
        self.width = width;
        self.schedule = RowSchedule::new(height);
        self.pixels = Arc::new(PixelBuffer::new(width, height));
        debug!("reconfigured to {}x{}", width, height);
        Ok(())
    }

    /// Begin a new cycle over the current viewport, cancelling any
    /// cycle still running.
    pub fn start_render(&mut self) {
        self.cancel_render();
        let bounds = self.viewport.bounds(self.width, self.schedule.rows());
        self.tier = select(&bounds.pixel_size, self.forced);
        self.cycle += 1;
        debug!(
            "cycle {}: {}x{} in {}, pixel size {:.3e}",
            self.cycle,
            self.width,
            self.schedule.rows(),
            self.tier,
            bounds.pixel_size.to_f64()
        );
        self.shared.install(Cycle {
            id: self.cycle,
            schedule: self.schedule,
            bounds,
            tier: self.tier,
            limit: self.config.limit,
            pixels: self.pixels.clone(),
        });
        self.started = Some(Instant::now());
        self.shared.queue.publish(self.schedule.virtual_rows());
    }

    /// Stop the active cycle.  Returns once no worker is inside one
    /// of its jobs.  Does nothing when idle.
    ///
    /// If a job panicked, the panic continues here.
    pub fn cancel_render(&mut self) {
        if let Some(payload) = self.halt() {
            panic::resume_unwind(payload);
        }
    }

    fn halt(&mut self) -> Option<Panic> {
        if self.shared.queue.published() == 0 {
            return None;
        }
        let cancelled = self.shared.queue.drain();
        if cancelled > 0 {
            debug!("cycle {} cancelled with {} jobs unclaimed", self.cycle, cancelled);
        }
        self.started = None;
        self.shared.take_panic()
    }

    /// Block until the active cycle finishes on its own.
    ///
    /// If a job panicked, the panic continues here.
    pub fn wait_render(&mut self) {
        if self.shared.queue.published() == 0 {
            return;
        }
        self.shared.queue.wait();
        if let Some(payload) = self.shared.take_panic() {
            self.started = None;
            panic::resume_unwind(payload);
        }
        if let Some(started) = self.started.take() {
            info!(
                "render complete in {} ms ({})",
                started.elapsed().as_millis(),
                self.tier
            );
        }
    }

    /// Jobs one cycle publishes: the row count padded to a power of
    /// two.  The sink hears exactly this many events per finished cycle.
    pub fn jobs_per_cycle(&self) -> usize {
        self.schedule.virtual_rows()
    }

    /// Jobs of the active cycle not yet finished.
    pub fn remaining_jobs(&self) -> usize {
        self.shared.queue.remaining()
    }

    /// True while jobs are outstanding.
    pub fn is_rendering(&self) -> bool {
        self.remaining_jobs() > 0
    }

    /// Copy `dest.len()` bytes of the pixel buffer starting at `offset`.
    pub fn copy_pixels(&self, dest: &mut [u8], offset: usize) -> Result<(), RenderError> {
        self.pixels.copy_bytes(dest, offset)
    }

    /// The whole pixel buffer as bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels.to_bytes()
    }

    /// The pixel buffer itself.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Name of the tier of the latest cycle.
    pub fn current_precision_tier_name(&self) -> &'static str {
        self.tier.name()
    }

    /// Tier of the latest cycle.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Move the view; cancels the active cycle.  A view no tier can
    /// represent is refused and the current one kept.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        viewport.check()?;
        self.cancel_render();
        self.viewport = viewport;
        Ok(())
    }

    /// Force a tier, or `None` for automatic selection; cancels the
    /// active cycle.
    pub fn set_precision(&mut self, forced: Option<Tier>) {
        self.cancel_render();
        self.forced = forced;
    }

    /// Output width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Output height.
    pub fn height(&self) -> usize {
        self.schedule.rows()
    }

    /// Number of the latest cycle; zero before the first.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.halt().is_some() {
            error!("dropping the engine with an unreported worker panic");
        }
        self.shared.queue.shutdown(self.workers.len());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("a render worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Real;
    use crossbeam::channel::unbounded;

    fn config(threads: usize, limit: u32) -> EngineConfig {
        EngineConfig { threads, limit }
    }

    #[test]
    fn a_full_overview_cycle() {
        let (sender, receiver) = unbounded();
        let mut engine = Engine::new(config(4, 256), 1024, 768, sender).unwrap();
        engine.start_render();
        assert!(engine.tier() == Tier::F32 || engine.tier() == Tier::F64);
        assert_eq!(engine.current_precision_tier_name(), "float");
        engine.wait_render();
        assert_eq!(engine.remaining_jobs(), 0);
        assert!(!engine.is_rendering());

        let events: Vec<RowComplete> = receiver.try_iter().collect();
        assert_eq!(events.len(), 1024);
        assert!(events.iter().all(|event| event.cycle == 1));
        let mut rows: Vec<usize> = events
            .iter()
            .map(|event| event.row)
            .filter(|&row| row < 768)
            .collect();
        rows.sort();
        assert_eq!(rows, (0..768).collect::<Vec<_>>());

        // Column 512 of the middle row sits at -0.6, inside the cardioid.
        assert_eq!(engine.pixels().get(512, 384), Some(0));
        assert_ne!(engine.pixels().get(0, 0), Some(0));
    }

    #[test]
    fn cancelling_leaves_nothing_behind() {
        let (sender, receiver) = unbounded();
        let mut engine = Engine::new(config(1, LIMIT), 64, 48, sender).unwrap();
        engine.set_precision(Some(Tier::Big256));
        engine.start_render();
        engine.cancel_render();
        assert_eq!(engine.remaining_jobs(), 0);
        assert!(!engine.is_rendering());
        let first = receiver.try_iter().count();
        assert!(first <= 64);

        engine.set_precision(Some(Tier::F64));
        engine.start_render();
        engine.wait_render();
        let events: Vec<RowComplete> = receiver.try_iter().collect();
        assert_eq!(events.len(), 64);
        assert!(events.iter().all(|event| event.cycle == 2));
        let mut rows: Vec<usize> = events.iter().map(|event| event.row).collect();
        rows.sort();
        assert_eq!(rows, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn cancelling_when_idle_does_nothing() {
        let mut engine = Engine::new(config(2, 64), 8, 8, DiscardRows).unwrap();
        engine.cancel_render();
        engine.wait_render();
        assert_eq!(engine.cycle(), 0);
        assert_eq!(engine.remaining_jobs(), 0);
    }

    #[test]
    fn restarting_supersedes_the_running_cycle() {
        let (sender, receiver) = unbounded();
        let mut engine = Engine::new(config(2, 512), 32, 32, sender).unwrap();
        engine.start_render();
        engine.start_render();
        engine.wait_render();
        let latest = receiver
            .try_iter()
            .filter(|event| event.cycle == 2)
            .count();
        assert_eq!(latest, 32);
    }

    #[test]
    fn bad_configuration_is_rejected() {
        assert!(matches!(
            Engine::new(config(1, 0), 8, 8, DiscardRows),
            Err(RenderError::InvalidLimit)
        ));
        assert!(matches!(
            Engine::new(config(0, 64), 8, 8, DiscardRows),
            Err(RenderError::NoWorkers)
        ));
        assert!(matches!(
            Engine::new(config(1, 64), 0, 8, DiscardRows),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn a_failed_reconfigure_keeps_the_old_buffer() {
        let mut engine = Engine::new(config(1, 64), 32, 16, DiscardRows).unwrap();
        assert!(engine.reconfigure(0, 10).is_err());
        assert!(engine.reconfigure(MAX_DIMENSION + 1, 10).is_err());
        assert_eq!((engine.width(), engine.height()), (32, 16));
        assert_eq!(engine.snapshot().len(), 32 * 16 * 4);

        engine.reconfigure(20, 10).unwrap();
        assert_eq!(engine.pixels().pitch(), 80);
        engine.start_render();
        engine.wait_render();
        assert_eq!(engine.snapshot().len(), 20 * 10 * 4);
    }

    #[test]
    fn deep_views_pick_finer_tiers() {
        let mut engine = Engine::new(config(2, 64), 16, 16, DiscardRows).unwrap();
        let mut view = Viewport::default();
        view.screen_size = Real::from_f64(1e-20);
        engine.set_viewport(view).unwrap();
        engine.start_render();
        assert_eq!(engine.tier(), Tier::CompensatedF64);
        engine.wait_render();

        engine.set_precision(Some(Tier::F32));
        engine.start_render();
        assert_eq!(engine.tier(), Tier::F32);
        engine.wait_render();
    }

    #[test]
    fn pixel_copies_are_bounds_checked() {
        let mut engine = Engine::new(config(2, 64), 16, 8, DiscardRows).unwrap();
        engine.start_render();
        engine.wait_render();
        let snapshot = engine.snapshot();

        let mut part = vec![0u8; 10];
        engine.copy_pixels(&mut part, 6).unwrap();
        assert_eq!(&part[..], &snapshot[6..16]);

        let mut tail = vec![0u8; 8];
        assert!(engine.copy_pixels(&mut tail, snapshot.len() - 4).is_err());
        assert!(engine.copy_pixels(&mut tail, std::usize::MAX).is_err());
    }

    #[test]
    fn pixels_are_stored_little_endian() {
        let buffer = PixelBuffer::new(2, 1);
        buffer.write_row(0, &[0x0011_2233, 0x00aa_bbcc]);
        assert_eq!(buffer.to_bytes(), vec![0x33, 0x22, 0x11, 0, 0xcc, 0xbb, 0xaa, 0]);
        assert_eq!(buffer.get(1, 0), Some(0x00aa_bbcc));
        assert_eq!(buffer.get(2, 0), None);
        assert_eq!(buffer.get(0, 1), None);
    }

    struct Exploding;

    impl RowSink for Exploding {
        fn row_complete(&self, _event: RowComplete) {
            panic!("sink exploded");
        }
    }

    #[test]
    #[should_panic(expected = "sink exploded")]
    fn a_worker_panic_reaches_the_waiting_caller() {
        let mut engine = Engine::new(config(1, 16), 4, 4, Exploding).unwrap();
        engine.start_render();
        engine.wait_render();
    }

    // Fails every job of the first cycle, then behaves.
    struct FirstCycleFails(Sender<RowComplete>);

    impl RowSink for FirstCycleFails {
        fn row_complete(&self, event: RowComplete) {
            if event.cycle == 1 {
                panic!("first cycle");
            }
            self.0.row_complete(event);
        }
    }

    #[test]
    fn the_engine_recovers_after_a_worker_panic() {
        let (sender, receiver) = unbounded();
        let mut engine = Engine::new(config(2, 16), 8, 8, FirstCycleFails(sender)).unwrap();
        let failed = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.start_render();
            engine.wait_render();
        }));
        assert!(failed.is_err());
        assert_eq!(engine.remaining_jobs(), 0);

        engine.start_render();
        engine.wait_render();
        assert_eq!(receiver.try_iter().count(), 8);
    }

    #[test]
    fn views_no_tier_can_hold_are_refused() {
        let mut engine = Engine::new(config(1, 16), 4, 4, DiscardRows).unwrap();
        let far = Viewport::new("1e400".parse().unwrap(), Real::zero(), Real::from_f64(1e-20));
        assert!(matches!(
            engine.set_viewport(far),
            Err(RenderError::UnrenderableView { .. })
        ));
        engine.start_render();
        engine.wait_render();
        assert_eq!(engine.tier(), Tier::F32);
    }

    #[test]
    fn every_published_job_reports_once() {
        let (sender, receiver) = unbounded();
        let mut engine = Engine::new(config(3, 32), 10, 5, sender).unwrap();
        assert_eq!(engine.jobs_per_cycle(), 8);
        engine.start_render();
        engine.wait_render();
        assert_eq!(receiver.try_iter().count(), engine.jobs_per_cycle());
    }
}
