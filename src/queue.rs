// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The job queue the render workers pull from.
//!
//! Two counting semaphores carry the whole protocol.  Publishing `n`
//! jobs releases `n` permits on `available`; a worker that acquires
//! one takes the next job index from a shared cursor.  Every job ends
//! with exactly one release on `completed`, whether a worker ran it or
//! a drain stole its permit before anyone could, so waiting for a
//! cycle is just acquiring `completed` once per published job.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam::channel::{unbounded, Receiver, Sender};

/// A counting semaphore.  Each permit is a unit message on an
/// unbounded channel.
pub struct Semaphore {
    permits: Sender<()>,
    waiting: Receiver<()>,
}

impl Default for Semaphore {
    fn default() -> Self {
        let (permits, waiting) = unbounded();
        Semaphore { permits, waiting }
    }
}

impl Semaphore {
    /// Add `count` permits.
    pub fn release(&self, count: usize) {
        for _ in 0..count {
            // The receiver lives as long as self, so this cannot fail.
            let _ = self.permits.send(());
        }
    }

    /// Block until a permit is available and take it.
    pub fn acquire(&self) {
        let _ = self.waiting.recv();
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.waiting.try_recv().is_ok()
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.waiting.len()
    }
}

/// Job indices for one render cycle at a time.
#[derive(Default)]
pub struct JobQueue {
    available: Semaphore,
    completed: Semaphore,
    cursor: AtomicUsize,
    published: AtomicUsize,
    finished: AtomicUsize,
    shutdown: AtomicBool,
}

impl JobQueue {
    /// An empty queue.
    pub fn new() -> Self {
        JobQueue::default()
    }

    /// Make jobs `0..jobs` available.  The previous batch must have
    /// been waited for.
    pub fn publish(&self, jobs: usize) {
        self.cursor.store(0, Ordering::SeqCst);
        self.finished.store(0, Ordering::SeqCst);
        self.published.store(jobs, Ordering::SeqCst);
        self.available.release(jobs);
    }

    /// Block for the next job.  `None` means the queue is shutting
    /// down and the caller should exit.
    pub fn take(&self) -> Option<usize> {
        self.available.acquire();
        if self.shutdown.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.cursor.fetch_add(1, Ordering::SeqCst))
    }

    /// Report one job done.
    pub fn complete(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.completed.release(1);
    }

    /// Cancel every job no worker has claimed yet, then wait for the
    /// claimed ones to finish.  Returns how many jobs were cancelled.
    pub fn drain(&self) -> usize {
        let mut stolen = 0;
        while self.available.try_acquire() {
            self.complete();
            stolen += 1;
        }
        self.wait();
        stolen
    }

    /// Block until every published job has completed, then forget
    /// the batch.
    pub fn wait(&self) {
        let published = self.published.load(Ordering::SeqCst);
        for _ in 0..published {
            self.completed.acquire();
        }
        self.published.store(0, Ordering::SeqCst);
        self.finished.store(0, Ordering::SeqCst);
    }

    /// Jobs published but not yet completed.
    pub fn remaining(&self) -> usize {
        self.published
            .load(Ordering::SeqCst)
            .saturating_sub(self.finished.load(Ordering::SeqCst))
    }

    /// Size of the current batch; zero once it has been waited for.
    pub fn published(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    /// Wake `workers` blocked takers and tell them to exit.  Only
    /// call with no batch outstanding.
    pub fn shutdown(&self, workers: usize) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.available.release(workers);
    }
}
