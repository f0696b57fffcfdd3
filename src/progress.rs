// This file is part of factorkit.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Throttled progress reporting for long row loops.

use std::sync::RwLock;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use log::info;

const UPDATE_SECS: f64 = 0.2;

#[derive(Clone, Copy)]
struct UpdateState {
    count: usize,
    time: f64,
    rate: f64,
}

/// Progress reporter for row-at-a-time loops.
///
/// Applies internal throttling so that ticking every row does not flood the
/// log; reports land at most a few times per second regardless of row rate.
/// Safe to tick from parallel workers.
pub(crate) struct ProgressHandle {
    label: String,
    total: usize,
    batch_start: usize,
    batch_len: usize,
    start: Instant,
    count: AtomicUsize,
    last_update: RwLock<Option<UpdateState>>,
}

impl ProgressHandle {
    /// Create a handle covering an entire pass of `total` steps.
    pub fn new(label: String, total: usize) -> Self {
        Self::for_batch(label, total, 0, total)
    }

    /// Create a handle for one batch of a longer pass.
    ///
    /// `start` and `len` locate the batch within the pass, so reports can
    /// show both overall and batch completion.
    pub fn for_batch(label: String, total: usize, start: usize, len: usize) -> Self {
        ProgressHandle {
            label,
            total,
            batch_start: start,
            batch_len: len,
            start: Instant::now(),
            count: AtomicUsize::new(0),
            last_update: RwLock::new(None),
        }
    }

    pub fn tick(&self) {
        self.advance(1);
    }

    pub fn advance(&self, n: usize) {
        let count = self.count.fetch_add(n, Ordering::Relaxed) + n;

        let last_update = {
            let lock = self.last_update.read().expect("poisoned lock");
            *lock
        };

        let thresh = if let Some(lu) = last_update {
            // bail early if the rate estimate says we don't need to update
            let n = (count - lu.count) as f64;
            if n / lu.rate < UPDATE_SECS * 0.95 {
                return;
            }

            lu.time
        } else {
            0.0
        };

        let time = self.start.elapsed().as_secs_f64();
        // bail if we haven't been running long enough
        if time < thresh + UPDATE_SECS {
            return;
        }

        // we're ready to set the time! if someone else is writing, do nothing, they've handled it
        if let Ok(mut lock) = self.last_update.try_write() {
            *lock = Some(UpdateState {
                count,
                time,
                rate: count as f64 / time,
            });
            self.refresh(count);
        }
    }

    fn refresh(&self, count: usize) {
        let overall = self.batch_start + count;
        let pct = overall as f64 * 100.0 / self.total.max(1) as f64;
        if self.batch_len < self.total {
            let batch_pct = count as f64 * 100.0 / self.batch_len.max(1) as f64;
            info!(
                "{:7.3}% of {} ({:.3}% of batch)",
                pct, self.label, batch_pct
            );
        } else {
            info!("{:7.3}% of {}", pct, self.label);
        }
    }
}
