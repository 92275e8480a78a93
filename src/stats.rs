//! Allocation statistics counters.
//!
//! All counters use `Relaxed` ordering — they are observational only and not
//! used as synchronization primitives. The arena and manager mutexes provide
//! the ordering guarantees for correctness; these counters are purely for
//! monitoring.
//!
//! Counter semantics are user-level: every allocation the facade satisfies
//! (including a small-cache bin hit) counts one allocation call and adds the
//! block's full footprint — header, payload and, for arena blocks, footer and
//! padding — to the current-used gauge, and every valid free reverses both.
//! Invalid frees touch nothing. A balanced workload therefore ends with
//! `total_alloc_calls == total_free_calls` and `current_used_bytes == 0`.
//!
//! Obtain a [`StatsSnapshot`] with `Stats::snapshot`. Individual counter
//! loads are each atomic but the snapshot as a whole is not globally
//! consistent — concurrent operations may race between loads.

use core::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Stats {
    /// Allocation calls satisfied (small-cache hits included).
    total_alloc_calls: AtomicU64,
    /// Valid free calls processed.
    total_free_calls: AtomicU64,
    /// Bytes currently consumed, metadata included.
    current_used_bytes: AtomicU64,
    /// High-water mark of `current_used_bytes`.
    peak_used_bytes: AtomicU64,
}

impl Stats {
    pub(crate) const fn new() -> Self {
        Self {
            total_alloc_calls: AtomicU64::new(0),
            total_free_calls: AtomicU64::new(0),
            current_used_bytes: AtomicU64::new(0),
            peak_used_bytes: AtomicU64::new(0),
        }
    }

    /// Count one satisfied allocation of `bytes` total footprint.
    #[inline]
    pub(crate) fn record_alloc(&self, bytes: usize) {
        self.total_alloc_calls.fetch_add(1, Ordering::Relaxed);
        let now = self
            .current_used_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed)
            + bytes as u64;
        self.update_peak(now);
    }

    /// Count one valid free of `bytes` total footprint.
    #[inline]
    pub(crate) fn record_free(&self, bytes: usize) {
        self.total_free_calls.fetch_add(1, Ordering::Relaxed);
        self.current_used_bytes
            .fetch_sub(bytes as u64, Ordering::Relaxed);
    }

    /// Raise the peak gauge to `observed` if it is a new maximum.
    ///
    /// Compare-and-swap retry loop: a concurrent update may beat us to a
    /// higher value, in which case there is nothing left to do. The peak is
    /// monotonic nondecreasing and never below any value the current-used
    /// gauge has held.
    #[inline]
    fn update_peak(&self, observed: u64) {
        let mut peak = self.peak_used_bytes.load(Ordering::Relaxed);
        while observed > peak {
            match self.peak_used_bytes.compare_exchange_weak(
                peak,
                observed,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => peak = current,
            }
        }
    }

    /// Load all counters with `Relaxed` ordering and return a [`StatsSnapshot`].
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_alloc_calls: self.total_alloc_calls.load(Ordering::Relaxed),
            total_free_calls: self.total_free_calls.load(Ordering::Relaxed),
            current_used_bytes: self.current_used_bytes.load(Ordering::Relaxed),
            peak_used_bytes: self.peak_used_bytes.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of the allocator's statistics counters.
///
/// Fields are plain `u64` values loaded from the atomic counters. For
/// monitoring purposes this is always sufficient.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatsSnapshot {
    /// Allocation calls satisfied.
    pub total_alloc_calls: u64,
    /// Valid free calls processed.
    pub total_free_calls: u64,
    /// Bytes currently consumed, metadata included.
    pub current_used_bytes: u64,
    /// High-water mark of `current_used_bytes`.
    pub peak_used_bytes: u64,
}
