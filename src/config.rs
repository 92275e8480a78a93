//! Allocator construction parameters.

use std::time::Duration;

/// Default size of each per-thread arena region (8 MiB).
pub const DEFAULT_ARENA_SIZE: usize = 8 * 1024 * 1024;

/// Default interval between reclaimer sweeps.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for a [`TaMalloc`](crate::TaMalloc) instance.
///
/// ```ignore
/// let config = AllocatorConfig {
///     arena_size: 64 * 1024 * 1024,
///     reclamation: true,
///     ..AllocatorConfig::default()
/// };
/// ```
#[derive(Clone, Copy, Debug)]
pub struct AllocatorConfig {
    /// Size of the region backing each per-thread arena. Rounded up to a
    /// whole number of pages at arena creation.
    pub arena_size: usize,
    /// Whether the background reclaimer runs. When disabled, arenas are
    /// only released at shutdown.
    pub reclamation: bool,
    /// How long the reclaimer sleeps between sweeps. Ignored when
    /// `reclamation` is false.
    pub reclaim_interval: Duration,
}

impl AllocatorConfig {
    pub fn new(arena_size: usize, reclamation: bool) -> Self {
        Self {
            arena_size,
            reclamation,
            reclaim_interval: DEFAULT_RECLAIM_INTERVAL,
        }
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_SIZE, false)
    }
}
