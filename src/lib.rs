//! tamalloc: a per-thread arena allocator for ephemeral server workloads.
//!
//! Implements a two-tier design:
//! - Thread-local small-object caches (fast path, no locks) for requests of
//!   up to 256 bytes
//! - One boundary-tagged arena per worker thread (first-fit free list,
//!   splitting on allocation, immediate bidirectional coalescing on free)
//!
//! An arena manager owns every arena and, when enabled, runs a background
//! reclaimer that unmaps arenas whose bound threads have exited and whose
//! regions have drained back to a single free block.
//!
//! # Usage
//!
//! ```ignore
//! let alloc = tamalloc::TaMalloc::new(tamalloc::AllocatorConfig::default());
//! let p = alloc.allocate(128);
//! assert!(!p.is_null());
//! unsafe { alloc.free(p) };
//! println!("{:?}", alloc.stats_snapshot());
//! ```

pub mod allocator;
pub mod arena;
pub mod config;
pub mod manager;
pub mod platform;
pub mod small_cache;
pub mod stats;

/// Largest request served by the thread-local small-object cache.
/// Anything larger goes to the thread's arena.
pub const MAX_SMALL_SIZE: usize = 256;

/// Alignment of every pointer handed out, small or large. Covers the
/// platform's maximum scalar alignment (16 bytes on x86_64 and aarch64).
pub const MAX_SCALAR_ALIGN: usize = 16;

/// Marker word found immediately before the user pointer of every live
/// arena block. The dispatcher routes frees by this word; see
/// [`allocator::TaMalloc::free`].
pub const ARENA_MAGIC: u32 = 0xCAFE_BABE;

// Re-export the public surface at the crate root for convenience
pub use allocator::TaMalloc;
pub use config::AllocatorConfig;
pub use stats::StatsSnapshot;
