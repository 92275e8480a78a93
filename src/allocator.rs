//! Top-level allocator facade and per-thread dispatcher.
//!
//! `TaMalloc` routes every request by size: at most
//! [`MAX_SMALL_SIZE`](crate::MAX_SMALL_SIZE) bytes goes to the calling
//! thread's small-object cache, anything larger to the thread's arena. The
//! first touch from a thread binds it lazily — the manager creates a fresh
//! arena and the thread gets an empty small cache.
//!
//! Frees are classified by the marker word immediately preceding the user
//! pointer: [`ARENA_MAGIC`](crate::ARENA_MAGIC) means the block header
//! records its owning arena and the free is routed there (whichever thread
//! issues it); any other value is handled as a small block by the calling
//! thread's cache, which validates the tag and drops unknowns silently.

use crate::arena::{self, Arena};
use crate::config::AllocatorConfig;
use crate::manager::ArenaManager;
use crate::small_cache::SmallCache;
use crate::stats::{Stats, StatsSnapshot};
use crate::{ARENA_MAGIC, MAX_SCALAR_ALIGN, MAX_SMALL_SIZE};
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique ids so independent allocator instances never share
/// thread-local bindings.
static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(0);

/// What a thread holds once it has touched an allocator: a handle on its
/// arena and its own small cache.
struct ThreadBinding {
    arena: Arc<Arena>,
    cache: SmallCache,
}

thread_local! {
    /// Bindings of this thread, keyed by allocator id. Dropped at thread
    /// exit, which releases the cached small chunks and the thread's claim
    /// on its arenas.
    static BINDINGS: RefCell<HashMap<u64, ThreadBinding>> = RefCell::new(HashMap::new());
}

struct AllocatorShared {
    id: u64,
    arena_size: usize,
    stats: Stats,
    manager: ArenaManager,
}

impl Drop for AllocatorShared {
    fn drop(&mut self) {
        // best effort: release the dropping thread's own binding. Bindings
        // on other threads drop at those threads' exit.
        let _ = BINDINGS.try_with(|bindings| {
            bindings.borrow_mut().remove(&self.id);
        });
        // ArenaManager::drop joins the reclaimer and drops the arenas
    }
}

/// Per-thread arena allocator.
///
/// Cloning yields another handle on the same allocator; the reclaimer is
/// joined and the arenas released when the last handle drops.
#[derive(Clone)]
pub struct TaMalloc {
    shared: Arc<AllocatorShared>,
}

impl TaMalloc {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            shared: Arc::new(AllocatorShared {
                id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
                arena_size: config.arena_size,
                stats: Stats::new(),
                manager: ArenaManager::new(config.reclamation, config.reclaim_interval),
            }),
        }
    }

    /// Allocate at least `size` bytes aligned to the platform's maximum
    /// scalar alignment. A zero `size` is promoted to one so every
    /// allocation has a distinct address. Returns null when the thread's
    /// arena is exhausted or the platform refuses memory.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        let size = size.max(1);
        let shared = &*self.shared;
        self.with_binding(|binding| {
            if size <= MAX_SMALL_SIZE {
                binding.cache.allocate_small(size, &shared.stats)
            } else {
                binding.arena.allocate(size, MAX_SCALAR_ALIGN, &shared.stats)
            }
        })
        .unwrap_or(ptr::null_mut())
    }

    /// Return a block. Null is a no-op; pointers this allocator never
    /// handed out, or handed out and already reclaimed, are dropped
    /// silently.
    ///
    /// # Safety
    /// `ptr` must be null or a value previously returned by [`allocate`]
    /// on this allocator that has not been freed since.
    ///
    /// [`allocate`]: TaMalloc::allocate
    pub unsafe fn free(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let shared = &*self.shared;
        let marker = unsafe { (ptr.sub(4) as *const u32).read() };
        if marker == ARENA_MAGIC {
            let owner = unsafe { arena::block_owner(ptr) };
            if owner.is_null() {
                return;
            }
            unsafe { (*owner).deallocate(ptr, &shared.stats) };
        } else {
            self.with_binding(|binding| unsafe { binding.cache.free_small(ptr, &shared.stats) });
        }
    }

    /// A point-in-time snapshot of the four statistics counters.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of arenas the manager currently holds.
    pub fn arena_count(&self) -> usize {
        self.shared.manager.arena_count()
    }

    /// Run `f` against this thread's binding, creating the binding (a new
    /// arena plus an empty small cache) on first touch. `None` when the
    /// thread-local slot is already gone (thread teardown) or the arena
    /// cannot be created.
    fn with_binding<R>(&self, f: impl FnOnce(&mut ThreadBinding) -> R) -> Option<R> {
        let shared = &*self.shared;
        BINDINGS
            .try_with(|bindings| {
                let mut bindings = bindings.borrow_mut();
                let binding = match bindings.entry(shared.id) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let arena = shared.manager.create_arena(shared.arena_size)?;
                        entry.insert(ThreadBinding {
                            arena,
                            cache: SmallCache::new(),
                        })
                    }
                };
                Some(f(binding))
            })
            .ok()
            .flatten()
    }
}
