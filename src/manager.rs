//! Arena manager: owns every arena and runs the background reclaimer.
//!
//! Arenas are held as `Arc<Arena>` — one strong reference here, one in each
//! thread currently bound to the arena. The reclaimer only destroys an
//! arena once its region has drained (`fully_idle`) *and* the manager holds
//! the last reference, i.e. every thread that ever bound to it has exited.
//! A silent-but-live thread therefore pins its arena instead of being left
//! with a dangling reference.

use crate::arena::Arena;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

struct ManagerState {
    arenas: Vec<Arc<Arena>>,
    stop: bool,
}

struct ManagerShared {
    state: Mutex<ManagerState>,
    /// Signalled at shutdown so the reclaimer wakes before its interval.
    reclaim_tick: Condvar,
}

pub(crate) struct ArenaManager {
    shared: Arc<ManagerShared>,
    reclaimer: Option<JoinHandle<()>>,
}

impl ArenaManager {
    /// Create a manager. When `reclamation` is set, a background task wakes
    /// every `reclaim_interval` and destroys arenas that have become fully
    /// idle; otherwise no arena is destroyed before shutdown.
    pub(crate) fn new(reclamation: bool, reclaim_interval: Duration) -> Self {
        let shared = Arc::new(ManagerShared {
            state: Mutex::new(ManagerState {
                arenas: Vec::new(),
                stop: false,
            }),
            reclaim_tick: Condvar::new(),
        });

        let reclaimer = reclamation.then(|| {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("tamalloc-reclaimer".into())
                .spawn(move || reclaim_loop(&shared, reclaim_interval))
                .expect("failed to spawn reclaimer thread")
        });

        Self { shared, reclaimer }
    }

    /// Allocate a new arena of `size` bytes, append it to the managed
    /// sequence, and hand back a shared handle. `None` when the platform
    /// refuses the region.
    pub(crate) fn create_arena(&self, size: usize) -> Option<Arc<Arena>> {
        let mut state = self.shared.state.lock();
        let arena = Arc::new(Arena::new(size)?);
        state.arenas.push(Arc::clone(&arena));
        debug!(arenas = state.arenas.len(), size, "created arena");
        Some(arena)
    }

    /// Number of arenas currently managed.
    pub(crate) fn arena_count(&self) -> usize {
        self.shared.state.lock().arenas.len()
    }

    /// Stop and join the reclaimer, then drop every managed arena.
    /// Idempotent. Callers must ensure no allocation or free is in flight.
    pub(crate) fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
        }
        self.shared.reclaim_tick.notify_all();
        if let Some(handle) = self.reclaimer.take() {
            let _ = handle.join();
        }

        let drained: Vec<_> = {
            let mut state = self.shared.state.lock();
            state.arenas.drain(..).collect()
        };
        trace!(arenas = drained.len(), "manager shut down");
        // regions unmap as the last Arc for each arena goes away
        drop(drained);
    }
}

impl Drop for ArenaManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reclaim_loop(shared: &ManagerShared, interval: Duration) {
    let mut state = shared.state.lock();
    loop {
        if state.stop {
            break;
        }
        let _ = shared.reclaim_tick.wait_for(&mut state, interval);
        if state.stop {
            break;
        }

        state.arenas.retain(|arena| {
            // used_bytes is the lock-free hint; the strong-count check under
            // this lock decides. count == 1 means no thread can start a new
            // operation on this arena.
            if !(arena.fully_idle() && Arc::strong_count(arena) == 1) {
                return true;
            }
            // let a straggling deallocate finish its coalescing pass
            arena.quiesce();
            debug!("reclaiming idle arena");
            false
        });
    }
}
