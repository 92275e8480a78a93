//! Property tests over randomized allocate/free sequences.

use proptest::collection::vec;
use proptest::prelude::*;
use std::time::Duration;
use tamalloc::{AllocatorConfig, MAX_SCALAR_ALIGN, TaMalloc};

fn allocator() -> TaMalloc {
    TaMalloc::new(AllocatorConfig {
        arena_size: 16 * 1024 * 1024,
        reclamation: false,
        reclaim_interval: Duration::from_secs(1),
    })
}

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    FreeOldest,
    FreeNewest,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..8192).prop_map(Op::Alloc),
        1 => Just(Op::FreeOldest),
        1 => Just(Op::FreeNewest),
    ]
}

fn fill(ptr: *mut u8, size: usize, tag: u8) {
    unsafe { ptr.write_bytes(tag, size) };
}

fn verify(ptr: *mut u8, size: usize, tag: u8) -> bool {
    (0..size).all(|i| unsafe { *ptr.add(i) } == tag)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any interleaving of allocations and frees that ends with everything
    /// freed leaves the current-used gauge at zero, balanced call counters,
    /// and a peak no smaller than any current value observed on the way.
    #[test]
    fn round_trip_balances(ops in vec(op_strategy(), 1..200)) {
        let alloc = allocator();
        let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();
        let mut max_current_seen = 0u64;

        for (i, op) in ops.iter().enumerate() {
            match op {
                Op::Alloc(size) => {
                    let ptr = alloc.allocate(*size);
                    prop_assert!(!ptr.is_null());
                    let tag = (i % 251) as u8;
                    fill(ptr, *size, tag);
                    live.push((ptr, *size, tag));
                }
                Op::FreeOldest if !live.is_empty() => {
                    let (ptr, size, tag) = live.remove(0);
                    prop_assert!(verify(ptr, size, tag));
                    unsafe { alloc.free(ptr) };
                }
                Op::FreeNewest if !live.is_empty() => {
                    let (ptr, size, tag) = live.pop().unwrap();
                    prop_assert!(verify(ptr, size, tag));
                    unsafe { alloc.free(ptr) };
                }
                _ => {}
            }
            let snap = alloc.stats_snapshot();
            max_current_seen = max_current_seen.max(snap.current_used_bytes);
            prop_assert!(snap.peak_used_bytes >= snap.current_used_bytes);
        }

        for (ptr, size, tag) in live.drain(..) {
            prop_assert!(verify(ptr, size, tag));
            unsafe { alloc.free(ptr) };
        }

        let snap = alloc.stats_snapshot();
        prop_assert_eq!(snap.current_used_bytes, 0);
        prop_assert_eq!(snap.total_alloc_calls, snap.total_free_calls);
        prop_assert!(snap.peak_used_bytes >= max_current_seen);
    }

    /// Simultaneously live blocks occupy pairwise disjoint byte ranges and
    /// are aligned to the maximum scalar alignment.
    #[test]
    fn live_regions_are_disjoint(sizes in vec(1usize..4096, 1..60)) {
        let alloc = allocator();
        let mut regions: Vec<(usize, usize)> = Vec::new();

        for &size in &sizes {
            let ptr = alloc.allocate(size);
            prop_assert!(!ptr.is_null());
            prop_assert_eq!(ptr as usize % MAX_SCALAR_ALIGN, 0);
            regions.push((ptr as usize, size));
        }

        let mut sorted = regions.clone();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            let (a_start, a_len) = pair[0];
            let (b_start, _) = pair[1];
            prop_assert!(a_start + a_len <= b_start, "ranges overlap");
        }

        for (addr, _) in regions {
            unsafe { alloc.free(addr as *mut u8) };
        }
        prop_assert_eq!(alloc.stats_snapshot().current_used_bytes, 0);
    }

    /// Writing a full payload never disturbs any other live payload.
    #[test]
    fn payloads_are_independently_writable(sizes in vec(1usize..2048, 2..40)) {
        let alloc = allocator();
        let blocks: Vec<(*mut u8, usize, u8)> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let ptr = alloc.allocate(size);
                (ptr, size, (i % 250) as u8 + 1)
            })
            .collect();

        for &(ptr, size, tag) in &blocks {
            prop_assert!(!ptr.is_null());
            fill(ptr, size, tag);
        }
        // every earlier write must have survived every later one
        for &(ptr, size, tag) in &blocks {
            prop_assert!(verify(ptr, size, tag));
        }

        for (ptr, _, _) in blocks {
            unsafe { alloc.free(ptr) };
        }
        prop_assert_eq!(alloc.stats_snapshot().current_used_bytes, 0);
    }
}
