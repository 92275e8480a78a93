//! Thread-local small-object cache: size-segregated bins for requests of up
//! to 256 bytes.
//!
//! Each worker thread owns one `SmallCache`; no other thread ever touches
//! it, so the fast path needs no synchronization at all. Freed blocks are
//! pushed on the front of their bin and the next allocation of that class
//! pops them straight back — LIFO for cache locality. Bins never drain into
//! an arena or back to the platform while the thread lives; the cache's
//! `Drop` (thread exit) returns whatever is sitting in the bins.
//!
//! Chunk layout:
//!
//! ```text
//! [ SmallHeader | payload of SMALL_BIN_SIZES[bin] bytes ]
//!               ^ user pointer
//! ```
//!
//! The header's final word is a tag that occupies the same position the
//! arena magic does in large blocks, so the dispatcher can classify any
//! pointer with a single 4-byte read. The tag also flips between the live
//! and cached values, which makes a small-block double free a silent no-op.

use crate::stats::Stats;
use crate::{ARENA_MAGIC, MAX_SCALAR_ALIGN, MAX_SMALL_SIZE};
use core::alloc::Layout;
use core::mem::{offset_of, size_of};
use core::ptr;

/// Bin payload capacities, ascending. A request maps to the smallest bin
/// that holds it.
pub(crate) const SMALL_BIN_SIZES: [usize; 4] = [32, 64, 128, 256];
pub(crate) const SMALL_BIN_COUNT: usize = SMALL_BIN_SIZES.len();

/// Tag of a live small block.
const SMALL_MAGIC: u32 = 0xFEED_FACE;
/// Tag of a small block sitting in a bin.
const SMALL_FREE_MAGIC: u32 = 0xFEED_F00D;

const HEADER_SIZE: usize = size_of::<SmallHeader>();

#[repr(C)]
struct SmallHeader {
    /// Bytes the caller asked for. Informational; the bin index is what
    /// free relies on.
    user_size: u32,
    bin_index: u32,
    _reserved: u32,
    /// Discriminator word, aliasing the arena magic position.
    tag: u32,
}

/// A cached chunk viewed as a bin-list node. The link lives in the first
/// payload word, exactly like the arena's free-list link.
#[repr(C)]
struct SmallFreeBlock {
    header: SmallHeader,
    next: *mut SmallFreeBlock,
}

const _: () = assert!(HEADER_SIZE % MAX_SCALAR_ALIGN == 0);
const _: () = assert!(offset_of!(SmallHeader, tag) == HEADER_SIZE - 4);
const _: () = assert!(SMALL_MAGIC != ARENA_MAGIC && SMALL_FREE_MAGIC != ARENA_MAGIC);
const _: () = assert!(SMALL_BIN_SIZES[SMALL_BIN_COUNT - 1] == MAX_SMALL_SIZE);

/// Smallest bin index whose capacity covers `size`, or `None` when the
/// request is not small.
#[inline]
pub(crate) fn bin_for_size(size: usize) -> Option<usize> {
    SMALL_BIN_SIZES.iter().position(|&cap| size <= cap)
}

/// Full footprint of a bin `bin` chunk: header plus bin capacity.
#[inline]
fn chunk_size(bin: usize) -> usize {
    HEADER_SIZE + SMALL_BIN_SIZES[bin]
}

#[inline]
fn chunk_layout(bin: usize) -> Layout {
    // SAFETY: sizes are small constants and the alignment is a power of two.
    unsafe { Layout::from_size_align_unchecked(chunk_size(bin), MAX_SCALAR_ALIGN) }
}

/// Per-thread bins of cached small chunks. Single-threaded by construction.
pub(crate) struct SmallCache {
    bins: [*mut SmallFreeBlock; SMALL_BIN_COUNT],
}

impl SmallCache {
    pub(crate) const fn new() -> Self {
        Self {
            bins: [ptr::null_mut(); SMALL_BIN_COUNT],
        }
    }

    /// Serve a request of `size` bytes from the matching bin, provisioning
    /// a fresh chunk from the platform allocator when the bin is empty.
    /// Returns null for requests over [`MAX_SMALL_SIZE`] (not this tier's
    /// job) and on platform allocation failure.
    pub(crate) fn allocate_small(&mut self, size: usize, stats: &Stats) -> *mut u8 {
        let Some(bin) = bin_for_size(size) else {
            return ptr::null_mut();
        };

        let head = self.bins[bin];
        if !head.is_null() {
            unsafe {
                self.bins[bin] = (*head).next;
                (*head).header.user_size = size as u32;
                (*head).header.tag = SMALL_MAGIC;
                stats.record_alloc(chunk_size(bin));
                return (head as *mut u8).add(HEADER_SIZE);
            }
        }

        let block = unsafe { std::alloc::alloc_zeroed(chunk_layout(bin)) };
        if block.is_null() {
            return ptr::null_mut();
        }
        unsafe {
            let hdr = block as *mut SmallHeader;
            (*hdr).user_size = size as u32;
            (*hdr).bin_index = bin as u32;
            (*hdr)._reserved = 0;
            (*hdr).tag = SMALL_MAGIC;
            stats.record_alloc(chunk_size(bin));
            block.add(HEADER_SIZE)
        }
    }

    /// Push a small block back on the front of its bin. Pointers whose
    /// header does not carry the live tag or whose bin index is out of
    /// range are dropped silently, with no effect on statistics.
    ///
    /// # Safety
    /// `user` must be null or a value previously returned by
    /// `allocate_small` on some thread's cache. The tag check rejects
    /// stale pointers but cannot reject crafted payload bytes.
    pub(crate) unsafe fn free_small(&mut self, user: *mut u8, stats: &Stats) {
        if user.is_null() {
            return;
        }
        unsafe {
            let block = user.sub(HEADER_SIZE);
            let hdr = block as *mut SmallHeader;
            if (*hdr).tag != SMALL_MAGIC {
                return;
            }
            let bin = (*hdr).bin_index as usize;
            if bin >= SMALL_BIN_COUNT {
                return;
            }
            (*hdr).tag = SMALL_FREE_MAGIC;
            stats.record_free(chunk_size(bin));

            let fb = block as *mut SmallFreeBlock;
            (*fb).next = self.bins[bin];
            self.bins[bin] = fb;
        }
    }
}

impl Drop for SmallCache {
    fn drop(&mut self) {
        for bin in 0..SMALL_BIN_COUNT {
            let mut cur = self.bins[bin];
            while !cur.is_null() {
                unsafe {
                    let next = (*cur).next;
                    std::alloc::dealloc(cur as *mut u8, chunk_layout(bin));
                    cur = next;
                }
            }
        }
    }
}
