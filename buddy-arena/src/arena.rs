use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use core_logger::Logger;

use crate::error::Error;
use crate::fit::FitPolicy;
use crate::header::{
    nearest_pow2_exp, read_block_header, write_block_header, RawArenaHeader, ARENA_HEADER_SIZE,
    BLOCK_HEADER_SIZE,
};
use crate::options::ArenaOptions;
use crate::upstream::UpstreamAllocator;

/// A single free or occupied block as reported by [`Arena::inspect_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// The block's current size in bytes (`2^k`).
    pub size_bytes: usize,
    /// Whether the block is currently allocated.
    pub occupied: bool,
}

struct ArenaInner {
    /// Start of the single upstream allocation: `RawArenaHeader` followed by
    /// the payload.
    region: NonNull<u8>,
    /// Total bytes requested from `upstream` (`ARENA_HEADER_SIZE + 2^k`).
    alloc_len: usize,
    /// The arena's fixed capacity exponent `K`; the payload spans `2^k` bytes.
    k: u8,
    mutex: Mutex<()>,
    logger: Option<Arc<dyn Logger>>,
    upstream: Arc<dyn UpstreamAllocator>,
}

// Safety: every access to `region` is serialised by `mutex`, and `region` is
// only ever freed once, from `Drop`, after the last `Arc<ArenaInner>` is gone.
unsafe impl Send for ArenaInner {}
unsafe impl Sync for ArenaInner {}

/// A buddy-system allocator managing one contiguous byte region.
///
/// Cheap to clone: clones share the same underlying region and mutex.
/// Every public operation but construction is serialised through a single
/// arena-wide mutex.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("k", &self.inner.k)
            .field("fit_policy", &self.fit_policy())
            .finish()
    }
}

impl Arena {
    /// Returns the payload capacity in bytes (`2^K`).
    #[inline]
    pub fn capacity(&self) -> usize {
        1usize << self.inner.k
    }

    /// Returns the current fit policy.
    #[inline]
    pub fn fit_policy(&self) -> FitPolicy {
        let header = unsafe { RawArenaHeader::from_ptr(self.inner.region.as_ptr()) };
        FitPolicy::decode(header.fit.load(Ordering::Relaxed))
    }

    /// Mutates the fit policy in place.
    pub fn set_fit_policy(&self, fit: FitPolicy) {
        let _guard = self.inner.mutex.lock();
        let header = unsafe { RawArenaHeader::from_ptr(self.inner.region.as_ptr()) };
        header.fit.store(fit.encode(), Ordering::Relaxed);
        self.log_debug(&format!("set_fit_policy({fit:?})"));
    }

    /// Constructs a new arena. `options.capacity` is rounded up to the next
    /// power of two; construction fails if the rounded exponent `K` can't
    /// satisfy `K >= ceil(log2(block_header_size + 1))` (spec §3.1
    /// invariant 5): a payload that can't outgrow its own block header by
    /// at least one byte has no usable space left once occupied.
    pub fn new(options: ArenaOptions) -> Result<Self, Error> {
        let ArenaOptions {
            capacity,
            fit,
            logger,
            upstream,
        } = options;

        if let Some(logger) = &logger {
            logger.debug("Arena::new start");
        }

        let k = nearest_pow2_exp(capacity.max(1));
        let payload_len = 1usize << k;
        let min_k = nearest_pow2_exp(BLOCK_HEADER_SIZE + 1);
        if k < min_k {
            let err = Error::BadConstructionSize {
                rounded: payload_len,
                k,
                min: 1usize << min_k,
            };
            if let Some(logger) = &logger {
                logger.error(&err.to_string());
            }
            return Err(err);
        }

        let alloc_len = ARENA_HEADER_SIZE + payload_len;
        // Safety: `alloc_len` is nonzero and `upstream` owns the contract for it.
        let region = unsafe { upstream.allocate(alloc_len) }.ok_or(Error::OutOfMemory {
            needed: k,
            available: 0,
        })?;

        unsafe {
            RawArenaHeader::init(region.as_ptr(), k, fit.encode());
            let payload_ptr = region.as_ptr().add(ARENA_HEADER_SIZE);
            write_block_header(payload_ptr, 0, k, false);
        }

        if let Some(logger) = &logger {
            logger.information(&format!("Initial memory: {payload_len} bytes (K={k})"));
            logger.debug("Arena::new finish");
        }

        Ok(Self {
            inner: Arc::new(ArenaInner {
                region,
                alloc_len,
                k,
                mutex: Mutex::new(()),
                logger,
                upstream,
            }),
        })
    }

    #[inline]
    fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.inner.region.as_ptr().add(ARENA_HEADER_SIZE) }
    }

    /// Walks blocks left-to-right, in arena traversal order.
    fn blocks(&self) -> impl Iterator<Item = (usize, u8, bool)> + '_ {
        let payload_ptr = self.payload_ptr();
        let len = self.capacity();
        let mut offset = 0usize;
        std::iter::from_fn(move || {
            if offset >= len {
                return None;
            }
            let (k, occupied) = unsafe { read_block_header(payload_ptr, offset) };
            let this_offset = offset;
            offset += 1usize << k;
            Some((this_offset, k, occupied))
        })
    }

    /// Snapshot of every block in arena traversal order, under the arena
    /// mutex.
    pub fn inspect_blocks(&self) -> Vec<BlockInfo> {
        let _guard = self.inner.mutex.lock();
        self.blocks()
            .map(|(_, k, occupied)| BlockInfo {
                size_bytes: 1usize << k,
                occupied,
            })
            .collect()
    }

    fn remaining_locked(&self) -> usize {
        self.blocks()
            .filter(|(_, _, occupied)| !occupied)
            .map(|(_, k, _)| 1usize << k)
            .sum()
    }

    fn find_first_fit(&self, needed: u8) -> Option<usize> {
        self.blocks()
            .find(|(_, k, occupied)| !occupied && *k >= needed)
            .map(|(offset, _, _)| offset)
    }

    fn find_best_fit(&self, needed: u8) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (offset, k, occupied) in self.blocks() {
            if occupied || k < needed {
                continue;
            }
            if best.is_none_or(|(_, best_k)| k < best_k) {
                best = Some((offset, k));
            }
            if k == needed {
                break;
            }
        }
        best.map(|(offset, _)| offset)
    }

    fn find_worst_fit(&self, needed: u8) -> Option<usize> {
        let mut worst: Option<(usize, u8)> = None;
        for (offset, k, occupied) in self.blocks() {
            if occupied || k < needed {
                continue;
            }
            if worst.is_none_or(|(_, worst_k)| k > worst_k) {
                worst = Some((offset, k));
            }
        }
        worst.map(|(offset, _)| offset)
    }

    /// Splits the free block at `offset` repeatedly until it has exponent
    /// `target`.
    fn split_down(&self, mut offset: usize, target: u8) {
        let payload_ptr = self.payload_ptr();
        loop {
            let (k, _occupied) = unsafe { read_block_header(payload_ptr, offset) };
            if k <= target {
                break;
            }
            let new_k = k - 1;
            let half = 1usize << new_k;
            unsafe {
                write_block_header(payload_ptr, offset, new_k, false);
                write_block_header(payload_ptr, offset + half, new_k, false);
            }
            // The left half keeps `offset`; recurse into it.
            let _ = offset;
        }
    }

    /// Allocates `size` usable bytes, returning a pointer to the start of
    /// them (immediately after the block's in-band header).
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, Error> {
        let _guard = self.inner.mutex.lock();
        self.log_debug("allocate start");

        let needed = nearest_pow2_exp(size + BLOCK_HEADER_SIZE);
        if needed > self.inner.k {
            let err = Error::BadRequestSize {
                requested: size,
                needed,
                k: self.inner.k,
            };
            self.log_error(&err.to_string());
            return Err(err);
        }

        let fit = self.fit_policy();
        let offset = match fit {
            FitPolicy::First => self.find_first_fit(needed),
            FitPolicy::Best => self.find_best_fit(needed),
            FitPolicy::Worst => self.find_worst_fit(needed),
        };

        let Some(offset) = offset else {
            let err = Error::OutOfMemory {
                needed,
                available: self.remaining_locked(),
            };
            self.log_error(&err.to_string());
            return Err(err);
        };

        self.split_down(offset, needed);

        let payload_ptr = self.payload_ptr();
        unsafe {
            write_block_header(payload_ptr, offset, needed, true);
        }

        self.log_information(&format!("Allocate {size} bytes"));
        self.log_debug("allocate finish");

        // Safety: `offset + BLOCK_HEADER_SIZE` is within the payload because
        // `needed <= self.inner.k` and the block covers `2^needed` bytes.
        let ptr = unsafe { payload_ptr.add(offset + BLOCK_HEADER_SIZE) };
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Releases a pointer previously returned by [`Arena::allocate`] on this
    /// arena.
    ///
    /// # Safety
    /// `ptr` must have been returned by `self.allocate` and not already
    /// deallocated; double-free is undefined behavior.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) -> Result<(), Error> {
        let _guard = self.inner.mutex.lock();
        self.log_debug("deallocate start");

        let payload_start = self.payload_ptr() as usize;
        let payload_len = self.capacity();
        let block_addr = (ptr.as_ptr() as usize).wrapping_sub(BLOCK_HEADER_SIZE);

        if block_addr < payload_start || block_addr >= payload_start + payload_len {
            let offset = block_addr.wrapping_sub(payload_start);
            let err = Error::ForeignPointer { offset };
            self.log_error(&err.to_string());
            return Err(err);
        }

        let offset = block_addr - payload_start;
        let payload_ptr = self.payload_ptr();
        let (mut k, _occupied) = unsafe { read_block_header(payload_ptr, offset) };
        unsafe {
            write_block_header(payload_ptr, offset, k, false);
        }

        let mut cur_offset = offset;
        while k < self.inner.k {
            let buddy_offset = cur_offset ^ (1usize << k);
            if buddy_offset >= payload_len {
                break;
            }
            let (buddy_k, buddy_occupied) = unsafe { read_block_header(payload_ptr, buddy_offset) };
            if buddy_occupied || buddy_k != k {
                break;
            }
            let left = cur_offset.min(buddy_offset);
            unsafe {
                write_block_header(payload_ptr, left, k + 1, false);
            }
            cur_offset = left;
            k += 1;
        }

        self.log_debug(&format!("Deallocated block at offset {offset}"));
        Ok(())
    }

    fn log_debug(&self, message: &str) {
        if let Some(logger) = &self.inner.logger {
            logger.debug(message);
        }
    }

    fn log_information(&self, message: &str) {
        if let Some(logger) = &self.inner.logger {
            logger.information(message);
        }
    }

    fn log_error(&self, message: &str) {
        if let Some(logger) = &self.inner.logger {
            logger.error(message);
        }
    }
}

impl Drop for ArenaInner {
    fn drop(&mut self) {
        if let Some(logger) = &self.logger {
            logger.debug("Arena teardown start");
        }
        // Safety: `region`/`alloc_len` are exactly what `upstream.allocate`
        // returned in `Arena::new`, and this runs at most once (Drop on the
        // last `Arc<ArenaInner>`).
        unsafe {
            self.upstream.deallocate(self.region, self.alloc_len);
        }
        if let Some(logger) = &self.logger {
            logger.information("Arena teardown complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_logger::NoopLogger;

    fn new_arena(capacity: usize) -> Arena {
        Arena::new(ArenaOptions::new(capacity)).expect("construction should succeed")
    }

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        let arena = new_arena(100);
        assert_eq!(arena.capacity(), 128);
    }

    #[test]
    fn construction_fails_when_too_small_for_header() {
        let err = Arena::new(ArenaOptions::new(0)).unwrap_err();
        assert!(matches!(err, Error::BadConstructionSize { .. }));
    }

    #[test]
    fn construction_fails_at_the_k_equals_one_boundary() {
        // Spec invariant 5: K >= ceil(log2(header_size+1)) = 2 for a 2-byte
        // block header, so a 2-byte payload (K=1) is rejected even though
        // it's no smaller than the header itself.
        let err = Arena::new(ArenaOptions::new(2)).unwrap_err();
        assert!(matches!(err, Error::BadConstructionSize { .. }));
    }

    #[test]
    fn construction_succeeds_at_the_k_equals_two_boundary() {
        let arena = new_arena(4);
        assert_eq!(arena.capacity(), 4);
    }

    #[test]
    fn three_disjoint_allocations_sum_to_capacity() {
        let arena = new_arena(100);
        let a = arena.allocate(10).unwrap();
        let b = arena.allocate(10).unwrap();
        let c = arena.allocate(10).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);

        let blocks = arena.inspect_blocks();
        let total: usize = blocks.iter().map(|b| b.size_bytes).sum();
        assert_eq!(total, arena.capacity());
        assert!(blocks.iter().filter(|b| b.occupied).count() >= 3);
    }

    #[test]
    fn allocate_then_deallocate_restores_single_free_block() {
        let arena = new_arena(256);
        let ptr = arena.allocate(20).unwrap();
        unsafe {
            arena.deallocate(ptr).unwrap();
        }
        let blocks = arena.inspect_blocks();
        assert_eq!(blocks, vec![BlockInfo { size_bytes: 256, occupied: false }]);
    }

    #[test]
    fn best_fit_returns_smallest_adequate_block_after_a_free() {
        let arena = Arena::new(
            ArenaOptions::new(256)
                .with_fit_policy(FitPolicy::Best)
                .with_logger(Arc::new(NoopLogger)),
        )
        .unwrap();

        let thirty = arena.allocate(30).unwrap(); // rounds to 32 bytes
        let _ten = arena.allocate(10).unwrap(); // rounds to 16 bytes
        let _sixty = arena.allocate(60).unwrap(); // rounds to 64 bytes
        unsafe {
            arena.deallocate(thirty).unwrap();
        }

        // A 20-byte request needs exponent for 22 bytes -> 32-byte block.
        // The freed 32-byte block is the best fit, not the larger remainder.
        let reused = arena.allocate(20).unwrap();
        assert_eq!(reused, thirty);
    }

    #[test]
    fn arena_sum_invariant_holds_after_mixed_traffic() {
        let arena = new_arena(1024);
        let mut ptrs = Vec::new();
        for size in [10, 20, 5, 40, 8, 100] {
            ptrs.push(arena.allocate(size).unwrap());
        }
        for ptr in ptrs.drain(1..) {
            unsafe {
                arena.deallocate(ptr).unwrap();
            }
        }
        let total: usize = arena.inspect_blocks().iter().map(|b| b.size_bytes).sum();
        assert_eq!(total, arena.capacity());
    }

    #[test]
    fn round_trip_to_empty_restores_single_free_block() {
        let arena = new_arena(512);
        let ptrs: Vec<_> = [10, 20, 30, 40]
            .into_iter()
            .map(|size| arena.allocate(size).unwrap())
            .collect();
        for ptr in ptrs {
            unsafe {
                arena.deallocate(ptr).unwrap();
            }
        }
        let blocks = arena.inspect_blocks();
        assert_eq!(blocks, vec![BlockInfo { size_bytes: 512, occupied: false }]);
    }

    #[test]
    fn deallocating_a_foreign_pointer_is_rejected() {
        let arena = new_arena(128);
        let other = new_arena(128);
        let ptr = other.allocate(8).unwrap();
        let err = unsafe { arena.deallocate(ptr) }.unwrap_err();
        assert!(matches!(err, Error::ForeignPointer { .. }));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let arena = new_arena(128);
        let err = arena.allocate(1_000_000).unwrap_err();
        assert!(matches!(err, Error::BadRequestSize { .. }));
    }

    #[test]
    fn exhausted_arena_reports_out_of_memory() {
        let arena = new_arena(64);
        let _a = arena.allocate(30).unwrap();
        let err = arena.allocate(30).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
    }

    #[test]
    fn set_fit_policy_takes_effect_immediately() {
        let arena = new_arena(256);
        assert_eq!(arena.fit_policy(), FitPolicy::First);
        arena.set_fit_policy(FitPolicy::Worst);
        assert_eq!(arena.fit_policy(), FitPolicy::Worst);
    }
}
