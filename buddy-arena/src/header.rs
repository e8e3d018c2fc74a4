//! In-band layout: the bytes actually walked by the allocator.
//!
//! Two distinct header shapes live in the single upstream allocation:
//!
//! - [`RawArenaHeader`] sits once, at offset 0, ahead of the payload.
//! - A `(k, occupied)` byte pair sits at the start of *every* block within
//!   the payload, free or occupied; this is what every split/merge/walk
//!   operation reads and rewrites.

use std::sync::atomic::Ordering;

/// Size in bytes of the per-block header (`k: u8`, `occupied: u8`).
pub(crate) const BLOCK_HEADER_SIZE: usize = 2;

/// Size in bytes of the in-band arena header (`k: u8`, `fit: u8`) that
/// precedes the payload within the single upstream allocation.
pub(crate) const ARENA_HEADER_SIZE: usize = 2;

/// Reads the `(k, occupied)` pair at `payload_ptr + offset`.
///
/// # Safety
/// `payload_ptr + offset` must be a valid, readable location for
/// [`BLOCK_HEADER_SIZE`] bytes.
#[inline]
pub(crate) unsafe fn read_block_header(payload_ptr: *const u8, offset: usize) -> (u8, bool) {
    let ptr = payload_ptr.add(offset);
    let k = ptr.read();
    let occupied = ptr.add(1).read() != 0;
    (k, occupied)
}

/// Writes the `(k, occupied)` pair at `payload_ptr + offset`.
///
/// # Safety
/// `payload_ptr + offset` must be a valid, writable location for
/// [`BLOCK_HEADER_SIZE`] bytes.
#[inline]
pub(crate) unsafe fn write_block_header(payload_ptr: *mut u8, offset: usize, k: u8, occupied: bool) {
    let ptr = payload_ptr.add(offset);
    ptr.write(k);
    ptr.add(1).write(occupied as u8);
}

/// The in-band arena header: just enough plain-old-data to make the
/// arena's size exponent and fit policy part of the region itself. The
/// mutex, logger, and upstream allocator handle live on the owning
/// [`crate::Arena`] struct instead, since they aren't `Copy` plain bytes
/// and don't need to travel with the raw region (see `arena.rs`).
#[repr(C)]
pub(crate) struct RawArenaHeader {
    pub(crate) k: std::sync::atomic::AtomicU8,
    pub(crate) fit: std::sync::atomic::AtomicU8,
}

impl RawArenaHeader {
    /// # Safety
    /// `ptr` must point to at least [`ARENA_HEADER_SIZE`] writable bytes.
    #[inline]
    pub(crate) unsafe fn init(ptr: *mut u8, k: u8, fit: u8) {
        let header = ptr.cast::<RawArenaHeader>();
        (*header).k.store(k, Ordering::Relaxed);
        (*header).fit.store(fit, Ordering::Relaxed);
    }

    /// # Safety
    /// `ptr` must point at a previously-[`init`](Self::init)ialised header.
    #[inline]
    pub(crate) unsafe fn from_ptr<'a>(ptr: *const u8) -> &'a RawArenaHeader {
        &*ptr.cast::<RawArenaHeader>()
    }
}

/// Smallest exponent `e` such that `2^e >= n` (`n >= 1`); `0` if `n <= 1`.
#[inline]
pub(crate) fn nearest_pow2_exp(n: usize) -> u8 {
    if n <= 1 {
        return 0;
    }
    (usize::BITS - (n - 1).leading_zeros()) as u8
}
