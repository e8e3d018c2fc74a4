//! Error kinds surfaced by the arena.
//!
//! Missing logger, an absent upstream allocator, and similar "recovered
//! locally" cases never reach this enum; they're handled silently at the
//! call site. What's left are the error kinds that must be surfaced to the
//! caller.

/// Errors surfaced by [`crate::Arena`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rounded arena size is too small to leave any usable space once
    /// its own block header is accounted for (spec §3.1 invariant 5).
    #[error(
        "rounded arena size of {rounded} bytes (2^{k}) is below the minimum of {min} bytes"
    )]
    BadConstructionSize {
        /// The power-of-two byte count the requested capacity rounded up to.
        rounded: usize,
        /// The exponent that produced `rounded`.
        k: u8,
        /// The minimum size the arena (and thus its one initial block) must be.
        min: usize,
    },

    /// `allocate` was asked for more than `2^K - block_header_size` bytes.
    #[error(
        "requested {requested} bytes (needs exponent {needed}) exceeds the arena's capacity exponent {k}"
    )]
    BadRequestSize {
        /// Bytes requested by the caller.
        requested: usize,
        /// Exponent the request would have needed.
        needed: u8,
        /// The arena's fixed capacity exponent `K`.
        k: u8,
    },

    /// No free block of sufficient size exists.
    #[error("arena exhausted: no free block of exponent >= {needed} is available ({available} bytes free)")]
    OutOfMemory {
        /// Exponent the request needed.
        needed: u8,
        /// Bytes currently free, summed across all free blocks.
        available: usize,
    },

    /// The pointer passed to `deallocate` does not lie within this arena's
    /// payload range.
    #[error("pointer at payload offset {offset} does not belong to this arena")]
    ForeignPointer {
        /// The offset (relative to payload start) the bad pointer decoded to.
        offset: usize,
    },

    /// The arena has already been torn down (moved-from / dropped).
    #[error("operation invoked on a moved-from or torn-down arena")]
    InvalidState,
}
