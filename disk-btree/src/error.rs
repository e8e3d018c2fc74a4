//! Error kinds surfaced by [`crate::BTreeDisk`] (spec §6.4 / §7).

use std::io;

/// Errors surfaced by B-tree operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read or write against the index or data file failed.
    #[error("disk b-tree I/O failure: {0}")]
    IoFailure(#[from] io::Error),

    /// A node record failed to decode into a structurally valid node
    /// (wrong leaf flag value, key count outside `0..=2t-1`, and similar).
    #[error("corrupt node record for id {id}: {reason}")]
    CorruptRecord {
        /// The node id whose record failed to decode.
        id: u64,
        /// What about the record was invalid.
        reason: String,
    },

    /// A tree was reopened with a `t`/key width/value width that disagrees
    /// with what the control record on disk already holds.
    #[error(
        "incompatible schema: tree on disk has t={on_disk_t}, key_len={on_disk_key_len}, value_len={on_disk_value_len}, but t={requested_t}, key_len={requested_key_len}, value_len={requested_value_len} was requested"
    )]
    IncompatibleSchema {
        /// Minimum degree recorded on disk.
        on_disk_t: u32,
        /// Encoded key width recorded on disk.
        on_disk_key_len: u32,
        /// Encoded value width recorded on disk.
        on_disk_value_len: u32,
        /// Minimum degree the caller asked to open with.
        requested_t: u32,
        /// Encoded key width the caller's `K` produces.
        requested_key_len: u32,
        /// Encoded value width the caller's `V` produces.
        requested_value_len: u32,
    },

    /// `open` was called with `t < 2`, which cannot satisfy the minimum
    /// node occupancy invariant.
    #[error("minimum degree t must be >= 2, got {0}")]
    InvalidDegree(u32),
}
