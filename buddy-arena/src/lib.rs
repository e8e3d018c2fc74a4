//! A buddy-system memory allocator managing one contiguous region obtained
//! from an upstream allocator.
//!
//! The arena splits and merges power-of-two blocks in place, walking an
//! in-band chain of two-byte block headers (exponent + occupied flag) to
//! find, split, and coalesce free space; no side-table tracks block
//! boundaries independently of the region itself. See [`Arena`] for the
//! public surface and [`ArenaOptions`] for construction knobs.
//!
//! ```
//! use buddy_arena::{Arena, ArenaOptions};
//!
//! let arena = Arena::new(ArenaOptions::new(4096)).unwrap();
//! let ptr = arena.allocate(64).unwrap();
//! unsafe { arena.deallocate(ptr).unwrap(); }
//! ```

mod arena;
mod error;
mod fit;
mod header;
mod options;
mod upstream;

pub use arena::{Arena, BlockInfo};
pub use error::Error;
pub use fit::FitPolicy;
pub use options::ArenaOptions;
pub use upstream::{SystemAllocator, UpstreamAllocator};
