//! A disk-backed B-tree persisting an ordered key→value index across two
//! files: `{base}.tree` (fixed-size node records, indexed by id) and
//! `{base}.data` (reserved for future out-of-line value storage; see
//! [`tree`] module docs).
//!
//! ```
//! use disk_btree::BTreeDisk;
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! let base = dir.path().join("index");
//! let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();
//! assert!(tree.insert(10, 100).unwrap());
//! assert_eq!(tree.at(&10).unwrap(), Some(100));
//! ```

mod codec;
mod error;
mod iter;
mod node;
mod store;
mod tree;

pub use codec::{FixedSize, FixedString};
pub use error::Error;
pub use iter::{Cursor, Position};
pub use tree::{BTreeDisk, FindPath};
