//! The B-tree proper: insertion with preemptive child splitting, lookup,
//! erasure with preemptive borrow/merge rebalancing, and the on-disk
//! lifecycle (spec §4.2).

use std::path::Path;
use std::sync::Arc;

use core_logger::Logger;

use crate::codec::FixedSize;
use crate::error::Error;
use crate::iter::{Cursor, Position};
use crate::node::Node;
use crate::store::Store;

/// The root-to-leaf descent recorded by [`BTreeDisk::find_path`]: every
/// `(node_id, slot)` visited, plus whether the final slot held the key.
#[derive(Debug, Clone)]
pub struct FindPath {
    /// `(node_id, slot)` for every node visited, root first.
    pub path: Vec<(u64, usize)>,
    /// The slot within the last node in `path`.
    pub terminal_slot: usize,
    /// Whether `terminal_slot` in the last node held the searched key.
    pub found: bool,
}

/// A disk-backed ordered map from `K` to `V`, persisted as a pair of files
/// (`{base_path}.tree`, `{base_path}.data`) under a minimum-degree `t`
/// parameter fixed for the life of the on-disk files.
pub struct BTreeDisk<K, V> {
    store: Store<K, V>,
}

/// Smallest slot `i` such that `node.keys[i] >= key`, and whether that slot
/// is an exact match (spec §4.2 "Lookup").
fn search_node<K: Ord, V>(node: &Node<K, V>, key: &K) -> (usize, bool) {
    match node.keys.binary_search(key) {
        Ok(idx) => (idx, true),
        Err(idx) => (idx, false),
    }
}

impl<K: FixedSize + Ord, V: FixedSize> BTreeDisk<K, V> {
    /// Opens (creating if absent) the tree rooted at `base_path` with
    /// minimum degree `t`. `t` and the encoded widths of `K`/`V` must match
    /// what is already on disk, if anything is.
    pub fn open(base_path: impl AsRef<Path>, t: usize) -> Result<Self, Error> {
        Self::open_with_logger(base_path, t, None)
    }

    /// As [`BTreeDisk::open`], with an explicit logger sink.
    pub fn open_with_logger(
        base_path: impl AsRef<Path>,
        t: usize,
        logger: Option<Arc<dyn Logger>>,
    ) -> Result<Self, Error> {
        if t < 2 {
            let err = Error::InvalidDegree(t as u32);
            if let Some(logger) = &logger {
                logger.error(&err.to_string());
            }
            return Err(err);
        }
        let store = Store::open(base_path.as_ref(), t, logger)?;
        Ok(Self { store })
    }

    /// The minimum degree this tree was opened with.
    pub fn min_degree(&self) -> usize {
        self.store.geometry().t
    }

    /// Flushes dirty pages and best-effort fsyncs both files (spec §5:
    /// "the tree flushes dirty pages at close").
    pub fn close(mut self) -> Result<(), Error> {
        self.store.flush()
    }

    /// Looks up `key`, returning a clone of its value if present.
    pub fn at(&mut self, key: &K) -> Result<Option<V>, Error> {
        let mut node_id = self.store.root_id;
        loop {
            let node = self.store.read_node(node_id)?;
            let (slot, found) = search_node(&node, key);
            if found {
                return Ok(Some(node.values[slot].clone()));
            }
            if node.leaf {
                return Ok(None);
            }
            node_id = node.children[slot];
        }
    }

    /// Records the root-to-leaf descent `at(key)` would take.
    pub fn find_path(&mut self, key: &K) -> Result<FindPath, Error> {
        let mut path = Vec::new();
        let mut node_id = self.store.root_id;
        loop {
            let node = self.store.read_node(node_id)?;
            let (slot, found) = search_node(&node, key);
            path.push((node_id, slot));
            if found || node.leaf {
                return Ok(FindPath {
                    path,
                    terminal_slot: slot,
                    found,
                });
            }
            node_id = node.children[slot];
        }
    }

    /// Inserts `(key, value)`. Returns `false` without modifying the tree
    /// if `key` is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool, Error> {
        let t = self.store.geometry().t;
        let root = self.store.read_node(self.store.root_id)?;
        if root.keys.len() == 2 * t - 1 {
            let new_root_id = self.store.allocate_id();
            let mut new_root = Node::new_leaf(new_root_id, None);
            new_root.leaf = false;
            new_root.children = vec![self.store.root_id];
            let mut old_root = root;
            old_root.parent = Some(new_root_id);
            self.store.write_node(&old_root)?;
            self.store.write_node(&new_root)?;
            self.store.root_id = new_root_id;
            self.split_child(new_root_id, 0)?;
        }

        let inserted = self.insert_non_full(self.store.root_id, key, value)?;
        self.store.write_control()?;

        if let Some(logger) = self.store.logger() {
            if inserted {
                logger.debug("Inserted key into disk b-tree");
            } else {
                logger.debug("Insert rejected: duplicate key");
            }
        }

        Ok(inserted)
    }

    fn insert_non_full(&mut self, node_id: u64, key: K, value: V) -> Result<bool, Error> {
        let mut node = self.store.read_node(node_id)?;
        let (slot, found) = search_node(&node, &key);
        if found {
            return Ok(false);
        }

        if node.leaf {
            node.keys.insert(slot, key);
            node.values.insert(slot, value);
            self.store.write_node(&node)?;
            return Ok(true);
        }

        let t = self.store.geometry().t;
        let mut child_idx = slot;
        let child = self.store.read_node(node.children[child_idx])?;
        if child.keys.len() == 2 * t - 1 {
            self.split_child(node_id, child_idx)?;
            node = self.store.read_node(node_id)?;
            let (slot2, found2) = search_node(&node, &key);
            if found2 {
                return Ok(false);
            }
            child_idx = slot2;
        }

        let target = node.children[child_idx];
        self.insert_non_full(target, key, value)
    }

    /// Splits the full child at `parent.children[child_idx]` in two,
    /// promoting its median key/value into `parent` (spec §4.2
    /// "Insertion").
    fn split_child(&mut self, parent_id: u64, child_idx: usize) -> Result<(), Error> {
        let t = self.store.geometry().t;
        let mut parent = self.store.read_node(parent_id)?;
        let child_id = parent.children[child_idx];
        let mut child = self.store.read_node(child_id)?;
        debug_assert_eq!(child.keys.len(), 2 * t - 1);

        let new_id = self.store.allocate_id();
        let mut sibling = Node::new_leaf(new_id, Some(parent_id));
        sibling.leaf = child.leaf;

        sibling.keys = child.keys.split_off(t);
        sibling.values = child.values.split_off(t);
        let median_key = child.keys.pop().expect("left half retains the median");
        let median_value = child.values.pop().expect("left half retains the median");

        if !child.leaf {
            sibling.children = child.children.split_off(t);
            for &grandchild_id in &sibling.children {
                let mut grandchild = self.store.read_node(grandchild_id)?;
                grandchild.parent = Some(new_id);
                self.store.write_node(&grandchild)?;
            }
        }

        parent.keys.insert(child_idx, median_key);
        parent.values.insert(child_idx, median_value);
        parent.children.insert(child_idx + 1, new_id);

        self.store.write_node(&child)?;
        self.store.write_node(&sibling)?;
        self.store.write_node(&parent)?;
        Ok(())
    }

    /// Removes `key`. Returns `false` if it was not present.
    pub fn erase(&mut self, key: &K) -> Result<bool, Error> {
        let removed = self.erase_in(self.store.root_id, key)?;
        if removed {
            let root = self.store.read_node(self.store.root_id)?;
            if !root.leaf && root.keys.is_empty() {
                let only_child_id = root.children[0];
                let mut only_child = self.store.read_node(only_child_id)?;
                only_child.parent = None;
                self.store.write_node(&only_child)?;
                let old_root_id = self.store.root_id;
                self.store.root_id = only_child_id;
                self.store.forget(old_root_id);
            }
            self.store.write_control()?;
        }
        if let Some(logger) = self.store.logger() {
            logger.debug(if removed {
                "Erased key from disk b-tree"
            } else {
                "Erase found no matching key"
            });
        }
        Ok(removed)
    }

    fn erase_in(&mut self, node_id: u64, key: &K) -> Result<bool, Error> {
        let node = self.store.read_node(node_id)?;
        let (slot, found) = search_node(&node, key);

        if found {
            if node.leaf {
                let mut node = node;
                node.keys.remove(slot);
                node.values.remove(slot);
                self.store.write_node(&node)?;
                Ok(true)
            } else {
                self.erase_from_internal(node_id, slot, key)
            }
        } else {
            if node.leaf {
                return Ok(false);
            }
            self.ensure_child_has_min_keys(node_id, slot)?;
            let node = self.store.read_node(node_id)?;
            let (slot2, _found2) = search_node(&node, key);
            let child_id = node.children[slot2];
            self.erase_in(child_id, key)
        }
    }

    /// Erases the key at `slot` of internal node `node_id` by promoting a
    /// predecessor or successor and recursively deleting it, or by merging
    /// the two children when neither has a spare key (spec §4.2
    /// "Erasure", step 2; grounded in the predecessor/successor promotion
    /// the splay tree's own erase performs; see SPEC_FULL.md §4.2).
    fn erase_from_internal(&mut self, node_id: u64, slot: usize, key: &K) -> Result<bool, Error> {
        let t = self.store.geometry().t;
        let node = self.store.read_node(node_id)?;
        let left_child_id = node.children[slot];
        let right_child_id = node.children[slot + 1];

        let left_len = self.store.read_node(left_child_id)?.keys.len();
        if left_len >= t {
            let (pred_key, pred_value) = self.max_of_subtree(left_child_id)?;
            let mut node = self.store.read_node(node_id)?;
            node.keys[slot] = pred_key.clone();
            node.values[slot] = pred_value;
            self.store.write_node(&node)?;
            return self.erase_in(left_child_id, &pred_key);
        }

        let right_len = self.store.read_node(right_child_id)?.keys.len();
        if right_len >= t {
            let (succ_key, succ_value) = self.min_of_subtree(right_child_id)?;
            let mut node = self.store.read_node(node_id)?;
            node.keys[slot] = succ_key.clone();
            node.values[slot] = succ_value;
            self.store.write_node(&node)?;
            return self.erase_in(right_child_id, &succ_key);
        }

        self.merge_children(node_id, slot)?;
        self.erase_in(left_child_id, key)
    }

    fn max_of_subtree(&mut self, mut node_id: u64) -> Result<(K, V), Error> {
        loop {
            let node = self.store.read_node(node_id)?;
            if node.leaf {
                let idx = node.keys.len() - 1;
                return Ok((node.keys[idx].clone(), node.values[idx].clone()));
            }
            node_id = *node.children.last().expect("internal node has children");
        }
    }

    fn min_of_subtree(&mut self, mut node_id: u64) -> Result<(K, V), Error> {
        loop {
            let node = self.store.read_node(node_id)?;
            if node.leaf {
                return Ok((node.keys[0].clone(), node.values[0].clone()));
            }
            node_id = node.children[0];
        }
    }

    /// Ensures `parent.children[child_idx]` holds at least `t` keys before
    /// the caller descends into it, by borrowing from an adjacent sibling
    /// or merging with one (spec §4.2 "Erasure", step 3).
    fn ensure_child_has_min_keys(&mut self, parent_id: u64, child_idx: usize) -> Result<(), Error> {
        let t = self.store.geometry().t;
        let parent = self.store.read_node(parent_id)?;
        let child_id = parent.children[child_idx];
        let child_len = self.store.read_node(child_id)?.keys.len();
        if child_len >= t {
            return Ok(());
        }

        if child_idx > 0 {
            let left_id = parent.children[child_idx - 1];
            if self.store.read_node(left_id)?.keys.len() >= t {
                return self.borrow_from_left(parent_id, child_idx);
            }
        }
        if child_idx + 1 < parent.children.len() {
            let right_id = parent.children[child_idx + 1];
            if self.store.read_node(right_id)?.keys.len() >= t {
                return self.borrow_from_right(parent_id, child_idx);
            }
        }

        if child_idx > 0 {
            self.merge_children(parent_id, child_idx - 1)
        } else {
            self.merge_children(parent_id, child_idx)
        }
    }

    fn borrow_from_left(&mut self, parent_id: u64, child_idx: usize) -> Result<(), Error> {
        let mut parent = self.store.read_node(parent_id)?;
        let left_id = parent.children[child_idx - 1];
        let child_id = parent.children[child_idx];
        let mut left = self.store.read_node(left_id)?;
        let mut child = self.store.read_node(child_id)?;

        child.keys.insert(0, parent.keys[child_idx - 1].clone());
        child.values.insert(0, parent.values[child_idx - 1].clone());

        parent.keys[child_idx - 1] = left.keys.pop().expect("sibling has a spare key");
        parent.values[child_idx - 1] = left.values.pop().expect("sibling has a spare key");

        if !left.leaf {
            let moved_child = left.children.pop().expect("internal sibling has children");
            child.children.insert(0, moved_child);
            let mut moved = self.store.read_node(moved_child)?;
            moved.parent = Some(child_id);
            self.store.write_node(&moved)?;
        }

        self.store.write_node(&left)?;
        self.store.write_node(&child)?;
        self.store.write_node(&parent)?;
        Ok(())
    }

    fn borrow_from_right(&mut self, parent_id: u64, child_idx: usize) -> Result<(), Error> {
        let mut parent = self.store.read_node(parent_id)?;
        let right_id = parent.children[child_idx + 1];
        let child_id = parent.children[child_idx];
        let mut right = self.store.read_node(right_id)?;
        let mut child = self.store.read_node(child_id)?;

        child.keys.push(parent.keys[child_idx].clone());
        child.values.push(parent.values[child_idx].clone());

        parent.keys[child_idx] = right.keys.remove(0);
        parent.values[child_idx] = right.values.remove(0);

        if !right.leaf {
            let moved_child = right.children.remove(0);
            child.children.push(moved_child);
            let mut moved = self.store.read_node(moved_child)?;
            moved.parent = Some(child_id);
            self.store.write_node(&moved)?;
        }

        self.store.write_node(&right)?;
        self.store.write_node(&child)?;
        self.store.write_node(&parent)?;
        Ok(())
    }

    /// Merges `parent.children[left_idx]`, the separator key at
    /// `parent.keys[left_idx]`, and `parent.children[left_idx + 1]` into
    /// the left child; the right child's id is abandoned (spec.md's
    /// monotonic-append id allocator never reuses it; see SPEC_FULL.md
    /// §3.2).
    fn merge_children(&mut self, parent_id: u64, left_idx: usize) -> Result<(), Error> {
        let mut parent = self.store.read_node(parent_id)?;
        let left_id = parent.children[left_idx];
        let right_id = parent.children[left_idx + 1];
        let mut left = self.store.read_node(left_id)?;
        let right = self.store.read_node(right_id)?;

        left.keys.push(parent.keys.remove(left_idx));
        left.values.push(parent.values.remove(left_idx));
        parent.children.remove(left_idx + 1);

        left.keys.extend(right.keys);
        left.values.extend(right.values);

        if !left.leaf {
            left.children.extend(right.children.iter().copied());
            for &moved_id in &right.children {
                let mut moved = self.store.read_node(moved_id)?;
                moved.parent = Some(left_id);
                self.store.write_node(&moved)?;
            }
        }

        self.store.write_node(&left)?;
        self.store.write_node(&parent)?;
        self.store.forget(right_id);
        Ok(())
    }

    fn leftmost_position(&mut self) -> Result<Position, Error> {
        let mut node_id = self.store.root_id;
        loop {
            let node = self.store.read_node(node_id)?;
            if node.leaf {
                return Ok(if node.keys.is_empty() {
                    Position::End
                } else {
                    Position::At(node_id, 0)
                });
            }
            node_id = node.children[0];
        }
    }

    /// The smallest position satisfying `keys[slot] > key` (when
    /// `strictly_after`) or `keys[slot] >= key` (otherwise), found by a
    /// single root-to-leaf descent: each level's matching slot is at least
    /// as tight a bound as the last one found, so the deepest match wins.
    fn bound(&mut self, key: &K, strictly_after: bool) -> Result<Position, Error> {
        let mut node_id = self.store.root_id;
        let mut candidate = None;
        loop {
            let node = self.store.read_node(node_id)?;
            let slot = match node.keys.binary_search(key) {
                Ok(idx) => {
                    if strictly_after {
                        idx + 1
                    } else {
                        idx
                    }
                }
                Err(idx) => idx,
            };
            if slot < node.keys.len() {
                candidate = Some((node_id, slot));
            }
            if node.leaf {
                break;
            }
            node_id = node.children[slot];
        }
        Ok(match candidate {
            Some((id, slot)) => Position::At(id, slot),
            None => Position::End,
        })
    }

    /// The `[lo, hi]`-ish interval's boundary positions, with inclusivity
    /// chosen independently per endpoint (spec §4.2 "Iteration": `find_range`
    /// composes `lower_bound`/`upper_bound`).
    pub fn find_range(
        &mut self,
        lo: &K,
        hi: &K,
        lo_inclusive: bool,
        hi_inclusive: bool,
    ) -> Result<(Position, Position), Error> {
        let start = self.bound(lo, !lo_inclusive)?;
        let end = self.bound(hi, hi_inclusive)?;
        Ok((start, end))
    }

    /// A cursor resting at the given position, for resuming iteration
    /// (e.g. a `find_range` boundary).
    pub fn cursor_at(&mut self, position: Position) -> Cursor<'_, K, V> {
        Cursor {
            store: &mut self.store,
            position,
        }
    }

    /// A cursor at the first key in ascending order (or the end sentinel,
    /// if the tree is empty).
    pub fn begin(&mut self) -> Result<Cursor<'_, K, V>, Error> {
        let position = self.leftmost_position()?;
        Ok(self.cursor_at(position))
    }

    /// A cursor at the end sentinel, equal across every tree.
    pub fn end(&mut self) -> Cursor<'_, K, V> {
        self.cursor_at(Position::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn collect_keys<K: FixedSize + Ord, V: FixedSize>(tree: &mut BTreeDisk<K, V>) -> Vec<K> {
        let mut keys = Vec::new();
        let mut cursor = tree.begin().unwrap();
        loop {
            match cursor.current().unwrap() {
                Some((k, _)) => keys.push(k),
                None => break,
            }
            cursor.advance().unwrap();
        }
        keys
    }

    /// Walks every node and checks size bounds (spec §3.2 invariant 3) and
    /// leaf depth uniformity (invariant 4).
    fn assert_structural_invariants<K: FixedSize + Ord, V: FixedSize>(tree: &mut BTreeDisk<K, V>) {
        let t = tree.min_degree();
        let root_id = tree.store.root_id;
        let mut leaf_depths = Vec::new();

        fn walk<K: FixedSize + Ord, V: FixedSize>(
            tree: &mut BTreeDisk<K, V>,
            node_id: u64,
            is_root: bool,
            t: usize,
            depth: usize,
            leaf_depths: &mut Vec<usize>,
        ) {
            let node = tree.store.read_node(node_id).unwrap();
            assert!(
                node.keys.windows(2).all(|w| w[0] < w[1]),
                "keys out of order in node {node_id}"
            );
            if !is_root {
                assert!(
                    node.keys.len() >= t - 1 && node.keys.len() <= 2 * t - 1,
                    "node {node_id} has {} keys, outside [{}, {}]",
                    node.keys.len(),
                    t - 1,
                    2 * t - 1
                );
            }
            if node.leaf {
                leaf_depths.push(depth);
            } else {
                assert_eq!(node.children.len(), node.keys.len() + 1);
                for &child_id in &node.children {
                    walk(tree, child_id, false, t, depth + 1, leaf_depths);
                }
            }
        }

        walk(tree, root_id, true, t, 0, &mut leaf_depths);
        assert!(
            leaf_depths.iter().all(|d| *d == leaf_depths[0]),
            "leaves at unequal depths: {leaf_depths:?}"
        );
    }

    #[test]
    fn insert_then_find_round_trips_in_memory() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();

        assert!(tree.insert(10, 100).unwrap());
        assert!(tree.insert(20, 200).unwrap());
        assert_eq!(tree.at(&10).unwrap(), Some(100));
        assert_eq!(tree.at(&20).unwrap(), Some(200));
        assert_eq!(tree.at(&30).unwrap(), None);
    }

    #[test]
    fn duplicate_insert_is_rejected_and_tree_is_unchanged() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();

        assert!(tree.insert(10, 100).unwrap());
        assert!(!tree.insert(10, 999).unwrap());
        assert_eq!(tree.at(&10).unwrap(), Some(100));
        assert_eq!(collect_keys(&mut tree), vec![10]);
    }

    #[test]
    fn splitting_a_full_root_grows_the_tree_and_preserves_order() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();

        for key in [30, 10, 50, 20, 40, 5, 45, 60, 25, 35] {
            assert!(tree.insert(key, key * 10).unwrap());
        }

        assert_eq!(
            collect_keys(&mut tree),
            vec![5, 10, 20, 25, 30, 35, 40, 45, 50, 60]
        );
        assert_structural_invariants(&mut tree);
    }

    #[test]
    fn disk_persistence_round_trip_survives_close_and_reopen() {
        // spec.md §8 scenario 4: t=2, insert 10/20/5/17, close, reopen.
        let dir = tempdir().unwrap();
        let base = dir.path().join("index");
        {
            let mut tree: BTreeDisk<u64, crate::codec::FixedString<16>> =
                BTreeDisk::open(&base, 2).unwrap();
            tree.insert(10, "ten".into()).unwrap();
            tree.insert(20, "twenty".into()).unwrap();
            tree.insert(5, "five".into()).unwrap();
            tree.insert(17, "seventeen".into()).unwrap();
            tree.close().unwrap();
        }

        let mut tree: BTreeDisk<u64, crate::codec::FixedString<16>> =
            BTreeDisk::open(&base, 2).unwrap();
        assert_eq!(tree.at(&17).unwrap().unwrap().as_str(), "seventeen");
        assert_eq!(tree.at(&9).unwrap(), None);
        assert_eq!(collect_keys(&mut tree), vec![5, 10, 17, 20]);
    }

    #[test]
    fn erase_rebalances_and_preserves_ascending_order() {
        // spec.md §8 scenario 5: t=2, insert 10/20/30/40/50, erase 30.
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();

        for key in [10, 20, 30, 40, 50] {
            assert!(tree.insert(key, key).unwrap());
        }
        assert!(tree.erase(&30).unwrap());

        assert_eq!(collect_keys(&mut tree), vec![10, 20, 40, 50]);
        assert_eq!(tree.at(&30).unwrap(), None);
        assert_structural_invariants(&mut tree);
    }

    #[test]
    fn erase_of_absent_key_returns_false() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();
        tree.insert(10, 10).unwrap();
        assert!(!tree.erase(&999).unwrap());
    }

    #[test]
    fn erase_down_to_empty_tree_leaves_an_empty_leaf_root() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();
        for key in [10, 20, 30, 40, 50, 60, 70] {
            tree.insert(key, key).unwrap();
        }
        for key in [10, 20, 30, 40, 50, 60, 70] {
            assert!(tree.erase(&key).unwrap());
        }
        assert_eq!(collect_keys(&mut tree), Vec::<u64>::new());
        assert_eq!(tree.begin().unwrap().position(), tree.end().position());
    }

    #[test]
    fn find_range_honors_inclusivity_at_each_end() {
        // spec.md §8 scenario 6: t=3, insert 1..8, find_range(3,6, incl, excl).
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 3).unwrap();
        for key in 1u64..=8 {
            tree.insert(key, key).unwrap();
        }

        let (start, end) = tree.find_range(&3, &6, true, false).unwrap();
        let mut cursor = tree.cursor_at(start);
        let mut seen = Vec::new();
        while cursor.position() != end {
            let (k, _) = cursor.current().unwrap().unwrap();
            seen.push(k);
            cursor.advance().unwrap();
        }
        assert_eq!(seen, vec![3, 4, 5]);
        assert_eq!(cursor.position(), end);
    }

    #[test]
    fn find_path_records_the_descent_and_terminal_slot() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();
        for key in [30, 10, 50, 20, 40, 5, 45, 60, 25, 35] {
            tree.insert(key, key).unwrap();
        }

        let found = tree.find_path(&25).unwrap();
        assert!(found.found);
        assert!(!found.path.is_empty());

        let missing = tree.find_path(&999).unwrap();
        assert!(!missing.found);
    }

    #[test]
    fn structural_invariants_hold_after_heavy_mixed_traffic() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut tree: BTreeDisk<u64, u64> = BTreeDisk::open(&base, 2).unwrap();

        for key in 0u64..200 {
            tree.insert(key, key).unwrap();
        }
        for key in (0u64..200).step_by(3) {
            tree.erase(&key).unwrap();
        }
        assert_structural_invariants(&mut tree);

        let expected: Vec<u64> = (0u64..200).filter(|k| k % 3 != 0).collect();
        assert_eq!(collect_keys(&mut tree), expected);
    }
}
