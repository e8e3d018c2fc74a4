//! Cursor-based iteration over a tree's keys in ascending order (spec
//! §4.2 "Iteration"): parent-pointer ascent on `++`, symmetric descent on
//! `--`, and a distinguished end sentinel equal across every cursor.

use crate::codec::FixedSize;
use crate::error::Error;
use crate::store::Store;

/// A comparable cursor position: either resting on a `(node_id, slot)`
/// pair, or the distinguished end sentinel. Cheap to copy and compare,
/// so a range's end boundary can be carried around without holding a
/// second live borrow of the tree (see [`crate::BTreeDisk::find_range`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Resting on key slot `slot` of node `node_id`.
    At(u64, usize),
    /// Past the last key of the tree.
    End,
}

/// A live cursor over one tree, borrowing it for the cursor's lifetime
/// (the tree has a single logical owner; a cursor counts as use of it).
pub struct Cursor<'a, K, V> {
    pub(crate) store: &'a mut Store<K, V>,
    pub(crate) position: Position,
}

impl<'a, K: FixedSize + Ord, V: FixedSize> Cursor<'a, K, V> {
    /// The cursor's current position, comparable against another cursor's
    /// or against a bare [`Position`] returned by `find_range`.
    pub fn position(&self) -> Position {
        self.position
    }

    /// The key/value pair at the current position, or `None` at the end
    /// sentinel.
    pub fn current(&mut self) -> Result<Option<(K, V)>, Error> {
        match self.position {
            Position::End => Ok(None),
            Position::At(id, slot) => {
                let node = self.store.read_node(id)?;
                Ok(Some((node.keys[slot].clone(), node.values[slot].clone())))
            }
        }
    }

    /// Advances to the in-order successor.
    pub fn advance(&mut self) -> Result<(), Error> {
        let (id, slot) = match self.position {
            Position::At(id, slot) => (id, slot),
            Position::End => return Ok(()),
        };
        let node = self.store.read_node(id)?;
        if !node.leaf {
            let mut cur = node.children[slot + 1];
            loop {
                let n = self.store.read_node(cur)?;
                if n.leaf {
                    self.position = Position::At(cur, 0);
                    return Ok(());
                }
                cur = n.children[0];
            }
        }

        let mut cur_id = id;
        let mut cur_slot = slot + 1;
        loop {
            let n = self.store.read_node(cur_id)?;
            if cur_slot < n.key_count() {
                self.position = Position::At(cur_id, cur_slot);
                return Ok(());
            }
            match n.parent {
                None => {
                    self.position = Position::End;
                    return Ok(());
                }
                Some(parent_id) => {
                    let parent = self.store.read_node(parent_id)?;
                    let child_index = parent
                        .children
                        .iter()
                        .position(|&c| c == cur_id)
                        .expect("parent/child link is consistent");
                    cur_id = parent_id;
                    cur_slot = child_index;
                }
            }
        }
    }

    /// Retreats to the in-order predecessor. Retreating from the end
    /// sentinel lands on the last key of the tree.
    pub fn retreat(&mut self) -> Result<(), Error> {
        match self.position {
            Position::End => {
                let mut cur = self.store.root_id;
                loop {
                    let n = self.store.read_node(cur)?;
                    if n.leaf {
                        self.position = if n.key_count() == 0 {
                            Position::End
                        } else {
                            Position::At(cur, n.key_count() - 1)
                        };
                        return Ok(());
                    }
                    cur = *n.children.last().expect("internal node has children");
                }
            }
            Position::At(id, slot) => {
                let node = self.store.read_node(id)?;
                if !node.leaf {
                    let mut cur = node.children[slot];
                    loop {
                        let n = self.store.read_node(cur)?;
                        if n.leaf {
                            self.position = Position::At(cur, n.key_count().saturating_sub(1));
                            return Ok(());
                        }
                        cur = *n.children.last().expect("internal node has children");
                    }
                } else if slot > 0 {
                    self.position = Position::At(id, slot - 1);
                    Ok(())
                } else {
                    let mut child_id = id;
                    let mut parent_opt = node.parent;
                    loop {
                        match parent_opt {
                            None => return Ok(()),
                            Some(parent_id) => {
                                let parent = self.store.read_node(parent_id)?;
                                let child_index = parent
                                    .children
                                    .iter()
                                    .position(|&c| c == child_id)
                                    .expect("parent/child link is consistent");
                                if child_index > 0 {
                                    self.position = Position::At(parent_id, child_index - 1);
                                    return Ok(());
                                }
                                child_id = parent_id;
                                parent_opt = parent.parent;
                            }
                        }
                    }
                }
            }
        }
    }
}
