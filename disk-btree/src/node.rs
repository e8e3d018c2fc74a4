//! In-memory node shape and its fixed-size on-disk record (spec §3.2,
//! §6.3): `leaf_flag | key_count | parent_id | keys[2t-1] | values[2t-1] |
//! child_ids[2t]`.

use byteorder::{ByteOrder, LittleEndian};

use crate::codec::FixedSize;
use crate::error::Error;

/// Node id `0` is reserved for the control record and doubles as the "no
/// parent" / "no child" sentinel (every real node is allocated id `>= 1`).
pub(crate) const NIL_ID: u64 = 0;

/// Byte geometry shared by every node record in one tree: derived once
/// from `t` and the encoded widths of `K`/`V`, then reused for every
/// encode/decode call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Geometry {
    pub(crate) t: usize,
    pub(crate) key_len: usize,
    pub(crate) value_len: usize,
}

impl Geometry {
    pub(crate) fn max_keys(&self) -> usize {
        2 * self.t - 1
    }

    pub(crate) fn max_children(&self) -> usize {
        2 * self.t
    }

    /// Total bytes one node record occupies in the index file.
    pub(crate) fn record_size(&self) -> usize {
        1 + 4
            + 8
            + self.max_keys() * (self.key_len + self.value_len)
            + self.max_children() * 8
    }
}

/// One B-tree node, fully materialised in memory.
#[derive(Debug, Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) id: u64,
    pub(crate) leaf: bool,
    pub(crate) parent: Option<u64>,
    pub(crate) keys: Vec<K>,
    pub(crate) values: Vec<V>,
    /// Empty for a leaf; otherwise `keys.len() + 1` entries.
    pub(crate) children: Vec<u64>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new_leaf(id: u64, parent: Option<u64>) -> Self {
        Self {
            id,
            leaf: true,
            parent,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }
}

impl<K: FixedSize, V: FixedSize> Node<K, V> {
    pub(crate) fn encode(&self, geom: &Geometry, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), geom.record_size());
        buf.fill(0);
        buf[0] = self.leaf as u8;
        LittleEndian::write_u32(&mut buf[1..5], self.keys.len() as u32);
        LittleEndian::write_u64(&mut buf[5..13], self.parent.unwrap_or(NIL_ID));

        let keys_start = 13;
        let values_start = keys_start + geom.max_keys() * geom.key_len;
        let children_start = values_start + geom.max_keys() * geom.value_len;

        for (i, key) in self.keys.iter().enumerate() {
            let at = keys_start + i * geom.key_len;
            key.encode(&mut buf[at..at + geom.key_len]);
        }
        for (i, value) in self.values.iter().enumerate() {
            let at = values_start + i * geom.value_len;
            value.encode(&mut buf[at..at + geom.value_len]);
        }
        for (i, child) in self.children.iter().enumerate() {
            let at = children_start + i * 8;
            LittleEndian::write_u64(&mut buf[at..at + 8], *child);
        }
    }

    pub(crate) fn decode(id: u64, geom: &Geometry, buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != geom.record_size() {
            return Err(Error::CorruptRecord {
                id,
                reason: format!(
                    "expected {} bytes, read {}",
                    geom.record_size(),
                    buf.len()
                ),
            });
        }

        let leaf = match buf[0] {
            0 => false,
            1 => true,
            other => {
                return Err(Error::CorruptRecord {
                    id,
                    reason: format!("leaf flag byte {other} is neither 0 nor 1"),
                })
            }
        };
        let key_count = LittleEndian::read_u32(&buf[1..5]) as usize;
        if key_count > geom.max_keys() {
            return Err(Error::CorruptRecord {
                id,
                reason: format!("key count {key_count} exceeds 2t-1={}", geom.max_keys()),
            });
        }
        let parent_raw = LittleEndian::read_u64(&buf[5..13]);
        let parent = if parent_raw == NIL_ID {
            None
        } else {
            Some(parent_raw)
        };

        let keys_start = 13;
        let values_start = keys_start + geom.max_keys() * geom.key_len;
        let children_start = values_start + geom.max_keys() * geom.value_len;

        let mut keys = Vec::with_capacity(key_count);
        for i in 0..key_count {
            let at = keys_start + i * geom.key_len;
            keys.push(K::decode(&buf[at..at + geom.key_len]));
        }
        let mut values = Vec::with_capacity(key_count);
        for i in 0..key_count {
            let at = values_start + i * geom.value_len;
            values.push(V::decode(&buf[at..at + geom.value_len]));
        }

        let children = if leaf {
            Vec::new()
        } else {
            let mut children = Vec::with_capacity(key_count + 1);
            for i in 0..=key_count {
                let at = children_start + i * 8;
                children.push(LittleEndian::read_u64(&buf[at..at + 8]));
            }
            children
        };

        Ok(Self {
            id,
            leaf,
            parent,
            keys,
            values,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_node_round_trips() {
        let geom = Geometry {
            t: 2,
            key_len: 8,
            value_len: 8,
        };
        let mut node: Node<u64, u64> = Node::new_leaf(3, Some(1));
        node.keys = vec![10, 20];
        node.values = vec![100, 200];

        let mut buf = vec![0u8; geom.record_size()];
        node.encode(&geom, &mut buf);
        let decoded = Node::<u64, u64>::decode(3, &geom, &buf).unwrap();

        assert_eq!(decoded.leaf, true);
        assert_eq!(decoded.parent, Some(1));
        assert_eq!(decoded.keys, vec![10, 20]);
        assert_eq!(decoded.values, vec![100, 200]);
        assert!(decoded.children.is_empty());
    }

    #[test]
    fn internal_node_round_trips_children() {
        let geom = Geometry {
            t: 2,
            key_len: 8,
            value_len: 8,
        };
        let mut node: Node<u64, u64> = Node::new_leaf(1, None);
        node.leaf = false;
        node.keys = vec![15];
        node.values = vec![150];
        node.children = vec![2, 3];

        let mut buf = vec![0u8; geom.record_size()];
        node.encode(&geom, &mut buf);
        let decoded = Node::<u64, u64>::decode(1, &geom, &buf).unwrap();

        assert_eq!(decoded.leaf, false);
        assert_eq!(decoded.parent, None);
        assert_eq!(decoded.children, vec![2, 3]);
    }

    #[test]
    fn rejects_key_count_beyond_capacity() {
        let geom = Geometry {
            t: 2,
            key_len: 8,
            value_len: 8,
        };
        let mut buf = vec![0u8; geom.record_size()];
        LittleEndian::write_u32(&mut buf[1..5], 99);
        let err = Node::<u64, u64>::decode(1, &geom, &buf).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }
}
