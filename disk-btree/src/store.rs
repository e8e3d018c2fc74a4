//! The write-through page cache and index/data file plumbing (spec §4.2
//! "Persistence protocol", §6.3 on-disk layout).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use core_logger::Logger;

use crate::codec::FixedSize;
use crate::error::Error;
use crate::node::{Geometry, Node};

const CONTROL_ID: u64 = 0;
const FIRST_NODE_ID: u64 = 1;

pub(crate) struct Store<K, V> {
    index_file: File,
    data_file: File,
    geom: Geometry,
    pub(crate) root_id: u64,
    next_free_id: u64,
    cache: HashMap<u64, Node<K, V>>,
    logger: Option<Arc<dyn Logger>>,
    _marker: PhantomData<(K, V)>,
}

impl<K: FixedSize, V: FixedSize> Store<K, V> {
    pub(crate) fn open(
        base_path: &Path,
        t: usize,
        logger: Option<Arc<dyn Logger>>,
    ) -> Result<Self, Error> {
        let index_path = append_extension(base_path, "tree");
        let data_path = append_extension(base_path, "data");

        let geom = Geometry {
            t,
            key_len: K::ENCODED_LEN,
            value_len: V::ENCODED_LEN,
        };

        let index_existed = index_path.exists();

        let mut index_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&index_path)
            .map_err(|e| log_with(&logger, Error::from(e)))?;
        let data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&data_path)
            .map_err(|e| log_with(&logger, Error::from(e)))?;

        let index_len = if index_existed {
            Some(
                index_file
                    .metadata()
                    .map_err(|e| log_with(&logger, Error::from(e)))?
                    .len(),
            )
        } else {
            None
        };

        let mut store = if matches!(index_len, Some(len) if len >= geom.record_size() as u64) {
            let control_buf = read_record_raw(&mut index_file, geom.record_size(), CONTROL_ID)
                .map_err(|e| log_with(&logger, e))?;
            let root_id = LittleEndian::read_u64(&control_buf[0..8]);
            let next_free_id = LittleEndian::read_u64(&control_buf[8..16]);
            let on_disk_t = LittleEndian::read_u32(&control_buf[16..20]);
            let on_disk_key_len = LittleEndian::read_u32(&control_buf[20..24]);
            let on_disk_value_len = LittleEndian::read_u32(&control_buf[24..28]);

            if on_disk_t != t as u32
                || on_disk_key_len != geom.key_len as u32
                || on_disk_value_len != geom.value_len as u32
            {
                let err = Error::IncompatibleSchema {
                    on_disk_t,
                    on_disk_key_len,
                    on_disk_value_len,
                    requested_t: t as u32,
                    requested_key_len: geom.key_len as u32,
                    requested_value_len: geom.value_len as u32,
                };
                return Err(log_with(&logger, err));
            }

            if let Some(logger) = &logger {
                logger.information(&format!("Reopened disk b-tree at root id {root_id}"));
            }

            Self {
                index_file,
                data_file,
                geom,
                root_id,
                next_free_id,
                cache: HashMap::new(),
                logger,
                _marker: PhantomData,
            }
        } else {
            let mut store = Self {
                index_file,
                data_file,
                geom,
                root_id: FIRST_NODE_ID,
                next_free_id: FIRST_NODE_ID + 1,
                cache: HashMap::new(),
                logger,
                _marker: PhantomData,
            };
            let root = Node::new_leaf(FIRST_NODE_ID, None);
            store.write_node(&root)?;
            store.write_control()?;
            if let Some(logger) = &store.logger {
                logger.information("Created empty disk b-tree");
            }
            store
        };

        Ok(store)
    }

    pub(crate) fn geometry(&self) -> Geometry {
        self.geom
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_free_id;
        self.next_free_id += 1;
        id
    }

    pub(crate) fn read_node(&mut self, id: u64) -> Result<Node<K, V>, Error> {
        if let Some(node) = self.cache.get(&id) {
            return Ok(node.clone());
        }
        let buf = read_record_raw(&mut self.index_file, self.geom.record_size(), id)
            .map_err(|e| self.log_err(e))?;
        let node = Node::decode(id, &self.geom, &buf).map_err(|e| self.log_err(e))?;
        self.cache.insert(id, node.clone());
        Ok(node)
    }

    /// Write-through: every call both updates the cache and persists the
    /// record before returning, matching spec §5's "any operation that
    /// returns has persisted its structural changes to the index file".
    pub(crate) fn write_node(&mut self, node: &Node<K, V>) -> Result<(), Error> {
        let mut buf = vec![0u8; self.geom.record_size()];
        node.encode(&self.geom, &mut buf);
        write_record_raw(&mut self.index_file, self.geom.record_size(), node.id, &buf)
            .map_err(|e| self.log_err(e))?;
        self.cache.insert(node.id, node.clone());
        Ok(())
    }

    pub(crate) fn forget(&mut self, id: u64) {
        self.cache.remove(&id);
    }

    pub(crate) fn write_control(&mut self) -> Result<(), Error> {
        let mut buf = vec![0u8; self.geom.record_size()];
        LittleEndian::write_u64(&mut buf[0..8], self.root_id);
        LittleEndian::write_u64(&mut buf[8..16], self.next_free_id);
        LittleEndian::write_u32(&mut buf[16..20], self.geom.t as u32);
        LittleEndian::write_u32(&mut buf[20..24], self.geom.key_len as u32);
        LittleEndian::write_u32(&mut buf[24..28], self.geom.value_len as u32);
        write_record_raw(&mut self.index_file, self.geom.record_size(), CONTROL_ID, &buf)
            .map_err(|e| self.log_err(e))
    }

    /// Best-effort fsync at close (spec.md §1 Non-goals: no crash-safe
    /// durability guarantee beyond this).
    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        self.index_file.flush().map_err(|e| self.log_err(Error::from(e)))?;
        self.index_file.sync_all().map_err(|e| self.log_err(Error::from(e)))?;
        self.data_file.sync_all().map_err(|e| self.log_err(Error::from(e)))?;
        if let Some(logger) = &self.logger {
            logger.debug("Flushed disk b-tree to storage");
        }
        Ok(())
    }

    pub(crate) fn logger(&self) -> Option<&Arc<dyn Logger>> {
        self.logger.as_ref()
    }

    /// Logs `err` at `error` level through the installed logger, if any,
    /// then hands it back so the caller can still propagate it with `?`.
    fn log_err(&self, err: Error) -> Error {
        log_with(&self.logger, err)
    }
}

/// Logs `err` at `error` level through `logger`, if installed, then hands
/// it back unchanged. Used both by [`Store`] methods (via
/// [`Store::log_err`]) and by [`Store::open`], where no `Store` value
/// exists yet to hang a method off of.
fn log_with(logger: &Option<Arc<dyn Logger>>, err: Error) -> Error {
    if let Some(logger) = logger {
        logger.error(&err.to_string());
    }
    err
}

fn append_extension(base: &Path, ext: &str) -> std::path::PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(".");
    path.push(ext);
    std::path::PathBuf::from(path)
}

fn read_record_raw(file: &mut File, record_size: usize, id: u64) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; record_size];
    file.seek(SeekFrom::Start(id * record_size as u64))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_record_raw(file: &mut File, record_size: usize, id: u64, buf: &[u8]) -> Result<(), Error> {
    debug_assert_eq!(buf.len(), record_size);
    file.seek(SeekFrom::Start(id * record_size as u64))?;
    file.write_all(buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_tree_creates_root_leaf() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        let mut store: Store<u64, u64> = Store::open(&base, 2, None).unwrap();
        let root = store.read_node(store.root_id).unwrap();
        assert!(root.leaf);
        assert_eq!(root.keys.len(), 0);
        assert!(base.with_extension("tree").exists());
        assert!(base.with_extension("data").exists());
    }

    #[test]
    fn reopen_with_mismatched_t_is_rejected() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        {
            let mut store: Store<u64, u64> = Store::open(&base, 2, None).unwrap();
            store.write_control().unwrap();
        }
        let err = Store::<u64, u64>::open(&base, 3, None).unwrap_err();
        assert!(matches!(err, Error::IncompatibleSchema { .. }));
    }

    #[test]
    fn node_writes_are_durable_across_reopen() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("t");
        {
            let mut store: Store<u64, u64> = Store::open(&base, 2, None).unwrap();
            let mut root = store.read_node(store.root_id).unwrap();
            root.keys.push(10);
            root.values.push(100);
            store.write_node(&root).unwrap();
            store.flush().unwrap();
        }
        let mut store: Store<u64, u64> = Store::open(&base, 2, None).unwrap();
        let root = store.read_node(store.root_id).unwrap();
        assert_eq!(root.keys, vec![10]);
    }
}
