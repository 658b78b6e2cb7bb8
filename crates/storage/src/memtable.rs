//! Ordered in-memory store with a durable snapshot file.
//!
//! # Snapshot Layout
//!
//! The whole map is serialized to `kvengine.dat` under the data directory
//! with a length-prefixed framing, all integers little-endian:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ count (u64)  │ per entry: klen (u4) key vlen (u4) value     │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! A missing file is equivalent to an empty store. The snapshot is written
//! to a temporary file and renamed into place, so an interrupted flush
//! leaves the previous snapshot intact.

use brine_core::{display_key, Error, Key, Result, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the store snapshot under the data directory.
pub const STORE_FILE: &str = "kvengine.dat";

/// Ordered mapping from key to value, guarded by a single internal mutex.
///
/// All operations are infallible once the store is initialized, except
/// `flush` and `load`, which touch the file system. `scan` returns a
/// snapshot of the matching entries so concurrent mutations are never
/// observed by an iterator.
#[derive(Debug)]
pub struct MemStore {
    path: PathBuf,
    data: Mutex<BTreeMap<Key, Value>>,
}

impl MemStore {
    /// Open the store rooted at `data_dir`, loading an existing snapshot
    /// file if one is present.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;

        let store = MemStore {
            path: data_dir.join(STORE_FILE),
            data: Mutex::new(BTreeMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    /// Insert or overwrite a key.
    pub fn put(&self, key: &[u8], value: &[u8]) {
        self.data.lock().insert(key.to_vec(), value.to_vec());
    }

    /// Look up a key, cloning the value out.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.data.lock().get(key).cloned()
    }

    /// Remove a key. Returns true if it was present.
    pub fn remove(&self, key: &[u8]) -> bool {
        self.data.lock().remove(key).is_some()
    }

    /// True if the key is present.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// True if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Approximate payload bytes held in memory (key and value lengths).
    pub fn memory_usage(&self) -> usize {
        self.data
            .lock()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Snapshot iterator over every entry whose key starts with `prefix`,
    /// in ascending key order.
    ///
    /// Matching entries are copied out under the lock, so the returned
    /// iterator observes none of the mutations performed after this call.
    pub fn scan(&self, prefix: &[u8]) -> Scan {
        let data = self.data.lock();
        let entries: Vec<(Key, Value)> = data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Scan {
            entries: entries.into_iter(),
        }
    }

    /// Serialize the entire map to the snapshot file.
    ///
    /// Writes to `kvengine.dat.tmp`, fsyncs, then renames over the live
    /// file.
    pub fn flush(&self) -> Result<()> {
        let data = self.data.lock();

        let tmp_path = self.path.with_extension("dat.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&(data.len() as u64).to_le_bytes())?;
        for (key, value) in data.iter() {
            writer.write_all(&(key.len() as u32).to_le_bytes())?;
            writer.write_all(key)?;
            writer.write_all(&(value.len() as u32).to_le_bytes())?;
            writer.write_all(value)?;
        }

        let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        debug!(entries = data.len(), path = %self.path.display(), "store snapshot flushed");
        Ok(())
    }

    /// Replace the in-memory contents with the snapshot file.
    ///
    /// A missing file leaves the store empty.
    pub fn load(&self) -> Result<()> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut data = self.data.lock();
                data.clear();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let loaded = decode_snapshot(&bytes)?;
        let mut data = self.data.lock();
        *data = loaded;
        debug!(entries = data.len(), "store snapshot loaded");
        Ok(())
    }
}

/// Snapshot iterator returned by [`MemStore::scan`].
///
/// Finite, restartable in the sense that a new `scan` call produces a fresh
/// snapshot from the current store state.
pub struct Scan {
    entries: std::vec::IntoIter<(Key, Value)>,
}

impl Iterator for Scan {
    type Item = (Key, Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Scan {}

fn decode_snapshot(bytes: &[u8]) -> Result<BTreeMap<Key, Value>> {
    let mut map = BTreeMap::new();
    let mut offset = 0usize;

    let count = read_u64(bytes, &mut offset)?;
    for i in 0..count {
        let key = read_chunk(bytes, &mut offset)
            .map_err(|_| Error::corruption(format!("store snapshot truncated at entry {i}")))?;
        let value = read_chunk(bytes, &mut offset)
            .map_err(|_| Error::corruption(format!("store snapshot truncated at entry {i}")))?;
        if map.insert(key.clone(), value).is_some() {
            warn!(key = %display_key(&key), "duplicate key in store snapshot");
        }
    }
    if offset != bytes.len() {
        warn!(
            trailing = bytes.len() - offset,
            "trailing bytes after store snapshot entries"
        );
    }
    Ok(map)
}

fn read_u64(bytes: &[u8], offset: &mut usize) -> Result<u64> {
    let end = offset
        .checked_add(8)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::corruption("store snapshot shorter than its header"))?;
    let value = u64::from_le_bytes(bytes[*offset..end].try_into().unwrap());
    *offset = end;
    Ok(value)
}

fn read_chunk(bytes: &[u8], offset: &mut usize) -> Result<Vec<u8>> {
    let len_end = offset
        .checked_add(4)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::corruption("short length prefix"))?;
    let len = u32::from_le_bytes(bytes[*offset..len_end].try_into().unwrap()) as usize;
    let end = len_end
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::corruption("short chunk body"))?;
    let chunk = bytes[len_end..end].to_vec();
    *offset = end;
    Ok(chunk)
}

fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        // Persist the rename itself on platforms where that matters.
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
