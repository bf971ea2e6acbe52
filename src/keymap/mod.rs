//! Sparse map from 64-bit keys to 32-bit values.
//!
//! Keys are split into a chunk id (`key >> 6`) and an offset within a
//! 64-slot chunk. Chunk ids are grouped into pages of 256 chunks held in a
//! hash directory. Every stored chunk is compressed; writes go through one
//! uncompressed open chunk that is packed again when writing moves to a
//! different chunk or on [`SparseKeyMap::flush`].
//!
//! The layout suits keys arriving in mostly increasing order, as element
//! ids in a sorted input file do.

mod chunk;

pub use chunk::Encoding;

use crate::error::{Result, SplitError};
use chunk::{CHUNK_SIZE, PackedChunk};
use rustc_hash::FxHashMap;
use std::fmt;

/// Value reported for keys that are not in the map. Cannot be stored.
pub const UNASSIGNED: u32 = u32::MAX;

const CHUNK_BITS: u32 = 6;
const PAGE_BITS: u32 = 8;
const PAGE_MASK: u64 = (1 << PAGE_BITS) - 1;

#[inline]
fn split_key(key: u64) -> (u64, usize) {
    (key >> CHUNK_BITS, (key & (CHUNK_SIZE as u64 - 1)) as usize)
}

#[derive(Debug, Default)]
struct Page {
    chunks: Vec<Option<PackedChunk>>,
    used: usize,
}

#[derive(Debug)]
struct OpenChunk {
    id: u64,
    mask: u64,
    values: [u32; CHUNK_SIZE],
    modified: bool,
}

impl OpenChunk {
    fn new(id: u64) -> Self {
        Self {
            id,
            mask: 0,
            values: [UNASSIGNED; CHUNK_SIZE],
            modified: false,
        }
    }

    fn get(&self, offset: usize) -> u32 {
        if self.mask & (1 << offset) != 0 {
            self.values[offset]
        } else {
            UNASSIGNED
        }
    }
}

/// Memory statistics of a [`SparseKeyMap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMapStats {
    pub keys: u64,
    /// Keys held in packed chunks, excluding the open chunk
    pub packed_keys: u64,
    pub pages: usize,
    pub chunks: usize,
    pub single_value_chunks: usize,
    pub flat_chunks: usize,
    pub run_length_chunks: usize,
    /// Bytes of encoded chunk data
    pub data_bytes: usize,
    /// Approximate heap bytes in use
    pub heap_bytes: usize,
}

impl KeyMapStats {
    /// Average encoded bytes per stored key.
    pub fn bytes_per_key(&self) -> f64 {
        if self.keys == 0 {
            0.0
        } else {
            self.heap_bytes as f64 / self.keys as f64
        }
    }
}

impl fmt::Display for KeyMapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} keys in {} chunks ({} single, {} flat, {} run-length) over {} pages, {} bytes ({:.2} per key)",
            self.keys,
            self.chunks,
            self.single_value_chunks,
            self.flat_chunks,
            self.run_length_chunks,
            self.pages,
            self.heap_bytes,
            self.bytes_per_key()
        )
    }
}

/// Compressed sparse map of `u64` keys to `u32` values.
///
/// # Examples
///
/// ```
/// use tilesplit::keymap::{SparseKeyMap, UNASSIGNED};
///
/// let mut map = SparseKeyMap::new();
/// map.put(1_000_000, 3).unwrap();
/// map.put(1_000_001, 3).unwrap();
/// assert_eq!(map.get(1_000_001), 3);
/// assert_eq!(map.get(42), UNASSIGNED);
/// ```
#[derive(Debug, Default)]
pub struct SparseKeyMap {
    pages: FxHashMap<u64, Page>,
    open: Option<OpenChunk>,
    len: u64,
}

impl SparseKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `key`, returning the previous value or
    /// [`UNASSIGNED`].
    pub fn put(&mut self, key: u64, value: u32) -> Result<u32> {
        if value == UNASSIGNED {
            return Err(SplitError::ReservedValue(value));
        }
        let (chunk_id, offset) = split_key(key);
        let open = self.open_chunk(chunk_id);
        let previous = open.get(offset);
        open.values[offset] = value;
        open.mask |= 1 << offset;
        open.modified = true;
        if previous == UNASSIGNED {
            self.len += 1;
        }
        Ok(previous)
    }

    /// Value for `key`, or [`UNASSIGNED`].
    pub fn get(&self, key: u64) -> u32 {
        let (chunk_id, offset) = split_key(key);
        if let Some(open) = &self.open
            && open.id == chunk_id
        {
            return open.get(offset);
        }
        self.packed(chunk_id)
            .and_then(|chunk| chunk.get(offset))
            .unwrap_or(UNASSIGNED)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.get(key) != UNASSIGNED
    }

    /// Remove `key`, returning its value or [`UNASSIGNED`].
    pub fn remove(&mut self, key: u64) -> u32 {
        let (chunk_id, offset) = split_key(key);
        if self.get(key) == UNASSIGNED {
            return UNASSIGNED;
        }
        let open = self.open_chunk(chunk_id);
        let previous = open.get(offset);
        open.mask &= !(1 << offset);
        open.values[offset] = UNASSIGNED;
        open.modified = true;
        self.len -= 1;
        previous
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.open = None;
        self.len = 0;
    }

    /// Pack and close the open chunk.
    pub fn flush(&mut self) {
        if let Some(open) = self.open.take()
            && open.modified
        {
            self.store(open.id, PackedChunk::encode(open.mask, &open.values));
        }
    }

    /// All entries in ascending key order.
    pub fn iter(&mut self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.flush();
        let this: &Self = self;
        let mut page_ids: Vec<u64> = this.pages.keys().copied().collect();
        page_ids.sort_unstable();
        page_ids.into_iter().flat_map(move |page_id| {
            this.pages[&page_id]
                .chunks
                .iter()
                .enumerate()
                .filter_map(|(index, chunk)| chunk.as_ref().map(|chunk| (index, chunk)))
                .flat_map(move |(index, chunk)| {
                    let chunk_id = (page_id << PAGE_BITS) | index as u64;
                    chunk
                        .entries()
                        .map(move |(offset, value)| ((chunk_id << CHUNK_BITS) | offset as u64, value))
                })
        })
    }

    pub fn stats(&self) -> KeyMapStats {
        let mut stats = KeyMapStats {
            keys: self.len,
            pages: self.pages.len(),
            ..Default::default()
        };
        let mut heap = self.pages.capacity()
            * (std::mem::size_of::<u64>() + std::mem::size_of::<Page>());
        for page in self.pages.values() {
            heap += page.chunks.capacity() * std::mem::size_of::<Option<PackedChunk>>();
            for chunk in page.chunks.iter().flatten() {
                stats.chunks += 1;
                stats.packed_keys += chunk.len() as u64;
                stats.data_bytes += chunk.byte_len();
                match chunk.encoding() {
                    Encoding::Single => stats.single_value_chunks += 1,
                    Encoding::Flat => stats.flat_chunks += 1,
                    Encoding::RunLength => stats.run_length_chunks += 1,
                }
            }
        }
        if self.open.is_some() {
            heap += std::mem::size_of::<OpenChunk>();
        }
        stats.heap_bytes = heap + stats.data_bytes;
        stats
    }

    pub fn log_stats(&self) {
        log::info!("Key map: {}", self.stats());
    }

    /// Make `chunk_id` the open chunk, packing the previous one.
    fn open_chunk(&mut self, chunk_id: u64) -> &mut OpenChunk {
        if self.open.as_ref().is_none_or(|open| open.id != chunk_id) {
            self.flush();
            let mut chunk = OpenChunk::new(chunk_id);
            if let Some(packed) = self.packed(chunk_id) {
                packed.decode_into(&mut chunk.values);
                chunk.mask = packed.mask();
            }
            self.open = Some(chunk);
        }
        self.open.get_or_insert_with(|| OpenChunk::new(chunk_id))
    }

    fn packed(&self, chunk_id: u64) -> Option<&PackedChunk> {
        let page = self.pages.get(&(chunk_id >> PAGE_BITS))?;
        page.chunks.get((chunk_id & PAGE_MASK) as usize)?.as_ref()
    }

    fn store(&mut self, chunk_id: u64, chunk: Option<PackedChunk>) {
        let page_id = chunk_id >> PAGE_BITS;
        let index = (chunk_id & PAGE_MASK) as usize;
        match chunk {
            Some(chunk) => {
                let page = self.pages.entry(page_id).or_default();
                if index >= page.chunks.len() {
                    page.chunks.resize_with(index + 1, || None);
                }
                if page.chunks[index].replace(chunk).is_none() {
                    page.used += 1;
                }
            }
            None => {
                let Some(page) = self.pages.get_mut(&page_id) else {
                    return;
                };
                if page.chunks.get_mut(index).and_then(Option::take).is_some() {
                    page.used -= 1;
                }
                if page.used == 0 {
                    self.pages.remove(&page_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut map = SparseKeyMap::new();
        assert_eq!(map.put(10, 5).unwrap(), UNASSIGNED);
        assert_eq!(map.put(10, 6).unwrap(), 5);
        assert_eq!(map.get(10), 6);
        assert_eq!(map.get(11), UNASSIGNED);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_reserved_value_rejected() {
        let mut map = SparseKeyMap::new();
        assert!(matches!(
            map.put(1, UNASSIGNED),
            Err(SplitError::ReservedValue(_))
        ));
        assert!(map.is_empty());
    }

    #[test]
    fn test_values_survive_chunk_switches() {
        let mut map = SparseKeyMap::new();
        for key in 0..1000u64 {
            map.put(key * 7, (key % 13) as u32).unwrap();
        }
        // revisit an already packed chunk
        map.put(14, 99).unwrap();
        for key in 0..1000u64 {
            let expected = if key == 2 { 99 } else { (key % 13) as u32 };
            assert_eq!(map.get(key * 7), expected, "key {}", key * 7);
        }
        assert_eq!(map.len(), 1000);
    }

    #[test]
    fn test_reads_do_not_need_flush() {
        let mut map = SparseKeyMap::new();
        map.put(5, 1).unwrap();
        map.put(500, 2).unwrap();
        assert_eq!(map.get(5), 1);
        assert_eq!(map.get(500), 2);
        map.flush();
        assert_eq!(map.get(500), 2);
    }

    #[test]
    fn test_large_and_sparse_keys() {
        let mut map = SparseKeyMap::new();
        let keys = [0u64, 63, 64, 1 << 20, 1 << 40, u64::MAX];
        for (i, &key) in keys.iter().enumerate() {
            map.put(key, i as u32).unwrap();
        }
        for (i, &key) in keys.iter().enumerate() {
            assert_eq!(map.get(key), i as u32);
        }
        assert!(!map.contains(65));
    }

    #[test]
    fn test_remove() {
        let mut map = SparseKeyMap::new();
        map.put(3, 1).unwrap();
        map.put(200, 2).unwrap();
        assert_eq!(map.remove(3), 1);
        assert_eq!(map.remove(3), UNASSIGNED);
        assert_eq!(map.get(3), UNASSIGNED);
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove(200), 2);
        map.flush();
        assert!(map.is_empty());
        assert_eq!(map.stats().chunks, 0);
        assert_eq!(map.stats().pages, 0);
    }

    #[test]
    fn test_iter_ascending() {
        let mut map = SparseKeyMap::new();
        let keys = [1u64 << 33, 70, 5, 1 << 15, 64];
        for &key in &keys {
            map.put(key, (key % 1000) as u32).unwrap();
        }
        let entries: Vec<(u64, u32)> = map.iter().collect();
        let mut expected: Vec<(u64, u32)> = keys.iter().map(|&k| (k, (k % 1000) as u32)).collect();
        expected.sort_unstable();
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_stats_count_encodings() {
        let mut map = SparseKeyMap::new();
        // chunk 0: one repeated value
        for key in 0..64 {
            map.put(key, 4).unwrap();
        }
        // chunk 1: distinct values
        for key in 64..128 {
            map.put(key, key as u32).unwrap();
        }
        map.put(200, 9).unwrap();
        assert_eq!(map.stats().packed_keys, 128);
        map.flush();
        let stats = map.stats();
        assert_eq!(stats.keys, 129);
        assert_eq!(stats.packed_keys, 129);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.single_value_chunks, 2);
        assert_eq!(stats.flat_chunks, 1);
        assert_eq!(stats.pages, 1);
        assert!(stats.bytes_per_key() > 0.0);
    }

    #[test]
    fn test_clear() {
        let mut map = SparseKeyMap::new();
        map.put(1, 1).unwrap();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.get(1), UNASSIGNED);
    }
}
