//! Small sets of tile indices.
//!
//! A record usually belongs to one tile, sometimes to a handful. [`SortedSet`]
//! keeps such sets as a short sorted list; [`BitSet`] is a dense bit vector
//! for the rare large combinations. [`AreaSet`] picks one at construction and
//! compares and hashes by members only, so both forms can be used as the same
//! map key.

use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// Sets up to this size are stored as sorted lists.
pub const SORTED_SET_LIMIT: usize = 10;

/// Operations shared by all tile-index set representations.
pub trait TileSet {
    fn contains(&self, tile: u32) -> bool;

    /// Add a tile, returning `false` if it was already present.
    fn insert(&mut self, tile: u32) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Members in ascending order.
    fn iter(&self) -> impl Iterator<Item = u32> + '_;

    /// Largest member.
    fn last(&self) -> Option<u32>;
}

/// Sorted list of tile indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SortedSet {
    tiles: SmallVec<[u32; 4]>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TileSet for SortedSet {
    fn contains(&self, tile: u32) -> bool {
        self.tiles.binary_search(&tile).is_ok()
    }

    fn insert(&mut self, tile: u32) -> bool {
        match self.tiles.binary_search(&tile) {
            Ok(_) => false,
            Err(pos) => {
                self.tiles.insert(pos, tile);
                true
            }
        }
    }

    fn len(&self) -> usize {
        self.tiles.len()
    }

    fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.tiles.iter().copied()
    }

    fn last(&self) -> Option<u32> {
        self.tiles.last().copied()
    }
}

/// Bit vector of tile indices, grown on insert.
#[derive(Debug, Clone)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Create an empty set able to hold indices `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: 0,
        }
    }
}

impl TileSet for BitSet {
    fn contains(&self, tile: u32) -> bool {
        let (word, bit) = ((tile / 64) as usize, tile % 64);
        self.words
            .get(word)
            .is_some_and(|w| w & (1u64 << bit) != 0)
    }

    fn insert(&mut self, tile: u32) -> bool {
        let (word, bit) = ((tile / 64) as usize, tile % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        if self.words[word] & mask != 0 {
            return false;
        }
        self.words[word] |= mask;
        self.len += 1;
        true
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros();
                bits &= bits - 1;
                Some(i as u32 * 64 + bit)
            })
        })
    }

    fn last(&self) -> Option<u32> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i as u32 * 64 + 63 - w.leading_zeros())
    }
}

/// A combination of tiles, stored in whichever form suits its size.
#[derive(Debug, Clone)]
pub enum AreaSet {
    Sorted(SortedSet),
    Bits(BitSet),
}

impl AreaSet {
    /// Empty set for tile indices `0..universe`, expecting about
    /// `expected_len` members.
    pub fn with_expected_len(universe: usize, expected_len: usize) -> Self {
        if expected_len <= SORTED_SET_LIMIT {
            AreaSet::Sorted(SortedSet::new())
        } else {
            AreaSet::Bits(BitSet::with_capacity(universe))
        }
    }

    /// Set holding a single tile.
    pub fn single(tile: u32) -> Self {
        let mut set = SortedSet::new();
        set.insert(tile);
        AreaSet::Sorted(set)
    }

    /// Build a set from tile indices in any order, duplicates allowed.
    pub fn from_tiles<I: IntoIterator<Item = u32>>(tiles: I, universe: usize) -> Self {
        let mut sorted: SmallVec<[u32; 8]> = tiles.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        let mut set = Self::with_expected_len(universe, sorted.len());
        for tile in sorted {
            set.insert(tile);
        }
        set
    }

    /// Members of both sets.
    pub fn union(&self, other: &AreaSet, universe: usize) -> AreaSet {
        Self::from_tiles(self.iter().chain(other.iter()), universe)
    }

    pub fn is_subset(&self, other: &AreaSet) -> bool {
        self.len() <= other.len() && self.iter().all(|tile| other.contains(tile))
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

impl TileSet for AreaSet {
    fn contains(&self, tile: u32) -> bool {
        match self {
            AreaSet::Sorted(set) => set.contains(tile),
            AreaSet::Bits(set) => set.contains(tile),
        }
    }

    fn insert(&mut self, tile: u32) -> bool {
        match self {
            AreaSet::Sorted(set) => set.insert(tile),
            AreaSet::Bits(set) => set.insert(tile),
        }
    }

    fn len(&self) -> usize {
        match self {
            AreaSet::Sorted(set) => set.len(),
            AreaSet::Bits(set) => set.len(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let (sorted, bits) = match self {
            AreaSet::Sorted(set) => (Some(set.iter()), None),
            AreaSet::Bits(set) => (None, Some(set.iter())),
        };
        sorted
            .into_iter()
            .flatten()
            .chain(bits.into_iter().flatten())
    }

    fn last(&self) -> Option<u32> {
        match self {
            AreaSet::Sorted(set) => set.last(),
            AreaSet::Bits(set) => set.last(),
        }
    }
}

impl PartialEq for AreaSet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AreaSet::Sorted(a), AreaSet::Sorted(b)) => a == b,
            _ => self.len() == other.len() && self.iter().eq(other.iter()),
        }
    }
}

impl Eq for AreaSet {}

impl Hash for AreaSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for tile in self.iter() {
            state.write_u32(tile);
        }
    }
}
