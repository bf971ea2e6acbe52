//! Interning of tile combinations.
//!
//! The [`AreaDictionary`] maps each distinct [`AreaSet`] to a dense integer
//! id. Ids `0..tile_count` are reserved for the single tiles, so the common
//! case of a record belonging to one tile needs no lookup at all. Larger
//! combinations get ids from `tile_count` upwards, in interning order.

mod set;

pub use set::{AreaSet, BitSet, SORTED_SET_LIMIT, SortedSet, TileSet};

use crate::config::{DictionaryConfig, IdWidth};
use crate::error::{Result, SplitError};
use rustc_hash::{FxHashMap, FxHashSet};
use tilesplit_types::area::Area;

/// Dictionary of tile combinations for one set of tiles.
#[derive(Debug)]
pub struct AreaDictionary {
    tiles: Vec<Area>,
    extended: Vec<Area>,
    /// Set for every id, singletons first.
    sets: Vec<AreaSet>,
    /// Ids of the multi-tile combinations.
    index: FxHashMap<AreaSet, u32>,
    /// Ids of combinations whose tiles form an exact rectangle.
    simple: FxHashSet<u32>,
    id_width: IdWidth,
}

impl AreaDictionary {
    /// Create a dictionary for `tiles`, each extended by `overlap` map units.
    ///
    /// Runs the simple-neighbour pre-pass, so combinations of adjacent tiles
    /// that form a rectangle are interned up front.
    pub fn new(tiles: Vec<Area>, overlap: i32, config: &DictionaryConfig) -> Result<Self> {
        let capacity = config.id_width.capacity();
        if tiles.len() as u64 > capacity {
            return Err(SplitError::DictionaryFull { capacity });
        }

        let extended = tiles.iter().map(|area| area.extend(overlap)).collect();
        let sets = (0..tiles.len() as u32).map(AreaSet::single).collect();
        let mut dict = Self {
            tiles,
            extended,
            sets,
            index: FxHashMap::default(),
            simple: FxHashSet::default(),
            id_width: config.id_width,
        };
        dict.find_simple_neighbours(config.max_simple_combinations, config.max_simple_group)?;
        Ok(dict)
    }

    /// Id of `set`, interning it if it has not been seen before.
    ///
    /// Equal member sets always yield the same id, whatever their
    /// representation or insertion order.
    pub fn intern(&mut self, set: AreaSet) -> Result<u32> {
        let Some(last) = set.last() else {
            return Err(SplitError::InvalidInput(
                "cannot intern an empty tile combination".to_string(),
            ));
        };
        if last as usize >= self.tiles.len() {
            return Err(SplitError::InvalidInput(format!(
                "tile index {} out of range for {} tiles",
                last,
                self.tiles.len()
            )));
        }
        if set.len() == 1 {
            return Ok(last);
        }
        if let Some(&id) = self.index.get(&set) {
            return Ok(id);
        }

        let capacity = self.id_width.capacity();
        if self.sets.len() as u64 >= capacity {
            return Err(SplitError::DictionaryFull { capacity });
        }
        let id = self.sets.len() as u32;
        self.sets.push(set.clone());
        self.index.insert(set, id);
        if id % 10_000 == 0 {
            log::debug!("Area dictionary holds {} combinations", self.sets.len());
        }
        Ok(id)
    }

    /// Intern the combination of the given tile indices.
    pub fn intern_tiles(&mut self, tiles: &[u32]) -> Result<u32> {
        let set = AreaSet::from_tiles(tiles.iter().copied(), self.tiles.len());
        self.intern(set)
    }

    /// Id of the union of two interned combinations.
    pub fn union_ids(&mut self, a: u32, b: u32) -> Result<u32> {
        if a == b {
            return Ok(a);
        }
        let (Some(set_a), Some(set_b)) = (self.resolve(a), self.resolve(b)) else {
            return Err(SplitError::InvalidInput(format!(
                "unknown dictionary id {a} or {b}"
            )));
        };
        let union = set_a.union(set_b, self.tiles.len());
        self.intern(union)
    }

    /// Tiles of an interned combination.
    pub fn resolve(&self, id: u32) -> Option<&AreaSet> {
        self.sets.get(id as usize)
    }

    /// Id of an already interned combination.
    pub fn lookup(&self, set: &AreaSet) -> Option<u32> {
        match set.len() {
            0 => None,
            1 => set.last().filter(|&tile| (tile as usize) < self.tiles.len()),
            _ => self.index.get(set).copied(),
        }
    }

    /// Whether a record assigned to `set` may straddle a tile boundary and so
    /// needs an exact geometry test.
    ///
    /// Single tiles and simple-neighbour combinations never do.
    pub fn may_cross_boundary(&self, set: &AreaSet) -> bool {
        if set.len() <= 1 {
            return false;
        }
        !self
            .index
            .get(set)
            .is_some_and(|id| self.simple.contains(id))
    }

    /// Whether `id` is a combination of tiles forming an exact rectangle.
    pub fn is_simple_neighbour(&self, id: u32) -> bool {
        self.simple.contains(&id)
    }

    /// Ids below this value denote single tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of ids handed out, singletons included.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn tile(&self, index: u32) -> Option<&Area> {
        self.tiles.get(index as usize)
    }

    pub fn extended_bounds(&self, index: u32) -> Option<&Area> {
        self.extended.get(index as usize)
    }

    pub(crate) fn all_extended_bounds(&self) -> &[Area] {
        &self.extended
    }

    pub fn id_width(&self) -> IdWidth {
        self.id_width
    }

    /// Find groups of up to `max_group` tiles whose union is an exact
    /// rectangle, interning at most `max_results` of them.
    ///
    /// Starting from single tiles, any two disjoint groups sharing a complete
    /// edge merge into a new group. Each round only pairs groups where at
    /// least one was created in the previous round.
    fn find_simple_neighbours(&mut self, max_results: usize, max_group: usize) -> Result<()> {
        if max_group < 2 || max_results == 0 {
            return Ok(());
        }

        let singles = self.tiles.len();
        let mut groups: Vec<(Vec<u32>, Area)> = (0..singles as u32)
            .map(|i| (vec![i], self.tiles[i as usize]))
            .collect();
        let mut seen: FxHashSet<Vec<u32>> = FxHashSet::default();
        let mut fresh = 0;

        'rounds: loop {
            let known = groups.len();
            let mut merged = Vec::new();
            for j in fresh..known {
                for i in 0..j {
                    let (a, a_bounds) = &groups[i];
                    let (b, b_bounds) = &groups[j];
                    if a.len() + b.len() > max_group
                        || !forms_rectangle(a_bounds, b_bounds)
                        || a.iter().any(|tile| b.contains(tile))
                    {
                        continue;
                    }
                    let mut members: Vec<u32> = a.iter().chain(b.iter()).copied().collect();
                    members.sort_unstable();
                    if !seen.insert(members.clone()) {
                        continue;
                    }
                    merged.push((members, a_bounds.union(b_bounds)));
                    if known - singles + merged.len() >= max_results {
                        groups.extend(merged);
                        break 'rounds;
                    }
                }
            }
            if merged.is_empty() {
                break;
            }
            fresh = known;
            groups.extend(merged);
        }

        for (members, _) in &groups[singles..] {
            let id = self.intern_tiles(members)?;
            self.simple.insert(id);
        }
        log::debug!(
            "Found {} simple neighbour combinations for {} tiles",
            groups.len() - singles,
            singles
        );
        Ok(())
    }
}

/// Whether two disjoint rectangles share a complete edge.
fn forms_rectangle(a: &Area, b: &Area) -> bool {
    let same_rows = a.min_lat == b.min_lat && a.max_lat == b.max_lat;
    let same_cols = a.min_long == b.min_long && a.max_long == b.max_long;
    (same_rows && (a.max_long == b.min_long || b.max_long == a.min_long))
        || (same_cols && (a.max_lat == b.min_lat || b.max_lat == a.min_lat))
}
