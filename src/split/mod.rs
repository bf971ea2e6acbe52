//! Constraint-driven tile splitting.
//!
//! [`TileSplitter`] turns a [`DensityMap`] into a list of tiles, each holding
//! at most `max_count` nodes and having an acceptable ground aspect ratio.
//!
//! The search is a recursive bisection: a tile that fails the stopping test is
//! cut near the point where its column (or row) sums pass half its count, and
//! both halves are solved recursively. Cut positions within `spread` cells of
//! that point are tried in turn. Rectangles that provably cannot be solved are
//! memoized until the constraints change.
//!
//! An outer loop reruns the search with adjusted constraints and keeps the
//! best-rated solution.
//!
//! ```rust
//! use tilesplit::{DensityMap, SplitConfig, TileSplitter};
//! use tilesplit_types::area::Area;
//!
//! let mut map = DensityMap::new(Area::from_degrees(50.0, 5.0, 52.0, 7.0), 13)?;
//! for i in 0..1000 {
//!     map.add_node(2_330_000 + i * 40, 240_000 + i * 40);
//! }
//! let config = SplitConfig::default().with_max_nodes(300);
//! let splitter = TileSplitter::new(map, config)?;
//! let result = splitter.split_map();
//! assert!(result.tiles.iter().all(|t| t.count <= 300));
//! # Ok::<(), tilesplit::SplitError>(())
//! ```

mod meta;
mod tile;

pub use tile::Tile;

use crate::config::SplitConfig;
use crate::density::{AspectModel, DensityMap};
use crate::error::{Result, SplitError};
use meta::{Axis, TileMetaInfo};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tile::TileKey;
use tilesplit_types::area::Area;

/// Outcome of a splitting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitResult {
    /// Tiles in output order
    pub tiles: Vec<Tile>,
    /// Indices into `tiles` of single-cell tiles above `max_count`
    pub oversized: Vec<usize>,
    /// Sum of per-tile aspect penalties; lower is better
    pub rating: f64,
    /// Outer iterations that were run
    pub iterations: usize,
    /// Node limit the result was computed for
    pub max_count: u64,
}

impl SplitResult {
    fn new(tiles: Vec<Tile>, max_count: u64, rating: f64, iterations: usize) -> Self {
        let oversized = tiles
            .iter()
            .enumerate()
            .filter(|(_, tile)| tile.count > max_count)
            .map(|(i, _)| i)
            .collect();
        Self {
            tiles,
            oversized,
            rating,
            iterations,
            max_count,
        }
    }

    /// Whether some tile exceeds the node limit.
    pub fn has_oversized(&self) -> bool {
        !self.oversized.is_empty()
    }

    /// Sum of all tile counts.
    pub fn total_count(&self) -> u64 {
        self.tiles.iter().map(|tile| tile.count).sum()
    }

    /// Map-unit rectangles of the tiles, in output order.
    pub fn areas(&self, map: &DensityMap) -> Vec<Area> {
        self.tiles.iter().map(|tile| tile.to_area(map)).collect()
    }
}

/// Limits for one run of the recursive search.
#[derive(Debug, Clone, Copy)]
struct Constraints {
    max_count: u64,
    min_nodes: u64,
    min_aspect: f64,
    max_aspect: f64,
    spread: usize,
    step_limit: Option<u64>,
}

impl Constraints {
    fn initial(max_count: u64, config: &SplitConfig) -> Self {
        Self {
            max_count,
            min_nodes: 0,
            min_aspect: 1.0 / config.max_aspect,
            max_aspect: config.max_aspect,
            spread: 0,
            step_limit: Some(config.search_limit),
        }
    }

    /// Limits under which every tile can be solved.
    fn unconstrained(max_count: u64) -> Self {
        Self {
            max_count,
            min_nodes: 0,
            min_aspect: 0.0,
            max_aspect: f64::INFINITY,
            spread: 0,
            step_limit: None,
        }
    }
}

enum Verdict {
    Accept,
    Reject,
    Split,
}

/// One run of the recursive search under fixed constraints.
struct Search<'a> {
    map: &'a DensityMap,
    aspect: &'a AspectModel,
    trim: bool,
    limits: Constraints,
    unsolvable: &'a mut FxHashSet<TileKey>,
    steps: u64,
    aborted: bool,
}

impl<'a> Search<'a> {
    fn new(
        splitter: &'a TileSplitter,
        limits: Constraints,
        unsolvable: &'a mut FxHashSet<TileKey>,
    ) -> Self {
        Self {
            map: &splitter.map,
            aspect: &splitter.aspect,
            trim: splitter.config.trim,
            limits,
            unsolvable,
            steps: 0,
            aborted: false,
        }
    }

    fn check(&self, tile: &Tile, depth: usize) -> Verdict {
        if tile.count == 0 {
            return Verdict::Accept;
        }
        if tile.is_single_cell() && tile.count > self.limits.max_count {
            return Verdict::Accept;
        }
        if tile.count < self.limits.min_nodes {
            return if depth == 0 {
                Verdict::Accept
            } else {
                Verdict::Reject
            };
        }
        if tile.count <= self.limits.max_count {
            let ratio = tile.aspect_ratio(self.aspect);
            if ratio >= self.limits.min_aspect && ratio <= self.limits.max_aspect {
                return Verdict::Accept;
            }
        }
        Verdict::Split
    }

    fn solve(&mut self, tile: Tile, meta: TileMetaInfo, depth: usize) -> Option<Vec<Tile>> {
        self.steps += 1;
        if let Some(limit) = self.limits.step_limit
            && self.steps > limit
        {
            self.aborted = true;
            return None;
        }

        match self.check(&tile, depth) {
            Verdict::Accept if tile.count == 0 => Some(Vec::new()),
            Verdict::Accept => Some(vec![tile]),
            Verdict::Reject => None,
            Verdict::Split => {
                let key = tile.key();
                if self.unsolvable.contains(&key) {
                    return None;
                }
                let solution = self.split_tile(&tile, &meta, depth);
                if solution.is_none() && !self.aborted {
                    self.unsolvable.insert(key);
                }
                solution
            }
        }
    }

    fn split_tile(&mut self, tile: &Tile, meta: &TileMetaInfo, depth: usize) -> Option<Vec<Tile>> {
        let axes = if tile.aspect_ratio(self.aspect) >= 1.0 {
            [Axis::Cols, Axis::Rows]
        } else {
            [Axis::Rows, Axis::Cols]
        };

        for axis in axes {
            let len = match axis {
                Axis::Cols => tile.width,
                Axis::Rows => tile.height,
            };
            if len < 2 {
                continue;
            }
            let middle = meta.middle(axis, tile.count);
            for pos in cut_positions(middle, self.limits.spread, len) {
                let ((first, first_meta), (second, second_meta)) =
                    meta.divide(tile, axis, pos, self.map);
                let (first, first_meta) = self.prepare(first, first_meta);
                let (second, second_meta) = self.prepare(second, second_meta);

                let Some(mut tiles) = self.solve(first, first_meta, depth + 1) else {
                    if self.aborted {
                        return None;
                    }
                    continue;
                };
                let Some(rest) = self.solve(second, second_meta, depth + 1) else {
                    if self.aborted {
                        return None;
                    }
                    continue;
                };
                tiles.extend(rest);
                return Some(tiles);
            }
        }
        None
    }

    fn prepare(&self, tile: Tile, meta: TileMetaInfo) -> (Tile, TileMetaInfo) {
        if self.trim { meta.trim(tile) } else { (tile, meta) }
    }
}

/// Cut positions around `middle`, nearest first, within `1..len`.
fn cut_positions(middle: usize, spread: usize, len: usize) -> Vec<usize> {
    let mut positions = Vec::with_capacity(2 * spread + 1);
    let mut push = |pos: usize| {
        if pos >= 1 && pos < len && !positions.contains(&pos) {
            positions.push(pos);
        }
    };
    push(middle);
    for offset in 1..=spread {
        if let Some(pos) = middle.checked_sub(offset) {
            push(pos);
        }
        push(middle + offset);
    }
    positions
}

/// Splits a density map into tiles.
pub struct TileSplitter {
    map: DensityMap,
    aspect: AspectModel,
    config: SplitConfig,
}

impl TileSplitter {
    pub fn new(map: DensityMap, config: SplitConfig) -> Result<Self> {
        config.validate()?;
        let aspect = AspectModel::new(&map);
        Ok(Self {
            map,
            aspect,
            config,
        })
    }

    pub fn map(&self) -> &DensityMap {
        &self.map
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Tile covering the whole map, trimmed when trimming is enabled.
    pub fn root_tile(&self) -> Tile {
        let tile = Tile::from_map(&self.map);
        if self.config.trim {
            tile.trim(&self.map)
        } else {
            tile
        }
    }

    /// Split the whole map with the configured node limit.
    pub fn split_map(&self) -> SplitResult {
        self.split(self.root_tile(), self.config.max_nodes)
    }

    /// Split `root` into tiles of at most `max_count` nodes.
    ///
    /// Single cells above the limit cannot be divided and are returned as
    /// oversized tiles, listed in [`SplitResult::oversized`].
    pub fn split(&self, root: Tile, max_count: u64) -> SplitResult {
        let max_count = max_count.max(1);
        if root.count == 0 {
            return SplitResult::new(Vec::new(), max_count, 0.0, 0);
        }

        let root_meta = TileMetaInfo::new(&root, &self.map);
        let mut limits = Constraints::initial(max_count, &self.config);
        let mut unsolvable = FxHashSet::default();
        let mut best: Option<(Vec<Tile>, f64)> = None;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;
            unsolvable.clear();

            let mut search = Search::new(self, limits, &mut unsolvable);
            let solution = search.solve(root, root_meta.clone(), 0);
            let steps = search.steps;
            let aborted = search.aborted;

            match solution {
                Some(tiles) => {
                    let rating = self.rate(&tiles);
                    log::debug!(
                        "Iteration {}: {} tiles, rating {:.2}, min_nodes {}, aspect {:.3}..{:.1}, spread {}, {} steps",
                        iterations,
                        tiles.len(),
                        rating,
                        limits.min_nodes,
                        limits.min_aspect,
                        limits.max_aspect,
                        limits.spread,
                        steps
                    );
                    // a floor at or below the smallest tile reproduces this solution
                    let smallest = tiles.iter().map(|tile| tile.count).min().unwrap_or(0);
                    let whole = tiles.len() <= 1;
                    if best.as_ref().is_none_or(|(_, r)| rating < *r) {
                        best = Some((tiles, rating));
                    }

                    let next_min = (limits.min_nodes + (max_count / 20).max(1)).max(smallest + 1);
                    if whole || next_min > max_count / 2 {
                        break;
                    }
                    limits.min_nodes = next_min;
                }
                None => {
                    log::debug!(
                        "Iteration {}: no solution (aborted: {}), min_nodes {}, aspect {:.3}..{:.1}, spread {}",
                        iterations,
                        aborted,
                        limits.min_nodes,
                        limits.min_aspect,
                        limits.max_aspect,
                        limits.spread
                    );
                    if best.is_some() {
                        break;
                    }
                    if limits.spread < self.config.max_spread {
                        limits.spread += 1;
                    } else {
                        limits.spread = 0;
                        limits.max_aspect *= 2.0;
                        limits.min_aspect /= 2.0;
                        limits.min_nodes /= 2;
                    }
                }
            }
        }

        let (tiles, rating) = match best {
            Some(best) => best,
            None => {
                log::warn!(
                    "No constrained solution after {} iterations, splitting without shape limits",
                    iterations
                );
                unsolvable.clear();
                let mut search =
                    Search::new(self, Constraints::unconstrained(max_count), &mut unsolvable);
                let tiles = search.solve(root, root_meta, 0).unwrap_or_else(|| vec![root]);
                let rating = self.rate(&tiles);
                (tiles, rating)
            }
        };

        let result = SplitResult::new(tiles, max_count, rating, iterations);
        log::info!(
            "Split {} nodes into {} tiles (max {} per tile, rating {:.2})",
            root.count,
            result.tiles.len(),
            max_count,
            result.rating
        );
        for &i in &result.oversized {
            let tile = &result.tiles[i];
            log::warn!(
                "Tile {} at {} holds {} nodes, above the limit of {}; use a higher resolution",
                i,
                tile.to_area(&self.map),
                tile.count,
                max_count
            );
        }
        result
    }

    /// Split the whole map into (as close as possible to) `num_tiles` tiles.
    ///
    /// Bisects the node limit; the result is the smallest limit that yields no
    /// more than `num_tiles` tiles.
    pub fn split_to_count(&self, num_tiles: usize) -> Result<SplitResult> {
        if num_tiles == 0 {
            return Err(SplitError::InvalidInput(
                "number of tiles must be greater than zero".to_string(),
            ));
        }
        let root = self.root_tile();
        if root.count == 0 {
            return Ok(self.split(root, self.config.max_nodes));
        }

        let mut lo = root.count.div_ceil(num_tiles as u64).max(1);
        let mut hi = root.count;
        let mut best: Option<SplitResult> = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let result = self.split(root, mid);
            if result.tiles.len() <= num_tiles {
                hi = mid;
                best = Some(result);
            } else {
                lo = mid + 1;
            }
        }

        let result = match best {
            Some(result) if result.max_count == lo => result,
            _ => self.split(root, lo),
        };
        if result.tiles.len() != num_tiles {
            log::warn!(
                "Requested {} tiles, closest split has {} tiles (max {} nodes)",
                num_tiles,
                result.tiles.len(),
                result.max_count
            );
        }
        Ok(result)
    }

    /// Sum of aspect penalties: a square tile costs 1, elongated tiles more.
    fn rate(&self, tiles: &[Tile]) -> f64 {
        tiles
            .iter()
            .map(|tile| {
                let ratio = tile.aspect_ratio(&self.aspect);
                if ratio >= 1.0 { ratio } else { 1.0 / ratio }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesplit_types::units::{round_down, to_map_unit};

    /// 16x16 grid near the equator, 16 map units per cell.
    fn map_with(cells: &[(usize, usize, u32)]) -> DensityMap {
        let mut map = DensityMap::new(Area::new(0, 0, 256, 256), 20).unwrap();
        for &(x, y, count) in cells {
            for _ in 0..count {
                map.add_node((y * 16) as i32, (x * 16) as i32);
            }
        }
        map
    }

    fn splitter(map: DensityMap) -> TileSplitter {
        TileSplitter::new(map, SplitConfig::default().with_resolution(20)).unwrap()
    }

    /// Cells of 16 map units near 86N, where a single cell is far narrower
    /// than tall on the ground.
    fn polar_map(width: usize, height: usize, cells: &[(usize, usize, u32)]) -> DensityMap {
        let lat0 = round_down(to_map_unit(86.0), 4);
        let bounds = Area::new(lat0, 0, lat0 + (height * 16) as i32, (width * 16) as i32);
        let mut map = DensityMap::new(bounds, 20).unwrap();
        for &(x, y, count) in cells {
            for _ in 0..count {
                map.add_node(lat0 + (y * 16) as i32, (x * 16) as i32);
            }
        }
        assert_eq!((map.width(), map.height()), (width, height));
        map
    }

    #[test]
    fn test_cut_positions() {
        assert_eq!(cut_positions(3, 0, 8), vec![3]);
        assert_eq!(cut_positions(3, 2, 8), vec![3, 2, 4, 1, 5]);
        assert_eq!(cut_positions(1, 2, 3), vec![1, 2]);
    }

    #[test]
    fn test_empty_map() {
        let s = splitter(map_with(&[]));
        let result = s.split_map();
        assert!(result.tiles.is_empty());
        assert!(!result.has_oversized());
    }

    #[test]
    fn test_small_map_is_single_tile() {
        let s = splitter(map_with(&[(2, 2, 10), (3, 3, 10)]));
        let result = s.split(s.root_tile(), 100);
        assert_eq!(result.tiles.len(), 1);
        assert_eq!(result.tiles[0].count, 20);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_count_conservation() {
        let cells: Vec<(usize, usize, u32)> = (0..16)
            .flat_map(|x| (0..16).map(move |y| (x, y, ((x * 7 + y * 3) % 11) as u32)))
            .collect();
        let map = map_with(&cells);
        let total = map.total();
        let s = splitter(map);
        let result = s.split(s.root_tile(), total / 9);

        assert_eq!(result.total_count(), total);
        assert!(result.tiles.len() >= 9);
        for tile in &result.tiles {
            assert!(tile.count <= total / 9);
            assert!(tile.verify_count(s.map()));
        }
    }

    #[test]
    fn test_tiles_do_not_overlap() {
        let cells: Vec<(usize, usize, u32)> = (0..16)
            .flat_map(|x| (0..16).map(move |y| (x, y, 1 + (x % 3) as u32)))
            .collect();
        let s = splitter(map_with(&cells));
        let result = s.split(s.root_tile(), 60);
        for (i, a) in result.tiles.iter().enumerate() {
            for b in &result.tiles[i + 1..] {
                let disjoint = a.x + a.width <= b.x
                    || b.x + b.width <= a.x
                    || a.y + a.height <= b.y
                    || b.y + b.height <= a.y;
                assert!(disjoint, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_single_dense_cell_is_oversized() {
        let s = splitter(map_with(&[(5, 9, 1000)]));
        let result = s.split(s.root_tile(), 400);
        assert_eq!(result.tiles.len(), 1);
        assert!(result.tiles[0].is_single_cell());
        assert_eq!(result.oversized, vec![0]);
    }

    #[test]
    fn test_untrimmed_search_isolates_dense_cell() {
        let map = map_with(&[(5, 9, 1000)]);
        let config = SplitConfig::default().with_resolution(20).with_trim(false);
        let s = TileSplitter::new(map, config).unwrap();
        let result = s.split(s.root_tile(), 400);
        assert_eq!(result.tiles.len(), 1);
        assert_eq!(result.tiles[0], Tile::new(5, 9, 1, 1, 1000));
        assert!(result.has_oversized());
    }

    #[test]
    fn test_deterministic() {
        let cells: Vec<(usize, usize, u32)> = (0..16)
            .flat_map(|x| (0..16).map(move |y| (x, y, ((x * 13 + y * 5) % 17) as u32)))
            .collect();
        let s = splitter(map_with(&cells));
        let a = s.split(s.root_tile(), 150);
        let b = s.split(s.root_tile(), 150);
        assert_eq!(a.tiles, b.tiles);
        assert_eq!(a.rating, b.rating);
    }

    #[test]
    fn test_split_to_count() {
        let cells: Vec<(usize, usize, u32)> = (0..16)
            .flat_map(|x| (0..16).map(move |y| (x, y, 4)))
            .collect();
        let s = splitter(map_with(&cells));
        let result = s.split_to_count(4).unwrap();
        assert!(result.tiles.len() <= 4);
        assert_eq!(result.total_count(), 1024);
        assert!(s.split_to_count(0).is_err());
    }

    #[test]
    fn test_aspect_limits_loosen_until_solved() {
        let map = polar_map(2, 2, &[(0, 0, 100), (1, 0, 100), (0, 1, 100), (1, 1, 100)]);
        let s = splitter(map);
        let result = s.split(s.root_tile(), 150);

        // four runs over the spread range fail before the aspect bounds double
        assert_eq!(result.iterations, 5);
        assert_eq!(result.tiles.len(), 4);
        assert!(result.tiles.iter().all(|tile| tile.is_single_cell() && tile.count == 100));
        assert!(!result.has_oversized());
        assert_eq!(result.total_count(), 400);
    }

    #[test]
    fn test_unconstrained_fallback() {
        let map = polar_map(2, 2, &[(0, 0, 100), (1, 0, 100), (0, 1, 100), (1, 1, 100)]);
        let config = SplitConfig::default()
            .with_resolution(20)
            .with_max_iterations(1);
        let s = TileSplitter::new(map, config).unwrap();
        let result = s.split(s.root_tile(), 150);

        assert_eq!(result.iterations, 1);
        assert_eq!(result.tiles.len(), 4);
        assert_eq!(result.total_count(), 400);
        assert!(!result.has_oversized());
    }

    #[test]
    fn test_spread_moves_cut_off_middle() {
        let map = polar_map(4, 1, &[(0, 0, 100), (1, 0, 10), (2, 0, 10), (3, 0, 10)]);
        let s = splitter(map);
        let result = s.split(s.root_tile(), 120);

        // the middle cut leaves a lone cell too narrow to accept
        assert_eq!(
            result.tiles,
            vec![Tile::new(0, 0, 2, 1, 110), Tile::new(2, 0, 2, 1, 20)]
        );
        assert_eq!(result.iterations, 3);
    }
}
