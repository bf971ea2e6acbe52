use crate::density::{AspectModel, DensityMap};
use serde::{Deserialize, Serialize};
use tilesplit_types::area::Area;

/// A rectangle of density grid cells with its node count.
///
/// Coordinates are cell indices into the [`DensityMap`] the tile was taken
/// from, not map units. Use [`Tile::to_area`] to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Number of nodes in the covered cells
    pub count: u64,
}

/// Exact bounds of a tile, used to memoize search results.
pub(crate) type TileKey = (usize, usize, usize, usize);

impl Tile {
    pub fn new(x: usize, y: usize, width: usize, height: usize, count: u64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            count,
        }
    }

    /// Tile covering the whole density map.
    pub fn from_map(map: &DensityMap) -> Self {
        Self::new(0, 0, map.width(), map.height(), map.total())
    }

    pub(crate) fn key(&self) -> TileKey {
        (self.x, self.y, self.width, self.height)
    }

    pub fn is_single_cell(&self) -> bool {
        self.width == 1 && self.height == 1
    }

    /// Sum the covered cells of the density map.
    pub fn compute_count(&self, map: &DensityMap) -> u64 {
        (self.x..self.x + self.width)
            .map(|x| self.col_sum(map, x))
            .sum()
    }

    /// Check that the memoized count matches the density map.
    pub fn verify_count(&self, map: &DensityMap) -> bool {
        self.compute_count(map) == self.count
    }

    /// Sum of column `x` (absolute grid index) within the tile's rows.
    pub fn col_sum(&self, map: &DensityMap, x: usize) -> u64 {
        map.column(x)
            .map(|column| column[self.y..self.y + self.height].iter().sum())
            .unwrap_or(0)
    }

    /// Sum of row `y` (absolute grid index) within the tile's columns.
    pub fn row_sum(&self, map: &DensityMap, y: usize) -> u64 {
        (self.x..self.x + self.width)
            .map(|x| map.node_count(x, y))
            .sum()
    }

    /// Ground-corrected width over height.
    pub fn aspect_ratio(&self, model: &AspectModel) -> f64 {
        model.ratio(self.y, self.width, self.height)
    }

    /// Shrink the tile to the smallest rectangle holding all its nodes.
    ///
    /// An empty tile is returned unchanged.
    pub fn trim(&self, map: &DensityMap) -> Tile {
        if self.count == 0 {
            return *self;
        }
        let cols: Vec<usize> = (self.x..self.x + self.width)
            .filter(|&x| self.col_sum(map, x) > 0)
            .collect();
        let rows: Vec<usize> = (self.y..self.y + self.height)
            .filter(|&y| self.row_sum(map, y) > 0)
            .collect();
        match (cols.first(), cols.last(), rows.first(), rows.last()) {
            (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) => {
                Tile::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1, self.count)
            }
            _ => *self,
        }
    }

    /// Cut the tile at column offset `pos` when the left part holds
    /// `left_count` nodes.
    pub(crate) fn cut_cols(&self, pos: usize, left_count: u64) -> (Tile, Tile) {
        debug_assert!(pos > 0 && pos < self.width);
        let left = Tile::new(self.x, self.y, pos, self.height, left_count);
        let right = Tile::new(
            self.x + pos,
            self.y,
            self.width - pos,
            self.height,
            self.count - left_count,
        );
        (left, right)
    }

    /// Cut the tile at row offset `pos` when the lower part holds
    /// `lower_count` nodes.
    pub(crate) fn cut_rows(&self, pos: usize, lower_count: u64) -> (Tile, Tile) {
        debug_assert!(pos > 0 && pos < self.height);
        let lower = Tile::new(self.x, self.y, self.width, pos, lower_count);
        let upper = Tile::new(
            self.x,
            self.y + pos,
            self.width,
            self.height - pos,
            self.count - lower_count,
        );
        (lower, upper)
    }

    /// Split into a left part of `pos` columns and a right part.
    pub fn split_horiz(&self, pos: usize, map: &DensityMap) -> (Tile, Tile) {
        let left_count = (self.x..self.x + pos).map(|x| self.col_sum(map, x)).sum();
        self.cut_cols(pos, left_count)
    }

    /// Split into a lower part of `pos` rows and an upper part.
    pub fn split_vert(&self, pos: usize, map: &DensityMap) -> (Tile, Tile) {
        let lower_count = (self.y..self.y + pos).map(|y| self.row_sum(map, y)).sum();
        self.cut_rows(pos, lower_count)
    }

    /// Map-unit rectangle covered by the tile.
    pub fn to_area(&self, map: &DensityMap) -> Area {
        Area::new(
            map.row_to_lat(self.y),
            map.col_to_lon(self.x),
            map.row_to_lat(self.y + self.height),
            map.col_to_lon(self.x + self.width),
        )
    }
}
