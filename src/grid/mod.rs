//! Uniform grid index from coordinates to tile combinations.
//!
//! [`AreaGrid`] lays a fixed grid over the extended bounds of all tiles. Each
//! cell stores the dictionary id of the tiles overlapping it and whether a
//! coordinate in the cell still needs an exact containment test. Cells with
//! too many candidate tiles get one level of finer sub-grid.

use crate::config::GridConfig;
use crate::dictionary::{AreaDictionary, TileSet};
use crate::error::Result;
use smallvec::SmallVec;
use tilesplit_types::area::Area;

/// Result of a grid lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridHit {
    /// Dictionary id of the candidate tiles
    pub id: u32,
    /// Whether the coordinate may lie outside some of the candidates
    pub exact_test: bool,
}

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridStats {
    pub cells: usize,
    pub assigned_cells: usize,
    pub exact_test_cells: usize,
    pub sub_grids: usize,
    pub max_candidates: usize,
}

#[derive(Debug)]
enum Cell {
    Unassigned,
    Assigned(GridHit),
    Sub(Box<Grid>),
}

type Candidates = SmallVec<[u32; 4]>;

#[derive(Debug)]
struct Grid {
    bounds: Area,
    cell_width: i32,
    cell_height: i32,
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

/// Spatial index of tile combinations.
#[derive(Debug)]
pub struct AreaGrid {
    grid: Grid,
    stats: GridStats,
}

impl AreaGrid {
    /// Build the grid over all tiles of `dict`, interning every cell's
    /// candidate set.
    pub fn new(dict: &mut AreaDictionary, config: &GridConfig) -> Result<Self> {
        let extended = dict.all_extended_bounds().to_vec();
        let mut stats = GridStats::default();

        let grid = match extended.iter().copied().reduce(|acc, area| acc.union(&area)) {
            Some(bounds) => {
                let tiles: Vec<u32> = (0..extended.len() as u32).collect();
                let ctx = BuildContext {
                    extended: &extended,
                    config,
                };
                ctx.build(bounds, config.dim, &tiles, 0, dict, &mut stats)?
            }
            None => Grid::empty(),
        };

        log::debug!(
            "Area grid {}x{} over {}: {} cells assigned, {} need exact tests, {} sub-grids",
            grid.cols,
            grid.rows,
            grid.bounds,
            stats.assigned_cells,
            stats.exact_test_cells,
            stats.sub_grids
        );

        Ok(Self { grid, stats })
    }

    /// Candidate tiles for a coordinate in map units.
    ///
    /// Returns `None` outside the indexed bounds or where no tile overlaps.
    pub fn lookup(&self, lat: i32, lon: i32) -> Option<GridHit> {
        self.grid.lookup(lat, lon)
    }

    /// Dictionary id of exactly the tiles whose extended bounds contain the
    /// coordinate.
    ///
    /// The containment test only runs when the grid cell requires it.
    pub fn exact_tiles(&self, dict: &mut AreaDictionary, lat: i32, lon: i32) -> Result<Option<u32>> {
        let Some(hit) = self.lookup(lat, lon) else {
            return Ok(None);
        };
        if !hit.exact_test {
            return Ok(Some(hit.id));
        }
        let Some(candidates) = dict.resolve(hit.id) else {
            return Ok(None);
        };
        let members: Candidates = candidates
            .iter()
            .filter(|&tile| {
                dict.extended_bounds(tile)
                    .is_some_and(|area| area.contains(lat, lon))
            })
            .collect();
        if members.is_empty() {
            return Ok(None);
        }
        dict.intern_tiles(&members).map(Some)
    }

    /// Bounds covered by the index.
    pub fn bounds(&self) -> &Area {
        &self.grid.bounds
    }

    pub fn stats(&self) -> &GridStats {
        &self.stats
    }
}

struct BuildContext<'a> {
    extended: &'a [Area],
    config: &'a GridConfig,
}

impl BuildContext<'_> {
    fn build(
        &self,
        bounds: Area,
        dim: usize,
        tiles: &[u32],
        level: u8,
        dict: &mut AreaDictionary,
        stats: &mut GridStats,
    ) -> Result<Grid> {
        let mut grid = Grid::layout(bounds, dim);
        let cell_count = grid.cols * grid.rows;
        let mut candidates: Vec<Candidates> = vec![Candidates::new(); cell_count];
        let mut contained = vec![true; cell_count];

        for &tile in tiles {
            let area = &self.extended[tile as usize];
            let Some(clip) = area.intersection(&bounds) else {
                continue;
            };
            let (c0, r0) = grid.cell_of(clip.min_lat, clip.min_long);
            let (c1, r1) = grid.cell_of(clip.max_lat, clip.max_long);
            for r in r0..=r1 {
                for c in c0..=c1 {
                    let idx = r * grid.cols + c;
                    candidates[idx].push(tile);
                    if !area.contains_area(&grid.cell_bounds(c, r)) {
                        contained[idx] = false;
                    }
                }
            }
        }

        stats.cells += cell_count;
        for (idx, cands) in candidates.into_iter().enumerate() {
            if cands.is_empty() {
                continue;
            }
            stats.max_candidates = stats.max_candidates.max(cands.len());

            let (c, r) = (idx % grid.cols, idx / grid.cols);
            let cell_bounds = grid.cell_bounds(c, r);
            let refine = level == 0
                && cands.len() > self.config.max_candidates
                && cell_bounds.width() > self.config.min_cell_size
                && cell_bounds.height() > self.config.min_cell_size;

            grid.cells[idx] = if refine {
                stats.sub_grids += 1;
                let sub = self.build(cell_bounds, self.config.sub_dim, &cands, 1, dict, stats)?;
                Cell::Sub(Box::new(sub))
            } else {
                let id = dict.intern_tiles(&cands)?;
                let exact_test = !contained[idx];
                stats.assigned_cells += 1;
                if exact_test {
                    stats.exact_test_cells += 1;
                }
                Cell::Assigned(GridHit { id, exact_test })
            };
        }
        Ok(grid)
    }
}

impl Grid {
    fn empty() -> Self {
        Self {
            bounds: Area::new(0, 0, 0, 0),
            cell_width: 1,
            cell_height: 1,
            cols: 0,
            rows: 0,
            cells: Vec::new(),
        }
    }

    /// Unassigned grid of at most `dim` x `dim` cells covering `bounds`.
    fn layout(bounds: Area, dim: usize) -> Self {
        let span_x = bounds.width().max(0) as u64 + 1;
        let span_y = bounds.height().max(0) as u64 + 1;
        let dim = dim.max(1) as u64;
        let cell_width = span_x.div_ceil(dim).max(1);
        let cell_height = span_y.div_ceil(dim).max(1);
        let cols = span_x.div_ceil(cell_width) as usize;
        let rows = span_y.div_ceil(cell_height) as usize;
        let mut cells = Vec::with_capacity(cols * rows);
        cells.resize_with(cols * rows, || Cell::Unassigned);
        Self {
            bounds,
            cell_width: cell_width as i32,
            cell_height: cell_height as i32,
            cols,
            rows,
            cells,
        }
    }

    /// Column and row of a coordinate inside the bounds.
    fn cell_of(&self, lat: i32, lon: i32) -> (usize, usize) {
        let c = ((lon - self.bounds.min_long) / self.cell_width) as usize;
        let r = ((lat - self.bounds.min_lat) / self.cell_height) as usize;
        (c.min(self.cols - 1), r.min(self.rows - 1))
    }

    /// Inclusive bounds of a cell, clipped to the grid bounds.
    fn cell_bounds(&self, c: usize, r: usize) -> Area {
        let min_long = self.bounds.min_long + c as i32 * self.cell_width;
        let min_lat = self.bounds.min_lat + r as i32 * self.cell_height;
        Area::new(
            min_lat,
            min_long,
            (min_lat + self.cell_height - 1).min(self.bounds.max_lat),
            (min_long + self.cell_width - 1).min(self.bounds.max_long),
        )
    }

    fn lookup(&self, lat: i32, lon: i32) -> Option<GridHit> {
        if self.cells.is_empty() || !self.bounds.contains(lat, lon) {
            return None;
        }
        let (c, r) = self.cell_of(lat, lon);
        match &self.cells[r * self.cols + c] {
            Cell::Unassigned => None,
            Cell::Assigned(hit) => Some(*hit),
            Cell::Sub(sub) => sub.lookup(lat, lon),
        }
    }
}
