//! Node density grid.
//!
//! A [`DensityMap`] counts nodes per grid cell over a bounding rectangle
//! rounded outwards to the grid. A cell spans `2^(24 - resolution)` map units
//! in both directions. Columns are allocated on first use so sparse inputs
//! stay small.

mod aspect;

pub use aspect::AspectModel;

use crate::error::{Result, SplitError};
use std::io::{BufRead, BufReader, Read, Write};
use tilesplit_types::area::Area;
use tilesplit_types::units::{round_down, round_up};

const FORMAT_HEADER: &str = "tilesplit-density 1";

/// Per-cell node counts over a grid-aligned area.
#[derive(Debug, Clone)]
pub struct DensityMap {
    bounds: Area,
    resolution: u32,
    shift: u32,
    width: usize,
    height: usize,
    /// Column-major counts; an empty column has never received a node.
    columns: Vec<Vec<u64>>,
    total: u64,
}

impl DensityMap {
    /// Create an empty density map covering `bounds`.
    ///
    /// The bounds are rounded outwards to whole grid cells. A degenerate
    /// extent is widened to one cell.
    pub fn new(bounds: Area, resolution: u32) -> Result<Self> {
        if !(1..=24).contains(&resolution) {
            return Err(SplitError::InvalidResolution(resolution));
        }
        let shift = 24 - resolution;
        let cell = 1i32 << shift;

        let min_lat = round_down(bounds.min_lat, shift);
        let min_long = round_down(bounds.min_long, shift);
        let mut max_lat = round_up(bounds.max_lat, shift);
        let mut max_long = round_up(bounds.max_long, shift);
        if max_lat <= min_lat {
            max_lat = min_lat + cell;
        }
        if max_long <= min_long {
            max_long = min_long + cell;
        }

        let bounds = Area::new(min_lat, min_long, max_lat, max_long);
        let width = (bounds.width() >> shift) as usize;
        let height = (bounds.height() >> shift) as usize;

        log::debug!(
            "Density map {}x{} cells at resolution {} for {}",
            width,
            height,
            resolution,
            bounds
        );

        Ok(Self {
            bounds,
            resolution,
            shift,
            width,
            height,
            columns: vec![Vec::new(); width],
            total: 0,
        })
    }

    /// Build a density map from coordinates in map units.
    ///
    /// When `bounds` is `None` the bounding rectangle of the points is used.
    pub fn from_points(
        points: &[(i32, i32)],
        bounds: Option<Area>,
        resolution: u32,
    ) -> Result<Self> {
        let bounds = match bounds {
            Some(bounds) => bounds,
            None => {
                let Some(&(lat, lon)) = points.first() else {
                    return Err(SplitError::InvalidInput(
                        "cannot derive bounds from an empty point set".to_string(),
                    ));
                };
                points
                    .iter()
                    .fold(Area::new(lat, lon, lat, lon), |acc, &(lat, lon)| {
                        acc.union(&Area::new(lat, lon, lat, lon))
                    })
            }
        };

        let mut map = Self::new(bounds, resolution)?;
        for &(lat, lon) in points {
            map.add_node(lat, lon);
        }
        Ok(map)
    }

    /// Count a node at the given map-unit coordinate.
    ///
    /// Returns the new count of the cell, or 0 when the coordinate lies
    /// outside the map bounds (the node is not counted).
    pub fn add_node(&mut self, lat: i32, lon: i32) -> u64 {
        if !self.bounds.contains(lat, lon) {
            return 0;
        }
        let x = (((lon - self.bounds.min_long) >> self.shift) as usize).min(self.width - 1);
        let y = (((lat - self.bounds.min_lat) >> self.shift) as usize).min(self.height - 1);

        let column = &mut self.columns[x];
        if column.is_empty() {
            column.resize(self.height, 0);
        }
        column[y] += 1;
        self.total += 1;
        column[y]
    }

    /// Node count of the cell at column `x`, row `y`.
    pub fn node_count(&self, x: usize, y: usize) -> u64 {
        self.columns
            .get(x)
            .and_then(|column| column.get(y))
            .copied()
            .unwrap_or(0)
    }

    /// Counts of one column, or `None` if the column holds no nodes.
    pub(crate) fn column(&self, x: usize) -> Option<&[u64]> {
        self.columns
            .get(x)
            .filter(|column| !column.is_empty())
            .map(Vec::as_slice)
    }

    /// Copy of the map restricted to `area`.
    ///
    /// The area is snapped outwards to grid boundaries. With `trim` the result
    /// is further shrunk to the smallest grid-aligned rectangle holding all
    /// non-zero cells.
    pub fn subset(&self, area: &Area, trim: bool) -> DensityMap {
        let Some(crop) = self.bounds.intersection(area) else {
            return self.empty_like(*area);
        };

        let cell = 1i64 << self.shift;
        let rel_x0 = (crop.min_long - self.bounds.min_long) as i64;
        let rel_x1 = (crop.max_long - self.bounds.min_long) as i64;
        let rel_y0 = (crop.min_lat - self.bounds.min_lat) as i64;
        let rel_y1 = (crop.max_lat - self.bounds.min_lat) as i64;

        let mut x0 = ((rel_x0 / cell) as usize).min(self.width - 1);
        let mut x1 = (((rel_x1 + cell - 1) / cell) as usize).clamp(x0 + 1, self.width);
        let mut y0 = ((rel_y0 / cell) as usize).min(self.height - 1);
        let mut y1 = (((rel_y1 + cell - 1) / cell) as usize).clamp(y0 + 1, self.height);

        if trim && let Some((tx0, ty0, tx1, ty1)) = self.non_zero_extent(x0, y0, x1, y1) {
            x0 = tx0;
            y0 = ty0;
            x1 = tx1;
            y1 = ty1;
        }

        let width = x1 - x0;
        let height = y1 - y0;
        let mut total = 0u64;
        let columns: Vec<Vec<u64>> = (x0..x1)
            .map(|x| match self.column(x) {
                Some(column) => {
                    let slice = &column[y0..y1];
                    let sum: u64 = slice.iter().sum();
                    total += sum;
                    if sum == 0 { Vec::new() } else { slice.to_vec() }
                }
                None => Vec::new(),
            })
            .collect();

        let bounds = Area::new(
            self.row_to_lat(y0),
            self.col_to_lon(x0),
            self.row_to_lat(y1),
            self.col_to_lon(x1),
        );

        log::debug!(
            "Density subset {}x{} cells holding {} nodes for {}",
            width,
            height,
            total,
            bounds
        );

        DensityMap {
            bounds,
            resolution: self.resolution,
            shift: self.shift,
            width,
            height,
            columns,
            total,
        }
    }

    fn empty_like(&self, area: Area) -> DensityMap {
        let shift = self.shift;
        let bounds = Area::new(
            round_down(area.min_lat, shift),
            round_down(area.min_long, shift),
            round_up(area.max_lat, shift).max(round_down(area.min_lat, shift) + (1 << shift)),
            round_up(area.max_long, shift).max(round_down(area.min_long, shift) + (1 << shift)),
        );
        let width = (bounds.width() >> shift) as usize;
        let height = (bounds.height() >> shift) as usize;
        DensityMap {
            bounds,
            resolution: self.resolution,
            shift,
            width,
            height,
            columns: vec![Vec::new(); width],
            total: 0,
        }
    }

    /// Smallest cell rectangle `[x0, x1) x [y0, y1)` within the given range
    /// that holds every non-zero cell.
    fn non_zero_extent(
        &self,
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
    ) -> Option<(usize, usize, usize, usize)> {
        let mut extent: Option<(usize, usize, usize, usize)> = None;
        for x in x0..x1 {
            let Some(column) = self.column(x) else {
                continue;
            };
            let rows = &column[y0..y1];
            let Some(first) = rows.iter().position(|&c| c > 0) else {
                continue;
            };
            let last = rows.iter().rposition(|&c| c > 0).unwrap_or(first);
            let (fy, ly) = (y0 + first, y0 + last + 1);
            extent = Some(match extent {
                None => (x, fy, x + 1, ly),
                Some((ex0, ey0, _, ey1)) => (ex0, ey0.min(fy), x + 1, ey1.max(ly)),
            });
        }
        extent
    }

    /// Write the map in the plain text density format.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{FORMAT_HEADER}")?;
        writeln!(writer, "resolution {}", self.resolution)?;
        writeln!(
            writer,
            "bounds {} {} {} {}",
            self.bounds.min_lat, self.bounds.min_long, self.bounds.max_lat, self.bounds.max_long
        )?;
        for (x, column) in self.columns.iter().enumerate() {
            for (y, &count) in column.iter().enumerate() {
                if count > 0 {
                    writeln!(writer, "{x} {y} {count}")?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a map written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut lines = BufReader::new(reader).lines();

        let header = lines.next().transpose()?.unwrap_or_default();
        if header.trim() != FORMAT_HEADER {
            return Err(SplitError::InvalidInput(format!(
                "unexpected density file header '{}'",
                header.trim()
            )));
        }

        let resolution_line = lines.next().transpose()?.unwrap_or_default();
        let resolution = parse_tagged(&resolution_line, "resolution", 1)?[0];
        let resolution = u32::try_from(resolution).map_err(|_| {
            SplitError::InvalidInput(format!("resolution {resolution} is out of range"))
        })?;

        let bounds_line = lines.next().transpose()?.unwrap_or_default();
        let b = parse_tagged(&bounds_line, "bounds", 4)?;
        let mut coords = [0i32; 4];
        for (coord, &value) in coords.iter_mut().zip(&b) {
            *coord = i32::try_from(value).map_err(|_| {
                SplitError::InvalidInput(format!("bound {value} is out of range"))
            })?;
        }
        let bounds = Area::new(coords[0], coords[1], coords[2], coords[3]);

        let mut map = Self::new(bounds, resolution)?;
        if map.bounds != bounds {
            return Err(SplitError::InvalidInput(format!(
                "density bounds {bounds} are not aligned to resolution {resolution}"
            )));
        }

        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let cell = parse_numbers(&line, 3)?;
            let (x, y) = match (usize::try_from(cell[0]), usize::try_from(cell[1])) {
                (Ok(x), Ok(y)) if x < map.width && y < map.height => (x, y),
                _ => {
                    return Err(SplitError::InvalidInput(format!(
                        "cell {},{} lies outside a {}x{} density map",
                        cell[0], cell[1], map.width, map.height
                    )));
                }
            };
            let count = u64::try_from(cell[2]).map_err(|_| {
                SplitError::InvalidInput(format!("cell count {} is out of range", cell[2]))
            })?;
            let column = &mut map.columns[x];
            if column.is_empty() {
                column.resize(map.height, 0);
            }
            if column[y] != 0 {
                return Err(SplitError::InvalidInput(format!(
                    "cell {x},{y} appears more than once in density file"
                )));
            }
            column[y] = count;
            map.total = map.total.checked_add(count).ok_or_else(|| {
                SplitError::InvalidInput("total node count is out of range".to_string())
            })?;
        }

        Ok(map)
    }

    /// Map-unit rectangle covered by the cell at `x`, `y`.
    pub fn cell_area(&self, x: usize, y: usize) -> Area {
        Area::new(
            self.row_to_lat(y),
            self.col_to_lon(x),
            self.row_to_lat(y + 1),
            self.col_to_lon(x + 1),
        )
    }

    /// Longitude in map units of the left edge of column `x`.
    pub fn col_to_lon(&self, x: usize) -> i32 {
        self.bounds.min_long + ((x as i32) << self.shift)
    }

    /// Latitude in map units of the bottom edge of row `y`.
    pub fn row_to_lat(&self, y: usize) -> i32 {
        self.bounds.min_lat + ((y as i32) << self.shift)
    }

    pub fn bounds(&self) -> &Area {
        &self.bounds
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Total number of nodes counted.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

fn parse_tagged(line: &str, tag: &str, expected: usize) -> Result<Vec<i64>> {
    let rest = line.trim().strip_prefix(tag).ok_or_else(|| {
        SplitError::InvalidInput(format!("expected '{tag}' line, found '{}'", line.trim()))
    })?;
    parse_numbers(rest, expected)
}

fn parse_numbers(line: &str, expected: usize) -> Result<Vec<i64>> {
    let numbers = line
        .split_whitespace()
        .map(|token| {
            token.parse::<i64>().map_err(|_| {
                SplitError::InvalidInput(format!("invalid number '{token}' in density file"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if numbers.len() != expected {
        return Err(SplitError::InvalidInput(format!(
            "expected {expected} values, found {} in '{}'",
            numbers.len(),
            line.trim()
        )));
    }
    Ok(numbers)
}
