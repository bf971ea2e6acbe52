use super::tile::Tile;
use crate::density::DensityMap;

/// Split direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    /// Cut between columns (left/right halves)
    Cols,
    /// Cut between rows (lower/upper halves)
    Rows,
}

/// Column and row sums of a tile.
///
/// Pure performance cache: a child built from a parent reuses the parent's
/// sums along the cut axis and only recomputes the other axis.
#[derive(Debug, Clone)]
pub(crate) struct TileMetaInfo {
    col_sums: Vec<u64>,
    row_sums: Vec<u64>,
}

impl TileMetaInfo {
    pub fn new(tile: &Tile, map: &DensityMap) -> Self {
        let mut col_sums = vec![0u64; tile.width];
        let mut row_sums = vec![0u64; tile.height];
        for (i, x) in (tile.x..tile.x + tile.width).enumerate() {
            let Some(column) = map.column(x) else {
                continue;
            };
            for (j, &count) in column[tile.y..tile.y + tile.height].iter().enumerate() {
                col_sums[i] += count;
                row_sums[j] += count;
            }
        }
        Self { col_sums, row_sums }
    }

    fn sums(&self, axis: Axis) -> &[u64] {
        match axis {
            Axis::Cols => &self.col_sums,
            Axis::Rows => &self.row_sums,
        }
    }

    /// First offset where the running sum along `axis` exceeds half of
    /// `count`, clamped to a valid cut position.
    pub fn middle(&self, axis: Axis, count: u64) -> usize {
        let sums = self.sums(axis);
        let half = count / 2;
        let mut running = 0u64;
        let mut pos = sums.len().saturating_sub(1);
        for (i, &sum) in sums.iter().enumerate() {
            running += sum;
            if running > half {
                pos = i;
                break;
            }
        }
        pos.clamp(1, sums.len().saturating_sub(1).max(1))
    }

    /// Nodes before offset `pos` along `axis`.
    pub fn prefix(&self, axis: Axis, pos: usize) -> u64 {
        self.sums(axis)[..pos].iter().sum()
    }

    /// Cut `tile` at offset `pos` and build both children with their meta info.
    pub fn divide(
        &self,
        tile: &Tile,
        axis: Axis,
        pos: usize,
        map: &DensityMap,
    ) -> ((Tile, TileMetaInfo), (Tile, TileMetaInfo)) {
        let first_count = self.prefix(axis, pos);
        match axis {
            Axis::Cols => {
                let (left, right) = tile.cut_cols(pos, first_count);
                let left_meta = Self {
                    col_sums: self.col_sums[..pos].to_vec(),
                    row_sums: row_sums(&left, map),
                };
                let right_meta = Self {
                    col_sums: self.col_sums[pos..].to_vec(),
                    row_sums: row_sums(&right, map),
                };
                ((left, left_meta), (right, right_meta))
            }
            Axis::Rows => {
                let (lower, upper) = tile.cut_rows(pos, first_count);
                let lower_meta = Self {
                    col_sums: col_sums(&lower, map),
                    row_sums: self.row_sums[..pos].to_vec(),
                };
                let upper_meta = Self {
                    col_sums: col_sums(&upper, map),
                    row_sums: self.row_sums[pos..].to_vec(),
                };
                ((lower, lower_meta), (upper, upper_meta))
            }
        }
    }

    /// Shrink `tile` to its non-zero rows and columns.
    ///
    /// Dropped rows and columns are empty, so the remaining sums stay valid
    /// and are sliced instead of recomputed.
    pub fn trim(self, tile: Tile) -> (Tile, TileMetaInfo) {
        let cols = non_zero_range(&self.col_sums);
        let rows = non_zero_range(&self.row_sums);
        let (Some((c0, c1)), Some((r0, r1))) = (cols, rows) else {
            return (tile, self);
        };
        if c0 == 0 && r0 == 0 && c1 == tile.width && r1 == tile.height {
            return (tile, self);
        }
        let trimmed = Tile::new(tile.x + c0, tile.y + r0, c1 - c0, r1 - r0, tile.count);
        let meta = Self {
            col_sums: self.col_sums[c0..c1].to_vec(),
            row_sums: self.row_sums[r0..r1].to_vec(),
        };
        (trimmed, meta)
    }
}

fn non_zero_range(sums: &[u64]) -> Option<(usize, usize)> {
    let first = sums.iter().position(|&s| s > 0)?;
    let last = sums.iter().rposition(|&s| s > 0)?;
    Some((first, last + 1))
}

fn row_sums(tile: &Tile, map: &DensityMap) -> Vec<u64> {
    let mut sums = vec![0u64; tile.height];
    for x in tile.x..tile.x + tile.width {
        if let Some(column) = map.column(x) {
            for (sum, &count) in sums.iter_mut().zip(&column[tile.y..tile.y + tile.height]) {
                *sum += count;
            }
        }
    }
    sums
}

fn col_sums(tile: &Tile, map: &DensityMap) -> Vec<u64> {
    (tile.x..tile.x + tile.width)
        .map(|x| tile.col_sum(map, x))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesplit_types::area::Area;

    fn map_with(cells: &[(usize, usize, u32)]) -> DensityMap {
        let mut map = DensityMap::new(Area::new(0, 0, 128, 128), 20).unwrap();
        for &(x, y, count) in cells {
            for _ in 0..count {
                map.add_node((y * 16) as i32, (x * 16) as i32);
            }
        }
        map
    }

    #[test]
    fn test_middle_of_even_columns() {
        let map = map_with(&[(0, 0, 5), (1, 0, 5)]);
        let tile = Tile::new(0, 0, 2, 1, 10);
        let meta = TileMetaInfo::new(&tile, &map);
        assert_eq!(meta.middle(Axis::Cols, tile.count), 1);
    }

    #[test]
    fn test_middle_never_cuts_at_zero() {
        let map = map_with(&[(0, 0, 100), (1, 0, 1)]);
        let tile = Tile::new(0, 0, 2, 1, 101);
        let meta = TileMetaInfo::new(&tile, &map);
        assert_eq!(meta.middle(Axis::Cols, tile.count), 1);
    }

    #[test]
    fn test_divide_matches_direct_sums() {
        let map = map_with(&[(1, 1, 4), (5, 2, 6), (6, 6, 1), (2, 7, 3)]);
        let tile = Tile::from_map(&map);
        let meta = TileMetaInfo::new(&tile, &map);

        for axis in [Axis::Cols, Axis::Rows] {
            let ((a, a_meta), (b, b_meta)) = meta.divide(&tile, axis, 3, &map);
            assert_eq!(a.count + b.count, tile.count);
            assert!(a.verify_count(&map));
            assert!(b.verify_count(&map));

            let fresh_a = TileMetaInfo::new(&a, &map);
            assert_eq!(a_meta.col_sums, fresh_a.col_sums);
            assert_eq!(a_meta.row_sums, fresh_a.row_sums);
            let fresh_b = TileMetaInfo::new(&b, &map);
            assert_eq!(b_meta.col_sums, fresh_b.col_sums);
            assert_eq!(b_meta.row_sums, fresh_b.row_sums);
        }
    }

    #[test]
    fn test_trim_matches_tile_trim() {
        let map = map_with(&[(2, 3, 1), (4, 5, 2)]);
        let tile = Tile::from_map(&map);
        let meta = TileMetaInfo::new(&tile, &map);
        let (trimmed, trimmed_meta) = meta.trim(tile);
        assert_eq!(trimmed, tile.trim(&map));
        assert_eq!(trimmed_meta.col_sums, vec![1, 0, 2]);
        assert_eq!(trimmed_meta.row_sums, vec![1, 0, 2]);
    }
}
