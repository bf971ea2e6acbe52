use super::DensityMap;
use tilesplit_types::units::to_radians;

/// Ground-distance correction for tile aspect ratios.
///
/// Grid cells are square in map units but not on the ground: a cell near the
/// poles is much narrower than one at the equator. The cosine of the latitude
/// of every row boundary is tabulated once so aspect checks during splitting
/// need no trigonometry.
#[derive(Debug, Clone)]
pub struct AspectModel {
    /// `factors[y]` is the cosine of the latitude of row boundary `y`.
    factors: Vec<f64>,
}

impl AspectModel {
    pub fn new(map: &DensityMap) -> Self {
        let factors = (0..=map.height())
            .map(|y| to_radians(map.row_to_lat(y)).cos())
            .collect();
        Self { factors }
    }

    /// Aspect ratio (corrected width over height) of a cell rectangle.
    ///
    /// Values above 1 mean the rectangle is wider than tall on the ground.
    pub fn ratio(&self, y: usize, width: usize, height: usize) -> f64 {
        let w = width as f64;
        let top = self.factor(y + height);
        let bottom = self.factor(y);
        (w * top).max(w * bottom) / height as f64
    }

    fn factor(&self, y: usize) -> f64 {
        self.factors
            .get(y)
            .or_else(|| self.factors.last())
            .copied()
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesplit_types::area::Area;

    #[test]
    fn test_square_at_equator() {
        let map = DensityMap::new(Area::from_degrees(-1.0, -1.0, 1.0, 1.0), 13).unwrap();
        let model = AspectModel::new(&map);
        let ratio = model.ratio(0, map.width(), map.height());
        assert!((ratio - 1.0).abs() < 0.01, "ratio {ratio}");
    }

    #[test]
    fn test_high_latitude_narrows_tiles() {
        let map = DensityMap::new(Area::from_degrees(59.0, 0.0, 61.0, 2.0), 13).unwrap();
        let model = AspectModel::new(&map);
        let ratio = model.ratio(0, map.width(), map.height());
        // cos(60) = 0.5, taking the wider (southern) edge
        assert!(ratio > 0.49 && ratio < 0.53, "ratio {ratio}");
    }

    #[test]
    fn test_wide_rectangle() {
        let map = DensityMap::new(Area::from_degrees(-1.0, -4.0, 1.0, 4.0), 13).unwrap();
        let model = AspectModel::new(&map);
        assert!(model.ratio(0, map.width(), map.height()) > 3.9);
        assert!(model.ratio(0, 1, map.height()) < 0.1);
    }
}
