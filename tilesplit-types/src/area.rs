use crate::units::{MAX_LAT, MAX_LONG, to_degrees, to_map_unit};
use geo::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle in map units.
///
/// All four bounds are inclusive, so a point on the edge belongs to the area.
/// Latitudes are the y axis, longitudes the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    pub min_lat: i32,
    pub min_long: i32,
    pub max_lat: i32,
    pub max_long: i32,
}

impl Area {
    /// Create a new area from its bounds in map units.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilesplit_types::area::Area;
    ///
    /// let area = Area::new(0, 0, 100, 200);
    /// assert_eq!(area.width(), 200);
    /// assert_eq!(area.height(), 100);
    /// ```
    pub const fn new(min_lat: i32, min_long: i32, max_lat: i32, max_long: i32) -> Self {
        Self {
            min_lat,
            min_long,
            max_lat,
            max_long,
        }
    }

    /// The whole map-unit domain.
    pub const fn world() -> Self {
        Self::new(-MAX_LAT, -MAX_LONG, MAX_LAT, MAX_LONG)
    }

    /// Create an area from bounds in degrees.
    pub fn from_degrees(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self::new(
            to_map_unit(min_lat),
            to_map_unit(min_lon),
            to_map_unit(max_lat),
            to_map_unit(max_lon),
        )
    }

    /// Width in map units (longitude span).
    pub fn width(&self) -> i32 {
        self.max_long - self.min_long
    }

    /// Height in map units (latitude span).
    pub fn height(&self) -> i32 {
        self.max_lat - self.min_lat
    }

    /// An area is empty when it has no extent in either direction.
    pub fn is_empty(&self) -> bool {
        self.min_lat >= self.max_lat || self.min_long >= self.max_long
    }

    /// Check if a coordinate lies within this area, edges included.
    pub fn contains(&self, lat: i32, lon: i32) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_long && lon <= self.max_long
    }

    /// Check if `other` lies completely within this area.
    pub fn contains_area(&self, other: &Area) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_long >= self.min_long
            && other.max_long <= self.max_long
    }

    /// Check if this area shares at least one point with another.
    pub fn intersects(&self, other: &Area) -> bool {
        !(self.max_lat < other.min_lat
            || self.min_lat > other.max_lat
            || self.max_long < other.min_long
            || self.min_long > other.max_long)
    }

    /// The common part of two areas, if they intersect.
    pub fn intersection(&self, other: &Area) -> Option<Area> {
        if !self.intersects(other) {
            return None;
        }
        Some(Area::new(
            self.min_lat.max(other.min_lat),
            self.min_long.max(other.min_long),
            self.max_lat.min(other.max_lat),
            self.max_long.min(other.max_long),
        ))
    }

    /// The smallest area enclosing both areas.
    pub fn union(&self, other: &Area) -> Area {
        Area::new(
            self.min_lat.min(other.min_lat),
            self.min_long.min(other.min_long),
            self.max_lat.max(other.max_lat),
            self.max_long.max(other.max_long),
        )
    }

    /// Grow the area by `margin` map units on every side, clamped to the
    /// map-unit domain.
    pub fn extend(&self, margin: i32) -> Area {
        if margin == 0 {
            return *self;
        }
        Area::new(
            (self.min_lat - margin).max(-MAX_LAT),
            (self.min_long - margin).max(-MAX_LONG),
            (self.max_lat + margin).min(MAX_LAT),
            (self.max_long + margin).min(MAX_LONG),
        )
    }

    /// Convert to a `geo::Rect` in degrees (x = longitude, y = latitude).
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            geo::coord! { x: to_degrees(self.min_long), y: to_degrees(self.min_lat) },
            geo::coord! { x: to_degrees(self.max_long), y: to_degrees(self.max_lat) },
        )
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}) to ({},{})",
            to_degrees(self.min_lat),
            to_degrees(self.min_long),
            to_degrees(self.max_lat),
            to_degrees(self.max_long)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges() {
        let area = Area::new(0, 0, 10, 10);
        assert!(area.contains(0, 0));
        assert!(area.contains(10, 10));
        assert!(!area.contains(11, 5));
        assert!(!area.contains(5, -1));
    }

    #[test]
    fn test_intersection() {
        let a = Area::new(0, 0, 10, 10);
        let b = Area::new(5, 5, 20, 20);
        assert_eq!(a.intersection(&b), Some(Area::new(5, 5, 10, 10)));

        let c = Area::new(11, 11, 12, 12);
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_touching_areas_intersect() {
        let a = Area::new(0, 0, 10, 10);
        let b = Area::new(0, 10, 10, 20);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_extend_clamps() {
        let area = Area::new(MAX_LAT - 5, 0, MAX_LAT, 10);
        let ext = area.extend(100);
        assert_eq!(ext.max_lat, MAX_LAT);
        assert_eq!(ext.min_lat, MAX_LAT - 105);
        assert_eq!(ext.min_long, -100);
    }

    #[test]
    fn test_to_rect() {
        let area = Area::from_degrees(10.0, 20.0, 11.0, 22.0);
        let rect = area.to_rect();
        assert!((rect.min().x - 20.0).abs() < 1e-4);
        assert!((rect.max().y - 11.0).abs() < 1e-4);
    }

    #[test]
    fn test_serde_round_trip() {
        let area = Area::new(-5, -6, 7, 8);
        let json = serde_json::to_string(&area).unwrap();
        let back: Area = serde_json::from_str(&json).unwrap();
        assert_eq!(area, back);
    }
}
