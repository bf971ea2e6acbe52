//! # tilesplit-types
//!
//! Coordinate primitives shared by the tile splitter and its collaborators.
//!
//! Coordinates are 24-bit fixed-point "map units": a full turn of 360 degrees
//! spans `2^24` units, so latitudes live in `[-2^22, 2^22]` and longitudes in
//! `[-2^23, 2^23]`.
//!
//! - **Units**: conversion between degrees and map units, grid rounding
//! - **Area**: inclusive axis-aligned rectangle in map units
//!
//! ## Examples
//!
//! ```rust
//! use tilesplit_types::area::Area;
//! use tilesplit_types::units::to_map_unit;
//!
//! let berlin = Area::from_degrees(52.3, 13.0, 52.7, 13.8);
//! assert!(berlin.contains(to_map_unit(52.5), to_map_unit(13.4)));
//! ```

pub mod area;
pub mod units;
