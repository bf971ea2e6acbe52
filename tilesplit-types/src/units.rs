//! Fixed-point map units.

/// Number of bits used for a full turn (360 degrees).
pub const MAP_UNIT_BITS: u32 = 24;

/// Largest latitude in map units (90 degrees).
pub const MAX_LAT: i32 = 1 << (MAP_UNIT_BITS - 2);

/// Largest longitude in map units (180 degrees).
pub const MAX_LONG: i32 = 1 << (MAP_UNIT_BITS - 1);

const UNITS_PER_DEGREE: f64 = (1u32 << MAP_UNIT_BITS) as f64 / 360.0;

/// Convert degrees to map units, rounding to the nearest unit.
///
/// # Examples
///
/// ```
/// use tilesplit_types::units::{to_map_unit, MAX_LONG};
///
/// assert_eq!(to_map_unit(180.0), MAX_LONG);
/// assert_eq!(to_map_unit(0.0), 0);
/// ```
pub fn to_map_unit(degrees: f64) -> i32 {
    (degrees * UNITS_PER_DEGREE).round() as i32
}

/// Convert map units back to degrees.
pub fn to_degrees(units: i32) -> f64 {
    units as f64 / UNITS_PER_DEGREE
}

/// Convert map units to radians.
pub fn to_radians(units: i32) -> f64 {
    to_degrees(units).to_radians()
}

/// Round `value` down to a multiple of `2^shift`.
///
/// Works for negative values (rounds towards negative infinity).
pub fn round_down(value: i32, shift: u32) -> i32 {
    (value >> shift) << shift
}

/// Round `value` up to a multiple of `2^shift`.
pub fn round_up(value: i32, shift: u32) -> i32 {
    let step = 1i64 << shift;
    let rounded = ((value as i64 + step - 1) >> shift) << shift;
    rounded as i32
}
