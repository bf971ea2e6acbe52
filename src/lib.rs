//! Density-driven tile splitting with compact tile-assignment indexes.
//!
//! A [`DensityMap`] counts nodes per grid cell. [`TileSplitter`] cuts the map
//! into rectangular tiles that each stay under a node limit and keep a sane
//! ground aspect ratio. The tiles then feed an [`AreaDictionary`] of tile
//! combinations and an [`AreaGrid`] that answers "which tiles might contain
//! this coordinate" in constant time. [`SparseKeyMap`] records the answer per
//! element id in a few bytes per key.
//!
//! ```rust
//! use tilesplit::prelude::*;
//!
//! let mut map = DensityMap::new(Area::new(0, 0, 65_535, 65_535), 16)?;
//! for lat in 0..64 {
//!     for lon in 0..64 {
//!         map.add_node(lat * 1024, lon * 1024);
//!     }
//! }
//! let splitter = TileSplitter::new(map, SplitConfig::default().with_resolution(16).with_max_nodes(1000))?;
//! let result = splitter.split_map();
//! let areas = result.areas(splitter.map());
//!
//! let mut dict = AreaDictionary::new(areas, 0, &DictionaryConfig::default())?;
//! let grid = AreaGrid::new(&mut dict, &GridConfig::default())?;
//! assert!(grid.lookup(2048, 2048).is_some());
//!
//! let mut ids = SparseKeyMap::new();
//! if let Some(tile) = grid.exact_tiles(&mut dict, 2048, 2048)? {
//!     ids.put(17, tile)?;
//! }
//! assert!(ids.contains(17));
//! # Ok::<(), tilesplit::SplitError>(())
//! ```

pub mod config;
pub mod density;
pub mod dictionary;
pub mod error;
pub mod grid;
pub mod keymap;
pub mod split;

pub use config::{DictionaryConfig, GridConfig, IdWidth, SplitConfig};
pub use error::{Result, SplitError};

pub use density::{AspectModel, DensityMap};

pub use split::{SplitResult, Tile, TileSplitter};

pub use dictionary::{AreaDictionary, AreaSet, TileSet};

pub use grid::{AreaGrid, GridHit, GridStats};

pub use keymap::{KeyMapStats, SparseKeyMap, UNASSIGNED};

pub use tilesplit_types::area::Area;
pub use tilesplit_types::units;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Result, SplitError};

    pub use crate::{DictionaryConfig, GridConfig, IdWidth, SplitConfig};

    pub use crate::{DensityMap, SplitResult, Tile, TileSplitter};

    pub use crate::{AreaDictionary, AreaGrid, AreaSet, GridHit, TileSet};

    pub use crate::{SparseKeyMap, UNASSIGNED};

    pub use tilesplit_types::area::Area;
}
