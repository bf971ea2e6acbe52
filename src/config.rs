//! Configuration for splitting runs and the tile-assignment indexes.
//!
//! All types deserialize from JSON (and TOML with the `toml` feature) with
//! every field optional.

use crate::error::{Result, SplitError};
use serde::{Deserialize, Serialize};

/// Integer width used for area dictionary ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdWidth {
    /// 16-bit ids, up to 65535 combinations
    U16,
    /// 32-bit ids
    #[default]
    U32,
}

impl IdWidth {
    /// The reserved value that is never handed out as an id.
    pub const fn reserved(self) -> u32 {
        match self {
            IdWidth::U16 => u16::MAX as u32,
            IdWidth::U32 => u32::MAX,
        }
    }

    /// Number of ids available, excluding the reserved value.
    pub const fn capacity(self) -> u64 {
        self.reserved() as u64
    }
}

/// Settings for the area dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionaryConfig {
    #[serde(default)]
    pub id_width: IdWidth,

    /// Upper bound on combinations found by the simple-neighbour pre-pass
    #[serde(default = "DictionaryConfig::default_max_simple_combinations")]
    pub max_simple_combinations: usize,

    /// Largest group of tiles considered by the simple-neighbour pre-pass
    #[serde(default = "DictionaryConfig::default_max_simple_group")]
    pub max_simple_group: usize,
}

impl DictionaryConfig {
    const fn default_max_simple_combinations() -> usize {
        1000
    }

    const fn default_max_simple_group() -> usize {
        4
    }

    pub fn with_id_width(mut self, width: IdWidth) -> Self {
        self.id_width = width;
        self
    }
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            id_width: IdWidth::default(),
            max_simple_combinations: Self::default_max_simple_combinations(),
            max_simple_group: Self::default_max_simple_group(),
        }
    }
}

/// Settings for the uniform grid index over the tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// Cells per axis of the top-level grid
    #[serde(default = "GridConfig::default_dim")]
    pub dim: usize,

    /// Cells per axis of a sub-grid
    #[serde(default = "GridConfig::default_sub_dim")]
    pub sub_dim: usize,

    /// Candidate count above which a cell gets a sub-grid
    #[serde(default = "GridConfig::default_max_candidates")]
    pub max_candidates: usize,

    /// Minimum cell extent in map units for a sub-grid to be built
    #[serde(default = "GridConfig::default_min_cell_size")]
    pub min_cell_size: i32,
}

impl GridConfig {
    const fn default_dim() -> usize {
        512
    }

    const fn default_sub_dim() -> usize {
        32
    }

    const fn default_max_candidates() -> usize {
        10
    }

    const fn default_min_cell_size() -> i32 {
        64
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.sub_dim == 0 {
            return Err(SplitError::InvalidConfig(
                "grid dimensions must be greater than zero".to_string(),
            ));
        }
        if self.min_cell_size < 1 {
            return Err(SplitError::InvalidConfig(
                "minimum grid cell size must be at least one map unit".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            dim: Self::default_dim(),
            sub_dim: Self::default_sub_dim(),
            max_candidates: Self::default_max_candidates(),
            min_cell_size: Self::default_min_cell_size(),
        }
    }
}

/// Settings for a splitting run.
///
/// # Example
///
/// ```rust
/// use tilesplit::SplitConfig;
///
/// let json = r#"{
///     "resolution": 14,
///     "max_nodes": 800000,
///     "grid": { "dim": 256 }
/// }"#;
/// let config = SplitConfig::from_json_str(json)?;
/// assert_eq!(config.resolution, 14);
/// assert_eq!(config.grid.max_candidates, 10);
/// # Ok::<(), tilesplit::SplitError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    /// Density grid resolution; a cell spans `2^(24 - resolution)` map units
    #[serde(default = "SplitConfig::default_resolution")]
    pub resolution: u32,

    /// Maximum number of nodes per tile
    #[serde(default = "SplitConfig::default_max_nodes")]
    pub max_nodes: u64,

    /// Shrink tiles to the part of the grid that holds nodes
    #[serde(default = "SplitConfig::default_trim")]
    pub trim: bool,

    /// Upper bound on outer optimization iterations
    #[serde(default = "SplitConfig::default_max_iterations")]
    pub max_iterations: usize,

    /// Recursive search steps allowed per iteration
    #[serde(default = "SplitConfig::default_search_limit")]
    pub search_limit: u64,

    /// Largest offset tried around a computed split point
    #[serde(default = "SplitConfig::default_max_spread")]
    pub max_spread: usize,

    /// Initial upper aspect-ratio bound; the lower bound is its inverse
    #[serde(default = "SplitConfig::default_max_aspect")]
    pub max_aspect: f64,

    /// Margin in map units added around tiles when assigning records
    #[serde(default)]
    pub overlap: i32,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub dictionary: DictionaryConfig,
}

impl SplitConfig {
    const fn default_resolution() -> u32 {
        13
    }

    const fn default_max_nodes() -> u64 {
        1_600_000
    }

    const fn default_trim() -> bool {
        true
    }

    const fn default_max_iterations() -> usize {
        20
    }

    const fn default_search_limit() -> u64 {
        200_000
    }

    const fn default_max_spread() -> usize {
        3
    }

    const fn default_max_aspect() -> f64 {
        8.0
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        assert!(max_nodes > 0, "Max nodes must be greater than zero");
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_search_limit(mut self, limit: u64) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_overlap(mut self, overlap: i32) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_dictionary(mut self, dictionary: DictionaryConfig) -> Self {
        self.dictionary = dictionary;
        self
    }

    /// Shift between map units and grid cells for the configured resolution.
    pub fn shift(&self) -> u32 {
        24 - self.resolution
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=24).contains(&self.resolution) {
            return Err(SplitError::InvalidResolution(self.resolution));
        }
        if self.max_nodes == 0 {
            return Err(SplitError::InvalidConfig(
                "max_nodes must be greater than zero".to_string(),
            ));
        }
        if !self.max_aspect.is_finite() || self.max_aspect < 1.0 {
            return Err(SplitError::InvalidConfig(
                "max_aspect must be a finite value of at least 1".to_string(),
            ));
        }
        if self.overlap < 0 {
            return Err(SplitError::InvalidConfig(
                "overlap must not be negative".to_string(),
            ));
        }
        self.grid.validate()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a TOML configuration.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            resolution: Self::default_resolution(),
            max_nodes: Self::default_max_nodes(),
            trim: Self::default_trim(),
            max_iterations: Self::default_max_iterations(),
            search_limit: Self::default_search_limit(),
            max_spread: Self::default_max_spread(),
            max_aspect: Self::default_max_aspect(),
            overlap: 0,
            grid: GridConfig::default(),
            dictionary: DictionaryConfig::default(),
        }
    }
}
