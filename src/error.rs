//! Error types for tile splitting and tile-assignment indexes.

use thiserror::Error;

/// Errors raised by the splitter core.
///
/// Lookups that find nothing are not errors: they return `None` or the
/// [`UNASSIGNED`](crate::keymap::UNASSIGNED) sentinel. Tiles that cannot be
/// split below the node limit are reported through
/// [`SplitResult`](crate::split::SplitResult) instead.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("invalid resolution {0}: must be between 1 and 24")]
    InvalidResolution(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "area dictionary is full ({capacity} combinations), reduce the number of tiles per pass"
    )]
    DictionaryFull { capacity: u64 },

    #[error("value {0:#x} is reserved and cannot be stored")]
    ReservedValue(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SplitError>;
