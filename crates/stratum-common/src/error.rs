//! Error types for StratumDB.

use thiserror::Error;

/// Result type alias using StratumError.
pub type Result<T> = std::result::Result<T, StratumError>;

/// Errors that can occur in StratumDB index operations.
#[derive(Debug, Error)]
pub enum StratumError {
    // Capability violations
    #[error("index is read-only, write access required")]
    ReadOnly,

    #[error("measure not found: {0}")]
    MeasureNotFound(String),

    // Precondition violations
    #[error("duplicate key")]
    DuplicateKey,

    #[error("key not found")]
    KeyNotFound,

    #[error("ranges do not intersect")]
    RangesDisjoint,

    #[error("extended key is not exact")]
    NotExactKey,

    #[error("readers advance in different directions")]
    DirectionMismatch,

    #[error("bulk load requires strictly ascending keys")]
    UnsortedBulkLoad,

    // Diagnostics
    #[error("index corrupted: {0}")]
    Corrupted(String),

    // Not-yet-implemented paths
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    // Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}
