//! Error types for volume statistics.

use astro_common::{AstroError, ScalarType};
use thiserror::Error;

/// Errors that can occur while computing statistics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    /// The scalar type has no statistics support.
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(ScalarType),

    /// Buffer length does not match the dimensions.
    #[error("buffer holds {actual} elements, dimensions {dims:?} need {expected}")]
    DimensionMismatch {
        dims: [usize; 3],
        expected: usize,
        actual: usize,
    },

    /// Every element is NaN.
    #[error("volume contains no finite values")]
    NoFiniteValues,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;

impl From<StatsError> for AstroError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::UnsupportedDataType(t) => AstroError::UnsupportedDataType(t.to_string()),
            StatsError::ConfigError(msg) => AstroError::invalid_parameter("stats_config", msg),
            other => AstroError::invalid_parameter("buffer", other.to_string()),
        }
    }
}
