//! Error types for slice geometry synchronization.

use astro_common::{AstroError, ScalarType, Severity};
use thiserror::Error;
use wcs::WcsError;

/// Errors raised while synchronizing the ruler, parameters and reslice.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliceError {
    /// A referenced volume or ruler id could not be resolved.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(String),

    /// Zero-length ruler or otherwise unusable geometry.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The input volume's scalar type cannot be resliced.
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(ScalarType),

    /// Coordinate conversion failed.
    #[error(transparent)]
    Wcs(#[from] WcsError),

    /// The host refused a write.
    #[error("host rejected update: {0}")]
    Host(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Result type for slice operations.
pub type Result<T> = std::result::Result<T, SliceError>;

impl SliceError {
    /// Whether the current slice session must be abandoned.
    pub fn is_session_fatal(&self) -> bool {
        AstroError::from(self.clone()).severity() == Severity::SessionFatal
    }
}

impl From<SliceError> for AstroError {
    fn from(err: SliceError) -> Self {
        match err {
            SliceError::MissingCollaborator(what) => AstroError::MissingCollaborator(what),
            SliceError::DegenerateGeometry(what) => AstroError::DegenerateGeometry(what),
            SliceError::UnsupportedDataType(t) => AstroError::UnsupportedDataType(t.to_string()),
            SliceError::Wcs(e) => e.into(),
            SliceError::Host(msg) => AstroError::MissingCollaborator(msg),
            SliceError::ConfigError(msg) => AstroError::invalid_parameter("slice_config", msg),
        }
    }
}
