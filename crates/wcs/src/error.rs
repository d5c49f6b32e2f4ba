use astro_common::AstroError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WcsError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WcsError {
    #[error("WCS is not valid: {0}")]
    NotValid(String),

    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),

    #[error("PC matrix is singular")]
    SingularMatrix,

    #[error("No rest frequency available for spectral conversion")]
    MissingRestFrequency,

    #[error("Point has no projection: {0}")]
    Projection(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid tick request: {0}")]
    InvalidTick(String),

    #[error(transparent)]
    Header(#[from] AstroError),
}

impl WcsError {
    pub fn not_valid(reason: impl Into<String>) -> Self {
        WcsError::NotValid(reason.into())
    }
}

impl From<WcsError> for AstroError {
    fn from(err: WcsError) -> Self {
        match err {
            WcsError::Header(inner) => inner,
            WcsError::OutOfRange(msg) => AstroError::invalid_parameter("world", msg),
            WcsError::InvalidTick(msg) => AstroError::invalid_parameter("tick", msg),
            other => AstroError::InvalidWcs(other.to_string()),
        }
    }
}
