//! Error taxonomy shared by the astro-volume crates.

use thiserror::Error;

/// Result type alias using AstroError.
pub type AstroResult<T> = Result<T, AstroError>;

/// How a failure affects the slice session that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation was a no-op; the caller may retry on the next event.
    Recoverable,
    /// The current session must be abandoned and reported upward.
    SessionFatal,
}

/// Primary error type surfaced to collaborators.
///
/// Each crate keeps its own detailed error enum and converts into this one
/// at the subsystem boundary, so a failed operation always yields exactly
/// one human-readable diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AstroError {
    // === Coordinate system ===
    #[error("Invalid WCS: {0}")]
    InvalidWcs(String),

    #[error("Invalid header value for '{key}': {message}")]
    InvalidHeader { key: String, message: String },

    // === Data ===
    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Slice geometry ===
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(String),

    // === Infrastructure ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AstroError {
    /// Build an `InvalidHeader` error.
    pub fn invalid_header(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Build an `InvalidParameter` error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AstroError::InvalidWcs(_) => "InvalidWCS",
            AstroError::InvalidHeader { .. } => "InvalidHeader",
            AstroError::UnsupportedDataType(_) => "UnsupportedDataType",
            AstroError::InvalidParameter { .. } => "InvalidParameter",
            AstroError::DegenerateGeometry(_) => "DegenerateGeometry",
            AstroError::MissingCollaborator(_) => "MissingCollaborator",
            AstroError::InternalError(_) => "InternalError",
        }
    }

    /// Classify the error for the slice session.
    pub fn severity(&self) -> Severity {
        match self {
            AstroError::InvalidWcs(_)
            | AstroError::InvalidHeader { .. }
            | AstroError::UnsupportedDataType(_)
            | AstroError::InternalError(_) => Severity::SessionFatal,

            AstroError::DegenerateGeometry(_)
            | AstroError::MissingCollaborator(_)
            | AstroError::InvalidParameter { .. } => Severity::Recoverable,
        }
    }

    /// Whether the caller can simply retry on the next event.
    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Recoverable
    }
}

impl From<serde_json::Error> for AstroError {
    fn from(err: serde_json::Error) -> Self {
        AstroError::InternalError(format!("JSON error: {}", err))
    }
}
