//! Common types and utilities shared across the astro-volume crates.

pub mod error;
pub mod header;
pub mod ids;
pub mod metadata;
pub mod volume;

pub use error::{AstroError, AstroResult, Severity};
pub use header::HeaderMap;
pub use ids::{RulerId, VolumeId};
pub use volume::{CoordinateSpace, ScalarBuffer, ScalarType, SpectralQuantity, Volume};
