//! World coordinate system (WCS) support for spectral-line cubes.
//!
//! Implements the FITS pixel ↔ world pipeline from scratch: the linear
//! `CRPIX`/`PC`/`CDELT` step, zenithal and cylindrical sky projections with
//! the spherical rotation to celestial coordinates, and linear, logarithmic
//! or non-linear spectral axes. Also provides the display helpers built on
//! top of it: sexagesimal formatting and tick step selection.

pub mod celestial;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod spectral;
pub mod ticks;
pub mod transform;

pub use celestial::{CelestialFrame, Projection};
pub use descriptor::{Axis, AxisType, SpectralConvention, WcsDescriptor, WcsStatus};
pub use error::{Result, WcsError};
pub use format::{
    format_world_value, AxisRole, DisplayConfig, DisplayHint, FormattedValue, Language,
    Quantity, UnitPreference, NO_PREVIOUS,
};
pub use spectral::{SpectralAxis, SpectralKind};
pub use ticks::{first_tick, tick_step, TickStep};
pub use transform::WcsTransform;
