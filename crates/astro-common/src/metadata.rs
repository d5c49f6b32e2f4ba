//! Names of the metadata attributes written back onto volumes.

pub const DATA_MIN: &str = "DATAMIN";
pub const DATA_MAX: &str = "DATAMAX";
pub const RMS: &str = "RMS";
pub const NOISE_MEAN: &str = "NOISEMEAN";
pub const DISPLAY_THRESHOLD: &str = "DISPLAYTHRESHOLD";

/// Flux unit keyword.
pub const BUNIT: &str = "BUNIT";

/// Westerbork flux unit, converted on load.
pub const WESTERBORK_UNIT: &str = "W.U.";
pub const JANSKY_PER_BEAM: &str = "JY/BEAM";
pub const WESTERBORK_TO_JANSKY: f64 = 0.005;
