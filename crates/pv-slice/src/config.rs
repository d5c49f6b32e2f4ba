//! Configuration for the slice geometry controller.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Parameter changes at or below this are treated as no change.
    pub delta_epsilon: f64,

    /// Shortest ruler (in pixels) that still defines a direction.
    pub min_ruler_length: f64,

    /// Endpoints further than this (in pixels) from the moment-map plane
    /// are moved back onto it.
    pub plane_snap_tolerance: f64,

    /// Half-length of a freshly placed ruler, as a fraction of the
    /// moment-map width.
    pub default_half_length_fraction: f64,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            delta_epsilon: 1e-6,
            min_ruler_length: 1e-6,
            plane_snap_tolerance: 0.01,
            default_half_length_fraction: 0.25,
        }
    }
}

impl SliceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PV_DELTA_EPSILON") {
            if let Ok(v) = val.parse() {
                config.delta_epsilon = v;
            }
        }

        if let Ok(val) = std::env::var("PV_MIN_RULER_LENGTH") {
            if let Ok(v) = val.parse() {
                config.min_ruler_length = v;
            }
        }

        if let Ok(val) = std::env::var("PV_PLANE_SNAP_TOLERANCE") {
            if let Ok(v) = val.parse() {
                config.plane_snap_tolerance = v;
            }
        }

        if let Ok(val) = std::env::var("PV_DEFAULT_HALF_LENGTH_FRACTION") {
            if let Ok(v) = val.parse() {
                config.default_half_length_fraction = v;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.delta_epsilon >= 0.0) {
            return Err("delta_epsilon must be >= 0".to_string());
        }

        if !(self.min_ruler_length > 0.0) {
            return Err("min_ruler_length must be > 0".to_string());
        }

        if !(self.plane_snap_tolerance >= 0.0) {
            return Err("plane_snap_tolerance must be >= 0".to_string());
        }

        if !(self.default_half_length_fraction > 0.0 && self.default_half_length_fraction <= 1.0)
        {
            return Err("default_half_length_fraction must be within (0, 1]".to_string());
        }

        Ok(())
    }
}
