//! Configuration for volume statistics.

use serde::{Deserialize, Serialize};

/// Tunable constants of the range and noise estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// First index (inclusive) of the noise band along the outer axis.
    pub slab_start: usize,

    /// Last index (exclusive) of the noise band along the outer axis.
    pub slab_end: usize,

    /// Relative difference above which the larger slab value wins.
    pub combine_threshold: f64,

    /// Noise below this is considered numerically zero.
    pub negligible_noise: f64,

    /// Fraction of the data range used when the noise is negligible.
    pub fallback_fraction: f64,

    /// Minimum number of elements handed to one rayon task.
    pub parallel_min_len: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            slab_start: 2,
            slab_end: 4,
            combine_threshold: 0.3,
            negligible_noise: 1e-6,
            fallback_fraction: 0.01,
            parallel_min_len: 64 * 1024,
        }
    }
}

impl StatsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STATS_SLAB_START") {
            if let Ok(v) = val.parse() {
                config.slab_start = v;
            }
        }

        if let Ok(val) = std::env::var("STATS_SLAB_END") {
            if let Ok(v) = val.parse() {
                config.slab_end = v;
            }
        }

        if let Ok(val) = std::env::var("STATS_COMBINE_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.combine_threshold = v;
            }
        }

        if let Ok(val) = std::env::var("STATS_NEGLIGIBLE_NOISE") {
            if let Ok(v) = val.parse() {
                config.negligible_noise = v;
            }
        }

        if let Ok(val) = std::env::var("STATS_FALLBACK_FRACTION") {
            if let Ok(v) = val.parse() {
                config.fallback_fraction = v;
            }
        }

        if let Ok(val) = std::env::var("STATS_PARALLEL_MIN_LEN") {
            if let Ok(v) = val.parse() {
                config.parallel_min_len = v;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.slab_end <= self.slab_start {
            return Err("slab_end must be greater than slab_start".to_string());
        }

        if !(self.combine_threshold > 0.0) {
            return Err("combine_threshold must be > 0".to_string());
        }

        if self.negligible_noise < 0.0 {
            return Err("negligible_noise must be >= 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.fallback_fraction) {
            return Err("fallback_fraction must be within [0, 1]".to_string());
        }

        if self.parallel_min_len == 0 {
            return Err("parallel_min_len must be > 0".to_string());
        }

        Ok(())
    }
}
