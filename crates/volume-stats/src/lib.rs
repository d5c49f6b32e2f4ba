//! Summary statistics for data cubes.
//!
//! Computes the global data range and a background noise estimate in
//! parallel with rayon. Results are written back onto the volume as named
//! metadata attributes.

pub mod config;
pub mod error;
pub mod noise;
pub mod range;

pub use config::StatsConfig;
pub use error::{Result, StatsError};
pub use noise::{combine, compute_noise, Moments, NoiseEstimate};
pub use range::compute_range;

use astro_common::{metadata, Volume};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Statistics of one volume. Always recomputed in full.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub data_min: f64,
    pub data_max: f64,
    /// Noise-derived floor for contours and opacity.
    pub display_threshold: f64,
    pub noise_mean: f64,
    /// Raw combined slab noise before the negligible-noise guard.
    pub rms: f64,
}

impl VolumeStats {
    /// Write the statistics as metadata attributes on a volume.
    pub fn write_attributes(&self, volume: &mut Volume) {
        volume.set_attribute(metadata::DATA_MIN, self.data_min);
        volume.set_attribute(metadata::DATA_MAX, self.data_max);
        volume.set_attribute(metadata::RMS, self.rms);
        volume.set_attribute(metadata::NOISE_MEAN, self.noise_mean);
        volume.set_attribute(metadata::DISPLAY_THRESHOLD, self.display_threshold);
    }
}

/// Replace negligible noise with a fraction of the data range.
pub fn guarded_noise(rms: f64, data_min: f64, data_max: f64, config: &StatsConfig) -> f64 {
    if rms < config.negligible_noise {
        let fallback = config.fallback_fraction * (data_max - data_min);
        debug!(rms, fallback, "Noise is negligible, using fraction of the range");
        fallback
    } else {
        rms
    }
}

/// Compute range and noise for a volume.
pub fn compute_volume_stats(volume: &Volume, config: &StatsConfig) -> Result<VolumeStats> {
    config.validate().map_err(StatsError::ConfigError)?;

    let dims = volume.dims();
    let (data_min, data_max) = compute_range(volume.buffer(), dims, config.parallel_min_len)?;
    let noise = compute_noise(volume.buffer(), dims, volume.naxis(), config)?;
    let display_threshold = guarded_noise(noise.rms, data_min, data_max, config);

    if display_threshold <= 0.0 {
        warn!(volume = %volume.id, "Flat volume, display threshold is zero");
    }

    let stats = VolumeStats {
        data_min,
        data_max,
        display_threshold,
        noise_mean: noise.mean,
        rms: noise.rms,
    };
    info!(
        volume = %volume.id,
        data_min,
        data_max,
        rms = noise.rms,
        display_threshold,
        "Computed volume statistics"
    );
    Ok(stats)
}
