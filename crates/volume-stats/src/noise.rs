//! Background noise estimate from two boundary slabs of the outer axis.
//!
//! Spectral-line cubes usually carry signal in the central channels, so the
//! first and last few planes are a good sample of the background. Each slab
//! gives a mean and a standard deviation; the two are reconciled with
//! [`combine`] so a slab that accidentally contains signal does not drag the
//! estimate down.

use std::ops::Range;

use astro_common::{ScalarBuffer, ScalarType};
use num_traits::ToPrimitive;
use rayon::prelude::*;
use tracing::debug;

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::range::check_dims;

/// Mergeable first and second moments (Chan et al. parallel update).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the mean.
    pub m2: f64,
}

impl Moments {
    /// Fold one sample in; NaN is skipped.
    #[inline]
    pub fn push(mut self, value: f64) -> Self {
        if value.is_nan() {
            return self;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self
    }

    pub fn merge(self, other: Moments) -> Self {
        if self.count == 0 {
            return other;
        }
        if other.count == 0 {
            return self;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        Moments { count, mean, m2 }
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

/// Combined background estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseEstimate {
    pub mean: f64,
    pub rms: f64,
}

/// Reconcile two slab values.
///
/// When they differ by more than `threshold` relative to the smaller
/// magnitude, the larger wins; otherwise they are averaged. A zero
/// magnitude counts as exceeding the margin.
pub fn combine(a: f64, b: f64, threshold: f64) -> f64 {
    let smaller = a.abs().min(b.abs());
    if smaller == 0.0 {
        return if a == b { a } else { a.max(b) };
    }
    let relative = (a - b).abs() / smaller;
    if relative > threshold {
        a.max(b)
    } else {
        0.5 * (a + b)
    }
}

/// Which element ranges feed the noise estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlabPlan {
    Two(Range<usize>, Range<usize>),
    Whole(Range<usize>),
}

/// Element ranges of the boundary slabs for a cube of `dims` with `naxis`
/// meaningful axes.
pub fn slab_plan(dims: [usize; 3], naxis: usize, config: &StatsConfig) -> SlabPlan {
    let total = dims[0] * dims[1] * dims[2];
    let (plane, outer) = match naxis {
        3 => (dims[0] * dims[1], dims[2]),
        2 => (dims[0], dims[1]),
        _ => (1, total),
    };

    if outer < 2 * config.slab_end {
        debug!(
            outer,
            needed = 2 * config.slab_end,
            "Outer axis too short for two noise slabs, using the whole volume"
        );
        return SlabPlan::Whole(0..total);
    }

    SlabPlan::Two(
        config.slab_start * plane..config.slab_end * plane,
        (outer - config.slab_end) * plane..(outer - config.slab_start) * plane,
    )
}

/// Moments of a typed slice, computed in parallel.
pub fn moments_of<T>(data: &[T], min_len: usize) -> Moments
where
    T: ToPrimitive + Copy + Send + Sync,
{
    data.par_iter()
        .with_min_len(min_len.max(1))
        .fold(Moments::default, |acc, v| {
            acc.push(v.to_f64().unwrap_or(f64::NAN))
        })
        .reduce(Moments::default, Moments::merge)
}

fn slab_moments(buffer: &ScalarBuffer, range: Range<usize>, min_len: usize) -> Result<Moments> {
    Ok(match buffer {
        ScalarBuffer::UInt8(_) => return Err(StatsError::UnsupportedDataType(ScalarType::UInt8)),
        ScalarBuffer::Int16(v) => moments_of(&v[range], min_len),
        ScalarBuffer::Int32(v) => moments_of(&v[range], min_len),
        ScalarBuffer::Int64(v) => moments_of(&v[range], min_len),
        ScalarBuffer::Float32(v) => moments_of(&v[range], min_len),
        ScalarBuffer::Float64(v) => moments_of(&v[range], min_len),
    })
}

/// Estimate background mean and RMS noise.
///
/// The result is the raw combined estimate; the negligible-noise guard is
/// applied by [`crate::compute_volume_stats`], which also knows the range.
pub fn compute_noise(
    buffer: &ScalarBuffer,
    dims: [usize; 3],
    naxis: usize,
    config: &StatsConfig,
) -> Result<NoiseEstimate> {
    check_dims(buffer, dims)?;

    match slab_plan(dims, naxis, config) {
        SlabPlan::Whole(range) => {
            let m = slab_moments(buffer, range, config.parallel_min_len)?;
            Ok(NoiseEstimate {
                mean: m.mean,
                rms: m.std_dev(),
            })
        }
        SlabPlan::Two(low, high) => {
            let a = slab_moments(buffer, low, config.parallel_min_len)?;
            let b = slab_moments(buffer, high, config.parallel_min_len)?;
            let estimate = match (a.count, b.count) {
                (0, 0) => NoiseEstimate { mean: 0.0, rms: 0.0 },
                (_, 0) => NoiseEstimate {
                    mean: a.mean,
                    rms: a.std_dev(),
                },
                (0, _) => NoiseEstimate {
                    mean: b.mean,
                    rms: b.std_dev(),
                },
                _ => NoiseEstimate {
                    mean: combine(a.mean, b.mean, config.combine_threshold),
                    rms: combine(a.std_dev(), b.std_dev(), config.combine_threshold),
                },
            };
            debug!(
                mean_low = a.mean,
                mean_high = b.mean,
                rms_low = a.std_dev(),
                rms_high = b.std_dev(),
                "Slab noise"
            );
            Ok(estimate)
        }
    }
}
