//! Global min/max reduction.

use astro_common::{ScalarBuffer, ScalarType};
use num_traits::ToPrimitive;
use rayon::prelude::*;

use crate::error::{Result, StatsError};

/// Running extrema. `EMPTY` is the identity of [`MinMax::merge`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub const EMPTY: MinMax = MinMax {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    /// Fold one sample in; NaN is skipped.
    #[inline]
    pub fn push(self, value: f64) -> Self {
        if value.is_nan() {
            return self;
        }
        MinMax {
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }

    #[inline]
    pub fn merge(self, other: MinMax) -> Self {
        MinMax {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// Parallel min/max over a typed slice.
pub fn min_max<T>(data: &[T], min_len: usize) -> MinMax
where
    T: ToPrimitive + Copy + Send + Sync,
{
    data.par_iter()
        .with_min_len(min_len.max(1))
        .fold(
            || MinMax::EMPTY,
            |acc, v| acc.push(v.to_f64().unwrap_or(f64::NAN)),
        )
        .reduce(|| MinMax::EMPTY, MinMax::merge)
}

pub(crate) fn check_dims(buffer: &ScalarBuffer, dims: [usize; 3]) -> Result<()> {
    let expected = dims[0] * dims[1] * dims[2];
    if buffer.len() != expected {
        return Err(StatsError::DimensionMismatch {
            dims,
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}

/// Global (min, max) of a buffer, NaN excluded.
pub fn compute_range(buffer: &ScalarBuffer, dims: [usize; 3], min_len: usize) -> Result<(f64, f64)> {
    check_dims(buffer, dims)?;

    let extrema = match buffer {
        ScalarBuffer::UInt8(_) => return Err(StatsError::UnsupportedDataType(ScalarType::UInt8)),
        ScalarBuffer::Int16(v) => min_max(v, min_len),
        ScalarBuffer::Int32(v) => min_max(v, min_len),
        ScalarBuffer::Int64(v) => min_max(v, min_len),
        ScalarBuffer::Float32(v) => min_max(v, min_len),
        ScalarBuffer::Float64(v) => min_max(v, min_len),
    };

    if extrema.is_empty() {
        return Err(StatsError::NoFiniteValues);
    }
    Ok((extrema.min, extrema.max))
}
