//! Synthetic cube generators.
//!
//! These generators create predictable, verifiable cubes that can be used
//! across the test suite. Buffers are laid out with the first axis varying
//! fastest.

use astro_common::{HeaderMap, ScalarBuffer, Volume, VolumeId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fixtures;

/// Flat index of voxel `(i, j, k)` in a cube of `dims`.
pub fn voxel_index(dims: [usize; 3], i: usize, j: usize, k: usize) -> usize {
    i + dims[0] * (j + dims[1] * k)
}

/// Fill a buffer by evaluating `f(i, j, k)` for every voxel.
pub fn cube_from_fn<F>(dims: [usize; 3], mut f: F) -> Vec<f32>
where
    F: FnMut(usize, usize, usize) -> f32,
{
    let mut data = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
    for k in 0..dims[2] {
        for j in 0..dims[1] {
            for i in 0..dims[0] {
                data.push(f(i, j, k));
            }
        }
    }
    data
}

/// Uniform noise in `[-amplitude, amplitude]`, reproducible from `seed`.
///
/// The standard deviation is `amplitude / sqrt(3)`.
pub fn uniform_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..=amplitude))
        .collect()
}

/// Wrap an f32 buffer in a volume with the linear 3-axis header.
///
/// # Panics
///
/// Panics if `data` does not match `dims`.
pub fn volume_from_f32(id: &str, dims: [usize; 3], data: Vec<f32>) -> Volume {
    volume_with_header(id, dims, data, fixtures::linear_header(dims))
}

/// Wrap an f32 buffer in a volume with a caller-supplied header.
pub fn volume_with_header(id: &str, dims: [usize; 3], data: Vec<f32>, header: HeaderMap) -> Volume {
    Volume::new(
        VolumeId::new(id),
        id,
        dims,
        ScalarBuffer::Float32(data),
        header,
    )
    .expect("synthetic cube dimensions must match its buffer")
}

/// A cube holding `value` everywhere.
pub fn constant_cube(dims: [usize; 3], value: f32) -> Volume {
    volume_from_f32("constant", dims, vec![value; dims[0] * dims[1] * dims[2]])
}

/// A cube whose voxel value is its flat index.
pub fn ramp_cube(dims: [usize; 3]) -> Volume {
    let data = (0..dims[0] * dims[1] * dims[2]).map(|v| v as f32).collect();
    volume_from_f32("ramp", dims, data)
}

/// Background noise of the given amplitude with a bright source of
/// `peak` in the central channels.
pub fn spectral_line_cube(dims: [usize; 3], amplitude: f32, peak: f32, seed: u64) -> Volume {
    let mut data = uniform_noise(dims[0] * dims[1] * dims[2], amplitude, seed);
    let mid = dims[2] / 2;
    let (cx, cy) = (dims[0] / 2, dims[1] / 2);
    for k in mid.saturating_sub(1)..(mid + 2).min(dims[2]) {
        data[voxel_index(dims, cx, cy, k)] += peak;
    }
    volume_from_f32("line", dims, data)
}

/// A cube whose outer channels hold different noise levels.
///
/// Channels `[0, split)` get `low` amplitude, the rest `high`.
pub fn two_level_noise_cube(dims: [usize; 3], split: usize, low: f32, high: f32, seed: u64) -> Volume {
    let plane = dims[0] * dims[1];
    let mut data = uniform_noise(plane * dims[2], 1.0, seed);
    for (n, v) in data.iter_mut().enumerate() {
        *v *= if n / plane < split { low } else { high };
    }
    volume_from_f32("two-level", dims, data)
}
