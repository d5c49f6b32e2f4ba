//! In-memory representation of a loaded data cube.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AstroError, AstroResult};
use crate::header::HeaderMap;
use crate::ids::VolumeId;
use crate::metadata;

/// Element type of a volume buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    UInt8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Map a FITS `BITPIX` value to a scalar type.
    pub fn from_bitpix(bitpix: i64) -> Option<Self> {
        match bitpix {
            8 => Some(ScalarType::UInt8),
            16 => Some(ScalarType::Int16),
            32 => Some(ScalarType::Int32),
            64 => Some(ScalarType::Int64),
            -32 => Some(ScalarType::Float32),
            -64 => Some(ScalarType::Float64),
            _ => None,
        }
    }

    /// Parse a short type name such as `f32` or `int16`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Some(ScalarType::UInt8),
            "i16" | "int16" => Some(ScalarType::Int16),
            "i32" | "int32" => Some(ScalarType::Int32),
            "i64" | "int64" => Some(ScalarType::Int64),
            "f32" | "float32" => Some(ScalarType::Float32),
            "f64" | "float64" => Some(ScalarType::Float64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::UInt8 => "u8",
            ScalarType::Int16 => "i16",
            ScalarType::Int32 => "i32",
            ScalarType::Int64 => "i64",
            ScalarType::Float32 => "f32",
            ScalarType::Float64 => "f64",
        }
    }

    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            ScalarType::UInt8 => 1,
            ScalarType::Int16 => 2,
            ScalarType::Int32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::Float64 => 8,
        }
    }

    /// Whether statistics and display support this element type.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ScalarType::UInt8)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed voxel storage, x fastest, then y, then z.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarBuffer {
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl ScalarBuffer {
    /// Reinterpret native-endian bytes as a typed buffer.
    pub fn from_native_bytes(scalar_type: ScalarType, bytes: &[u8]) -> AstroResult<Self> {
        let size = scalar_type.size_bytes();
        if bytes.len() % size != 0 {
            return Err(AstroError::invalid_parameter(
                "buffer",
                format!(
                    "{} bytes is not a multiple of the {} element size",
                    bytes.len(),
                    scalar_type
                ),
            ));
        }

        Ok(match scalar_type {
            ScalarType::UInt8 => ScalarBuffer::UInt8(bytes.to_vec()),
            ScalarType::Int16 => ScalarBuffer::Int16(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::Int32 => ScalarBuffer::Int32(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::Int64 => ScalarBuffer::Int64(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::Float32 => ScalarBuffer::Float32(bytemuck::pod_collect_to_vec(bytes)),
            ScalarType::Float64 => ScalarBuffer::Float64(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ScalarBuffer::UInt8(_) => ScalarType::UInt8,
            ScalarBuffer::Int16(_) => ScalarType::Int16,
            ScalarBuffer::Int32(_) => ScalarType::Int32,
            ScalarBuffer::Int64(_) => ScalarType::Int64,
            ScalarBuffer::Float32(_) => ScalarType::Float32,
            ScalarBuffer::Float64(_) => ScalarType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScalarBuffer::UInt8(v) => v.len(),
            ScalarBuffer::Int16(v) => v.len(),
            ScalarBuffer::Int32(v) => v.len(),
            ScalarBuffer::Int64(v) => v.len(),
            ScalarBuffer::Float32(v) => v.len(),
            ScalarBuffer::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a flat index, widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            ScalarBuffer::UInt8(v) => v.get(index).map(|&x| f64::from(x)),
            ScalarBuffer::Int16(v) => v.get(index).map(|&x| f64::from(x)),
            ScalarBuffer::Int32(v) => v.get(index).map(|&x| f64::from(x)),
            ScalarBuffer::Int64(v) => v.get(index).map(|&x| x as f64),
            ScalarBuffer::Float32(v) => v.get(index).map(|&x| f64::from(x)),
            ScalarBuffer::Float64(v) => v.get(index).copied(),
        }
    }

    /// Multiply floating-point buffers in place. Integer buffers are left
    /// untouched and `false` is returned.
    fn scale_floats(&mut self, factor: f64) -> bool {
        match self {
            ScalarBuffer::Float32(v) => {
                let factor = factor as f32;
                v.iter_mut().for_each(|x| *x *= factor);
                true
            }
            ScalarBuffer::Float64(v) => {
                v.iter_mut().for_each(|x| *x *= factor);
                true
            }
            _ => false,
        }
    }
}

/// Coordinate space used to display positions inside a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// Voxel indices only.
    Ijk,
    /// World coordinates through a valid WCS.
    World,
}

/// Physical quantity carried by the third (spectral) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralQuantity {
    Velocity,
    Frequency,
}

/// A loaded 3D cube with its header and derived metadata.
#[derive(Debug, Clone)]
pub struct Volume {
    pub id: VolumeId,
    pub name: String,
    dims: [usize; 3],
    buffer: ScalarBuffer,
    header: HeaderMap,
    attributes: BTreeMap<String, String>,
    coordinate_space: CoordinateSpace,
    is_label_map: bool,
}

impl Volume {
    /// Build a volume, checking that the buffer matches the dimensions.
    ///
    /// Flux in Westerbork units is converted to Jy/beam here, once.
    pub fn new(
        id: VolumeId,
        name: impl Into<String>,
        dims: [usize; 3],
        buffer: ScalarBuffer,
        header: HeaderMap,
    ) -> AstroResult<Self> {
        if dims.iter().any(|&d| d == 0) {
            return Err(AstroError::invalid_parameter(
                "dims",
                format!("dimensions must be non-zero, got {:?}", dims),
            ));
        }
        let expected = dims[0] * dims[1] * dims[2];
        if buffer.len() != expected {
            return Err(AstroError::invalid_parameter(
                "buffer",
                format!(
                    "buffer holds {} voxels but dimensions {:?} need {}",
                    buffer.len(),
                    dims,
                    expected
                ),
            ));
        }

        let mut volume = Self {
            id,
            name: name.into(),
            dims,
            buffer,
            header,
            attributes: BTreeMap::new(),
            coordinate_space: CoordinateSpace::World,
            is_label_map: false,
        };
        volume.convert_westerbork_units();
        Ok(volume)
    }

    /// Mark this volume as a label map (segmentation output).
    pub fn into_label_map(mut self) -> Self {
        self.is_label_map = true;
        self
    }

    fn convert_westerbork_units(&mut self) {
        let is_wu = self
            .header
            .get_str(metadata::BUNIT)
            .map(|unit| unit.eq_ignore_ascii_case(metadata::WESTERBORK_UNIT))
            .unwrap_or(false);
        if !is_wu {
            return;
        }

        if self.buffer.scale_floats(metadata::WESTERBORK_TO_JANSKY) {
            self.header
                .insert(metadata::BUNIT, metadata::JANSKY_PER_BEAM);
            warn!(
                volume = %self.id,
                factor = metadata::WESTERBORK_TO_JANSKY,
                "Converted flux from W.U. to JY/BEAM"
            );
        } else {
            warn!(
                volume = %self.id,
                scalar_type = %self.buffer.scalar_type(),
                "Flux is in W.U. but the buffer is integer; leaving values unconverted"
            );
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn buffer(&self) -> &ScalarBuffer {
        &self.buffer
    }

    pub fn header(&self) -> &HeaderMap {
        &self.header
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.buffer.scalar_type()
    }

    pub fn is_label_map(&self) -> bool {
        self.is_label_map
    }

    /// Number of meaningful axes: the `NAXIS` keyword when present,
    /// otherwise the highest axis longer than one voxel.
    pub fn naxis(&self) -> usize {
        if let Ok(Some(n)) = self.header.get_i64("NAXIS") {
            if (1..=3).contains(&n) {
                return n as usize;
            }
        }
        if self.dims[2] > 1 {
            3
        } else if self.dims[1] > 1 {
            2
        } else {
            1
        }
    }

    /// Geometric centre in integer voxel indices.
    pub fn center(&self) -> [i64; 3] {
        [
            (self.dims[0] / 2) as i64,
            (self.dims[1] / 2) as i64,
            (self.dims[2] / 2) as i64,
        ]
    }

    pub fn contains(&self, ijk: [i64; 3]) -> bool {
        ijk.iter()
            .zip(self.dims.iter())
            .all(|(&i, &d)| i >= 0 && (i as usize) < d)
    }

    /// Voxel value at integer indices, `None` when out of range.
    pub fn value_at(&self, ijk: [i64; 3]) -> Option<f64> {
        if !self.contains(ijk) {
            return None;
        }
        let [i, j, k] = ijk.map(|v| v as usize);
        let index = i + j * self.dims[0] + k * self.dims[0] * self.dims[1];
        self.buffer.get_f64(index)
    }

    /// Text shown for the voxel under the cursor.
    pub fn describe_pixel(&self, ijk: [i64; 3]) -> String {
        match self.value_at(ijk) {
            None => "Out of Frame".to_string(),
            Some(value) if self.is_label_map => format!("{}", (value as i64).max(0)),
            Some(value) => format!("{}", value),
        }
    }

    pub fn coordinate_space(&self) -> CoordinateSpace {
        self.coordinate_space
    }

    pub fn set_coordinate_space(&mut self, space: CoordinateSpace) {
        self.coordinate_space = space;
    }

    /// Quantity shown for the spectral axis, chosen from `CUNIT3`.
    pub fn spectral_quantity(&self) -> SpectralQuantity {
        match self.header.get_str("CUNIT3") {
            Some(unit) if unit.eq_ignore_ascii_case("HZ") => SpectralQuantity::Frequency,
            _ => SpectralQuantity::Velocity,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attributes.insert(key.into(), value.to_string());
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}
