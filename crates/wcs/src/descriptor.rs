//! Typed WCS descriptor parsed once from the header key/value map.

use std::fmt::Write as _;

use astro_common::HeaderMap;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WcsError};
use crate::spectral::SpectralKind;

/// Number of axes handled by the transform. Two-axis images are padded with
/// an identity third axis.
pub const WCS_AXES: usize = 3;

/// Role of an axis, derived from its `CTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisType {
    Longitude,
    Latitude,
    Spectral,
    Linear,
}

impl AxisType {
    pub fn classify(ctype: &str) -> Self {
        let prefix = ctype.split('-').next().unwrap_or("");
        // Celestial axes need a projection code, e.g. "RA---TAN".
        let projected = ctype.len() >= 8;
        match prefix {
            "RA" | "GLON" | "ELON" | "SLON" | "HLON" if projected => AxisType::Longitude,
            "DEC" | "GLAT" | "ELAT" | "SLAT" | "HLAT" if projected => AxisType::Latitude,
            "FREQ" | "VRAD" | "VOPT" | "VELO" | "FELO" | "WAVE" | "ZOPT" | "ENER" => {
                AxisType::Spectral
            }
            _ => AxisType::Linear,
        }
    }
}

/// Velocity definition of the spectral axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralConvention {
    RadioVelocity,
    OpticalVelocity,
    Frequency,
    Undefined,
}

impl SpectralConvention {
    pub fn from_ctype(ctype: &str) -> Self {
        match ctype.get(..4).and_then(SpectralKind::from_code) {
            Some(SpectralKind::RadioVelocity) => SpectralConvention::RadioVelocity,
            Some(SpectralKind::OpticalVelocity) => SpectralConvention::OpticalVelocity,
            Some(SpectralKind::Frequency) => SpectralConvention::Frequency,
            None => SpectralConvention::Undefined,
        }
    }

    pub fn kind(&self) -> Option<SpectralKind> {
        match self {
            SpectralConvention::RadioVelocity => Some(SpectralKind::RadioVelocity),
            SpectralConvention::OpticalVelocity => Some(SpectralKind::OpticalVelocity),
            SpectralConvention::Frequency => Some(SpectralKind::Frequency),
            SpectralConvention::Undefined => None,
        }
    }
}

/// Validation state of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WcsStatus {
    Valid,
    Invalid(String),
}

impl WcsStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, WcsStatus::Valid)
    }
}

/// One WCS axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub ctype: String,
    pub cunit: String,
    /// 1-based FITS reference pixel.
    pub crpix: f64,
    pub crval: f64,
    pub cdelt: f64,
}

impl Axis {
    pub fn axis_type(&self) -> AxisType {
        AxisType::classify(&self.ctype)
    }

    /// Identity axis used to pad two-axis images: world equals the 0-based
    /// pixel index.
    fn padding() -> Self {
        Self {
            ctype: String::new(),
            cunit: String::new(),
            crpix: 1.0,
            crval: 0.0,
            cdelt: 1.0,
        }
    }

    /// Projection code (`TAN`, `SIN`, ...) of a celestial axis.
    pub fn projection_code(&self) -> &str {
        self.ctype.get(5..8).unwrap_or("")
    }
}

/// Parsed world coordinate system of a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct WcsDescriptor {
    naxis: usize,
    axes: Vec<Axis>,
    pub pc: Matrix3<f64>,
    pub lonpole: Option<f64>,
    pub latpole: Option<f64>,
    pub restfrq: Option<f64>,
    pub specsys: Option<String>,
    pub radesys: Option<String>,
    pub equinox: Option<f64>,
}

impl WcsDescriptor {
    /// Build a descriptor directly from axes. `axes` must hold 2 or 3 entries.
    pub fn new(axes: Vec<Axis>, pc: Matrix3<f64>) -> Result<Self> {
        let naxis = axes.len();
        if !(2..=WCS_AXES).contains(&naxis) {
            return Err(WcsError::not_valid(format!(
                "expected 2 or 3 axes, got {}",
                naxis
            )));
        }
        let mut axes = axes;
        while axes.len() < WCS_AXES {
            axes.push(Axis::padding());
        }
        Ok(Self {
            naxis,
            axes,
            pc,
            lonpole: None,
            latpole: None,
            restfrq: None,
            specsys: None,
            radesys: None,
            equinox: None,
        })
    }

    /// Parse the standard FITS WCS keywords.
    pub fn from_header(header: &HeaderMap) -> Result<Self> {
        let naxis = match header.get_i64("WCSAXES")? {
            Some(n) => n,
            None => header.get_i64("NAXIS")?.unwrap_or(WCS_AXES as i64),
        };
        if naxis < 2 {
            return Err(WcsError::not_valid(format!(
                "at least two axes are required, header has {}",
                naxis
            )));
        }
        let naxis = (naxis as usize).min(WCS_AXES);

        let mut axes = Vec::with_capacity(naxis);
        for i in 1..=naxis {
            axes.push(Axis {
                ctype: header
                    .get_str(&format!("CTYPE{}", i))
                    .unwrap_or("")
                    .to_ascii_uppercase(),
                cunit: header.get_str(&format!("CUNIT{}", i)).unwrap_or("").to_string(),
                crpix: header.f64_or(&format!("CRPIX{}", i), 0.0)?,
                crval: header.f64_or(&format!("CRVAL{}", i), 0.0)?,
                cdelt: header.f64_or(&format!("CDELT{}", i), 1.0)?,
            });
        }

        let pc = parse_linear_matrix(header, &mut axes)?;
        let mut descriptor = Self::new(axes, pc)?;

        descriptor.lonpole = header.get_f64("LONPOLE")?;
        descriptor.latpole = header.get_f64("LATPOLE")?;
        descriptor.restfrq = match header.get_f64("RESTFRQ")? {
            Some(v) => Some(v),
            None => header.get_f64("RESTFREQ")?,
        };
        descriptor.specsys = header.get_str("SPECSYS").map(str::to_string);
        descriptor.radesys = header.get_str("RADESYS").map(str::to_string);
        descriptor.equinox = header.get_f64("EQUINOX")?;

        Ok(descriptor)
    }

    /// Number of axes declared by the header (2 or 3).
    pub fn naxis(&self) -> usize {
        self.naxis
    }

    /// All three axes, padded.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, index: usize) -> Option<&Axis> {
        self.axes.get(index)
    }

    /// Mutable access to an axis; the axis count and order stay fixed.
    pub fn axis_mut(&mut self, index: usize) -> Option<&mut Axis> {
        self.axes.get_mut(index)
    }

    /// Indices of the (longitude, latitude) pair if present.
    pub fn celestial_axes(&self) -> (Option<usize>, Option<usize>) {
        let lon = self
            .axes
            .iter()
            .position(|a| a.axis_type() == AxisType::Longitude);
        let lat = self
            .axes
            .iter()
            .position(|a| a.axis_type() == AxisType::Latitude);
        (lon, lat)
    }

    pub fn spectral_axis(&self) -> Option<usize> {
        self.axes
            .iter()
            .position(|a| a.axis_type() == AxisType::Spectral)
    }

    pub fn spectral_convention(&self) -> SpectralConvention {
        self.spectral_axis()
            .map(|i| SpectralConvention::from_ctype(&self.axes[i].ctype))
            .unwrap_or(SpectralConvention::Undefined)
    }

    /// Human-readable dump for diagnostics.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let join = |f: &dyn Fn(&Axis) -> String| -> String {
            self.axes[..self.naxis]
                .iter()
                .map(f)
                .collect::<Vec<_>>()
                .join(" ")
        };
        let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "undefined".into());

        let _ = writeln!(out, "naxis: {}", self.naxis);
        let _ = writeln!(out, "crpix: {}", join(&|a| a.crpix.to_string()));
        for i in 0..self.naxis {
            let row: Vec<String> = (0..self.naxis).map(|j| self.pc[(i, j)].to_string()).collect();
            let _ = writeln!(out, "pc{}: {}", i + 1, row.join(" "));
        }
        let _ = writeln!(out, "cdelt: {}", join(&|a| a.cdelt.to_string()));
        let _ = writeln!(out, "crval: {}", join(&|a| a.crval.to_string()));
        let _ = writeln!(out, "cunit: {}", join(&|a| format!("\"{}\"", a.cunit)));
        let _ = writeln!(out, "ctype: {}", join(&|a| format!("\"{}\"", a.ctype)));
        let _ = writeln!(out, "lonpole: {}", opt(self.lonpole));
        let _ = writeln!(out, "latpole: {}", opt(self.latpole));
        let _ = writeln!(out, "restfrq: {}", opt(self.restfrq));
        let _ = writeln!(out, "specsys: {}", self.specsys.as_deref().unwrap_or("undefined"));
        let _ = writeln!(out, "radesys: {}", self.radesys.as_deref().unwrap_or("undefined"));
        let _ = write!(out, "equinox: {}", opt(self.equinox));
        out
    }
}

/// Read `PCi_j`, falling back to `CDi_j` and then to `CROTA2`.
fn parse_linear_matrix(header: &HeaderMap, axes: &mut [Axis]) -> Result<Matrix3<f64>> {
    let naxis = axes.len();
    let mut pc = Matrix3::identity();

    let any_key = |prefix: &str| {
        (1..=naxis).any(|i| (1..=naxis).any(|j| header.contains(&format!("{}{}_{}", prefix, i, j))))
    };

    if any_key("PC") {
        for i in 0..naxis {
            for j in 0..naxis {
                let default = if i == j { 1.0 } else { 0.0 };
                pc[(i, j)] = header.f64_or(&format!("PC{}_{}", i + 1, j + 1), default)?;
            }
        }
    } else if any_key("CD") {
        for i in 0..naxis {
            for j in 0..naxis {
                pc[(i, j)] = header.f64_or(&format!("CD{}_{}", i + 1, j + 1), 0.0)?;
            }
            axes[i].cdelt = 1.0;
        }
    } else if let Some(crota) = header.get_f64("CROTA2")? {
        let lon = axes
            .iter()
            .position(|a| a.axis_type() == AxisType::Longitude)
            .unwrap_or(0);
        let lat = axes
            .iter()
            .position(|a| a.axis_type() == AxisType::Latitude)
            .unwrap_or(1);
        let (s, c) = crota.to_radians().sin_cos();
        let ratio = axes[lat].cdelt / axes[lon].cdelt;
        pc[(lon, lon)] = c;
        pc[(lon, lat)] = -s * ratio;
        pc[(lat, lon)] = s / ratio;
        pc[(lat, lat)] = c;
    }

    Ok(pc)
}
