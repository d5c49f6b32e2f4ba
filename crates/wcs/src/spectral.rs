//! Spectral axis conversions.
//!
//! A spectral axis is sampled linearly in one *basis* variable: frequency
//! (`F`, which also covers radio velocity) or wavelength (`W`, which also
//! covers optical velocity). When the displayed quantity uses a different
//! basis than the sampling, the axis is non-linear (`VOPT-F2W`,
//! `VRAD-W2F`).
//!
//! Internally all values are carried in SI units: Hz for frequency and
//! m/s for velocities.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WcsError};

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Spectral quantity shown on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralKind {
    Frequency,
    RadioVelocity,
    OpticalVelocity,
}

impl SpectralKind {
    /// Four-letter FITS code.
    pub fn code(&self) -> &'static str {
        match self {
            SpectralKind::Frequency => "FREQ",
            SpectralKind::RadioVelocity => "VRAD",
            SpectralKind::OpticalVelocity => "VOPT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FREQ" => Some(SpectralKind::Frequency),
            "VRAD" => Some(SpectralKind::RadioVelocity),
            "VOPT" | "FELO" => Some(SpectralKind::OpticalVelocity),
            _ => None,
        }
    }

    /// Letter of the basis this quantity is linear in.
    pub fn basis_letter(&self) -> char {
        match self {
            SpectralKind::Frequency | SpectralKind::RadioVelocity => 'F',
            SpectralKind::OpticalVelocity => 'W',
        }
    }

    fn from_basis_letter(letter: char) -> Option<Self> {
        match letter {
            'F' => Some(SpectralKind::Frequency),
            'W' => Some(SpectralKind::OpticalVelocity),
            _ => None,
        }
    }

    pub fn is_velocity(&self) -> bool {
        !matches!(self, SpectralKind::Frequency)
    }

    /// Convert an SI value of this quantity to frequency in Hz.
    fn to_frequency(self, value: f64, restfrq: f64) -> f64 {
        match self {
            SpectralKind::Frequency => value,
            SpectralKind::RadioVelocity => restfrq * (1.0 - value / SPEED_OF_LIGHT),
            SpectralKind::OpticalVelocity => restfrq / (1.0 + value / SPEED_OF_LIGHT),
        }
    }

    /// Convert a frequency in Hz to the SI value of this quantity.
    fn from_frequency(self, freq: f64, restfrq: f64) -> f64 {
        match self {
            SpectralKind::Frequency => freq,
            SpectralKind::RadioVelocity => SPEED_OF_LIGHT * (1.0 - freq / restfrq),
            SpectralKind::OpticalVelocity => SPEED_OF_LIGHT * (restfrq / freq - 1.0),
        }
    }

    /// d(frequency)/d(value) at an SI value of this quantity.
    fn dfreq_dvalue(self, value: f64, restfrq: f64) -> f64 {
        match self {
            SpectralKind::Frequency => 1.0,
            SpectralKind::RadioVelocity => -restfrq / SPEED_OF_LIGHT,
            SpectralKind::OpticalVelocity => {
                let beta = 1.0 + value / SPEED_OF_LIGHT;
                -restfrq / (SPEED_OF_LIGHT * beta * beta)
            }
        }
    }
}

/// Convert an SI value between two spectral quantities.
///
/// Same-kind conversions never need a rest frequency.
pub fn convert(value: f64, from: SpectralKind, to: SpectralKind, restfrq: Option<f64>) -> Result<f64> {
    if from == to {
        return Ok(value);
    }
    let nu0 = restfrq.ok_or(WcsError::MissingRestFrequency)?;
    let freq = from.to_frequency(value, nu0);
    Ok(to.from_frequency(freq, nu0))
}

/// d(to)/d(from) evaluated at an SI value of `from`.
pub fn derivative(value: f64, from: SpectralKind, to: SpectralKind, restfrq: Option<f64>) -> Result<f64> {
    if from == to {
        return Ok(1.0);
    }
    let nu0 = restfrq.ok_or(WcsError::MissingRestFrequency)?;
    let freq = from.to_frequency(value, nu0);
    let dfreq_dfrom = from.dfreq_dvalue(value, nu0);
    let to_value = to.from_frequency(freq, nu0);
    let dfreq_dto = to.dfreq_dvalue(to_value, nu0);
    Ok(dfreq_dfrom / dfreq_dto)
}

/// Scale from axis units to SI for a spectral quantity, `None` when the unit
/// is not recognised.
pub fn unit_scale(kind: SpectralKind, unit: &str) -> Option<f64> {
    let unit = unit.trim();
    if kind.is_velocity() {
        match unit.to_ascii_lowercase().as_str() {
            "" | "m/s" | "m s-1" => Some(1.0),
            "km/s" | "km s-1" => Some(1000.0),
            _ => None,
        }
    } else {
        match unit.to_ascii_lowercase().as_str() {
            "" | "hz" => Some(1.0),
            "khz" => Some(1e3),
            "mhz" => Some(1e6),
            "ghz" => Some(1e9),
            _ => None,
        }
    }
}

/// How intermediate spectral coordinates map to world values.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Algorithm {
    /// `world = crval + x`.
    Linear,
    /// `world = crval * exp(x / crval)`.
    Logarithmic,
    /// Linear in a different basis than the displayed quantity.
    NonLinear {
        sampling: SpectralKind,
        basis_ref: f64,
        dbasis_dworld: f64,
    },
}

/// Derived state for the spectral axis, rebuilt whenever the descriptor is
/// set.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAxis {
    /// Quantity shown, `None` for spectral types without a conversion model.
    pub kind: Option<SpectralKind>,
    pub crval: f64,
    /// Axis unit → SI.
    pub scale: f64,
    pub restfrq: Option<f64>,
    algorithm: Algorithm,
}

impl SpectralAxis {
    /// Build the spectral model from an axis `CTYPE` such as `VRAD`,
    /// `FREQ-LOG` or `VOPT-F2W`.
    pub fn from_ctype(ctype: &str, crval: f64, unit: &str, restfrq: Option<f64>) -> Result<Self> {
        let code = ctype.get(..4).unwrap_or(ctype).trim_end_matches('-');
        let suffix = ctype.get(5..).unwrap_or("");
        let kind = SpectralKind::from_code(code);
        let scale = match kind {
            Some(kind) => unit_scale(kind, unit).ok_or_else(|| {
                WcsError::not_valid(format!("unrecognised unit '{}' for {}", unit, ctype))
            })?,
            None => 1.0,
        };

        let algorithm = if suffix == "LOG" {
            if crval <= 0.0 {
                return Err(WcsError::not_valid(
                    "logarithmic spectral axis needs a positive reference value",
                ));
            }
            Algorithm::Logarithmic
        } else if let Some(sampling) = parse_x2p(suffix) {
            let kind = kind.ok_or_else(|| {
                WcsError::not_valid(format!("non-linear algorithm on unknown type {}", ctype))
            })?;
            let crval_si = crval * scale;
            let basis_ref = convert(crval_si, kind, sampling, restfrq)?;
            let dbasis_dworld = derivative(crval_si, kind, sampling, restfrq)? * scale;
            if dbasis_dworld == 0.0 || !dbasis_dworld.is_finite() {
                return Err(WcsError::not_valid(format!(
                    "degenerate spectral derivative for {}",
                    ctype
                )));
            }
            Algorithm::NonLinear {
                sampling,
                basis_ref,
                dbasis_dworld,
            }
        } else {
            Algorithm::Linear
        };

        Ok(Self {
            kind,
            crval,
            scale,
            restfrq,
            algorithm,
        })
    }

    pub fn is_linear(&self) -> bool {
        self.algorithm == Algorithm::Linear
    }

    /// Kind the axis is actually sampled in, `None` for unknown types.
    pub fn sampling(&self) -> Option<SpectralKind> {
        match self.algorithm {
            Algorithm::NonLinear { sampling, .. } => Some(sampling),
            _ => self.kind,
        }
    }

    /// Intermediate coordinate (axis units) → world value (axis units).
    pub fn to_world(&self, x: f64) -> Result<f64> {
        match self.algorithm {
            Algorithm::Linear => Ok(self.crval + x),
            Algorithm::Logarithmic => Ok(self.crval * (x / self.crval).exp()),
            Algorithm::NonLinear {
                sampling,
                basis_ref,
                dbasis_dworld,
            } => {
                let kind = self.kind.ok_or_else(|| WcsError::not_valid("unknown spectral type"))?;
                let basis = basis_ref + x * dbasis_dworld;
                let world_si = convert(basis, sampling, kind, self.restfrq)?;
                Ok(world_si / self.scale)
            }
        }
    }

    /// World value (axis units) → intermediate coordinate.
    pub fn to_intermediate(&self, world: f64) -> Result<f64> {
        match self.algorithm {
            Algorithm::Linear => Ok(world - self.crval),
            Algorithm::Logarithmic => {
                if world <= 0.0 {
                    return Err(WcsError::OutOfRange(format!(
                        "{} is not positive on a logarithmic axis",
                        world
                    )));
                }
                Ok(self.crval * (world / self.crval).ln())
            }
            Algorithm::NonLinear {
                sampling,
                basis_ref,
                dbasis_dworld,
            } => {
                let kind = self.kind.ok_or_else(|| WcsError::not_valid("unknown spectral type"))?;
                let basis = convert(world * self.scale, kind, sampling, self.restfrq)?;
                Ok((basis - basis_ref) / dbasis_dworld)
            }
        }
    }
}

/// Parse the `P2X` part of a non-linear algorithm code and return the
/// sampling kind `P`.
fn parse_x2p(suffix: &str) -> Option<SpectralKind> {
    let chars: Vec<char> = suffix.chars().collect();
    if chars.len() == 3 && chars[1] == '2' {
        SpectralKind::from_basis_letter(chars[0])
    } else {
        None
    }
}

/// Build the `CTYPE` for showing `target` on an axis sampled in `sampling`.
pub fn ctype_for(target: SpectralKind, sampling: SpectralKind) -> String {
    if target.basis_letter() == sampling.basis_letter() {
        target.code().to_string()
    } else {
        format!(
            "{}-{}2{}",
            target.code(),
            sampling.basis_letter(),
            target.basis_letter()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HI_RESTFRQ: f64 = 1.420405752e9;

    #[test]
    fn test_radio_optical_relations() {
        let v_radio = 1.0e6;
        let freq = convert(v_radio, SpectralKind::RadioVelocity, SpectralKind::Frequency, Some(HI_RESTFRQ)).unwrap();
        assert!((freq - HI_RESTFRQ * (1.0 - v_radio / SPEED_OF_LIGHT)).abs() < 1e-3);

        let v_opt = convert(freq, SpectralKind::Frequency, SpectralKind::OpticalVelocity, Some(HI_RESTFRQ)).unwrap();
        assert!((v_opt - SPEED_OF_LIGHT * (HI_RESTFRQ / freq - 1.0)).abs() < 1e-6);
        assert!(v_opt > v_radio);
    }

    #[test]
    fn test_conversion_needs_rest_frequency() {
        let err = convert(1.0, SpectralKind::RadioVelocity, SpectralKind::OpticalVelocity, None).unwrap_err();
        assert_eq!(err, WcsError::MissingRestFrequency);
        assert_eq!(convert(5.0, SpectralKind::Frequency, SpectralKind::Frequency, None).unwrap(), 5.0);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let v = 3.0e6;
        let h = 1.0;
        let analytic = derivative(v, SpectralKind::OpticalVelocity, SpectralKind::RadioVelocity, Some(HI_RESTFRQ)).unwrap();
        let plus = convert(v + h, SpectralKind::OpticalVelocity, SpectralKind::RadioVelocity, Some(HI_RESTFRQ)).unwrap();
        let minus = convert(v - h, SpectralKind::OpticalVelocity, SpectralKind::RadioVelocity, Some(HI_RESTFRQ)).unwrap();
        let numeric = (plus - minus) / (2.0 * h);
        assert!((analytic - numeric).abs() < 1e-6);
    }

    #[test]
    fn test_ctype_naming() {
        assert_eq!(ctype_for(SpectralKind::OpticalVelocity, SpectralKind::Frequency), "VOPT-F2W");
        assert_eq!(ctype_for(SpectralKind::RadioVelocity, SpectralKind::OpticalVelocity), "VRAD-W2F");
        assert_eq!(ctype_for(SpectralKind::RadioVelocity, SpectralKind::Frequency), "VRAD");
    }

    #[test]
    fn test_log_axis() {
        let axis = SpectralAxis::from_ctype("FREQ-LOG", 1.0e9, "Hz", None).unwrap();
        let world = axis.to_world(1.0e8).unwrap();
        assert!((world - 1.0e9 * (0.1f64).exp()).abs() < 1e-3);
        assert!((axis.to_intermediate(world).unwrap() - 1.0e8).abs() < 1e-6);
    }

    #[test]
    fn test_nonlinear_axis_reference_point() {
        let axis = SpectralAxis::from_ctype("VOPT-F2W", 1500.0, "km/s", Some(HI_RESTFRQ)).unwrap();
        assert!(!axis.is_linear());
        assert!((axis.to_world(0.0).unwrap() - 1500.0).abs() < 1e-9);
        let world = axis.to_world(25.0).unwrap();
        assert!((axis.to_intermediate(world).unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_unit_rejected() {
        assert!(SpectralAxis::from_ctype("VRAD", 0.0, "furlong/s", None).is_err());
    }
}
