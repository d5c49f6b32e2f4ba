//! Celestial projections and the spherical rotation between native and
//! celestial coordinates.
//!
//! All angles are in degrees. Projections map native spherical coordinates
//! (φ, θ) to intermediate world coordinates (x, y) on the projection plane.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WcsError};

const R2D: f64 = 180.0 / PI;
const D2R: f64 = PI / 180.0;
const POLE_TOLERANCE: f64 = 1e-10;

fn sind(a: f64) -> f64 {
    (a * D2R).sin()
}

fn cosd(a: f64) -> f64 {
    (a * D2R).cos()
}

fn atan2d(y: f64, x: f64) -> f64 {
    y.atan2(x) * R2D
}

/// Wrap an angle into [-180, 180).
fn wrap_180(a: f64) -> f64 {
    let wrapped = (a + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Wrap an angle into [0, 360).
pub fn wrap_360(a: f64) -> f64 {
    let wrapped = a.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Supported sky projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// Gnomonic.
    Tan,
    /// Orthographic.
    Sin,
    /// Zenithal equidistant.
    Arc,
    /// Stereographic.
    Stg,
    /// Zenithal equal area.
    Zea,
    /// Plate carrée.
    Car,
}

impl Projection {
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "TAN" => Ok(Projection::Tan),
            "SIN" => Ok(Projection::Sin),
            "ARC" => Ok(Projection::Arc),
            "STG" => Ok(Projection::Stg),
            "ZEA" => Ok(Projection::Zea),
            "CAR" => Ok(Projection::Car),
            other => Err(WcsError::UnsupportedProjection(other.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Projection::Tan => "TAN",
            Projection::Sin => "SIN",
            Projection::Arc => "ARC",
            Projection::Stg => "STG",
            Projection::Zea => "ZEA",
            Projection::Car => "CAR",
        }
    }

    pub fn is_zenithal(&self) -> bool {
        !matches!(self, Projection::Car)
    }

    /// Native coordinates (φ0, θ0) of the reference point.
    pub fn reference_point(&self) -> (f64, f64) {
        if self.is_zenithal() {
            (0.0, 90.0)
        } else {
            (0.0, 0.0)
        }
    }

    /// Native spherical (φ, θ) → projection plane (x, y).
    pub fn project(&self, phi: f64, theta: f64) -> Result<(f64, f64)> {
        let r = match self {
            Projection::Car => return Ok((wrap_180(phi), theta)),
            Projection::Tan => {
                if theta <= 0.0 {
                    return Err(WcsError::Projection(format!(
                        "θ = {} is not in the TAN hemisphere",
                        theta
                    )));
                }
                R2D * cosd(theta) / sind(theta)
            }
            Projection::Sin => {
                if theta < 0.0 {
                    return Err(WcsError::Projection(format!(
                        "θ = {} is on the far side of the SIN projection",
                        theta
                    )));
                }
                R2D * cosd(theta)
            }
            Projection::Arc => 90.0 - theta,
            Projection::Stg => {
                if theta <= -90.0 {
                    return Err(WcsError::Projection("STG is singular at θ = -90".into()));
                }
                2.0 * R2D * ((90.0 - theta) * D2R / 2.0).tan()
            }
            Projection::Zea => 2.0 * R2D * ((90.0 - theta) * D2R / 2.0).sin(),
        };

        Ok((r * sind(phi), -r * cosd(phi)))
    }

    /// Projection plane (x, y) → native spherical (φ, θ).
    pub fn deproject(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let r = x.hypot(y);
        let phi = if r == 0.0 { 0.0 } else { atan2d(x, -y) };

        let theta = match self {
            Projection::Car => {
                if y.abs() > 90.0 {
                    return Err(WcsError::Projection(format!("y = {} is beyond the pole", y)));
                }
                return Ok((x, y));
            }
            Projection::Tan => atan2d(R2D, r),
            Projection::Sin => {
                let c = r * D2R;
                if c > 1.0 {
                    return Err(WcsError::Projection(format!(
                        "({}, {}) lies outside the SIN disk",
                        x, y
                    )));
                }
                c.acos() * R2D
            }
            Projection::Arc => 90.0 - r,
            Projection::Stg => 90.0 - 2.0 * (r * D2R / 2.0).atan() * R2D,
            Projection::Zea => {
                let s = r * D2R / 2.0;
                if s > 1.0 {
                    return Err(WcsError::Projection(format!(
                        "({}, {}) lies outside the ZEA disk",
                        x, y
                    )));
                }
                90.0 - 2.0 * s.asin() * R2D
            }
        };

        Ok((phi, theta))
    }
}

/// Celestial pole and projection of a celestial axis pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelestialFrame {
    pub projection: Projection,
    /// Celestial longitude of the native pole.
    pub alpha_p: f64,
    /// Celestial latitude of the native pole.
    pub delta_p: f64,
    /// Native longitude of the celestial pole (`LONPOLE`).
    pub phi_p: f64,
}

impl CelestialFrame {
    /// Locate the native pole from the reference point (α0, δ0) and the
    /// optional `LONPOLE`/`LATPOLE` keywords.
    pub fn new(
        projection: Projection,
        alpha_0: f64,
        delta_0: f64,
        lonpole: Option<f64>,
        latpole: Option<f64>,
    ) -> Result<Self> {
        if !(-90.0..=90.0).contains(&delta_0) {
            return Err(WcsError::not_valid(format!(
                "reference latitude {} is out of range",
                delta_0
            )));
        }

        let (phi_0, theta_0) = projection.reference_point();
        let phi_p = lonpole.unwrap_or(if delta_0 >= theta_0 { phi_0 } else { phi_0 + 180.0 });
        let latpole = latpole.unwrap_or(90.0);

        let delta_p = if theta_0 == 90.0 {
            delta_0
        } else {
            let base = atan2d(sind(theta_0), cosd(theta_0) * cosd(phi_p - phi_0));
            let denom = (1.0 - (cosd(theta_0) * sind(phi_p - phi_0)).powi(2)).sqrt();
            if denom < POLE_TOLERANCE {
                return Err(WcsError::not_valid("celestial pole is undefined"));
            }
            let ratio = sind(delta_0) / denom;
            if ratio.abs() > 1.0 + POLE_TOLERANCE {
                return Err(WcsError::not_valid("no valid celestial pole for LONPOLE"));
            }
            let offset = ratio.clamp(-1.0, 1.0).acos() * R2D;

            let candidates = [wrap_180(base + offset), wrap_180(base - offset)];
            candidates
                .iter()
                .copied()
                .filter(|d| d.abs() <= 90.0 + POLE_TOLERANCE)
                .min_by(|a, b| {
                    (a - latpole)
                        .abs()
                        .partial_cmp(&(b - latpole).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .ok_or_else(|| WcsError::not_valid("no valid celestial pole latitude"))?
                .clamp(-90.0, 90.0)
        };

        let alpha_p = if (delta_p - 90.0).abs() < POLE_TOLERANCE {
            alpha_0 + phi_p - phi_0 - 180.0
        } else if (delta_p + 90.0).abs() < POLE_TOLERANCE {
            alpha_0 - phi_p + phi_0
        } else if theta_0 == 90.0 {
            alpha_0
        } else {
            let x = (sind(theta_0) - sind(delta_p) * sind(delta_0)) / (cosd(delta_p) * cosd(delta_0));
            let y = sind(phi_p - phi_0) * cosd(theta_0) / cosd(delta_0);
            alpha_0 - atan2d(y, x)
        };

        Ok(Self {
            projection,
            alpha_p,
            delta_p,
            phi_p,
        })
    }

    /// Native (φ, θ) → celestial (α, δ), α in [0, 360).
    pub fn native_to_celestial(&self, phi: f64, theta: f64) -> (f64, f64) {
        let dphi = phi - self.phi_p;
        let x = sind(theta) * cosd(self.delta_p) - cosd(theta) * sind(self.delta_p) * cosd(dphi);
        let y = -cosd(theta) * sind(dphi);
        let alpha = wrap_360(self.alpha_p + atan2d(y, x));
        let sin_delta = sind(theta) * sind(self.delta_p) + cosd(theta) * cosd(self.delta_p) * cosd(dphi);
        let delta = sin_delta.clamp(-1.0, 1.0).asin() * R2D;
        (alpha, delta)
    }

    /// Celestial (α, δ) → native (φ, θ), φ in [-180, 180).
    pub fn celestial_to_native(&self, alpha: f64, delta: f64) -> (f64, f64) {
        let dalpha = alpha - self.alpha_p;
        let x = sind(delta) * cosd(self.delta_p) - cosd(delta) * sind(self.delta_p) * cosd(dalpha);
        let y = -cosd(delta) * sind(dalpha);
        let phi = wrap_180(self.phi_p + atan2d(y, x));
        let sin_theta = sind(delta) * sind(self.delta_p) + cosd(delta) * cosd(self.delta_p) * cosd(dalpha);
        let theta = sin_theta.clamp(-1.0, 1.0).asin() * R2D;
        (phi, theta)
    }

    /// Projection plane (x, y) → celestial (α, δ).
    pub fn plane_to_celestial(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (phi, theta) = self.projection.deproject(x, y)?;
        Ok(self.native_to_celestial(phi, theta))
    }

    /// Celestial (α, δ) → projection plane (x, y).
    pub fn celestial_to_plane(&self, alpha: f64, delta: f64) -> Result<(f64, f64)> {
        let (phi, theta) = self.celestial_to_native(alpha, delta);
        self.projection.project(phi, theta)
    }
}
