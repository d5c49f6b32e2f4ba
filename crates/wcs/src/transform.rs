//! Bidirectional pixel ↔ world transform.

use astro_common::{CoordinateSpace, HeaderMap, Volume};
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

use crate::celestial::{CelestialFrame, Projection};
use crate::descriptor::{SpectralConvention, WcsDescriptor, WcsStatus};
use crate::error::{Result, WcsError};
use crate::format::{self, AxisRole, DisplayConfig, FormattedValue, Quantity, UnitPreference};
use crate::spectral::{self, SpectralAxis};
use crate::ticks::{self, TickStep};

/// Determinant below which the PC matrix is treated as singular.
const SINGULAR_DETERMINANT: f64 = 1e-12;

/// State rebuilt by [`WcsTransform::set`].
#[derive(Debug, Clone)]
struct Derived {
    /// `diag(cdelt) * pc`
    linear: Matrix3<f64>,
    linear_inv: Matrix3<f64>,
    crpix: Vector3<f64>,
    celestial: Option<(usize, usize, CelestialFrame)>,
    spectral: Option<(usize, SpectralAxis)>,
}

/// A descriptor together with its validation status and derived state.
///
/// Pixel coordinates are 0-based voxel indices.
#[derive(Debug, Clone)]
pub struct WcsTransform {
    descriptor: WcsDescriptor,
    status: WcsStatus,
    derived: Option<Derived>,
}

impl WcsTransform {
    /// Wrap a descriptor and run the set step.
    pub fn new(descriptor: WcsDescriptor) -> Self {
        let mut transform = Self {
            descriptor,
            status: WcsStatus::Invalid("not set".into()),
            derived: None,
        };
        // Failures are recorded in `status`.
        let _ = transform.set();
        transform
    }

    /// Parse a header. Malformed keyword values are errors; a descriptor
    /// that parses but does not validate yields an invalid transform
    /// carrying the reason.
    pub fn from_header(header: &HeaderMap) -> Result<Self> {
        let descriptor = WcsDescriptor::from_header(header)?;
        Ok(Self::new(descriptor))
    }

    /// Build the transform for a volume and fall back to voxel display when
    /// it does not validate.
    pub fn for_volume(volume: &mut Volume) -> Result<Self> {
        let transform = Self::from_header(volume.header());
        match transform {
            Ok(t) if t.is_valid() => {
                volume.set_coordinate_space(CoordinateSpace::World);
                Ok(t)
            }
            Ok(t) => {
                warn!(
                    volume = %volume.id,
                    reason = %t.status_reason(),
                    "WCS is invalid, falling back to IJK space"
                );
                volume.set_coordinate_space(CoordinateSpace::Ijk);
                Ok(t)
            }
            Err(e) => {
                warn!(volume = %volume.id, error = %e, "WCS header could not be parsed");
                volume.set_coordinate_space(CoordinateSpace::Ijk);
                Err(e)
            }
        }
    }

    pub fn descriptor(&self) -> &WcsDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> &WcsStatus {
        &self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    fn status_reason(&self) -> String {
        match &self.status {
            WcsStatus::Valid => "valid".to_string(),
            WcsStatus::Invalid(reason) => reason.clone(),
        }
    }

    /// Apply a change to the descriptor, then re-run the set step.
    pub fn update<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut WcsDescriptor),
    {
        change(&mut self.descriptor);
        self.set()
    }

    /// Validate the descriptor and rebuild derived state.
    pub fn set(&mut self) -> Result<()> {
        match build_derived(&self.descriptor) {
            Ok(derived) => {
                self.derived = Some(derived);
                self.status = WcsStatus::Valid;
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "WCS set failed");
                self.derived = None;
                self.status = WcsStatus::Invalid(e.to_string());
                Err(e)
            }
        }
    }

    fn derived(&self) -> Result<&Derived> {
        match (&self.status, &self.derived) {
            (WcsStatus::Valid, Some(derived)) => Ok(derived),
            (WcsStatus::Invalid(reason), _) => Err(WcsError::NotValid(reason.clone())),
            (WcsStatus::Valid, None) => Err(WcsError::not_valid("derived state missing")),
        }
    }

    /// 0-based voxel indices → world coordinates.
    pub fn pixel_to_world(&self, ijk: [f64; 3]) -> Result<[f64; 3]> {
        let derived = self.derived()?;
        let pixel = Vector3::new(ijk[0] + 1.0, ijk[1] + 1.0, ijk[2] + 1.0);
        let intermediate = derived.linear * (pixel - derived.crpix);

        let mut world = [0.0; 3];
        for (i, w) in world.iter_mut().enumerate() {
            *w = self.descriptor.axes()[i].crval + intermediate[i];
        }

        if let Some((lon, lat, frame)) = &derived.celestial {
            let (alpha, delta) = frame.plane_to_celestial(intermediate[*lon], intermediate[*lat])?;
            world[*lon] = alpha;
            world[*lat] = delta;
        }

        if let Some((index, axis)) = &derived.spectral {
            world[*index] = axis.to_world(intermediate[*index])?;
        }

        Ok(world)
    }

    /// World coordinates → 0-based voxel indices.
    pub fn world_to_pixel(&self, world: [f64; 3]) -> Result<[f64; 3]> {
        let derived = self.derived()?;

        let mut intermediate = Vector3::zeros();
        for i in 0..3 {
            intermediate[i] = world[i] - self.descriptor.axes()[i].crval;
        }

        if let Some((lon, lat, frame)) = &derived.celestial {
            if !(-90.0..=90.0).contains(&world[*lat]) {
                return Err(WcsError::OutOfRange(format!(
                    "latitude {} outside [-90, 90]",
                    world[*lat]
                )));
            }
            let (x, y) = frame.celestial_to_plane(world[*lon], world[*lat])?;
            intermediate[*lon] = x;
            intermediate[*lat] = y;
        }

        if let Some((index, axis)) = &derived.spectral {
            intermediate[*index] = axis.to_intermediate(world[*index])?;
        }

        let pixel = derived.linear_inv * intermediate + derived.crpix;
        Ok([pixel[0] - 1.0, pixel[1] - 1.0, pixel[2] - 1.0])
    }

    /// Reinterpret the spectral axis in another velocity convention.
    ///
    /// Returns `true` when the axis is (now) in the requested convention and
    /// `false`, leaving the descriptor untouched, when the conversion is not
    /// possible.
    pub fn set_spectral_convention(&mut self, target: SpectralConvention) -> bool {
        if !self.is_valid() {
            warn!("Cannot change spectral convention: WCS is not valid");
            return false;
        }
        let Some(index) = self.descriptor.spectral_axis() else {
            warn!("Cannot change spectral convention: no spectral axis");
            return false;
        };
        let current = self.descriptor.spectral_convention();
        if current == target {
            return true;
        }

        match self.converted_descriptor(index, target) {
            Ok(candidate) => {
                let previous = std::mem::replace(&mut self.descriptor, candidate);
                match self.set() {
                    Ok(()) => {
                        debug!(
                            ctype = %self.descriptor.axes()[index].ctype,
                            "Spectral convention changed"
                        );
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "Spectral conversion failed validation");
                        self.descriptor = previous;
                        // The previous descriptor was valid.
                        let _ = self.set();
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, ?target, "Spectral convention not changed");
                false
            }
        }
    }

    fn converted_descriptor(&self, index: usize, target: SpectralConvention) -> Result<WcsDescriptor> {
        let target_kind = target
            .kind()
            .ok_or_else(|| WcsError::not_valid("target convention is undefined"))?;
        let derived = self.derived()?;
        let (_, axis) = derived
            .spectral
            .as_ref()
            .ok_or_else(|| WcsError::not_valid("no spectral model"))?;
        let current_kind = axis
            .kind
            .ok_or_else(|| WcsError::not_valid("spectral type has no conversion model"))?;
        let old = &self.descriptor.axes()[index];
        if old.ctype.ends_with("-LOG") {
            return Err(WcsError::not_valid("logarithmic axes cannot be converted"));
        }
        let sampling = axis
            .sampling()
            .ok_or_else(|| WcsError::not_valid("spectral sampling unknown"))?;
        let restfrq = Some(self.descriptor.restfrq.ok_or(WcsError::MissingRestFrequency)?);

        let crval_si = old.crval * axis.scale;
        let new_crval_si = spectral::convert(crval_si, current_kind, target_kind, restfrq)?;
        let dnew_dold = spectral::derivative(crval_si, current_kind, target_kind, restfrq)?;

        let (new_unit, new_scale) = if target_kind.is_velocity() == current_kind.is_velocity() {
            (old.cunit.clone(), axis.scale)
        } else if target_kind.is_velocity() {
            ("m/s".to_string(), 1.0)
        } else {
            ("Hz".to_string(), 1.0)
        };

        let mut candidate = self.descriptor.clone();
        if let Some(new_axis) = candidate.axis_mut(index) {
            new_axis.ctype = spectral::ctype_for(target_kind, sampling);
            new_axis.crval = new_crval_si / new_scale;
            new_axis.cdelt = old.cdelt * dnew_dold * axis.scale / new_scale;
            new_axis.cunit = new_unit;
        }
        Ok(candidate)
    }

    /// `CTYPE` of the spectral axis, used as the velocity tag in displays.
    pub fn spectral_type(&self) -> Option<&str> {
        self.descriptor
            .spectral_axis()
            .map(|i| self.descriptor.axes()[i].ctype.as_str())
    }

    /// Format a world value for display; spectral velocities get the
    /// convention tag appended.
    pub fn format_world_value(
        &self,
        value: f64,
        role: AxisRole,
        precision: usize,
        previous: [f64; 3],
        config: &DisplayConfig,
    ) -> Result<FormattedValue> {
        self.derived()?;
        let mut formatted = format::format_world_value(value, role, precision, previous, config)?;
        if role == AxisRole::Z && config.unit(role).is_velocity() {
            if let Some(tag) = self.spectral_type() {
                formatted.text = format!("{} ({})", formatted.text, tag);
            }
        }
        Ok(formatted)
    }

    /// Tick step for an axis using the display hint configured for it.
    pub fn tick_step(
        &self,
        role: AxisRole,
        world_span: f64,
        desired_point_count: usize,
        config: &DisplayConfig,
    ) -> Result<TickStep> {
        self.derived()?;
        ticks::tick_step(config.unit(role).hint, world_span, desired_point_count)
    }

    /// Display preferences matching the axes of this transform.
    pub fn display_config(&self) -> DisplayConfig {
        let mut config = DisplayConfig::default();
        let axes = self.descriptor.axes();
        let (lon, lat) = self.descriptor.celestial_axes();
        if lon != Some(0) {
            config.x = UnitPreference::plain(Quantity::Generic, axes[0].cunit.clone(), 1.0);
        }
        if lat != Some(1) {
            config.y = UnitPreference::plain(Quantity::Generic, axes[1].cunit.clone(), 1.0);
        }

        let spectral_kind = self.descriptor.spectral_convention().kind();
        let z_axis = &axes[2];
        config.z = match spectral_kind {
            Some(kind) if self.descriptor.spectral_axis() == Some(2) => {
                let to_si = spectral::unit_scale(kind, &z_axis.cunit).unwrap_or(1.0);
                if kind.is_velocity() {
                    UnitPreference::plain(Quantity::Velocity, "km/s", to_si / 1000.0)
                } else {
                    UnitPreference::plain(Quantity::Frequency, "MHz", to_si / 1e6)
                }
            }
            _ => UnitPreference::plain(Quantity::Generic, z_axis.cunit.clone(), 1.0),
        };
        config
    }

    pub fn describe(&self) -> String {
        self.descriptor.describe()
    }
}

fn build_derived(descriptor: &WcsDescriptor) -> Result<Derived> {
    let axes = descriptor.axes();

    let mut scale = Matrix3::zeros();
    for (i, axis) in axes.iter().enumerate() {
        if axis.cdelt == 0.0 || !axis.cdelt.is_finite() {
            return Err(WcsError::not_valid(format!("CDELT{} is zero", i + 1)));
        }
        scale[(i, i)] = axis.cdelt;
    }

    if descriptor.pc.determinant().abs() < SINGULAR_DETERMINANT {
        return Err(WcsError::SingularMatrix);
    }
    let linear = scale * descriptor.pc;
    let linear_inv = linear.try_inverse().ok_or(WcsError::SingularMatrix)?;
    let crpix = Vector3::new(axes[0].crpix, axes[1].crpix, axes[2].crpix);

    let celestial = match descriptor.celestial_axes() {
        (None, None) => None,
        (Some(lon), Some(lat)) => {
            let lon_code = axes[lon].projection_code();
            let lat_code = axes[lat].projection_code();
            if lon_code != lat_code {
                return Err(WcsError::not_valid(format!(
                    "celestial axes disagree on projection: {} vs {}",
                    lon_code, lat_code
                )));
            }
            let projection = Projection::from_code(lon_code)?;
            let frame = CelestialFrame::new(
                projection,
                axes[lon].crval,
                axes[lat].crval,
                descriptor.lonpole,
                descriptor.latpole,
            )?;
            Some((lon, lat, frame))
        }
        _ => return Err(WcsError::not_valid("unpaired celestial axis")),
    };

    let spectral = match descriptor.spectral_axis() {
        Some(index) => {
            let axis = &axes[index];
            let model = SpectralAxis::from_ctype(&axis.ctype, axis.crval, &axis.cunit, descriptor.restfrq)?;
            Some((index, model))
        }
        None => None,
    };

    Ok(Derived {
        linear,
        linear_inv,
        crpix,
        celestial,
        spectral,
    })
}
