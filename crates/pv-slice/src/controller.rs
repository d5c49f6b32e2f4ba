//! Ruler ↔ parameters ↔ reslice synchronization.
//!
//! Every pass has exactly one cause: either the ruler was moved or the
//! angle/shift parameters were edited. The controller updates the other
//! representation and requests a reslice. Notifications the host emits in
//! response to the controller's own writes arrive while the `synchronizing`
//! flag is raised and are dropped; echoes delivered later carry no change
//! and are absorbed by the delta check.
//!
//! State is committed only after every host write of a pass succeeded, so a
//! failure leaves the last valid geometry in place.

use std::cell::{Cell, RefCell};

use astro_common::{RulerId, VolumeId};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use wcs::{WcsError, WcsStatus, WcsTransform};

use crate::config::SliceConfig;
use crate::error::{Result, SliceError};
use crate::geometry;
use crate::host::SliceHost;
use crate::params::{RulerPose, SliceParameters};

/// Lifecycle of a slice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlicePhase {
    /// No usable input volume.
    Idle,
    /// Input volume resolved, waiting for a ruler.
    AwaitingRuler,
    /// Ruler, parameters and reslice agree.
    Synchronized,
}

/// External notifications driving the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceEvent {
    /// A new input cube was selected.
    ///
    /// The session drops its ruler reference and waits for a new
    /// `RulerSelected`; until then ruler edits fail with
    /// `MissingCollaborator`.
    InputVolumeChanged(VolumeId),
    /// A moment map was selected as the reference plane.
    MomentMapSelected(VolumeId),
    /// A ruler was selected for the session.
    RulerSelected(RulerId),
    /// The ruler's endpoints were edited.
    RulerEndpointsChanged,
    /// The angle or shifts were edited; carries the new values.
    AngleOrShiftChanged(RulerPose),
}

impl SliceEvent {
    fn name(&self) -> &'static str {
        match self {
            SliceEvent::InputVolumeChanged(_) => "InputVolumeChanged",
            SliceEvent::MomentMapSelected(_) => "MomentMapSelected",
            SliceEvent::RulerSelected(_) => "RulerSelected",
            SliceEvent::RulerEndpointsChanged => "RulerEndpointsChanged",
            SliceEvent::AngleOrShiftChanged(_) => "AngleOrShiftChanged",
        }
    }
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A full pass ran and a reslice was requested.
    Synchronized,
    /// Session state changed without a reslice.
    Updated,
    /// Nothing changed.
    NoOp,
    /// Dropped because it was raised by the controller's own write.
    Suppressed,
}

#[derive(Debug, Clone)]
struct SessionState {
    phase: SlicePhase,
    params: SliceParameters,
    wcs: Option<WcsTransform>,
    /// Pixel dimensions of the reference plane.
    plane_dims: [usize; 3],
    half_length: f64,
}

impl SessionState {
    fn idle() -> Self {
        Self {
            phase: SlicePhase::Idle,
            params: SliceParameters::new(),
            wcs: None,
            plane_dims: [0; 3],
            half_length: 0.0,
        }
    }

    fn pivot(&self) -> Vector3<f64> {
        let p = self.params.pivot;
        Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64)
    }

    fn wcs(&self) -> Result<&WcsTransform> {
        self.wcs
            .as_ref()
            .ok_or_else(|| SliceError::MissingCollaborator("input volume".to_string()))
    }

    fn input_volume(&self) -> Result<&VolumeId> {
        self.params
            .input_volume
            .as_ref()
            .ok_or_else(|| SliceError::MissingCollaborator("input volume".to_string()))
    }

    fn ruler(&self) -> Result<&RulerId> {
        self.params
            .ruler
            .as_ref()
            .ok_or_else(|| SliceError::MissingCollaborator("ruler".to_string()))
    }

    fn to_world(&self, pixels: &[Vector3<f64>; 2]) -> Result<[[f64; 3]; 2]> {
        let wcs = self.wcs()?;
        Ok([
            wcs.pixel_to_world([pixels[0].x, pixels[0].y, pixels[0].z])?,
            wcs.pixel_to_world([pixels[1].x, pixels[1].y, pixels[1].z])?,
        ])
    }

    fn to_pixels(&self, world: &[[f64; 3]; 2]) -> Result<[Vector3<f64>; 2]> {
        let wcs = self.wcs()?;
        let a = wcs.world_to_pixel(world[0])?;
        let b = wcs.world_to_pixel(world[1])?;
        Ok([Vector3::from(a), Vector3::from(b)])
    }
}

/// Clears the synchronizing flag when a pass ends, including on error.
struct SyncGuard<'a>(&'a Cell<bool>);

impl<'a> SyncGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        SyncGuard(flag)
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Keeps a ruler, the slice parameters and the reslice transform consistent.
///
/// Methods take `&self` so a host may call back into the controller from
/// inside a write; such calls are suppressed.
#[derive(Debug)]
pub struct SliceGeometryController {
    config: SliceConfig,
    synchronizing: Cell<bool>,
    passes: Cell<u64>,
    state: RefCell<SessionState>,
}

impl SliceGeometryController {
    pub fn new(config: SliceConfig) -> Result<Self> {
        config.validate().map_err(SliceError::ConfigError)?;
        Ok(Self {
            config,
            synchronizing: Cell::new(false),
            passes: Cell::new(0),
            state: RefCell::new(SessionState::idle()),
        })
    }

    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    pub fn phase(&self) -> SlicePhase {
        self.state.borrow().phase
    }

    /// Snapshot of the current parameters.
    pub fn parameters(&self) -> SliceParameters {
        self.state.borrow().params.clone()
    }

    /// Half-length of the ruler in pixels.
    pub fn half_length(&self) -> f64 {
        self.state.borrow().half_length
    }

    /// Number of synchronization passes that requested a reslice.
    pub fn sync_passes(&self) -> u64 {
        self.passes.get()
    }

    pub fn is_synchronizing(&self) -> bool {
        self.synchronizing.get()
    }

    /// Process one notification to completion.
    pub fn handle(&self, host: &mut dyn SliceHost, event: SliceEvent) -> Result<SyncOutcome> {
        if self.synchronizing.get() {
            debug!(event = event.name(), "Suppressed notification raised during synchronization");
            return Ok(SyncOutcome::Suppressed);
        }
        let _guard = SyncGuard::enter(&self.synchronizing);

        let mut next = self.state.borrow().clone();
        let name = event.name();
        let result = match event {
            SliceEvent::InputVolumeChanged(id) => self.on_input_volume(host, &mut next, id),
            SliceEvent::MomentMapSelected(id) => self.on_moment_map(host, &mut next, id),
            SliceEvent::RulerSelected(id) => self.on_ruler_selected(host, &mut next, id),
            SliceEvent::RulerEndpointsChanged => self.on_ruler_moved(host, &mut next),
            SliceEvent::AngleOrShiftChanged(pose) => self.on_pose_edited(host, &mut next, pose),
        };

        match result {
            Ok(outcome) => {
                if outcome == SyncOutcome::Synchronized {
                    self.passes.set(self.passes.get() + 1);
                }
                if outcome != SyncOutcome::NoOp {
                    *self.state.borrow_mut() = next;
                }
                Ok(outcome)
            }
            Err(e) if e.is_session_fatal() => {
                error!(event = name, error = %e, "Slice session abandoned");
                *self.state.borrow_mut() = SessionState::idle();
                Err(e)
            }
            Err(e) => {
                warn!(event = name, error = %e, "Slice update skipped, keeping last geometry");
                Err(e)
            }
        }
    }

    fn on_input_volume(
        &self,
        host: &mut dyn SliceHost,
        state: &mut SessionState,
        id: VolumeId,
    ) -> Result<SyncOutcome> {
        let volume = host
            .volume(&id)
            .ok_or_else(|| SliceError::MissingCollaborator(format!("volume {}", id)))?;
        let scalar_type = volume.scalar_type();
        if !scalar_type.is_supported() {
            return Err(SliceError::UnsupportedDataType(scalar_type));
        }
        let transform = WcsTransform::from_header(volume.header())?;
        if let WcsStatus::Invalid(reason) = transform.status() {
            return Err(SliceError::Wcs(WcsError::NotValid(format!(
                "volume {}: {}",
                id, reason
            ))));
        }
        let dims = volume.dims();

        state.params.input_volume = Some(id.clone());
        state.params.moment_map = None;
        state.params.ruler = None;
        state.params.reset_pose();
        state.wcs = Some(transform);
        state.plane_dims = [dims[0], dims[1], 1];
        state.params.pivot = plane_centre(state.plane_dims);
        state.half_length = 0.0;
        state.phase = SlicePhase::AwaitingRuler;

        info!(volume = %id, pivot = ?state.params.pivot, "Input volume changed, awaiting ruler");
        host.publish_parameters(&state.params);
        Ok(SyncOutcome::Updated)
    }

    fn on_moment_map(
        &self,
        host: &mut dyn SliceHost,
        state: &mut SessionState,
        id: VolumeId,
    ) -> Result<SyncOutcome> {
        state.input_volume()?;
        let volume = host
            .volume(&id)
            .ok_or_else(|| SliceError::MissingCollaborator(format!("moment map {}", id)))?;

        state.plane_dims = volume.dims();
        state.params.pivot = volume.center();
        state.params.moment_map = Some(id.clone());
        debug!(moment_map = %id, pivot = ?state.params.pivot, "Pivot moved to moment map centre");

        if state.phase == SlicePhase::Synchronized {
            self.place_ruler(host, state)?;
            return Ok(SyncOutcome::Synchronized);
        }
        host.publish_parameters(&state.params);
        Ok(SyncOutcome::Updated)
    }

    fn on_ruler_selected(
        &self,
        host: &mut dyn SliceHost,
        state: &mut SessionState,
        id: RulerId,
    ) -> Result<SyncOutcome> {
        state.input_volume()?;
        let world = host
            .ruler_endpoints(&id)
            .ok_or_else(|| SliceError::MissingCollaborator(format!("ruler {}", id)))?;
        state.params.ruler = Some(id.clone());

        let pixels = state.to_pixels(&world)?;
        let usable = (pixels[1].xy() - pixels[0].xy()).norm() >= self.config.min_ruler_length;
        if usable {
            debug!(ruler = %id, "Adopting existing ruler geometry");
            self.adopt_ruler(host, state, pixels, true)?;
        } else {
            state.half_length =
                self.config.default_half_length_fraction * state.plane_dims[0] as f64;
            debug!(ruler = %id, half_length = state.half_length, "Placing new ruler");
            self.place_ruler(host, state)?;
        }
        state.phase = SlicePhase::Synchronized;
        Ok(SyncOutcome::Synchronized)
    }

    fn on_ruler_moved(
        &self,
        host: &mut dyn SliceHost,
        state: &mut SessionState,
    ) -> Result<SyncOutcome> {
        if state.phase != SlicePhase::Synchronized {
            return Err(SliceError::MissingCollaborator("ruler".to_string()));
        }
        let id = state.ruler()?.clone();
        let world = host
            .ruler_endpoints(&id)
            .ok_or_else(|| SliceError::MissingCollaborator(format!("ruler {}", id)))?;
        let pixels = state.to_pixels(&world)?;
        self.adopt_ruler(host, state, pixels, false)
    }

    fn on_pose_edited(
        &self,
        host: &mut dyn SliceHost,
        state: &mut SessionState,
        pose: RulerPose,
    ) -> Result<SyncOutcome> {
        state.params.observe(pose);
        let delta = state.params.delta();
        if delta.is_zero(self.config.delta_epsilon) {
            debug!("Parameters unchanged, nothing to do");
            return Ok(SyncOutcome::NoOp);
        }
        if state.phase != SlicePhase::Synchronized {
            return Err(SliceError::MissingCollaborator("ruler".to_string()));
        }

        debug!(
            angle = pose.angle,
            shift_x = pose.shift_x,
            shift_y = pose.shift_y,
            d_angle = delta.angle,
            "Parameters edited, moving ruler"
        );
        self.place_ruler(host, state)?;
        Ok(SyncOutcome::Synchronized)
    }

    /// Ruler → parameters. Endpoints are in pixels.
    fn adopt_ruler(
        &self,
        host: &mut dyn SliceHost,
        state: &mut SessionState,
        mut pixels: [Vector3<f64>; 2],
        force: bool,
    ) -> Result<SyncOutcome> {
        let pivot = state.pivot();
        let mut snapped = false;
        for p in pixels.iter_mut() {
            if (p.z - pivot.z).abs() > self.config.plane_snap_tolerance {
                p.z = pivot.z;
                snapped = true;
            }
        }

        let (pose, half_length) =
            geometry::pose_from_ruler(pivot, &pixels, self.config.min_ruler_length)?;

        let eps = self.config.delta_epsilon;
        let current = state.params.pose;
        let unchanged = geometry::angle_difference(pose.angle, current.angle).abs() <= eps
            && (pose.shift_x - current.shift_x).abs() <= eps
            && (pose.shift_y - current.shift_y).abs() <= eps
            && (half_length - state.half_length).abs() <= eps;
        if unchanged && !snapped && !force {
            debug!("Ruler matches parameters, nothing to do");
            return Ok(SyncOutcome::NoOp);
        }

        let ruler = state.ruler()?.clone();
        let input = state.input_volume()?.clone();
        let transform = geometry::reslice_matrix(pivot, &pose);

        if snapped {
            let world = state.to_world(&pixels)?;
            debug!(ruler = %ruler, "Snapping ruler back onto the moment-map plane");
            host.write_ruler_endpoints(&ruler, world)?;
        }

        state.params.observe(pose);
        state.params.commit();
        state.half_length = half_length;

        info!(
            angle = pose.angle,
            shift_x = pose.shift_x,
            shift_y = pose.shift_y,
            "Ruler moved, parameters updated"
        );
        host.publish_parameters(&state.params);
        host.request_reslice(&input, &transform);
        Ok(SyncOutcome::Synchronized)
    }

    /// Parameters → ruler.
    fn place_ruler(&self, host: &mut dyn SliceHost, state: &mut SessionState) -> Result<()> {
        let ruler = state.ruler()?.clone();
        let input = state.input_volume()?.clone();
        let pivot = state.pivot();
        let pose = state.params.pose;

        if !(state.half_length * 2.0 >= self.config.min_ruler_length) {
            return Err(SliceError::DegenerateGeometry(format!(
                "ruler half-length {} is too short",
                state.half_length
            )));
        }

        let pixels = geometry::ruler_from_pose(pivot, &pose, state.half_length);
        let world = state.to_world(&pixels)?;
        let transform = geometry::reslice_matrix(pivot, &pose);

        host.write_ruler_endpoints(&ruler, world)?;
        state.params.commit();

        info!(
            angle = pose.angle,
            shift_x = pose.shift_x,
            shift_y = pose.shift_y,
            "Parameters applied to ruler"
        );
        host.publish_parameters(&state.params);
        host.request_reslice(&input, &transform);
        Ok(())
    }
}

/// Integer centre of a plane with the given dimensions.
fn plane_centre(dims: [usize; 3]) -> [i64; 3] {
    [(dims[0] / 2) as i64, (dims[1] / 2) as i64, 0]
}
