//! Command implementations. Each returns the text printed on stdout.

use anyhow::{bail, Context, Result};
use astro_common::{HeaderMap, RulerId, Volume, VolumeId};
use nalgebra::Matrix4;
use pv_slice::{
    RulerPose, SliceConfig, SliceEvent, SliceGeometryController, SliceParameters, SlicePhase,
};
use serde::Serialize;
use tracing::{info, warn};
use volume_stats::{compute_volume_stats, StatsConfig, VolumeStats};
use wcs::{
    first_tick, AxisRole, DisplayConfig, SpectralConvention, WcsStatus, WcsTransform, NO_PREVIOUS,
};

use crate::scene::SceneHost;

const ROLES: [AxisRole; 3] = [AxisRole::X, AxisRole::Y, AxisRole::Z];

/// Build a transform and refuse to continue when it is not usable.
fn valid_transform(header: &HeaderMap) -> Result<WcsTransform> {
    let transform = WcsTransform::from_header(header).context("building WCS")?;
    if let WcsStatus::Invalid(reason) = transform.status() {
        bail!("WCS is not valid: {}", reason);
    }
    Ok(transform)
}

// ============================================================================
// wcs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToWorld,
    ToPixel,
}

#[derive(Debug, Clone)]
pub struct WcsRequest {
    pub coords: [f64; 3],
    pub direction: Direction,
    pub convention: Option<SpectralConvention>,
    pub precision: usize,
    /// Overrides the preferences derived from the axes.
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Serialize)]
pub struct WcsReport {
    pub pixel: [f64; 3],
    pub world: [f64; 3],
    pub formatted: Vec<String>,
    pub spectral_type: Option<String>,
}

pub fn run_wcs(header: &HeaderMap, request: &WcsRequest) -> Result<String> {
    let mut transform = valid_transform(header)?;
    if let Some(convention) = request.convention {
        if !transform.set_spectral_convention(convention) {
            bail!("cannot express the spectral axis as {:?}", convention);
        }
    }

    let (pixel, world) = match request.direction {
        Direction::ToWorld => (request.coords, transform.pixel_to_world(request.coords)?),
        Direction::ToPixel => (transform.world_to_pixel(request.coords)?, request.coords),
    };

    let config = match &request.display {
        Some(display) => display.clone(),
        None => transform.display_config(),
    };
    let mut formatted = Vec::with_capacity(3);
    for (value, role) in world.iter().zip(ROLES) {
        let text = transform
            .format_world_value(*value, role, request.precision, NO_PREVIOUS, &config)?
            .text;
        formatted.push(text);
    }

    let report = WcsReport {
        pixel,
        world,
        formatted,
        spectral_type: transform.spectral_type().map(str::to_string),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

// ============================================================================
// describe
// ============================================================================

pub fn run_describe(header: &HeaderMap) -> Result<String> {
    let transform = WcsTransform::from_header(header).context("building WCS")?;
    let status = match transform.status() {
        WcsStatus::Valid => "valid".to_string(),
        WcsStatus::Invalid(reason) => format!("invalid ({})", reason),
    };
    Ok(format!("{}\nstatus: {}", transform.describe(), status))
}

// ============================================================================
// ticks
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TickReport {
    pub step: f64,
    pub point_count: usize,
    pub first: f64,
}

pub fn run_ticks(
    header: &HeaderMap,
    role: AxisRole,
    world_a: f64,
    world_b: f64,
    count: usize,
) -> Result<String> {
    let transform = valid_transform(header)?;
    let config = transform.display_config();
    let step = transform.tick_step(role, world_b - world_a, count, &config)?;
    let report = TickReport {
        step: step.step,
        point_count: step.point_count,
        first: first_tick(world_a, world_b, step.step),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

// ============================================================================
// stats
// ============================================================================

/// Compute statistics and store them on the volume.
pub fn run_stats(volume: &mut Volume, config: &StatsConfig) -> Result<String> {
    let stats: VolumeStats = compute_volume_stats(volume, config)
        .with_context(|| format!("computing statistics of {}", volume.name))?;
    stats.write_attributes(volume);
    Ok(serde_json::to_string_pretty(&stats)?)
}

// ============================================================================
// slice
// ============================================================================

/// Edits applied after the session is synchronized. Unset fields keep the
/// value derived from the ruler.
#[derive(Debug, Clone, Default)]
pub struct SliceRequest {
    pub ruler: Option<[[f64; 3]; 2]>,
    pub angle: Option<f64>,
    pub shift_x: Option<f64>,
    pub shift_y: Option<f64>,
}

impl SliceRequest {
    fn edited_pose(&self, current: RulerPose) -> Option<RulerPose> {
        if self.angle.is_none() && self.shift_x.is_none() && self.shift_y.is_none() {
            return None;
        }
        Some(RulerPose {
            angle: self.angle.unwrap_or(current.angle),
            shift_x: self.shift_x.unwrap_or(current.shift_x),
            shift_y: self.shift_y.unwrap_or(current.shift_y),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SliceReport {
    pub phase: SlicePhase,
    pub sync_passes: u64,
    pub parameters: SliceParameters,
    pub ruler: Option<[[f64; 3]; 2]>,
    pub reslice: Option<[[f64; 4]; 4]>,
}

fn matrix_rows(m: &Matrix4<f64>) -> [[f64; 4]; 4] {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
}

/// World position of the centre of the first plane, used for a ruler that
/// the controller should place itself.
fn unplaced_ruler(volume: &Volume) -> Result<[[f64; 3]; 2]> {
    let transform = valid_transform(volume.header())?;
    let dims = volume.dims();
    let centre = transform.pixel_to_world([dims[0] as f64 / 2.0, dims[1] as f64 / 2.0, 0.0])?;
    Ok([centre, centre])
}

pub fn run_slice(
    volume: Volume,
    moment_map: Option<Volume>,
    request: &SliceRequest,
    config: SliceConfig,
) -> Result<String> {
    let controller = SliceGeometryController::new(config)?;
    let mut scene = SceneHost::new();

    let endpoints = match request.ruler {
        Some(endpoints) => endpoints,
        None => unplaced_ruler(&volume)?,
    };
    let input = scene.add_volume(volume);
    let ruler = RulerId::new("ruler");
    scene.add_ruler(ruler.clone(), endpoints);

    controller.handle(&mut scene, SliceEvent::InputVolumeChanged(input))?;
    if let Some(mut map) = moment_map {
        map.id = VolumeId::new("moment-map");
        let id = scene.add_volume(map);
        controller.handle(&mut scene, SliceEvent::MomentMapSelected(id))?;
    }
    controller.handle(&mut scene, SliceEvent::RulerSelected(ruler.clone()))?;

    if let Some(pose) = request.edited_pose(controller.parameters().pose) {
        let outcome = controller.handle(&mut scene, SliceEvent::AngleOrShiftChanged(pose))?;
        info!(?outcome, angle = pose.angle, "Applied pose edit");
    }

    if controller.phase() != SlicePhase::Synchronized {
        warn!(phase = ?controller.phase(), "Slice session did not synchronize");
    }

    let report = SliceReport {
        phase: controller.phase(),
        sync_passes: controller.sync_passes(),
        parameters: controller.parameters(),
        ruler: scene.ruler(&ruler),
        reslice: scene.last_reslice.as_ref().map(|(_, m)| matrix_rows(m)),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
