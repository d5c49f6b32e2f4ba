//! In-memory scene backing the `slice` command.

use std::collections::HashMap;

use astro_common::{RulerId, Volume, VolumeId};
use nalgebra::Matrix4;
use pv_slice::{Result, SliceError, SliceHost, SliceParameters};
use tracing::debug;

/// Holds volumes and rulers and keeps the last reslice and published
/// parameters for reporting.
#[derive(Debug, Default)]
pub struct SceneHost {
    volumes: HashMap<VolumeId, Volume>,
    rulers: HashMap<RulerId, [[f64; 3]; 2]>,
    pub last_reslice: Option<(VolumeId, Matrix4<f64>)>,
    pub last_parameters: Option<SliceParameters>,
}

impl SceneHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_volume(&mut self, volume: Volume) -> VolumeId {
        let id = volume.id.clone();
        self.volumes.insert(id.clone(), volume);
        id
    }

    pub fn add_ruler(&mut self, id: RulerId, endpoints: [[f64; 3]; 2]) {
        self.rulers.insert(id, endpoints);
    }

    pub fn ruler(&self, id: &RulerId) -> Option<[[f64; 3]; 2]> {
        self.rulers.get(id).copied()
    }
}

impl SliceHost for SceneHost {
    fn volume(&self, id: &VolumeId) -> Option<&Volume> {
        self.volumes.get(id)
    }

    fn ruler_endpoints(&self, id: &RulerId) -> Option<[[f64; 3]; 2]> {
        self.ruler(id)
    }

    fn write_ruler_endpoints(&mut self, id: &RulerId, endpoints: [[f64; 3]; 2]) -> Result<()> {
        match self.rulers.get_mut(id) {
            Some(slot) => {
                *slot = endpoints;
                debug!(ruler = %id, ?endpoints, "Ruler moved");
                Ok(())
            }
            None => Err(SliceError::MissingCollaborator(format!("ruler {}", id))),
        }
    }

    fn request_reslice(&mut self, volume: &VolumeId, transform: &Matrix4<f64>) {
        self.last_reslice = Some((volume.clone(), *transform));
    }

    fn publish_parameters(&mut self, params: &SliceParameters) {
        self.last_parameters = Some(params.clone());
    }
}
