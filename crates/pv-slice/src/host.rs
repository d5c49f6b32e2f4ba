//! Collaborators the controller reads from and writes to.

use astro_common::{RulerId, Volume, VolumeId};
use nalgebra::Matrix4;

use crate::error::Result;
use crate::params::SliceParameters;

/// The scene hosting volumes, rulers and the reslice operation.
///
/// Implementations may notify the controller synchronously from inside
/// [`SliceHost::write_ruler_endpoints`] or [`SliceHost::publish_parameters`];
/// such notifications are suppressed while a synchronization pass runs.
pub trait SliceHost {
    /// Resolve a volume by id.
    fn volume(&self, id: &VolumeId) -> Option<&Volume>;

    /// World-space endpoints of a ruler, or `None` if it does not exist.
    fn ruler_endpoints(&self, id: &RulerId) -> Option<[[f64; 3]; 2]>;

    /// Move a ruler to new world-space endpoints.
    fn write_ruler_endpoints(&mut self, id: &RulerId, endpoints: [[f64; 3]; 2]) -> Result<()>;

    /// Reslice `volume` with a pixel-space 4×4 transform.
    fn request_reslice(&mut self, volume: &VolumeId, transform: &Matrix4<f64>);

    /// Display updated slice parameters.
    fn publish_parameters(&mut self, params: &SliceParameters);
}
