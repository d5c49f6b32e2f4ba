//! Pixel-space geometry of the slicing ruler.
//!
//! All functions work in 0-based pixel coordinates of the input cube. The
//! ruler lies in the moment-map plane `z = pivot.z`; angles are degrees
//! measured counter-clockwise from the first pixel axis.

use nalgebra::{Matrix4, Rotation3, Vector2, Vector3};

use crate::error::{Result, SliceError};
use crate::params::RulerPose;

/// Unit vector along the ruler for `angle` degrees.
pub fn direction(angle: f64) -> Vector2<f64> {
    let rad = angle.to_radians();
    Vector2::new(rad.cos(), rad.sin())
}

/// Unit vector perpendicular to [`direction`], rotated +90°.
pub fn perpendicular(angle: f64) -> Vector2<f64> {
    let d = direction(angle);
    Vector2::new(-d.y, d.x)
}

/// Smallest signed difference `a - b` in degrees, within (-180, 180].
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Ruler endpoints for a pose around `pivot`.
pub fn ruler_from_pose(pivot: Vector3<f64>, pose: &RulerPose, half_length: f64) -> [Vector3<f64>; 2] {
    let u = direction(pose.angle);
    let v = perpendicular(pose.angle);
    let centre = pivot.xy() + u * pose.shift_x + v * pose.shift_y;
    let start = centre - u * half_length;
    let end = centre + u * half_length;
    [
        Vector3::new(start.x, start.y, pivot.z),
        Vector3::new(end.x, end.y, pivot.z),
    ]
}

/// Pose and half-length described by two ruler endpoints.
///
/// Only the in-plane components are used.
pub fn pose_from_ruler(
    pivot: Vector3<f64>,
    endpoints: &[Vector3<f64>; 2],
    min_length: f64,
) -> Result<(RulerPose, f64)> {
    let start = endpoints[0].xy();
    let end = endpoints[1].xy();
    let along = end - start;
    let length = along.norm();
    if !(length >= min_length) {
        return Err(SliceError::DegenerateGeometry(format!(
            "ruler length {} is below {}",
            length, min_length
        )));
    }

    let angle = along.y.atan2(along.x).to_degrees();
    let offset = (start + end) * 0.5 - pivot.xy();
    let pose = RulerPose {
        angle,
        shift_x: offset.dot(&direction(angle)),
        shift_y: offset.dot(&perpendicular(angle)),
    };
    Ok((pose, 0.5 * length))
}

/// `T(pivot) · Rz(angle) · T(shift_x, shift_y, 0)`
pub fn reslice_matrix(pivot: Vector3<f64>, pose: &RulerPose) -> Matrix4<f64> {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), pose.angle.to_radians());
    Matrix4::new_translation(&pivot)
        * rotation.to_homogeneous()
        * Matrix4::new_translation(&Vector3::new(pose.shift_x, pose.shift_y, 0.0))
}
