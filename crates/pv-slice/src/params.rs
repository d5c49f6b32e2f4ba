//! Slice-definition parameters.

use astro_common::{RulerId, VolumeId};
use serde::{Deserialize, Serialize};

/// Angle and shifts of the slice relative to the pivot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RulerPose {
    /// Degrees, counter-clockwise from the first pixel axis.
    pub angle: f64,
    /// Pixels along the ruler direction.
    pub shift_x: f64,
    /// Pixels perpendicular to the ruler direction.
    pub shift_y: f64,
}

/// Changes since the last synchronized pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseDelta {
    pub angle: f64,
    pub shift_x: f64,
    pub shift_y: f64,
}

impl PoseDelta {
    pub fn is_zero(&self, epsilon: f64) -> bool {
        self.angle.abs() <= epsilon && self.shift_x.abs() <= epsilon && self.shift_y.abs() <= epsilon
    }
}

/// One slice-definition session.
///
/// Referenced entities are held by id only and may disappear at any time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceParameters {
    pub input_volume: Option<VolumeId>,
    pub moment_map: Option<VolumeId>,
    pub ruler: Option<RulerId>,
    pub pose: RulerPose,
    /// Pose immediately before the last externally observed change.
    pub previous: RulerPose,
    /// Rotation and shift origin in pixel coordinates.
    pub pivot: [i64; 3],
}

impl SliceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self) -> f64 {
        self.pose.angle
    }

    pub fn shift_x(&self) -> f64 {
        self.pose.shift_x
    }

    pub fn shift_y(&self) -> f64 {
        self.pose.shift_y
    }

    /// Record an externally observed pose, keeping the old one as previous.
    pub fn observe(&mut self, pose: RulerPose) {
        self.previous = self.pose;
        self.pose = pose;
    }

    pub fn delta(&self) -> PoseDelta {
        PoseDelta {
            angle: self.pose.angle - self.previous.angle,
            shift_x: self.pose.shift_x - self.previous.shift_x,
            shift_y: self.pose.shift_y - self.previous.shift_y,
        }
    }

    /// Mark the current pose as synchronized.
    pub fn commit(&mut self) {
        self.previous = self.pose;
    }

    /// Reset angle and shifts for a new input.
    pub fn reset_pose(&mut self) {
        self.pose = RulerPose::default();
        self.previous = RulerPose::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_then_commit() {
        let mut params = SliceParameters::new();
        params.observe(RulerPose {
            angle: 30.0,
            shift_x: 1.0,
            shift_y: 0.0,
        });
        assert_eq!(params.delta().angle, 30.0);
        assert!(!params.delta().is_zero(1e-9));

        params.commit();
        assert!(params.delta().is_zero(1e-9));
        assert_eq!(params.previous.angle, 30.0);
    }
}
