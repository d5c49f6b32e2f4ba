//! Position-velocity slice geometry.
//!
//! A PV slice is a 2D cut through a spectral-line cube along a line drawn
//! on the moment map. The line exists in two forms that must stay in
//! agreement: a ruler annotation with world-space endpoints, and the
//! `angle`/`shift_x`/`shift_y` parameters around a pivot. Either can be
//! edited; [`SliceGeometryController`] updates the other and asks the host
//! to reslice the cube.

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod host;
pub mod params;

pub use config::SliceConfig;
pub use controller::{SliceEvent, SliceGeometryController, SlicePhase, SyncOutcome};
pub use error::{Result, SliceError};
pub use host::SliceHost;
pub use params::{PoseDelta, RulerPose, SliceParameters};
