//! Command-line front end for the astro-volume crates.
//!
//! Loads cubes from a header file plus a raw data file and exposes the WCS
//! transform, volume statistics and PV slice geometry as subcommands.

pub mod commands;
pub mod input;
pub mod scene;

pub use input::{load_header, load_volume, ByteOrder};
pub use scene::SceneHost;
