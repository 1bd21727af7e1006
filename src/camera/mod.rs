//! Camera records and calibration metadata

pub mod rig;
pub mod meta;

pub use rig::{Camera, CameraSet};
pub use meta::{RigMetadata, SceneTransforms};
