//! Ray bundle generation and derived ray sets

pub mod bundle;
pub mod engine;
pub mod pyramid;
pub mod ndc;
pub mod paths;

pub use bundle::{RayBundle, RayGrid};
pub use engine::{camera_rays, rig_rays};
pub use pyramid::{ImagePyramid, PyramidLevel};
