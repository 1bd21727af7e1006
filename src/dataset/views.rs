//! Raw per-view data produced by the variant loaders

use crate::camera::rig::CameraSet;
use crate::io::frames::{ColorImage, ScalarImage};

/// Output of the load phase: decoded images plus their cameras, before
/// any rays are derived. Side channels are present only when the
/// configuration asked for them.
#[derive(Clone, Debug)]
pub struct LoadedViews {
    pub cameras: CameraSet,
    pub images: Vec<ColorImage>,
    pub disps: Option<Vec<ScalarImage>>,
    pub normals: Option<Vec<ColorImage>>,
    pub masks: Option<Vec<ScalarImage>>,
}

impl LoadedViews {
    pub fn n_views(&self) -> usize {
        self.images.len()
    }
}
