//! Immutable derived state consumed by the batch sampler
//!
//! Built once during initialization through explicit phases (load images,
//! derive rays, build pyramid) and frozen afterwards. The prefetch worker
//! only ever reads a snapshot; batches copy out of it.

use crate::core::types::Vec3;
use crate::io::frames::ColorImage;
use crate::rays::bundle::{RayBundle, RayGrid};
use crate::rays::pyramid::{ImagePyramid, PyramidLevel};

/// One pyramid level flattened into per-image pixel pools with prefix
/// sums for global indexing. Images keep their own pools so ragged rigs
/// never stack.
#[derive(Clone, Debug)]
pub struct LevelPool {
    /// Flattened RGB rows, one pool per image
    pub rgb: Vec<Vec<Vec3>>,
    /// Flattened rays, one bundle per image
    pub rays: Vec<RayBundle>,
    /// Prefix sums over per-image pixel counts; last entry is the total
    pub offsets: Vec<usize>,
}

impl LevelPool {
    pub fn from_level(level: &PyramidLevel) -> Self {
        let rgb: Vec<Vec<Vec3>> = level.images.iter().map(|img| img.pixels.clone()).collect();
        let rays: Vec<RayBundle> = level.rays.iter().map(|g| g.rays.clone()).collect();
        let mut offsets = Vec::with_capacity(rgb.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for pool in &rgb {
            total += pool.len();
            offsets.push(total);
        }
        Self { rgb, rays, offsets }
    }

    /// Total pixel count across every image of this level.
    pub fn total(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    pub fn n_images(&self) -> usize {
        self.rgb.len()
    }

    /// Map a global pixel index to (image, pixel-within-image).
    pub fn locate(&self, global: usize) -> (usize, usize) {
        debug_assert!(global < self.total());
        let image = self.offsets.partition_point(|&o| o <= global) - 1;
        (image, global - self.offsets[image])
    }
}

/// Low-resolution image and ray set for the full-image feature loss.
#[derive(Clone, Debug)]
pub struct FeatureSet {
    /// One square ray grid per random pose
    pub rays: Vec<RayGrid>,
    /// One square resized image per training example
    pub images: Vec<ColorImage>,
}

/// Everything the training batch sampler reads.
#[derive(Clone, Debug)]
pub struct TrainSnapshot {
    /// Reconstruction-loss levels, coarse pools per pyramid level
    pub levels: Vec<LevelPool>,
    /// Level-0 disparity pools, one per image
    pub disps: Option<Vec<Vec<f32>>>,
    /// Level-0 normal pools, one per image
    pub normals: Option<Vec<Vec<Vec3>>>,
    /// Random-pose ray grids per power-of-two scale, for patch sampling
    pub random_rays: Option<Vec<Vec<RayGrid>>>,
    /// Feature-loss image/ray set
    pub feature: Option<FeatureSet>,
    /// Number of training examples at level 0
    pub n_examples: usize,
}

impl TrainSnapshot {
    pub fn from_pyramid(pyramid: &ImagePyramid) -> Self {
        let levels: Vec<LevelPool> = pyramid.levels.iter().map(LevelPool::from_level).collect();
        let n_examples = levels.first().map_or(0, LevelPool::n_images);
        Self {
            levels,
            disps: None,
            normals: None,
            random_rays: None,
            feature: None,
            n_examples,
        }
    }
}

/// One held-out example for evaluation.
#[derive(Clone, Debug)]
pub struct TestExample {
    pub rgb: Vec<Vec3>,
    pub rays: RayGrid,
    pub disps: Option<Vec<f32>>,
    pub normals: Option<Vec<Vec3>>,
    pub mask: Option<Vec<f32>>,
}

/// Everything the evaluation sampler reads.
#[derive(Clone, Debug)]
pub struct TestSnapshot {
    pub examples: Vec<TestExample>,
    /// Camera-path ray grids; present when rendering a path without
    /// ground truth
    pub render_rays: Option<Vec<RayGrid>>,
}

/// Derived dataset state, frozen after initialization.
#[derive(Clone, Debug)]
pub enum Snapshot {
    Train(TrainSnapshot),
    Test(TestSnapshot),
}
