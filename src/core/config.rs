//! Typed dataset configuration with defaults and construction-time validation

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::error::Error;
use crate::core::types::Result;

/// Which dataset variant backs the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetVariant {
    /// Single scene described by a transforms JSON file, one shared camera
    SingleScene,
    /// Multi-camera rig described by a per-split metadata record
    MultiCamera,
    /// Time-varying multi-camera rig backed by per-frame decode
    VideoRig,
}

/// Pixel selection strategy for batch and patch sampling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Batching {
    /// Any image may contribute pixels to a batch
    #[default]
    AllImages,
    /// One image serves the whole batch
    SingleImage,
}

/// Distribution used to pick a reconstruction-loss scale per step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDist {
    /// Uniform over scale indices
    #[default]
    UniformScale,
    /// Probability proportional to each scale's pixel count
    UniformSize,
}

/// How poses for the unobserved-view ray set are generated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomPoseType {
    /// Reuse every training pose
    #[default]
    AllPoses,
    /// Sample origins on a sphere and look at the scene center
    RenderPath,
}

/// Full pipeline configuration.
///
/// Batch sizes are global; they are divided evenly across `num_workers`
/// when batches are sharded by the consumer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset variant selector
    pub variant: DatasetVariant,
    /// Root directory holding images and metadata
    pub data_dir: PathBuf,
    /// Directory holding per-camera video frames (video variant only)
    pub video_dir: PathBuf,

    /// Pixel selection strategy for reconstruction batches
    pub batching: Batching,
    /// Pixel selection strategy for random patch batches
    pub batching_random: Batching,
    /// Rays per training batch (global, across all workers)
    pub batch_size: usize,
    /// Rays per random patch batch (global, across all workers)
    pub batch_size_random: usize,
    /// Side length of square patches drawn by the patch sampler
    pub patch_size: usize,
    /// Number of participating workers the batch is sharded across
    pub num_workers: usize,

    /// Number of pyramid levels for the reconstruction loss
    pub recon_loss_scales: usize,
    /// Scale selection distribution for the reconstruction loss
    pub recon_scale_dist: ScaleDist,

    /// Whether to maintain the random-pose patch ray set
    pub load_random_rays: bool,
    /// Exclusive upper power-of-two scale bound of the random ray set
    pub random_scales: usize,
    /// Inclusive lower power-of-two scale bound of the random ray set
    pub random_scales_init: usize,
    /// Pose generation scheme for the random ray set
    pub random_pose_type: RandomPoseType,
    /// Number of random poses to generate
    pub n_random_poses: usize,

    /// Whether near/far bounds are annealed over training
    pub anneal_nearfar: bool,
    /// Step horizon over which annealing runs
    pub anneal_nearfar_steps: usize,
    /// Initial offset as a fraction of the distance from mid to each bound
    pub anneal_nearfar_perc: f32,
    /// Position of the annealing midpoint between near and far
    pub anneal_mid_perc: f32,

    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,

    /// Composite RGBA images over a white background
    pub white_background: bool,
    /// Produce camera-path ray bundles instead of ground-truth examples
    pub render_path: bool,
    /// Truncate training views for the single-scene variant (0 = all)
    pub n_input_views: usize,

    /// Weight of the full-image feature loss; nonzero enables the
    /// low-resolution feature ray/image set
    pub dietnerf_loss_mult: f32,
    /// Square resolution of the feature-loss image set
    pub dietnerf_loss_resolution: usize,

    /// Load per-view disparity maps alongside RGB
    pub compute_disp_metrics: bool,
    /// Load per-view normal maps alongside RGB
    pub compute_normal_metrics: bool,
    /// Load per-view foreground masks for test examples
    pub load_masks: bool,

    /// First frame (inclusive) decoded for the video variant
    pub start_frame: usize,
    /// Last frame (exclusive) decoded for the video variant
    pub end_frame: usize,
    /// Frame rendered at evaluation time for the video variant
    pub render_frame: usize,

    /// Seed for every sampler in the pipeline
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            variant: DatasetVariant::SingleScene,
            data_dir: PathBuf::new(),
            video_dir: PathBuf::new(),
            batching: Batching::AllImages,
            batching_random: Batching::AllImages,
            batch_size: 4096,
            batch_size_random: 4096,
            patch_size: 8,
            num_workers: 1,
            recon_loss_scales: 1,
            recon_scale_dist: ScaleDist::UniformScale,
            load_random_rays: false,
            random_scales: 1,
            random_scales_init: 0,
            random_pose_type: RandomPoseType::AllPoses,
            n_random_poses: 100,
            anneal_nearfar: false,
            anneal_nearfar_steps: 2000,
            anneal_nearfar_perc: 0.2,
            anneal_mid_perc: 0.5,
            near: 2.0,
            far: 6.0,
            white_background: false,
            render_path: false,
            n_input_views: 0,
            dietnerf_loss_mult: 0.0,
            dietnerf_loss_resolution: 64,
            compute_disp_metrics: false,
            compute_normal_metrics: false,
            load_masks: false,
            start_frame: 0,
            end_frame: 1,
            render_frame: 0,
            seed: 20220721,
        }
    }
}

impl DatasetConfig {
    /// Check option ranges and cross-field consistency.
    ///
    /// Called once at dataset construction; every violation is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        if self.num_workers == 0 {
            return Err(Error::Config("num_workers must be positive".into()));
        }
        if self.batch_size % self.num_workers != 0 {
            return Err(Error::Config(format!(
                "batch_size {} is not divisible by num_workers {}",
                self.batch_size, self.num_workers
            )));
        }
        if self.patch_size == 0 {
            return Err(Error::Config("patch_size must be positive".into()));
        }
        if self.load_random_rays {
            let patch_area = self.patch_size * self.patch_size;
            if self.batch_size_random % patch_area != 0 {
                return Err(Error::Config(format!(
                    "batch_size_random {} is not divisible by patch_size^2 {}",
                    self.batch_size_random, patch_area
                )));
            }
            if self.random_scales_init >= self.random_scales {
                return Err(Error::Config(format!(
                    "random_scales_init {} must be below random_scales {}",
                    self.random_scales_init, self.random_scales
                )));
            }
        }
        if (self.load_random_rays || self.dietnerf_loss_mult != 0.0) && self.n_random_poses == 0 {
            return Err(Error::Config(
                "random-pose ray sets need at least one random pose".into(),
            ));
        }
        if self.recon_loss_scales == 0 {
            return Err(Error::Config("recon_loss_scales must be at least 1".into()));
        }
        if self.near > self.far {
            return Err(Error::Config(format!(
                "near {} exceeds far {}",
                self.near, self.far
            )));
        }
        for (name, value) in [
            ("anneal_nearfar_perc", self.anneal_nearfar_perc),
            ("anneal_mid_perc", self.anneal_mid_perc),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} {value} is outside [0, 1]"
                )));
            }
        }
        if self.render_path && self.variant != DatasetVariant::SingleScene {
            return Err(Error::Config(
                "render_path is not supported for rig or video variants".into(),
            ));
        }
        if self.variant == DatasetVariant::VideoRig && self.start_frame >= self.end_frame {
            return Err(Error::Config(format!(
                "empty frame range {}..{}",
                self.start_frame, self.end_frame
            )));
        }
        Ok(())
    }

    /// Batch size seen by a single worker.
    pub fn batch_size_per_worker(&self) -> usize {
        self.batch_size / self.num_workers
    }
}
