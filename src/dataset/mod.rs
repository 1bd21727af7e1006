//! Dataset assembly and the consumer-facing facade
//!
//! Construction runs the blocking phases in order (load views, derive
//! rays, build pyramid, freeze snapshot) and only then starts the
//! prefetch worker. Every configuration and data-format problem surfaces
//! here, before the first batch is produced.

pub mod views;
pub mod snapshot;
pub mod scene;
pub mod rig;

use std::sync::Arc;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::camera::rig::Camera;
use crate::core::config::{DatasetConfig, DatasetVariant, RandomPoseType};
use crate::core::error::Error;
use crate::core::types::{Mat3, Mat4, Result, Vec3};
use crate::io::frames::{ColorImage, FrameSource, ImageSequenceSource};
use crate::prefetch::PrefetchPipeline;
use crate::rays::bundle::RayGrid;
use crate::rays::engine::{camera_rays, rig_rays};
use crate::rays::paths::{SPHERE_POSE_RADIUS, box_poses, hemisphere_orbit, sphere_poses};
use crate::rays::pyramid::ImagePyramid;
use crate::sampling::batch::{Batch, BatchSampler};
use crate::dataset::snapshot::{FeatureSet, Snapshot, TestExample, TestSnapshot, TrainSnapshot};
use crate::dataset::views::LoadedViews;

pub use snapshot::{LevelPool, Snapshot as DatasetSnapshot};

/// Which portion of the data the pipeline serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
    /// Camera-path rendering: rays only, no ground truth
    Path,
}

impl Split {
    /// Parse a split name; anything but `train`, `test`, or `path` is
    /// unsupported.
    pub fn parse(name: &str) -> Result<Split> {
        match name {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            "path" => Ok(Split::Path),
            other => Err(Error::Unsupported(format!(
                "split '{other}' (expected 'train', 'test', or 'path')"
            ))),
        }
    }

    /// Name used to look up metadata; path rendering reads the held-out
    /// cameras.
    fn metadata_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test | Split::Path => "test",
        }
    }

    pub fn is_train(&self) -> bool {
        matches!(self, Split::Train)
    }
}

/// The consumer-facing dataset: a frozen snapshot behind a prefetching
/// worker. Not restartable or reconfigurable after construction.
pub struct Dataset {
    split: Split,
    num_workers: usize,
    n_examples: usize,
    pipeline: PrefetchPipeline,
}

impl Dataset {
    /// Build a dataset, loading images with the bundled file decoders.
    pub fn new(split: Split, config: &DatasetConfig) -> Result<Self> {
        match config.variant {
            DatasetVariant::VideoRig => {
                let source = ImageSequenceSource::new(config.video_dir.clone());
                Self::with_frame_source(split, config, &source)
            }
            _ => Self::from_config(split, config, None),
        }
    }

    /// Build a video-rig dataset around a caller-supplied frame decoder.
    pub fn with_frame_source(
        split: Split,
        config: &DatasetConfig,
        source: &dyn FrameSource,
    ) -> Result<Self> {
        Self::from_config(split, config, Some(source))
    }

    fn from_config(
        split: Split,
        config: &DatasetConfig,
        source: Option<&dyn FrameSource>,
    ) -> Result<Self> {
        config.validate()?;
        let mut config = config.clone();
        if split == Split::Path {
            config.render_path = true;
        }
        config.validate()?;

        let views = match config.variant {
            DatasetVariant::SingleScene => scene::load_scene(split.metadata_name(), &config)?,
            DatasetVariant::MultiCamera => rig::load_rig(split.metadata_name(), &config)?,
            DatasetVariant::VideoRig => {
                let source = source.ok_or_else(|| {
                    Error::Config("video variant needs a frame source".into())
                })?;
                rig::load_video_rig(split.metadata_name(), &config, source)?
            }
        };

        let snapshot = if split.is_train() {
            Snapshot::Train(build_train_snapshot(views, &config)?)
        } else {
            Snapshot::Test(build_test_snapshot(views, &config)?)
        };
        let n_examples = match &snapshot {
            Snapshot::Train(s) => s.n_examples,
            Snapshot::Test(s) => {
                if config.render_path {
                    s.render_rays.as_ref().map_or(0, Vec::len)
                } else {
                    s.examples.len()
                }
            }
        };

        // Initialization is the barrier: the worker only starts once the
        // snapshot is frozen.
        let sampler = BatchSampler::new(Arc::new(snapshot), &config);
        let pipeline = PrefetchPipeline::start(sampler);
        info!("dataset ready: {n_examples} examples, split {split:?}");

        Ok(Self {
            split,
            num_workers: config.num_workers,
            n_examples,
            pipeline,
        })
    }

    /// Blocking dequeue of the next batch, sharded across workers for
    /// training. None means the producer has terminated.
    pub fn next(&self) -> Option<Vec<Batch>> {
        let batch = self.pipeline.next()?;
        Some(self.shard(batch))
    }

    /// Copy of the head batch without consuming it, sharded the same way
    /// as [`Dataset::next`].
    pub fn peek(&self) -> Option<Vec<Batch>> {
        let batch = self.pipeline.peek()?;
        Some(self.shard(batch))
    }

    fn shard(&self, batch: Batch) -> Vec<Batch> {
        if self.split.is_train() && self.num_workers > 1 {
            batch.shard(self.num_workers)
        } else {
            vec![batch]
        }
    }

    /// Number of examples in the active split.
    pub fn size(&self) -> usize {
        self.n_examples
    }
}

/// Phases: DeriveRays -> BuildPyramid -> (random rays, feature set) ->
/// frozen snapshot.
fn build_train_snapshot(views: LoadedViews, config: &DatasetConfig) -> Result<TrainSnapshot> {
    debug!("deriving rays for {} views", views.n_views());
    let full_rays = rig_rays(&views.cameras);

    debug!("building {} pyramid levels", config.recon_loss_scales);
    let pyramid = ImagePyramid::build(
        &views.images,
        &views.cameras,
        full_rays,
        config.recon_loss_scales,
        config.patch_size,
    );
    let mut snapshot = TrainSnapshot::from_pyramid(&pyramid);

    snapshot.disps = views
        .disps
        .map(|maps| maps.into_iter().map(|m| m.pixels).collect());
    snapshot.normals = views
        .normals
        .map(|maps| maps.into_iter().map(|m| m.pixels).collect());

    let mut rng = StdRng::seed_from_u64(config.seed);
    if config.load_random_rays {
        let poses = random_poses(&views.cameras, config, &mut rng);
        snapshot.random_rays = Some(random_ray_scales(&views.cameras[0], &poses, config)?);
    }
    if config.dietnerf_loss_mult != 0.0 {
        let poses = random_poses(&views.cameras, config, &mut rng);
        snapshot.feature = Some(build_feature_set(
            &views.cameras[0],
            &views.images,
            &poses,
            config,
        ));
    }
    Ok(snapshot)
}

fn build_test_snapshot(views: LoadedViews, config: &DatasetConfig) -> Result<TestSnapshot> {
    debug!("deriving rays for {} held-out views", views.n_views());
    let grids = rig_rays(&views.cameras);

    let render_rays = if config.render_path {
        let path = hemisphere_orbit(&views.cameras.poses(), 120);
        let reference = &views.cameras[0];
        Some(
            path.into_iter()
                .map(|pose| {
                    camera_rays(&Camera {
                        pix2cam: reference.pix2cam,
                        cam2world: pose,
                        width: reference.width,
                        height: reference.height,
                        lossmult: 1.0,
                        near: config.near,
                        far: config.far,
                    })
                })
                .collect(),
        )
    } else {
        None
    };

    let LoadedViews {
        images,
        disps,
        normals,
        masks,
        ..
    } = views;
    let n = images.len();
    let mut disps = disps.map(|v| v.into_iter());
    let mut normals = normals.map(|v| v.into_iter());
    let mut masks = masks.map(|v| v.into_iter());
    let examples = images
        .into_iter()
        .zip(grids)
        .map(|(image, rays)| TestExample {
            rgb: image.pixels,
            rays,
            disps: disps.as_mut().and_then(|it| it.next()).map(|m| m.pixels),
            normals: normals.as_mut().and_then(|it| it.next()).map(|m| m.pixels),
            mask: masks.as_mut().and_then(|it| it.next()).map(|m| m.pixels),
        })
        .collect();
    debug!("froze {n} evaluation examples");
    Ok(TestSnapshot {
        examples,
        render_rays,
    })
}

/// Poses for the unobserved-view ray sets. Rigs sample inside the box of
/// their camera positions; the single scene follows the configured
/// scheme.
fn random_poses(
    cameras: &crate::camera::rig::CameraSet,
    config: &DatasetConfig,
    rng: &mut StdRng,
) -> Vec<Mat4> {
    match config.variant {
        DatasetVariant::SingleScene => match config.random_pose_type {
            RandomPoseType::AllPoses => cameras.poses(),
            RandomPoseType::RenderPath => {
                sphere_poses(config.n_random_poses, SPHERE_POSE_RADIUS, true, rng)
            }
        },
        DatasetVariant::MultiCamera | DatasetVariant::VideoRig => box_poses(
            &cameras.poses(),
            &cameras.bounds(),
            config.n_random_poses,
            rng,
        ),
    }
}

/// One set of ray grids per power-of-two scale in
/// `random_scales_init..random_scales`, all derived from the reference
/// camera's intrinsics at each random pose.
fn random_ray_scales(
    reference: &Camera,
    poses: &[Mat4],
    config: &DatasetConfig,
) -> Result<Vec<Vec<RayGrid>>> {
    let mut scales = Vec::new();
    for i in config.random_scales_init..config.random_scales {
        let sfactor = 1 << i;
        let width = reference.width / sfactor;
        let height = reference.height / sfactor;
        if width < config.patch_size || height < config.patch_size {
            return Err(Error::Config(format!(
                "random scale {sfactor} shrinks {}x{} below patch size {}",
                reference.width, reference.height, config.patch_size
            )));
        }
        let pix2cam = scaled_pix2cam(reference, width, height);
        let grids = poses
            .iter()
            .map(|&pose| {
                camera_rays(&Camera {
                    pix2cam,
                    cam2world: pose,
                    width,
                    height,
                    lossmult: 1.0,
                    near: config.near,
                    far: config.far,
                })
            })
            .collect();
        scales.push(grids);
    }
    Ok(scales)
}

/// Low-resolution feature-loss set: square ray grids at every random pose
/// and every training image resized to the same resolution.
fn build_feature_set(
    reference: &Camera,
    images: &[ColorImage],
    poses: &[Mat4],
    config: &DatasetConfig,
) -> FeatureSet {
    let res = config.dietnerf_loss_resolution;
    let pix2cam = scaled_pix2cam(reference, res, res);
    let rays = poses
        .iter()
        .map(|&pose| {
            camera_rays(&Camera {
                pix2cam,
                cam2world: pose,
                width: res,
                height: res,
                lossmult: 1.0,
                near: config.near,
                far: config.far,
            })
        })
        .collect();
    let images = images.iter().map(|img| img.resize_area(res, res)).collect();
    FeatureSet { rays, images }
}

/// Reference intrinsics resampled to a new pixel grid.
fn scaled_pix2cam(reference: &Camera, width: usize, height: usize) -> Mat3 {
    let sx = reference.width as f32 / width as f32;
    let sy = reference.height as f32 / height as f32;
    reference.pix2cam * Mat3::from_diagonal(Vec3::new(sx, sy, 1.0))
}
