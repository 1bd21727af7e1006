//! Per-step batch assembly
//!
//! One call produces one training batch or one evaluation example from a
//! frozen snapshot. Training draws pixels under a pooled or per-image
//! strategy; evaluation walks examples round-robin.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::core::config::{Batching, DatasetConfig, ScaleDist};
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::dataset::snapshot::{Snapshot, TestSnapshot, TrainSnapshot};
use crate::rays::bundle::RayBundle;
use crate::sampling::anneal::AnnealSchedule;
use crate::sampling::patch::sample_patches;

/// One delivered batch. `rgb` and `rays` are always present except in
/// render-path mode, where only `rays` is. Batches are immutable once
/// enqueued; every field owns fresh memory.
#[derive(Clone, Debug)]
pub struct Batch {
    /// Monotonic production counter, used to verify delivery order
    pub seq: u64,
    pub rgb: Option<Vec<Vec3>>,
    pub rays: RayBundle,
    pub disps: Option<Vec<f32>>,
    pub normals: Option<Vec<Vec3>>,
    pub mask: Option<Vec<f32>>,
    pub rays_random: Option<RayBundle>,
    pub rays_random_scale: Option<usize>,
    pub rays_random2: Option<RayBundle>,
    pub rays_random2_scale: Option<usize>,
    pub rays_feat: Option<RayBundle>,
    pub image_feat: Option<Vec<Vec3>>,
    /// (width, height) of the source image for whole-image batches
    pub image_shape: Option<(usize, usize)>,
}

impl Batch {
    fn new(seq: u64, rays: RayBundle) -> Self {
        Self {
            seq,
            rgb: None,
            rays,
            disps: None,
            normals: None,
            mask: None,
            rays_random: None,
            rays_random_scale: None,
            rays_random2: None,
            rays_random2_scale: None,
            rays_feat: None,
            image_feat: None,
            image_shape: None,
        }
    }

    /// Split the batch into `n` equal shards, one per worker. Every
    /// per-ray field must divide evenly by `n`.
    pub fn shard(&self, n: usize) -> Vec<Batch> {
        let chunk = self.rays.len() / n;
        debug_assert_eq!(self.rays.len() % n, 0);
        (0..n)
            .map(|i| {
                let (a, b) = (i * chunk, (i + 1) * chunk);
                Batch {
                    seq: self.seq,
                    rgb: self.rgb.as_ref().map(|v| v[a..b].to_vec()),
                    rays: self.rays.slice(a, b),
                    disps: self.disps.as_ref().map(|v| v[a..b].to_vec()),
                    normals: self.normals.as_ref().map(|v| v[a..b].to_vec()),
                    mask: self.mask.as_ref().map(|v| v[a..b].to_vec()),
                    rays_random: self.rays_random.as_ref().map(|r| shard_slice(r, i, n)),
                    rays_random_scale: self.rays_random_scale,
                    rays_random2: self.rays_random2.as_ref().map(|r| shard_slice(r, i, n)),
                    rays_random2_scale: self.rays_random2_scale,
                    rays_feat: self.rays_feat.as_ref().map(|r| shard_slice(r, i, n)),
                    image_feat: self.image_feat.as_ref().map(|v| {
                        let chunk = v.len() / n;
                        v[i * chunk..(i + 1) * chunk].to_vec()
                    }),
                    image_shape: self.image_shape,
                }
            })
            .collect()
    }
}

fn shard_slice(rays: &RayBundle, i: usize, n: usize) -> RayBundle {
    let chunk = rays.len() / n;
    rays.slice(i * chunk, (i + 1) * chunk)
}

/// Draws one batch per call from a frozen snapshot.
pub struct BatchSampler {
    snapshot: Arc<Snapshot>,
    batching: Batching,
    batching_random: Batching,
    scale_dist: ScaleDist,
    batch_size: usize,
    batch_size_random: usize,
    patch_size: usize,
    render_path: bool,
    anneal: Option<AnnealSchedule>,
    rng: StdRng,
    step: usize,
    cursor: usize,
    seq: u64,
}

impl BatchSampler {
    pub fn new(snapshot: Arc<Snapshot>, config: &DatasetConfig) -> Self {
        let anneal = config
            .anneal_nearfar
            .then(|| AnnealSchedule::from_config(config));
        Self {
            snapshot,
            batching: config.batching,
            batching_random: config.batching_random,
            scale_dist: config.recon_scale_dist,
            batch_size: config.batch_size,
            batch_size_random: config.batch_size_random,
            patch_size: config.patch_size,
            render_path: config.render_path,
            anneal,
            rng: StdRng::seed_from_u64(config.seed),
            step: 0,
            cursor: 0,
            seq: 0,
        }
    }

    /// Produce the next batch for the active split.
    pub fn next_batch(&mut self) -> Result<Batch> {
        let snapshot = Arc::clone(&self.snapshot);
        let batch = match snapshot.as_ref() {
            Snapshot::Train(train) => self.next_train(train)?,
            Snapshot::Test(test) => self.next_test(test)?,
        };
        self.seq += 1;
        Ok(batch)
    }

    fn next_train(&mut self, snap: &TrainSnapshot) -> Result<Batch> {
        self.step += 1;

        let mut batch = match self.batching {
            Batching::AllImages => self.sample_pooled(snap),
            Batching::SingleImage => self.sample_single_image(snap),
        };

        if let Some(random_rays) = &snap.random_rays {
            let (rays, scale) = sample_patches(
                random_rays,
                self.patch_size,
                self.batch_size_random,
                self.batching_random,
                &mut self.rng,
            )?;
            batch.rays_random = Some(rays);
            batch.rays_random_scale = Some(scale);

            let (rays2, scale2) = sample_patches(
                random_rays,
                self.patch_size,
                self.batch_size_random,
                self.batching_random,
                &mut self.rng,
            )?;
            batch.rays_random2 = Some(rays2);
            batch.rays_random2_scale = Some(scale2);
        }

        if let Some(feature) = &snap.feature {
            let grid = &feature.rays[self.rng.gen_range(0..feature.rays.len())];
            batch.rays_feat = Some(grid.rays.clone());
            let image = &feature.images[self.rng.gen_range(0..feature.images.len())];
            batch.image_feat = Some(image.pixels.clone());
        }

        if let Some(anneal) = self.anneal {
            batch = anneal.apply(batch, self.step);
        }
        Ok(batch)
    }

    /// Global pool: one scale per step, pixels drawn across every image.
    fn sample_pooled(&mut self, snap: &TrainSnapshot) -> Batch {
        let level = self.sample_scale(snap);
        let pool = &snap.levels[level];

        let mut rgb = Vec::with_capacity(self.batch_size);
        let mut rays = RayBundle::with_capacity(self.batch_size);
        let mut disps = snap.disps.is_some().then(|| Vec::with_capacity(self.batch_size));
        let mut normals = snap
            .normals
            .is_some()
            .then(|| Vec::with_capacity(self.batch_size));
        for _ in 0..self.batch_size {
            let (image, pixel) = pool.locate(self.rng.gen_range(0..pool.total()));
            rgb.push(pool.rgb[image][pixel]);
            rays.push_from(&pool.rays[image], pixel);
            // Side channels only exist at full resolution.
            if level == 0 {
                if let (Some(out), Some(src)) = (disps.as_mut(), snap.disps.as_ref()) {
                    out.push(src[image][pixel]);
                }
                if let (Some(out), Some(src)) = (normals.as_mut(), snap.normals.as_ref()) {
                    out.push(src[image][pixel]);
                }
            }
        }
        if level != 0 {
            disps = None;
            normals = None;
        }

        let mut batch = Batch::new(self.seq, rays);
        batch.rgb = Some(rgb);
        batch.disps = disps;
        batch.normals = normals;
        batch
    }

    /// Per-image pool: one full-resolution image serves the whole batch.
    fn sample_single_image(&mut self, snap: &TrainSnapshot) -> Batch {
        let pool = &snap.levels[0];
        let image = self.rng.gen_range(0..snap.n_examples);
        let pixels = pool.rgb[image].len();

        let mut rgb = Vec::with_capacity(self.batch_size);
        let mut rays = RayBundle::with_capacity(self.batch_size);
        let mut disps = snap.disps.is_some().then(|| Vec::with_capacity(self.batch_size));
        let mut normals = snap
            .normals
            .is_some()
            .then(|| Vec::with_capacity(self.batch_size));
        for _ in 0..self.batch_size {
            let pixel = self.rng.gen_range(0..pixels);
            rgb.push(pool.rgb[image][pixel]);
            rays.push_from(&pool.rays[image], pixel);
            if let (Some(out), Some(src)) = (disps.as_mut(), snap.disps.as_ref()) {
                out.push(src[image][pixel]);
            }
            if let (Some(out), Some(src)) = (normals.as_mut(), snap.normals.as_ref()) {
                out.push(src[image][pixel]);
            }
        }

        let mut batch = Batch::new(self.seq, rays);
        batch.rgb = Some(rgb);
        batch.disps = disps;
        batch.normals = normals;
        batch
    }

    fn sample_scale(&mut self, snap: &TrainSnapshot) -> usize {
        match self.scale_dist {
            ScaleDist::UniformScale => self.rng.gen_range(0..snap.levels.len()),
            ScaleDist::UniformSize => {
                let total: usize = snap.levels.iter().map(|l| l.total()).sum();
                let mut pick = self.rng.gen_range(0..total);
                for (i, level) in snap.levels.iter().enumerate() {
                    if pick < level.total() {
                        return i;
                    }
                    pick -= level.total();
                }
                snap.levels.len() - 1
            }
        }
    }

    /// Deterministic round-robin over evaluation examples; every example
    /// is visited exactly once per full cycle.
    fn next_test(&mut self, snap: &TestSnapshot) -> Result<Batch> {
        if self.render_path {
            let paths = snap.render_rays.as_ref().ok_or_else(|| {
                Error::Unsupported("render_path requested but no camera path was built".into())
            })?;
            let idx = self.cursor;
            self.cursor = (self.cursor + 1) % paths.len();
            let grid = &paths[idx];
            let mut batch = Batch::new(self.seq, grid.rays.clone());
            batch.image_shape = Some((grid.width, grid.height));
            return Ok(batch);
        }

        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % snap.examples.len();
        let example = &snap.examples[idx];
        let mut batch = Batch::new(self.seq, example.rays.rays.clone());
        batch.rgb = Some(example.rgb.clone());
        batch.disps = example.disps.clone();
        batch.normals = example.normals.clone();
        batch.mask = example.mask.clone();
        batch.image_shape = Some((example.rays.width, example.rays.height));
        Ok(batch)
    }
}
