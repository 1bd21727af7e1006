//! Near/far plane annealing
//!
//! Interpolates ray clip bounds from a narrow band around a midpoint out
//! to the final near/far range as training progresses. Pure in the step
//! index: the same step always yields the same bounds.

use crate::core::config::DatasetConfig;
use crate::sampling::batch::Batch;

/// Time schedule for ray clip bounds.
#[derive(Clone, Copy, Debug)]
pub struct AnnealSchedule {
    pub near_final: f32,
    pub far_final: f32,
    pub n_steps: usize,
    pub init_perc: f32,
    pub mid_perc: f32,
}

impl AnnealSchedule {
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self {
            near_final: config.near,
            far_final: config.far,
            n_steps: config.anneal_nearfar_steps,
            init_perc: config.anneal_nearfar_perc,
            mid_perc: config.anneal_mid_perc,
        }
    }

    /// Interpolated (near, far) at training step `t`. The interpolation
    /// weight is clamped, so bounds are exact from `n_steps` onward.
    pub fn bounds_at(&self, t: usize) -> (f32, f32) {
        let mid = self.near_final + self.mid_perc * (self.far_final - self.near_final);
        let near_init = mid + self.init_perc * (self.near_final - mid);
        let far_init = mid + self.init_perc * (self.far_final - mid);

        let weight = (t as f32 / self.n_steps as f32).min(1.0);
        (
            near_init + weight * (self.near_final - near_init),
            far_init + weight * (self.far_final - far_init),
        )
    }

    /// Rebuild every ray-bearing field of a batch with the bounds for
    /// step `t`; all other fields pass through unchanged.
    pub fn apply(&self, mut batch: Batch, t: usize) -> Batch {
        let (near, far) = self.bounds_at(t);
        batch.rays = batch.rays.with_bounds(near, far);
        batch.rays_random = batch.rays_random.map(|r| r.with_bounds(near, far));
        batch.rays_random2 = batch.rays_random2.map(|r| r.with_bounds(near, far));
        batch.rays_feat = batch.rays_feat.map(|r| r.with_bounds(near, far));
        batch
    }
}
