//! Ray bundle storage
//!
//! A bundle is a structure of parallel per-ray arrays. Every field shares
//! one length; bundles are only ever built or rebuilt as a whole, never
//! mutated field by field.

use crate::core::types::Vec3;

/// Parallel per-ray arrays: origin, direction, unit view direction,
/// footprint radius, loss weight, and clip bounds.
#[derive(Clone, Debug, Default)]
pub struct RayBundle {
    pub origins: Vec<Vec3>,
    pub directions: Vec<Vec3>,
    pub viewdirs: Vec<Vec3>,
    pub radii: Vec<f32>,
    pub lossmult: Vec<f32>,
    pub near: Vec<f32>,
    pub far: Vec<f32>,
}

impl RayBundle {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            origins: Vec::with_capacity(n),
            directions: Vec::with_capacity(n),
            viewdirs: Vec::with_capacity(n),
            radii: Vec::with_capacity(n),
            lossmult: Vec::with_capacity(n),
            near: Vec::with_capacity(n),
            far: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Append one ray. `viewdirs` is derived from the direction here so a
    /// bundle can never hold a denormalized view direction.
    pub fn push(&mut self, origin: Vec3, direction: Vec3, radius: f32,
                lossmult: f32, near: f32, far: f32) {
        self.origins.push(origin);
        self.directions.push(direction);
        self.viewdirs.push(direction.normalize());
        self.radii.push(radius);
        self.lossmult.push(lossmult);
        self.near.push(near);
        self.far.push(far);
    }

    /// Copy the ray at `index` from another bundle.
    pub fn push_from(&mut self, other: &RayBundle, index: usize) {
        self.origins.push(other.origins[index]);
        self.directions.push(other.directions[index]);
        self.viewdirs.push(other.viewdirs[index]);
        self.radii.push(other.radii[index]);
        self.lossmult.push(other.lossmult[index]);
        self.near.push(other.near[index]);
        self.far.push(other.far[index]);
    }

    /// New bundle holding the rays at `indices`, in order. Indices may
    /// repeat.
    pub fn gather(&self, indices: &[usize]) -> RayBundle {
        let mut out = RayBundle::with_capacity(indices.len());
        for &i in indices {
            out.push_from(self, i);
        }
        out
    }

    /// Concatenate bundles into one flat bundle.
    pub fn concat<'a>(bundles: impl IntoIterator<Item = &'a RayBundle>) -> RayBundle {
        let mut out = RayBundle::default();
        for bundle in bundles {
            out.origins.extend_from_slice(&bundle.origins);
            out.directions.extend_from_slice(&bundle.directions);
            out.viewdirs.extend_from_slice(&bundle.viewdirs);
            out.radii.extend_from_slice(&bundle.radii);
            out.lossmult.extend_from_slice(&bundle.lossmult);
            out.near.extend_from_slice(&bundle.near);
            out.far.extend_from_slice(&bundle.far);
        }
        out
    }

    /// New bundle holding the contiguous rays in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> RayBundle {
        RayBundle {
            origins: self.origins[start..end].to_vec(),
            directions: self.directions[start..end].to_vec(),
            viewdirs: self.viewdirs[start..end].to_vec(),
            radii: self.radii[start..end].to_vec(),
            lossmult: self.lossmult[start..end].to_vec(),
            near: self.near[start..end].to_vec(),
            far: self.far[start..end].to_vec(),
        }
    }

    /// Rebuild the whole bundle with every ray's clip bounds replaced.
    pub fn with_bounds(&self, near: f32, far: f32) -> RayBundle {
        RayBundle {
            origins: self.origins.clone(),
            directions: self.directions.clone(),
            viewdirs: self.viewdirs.clone(),
            radii: self.radii.clone(),
            lossmult: self.lossmult.clone(),
            near: vec![near; self.len()],
            far: vec![far; self.len()],
        }
    }

    /// Check the structural invariants: equal field lengths, unit-norm
    /// view directions, non-negative radii, near <= far.
    pub fn check_invariants(&self) -> bool {
        let n = self.len();
        if [
            self.directions.len(),
            self.viewdirs.len(),
            self.radii.len(),
            self.lossmult.len(),
            self.near.len(),
            self.far.len(),
        ]
        .iter()
        .any(|&l| l != n)
        {
            return false;
        }
        self.viewdirs.iter().all(|v| (v.length() - 1.0).abs() < 1e-5)
            && self.radii.iter().all(|&r| r >= 0.0)
            && self.near.iter().zip(&self.far).all(|(n, f)| n <= f)
    }
}

/// A bundle laid out as a width x height pixel grid, the per-image form
/// used before batching flattens it.
#[derive(Clone, Debug)]
pub struct RayGrid {
    pub rays: RayBundle,
    pub width: usize,
    pub height: usize,
}

impl RayGrid {
    /// Flat index of the ray through pixel (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn resolution(&self) -> usize {
        self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> RayBundle {
        let mut bundle = RayBundle::default();
        for i in 0..4 {
            let dir = Vec3::new(i as f32 + 1.0, 0.5, -1.0);
            bundle.push(Vec3::ZERO, dir, 0.01, 1.0, 2.0, 6.0);
        }
        bundle
    }

    #[test]
    fn test_push_normalizes_viewdirs() {
        let bundle = sample_bundle();
        assert!(bundle.check_invariants());
        for v in &bundle.viewdirs {
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_gather_preserves_order_and_repeats() {
        let bundle = sample_bundle();
        let picked = bundle.gather(&[3, 0, 3]);
        assert_eq!(picked.len(), 3);
        assert_eq!(picked.directions[0], bundle.directions[3]);
        assert_eq!(picked.directions[1], bundle.directions[0]);
        assert_eq!(picked.directions[2], bundle.directions[3]);
        assert!(picked.check_invariants());
    }

    #[test]
    fn test_concat_lengths() {
        let a = sample_bundle();
        let b = sample_bundle();
        let joined = RayBundle::concat([&a, &b]);
        assert_eq!(joined.len(), 8);
        assert!(joined.check_invariants());
    }

    #[test]
    fn test_with_bounds_rebuilds_whole_bundle() {
        let bundle = sample_bundle();
        let rebuilt = bundle.with_bounds(3.0, 5.0);
        assert_eq!(rebuilt.len(), bundle.len());
        assert!(rebuilt.near.iter().all(|&n| n == 3.0));
        assert!(rebuilt.far.iter().all(|&f| f == 5.0));
        // Source bundle untouched.
        assert!(bundle.near.iter().all(|&n| n == 2.0));
    }

    #[test]
    fn test_grid_pixel_indexing() {
        let grid = RayGrid {
            rays: sample_bundle(),
            width: 2,
            height: 2,
        };
        assert_eq!(grid.pixel(0, 0), 0);
        assert_eq!(grid.pixel(1, 1), 3);
        assert_eq!(grid.resolution(), 4);
    }
}
