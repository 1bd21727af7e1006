//! Square patch sampling
//!
//! Draws spatially contiguous pixel blocks from a randomly chosen level
//! of a ray-grid pyramid, for losses that need local structure. Patches
//! are flattened to rows; the chosen level index travels with them so
//! consumers can recover the focal/resolution context.

use rand::Rng;

use crate::core::config::Batching;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::rays::bundle::{RayBundle, RayGrid};

/// Draw `batch_size / patch_size^2` patches from one uniformly chosen
/// level of `levels` (`[level][image]` ray grids).
///
/// `all_images` picks an image per patch; `single_image` picks one image
/// for the whole call. Returns the flattened rays and the level index.
pub fn sample_patches(
    levels: &[Vec<RayGrid>],
    patch_size: usize,
    batch_size: usize,
    batching: Batching,
    rng: &mut impl Rng,
) -> Result<(RayBundle, usize)> {
    let n_patches = batch_size / (patch_size * patch_size);
    let level = rng.gen_range(0..levels.len());
    let grids = &levels[level];

    let fixed_image = match batching {
        Batching::AllImages => None,
        Batching::SingleImage => Some(rng.gen_range(0..grids.len())),
    };

    let mut out = RayBundle::with_capacity(n_patches * patch_size * patch_size);
    for _ in 0..n_patches {
        let image = fixed_image.unwrap_or_else(|| rng.gen_range(0..grids.len()));
        let grid = &grids[image];
        if grid.width < patch_size || grid.height < patch_size {
            return Err(Error::Config(format!(
                "patch size {patch_size} exceeds {}x{} image at level {level}",
                grid.width, grid.height
            )));
        }
        let x0 = rng.gen_range(0..=grid.width - patch_size);
        let y0 = rng.gen_range(0..=grid.height - patch_size);
        for dy in 0..patch_size {
            for dx in 0..patch_size {
                out.push_from(&grid.rays, grid.pixel(x0 + dx, y0 + dy));
            }
        }
    }
    Ok((out, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::rig::Camera;
    use crate::core::types::Mat4;
    use crate::rays::engine::camera_rays;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn grid_levels() -> Vec<Vec<RayGrid>> {
        let full = Camera::pinhole(8.0, 16, 16, Mat4::IDENTITY, 2.0, 6.0);
        let half = Camera::pinhole(4.0, 8, 8, Mat4::IDENTITY, 2.0, 6.0);
        vec![
            vec![camera_rays(&full), camera_rays(&full)],
            vec![camera_rays(&half), camera_rays(&half)],
        ]
    }

    #[test]
    fn test_output_row_count() {
        let levels = grid_levels();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            let (rays, level) =
                sample_patches(&levels, 4, 64, Batching::AllImages, &mut rng).unwrap();
            assert_eq!(rays.len(), 64);
            assert!(level < levels.len());
            assert!(rays.check_invariants());
        }
    }

    #[test]
    fn test_patches_stay_in_bounds() {
        // With patch size equal to the smallest level there is exactly one
        // valid origin, so every row of the patch must be a full grid row.
        let levels = vec![grid_levels().remove(1)];
        let mut rng = StdRng::seed_from_u64(2);
        let (rays, level) =
            sample_patches(&levels, 8, 64, Batching::SingleImage, &mut rng).unwrap();
        assert_eq!(level, 0);
        let source = &levels[0][0];
        for (got, want) in rays.directions.iter().zip(&source.rays.directions) {
            assert_eq!(got, want);
        }
    }

    #[test]
    fn test_patch_rows_are_contiguous() {
        let levels = grid_levels();
        let mut rng = StdRng::seed_from_u64(3);
        let (rays, level) =
            sample_patches(&levels, 4, 16, Batching::SingleImage, &mut rng).unwrap();
        let width = levels[level][0].width;
        // Within one patch row, consecutive samples come from adjacent
        // pixels: their direction spacing matches the grid spacing.
        let grid = &levels[level][0];
        let spacing =
            grid.rays.directions[grid.pixel(1, 0)] - grid.rays.directions[grid.pixel(0, 0)];
        for row in 0..4 {
            for col in 0..3 {
                let a = rays.directions[row * 4 + col];
                let b = rays.directions[row * 4 + col + 1];
                assert!((b - a - spacing).length() < 1e-5, "width {width}");
            }
        }
    }

    #[test]
    fn test_oversized_patch_is_config_error() {
        let levels = grid_levels();
        let mut rng = StdRng::seed_from_u64(4);
        let result = sample_patches(&levels, 32, 1024, Batching::AllImages, &mut rng);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
