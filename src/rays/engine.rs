//! Per-pixel ray derivation
//!
//! Turns a camera record into one world-space ray per pixel. The same
//! path serves single cameras and rigs; rig output stays per-camera so
//! unequal resolutions never have to stack.

use rayon::prelude::*;

use crate::camera::rig::{Camera, CameraSet};
use crate::core::types::Vec3;
use crate::math::pose::rotation;
use crate::rays::bundle::{RayBundle, RayGrid};

/// Footprint scale: matches the variance of a uniform distribution over
/// one pixel width (1/12).
const RADIUS_SCALE: f32 = 2.0 / 3.464_101_6; // 2 / sqrt(12)

/// Derive one ray per pixel of `camera`.
///
/// Directions are `pix2cam * [x+0.5, y+0.5, 1]` rotated into world space;
/// origins broadcast the camera center. Pure function of the record.
pub fn camera_rays(camera: &Camera) -> RayGrid {
    let (w, h) = (camera.width, camera.height);
    let rot = rotation(&camera.cam2world);
    let origin = camera.origin();

    let mut directions = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let pixel = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 1.0);
            directions.push(rot * (camera.pix2cam * pixel));
        }
    }
    let radii = footprint_radii(&directions, w, h);

    let mut rays = RayBundle::with_capacity(w * h);
    for (dir, radius) in directions.into_iter().zip(radii) {
        rays.push(origin, dir, radius, camera.lossmult, camera.near, camera.far);
    }
    RayGrid { rays, width: w, height: h }
}

/// Derive rays for every camera of a rig, in camera order.
pub fn rig_rays(cameras: &CameraSet) -> Vec<RayGrid> {
    cameras
        .iter()
        .collect::<Vec<_>>()
        .par_iter()
        .map(|camera| camera_rays(camera))
        .collect()
}

/// Footprint radius per pixel: distance between each direction and its
/// row neighbor, scaled by 2/sqrt(12). The last row repeats the previous
/// row's spacing; single-row grids fall back to column spacing.
fn footprint_radii(directions: &[Vec3], width: usize, height: usize) -> Vec<f32> {
    let mut radii = vec![0.0; width * height];
    if height >= 2 {
        for y in 0..height {
            let src = if y + 1 < height { y } else { height - 2 };
            for x in 0..width {
                let dx = directions[(src + 1) * width + x] - directions[src * width + x];
                radii[y * width + x] = dx.length() * RADIUS_SCALE;
            }
        }
    } else if width >= 2 {
        for x in 0..width {
            let src = if x + 1 < width { x } else { width - 2 };
            let dx = directions[src + 1] - directions[src];
            radii[x] = dx.length() * RADIUS_SCALE;
        }
    }
    radii
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Mat4;

    fn unit_camera() -> Camera {
        Camera::pinhole(1.0, 2, 2, Mat4::IDENTITY, 2.0, 6.0)
    }

    #[test]
    fn test_identity_camera_directions() {
        // 2x2 image, focal 1, identity pose at the origin.
        let grid = camera_rays(&unit_camera());
        assert_eq!(grid.rays.len(), 4);

        for origin in &grid.rays.origins {
            assert_eq!(*origin, Vec3::ZERO);
        }

        let expected = Vec3::new(-0.5, 0.5, -1.0);
        let d = grid.rays.directions[grid.pixel(0, 0)];
        assert!((d - expected).length() < 1e-6);
        let v = grid.rays.viewdirs[grid.pixel(0, 0)];
        assert!((v - expected.normalize()).length() < 1e-6);

        let d = grid.rays.directions[grid.pixel(1, 1)];
        assert!((d - Vec3::new(0.5, -0.5, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_bundle_invariants() {
        let camera = Camera::pinhole(30.0, 12, 9, Mat4::IDENTITY, 0.5, 10.0);
        let grid = camera_rays(&camera);
        assert!(grid.rays.check_invariants());
        assert_eq!(grid.rays.len(), 12 * 9);
        assert!(grid.rays.radii.iter().all(|&r| r > 0.0));
    }

    #[test]
    fn test_last_row_repeats_previous_spacing() {
        let grid = camera_rays(&unit_camera());
        let r_first = grid.rays.radii[grid.pixel(0, 0)];
        let r_last = grid.rays.radii[grid.pixel(0, 1)];
        assert_eq!(r_first, r_last);
    }

    #[test]
    fn test_origin_broadcast_from_pose() {
        let pose = Mat4::from_translation(Vec3::new(1.0, -2.0, 3.0));
        let camera = Camera::pinhole(4.0, 3, 3, pose, 1.0, 8.0);
        let grid = camera_rays(&camera);
        for origin in &grid.rays.origins {
            assert!((*origin - Vec3::new(1.0, -2.0, 3.0)).length() < 1e-6);
        }
    }

    #[test]
    fn test_rig_preserves_per_camera_resolution() {
        let set = CameraSet::new(vec![
            Camera::pinhole(8.0, 8, 6, Mat4::IDENTITY, 1.0, 5.0),
            Camera::pinhole(16.0, 16, 12, Mat4::IDENTITY, 1.0, 5.0),
        ]);
        let grids = rig_rays(&set);
        assert_eq!(grids.len(), 2);
        assert_eq!((grids[0].width, grids[0].height), (8, 6));
        assert_eq!((grids[1].width, grids[1].height), (16, 12));
    }
}
