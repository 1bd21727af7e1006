//! Multi-resolution image/ray pyramid
//!
//! Each level holds an area-downsampled copy of every image and a ray
//! grid re-derived at the reduced resolution. Levels own their storage;
//! building a level never touches the ones before it.

use log::warn;

use crate::camera::rig::{Camera, CameraSet};
use crate::core::types::{Mat3, Vec3};
use crate::io::frames::ColorImage;
use crate::rays::bundle::RayGrid;
use crate::rays::engine::rig_rays;

/// One pyramid level: images and matching rays at a common downsampling
/// factor.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    /// Power-of-two downsampling factor relative to level 0
    pub factor: usize,
    pub images: Vec<ColorImage>,
    pub rays: Vec<RayGrid>,
}

impl PyramidLevel {
    /// Per-image pixel counts at this level.
    pub fn resolutions(&self) -> Vec<usize> {
        self.images.iter().map(ColorImage::resolution).collect()
    }

    /// Total pixel count across every image of this level.
    pub fn total_pixels(&self) -> usize {
        self.images.iter().map(ColorImage::resolution).sum()
    }
}

/// Ordered sequence of downsampled image/ray pairs; level 0 is full
/// resolution and resolutions strictly decrease.
#[derive(Clone, Debug)]
pub struct ImagePyramid {
    pub levels: Vec<PyramidLevel>,
}

impl ImagePyramid {
    /// Build `num_scales` levels from full-resolution images and their
    /// cameras. `patch_floor` clamps the minimum image dimension so patch
    /// sampling stays possible at every level; levels that stop shrinking
    /// because of the clamp are dropped.
    pub fn build(
        images: &[ColorImage],
        cameras: &CameraSet,
        full_rays: Vec<RayGrid>,
        num_scales: usize,
        patch_floor: usize,
    ) -> ImagePyramid {
        let mut levels = Vec::with_capacity(num_scales);
        levels.push(PyramidLevel {
            factor: 1,
            images: images.to_vec(),
            rays: full_rays,
        });

        for i in 1..num_scales {
            let factor = 1 << i;
            let level_images: Vec<ColorImage> = images
                .iter()
                .map(|img| img.downsample(factor, patch_floor))
                .collect();

            let prev = levels.last().expect("level 0 exists");
            let shrank = level_images
                .iter()
                .zip(&prev.images)
                .all(|(new, old)| new.resolution() < old.resolution());
            if !shrank {
                warn!(
                    "pyramid stopped at {} of {num_scales} levels: clamped to {patch_floor}px",
                    levels.len()
                );
                break;
            }

            let scaled: Vec<Camera> = cameras
                .iter()
                .zip(&level_images)
                .map(|(camera, img)| scale_camera(camera, img.width, img.height))
                .collect();
            let rays = rig_rays(&CameraSet::new(scaled));

            levels.push(PyramidLevel {
                factor,
                images: level_images,
                rays,
            });
        }
        ImagePyramid { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

/// Camera record for a reduced-resolution copy of an image. The pixel
/// scale folds into `pix2cam`, so ray derivation needs no special case.
fn scale_camera(camera: &Camera, out_width: usize, out_height: usize) -> Camera {
    let sx = camera.width as f32 / out_width as f32;
    let sy = camera.height as f32 / out_height as f32;
    Camera {
        pix2cam: camera.pix2cam * Mat3::from_diagonal(Vec3::new(sx, sy, 1.0)),
        cam2world: camera.cam2world,
        width: out_width,
        height: out_height,
        lossmult: camera.lossmult,
        near: camera.near,
        far: camera.far,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Mat4;
    use crate::rays::engine::camera_rays;

    fn flat_image(width: usize, height: usize) -> ColorImage {
        ColorImage {
            width,
            height,
            pixels: vec![Vec3::splat(0.5); width * height],
        }
    }

    fn build_pyramid(size: usize, scales: usize, floor: usize) -> ImagePyramid {
        let camera = Camera::pinhole(size as f32, size, size, Mat4::IDENTITY, 2.0, 6.0);
        let images = vec![flat_image(size, size)];
        let full = vec![camera_rays(&camera)];
        let cameras = CameraSet::new(vec![camera]);
        ImagePyramid::build(&images, &cameras, full, scales, floor)
    }

    #[test]
    fn test_three_scales_on_64() {
        let pyramid = build_pyramid(64, 3, 8);
        let resolutions: Vec<usize> = pyramid
            .levels
            .iter()
            .map(|l| l.resolutions()[0])
            .collect();
        assert_eq!(resolutions, vec![4096, 1024, 256]);
    }

    #[test]
    fn test_resolutions_strictly_decrease() {
        let pyramid = build_pyramid(64, 4, 8);
        for pair in pyramid.levels.windows(2) {
            assert!(pair[0].resolutions()[0] > pair[1].resolutions()[0]);
        }
        assert_eq!(pyramid.levels[0].resolutions()[0], 64 * 64);
    }

    #[test]
    fn test_clamped_levels_dropped() {
        // 16px images with an 8px floor: level 2 would stay at 8x8, so the
        // pyramid stops at two levels.
        let pyramid = build_pyramid(16, 4, 8);
        assert_eq!(pyramid.num_levels(), 2);
    }

    #[test]
    fn test_rays_match_image_resolution() {
        let pyramid = build_pyramid(64, 3, 8);
        for level in &pyramid.levels {
            assert_eq!(level.images[0].width, level.rays[0].width);
            assert_eq!(level.images[0].height, level.rays[0].height);
            assert!(level.rays[0].rays.check_invariants());
        }
    }

    #[test]
    fn test_downsampled_directions_track_pixel_centers() {
        // The center ray of a half-res level should line up with the
        // average viewing direction of the corresponding full-res block.
        let pyramid = build_pyramid(8, 2, 2);
        let full = &pyramid.levels[0].rays[0];
        let half = &pyramid.levels[1].rays[0];
        let coarse = half.rays.viewdirs[half.pixel(1, 1)];
        let block_mean = (full.rays.directions[full.pixel(2, 2)]
            + full.rays.directions[full.pixel(3, 2)]
            + full.rays.directions[full.pixel(2, 3)]
            + full.rays.directions[full.pixel(3, 3)])
        .normalize();
        assert!((coarse - block_mean).length() < 0.05);
    }
}
