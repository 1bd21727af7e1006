//! Per-camera calibration records
//!
//! A rig stores one record per physical camera. Cameras may have unequal
//! resolutions, so the set never collapses into dense arrays; everything
//! downstream indexes cameras explicitly.

use crate::core::types::{Mat3, Mat4, Vec3};

/// Calibration for a single camera.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Maps homogeneous pixel coordinates to a camera-space ray
    pub pix2cam: Mat3,
    /// Camera-to-world pose, padded to 4x4
    pub cam2world: Mat4,
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Per-ray loss weight contributed by this camera
    pub lossmult: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Pinhole camera with a square pixel grid centered on the optical
    /// axis, looking down -z in camera space.
    pub fn pinhole(focal: f32, width: usize, height: usize, cam2world: Mat4,
                   near: f32, far: f32) -> Self {
        Self {
            pix2cam: pix2cam_from_focal(focal, width, height),
            cam2world,
            width,
            height,
            lossmult: 1.0,
            near,
            far,
        }
    }

    /// Pixel count of this camera's image.
    pub fn resolution(&self) -> usize {
        self.width * self.height
    }

    /// World position of the camera center.
    pub fn origin(&self) -> Vec3 {
        self.cam2world.w_axis.truncate()
    }
}

/// Pixel-to-camera matrix equivalent to a centered pinhole model with the
/// given focal length. Applied to pixel centers `[x+0.5, y+0.5, 1]` it
/// yields `((x - w/2 + 0.5)/f, -(y - h/2 + 0.5)/f, -1)`.
pub fn pix2cam_from_focal(focal: f32, width: usize, height: usize) -> Mat3 {
    let w = width as f32;
    let h = height as f32;
    Mat3::from_cols(
        Vec3::new(1.0 / focal, 0.0, 0.0),
        Vec3::new(0.0, -1.0 / focal, 0.0),
        Vec3::new(-0.5 * w / focal, 0.5 * h / focal, -1.0),
    )
}

/// An indexed container of camera records, one per physical camera.
#[derive(Clone, Debug, Default)]
pub struct CameraSet {
    cameras: Vec<Camera>,
}

impl CameraSet {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self { cameras }
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Camera> {
        self.cameras.iter()
    }

    pub fn get(&self, index: usize) -> &Camera {
        &self.cameras[index]
    }

    /// All camera-to-world poses, padded.
    pub fn poses(&self) -> Vec<Mat4> {
        self.cameras.iter().map(|c| c.cam2world).collect()
    }

    /// Per-camera near/far bounds.
    pub fn bounds(&self) -> Vec<[f32; 2]> {
        self.cameras.iter().map(|c| [c.near, c.far]).collect()
    }

    /// Whether every camera shares one resolution.
    pub fn uniform_resolution(&self) -> bool {
        self.cameras
            .windows(2)
            .all(|w| w[0].width == w[1].width && w[0].height == w[1].height)
    }
}

impl std::ops::Index<usize> for CameraSet {
    type Output = Camera;

    fn index(&self, index: usize) -> &Camera {
        &self.cameras[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinhole_matrix_matches_closed_form() {
        // 2x2 image, focal 1: pixel (0,0) center maps to (-0.5, 0.5, -1).
        let p2c = pix2cam_from_focal(1.0, 2, 2);
        let dir = p2c * Vec3::new(0.5, 0.5, 1.0);
        assert!((dir - Vec3::new(-0.5, 0.5, -1.0)).length() < 1e-6);

        let dir = p2c * Vec3::new(1.5, 1.5, 1.0);
        assert!((dir - Vec3::new(0.5, -0.5, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_ragged_set_is_allowed() {
        let set = CameraSet::new(vec![
            Camera::pinhole(10.0, 8, 6, Mat4::IDENTITY, 1.0, 5.0),
            Camera::pinhole(20.0, 16, 12, Mat4::IDENTITY, 1.0, 5.0),
        ]);
        assert_eq!(set.len(), 2);
        assert!(!set.uniform_resolution());
        assert_eq!(set[0].resolution(), 48);
        assert_eq!(set[1].resolution(), 192);
    }
}
