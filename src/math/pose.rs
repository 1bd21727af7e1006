//! Camera pose algebra
//!
//! World-space poses are 3x4 matrices (rotation block plus translation
//! column). All algebra here runs on the padded 4x4 form; `pad_pose` and
//! `unpad_pose` convert between the two.

use crate::core::types::{Mat3, Mat4, Vec3, Vec4};

/// Rows of a 3x4 camera-to-world pose, as stored in metadata records.
pub type PoseRows = [[f32; 4]; 3];

/// Pad a 3x4 pose with the homogeneous bottom row [0,0,0,1].
pub fn pad_pose(rows: &PoseRows) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(rows[0][0], rows[1][0], rows[2][0], 0.0),
        Vec4::new(rows[0][1], rows[1][1], rows[2][1], 0.0),
        Vec4::new(rows[0][2], rows[1][2], rows[2][2], 0.0),
        Vec4::new(rows[0][3], rows[1][3], rows[2][3], 1.0),
    )
}

/// Strip the homogeneous bottom row from a 4x4 pose.
pub fn unpad_pose(pose: &Mat4) -> PoseRows {
    let c = pose.to_cols_array_2d();
    [
        [c[0][0], c[1][0], c[2][0], c[3][0]],
        [c[0][1], c[1][1], c[2][1], c[3][1]],
        [c[0][2], c[1][2], c[2][2], c[3][2]],
    ]
}

/// Rotation block of a padded pose.
pub fn rotation(pose: &Mat4) -> Mat3 {
    Mat3::from_mat4(*pose)
}

/// World position of a padded pose.
pub fn position(pose: &Mat4) -> Vec3 {
    pose.w_axis.truncate()
}

/// Construct a lookat view matrix from a view direction, up vector, and
/// position. With `subtract_position` the first argument is a target point
/// rather than a direction.
pub fn view_matrix(lookdir: Vec3, up: Vec3, pos: Vec3, subtract_position: bool) -> Mat4 {
    let vec2 = if subtract_position {
        (lookdir - pos).normalize()
    } else {
        lookdir.normalize()
    };
    let vec0 = up.cross(vec2).normalize();
    let vec1 = vec2.cross(vec0).normalize();
    Mat4::from_cols(
        vec0.extend(0.0),
        vec1.extend(0.0),
        vec2.extend(0.0),
        pos.extend(1.0),
    )
}

/// New pose using the average position, z-axis, and up vector of the input
/// poses.
pub fn poses_avg(poses: &[Mat4]) -> Mat4 {
    let n = poses.len() as f32;
    let pos = poses.iter().map(position).sum::<Vec3>() / n;
    let z_axis = poses.iter().map(|p| p.z_axis.truncate()).sum::<Vec3>() / n;
    let up = poses.iter().map(|p| p.y_axis.truncate()).sum::<Vec3>() / n;
    view_matrix(z_axis, up, pos, false)
}

/// Recenter poses around the origin by the inverse of their average pose.
pub fn recenter_poses(poses: &[Mat4]) -> Vec<Mat4> {
    let inv_avg = poses_avg(poses).inverse();
    poses.iter().map(|p| inv_avg * *p).collect()
}

/// Nearest point to all focal axes of the given poses.
pub fn focus_point(poses: &[Mat4]) -> Vec3 {
    let n = poses.len() as f32;
    let mut mtm_sum = Mat3::ZERO;
    let mut rhs_sum = Vec3::ZERO;
    for pose in poses {
        let d = pose.z_axis.truncate();
        let m = Mat3::IDENTITY - outer(d, d);
        let mtm = m.transpose() * m;
        mtm_sum += mtm;
        rhs_sum += mtm * position(pose);
    }
    (mtm_sum * (1.0 / n)).inverse() * (rhs_sum / n)
}

/// Transform poses so they lie roughly on the upper unit hemisphere around
/// the shared focus point. Near/far bounds are rescaled by the same factor
/// as the camera positions.
pub fn transform_poses_to_hemisphere(
    poses: &[Mat4],
    bounds: &[[f32; 2]],
) -> (Vec<Mat4>, Vec<[f32; 2]>) {
    let focus = focus_point(poses);

    let n = poses.len() as f32;
    let mean_origin = poses.iter().map(position).sum::<Vec3>() / n;
    let toward_cameras = mean_origin - focus;
    let arbitrary_dir = Vec3::new(0.1, 0.2, 0.3);
    let frame = view_matrix(toward_cameras, arbitrary_dir, focus, false);
    let inv_frame = frame.inverse();

    let mut recentered: Vec<Mat4> = poses.iter().map(|p| inv_frame * *p).collect();

    let avg_distance = (recentered
        .iter()
        .map(|p| position(p).length_squared())
        .sum::<f32>()
        / n)
        .sqrt();
    let scale = 1.0 / avg_distance;
    for pose in &mut recentered {
        let scaled = position(pose) * scale;
        pose.w_axis = scaled.extend(1.0);
    }
    let bounds = bounds
        .iter()
        .map(|[near, far]| [near * scale, far * scale])
        .collect();
    (recentered, bounds)
}

fn outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_unpad_roundtrip() {
        let rows: PoseRows = [
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
        ];
        assert_eq!(unpad_pose(&pad_pose(&rows)), rows);
    }

    #[test]
    fn test_pad_homogeneous_row() {
        let rows: PoseRows = [
            [1.0, 0.0, 0.0, 2.0],
            [0.0, 1.0, 0.0, 3.0],
            [0.0, 0.0, 1.0, 4.0],
        ];
        let padded = pad_pose(&rows);
        assert_eq!(padded.row(3), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(position(&padded), Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_view_matrix_orthonormal() {
        let m = view_matrix(
            Vec3::new(0.3, -0.2, 0.9),
            Vec3::Z,
            Vec3::new(1.0, 2.0, 3.0),
            false,
        );
        let r = rotation(&m);
        let rtr = r.transpose() * r;
        for (a, b) in rtr
            .to_cols_array()
            .iter()
            .zip(Mat3::IDENTITY.to_cols_array().iter())
        {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_recenter_moves_average_to_origin() {
        let poses = vec![
            view_matrix(Vec3::new(-1.0, 0.0, 0.2), Vec3::Z, Vec3::new(4.0, 0.0, 1.0), false),
            view_matrix(Vec3::new(0.0, -1.0, 0.2), Vec3::Z, Vec3::new(0.0, 4.0, 1.0), false),
            view_matrix(Vec3::new(1.0, 0.0, 0.2), Vec3::Z, Vec3::new(-4.0, 0.0, 1.0), false),
            view_matrix(Vec3::new(0.0, 1.0, 0.2), Vec3::Z, Vec3::new(0.0, -4.0, 1.0), false),
        ];
        let recentered = recenter_poses(&poses);
        let mean = recentered.iter().map(position).sum::<Vec3>() / 4.0;
        assert!(mean.length() < 1e-4);
    }

    #[test]
    fn test_hemisphere_transform_normalizes_camera_distance() {
        let eyes = [
            Vec3::new(6.0, 0.0, 3.0),
            Vec3::new(-6.0, 0.0, 3.0),
            Vec3::new(0.0, 6.0, 3.0),
            Vec3::new(0.0, -6.0, 3.0),
        ];
        let poses: Vec<Mat4> = eyes
            .iter()
            .map(|&eye| view_matrix(eye, Vec3::Z, eye, false))
            .collect();
        let bounds = vec![[2.0_f32, 6.0]; 4];
        let (recentered, new_bounds) = transform_poses_to_hemisphere(&poses, &bounds);

        let mean_sq = recentered
            .iter()
            .map(|p| position(p).length_squared())
            .sum::<f32>()
            / 4.0;
        assert!((mean_sq.sqrt() - 1.0).abs() < 1e-4);
        // Bounds rescale by the same factor as the positions.
        let scale = new_bounds[0][0] / bounds[0][0];
        assert!((new_bounds[0][1] / bounds[0][1] - scale).abs() < 1e-5);
    }

    #[test]
    fn test_focus_point_of_converging_cameras() {
        // Four cameras whose focal axes all pass through (1, 1, 0).
        let target = Vec3::new(1.0, 1.0, 0.0);
        let eyes = [
            Vec3::new(5.0, 1.0, 2.0),
            Vec3::new(-3.0, 1.0, 2.0),
            Vec3::new(1.0, 6.0, 2.0),
            Vec3::new(1.0, -4.0, 2.0),
        ];
        let poses: Vec<Mat4> = eyes
            .iter()
            .map(|&eye| view_matrix(eye - target, Vec3::Z, eye, false))
            .collect();
        let focus = focus_point(&poses);
        assert!((focus - target).length() < 1e-3);
    }
}
