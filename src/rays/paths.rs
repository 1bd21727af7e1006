//! Camera path and random pose generation
//!
//! Evaluation-time trajectory generators (spiral, hemispherical orbit)
//! and the random pose samplers feeding the unobserved-view ray sets.

use rand::Rng;

use crate::core::types::{Mat4, Vec3, Vec4};
use crate::math::pose::{pad_pose, poses_avg, position, view_matrix};

/// Radius used when sampling poses on a sphere around a synthetic scene;
/// matches the average camera distance of the common synthetic captures.
pub const SPHERE_POSE_RADIUS: f32 = 4.031_128_9;

/// Forward-facing spiral path through the scene.
pub fn spiral_path(
    poses: &[Mat4],
    bounds: &[[f32; 2]],
    n_frames: usize,
    n_rots: usize,
    zrate: f32,
) -> Vec<Mat4> {
    let focal = focus_depth(bounds);
    let radii = percentile_abs_positions(poses, 0.9).extend(1.0);

    let cam2world = poses_avg(poses);
    let up = mean_up(poses);

    let mut out = Vec::with_capacity(n_frames);
    for i in 0..n_frames {
        let theta = 2.0 * std::f32::consts::PI * n_rots as f32 * i as f32 / n_frames as f32;
        let t = radii * Vec4::new(theta.cos(), -theta.sin(), -(theta * zrate).sin(), 1.0);
        let pos = (cam2world * t).truncate();
        let lookat = (cam2world * Vec4::new(0.0, 0.0, -focal, 1.0)).truncate();
        out.push(view_matrix(pos - lookat, up, pos, false));
    }
    out
}

/// Orbit around the world z-axis at the average camera elevation.
pub fn hemisphere_orbit(poses: &[Mat4], n_frames: usize) -> Vec<Mat4> {
    let n = poses.len() as f32;
    let radius = (poses
        .iter()
        .map(|p| position(p).length_squared())
        .sum::<f32>()
        / n)
        .sqrt();
    let sin_phi = poses.iter().map(|p| position(p).z).sum::<f32>() / n / radius;
    let cos_phi = (1.0 - sin_phi * sin_phi).sqrt();

    let mut out = Vec::with_capacity(n_frames);
    for i in 0..n_frames {
        let theta = 2.0 * std::f32::consts::PI * i as f32 / n_frames as f32;
        let origin = radius * Vec3::new(cos_phi * theta.cos(), cos_phi * theta.sin(), sin_phi);
        out.push(view_matrix(origin, Vec3::Z, origin, false));
    }
    out
}

/// Poses with origins sampled uniformly on a sphere, looking at the world
/// origin. `only_upper` restricts origins to the upper hemisphere.
pub fn sphere_poses(
    n_poses: usize,
    radius: f32,
    only_upper: bool,
    rng: &mut impl Rng,
) -> Vec<Mat4> {
    (0..n_poses)
        .map(|_| {
            let mut p = Vec3::new(randn(rng), randn(rng), randn(rng));
            if only_upper {
                p.z = p.z.abs();
            }
            let eye = p.normalize() * radius;
            look_at_origin(eye)
        })
        .collect()
}

/// Poses sampled uniformly inside the bounding box of the input camera
/// positions, looking toward the rig's shared focus depth.
pub fn box_poses(
    poses: &[Mat4],
    bounds: &[[f32; 2]],
    n_poses: usize,
    rng: &mut impl Rng,
) -> Vec<Mat4> {
    let focal = focus_depth(bounds);
    let radii = percentile_abs_positions(poses, 1.0);

    let cam2world = poses_avg(poses);
    let up = mean_up(poses);
    let lookat = (cam2world * Vec4::new(0.0, 0.0, -focal, 1.0)).truncate();

    (0..n_poses)
        .map(|_| {
            let offset = radii
                * Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                );
            let pos = (cam2world * offset.extend(1.0)).truncate();
            view_matrix(pos - lookat, up, pos, false)
        })
        .collect()
}

/// Reasonable focus depth: disparity-space weighted average of the scene
/// bounds.
fn focus_depth(bounds: &[[f32; 2]]) -> f32 {
    let close = bounds.iter().map(|b| b[0]).fold(f32::INFINITY, f32::min) * 0.9;
    let inf = bounds.iter().map(|b| b[1]).fold(0.0_f32, f32::max) * 5.0;
    let dt = 0.75;
    1.0 / ((1.0 - dt) / close + dt / inf)
}

fn mean_up(poses: &[Mat4]) -> Vec3 {
    poses.iter().map(|p| p.y_axis.truncate()).sum::<Vec3>() / poses.len() as f32
}

/// Per-axis percentile of |position| over the input poses, numpy-style
/// linear interpolation.
fn percentile_abs_positions(poses: &[Mat4], q: f32) -> Vec3 {
    let mut out = Vec3::ZERO;
    for axis in 0..3 {
        let mut values: Vec<f32> = poses.iter().map(|p| position(p)[axis].abs()).collect();
        values.sort_by(f32::total_cmp);
        let rank = q * (values.len() - 1) as f32;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f32;
        out[axis] = values[lo] * (1.0 - frac) + values[hi] * frac;
    }
    out
}

fn look_at_origin(eye: Vec3) -> Mat4 {
    let forward = (-eye).normalize();
    let side = forward.cross(Vec3::Z).normalize();
    let up = side.cross(forward).normalize();
    pad_pose(&[
        [side.x, up.x, -forward.x, eye.x],
        [side.y, up.y, -forward.y, eye.y],
        [side.z, up.z, -forward.z, eye.z],
    ])
}

/// Standard normal sample via Box-Muller.
fn randn(rng: &mut impl Rng) -> f32 {
    let u1 = rng.gen_range(1e-7_f32..1.0);
    let u2 = rng.gen_range(0.0_f32..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}
