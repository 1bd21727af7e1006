//! Single-scene loader
//!
//! Reads a transforms JSON file (one shared horizontal field of view, one
//! pose and image per frame) plus optional disparity/normal/mask side
//! channels stored next to each image.

use std::path::Path;

use log::info;

use crate::camera::meta::SceneTransforms;
use crate::camera::rig::{Camera, CameraSet};
use crate::core::config::DatasetConfig;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::dataset::views::LoadedViews;
use crate::io::frames::{ColorImage, load_frame, load_scalar};
use crate::math::pose::pad_pose;

/// Load every view of one split.
///
/// For the training split, `n_input_views` truncates the view list; the
/// remaining machinery never sees the dropped views.
pub fn load_scene(split_name: &str, config: &DatasetConfig) -> Result<LoadedViews> {
    let path = config
        .data_dir
        .join(format!("transforms_{split_name}.json"));
    let transforms = SceneTransforms::load(&path)?;

    let mut frames: Vec<_> = transforms.frames.iter().collect();
    if split_name == "train" && config.n_input_views > 0 {
        frames.truncate(config.n_input_views);
    }
    if frames.is_empty() {
        return Err(Error::DataFormat(format!(
            "{}: no frames for split '{split_name}'",
            path.display()
        )));
    }

    let mut images = Vec::with_capacity(frames.len());
    let mut poses = Vec::with_capacity(frames.len());
    let mut disps = config.compute_disp_metrics.then(Vec::new);
    let mut normals = config.compute_normal_metrics.then(Vec::new);
    let mut masks = (config.load_masks && split_name != "train").then(Vec::new);

    for frame in &frames {
        let prefix = config.data_dir.join(&frame.file_path);
        let decoded = load_frame(&with_suffix(&prefix, ".png"))?;
        images.push(decoded.composite(config.white_background));

        if let Some(out) = disps.as_mut() {
            out.push(load_scalar(&with_suffix(&prefix, "_disp.tiff"))?);
        }
        if let Some(out) = normals.as_mut() {
            let raw = load_frame(&with_suffix(&prefix, "_normal.png"))?.composite(false);
            out.push(decode_normals(raw));
        }
        if let Some(out) = masks.as_mut() {
            out.push(load_scalar(&with_suffix(&prefix, "_mask.png"))?);
        }

        if frame.transform_matrix.len() < 3 {
            return Err(Error::DataFormat(format!(
                "{}: transform_matrix needs at least 3 rows",
                frame.file_path
            )));
        }
        poses.push(pad_pose(&[
            frame.transform_matrix[0],
            frame.transform_matrix[1],
            frame.transform_matrix[2],
        ]));
    }

    let (width, height) = (images[0].width, images[0].height);
    let focal = transforms.focal(width);
    info!(
        "loaded {} views at {width}x{height}, focal {focal:.1}",
        images.len()
    );

    let cameras = CameraSet::new(
        poses
            .into_iter()
            .map(|pose| Camera::pinhole(focal, width, height, pose, config.near, config.far))
            .collect(),
    );
    Ok(LoadedViews {
        cameras,
        images,
        disps,
        normals,
        masks,
    })
}

/// Normal maps are stored as colors; recover signed components.
fn decode_normals(image: ColorImage) -> ColorImage {
    ColorImage {
        width: image.width,
        height: image.height,
        pixels: image
            .pixels
            .into_iter()
            .map(|p| p * 2.0 - Vec3::ONE)
            .collect(),
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> std::path::PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(suffix);
    std::path::PathBuf::from(s)
}
