//! Calibration metadata parsing
//!
//! Two on-disk formats feed the pipeline: a per-split rig metadata record
//! (`metadata.json` keyed by split name) and the single-scene transforms
//! format (`transforms_<split>.json`). Both are parsed into [`CameraSet`]s;
//! any missing key or ragged column is a data-format error raised before
//! ray derivation starts.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::camera::rig::{Camera, CameraSet};
use crate::core::error::Error;
use crate::core::types::{Mat3, Result, Vec3};
use crate::math::pose::pad_pose;

/// Per-split rig metadata record.
///
/// `lossmult`, `near`, and `far` may be omitted; callers substitute
/// configured defaults.
#[derive(Clone, Debug, Deserialize)]
pub struct RigMetadata {
    pub pix2cam: Vec<[[f32; 3]; 3]>,
    pub cam2world: Vec<Vec<[f32; 4]>>,
    pub width: Vec<usize>,
    pub height: Vec<usize>,
    #[serde(default)]
    pub lossmult: Option<Vec<f32>>,
    #[serde(default)]
    pub near: Option<Vec<f32>>,
    #[serde(default)]
    pub far: Option<Vec<f32>>,
    pub file_path: Vec<String>,
}

impl RigMetadata {
    /// Load the record for one split from a metadata file keyed by split
    /// name.
    pub fn load(path: &Path, split: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let splits: HashMap<String, serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| Error::DataFormat(format!("{}: {e}", path.display())))?;
        let record = splits.get(split).ok_or_else(|| {
            Error::DataFormat(format!("{}: no '{split}' split", path.display()))
        })?;
        serde_json::from_value(record.clone())
            .map_err(|e| Error::DataFormat(format!("{}: {e}", path.display())))
    }

    /// Build the camera set, checking that every column agrees on the
    /// camera count.
    pub fn into_cameras(self, default_near: f32, default_far: f32) -> Result<CameraSet> {
        let n = self.pix2cam.len();
        if n == 0 {
            return Err(Error::DataFormat("metadata declares zero cameras".into()));
        }
        let columns = [
            ("cam2world", self.cam2world.len()),
            ("width", self.width.len()),
            ("height", self.height.len()),
            ("file_path", self.file_path.len()),
            ("lossmult", self.lossmult.as_ref().map_or(n, Vec::len)),
            ("near", self.near.as_ref().map_or(n, Vec::len)),
            ("far", self.far.as_ref().map_or(n, Vec::len)),
        ];
        for (name, len) in columns {
            if len != n {
                return Err(Error::DataFormat(format!(
                    "metadata column '{name}' has {len} entries for {n} cameras"
                )));
            }
        }

        let mut cameras = Vec::with_capacity(n);
        for i in 0..n {
            let rows = &self.cam2world[i];
            if rows.len() < 3 {
                return Err(Error::DataFormat(format!(
                    "cam2world[{i}] has {} rows, expected 3 or 4",
                    rows.len()
                )));
            }
            cameras.push(Camera {
                pix2cam: mat3_from_rows(&self.pix2cam[i]),
                cam2world: pad_pose(&[rows[0], rows[1], rows[2]]),
                width: self.width[i],
                height: self.height[i],
                lossmult: self.lossmult.as_ref().map_or(1.0, |v| v[i]),
                near: self.near.as_ref().map_or(default_near, |v| v[i]),
                far: self.far.as_ref().map_or(default_far, |v| v[i]),
            });
        }
        Ok(CameraSet::new(cameras))
    }

    /// Relative image paths, in camera order.
    pub fn file_paths(&self) -> &[String] {
        &self.file_path
    }
}

/// Single-scene transforms file: one shared field of view plus a pose and
/// image path per frame.
#[derive(Clone, Debug, Deserialize)]
pub struct SceneTransforms {
    pub camera_angle_x: f32,
    pub frames: Vec<SceneFrame>,
}

/// One frame entry of a transforms file.
#[derive(Clone, Debug, Deserialize)]
pub struct SceneFrame {
    pub file_path: String,
    pub transform_matrix: Vec<[f32; 4]>,
}

impl SceneTransforms {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::DataFormat(format!("{}: {e}", path.display())))
    }

    /// Focal length in pixels for an image of the given width.
    pub fn focal(&self, width: usize) -> f32 {
        0.5 * width as f32 / (0.5 * self.camera_angle_x).tan()
    }
}

fn mat3_from_rows(rows: &[[f32; 3]; 3]) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(rows[0][0], rows[1][0], rows[2][0]),
        Vec3::new(rows[0][1], rows[1][1], rows[2][1]),
        Vec3::new(rows[0][2], rows[1][2], rows[2][2]),
    )
}
