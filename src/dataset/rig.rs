//! Multi-camera rig loaders
//!
//! The static rig reads one image per camera from disk; the time-varying
//! rig pulls frames from a decode collaborator instead. Both share the
//! metadata record format and tolerate per-camera resolutions.

use log::info;

use crate::camera::meta::RigMetadata;
use crate::core::config::DatasetConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::dataset::views::LoadedViews;
use crate::io::frames::{ColorImage, FrameSource, load_frame};

/// Load a static rig: metadata record plus one image file per camera.
pub fn load_rig(split_name: &str, config: &DatasetConfig) -> Result<LoadedViews> {
    let meta = RigMetadata::load(&config.data_dir.join("metadata.json"), split_name)?;
    let file_paths = meta.file_paths().to_vec();
    let cameras = meta.into_cameras(config.near, config.far)?;

    let mut images = Vec::with_capacity(cameras.len());
    for (i, rel) in file_paths.iter().enumerate() {
        let decoded = load_frame(&config.data_dir.join(rel))?;
        let image = decoded.composite(config.white_background);
        check_resolution(&image, cameras[i].width, cameras[i].height, rel)?;
        images.push(image);
    }
    info!("loaded rig with {} cameras", cameras.len());

    Ok(LoadedViews {
        cameras,
        images,
        disps: None,
        normals: None,
        masks: None,
    })
}

/// Load one frame of a time-varying rig through the decode collaborator.
///
/// Training uses the first frame of the configured range; evaluation uses
/// `render_frame`. The range itself is validated against the source so a
/// bad frame window fails here rather than mid-training.
pub fn load_video_rig(
    split_name: &str,
    config: &DatasetConfig,
    source: &dyn FrameSource,
) -> Result<LoadedViews> {
    let meta = RigMetadata::load(&config.data_dir.join("meta.json"), split_name)?;
    let cameras = meta.into_cameras(config.near, config.far)?;

    let available = source.num_frames()?;
    if config.end_frame > available {
        return Err(Error::DataFormat(format!(
            "frame range {}..{} exceeds {available} available frames",
            config.start_frame, config.end_frame
        )));
    }
    let frame_idx = if split_name == "train" {
        config.start_frame
    } else {
        config.render_frame
    };
    if !(config.start_frame..config.end_frame).contains(&frame_idx) {
        return Err(Error::Config(format!(
            "frame {frame_idx} outside configured range {}..{}",
            config.start_frame, config.end_frame
        )));
    }

    let mut images = Vec::with_capacity(cameras.len());
    for cam_idx in 0..cameras.len() {
        let decoded = source.frame(cam_idx, frame_idx)?;
        let image = decoded.composite(config.white_background);
        check_resolution(
            &image,
            cameras[cam_idx].width,
            cameras[cam_idx].height,
            &format!("camera {cam_idx} frame {frame_idx}"),
        )?;
        images.push(image);
    }
    info!(
        "loaded video rig frame {frame_idx} from {} cameras ({available} frames available)",
        cameras.len()
    );

    Ok(LoadedViews {
        cameras,
        images,
        disps: None,
        normals: None,
        masks: None,
    })
}

fn check_resolution(
    image: &ColorImage,
    width: usize,
    height: usize,
    label: &str,
) -> Result<()> {
    if image.width != width || image.height != height {
        return Err(Error::DataFormat(format!(
            "{label}: image is {}x{} but metadata declares {width}x{height}",
            image.width, image.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec4;
    use crate::io::frames::DecodedFrame;
    use tempfile::TempDir;

    fn rig_meta_json(widths: &[usize]) -> String {
        let pix2cam: Vec<String> = widths
            .iter()
            .map(|_| "[[0.25,0,-0.5],[0,-0.25,0.5],[0,0,-1]]".to_string())
            .collect();
        let cam2world: Vec<String> = widths
            .iter()
            .map(|_| "[[1,0,0,0],[0,1,0,0],[0,0,1,4]]".to_string())
            .collect();
        let file_path: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, _)| format!("\"cam_{i}.png\""))
            .collect();
        format!(
            r#"{{"train": {{
                "pix2cam": [{}],
                "cam2world": [{}],
                "width": [{}],
                "height": [{}],
                "file_path": [{}]
            }}}}"#,
            pix2cam.join(","),
            cam2world.join(","),
            widths.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            widths.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            file_path.join(",")
        )
    }

    #[test]
    fn test_load_static_rig() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("metadata.json"), rig_meta_json(&[4, 4])).unwrap();
        for i in 0..2 {
            image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 255, 0, 255]))
                .save(dir.path().join(format!("cam_{i}.png")))
                .unwrap();
        }
        let config = DatasetConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let views = load_rig("train", &config).unwrap();
        assert_eq!(views.cameras.len(), 2);
        assert_eq!(views.images.len(), 2);
    }

    #[test]
    fn test_resolution_mismatch_is_data_format_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("metadata.json"), rig_meta_json(&[8])).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 255, 0, 255]))
            .save(dir.path().join("cam_0.png"))
            .unwrap();
        let config = DatasetConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            load_rig("train", &config),
            Err(Error::DataFormat(_))
        ));
    }

    struct SolidFrames {
        frames: usize,
        size: usize,
    }

    impl FrameSource for SolidFrames {
        fn num_frames(&self) -> Result<usize> {
            Ok(self.frames)
        }

        fn frame(&self, camera: usize, frame: usize) -> Result<DecodedFrame> {
            let value = (camera + frame) as f32 / 10.0;
            Ok(DecodedFrame {
                width: self.size,
                height: self.size,
                pixels: vec![Vec4::new(value, value, value, 1.0); self.size * self.size],
            })
        }
    }

    #[test]
    fn test_video_rig_uses_start_frame_for_training() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("meta.json"), rig_meta_json(&[4, 4])).unwrap();
        let config = DatasetConfig {
            data_dir: dir.path().to_path_buf(),
            start_frame: 2,
            end_frame: 5,
            ..Default::default()
        };
        let source = SolidFrames { frames: 8, size: 4 };
        let views = load_video_rig("train", &config, &source).unwrap();
        // Camera 0 at frame 2 decodes to value 0.2.
        assert!((views.images[0].pixels[0].x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_video_rig_range_validation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("meta.json"), rig_meta_json(&[4])).unwrap();
        let config = DatasetConfig {
            data_dir: dir.path().to_path_buf(),
            start_frame: 0,
            end_frame: 20,
            ..Default::default()
        };
        let source = SolidFrames { frames: 8, size: 4 };
        assert!(matches!(
            load_video_rig("train", &config, &source),
            Err(Error::DataFormat(_))
        ));
    }
}
