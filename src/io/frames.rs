//! Frame decoding and float image containers
//!
//! Decoders hand the pipeline float images normalized to [0,1]. Alpha
//! compositing against a white background happens here, after decode, so
//! the rest of the pipeline only ever sees three channels.

use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::types::{Result, Vec3, Vec4};

/// Row-major RGB image with float pixels in [0,1].
#[derive(Clone, Debug)]
pub struct ColorImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vec3>,
}

/// Row-major single-channel float image.
#[derive(Clone, Debug)]
pub struct ScalarImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f32>,
}

/// A decoded frame before compositing; alpha is 1 where the source had no
/// alpha channel.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vec4>,
}

impl ColorImage {
    pub fn resolution(&self) -> usize {
        self.width * self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Vec3 {
        self.pixels[y * self.width + x]
    }

    /// Area resample to an arbitrary resolution.
    pub fn resize_area(&self, out_width: usize, out_height: usize) -> ColorImage {
        ColorImage {
            width: out_width,
            height: out_height,
            pixels: resize_area_impl(
                &self.pixels,
                self.width,
                self.height,
                out_width,
                out_height,
                Vec3::ZERO,
            ),
        }
    }

    /// Area downsample by an integer factor. Dimensions that would fall
    /// below `min_size` are clamped to it.
    pub fn downsample(&self, factor: usize, min_size: usize) -> ColorImage {
        let out_w = (self.width / factor).max(min_size);
        let out_h = (self.height / factor).max(min_size);
        self.resize_area(out_w, out_h)
    }
}

impl ScalarImage {
    pub fn resolution(&self) -> usize {
        self.width * self.height
    }

    pub fn resize_area(&self, out_width: usize, out_height: usize) -> ScalarImage {
        ScalarImage {
            width: out_width,
            height: out_height,
            pixels: resize_area_impl(
                &self.pixels,
                self.width,
                self.height,
                out_width,
                out_height,
                0.0,
            ),
        }
    }

    pub fn downsample(&self, factor: usize, min_size: usize) -> ScalarImage {
        let out_w = (self.width / factor).max(min_size);
        let out_h = (self.height / factor).max(min_size);
        self.resize_area(out_w, out_h)
    }
}

impl DecodedFrame {
    /// Drop alpha, optionally compositing `rgb * a + (1 - a)` over white.
    pub fn composite(&self, white_background: bool) -> ColorImage {
        let pixels = self
            .pixels
            .iter()
            .map(|p| {
                let rgb = p.truncate();
                if white_background {
                    rgb * p.w + (1.0 - p.w)
                } else {
                    rgb
                }
            })
            .collect();
        ColorImage {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

/// Decode an image file to normalized RGBA floats.
pub fn load_frame(path: &Path) -> Result<DecodedFrame> {
    let decoded = image::open(path)?.to_rgba32f();
    let (width, height) = decoded.dimensions();
    let pixels = decoded
        .pixels()
        .map(|p| Vec4::new(p.0[0], p.0[1], p.0[2], p.0[3]))
        .collect();
    Ok(DecodedFrame {
        width: width as usize,
        height: height as usize,
        pixels,
    })
}

/// Decode a single-channel float image (disparity maps and masks).
pub fn load_scalar(path: &Path) -> Result<ScalarImage> {
    let decoded = image::open(path)?.to_luma32f();
    let (width, height) = decoded.dimensions();
    Ok(ScalarImage {
        width: width as usize,
        height: height as usize,
        pixels: decoded.pixels().map(|p| p.0[0]).collect(),
    })
}

/// Decode collaborator for time-varying rigs: yields one frame per
/// (camera, frame index) pair.
pub trait FrameSource: Send + Sync {
    /// Number of frames available per camera.
    fn num_frames(&self) -> Result<usize>;

    /// Decode one frame of one camera.
    fn frame(&self, camera: usize, frame: usize) -> Result<DecodedFrame>;
}

/// Frame source reading pre-extracted frames from
/// `<root>/cam_<n>/<frame:05>.png`, cameras numbered from 1.
pub struct ImageSequenceSource {
    root: PathBuf,
}

impl ImageSequenceSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn frame_path(&self, camera: usize, frame: usize) -> PathBuf {
        self.root
            .join(format!("cam_{}", camera + 1))
            .join(format!("{frame:05}.png"))
    }
}

impl FrameSource for ImageSequenceSource {
    fn num_frames(&self) -> Result<usize> {
        let dir = self.root.join("cam_1");
        let mut count = 0;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "png") {
                count += 1;
            }
        }
        if count == 0 {
            return Err(Error::DataFormat(format!(
                "no frames under {}",
                dir.display()
            )));
        }
        Ok(count)
    }

    fn frame(&self, camera: usize, frame: usize) -> Result<DecodedFrame> {
        load_frame(&self.frame_path(camera, frame))
    }
}

fn resize_area_impl<T>(
    src: &[T],
    width: usize,
    height: usize,
    out_width: usize,
    out_height: usize,
    zero: T,
) -> Vec<T>
where
    T: Copy + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
{
    let sx = width as f32 / out_width as f32;
    let sy = height as f32 / out_height as f32;
    let mut out = Vec::with_capacity(out_width * out_height);
    for oy in 0..out_height {
        let y0 = oy as f32 * sy;
        let y1 = y0 + sy;
        for ox in 0..out_width {
            let x0 = ox as f32 * sx;
            let x1 = x0 + sx;
            let mut acc = zero;
            let mut weight = 0.0;
            for iy in y0.floor() as usize..(y1.ceil() as usize).min(height) {
                let wy = overlap(iy as f32, y0, y1);
                for ix in x0.floor() as usize..(x1.ceil() as usize).min(width) {
                    let w = wy * overlap(ix as f32, x0, x1);
                    acc = acc + src[iy * width + ix] * w;
                    weight += w;
                }
            }
            out.push(acc * (1.0 / weight));
        }
    }
    out
}

/// Coverage of the unit pixel starting at `p` by the interval [a, b).
fn overlap(p: f32, a: f32, b: f32) -> f32 {
    (b.min(p + 1.0) - a.max(p)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: usize) -> ColorImage {
        let pixels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if (x + y) % 2 == 0 {
                    Vec3::ONE
                } else {
                    Vec3::ZERO
                }
            })
            .collect();
        ColorImage {
            width: size,
            height: size,
            pixels,
        }
    }

    #[test]
    fn test_composite_over_white() {
        let frame = DecodedFrame {
            width: 1,
            height: 1,
            pixels: vec![Vec4::new(1.0, 0.0, 0.0, 0.5)],
        };
        let composited = frame.composite(true);
        assert!((composited.pixels[0] - Vec3::new(1.0, 0.5, 0.5)).length() < 1e-6);

        let plain = frame.composite(false);
        assert!((plain.pixels[0] - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_downsample_box_average() {
        let img = checkerboard(4);
        let half = img.downsample(2, 1);
        assert_eq!((half.width, half.height), (2, 2));
        // Every 2x2 block of the checkerboard averages to 0.5.
        for p in &half.pixels {
            assert!((p.x - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_downsample_clamps_to_min_size() {
        let img = checkerboard(8);
        let small = img.downsample(4, 4);
        assert_eq!((small.width, small.height), (4, 4));
    }

    #[test]
    fn test_resize_area_preserves_mean() {
        let img = checkerboard(6);
        let resized = img.resize_area(4, 4);
        let mean: Vec3 =
            resized.pixels.iter().copied().sum::<Vec3>() / resized.pixels.len() as f32;
        assert!((mean.x - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_sequence_source_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let cam_dir = dir.path().join("cam_1");
        std::fs::create_dir_all(&cam_dir).unwrap();
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        img.save(cam_dir.join("00000.png")).unwrap();

        let source = ImageSequenceSource::new(dir.path().to_path_buf());
        assert_eq!(source.num_frames().unwrap(), 1);
        let frame = source.frame(0, 0).unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        assert!((frame.pixels[0].x - 1.0).abs() < 1e-6);
        assert!(frame.pixels[0].y.abs() < 1e-6);
    }
}
