//! Image containers and frame decoding

pub mod frames;

pub use frames::{ColorImage, DecodedFrame, FrameSource, ImageSequenceSource, ScalarImage};
