//! Mathematical utilities for pose and ray geometry

pub mod pose;

pub use pose::{pad_pose, unpad_pose};
