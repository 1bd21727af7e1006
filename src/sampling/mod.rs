//! Batch assembly: pixel sampling, patches, and bound annealing

pub mod batch;
pub mod patch;
pub mod anneal;

pub use anneal::AnnealSchedule;
pub use batch::{Batch, BatchSampler};
