//! Error types for the data pipeline

use thiserror::Error;

/// Main error type for the pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Unsupported or inconsistent configuration, fatal at construction
    #[error("configuration error: {0}")]
    Config(String),

    /// Metadata that cannot be reconciled with the declared camera count,
    /// or records missing required keys
    #[error("data format error: {0}")]
    DataFormat(String),

    /// Operation not implemented for the active split or variant
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}
