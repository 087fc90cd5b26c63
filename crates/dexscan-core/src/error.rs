//! Error types for dexscan.
//!
//! Only `ScannerUnavailable` is fatal to a scan. Everything else is caught at
//! the per-package boundary and folded into that package's result.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The model could not be loaded; no scan can run.
    #[error("scanner unavailable: failed to load model {}: {reason}", .path.display())]
    ScannerUnavailable { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// The tensor handed to the model does not have the length it expects.
    #[error("tensor has {actual} values, model expects {expected}")]
    TensorShape { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
