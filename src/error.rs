//! Error types for the index pipeline.
//!
//! [`GridError`] covers everything that can go wrong while reading one
//! timestep and is recoverable: the timestep is skipped and the run goes on.
//! [`RunError`] covers the preconditions and terminal conditions that abort
//! a run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for raster access and flattening.
pub type GridResult<T> = Result<T, GridError>;

/// Per-timestep failures.
#[derive(Error, Debug)]
pub enum GridError {
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("missing variable '{0}'")]
    MissingVariable(String),

    /// Variable rank or index does not fit the requested selection.
    #[error("unexpected shape for '{variable}': {detail}")]
    Shape { variable: String, detail: String },

    #[error("shape mismatch: {left} is {left_shape:?}, {right} is {right_shape:?}")]
    ShapeMismatch {
        left: String,
        left_shape: (usize, usize),
        right: String,
        right_shape: (usize, usize),
    },

    #[error("file name '{0}' does not follow <model>_<base>_<valid>_<region>.nc")]
    FileName(String),

    #[error("netCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

/// Fatal conditions for a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("file not found: {0}")]
    MissingFile(PathBuf),

    #[error("unknown model '{0}' (expected klaps or rdaps)")]
    UnknownModel(String),

    #[error("no common grid files in {0} and {1}")]
    NoCommonFiles(PathBuf, PathBuf),

    #[error("no timestep produced data ({skipped} skipped)")]
    NoData { skipped: usize },
}
