//! Centralized error handling for mesh_stats
//!
//! Every fallible operation in the crate returns [`Result`]. Failures raised
//! before the first frame is read are grouped under [`ValidationError`] so a
//! caller can tell "the request was wrong" from "the data went bad mid-pass".

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mesh_stats operations
#[derive(Error, Debug)]
pub enum MeshStatsError {
    /// The request was rejected before any frame was processed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No equation in the catalog produces this variable
    #[error("unknown equation '{0}'")]
    UnknownEquation(String),

    /// An equation input is absent from the frame being evaluated
    #[error("equation '{equation}' requires variable '{variable}' which is missing from the frame")]
    MissingBaseVariable { equation: String, variable: String },

    /// Source I/O failure or corrupt frame mid-pass
    #[error("failed to read frame {index}: {message}")]
    FrameRead { index: usize, message: String },

    /// Finalization requested with zero frames folded
    #[error("cannot finalize a reduction over an empty window")]
    EmptyWindow,

    /// Assembly asked for a variable no reduction or equation produced
    #[error("no values computed for output variable '{0}'")]
    MissingResult(String),

    /// Output sink failure
    #[error("failed to write output: {0}")]
    FrameWrite(String),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// Malformed job configuration
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Thread pool configuration error
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

/// Reasons a request is refused up front
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no output variable requested")]
    EmptyRequest,

    #[error("variable '{0}' is neither in the dataset nor derivable from it")]
    UnknownVariable(String),

    #[error("unknown equation '{0}'")]
    UnknownEquation(String),

    #[error("variable '{variable}' needed to compute '{required_by}' is not available")]
    MissingBaseVariable {
        variable: String,
        required_by: String,
    },

    #[error("'{0}' needs a friction law; none was supplied")]
    FrictionLawRequired(String),

    #[error("friction law '{law}' needs a coefficient: the dataset has no 'W' variable and none was supplied")]
    MissingFrictionCoefficient { law: String },

    #[error("coefficient '{name}' must be finite and strictly positive, got {value}")]
    InvalidCoefficient { name: String, value: f64 },

    #[error("time window is empty")]
    EmptyWindow,

    #[error("time window indices must be strictly increasing ({previous} then {next})")]
    WindowNotIncreasing { previous: usize, next: usize },

    #[error("time index {index} is out of range for a dataset with {frame_count} frames")]
    IndexOutOfRange { index: usize, frame_count: usize },

    #[error("output file {0} would overwrite the input file")]
    OutputCollidesWithInput(PathBuf),

    #[error("output file {0} is written by more than one job")]
    DuplicateOutput(PathBuf),
}

impl MeshStatsError {
    /// Build a frame read error from anything printable
    pub fn frame_read(index: usize, message: impl ToString) -> Self {
        Self::FrameRead {
            index,
            message: message.to_string(),
        }
    }

    /// Whether the failure happened before any frame was touched
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for mesh_stats operations
pub type Result<T> = std::result::Result<T, MeshStatsError>;
