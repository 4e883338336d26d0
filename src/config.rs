//! Job configuration
//!
//! A job is one input dataset, one output file, a variable request and an
//! optional reduction. Batches of jobs are read from JSON:
//!
//! ```json
//! {
//!   "threads": 4,
//!   "jobs": [
//!     { "input": "run.nc", "output": "run_max.nc", "operation": "max",
//!       "variables": ["H", "U", "V"], "start": 10, "end": 20 }
//!   ]
//! }
//! ```

use crate::errors::{Result, ValidationError};
use crate::frame::TimeWindow;
use crate::statistics::{Precision, ReduceOperation};
use crate::variables::UserEquation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One reduction or derivation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Reduction to apply; without one every window frame is written out
    #[serde(default)]
    pub operation: Option<ReduceOperation>,
    pub variables: Vec<String>,
    /// First frame, inclusive
    #[serde(default)]
    pub start: Option<usize>,
    /// Last frame, exclusive; defaults to the end of the dataset
    #[serde(default)]
    pub end: Option<usize>,
    /// Explicit frame indices, overriding `start`/`end`
    #[serde(default)]
    pub frames: Option<Vec<usize>>,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default)]
    pub friction: Option<UserEquation>,
}

impl JobConfig {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, variables: Vec<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            operation: None,
            variables,
            start: None,
            end: None,
            frames: None,
            precision: Precision::default(),
            friction: None,
        }
    }

    /// Resolve the frame window against a dataset of `frame_count` frames
    ///
    /// # Errors
    ///
    /// Fails if the window is empty, unordered or reaches past the dataset.
    pub fn window(&self, frame_count: usize) -> std::result::Result<TimeWindow, ValidationError> {
        let window = match &self.frames {
            Some(frames) => TimeWindow::new(frames.clone())?,
            None => TimeWindow::range(self.start.unwrap_or(0), self.end.unwrap_or(frame_count))?,
        };
        window.validate(frame_count)?;
        Ok(window)
    }
}

/// A set of jobs run together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads; all cores when unset
    #[serde(default)]
    pub threads: Option<usize>,
    pub jobs: Vec<JobConfig>,
}

impl BatchConfig {
    /// # Errors
    ///
    /// Returns [`crate::MeshStatsError::Config`] on malformed JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// # Errors
    ///
    /// Fails if the file cannot be read or is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
