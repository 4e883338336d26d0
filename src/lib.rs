//! mesh_stats: streaming temporal reductions for mesh time series
//!
//! Computes per-node maximum, minimum and mean of mesh variables over a
//! window of time frames in one forward pass, without holding more than one
//! frame in memory. Variables missing from a dataset are derived per frame
//! from a catalog of equations, and vector couples such as `(U, V)` are
//! reduced by magnitude so both components of a max or min come from the
//! same frame.
//!
//! ## Module Organization
//!
//! - [`frame`]: frames, time windows and variable descriptors
//! - [`variables`]: variable catalog, request classification and derived equations
//! - [`statistics`]: reduction state, engine entry points and output assembly
//! - [`data_source`]: frame source and sink traits with in-memory implementations
//! - [`netcdf_io`]: NetCDF mesh datasets
//! - [`metadata`]: dataset inspection
//! - [`config`]: JSON job and batch configuration
//! - [`pipeline`]: single job execution
//! - [`parallel`]: batch execution on a Rayon pool
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mesh_stats::prelude::*;
//!
//! let source = NetCDFFrameSource::open("run.nc").unwrap();
//! let requested = vec![VariableSpec::new("H", "WATER DEPTH", "M"), VariableSpec::new("M", "SCALAR VELOCITY", "M/S")];
//! let classification = classify(&source.available_variable_ids(), &requested, None).unwrap();
//! let window = TimeWindow::range(10, 20).unwrap();
//!
//! let outcome = reduce(
//!     ReduceOperation::Max,
//!     &classification,
//!     &window,
//!     &source,
//!     &DerivedVariableEvaluator::default(),
//!     &PassControl::new(),
//! )
//! .unwrap();
//! if let Outcome::Completed(result) = outcome {
//!     let output = OutputAssembler::new(Precision::Single)
//!         .assemble(classification.output_order(), &result)
//!         .unwrap();
//!     println!("{} rows x {} nodes", output.nrows(), output.ncols());
//! }
//! ```

pub mod config;
pub mod data_source;
pub mod errors;
pub mod frame;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod pipeline;
pub mod statistics;
pub mod variables;

pub use errors::{MeshStatsError, Result, ValidationError};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{BatchConfig, JobConfig};
    pub use crate::data_source::{FrameSink, FrameSource};
    pub use crate::errors::{MeshStatsError, Result, ValidationError};
    pub use crate::frame::{Frame, TimeWindow, VariableSpec, VariableValues};
    pub use crate::netcdf_io::{NetCDFFrameSink, NetCDFFrameSource};
    pub use crate::parallel::ParallelConfig;
    pub use crate::statistics::{
        reduce, CancelFlag, OutputAssembler, Outcome, PassControl, Precision, ReduceOperation,
    };
    pub use crate::variables::{classify, DerivedVariableEvaluator, FrictionLaw, UserEquation};
}
