//! Streaming reductions over mesh frames
//!
//! - [`operations`]: the reduction operators and their comparison rules
//! - [`reducer`]: running per-node state folded once per frame
//! - [`engine`]: single-pass entry points with progress and cancellation
//! - [`assembler`]: stacking results into the written output array

pub mod assembler;
pub mod engine;
pub mod operations;
pub mod reducer;

pub use assembler::{OutputArray, OutputAssembler, Precision};
pub use engine::{
    derive_frames, reduce, reduce_async, CancelFlag, Outcome, PassControl, ProgressObserver,
};
pub use operations::ReduceOperation;
pub use reducer::{ReductionResult, ReductionState};
