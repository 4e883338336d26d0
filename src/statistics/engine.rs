//! Reduction and derivation passes over a time window
//!
//! Each entry point makes a single forward pass: frames are requested in
//! window order, derived variables are evaluated, the frame is folded or
//! written, then dropped. Cancellation is checked between frames.

use super::assembler::OutputAssembler;
use super::operations::ReduceOperation;
use super::reducer::{ReductionResult, ReductionState};
use crate::data_source::{frame_stream, AsyncFrameSource, FrameSink, FrameSource};
use crate::errors::Result;
use crate::frame::TimeWindow;
use crate::variables::{Classification, DerivedVariableEvaluator};
use futures::{pin_mut, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of a pass that may be cancelled
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    /// Aborted between frames; nothing was finalized
    Cancelled { frames_processed: usize },
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Shared cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives the completed fraction of a pass after each frame
pub trait ProgressObserver {
    fn on_progress(&self, fraction: f64);
}

impl<F> ProgressObserver for F
where
    F: Fn(f64),
{
    fn on_progress(&self, fraction: f64) {
        self(fraction);
    }
}

/// Optional progress and cancellation hooks for a pass
#[derive(Default)]
pub struct PassControl<'a> {
    progress: Option<&'a dyn ProgressObserver>,
    cancel: Option<CancelFlag>,
}

impl<'a> PassControl<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_progress(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    #[allow(clippy::cast_precision_loss)]
    fn report(&self, done: usize, total: usize) {
        if let Some(observer) = self.progress {
            observer.on_progress(done as f64 / total as f64);
        }
    }
}

/// Reduce the classified variables of `source` over `window`
///
/// # Errors
///
/// Fails with a validation error if the window does not fit the dataset,
/// with [`crate::MeshStatsError::FrameRead`] if a frame cannot be read, or
/// with an evaluation error from a derived variable. No partial result is
/// returned on failure.
pub fn reduce<S>(
    operation: ReduceOperation,
    classification: &Classification,
    window: &TimeWindow,
    source: &S,
    evaluator: &DerivedVariableEvaluator,
    control: &PassControl<'_>,
) -> Result<Outcome<ReductionResult>>
where
    S: FrameSource + ?Sized,
{
    window.validate(source.frame_count())?;

    let mut state = ReductionState::new(operation, classification);
    let total = window.len();
    for (position, &index) in window.indices().iter().enumerate() {
        if control.is_cancelled() {
            return Ok(Outcome::Cancelled {
                frames_processed: position,
            });
        }
        let frame = source.read_frame(index, classification.base_variables())?;
        let derived = evaluator.evaluate_all(&classification.equations, &frame)?;
        state.fold(index, &derived)?;
        control.report(position + 1, total);
    }

    state.finish().map(Outcome::Completed)
}

/// Asynchronous counterpart of [`reduce`]; frames are awaited in window order
///
/// # Errors
///
/// Same failure modes as [`reduce`].
pub async fn reduce_async<S>(
    operation: ReduceOperation,
    classification: &Classification,
    window: &TimeWindow,
    source: &S,
    evaluator: &DerivedVariableEvaluator,
    control: &PassControl<'_>,
) -> Result<Outcome<ReductionResult>>
where
    S: AsyncFrameSource + ?Sized,
{
    window.validate(source.frame_count())?;

    let mut state = ReductionState::new(operation, classification);
    let total = window.len();
    let frames = frame_stream(source, window, classification.base_variables());
    pin_mut!(frames);

    let mut position = 0;
    while position < total {
        if control.is_cancelled() {
            return Ok(Outcome::Cancelled {
                frames_processed: position,
            });
        }
        let Some(item) = frames.next().await else {
            break;
        };
        let (index, frame) = item?;
        let derived = evaluator.evaluate_all(&classification.equations, &frame)?;
        state.fold(index, &derived)?;
        position += 1;
        control.report(position, total);
    }

    state.finish().map(Outcome::Completed)
}

/// Write every frame of `window` with its derived variables, without reduction
///
/// The sink header must already be written. Returns the number of frames
/// written.
///
/// # Errors
///
/// Same failure modes as [`reduce`], plus sink write failures.
pub fn derive_frames<S, K>(
    classification: &Classification,
    window: &TimeWindow,
    source: &S,
    sink: &mut K,
    evaluator: &DerivedVariableEvaluator,
    assembler: &OutputAssembler,
    control: &PassControl<'_>,
) -> Result<Outcome<usize>>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    window.validate(source.frame_count())?;

    let total = window.len();
    for (position, &index) in window.indices().iter().enumerate() {
        if control.is_cancelled() {
            return Ok(Outcome::Cancelled {
                frames_processed: position,
            });
        }
        let frame = source.read_frame(index, classification.base_variables())?;
        let derived = evaluator.evaluate_all(&classification.equations, &frame)?;
        let values = assembler.assemble(classification.output_order(), &derived)?;
        sink.write_frame(frame.time(), &values)?;
        control.report(position + 1, total);
    }

    Ok(Outcome::Completed(total))
}
