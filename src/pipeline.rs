//! End-to-end job execution
//!
//! A job is planned against its source first (variable resolution,
//! classification, window checks), so every validation failure surfaces
//! before any frame is read or any output file exists. Output files of
//! cancelled or failed jobs are removed.

use crate::config::JobConfig;
use crate::data_source::{FrameSink, FrameSource};
use crate::errors::{Result, ValidationError};
use crate::frame::{TimeWindow, VariableSpec};
use crate::netcdf_io::{NetCDFFrameSink, NetCDFFrameSource};
use crate::statistics::{
    derive_frames, reduce, OutputAssembler, Outcome, PassControl, ReduceOperation,
};
use crate::variables::{classify, Classification, DerivedVariableEvaluator, VariableCatalog};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything needed to run a job, resolved against its source
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub operation: Option<ReduceOperation>,
    pub classification: Classification,
    pub window: TimeWindow,
    pub evaluator: DerivedVariableEvaluator,
    pub assembler: OutputAssembler,
}

impl JobPlan {
    /// Validate `job` against `source` without reading frame data
    ///
    /// # Errors
    ///
    /// Returns [`crate::MeshStatsError::Validation`] for an unusable request.
    pub fn new<S: FrameSource + ?Sized>(job: &JobConfig, source: &S) -> Result<Self> {
        if let Some(friction) = &job.friction {
            friction.validate()?;
        }
        let requested = resolve_specs(&job.variables, source);
        let classification = classify(
            &source.available_variable_ids(),
            &requested,
            job.friction.as_ref(),
        )?;
        let window = job.window(source.frame_count())?;

        Ok(Self {
            operation: job.operation,
            classification,
            window,
            evaluator: DerivedVariableEvaluator::new(job.friction),
            assembler: OutputAssembler::new(job.precision),
        })
    }

    /// Frames the output file will hold
    #[must_use]
    pub fn output_frames(&self) -> usize {
        match self.operation {
            Some(_) => 1,
            None => self.window.len(),
        }
    }
}

/// What a finished job did
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub operation: Option<ReduceOperation>,
    pub variables: Vec<String>,
    pub frames_read: usize,
    pub frames_written: usize,
}

/// Map requested ids to specs, preferring the dataset's own names and units
pub fn resolve_specs<S: FrameSource + ?Sized>(ids: &[String], source: &S) -> Vec<VariableSpec> {
    ids.iter()
        .map(|id| {
            if let Some(spec) = source.variables().iter().find(|spec| spec.id == *id) {
                return spec.clone();
            }
            match VariableCatalog.variable(id) {
                Some(known) => VariableSpec::new(known.id, known.name, known.unit),
                None => VariableSpec::new(id.as_str(), id.as_str(), ""),
            }
        })
        .collect()
}

/// Run a planned job from `source` into `sink`
///
/// A reduction touches the sink only once its pass has completed, so a
/// cancelled or failed reduction leaves the sink untouched. Derive mode
/// writes the header first and one frame per window index.
///
/// # Errors
///
/// Propagates frame read, evaluation and sink write failures.
pub fn execute<S, K>(
    plan: &JobPlan,
    source: &S,
    sink: &mut K,
    control: &PassControl<'_>,
) -> Result<Outcome<JobReport>>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let order = plan.classification.output_order();
    let precision = plan.assembler.precision();

    let frames_written = match plan.operation {
        Some(operation) => {
            let outcome = reduce(
                operation,
                &plan.classification,
                &plan.window,
                source,
                &plan.evaluator,
                control,
            )?;
            let result = match outcome {
                Outcome::Completed(result) => result,
                Outcome::Cancelled { frames_processed } => {
                    return Ok(Outcome::Cancelled { frames_processed })
                }
            };
            let values = plan.assembler.assemble(order, &result)?;
            let time = source.time_value(0)?;
            sink.write_header(order, precision)?;
            sink.write_frame(time, &values)?;
            1
        }
        None => {
            sink.write_header(order, precision)?;
            match derive_frames(
                &plan.classification,
                &plan.window,
                source,
                sink,
                &plan.evaluator,
                &plan.assembler,
                control,
            )? {
                Outcome::Completed(written) => written,
                Outcome::Cancelled { frames_processed } => {
                    return Ok(Outcome::Cancelled { frames_processed })
                }
            }
        }
    };

    Ok(Outcome::Completed(JobReport {
        operation: plan.operation,
        variables: order.iter().map(|spec| spec.id.clone()).collect(),
        frames_read: plan.window.len(),
        frames_written,
    }))
}

/// Open, plan, run and write one NetCDF job
///
/// # Errors
///
/// Fails on validation, I/O or data errors. The output path is only
/// written when the job completes; an earlier file there survives a
/// cancelled or failed job.
pub fn run_job(job: &JobConfig, control: &PassControl<'_>) -> Result<Outcome<JobReport>> {
    check_output_path(&job.input, &job.output)?;
    let started = Instant::now();

    let source = NetCDFFrameSource::open(&job.input)?;
    let plan = JobPlan::new(job, &source)?;
    debug!(
        input = %job.input.display(),
        equations = plan.classification.equations.len(),
        frames = plan.window.len(),
        "planned job"
    );

    let result = write_output(job, &plan, &source, control);
    match &result {
        Ok(Outcome::Completed(report)) => {
            info!(
                input = %job.input.display(),
                output = %job.output.display(),
                operation = report.operation.map_or("derive", ReduceOperation::as_str),
                frames = report.frames_read,
                elapsed = ?started.elapsed(),
                "job finished"
            );
        }
        Ok(Outcome::Cancelled { frames_processed }) => {
            warn!(output = %job.output.display(), frames_processed, "job cancelled");
        }
        Err(e) => {
            warn!(output = %job.output.display(), error = %e, "job failed");
        }
    }
    result
}

fn write_output(
    job: &JobConfig,
    plan: &JobPlan,
    source: &NetCDFFrameSource,
    control: &PassControl<'_>,
) -> Result<Outcome<JobReport>> {
    let mut sink = NetCDFFrameSink::create(&job.output, source.node_count(), plan.output_frames())?;
    let result = annotate(&mut sink, job, plan).and_then(|()| execute(plan, source, &mut sink, control));
    match result {
        Ok(Outcome::Completed(report)) => {
            sink.persist()?;
            Ok(Outcome::Completed(report))
        }
        other => {
            sink.discard();
            other
        }
    }
}

fn annotate(sink: &mut NetCDFFrameSink, job: &JobConfig, plan: &JobPlan) -> Result<()> {
    sink.add_global_attribute("source", &job.input.display().to_string())?;
    if let Some(operation) = plan.operation {
        sink.add_global_attribute("reduction", operation.as_str())?;
    }
    Ok(())
}

/// Refuse to write over the input dataset
///
/// # Errors
///
/// Returns [`ValidationError::OutputCollidesWithInput`] when both paths name
/// the same file.
pub fn check_output_path(input: &Path, output: &Path) -> Result<()> {
    if resolve(input) == resolve(output) {
        return Err(ValidationError::OutputCollidesWithInput(output.to_path_buf()).into());
    }
    Ok(())
}

/// Refuse a batch whose jobs would write over each other or over any input
///
/// Jobs of a batch run concurrently, so every output must be distinct from
/// every other output and from every job's input.
///
/// # Errors
///
/// Returns [`ValidationError::OutputCollidesWithInput`] or
/// [`ValidationError::DuplicateOutput`] for the first offending output.
pub fn check_batch_paths(jobs: &[JobConfig]) -> Result<()> {
    let inputs: Vec<PathBuf> = jobs.iter().map(|job| resolve(&job.input)).collect();
    let mut outputs: Vec<PathBuf> = Vec::with_capacity(jobs.len());
    for job in jobs {
        let output = resolve(&job.output);
        if inputs.contains(&output) {
            return Err(ValidationError::OutputCollidesWithInput(job.output.clone()).into());
        }
        if outputs.contains(&output) {
            return Err(ValidationError::DuplicateOutput(job.output.clone()).into());
        }
        outputs.push(output);
    }
    Ok(())
}

fn resolve(path: &Path) -> PathBuf {
    normalize(path).unwrap_or_else(|| path.to_path_buf())
}

fn normalize(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Some(canonical);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(path.file_name()?))
}
