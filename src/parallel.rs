//! Parallel batch execution
//!
//! Jobs are independent: each opens its own source and writes its own
//! output, so a batch maps straight onto a Rayon thread pool. A single
//! reduction pass stays sequential over its frames.

use crate::config::{BatchConfig, JobConfig};
use crate::errors::{MeshStatsError, Result};
use crate::pipeline::{check_batch_paths, run_job, JobReport};
use crate::statistics::{CancelFlag, Outcome, PassControl};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::PathBuf;
use tracing::info;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    #[must_use]
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Create a configuration that uses all available CPU cores
    #[must_use]
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    #[must_use]
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Threads a pool built from this configuration will run
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }

    /// Build a dedicated pool for one batch
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::ThreadPool`] if the pool cannot be created.
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let threads = self.effective_threads();
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mesh-stats-{i}"))
            .build()
            .map_err(|e| {
                MeshStatsError::ThreadPool(format!(
                    "Failed to initialize thread pool with {threads} threads: {e}"
                ))
            })
    }
}

/// Result of one job in a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub output: PathBuf,
    pub result: Result<Outcome<JobReport>>,
}

impl BatchEntry {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.result, Ok(Outcome::Completed(_)))
    }
}

/// Run every job of `batch`, in parallel, returning results in job order
///
/// A failing job does not stop the others. Setting `cancel` stops every job
/// still running at its next frame boundary.
///
/// # Errors
///
/// Fails before any job starts if two jobs share an output or an output
/// names any job's input, or if the thread pool cannot be built.
pub fn run_batch(batch: &BatchConfig, cancel: Option<&CancelFlag>) -> Result<Vec<BatchEntry>> {
    check_batch_paths(&batch.jobs)?;
    let config = ParallelConfig::new(batch.threads);
    let pool = config.build_pool()?;
    info!(
        jobs = batch.jobs.len(),
        threads = config.effective_threads(),
        "starting batch"
    );

    let entries: Vec<BatchEntry> = pool.install(|| {
        batch
            .jobs
            .par_iter()
            .map(|job| run_entry(job, cancel))
            .collect()
    });

    let failed = entries.iter().filter(|entry| !entry.succeeded()).count();
    info!(jobs = entries.len(), failed, "batch finished");
    Ok(entries)
}

fn run_entry(job: &JobConfig, cancel: Option<&CancelFlag>) -> BatchEntry {
    let mut control = PassControl::new();
    if let Some(flag) = cancel {
        control = control.with_cancel(flag.clone());
    }
    BatchEntry {
        output: job.output.clone(),
        result: run_job(job, &control),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

/// Get information about the current parallel configuration
#[must_use]
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}

impl ParallelInfo {
    pub fn print_info(&self) {
        println!("📊 Parallel Processing Information:");
        println!("   Current threads: {}", self.current_threads);
        println!("   Available CPU cores: {}", self.available_cores);
    }
}
