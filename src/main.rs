//! Entry point for the mesh_stats application.
//! Handles CLI parsing, logging setup, and dispatches single jobs, batches or dataset listings.

use clap::Parser;
use mesh_stats::config::BatchConfig;
use mesh_stats::metadata::DatasetSummary;
use mesh_stats::netcdf_io::NetCDFFrameSource;
use mesh_stats::parallel::run_batch;
use mesh_stats::pipeline::run_job;
use mesh_stats::statistics::{Outcome, PassControl};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if let Some(path) = &args.jobs {
        let mut batch = BatchConfig::from_path(path)?;
        if args.threads.is_some() {
            batch.threads = args.threads;
        }
        let entries = run_batch(&batch, None)?;
        let mut failed = 0;
        for entry in &entries {
            match &entry.result {
                Ok(Outcome::Completed(report)) => println!(
                    "✅ {} ({} frames read)",
                    entry.output.display(),
                    report.frames_read
                ),
                Ok(Outcome::Cancelled { .. }) => {
                    failed += 1;
                    println!("⚠ {} cancelled", entry.output.display());
                }
                Err(e) => {
                    failed += 1;
                    println!("❌ {}: {e}", entry.output.display());
                }
            }
        }
        println!("\n{} of {} jobs completed", entries.len() - failed, entries.len());
        return Ok(if failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if args.list_vars {
        let input = args.input.as_ref().ok_or("--input is required")?;
        let source = NetCDFFrameSource::open(input)?;
        println!("Successfully opened mesh dataset: {}", input.display());
        DatasetSummary::from_source(&source)?.print();
        return Ok(ExitCode::SUCCESS);
    }

    let job = args.to_job()?;
    match run_job(&job, &PassControl::new())? {
        Outcome::Completed(report) => {
            println!(
                "✅ Saved {} to {}",
                report.variables.join(", "),
                job.output.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Cancelled { frames_processed } => {
            println!("⚠ Cancelled after {frames_processed} frames");
            Ok(ExitCode::FAILURE)
        }
    }
}
