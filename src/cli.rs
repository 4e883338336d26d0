//! Defines command-line interface options using `clap` for mesh_stats.

use clap::Parser;
use mesh_stats::config::JobConfig;
use mesh_stats::statistics::{Precision, ReduceOperation};
use mesh_stats::variables::{FrictionLaw, UserEquation};
use std::path::PathBuf;

/// Per-node max/min/mean reductions and derived variables for mesh time series
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    name = "mesh_stats",
    about = "Reduce mesh time series over a window of frames"
)]
pub struct Args {
    /// Path to the input mesh dataset (NetCDF)
    #[arg(short, long, required_unless_present = "jobs")]
    pub input: Option<PathBuf>,

    /// Path of the NetCDF file to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Reduction to apply: max, min or mean. Without it every frame is written with its derived variables
    #[arg(long, value_parser = parse_operation)]
    pub operation: Option<ReduceOperation>,

    /// Comma-separated variable ids, e.g. H,U,V,M
    #[arg(long, value_delimiter = ',')]
    pub vars: Vec<String>,

    /// First frame of the window (inclusive)
    #[arg(long)]
    pub start: Option<usize>,

    /// Last frame of the window (exclusive). Defaults to the end of the dataset
    #[arg(long)]
    pub end: Option<usize>,

    /// Explicit comma-separated frame indices, overriding --start/--end
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["start", "end"])]
    pub frames: Vec<usize>,

    /// Write single precision output
    #[arg(long, default_value_t = false)]
    pub single_precision: bool,

    /// Friction law for friction velocity and bottom shear stress
    #[arg(long, value_parser = parse_friction_law)]
    pub friction_law: Option<FrictionLaw>,

    /// Constant friction coefficient, required when the dataset has no W variable
    #[arg(long, requires = "friction_law")]
    pub friction_coefficient: Option<f64>,

    /// JSON file describing a batch of jobs to run in parallel
    #[arg(long, conflicts_with = "input")]
    pub jobs: Option<PathBuf>,

    /// Number of threads for batch processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// List dataset variables and the variables derivable from them
    #[arg(long)]
    pub list_vars: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Build the single job described by the command line
    pub fn to_job(&self) -> Result<JobConfig, String> {
        let input = self.input.clone().ok_or("--input is required")?;
        let output = self.output.clone().ok_or("--output is required")?;
        if self.vars.is_empty() {
            return Err("--vars needs at least one variable id".to_string());
        }

        let mut job = JobConfig::new(input, output, self.vars.clone());
        job.operation = self.operation;
        job.start = self.start;
        job.end = self.end;
        if !self.frames.is_empty() {
            job.frames = Some(self.frames.clone());
        }
        if self.single_precision {
            job.precision = Precision::Single;
        }
        job.friction = self
            .friction_law
            .map(|law| UserEquation::new(law, self.friction_coefficient));
        Ok(job)
    }
}

fn parse_operation(s: &str) -> Result<ReduceOperation, String> {
    s.parse()
}

fn parse_friction_law(s: &str) -> Result<FrictionLaw, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_job_from_flags() {
        let args = Args::try_parse_from([
            "mesh_stats",
            "-i",
            "run.nc",
            "-o",
            "out.nc",
            "--operation",
            "MAX",
            "--vars",
            "H,US",
            "--start",
            "3",
            "--single-precision",
            "--friction-law",
            "manning",
            "--friction-coefficient",
            "0.03",
        ])
        .unwrap();
        let job = args.to_job().unwrap();
        assert_eq!(job.operation, Some(ReduceOperation::Max));
        assert_eq!(job.variables, vec!["H", "US"]);
        assert_eq!(job.start, Some(3));
        assert_eq!(job.precision, Precision::Single);
        assert_eq!(
            job.friction,
            Some(UserEquation::new(FrictionLaw::Manning, Some(0.03)))
        );
    }

    #[test]
    fn rejects_unknown_operation() {
        let parsed = Args::try_parse_from(["mesh_stats", "-i", "a.nc", "--operation", "median"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn frames_conflict_with_range() {
        let parsed = Args::try_parse_from([
            "mesh_stats", "-i", "a.nc", "--frames", "1,2", "--start", "0",
        ]);
        assert!(parsed.is_err());
    }
}
