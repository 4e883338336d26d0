//! Simple benchmark of streaming reductions over an in-memory mesh.
//!
//! Times max, min and mean passes over the whole dataset, with and without
//! a derived variable, to show the per-frame cost of the engine.

use mesh_stats::data_source::{FrameSource, MemoryDataset};
use mesh_stats::frame::{TimeWindow, VariableSpec};
use mesh_stats::statistics::{reduce, PassControl, ReduceOperation};
use mesh_stats::variables::{classify, DerivedVariableEvaluator};
use ndarray::Array2;
use std::time::Instant;

fn build_dataset(frames: usize, nodes: usize) -> Result<MemoryDataset, Box<dyn std::error::Error>> {
    let mut dataset = MemoryDataset::new(
        vec![
            VariableSpec::new("H", "WATER DEPTH", "M"),
            VariableSpec::new("U", "VELOCITY U", "M/S"),
            VariableSpec::new("V", "VELOCITY V", "M/S"),
        ],
        nodes,
    );
    for t in 0..frames {
        let values = Array2::from_shape_fn((3, nodes), |(row, n)| {
            ((t * 31 + n * 7 + row) as f64 * 0.001).sin()
        });
        dataset.push_frame(t as f64, values)?;
    }
    Ok(dataset)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔬 mesh_stats Reduction Benchmark");
    println!("==================================\n");

    for (frames, nodes) in [(100, 10_000), (100, 100_000), (500, 100_000)] {
        println!("📊 Testing with {frames} frames x {nodes} nodes:");
        println!("-------------------------------------------");
        let dataset = build_dataset(frames, nodes)?;
        let window = TimeWindow::range(0, frames)?;
        let evaluator = DerivedVariableEvaluator::default();

        for request in [&["H", "U", "V"][..], &["H", "M"][..]] {
            let specs: Vec<_> = request
                .iter()
                .map(|id| VariableSpec::new(*id, *id, ""))
                .collect();
            let classification =
                classify(&dataset.available_variable_ids(), &specs, None)?;

            for operation in [ReduceOperation::Max, ReduceOperation::Min, ReduceOperation::Mean] {
                let start = Instant::now();
                reduce(
                    operation,
                    &classification,
                    &window,
                    &dataset,
                    &evaluator,
                    &PassControl::new(),
                )?;
                println!(
                    "   {:<8} [{}]: {:.3} seconds",
                    operation.as_str(),
                    request.join(", "),
                    start.elapsed().as_secs_f64()
                );
            }
        }
        println!("=========================================\n");
    }

    Ok(())
}
