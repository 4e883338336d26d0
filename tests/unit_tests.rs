//! Engine behaviour exercised through the public API with in-memory data

use mesh_stats::config::JobConfig;
use mesh_stats::data_source::{FrameSource, MemoryDataset, MemorySink};
use mesh_stats::errors::{MeshStatsError, Result, ValidationError};
use mesh_stats::frame::{Frame, TimeWindow, VariableSpec, VariableValues};
use mesh_stats::pipeline::{execute, JobPlan};
use mesh_stats::statistics::{
    reduce, reduce_async, OutputArray, OutputAssembler, Outcome, PassControl, Precision,
    ReduceOperation,
};
use mesh_stats::variables::{classify, DerivedVariableEvaluator, FrictionLaw, UserEquation};
use ndarray::Array2;

fn dataset(frames: usize) -> MemoryDataset {
    let mut ds = MemoryDataset::new(
        vec![
            VariableSpec::new("H", "WATER DEPTH", "M"),
            VariableSpec::new("U", "VELOCITY U", "M/S"),
            VariableSpec::new("V", "VELOCITY V", "M/S"),
            VariableSpec::new("W", "FRICTION COEFFICIENT", ""),
        ],
        3,
    );
    for t in 0..frames {
        let values = Array2::from_shape_fn((4, 3), |(row, node)| {
            let x = (t * 3 + node) as f64;
            match row {
                0 => 1.0 + (x * 0.7).sin().abs(),
                1 => (x * 1.3).cos() * 2.0,
                2 => (x * 0.4).sin() * 3.0,
                _ => 40.0 + node as f64,
            }
        });
        ds.push_frame(t as f64 * 60.0, values).unwrap();
    }
    ds
}

fn specs(ids: &[&str]) -> Vec<VariableSpec> {
    ids.iter().map(|id| VariableSpec::new(*id, *id, "")).collect()
}

/// Wraps a dataset and fails to read one frame
struct FailingSource {
    inner: MemoryDataset,
    broken: usize,
}

impl FrameSource for FailingSource {
    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    fn variables(&self) -> &[VariableSpec] {
        self.inner.variables()
    }

    fn time_value(&self, index: usize) -> Result<f64> {
        self.inner.time_value(index)
    }

    fn get_frame(&self, index: usize) -> Result<Frame> {
        if index == self.broken {
            return Err(MeshStatsError::frame_read(index, "checksum mismatch"));
        }
        self.inner.get_frame(index)
    }
}

#[test]
fn test_error_messages() {
    let err = MeshStatsError::frame_read(7, "truncated record");
    assert_eq!(err.to_string(), "failed to read frame 7: truncated record");
    assert!(!err.is_validation());

    let err: MeshStatsError = ValidationError::MissingBaseVariable {
        variable: "B".into(),
        required_by: "H".into(),
    }
    .into();
    assert!(err.is_validation());
    assert!(err.to_string().contains("'B' needed to compute 'H'"));
}

#[test]
fn read_failure_mid_pass_discards_everything() {
    let source = FailingSource {
        inner: dataset(6),
        broken: 3,
    };
    let classification = classify(&source.available_variable_ids(), &specs(&["H", "M"]), None).unwrap();

    let result = reduce(
        ReduceOperation::Mean,
        &classification,
        &TimeWindow::range(0, 6).unwrap(),
        &source,
        &DerivedVariableEvaluator::default(),
        &PassControl::new(),
    );
    assert!(matches!(result, Err(MeshStatsError::FrameRead { index: 3, .. })));

    // the window can avoid the broken frame
    let result = reduce(
        ReduceOperation::Mean,
        &classification,
        &TimeWindow::new(vec![0, 4, 5]).unwrap(),
        &source,
        &DerivedVariableEvaluator::default(),
        &PassControl::new(),
    );
    assert!(result.is_ok());
}

#[test]
fn failed_reduction_leaves_sink_untouched() {
    let source = FailingSource {
        inner: dataset(4),
        broken: 2,
    };
    let mut job = JobConfig::new("in.nc", "out.nc", vec!["M".into()]);
    job.operation = Some(ReduceOperation::Max);
    let plan = JobPlan::new(&job, &source).unwrap();
    let mut sink = MemorySink::default();

    assert!(execute(&plan, &source, &mut sink, &PassControl::new()).is_err());
    assert!(sink.header.is_none());
    assert!(sink.frames.is_empty());
}

#[test]
fn chained_derivation_matches_brute_force() {
    let ds = dataset(5);
    let friction = UserEquation::new(FrictionLaw::Strickler, None);
    let classification = classify(&ds.available_variable_ids(), &specs(&["TAU"]), Some(&friction)).unwrap();
    let evaluator = DerivedVariableEvaluator::new(Some(friction));

    let result = reduce(
        ReduceOperation::Max,
        &classification,
        &TimeWindow::range(0, 5).unwrap(),
        &ds,
        &evaluator,
        &PassControl::new(),
    )
    .unwrap()
    .completed()
    .unwrap();

    for node in 0..3 {
        let expected = (0..5)
            .map(|index| {
                let frame = ds.get_frame(index).unwrap();
                let h = frame.values("H").unwrap()[node];
                let m = frame.values("U").unwrap()[node].hypot(frame.values("V").unwrap()[node]);
                let k = frame.values("W").unwrap()[node];
                // Strickler: sqrt(g) * |u| / (K * h^(1/6)), every depth here is positive
                let us = 9.81_f64.sqrt() * m / (k * h.powf(1.0 / 6.0));
                1000.0 * us * us
            })
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((result.values("TAU").unwrap()[node] - expected).abs() < 1e-9);
    }
}

#[test]
fn duplicate_request_ids_collapse() {
    let ds = dataset(2);
    let classification = classify(&ds.available_variable_ids(), &specs(&["U", "H", "U", "V"]), None).unwrap();
    let ids: Vec<_> = classification
        .output_order()
        .iter()
        .map(|spec| spec.id.as_str())
        .collect();
    assert_eq!(ids, ["U", "H", "V"]);
    assert_eq!(classification.vectors.len(), 1);
}

#[test]
fn mean_of_magnitude_differs_from_magnitude_of_mean() {
    let mut ds = MemoryDataset::new(specs(&["U", "V"]), 1);
    ds.push_frame(0.0, ndarray::array![[1.0], [0.0]]).unwrap();
    ds.push_frame(1.0, ndarray::array![[-1.0], [0.0]]).unwrap();
    let classification = classify(&ds.available_variable_ids(), &specs(&["U", "V", "M"]), None).unwrap();

    let result = reduce(
        ReduceOperation::Mean,
        &classification,
        &TimeWindow::range(0, 2).unwrap(),
        &ds,
        &DerivedVariableEvaluator::default(),
        &PassControl::new(),
    )
    .unwrap()
    .completed()
    .unwrap();
    assert_eq!(result.values("U").unwrap()[0], 0.0);
    assert_eq!(result.values("M").unwrap()[0], 1.0);
}

#[test]
fn single_precision_is_applied_after_reduction() {
    let mut ds = MemoryDataset::new(specs(&["H"]), 1);
    let values = [0.1, 0.2, 0.3, 1e-9];
    for (t, value) in values.iter().enumerate() {
        ds.push_frame(t as f64, ndarray::array![[*value]]).unwrap();
    }
    let classification = classify(&ds.available_variable_ids(), &specs(&["H"]), None).unwrap();
    let result = reduce(
        ReduceOperation::Mean,
        &classification,
        &TimeWindow::range(0, 4).unwrap(),
        &ds,
        &DerivedVariableEvaluator::default(),
        &PassControl::new(),
    )
    .unwrap()
    .completed()
    .unwrap();

    let expected = (values.iter().sum::<f64>() / 4.0) as f32;
    let out = OutputAssembler::new(Precision::Single)
        .assemble(classification.output_order(), &result)
        .unwrap();
    assert_eq!(out, OutputArray::Single(ndarray::array![[expected]]));
}

#[test]
fn async_pass_matches_blocking_pass() {
    let ds = dataset(8);
    let classification = classify(&ds.available_variable_ids(), &specs(&["H", "U", "V", "F"]), None).unwrap();
    let window = TimeWindow::new(vec![1, 2, 5, 7]).unwrap();
    let evaluator = DerivedVariableEvaluator::default();

    let blocking = reduce(
        ReduceOperation::Min,
        &classification,
        &window,
        &ds,
        &evaluator,
        &PassControl::new(),
    )
    .unwrap();
    let streamed = tokio_test::block_on(reduce_async(
        ReduceOperation::Min,
        &classification,
        &window,
        &ds,
        &evaluator,
        &PassControl::new(),
    ))
    .unwrap();
    assert_eq!(blocking, streamed);
    assert!(matches!(streamed, Outcome::Completed(_)));
}
