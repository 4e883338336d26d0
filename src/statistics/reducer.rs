//! Streaming reduction state
//!
//! [`ReductionState`] is the running aggregate of one reduction pass. It is
//! created empty, folded once per frame in window order and consumed by
//! [`ReductionState::finish`], so it cannot be fed after finalization.
//!
//! Memory is one array per tracked variable (three per vector couple for
//! max/min), independent of the number of frames.

use super::operations::ReduceOperation;
use crate::errors::{MeshStatsError, Result};
use crate::frame::{VariableSpec, VariableValues};
use crate::variables::{Classification, VectorCouple};
use ndarray::{Array1, ArrayView1, Zip};

#[derive(Debug)]
struct ScalarTrack {
    spec: VariableSpec,
    acc: Option<Array1<f64>>,
}

#[derive(Debug)]
struct VectorAccumulator {
    first: Array1<f64>,
    second: Array1<f64>,
    /// Best magnitude so far; unused for mean
    magnitude: Array1<f64>,
}

#[derive(Debug)]
struct VectorTrack {
    couple: VectorCouple,
    acc: Option<VectorAccumulator>,
}

/// Running aggregate for one reduction pass
#[derive(Debug)]
pub struct ReductionState {
    operation: ReduceOperation,
    scalars: Vec<ScalarTrack>,
    vectors: Vec<VectorTrack>,
    node_count: Option<usize>,
    frames_folded: usize,
}

impl ReductionState {
    /// Empty state tracking the scalars and couples of `classification`
    #[must_use]
    pub fn new(operation: ReduceOperation, classification: &Classification) -> Self {
        Self::with_variables(
            operation,
            classification.scalars.clone(),
            classification.vectors.clone(),
        )
    }

    #[must_use]
    pub fn with_variables(
        operation: ReduceOperation,
        scalars: Vec<VariableSpec>,
        vectors: Vec<VectorCouple>,
    ) -> Self {
        Self {
            operation,
            scalars: scalars
                .into_iter()
                .map(|spec| ScalarTrack { spec, acc: None })
                .collect(),
            vectors: vectors
                .into_iter()
                .map(|couple| VectorTrack { couple, acc: None })
                .collect(),
            node_count: None,
            frames_folded: 0,
        }
    }

    #[must_use]
    pub fn operation(&self) -> ReduceOperation {
        self.operation
    }

    #[must_use]
    pub fn frames_folded(&self) -> usize {
        self.frames_folded
    }

    /// Fold the frame read at `index` into the aggregate
    ///
    /// Every lookup is checked before anything is updated, so a failed fold
    /// leaves the state exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::FrameRead`] if the frame lacks a tracked
    /// variable or its node count differs from earlier frames.
    pub fn fold(&mut self, index: usize, frame: &impl VariableValues) -> Result<()> {
        let node_count = frame.node_count();
        if let Some(expected) = self.node_count {
            if node_count != expected {
                return Err(MeshStatsError::frame_read(
                    index,
                    format!("frame has {node_count} nodes, expected {expected}"),
                ));
            }
        }

        let lookup = move |spec: &VariableSpec| {
            frame.values(&spec.id).ok_or_else(|| {
                MeshStatsError::frame_read(index, format!("variable '{}' missing from frame", spec.id))
            })
        };
        let scalar_values = self
            .scalars
            .iter()
            .map(|track| lookup(&track.spec))
            .collect::<Result<Vec<_>>>()?;
        let vector_values = self
            .vectors
            .iter()
            .map(|track| -> Result<_> {
                Ok((lookup(&track.couple.first)?, lookup(&track.couple.second)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let operation = self.operation;
        for (track, values) in self.scalars.iter_mut().zip(scalar_values) {
            fold_scalar(operation, &mut track.acc, values);
        }
        for (track, (first, second)) in self.vectors.iter_mut().zip(vector_values) {
            fold_vector(operation, &mut track.acc, first, second);
        }

        self.node_count = Some(node_count);
        self.frames_folded += 1;
        Ok(())
    }

    /// Consume the state and produce the final arrays
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::EmptyWindow`] if no frame was folded.
    pub fn finish(self) -> Result<ReductionResult> {
        if self.frames_folded == 0 {
            return Err(MeshStatsError::EmptyWindow);
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.frames_folded as f64;
        let is_mean = self.operation == ReduceOperation::Mean;

        let scalars = self
            .scalars
            .into_iter()
            .map(|track| {
                let mut values = track.acc.unwrap_or_default();
                if is_mean {
                    values.mapv_inplace(|sum| sum / count);
                }
                (track.spec, values)
            })
            .collect();

        let vectors = self
            .vectors
            .into_iter()
            .map(|track| {
                let (mut first, mut second) = track
                    .acc
                    .map(|acc| (acc.first, acc.second))
                    .unwrap_or_default();
                if is_mean {
                    first.mapv_inplace(|sum| sum / count);
                    second.mapv_inplace(|sum| sum / count);
                }
                (track.couple, first, second)
            })
            .collect();

        Ok(ReductionResult {
            operation: self.operation,
            frames_folded: self.frames_folded,
            scalars,
            vectors,
        })
    }
}

fn fold_scalar(
    operation: ReduceOperation,
    slot: &mut Option<Array1<f64>>,
    values: ArrayView1<'_, f64>,
) {
    let Some(acc) = slot.as_mut() else {
        *slot = Some(values.to_owned());
        return;
    };
    match operation {
        ReduceOperation::Mean => *acc += &values,
        ReduceOperation::Max | ReduceOperation::Min => {
            Zip::from(acc).and(&values).for_each(|best, &value| {
                if operation.improves(value, *best) {
                    *best = value;
                }
            });
        }
    }
}

fn fold_vector(
    operation: ReduceOperation,
    slot: &mut Option<VectorAccumulator>,
    first: ArrayView1<'_, f64>,
    second: ArrayView1<'_, f64>,
) {
    let Some(acc) = slot.as_mut() else {
        let magnitude = match operation {
            ReduceOperation::Mean => Array1::zeros(0),
            ReduceOperation::Max | ReduceOperation::Min => {
                Zip::from(&first).and(&second).map_collect(|&a, &b| a.hypot(b))
            }
        };
        *slot = Some(VectorAccumulator {
            first: first.to_owned(),
            second: second.to_owned(),
            magnitude,
        });
        return;
    };
    match operation {
        ReduceOperation::Mean => {
            acc.first += &first;
            acc.second += &second;
        }
        ReduceOperation::Max | ReduceOperation::Min => {
            Zip::from(&mut acc.magnitude)
                .and(&mut acc.first)
                .and(&mut acc.second)
                .and(&first)
                .and(&second)
                .for_each(|best, best_first, best_second, &a, &b| {
                    let magnitude = a.hypot(b);
                    if operation.improves(magnitude, *best) {
                        *best = magnitude;
                        *best_first = a;
                        *best_second = b;
                    }
                });
        }
    }
}

/// Final arrays of a reduction pass
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionResult {
    pub operation: ReduceOperation,
    pub frames_folded: usize,
    pub scalars: Vec<(VariableSpec, Array1<f64>)>,
    /// Component arrays per couple, in `(first, second)` order
    pub vectors: Vec<(VectorCouple, Array1<f64>, Array1<f64>)>,
}

impl VariableValues for ReductionResult {
    fn values(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.scalars
            .iter()
            .find(|(spec, _)| spec.id == id)
            .map(|(_, values)| values.view())
            .or_else(|| {
                self.vectors.iter().find_map(|(couple, first, second)| {
                    if couple.first.id == id {
                        Some(first.view())
                    } else if couple.second.id == id {
                        Some(second.view())
                    } else {
                        None
                    }
                })
            })
    }

    fn node_count(&self) -> usize {
        self.scalars
            .first()
            .map(|(_, values)| values.len())
            .or_else(|| self.vectors.first().map(|(_, first, _)| first.len()))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn spec(id: &str) -> VariableSpec {
        VariableSpec::new(id, id, "")
    }

    fn uv_couple() -> VectorCouple {
        VectorCouple {
            first: spec("U"),
            second: spec("V"),
            magnitude: "M".into(),
        }
    }

    fn frame(a: &[f64], u: &[f64], v: &[f64]) -> Frame {
        Frame::from_rows(
            0.0,
            vec![
                ("A".into(), a.to_vec()),
                ("U".into(), u.to_vec()),
                ("V".into(), v.to_vec()),
            ],
        )
        .unwrap()
    }

    fn state(operation: ReduceOperation) -> ReductionState {
        ReductionState::with_variables(operation, vec![spec("A")], vec![uv_couple()])
    }

    #[test]
    fn scalar_max_min_mean() {
        let frames = [
            frame(&[1.0, 5.0], &[0.0, 0.0], &[0.0, 0.0]),
            frame(&[3.0, 2.0], &[0.0, 0.0], &[0.0, 0.0]),
            frame(&[2.0, -1.0], &[0.0, 0.0], &[0.0, 0.0]),
        ];
        let expected = [
            (ReduceOperation::Max, vec![3.0, 5.0]),
            (ReduceOperation::Min, vec![1.0, -1.0]),
            (ReduceOperation::Mean, vec![2.0, 2.0]),
        ];
        for (operation, values) in expected {
            let mut s = state(operation);
            for (i, f) in frames.iter().enumerate() {
                s.fold(i, f).unwrap();
            }
            let result = s.finish().unwrap();
            assert_eq!(result.values("A").unwrap().to_vec(), values, "{operation}");
        }
    }

    #[test]
    fn vector_max_keeps_pair_from_same_frame() {
        let mut s = state(ReduceOperation::Max);
        // node 0: frame 0 has largest magnitude even though frame 1 has larger U
        s.fold(0, &frame(&[0.0], &[0.0], &[10.0])).unwrap();
        s.fold(1, &frame(&[0.0], &[6.0], &[0.0])).unwrap();
        let result = s.finish().unwrap();
        assert_eq!(result.values("U").unwrap()[0], 0.0);
        assert_eq!(result.values("V").unwrap()[0], 10.0);
    }

    #[test]
    fn vector_min_selects_per_node() {
        let mut s = state(ReduceOperation::Min);
        s.fold(0, &frame(&[0.0, 0.0], &[1.0, 5.0], &[0.0, 5.0])).unwrap();
        s.fold(1, &frame(&[0.0, 0.0], &[3.0, 0.0], &[4.0, 1.0])).unwrap();
        let result = s.finish().unwrap();
        assert_eq!(result.values("U").unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(result.values("V").unwrap().to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn vector_mean_is_componentwise() {
        let mut s = state(ReduceOperation::Mean);
        s.fold(0, &frame(&[0.0], &[1.0], &[-2.0])).unwrap();
        s.fold(1, &frame(&[0.0], &[3.0], &[2.0])).unwrap();
        let result = s.finish().unwrap();
        assert_eq!(result.values("U").unwrap()[0], 2.0);
        assert_eq!(result.values("V").unwrap()[0], 0.0);
    }

    #[test]
    fn finishing_empty_state_fails() {
        assert!(matches!(
            state(ReduceOperation::Max).finish(),
            Err(MeshStatsError::EmptyWindow)
        ));
    }

    #[test]
    fn failed_fold_leaves_state_untouched() {
        let mut s = state(ReduceOperation::Max);
        s.fold(0, &frame(&[1.0], &[1.0], &[1.0])).unwrap();

        let missing_v = Frame::from_rows(
            1.0,
            vec![("A".into(), vec![9.0]), ("U".into(), vec![9.0])],
        )
        .unwrap();
        assert!(matches!(
            s.fold(1, &missing_v),
            Err(MeshStatsError::FrameRead { index: 1, .. })
        ));

        let wrong_size = frame(&[9.0, 9.0], &[9.0, 9.0], &[9.0, 9.0]);
        assert!(s.fold(2, &wrong_size).is_err());

        assert_eq!(s.frames_folded(), 1);
        let result = s.finish().unwrap();
        assert_eq!(result.values("A").unwrap()[0], 1.0);
    }

    #[test]
    fn nan_is_replaced_by_first_number() {
        let mut s = state(ReduceOperation::Max);
        s.fold(0, &frame(&[f64::NAN], &[0.0], &[0.0])).unwrap();
        s.fold(1, &frame(&[-4.0], &[0.0], &[0.0])).unwrap();
        assert_eq!(s.finish().unwrap().values("A").unwrap()[0], -4.0);
    }
}
