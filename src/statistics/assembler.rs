//! Assembly of reduced or derived rows into one output array

use crate::errors::{MeshStatsError, Result};
use crate::frame::{VariableSpec, VariableValues};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Floating point width of the written output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    #[default]
    Double,
}

/// Assembled output: one row per variable, one column per mesh node
#[derive(Debug, Clone, PartialEq)]
pub enum OutputArray {
    Single(Array2<f32>),
    Double(Array2<f64>),
}

impl OutputArray {
    #[must_use]
    pub fn precision(&self) -> Precision {
        match self {
            Self::Single(_) => Precision::Single,
            Self::Double(_) => Precision::Double,
        }
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        match self {
            Self::Single(values) => values.nrows(),
            Self::Double(values) => values.nrows(),
        }
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        match self {
            Self::Single(values) => values.ncols(),
            Self::Double(values) => values.ncols(),
        }
    }

    /// Copy of the data widened to `f64`
    #[must_use]
    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            Self::Single(values) => values.mapv(f64::from),
            Self::Double(values) => values.clone(),
        }
    }
}

/// Stacks per-variable rows in the declared output order
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputAssembler {
    precision: Precision,
}

impl OutputAssembler {
    #[must_use]
    pub const fn new(precision: Precision) -> Self {
        Self { precision }
    }

    #[must_use]
    pub const fn precision(&self) -> Precision {
        self.precision
    }

    /// Stack the rows of `order` taken from `results`
    ///
    /// `results` is either a finished reduction or one frame with its derived
    /// variables. The downcast, if any, is applied once to the whole array.
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::MissingResult`] if a variable of `order` has
    /// no values, or a shape error if rows differ in length.
    pub fn assemble(
        &self,
        order: &[VariableSpec],
        results: &impl VariableValues,
    ) -> Result<OutputArray> {
        let rows = order
            .iter()
            .map(|spec| {
                results
                    .values(&spec.id)
                    .ok_or_else(|| MeshStatsError::MissingResult(spec.id.clone()))
            })
            .collect::<Result<Vec<ArrayView1<'_, f64>>>>()?;
        if rows.is_empty() {
            return Ok(self.finish(Array2::zeros((0, results.node_count()))));
        }
        let stacked = ndarray::stack(Axis(0), &rows)?;
        Ok(self.finish(stacked))
    }

    fn finish(&self, values: Array2<f64>) -> OutputArray {
        match self.precision {
            #[allow(clippy::cast_possible_truncation)]
            Precision::Single => OutputArray::Single(values.mapv(|v| v as f32)),
            Precision::Double => OutputArray::Double(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn frame() -> Frame {
        Frame::from_rows(
            0.0,
            vec![
                ("A".into(), vec![1.0, 2.0]),
                ("U".into(), vec![0.1, 0.2]),
                ("V".into(), vec![3.0, 4.0]),
            ],
        )
        .unwrap()
    }

    fn order(ids: &[&str]) -> Vec<VariableSpec> {
        ids.iter().map(|id| VariableSpec::new(*id, *id, "")).collect()
    }

    #[test]
    fn rows_follow_declared_order() {
        let out = OutputAssembler::new(Precision::Double)
            .assemble(&order(&["V", "A"]), &frame())
            .unwrap();
        let OutputArray::Double(values) = out else {
            panic!("expected double precision");
        };
        assert_eq!(values.shape(), &[2, 2]);
        assert_eq!(values.row(0).to_vec(), vec![3.0, 4.0]);
        assert_eq!(values.row(1).to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn single_precision_downcasts_whole_array() {
        let out = OutputAssembler::new(Precision::Single)
            .assemble(&order(&["A", "U", "V"]), &frame())
            .unwrap();
        assert_eq!(out.precision(), Precision::Single);
        let OutputArray::Single(values) = out else {
            panic!("expected single precision");
        };
        assert_eq!(values[[1, 0]], 0.1_f32);
    }

    #[test]
    fn missing_row_is_an_error() {
        let result = OutputAssembler::default().assemble(&order(&["A", "Q"]), &frame());
        assert!(matches!(result, Err(MeshStatsError::MissingResult(id)) if id == "Q"));
    }
}
