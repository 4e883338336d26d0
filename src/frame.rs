//! Frames, variable descriptors and time windows
//!
//! A [`Frame`] is one time step of a mesh dataset: one row of values per
//! variable, one column per mesh node. Derived variables computed for a frame
//! live in a [`DerivedFrame`] layered over the borrowed base frame, so the
//! base data is never mutated.

use crate::errors::{Result, ValidationError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Identifier, display name and unit of a variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub id: String,
    pub name: String,
    pub unit: String,
}

impl VariableSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
        }
    }
}

/// Lookup of per-node values by variable id
pub trait VariableValues {
    /// Values of `id` over every mesh node, if the variable is present
    fn values(&self, id: &str) -> Option<ArrayView1<'_, f64>>;

    /// Number of mesh nodes
    fn node_count(&self) -> usize;
}

/// Immutable snapshot of one time step
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    time: f64,
    variables: Vec<String>,
    values: Array2<f64>,
}

impl Frame {
    /// Build a frame from one row per variable
    ///
    /// # Errors
    ///
    /// Returns an error if the number of rows does not match the number of ids.
    pub fn new(time: f64, variables: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != variables.len() {
            return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        Ok(Self {
            time,
            variables,
            values,
        })
    }

    /// Build a frame from `(id, values)` rows of equal length
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have different lengths.
    pub fn from_rows(time: f64, rows: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let node_count = rows.first().map_or(0, |(_, v)| v.len());
        let mut variables = Vec::with_capacity(rows.len());
        let mut flat = Vec::with_capacity(rows.len() * node_count);
        for (id, row) in rows {
            if row.len() != node_count {
                return Err(
                    ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into(),
                );
            }
            variables.push(id);
            flat.extend(row);
        }
        let values = Array2::from_shape_vec((variables.len(), node_count), flat)?;
        Ok(Self {
            time,
            variables,
            values,
        })
    }

    /// Time value carried by the frame (seconds since the dataset origin)
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ids of the variables present in the frame, in row order
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl VariableValues for Frame {
    fn values(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.variables
            .iter()
            .position(|v| v == id)
            .map(|row| self.values.row(row))
    }

    fn node_count(&self) -> usize {
        self.values.ncols()
    }
}

/// Derived variables evaluated for one frame, layered over the base frame
#[derive(Debug)]
pub struct DerivedFrame<'a> {
    base: &'a Frame,
    derived: Vec<(String, Array1<f64>)>,
}

impl<'a> DerivedFrame<'a> {
    #[must_use]
    pub fn new(base: &'a Frame) -> Self {
        Self {
            base,
            derived: Vec::new(),
        }
    }

    /// Attach a derived variable; a later insert for the same id wins
    pub fn insert(&mut self, id: impl Into<String>, values: Array1<f64>) {
        let id = id.into();
        self.derived.retain(|(existing, _)| *existing != id);
        self.derived.push((id, values));
    }

    #[must_use]
    pub fn base(&self) -> &Frame {
        self.base
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.base.time()
    }
}

impl VariableValues for DerivedFrame<'_> {
    fn values(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
        self.derived
            .iter()
            .find(|(derived_id, _)| derived_id == id)
            .map(|(_, values)| values.view())
            .or_else(|| self.base.values(id))
    }

    fn node_count(&self) -> usize {
        self.base.node_count()
    }
}

/// Ordered, non-empty, strictly increasing set of frame indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    indices: Vec<usize>,
}

impl TimeWindow {
    /// # Errors
    ///
    /// Fails when `indices` is empty or not strictly increasing.
    pub fn new(indices: Vec<usize>) -> std::result::Result<Self, ValidationError> {
        if indices.is_empty() {
            return Err(ValidationError::EmptyWindow);
        }
        if let Some(pair) = indices.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ValidationError::WindowNotIncreasing {
                previous: pair[0],
                next: pair[1],
            });
        }
        Ok(Self { indices })
    }

    /// Contiguous window `[start, end)`
    ///
    /// # Errors
    ///
    /// Fails when `start >= end`.
    pub fn range(start: usize, end: usize) -> std::result::Result<Self, ValidationError> {
        Self::new((start..end).collect())
    }

    /// Check every index against the dataset's frame count
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range index.
    pub fn validate(&self, frame_count: usize) -> std::result::Result<(), ValidationError> {
        match self.indices.last() {
            Some(&index) if index >= frame_count => Err(ValidationError::IndexOutOfRange {
                index,
                frame_count,
            }),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
