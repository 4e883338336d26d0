//! Core reduction operations
//!
//! This module defines the closed set of temporal reductions the engine runs.

use serde::{Deserialize, Serialize};

/// Supported temporal reductions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceOperation {
    /// Elementwise maximum; vectors keep the pair with the largest magnitude
    #[serde(alias = "maximum")]
    Max,
    /// Elementwise minimum; vectors keep the pair with the smallest magnitude
    #[serde(alias = "minimum")]
    Min,
    /// Arithmetic mean, componentwise for vectors
    Mean,
}

impl ReduceOperation {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Max => "maximum",
            Self::Min => "minimum",
            Self::Mean => "mean",
        }
    }

    /// Whether `candidate` beats `current` under this operation
    ///
    /// A NaN current value is always replaced by a number. Mean has no notion
    /// of a winner and always answers `false`.
    #[must_use]
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            Self::Max => candidate > current || (current.is_nan() && !candidate.is_nan()),
            Self::Min => candidate < current || (current.is_nan() && !candidate.is_nan()),
            Self::Mean => false,
        }
    }
}

impl std::fmt::Display for ReduceOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReduceOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" | "maximum" => Ok(Self::Max),
            "min" | "minimum" => Ok(Self::Min),
            "mean" => Ok(Self::Mean),
            other => Err(format!(
                "Invalid operation '{other}': expected 'max', 'min' or 'mean'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn improvement_rules() {
        assert!(ReduceOperation::Max.improves(2.0, 1.0));
        assert!(!ReduceOperation::Max.improves(1.0, 1.0));
        assert!(ReduceOperation::Min.improves(0.5, 1.0));
        assert!(ReduceOperation::Max.improves(0.0, f64::NAN));
        assert!(!ReduceOperation::Min.improves(f64::NAN, 1.0));
        assert!(!ReduceOperation::Mean.improves(5.0, 1.0));
    }

    #[test]
    fn parses_operation_names() {
        assert_eq!("MAX".parse::<ReduceOperation>(), Ok(ReduceOperation::Max));
        assert_eq!("minimum".parse::<ReduceOperation>(), Ok(ReduceOperation::Min));
        assert!("sum".parse::<ReduceOperation>().is_err());
        assert_eq!(ReduceOperation::Mean.to_string(), "mean");
    }
}
