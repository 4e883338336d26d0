//! Variable knowledge and per-frame derivations
//!
//! This module is organized into submodules:
//! - [`catalog`]: Known variables, vector couples and derivation equations
//! - [`classifier`]: Partition of a request into scalars, couples and equations
//! - [`equations`]: Stateless per-frame evaluation of derived variables

pub mod catalog;
pub mod classifier;
pub mod equations;

pub use catalog::{CoupleDefinition, Equation, EquationKind, KnownVariable, VariableCatalog};
pub use classifier::{classify, Classification, VectorCouple};
pub use equations::{DerivedVariableEvaluator, FrictionLaw, UserEquation};
