//! Per-frame evaluation of derived variables
//!
//! Evaluation is a pure function of one frame: inputs are borrowed, a fresh
//! array is returned, nothing is carried over to the next frame.

use super::catalog::{Equation, EquationKind, VariableCatalog};
use crate::errors::{MeshStatsError, Result, ValidationError};
use crate::frame::{DerivedFrame, Frame, VariableValues};
use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};

/// Gravitational acceleration (m/s^2)
pub const GRAVITY: f64 = 9.81;
/// Density of water (kg/m^3)
pub const RHO_WATER: f64 = 1000.0;
/// Von Karman constant
pub const KARMAN: f64 = 0.41;

/// Friction law used to compute the friction velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrictionLaw {
    Chezy,
    Strickler,
    Manning,
    Nikuradse,
}

impl FrictionLaw {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chezy => "chezy",
            Self::Strickler => "strickler",
            Self::Manning => "manning",
            Self::Nikuradse => "nikuradse",
        }
    }

    /// Friction velocity at one node from depth, speed and friction coefficient
    #[must_use]
    pub fn friction_velocity(self, depth: f64, speed: f64, coefficient: f64) -> f64 {
        if depth <= 0.0 {
            return 0.0;
        }
        match self {
            Self::Chezy => GRAVITY.sqrt() / coefficient * speed,
            Self::Strickler => GRAVITY.sqrt() / (coefficient * depth.powf(1.0 / 6.0)) * speed,
            Self::Manning => GRAVITY.sqrt() * coefficient / depth.powf(1.0 / 6.0) * speed,
            Self::Nikuradse => {
                let log_term = (11.036 * depth / coefficient).ln();
                if log_term > 0.0 {
                    KARMAN * speed / log_term
                } else {
                    0.0
                }
            }
        }
    }
}

impl std::str::FromStr for FrictionLaw {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chezy" => Ok(Self::Chezy),
            "strickler" => Ok(Self::Strickler),
            "manning" => Ok(Self::Manning),
            "nikuradse" => Ok(Self::Nikuradse),
            other => Err(format!(
                "Unknown friction law '{other}': expected chezy, strickler, manning or nikuradse"
            )),
        }
    }
}

/// User-supplied parameters for friction-based variables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserEquation {
    pub law: FrictionLaw,
    /// Constant friction coefficient, used when the dataset has no `W` variable
    #[serde(default)]
    pub coefficient: Option<f64>,
}

impl UserEquation {
    #[must_use]
    pub const fn new(law: FrictionLaw, coefficient: Option<f64>) -> Self {
        Self { law, coefficient }
    }

    /// # Errors
    ///
    /// Fails if a supplied coefficient is not finite and strictly positive.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        match self.coefficient {
            Some(value) if !(value.is_finite() && value > 0.0) => {
                Err(ValidationError::InvalidCoefficient {
                    name: format!("{} coefficient", self.law.as_str()),
                    value,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Computes derived variables for one frame at a time
#[derive(Debug, Clone, Default)]
pub struct DerivedVariableEvaluator {
    catalog: VariableCatalog,
    user_equation: Option<UserEquation>,
}

impl DerivedVariableEvaluator {
    #[must_use]
    pub fn new(user_equation: Option<UserEquation>) -> Self {
        Self {
            catalog: VariableCatalog::new(),
            user_equation,
        }
    }

    /// Evaluate the equation producing `output` on `frame`
    ///
    /// # Errors
    ///
    /// Returns [`MeshStatsError::UnknownEquation`] if no equation produces
    /// `output`, or [`MeshStatsError::MissingBaseVariable`] if an input is
    /// absent from the frame.
    pub fn evaluate(&self, output: &str, frame: &impl VariableValues) -> Result<Array1<f64>> {
        let equation = self
            .catalog
            .equation(output)
            .ok_or_else(|| MeshStatsError::UnknownEquation(output.to_string()))?;
        self.evaluate_equation(equation, frame)
    }

    /// Evaluate `equations` in order, each one seeing the outputs of the previous ones
    ///
    /// # Errors
    ///
    /// Propagates the first evaluation failure.
    pub fn evaluate_all<'a>(
        &self,
        equations: &[&'static Equation],
        frame: &'a Frame,
    ) -> Result<DerivedFrame<'a>> {
        let mut derived = DerivedFrame::new(frame);
        for equation in equations {
            let values = self.evaluate_equation(equation, &derived)?;
            derived.insert(equation.output, values);
        }
        Ok(derived)
    }

    fn evaluate_equation(
        &self,
        equation: &Equation,
        frame: &impl VariableValues,
    ) -> Result<Array1<f64>> {
        let input = move |index: usize| {
            let id = equation.inputs[index];
            frame
                .values(id)
                .ok_or_else(|| MeshStatsError::MissingBaseVariable {
                    equation: equation.output.to_string(),
                    variable: id.to_string(),
                })
        };

        let values = match equation.kind {
            EquationKind::Difference => &input(0)? - &input(1)?,
            EquationKind::Sum => &input(0)? + &input(1)?,
            EquationKind::Product => &input(0)? * &input(1)?,
            EquationKind::Magnitude => {
                Zip::from(input(0)?).and(input(1)?).map_collect(|&a, &b| a.hypot(b))
            }
            EquationKind::Froude => {
                Zip::from(input(0)?)
                    .and(input(1)?)
                    .map_collect(|&speed, &depth| {
                        if depth > 0.0 {
                            speed / (GRAVITY * depth).sqrt()
                        } else {
                            0.0
                        }
                    })
            }
            EquationKind::FrictionVelocity => {
                self.friction_velocity(equation, frame, input(0)?, input(1)?)?
            }
            EquationKind::ShearStress => input(0)?.mapv(|us| RHO_WATER * us * us),
        };
        Ok(values)
    }

    fn friction_velocity(
        &self,
        equation: &Equation,
        frame: &impl VariableValues,
        depth: ArrayView1<'_, f64>,
        speed: ArrayView1<'_, f64>,
    ) -> Result<Array1<f64>> {
        let coefficient_id = equation.optional_inputs.first().copied().unwrap_or("W");
        let user_equation = self.user_equation.ok_or_else(|| {
            MeshStatsError::Validation(ValidationError::FrictionLawRequired(
                equation.output.to_string(),
            ))
        })?;
        let law = user_equation.law;

        if let Some(coefficients) = frame.values(coefficient_id) {
            return Ok(Zip::from(depth)
                .and(speed)
                .and(coefficients)
                .map_collect(|&h, &m, &w| law.friction_velocity(h, m, w)));
        }

        let coefficient = user_equation
            .coefficient
            .ok_or_else(|| MeshStatsError::MissingBaseVariable {
                equation: equation.output.to_string(),
                variable: coefficient_id.to_string(),
            })?;
        Ok(Zip::from(depth)
            .and(speed)
            .map_collect(|&h, &m| law.friction_velocity(h, m, coefficient)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(rows: &[(&str, &[f64])]) -> Frame {
        Frame::from_rows(
            0.0,
            rows.iter()
                .map(|(id, values)| ((*id).to_string(), values.to_vec()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn magnitude_of_velocity() {
        let f = frame(&[("U", &[3.0, 0.0, -6.0]), ("V", &[4.0, 2.0, 8.0])]);
        let evaluator = DerivedVariableEvaluator::default();
        let m = evaluator.evaluate("M", &f).unwrap();
        assert_eq!(m.to_vec(), vec![5.0, 2.0, 10.0]);
    }

    #[test]
    fn depth_from_surface_and_bottom() {
        let f = frame(&[("S", &[10.0, 4.0]), ("B", &[7.5, 4.0])]);
        let h = DerivedVariableEvaluator::default().evaluate("H", &f).unwrap();
        assert_eq!(h.to_vec(), vec![2.5, 0.0]);
    }

    #[test]
    fn froude_is_zero_on_dry_nodes() {
        let f = frame(&[("M", &[2.0, 1.0]), ("H", &[4.0 / GRAVITY, 0.0])]);
        let froude = DerivedVariableEvaluator::default().evaluate("F", &f).unwrap();
        assert!((froude[0] - 1.0).abs() < 1e-12);
        assert_eq!(froude[1], 0.0);
    }

    #[test]
    fn chained_evaluation_sees_previous_outputs() {
        let catalog = VariableCatalog::new();
        let equations: Vec<_> = ["H", "I", "J", "Q"]
            .iter()
            .map(|id| catalog.equation(id).unwrap())
            .collect();
        let f = frame(&[
            ("S", &[3.0]),
            ("B", &[1.0]),
            ("U", &[3.0]),
            ("V", &[4.0]),
        ]);
        let derived = DerivedVariableEvaluator::default()
            .evaluate_all(&equations, &f)
            .unwrap();
        assert_eq!(derived.values("H").unwrap()[0], 2.0);
        assert_eq!(derived.values("I").unwrap()[0], 6.0);
        assert_eq!(derived.values("Q").unwrap()[0], 10.0);
        // base frame is untouched
        assert!(f.values("Q").is_none());
    }

    #[test]
    fn unknown_equation_and_missing_input() {
        let f = frame(&[("U", &[1.0])]);
        let evaluator = DerivedVariableEvaluator::default();
        assert!(matches!(
            evaluator.evaluate("ZZ", &f),
            Err(MeshStatsError::UnknownEquation(id)) if id == "ZZ"
        ));
        assert!(matches!(
            evaluator.evaluate("M", &f),
            Err(MeshStatsError::MissingBaseVariable { variable, .. }) if variable == "V"
        ));
    }

    #[test]
    fn friction_velocity_prefers_dataset_coefficient() {
        let evaluator =
            DerivedVariableEvaluator::new(Some(UserEquation::new(FrictionLaw::Chezy, Some(50.0))));
        let with_w = frame(&[("H", &[1.0, 0.0]), ("M", &[2.0, 2.0]), ("W", &[10.0, 10.0])]);
        let us = evaluator.evaluate("US", &with_w).unwrap();
        assert!((us[0] - GRAVITY.sqrt() / 10.0 * 2.0).abs() < 1e-12);
        assert_eq!(us[1], 0.0);

        let without_w = frame(&[("H", &[1.0]), ("M", &[2.0])]);
        let us = evaluator.evaluate("US", &without_w).unwrap();
        assert!((us[0] - GRAVITY.sqrt() / 50.0 * 2.0).abs() < 1e-12);
    }

    #[test]
    fn friction_laws_match_hand_computed_values() {
        // 64^(1/6) = 2 and 11.036 * 1.0 / 0.11036 = 100
        let cases = [
            (FrictionLaw::Chezy, 1.0, 2.0, 50.0, 0.125_283_678_106_926_62),
            (FrictionLaw::Strickler, 64.0, 3.0, 25.0, 0.187_925_517_160_389_9),
            (FrictionLaw::Manning, 64.0, 2.0, 0.03, 0.093_962_758_580_194_95),
            (FrictionLaw::Nikuradse, 1.0, 2.0, 0.110_36, 0.178_060_737_580_333_22),
        ];
        for (law, depth, speed, coefficient, expected) in cases {
            let us = law.friction_velocity(depth, speed, coefficient);
            assert!((us - expected).abs() < 1e-12, "{law:?}: {us} != {expected}");
        }
    }

    #[test]
    fn dry_nodes_have_no_friction_velocity() {
        for law in [
            FrictionLaw::Chezy,
            FrictionLaw::Strickler,
            FrictionLaw::Manning,
            FrictionLaw::Nikuradse,
        ] {
            assert_eq!(law.friction_velocity(0.0, 2.0, 30.0), 0.0, "{law:?}");
            assert_eq!(law.friction_velocity(-0.5, 2.0, 30.0), 0.0, "{law:?}");
        }
    }

    #[test]
    fn nikuradse_roughness_above_log_layer_gives_zero() {
        // ln(11.036 * 0.01 / 1.0) < 0
        assert_eq!(FrictionLaw::Nikuradse.friction_velocity(0.01, 2.0, 1.0), 0.0);
        // ln(11.036 * 1.0 / 11.036) == 0
        assert_eq!(FrictionLaw::Nikuradse.friction_velocity(1.0, 2.0, 11.036), 0.0);
        assert!(FrictionLaw::Nikuradse.friction_velocity(1.0, 2.0, 1.0) > 0.0);
    }

    #[test]
    fn shear_stress_from_friction_velocity() {
        let f = frame(&[("US", &[0.1, 0.0])]);
        let tau = DerivedVariableEvaluator::default().evaluate("TAU", &f).unwrap();
        assert!((tau[0] - 10.0).abs() < 1e-9);
        assert_eq!(tau[1], 0.0);
    }

    #[test]
    fn coefficient_validation() {
        assert!(UserEquation::new(FrictionLaw::Manning, Some(0.03)).validate().is_ok());
        assert!(UserEquation::new(FrictionLaw::Manning, None).validate().is_ok());
        assert!(UserEquation::new(FrictionLaw::Manning, Some(0.0)).validate().is_err());
        assert!(UserEquation::new(FrictionLaw::Manning, Some(f64::NAN)).validate().is_err());
        assert_eq!("Strickler".parse::<FrictionLaw>(), Ok(FrictionLaw::Strickler));
        assert!("darcy".parse::<FrictionLaw>().is_err());
    }
}
