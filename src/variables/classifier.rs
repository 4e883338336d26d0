//! Classification of requested output variables
//!
//! A request is split into independent scalars, vector couples whose two
//! components are both requested, and the ordered list of equations that must
//! run on every frame to produce whatever the dataset does not store.

use super::catalog::{Equation, VariableCatalog};
use super::equations::UserEquation;
use crate::errors::ValidationError;
use crate::frame::VariableSpec;

/// Two requested variables reduced together as one physical vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorCouple {
    pub first: VariableSpec,
    pub second: VariableSpec,
    /// Id of the magnitude variable the couple maps to
    pub magnitude: String,
}

/// Output of [`classify`]
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub scalars: Vec<VariableSpec>,
    pub vectors: Vec<VectorCouple>,
    /// Equations in dependency order, each listed once
    pub equations: Vec<&'static Equation>,
    output_order: Vec<VariableSpec>,
    base_variables: Vec<String>,
}

impl Classification {
    /// Requested variables in the order rows must be assembled, duplicates removed
    #[must_use]
    pub fn output_order(&self) -> &[VariableSpec] {
        &self.output_order
    }

    /// Dataset variables that must be read from every frame
    #[must_use]
    pub fn base_variables(&self) -> &[String] {
        &self.base_variables
    }

    /// Whether some equation needs a friction law
    #[must_use]
    pub fn needs_user_equation(&self) -> bool {
        self.equations.iter().any(|e| e.needs_user_equation())
    }
}

/// Partition `requested` into scalars, vector couples and required equations
///
/// # Errors
///
/// Returns a [`ValidationError`] if the request is empty, names a variable
/// that is neither available nor derivable, or needs a friction law that was
/// not supplied.
pub fn classify(
    available_ids: &[String],
    requested: &[VariableSpec],
    user_equation: Option<&UserEquation>,
) -> Result<Classification, ValidationError> {
    if requested.is_empty() {
        return Err(ValidationError::EmptyRequest);
    }

    let catalog = VariableCatalog::new();
    let is_available = |id: &str| available_ids.iter().any(|a| a == id);

    let mut output_order: Vec<VariableSpec> = Vec::with_capacity(requested.len());
    for spec in requested {
        if !output_order.iter().any(|s| s.id == spec.id) {
            output_order.push(spec.clone());
        }
    }

    let mut plan: Vec<&'static Equation> = Vec::new();
    for spec in &output_order {
        if is_available(&spec.id) || plan.iter().any(|e| e.output == spec.id) {
            continue;
        }
        let equation = catalog.equation(&spec.id).ok_or_else(|| {
            if catalog.variable(&spec.id).is_some() {
                ValidationError::UnknownEquation(spec.id.clone())
            } else {
                ValidationError::UnknownVariable(spec.id.clone())
            }
        })?;

        let mark = plan.len();
        let mut visiting = vec![equation.output];
        for input in equation.inputs {
            if !resolve(&catalog, input, &is_available, &mut visiting, &mut plan) {
                plan.truncate(mark);
                return Err(ValidationError::MissingBaseVariable {
                    variable: (*input).to_string(),
                    required_by: spec.id.clone(),
                });
            }
        }
        plan.push(equation);
    }

    if let Some(equation) = plan.iter().find(|e| e.needs_user_equation()) {
        let user_equation = user_equation
            .ok_or_else(|| ValidationError::FrictionLawRequired(equation.output.to_string()))?;
        user_equation.validate()?;
        let has_coefficient_variable = equation.optional_inputs.iter().all(|id| is_available(*id));
        if !has_coefficient_variable && user_equation.coefficient.is_none() {
            return Err(ValidationError::MissingFrictionCoefficient {
                law: user_equation.law.as_str().to_string(),
            });
        }
    }

    let (scalars, vectors) = split_couples(&catalog, &output_order);

    let mut base_variables: Vec<String> = Vec::new();
    let mut push_base = |id: &str| {
        if is_available(id) && !base_variables.iter().any(|b| b == id) {
            base_variables.push(id.to_string());
        }
    };
    for spec in &output_order {
        push_base(&spec.id);
    }
    for equation in &plan {
        for id in equation.inputs.iter().chain(equation.optional_inputs) {
            push_base(*id);
        }
    }

    Ok(Classification {
        scalars,
        vectors,
        equations: plan,
        output_order,
        base_variables,
    })
}

/// Depth-first resolution of `id`, appending needed equations to `plan`
fn resolve(
    catalog: &VariableCatalog,
    id: &str,
    is_available: &impl Fn(&str) -> bool,
    visiting: &mut Vec<&'static str>,
    plan: &mut Vec<&'static Equation>,
) -> bool {
    if is_available(id) || plan.iter().any(|e| e.output == id) {
        return true;
    }
    let Some(equation) = catalog.equation(id) else {
        return false;
    };
    if visiting.contains(&equation.output) {
        return false;
    }

    let mark = plan.len();
    visiting.push(equation.output);
    let resolved = equation
        .inputs
        .iter()
        .all(|input| resolve(catalog, input, is_available, visiting, plan));
    visiting.pop();

    if resolved {
        plan.push(equation);
    } else {
        plan.truncate(mark);
    }
    resolved
}

/// Pair up requested couple components; unpaired components stay scalars
fn split_couples(
    catalog: &VariableCatalog,
    output_order: &[VariableSpec],
) -> (Vec<VariableSpec>, Vec<VectorCouple>) {
    let mut scalars = Vec::new();
    let mut vectors: Vec<VectorCouple> = Vec::new();

    for spec in output_order {
        let already_paired = vectors
            .iter()
            .any(|v| v.first.id == spec.id || v.second.id == spec.id);
        if already_paired {
            continue;
        }

        let partner = catalog.couple_of(&spec.id).and_then(|couple| {
            let partner_id = couple.partner_of(&spec.id)?;
            output_order
                .iter()
                .find(|s| s.id == partner_id)
                .map(|partner| (couple, partner))
        });

        match partner {
            Some((couple, partner)) => {
                let (first, second) = if spec.id == couple.first {
                    (spec.clone(), partner.clone())
                } else {
                    (partner.clone(), spec.clone())
                };
                vectors.push(VectorCouple {
                    first,
                    second,
                    magnitude: couple.magnitude.to_string(),
                });
            }
            None => scalars.push(spec.clone()),
        }
    }

    (scalars, vectors)
}
