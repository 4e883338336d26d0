//! Static knowledge about mesh variables
//!
//! The catalog answers three questions: what a variable id means, which pairs
//! of ids form one physical vector, and how a variable missing from a dataset
//! can be computed from the ones it does contain.

/// A variable the catalog knows by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownVariable {
    pub id: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
}

/// Two component ids forming one vector, and the id of its magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoupleDefinition {
    pub first: &'static str,
    pub second: &'static str,
    pub magnitude: &'static str,
}

impl CoupleDefinition {
    /// The other component of the couple, if `id` is one of its components
    #[must_use]
    pub fn partner_of(&self, id: &str) -> Option<&'static str> {
        if id == self.first {
            Some(self.second)
        } else if id == self.second {
            Some(self.first)
        } else {
            None
        }
    }
}

/// Elementwise formula applied by an equation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquationKind {
    /// `a - b`
    Difference,
    /// `a + b`
    Sum,
    /// `a * b`
    Product,
    /// `sqrt(a^2 + b^2)`
    Magnitude,
    /// `M / sqrt(g H)`, zero on dry nodes
    Froude,
    /// Friction velocity from a user-chosen friction law
    FrictionVelocity,
    /// `rho * US^2`
    ShearStress,
}

/// Rule producing one derived variable from one frame's values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Equation {
    pub output: &'static str,
    pub inputs: &'static [&'static str],
    /// Inputs used when the dataset has them, replaced by user coefficients otherwise
    pub optional_inputs: &'static [&'static str],
    pub kind: EquationKind,
}

impl Equation {
    /// Whether this equation needs a user-supplied friction law
    #[must_use]
    pub fn needs_user_equation(&self) -> bool {
        matches!(self.kind, EquationKind::FrictionVelocity)
    }
}

const VARIABLES: &[KnownVariable] = &[
    KnownVariable { id: "U", name: "VELOCITY U", unit: "M/S" },
    KnownVariable { id: "V", name: "VELOCITY V", unit: "M/S" },
    KnownVariable { id: "M", name: "SCALAR VELOCITY", unit: "M/S" },
    KnownVariable { id: "H", name: "WATER DEPTH", unit: "M" },
    KnownVariable { id: "S", name: "FREE SURFACE", unit: "M" },
    KnownVariable { id: "B", name: "BOTTOM", unit: "M" },
    KnownVariable { id: "I", name: "FLOWRATE ALONG X", unit: "M2/S" },
    KnownVariable { id: "J", name: "FLOWRATE ALONG Y", unit: "M2/S" },
    KnownVariable { id: "Q", name: "SCALAR FLOWRATE", unit: "M2/S" },
    KnownVariable { id: "F", name: "FROUDE NUMBER", unit: "" },
    KnownVariable { id: "W", name: "FRICTION COEFFICIENT", unit: "" },
    KnownVariable { id: "X", name: "WIND ALONG X", unit: "M/S" },
    KnownVariable { id: "Y", name: "WIND ALONG Y", unit: "M/S" },
    KnownVariable { id: "WS", name: "WIND SPEED", unit: "M/S" },
    KnownVariable { id: "US", name: "FRICTION VELOCITY", unit: "M/S" },
    KnownVariable { id: "TAU", name: "BED SHEAR STRESS", unit: "PASCAL" },
];

const COUPLES: &[CoupleDefinition] = &[
    CoupleDefinition { first: "U", second: "V", magnitude: "M" },
    CoupleDefinition { first: "I", second: "J", magnitude: "Q" },
    CoupleDefinition { first: "X", second: "Y", magnitude: "WS" },
];

const EQUATIONS: &[Equation] = &[
    Equation { output: "H", inputs: &["S", "B"], optional_inputs: &[], kind: EquationKind::Difference },
    Equation { output: "S", inputs: &["H", "B"], optional_inputs: &[], kind: EquationKind::Sum },
    Equation { output: "B", inputs: &["S", "H"], optional_inputs: &[], kind: EquationKind::Difference },
    Equation { output: "M", inputs: &["U", "V"], optional_inputs: &[], kind: EquationKind::Magnitude },
    Equation { output: "I", inputs: &["H", "U"], optional_inputs: &[], kind: EquationKind::Product },
    Equation { output: "J", inputs: &["H", "V"], optional_inputs: &[], kind: EquationKind::Product },
    Equation { output: "Q", inputs: &["I", "J"], optional_inputs: &[], kind: EquationKind::Magnitude },
    Equation { output: "WS", inputs: &["X", "Y"], optional_inputs: &[], kind: EquationKind::Magnitude },
    Equation { output: "F", inputs: &["M", "H"], optional_inputs: &[], kind: EquationKind::Froude },
    Equation { output: "US", inputs: &["H", "M"], optional_inputs: &["W"], kind: EquationKind::FrictionVelocity },
    Equation { output: "TAU", inputs: &["US"], optional_inputs: &[], kind: EquationKind::ShearStress },
];

/// Declarative catalog of variables, couples and equations
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableCatalog;

impl VariableCatalog {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn variable(&self, id: &str) -> Option<&'static KnownVariable> {
        VARIABLES.iter().find(|v| v.id == id)
    }

    #[must_use]
    pub fn variables(&self) -> &'static [KnownVariable] {
        VARIABLES
    }

    /// The couple `id` is a component of, if any
    #[must_use]
    pub fn couple_of(&self, id: &str) -> Option<&'static CoupleDefinition> {
        COUPLES.iter().find(|c| c.first == id || c.second == id)
    }

    #[must_use]
    pub fn couples(&self) -> &'static [CoupleDefinition] {
        COUPLES
    }

    /// The equation producing `output`, if the variable is derivable
    #[must_use]
    pub fn equation(&self, output: &str) -> Option<&'static Equation> {
        EQUATIONS.iter().find(|e| e.output == output)
    }

    #[must_use]
    pub fn equations(&self) -> &'static [Equation] {
        EQUATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_equation_output_is_a_known_variable() {
        let catalog = VariableCatalog::new();
        for equation in catalog.equations() {
            assert!(catalog.variable(equation.output).is_some(), "{}", equation.output);
            for input in equation.inputs.iter().chain(equation.optional_inputs) {
                assert!(catalog.variable(input).is_some(), "{input}");
            }
        }
    }

    #[test]
    fn couples_are_found_from_either_component() {
        let catalog = VariableCatalog::new();
        assert_eq!(catalog.couple_of("V").map(|c| c.magnitude), Some("M"));
        assert_eq!(catalog.couple_of("I").and_then(|c| c.partner_of("I")), Some("J"));
        assert!(catalog.couple_of("H").is_none());
    }

    #[test]
    fn equation_ids_are_unique() {
        let catalog = VariableCatalog::new();
        let mut outputs: Vec<_> = catalog.equations().iter().map(|e| e.output).collect();
        outputs.sort_unstable();
        outputs.dedup();
        assert_eq!(outputs.len(), catalog.equations().len());
    }
}
