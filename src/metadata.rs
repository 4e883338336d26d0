//! Dataset inspection
//!
//! Summarizes what a mesh dataset holds and which catalog variables can be
//! derived from it, for the `--list-vars` listing.

use crate::data_source::FrameSource;
use crate::errors::{Result, ValidationError};
use crate::frame::VariableSpec;
use crate::variables::{classify, VariableCatalog};

/// Whether a catalog variable can be produced from a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivability {
    Derivable,
    /// Derivable once a friction law is supplied
    NeedsFrictionLaw,
}

/// Structured overview of a mesh dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub frame_count: usize,
    pub node_count: usize,
    pub variables: Vec<VariableSpec>,
    /// First and last frame times
    pub time_range: Option<(f64, f64)>,
    pub derivable: Vec<(VariableSpec, Derivability)>,
}

impl DatasetSummary {
    /// Inspect `source` without reading any frame data
    ///
    /// # Errors
    ///
    /// Fails if the time axis cannot be read.
    pub fn from_source<S: FrameSource + ?Sized>(source: &S) -> Result<Self> {
        let frame_count = source.frame_count();
        let time_range = if frame_count == 0 {
            None
        } else {
            Some((source.time_value(0)?, source.time_value(frame_count - 1)?))
        };

        let available = source.available_variable_ids();
        let derivable = VariableCatalog
            .equations()
            .iter()
            .filter(|equation| !available.iter().any(|id| id == equation.output))
            .filter_map(|equation| {
                let known = VariableCatalog.variable(equation.output)?;
                let spec = VariableSpec::new(known.id, known.name, known.unit);
                match classify(&available, std::slice::from_ref(&spec), None) {
                    Ok(_) => Some((spec, Derivability::Derivable)),
                    Err(
                        ValidationError::FrictionLawRequired(_)
                        | ValidationError::MissingFrictionCoefficient { .. },
                    ) => Some((spec, Derivability::NeedsFrictionLaw)),
                    Err(_) => None,
                }
            })
            .collect();

        Ok(Self {
            frame_count,
            node_count: source.node_count(),
            variables: source.variables().to_vec(),
            time_range,
            derivable,
        })
    }

    /// Prints the summary in a readable layout
    pub fn print(&self) {
        println!("\n Dataset");
        println!("===========");
        println!("    Frames: {}", self.frame_count);
        println!("    Nodes: {}", self.node_count);
        match self.time_range {
            Some((first, last)) => println!("    Time: {first} .. {last}"),
            None => println!("    Time: (no frames)"),
        }

        println!("\n Variables");
        println!("=============");
        if self.variables.is_empty() {
            println!("   (No mesh variables found)");
        }
        for spec in &self.variables {
            print_spec(spec, "");
        }

        println!("\n Derivable Variables");
        println!("=======================");
        if self.derivable.is_empty() {
            println!("   (None)");
        }
        for (spec, derivability) in &self.derivable {
            let note = match derivability {
                Derivability::Derivable => "",
                Derivability::NeedsFrictionLaw => " (needs --friction-law)",
            };
            print_spec(spec, note);
        }
    }
}

fn print_spec(spec: &VariableSpec, note: &str) {
    if spec.unit.is_empty() {
        println!("    {}: {}{}", spec.id, spec.name, note);
    } else {
        println!("    {}: {} [{}]{}", spec.id, spec.name, spec.unit, note);
    }
}
