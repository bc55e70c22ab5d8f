//! Error types for measurement handling, ingredient validation and recipe propagation.

use std::sync::Arc;

use thiserror::Error;

use crate::graph::Metric;

/// A quantity string could not be decomposed into an amount and a unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The input has no leading numeric amount.
    #[error("no numeric amount in {input:?}")]
    NoAmount {
        /// The rejected input.
        input: String,
    },

    /// The input has an amount but no unit, and no unit was assumed.
    #[error("no unit in {input:?}")]
    MissingUnit {
        /// The rejected input.
        input: String,
    },

    /// The amount is NaN or infinite.
    #[error("amount {amount} is not finite")]
    NotFinite {
        /// The rejected amount.
        amount: f64,
    },

    /// The unit label is empty.
    #[error("unit label must not be empty")]
    EmptyUnit,

    /// The unit label starts like a number, so the formatted measurement
    /// would not parse back to the same amount and unit.
    #[error("unit label {unit:?} must not start with a digit, sign, dot or slash")]
    NumericUnit {
        /// The rejected label.
        unit: String,
    },
}

/// The requested unit pair has no known conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The unit label is not known to the converter.
    #[error("unknown unit {unit:?}")]
    UnknownUnit {
        /// The unrecognized label.
        unit: String,
    },

    /// Both units are known but measure different dimensions.
    #[error("cannot convert {from:?} to {to:?}")]
    Incompatible {
        /// Source unit.
        from: String,
        /// Target unit.
        to: String,
    },
}

/// An enum-typed setter received a value outside its known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{value:?} is not a valid {kind} (expected one of: {})", expected.join(", "))]
pub struct InvalidEnumValue {
    /// Name of the enumeration, e.g. `"fermentable type"`.
    pub kind: &'static str,
    /// The rejected value, as given.
    pub value: String,
    /// Canonical names accepted by the enumeration.
    pub expected: &'static [&'static str],
}

/// Failure reported by a formula collaborator.
#[derive(Debug, Clone, Error)]
pub enum FormulaError {
    /// The formula produced NaN or infinity, usually from a zero divisor.
    #[error("{formula} produced a non-finite result")]
    NonFinite {
        /// Name of the formula.
        formula: &'static str,
    },

    /// An input was outside the domain the formula accepts.
    #[error("{formula}: {message}")]
    InvalidInput {
        /// Name of the formula.
        formula: &'static str,
        /// Human readable description.
        message: String,
    },

    /// Error raised by a third-party formula implementation.
    #[error("external formula error: {0}")]
    External(Arc<anyhow::Error>),
}

impl From<anyhow::Error> for FormulaError {
    fn from(err: anyhow::Error) -> Self {
        FormulaError::External(Arc::new(err))
    }
}

/// The declared dependency edges do not form a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Dependency cycle detected.
    #[error("dependency cycle detected: {}", path.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(" -> "))]
    Cycle {
        /// Metrics forming the cycle, first metric repeated at the end.
        path: Vec<Metric>,
    },

    /// A metric depends on itself directly.
    #[error("{0} depends on itself")]
    SelfDependency(Metric),
}

/// Errors surfaced by recipe mutators and getters.
#[derive(Debug, Clone, Error)]
pub enum RecipeError {
    /// A quantity could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A unit conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// An enumerated field received an unknown value.
    #[error(transparent)]
    InvalidEnum(#[from] InvalidEnumValue),

    /// A formula collaborator failed while recomputing a metric.
    #[error("recomputing {metric} failed: {source}")]
    Formula {
        /// The metric being recomputed.
        metric: Metric,
        /// Underlying formula failure.
        source: FormulaError,
    },

    /// The dependency graph is invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A value was outside the range its field accepts.
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Human readable description.
        message: String,
    },

    /// An ingredient index was out of bounds.
    #[error("no {kind} at index {index} (recipe has {len})")]
    IndexOutOfRange {
        /// Ingredient list name.
        kind: &'static str,
        /// Requested index.
        index: usize,
        /// Current list length.
        len: usize,
    },
}

/// Convenience alias used across the crate.
pub type Result<T, E = RecipeError> = std::result::Result<T, E>;
