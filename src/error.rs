//! Typed errors raised by the dispatch engine, objective evaluation, search and MGA.
//!
//! The input and CLI layers wrap these in [`anyhow::Error`] with extra context.
use crate::technology::TechnologyID;
use itertools::Itertools;

/// Errors which can occur while designing a portfolio
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum TechmixError {
    /// The dispatch problem has no feasible solution
    #[display("Dispatch is infeasible: {reason}")]
    Infeasible {
        /// Why the problem could not be solved
        reason: String,
    },
    /// A technology lacks an attribute which an objective depends on
    #[display(
        "Technology {technology} is missing attribute '{attribute}' required by objective \
        '{objective}'"
    )]
    MissingAttribute {
        /// The offending technology
        technology: TechnologyID,
        /// The missing attribute
        attribute: String,
        /// The objective requiring the attribute
        objective: String,
    },
    /// No candidate lies within the slack of the reference
    #[display("No near-optimal alternatives found within slack [{}]", slack.iter().join(", "))]
    EmptyRegion {
        /// The slack values used to define the region
        slack: Vec<f64>,
    },
    /// Inputs are inconsistent (e.g. lengths do not match)
    #[display("Invalid configuration: {_0}")]
    InvalidConfiguration(String),
    /// The LP solver returned an unexpected status
    #[display("Solver error: {_0}")]
    Solver(String),
}

impl std::error::Error for TechmixError {}

impl TechmixError {
    /// Shorthand for creating an [`TechmixError::InvalidConfiguration`]
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Shorthand for creating an [`TechmixError::Infeasible`]
    pub fn infeasible<S: Into<String>>(reason: S) -> Self {
        Self::Infeasible {
            reason: reason.into(),
        }
    }

    /// Whether this error signals an infeasible dispatch
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::Infeasible { .. })
    }
}

/// Return early with [`TechmixError::InvalidConfiguration`] if the condition does not hold
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::TechmixError::invalid(format!($($arg)+)));
        }
    };
}
pub(crate) use ensure_config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_empty_region() {
        let err = TechmixError::EmptyRegion {
            slack: vec![0.05, 0.1],
        };
        assert_eq!(
            err.to_string(),
            "No near-optimal alternatives found within slack [0.05, 0.1]"
        );
    }

    #[test]
    fn test_display_missing_attribute() {
        let err = TechmixError::MissingAttribute {
            technology: "coal".into(),
            attribute: "co2_rate".into(),
            objective: "annual_emission".into(),
        };
        assert_eq!(
            err.to_string(),
            "Technology coal is missing attribute 'co2_rate' required by objective \
            'annual_emission'"
        );
    }

    #[test]
    fn test_is_infeasible() {
        assert!(TechmixError::infeasible("x").is_infeasible());
        assert!(!TechmixError::invalid("x").is_infeasible());
    }
}
