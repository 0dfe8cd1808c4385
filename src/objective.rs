//! Objectives map a portfolio (and optionally its dispatch schedule) to a single number.
//!
//! Objectives are trait objects so that users can register their own alongside the built-ins in
//! [`builtin`]. Closures can be used as objectives via [`FnObjective`].
use crate::dispatch::DispatchSchedule;
use crate::error::{TechmixError, ensure_config};
use crate::portfolio::Portfolio;
use crate::technology::Technology;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::fmt;
use std::sync::Arc;

pub mod builtin;
pub mod config;
pub use config::ObjectiveConfig;

/// Whether an objective should be minimised or maximised
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum Sense {
    /// Lower values are better
    #[default]
    #[string = "minimise"]
    Minimise,
    /// Higher values are better
    #[string = "maximise"]
    Maximise,
}

impl Sense {
    /// Convert a value so that lower is always better
    pub fn to_minimisation(self, value: f64) -> f64 {
        match self {
            Self::Minimise => value,
            Self::Maximise => -value,
        }
    }
}

/// A quantity to optimise
pub trait Objective: Send + Sync + fmt::Debug {
    /// The name of the objective, used in output files and error messages
    fn name(&self) -> &str;

    /// Whether the objective is minimised or maximised
    fn sense(&self) -> Sense {
        Sense::Minimise
    }

    /// Attributes which every technology must have for this objective to be evaluated
    fn required_attributes(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Whether evaluation needs a dispatch schedule
    fn requires_dispatch(&self) -> bool {
        false
    }

    /// Calculate the objective value.
    ///
    /// `schedule` is guaranteed to be present if [`Objective::requires_dispatch`] returns true
    /// when called through [`evaluate`]. The built-in objectives return NaN if it is missing.
    fn evaluate(&self, portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64;
}

/// The objectives registered for a run, in order
pub type ObjectiveList = Vec<Arc<dyn Objective>>;

/// One value per registered objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveVector(pub Vec<f64>);

impl ObjectiveVector {
    /// Number of objective values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The values as a slice
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Convert to a vector in which lower is better for every objective
    pub fn to_minimisation(&self, objectives: &[Arc<dyn Objective>]) -> Vec<f64> {
        self.0
            .iter()
            .zip(objectives)
            .map(|(value, objective)| objective.sense().to_minimisation(*value))
            .collect()
    }

    /// A vector with `penalty` (in minimisation form) for every objective
    pub fn penalty(objectives: &[Arc<dyn Objective>], penalty: f64) -> Self {
        Self(
            objectives
                .iter()
                .map(|objective| objective.sense().to_minimisation(penalty))
                .collect(),
        )
    }
}

/// Check that there is at least one objective and that objective names are unique
pub fn check_objectives(objectives: &[Arc<dyn Objective>]) -> Result<(), TechmixError> {
    ensure_config!(!objectives.is_empty(), "At least one objective is required");
    for (i, objective) in objectives.iter().enumerate() {
        ensure_config!(
            !objectives[..i]
                .iter()
                .any(|other| other.name() == objective.name()),
            "Objective '{}' is registered more than once",
            objective.name()
        );
    }

    Ok(())
}

/// Check that every technology has every attribute the objectives need
pub fn check_attributes(
    objectives: &[Arc<dyn Objective>],
    technologies: &[Technology],
) -> Result<(), TechmixError> {
    for objective in objectives {
        for attribute in objective.required_attributes() {
            if let Some(tech) = technologies
                .iter()
                .find(|tech| tech.attribute(attribute).is_none())
            {
                return Err(TechmixError::MissingAttribute {
                    technology: tech.id.clone(),
                    attribute: attribute.to_string(),
                    objective: objective.name().to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Whether any of the objectives needs a dispatch schedule
pub fn any_requires_dispatch(objectives: &[Arc<dyn Objective>]) -> bool {
    objectives.iter().any(|objective| objective.requires_dispatch())
}

/// Evaluate every objective for a portfolio.
///
/// # Arguments
///
/// * `objectives` - The objectives to evaluate
/// * `portfolio` - The portfolio to score
/// * `schedule` - The portfolio's dispatch schedule, if it has been dispatched
///
/// # Returns
///
/// One value per objective, in the same order as `objectives`.
pub fn evaluate(
    objectives: &[Arc<dyn Objective>],
    portfolio: &Portfolio,
    schedule: Option<&DispatchSchedule>,
) -> Result<ObjectiveVector, TechmixError> {
    check_attributes(objectives, portfolio.technologies())?;

    let mut values = Vec::with_capacity(objectives.len());
    for objective in objectives {
        if objective.requires_dispatch() && schedule.is_none() {
            return Err(TechmixError::invalid(format!(
                "Objective '{}' requires a dispatch schedule",
                objective.name()
            )));
        }
        values.push(objective.evaluate(portfolio, schedule));
    }

    Ok(ObjectiveVector(values))
}

/// An objective defined by a closure
pub struct FnObjective<F> {
    name: String,
    sense: Sense,
    requires_dispatch: bool,
    required_attributes: Vec<String>,
    func: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&Portfolio, Option<&DispatchSchedule>) -> f64 + Send + Sync,
{
    /// Create a new objective from a closure
    pub fn new(name: &str, sense: Sense, func: F) -> Self {
        Self {
            name: name.to_string(),
            sense,
            requires_dispatch: false,
            required_attributes: Vec::new(),
            func,
        }
    }

    /// Mark the objective as needing a dispatch schedule
    pub fn with_dispatch(mut self) -> Self {
        self.requires_dispatch = true;
        self
    }

    /// Declare an attribute which every technology must have
    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.required_attributes.push(attribute.to_string());
        self
    }
}

impl<F> fmt::Debug for FnObjective<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObjective")
            .field("name", &self.name)
            .field("sense", &self.sense)
            .finish_non_exhaustive()
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&Portfolio, Option<&DispatchSchedule>) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn sense(&self) -> Sense {
        self.sense
    }

    fn required_attributes(&self) -> Vec<&str> {
        self.required_attributes.iter().map(String::as_str).collect()
    }

    fn requires_dispatch(&self) -> bool {
        self.requires_dispatch
    }

    fn evaluate(&self, portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64 {
        (self.func)(portfolio, schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::builtin::{AnnualEmission, AnnualisedCapitalCost};
    use super::*;
    use crate::fixture::portfolio;
    use rstest::rstest;

    #[rstest]
    fn test_evaluate_closure(portfolio: Portfolio) {
        let total_capacity = FnObjective::new("capacity", Sense::Maximise, |p, _| {
            p.total_capacity().0
        });
        let objectives: ObjectiveList = vec![Arc::new(total_capacity)];
        let values = evaluate(&objectives, &portfolio, None).unwrap();
        assert_eq!(values, ObjectiveVector(vec![140.0]));
        assert_eq!(values.to_minimisation(&objectives), [-140.0]);
    }

    #[rstest]
    fn test_evaluate_requires_dispatch(portfolio: Portfolio) {
        let objectives: ObjectiveList = vec![Arc::new(AnnualEmission::default())];
        assert!(matches!(
            evaluate(&objectives, &portfolio, None),
            Err(TechmixError::InvalidConfiguration(_))
        ));
    }

    #[rstest]
    fn test_evaluate_missing_attribute(portfolio: Portfolio) {
        let objective = FnObjective::new("land_use", Sense::Minimise, |_, _| 0.0)
            .with_attribute("land_intensity");
        let objectives: ObjectiveList = vec![Arc::new(objective)];
        assert_eq!(
            evaluate(&objectives, &portfolio, None),
            Err(TechmixError::MissingAttribute {
                technology: "thermal".into(),
                attribute: "land_intensity".into(),
                objective: "land_use".into(),
            })
        );
    }

    #[test]
    fn test_check_objectives() {
        assert!(check_objectives(&[]).is_err());
        let objectives: ObjectiveList = vec![
            Arc::new(AnnualisedCapitalCost),
            Arc::new(AnnualisedCapitalCost),
        ];
        assert!(check_objectives(&objectives).is_err());
        assert!(check_objectives(&objectives[..1]).is_ok());
    }

    #[test]
    fn test_penalty_vector() {
        let objectives: ObjectiveList = vec![
            Arc::new(AnnualisedCapitalCost),
            Arc::new(FnObjective::new("resilience", Sense::Maximise, |_, _| 0.0)),
        ];
        assert_eq!(
            ObjectiveVector::penalty(&objectives, 1e40),
            ObjectiveVector(vec![1e40, -1e40])
        );
    }

    #[test]
    fn test_sense_to_minimisation() {
        assert_eq!(Sense::Minimise.to_minimisation(2.0), 2.0);
        assert_eq!(Sense::Maximise.to_minimisation(2.0), -2.0);
    }
}
