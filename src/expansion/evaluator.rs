//! Turns decision vectors into evaluated portfolios.
use super::constraint::{Constraint, ConstraintList, total_violation};
use crate::demand::DemandSeries;
use crate::dispatch::{self, DispatchOptions, DispatchStrategy};
use crate::error::{TechmixError, ensure_config};
use crate::objective::{self, Objective, ObjectiveList, ObjectiveVector};
use crate::pareto::Evaluation;
use crate::portfolio::{Portfolio, TechnologyList};
use crate::units::Power;
use log::{debug, warn};
use rayon::prelude::*;
use std::sync::Arc;

/// The objective value assigned to portfolios which cannot be dispatched
pub const DEFAULT_PENALTY: f64 = 1e40;

/// Everything needed to score a candidate portfolio.
///
/// Each candidate is dispatched against the demand series and then scored by every objective.
/// Candidates which cannot be dispatched are given a penalty value for every objective rather
/// than being discarded.
#[derive(Debug, Clone)]
pub struct Evaluator {
    technologies: TechnologyList,
    demand: DemandSeries,
    objectives: ObjectiveList,
    constraints: ConstraintList,
    strategy: DispatchStrategy,
    options: DispatchOptions,
    penalty: f64,
}

impl Evaluator {
    /// Create a new evaluator, checking that the inputs are consistent
    pub fn new(
        technologies: TechnologyList,
        demand: DemandSeries,
        objectives: ObjectiveList,
        strategy: DispatchStrategy,
        options: DispatchOptions,
    ) -> Result<Self, TechmixError> {
        ensure_config!(!technologies.is_empty(), "At least one technology is required");
        for tech in technologies.iter() {
            tech.validate()?;
        }
        objective::check_objectives(&objectives)?;
        objective::check_attributes(&objectives, &technologies)?;
        options.validate()?;

        Ok(Self {
            technologies,
            demand,
            objectives,
            constraints: Vec::new(),
            strategy,
            options,
            penalty: DEFAULT_PENALTY,
        })
    }

    /// Add a constraint which candidates should satisfy
    pub fn with_constraint(mut self, constraint: Arc<dyn Constraint>) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Use a different penalty for portfolios which cannot be dispatched
    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    /// The technologies from which portfolios are built
    pub fn technologies(&self) -> &TechnologyList {
        &self.technologies
    }

    /// The demand series portfolios are dispatched against
    pub fn demand(&self) -> &DemandSeries {
        &self.demand
    }

    /// The objectives, in order
    pub fn objectives(&self) -> &[Arc<dyn Objective>] {
        &self.objectives
    }

    /// The registered constraints
    pub fn constraints(&self) -> &[Arc<dyn Constraint>] {
        &self.constraints
    }

    /// The dispatch strategy
    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    /// The dispatch options
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Evaluate a single candidate
    pub fn evaluate(&self, capacities: Vec<Power>) -> Result<Evaluation, TechmixError> {
        let portfolio = Portfolio::new(self.technologies.clone(), capacities)?;
        let result = dispatch::solve(&portfolio, &self.demand, self.strategy, &self.options);
        let schedule = match result {
            Ok(schedule) => schedule,
            Err(err) if err.is_infeasible() => {
                debug!(
                    "Portfolio {:?} penalised: {err}",
                    portfolio.decision_vector()
                );
                let violation = total_violation(&self.constraints, &portfolio, None);
                return Ok(self.penalised(portfolio, violation));
            }
            Err(err) => return Err(err),
        };

        let objectives = objective::evaluate(&self.objectives, &portfolio, Some(&schedule))?;
        let fitness = objectives.to_minimisation(&self.objectives);
        let violation = total_violation(&self.constraints, &portfolio, Some(&schedule));

        Ok(Evaluation {
            portfolio,
            objectives,
            fitness,
            violation,
            dispatch_feasible: true,
        })
    }

    /// Evaluate many candidates in parallel.
    ///
    /// Results are returned in the same order as `candidates`.
    pub fn evaluate_all(
        &self,
        candidates: Vec<Vec<Power>>,
    ) -> Result<Vec<Evaluation>, TechmixError> {
        candidates
            .into_par_iter()
            .enumerate()
            .map(|(index, capacities)| {
                self.evaluate(capacities).inspect_err(|err| {
                    warn!("Evaluation of candidate {index} failed: {err}");
                })
            })
            .collect()
    }

    fn penalised(&self, portfolio: Portfolio, violation: f64) -> Evaluation {
        Evaluation {
            portfolio,
            objectives: ObjectiveVector::penalty(&self.objectives, self.penalty),
            fitness: vec![self.penalty; self.objectives.len()],
            violation,
            dispatch_feasible: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion::constraint::CapacityCreditRequirement;
    use crate::fixture::{demand, technologies, total_cost_objective};
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn evaluator(
        technologies: TechnologyList,
        demand: DemandSeries,
        total_cost_objective: ObjectiveList,
    ) -> Evaluator {
        Evaluator::new(
            technologies,
            demand,
            total_cost_objective,
            DispatchStrategy::Hierarchical,
            DispatchOptions::default(),
        )
        .unwrap()
    }

    #[rstest]
    fn test_evaluate_feasible(evaluator: Evaluator) {
        let evaluation = evaluator
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        assert!(evaluation.is_feasible());
        // 80 * (1000 / 20 + 10) + 3 * 80 * 25
        assert_approx_eq!(f64, evaluation.objectives.values()[0], 10800.0);
        assert_eq!(evaluation.fitness, evaluation.objectives.values());
    }

    #[rstest]
    fn test_evaluate_infeasible_is_penalised(evaluator: Evaluator) {
        let evaluation = evaluator
            .evaluate(vec![Power(10.0), Power(0.0), Power(0.0)])
            .unwrap();
        assert!(!evaluation.dispatch_feasible);
        assert_eq!(evaluation.fitness, [DEFAULT_PENALTY]);
    }

    #[rstest]
    fn test_evaluate_constraint_violation(evaluator: Evaluator) {
        let evaluator =
            evaluator.with_constraint(Arc::new(CapacityCreditRequirement::new(Power(100.0))));
        let evaluation = evaluator
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        assert!(evaluation.dispatch_feasible);
        assert!(!evaluation.is_feasible());
        assert_approx_eq!(f64, evaluation.violation, 20.0);
    }

    #[rstest]
    fn test_evaluate_all_keeps_order(evaluator: Evaluator) {
        let candidates = (0..8)
            .map(|i| vec![Power(80.0 + f64::from(i)), Power(0.0), Power(0.0)])
            .collect();
        let evaluations = evaluator.evaluate_all(candidates).unwrap();
        for (i, evaluation) in evaluations.iter().enumerate() {
            assert_approx_eq!(f64, evaluation.decision_vector()[0], 80.0 + i as f64);
        }
    }

    #[rstest]
    fn test_new_rejects_duplicate_objectives(
        technologies: TechnologyList,
        demand: DemandSeries,
        total_cost_objective: ObjectiveList,
    ) {
        let objectives = [total_cost_objective.clone(), total_cost_objective].concat();
        assert!(matches!(
            Evaluator::new(
                technologies,
                demand,
                objectives,
                DispatchStrategy::Exact,
                DispatchOptions::default()
            ),
            Err(TechmixError::InvalidConfiguration(_))
        ));
    }
}
