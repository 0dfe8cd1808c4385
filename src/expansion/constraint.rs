//! Constraints on candidate portfolios beyond what dispatch enforces.
use crate::dispatch::DispatchSchedule;
use crate::portfolio::Portfolio;
use crate::units::Power;
use std::fmt;
use std::sync::Arc;

/// A condition a portfolio should satisfy.
///
/// Violations are not rejected outright. Instead, an evaluation with a smaller total violation
/// always dominates one with a larger total violation.
pub trait Constraint: Send + Sync + fmt::Debug {
    /// The name of the constraint, used in log messages
    fn name(&self) -> &str;

    /// How badly the constraint is violated.
    ///
    /// Values less than or equal to zero mean the constraint is satisfied. `schedule` is absent
    /// if the portfolio could not be dispatched.
    fn violation(&self, portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64;
}

/// The constraints registered for a run
pub type ConstraintList = Vec<Arc<dyn Constraint>>;

/// Sum of the positive violations of every constraint
pub fn total_violation(
    constraints: &[Arc<dyn Constraint>],
    portfolio: &Portfolio,
    schedule: Option<&DispatchSchedule>,
) -> f64 {
    constraints
        .iter()
        .map(|constraint| constraint.violation(portfolio, schedule).max(0.0))
        .sum()
}

/// Firm capacity (capacity weighted by capacity credit) must meet a requirement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityCreditRequirement {
    /// The required firm capacity
    pub requirement: Power,
}

impl CapacityCreditRequirement {
    /// Create a new requirement
    pub fn new(requirement: Power) -> Self {
        Self { requirement }
    }
}

impl Constraint for CapacityCreditRequirement {
    fn name(&self) -> &str {
        "capacity_credit_requirement"
    }

    fn violation(&self, portfolio: &Portfolio, _schedule: Option<&DispatchSchedule>) -> f64 {
        (self.requirement - portfolio.firm_capacity()).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::portfolio;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(100.0, 0.0)]
    #[case(120.0, 0.0)]
    #[case(150.0, 30.0)]
    fn test_capacity_credit_requirement(
        portfolio: Portfolio,
        #[case] requirement: f64,
        #[case] expected: f64,
    ) {
        // Firm capacity is 100 * 1.0 + 40 * 0.5 = 120
        let constraints: ConstraintList =
            vec![Arc::new(CapacityCreditRequirement::new(Power(requirement)))];
        assert_approx_eq!(
            f64,
            total_violation(&constraints, &portfolio, None),
            expected
        );
    }
}
