//! Portfolios pair a fixed list of technologies with a decision vector of deployed capacities.
use crate::error::{TechmixError, ensure_config};
use crate::technology::Technology;
use crate::units::{Dimensionless, Power, UnitType};
use std::sync::Arc;

/// The technologies shared by every portfolio in a run
pub type TechnologyList = Arc<[Technology]>;

/// Lower and upper bounds on the capacity of each technology
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionBounds {
    lower: Vec<Power>,
    upper: Vec<Power>,
}

impl DecisionBounds {
    /// Create new bounds, checking that they are consistent
    pub fn new(lower: Vec<Power>, upper: Vec<Power>) -> Result<Self, TechmixError> {
        ensure_config!(
            lower.len() == upper.len(),
            "Lower bounds have length {} but upper bounds have length {}",
            lower.len(),
            upper.len()
        );
        for (i, (lo, up)) in lower.iter().zip(&upper).enumerate() {
            ensure_config!(
                lo.is_finite() && up.is_finite() && Power(0.0) <= *lo && lo <= up,
                "Invalid bounds for decision variable {i}: [{}, {}]",
                lo.0,
                up.0
            );
        }

        Ok(Self { lower, upper })
    }

    /// The default bounds for a set of technologies.
    ///
    /// The lower bound is zero and the upper bound is the capacity needed for the technology to
    /// meet `capacity_requirement` on its own, i.e. the requirement divided by capacity credit.
    pub fn from_requirement(
        technologies: &[Technology],
        capacity_requirement: Power,
    ) -> Result<Self, TechmixError> {
        let upper = technologies
            .iter()
            .map(|tech| capacity_requirement / tech.capacity_credit)
            .collect();
        Self::new(vec![Power(0.0); technologies.len()], upper)
    }

    /// Number of decision variables
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// Whether there are no decision variables
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Lower bounds
    pub fn lower(&self) -> &[Power] {
        &self.lower
    }

    /// Upper bounds
    pub fn upper(&self) -> &[Power] {
        &self.upper
    }

    /// The width of the range for variable `i`
    pub fn range(&self, i: usize) -> Power {
        self.upper[i] - self.lower[i]
    }

    /// Whether every entry of `capacities` lies within bounds
    pub fn contains(&self, capacities: &[Power]) -> bool {
        capacities.len() == self.len()
            && capacities
                .iter()
                .enumerate()
                .all(|(i, x)| self.lower[i] <= *x && *x <= self.upper[i])
    }

    /// Clamp a raw value for variable `i` into bounds
    pub fn clamp(&self, i: usize, value: f64) -> Power {
        Power(value.clamp(self.lower[i].0, self.upper[i].0))
    }

    /// Map a decision vector onto the unit hypercube.
    ///
    /// Variables with a zero-width range map to zero.
    pub fn normalise(&self, capacities: &[Power]) -> Vec<f64> {
        capacities
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let range = self.range(i);
                if range.0 > 0.0 {
                    (*x - self.lower[i]).0 / range.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// A set of technologies together with the capacity deployed for each
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    technologies: TechnologyList,
    capacities: Vec<Power>,
}

impl Portfolio {
    /// Create a new portfolio.
    ///
    /// There must be one finite, non-negative capacity per technology.
    pub fn new(technologies: TechnologyList, capacities: Vec<Power>) -> Result<Self, TechmixError> {
        ensure_config!(
            technologies.len() == capacities.len(),
            "Portfolio has {} technologies but decision vector has length {}",
            technologies.len(),
            capacities.len()
        );
        for (tech, capacity) in technologies.iter().zip(&capacities) {
            ensure_config!(
                capacity.is_finite() && *capacity >= Power(0.0),
                "Invalid capacity {} for technology {}",
                capacity.0,
                tech.id
            );
        }

        Ok(Self {
            technologies,
            capacities,
        })
    }

    /// Create a new portfolio, also checking that capacities lie within the given bounds
    pub fn with_bounds(
        technologies: TechnologyList,
        capacities: Vec<Power>,
        bounds: &DecisionBounds,
    ) -> Result<Self, TechmixError> {
        ensure_config!(
            bounds.len() == technologies.len(),
            "Decision bounds have length {} but there are {} technologies",
            bounds.len(),
            technologies.len()
        );
        ensure_config!(
            bounds.contains(&capacities),
            "Decision vector lies outside of decision bounds"
        );
        Self::new(technologies, capacities)
    }

    /// Create a portfolio using each technology's nominal capacity
    pub fn from_technologies(technologies: TechnologyList) -> Result<Self, TechmixError> {
        let capacities = technologies.iter().map(|tech| tech.capacity).collect();
        Self::new(technologies, capacities)
    }

    /// The technologies in the portfolio
    pub fn technologies(&self) -> &TechnologyList {
        &self.technologies
    }

    /// The deployed capacity of each technology
    pub fn capacities(&self) -> &[Power] {
        &self.capacities
    }

    /// The decision vector as raw numbers
    pub fn decision_vector(&self) -> Vec<f64> {
        self.capacities.iter().map(UnitType::value).collect()
    }

    /// Number of technologies
    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    /// Whether the portfolio has no technologies
    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }

    /// Iterate over technologies along with their deployed capacities
    pub fn iter(&self) -> impl Iterator<Item = (&Technology, Power)> {
        self.technologies.iter().zip(self.capacities.iter().copied())
    }

    /// Total capacity weighted by capacity credit
    pub fn firm_capacity(&self) -> Power {
        self.iter()
            .map(|(tech, capacity)| capacity * tech.capacity_credit)
            .sum()
    }

    /// Total deployed capacity
    pub fn total_capacity(&self) -> Power {
        self.capacities.iter().copied().sum()
    }

    /// The share of total capacity held by each technology
    pub fn capacity_shares(&self) -> Vec<Dimensionless> {
        let total = self.total_capacity();
        self.capacities
            .iter()
            .map(|c| {
                if total.0 > 0.0 {
                    *c / total
                } else {
                    Dimensionless(0.0)
                }
            })
            .collect()
    }
}
