//! Built-in objectives covering costs, emissions, generic attributes and cost volatility.
use super::{Objective, Sense};
use crate::dispatch::DispatchSchedule;
use crate::portfolio::Portfolio;
use crate::units::{Money, MoneyPerYear};
use itertools::Itertools;
use std::collections::BTreeMap;

/// The attribute used for emissions when none is given
pub const DEFAULT_EMISSION_ATTRIBUTE: &str = "co2_rate";

/// Default embedding dimension for [`Volatility`]
pub const DEFAULT_VOLATILITY_ORDER: usize = 3;

/// Default embedding delay for [`Volatility`]
pub const DEFAULT_VOLATILITY_DELAY: usize = 60;

/// Annualised capital cost of the whole portfolio
fn annualised_capital_cost(portfolio: &Portfolio) -> MoneyPerYear {
    portfolio
        .iter()
        .map(|(tech, capacity)| tech.annual_capital_cost() * capacity)
        .sum()
}

/// Annual fixed operation and maintenance cost of the whole portfolio
fn annualised_fixed_cost(portfolio: &Portfolio) -> MoneyPerYear {
    portfolio
        .iter()
        .map(|(tech, capacity)| tech.om_cost_fixed * capacity)
        .sum()
}

/// Sum over technologies of `attribute` multiplied by energy produced
fn attribute_times_energy(
    portfolio: &Portfolio,
    schedule: &DispatchSchedule,
    attribute: &str,
) -> f64 {
    portfolio
        .technologies()
        .iter()
        .enumerate()
        .map(|(i, tech)| {
            let rate = tech.attribute(attribute).unwrap_or(0.0);
            rate * schedule.total_output(i).0
        })
        .sum()
}

/// Annualised capital cost plus fixed O&M plus operating cost
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalCost;

impl Objective for TotalCost {
    fn name(&self) -> &str {
        "total_cost"
    }

    fn requires_dispatch(&self) -> bool {
        true
    }

    fn evaluate(&self, portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64 {
        let Some(schedule) = schedule else {
            return f64::NAN;
        };
        let annual: MoneyPerYear =
            annualised_capital_cost(portfolio) + annualised_fixed_cost(portfolio);
        let operating: Money = schedule.total_cost();
        annual.0 + operating.0
    }
}

/// Capital cost annualised with the capital recovery factor
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnualisedCapitalCost;

impl Objective for AnnualisedCapitalCost {
    fn name(&self) -> &str {
        "annualised_capital_cost"
    }

    fn evaluate(&self, portfolio: &Portfolio, _schedule: Option<&DispatchSchedule>) -> f64 {
        annualised_capital_cost(portfolio).0
    }
}

/// Annual fixed operation and maintenance cost
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnualisedFixedCost;

impl Objective for AnnualisedFixedCost {
    fn name(&self) -> &str {
        "annualised_fixed_cost"
    }

    fn evaluate(&self, portfolio: &Portfolio, _schedule: Option<&DispatchSchedule>) -> f64 {
        annualised_fixed_cost(portfolio).0
    }
}

/// Variable operating cost (including any lost load) from the dispatch schedule
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatingCost;

impl Objective for OperatingCost {
    fn name(&self) -> &str {
        "operating_cost"
    }

    fn requires_dispatch(&self) -> bool {
        true
    }

    fn evaluate(&self, _portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64 {
        schedule.map_or(f64::NAN, |schedule| schedule.total_cost().0)
    }
}

/// Emissions over the dispatch horizon, from a per-unit-energy emission rate attribute
#[derive(Debug, Clone)]
pub struct AnnualEmission {
    /// The emission rate attribute
    pub attribute: String,
    name: String,
}

impl AnnualEmission {
    /// Emissions based on the given attribute
    pub fn new(attribute: &str) -> Self {
        let name = if attribute == DEFAULT_EMISSION_ATTRIBUTE {
            "annual_emission".to_string()
        } else {
            format!("annual_emission_{attribute}")
        };
        Self {
            attribute: attribute.to_string(),
            name,
        }
    }
}

impl Default for AnnualEmission {
    fn default() -> Self {
        Self::new(DEFAULT_EMISSION_ATTRIBUTE)
    }
}

impl Objective for AnnualEmission {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_attributes(&self) -> Vec<&str> {
        vec![&self.attribute]
    }

    fn requires_dispatch(&self) -> bool {
        true
    }

    fn evaluate(&self, portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64 {
        let Some(schedule) = schedule else {
            return f64::NAN;
        };
        attribute_times_energy(portfolio, schedule, &self.attribute)
    }
}

/// An attribute measured per unit of installed capacity (e.g. land use)
#[derive(Debug, Clone)]
pub struct PerUnitCapacity {
    /// The attribute to measure
    pub attribute: String,
    /// Whether to minimise or maximise
    pub sense: Sense,
    name: String,
}

impl PerUnitCapacity {
    /// A minimised per-unit-capacity objective for the given attribute
    pub fn new(attribute: &str, sense: Sense) -> Self {
        Self {
            attribute: attribute.to_string(),
            sense,
            name: format!("per_unit_capacity_{attribute}"),
        }
    }
}

impl Objective for PerUnitCapacity {
    fn name(&self) -> &str {
        &self.name
    }

    fn sense(&self) -> Sense {
        self.sense
    }

    fn required_attributes(&self) -> Vec<&str> {
        vec![&self.attribute]
    }

    fn evaluate(&self, portfolio: &Portfolio, _schedule: Option<&DispatchSchedule>) -> f64 {
        portfolio
            .iter()
            .map(|(tech, capacity)| tech.attribute(&self.attribute).unwrap_or(0.0) * capacity.0)
            .sum()
    }
}

/// An attribute measured per unit of energy produced (e.g. water use)
#[derive(Debug, Clone)]
pub struct PerUnitEnergy {
    /// The attribute to measure
    pub attribute: String,
    /// Whether to minimise or maximise
    pub sense: Sense,
    name: String,
}

impl PerUnitEnergy {
    /// A per-unit-energy objective for the given attribute
    pub fn new(attribute: &str, sense: Sense) -> Self {
        Self {
            attribute: attribute.to_string(),
            sense,
            name: format!("per_unit_energy_{attribute}"),
        }
    }
}

impl Objective for PerUnitEnergy {
    fn name(&self) -> &str {
        &self.name
    }

    fn sense(&self) -> Sense {
        self.sense
    }

    fn required_attributes(&self) -> Vec<&str> {
        vec![&self.attribute]
    }

    fn requires_dispatch(&self) -> bool {
        true
    }

    fn evaluate(&self, portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64 {
        let Some(schedule) = schedule else {
            return f64::NAN;
        };
        attribute_times_energy(portfolio, schedule, &self.attribute)
    }
}

/// Volatility of the per-step operating cost, measured by weighted permutation entropy
#[derive(Debug, Clone, Copy)]
pub struct Volatility {
    /// Embedding dimension
    pub order: usize,
    /// Embedding delay in steps
    pub delay: usize,
}

impl Default for Volatility {
    fn default() -> Self {
        Self {
            order: DEFAULT_VOLATILITY_ORDER,
            delay: DEFAULT_VOLATILITY_DELAY,
        }
    }
}

impl Objective for Volatility {
    fn name(&self) -> &str {
        "volatility"
    }

    fn requires_dispatch(&self) -> bool {
        true
    }

    fn evaluate(&self, _portfolio: &Portfolio, schedule: Option<&DispatchSchedule>) -> f64 {
        let Some(schedule) = schedule else {
            return f64::NAN;
        };
        let costs: Vec<f64> = schedule.step_costs.iter().map(|cost| cost.0).collect();
        weighted_permutation_entropy(&costs, self.order, self.delay)
    }
}

/// Calculate the normalised weighted permutation entropy of a time series.
///
/// Each embedded vector `(x[j], x[j + delay], ..., x[j + (order - 1) * delay])` is assigned the
/// ordinal pattern given by sorting its elements and weighted by its variance. The Shannon
/// entropy of the weighted pattern distribution is normalised by `log2(order!)`.
///
/// Series which are too short to embed, or whose embedded vectors all have zero variance, have
/// zero entropy.
pub fn weighted_permutation_entropy(series: &[f64], order: usize, delay: usize) -> f64 {
    if order < 2 || delay == 0 {
        return 0.0;
    }
    let span = (order - 1) * delay;
    if series.len() <= span {
        return 0.0;
    }

    // Ordered map so that the sum below is reproducible
    let mut weights = BTreeMap::<Vec<usize>, f64>::new();
    for start in 0..series.len() - span {
        let vector: Vec<f64> = (0..order).map(|k| series[start + k * delay]).collect();
        let pattern: Vec<usize> = (0..order)
            .sorted_by(|a, b| vector[*a].total_cmp(&vector[*b]).then(a.cmp(b)))
            .collect();
        let mean = vector.iter().sum::<f64>() / order as f64;
        let variance = vector.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / order as f64;
        *weights.entry(pattern).or_default() += variance;
    }

    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let entropy: f64 = weights
        .values()
        .filter(|weight| **weight > 0.0)
        .map(|weight| {
            let p = weight / total;
            -p * p.log2()
        })
        .sum();
    let max_entropy = ((1..=order).product::<usize>() as f64).log2();
    entropy / max_entropy
}
