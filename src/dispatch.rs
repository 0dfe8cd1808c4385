//! Simulates how a fixed portfolio operates over a demand series.
//!
//! Two strategies are provided: an exact linear programme solved with HiGHS and a greedy
//! merit-order heuristic which is much faster but not guaranteed to be cost-optimal.
use crate::demand::DemandSeries;
use crate::error::{TechmixError, ensure_config};
use crate::portfolio::Portfolio;
use crate::units::{Dimensionless, MoneyPerEnergy, Power};
use log::trace;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use strum::{Display, EnumIter};

pub mod exact;
pub mod hierarchical;
pub mod schedule;
pub use schedule::{DispatchSchedule, StorageSeries};

/// The default cost of unserved energy
pub const DEFAULT_VALUE_OF_LOST_LOAD: MoneyPerEnergy = MoneyPerEnergy(1e9);

/// The algorithm used to dispatch a portfolio
#[derive(
    DeserializeLabeledStringEnum, Debug, Display, EnumIter, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum DispatchStrategy {
    /// Cost-minimising linear programme
    #[default]
    #[string = "exact"]
    #[strum(serialize = "exact")]
    Exact,
    /// Greedy merit-order heuristic with storage look-ahead
    #[string = "hierarchical"]
    #[strum(serialize = "hierarchical")]
    Hierarchical,
}

fn default_curtailment() -> bool {
    true
}

fn default_value_of_lost_load() -> MoneyPerEnergy {
    DEFAULT_VALUE_OF_LOST_LOAD
}

/// Options controlling how strictly demand must be balanced
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DispatchOptions {
    /// Fraction of demand which may go unserved without penalty
    #[serde(default)]
    pub undersupply: Dimensionless,
    /// Fraction by which supply may exceed demand when curtailment is disabled
    #[serde(default)]
    pub oversupply: Dimensionless,
    /// Whether excess generation may be curtailed without limit
    #[serde(default = "default_curtailment")]
    pub curtailment: bool,
    /// Whether demand may go unmet at the cost of lost load
    #[serde(default)]
    pub allow_blackout: bool,
    /// The cost of unmet demand
    #[serde(default = "default_value_of_lost_load")]
    pub value_of_lost_load: MoneyPerEnergy,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            undersupply: Dimensionless(0.0),
            oversupply: Dimensionless(0.0),
            curtailment: default_curtailment(),
            allow_blackout: false,
            value_of_lost_load: DEFAULT_VALUE_OF_LOST_LOAD,
        }
    }
}

impl DispatchOptions {
    /// Check that the options are valid
    pub fn validate(&self) -> Result<(), TechmixError> {
        ensure_config!(
            (0.0..1.0).contains(&self.undersupply.0),
            "undersupply must be in the range [0, 1)"
        );
        ensure_config!(
            self.oversupply.is_finite() && self.oversupply >= Dimensionless(0.0),
            "oversupply must be a finite, non-negative number"
        );
        ensure_config!(
            self.value_of_lost_load.is_finite()
                && self.value_of_lost_load > MoneyPerEnergy(0.0),
            "value_of_lost_load must be a finite number greater than zero"
        );

        Ok(())
    }

    /// The least supply which satisfies the demand balance
    pub fn min_supply(&self, demand: Power) -> Power {
        demand * (Dimensionless(1.0) - self.undersupply)
    }

    /// The most supply permitted by the demand balance, if limited
    pub fn max_supply(&self, demand: Power) -> Option<Power> {
        (!self.curtailment).then(|| demand * (Dimensionless(1.0) + self.oversupply))
    }
}

/// Check that a portfolio can be dispatched against the demand series
fn check_inputs(
    portfolio: &Portfolio,
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> Result<(), TechmixError> {
    options.validate()?;
    ensure_config!(!portfolio.is_empty(), "Cannot dispatch an empty portfolio");

    for tech in portfolio.technologies().iter() {
        tech.validate()?;
        if let Some(profile) = &tech.availability {
            ensure_config!(
                profile.len() == demand.len(),
                "Availability profile for technology {} has {} steps, but demand has {}",
                tech.id,
                profile.len(),
                demand.len()
            );
        }
    }

    Ok(())
}

/// Dispatch a portfolio over a demand series.
///
/// No state is kept between calls, so identical inputs always produce an identical schedule.
///
/// # Arguments
///
/// * `portfolio` - Technologies and their deployed capacities
/// * `demand` - The demand to serve
/// * `strategy` - Which dispatch algorithm to use
/// * `options` - Demand balance options
///
/// # Returns
///
/// A feasible schedule, or [`TechmixError::Infeasible`] if demand cannot be met.
pub fn solve(
    portfolio: &Portfolio,
    demand: &DemandSeries,
    strategy: DispatchStrategy,
    options: &DispatchOptions,
) -> Result<DispatchSchedule, TechmixError> {
    check_inputs(portfolio, demand, options)?;

    trace!(
        "Dispatching portfolio {:?} over {} steps ({strategy:?})",
        portfolio.decision_vector(),
        demand.len()
    );
    match strategy {
        DispatchStrategy::Exact => exact::solve(portfolio, demand, options),
        DispatchStrategy::Hierarchical => hierarchical::solve(portfolio, demand, options),
    }
}
