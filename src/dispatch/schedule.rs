//! The result of dispatching a portfolio.
use super::DispatchOptions;
use crate::demand::DemandSeries;
use crate::portfolio::Portfolio;
use crate::technology::TechnologyID;
use crate::units::{Energy, Hours, Money, MoneyPerEnergy, Power};
use anyhow::{Result, ensure};

/// Charging and state-of-charge series for a storage technology
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSeries {
    /// Power drawn to charge the store at each step
    pub charge: Vec<Power>,
    /// Stored energy at the end of each step
    pub soc: Vec<Energy>,
}

/// A per-step operating schedule for every technology in a portfolio
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSchedule {
    /// IDs of the dispatched technologies, in portfolio order
    pub technology_ids: Vec<TechnologyID>,
    /// Output of each technology (outer index) at each step (inner index)
    pub outputs: Vec<Vec<Power>>,
    /// Storage series for each technology (`None` for technologies without storage)
    pub storage: Vec<Option<StorageSeries>>,
    /// Demand left unserved at each step
    pub unmet_demand: Vec<Power>,
    /// Supply in excess of demand at each step
    pub curtailment: Vec<Power>,
    /// Operating cost incurred at each step
    pub step_costs: Vec<Money>,
    /// The length of each step
    pub time_delta: Hours,
}

impl DispatchSchedule {
    /// Assemble a schedule, calculating curtailment and costs from the given flows
    pub fn new(
        portfolio: &Portfolio,
        demand: &DemandSeries,
        outputs: Vec<Vec<Power>>,
        storage: Vec<Option<StorageSeries>>,
        unmet_demand: Vec<Power>,
        value_of_lost_load: MoneyPerEnergy,
    ) -> Self {
        let time_delta = demand.time_delta();
        let mut schedule = Self {
            technology_ids: portfolio
                .technologies()
                .iter()
                .map(|tech| tech.id.clone())
                .collect(),
            outputs,
            storage,
            unmet_demand,
            curtailment: Vec::with_capacity(demand.len()),
            step_costs: Vec::with_capacity(demand.len()),
            time_delta,
        };

        for (t, demand) in demand.iter().enumerate() {
            let excess = schedule.supply_at(t) + schedule.unmet_demand[t] - demand;
            schedule.curtailment.push(Power(excess.0.max(0.0)));

            let mut cost: Money = portfolio
                .technologies()
                .iter()
                .zip(&schedule.outputs)
                .map(|(tech, output)| tech.marginal_cost() * (output[t] * time_delta))
                .sum();
            cost += value_of_lost_load * (schedule.unmet_demand[t] * time_delta);
            schedule.step_costs.push(cost);
        }

        schedule
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.unmet_demand.len()
    }

    /// Whether the schedule has no steps
    pub fn is_empty(&self) -> bool {
        self.unmet_demand.is_empty()
    }

    /// Total operating cost over the whole schedule
    pub fn total_cost(&self) -> Money {
        self.step_costs.iter().copied().sum()
    }

    /// Output minus storage charging at step `t`
    pub fn supply_at(&self, t: usize) -> Power {
        let output: Power = self.outputs.iter().map(|series| series[t]).sum();
        let charge: Power = self
            .storage
            .iter()
            .flatten()
            .map(|series| series.charge[t])
            .sum();
        output - charge
    }

    /// Total energy produced by technology `index`
    pub fn total_output(&self, index: usize) -> Energy {
        self.outputs[index]
            .iter()
            .map(|output| *output * self.time_delta)
            .sum()
    }

    /// Total energy produced by all technologies
    pub fn total_generation(&self) -> Energy {
        (0..self.outputs.len()).map(|i| self.total_output(i)).sum()
    }

    /// Total unserved energy
    pub fn total_unmet_energy(&self) -> Energy {
        self.unmet_demand
            .iter()
            .map(|unmet| *unmet * self.time_delta)
            .sum()
    }

    /// Total curtailed energy
    pub fn total_curtailment(&self) -> Energy {
        self.curtailment
            .iter()
            .map(|curtailed| *curtailed * self.time_delta)
            .sum()
    }

    /// Check that the schedule respects demand balance, capacity, ramp and storage limits.
    ///
    /// `tolerance` is an absolute tolerance applied to every comparison.
    pub fn check_feasible(
        &self,
        portfolio: &Portfolio,
        demand: &DemandSeries,
        options: &DispatchOptions,
        tolerance: f64,
    ) -> Result<()> {
        ensure!(
            self.len() == demand.len(),
            "Schedule has {} steps but demand has {}",
            self.len(),
            demand.len()
        );
        let dt = self.time_delta;

        for (t, demand) in demand.iter().enumerate() {
            let supply = self.supply_at(t) + self.unmet_demand[t];
            ensure!(
                supply.0 >= options.min_supply(demand).0 - tolerance,
                "Supply {} is less than demand {} at step {t}",
                supply.0,
                demand.0
            );
            if let Some(max_supply) = options.max_supply(demand) {
                ensure!(
                    supply.0 <= max_supply.0 + tolerance,
                    "Supply {} exceeds permitted maximum {} at step {t}",
                    supply.0,
                    max_supply.0
                );
            }
            ensure!(
                options.allow_blackout || self.unmet_demand[t].0 <= tolerance,
                "Unmet demand at step {t} but blackouts are not allowed"
            );
        }

        for (i, (tech, capacity)) in portfolio.iter().enumerate() {
            let outputs = &self.outputs[i];
            for (t, output) in outputs.iter().enumerate() {
                let max_output = capacity * tech.availability_at(t);
                ensure!(
                    output.0 >= -tolerance && output.0 <= max_output.0 + tolerance,
                    "Output {} of {} at step {t} outside [0, {}]",
                    output.0,
                    tech.id,
                    max_output.0
                );
            }

            if let Some(ramping) = &tech.ramping {
                let up = ramping.max_increase(capacity, dt);
                let down = ramping.max_decrease(capacity, dt);
                for (t, pair) in outputs.windows(2).enumerate() {
                    let change = pair[1] - pair[0];
                    ensure!(
                        change.0 <= up.0 + tolerance && -change.0 <= down.0 + tolerance,
                        "Ramp limit of {} violated between steps {t} and {}",
                        tech.id,
                        t + 1
                    );
                }
            }

            if let (Some(storage), Some(series)) =
                (tech.storage_for_capacity(capacity), &self.storage[i])
            {
                let mut previous = storage.initial_storage;
                for (t, soc) in series.soc.iter().enumerate() {
                    ensure!(
                        soc.0 >= -tolerance && soc.0 <= storage.storage_capacity.0 + tolerance,
                        "State of charge of {} at step {t} outside [0, {}]",
                        tech.id,
                        storage.storage_capacity.0
                    );
                    let charge = series.charge[t];
                    ensure!(
                        charge.0 >= -tolerance && charge.0 <= capacity.0 + tolerance,
                        "Charge of {} at step {t} outside [0, {}]",
                        tech.id,
                        capacity.0
                    );
                    let net_flow = charge * tech.efficiency - outputs[t] / tech.efficiency;
                    let expected = previous + net_flow * dt;
                    ensure!(
                        (soc.0 - expected.0).abs() <= tolerance.max(1e-9 * expected.0.abs()),
                        "Storage balance of {} violated at step {t}",
                        tech.id
                    );
                    previous = *soc;
                }
            }
        }

        Ok(())
    }
}
