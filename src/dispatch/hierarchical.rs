//! Greedy merit-order dispatch with ramp and storage reserve look-aheads.
//!
//! Quantities are handled internally as plain numbers in MW and MWh and converted to unit types
//! when the schedule is assembled.
use super::{DispatchOptions, DispatchSchedule, StorageSeries};
use crate::demand::DemandSeries;
use crate::error::TechmixError;
use crate::portfolio::Portfolio;
use crate::units::{Energy, Power};
use log::trace;

/// Absolute tolerance (MW) for demand balance checks
const TOLERANCE: f64 = 1e-9;

/// A technology as deployed in the portfolio
struct Unit {
    capacity: f64,
    marginal_cost: f64,
    efficiency: f64,
    ramp_up: Option<f64>,
    ramp_down: Option<f64>,
    storage_capacity: Option<f64>,
    initial_storage: f64,
    /// Highest output at each step from which later availability drops can still be followed
    ceiling: Vec<f64>,
    /// Lowest output at each step from which later ramp-up needs can still be met
    required: Vec<f64>,
}

impl Unit {
    fn is_storage(&self) -> bool {
        self.storage_capacity.is_some()
    }

    /// Most this unit can contribute towards demand at step `t`
    fn max_contribution(&self, t: usize) -> f64 {
        if self.is_storage() {
            self.capacity
        } else {
            self.ceiling[t]
        }
    }

    /// Power which can still be put into storage this step
    fn charge_headroom(&self, soc: f64, current_charge: f64, dt: f64) -> f64 {
        let by_energy = (self.storage_capacity.unwrap_or(0.0) - soc) / (self.efficiency * dt);
        by_energy.min(self.capacity - current_charge).max(0.0)
    }
}

/// Build the units for a portfolio, with ramp limits already scaled to one step
fn build_units(portfolio: &Portfolio, demand: &DemandSeries) -> Vec<Unit> {
    let dt = demand.time_delta();
    portfolio
        .iter()
        .map(|(tech, capacity)| {
            let storage = tech.storage_for_capacity(capacity);
            Unit {
                capacity: capacity.0,
                marginal_cost: tech.marginal_cost().0,
                efficiency: tech.efficiency.0,
                ramp_up: tech.ramping.map(|r| r.max_increase(capacity, dt).0),
                ramp_down: tech.ramping.map(|r| r.max_decrease(capacity, dt).0),
                storage_capacity: storage.map(|s| s.storage_capacity.0),
                initial_storage: storage.map_or(0.0, |s| s.initial_storage.0),
                ceiling: (0..demand.len())
                    .map(|t| (capacity * tech.availability_at(t)).0)
                    .collect(),
                required: vec![0.0; demand.len()],
            }
        })
        .collect()
}

/// Fill in the output trajectories which ramp-limited units must stay within.
///
/// Both are computed backwards over the whole series: `ceiling[t]` is the most a unit may
/// produce so that it can ramp down in time for later availability, while `required[t]` is the
/// least it must produce so that it can ramp up in time to cover later residual demand which no
/// other unit can serve.
fn set_ramp_trajectories(units: &mut [Unit], demand: &DemandSeries, options: &DispatchOptions) {
    let n_steps = demand.len();
    for unit in units.iter_mut() {
        if let Some(down) = unit.ramp_down {
            for t in (0..n_steps.saturating_sub(1)).rev() {
                unit.ceiling[t] = unit.ceiling[t].min(unit.ceiling[t + 1] + down);
            }
        }
    }

    let total: Vec<f64> = (0..n_steps)
        .map(|t| units.iter().map(|unit| unit.max_contribution(t)).sum())
        .collect();
    let min_supply: Vec<f64> = demand.iter().map(|d| options.min_supply(d).0).collect();
    for unit in units.iter_mut() {
        let Some(up) = unit.ramp_up else {
            continue;
        };

        let mut next = 0.0;
        for t in (0..n_steps).rev() {
            let others = total[t] - unit.max_contribution(t);
            let needed = (min_supply[t] - others).max(next - up).max(0.0);
            unit.required[t] = needed.min(unit.ceiling[t]);
            next = unit.required[t];
        }
    }
}

/// Indexes of units sorted by ascending marginal cost, ties kept in input order
fn merit_order(units: &[Unit]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..units.len()).collect();
    order.sort_by(|a, b| units[*a].marginal_cost.total_cmp(&units[*b].marginal_cost));
    order
}

/// For each step, the energy which storage should still be able to deliver at the end of that
/// step in order to cover later steps where demand exceeds non-storage capacity
fn storage_reserve(units: &[Unit], demand: &DemandSeries) -> Vec<f64> {
    let dt = demand.time_delta().0;
    let shortfalls: Vec<f64> = demand
        .iter()
        .enumerate()
        .map(|(t, demand)| {
            let firm: f64 = units
                .iter()
                .filter(|unit| !unit.is_storage())
                .map(|unit| unit.ceiling[t])
                .sum();
            (demand.0 - firm).max(0.0) * dt
        })
        .collect();

    // Suffix sums, excluding the current step
    let mut reserve = vec![0.0; shortfalls.len()];
    let mut total = 0.0;
    for t in (0..shortfalls.len()).rev() {
        reserve[t] = total;
        total += shortfalls[t];
    }

    reserve
}

/// Mutable state carried from one step to the next
struct State {
    previous_output: Vec<f64>,
    soc: Vec<f64>,
}

impl State {
    /// Energy that all stores together could deliver to the grid
    fn deliverable(&self, units: &[Unit]) -> f64 {
        units
            .iter()
            .zip(&self.soc)
            .filter(|(unit, _)| unit.is_storage())
            .map(|(unit, soc)| soc * unit.efficiency)
            .sum()
    }
}

/// Flows decided for a single step
struct Step {
    output: Vec<f64>,
    charge: Vec<f64>,
    unmet: f64,
}

/// Discharge a store by up to `wanted` MW, delivering at most `max_energy` MWh.
///
/// Returns the amount discharged.
fn discharge(
    unit: &Unit,
    soc: &mut f64,
    current_output: f64,
    wanted: f64,
    max_energy: f64,
    dt: f64,
) -> f64 {
    let by_energy = (*soc * unit.efficiency).min(max_energy) / dt;
    let amount = wanted
        .min(unit.capacity - current_output)
        .min(by_energy)
        .max(0.0);
    *soc -= amount * dt / unit.efficiency;
    amount
}

/// Lower and upper output limits for a non-storage unit at step `t`
fn output_limits(unit: &Unit, previous: f64, t: usize) -> Result<(f64, f64), TechmixError> {
    let mut floor = unit.required[t];
    let mut ceiling = unit.ceiling[t];
    if t > 0 {
        if let Some(down) = unit.ramp_down {
            floor = floor.max(previous - down);
        }
        if let Some(up) = unit.ramp_up {
            ceiling = ceiling.min(previous + up);
        }
    }

    if floor - ceiling > TOLERANCE {
        return Err(TechmixError::infeasible(format!(
            "ramp limits require between {floor} and {ceiling} MW of output at step {t}"
        )));
    }

    Ok((floor, ceiling.max(floor)))
}

/// Dispatch a single step
#[allow(clippy::too_many_arguments)]
fn dispatch_step(
    units: &[Unit],
    order: &[usize],
    state: &mut State,
    reserve: f64,
    demand: f64,
    t: usize,
    dt: f64,
    options: &DispatchOptions,
) -> Result<Step, TechmixError> {
    let n = units.len();
    let mut step = Step {
        output: vec![0.0; n],
        charge: vec![0.0; n],
        unmet: 0.0,
    };
    let limits = units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            if unit.is_storage() {
                Ok((0.0, 0.0))
            } else {
                output_limits(unit, state.previous_output[i], t)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Ramp-limited technologies must provide at least their minimum output
    step.output = limits.iter().map(|(floor, _)| *floor).collect();
    let mut remaining = (demand - step.output.iter().sum::<f64>()).max(0.0);

    // Allocate in merit order, keeping back the storage reserve
    for &i in order {
        if remaining <= 0.0 {
            break;
        }

        let unit = &units[i];
        let amount = if unit.is_storage() {
            let spare = (state.deliverable(units) - reserve).max(0.0);
            discharge(unit, &mut state.soc[i], step.output[i], remaining, spare, dt)
        } else {
            remaining.min(limits[i].1 - step.output[i]).max(0.0)
        };
        step.output[i] += amount;
        remaining -= amount;
    }

    // Use reserved storage as a last resort
    for &i in order {
        if remaining <= 0.0 {
            break;
        }
        if units[i].is_storage() {
            let amount = discharge(
                &units[i],
                &mut state.soc[i],
                step.output[i],
                remaining,
                f64::INFINITY,
                dt,
            );
            step.output[i] += amount;
            remaining -= amount;
        }
    }

    let supplied: f64 = step.output.iter().sum();
    let min_supply = options.min_supply(Power(demand)).0;
    if min_supply - supplied > TOLERANCE {
        if !options.allow_blackout {
            return Err(TechmixError::infeasible(format!(
                "demand of {demand} MW at step {t} exceeds the {supplied} MW which can be supplied"
            )));
        }
        step.unmet = min_supply - supplied;
    }

    // Surplus from minimum outputs charges storage which is not discharging
    let mut surplus = (supplied - demand).max(0.0);
    for (i, unit) in units.iter().enumerate() {
        if surplus <= 0.0 {
            break;
        }
        if unit.is_storage() && step.output[i] == 0.0 {
            let amount = surplus.min(unit.charge_headroom(state.soc[i], step.charge[i], dt));
            step.charge[i] += amount;
            state.soc[i] += amount * unit.efficiency * dt;
            surplus -= amount;
        }
    }

    // Use spare capacity to build storage up towards the reserve for later shortfalls
    let mut deficit = reserve - state.deliverable(units);
    for (s, store) in units.iter().enumerate() {
        if deficit <= 0.0 {
            break;
        }
        if !store.is_storage() || step.output[s] > 0.0 {
            continue;
        }

        for &i in order {
            if deficit <= 0.0 {
                break;
            }
            if units[i].is_storage() {
                continue;
            }

            // Each MW of charge adds eff^2 * dt of deliverable energy
            let needed = deficit / (store.efficiency * store.efficiency * dt);
            let amount = needed
                .min(limits[i].1 - step.output[i])
                .min(store.charge_headroom(state.soc[s], step.charge[s], dt))
                .max(0.0);
            step.output[i] += amount;
            step.charge[s] += amount;
            state.soc[s] += amount * store.efficiency * dt;
            deficit -= amount * store.efficiency * store.efficiency * dt;
        }
    }

    if let Some(max_supply) = options.max_supply(Power(demand)) {
        let net_supply = step.output.iter().sum::<f64>() - step.charge.iter().sum::<f64>();
        if net_supply - max_supply.0 > TOLERANCE {
            return Err(TechmixError::infeasible(format!(
                "supply of {net_supply} MW at step {t} exceeds the permitted maximum of {} MW \
                and curtailment is disabled",
                max_supply.0
            )));
        }
    }

    state.previous_output.clone_from(&step.output);
    Ok(step)
}

/// Dispatch the portfolio with the merit-order heuristic.
///
/// The merit order, ramp trajectories and storage reserve are computed once, then each step is
/// dispatched in turn.
pub fn solve(
    portfolio: &Portfolio,
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> Result<DispatchSchedule, TechmixError> {
    let dt = demand.time_delta().0;
    let mut units = build_units(portfolio, demand);
    set_ramp_trajectories(&mut units, demand, options);
    let order = merit_order(&units);
    let reserve = storage_reserve(&units, demand);
    trace!("Merit order: {order:?}");

    let mut state = State {
        previous_output: vec![0.0; units.len()],
        soc: units.iter().map(|unit| unit.initial_storage).collect(),
    };

    let n_steps = demand.len();
    let mut outputs = vec![Vec::with_capacity(n_steps); units.len()];
    let mut charges = vec![Vec::with_capacity(n_steps); units.len()];
    let mut socs = vec![Vec::with_capacity(n_steps); units.len()];
    let mut unmet_demand = Vec::with_capacity(n_steps);
    for (t, demand) in demand.iter().enumerate() {
        let step = dispatch_step(
            &units, &order, &mut state, reserve[t], demand.0, t, dt, options,
        )?;
        for (i, ((output, charge), soc)) in outputs
            .iter_mut()
            .zip(charges.iter_mut())
            .zip(socs.iter_mut())
            .enumerate()
        {
            output.push(Power(step.output[i]));
            charge.push(Power(step.charge[i]));
            soc.push(Energy(state.soc[i]));
        }
        unmet_demand.push(Power(step.unmet));
    }

    let storage = units
        .iter()
        .zip(charges.into_iter().zip(socs))
        .map(|(unit, (charge, soc))| unit.is_storage().then_some(StorageSeries { charge, soc }))
        .collect();

    Ok(DispatchSchedule::new(
        portfolio,
        demand,
        outputs,
        storage,
        unmet_demand,
        options.value_of_lost_load,
    ))
}
