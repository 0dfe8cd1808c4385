//! Cost-minimising dispatch as a linear programme, solved with HiGHS.
use super::{DispatchOptions, DispatchSchedule, StorageSeries};
use crate::demand::DemandSeries;
use crate::error::TechmixError;
use crate::portfolio::Portfolio;
use crate::units::{Energy, Power};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::LevelFilter;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
type Variable = highs::Col;

/// What a column of the problem represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VariableKey {
    /// Output of a technology at a step
    Output { tech: usize, t: usize },
    /// Charging of a storage technology at a step
    Charge { tech: usize, t: usize },
    /// State of charge of a storage technology at the end of a step
    StateOfCharge { tech: usize, t: usize },
    /// Unmet demand at a step
    Unmet { t: usize },
}

/// A map for easy lookup of variables in the problem.
///
/// The entries are ordered in the same way as the problem's columns, so a variable's index in the
/// map is also its index in the solution.
#[derive(Default)]
struct VariableMap(IndexMap<VariableKey, Variable>);

impl VariableMap {
    fn add(&mut self, problem: &mut Problem, key: VariableKey, cost: f64, lower: f64, upper: f64) {
        let var = problem.add_column(cost, lower..=upper);
        let existing = self.0.insert(key, var).is_some();
        assert!(!existing, "Duplicate variable {key:?}");
    }

    fn get(&self, key: VariableKey) -> Variable {
        *self.0.get(&key).expect("No variable found for given key")
    }

    /// Read the value of a variable from the solution, clamping solver noise below zero
    fn value(&self, columns: &[f64], key: VariableKey) -> f64 {
        let index = self
            .0
            .get_index_of(&key)
            .expect("No variable found for given key");
        columns[index].max(0.0)
    }
}

/// Add one column per technology output, storage charge/SOC and (if allowed) unmet demand
fn add_variables(
    problem: &mut Problem,
    portfolio: &Portfolio,
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> VariableMap {
    let dt = demand.time_delta();
    let mut variables = VariableMap::default();

    for (tech_idx, (tech, capacity)) in portfolio.iter().enumerate() {
        let cost = (tech.marginal_cost() * (Power(1.0) * dt)).0;
        let storage = tech.storage_for_capacity(capacity);
        for t in 0..demand.len() {
            let max_output = (capacity * tech.availability_at(t)).0;
            let key = VariableKey::Output { tech: tech_idx, t };
            variables.add(problem, key, cost, 0.0, max_output);

            if let Some(storage) = &storage {
                let key = VariableKey::Charge { tech: tech_idx, t };
                variables.add(problem, key, 0.0, 0.0, capacity.0);
                let key = VariableKey::StateOfCharge { tech: tech_idx, t };
                variables.add(problem, key, 0.0, 0.0, storage.storage_capacity.0);
            }
        }
    }

    if options.allow_blackout {
        let cost = (options.value_of_lost_load * (Power(1.0) * dt)).0;
        for (t, demand) in demand.iter().enumerate() {
            variables.add(problem, VariableKey::Unmet { t }, cost, 0.0, demand.0);
        }
    }

    variables
}

/// Add the demand balance constraint for each step
fn add_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    portfolio: &Portfolio,
    demand: &DemandSeries,
    options: &DispatchOptions,
) {
    let mut terms = Vec::new();
    for (t, demand) in demand.iter().enumerate() {
        for (tech_idx, tech) in portfolio.technologies().iter().enumerate() {
            terms.push((variables.get(VariableKey::Output { tech: tech_idx, t }), 1.0));
            if tech.is_storage() {
                terms.push((variables.get(VariableKey::Charge { tech: tech_idx, t }), -1.0));
            }
        }
        if options.allow_blackout {
            terms.push((variables.get(VariableKey::Unmet { t }), 1.0));
        }

        let lower = options.min_supply(demand).0;
        let upper = options.max_supply(demand).map_or(f64::INFINITY, |max| max.0);
        problem.add_row(lower..=upper, terms.drain(0..));
    }
}

/// Add ramp constraints between consecutive steps
fn add_ramp_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    portfolio: &Portfolio,
    demand: &DemandSeries,
) {
    let dt = demand.time_delta();
    for (tech_idx, (tech, capacity)) in portfolio.iter().enumerate() {
        let Some(ramping) = &tech.ramping else {
            continue;
        };

        let up = ramping.max_increase(capacity, dt).0;
        let down = ramping.max_decrease(capacity, dt).0;
        for t in 1..demand.len() {
            let current = variables.get(VariableKey::Output { tech: tech_idx, t });
            let previous = variables.get(VariableKey::Output {
                tech: tech_idx,
                t: t - 1,
            });
            problem.add_row(-down..=up, [(current, 1.0), (previous, -1.0)]);
        }
    }
}

/// Add state-of-charge conservation constraints for storage technologies.
///
/// For each step: `soc[t] - soc[t-1] - eff*dt*charge[t] + (dt/eff)*output[t] = 0`, with
/// `soc[-1]` equal to the initial storage.
fn add_storage_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    portfolio: &Portfolio,
    demand: &DemandSeries,
) {
    let dt = demand.time_delta().0;
    for (tech_idx, (tech, capacity)) in portfolio.iter().enumerate() {
        let Some(storage) = tech.storage_for_capacity(capacity) else {
            continue;
        };

        let eff = tech.efficiency.0;
        for t in 0..demand.len() {
            let mut terms = vec![
                (
                    variables.get(VariableKey::StateOfCharge { tech: tech_idx, t }),
                    1.0,
                ),
                (
                    variables.get(VariableKey::Charge { tech: tech_idx, t }),
                    -eff * dt,
                ),
                (
                    variables.get(VariableKey::Output { tech: tech_idx, t }),
                    dt / eff,
                ),
            ];

            // The first step starts from the initial storage, which moves to the RHS
            let rhs = if t == 0 {
                storage.initial_storage.0
            } else {
                terms.push((
                    variables.get(VariableKey::StateOfCharge {
                        tech: tech_idx,
                        t: t - 1,
                    }),
                    -1.0,
                ));
                0.0
            };
            problem.add_row(rhs..=rhs, terms);
        }
    }
}

/// Enable logging for the HiGHS solver.
///
/// HiGHS writes directly to the console rather than through our logger, so its output is only
/// shown at the most verbose log level.
fn enable_highs_logging(model: &mut highs::Model) {
    let verbose = log::max_level() >= LevelFilter::Trace;
    model.set_option("log_to_console", verbose);
    model.set_option("output_flag", verbose);
}

/// Convert the LP solution into a [`DispatchSchedule`]
fn read_schedule(
    columns: &[f64],
    variables: &VariableMap,
    portfolio: &Portfolio,
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> DispatchSchedule {
    let steps = 0..demand.len();
    let mut outputs = Vec::with_capacity(portfolio.len());
    let mut storage = Vec::with_capacity(portfolio.len());
    for (tech_idx, tech) in portfolio.technologies().iter().enumerate() {
        outputs.push(
            steps
                .clone()
                .map(|t| {
                    let key = VariableKey::Output { tech: tech_idx, t };
                    Power(variables.value(columns, key))
                })
                .collect(),
        );

        storage.push(tech.is_storage().then(|| StorageSeries {
            charge: steps
                .clone()
                .map(|t| {
                    let key = VariableKey::Charge { tech: tech_idx, t };
                    Power(variables.value(columns, key))
                })
                .collect(),
            soc: steps
                .clone()
                .map(|t| {
                    let key = VariableKey::StateOfCharge { tech: tech_idx, t };
                    Energy(variables.value(columns, key))
                })
                .collect(),
        }));
    }

    let unmet_demand = steps
        .map(|t| {
            if options.allow_blackout {
                Power(variables.value(columns, VariableKey::Unmet { t }))
            } else {
                Power(0.0)
            }
        })
        .collect();

    DispatchSchedule::new(
        portfolio,
        demand,
        outputs,
        storage,
        unmet_demand,
        options.value_of_lost_load,
    )
}

/// Solve the dispatch problem exactly.
///
/// The objective is to minimise the sum of marginal cost times output over all technologies and
/// steps, plus the value of lost load for any unmet demand.
pub fn solve(
    portfolio: &Portfolio,
    demand: &DemandSeries,
    options: &DispatchOptions,
) -> Result<DispatchSchedule, TechmixError> {
    // Set up problem
    let mut problem = Problem::default();
    let variables = add_variables(&mut problem, portfolio, demand, options);

    // Add constraints
    add_balance_constraints(&mut problem, &variables, portfolio, demand, options);
    add_ramp_constraints(&mut problem, &variables, portfolio, demand);
    add_storage_constraints(&mut problem, &variables, portfolio, demand);

    // Solve problem
    let mut highs_model = problem.optimise(Sense::Minimise);
    enable_highs_logging(&mut highs_model);
    let solution = highs_model.solve();
    match solution.status() {
        HighsModelStatus::Optimal => {
            let columns = solution.get_solution().columns().to_vec();
            Ok(read_schedule(
                &columns, &variables, portfolio, demand, options,
            ))
        }
        HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
            Err(TechmixError::infeasible(
                "no dispatch satisfies demand, capacity, ramp and storage constraints",
            ))
        }
        status => Err(TechmixError::Solver(format!("Could not solve: {status:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, demand, thermal};
    use crate::technology::{RampingCapability, Technology};
    use crate::units::{Dimensionless, Hours, MoneyPerEnergy};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn portfolio(techs: Vec<Technology>, capacities: Vec<f64>) -> Portfolio {
        Portfolio::new(techs.into(), capacities.into_iter().map(Power).collect()).unwrap()
    }

    #[rstest]
    fn test_cheapest_technology_dispatched_first(thermal: Technology, demand: DemandSeries) {
        let cheap = Technology {
            fuel_cost: MoneyPerEnergy(1.0),
            ..Technology::new("cheap", "thermal", Power(50.0))
        };
        let portfolio = portfolio(vec![thermal, cheap], vec![100.0, 50.0]);
        let schedule = solve(&portfolio, &demand, &DispatchOptions::default()).unwrap();
        for t in 0..demand.len() {
            assert_approx_eq!(Power, schedule.outputs[1][t], Power(50.0), epsilon = 1e-6);
            assert_approx_eq!(Power, schedule.outputs[0][t], Power(30.0), epsilon = 1e-6);
        }
        // 3 steps * (30 MWh * 25 + 50 MWh * 1)
        assert_approx_eq!(f64, schedule.total_cost().0, 2400.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_storage_shifts_energy(thermal: Technology, battery: Technology) {
        // Thermal is too small for the peak, so the battery must charge beforehand
        let demand = DemandSeries::new(
            vec![Power(50.0), Power(50.0), Power(120.0)],
            Hours(1.0),
        )
        .unwrap();
        let portfolio = portfolio(vec![thermal, battery], vec![100.0, 50.0]);
        let options = DispatchOptions::default();
        let schedule = solve(&portfolio, &demand, &options).unwrap();
        assert_approx_eq!(Power, schedule.outputs[1][2], Power(20.0), epsilon = 1e-6);
        schedule
            .check_feasible(&portfolio, &demand, &options, 1e-6)
            .unwrap();
    }

    #[rstest]
    fn test_ramp_limits_respected(mut thermal: Technology) {
        thermal.ramping = Some(RampingCapability {
            ramp_up: Dimensionless(0.2),
            ramp_down: Dimensionless(0.2),
        });
        let peaker = Technology {
            fuel_cost: MoneyPerEnergy(100.0),
            ..Technology::new("peaker", "thermal", Power(100.0))
        };
        let demand =
            DemandSeries::new(vec![Power(10.0), Power(80.0), Power(10.0)], Hours(1.0)).unwrap();
        let portfolio = portfolio(vec![thermal, peaker], vec![100.0, 100.0]);

        // Without curtailment thermal cannot run ahead of demand to prepare for the peak
        let options = DispatchOptions {
            curtailment: false,
            ..DispatchOptions::default()
        };
        let schedule = solve(&portfolio, &demand, &options).unwrap();
        schedule
            .check_feasible(&portfolio, &demand, &options, 1e-6)
            .unwrap();
        assert_approx_eq!(Power, schedule.outputs[0][1], Power(30.0), epsilon = 1e-6);
        assert_approx_eq!(Power, schedule.outputs[1][1], Power(50.0), epsilon = 1e-6);
    }

    #[rstest]
    fn test_no_curtailment_limits_oversupply(thermal: Technology, demand: DemandSeries) {
        let mut must_run = Technology::new("must_run", "thermal", Power(100.0));
        must_run.ramping = Some(RampingCapability {
            ramp_up: Dimensionless(0.0),
            ramp_down: Dimensionless(0.0),
        });
        let portfolio = portfolio(vec![thermal, must_run], vec![100.0, 100.0]);
        let options = DispatchOptions {
            curtailment: false,
            ..DispatchOptions::default()
        };
        let schedule = solve(&portfolio, &demand, &options).unwrap();
        schedule
            .check_feasible(&portfolio, &demand, &options, 1e-6)
            .unwrap();
        for t in 0..demand.len() {
            assert!(schedule.curtailment[t].0 <= 1e-6);
        }
    }
}
