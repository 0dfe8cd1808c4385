//! Multi-objective capacity expansion.
//!
//! The decision variables are the capacities of each technology. Candidates are generated by an
//! [`EvolutionaryEngine`] (NSGA-II by default), dispatched against the demand series and scored
//! by every objective. The search returns the Pareto front of the final population along with
//! every evaluation made along the way, which the MGA explorer can reuse.
use crate::error::{TechmixError, ensure_config};
use crate::pareto::{Evaluation, ParetoFront};
use crate::portfolio::DecisionBounds;
use crate::units::Power;
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

pub mod constraint;
pub mod evaluator;
pub mod nsga2;
pub use constraint::{CapacityCreditRequirement, Constraint, ConstraintList};
pub use evaluator::{DEFAULT_PENALTY, Evaluator};
pub use nsga2::Nsga2;

/// Default number of candidates in each generation
pub const DEFAULT_POPULATION_SIZE: usize = 100;

/// Default maximum number of generations
pub const DEFAULT_GENERATIONS: usize = 100;

/// Default relative improvement in hypervolume needed to reset the stagnation counter
pub const DEFAULT_HYPERVOLUME_TOLERANCE: f64 = 1e-6;

/// An algorithm which proposes candidate decision vectors
pub trait EvolutionaryEngine {
    /// Create the initial population, within bounds
    fn initialise(&mut self, bounds: &DecisionBounds, size: usize) -> Vec<Vec<Power>>;

    /// Create a new generation of candidates from an evaluated population
    fn offspring(&mut self, population: &[Evaluation], bounds: &DecisionBounds)
    -> Vec<Vec<Power>>;

    /// Choose which of the parents and offspring survive to the next generation.
    ///
    /// `combined` holds the parents followed by their offspring.
    fn select(&mut self, combined: Vec<Evaluation>, size: usize) -> Vec<Evaluation>;
}

/// Settings for a capacity expansion run
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSettings {
    /// Number of candidates in each generation
    pub population_size: usize,
    /// Maximum number of generations after the initial population
    pub generations: usize,
    /// Seed for the random number generator
    pub seed: u64,
    /// Stop after this many generations without hypervolume improvement
    pub stagnation_generations: Option<usize>,
    /// Relative improvement in hypervolume which counts as progress
    pub hypervolume_tolerance: f64,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self {
            population_size: DEFAULT_POPULATION_SIZE,
            generations: DEFAULT_GENERATIONS,
            seed: 0,
            stagnation_generations: None,
            hypervolume_tolerance: DEFAULT_HYPERVOLUME_TOLERANCE,
        }
    }
}

/// Summary statistics of the feasible members of one generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStats {
    /// Generation number (0 is the initial population)
    pub generation: usize,
    /// Number of evaluations made in this generation
    pub evaluations: usize,
    /// Number of feasible members of the population
    pub feasible: usize,
    /// Minimum of each objective
    pub min: Vec<f64>,
    /// Mean of each objective
    pub avg: Vec<f64>,
    /// Maximum of each objective
    pub max: Vec<f64>,
}

impl GenerationStats {
    fn new(generation: usize, evaluations: usize, population: &[Evaluation]) -> Self {
        let feasible = population
            .iter()
            .filter(|eval| eval.is_feasible())
            .collect_vec();
        let n_objectives = population.first().map_or(0, |eval| eval.objectives.len());
        let column = |m: usize| feasible.iter().map(move |eval| eval.objectives.values()[m]);

        let (min, avg, max) = if feasible.is_empty() {
            let nan = vec![f64::NAN; n_objectives];
            (nan.clone(), nan.clone(), nan)
        } else {
            (
                (0..n_objectives)
                    .map(|m| column(m).fold(f64::INFINITY, f64::min))
                    .collect(),
                (0..n_objectives)
                    .map(|m| column(m).sum::<f64>() / feasible.len() as f64)
                    .collect(),
                (0..n_objectives)
                    .map(|m| column(m).fold(f64::NEG_INFINITY, f64::max))
                    .collect(),
            )
        };

        Self {
            generation,
            evaluations,
            feasible: feasible.len(),
            min,
            avg,
            max,
        }
    }

    fn log(&self) {
        let format = |values: &[f64]| values.iter().map(|v| format!("{v:.6e}")).join(" ");
        info!(
            "gen {:>4} | evals {:>5} | feasible {:>5} | min [{}] | avg [{}] | max [{}]",
            self.generation,
            self.evaluations,
            self.feasible,
            format(&self.min),
            format(&self.avg),
            format(&self.max)
        );
    }
}

/// The outcome of a capacity expansion run
#[derive(Debug, Clone)]
pub struct ExpansionResult {
    /// The non-dominated members of the final population
    pub front: ParetoFront,
    /// Every evaluation made, in the order it was made
    pub history: Vec<Evaluation>,
    /// Statistics for each generation
    pub generations: Vec<GenerationStats>,
}

/// Tracks hypervolume between generations to detect stagnation
struct StagnationMonitor {
    limit: usize,
    tolerance: f64,
    reference: Option<Vec<f64>>,
    best: f64,
    stalled: usize,
}

impl StagnationMonitor {
    fn new(limit: usize, tolerance: f64) -> Self {
        Self {
            limit,
            tolerance,
            reference: None,
            best: 0.0,
            stalled: 0,
        }
    }

    /// Record the latest population. Returns true if the search should stop.
    fn update(&mut self, population: &[Evaluation]) -> bool {
        let front = ParetoFront::from_evaluations(population);
        let points = front
            .iter()
            .filter(|eval| eval.is_feasible())
            .map(|eval| eval.fitness.clone())
            .collect_vec();
        if points.is_empty() {
            return false;
        }

        // Reference point is fixed the first time anything is feasible: just beyond the worst
        // value of each objective
        let reference = self.reference.get_or_insert_with(|| {
            (0..points[0].len())
                .map(|m| {
                    let worst = points.iter().map(|p| p[m]).fold(f64::NEG_INFINITY, f64::max);
                    worst + 0.1 * worst.abs().max(1.0)
                })
                .collect()
        });

        let volume = crate::pareto::hypervolume(&points, reference);
        debug!("Hypervolume: {volume}");
        if volume > self.best * (1.0 + self.tolerance) {
            self.best = volume;
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }

        self.stalled >= self.limit
    }
}

/// Searches for the Pareto-optimal capacity of each technology
pub struct CapacityExpansion<E = Nsga2> {
    evaluator: Evaluator,
    bounds: DecisionBounds,
    settings: ExpansionSettings,
    engine: E,
}

impl CapacityExpansion<Nsga2> {
    /// Create a new search using NSGA-II
    pub fn new(
        evaluator: Evaluator,
        bounds: DecisionBounds,
        settings: ExpansionSettings,
    ) -> Result<Self, TechmixError> {
        let engine = Nsga2::new(settings.seed);
        Self::with_engine(evaluator, bounds, settings, engine)
    }
}

impl<E: EvolutionaryEngine> CapacityExpansion<E> {
    /// Create a new search using the given evolutionary engine
    pub fn with_engine(
        evaluator: Evaluator,
        bounds: DecisionBounds,
        settings: ExpansionSettings,
        engine: E,
    ) -> Result<Self, TechmixError> {
        ensure_config!(
            bounds.len() == evaluator.technologies().len(),
            "Decision bounds have length {} but there are {} technologies",
            bounds.len(),
            evaluator.technologies().len()
        );
        ensure_config!(
            settings.population_size >= 2,
            "Population size must be at least 2"
        );
        ensure_config!(
            settings.hypervolume_tolerance >= 0.0,
            "Hypervolume tolerance must not be negative"
        );
        ensure_config!(
            settings.stagnation_generations != Some(0),
            "Stagnation generations must be greater than zero"
        );

        Ok(Self {
            evaluator,
            bounds,
            settings,
            engine,
        })
    }

    /// The evaluator used to score candidates
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// The decision bounds
    pub fn bounds(&self) -> &DecisionBounds {
        &self.bounds
    }

    /// Run the search
    pub fn run(&mut self) -> Result<ExpansionResult, TechmixError> {
        let size = self.settings.population_size;
        info!(
            "Starting capacity expansion with {} technologies, population size {size} and up to \
            {} generations",
            self.bounds.len(),
            self.settings.generations
        );

        let initial = self.engine.initialise(&self.bounds, size);
        let mut population = self.evaluator.evaluate_all(initial)?;
        let mut history = population.clone();
        let mut stats = vec![GenerationStats::new(0, population.len(), &population)];
        stats[0].log();

        let mut monitor = self
            .settings
            .stagnation_generations
            .map(|limit| StagnationMonitor::new(limit, self.settings.hypervolume_tolerance));
        if let Some(monitor) = monitor.as_mut() {
            monitor.update(&population);
        }

        for generation in 1..=self.settings.generations {
            let children = self.engine.offspring(&population, &self.bounds);
            let children = self.evaluator.evaluate_all(children)?;
            history.extend(children.iter().cloned());

            let n_children = children.len();
            let mut combined = population;
            combined.extend(children);
            population = self.engine.select(combined, size);

            let generation_stats = GenerationStats::new(generation, n_children, &population);
            generation_stats.log();
            stats.push(generation_stats);

            if let Some(monitor) = monitor.as_mut()
                && monitor.update(&population)
            {
                info!(
                    "Stopping after generation {generation}: no hypervolume improvement for {} \
                    generations",
                    monitor.limit
                );
                break;
            }
        }

        let front = ParetoFront::from_evaluations(&population);
        info!(
            "Capacity expansion finished with {} portfolios on the Pareto front after {} \
            evaluations",
            front.len(),
            history.len()
        );

        Ok(ExpansionResult {
            front,
            history,
            generations: stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::DemandSeries;
    use crate::dispatch::{DispatchOptions, DispatchStrategy};
    use crate::fixture::{demand, thermal, total_cost_objective};
    use crate::objective::builtin::{AnnualEmission, AnnualisedCapitalCost};
    use crate::objective::{ObjectiveList, Sense};
    use crate::pareto::dominates;
    use crate::portfolio::TechnologyList;
    use crate::technology::Technology;
    use crate::units::{Dimensionless, MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear};
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    /// Thermal plant and a cheap-to-build but expensive-to-run peaker
    #[fixture]
    fn thermal_peaker(mut thermal: Technology) -> TechnologyList {
        let mut peaker = Technology {
            capital_cost: MoneyPerPower(200.0),
            om_cost_fixed: MoneyPerPowerPerYear(2.0),
            fuel_cost: MoneyPerEnergy(80.0),
            ..Technology::new("peaker", "thermal", Power(50.0))
        };
        peaker.attributes.insert("co2_rate".into(), 0.8);
        thermal.attributes.insert("co2_rate".into(), 0.5);
        Arc::from(vec![thermal, peaker])
    }

    fn expansion(
        technologies: TechnologyList,
        demand: DemandSeries,
        objectives: ObjectiveList,
        settings: ExpansionSettings,
    ) -> CapacityExpansion {
        let requirement = demand.capacity_requirement(Dimensionless(0.0));
        let bounds = DecisionBounds::from_requirement(&technologies, requirement).unwrap();
        let evaluator = Evaluator::new(
            technologies,
            demand,
            objectives,
            DispatchStrategy::Hierarchical,
            DispatchOptions::default(),
        )
        .unwrap();
        CapacityExpansion::new(evaluator, bounds, settings).unwrap()
    }

    #[rstest]
    fn test_single_objective_converges_to_cheapest(
        thermal_peaker: TechnologyList,
        demand: DemandSeries,
        total_cost_objective: ObjectiveList,
    ) {
        // Cheapest feasible mix is 80 MW of thermal plant and no peaker, costing
        // 80 * (50 + 10) + 3 * 80 * 25 = 10800
        let settings = ExpansionSettings {
            population_size: 40,
            generations: 60,
            seed: 12,
            ..ExpansionSettings::default()
        };
        let result = expansion(thermal_peaker, demand, total_cost_objective, settings)
            .run()
            .unwrap();

        let best = result
            .front
            .iter()
            .min_by(|a, b| a.objectives.values()[0].total_cmp(&b.objectives.values()[0]))
            .unwrap();
        assert!(best.is_feasible());
        assert!(best.objectives.values()[0] < 10800.0 * 1.05);
        assert!(best.decision_vector()[0] > 70.0);
    }

    #[rstest]
    fn test_two_objectives_front_is_non_dominated(
        thermal_peaker: TechnologyList,
        demand: DemandSeries,
    ) {
        let objectives: ObjectiveList = vec![
            Arc::new(AnnualisedCapitalCost),
            Arc::new(AnnualEmission::default()),
        ];
        let settings = ExpansionSettings {
            population_size: 20,
            generations: 10,
            seed: 3,
            ..ExpansionSettings::default()
        };
        let result = expansion(thermal_peaker, demand, objectives, settings)
            .run()
            .unwrap();

        assert!(!result.front.is_empty());
        assert_eq!(result.history.len(), 20 * 11);
        assert_eq!(result.generations.len(), 11);
        for a in result.front.iter() {
            assert!(a.is_feasible());
            for b in result.front.iter() {
                assert!(!dominates(&a.fitness, &b.fitness));
            }
        }
    }

    #[rstest]
    fn test_seeded_run_is_reproducible(
        thermal_peaker: TechnologyList,
        demand: DemandSeries,
        total_cost_objective: ObjectiveList,
    ) {
        let settings = ExpansionSettings {
            population_size: 10,
            generations: 5,
            seed: 99,
            ..ExpansionSettings::default()
        };
        let run = || {
            expansion(
                thermal_peaker.clone(),
                demand.clone(),
                total_cost_objective.clone(),
                settings.clone(),
            )
            .run()
            .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.front, second.front);
        assert_eq!(first.history, second.history);
    }

    #[rstest]
    fn test_stagnation_stops_early(thermal_peaker: TechnologyList, demand: DemandSeries) {
        // An objective which never changes gives no hypervolume improvement
        let objectives: ObjectiveList = vec![Arc::new(crate::objective::FnObjective::new(
            "constant",
            Sense::Minimise,
            |_, _| 1.0,
        ))];
        let settings = ExpansionSettings {
            population_size: 10,
            generations: 50,
            stagnation_generations: Some(3),
            ..ExpansionSettings::default()
        };
        let result = expansion(thermal_peaker, demand, objectives, settings)
            .run()
            .unwrap();
        // Three stalled generations after the first one with a feasible portfolio
        assert!(result.generations.len() <= 10);
    }

    #[rstest]
    fn test_invalid_population_size(
        thermal_peaker: TechnologyList,
        demand: DemandSeries,
        total_cost_objective: ObjectiveList,
    ) {
        let bounds = DecisionBounds::from_requirement(&thermal_peaker, Power(80.0)).unwrap();
        let evaluator = Evaluator::new(
            thermal_peaker,
            demand,
            total_cost_objective,
            DispatchStrategy::Hierarchical,
            DispatchOptions::default(),
        )
        .unwrap();
        let settings = ExpansionSettings {
            population_size: 1,
            ..ExpansionSettings::default()
        };
        assert!(matches!(
            CapacityExpansion::new(evaluator, bounds, settings),
            Err(TechmixError::InvalidConfiguration(_))
        ));
    }
}
