//! The NSGA-II evolutionary algorithm.
//!
//! See Deb et al. (2002), "A fast and elitist multiobjective genetic algorithm: NSGA-II". Variation
//! uses bounded simulated binary crossover and polynomial mutation.
use super::EvolutionaryEngine;
use crate::pareto::{Evaluation, crowding_distance, non_dominated_sort};
use crate::portfolio::DecisionBounds;
use crate::units::Power;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Distribution index for simulated binary crossover
pub const DEFAULT_CROSSOVER_ETA: f64 = 30.0;

/// Distribution index for polynomial mutation
pub const DEFAULT_MUTATION_ETA: f64 = 20.0;

/// Pairs of parents closer than this in some variable are not crossed in that variable
const MIN_CROSSOVER_GAP: f64 = 1e-14;

/// NSGA-II with a seeded random number generator
#[derive(Debug, Clone)]
pub struct Nsga2 {
    rng: StdRng,
    /// Distribution index for crossover (larger values give children closer to parents)
    pub crossover_eta: f64,
    /// Distribution index for mutation
    pub mutation_eta: f64,
    /// Probability that a pair of parents is crossed
    pub crossover_probability: f64,
    /// Per-variable mutation probability. Defaults to one over the number of variables.
    pub mutation_probability: Option<f64>,
}

impl Nsga2 {
    /// Create a new engine with the default operator settings
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            crossover_eta: DEFAULT_CROSSOVER_ETA,
            mutation_eta: DEFAULT_MUTATION_ETA,
            crossover_probability: 1.0,
            mutation_probability: None,
        }
    }

    /// Pick the better of two random individuals, by rank and then by crowding distance
    fn tournament(&mut self, rank: &[usize], crowding: &[f64]) -> usize {
        let a = self.rng.random_range(0..rank.len());
        let b = self.rng.random_range(0..rank.len());
        let (first, second) = (a.min(b), a.max(b));
        let order = rank[first]
            .cmp(&rank[second])
            .then_with(|| crowding[second].total_cmp(&crowding[first]));
        match order {
            Ordering::Greater => second,
            _ => first,
        }
    }

    /// Bounded simulated binary crossover
    fn crossover(
        &mut self,
        mut child1: Vec<f64>,
        mut child2: Vec<f64>,
        bounds: &DecisionBounds,
    ) -> (Vec<f64>, Vec<f64>) {
        if self.rng.random::<f64>() > self.crossover_probability {
            return (child1, child2);
        }

        let eta = self.crossover_eta;
        let exponent = 1.0 / (eta + 1.0);
        for (i, (a, b)) in child1.iter_mut().zip(child2.iter_mut()).enumerate() {
            if self.rng.random::<f64>() > 0.5 {
                continue;
            }
            if (*a - *b).abs() <= MIN_CROSSOVER_GAP {
                continue;
            }

            let (lower, upper) = (bounds.lower()[i].0, bounds.upper()[i].0);
            let x1 = a.min(*b);
            let x2 = a.max(*b);
            let u = self.rng.random::<f64>();

            let spread = |beta: f64| {
                let alpha = 2.0 - beta.powf(-(eta + 1.0));
                if u <= 1.0 / alpha {
                    (u * alpha).powf(exponent)
                } else {
                    (1.0 / (2.0 - u * alpha)).powf(exponent)
                }
            };
            let beta_lower = spread(1.0 + 2.0 * (x1 - lower) / (x2 - x1));
            let beta_upper = spread(1.0 + 2.0 * (upper - x2) / (x2 - x1));
            let c1 = (0.5 * (x1 + x2 - beta_lower * (x2 - x1))).clamp(lower, upper);
            let c2 = (0.5 * (x1 + x2 + beta_upper * (x2 - x1))).clamp(lower, upper);

            if self.rng.random::<f64>() <= 0.5 {
                (*a, *b) = (c2, c1);
            } else {
                (*a, *b) = (c1, c2);
            }
        }

        (child1, child2)
    }

    /// Bounded polynomial mutation
    fn mutate(&mut self, child: &mut [f64], bounds: &DecisionBounds) {
        let probability = self
            .mutation_probability
            .unwrap_or(1.0 / child.len() as f64);
        let exponent = 1.0 / (self.mutation_eta + 1.0);
        for (i, x) in child.iter_mut().enumerate() {
            if self.rng.random::<f64>() > probability {
                continue;
            }
            let (lower, upper) = (bounds.lower()[i].0, bounds.upper()[i].0);
            let range = upper - lower;
            if range <= 0.0 {
                continue;
            }

            let delta1 = (*x - lower) / range;
            let delta2 = (upper - *x) / range;
            let u = self.rng.random::<f64>();
            let delta = if u < 0.5 {
                let xy = 1.0 - delta1;
                let value = 2.0 * u + (1.0 - 2.0 * u) * xy.powf(self.mutation_eta + 1.0);
                value.powf(exponent) - 1.0
            } else {
                let xy = 1.0 - delta2;
                let value =
                    2.0 * (1.0 - u) + 2.0 * (u - 0.5) * xy.powf(self.mutation_eta + 1.0);
                1.0 - value.powf(exponent)
            };
            *x = (*x + delta * range).clamp(lower, upper);
        }
    }
}

/// The front index and crowding distance of every evaluation
fn rank_and_crowding(evaluations: &[Evaluation]) -> (Vec<usize>, Vec<f64>) {
    let mut rank = vec![0; evaluations.len()];
    let mut crowding = vec![0.0; evaluations.len()];
    for (front_index, front) in non_dominated_sort(evaluations).iter().enumerate() {
        let fitness = front
            .iter()
            .map(|i| evaluations[*i].fitness.as_slice())
            .collect_vec();
        for (i, distance) in front.iter().zip(crowding_distance(&fitness)) {
            rank[*i] = front_index;
            crowding[*i] = distance;
        }
    }

    (rank, crowding)
}

fn to_power(decision: Vec<f64>) -> Vec<Power> {
    decision.into_iter().map(Power).collect()
}

impl EvolutionaryEngine for Nsga2 {
    fn initialise(&mut self, bounds: &DecisionBounds, size: usize) -> Vec<Vec<Power>> {
        (0..size)
            .map(|_| {
                bounds
                    .lower()
                    .iter()
                    .zip(bounds.upper())
                    .map(|(lower, upper)| Power(self.rng.random_range(lower.0..=upper.0)))
                    .collect()
            })
            .collect()
    }

    fn offspring(
        &mut self,
        population: &[Evaluation],
        bounds: &DecisionBounds,
    ) -> Vec<Vec<Power>> {
        let (rank, crowding) = rank_and_crowding(population);
        let mut children = Vec::with_capacity(population.len());
        while children.len() < population.len() {
            let parent1 = self.tournament(&rank, &crowding);
            let parent2 = self.tournament(&rank, &crowding);
            let (mut child1, mut child2) = self.crossover(
                population[parent1].decision_vector(),
                population[parent2].decision_vector(),
                bounds,
            );
            self.mutate(&mut child1, bounds);
            self.mutate(&mut child2, bounds);

            children.push(to_power(child1));
            if children.len() < population.len() {
                children.push(to_power(child2));
            }
        }

        children
    }

    fn select(&mut self, combined: Vec<Evaluation>, size: usize) -> Vec<Evaluation> {
        let mut chosen = Vec::with_capacity(size);
        for front in non_dominated_sort(&combined) {
            let remaining = size - chosen.len();
            if remaining == 0 {
                break;
            }
            if front.len() <= remaining {
                chosen.extend(front);
                continue;
            }

            // Fill up with the least crowded members of the last front. Sorting is stable so
            // ties keep insertion order.
            let fitness = front
                .iter()
                .map(|i| combined[*i].fitness.as_slice())
                .collect_vec();
            let crowding = crowding_distance(&fitness);
            chosen.extend(
                front
                    .iter()
                    .zip(&crowding)
                    .sorted_by(|(_, a), (_, b)| b.total_cmp(a))
                    .take(remaining)
                    .map(|(i, _)| *i),
            );
            break;
        }

        let mut combined = combined.into_iter().map(Some).collect_vec();
        chosen
            .into_iter()
            .filter_map(|i| combined[i].take())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{bounds, thermal_storage_technologies};
    use crate::objective::ObjectiveVector;
    use crate::portfolio::{Portfolio, TechnologyList};
    use rstest::rstest;

    fn evaluate_pair(technologies: &TechnologyList, decision: &[Power]) -> Evaluation {
        // Two conflicting objectives: total capacity and distance from (200, 100)
        let x = decision[0].0;
        let y = decision[1].0;
        let fitness = vec![x + y, (200.0 - x) + (100.0 - y) * 2.0];
        Evaluation {
            portfolio: Portfolio::new(technologies.clone(), decision.to_vec()).unwrap(),
            objectives: ObjectiveVector(fitness.clone()),
            fitness,
            violation: 0.0,
            dispatch_feasible: true,
        }
    }

    #[rstest]
    fn test_initialise_within_bounds(bounds: DecisionBounds) {
        let mut engine = Nsga2::new(42);
        let population = engine.initialise(&bounds, 50);
        assert_eq!(population.len(), 50);
        assert!(population.iter().all(|decision| bounds.contains(decision)));
    }

    #[rstest]
    fn test_initialise_is_reproducible(bounds: DecisionBounds) {
        assert_eq!(
            Nsga2::new(7).initialise(&bounds, 10),
            Nsga2::new(7).initialise(&bounds, 10)
        );
        assert_ne!(
            Nsga2::new(7).initialise(&bounds, 10),
            Nsga2::new(8).initialise(&bounds, 10)
        );
    }

    #[rstest]
    fn test_offspring_within_bounds(
        bounds: DecisionBounds,
        thermal_storage_technologies: TechnologyList,
    ) {
        let mut engine = Nsga2::new(1);
        let population = engine
            .initialise(&bounds, 11)
            .iter()
            .map(|decision| evaluate_pair(&thermal_storage_technologies, decision))
            .collect_vec();
        let children = engine.offspring(&population, &bounds);
        assert_eq!(children.len(), 11);
        assert!(children.iter().all(|decision| bounds.contains(decision)));
    }

    #[test]
    fn test_crossover_zero_width_bounds() {
        let bounds = DecisionBounds::new(vec![Power(5.0); 2], vec![Power(5.0); 2]).unwrap();
        let mut engine = Nsga2::new(3);
        let (child1, child2) = engine.crossover(vec![5.0, 5.0], vec![5.0, 5.0], &bounds);
        assert_eq!(child1, [5.0, 5.0]);
        assert_eq!(child2, [5.0, 5.0]);

        let mut child = vec![5.0, 5.0];
        engine.mutation_probability = Some(1.0);
        engine.mutate(&mut child, &bounds);
        assert_eq!(child, [5.0, 5.0]);
    }

    #[rstest]
    fn test_select_keeps_best_fronts(thermal_storage_technologies: TechnologyList) {
        let decisions = [
            [Power(10.0), Power(10.0)],
            [Power(0.0), Power(0.0)],
            [Power(200.0), Power(100.0)],
            [Power(5.0), Power(5.0)],
        ];
        let combined = decisions
            .iter()
            .map(|decision| evaluate_pair(&thermal_storage_technologies, decision))
            .collect_vec();
        // Fitness: (20, 370), (0, 400), (300, 0), (10, 385); all mutually non-dominated
        let selected = Nsga2::new(0).select(combined, 2);
        // The extremes of the front have infinite crowding distance
        let chosen = selected
            .iter()
            .map(|eval| eval.decision_vector()[0])
            .collect_vec();
        assert_eq!(chosen, [0.0, 200.0]);
    }

    #[rstest]
    fn test_select_prefers_lower_rank(thermal_storage_technologies: TechnologyList) {
        let mut dominated =
            evaluate_pair(&thermal_storage_technologies, &[Power(1.0), Power(1.0)]);
        dominated.fitness = vec![1000.0, 1000.0];
        let combined = vec![
            dominated,
            evaluate_pair(&thermal_storage_technologies, &[Power(2.0), Power(2.0)]),
        ];
        let selected = Nsga2::new(0).select(combined, 1);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].decision_vector(), [2.0, 2.0]);
    }
}
