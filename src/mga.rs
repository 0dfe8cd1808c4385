//! N-dimensional modelling to generate alternatives (MGA).
//!
//! Given one or more optimal reference portfolios, find a set of portfolios which are nearly as
//! good in every objective (within some slack) but are as different from one another as possible
//! in terms of deployed capacity. Diversity is achieved with farthest-first traversal in
//! normalised decision space, seeded with the reference portfolios.
use crate::error::{TechmixError, ensure_config};
use crate::expansion::Evaluator;
use crate::objective::Sense;
use crate::pareto::{Evaluation, ParetoFront, decision_key};
use crate::portfolio::DecisionBounds;
use crate::units::Power;
use itertools::Itertools;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::HashSet;

/// Default number of alternatives to select
pub const DEFAULT_N_ALTERNATIVES: usize = 10;

/// Default number of random portfolios added to the candidate pool
pub const DEFAULT_N_SAMPLES: usize = 500;

/// How far from the reference an alternative may be, as a fraction of each objective value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Slack {
    /// The same slack for every objective
    Scalar(f64),
    /// One slack value per objective
    PerObjective(Vec<f64>),
}

impl Default for Slack {
    fn default() -> Self {
        Self::Scalar(0.1)
    }
}

impl Slack {
    /// One slack value per objective, checking the values are valid
    pub fn resolve(&self, n_objectives: usize) -> Result<Vec<f64>, TechmixError> {
        let values = match self {
            Self::Scalar(value) => vec![*value; n_objectives],
            Self::PerObjective(values) => {
                ensure_config!(
                    values.len() == n_objectives,
                    "{} slack values were given but there are {n_objectives} objectives",
                    values.len()
                );
                values.clone()
            }
        };
        ensure_config!(
            values.iter().all(|value| value.is_finite() && *value >= 0.0),
            "Slack values must be finite and non-negative"
        );

        Ok(values)
    }
}

/// How alternatives are chosen from the near-optimal region
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MgaSelection {
    /// Greedily pick the candidate farthest from everything picked so far
    #[default]
    #[string = "farthest_first"]
    FarthestFirst,
    /// Pick a seeded random sample
    #[string = "random"]
    Random,
    /// Return every candidate in the region
    #[string = "all"]
    All,
}

/// Settings for MGA exploration
#[derive(Debug, Clone, PartialEq)]
pub struct MgaSettings {
    /// Slack defining the near-optimal region
    pub slack: Slack,
    /// Maximum number of alternatives to select
    pub n_alternatives: usize,
    /// Number of random portfolios to evaluate in addition to prior evaluations
    pub n_samples: usize,
    /// How to select alternatives from the region
    pub selection: MgaSelection,
    /// Seed for the random number generator
    pub seed: u64,
}

impl Default for MgaSettings {
    fn default() -> Self {
        Self {
            slack: Slack::default(),
            n_alternatives: DEFAULT_N_ALTERNATIVES,
            n_samples: DEFAULT_N_SAMPLES,
            selection: MgaSelection::default(),
            seed: 0,
        }
    }
}

/// A selected near-optimal portfolio
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    /// The evaluated portfolio
    pub evaluation: Evaluation,
    /// Normalised distance to the nearest reference or previously selected portfolio
    pub min_distance: f64,
}

/// Near-optimal alternatives in the order they were selected
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlternativeSet {
    alternatives: Vec<Alternative>,
    slack: Vec<f64>,
    region_size: usize,
}

impl AlternativeSet {
    /// The selected alternatives
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Iterate over the alternatives
    pub fn iter(&self) -> impl Iterator<Item = &Alternative> {
        self.alternatives.iter()
    }

    /// Number of alternatives
    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    /// Whether no alternatives were selected
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// The slack for each objective
    pub fn slack(&self) -> &[f64] {
        &self.slack
    }

    /// Number of candidates found in the near-optimal region
    pub fn region_size(&self) -> usize {
        self.region_size
    }
}

/// Whether a candidate's objective values are within slack of a reference's
pub fn is_near_optimal(
    candidate: &[f64],
    reference: &[f64],
    senses: &[Sense],
    slack: &[f64],
) -> bool {
    candidate
        .iter()
        .zip(reference)
        .zip(senses.iter().zip(slack))
        .all(|((value, reference), (sense, slack))| {
            let margin = slack * reference.abs();
            match sense {
                Sense::Minimise => *value <= reference + margin,
                Sense::Maximise => *value >= reference - margin,
            }
        })
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// For each candidate, the distance to the nearest of `points`
fn nearest_distances(candidates: &[Vec<f64>], points: &[Vec<f64>]) -> Vec<f64> {
    candidates
        .iter()
        .map(|candidate| {
            points
                .iter()
                .map(|point| distance(candidate, point))
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// Farthest-first traversal.
///
/// Starting from `seeds`, repeatedly select the candidate whose distance to the nearest
/// already-selected point is largest, until `n` candidates are selected or none remain. Ties go to
/// the candidate with the lowest index.
///
/// # Returns
///
/// The indices of the selected candidates, in selection order, along with the minimum distance
/// at the time each was selected.
pub fn farthest_first(
    seeds: &[Vec<f64>],
    candidates: &[Vec<f64>],
    n: usize,
) -> Vec<(usize, f64)> {
    let mut nearest = nearest_distances(candidates, seeds);
    let mut available = vec![true; candidates.len()];
    let mut selected = Vec::with_capacity(n.min(candidates.len()));

    while selected.len() < n {
        let mut best: Option<(usize, f64)> = None;
        for (i, d) in nearest.iter().enumerate() {
            if available[i] && best.is_none_or(|(_, best_d)| *d > best_d) {
                best = Some((i, *d));
            }
        }
        let Some((chosen, chosen_distance)) = best else {
            break;
        };

        available[chosen] = false;
        selected.push((chosen, chosen_distance));
        for (i, candidate) in candidates.iter().enumerate() {
            nearest[i] = nearest[i].min(distance(candidate, &candidates[chosen]));
        }
    }

    selected
}

/// Order `indices` as given, recording the minimum distance to the seeds and earlier picks
fn with_distances(
    seeds: &[Vec<f64>],
    candidates: &[Vec<f64>],
    indices: impl IntoIterator<Item = usize>,
) -> Vec<(usize, f64)> {
    let mut points = seeds.to_vec();
    indices
        .into_iter()
        .map(|i| {
            let d = nearest_distances(std::slice::from_ref(&candidates[i]), &points)[0];
            points.push(candidates[i].clone());
            (i, d)
        })
        .collect()
}

/// Explores the near-optimal region around a reference
pub struct MgaExplorer {
    evaluator: Evaluator,
    bounds: DecisionBounds,
    settings: MgaSettings,
    slack: Vec<f64>,
}

impl MgaExplorer {
    /// Create a new explorer, checking that the settings are consistent with the objectives
    pub fn new(
        evaluator: Evaluator,
        bounds: DecisionBounds,
        settings: MgaSettings,
    ) -> Result<Self, TechmixError> {
        ensure_config!(
            bounds.len() == evaluator.technologies().len(),
            "Decision bounds have length {} but there are {} technologies",
            bounds.len(),
            evaluator.technologies().len()
        );
        let slack = settings.slack.resolve(evaluator.objectives().len())?;

        Ok(Self {
            evaluator,
            bounds,
            settings,
            slack,
        })
    }

    /// Find alternatives around every member of a Pareto front
    pub fn explore_front(
        &self,
        front: &ParetoFront,
        prior: &[Evaluation],
    ) -> Result<AlternativeSet, TechmixError> {
        self.explore(front.members(), prior)
    }

    /// Find near-optimal alternatives.
    ///
    /// # Arguments
    ///
    /// * `reference` - The optimal portfolios, which must have been evaluated with the same
    ///   objectives. Infeasible members are ignored, since their objectives are penalties.
    /// * `prior` - Evaluations already made (e.g. during capacity expansion) to add to the pool
    ///
    /// # Returns
    ///
    /// The selected alternatives, or [`TechmixError::EmptyRegion`] if no candidate lies within the
    /// slack of any reference portfolio.
    pub fn explore(
        &self,
        reference: &[Evaluation],
        prior: &[Evaluation],
    ) -> Result<AlternativeSet, TechmixError> {
        ensure_config!(!reference.is_empty(), "MGA requires at least one reference portfolio");
        let n_objectives = self.evaluator.objectives().len();
        ensure_config!(
            reference
                .iter()
                .all(|eval| eval.objectives.len() == n_objectives),
            "Reference portfolios must have one value per objective"
        );
        let reference = reference
            .iter()
            .filter(|eval| eval.is_feasible())
            .collect_vec();
        ensure_config!(
            !reference.is_empty(),
            "MGA requires at least one feasible reference portfolio"
        );

        let pool = self.candidate_pool(&reference, prior)?;
        let senses = self
            .evaluator
            .objectives()
            .iter()
            .map(|objective| objective.sense())
            .collect_vec();
        let region = pool
            .into_iter()
            .filter(|candidate| {
                reference.iter().any(|reference| {
                    is_near_optimal(
                        candidate.objectives.values(),
                        reference.objectives.values(),
                        &senses,
                        &self.slack,
                    )
                })
            })
            .collect_vec();
        if region.is_empty() {
            return Err(TechmixError::EmptyRegion {
                slack: self.slack.clone(),
            });
        }
        info!("{} candidates lie in the near-optimal region", region.len());

        let normalise = |eval: &Evaluation| self.bounds.normalise(eval.portfolio.capacities());
        let seeds = reference.iter().copied().map(normalise).collect_vec();
        let points = region.iter().map(normalise).collect_vec();
        let n = self.settings.n_alternatives;
        let selected = match self.settings.selection {
            MgaSelection::FarthestFirst => farthest_first(&seeds, &points, n),
            MgaSelection::Random => {
                let mut rng = StdRng::seed_from_u64(self.settings.seed);
                let sample = rand::seq::index::sample(&mut rng, points.len(), n.min(points.len()));
                with_distances(&seeds, &points, sample.into_vec())
            }
            MgaSelection::All => with_distances(&seeds, &points, 0..points.len()),
        };

        let region_size = region.len();
        let mut region = region.into_iter().map(Some).collect_vec();
        let alternatives = selected
            .into_iter()
            .filter_map(|(i, min_distance)| {
                region[i].take().map(|evaluation| Alternative {
                    evaluation,
                    min_distance,
                })
            })
            .collect_vec();
        info!("Selected {} alternatives", alternatives.len());

        Ok(AlternativeSet {
            alternatives,
            slack: self.slack.clone(),
            region_size,
        })
    }

    /// Prior evaluations plus random samples, without duplicates, infeasible portfolios or the
    /// reference portfolios themselves
    fn candidate_pool(
        &self,
        reference: &[&Evaluation],
        prior: &[Evaluation],
    ) -> Result<Vec<Evaluation>, TechmixError> {
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let samples = (0..self.settings.n_samples)
            .map(|_| {
                self.bounds
                    .lower()
                    .iter()
                    .zip(self.bounds.upper())
                    .map(|(lower, upper)| Power(rng.random_range(lower.0..=upper.0)))
                    .collect()
            })
            .collect();
        let sampled = self.evaluator.evaluate_all(samples)?;

        let mut seen: HashSet<Vec<u64>> = reference
            .iter()
            .map(|eval| decision_key(&eval.decision_vector()))
            .collect();
        let pool = prior
            .iter()
            .cloned()
            .chain(sampled)
            .filter(|eval| {
                eval.is_feasible() && seen.insert(decision_key(&eval.decision_vector()))
            })
            .collect();

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::DemandSeries;
    use crate::dispatch::{DispatchOptions, DispatchStrategy};
    use crate::fixture::{demand, technologies, total_cost_objective};
    use crate::objective::ObjectiveList;
    use crate::portfolio::TechnologyList;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[rstest]
    #[case(1000.0, true)]
    #[case(1050.0, true)]
    #[case(1050.1, false)]
    #[case(900.0, true)]
    fn test_is_near_optimal_minimise(#[case] value: f64, #[case] expected: bool) {
        assert_eq!(
            is_near_optimal(&[value], &[1000.0], &[Sense::Minimise], &[0.05]),
            expected
        );
    }

    #[rstest]
    #[case(950.0, true)]
    #[case(949.0, false)]
    #[case(2000.0, true)]
    fn test_is_near_optimal_maximise(#[case] value: f64, #[case] expected: bool) {
        assert_eq!(
            is_near_optimal(&[value], &[1000.0], &[Sense::Maximise], &[0.05]),
            expected
        );
    }

    #[test]
    fn test_is_near_optimal_negative_reference() {
        // Slack is relative to the magnitude of the reference
        assert!(is_near_optimal(&[-95.0], &[-100.0], &[Sense::Minimise], &[0.1]));
        assert!(!is_near_optimal(&[-85.0], &[-100.0], &[Sense::Minimise], &[0.1]));
    }

    #[test]
    fn test_slack_resolve() {
        assert_eq!(Slack::Scalar(0.1).resolve(3).unwrap(), [0.1, 0.1, 0.1]);
        assert!(Slack::PerObjective(vec![0.1]).resolve(2).is_err());
        assert!(Slack::Scalar(-0.1).resolve(1).is_err());
    }

    #[test]
    fn test_farthest_first() {
        let seeds = vec![vec![0.0, 0.0]];
        let candidates = vec![
            vec![0.1, 0.0],
            vec![1.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ];
        let selected = farthest_first(&seeds, &candidates, 3);
        let indices = selected.iter().map(|(i, _)| *i).collect_vec();
        // (1, 0) and (0, 1) tie at distance 1 from (1, 1): the lower index wins
        assert_eq!(indices, [1, 2, 3]);
        assert_approx_eq!(f64, selected[0].1, 2.0_f64.sqrt());
        assert_approx_eq!(f64, selected[1].1, 1.0);
        assert_approx_eq!(f64, selected[2].1, 1.0);
    }

    #[test]
    fn test_farthest_first_exhausts_candidates() {
        let candidates = vec![vec![0.5], vec![1.0]];
        let selected = farthest_first(&[vec![0.0]], &candidates, 10);
        assert_eq!(selected.len(), 2);
    }

    #[fixture]
    fn explorer_inputs(
        technologies: TechnologyList,
        demand: DemandSeries,
        total_cost_objective: ObjectiveList,
    ) -> (Evaluator, DecisionBounds) {
        let bounds = DecisionBounds::from_requirement(&technologies, demand.max()).unwrap();
        let evaluator = Evaluator::new(
            technologies,
            demand,
            total_cost_objective,
            DispatchStrategy::Hierarchical,
            DispatchOptions::default(),
        )
        .unwrap();
        (evaluator, bounds)
    }

    fn explorer(inputs: (Evaluator, DecisionBounds), settings: MgaSettings) -> MgaExplorer {
        MgaExplorer::new(inputs.0, inputs.1, settings).unwrap()
    }

    #[rstest]
    fn test_explore(explorer_inputs: (Evaluator, DecisionBounds)) {
        let reference = explorer_inputs
            .0
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        let settings = MgaSettings {
            slack: Slack::Scalar(0.5),
            n_alternatives: 5,
            n_samples: 400,
            ..MgaSettings::default()
        };
        let explorer = explorer(explorer_inputs, settings);
        let alternatives = explorer
            .explore(std::slice::from_ref(&reference), &[])
            .unwrap();

        assert!(!alternatives.is_empty());
        assert!(alternatives.len() <= 5);
        let limit = reference.objectives.values()[0] * 1.5;
        for alternative in alternatives.iter() {
            assert!(alternative.evaluation.is_feasible());
            assert!(alternative.evaluation.objectives.values()[0] <= limit);
            assert_ne!(
                alternative.evaluation.decision_vector(),
                reference.decision_vector()
            );
        }
        for (a, b) in alternatives.iter().tuple_windows() {
            assert!(a.min_distance >= b.min_distance);
        }
    }

    #[rstest]
    fn test_explore_prefix_stable(explorer_inputs: (Evaluator, DecisionBounds)) {
        let reference = explorer_inputs
            .0
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        let run = |n_alternatives| {
            let settings = MgaSettings {
                slack: Slack::Scalar(0.5),
                n_alternatives,
                n_samples: 200,
                ..MgaSettings::default()
            };
            explorer(explorer_inputs.clone(), settings)
                .explore(std::slice::from_ref(&reference), &[])
                .unwrap()
        };
        let three = run(3);
        let five = run(5);
        assert_eq!(three.alternatives(), &five.alternatives()[..three.len()]);
    }

    #[rstest]
    fn test_explore_empty_region(explorer_inputs: (Evaluator, DecisionBounds)) {
        let reference = explorer_inputs
            .0
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        let settings = MgaSettings {
            slack: Slack::Scalar(0.0),
            n_samples: 0,
            ..MgaSettings::default()
        };
        let result = explorer(explorer_inputs, settings).explore(&[reference], &[]);
        assert_eq!(result, Err(TechmixError::EmptyRegion { slack: vec![0.0] }));
    }

    #[rstest]
    fn test_explore_ignores_infeasible_reference(explorer_inputs: (Evaluator, DecisionBounds)) {
        // Too little capacity to meet demand, so the objective is a penalty
        let infeasible = explorer_inputs
            .0
            .evaluate(vec![Power(10.0), Power(0.0), Power(0.0)])
            .unwrap();
        assert!(!infeasible.is_feasible());
        let settings = MgaSettings {
            slack: Slack::Scalar(0.05),
            n_alternatives: 3,
            n_samples: 50,
            ..MgaSettings::default()
        };
        let explorer = explorer(explorer_inputs.clone(), settings);
        assert!(matches!(
            explorer.explore(std::slice::from_ref(&infeasible), &[]),
            Err(TechmixError::InvalidConfiguration(_))
        ));

        // Only the feasible reference sets the near-optimal threshold
        let feasible = explorer_inputs
            .0
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        let limit = feasible.objectives.values()[0] * 1.05;
        match explorer.explore(&[infeasible, feasible], &[]) {
            Ok(alternatives) => {
                for alternative in alternatives.iter() {
                    assert!(alternative.evaluation.objectives.values()[0] <= limit);
                }
            }
            Err(err) => assert_eq!(err, TechmixError::EmptyRegion { slack: vec![0.05] }),
        }
    }

    #[rstest]
    fn test_explore_all(explorer_inputs: (Evaluator, DecisionBounds)) {
        let reference = explorer_inputs
            .0
            .evaluate(vec![Power(80.0), Power(0.0), Power(0.0)])
            .unwrap();
        let prior = explorer_inputs
            .0
            .evaluate(vec![Power(80.0), Power(1.0), Power(0.0)])
            .unwrap();
        let settings = MgaSettings {
            slack: Slack::Scalar(0.1),
            n_samples: 0,
            selection: MgaSelection::All,
            ..MgaSettings::default()
        };
        let alternatives = explorer(explorer_inputs, settings)
            .explore(&[reference], &[prior])
            .unwrap();
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives.region_size(), 1);
    }
}
