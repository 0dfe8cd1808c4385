//! Pareto dominance, non-dominated sorting and the Pareto front.
//!
//! All comparisons here work on objective vectors in minimisation form, so that lower is better
//! for every objective.
use crate::objective::ObjectiveVector;
use crate::portfolio::Portfolio;
use itertools::Itertools;

/// A portfolio together with everything learned by evaluating it
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The evaluated portfolio
    pub portfolio: Portfolio,
    /// Raw objective values, in the order the objectives were registered
    pub objectives: ObjectiveVector,
    /// Objective values converted so that lower is better
    pub fitness: Vec<f64>,
    /// Total violation of user constraints (zero when all are satisfied)
    pub violation: f64,
    /// Whether the portfolio could be dispatched
    pub dispatch_feasible: bool,
}

impl Evaluation {
    /// Whether the portfolio was dispatched and satisfies every constraint
    pub fn is_feasible(&self) -> bool {
        self.dispatch_feasible && self.violation <= 0.0
    }

    /// The decision vector of the evaluated portfolio
    pub fn decision_vector(&self) -> Vec<f64> {
        self.portfolio.decision_vector()
    }
}

/// Whether `a` Pareto-dominates `b`.
///
/// `a` dominates `b` if it is no worse in every objective and strictly better in at least one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }

    strictly_better
}

/// Dominance with constraint handling: the evaluation with less constraint violation always
/// wins, and otherwise plain Pareto dominance applies
pub fn constrained_dominates(a: &Evaluation, b: &Evaluation) -> bool {
    if a.violation < b.violation {
        return true;
    }
    if a.violation > b.violation {
        return false;
    }

    dominates(&a.fitness, &b.fitness)
}

/// Sort evaluations into successive non-dominated fronts.
///
/// Returns the indices of the evaluations in each front, best front first. Indices within a front
/// are in ascending order.
pub fn non_dominated_sort(evaluations: &[Evaluation]) -> Vec<Vec<usize>> {
    let n = evaluations.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, a) in evaluations.iter().enumerate() {
        for (j, b) in evaluations.iter().enumerate().skip(i + 1) {
            if constrained_dominates(a, b) {
                dominated[i].push(j);
                domination_count[j] += 1;
            } else if constrained_dominates(b, a) {
                dominated[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|i| domination_count[*i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for i in &current {
            for j in &dominated[*i] {
                domination_count[*j] -= 1;
                if domination_count[*j] == 0 {
                    next.push(*j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    fronts
}

/// Crowding distance of each point in a single front.
///
/// Boundary points in each objective get an infinite distance. Objectives with no spread in the
/// front contribute nothing.
pub fn crowding_distance(fitness: &[&[f64]]) -> Vec<f64> {
    let n = fitness.len();
    let mut distance = vec![0.0; n];
    if n <= 2 {
        distance.fill(f64::INFINITY);
        return distance;
    }

    let n_objectives = fitness[0].len();
    for m in 0..n_objectives {
        // Stable sort, so ties keep their order in the front
        let order = (0..n)
            .sorted_by(|a, b| fitness[*a][m].total_cmp(&fitness[*b][m]))
            .collect_vec();
        let first = order[0];
        let last = order[n - 1];
        distance[first] = f64::INFINITY;
        distance[last] = f64::INFINITY;

        let range = fitness[last][m] - fitness[first][m];
        if range <= 0.0 {
            continue;
        }
        for (prev, curr, next) in order.iter().tuple_windows() {
            distance[*curr] += (fitness[*next][m] - fitness[*prev][m]) / range;
        }
    }

    distance
}

/// The hypervolume dominated by a set of points and bounded by a reference point.
///
/// Computed exactly by slicing along the last objective and recursing on the rest, which is
/// fine for the handful of objectives used in practice. Points which do not strictly dominate the
/// reference point contribute nothing.
pub fn hypervolume(points: &[Vec<f64>], reference: &[f64]) -> f64 {
    let points = points
        .iter()
        .filter(|p| p.iter().zip(reference).all(|(x, r)| x < r))
        .map(Vec::as_slice)
        .collect_vec();

    hypervolume_recursive(&points, reference)
}

fn hypervolume_recursive(points: &[&[f64]], reference: &[f64]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let dim = reference.len();
    if dim == 1 {
        let best = points
            .iter()
            .map(|p| p[0])
            .min_by(f64::total_cmp)
            .unwrap_or(reference[0]);
        return reference[0] - best;
    }

    let last = dim - 1;
    let sorted = points
        .iter()
        .copied()
        .sorted_by(|a, b| a[last].total_cmp(&b[last]))
        .collect_vec();

    let mut volume = 0.0;
    for (i, point) in sorted.iter().enumerate() {
        let upper = sorted.get(i + 1).map_or(reference[last], |next| next[last]);
        let height = upper - point[last];
        if height <= 0.0 {
            continue;
        }
        let projected = sorted[..=i].iter().map(|p| &p[..last]).collect_vec();
        volume += height * hypervolume_recursive(&projected, &reference[..last]);
    }

    volume
}

/// A set of mutually non-dominated evaluations, deduplicated by decision vector
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParetoFront {
    members: Vec<Evaluation>,
}

impl ParetoFront {
    /// Extract the Pareto front from a set of evaluations.
    ///
    /// Feasible evaluations are preferred: infeasible ones are only considered if nothing is
    /// feasible. The first evaluation of each decision vector is kept and members stay in input
    /// order.
    pub fn from_evaluations(evaluations: &[Evaluation]) -> Self {
        let any_feasible = evaluations.iter().any(Evaluation::is_feasible);
        let candidates = evaluations
            .iter()
            .filter(|eval| !any_feasible || eval.is_feasible())
            .unique_by(|eval| decision_key(&eval.decision_vector()))
            .collect_vec();

        let members = candidates
            .iter()
            .filter(|eval| {
                !candidates
                    .iter()
                    .any(|other| constrained_dominates(other, eval))
            })
            .map(|eval| (*eval).clone())
            .collect();

        Self { members }
    }

    /// The members of the front
    pub fn members(&self) -> &[Evaluation] {
        &self.members
    }

    /// Iterate over the members of the front
    pub fn iter(&self) -> impl Iterator<Item = &Evaluation> {
        self.members.iter()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the front is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The hypervolume of the front's fitness values with respect to `reference`
    pub fn hypervolume(&self, reference: &[f64]) -> f64 {
        let points = self.members.iter().map(|m| m.fitness.clone()).collect_vec();
        hypervolume(&points, reference)
    }
}

impl IntoIterator for ParetoFront {
    type Item = Evaluation;
    type IntoIter = std::vec::IntoIter<Evaluation>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

/// A hashable key for a decision vector
pub(crate) fn decision_key(decision: &[f64]) -> Vec<u64> {
    decision.iter().map(|x| x.to_bits()).collect()
}
