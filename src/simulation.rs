//! Functionality for running a techmix model: capacity expansion followed by MGA.
use crate::dispatch::{self, DispatchSchedule};
use crate::error::TechmixError;
use crate::expansion::{CapacityExpansion, ExpansionResult};
use crate::mga::{AlternativeSet, MgaExplorer};
use crate::model::Model;
use crate::objective;
use crate::output::{DataWriter, write_dispatch};
use crate::pareto::Evaluation;
use crate::portfolio::Portfolio;
use crate::units::Power;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{debug, info, warn};
use std::path::Path;

/// Run the capacity expansion search and MGA exploration for a model.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write every evaluated portfolio to file
pub fn run(model: &Model, output_path: &Path, debug_model: bool) -> Result<()> {
    let evaluator = model.evaluator()?;
    let technology_ids = model.technologies.iter().map(|tech| tech.id.clone()).collect();
    let objective_names = evaluator
        .objectives()
        .iter()
        .map(|objective| objective.name().to_string())
        .collect();
    let mut writer =
        DataWriter::create(output_path, technology_ids, objective_names, debug_model)?;

    // Capacity expansion
    info!(
        "Searching {} technologies with {} dispatch",
        model.technologies.len(),
        model.parameters.dispatch_strategy
    );
    let mut expansion = CapacityExpansion::new(
        evaluator.clone(),
        model.bounds()?,
        model.expansion_settings(),
    )?;
    let result = expansion.run().context("Capacity expansion failed")?;
    log_front(&result);
    writer.write_pareto_front(&result.front)?;
    writer.write_generations(&result.generations)?;
    writer.write_history(&result.history)?;

    // Modelling to generate alternatives
    if model.parameters.n_alternatives == 0 {
        info!("Skipping MGA as n_alternatives is zero");
        writer.write_alternatives(&[])?;
    } else if !result.front.iter().any(Evaluation::is_feasible) {
        warn!("Skipping MGA as there is no feasible reference portfolio");
        writer.write_alternatives(&[])?;
    } else {
        let explorer = MgaExplorer::new(evaluator, model.bounds()?, model.mga_settings())?;
        match explorer.explore_front(&result.front, &result.history) {
            Ok(alternatives) => {
                log_alternatives(&alternatives);
                writer.write_alternatives(alternatives.alternatives())?;
            }
            Err(err @ TechmixError::EmptyRegion { .. }) => {
                warn!("{err}. Try increasing mga_slack or n_samples.");
                writer.write_alternatives(&[])?;
            }
            Err(err) => return Err(err).context("MGA exploration failed"),
        }
    }

    writer.flush()?;

    Ok(())
}

/// Dispatch a single portfolio of a model and write the schedule to file.
///
/// # Arguments:
///
/// * `model` - The model whose technologies and demand are used
/// * `capacities` - The capacity of each technology, or `None` for their nominal capacities
/// * `output_path` - The folder to which output files will be written
pub fn run_dispatch(
    model: &Model,
    capacities: Option<&[f64]>,
    output_path: &Path,
) -> Result<DispatchSchedule> {
    let portfolio = match capacities {
        Some(capacities) => {
            ensure!(
                capacities.len() == model.technologies.len(),
                "{} capacities were given but the model has {} technologies",
                capacities.len(),
                model.technologies.len()
            );
            Portfolio::new(
                model.technologies.clone(),
                capacities.iter().copied().map(Power).collect(),
            )?
        }
        None => Portfolio::from_technologies(model.technologies.clone())?,
    };

    let schedule = dispatch::solve(
        &portfolio,
        &model.demand,
        model.parameters.dispatch_strategy,
        &model.parameters.dispatch,
    )
    .context("Failed to dispatch portfolio")?;
    info!(
        "Dispatched portfolio {:?}: operating cost {}, generation {}, unmet energy {}, \
        curtailed energy {}",
        portfolio.decision_vector(),
        schedule.total_cost().0,
        schedule.total_generation().0,
        schedule.total_unmet_energy().0,
        schedule.total_curtailment().0
    );
    for ((tech, _), share) in portfolio.iter().zip(portfolio.capacity_shares()) {
        debug!("{}: {:.1}% of installed capacity", tech.id, share.0 * 100.0);
    }

    let objectives = model.objectives()?;
    let values = objective::evaluate(&objectives, &portfolio, Some(&schedule))?;
    for (objective, value) in objectives.iter().zip(values.values()) {
        info!("{}: {value}", objective.name());
    }

    write_dispatch(output_path, &schedule, &model.demand)?;

    Ok(schedule)
}

fn log_front(result: &ExpansionResult) {
    let feasible = result.front.iter().filter(|eval| eval.is_feasible()).count();
    info!(
        "Capacity expansion finished after {} generations and {} evaluations. Pareto front has \
        {} members ({feasible} feasible)",
        result.generations.len().saturating_sub(1),
        result.history.len(),
        result.front.len()
    );
    if feasible == 0 {
        warn!(
            "No portfolio satisfied every constraint. Try increasing the population size or \
            number of generations."
        );
    }
}

fn log_alternatives(alternatives: &AlternativeSet) {
    info!(
        "Selected {} alternatives from {} near-optimal portfolios (slack [{}])",
        alternatives.len(),
        alternatives.region_size(),
        alternatives.slack().iter().join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::DemandSeries;
    use crate::fixture::{demand, technologies};
    use crate::portfolio::TechnologyList;
    use crate::technology::AvailabilityProfile;
    use crate::units::Dimensionless;
    use rstest::{fixture, rstest};
    use std::fs::read_to_string;
    use tempfile::tempdir;

    #[fixture]
    fn model(technologies: TechnologyList, demand: DemandSeries) -> Model {
        let parameters = toml::from_str(
            r#"
dispatch_strategy = "hierarchical"
population_size = 8
generations = 3
n_alternatives = 3
n_samples = 20
mga_slack = 0.5
"#,
        )
        .unwrap();
        Model::new(parameters, technologies, demand).unwrap()
    }

    #[rstest]
    fn test_run(model: Model) {
        let dir = tempdir().unwrap();
        run(&model, dir.path(), true).unwrap();
        for file_name in [
            "pareto_front.csv",
            "alternatives.csv",
            "generations.csv",
            "debug_history.csv",
        ] {
            assert!(dir.path().join(file_name).is_file(), "{file_name} missing");
        }
    }

    #[rstest]
    fn test_run_without_feasible_portfolio(model: Model) {
        // No technology can produce anything, so every portfolio is penalised
        let mut technologies = model.technologies.to_vec();
        for tech in &mut technologies {
            if !tech.is_storage() {
                tech.availability = Some(AvailabilityProfile(vec![Dimensionless(0.0); 3]));
            }
        }
        let model = Model::new(model.parameters, technologies.into(), model.demand).unwrap();

        let dir = tempdir().unwrap();
        run(&model, dir.path(), false).unwrap();
        let alternatives = read_to_string(dir.path().join("alternatives.csv")).unwrap();
        assert_eq!(alternatives.lines().count(), 1);
    }

    #[rstest]
    fn test_run_dispatch(model: Model) {
        let dir = tempdir().unwrap();
        let schedule = run_dispatch(&model, Some(&[100.0, 0.0, 0.0]), dir.path()).unwrap();
        assert_eq!(schedule.len(), 3);
        assert!(dir.path().join("dispatch.csv").is_file());
        assert!(dir.path().join("dispatch_balance.csv").is_file());
    }

    #[rstest]
    fn test_run_dispatch_wrong_length(model: Model) {
        let dir = tempdir().unwrap();
        assert!(run_dispatch(&model, Some(&[100.0]), dir.path()).is_err());
    }
}
