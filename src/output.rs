//! The module responsible for writing output data to disk.
use crate::demand::DemandSeries;
use crate::dispatch::DispatchSchedule;
use crate::expansion::GenerationStats;
use crate::mga::Alternative;
use crate::pareto::{Evaluation, ParetoFront};
use crate::technology::TechnologyID;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "techmix_results";

/// The output file name for the Pareto front
const PARETO_FRONT_FILE_NAME: &str = "pareto_front.csv";

/// The output file name for MGA alternatives
const ALTERNATIVES_FILE_NAME: &str = "alternatives.csv";

/// The output file name for per-generation statistics
const GENERATIONS_FILE_NAME: &str = "generations.csv";

/// The output file name for every portfolio evaluated during the search
const HISTORY_FILE_NAME: &str = "debug_history.csv";

/// The output file name for per-technology dispatch
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for the supply/demand balance of a dispatch
const DISPATCH_BALANCE_FILE_NAME: &str = "dispatch_balance.csv";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory.
///
/// If the directory already exists and contains files, it is only reused if `overwrite` is true.
///
/// # Returns
///
/// Whether existing output will be overwritten
pub fn create_output_directory(output_dir: &Path, overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = fs::read_dir(output_dir)?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace its \
            contents."
        );
        return Ok(true);
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// Open a CSV writer for a file in the output folder
fn new_writer(output_path: &Path, file_name: &str) -> Result<csv::Writer<File>> {
    let file_path = output_path.join(file_name);
    csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))
}

/// Writes the results of a capacity expansion and MGA run to CSV files.
///
/// Portfolios are written one per row, with a column for the capacity of each technology followed
/// by a column for each objective value.
pub struct DataWriter {
    technology_ids: Vec<TechnologyID>,
    objective_names: Vec<String>,
    pareto_front_writer: csv::Writer<File>,
    alternatives_writer: csv::Writer<File>,
    generations_writer: csv::Writer<File>,
    history_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `technology_ids` - IDs of the technologies, in decision vector order
    /// * `objective_names` - Names of the objectives, in order
    /// * `debug_model` - Whether to write every evaluated portfolio to an extra file
    pub fn create(
        output_path: &Path,
        technology_ids: Vec<TechnologyID>,
        objective_names: Vec<String>,
        debug_model: bool,
    ) -> Result<Self> {
        let history_writer = if debug_model {
            Some(new_writer(output_path, HISTORY_FILE_NAME)?)
        } else {
            None
        };

        Ok(Self {
            technology_ids,
            objective_names,
            pareto_front_writer: new_writer(output_path, PARETO_FRONT_FILE_NAME)?,
            alternatives_writer: new_writer(output_path, ALTERNATIVES_FILE_NAME)?,
            generations_writer: new_writer(output_path, GENERATIONS_FILE_NAME)?,
            history_writer,
        })
    }

    /// Column headers for the capacity and objective columns of a portfolio row
    fn portfolio_headers(&self) -> impl Iterator<Item = String> + '_ {
        self.technology_ids
            .iter()
            .map(|id| format!("capacity_{id}"))
            .chain(self.objective_names.iter().cloned())
    }

    /// Capacity and objective values of a portfolio row
    fn portfolio_fields(evaluation: &Evaluation) -> impl Iterator<Item = String> + '_ {
        evaluation
            .portfolio
            .capacities()
            .iter()
            .map(|capacity| capacity.0.to_string())
            .chain(evaluation.objectives.values().iter().map(f64::to_string))
    }

    /// Write the Pareto front
    pub fn write_pareto_front(&mut self, front: &ParetoFront) -> Result<()> {
        let headers = ["portfolio", "feasible", "violation"]
            .into_iter()
            .map(String::from)
            .chain(self.portfolio_headers())
            .collect::<Vec<_>>();
        self.pareto_front_writer.write_record(&headers)?;

        for (index, evaluation) in front.iter().enumerate() {
            let record = [
                index.to_string(),
                evaluation.is_feasible().to_string(),
                evaluation.violation.to_string(),
            ]
            .into_iter()
            .chain(Self::portfolio_fields(evaluation))
            .collect::<Vec<_>>();
            self.pareto_front_writer.write_record(&record)?;
        }

        Ok(())
    }

    /// Write the alternatives selected by MGA, in selection order
    pub fn write_alternatives(&mut self, alternatives: &[Alternative]) -> Result<()> {
        let headers = ["alternative", "min_distance"]
            .into_iter()
            .map(String::from)
            .chain(self.portfolio_headers())
            .collect::<Vec<_>>();
        self.alternatives_writer.write_record(&headers)?;

        for (index, alternative) in alternatives.iter().enumerate() {
            let record = [index.to_string(), alternative.min_distance.to_string()]
                .into_iter()
                .chain(Self::portfolio_fields(&alternative.evaluation))
                .collect::<Vec<_>>();
            self.alternatives_writer.write_record(&record)?;
        }

        Ok(())
    }

    /// Write summary statistics for each generation of the search
    pub fn write_generations(&mut self, generations: &[GenerationStats]) -> Result<()> {
        let mut headers = vec![
            "generation".to_string(),
            "evaluations".to_string(),
            "feasible".to_string(),
        ];
        for stat in ["min", "avg", "max"] {
            headers.extend(
                self.objective_names
                    .iter()
                    .map(|name| format!("{stat}_{name}")),
            );
        }
        self.generations_writer.write_record(&headers)?;

        for stats in generations {
            let mut record = vec![
                stats.generation.to_string(),
                stats.evaluations.to_string(),
                stats.feasible.to_string(),
            ];
            for values in [&stats.min, &stats.avg, &stats.max] {
                record.extend(values.iter().map(f64::to_string));
            }
            self.generations_writer.write_record(&record)?;
        }

        Ok(())
    }

    /// Write every portfolio evaluated during the search, if debug output is enabled
    pub fn write_history(&mut self, history: &[Evaluation]) -> Result<()> {
        let headers = ["evaluation", "dispatch_feasible", "violation"]
            .into_iter()
            .map(String::from)
            .chain(self.portfolio_headers())
            .collect::<Vec<_>>();
        let Some(writer) = self.history_writer.as_mut() else {
            return Ok(());
        };

        writer.write_record(&headers)?;
        for (index, evaluation) in history.iter().enumerate() {
            let record = [
                index.to_string(),
                evaluation.dispatch_feasible.to_string(),
                evaluation.violation.to_string(),
            ]
            .into_iter()
            .chain(Self::portfolio_fields(evaluation))
            .collect::<Vec<_>>();
            writer.write_record(&record)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.pareto_front_writer.flush()?;
        self.alternatives_writer.flush()?;
        self.generations_writer.flush()?;
        if let Some(writer) = self.history_writer.as_mut() {
            writer.flush()?;
        }

        Ok(())
    }
}

/// Represents a row in the dispatch CSV file
#[derive(Serialize, Debug, PartialEq)]
struct DispatchRow<'a> {
    step: usize,
    technology_id: &'a TechnologyID,
    output: f64,
    charge: Option<f64>,
    soc: Option<f64>,
}

/// Represents a row in the dispatch balance CSV file
#[derive(Serialize, Debug, PartialEq)]
struct DispatchBalanceRow {
    step: usize,
    demand: f64,
    supply: f64,
    unmet_demand: f64,
    curtailment: f64,
    cost: f64,
}

/// Write a dispatch schedule to the dispatch CSV files
pub fn write_dispatch(
    output_path: &Path,
    schedule: &DispatchSchedule,
    demand: &DemandSeries,
) -> Result<()> {
    let mut writer = new_writer(output_path, DISPATCH_FILE_NAME)?;
    for step in 0..schedule.len() {
        for ((technology_id, outputs), storage) in schedule
            .technology_ids
            .iter()
            .zip(&schedule.outputs)
            .zip(&schedule.storage)
        {
            writer.serialize(DispatchRow {
                step,
                technology_id,
                output: outputs[step].0,
                charge: storage.as_ref().map(|series| series.charge[step].0),
                soc: storage.as_ref().map(|series| series.soc[step].0),
            })?;
        }
    }
    writer.flush()?;

    let mut writer = new_writer(output_path, DISPATCH_BALANCE_FILE_NAME)?;
    for (step, demand) in demand.iter().enumerate() {
        writer.serialize(DispatchBalanceRow {
            step,
            demand: demand.0,
            supply: schedule.supply_at(step).0,
            unmet_demand: schedule.unmet_demand[step].0,
            curtailment: schedule.curtailment[step].0,
            cost: schedule.step_costs[step].0,
        })?;
    }
    writer.flush()?;

    Ok(())
}
