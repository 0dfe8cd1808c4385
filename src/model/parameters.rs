//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::dispatch::{DispatchOptions, DispatchStrategy};
use crate::expansion::{
    DEFAULT_GENERATIONS, DEFAULT_HYPERVOLUME_TOLERANCE, DEFAULT_PENALTY, DEFAULT_POPULATION_SIZE,
};
use crate::input::{input_err_msg, read_toml};
use crate::mga::{DEFAULT_N_ALTERNATIVES, DEFAULT_N_SAMPLES, MgaSelection, Slack};
use crate::objective::config::ObjectiveConfig;
use crate::units::{Dimensionless, Hours, UnitType};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_time_delta, Hours, 1.0);
define_param_default!(default_population_size, usize, DEFAULT_POPULATION_SIZE);
define_param_default!(default_generations, usize, DEFAULT_GENERATIONS);
define_param_default!(
    default_hypervolume_tolerance,
    f64,
    DEFAULT_HYPERVOLUME_TOLERANCE
);
define_param_default!(default_penalty, f64, DEFAULT_PENALTY);
define_param_default!(default_n_alternatives, usize, DEFAULT_N_ALTERNATIVES);
define_param_default!(default_n_samples, usize, DEFAULT_N_SAMPLES);
define_param_default!(
    default_objectives,
    Vec<ObjectiveConfig>,
    vec![ObjectiveConfig::named("total_cost")]
);

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// The objectives to optimise, in order
    #[serde(default = "default_objectives")]
    pub objectives: Vec<ObjectiveConfig>,
    /// The algorithm used to dispatch candidate portfolios
    #[serde(default)]
    pub dispatch_strategy: DispatchStrategy,
    /// Options controlling how strictly demand must be met
    #[serde(default)]
    pub dispatch: DispatchOptions,
    /// The length of each step of the demand series
    #[serde(default = "default_time_delta")]
    pub time_delta: Hours,
    /// Extra capacity required on top of peak demand, as a fraction of peak demand
    #[serde(default)]
    pub planning_reserve_margin: Dimensionless,
    /// Names of technologies to take from the built-in library
    #[serde(default)]
    pub library_technologies: Vec<String>,
    /// Whether firm capacity must meet the capacity requirement
    #[serde(default)]
    pub capacity_credit_constraint: bool,
    /// Seed for the random number generator
    #[serde(default)]
    pub seed: u64,
    /// Number of candidates in each generation of the capacity expansion search
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Maximum number of generations of the capacity expansion search
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Stop the search early after this many generations without improvement
    pub stagnation_generations: Option<usize>,
    /// Relative change in hypervolume which counts as an improvement
    #[serde(default = "default_hypervolume_tolerance")]
    pub hypervolume_tolerance: f64,
    /// The objective value given to portfolios which cannot be dispatched.
    ///
    /// Don't change unless you know what you're doing.
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    /// Slack defining the near-optimal region, either one value or one per objective
    #[serde(default)]
    pub mga_slack: Slack,
    /// Maximum number of alternatives to select (zero disables MGA)
    #[serde(default = "default_n_alternatives")]
    pub n_alternatives: usize,
    /// Number of random portfolios added to the MGA candidate pool
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    /// How alternatives are selected from the near-optimal region
    #[serde(default)]
    pub mga_selection: MgaSelection,
}

/// Check that the `objectives` parameter is valid
fn check_objectives(objectives: &[ObjectiveConfig]) -> Result<()> {
    ensure!(!objectives.is_empty(), "At least one objective is required");

    Ok(())
}

/// Check that the `time_delta` parameter is valid
fn check_time_delta(value: Hours) -> Result<()> {
    ensure!(
        value.is_finite() && value > Hours(0.0),
        "time_delta must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `planning_reserve_margin` parameter is valid
fn check_planning_reserve_margin(value: Dimensionless) -> Result<()> {
    ensure!(
        value.is_finite() && value >= Dimensionless(0.0),
        "planning_reserve_margin must be a finite, non-negative number"
    );

    Ok(())
}

/// Check that the `population_size` parameter is valid
fn check_population_size(value: usize) -> Result<()> {
    ensure!(value >= 2, "population_size must be at least 2");

    Ok(())
}

/// Check that the `stagnation_generations` parameter is valid
fn check_stagnation_generations(value: Option<usize>) -> Result<()> {
    ensure!(
        value != Some(0),
        "stagnation_generations must be greater than zero"
    );

    Ok(())
}

/// Check that the `hypervolume_tolerance` parameter is valid
fn check_hypervolume_tolerance(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "hypervolume_tolerance must be a finite, non-negative number"
    );

    Ok(())
}

/// Check that the `penalty` parameter is valid
fn check_penalty(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "penalty must be a finite number greater than zero"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_objectives(&self.objectives)?;
        check_time_delta(self.time_delta)?;
        check_planning_reserve_margin(self.planning_reserve_margin)?;
        check_population_size(self.population_size)?;
        check_stagnation_generations(self.stagnation_generations)?;
        check_hypervolume_tolerance(self.hypervolume_tolerance)?;
        check_penalty(self.penalty)?;

        // dispatch
        self.dispatch.validate()?;

        // mga_slack
        self.mga_slack
            .resolve(self.objectives.len())
            .context("Invalid value for mga_slack")?;

        if self.penalty < DEFAULT_PENALTY {
            warn!(
                "penalty is set to {}. Portfolios which cannot be dispatched may be preferred to \
                ones which can if their objective values are larger than this",
                self.penalty
            );
        }

        Ok(())
    }
}
