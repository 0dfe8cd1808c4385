//! The model represents the static input data provided by the user.
use crate::demand::DemandSeries;
use crate::expansion::{CapacityCreditRequirement, Evaluator, ExpansionSettings};
use crate::mga::MgaSettings;
use crate::objective::ObjectiveList;
use crate::objective::config::build_objectives;
use crate::portfolio::{DecisionBounds, TechnologyList};
use crate::units::Power;
use anyhow::{Context, Result, ensure};
use std::sync::Arc;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Debug, Clone)]
pub struct Model {
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Technologies from which portfolios are built
    pub technologies: TechnologyList,
    /// The demand series portfolios must serve
    pub demand: DemandSeries,
}

impl Model {
    /// Create a new model, checking that its parts are consistent with one another
    pub fn new(
        parameters: ModelParameters,
        technologies: TechnologyList,
        demand: DemandSeries,
    ) -> Result<Self> {
        for tech in technologies.iter() {
            if let Some(profile) = &tech.availability {
                ensure!(
                    profile.len() == demand.len(),
                    "Availability profile for technology {} has {} steps but the demand series \
                    has {}",
                    tech.id,
                    profile.len(),
                    demand.len()
                );
            }
        }

        let model = Self {
            parameters,
            technologies,
            demand,
        };

        // Building the evaluator checks objectives against technology attributes
        model.evaluator()?;
        model.bounds()?;

        Ok(model)
    }

    /// Build the objectives listed in the model file
    pub fn objectives(&self) -> Result<ObjectiveList> {
        build_objectives(&self.parameters.objectives).context("Invalid objectives")
    }

    /// Peak demand plus the planning reserve margin
    pub fn capacity_requirement(&self) -> Power {
        self.demand
            .capacity_requirement(self.parameters.planning_reserve_margin)
    }

    /// The range of capacities searched for each technology
    pub fn bounds(&self) -> Result<DecisionBounds> {
        Ok(DecisionBounds::from_requirement(
            &self.technologies,
            self.capacity_requirement(),
        )?)
    }

    /// Create an evaluator for scoring candidate portfolios of this model
    pub fn evaluator(&self) -> Result<Evaluator> {
        let mut evaluator = Evaluator::new(
            Arc::clone(&self.technologies),
            self.demand.clone(),
            self.objectives()?,
            self.parameters.dispatch_strategy,
            self.parameters.dispatch,
        )?
        .with_penalty(self.parameters.penalty);

        if self.parameters.capacity_credit_constraint {
            evaluator = evaluator.with_constraint(Arc::new(CapacityCreditRequirement::new(
                self.capacity_requirement(),
            )));
        }

        Ok(evaluator)
    }

    /// Settings for the capacity expansion search
    pub fn expansion_settings(&self) -> ExpansionSettings {
        ExpansionSettings {
            population_size: self.parameters.population_size,
            generations: self.parameters.generations,
            seed: self.parameters.seed,
            stagnation_generations: self.parameters.stagnation_generations,
            hypervolume_tolerance: self.parameters.hypervolume_tolerance,
        }
    }

    /// Settings for MGA exploration
    pub fn mga_settings(&self) -> MgaSettings {
        MgaSettings {
            slack: self.parameters.mga_slack.clone(),
            n_alternatives: self.parameters.n_alternatives,
            n_samples: self.parameters.n_samples,
            selection: self.parameters.mga_selection,
            seed: self.parameters.seed,
        }
    }
}
