//! Objectives as they are specified in a model file
use super::builtin::{
    AnnualEmission, AnnualisedCapitalCost, AnnualisedFixedCost, DEFAULT_EMISSION_ATTRIBUTE,
    DEFAULT_VOLATILITY_DELAY, DEFAULT_VOLATILITY_ORDER, OperatingCost, PerUnitCapacity,
    PerUnitEnergy, TotalCost, Volatility,
};
use super::{Objective, Sense};
use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use std::sync::Arc;
use unicase::UniCase;

/// Names of the objectives which can be built from a config entry
pub const OBJECTIVE_NAMES: [&str; 8] = [
    "total_cost",
    "annualised_capital_cost",
    "annualised_fixed_cost",
    "operating_cost",
    "annual_emission",
    "per_unit_capacity",
    "per_unit_energy",
    "volatility",
];

/// A built-in objective with its options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectiveConfig {
    /// Name of the built-in objective (case insensitive)
    pub name: String,
    /// Technology attribute used by the objective, where relevant
    pub attribute: Option<String>,
    /// Override the direction of optimisation for attribute-based objectives
    pub sense: Option<Sense>,
    /// Embedding dimension for volatility
    pub order: Option<usize>,
    /// Embedding delay for volatility
    pub delay: Option<usize>,
}

impl ObjectiveConfig {
    /// A config entry with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute: None,
            sense: None,
            order: None,
            delay: None,
        }
    }

    /// Create the objective described by this entry
    pub fn build(&self) -> Result<Arc<dyn Objective>> {
        let name = UniCase::new(self.name.as_str());
        let Some(canonical) = OBJECTIVE_NAMES
            .iter()
            .find(|known| UniCase::new(**known) == name)
        else {
            bail!(
                "Unknown objective '{}'. Valid objectives are: {}",
                self.name,
                OBJECTIVE_NAMES.join(", ")
            );
        };

        let objective: Arc<dyn Objective> = match *canonical {
            "total_cost" => Arc::new(TotalCost),
            "annualised_capital_cost" => Arc::new(AnnualisedCapitalCost),
            "annualised_fixed_cost" => Arc::new(AnnualisedFixedCost),
            "operating_cost" => Arc::new(OperatingCost),
            "annual_emission" => Arc::new(AnnualEmission::new(
                self.attribute
                    .as_deref()
                    .unwrap_or(DEFAULT_EMISSION_ATTRIBUTE),
            )),
            "per_unit_capacity" => Arc::new(PerUnitCapacity::new(
                self.require_attribute()?,
                self.sense.unwrap_or_default(),
            )),
            "per_unit_energy" => Arc::new(PerUnitEnergy::new(
                self.require_attribute()?,
                self.sense.unwrap_or_default(),
            )),
            "volatility" => {
                let volatility = Volatility {
                    order: self.order.unwrap_or(DEFAULT_VOLATILITY_ORDER),
                    delay: self.delay.unwrap_or(DEFAULT_VOLATILITY_DELAY),
                };
                ensure!(
                    volatility.order >= 2,
                    "Volatility order must be at least 2"
                );
                ensure!(volatility.delay >= 1, "Volatility delay must be at least 1");
                Arc::new(volatility)
            }
            _ => unreachable!(),
        };

        Ok(objective)
    }

    fn require_attribute(&self) -> Result<&str> {
        self.attribute
            .as_deref()
            .with_context(|| format!("Objective '{}' requires an attribute", self.name))
    }
}

/// Build every objective in a list of config entries
pub fn build_objectives(configs: &[ObjectiveConfig]) -> Result<Vec<Arc<dyn Objective>>> {
    configs.iter().map(ObjectiveConfig::build).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("total_cost", "total_cost")]
    #[case("Total_Cost", "total_cost")]
    #[case("OPERATING_COST", "operating_cost")]
    #[case("annual_emission", "annual_emission")]
    #[case("volatility", "volatility")]
    fn test_build_by_name(#[case] name: &str, #[case] expected: &str) {
        let objective = ObjectiveConfig::named(name).build().unwrap();
        assert_eq!(objective.name(), expected);
    }

    #[test]
    fn test_build_unknown() {
        let err = ObjectiveConfig::named("happiness").build().unwrap_err();
        assert!(err.to_string().starts_with("Unknown objective 'happiness'"));
    }

    #[test]
    fn test_build_attribute_objectives() {
        let config = ObjectiveConfig {
            attribute: Some("land_intensity".into()),
            sense: Some(Sense::Maximise),
            ..ObjectiveConfig::named("per_unit_capacity")
        };
        let objective = config.build().unwrap();
        assert_eq!(objective.name(), "per_unit_capacity_land_intensity");
        assert_eq!(objective.sense(), Sense::Maximise);
        assert_eq!(objective.required_attributes(), ["land_intensity"]);

        assert!(ObjectiveConfig::named("per_unit_energy").build().is_err());
    }

    #[test]
    fn test_build_volatility_invalid_order() {
        let config = ObjectiveConfig {
            order: Some(1),
            ..ObjectiveConfig::named("volatility")
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_deserialise() {
        #[derive(Deserialize)]
        struct Wrapper {
            objectives: Vec<ObjectiveConfig>,
        }

        let toml = r#"
            objectives = [
                {name = "total_cost"},
                {name = "annual_emission", attribute = "co2_rate"},
            ]
        "#;
        let wrapper: Wrapper = toml::from_str(toml).unwrap();
        let objectives = build_objectives(&wrapper.objectives).unwrap();
        assert_eq!(objectives.len(), 2);
        assert_eq!(objectives[1].name(), "annual_emission");
    }
}
