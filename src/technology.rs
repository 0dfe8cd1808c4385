//! Technologies are the building blocks of a portfolio: generators, storage and variable
//! renewables.
use crate::error::{TechmixError, ensure_config};
use crate::finance::annual_capital_cost;
use crate::id::define_id_type;
use crate::units::{
    Dimensionless, Energy, Hours, MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear, Power,
};
use indexmap::IndexMap;
use serde::Serialize;

define_id_type! {TechnologyID}

/// A map of open, user-defined numeric attributes (e.g. `co2_rate`, `land_intensity`)
pub type AttributeMap = IndexMap<String, f64>;

/// The default technology lifetime in years
pub const DEFAULT_LIFETIME: u32 = 25;

/// Limits on how quickly a technology can change its output.
///
/// Rates are fractions of capacity per hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RampingCapability {
    /// Maximum increase in output per hour, as a fraction of capacity
    pub ramp_up: Dimensionless,
    /// Maximum decrease in output per hour, as a fraction of capacity
    pub ramp_down: Dimensionless,
}

impl RampingCapability {
    /// The largest permitted increase in output over one step
    pub fn max_increase(&self, capacity: Power, time_delta: Hours) -> Power {
        Power(self.ramp_up.0 * capacity.0 * time_delta.0)
    }

    /// The largest permitted decrease in output over one step
    pub fn max_decrease(&self, capacity: Power, time_delta: Hours) -> Power {
        Power(self.ramp_down.0 * capacity.0 * time_delta.0)
    }
}

/// Energy storage attached to a technology
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageCapability {
    /// The amount of energy which can be stored
    pub storage_capacity: Energy,
    /// The state of charge before the first step
    pub initial_storage: Energy,
}

/// Per-step fraction of capacity which is available (e.g. capacity factors for wind and solar)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityProfile(pub Vec<Dimensionless>);

impl AvailabilityProfile {
    /// Number of steps covered by the profile
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the profile is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Availability for step `t`
    pub fn at(&self, t: usize) -> Dimensionless {
        self.0[t]
    }
}

/// A generation or storage technology.
///
/// A technology is immutable within a run. Its `capacity` is the nominal size of the technology;
/// the capacity actually deployed in a portfolio comes from the portfolio's decision vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier
    pub id: TechnologyID,
    /// Free-form label (e.g. "thermal", "storage", "renewable")
    pub category: String,
    /// Nominal power capacity
    pub capacity: Power,
    /// Overnight capital cost
    pub capital_cost: MoneyPerPower,
    /// Fixed operation and maintenance cost
    pub om_cost_fixed: MoneyPerPowerPerYear,
    /// Variable operation and maintenance cost
    pub om_cost_variable: MoneyPerEnergy,
    /// Fuel cost
    pub fuel_cost: MoneyPerEnergy,
    /// Conversion efficiency (round-trip component for storage)
    pub efficiency: Dimensionless,
    /// Economic lifetime in years
    pub lifetime: u32,
    /// Discount rate used for annualising capital costs
    pub discount_rate: Dimensionless,
    /// Fraction of capacity counted towards firm capacity requirements
    pub capacity_credit: Dimensionless,
    /// Ramp limits, if any
    pub ramping: Option<RampingCapability>,
    /// Storage, if any
    pub storage: Option<StorageCapability>,
    /// Availability profile, if output is weather-dependent
    pub availability: Option<AvailabilityProfile>,
    /// Open attributes
    pub attributes: AttributeMap,
}

impl Technology {
    /// Create a new dispatchable technology with zero costs and default parameters
    pub fn new(id: &str, category: &str, capacity: Power) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            capacity,
            capital_cost: MoneyPerPower(0.0),
            om_cost_fixed: MoneyPerPowerPerYear(0.0),
            om_cost_variable: MoneyPerEnergy(0.0),
            fuel_cost: MoneyPerEnergy(0.0),
            efficiency: Dimensionless(1.0),
            lifetime: DEFAULT_LIFETIME,
            discount_rate: Dimensionless(0.0),
            capacity_credit: Dimensionless(1.0),
            ramping: None,
            storage: None,
            availability: None,
            attributes: AttributeMap::new(),
        }
    }

    /// Whether the technology can store energy
    pub fn is_storage(&self) -> bool {
        self.storage.is_some()
    }

    /// Cost of producing one unit of energy (variable O&M plus fuel)
    pub fn marginal_cost(&self) -> MoneyPerEnergy {
        self.om_cost_variable + self.fuel_cost
    }

    /// Annualised capital cost per unit of capacity
    pub fn annual_capital_cost(&self) -> MoneyPerPowerPerYear {
        annual_capital_cost(self.capital_cost, self.lifetime, self.discount_rate)
    }

    /// The fraction of capacity available at step `t`
    pub fn availability_at(&self, t: usize) -> Dimensionless {
        self.availability
            .as_ref()
            .map_or(Dimensionless(1.0), |profile| profile.at(t))
    }

    /// The storage of this technology when deployed with the given capacity.
    ///
    /// Stored energy scales in proportion to power capacity, keeping the storage duration fixed.
    /// A technology with zero nominal capacity keeps its storage as given.
    pub fn storage_for_capacity(&self, capacity: Power) -> Option<StorageCapability> {
        let storage = self.storage?;
        if self.capacity.0 <= 0.0 {
            return Some(storage);
        }

        let ratio = capacity / self.capacity;
        Some(StorageCapability {
            storage_capacity: storage.storage_capacity * ratio,
            initial_storage: storage.initial_storage * ratio,
        })
    }

    /// Look up an attribute by name.
    ///
    /// Core numeric fields (e.g. `capital_cost`, `lifetime`) can be looked up by name as well as
    /// entries of the open attribute map.
    pub fn attribute(&self, name: &str) -> Option<f64> {
        let value = match name {
            "capacity" => self.capacity.0,
            "capital_cost" => self.capital_cost.0,
            "om_cost_fixed" => self.om_cost_fixed.0,
            "om_cost_variable" => self.om_cost_variable.0,
            "fuel_cost" => self.fuel_cost.0,
            "efficiency" => self.efficiency.0,
            "lifetime" => self.lifetime as f64,
            "discount_rate" => self.discount_rate.0,
            "capacity_credit" => self.capacity_credit.0,
            _ => return self.attributes.get(name).copied(),
        };

        Some(value)
    }

    /// Check that the technology's parameters are physically meaningful
    pub fn validate(&self) -> Result<(), TechmixError> {
        let id = &self.id;
        ensure_config!(
            self.capacity.is_finite() && self.capacity >= Power(0.0),
            "Technology {id}: capacity must be a finite, non-negative number"
        );
        ensure_config!(
            self.efficiency > Dimensionless(0.0) && self.efficiency <= Dimensionless(1.0),
            "Technology {id}: efficiency must be in the range (0, 1]"
        );
        ensure_config!(
            self.capacity_credit > Dimensionless(0.0)
                && self.capacity_credit <= Dimensionless(1.0),
            "Technology {id}: capacity_credit must be in the range (0, 1]"
        );
        ensure_config!(
            self.lifetime > 0,
            "Technology {id}: lifetime must be greater than zero"
        );
        ensure_config!(
            self.discount_rate.is_finite() && self.discount_rate >= Dimensionless(0.0),
            "Technology {id}: discount_rate must be a finite, non-negative number"
        );
        for (name, cost) in [
            ("capital_cost", self.capital_cost.0),
            ("om_cost_fixed", self.om_cost_fixed.0),
            ("om_cost_variable", self.om_cost_variable.0),
            ("fuel_cost", self.fuel_cost.0),
        ] {
            ensure_config!(cost.is_finite(), "Technology {id}: {name} must be finite");
        }

        if let Some(ramping) = &self.ramping {
            ensure_config!(
                self.storage.is_none(),
                "Technology {id}: ramp limits are not supported for storage technologies"
            );
            ensure_config!(
                ramping.ramp_up >= Dimensionless(0.0) && ramping.ramp_down >= Dimensionless(0.0),
                "Technology {id}: ramp rates cannot be negative"
            );
        }

        if let Some(storage) = &self.storage {
            ensure_config!(
                storage.storage_capacity >= Energy(0.0),
                "Technology {id}: storage_capacity cannot be negative"
            );
            ensure_config!(
                storage.initial_storage >= Energy(0.0)
                    && storage.initial_storage <= storage.storage_capacity,
                "Technology {id}: initial_storage must be between zero and storage_capacity"
            );
        }

        if let Some(profile) = &self.availability {
            ensure_config!(
                profile
                    .0
                    .iter()
                    .all(|a| *a >= Dimensionless(0.0) && *a <= Dimensionless(1.0)),
                "Technology {id}: availability values must be between 0 and 1"
            );
        }

        Ok(())
    }
}
