//! A read-only library of reference technologies.
//!
//! Costs are in dollars, capacities in MW and emission rates (`co2_rate`) in tonnes of CO2
//! equivalent per MWh.
use crate::technology::{AttributeMap, RampingCapability, StorageCapability, Technology};
use crate::units::{
    Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear, Power,
};
use anyhow::{Context, Result};

/// The names of the technologies in the library, in catalogue order
pub const LIBRARY_NAMES: [&str; 10] = [
    "nuclear",
    "nuclear_adv",
    "natural_gas",
    "natural_gas_adv",
    "coal",
    "coal_adv",
    "biomass",
    "battery",
    "wind",
    "solar",
];

/// Parameters shared by the thermal technologies in the library
struct ThermalParams {
    id: &'static str,
    capacity: f64,
    capital_cost: f64,
    om_cost_fixed: f64,
    fuel_cost: f64,
    ramp_rate: f64,
    co2_rate: f64,
}

/// Create the attribute map for a library technology
fn attributes(co2_rate: f64) -> AttributeMap {
    [("co2_rate".into(), co2_rate), ("land_intensity".into(), 0.0)]
        .into_iter()
        .collect()
}

fn thermal(params: &ThermalParams) -> Technology {
    Technology {
        capital_cost: MoneyPerPower(params.capital_cost),
        om_cost_fixed: MoneyPerPowerPerYear(params.om_cost_fixed),
        fuel_cost: MoneyPerEnergy(params.fuel_cost),
        ramping: Some(RampingCapability {
            ramp_up: Dimensionless(params.ramp_rate),
            ramp_down: Dimensionless(params.ramp_rate),
        }),
        attributes: attributes(params.co2_rate),
        ..Technology::new(params.id, "thermal", Power(params.capacity))
    }
}

/// Look up a reference technology by name (case-insensitive)
pub fn get_technology(name: &str) -> Option<Technology> {
    let tech = match name.to_lowercase().as_str() {
        "nuclear" => thermal(&ThermalParams {
            id: "nuclear",
            capacity: 18_609.404,
            capital_cost: 50_000.0,
            om_cost_fixed: 177_737.41,
            fuel_cost: 5.811,
            ramp_rate: 0.0,
            co2_rate: 0.0051,
        }),
        "nuclear_adv" => thermal(&ThermalParams {
            id: "nuclear_adv",
            capacity: 0.0,
            capital_cost: 4_916_400.0,
            om_cost_fixed: 118_990.0,
            fuel_cost: 9.158,
            ramp_rate: 0.25,
            co2_rate: 0.0051,
        }),
        "natural_gas" => thermal(&ThermalParams {
            id: "natural_gas",
            capacity: 8_375.1331,
            capital_cost: 959_580.0,
            om_cost_fixed: 11_193.4,
            fuel_cost: 22.387,
            ramp_rate: 1.0,
            co2_rate: 0.49,
        }),
        "natural_gas_adv" => thermal(&ThermalParams {
            id: "natural_gas_adv",
            capacity: 0.0,
            capital_cost: 1_891_000.0,
            om_cost_fixed: 26_990.0,
            fuel_cost: 27.475,
            ramp_rate: 1.0,
            co2_rate: 0.13,
        }),
        "coal" => thermal(&ThermalParams {
            id: "coal",
            capacity: 0.0,
            capital_cost: 1_000_000.0,
            om_cost_fixed: 40_703.3,
            fuel_cost: 21.369,
            ramp_rate: 0.5,
            co2_rate: 1.0,
        }),
        "coal_adv" => thermal(&ThermalParams {
            id: "coal_adv",
            capacity: 0.0,
            capital_cost: 4_924_600.0,
            om_cost_fixed: 58_240.0,
            fuel_cost: 36.6329,
            ramp_rate: 0.5,
            co2_rate: 0.37,
        }),
        "biomass" => thermal(&ThermalParams {
            id: "biomass",
            capacity: 0.0,
            capital_cost: 3_436_000.0,
            om_cost_fixed: 123_000.0,
            fuel_cost: 47.0,
            ramp_rate: 1.0,
            co2_rate: 0.23,
        }),
        "battery" => {
            let capacity = Power(815.341_26);
            Technology {
                capital_cost: MoneyPerPower(613_000.0),
                om_cost_fixed: MoneyPerPowerPerYear(15_320.0),
                efficiency: Dimensionless(0.85),
                capacity_credit: Dimensionless(0.5),
                storage: Some(StorageCapability {
                    // Four hours of storage
                    storage_capacity: Energy(capacity.0 * 4.0),
                    initial_storage: Energy(0.0),
                }),
                attributes: attributes(0.033),
                ..Technology::new("battery", "storage", capacity)
            }
        }
        "wind" => Technology {
            capital_cost: MoneyPerPower(1_180_600.0),
            om_cost_fixed: MoneyPerPowerPerYear(33_110.0),
            capacity_credit: Dimensionless(0.35),
            attributes: attributes(0.012),
            ..Technology::new("wind", "renewable", Power(0.0))
        },
        "solar" => Technology {
            capital_cost: MoneyPerPower(673_200.0),
            om_cost_fixed: MoneyPerPowerPerYear(8_050.0),
            capacity_credit: Dimensionless(0.19),
            attributes: attributes(0.037),
            ..Technology::new("solar", "renewable", Power(2_810.301_5))
        },
        _ => return None,
    };

    Some(tech)
}

/// Look up a reference technology by name, returning an error if it is unknown
pub fn require_technology(name: &str) -> Result<Technology> {
    get_technology(name).with_context(|| {
        format!(
            "Unknown library technology '{name}'. Valid names are: {}",
            LIBRARY_NAMES.join(", ")
        )
    })
}

/// All technologies in the library
pub fn all_technologies() -> Vec<Technology> {
    LIBRARY_NAMES.iter().filter_map(|name| get_technology(name)).collect()
}

/// Only renewable and storage technologies from the library (biomass counts as renewable)
pub fn renewables_plus_storage() -> Vec<Technology> {
    all_technologies()
        .into_iter()
        .filter(|tech| {
            tech.category == "renewable" || tech.is_storage() || tech.id.as_str() == "biomass"
        })
        .collect()
}
