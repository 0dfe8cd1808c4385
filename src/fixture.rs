//! Fixtures for tests

use crate::demand::DemandSeries;
use crate::objective::{ObjectiveList, builtin::TotalCost};
use crate::portfolio::{DecisionBounds, Portfolio, TechnologyList};
use crate::technology::{StorageCapability, Technology};
use crate::units::{
    Dimensionless, Energy, Hours, MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear, Power,
};
use rstest::fixture;
use std::sync::Arc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn thermal() -> Technology {
    let mut tech = Technology {
        capital_cost: MoneyPerPower(1000.0),
        om_cost_fixed: MoneyPerPowerPerYear(10.0),
        om_cost_variable: MoneyPerEnergy(5.0),
        fuel_cost: MoneyPerEnergy(20.0),
        lifetime: 20,
        ..Technology::new("thermal", "thermal", Power(100.0))
    };
    tech.attributes.insert("co2_rate".into(), 0.5);
    tech
}

#[fixture]
pub fn battery() -> Technology {
    let mut tech = Technology {
        capital_cost: MoneyPerPower(500.0),
        om_cost_fixed: MoneyPerPowerPerYear(5.0),
        efficiency: Dimensionless(0.85),
        lifetime: 10,
        capacity_credit: Dimensionless(0.5),
        storage: Some(StorageCapability {
            storage_capacity: Energy(400.0),
            initial_storage: Energy(0.0),
        }),
        ..Technology::new("battery", "storage", Power(100.0))
    };
    tech.attributes.insert("co2_rate".into(), 0.01);
    tech
}

#[fixture]
pub fn thermal_storage_technologies(thermal: Technology, battery: Technology) -> TechnologyList {
    Arc::from(vec![thermal, battery])
}

#[fixture]
pub fn technologies(thermal: Technology, battery: Technology) -> TechnologyList {
    let peaker = Technology {
        capital_cost: MoneyPerPower(200.0),
        om_cost_fixed: MoneyPerPowerPerYear(2.0),
        fuel_cost: MoneyPerEnergy(80.0),
        lifetime: 25,
        ..Technology::new("peaker", "thermal", Power(50.0))
    };
    Arc::from(vec![thermal, battery, peaker])
}

#[fixture]
pub fn demand() -> DemandSeries {
    DemandSeries::new(vec![Power(80.0); 3], Hours(1.0)).unwrap()
}

#[fixture]
pub fn portfolio(thermal_storage_technologies: TechnologyList) -> Portfolio {
    Portfolio::new(thermal_storage_technologies, vec![Power(100.0), Power(40.0)]).unwrap()
}

#[fixture]
pub fn bounds() -> DecisionBounds {
    DecisionBounds::new(vec![Power(0.0); 2], vec![Power(200.0), Power(100.0)]).unwrap()
}

#[fixture]
pub fn total_cost_objective() -> ObjectiveList {
    vec![Arc::new(TotalCost)]
}
