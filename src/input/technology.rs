//! Code for reading technology-related CSV files.
use super::*;
use crate::id::IDCollection;
use crate::library;
use crate::portfolio::TechnologyList;
use crate::technology::{
    AvailabilityProfile, DEFAULT_LIFETIME, RampingCapability, StorageCapability, Technology,
    TechnologyID,
};
use crate::units::{
    Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, MoneyPerPowerPerYear, Power,
};
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const TECHNOLOGY_ATTRIBUTES_FILE_NAME: &str = "technology_attributes.csv";
const AVAILABILITY_FILE_NAME: &str = "availability.csv";

/// Represents a row of the technologies CSV file.
///
/// Only `id`, `category` and `capacity` are required; the remaining columns can be omitted or
/// left blank to use default values.
#[derive(Debug, PartialEq, Deserialize)]
struct TechnologyRaw {
    id: TechnologyID,
    category: String,
    capacity: Power,
    capital_cost: Option<MoneyPerPower>,
    om_cost_fixed: Option<MoneyPerPowerPerYear>,
    om_cost_variable: Option<MoneyPerEnergy>,
    fuel_cost: Option<MoneyPerEnergy>,
    efficiency: Option<Dimensionless>,
    lifetime: Option<u32>,
    discount_rate: Option<Dimensionless>,
    capacity_credit: Option<Dimensionless>,
    ramp_up: Option<Dimensionless>,
    ramp_down: Option<Dimensionless>,
    storage_capacity: Option<Energy>,
    initial_storage: Option<Energy>,
}

impl TechnologyRaw {
    fn into_technology(self) -> Result<Technology> {
        let ramping = match (self.ramp_up, self.ramp_down) {
            (None, None) => None,
            (Some(ramp_up), Some(ramp_down)) => Some(RampingCapability { ramp_up, ramp_down }),
            _ => bail!(
                "Technology {}: ramp_up and ramp_down must be given together",
                self.id
            ),
        };

        let storage = match (self.storage_capacity, self.initial_storage) {
            (None, None) => None,
            (Some(storage_capacity), initial_storage) => Some(StorageCapability {
                storage_capacity,
                initial_storage: initial_storage.unwrap_or(Energy(0.0)),
            }),
            (None, Some(_)) => bail!(
                "Technology {}: initial_storage given without storage_capacity",
                self.id
            ),
        };

        let template = Technology::new(self.id.as_str(), &self.category, self.capacity);
        let tech = Technology {
            capital_cost: self.capital_cost.unwrap_or(template.capital_cost),
            om_cost_fixed: self.om_cost_fixed.unwrap_or(template.om_cost_fixed),
            om_cost_variable: self.om_cost_variable.unwrap_or(template.om_cost_variable),
            fuel_cost: self.fuel_cost.unwrap_or(template.fuel_cost),
            efficiency: self.efficiency.unwrap_or(template.efficiency),
            lifetime: self.lifetime.unwrap_or(DEFAULT_LIFETIME),
            discount_rate: self.discount_rate.unwrap_or(template.discount_rate),
            capacity_credit: self.capacity_credit.unwrap_or(template.capacity_credit),
            ramping,
            storage,
            ..template
        };
        tech.validate()?;

        Ok(tech)
    }
}

/// Represents a row of the technology attributes CSV file
#[derive(Debug, PartialEq, Deserialize)]
struct TechnologyAttributeRaw {
    technology_id: String,
    attribute: String,
    value: f64,
}

/// Represents a row of the availability CSV file
#[derive(Debug, PartialEq, Deserialize)]
struct AvailabilityRaw {
    technology_id: String,
    step: usize,
    #[serde(deserialize_with = "deserialise_proportion")]
    value: f64,
}

/// Read the technologies for a scenario.
///
/// Technologies come from `technologies.csv` and from the technology library (named in
/// `model.toml`). Either source may be empty, but not both. Open attributes and availability
/// profiles are then attached from the optional `technology_attributes.csv` and
/// `availability.csv` files.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `library_technologies` - Names of technologies to take from the library
/// * `n_steps` - The number of time steps in the demand series
pub fn read_technologies(
    model_dir: &Path,
    library_technologies: &[String],
    n_steps: usize,
) -> Result<TechnologyList> {
    let mut technologies = library_technologies
        .iter()
        .map(|name| library::require_technology(name))
        .collect::<Result<Vec<_>>>()?;

    let file_path = model_dir.join(TECHNOLOGIES_FILE_NAME);
    let technologies_csv = read_csv_optional(&file_path)?;
    let from_file =
        read_technologies_from_iter(technologies_csv).with_context(|| input_err_msg(&file_path))?;
    technologies.extend(from_file);

    ensure!(
        !technologies.is_empty(),
        "No technologies defined. Add some to {TECHNOLOGIES_FILE_NAME} or list library \
        technologies in model.toml"
    );

    let mut ids = IndexSet::new();
    for tech in &technologies {
        ensure!(
            ids.insert(tech.id.clone()),
            "Duplicate technology ID: {}",
            tech.id
        );
    }

    let file_path = model_dir.join(TECHNOLOGY_ATTRIBUTES_FILE_NAME);
    let attributes_csv = read_csv_optional(&file_path)?;
    read_attributes_from_iter(attributes_csv, &ids, &mut technologies)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(AVAILABILITY_FILE_NAME);
    let availability_csv = read_csv_optional(&file_path)?;
    read_availability_from_iter(availability_csv, &ids, n_steps, &mut technologies)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(technologies.into())
}

fn read_technologies_from_iter<I>(iter: I) -> Result<Vec<Technology>>
where
    I: Iterator<Item = TechnologyRaw>,
{
    iter.map(TechnologyRaw::into_technology).collect()
}

/// Add open attributes to technologies
fn read_attributes_from_iter<I>(
    iter: I,
    ids: &IndexSet<TechnologyID>,
    technologies: &mut [Technology],
) -> Result<()>
where
    I: Iterator<Item = TechnologyAttributeRaw>,
{
    for record in iter {
        let (index, id) = ids.find_id(&record.technology_id)?;
        let tech = &mut technologies[index];

        ensure!(
            record.value.is_finite(),
            "Attribute {} for technology {id} must be finite",
            record.attribute
        );

        // Core fields can be looked up as attributes, so they cannot also be given here
        ensure!(
            tech.attribute(&record.attribute).is_none()
                || tech.attributes.contains_key(&record.attribute),
            "Attribute {} for technology {id} is a core technology field",
            record.attribute
        );

        tech.attributes.insert(record.attribute, record.value);
    }

    Ok(())
}

/// Attach availability profiles to technologies.
///
/// Every technology listed must have a value for every time step.
fn read_availability_from_iter<I>(
    iter: I,
    ids: &IndexSet<TechnologyID>,
    n_steps: usize,
    technologies: &mut [Technology],
) -> Result<()>
where
    I: Iterator<Item = AvailabilityRaw>,
{
    let mut profiles: IndexMap<usize, Vec<Option<Dimensionless>>> = IndexMap::new();
    for record in iter {
        let (index, id) = ids.find_id(&record.technology_id)?;
        ensure!(
            record.step < n_steps,
            "Availability step {} for technology {id} is beyond the end of the demand series \
            ({n_steps} steps)",
            record.step
        );

        let profile = profiles.entry(index).or_insert_with(|| vec![None; n_steps]);
        ensure!(
            profile[record.step].is_none(),
            "Duplicate availability for technology {id} at step {}",
            record.step
        );
        profile[record.step] = Some(Dimensionless(record.value));
    }

    for (index, profile) in profiles {
        let tech = &mut technologies[index];
        let values = profile
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .with_context(|| {
                format!("Availability for technology {} missing time steps", tech.id)
            })?;
        tech.availability = Some(AvailabilityProfile(values));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, battery, thermal};
    use map_macro::hash_map;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn raw(id: &str) -> TechnologyRaw {
        TechnologyRaw {
            id: id.into(),
            category: "thermal".into(),
            capacity: Power(100.0),
            capital_cost: Some(MoneyPerPower(1000.0)),
            om_cost_fixed: None,
            om_cost_variable: None,
            fuel_cost: Some(MoneyPerEnergy(20.0)),
            efficiency: None,
            lifetime: Some(20),
            discount_rate: None,
            capacity_credit: None,
            ramp_up: None,
            ramp_down: None,
            storage_capacity: None,
            initial_storage: None,
        }
    }

    fn ids(technologies: &[Technology]) -> IndexSet<TechnologyID> {
        technologies.iter().map(|tech| tech.id.clone()).collect()
    }

    #[test]
    fn test_into_technology_defaults() {
        let tech = raw("gas").into_technology().unwrap();
        assert_eq!(tech.capital_cost, MoneyPerPower(1000.0));
        assert_eq!(tech.efficiency, Dimensionless(1.0));
        assert_eq!(tech.lifetime, 20);
        assert!(tech.ramping.is_none());
        assert!(tech.storage.is_none());
    }

    #[test]
    fn test_into_technology_capabilities() {
        let tech = TechnologyRaw {
            ramp_up: Some(Dimensionless(0.5)),
            ramp_down: Some(Dimensionless(0.25)),
            ..raw("gas")
        }
        .into_technology()
        .unwrap();
        assert_eq!(
            tech.ramping,
            Some(RampingCapability {
                ramp_up: Dimensionless(0.5),
                ramp_down: Dimensionless(0.25)
            })
        );

        let tech = TechnologyRaw {
            storage_capacity: Some(Energy(400.0)),
            ..raw("battery")
        }
        .into_technology()
        .unwrap();
        assert_eq!(tech.storage.unwrap().initial_storage, Energy(0.0));
    }

    #[rstest]
    #[case(TechnologyRaw {ramp_up: Some(Dimensionless(0.5)), ..raw("gas")})]
    #[case(TechnologyRaw {initial_storage: Some(Energy(1.0)), ..raw("gas")})]
    #[case(TechnologyRaw {efficiency: Some(Dimensionless(1.5)), ..raw("gas")})]
    #[case(TechnologyRaw {lifetime: Some(0), ..raw("gas")})]
    fn test_into_technology_invalid(#[case] raw: TechnologyRaw) {
        assert!(raw.into_technology().is_err());
    }

    #[rstest]
    fn test_read_attributes_from_iter(thermal: Technology, battery: Technology) {
        let mut technologies = vec![thermal, battery];
        let ids = ids(&technologies);
        let iter = [TechnologyAttributeRaw {
            technology_id: "battery".into(),
            attribute: "land_intensity".into(),
            value: 2.0,
        }]
        .into_iter();
        read_attributes_from_iter(iter, &ids, &mut technologies).unwrap();
        let attributes: HashMap<_, _> = technologies[1]
            .attributes
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .collect();
        assert_eq!(
            attributes,
            hash_map! {"co2_rate" => 0.01, "land_intensity" => 2.0}
        );

        // Unknown technology
        let iter = [TechnologyAttributeRaw {
            technology_id: "wind".into(),
            attribute: "land_intensity".into(),
            value: 2.0,
        }]
        .into_iter();
        assert!(read_attributes_from_iter(iter, &ids, &mut technologies).is_err());

        // Core field
        let iter = [TechnologyAttributeRaw {
            technology_id: "battery".into(),
            attribute: "capital_cost".into(),
            value: 2.0,
        }]
        .into_iter();
        assert_error!(
            read_attributes_from_iter(iter, &ids, &mut technologies),
            "Attribute capital_cost for technology battery is a core technology field"
        );
    }

    fn availability(technology_id: &str, step: usize, value: f64) -> AvailabilityRaw {
        AvailabilityRaw {
            technology_id: technology_id.into(),
            step,
            value,
        }
    }

    #[rstest]
    fn test_read_availability_from_iter(thermal: Technology, battery: Technology) {
        let mut technologies = vec![thermal, battery];
        let ids = ids(&technologies);
        let iter = [
            availability("thermal", 1, 0.5),
            availability("thermal", 0, 1.0),
        ]
        .into_iter();
        read_availability_from_iter(iter, &ids, 2, &mut technologies).unwrap();
        assert_eq!(
            technologies[0].availability,
            Some(AvailabilityProfile(vec![
                Dimensionless(1.0),
                Dimensionless(0.5)
            ]))
        );
        assert!(technologies[1].availability.is_none());
    }

    #[rstest]
    #[case(vec![availability("thermal", 0, 1.0)])]
    #[case(vec![availability("thermal", 0, 1.0), availability("thermal", 0, 1.0)])]
    #[case(vec![availability("thermal", 0, 1.0), availability("thermal", 2, 1.0)])]
    #[case(vec![availability("wind", 0, 1.0), availability("wind", 1, 1.0)])]
    fn test_read_availability_from_iter_invalid(
        thermal: Technology,
        #[case] records: Vec<AvailabilityRaw>,
    ) {
        let mut technologies = vec![thermal];
        let ids = ids(&technologies);
        assert!(
            read_availability_from_iter(records.into_iter(), &ids, 2, &mut technologies).is_err()
        );
    }

    #[test]
    fn test_read_technologies() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(TECHNOLOGIES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,category,capacity,capital_cost,fuel_cost,storage_capacity\n\
                gas,thermal,100,1000,20,\n\
                store,storage,50,500,,200"
            )
            .unwrap();
        }
        {
            let mut file = File::create(dir.path().join(AVAILABILITY_FILE_NAME)).unwrap();
            writeln!(file, "technology_id,step,value\nwind,0,0.3\nwind,1,0.6").unwrap();
        }

        let technologies = read_technologies(dir.path(), &["wind".to_string()], 2).unwrap();
        let ids: Vec<_> = technologies.iter().map(|tech| tech.id.to_string()).collect();
        assert_eq!(ids, ["wind", "gas", "store"]);
        assert!(technologies[2].is_storage());
        assert_eq!(technologies[0].availability_at(1), Dimensionless(0.6));
    }

    #[test]
    fn test_read_technologies_errors() {
        let dir = tempdir().unwrap();

        // No technologies at all
        assert!(read_technologies(dir.path(), &[], 2).is_err());

        // Unknown library technology
        assert!(read_technologies(dir.path(), &["fusion".to_string()], 2).is_err());

        // Duplicate IDs
        assert_error!(
            read_technologies(dir.path(), &["wind".to_string(), "wind".to_string()], 2),
            "Duplicate technology ID: wind"
        );
    }
}
