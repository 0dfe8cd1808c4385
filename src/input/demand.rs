//! Code for reading the demand CSV file.
use super::*;
use crate::demand::DemandSeries;
use crate::units::{Hours, Power};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";

/// Represents a row of the demand CSV file
#[derive(Debug, PartialEq, Deserialize)]
struct DemandRaw {
    step: usize,
    demand: Power,
}

/// Read the demand CSV file.
///
/// Each row gives the power demand for one time step. Steps must be listed in order, starting
/// from zero, with no gaps.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `time_delta` - The length of each time step
pub fn read_demand(model_dir: &Path, time_delta: Hours) -> Result<DemandSeries> {
    let file_path = model_dir.join(DEMAND_FILE_NAME);
    let demand_csv = read_csv(&file_path)?;
    read_demand_from_iter(demand_csv, time_delta).with_context(|| input_err_msg(&file_path))
}

fn read_demand_from_iter<I>(iter: I, time_delta: Hours) -> Result<DemandSeries>
where
    I: Iterator<Item = DemandRaw>,
{
    let mut values = Vec::new();
    for (expected, record) in iter.enumerate() {
        ensure!(
            record.step == expected,
            "Demand steps must start at zero and increase by one (expected step {expected}, \
            found {})",
            record.step
        );
        values.push(record.demand);
    }

    Ok(DemandSeries::new(values, time_delta)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn raw(step: usize, demand: f64) -> DemandRaw {
        DemandRaw {
            step,
            demand: Power(demand),
        }
    }

    #[test]
    fn test_read_demand_from_iter() {
        let demand =
            read_demand_from_iter([raw(0, 10.0), raw(1, 20.0)].into_iter(), Hours(1.0)).unwrap();
        assert_eq!(demand.values(), [Power(10.0), Power(20.0)]);

        // Out of order
        let iter = [raw(1, 10.0), raw(0, 20.0)].into_iter();
        assert!(read_demand_from_iter(iter, Hours(1.0)).is_err());

        // Gap
        let iter = [raw(0, 10.0), raw(2, 20.0)].into_iter();
        assert!(read_demand_from_iter(iter, Hours(1.0)).is_err());

        // Negative demand
        assert!(read_demand_from_iter([raw(0, -1.0)].into_iter(), Hours(1.0)).is_err());
    }

    #[test]
    fn test_read_demand() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(DEMAND_FILE_NAME)).unwrap();
            writeln!(file, "step,demand\n0,80\n1,90\n2,85").unwrap();
        }

        let demand = read_demand(dir.path(), Hours(0.5)).unwrap();
        assert_eq!(demand.len(), 3);
        assert_eq!(demand.time_delta(), Hours(0.5));
        assert_eq!(demand.max(), Power(90.0));
    }
}
