//! The demand series which a portfolio must serve.
use crate::error::{TechmixError, ensure_config};
use crate::units::{Dimensionless, Energy, Hours, Power};

/// An ordered series of power demands, one per time step
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    values: Vec<Power>,
    time_delta: Hours,
}

impl DemandSeries {
    /// Create a new demand series.
    ///
    /// Demands must be finite and non-negative and the series must not be empty.
    pub fn new(values: Vec<Power>, time_delta: Hours) -> Result<Self, TechmixError> {
        ensure_config!(!values.is_empty(), "Demand series cannot be empty");
        ensure_config!(
            values.iter().all(|d| d.is_finite() && *d >= Power(0.0)),
            "Demand values must be finite and non-negative"
        );
        ensure_config!(
            time_delta.is_finite() && time_delta > Hours(0.0),
            "time_delta must be a positive number of hours"
        );

        Ok(Self { values, time_delta })
    }

    /// Create a demand series with hourly steps
    pub fn hourly(values: Vec<Power>) -> Result<Self, TechmixError> {
        Self::new(values, Hours(1.0))
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false, as empty series cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The length of each step
    pub fn time_delta(&self) -> Hours {
        self.time_delta
    }

    /// Demand at step `t`
    pub fn at(&self, t: usize) -> Power {
        self.values[t]
    }

    /// Iterate over the demands
    pub fn iter(&self) -> impl Iterator<Item = Power> + '_ {
        self.values.iter().copied()
    }

    /// The demands as a slice
    pub fn values(&self) -> &[Power] {
        &self.values
    }

    /// Peak demand
    pub fn max(&self) -> Power {
        self.iter().fold(Power(0.0), |acc, d| if d > acc { d } else { acc })
    }

    /// Total energy demanded over the series
    pub fn total_energy(&self) -> Energy {
        self.iter().map(|d| d * self.time_delta).sum()
    }

    /// Peak demand plus a planning reserve margin
    pub fn capacity_requirement(&self, planning_reserve_margin: Dimensionless) -> Power {
        self.max() * (Dimensionless(1.0) + planning_reserve_margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_demand_series_stats() {
        let demand = DemandSeries::new(vec![Power(10.0), Power(30.0), Power(20.0)], Hours(0.5))
            .unwrap();
        assert_eq!(demand.len(), 3);
        assert_eq!(demand.max(), Power(30.0));
        assert_approx_eq!(Energy, demand.total_energy(), Energy(30.0));
        assert_approx_eq!(
            Power,
            demand.capacity_requirement(Dimensionless(0.1)),
            Power(33.0)
        );
    }

    #[rstest]
    #[case(vec![], 1.0)]
    #[case(vec![Power(-1.0)], 1.0)]
    #[case(vec![Power(f64::NAN)], 1.0)]
    #[case(vec![Power(1.0)], 0.0)]
    fn test_demand_series_invalid(#[case] values: Vec<Power>, #[case] time_delta: f64) {
        assert!(DemandSeries::new(values, Hours(time_delta)).is_err());
    }
}
