//! This module defines the unit types used for technology and portfolio quantities.
//!
//! Power is measured in MW, energy in MWh and time in hours. Costs carry no currency.

/// A quantity which can be created from and converted to a plain `f64`
pub trait UnitType: Copy {
    /// Create a new quantity from a raw value
    fn new(value: f64) -> Self;

    /// The raw value of the quantity
    fn value(&self) -> f64;
}

macro_rules! unit_struct {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Default,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            derive_more::Add,
            derive_more::Sub,
            serde::Deserialize,
            serde::Serialize,
        )]
        pub struct $name(pub f64);

        impl UnitType for $name {
            fn new(value: f64) -> Self {
                Self(value)
            }

            fn value(&self) -> f64 {
                self.0
            }
        }

        impl $name {
            /// Whether the value is neither infinite nor NaN
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl std::ops::Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                Self(-self.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl float_cmp::ApproxEq for $name {
            type Margin = float_cmp::F64Margin;

            fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

macro_rules! scale_by_dimensionless {
    ($name:ident) => {
        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

unit_struct!(Dimensionless, "A dimensionless quantity (fractions, rates, factors)");
unit_struct!(Money, "An amount of money");
unit_struct!(Power, "Power (or power capacity) in MW");
unit_struct!(Energy, "Energy in MWh");
unit_struct!(Hours, "A duration in hours");
unit_struct!(MoneyPerYear, "An annualised amount of money");
unit_struct!(MoneyPerPower, "Cost per unit of power capacity (e.g. overnight capital cost)");
unit_struct!(MoneyPerPowerPerYear, "Annual cost per unit of power capacity");
unit_struct!(MoneyPerEnergy, "Cost per unit of energy produced");

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl Dimensionless {
    /// Raise to an integer power
    pub fn powi(self, rhs: i32) -> Self {
        Dimensionless(self.0.powi(rhs))
    }
}

scale_by_dimensionless!(Money);
scale_by_dimensionless!(Power);
scale_by_dimensionless!(Energy);
scale_by_dimensionless!(MoneyPerYear);
scale_by_dimensionless!(MoneyPerPower);
scale_by_dimensionless!(MoneyPerPowerPerYear);
scale_by_dimensionless!(MoneyPerEnergy);

// Multiplication rules
impl_mul!(Power, Hours, Energy);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(MoneyPerPowerPerYear, Power, MoneyPerYear);

// Division rules
impl_div!(Energy, Hours, Power);
impl_div!(Energy, Power, Hours);
impl_div!(Power, Power, Dimensionless);
impl_div!(Energy, Energy, Dimensionless);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_power_times_hours() {
        assert_eq!(Power(50.0) * Hours(2.0), Energy(100.0));
        assert_eq!(Hours(2.0) * Power(50.0), Energy(100.0));
    }

    #[test]
    fn test_cost_of_energy() {
        let cost = MoneyPerEnergy(10.0) * Energy(24.0);
        assert_approx_eq!(Money, cost, Money(240.0));
    }

    #[test]
    fn test_sum_and_add_assign() {
        let mut total: Energy = [Energy(1.0), Energy(2.5)].into_iter().sum();
        total += Energy(0.5);
        assert_eq!(total, Energy(4.0));
    }
}
