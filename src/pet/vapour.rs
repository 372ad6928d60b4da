use std::fmt;

use super::fao56::{saturation_vapour_pressure, EPSILON};
use super::resolve::Requirement;
use crate::quantity::{CapabilityFlags, QuantityName};

/// Equation used to obtain actual vapour pressure, listed in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VapourPressureMethod {
    FromDewpoint,
    FromMinMaxRelativeHumidity,
    FromMaxRelativeHumidity,
    FromMeanRelativeHumidity,
    FromSpecificHumidity,
}

impl VapourPressureMethod {
    pub const PRIORITY: [VapourPressureMethod; 5] = [
        VapourPressureMethod::FromDewpoint,
        VapourPressureMethod::FromMinMaxRelativeHumidity,
        VapourPressureMethod::FromMaxRelativeHumidity,
        VapourPressureMethod::FromMeanRelativeHumidity,
        VapourPressureMethod::FromSpecificHumidity,
    ];

    pub fn requirements(self) -> Vec<Requirement> {
        use QuantityName::*;
        let quantities: &[QuantityName] = match self {
            VapourPressureMethod::FromDewpoint => &[Tdew],
            VapourPressureMethod::FromMinMaxRelativeHumidity => &[Tmin, Tmax, RhMin, RhMax],
            VapourPressureMethod::FromMaxRelativeHumidity => &[Tmin, RhMax],
            VapourPressureMethod::FromMeanRelativeHumidity => &[Tmax, Tmin, RhMean],
            VapourPressureMethod::FromSpecificHumidity => {
                return vec![Requirement::Quantity(Sh), Requirement::Pressure]
            }
        };
        quantities.iter().map(|&q| Requirement::Quantity(q)).collect()
    }

    pub fn missing(self, flags: &CapabilityFlags) -> Vec<Requirement> {
        self.requirements()
            .into_iter()
            .filter(|r| !r.is_met(flags))
            .collect()
    }

    pub fn is_satisfied(self, flags: &CapabilityFlags) -> bool {
        self.requirements().iter().all(|r| r.is_met(flags))
    }
}

impl fmt::Display for VapourPressureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VapourPressureMethod::FromDewpoint => "FromDewpoint",
            VapourPressureMethod::FromMinMaxRelativeHumidity => "FromMinMaxRelativeHumidity",
            VapourPressureMethod::FromMaxRelativeHumidity => "FromMaxRelativeHumidity",
            VapourPressureMethod::FromMeanRelativeHumidity => "FromMeanRelativeHumidity",
            VapourPressureMethod::FromSpecificHumidity => "FromSpecificHumidity",
        };
        f.write_str(name)
    }
}

pub fn from_dewpoint(tdew: f64) -> f64 {
    saturation_vapour_pressure(tdew)
}

pub fn from_min_max_relative_humidity(tmin: f64, tmax: f64, rhmin: f64, rhmax: f64) -> f64 {
    (saturation_vapour_pressure(tmin) * rhmax / 100.
        + saturation_vapour_pressure(tmax) * rhmin / 100.)
        / 2.
}

pub fn from_max_relative_humidity(tmin: f64, rhmax: f64) -> f64 {
    saturation_vapour_pressure(tmin) * rhmax / 100.
}

pub fn from_mean_relative_humidity(tmin: f64, tmax: f64, rhmean: f64) -> f64 {
    (saturation_vapour_pressure(tmin) + saturation_vapour_pressure(tmax)) / 2. * rhmean / 100.
}

/// `sh` in kg kg-1, `pressure` in kPa.
pub fn from_specific_humidity(sh: f64, pressure: f64) -> f64 {
    sh * pressure / ((1. - EPSILON) * sh + EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn humidity_equations() {
        // FAO-56 example 5: Tmin 18, Tmax 25, RHmax 82, RHmin 54 gives 1.70 kPa
        assert_relative_eq!(
            from_min_max_relative_humidity(18.0, 25.0, 54.0, 82.0),
            1.70,
            epsilon = 0.01
        );
        assert_relative_eq!(from_dewpoint(20.0), 2.338, epsilon = 1e-3);
        assert_relative_eq!(from_max_relative_humidity(20.0, 50.0), 1.169, epsilon = 1e-3);
        assert_relative_eq!(
            from_mean_relative_humidity(20.0, 20.0, 100.0),
            saturation_vapour_pressure(20.0)
        );
    }

    #[test]
    fn specific_humidity_at_sea_level() {
        // 10 g/kg at 101.3 kPa is roughly 1.6 kPa
        assert_relative_eq!(from_specific_humidity(0.01, 101.3), 1.6, epsilon = 0.02);
        assert_eq!(from_specific_humidity(0.0, 101.3), 0.0);
    }

    #[test]
    fn specific_humidity_needs_pressure() {
        let sh_only = CapabilityFlags::new([QuantityName::Sh]);
        assert_eq!(
            VapourPressureMethod::FromSpecificHumidity.missing(&sh_only),
            vec![Requirement::Pressure]
        );
        let with_elevation = CapabilityFlags::new([QuantityName::Sh, QuantityName::Elev]);
        assert!(VapourPressureMethod::FromSpecificHumidity.is_satisfied(&with_elevation));
    }
}
