//! Named meteorological quantities and the availability snapshot used to
//! decide which derivations are possible.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::model::Error;
use crate::units::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QuantityName {
    Tmin,
    Tmax,
    Tdew,
    RhMax,
    RhMin,
    RhMean,
    Sh,
    SwDown,
    LwDown,
    Wind,
    WindU,
    WindV,
    Sp,
    Elev,
    Prec,
    Et0,
}

impl QuantityName {
    pub const ALL: [QuantityName; 16] = [
        QuantityName::Tmin,
        QuantityName::Tmax,
        QuantityName::Tdew,
        QuantityName::RhMax,
        QuantityName::RhMin,
        QuantityName::RhMean,
        QuantityName::Sh,
        QuantityName::SwDown,
        QuantityName::LwDown,
        QuantityName::Wind,
        QuantityName::WindU,
        QuantityName::WindV,
        QuantityName::Sp,
        QuantityName::Elev,
        QuantityName::Prec,
        QuantityName::Et0,
    ];

    /// Configuration section name, e.g. `TMIN`.
    pub fn key(self) -> &'static str {
        match self {
            QuantityName::Tmin => "TMIN",
            QuantityName::Tmax => "TMAX",
            QuantityName::Tdew => "TDEW",
            QuantityName::RhMax => "RHMAX",
            QuantityName::RhMin => "RHMIN",
            QuantityName::RhMean => "RHMEAN",
            QuantityName::Sh => "SH",
            QuantityName::SwDown => "SWDOWN",
            QuantityName::LwDown => "LWDOWN",
            QuantityName::Wind => "WIND",
            QuantityName::WindU => "WIND_U",
            QuantityName::WindV => "WIND_V",
            QuantityName::Sp => "SP",
            QuantityName::Elev => "ELEV",
            QuantityName::Prec => "PREC",
            QuantityName::Et0 => "ET0",
        }
    }

    pub fn canonical_unit(self) -> Unit {
        match self {
            QuantityName::Tmin | QuantityName::Tmax | QuantityName::Tdew => {
                Unit::Celsius
            }
            QuantityName::RhMax | QuantityName::RhMin | QuantityName::RhMean => {
                Unit::Percent
            }
            QuantityName::Sh => Unit::KilogramPerKilogram,
            QuantityName::SwDown | QuantityName::LwDown => {
                Unit::MegajoulePerSquareMetrePerDay
            }
            QuantityName::Wind | QuantityName::WindU | QuantityName::WindV => {
                Unit::MetrePerSecond
            }
            QuantityName::Sp => Unit::Kilopascal,
            QuantityName::Elev => Unit::Metre,
            QuantityName::Prec | QuantityName::Et0 => Unit::MillimetrePerDay,
        }
    }

    /// Static quantities have no time dimension.
    pub fn is_static(self) -> bool {
        matches!(self, QuantityName::Elev)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QuantityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for QuantityName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        QuantityName::ALL
            .into_iter()
            .find(|name| name.key() == upper)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("unknown weather variable '{}'", s))
            })
    }
}

/// A named quantity held in its canonical unit over the model's
/// `[time, space]` grid. Static quantities are broadcast along time.
#[derive(Debug, Clone)]
pub struct PhysicalQuantity {
    name: QuantityName,
    values: Array2<f64>,
}

impl PhysicalQuantity {
    pub fn new(name: QuantityName, values: Array2<f64>) -> Self {
        PhysicalQuantity { name, values }
    }

    pub fn name(&self) -> QuantityName {
        self.name
    }

    pub fn unit(&self) -> Unit {
        self.name.canonical_unit()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Time series of one spatial point.
    pub fn point(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), index)
    }

    pub fn n_timesteps(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_points(&self) -> usize {
        self.values.ncols()
    }
}

/// Which quantities a run can read, fixed once per configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags {
    available: [bool; 16],
}

impl CapabilityFlags {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = QuantityName>,
    {
        let mut available = [false; 16];
        for name in names {
            available[name.index()] = true;
        }
        CapabilityFlags { available }
    }

    pub fn has(&self, name: QuantityName) -> bool {
        self.available[name.index()]
    }

    pub fn has_all(&self, names: &[QuantityName]) -> bool {
        names.iter().all(|&name| self.has(name))
    }

    /// Wind speed is either measured directly or composed from its
    /// two horizontal components.
    pub fn has_wind(&self) -> bool {
        self.has(QuantityName::Wind)
            || self.has_all(&[QuantityName::WindU, QuantityName::WindV])
    }

    /// Surface pressure is either measured or derivable from elevation.
    pub fn has_pressure(&self) -> bool {
        self.has(QuantityName::Sp) || self.has(QuantityName::Elev)
    }

    pub fn iter(&self) -> impl Iterator<Item = QuantityName> + '_ {
        QuantityName::ALL.into_iter().filter(|&name| self.has(name))
    }
}
