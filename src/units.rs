//! Physical units of the meteorological inputs.
//!
//! Every unit belongs to a [`Dimension`] and is related to the canonical unit
//! of that dimension by an affine map `canonical = value * scale + offset`.
//! Converting between two units of the same dimension goes through the
//! canonical unit, so conversions are exact inverses of each other up to
//! floating-point rounding.

use std::fmt;
use std::str::FromStr;

use crate::model::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Temperature,
    Pressure,
    RelativeHumidity,
    SpecificHumidity,
    Radiation,
    Speed,
    Length,
    WaterDepthRate,
}

impl Dimension {
    pub fn canonical_unit(self) -> Unit {
        match self {
            Dimension::Temperature => Unit::Celsius,
            Dimension::Pressure => Unit::Kilopascal,
            Dimension::RelativeHumidity => Unit::Percent,
            Dimension::SpecificHumidity => Unit::KilogramPerKilogram,
            Dimension::Radiation => Unit::MegajoulePerSquareMetrePerDay,
            Dimension::Speed => Unit::MetrePerSecond,
            Dimension::Length => Unit::Metre,
            Dimension::WaterDepthRate => Unit::MillimetrePerDay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Celsius,
    Kelvin,
    Fahrenheit,
    Kilopascal,
    Pascal,
    Hectopascal,
    Percent,
    Fraction,
    KilogramPerKilogram,
    GramPerKilogram,
    MegajoulePerSquareMetrePerDay,
    /// Daily mean radiative flux.
    WattPerSquareMetre,
    JoulePerSquareMetrePerDay,
    KilojoulePerSquareMetrePerDay,
    MetrePerSecond,
    KilometrePerHour,
    Metre,
    Kilometre,
    MillimetrePerDay,
    MetrePerDay,
    KilogramPerSquareMetrePerSecond,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Celsius | Unit::Kelvin | Unit::Fahrenheit => {
                Dimension::Temperature
            }
            Unit::Kilopascal | Unit::Pascal | Unit::Hectopascal => {
                Dimension::Pressure
            }
            Unit::Percent | Unit::Fraction => Dimension::RelativeHumidity,
            Unit::KilogramPerKilogram | Unit::GramPerKilogram => {
                Dimension::SpecificHumidity
            }
            Unit::MegajoulePerSquareMetrePerDay
            | Unit::WattPerSquareMetre
            | Unit::JoulePerSquareMetrePerDay
            | Unit::KilojoulePerSquareMetrePerDay => Dimension::Radiation,
            Unit::MetrePerSecond | Unit::KilometrePerHour => Dimension::Speed,
            Unit::Metre | Unit::Kilometre => Dimension::Length,
            Unit::MillimetrePerDay
            | Unit::MetrePerDay
            | Unit::KilogramPerSquareMetrePerSecond => {
                Dimension::WaterDepthRate
            }
        }
    }

    /// `(scale, offset)` such that `canonical = value * scale + offset`.
    fn affine(self) -> (f64, f64) {
        match self {
            Unit::Celsius => (1.0, 0.0),
            Unit::Kelvin => (1.0, -273.15),
            Unit::Fahrenheit => (5.0 / 9.0, -32.0 * 5.0 / 9.0),
            Unit::Kilopascal => (1.0, 0.0),
            Unit::Pascal => (1e-3, 0.0),
            Unit::Hectopascal => (0.1, 0.0),
            Unit::Percent => (1.0, 0.0),
            Unit::Fraction => (100.0, 0.0),
            Unit::KilogramPerKilogram => (1.0, 0.0),
            Unit::GramPerKilogram => (1e-3, 0.0),
            Unit::MegajoulePerSquareMetrePerDay => (1.0, 0.0),
            // 1 W m-2 sustained for 86400 s
            Unit::WattPerSquareMetre => (0.0864, 0.0),
            Unit::JoulePerSquareMetrePerDay => (1e-6, 0.0),
            Unit::KilojoulePerSquareMetrePerDay => (1e-3, 0.0),
            Unit::MetrePerSecond => (1.0, 0.0),
            Unit::KilometrePerHour => (1.0 / 3.6, 0.0),
            Unit::Metre => (1.0, 0.0),
            Unit::Kilometre => (1000.0, 0.0),
            Unit::MillimetrePerDay => (1.0, 0.0),
            Unit::MetrePerDay => (1000.0, 0.0),
            Unit::KilogramPerSquareMetrePerSecond => (86400.0, 0.0),
        }
    }

    pub fn to_canonical(self, value: f64) -> f64 {
        let (scale, offset) = self.affine();
        value * scale + offset
    }

    pub fn from_canonical(self, value: f64) -> f64 {
        let (scale, offset) = self.affine();
        (value - offset) / scale
    }

    pub fn is_canonical(self) -> bool {
        self.dimension().canonical_unit() == self
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Celsius => "degC",
            Unit::Kelvin => "K",
            Unit::Fahrenheit => "degF",
            Unit::Kilopascal => "kPa",
            Unit::Pascal => "Pa",
            Unit::Hectopascal => "hPa",
            Unit::Percent => "%",
            Unit::Fraction => "1",
            Unit::KilogramPerKilogram => "kg kg-1",
            Unit::GramPerKilogram => "g kg-1",
            Unit::MegajoulePerSquareMetrePerDay => "MJ m-2 day-1",
            Unit::WattPerSquareMetre => "W m-2",
            Unit::JoulePerSquareMetrePerDay => "J m-2 day-1",
            Unit::KilojoulePerSquareMetrePerDay => "kJ m-2 day-1",
            Unit::MetrePerSecond => "m s-1",
            Unit::KilometrePerHour => "km h-1",
            Unit::Metre => "m",
            Unit::Kilometre => "km",
            Unit::MillimetrePerDay => "mm day-1",
            Unit::MetrePerDay => "m day-1",
            Unit::KilogramPerSquareMetrePerSecond => "kg m-2 s-1",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Collapse the spellings found in CF-style `units` attributes
/// (`m**-2`, `m^-2`, `m-2`, runs of whitespace) into one form.
fn normalize_unit(s: &str) -> String {
    s.trim()
        .replace("**", "")
        .replace('^', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match normalize_unit(s).as_str() {
            "degc" | "deg c" | "°c" | "c" | "celsius" | "degree_celsius"
            | "degrees_celsius" => Unit::Celsius,
            "k" | "kelvin" | "degk" => Unit::Kelvin,
            "degf" | "°f" | "f" | "fahrenheit" => Unit::Fahrenheit,
            "kpa" => Unit::Kilopascal,
            "pa" | "pascal" => Unit::Pascal,
            "hpa" | "mbar" | "mb" | "millibar" => Unit::Hectopascal,
            "%" | "percent" => Unit::Percent,
            "1" | "fraction" | "0-1" => Unit::Fraction,
            "kg kg-1" | "kg/kg" => Unit::KilogramPerKilogram,
            "g kg-1" | "g/kg" => Unit::GramPerKilogram,
            "mj m-2 day-1" | "mj m-2 d-1" | "mj/m2/day" => {
                Unit::MegajoulePerSquareMetrePerDay
            }
            "w m-2" | "w/m2" => Unit::WattPerSquareMetre,
            "j m-2 day-1" | "j m-2 d-1" | "j/m2/day" => {
                Unit::JoulePerSquareMetrePerDay
            }
            "kj m-2 day-1" | "kj m-2 d-1" | "kj/m2/day" => {
                Unit::KilojoulePerSquareMetrePerDay
            }
            "m s-1" | "m/s" => Unit::MetrePerSecond,
            "km h-1" | "km/h" | "kmh" => Unit::KilometrePerHour,
            "m" | "metre" | "meter" | "metres" | "meters" => Unit::Metre,
            "km" => Unit::Kilometre,
            "mm day-1" | "mm d-1" | "mm/day" | "mm/d" => {
                Unit::MillimetrePerDay
            }
            "m day-1" | "m d-1" | "m/day" => Unit::MetrePerDay,
            "kg m-2 s-1" => Unit::KilogramPerSquareMetrePerSecond,
            // Accumulations over an unstated period, e.g. hourly ERA5 `ssrd`.
            "mj m-2" | "j m-2" | "kj m-2" | "mm" => {
                return Err(Error::MissingTimeBase(s.to_string()))
            }
            _ => return Err(Error::UnknownUnit(s.to_string())),
        };
        Ok(unit)
    }
}

/// Convert `value` from `from` to `to`.
///
/// Fails with [`Error::UnitMismatch`] when the two units measure different
/// dimensions, e.g. a radiation flux and a pressure.
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, Error> {
    check_compatible(from, to)?;
    Ok(to.from_canonical(from.to_canonical(value)))
}

pub fn check_compatible(from: Unit, to: Unit) -> Result<(), Error> {
    if from.dimension() != to.dimension() {
        Err(Error::UnitMismatch {
            from: from.to_string(),
            to: to.to_string(),
        })
    } else {
        Ok(())
    }
}
