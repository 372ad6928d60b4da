//! Selection of derivation methods from the set of available quantities.
//!
//! Everything here is a pure function of [`CapabilityFlags`] and the user's
//! choices, evaluated once before any data are loaded.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use super::vapour::VapourPressureMethod;
use crate::model::Error;
use crate::quantity::{CapabilityFlags, QuantityName};

/// One input condition of a derivation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Quantity(QuantityName),
    /// `SP`, or `ELEV` to derive it.
    Pressure,
    /// `WIND`, or both `WIND_U` and `WIND_V`.
    Wind,
    /// Any resolvable vapour pressure method.
    VapourPressure,
}

impl Requirement {
    pub fn is_met(self, flags: &CapabilityFlags) -> bool {
        match self {
            Requirement::Quantity(name) => flags.has(name),
            Requirement::Pressure => flags.has_pressure(),
            Requirement::Wind => flags.has_wind(),
            Requirement::VapourPressure => VapourPressureMethod::PRIORITY
                .iter()
                .any(|m| m.is_satisfied(flags)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Quantity(name) => write!(f, "{}", name),
            Requirement::Pressure => f.write_str("SP or ELEV"),
            Requirement::Wind => f.write_str("WIND or WIND_U+WIND_V"),
            Requirement::VapourPressure => f.write_str("a vapour pressure source"),
        }
    }
}

/// Unmet requirements of one candidate method.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingInputs {
    pub method: String,
    pub missing: Vec<Requirement>,
}

impl fmt::Display for MissingInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.missing.iter().map(|r| r.to_string()).collect();
        write!(f, "{} (missing {})", self.method, names.join(", "))
    }
}

/// Which vapour pressure equation wins when several are satisfiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VapourPressurePolicy {
    /// First satisfiable method in priority order, so dewpoint wins.
    #[default]
    PreferDewpoint,
    /// Dewpoint is used only when no humidity based method is satisfiable.
    LastApplicable,
}

pub fn resolve_vapour_pressure_method(
    flags: &CapabilityFlags,
) -> Result<VapourPressureMethod, Error> {
    resolve_vapour_pressure_method_with(flags, VapourPressurePolicy::default())
}

pub fn resolve_vapour_pressure_method_with(
    flags: &CapabilityFlags,
    policy: VapourPressurePolicy,
) -> Result<VapourPressureMethod, Error> {
    let priority = VapourPressureMethod::PRIORITY;
    let chosen = match policy {
        VapourPressurePolicy::PreferDewpoint => {
            priority.into_iter().find(|m| m.is_satisfied(flags))
        }
        VapourPressurePolicy::LastApplicable => priority[1..]
            .iter()
            .copied()
            .find(|m| m.is_satisfied(flags))
            .or_else(|| {
                Some(VapourPressureMethod::FromDewpoint)
                    .filter(|m| m.is_satisfied(flags))
            }),
    };
    chosen.ok_or_else(|| Error::InsufficientData {
        target: String::from("actual vapour pressure"),
        candidates: priority
            .iter()
            .map(|m| MissingInputs {
                method: m.to_string(),
                missing: m.missing(flags),
            })
            .collect(),
    })
}

/// Reference evapotranspiration methods accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Et0Method {
    FromFile,
    Hargreaves,
    PenmanMonteith,
    PriestleyTaylor,
}

impl fmt::Display for Et0Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Et0Method::FromFile => "FromFile",
            Et0Method::Hargreaves => "Hargreaves",
            Et0Method::PenmanMonteith => "PenmanMonteith",
            Et0Method::PriestleyTaylor => "PriestleyTaylor",
        };
        f.write_str(name)
    }
}

impl FromStr for Et0Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hargreaves" => Ok(Et0Method::Hargreaves),
            "penmanmonteith" => Ok(Et0Method::PenmanMonteith),
            "priestleytaylor" => Ok(Et0Method::PriestleyTaylor),
            _ => Err(Error::InvalidMethod(format!(
                "Unknown ET0 method '{}'. Valid options: Hargreaves, PenmanMonteith, PriestleyTaylor",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindSource {
    Speed,
    Components,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureSource {
    Measured,
    FromElevation,
}

/// Everything Penman-Monteith needs, fixed before computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenmanMonteithPlan {
    pub vapour: VapourPressureMethod,
    pub wind: WindSource,
    pub pressure: PressureSource,
    /// Elevation is available for the clear-sky correction.
    pub elevation: bool,
}

impl PenmanMonteithPlan {
    pub fn required_quantities(&self) -> Vec<QuantityName> {
        use QuantityName::*;
        let mut names = vec![Tmin, Tmax, SwDown];
        names.extend(self.vapour.requirements().into_iter().filter_map(|r| match r {
            Requirement::Quantity(q) => Some(q),
            _ => None,
        }));
        match self.wind {
            WindSource::Speed => names.push(Wind),
            WindSource::Components => names.extend([WindU, WindV]),
        }
        match self.pressure {
            PressureSource::Measured => names.push(Sp),
            PressureSource::FromElevation => {}
        }
        if self.elevation {
            names.push(Elev);
        }
        names.sort();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Et0Plan {
    FromFile,
    PenmanMonteith(PenmanMonteithPlan),
}

impl Et0Plan {
    pub fn method(&self) -> Et0Method {
        match self {
            Et0Plan::FromFile => Et0Method::FromFile,
            Et0Plan::PenmanMonteith(_) => Et0Method::PenmanMonteith,
        }
    }

    /// Quantities that must be loaded to compute ET0.
    pub fn required_quantities(&self) -> Vec<QuantityName> {
        match self {
            Et0Plan::FromFile => vec![QuantityName::Et0],
            Et0Plan::PenmanMonteith(plan) => plan.required_quantities(),
        }
    }
}

/// Validate the configured method name without looking at data.
pub fn resolve_et0_method(preprocess: bool, method: Option<&str>) -> Result<Et0Method, Error> {
    if !preprocess {
        return Ok(Et0Method::FromFile);
    }
    method
        .ok_or_else(|| Error::InvalidMethod(String::from("no ET0 method given")))?
        .parse()
}

pub fn resolve_penman_monteith(
    flags: &CapabilityFlags,
    policy: VapourPressurePolicy,
) -> Result<PenmanMonteithPlan, Error> {
    use QuantityName::*;
    let mut missing: Vec<Requirement> = [Tmin, Tmax, SwDown]
        .into_iter()
        .filter(|&q| !flags.has(q))
        .map(Requirement::Quantity)
        .collect();
    for requirement in [Requirement::Wind, Requirement::Pressure] {
        if !requirement.is_met(flags) {
            missing.push(requirement);
        }
    }
    // Unmet vapour pressure candidates are reported after the method itself.
    let (vapour, vapour_candidates) = match resolve_vapour_pressure_method_with(flags, policy) {
        Ok(method) => (Some(method), Vec::new()),
        Err(Error::InsufficientData { candidates, .. }) => {
            missing.push(Requirement::VapourPressure);
            (None, candidates)
        }
        Err(err) => return Err(err),
    };
    let vapour = match vapour {
        Some(vapour) if missing.is_empty() => vapour,
        _ => {
            let mut candidates = vec![MissingInputs {
                method: Et0Method::PenmanMonteith.to_string(),
                missing,
            }];
            candidates.extend(vapour_candidates);
            return Err(Error::InsufficientData {
                target: String::from("PenmanMonteith reference evapotranspiration"),
                candidates,
            });
        }
    };

    Ok(PenmanMonteithPlan {
        vapour,
        wind: if flags.has(Wind) {
            WindSource::Speed
        } else {
            WindSource::Components
        },
        pressure: if flags.has(Sp) {
            PressureSource::Measured
        } else {
            PressureSource::FromElevation
        },
        elevation: flags.has(Elev),
    })
}

/// Resolve the full ET0 computation plan.
pub fn resolve_et0_plan(
    flags: &CapabilityFlags,
    preprocess: bool,
    method: Option<&str>,
    policy: VapourPressurePolicy,
) -> Result<Et0Plan, Error> {
    let plan = match resolve_et0_method(preprocess, method)? {
        Et0Method::FromFile => {
            if !flags.has(QuantityName::Et0) {
                return Err(Error::InsufficientData {
                    target: String::from("reference evapotranspiration from file"),
                    candidates: vec![MissingInputs {
                        method: Et0Method::FromFile.to_string(),
                        missing: vec![Requirement::Quantity(QuantityName::Et0)],
                    }],
                });
            }
            Et0Plan::FromFile
        }
        Et0Method::PenmanMonteith => {
            Et0Plan::PenmanMonteith(resolve_penman_monteith(flags, policy)?)
        }
        unimplemented => return Err(Error::UnimplementedMethod(unimplemented)),
    };
    match &plan {
        Et0Plan::FromFile => info!("ET0 read from file"),
        Et0Plan::PenmanMonteith(pm) => info!(
            vapour_pressure = %pm.vapour,
            wind = ?pm.wind,
            pressure = ?pm.pressure,
            elevation = pm.elevation,
            "ET0 computed with PenmanMonteith"
        ),
    }
    Ok(plan)
}
