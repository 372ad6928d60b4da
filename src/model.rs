use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::config::Configuration;
use crate::domain::Domain;
use crate::pet::derived::WeatherInputs;
use crate::pet::engine::{DailySeries, Et0Engine};
use crate::pet::resolve::{resolve_et0_plan, Et0Method, Et0Plan, MissingInputs};
use crate::quantity::QuantityName;
use crate::source::PhysicalQuantitySource;
use crate::writer::AquaCropInputWriter;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no file matches '{pattern}'")]
    DataNotFound { pattern: String },
    #[error("variable '{variable}' not found in {}", .path.display())]
    VariableNotFound { variable: String, path: PathBuf },
    #[error("cannot convert from {from} to {to}: incompatible dimensions")]
    UnitMismatch { from: String, to: String },
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("unit '{0}' has no time base; declare the daily unit (e.g. 'J m-2 day-1') in the configuration")]
    MissingTimeBase(String),
    #[error("insufficient data for {target}: {}", format_candidates(.candidates))]
    InsufficientData {
        target: String,
        candidates: Vec<MissingInputs>,
    },
    #[error("{0}")]
    InvalidMethod(String),
    #[error("ET0 method {0} is not implemented")]
    UnimplementedMethod(Et0Method),
    #[error("malformed time axis: {0}")]
    MalformedTimeAxis(String),
    #[error("malformed dataset {}: {reason}", .path.display())]
    MalformedDataset { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

fn format_candidates(candidates: &[MissingInputs]) -> String {
    candidates
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(feature = "python")]
impl From<Error> for pyo3::PyErr {
    fn from(err: Error) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

/// Everything needed to write one point's climate files.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub et0: DailySeries,
    pub inputs: WeatherInputs,
}

/// One preprocessing run: configuration, domain and resolved ET0 plan.
#[derive(Debug, Clone)]
pub struct Model {
    config: Configuration,
    domain: Domain,
    plan: Et0Plan,
}

impl Model {
    /// Parse and validate a configuration file. Method resolution happens
    /// here, before any weather data are read.
    pub fn from_config_file(path: &Path) -> Result<Self, Error> {
        let config = Configuration::from_file(path)?;
        Self::new(config)
    }

    pub fn new(config: Configuration) -> Result<Self, Error> {
        let plan = resolve_et0_plan(
            &config.capabilities(),
            config.et0.preprocess,
            config.et0.method.as_deref(),
            config.et0.vapour_pressure_policy,
        )?;
        let domain = config.domain()?;
        info!(
            n_points = domain.nxy(),
            n_timesteps = config.model_time.len(),
            start = %config.model_time.start(),
            end = %config.model_time.end(),
            "model initialised"
        );
        Ok(Model {
            config,
            domain,
            plan,
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn plan(&self) -> &Et0Plan {
        &self.plan
    }

    /// Quantities read by a full run: the ET0 inputs plus the variables
    /// written alongside it.
    pub fn required_quantities(&self) -> Vec<QuantityName> {
        let mut names = self.plan.required_quantities();
        names.extend([QuantityName::Tmin, QuantityName::Tmax, QuantityName::Prec]);
        names.sort();
        names.dedup();
        names
    }

    pub fn load_inputs(&self) -> Result<WeatherInputs, Error> {
        PhysicalQuantitySource::new(
            self.config.weather_configs(),
            &self.domain,
            &self.config.model_time,
        )
        .load_all(&self.required_quantities())
    }

    pub fn reference_evapotranspiration(&self, inputs: &WeatherInputs) -> DailySeries {
        Et0Engine::new(
            self.plan,
            self.config.et0.wind_height,
            inputs,
            &self.config.model_time,
            self.domain.latitude(),
        )
        .compute()
    }

    /// Load, compute, and keep results in memory.
    pub fn run(&self) -> Result<ModelOutput, Error> {
        let inputs = self.load_inputs()?;
        let et0 = self.reference_evapotranspiration(&inputs);
        Ok(ModelOutput { et0, inputs })
    }

    /// Write every point's climate files into `directory`, or the
    /// configured output directory.
    pub fn write_aquacrop_input(
        &self,
        output: &ModelOutput,
        directory: Option<&Path>,
    ) -> Result<Vec<PathBuf>, Error> {
        let out = &self.config.output;
        let writer = AquaCropInputWriter::new(
            directory.unwrap_or(out.directory.as_path()),
            out.description.clone(),
        )?;
        let start = output.et0.start();
        let tmin = output.inputs.require(QuantityName::Tmin);
        let tmax = output.inputs.require(QuantityName::Tmax);
        let prec = output.inputs.require(QuantityName::Prec);

        let written = self
            .domain
            .ids()
            .par_iter()
            .enumerate()
            .map(|(p, id)| {
                let stem = format!("{}_{}", out.prefix, id);
                writer.write_point(
                    &stem,
                    start,
                    tmin.column(p),
                    tmax.column(p),
                    output.et0.point(p),
                    prec.column(p),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let written: Vec<PathBuf> = written.into_iter().flatten().collect();
        info!(
            directory = %writer.directory().display(),
            n_files = written.len(),
            "AquaCrop climate input written"
        );
        Ok(written)
    }
}
