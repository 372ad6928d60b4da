//! Loading of configured weather variables onto the model grid.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ndarray::Array2;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::WeatherConfig;
use crate::dataset::{Dataset, Field};
use crate::domain::Domain;
use crate::model::Error;
use crate::pet::derived::WeatherInputs;
use crate::quantity::{PhysicalQuantity, QuantityName};
use crate::time::ModelTime;
use crate::units::{check_compatible, Unit};

/// Files in `directory` whose name matches `pattern` from its first
/// character, in lexical order.
pub fn resolve_pattern(directory: &Path, pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let regex = Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| Error::InvalidConfig(format!("invalid file pattern '{}': {}", pattern, e)))?;
    let not_found = || Error::DataNotFound {
        pattern: directory.join(pattern).display().to_string(),
    };
    let entries = fs::read_dir(directory).map_err(|_| not_found())?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if regex.is_match(&entry.file_name().to_string_lossy()) {
            paths.push(entry.path());
        }
    }
    if paths.is_empty() {
        return Err(not_found());
    }
    paths.sort();
    Ok(paths)
}

/// Apply `value * factor + offset` in the source unit, then convert to
/// `target`.
pub fn calibrate(
    values: &mut Array2<f64>,
    factor: f64,
    offset: f64,
    from: Unit,
    target: Unit,
) -> Result<(), Error> {
    check_compatible(from, target)?;
    values.mapv_inplace(|v| target.from_canonical(from.to_canonical(v * factor + offset)));
    Ok(())
}

/// Reads configured variables and aligns them to the model's points and
/// days.
pub struct PhysicalQuantitySource<'a> {
    configs: &'a BTreeMap<QuantityName, WeatherConfig>,
    domain: &'a Domain,
    dates: Vec<NaiveDate>,
}

impl<'a> PhysicalQuantitySource<'a> {
    pub fn new(
        configs: &'a BTreeMap<QuantityName, WeatherConfig>,
        domain: &'a Domain,
        time: &ModelTime,
    ) -> Self {
        PhysicalQuantitySource {
            configs,
            domain,
            dates: time.dates(),
        }
    }

    pub fn load(&self, name: QuantityName) -> Result<PhysicalQuantity, Error> {
        let config = self.configs.get(&name).ok_or_else(|| {
            Error::InvalidConfig(format!("no data source configured for {}", name))
        })?;
        let paths = resolve_pattern(&config.directory, &config.pattern)?;
        debug!(quantity = %name, files = paths.len(), "matched source files");

        let parts = paths
            .iter()
            .map(|path| {
                let dataset = Dataset::open(path, &config.varname)?;
                let field = Field::extract(&dataset, path, &config.varname, config.layout())?;
                if name.is_static() {
                    into_static(field)
                } else if field.times.is_none() {
                    Err(Error::MalformedDataset {
                        path: path.clone(),
                        reason: format!("{} needs a time dimension", name),
                    })
                } else {
                    Ok(field)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let field = Field::concat_time(parts)?;

        let source_unit = match (&config.units, &field.units) {
            (Some(unit), _) => *unit,
            (None, Some(attr)) => attr.parse()?,
            (None, None) => {
                warn!(
                    quantity = %name,
                    unit = %name.canonical_unit(),
                    "no unit declared, assuming canonical unit"
                );
                name.canonical_unit()
            }
        };

        let mut values = crate::select::select(&field, self.domain, &self.dates);
        calibrate(
            &mut values,
            config.factor,
            config.offset,
            source_unit,
            name.canonical_unit(),
        )?;
        debug!(
            quantity = %name,
            unit = %source_unit,
            factor = config.factor,
            offset = config.offset,
            "loaded"
        );
        Ok(PhysicalQuantity::new(name, values))
    }

    /// Load several quantities concurrently.
    pub fn load_all(&self, names: &[QuantityName]) -> Result<WeatherInputs, Error> {
        let quantities = names
            .par_iter()
            .map(|&name| self.load(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quantities.into_iter().collect())
    }
}

/// Static variables may carry a time axis of length one.
fn into_static(mut field: Field) -> Result<Field, Error> {
    match field.times.as_ref().map(Vec::len) {
        None => Ok(field),
        Some(1) => {
            field.times = None;
            Ok(field)
        }
        Some(n) => Err(Error::MalformedDataset {
            path: field.source.clone(),
            reason: format!("static variable has {} time steps", n),
        }),
    }
}
