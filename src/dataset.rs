//! Gridded array files held in memory as named dimensions, coordinate
//! arrays and data variables.
//!
//! Weather inputs are normally NetCDF files following the CF conventions
//! (see [`crate::netcdf_read`]). Files ending in `.json` are read as a
//! plain-text rendering of the same model, convenient for small fixtures.
//! Each variable is stored row-major over its own `dims`:
//!
//! ```json
//! {
//!   "dims": {"time": 2, "lat": 1, "lon": 2},
//!   "coords": {
//!     "time": {"dims": ["time"], "values": ["2010-01-01", "2010-01-02"]},
//!     "lat": {"dims": ["lat"], "values": [10.0]},
//!     "lon": {"dims": ["lon"], "values": [0.0, 0.5]}
//!   },
//!   "variables": {
//!     "t2m": {"dims": ["time", "lat", "lon"], "units": "K", "data": [290.0, 291.0, 292.0, 293.0]}
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ndarray::{concatenate, Array2, ArrayD, Axis, IxDyn};
use serde::Deserialize;

use crate::model::Error;

pub const TIME_DIM_NAMES: [&str; 3] = ["time", "valid_time", "t"];
pub const X_DIM_NAMES: [&str; 3] = ["lon", "longitude", "x"];
pub const Y_DIM_NAMES: [&str; 3] = ["lat", "latitude", "y"];

#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    pub dims: BTreeMap<String, usize>,
    #[serde(default)]
    pub coords: BTreeMap<String, Coordinate>,
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Coordinate {
    pub dims: Vec<String>,
    pub values: CoordinateValues,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CoordinateValues {
    Numeric(Vec<f64>),
    Dates(Vec<NaiveDate>),
}

impl CoordinateValues {
    fn len(&self) -> usize {
        match self {
            CoordinateValues::Numeric(v) => v.len(),
            CoordinateValues::Dates(v) => v.len(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variable {
    pub dims: Vec<String>,
    #[serde(default)]
    pub units: Option<String>,
    pub data: Vec<f64>,
}

/// Role of a dimension in the spatio-temporal layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimRole {
    Time,
    X,
    Y,
    /// Flat index over an unstructured set of points.
    Xy,
    Other,
}

pub fn dimension_role(name: &str, xy_dimname: Option<&str>) -> DimRole {
    if xy_dimname == Some(name) {
        DimRole::Xy
    } else if TIME_DIM_NAMES.contains(&name) {
        DimRole::Time
    } else if X_DIM_NAMES.contains(&name) {
        DimRole::X
    } else if Y_DIM_NAMES.contains(&name) {
        DimRole::Y
    } else {
        DimRole::Other
    }
}

/// How a source represents space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout<'a> {
    pub is_1d: bool,
    pub xy_dimname: Option<&'a str>,
}

impl Layout<'_> {
    pub const GRID: Layout<'static> = Layout {
        is_1d: false,
        xy_dimname: None,
    };
}

/// On-disk encoding of a dataset, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    NetCdf,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::NetCdf,
        }
    }
}

impl Dataset {
    /// Read the coordinates of `path` and the variable `varname`.
    pub fn open(path: &Path, varname: &str) -> Result<Self, Error> {
        let dataset = match Format::from_path(path) {
            Format::Json => Self::from_json(&fs::read_to_string(path)?, varname)?,
            Format::NetCdf => read_netcdf(path, varname)?,
        };
        dataset.validate(path)?;
        Ok(dataset)
    }

    /// Parse the JSON rendering, keeping only `varname` among the data
    /// variables.
    pub fn from_json(text: &str, varname: &str) -> Result<Self, Error> {
        let mut dataset: Dataset = serde_json::from_str(text)?;
        dataset.variables.retain(|name, _| name == varname);
        Ok(dataset)
    }

    fn validate(&self, path: &Path) -> Result<(), Error> {
        for (name, coord) in &self.coords {
            let expected = self.shape_of(&coord.dims, path)?.iter().product::<usize>();
            if coord.values.len() != expected {
                return Err(malformed(
                    path,
                    format!(
                        "coordinate '{}' has {} values, expected {}",
                        name,
                        coord.values.len(),
                        expected
                    ),
                ));
            }
        }
        for (name, var) in &self.variables {
            let expected = self.shape_of(&var.dims, path)?.iter().product::<usize>();
            if var.data.len() != expected {
                return Err(malformed(
                    path,
                    format!(
                        "variable '{}' has {} values, expected {}",
                        name,
                        var.data.len(),
                        expected
                    ),
                ));
            }
        }
        Ok(())
    }

    fn shape_of(&self, dims: &[String], path: &Path) -> Result<Vec<usize>, Error> {
        dims.iter()
            .map(|d| {
                self.dims.get(d).copied().ok_or_else(|| {
                    malformed(path, format!("undeclared dimension '{}'", d))
                })
            })
            .collect()
    }

    pub fn variable(&self, name: &str, path: &Path) -> Result<&Variable, Error> {
        self.variables.get(name).ok_or_else(|| Error::VariableNotFound {
            variable: name.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Numeric coordinate defined along exactly `dim`, looked up by any of
    /// `names`.
    fn numeric_coord(&self, names: &[&str], dim: &str) -> Option<&[f64]> {
        names.iter().find_map(|n| match self.coords.get(*n) {
            Some(Coordinate {
                dims,
                values: CoordinateValues::Numeric(values),
            }) if dims.len() == 1 && dims[0] == dim => Some(values.as_slice()),
            _ => None,
        })
    }

    fn time_coord(&self, dim: &str) -> Option<&[NaiveDate]> {
        match self.coords.get(dim) {
            Some(Coordinate {
                values: CoordinateValues::Dates(values),
                ..
            }) => Some(values.as_slice()),
            // an empty array carries no type
            Some(Coordinate {
                values: CoordinateValues::Numeric(values),
                ..
            }) if values.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

#[cfg(feature = "netcdf")]
fn read_netcdf(path: &Path, varname: &str) -> Result<Dataset, Error> {
    crate::netcdf_read::read_dataset(path, varname)
}

#[cfg(not(feature = "netcdf"))]
fn read_netcdf(path: &Path, _varname: &str) -> Result<Dataset, Error> {
    Err(Error::InvalidConfig(format!(
        "{} is read as NetCDF, but this build has no NetCDF support (enable the `netcdf` feature)",
        path.display()
    )))
}

pub(crate) fn malformed(path: &Path, reason: String) -> Error {
    Error::MalformedDataset {
        path: path.to_path_buf(),
        reason,
    }
}

/// Spatial arrangement of source cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Regular grid: cell `(iy, ix)` has flat index `iy * lon.len() + ix`.
    Grid { lat: Vec<f64>, lon: Vec<f64> },
    Points { lat: Vec<f64>, lon: Vec<f64> },
}

impl Geometry {
    pub fn n_cells(&self) -> usize {
        match self {
            Geometry::Grid { lat, lon } => lat.len() * lon.len(),
            Geometry::Points { lat, .. } => lat.len(),
        }
    }
}

/// One variable reduced to `[time, cell]` order. Static variables have a
/// single row and no time coordinate.
#[derive(Debug, Clone)]
pub struct Field {
    pub times: Option<Vec<NaiveDate>>,
    pub geometry: Geometry,
    pub values: Array2<f64>,
    pub units: Option<String>,
    pub source: PathBuf,
}

impl Field {
    pub fn extract(
        dataset: &Dataset,
        path: &Path,
        varname: &str,
        layout: Layout<'_>,
    ) -> Result<Self, Error> {
        let var = dataset.variable(varname, path)?;
        let xy_dimname = if layout.is_1d { layout.xy_dimname } else { None };
        if let Some(xy) = xy_dimname {
            if !var.dims.iter().any(|d| d == xy) {
                return Err(malformed(
                    path,
                    format!(
                        "'{}' is declared one-dimensional but has no '{}' dimension",
                        varname, xy
                    ),
                ));
            }
        }

        let shape = dataset.shape_of(&var.dims, path)?;
        let mut array = ArrayD::from_shape_vec(IxDyn(&shape), var.data.clone())
            .map_err(|e| malformed(path, e.to_string()))?;

        let mut time_dim = None;
        let mut x_dim = None;
        let mut y_dim = None;
        let mut xy_dim = None;
        let mut squeeze = Vec::new();
        for (axis, name) in var.dims.iter().enumerate() {
            let slot = match dimension_role(name, xy_dimname) {
                DimRole::Time => &mut time_dim,
                DimRole::X => &mut x_dim,
                DimRole::Y => &mut y_dim,
                DimRole::Xy => &mut xy_dim,
                DimRole::Other if shape[axis] == 1 => {
                    squeeze.push(axis);
                    continue;
                }
                DimRole::Other => {
                    return Err(malformed(
                        path,
                        format!("unsupported dimension '{}' in '{}'", name, varname),
                    ))
                }
            };
            if slot.replace((axis, name.as_str())).is_some() {
                return Err(malformed(
                    path,
                    format!("'{}' has two dimensions of the same role", varname),
                ));
            }
        }

        let (geometry, spatial_axes) = match (xy_dim, y_dim, x_dim) {
            (Some((axis, name)), None, None) => {
                let lat = dataset.numeric_coord(&Y_DIM_NAMES, name);
                let lon = dataset.numeric_coord(&X_DIM_NAMES, name);
                match (lat, lon) {
                    (Some(lat), Some(lon)) => (
                        Geometry::Points {
                            lat: lat.to_vec(),
                            lon: lon.to_vec(),
                        },
                        vec![axis],
                    ),
                    _ => {
                        return Err(malformed(
                            path,
                            format!("no lat/lon coordinates along '{}'", name),
                        ))
                    }
                }
            }
            (None, Some((y_axis, y_name)), Some((x_axis, x_name))) => {
                let lat = dataset.numeric_coord(&[y_name], y_name);
                let lon = dataset.numeric_coord(&[x_name], x_name);
                match (lat, lon) {
                    (Some(lat), Some(lon)) => (
                        Geometry::Grid {
                            lat: lat.to_vec(),
                            lon: lon.to_vec(),
                        },
                        vec![y_axis, x_axis],
                    ),
                    _ => {
                        return Err(malformed(
                            path,
                            format!("missing coordinate for '{}' or '{}'", y_name, x_name),
                        ))
                    }
                }
            }
            _ => {
                return Err(malformed(
                    path,
                    format!("'{}' has no recognisable spatial dimensions", varname),
                ))
            }
        };

        let times = match time_dim {
            Some((_, name)) => match dataset.time_coord(name) {
                Some(t) => Some(t.to_vec()),
                None => {
                    return Err(malformed(
                        path,
                        format!("time dimension '{}' has no date coordinate", name),
                    ))
                }
            },
            None => None,
        };

        if geometry.n_cells() == 0 {
            return Err(malformed(
                path,
                format!("'{}' has no spatial cells", varname),
            ));
        }
        if let Some(times) = &times {
            if times.is_empty() {
                return Err(malformed(path, format!("'{}' has an empty time axis", varname)));
            }
            if times.windows(2).any(|w| w[1] <= w[0]) {
                return Err(Error::MalformedTimeAxis(format!(
                    "{}: dates of '{}' are not strictly increasing days; aggregate sub-daily data to daily values first",
                    path.display(),
                    varname
                )));
            }
        }

        // Drop length-one auxiliary axes, highest index first so the
        // remaining indices stay valid.
        for &axis in squeeze.iter().rev() {
            array = array.index_axis_move(Axis(axis), 0);
        }
        let shift = |axis: usize| axis - squeeze.iter().filter(|&&s| s < axis).count();

        let mut order: Vec<usize> = Vec::with_capacity(3);
        if let Some((axis, _)) = time_dim {
            order.push(shift(axis));
        }
        order.extend(spatial_axes.iter().map(|&a| shift(a)));

        let n_rows = times.as_ref().map_or(1, Vec::len);
        let n_cells = geometry.n_cells();
        let values = array
            .permuted_axes(IxDyn(&order))
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n_rows, n_cells))
            .map_err(|e| malformed(path, e.to_string()))?;

        Ok(Field {
            times,
            geometry,
            values,
            units: var.units.clone(),
            source: path.to_path_buf(),
        })
    }

    /// Join fields read from several files along time, in chronological
    /// order. All parts must share the same geometry and units.
    pub fn concat_time(mut parts: Vec<Field>) -> Result<Field, Error> {
        if parts.len() <= 1 {
            return parts.pop().ok_or_else(|| Error::DataNotFound {
                pattern: String::from("<empty file list>"),
            });
        }
        let first = &parts[0];
        if first.times.is_none() {
            return Err(malformed(
                &first.source,
                String::from("static variable matched by more than one file"),
            ));
        }
        parts.sort_by_key(|p| p.times.as_ref().and_then(|t| t.first().copied()));

        let mut times: Vec<NaiveDate> = Vec::new();
        for part in &parts {
            if part.geometry != parts[0].geometry {
                return Err(malformed(
                    &part.source,
                    String::from("spatial coordinates differ from the other files"),
                ));
            }
            if part.units != parts[0].units {
                return Err(malformed(
                    &part.source,
                    String::from("units differ from the other files"),
                ));
            }
            let part_times = part.times.as_deref().unwrap_or(&[]);
            if let (Some(last), Some(next)) = (times.last(), part_times.first()) {
                if next <= last {
                    return Err(malformed(
                        &part.source,
                        format!("time range overlaps a previous file at {}", next),
                    ));
                }
            }
            times.extend_from_slice(part_times);
        }

        let views: Vec<_> = parts.iter().map(|p| p.values.view()).collect();
        let values = concatenate(Axis(0), &views)
            .map_err(|e| malformed(&parts[0].source, e.to_string()))?;

        let head = &parts[0];
        Ok(Field {
            times: Some(times),
            geometry: head.geometry.clone(),
            units: head.units.clone(),
            source: head.source.clone(),
            values,
        })
    }
}
