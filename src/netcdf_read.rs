//! NetCDF input following the CF conventions.
//!
//! Only the coordinates and the requested variable are read. Packed
//! variables are unpacked (`scale_factor`, `add_offset`), fill values become
//! NaN and numeric time coordinates are decoded to dates.

use std::collections::BTreeMap;
use std::path::Path;

use netcdf::{AttributeValue, Variable as NcVariable};
use tracing::debug;

use crate::dataset::{
    dimension_role, malformed, Coordinate, CoordinateValues, Dataset, DimRole, Variable,
    X_DIM_NAMES, Y_DIM_NAMES,
};
use crate::model::Error;
use crate::time::cf_offsets_to_dates;

const FILL_ATTRIBUTES: [&str; 2] = ["_FillValue", "missing_value"];

pub fn read_dataset(path: &Path, varname: &str) -> Result<Dataset, Error> {
    let file = netcdf::open(path).map_err(nc_error(path))?;
    let dims: BTreeMap<String, usize> = file.dimensions().map(|d| (d.name(), d.len())).collect();

    let mut coords = BTreeMap::new();
    for var in file.variables() {
        let name = var.name();
        let var_dims = dimension_names(&var);
        let [dim] = var_dims.as_slice() else {
            continue;
        };
        let values = if name == *dim && dimension_role(dim, None) == DimRole::Time {
            CoordinateValues::Dates(read_time(&var, path)?)
        } else if name == *dim
            || X_DIM_NAMES.contains(&name.as_str())
            || Y_DIM_NAMES.contains(&name.as_str())
        {
            CoordinateValues::Numeric(read_values(&var, path)?)
        } else {
            continue;
        };
        coords.insert(
            name,
            Coordinate {
                dims: var_dims,
                values,
            },
        );
    }

    let var = file
        .variable(varname)
        .ok_or_else(|| Error::VariableNotFound {
            variable: varname.to_string(),
            path: path.to_path_buf(),
        })?;
    let variable = Variable {
        dims: dimension_names(&var),
        units: string_attribute(&var, "units", path)?,
        data: read_values(&var, path)?,
    };
    debug!(
        path = %path.display(),
        variable = varname,
        dims = ?variable.dims,
        units = ?variable.units,
        "read NetCDF variable"
    );

    Ok(Dataset {
        dims,
        coords,
        variables: BTreeMap::from([(varname.to_string(), variable)]),
    })
}

fn nc_error(path: &Path) -> impl Fn(netcdf::Error) -> Error + '_ {
    move |e| malformed(path, e.to_string())
}

fn dimension_names(var: &NcVariable<'_>) -> Vec<String> {
    var.dimensions().iter().map(|d| d.name()).collect()
}

/// Values as `f64`, unpacked, with fill values replaced by NaN.
fn read_values(var: &NcVariable<'_>, path: &Path) -> Result<Vec<f64>, Error> {
    let mut values = var.get_values::<f64, _>(..).map_err(nc_error(path))?;
    let mut fills = Vec::new();
    for name in FILL_ATTRIBUTES {
        if let Some(fill) = numeric_attribute(var, name, path)? {
            fills.push(fill);
        }
    }
    let scale = numeric_attribute(var, "scale_factor", path)?.unwrap_or(1.0);
    let offset = numeric_attribute(var, "add_offset", path)?.unwrap_or(0.0);
    for v in values.iter_mut() {
        *v = if fills.contains(v) {
            f64::NAN
        } else {
            *v * scale + offset
        };
    }
    Ok(values)
}

fn read_time(var: &NcVariable<'_>, path: &Path) -> Result<Vec<chrono::NaiveDate>, Error> {
    let units = string_attribute(var, "units", path)?.ok_or_else(|| {
        malformed(path, format!("time coordinate '{}' has no units", var.name()))
    })?;
    let calendar = string_attribute(var, "calendar", path)?;
    let offsets = read_values(var, path)?;
    cf_offsets_to_dates(&offsets, &units, calendar.as_deref()).map_err(|e| match e {
        Error::MalformedTimeAxis(reason) => {
            Error::MalformedTimeAxis(format!("{}: {}", path.display(), reason))
        }
        other => other,
    })
}

fn attribute(
    var: &NcVariable<'_>,
    name: &str,
    path: &Path,
) -> Result<Option<AttributeValue>, Error> {
    var.attribute(name)
        .map(|a| a.value().map_err(nc_error(path)))
        .transpose()
}

fn string_attribute(
    var: &NcVariable<'_>,
    name: &str,
    path: &Path,
) -> Result<Option<String>, Error> {
    Ok(match attribute(var, name, path)? {
        Some(AttributeValue::Str(s)) => Some(s),
        _ => None,
    })
}

fn numeric_attribute(var: &NcVariable<'_>, name: &str, path: &Path) -> Result<Option<f64>, Error> {
    let Some(value) = attribute(var, name, path)? else {
        return Ok(None);
    };
    let number = match value {
        AttributeValue::Double(v) => v,
        AttributeValue::Float(v) => f64::from(v),
        AttributeValue::Longlong(v) => v as f64,
        AttributeValue::Ulonglong(v) => v as f64,
        AttributeValue::Int(v) => f64::from(v),
        AttributeValue::Uint(v) => f64::from(v),
        AttributeValue::Short(v) => f64::from(v),
        AttributeValue::Ushort(v) => f64::from(v),
        AttributeValue::Schar(v) => f64::from(v),
        AttributeValue::Uchar(v) => f64::from(v),
        AttributeValue::Doubles(v) if v.len() == 1 => v[0],
        AttributeValue::Floats(v) if v.len() == 1 => f64::from(v[0]),
        _ => {
            return Err(malformed(
                path,
                format!("attribute '{}' of '{}' is not a number", name, var.name()),
            ))
        }
    };
    Ok(Some(number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Field, Geometry, Layout};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    /// Two days of packed ERA5-style 2 m temperature on a 2 x 1 grid.
    fn write_era5_like(path: &Path) {
        let mut file = netcdf::create(path).unwrap();
        file.add_dimension("time", 2).unwrap();
        file.add_dimension("latitude", 2).unwrap();
        file.add_dimension("longitude", 1).unwrap();
        {
            let mut time = file.add_variable::<i32>("time", &["time"]).unwrap();
            time.put_attribute("units", "hours since 1900-01-01 00:00:00.0")
                .unwrap();
            time.put_attribute("calendar", "gregorian").unwrap();
            time.put_values(&[968_544i32, 968_568], ..).unwrap();
        }
        {
            let mut lat = file.add_variable::<f32>("latitude", &["latitude"]).unwrap();
            lat.put_values(&[10.5f32, 10.0], ..).unwrap();
        }
        {
            let mut lon = file.add_variable::<f64>("longitude", &["longitude"]).unwrap();
            lon.put_values(&[0.25], ..).unwrap();
        }
        {
            let mut t2m = file
                .add_variable::<i16>("t2m", &["time", "latitude", "longitude"])
                .unwrap();
            t2m.put_attribute("units", "K").unwrap();
            t2m.put_attribute("scale_factor", 0.01f64).unwrap();
            t2m.put_attribute("add_offset", 280.0f64).unwrap();
            t2m.put_attribute("_FillValue", -32767i16).unwrap();
            t2m.put_values(&[100i16, 200, -32767, 400], ..).unwrap();
        }
    }

    #[test]
    fn packed_cf_variable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t2m.nc");
        write_era5_like(&path);

        let ds = read_dataset(&path, "t2m").unwrap();
        assert_eq!(ds.dims["latitude"], 2);
        assert_eq!(ds.variables.len(), 1);
        let var = &ds.variables["t2m"];
        assert_eq!(var.units.as_deref(), Some("K"));
        assert!((var.data[0] - 281.0).abs() < 1e-9);
        assert!((var.data[3] - 284.0).abs() < 1e-9);
        assert!(var.data[2].is_nan());

        let field = Field::extract(&ds, &path, "t2m", Layout::GRID).unwrap();
        assert_eq!(
            field.times,
            Some(vec![
                NaiveDate::from_ymd_opt(2010, 6, 29).unwrap(),
                NaiveDate::from_ymd_opt(2010, 6, 30).unwrap()
            ])
        );
        assert_eq!(
            field.geometry,
            Geometry::Grid {
                lat: vec![10.5, 10.0],
                lon: vec![0.25]
            }
        );
        assert_eq!(field.values.dim(), (2, 2));
    }

    #[test]
    fn missing_variable_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t2m.nc");
        write_era5_like(&path);
        assert!(matches!(
            read_dataset(&path, "d2m"),
            Err(Error::VariableNotFound { ref variable, .. }) if variable == "d2m"
        ));
    }

    #[test]
    fn opened_through_the_dataset_entry_point() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t2m.nc");
        write_era5_like(&path);
        let ds = Dataset::open(&path, "t2m").unwrap();
        assert!(ds.coords.contains_key("time"));
    }
}
