use ndarray::{Array1, Array2, Axis};
use numpy::{PyArray1, PyReadonlyArray1, ToPyArray};
use pyo3::prelude::*;
use pyo3_stub_gen::derive::gen_stub_pyfunction;

use crate::model::Model;
use crate::pet::derived::{DerivedQuantityCalculator, WeatherInputs};
use crate::pet::engine::penman_monteith;
use crate::pet::radiation;
use crate::pet::resolve::{resolve_penman_monteith, VapourPressurePolicy};
use crate::pet::fao56;
use crate::quantity::{CapabilityFlags, PhysicalQuantity, QuantityName};

pub fn register_submodule(
    py: Python<'_>,
    parent: &Bound<'_, PyModule>,
    child: &Bound<'_, PyModule>,
    parent_name: &str,
) -> PyResult<()> {
    parent.add_submodule(child)?;
    py.import("sys")?
        .getattr("modules")?
        .set_item(format!("{}.{}", parent_name, child.name()?), child)?;
    Ok(())
}

#[gen_stub_pyfunction(module = "aquacrop_rs.pet")]
#[pyfunction]
#[pyo3(name = "saturation_vapour_pressure")]
pub fn py_saturation_vapour_pressure<'py>(
    py: Python<'py>,
    temperature: PyReadonlyArray1<'py, f64>,
) -> Bound<'py, PyArray1<f64>> {
    temperature
        .as_array()
        .mapv(fao56::saturation_vapour_pressure)
        .to_pyarray(py)
}

#[gen_stub_pyfunction(module = "aquacrop_rs.pet")]
#[pyfunction]
#[pyo3(name = "extraterrestrial_radiation")]
pub fn py_extraterrestrial_radiation<'py>(
    py: Python<'py>,
    day_of_year: PyReadonlyArray1<'py, f64>,
    latitude: f64,
) -> Bound<'py, PyArray1<f64>> {
    day_of_year
        .as_array()
        .mapv(|doy| radiation::extraterrestrial_radiation(latitude, doy))
        .to_pyarray(py)
}

/// Penman-Monteith ET0 (mm/day) for one point. Vapour pressure comes from
/// `tdew` when given, otherwise from daily relative humidity extremes.
#[gen_stub_pyfunction(module = "aquacrop_rs.pet")]
#[pyfunction]
#[pyo3(name = "penman_monteith", signature = (tmin, tmax, shortwave, wind, pressure, day_of_year, latitude, rhmin=None, rhmax=None, tdew=None, wind_height=10.0))]
#[allow(clippy::too_many_arguments)]
pub fn py_penman_monteith<'py>(
    py: Python<'py>,
    tmin: PyReadonlyArray1<'py, f64>,
    tmax: PyReadonlyArray1<'py, f64>,
    shortwave: PyReadonlyArray1<'py, f64>,
    wind: PyReadonlyArray1<'py, f64>,
    pressure: PyReadonlyArray1<'py, f64>,
    day_of_year: PyReadonlyArray1<'py, f64>,
    latitude: f64,
    rhmin: Option<PyReadonlyArray1<'py, f64>>,
    rhmax: Option<PyReadonlyArray1<'py, f64>>,
    tdew: Option<PyReadonlyArray1<'py, f64>>,
    wind_height: f64,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let n = tmin.as_array().len();
    let column = |name: QuantityName, values: Array1<f64>| -> PyResult<PhysicalQuantity> {
        if values.len() != n {
            return Err(pyo3::exceptions::PyValueError::new_err(format!(
                "{} has {} values, expected {}",
                name,
                values.len(),
                n
            )));
        }
        Ok(PhysicalQuantity::new(name, values.insert_axis(Axis(1))))
    };

    let mut given = vec![
        (QuantityName::Tmin, tmin),
        (QuantityName::Tmax, tmax),
        (QuantityName::SwDown, shortwave),
        (QuantityName::Wind, wind),
        (QuantityName::Sp, pressure),
    ];
    for (name, values) in [
        (QuantityName::RhMin, rhmin),
        (QuantityName::RhMax, rhmax),
        (QuantityName::Tdew, tdew),
    ] {
        if let Some(values) = values {
            given.push((name, values));
        }
    }
    let inputs = given
        .into_iter()
        .map(|(name, values)| column(name, values.as_array().to_owned()))
        .collect::<PyResult<WeatherInputs>>()?;

    let flags = CapabilityFlags::new(inputs.names());
    let plan = resolve_penman_monteith(&flags, VapourPressurePolicy::PreferDewpoint)?;
    let doy: Vec<u32> = day_of_year.as_array().iter().map(|&d| d as u32).collect();
    if doy.len() != n {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "day_of_year must have one value per time step",
        ));
    }
    let derived =
        DerivedQuantityCalculator::new(&inputs, &[latitude], &doy).compute(&plan, wind_height);
    let et0: Array2<f64> = penman_monteith(&derived);
    Ok(et0.column(0).to_pyarray(py))
}

/// Run a full preprocessing from a configuration file and return the
/// number of files written.
#[gen_stub_pyfunction(module = "aquacrop_rs")]
#[pyfunction]
#[pyo3(signature = (config_path, output=None))]
pub fn run(config_path: &str, output: Option<&str>) -> PyResult<usize> {
    let model = Model::from_config_file(std::path::Path::new(config_path))?;
    let results = model.run()?;
    let written = model.write_aquacrop_input(&results, output.map(std::path::Path::new))?;
    Ok(written.len())
}

pub fn make_pet_module(py: Python<'_>) -> PyResult<Bound<'_, PyModule>> {
    let m = PyModule::new(py, "pet")?;
    m.add_function(wrap_pyfunction!(py_saturation_vapour_pressure, &m)?)?;
    m.add_function(wrap_pyfunction!(py_extraterrestrial_radiation, &m)?)?;
    m.add_function(wrap_pyfunction!(py_penman_monteith, &m)?)?;
    Ok(m)
}
