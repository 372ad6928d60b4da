pub mod config;
pub mod dataset;
pub mod domain;
pub mod model;
#[cfg(feature = "netcdf")]
pub mod netcdf_read;
pub mod pet;
pub mod quantity;
pub mod select;
pub mod source;
pub mod time;
pub mod units;
pub mod writer;

#[cfg(feature = "python")]
mod python;

pub use config::Configuration;
pub use model::{Error, Model, ModelOutput};
pub use quantity::{CapabilityFlags, PhysicalQuantity, QuantityName};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn aquacrop_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();

    python::register_submodule(py, m, &python::make_pet_module(py)?, "aquacrop_rs")?;
    m.add_function(wrap_pyfunction!(python::run, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}

#[cfg(feature = "python")]
pyo3_stub_gen::define_stub_info_gatherer!(stub_info);
