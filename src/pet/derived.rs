//! Intermediate quantities of the Penman-Monteith chain over the whole
//! `[time, space]` grid.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Zip};
use tracing::debug;

use super::fao56;
use super::radiation;
use super::resolve::{PenmanMonteithPlan, PressureSource, WindSource};
use super::vapour::{self, VapourPressureMethod};
use crate::quantity::{PhysicalQuantity, QuantityName};

/// Loaded quantities keyed by name, all shaped `[time, space]`.
#[derive(Debug, Clone, Default)]
pub struct WeatherInputs {
    quantities: BTreeMap<QuantityName, Array2<f64>>,
}

impl WeatherInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quantity: PhysicalQuantity) {
        let name = quantity.name();
        self.quantities.insert(name, quantity.into_values());
    }

    pub fn get(&self, name: QuantityName) -> Option<ArrayView2<'_, f64>> {
        self.quantities.get(&name).map(|v| v.view())
    }

    pub fn contains(&self, name: QuantityName) -> bool {
        self.quantities.contains_key(&name)
    }

    /// Values of a quantity that method resolution guaranteed.
    ///
    /// # Panics
    ///
    /// If `name` was never loaded: the caller skipped method resolution.
    pub fn require(&self, name: QuantityName) -> ArrayView2<'_, f64> {
        match self.quantities.get(&name) {
            Some(values) => values.view(),
            None => panic!(
                "{} is not available; derivation methods must be resolved before computing",
                name
            ),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = QuantityName> + '_ {
        self.quantities.keys().copied()
    }
}

impl FromIterator<PhysicalQuantity> for WeatherInputs {
    fn from_iter<I: IntoIterator<Item = PhysicalQuantity>>(iter: I) -> Self {
        let mut inputs = WeatherInputs::new();
        for quantity in iter {
            inputs.insert(quantity);
        }
        inputs
    }
}

#[derive(Debug, Clone)]
pub struct DerivedQuantities {
    pub tmean: Array2<f64>,
    pub es_mean: Array2<f64>,
    pub ea: Array2<f64>,
    pub vpd: Array2<f64>,
    /// Surface pressure (kPa).
    pub pressure: Array2<f64>,
    /// Wind speed at 2 m (m s-1).
    pub wind_2m: Array2<f64>,
    pub ra: Array2<f64>,
    pub rn: Array2<f64>,
}

pub struct DerivedQuantityCalculator<'a> {
    inputs: &'a WeatherInputs,
    latitude: &'a [f64],
    day_of_year: &'a [u32],
}

impl<'a> DerivedQuantityCalculator<'a> {
    pub fn new(inputs: &'a WeatherInputs, latitude: &'a [f64], day_of_year: &'a [u32]) -> Self {
        DerivedQuantityCalculator {
            inputs,
            latitude,
            day_of_year,
        }
    }

    pub fn mean_temperature(&self) -> Array2<f64> {
        Zip::from(self.inputs.require(QuantityName::Tmin))
            .and(self.inputs.require(QuantityName::Tmax))
            .par_map_collect(|&tmin, &tmax| fao56::mean_temperature(tmin, tmax))
    }

    pub fn mean_saturation_vapour_pressure(&self) -> Array2<f64> {
        Zip::from(self.inputs.require(QuantityName::Tmin))
            .and(self.inputs.require(QuantityName::Tmax))
            .par_map_collect(|&tmin, &tmax| fao56::mean_saturation_vapour_pressure(tmin, tmax))
    }

    /// Actual vapour pressure (kPa). `pressure` is only read by the
    /// specific humidity method.
    pub fn actual_vapour_pressure(
        &self,
        method: VapourPressureMethod,
        pressure: Option<ArrayView2<'_, f64>>,
    ) -> Array2<f64> {
        use QuantityName::*;
        let q = |name| self.inputs.require(name);
        match method {
            VapourPressureMethod::FromDewpoint => q(Tdew).mapv(vapour::from_dewpoint),
            VapourPressureMethod::FromMinMaxRelativeHumidity => Zip::from(q(Tmin))
                .and(q(Tmax))
                .and(q(RhMin))
                .and(q(RhMax))
                .par_map_collect(|&tmin, &tmax, &rhmin, &rhmax| {
                    vapour::from_min_max_relative_humidity(tmin, tmax, rhmin, rhmax)
                }),
            VapourPressureMethod::FromMaxRelativeHumidity => Zip::from(q(Tmin))
                .and(q(RhMax))
                .par_map_collect(|&tmin, &rhmax| vapour::from_max_relative_humidity(tmin, rhmax)),
            VapourPressureMethod::FromMeanRelativeHumidity => Zip::from(q(Tmin))
                .and(q(Tmax))
                .and(q(RhMean))
                .par_map_collect(|&tmin, &tmax, &rhmean| {
                    vapour::from_mean_relative_humidity(tmin, tmax, rhmean)
                }),
            VapourPressureMethod::FromSpecificHumidity => {
                let Some(pressure) = pressure else {
                    panic!("surface pressure is required for {}", method);
                };
                Zip::from(q(Sh))
                    .and(pressure)
                    .par_map_collect(|&sh, &sp| vapour::from_specific_humidity(sh, sp))
            }
        }
    }

    pub fn vapour_pressure_deficit(
        &self,
        es_mean: ArrayView2<'_, f64>,
        ea: ArrayView2<'_, f64>,
    ) -> Array2<f64> {
        Zip::from(es_mean)
            .and(ea)
            .par_map_collect(|&es, &ea| fao56::vapour_pressure_deficit(es, ea))
    }

    pub fn surface_pressure(&self, source: PressureSource) -> Array2<f64> {
        match source {
            PressureSource::Measured => self.inputs.require(QuantityName::Sp).to_owned(),
            PressureSource::FromElevation => self
                .inputs
                .require(QuantityName::Elev)
                .mapv(fao56::pressure_from_elevation),
        }
    }

    /// Wind speed at the measurement height.
    pub fn wind_speed(&self, source: WindSource) -> Array2<f64> {
        match source {
            WindSource::Speed => self.inputs.require(QuantityName::Wind).to_owned(),
            WindSource::Components => Zip::from(self.inputs.require(QuantityName::WindU))
                .and(self.inputs.require(QuantityName::WindV))
                .par_map_collect(|&u, &v| fao56::wind_speed(u, v)),
        }
    }

    /// Extraterrestrial radiation from each point's latitude and each day's
    /// day of year.
    pub fn extraterrestrial_radiation(&self) -> Array2<f64> {
        Array2::from_shape_fn(
            (self.day_of_year.len(), self.latitude.len()),
            |(t, p)| {
                radiation::extraterrestrial_radiation(self.latitude[p], self.day_of_year[t] as f64)
            },
        )
    }

    pub fn clear_sky_radiation(&self, ra: ArrayView2<'_, f64>, use_elevation: bool) -> Array2<f64> {
        if use_elevation {
            Zip::from(ra)
                .and(self.inputs.require(QuantityName::Elev))
                .par_map_collect(|&ra, &z| radiation::clear_sky_radiation(ra, Some(z)))
        } else {
            debug!("no elevation, clear-sky radiation computed at sea level");
            ra.mapv(|ra| radiation::clear_sky_radiation(ra, None))
        }
    }

    pub fn net_radiation(&self, rso: ArrayView2<'_, f64>, ea: ArrayView2<'_, f64>) -> Array2<f64> {
        Zip::from(self.inputs.require(QuantityName::SwDown))
            .and(rso)
            .and(self.inputs.require(QuantityName::Tmin))
            .and(self.inputs.require(QuantityName::Tmax))
            .and(ea)
            .par_map_collect(|&rs, &rso, &tmin, &tmax, &ea| {
                radiation::net_radiation(rs, rso, tmin, tmax, ea)
            })
    }

    /// Compute every intermediate quantity in dependency order.
    pub fn compute(&self, plan: &PenmanMonteithPlan, wind_height: f64) -> DerivedQuantities {
        let tmean = self.mean_temperature();
        let es_mean = self.mean_saturation_vapour_pressure();
        let pressure = self.surface_pressure(plan.pressure);
        let ea = self.actual_vapour_pressure(plan.vapour, Some(pressure.view()));
        let vpd = self.vapour_pressure_deficit(es_mean.view(), ea.view());
        let wind_2m = self
            .wind_speed(plan.wind)
            .mapv(|u| fao56::wind_speed_2m(u, wind_height));
        let ra = self.extraterrestrial_radiation();
        let rso = self.clear_sky_radiation(ra.view(), plan.elevation);
        let rn = self.net_radiation(rso.view(), ea.view());
        debug!(
            n_timesteps = self.day_of_year.len(),
            n_points = self.latitude.len(),
            vapour_pressure = %plan.vapour,
            "derived quantities computed"
        );
        DerivedQuantities {
            tmean,
            es_mean,
            ea,
            vpd,
            pressure,
            wind_2m,
            ra,
            rn,
        }
    }
}
