use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis, Zip};
use tracing::info;

use super::derived::{DerivedQuantities, DerivedQuantityCalculator, WeatherInputs};
use super::fao56;
use super::resolve::Et0Plan;
use crate::quantity::QuantityName;
use crate::time::ModelTime;

/// Daily values for every model point, shaped `[time, space]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    start: NaiveDate,
    values: Array2<f64>,
}

impl DailySeries {
    pub fn new(start: NaiveDate, values: Array2<f64>) -> Self {
        DailySeries { start, values }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn point(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), index)
    }

    pub fn n_points(&self) -> usize {
        self.values.ncols()
    }
}

/// Penman-Monteith ET0 (mm day-1) over the grid of derived quantities.
pub fn penman_monteith(derived: &DerivedQuantities) -> Array2<f64> {
    Zip::from(&derived.tmean)
        .and(&derived.pressure)
        .and(&derived.wind_2m)
        .and(&derived.vpd)
        .and(&derived.rn)
        .par_map_collect(|&tmean, &sp, &u2, &vpd, &rn| {
            fao56::penman_monteith(tmean, sp, u2, vpd, rn)
        })
}

/// Reference evapotranspiration from loaded inputs and a resolved plan.
pub struct Et0Engine<'a> {
    plan: Et0Plan,
    wind_height: f64,
    inputs: &'a WeatherInputs,
    time: &'a ModelTime,
    latitude: &'a [f64],
}

impl<'a> Et0Engine<'a> {
    pub fn new(
        plan: Et0Plan,
        wind_height: f64,
        inputs: &'a WeatherInputs,
        time: &'a ModelTime,
        latitude: &'a [f64],
    ) -> Self {
        Et0Engine {
            plan,
            wind_height,
            inputs,
            time,
            latitude,
        }
    }

    pub fn compute(&self) -> DailySeries {
        let start = self.time.start().date();
        let values = match &self.plan {
            Et0Plan::FromFile => self.inputs.require(QuantityName::Et0).to_owned(),
            Et0Plan::PenmanMonteith(plan) => {
                let day_of_year = self.time.day_of_year();
                let derived =
                    DerivedQuantityCalculator::new(self.inputs, self.latitude, &day_of_year)
                        .compute(plan, self.wind_height);
                penman_monteith(&derived)
            }
        };
        info!(
            method = %self.plan.method(),
            n_timesteps = values.nrows(),
            n_points = values.ncols(),
            "reference evapotranspiration computed"
        );
        DailySeries::new(start, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::resolve::{resolve_penman_monteith, VapourPressurePolicy};
    use crate::quantity::{CapabilityFlags, PhysicalQuantity};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn scenario() -> WeatherInputs {
        use QuantityName::*;
        [
            (Tmin, 15.0),
            (Tmax, 25.0),
            (RhMin, 40.0),
            (RhMax, 80.0),
            (SwDown, 20.0),
            (Wind, 2.0),
            (Sp, 101.3),
        ]
        .into_iter()
        .map(|(name, v)| PhysicalQuantity::new(name, Array2::from_elem((1, 1), v)))
        .collect()
    }

    #[test]
    fn penman_monteith_reference_scenario() {
        let inputs = scenario();
        let flags = CapabilityFlags::new(inputs.names());
        let plan = resolve_penman_monteith(&flags, VapourPressurePolicy::default()).unwrap();
        // day of year 180
        let time = ModelTime::parse_daily("2010-06-29", "2010-06-29").unwrap();
        let series =
            Et0Engine::new(Et0Plan::PenmanMonteith(plan), 10.0, &inputs, &time, &[10.0]).compute();
        assert_abs_diff_eq!(series.values()[[0, 0]], 4.13, epsilon = 0.01);
        assert_eq!(series.start(), NaiveDate::from_ymd_opt(2010, 6, 29).unwrap());
    }

    #[test]
    fn fao56_example_18_uccle() {
        // Uccle (Brussels), 6 July: 50°48'N, 100 m, wind 10 km/h at 10 m,
        // Rs 22.07 MJ m-2 day-1. Published ET0 is 3.9 mm/day.
        use QuantityName::*;
        let inputs: WeatherInputs = [
            (Tmin, 12.3),
            (Tmax, 21.5),
            (RhMin, 63.0),
            (RhMax, 84.0),
            (SwDown, 22.07),
            (Wind, 10.0 / 3.6),
            (Elev, 100.0),
        ]
        .into_iter()
        .map(|(name, v)| PhysicalQuantity::new(name, Array2::from_elem((1, 1), v)))
        .collect();
        let flags = CapabilityFlags::new(inputs.names());
        let plan = resolve_penman_monteith(&flags, VapourPressurePolicy::default()).unwrap();
        let latitude = [50.0 + 48.0 / 60.0];

        let derived =
            DerivedQuantityCalculator::new(&inputs, &latitude, &[187]).compute(&plan, 10.0);
        assert_abs_diff_eq!(derived.pressure[[0, 0]], 100.1, epsilon = 0.05);
        assert_abs_diff_eq!(derived.ea[[0, 0]], 1.409, epsilon = 0.005);
        assert_abs_diff_eq!(derived.wind_2m[[0, 0]], 2.078, epsilon = 0.005);
        assert_abs_diff_eq!(derived.ra[[0, 0]], 41.09, epsilon = 0.15);
        assert_abs_diff_eq!(derived.rn[[0, 0]], 13.28, epsilon = 0.05);
        assert_abs_diff_eq!(penman_monteith(&derived)[[0, 0]], 3.9, epsilon = 0.1);
    }

    #[test]
    fn file_values_pass_through() {
        let values = array![[1.5, 0.0], [2.25, 3.0], [4.0, 5.5]];
        let inputs: WeatherInputs =
            std::iter::once(PhysicalQuantity::new(QuantityName::Et0, values.clone())).collect();
        let time = ModelTime::parse_daily("2010-01-01", "2010-01-03").unwrap();
        let series =
            Et0Engine::new(Et0Plan::FromFile, 10.0, &inputs, &time, &[0.0, 1.0]).compute();
        assert_eq!(series.values(), &values);
        assert_eq!(series.point(1).to_vec(), vec![0.0, 3.0, 5.5]);
    }
}
