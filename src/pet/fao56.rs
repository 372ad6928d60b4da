//! Scalar FAO-56 psychrometric and aerodynamic relations.
//!
//! Temperatures are in °C, pressures in kPa, radiation in MJ m-2 day-1 and
//! wind speed in m s-1 unless a name says otherwise.

/// Ratio of molecular weights of water vapour and dry air.
pub const EPSILON: f64 = 0.622;
/// Specific heat of air at constant pressure (MJ kg-1 K-1).
pub const CP: f64 = 1.013e-3;
/// Specific gas constant of dry air (J kg-1 K-1).
pub const R_DRY_AIR: f64 = 287.058;
/// Bulk surface resistance of the reference crop (s m-1).
pub const SURFACE_RESISTANCE: f64 = 70.0;
/// Lower bound applied to 2 m wind speed, keeping `ra` finite.
pub const MIN_WIND_SPEED_2M: f64 = 0.5;

const KELVIN: f64 = 273.15;
const SECONDS_PER_DAY: f64 = 86400.0;
const MJ_DAY_TO_W: f64 = 1e6 / SECONDS_PER_DAY;

pub fn mean_temperature(tmin: f64, tmax: f64) -> f64 {
    (tmin + tmax) / 2.0
}

/// Saturation vapour pressure (kPa), FAO-56 eq. 11.
pub fn saturation_vapour_pressure(t: f64) -> f64 {
    0.6108 * (17.27 * t / (t + 237.3)).exp()
}

/// Mean saturation vapour pressure over the day, FAO-56 eq. 12.
pub fn mean_saturation_vapour_pressure(tmin: f64, tmax: f64) -> f64 {
    (saturation_vapour_pressure(tmin) + saturation_vapour_pressure(tmax)) / 2.0
}

pub fn vapour_pressure_deficit(es_mean: f64, ea: f64) -> f64 {
    (es_mean - ea).max(0.0)
}

/// Slope of the saturation vapour pressure curve (kPa K-1), FAO-56 eq. 13.
pub fn slope_vapour_pressure_curve(t: f64) -> f64 {
    4098.0 * saturation_vapour_pressure(t) / (t + 237.3).powi(2)
}

/// Atmospheric pressure (kPa) from elevation (m), FAO-56 eq. 7.
pub fn pressure_from_elevation(elevation: f64) -> f64 {
    101.3 * ((293.0 - 0.0065 * elevation) / 293.0).powf(5.26)
}

/// Latent heat of vaporisation (MJ kg-1).
pub fn latent_heat(t: f64) -> f64 {
    2.501 - 0.002361 * t
}

/// Psychrometric constant (kPa K-1).
pub fn psychrometric_constant(pressure: f64, lambda: f64) -> f64 {
    CP * pressure / (EPSILON * lambda)
}

/// Density of air (kg m-3).
pub fn air_density(pressure: f64, t: f64) -> f64 {
    pressure * 1000.0 / ((t + KELVIN) * R_DRY_AIR)
}

/// Wind speed at 2 m from a measurement at `height` metres, FAO-56 eq. 47.
pub fn wind_speed_2m(speed: f64, height: f64) -> f64 {
    speed * 4.87 / (67.8 * height - 5.42).ln()
}

pub fn wind_speed(u: f64, v: f64) -> f64 {
    u.hypot(v)
}

/// Aerodynamic resistance (s m-1) of the reference surface.
pub fn aerodynamic_resistance(u2: f64) -> f64 {
    208.0 / u2.max(MIN_WIND_SPEED_2M)
}

/// Daily reference evapotranspiration (mm day-1) by Penman-Monteith in
/// resistance form, with the energy terms in SI units.
pub fn penman_monteith(tmean: f64, pressure: f64, u2: f64, vpd: f64, rn: f64) -> f64 {
    let rho = air_density(pressure, tmean);
    let lambda = latent_heat(tmean);
    let delta = slope_vapour_pressure_curve(tmean);
    let gamma = psychrometric_constant(pressure, lambda);
    let ra = aerodynamic_resistance(u2);

    let rn_w = rn * MJ_DAY_TO_W;
    let vpd_pa = vpd * 1000.0;

    let top = (delta * 1000.0 * rn_w + rho * CP * 1e6 * (vpd_pa / ra)).max(1.0);
    let base = (delta * 1000.0 + gamma * 1000.0 * (1.0 + SURFACE_RESISTANCE / ra)).max(1.0);
    let pet = (top / base).max(0.0);
    (pet / (lambda * 1e6) * SECONDS_PER_DAY).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn saturation_vapour_pressure_table_values() {
        // FAO-56 Annex 2, table 2.3
        assert_relative_eq!(saturation_vapour_pressure(20.0), 2.338, epsilon = 1e-3);
        assert_relative_eq!(saturation_vapour_pressure(0.0), 0.6108, epsilon = 1e-4);
        assert_relative_eq!(slope_vapour_pressure_curve(20.0), 0.145, epsilon = 1e-3);
    }

    #[test]
    fn saturation_vapour_pressure_is_increasing() {
        let mut previous = saturation_vapour_pressure(-40.0);
        let mut t = -40.0;
        while t < 60.0 {
            t += 0.25;
            let es = saturation_vapour_pressure(t);
            assert!(es > previous, "es not increasing at {t}");
            previous = es;
        }
    }

    #[test]
    fn deficit_never_negative() {
        assert_eq!(vapour_pressure_deficit(1.0, 1.5), 0.0);
        assert_relative_eq!(vapour_pressure_deficit(2.0, 1.5), 0.5);
    }

    #[test]
    fn pressure_at_altitude() {
        // FAO-56 example 2: 1800 m gives 81.8 kPa
        assert_relative_eq!(pressure_from_elevation(1800.0), 81.8, epsilon = 0.1);
        assert_relative_eq!(pressure_from_elevation(0.0), 101.3);
    }

    #[test]
    fn wind_profile() {
        // FAO-56 example 14: 3.2 m/s at 10 m gives 2.4 m/s at 2 m
        assert_relative_eq!(wind_speed_2m(3.2, 10.0), 2.4, epsilon = 0.01);
        assert_relative_eq!(wind_speed_2m(2.0, 2.0), 2.0, epsilon = 0.01);
        assert_relative_eq!(wind_speed(3.0, -4.0), 5.0);
    }

    #[test]
    fn calm_air_has_finite_resistance() {
        assert_relative_eq!(aerodynamic_resistance(0.0), 416.0);
        assert!(penman_monteith(20.0, 101.3, 0.0, 1.0, 10.0).is_finite());
    }

    #[test]
    fn reference_scenario_value() {
        let tmin: f64 = 15.0;
        let tmax: f64 = 25.0;
        let tmean = mean_temperature(tmin, tmax);
        let es = mean_saturation_vapour_pressure(tmin, tmax);
        let ea = (saturation_vapour_pressure(tmin) * 0.8
            + saturation_vapour_pressure(tmax) * 0.4)
            / 2.0;
        let u2 = wind_speed_2m(2.0, 10.0);
        // net radiation is 11.33 MJ m-2 day-1 at 10 N on day 180
        let et0 = penman_monteith(tmean, 101.3, u2, vapour_pressure_deficit(es, ea), 11.33);
        assert_relative_eq!(et0, 4.13, epsilon = 0.01);
    }

    #[test]
    fn penman_monteith_is_non_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..1000 {
            let tmean = rng.random_range(-30.0..45.0);
            let pressure = rng.random_range(60.0..105.0);
            let u2 = rng.random_range(0.0..15.0);
            let vpd = rng.random_range(0.0..5.0);
            let rn = rng.random_range(0.0..30.0);
            let et0 = penman_monteith(tmean, pressure, u2, vpd, rn);
            assert!(et0 >= 0.0 && et0.is_finite());
        }
    }
}
