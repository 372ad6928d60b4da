use std::f64::consts::PI;

/// Solar constant (MJ m-2 min-1).
pub const SOLAR_CONSTANT: f64 = 0.082;
/// Stefan-Boltzmann constant (MJ K-4 m-2 day-1).
pub const STEFAN_BOLTZMANN: f64 = 4.903e-9;
/// Albedo of the grass reference crop.
pub const ALBEDO: f64 = 0.23;

/// Extraterrestrial radiation (MJ m-2 day-1) at `latitude` degrees on day
/// of year `doy`. Zero through the polar night.
pub fn extraterrestrial_radiation(latitude: f64, doy: f64) -> f64 {
    let phi = latitude.to_radians();
    let ds = 0.4093 * (2. * PI * doy / 365. - 1.405).sin(); // solar declination (rad)
    let dr = 1. + 0.033 * (2. * PI * doy / 365.).cos(); // inverse relative distance Earth-Sun
    let omega = (-phi.tan() * ds.tan()).clamp(-1., 1.).acos(); // sunset hour angle (rad)
    let ra = 24. * 60. / PI
        * SOLAR_CONSTANT
        * dr
        * (omega * phi.sin() * ds.sin() + phi.cos() * ds.cos() * omega.sin());
    ra.max(0.)
}

/// Clear-sky radiation. Without an elevation the correction term vanishes.
pub fn clear_sky_radiation(ra: f64, elevation: Option<f64>) -> f64 {
    let z = elevation.unwrap_or(0.);
    ((0.75 + 2e-5 * z) * ra).max(0.1)
}

pub fn net_shortwave_radiation(rs: f64) -> f64 {
    (1. - ALBEDO) * rs
}

/// Net outgoing longwave radiation, negative when the surface loses energy.
pub fn net_longwave_radiation(tmin: f64, tmax: f64, ea: f64, rs: f64, rso: f64) -> f64 {
    let tk4 = ((tmax + 273.15).powi(4) + (tmin + 273.15).powi(4)) / 2.;
    let cloudiness = 1.35 * (rs / rso).min(1.) - 0.35;
    -STEFAN_BOLTZMANN * tk4 * (0.34 - 0.14 * ea.max(0.).sqrt()) * cloudiness
}

pub fn net_radiation(rs: f64, rso: f64, tmin: f64, tmax: f64, ea: f64) -> f64 {
    (net_shortwave_radiation(rs) + net_longwave_radiation(tmin, tmax, ea, rs, rso)).max(0.)
}
