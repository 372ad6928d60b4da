use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use aquacrop_rs::pet::resolve::Et0Plan;
use aquacrop_rs::{Error, Model, QuantityName};
use serde_json::json;
use tempfile::TempDir;

const DATES: [&str; 3] = ["2010-06-29", "2010-06-30", "2010-07-01"];
const LAT: [f64; 2] = [10.0, 10.5];
const LON: [f64; 2] = [0.0, 0.5];

/// Write a `[time, lat, lon]` variable filled from `value(t, cell)`.
fn write_grid(
    dir: &Path,
    filename: &str,
    varname: &str,
    units: Option<&str>,
    dates: &[&str],
    value: impl Fn(usize, usize) -> f64,
) {
    let n_cells = LAT.len() * LON.len();
    let data: Vec<f64> = (0..dates.len())
        .flat_map(|t| (0..n_cells).map(move |c| (t, c)))
        .map(|(t, c)| value(t, c))
        .collect();
    let mut variable = json!({"dims": ["time", "lat", "lon"], "data": data});
    if let Some(units) = units {
        variable["units"] = json!(units);
    }
    let doc = json!({
        "dims": {"time": dates.len(), "lat": LAT.len(), "lon": LON.len()},
        "coords": {
            "time": {"dims": ["time"], "values": dates},
            "lat": {"dims": ["lat"], "values": LAT},
            "lon": {"dims": ["lon"], "values": LON},
        },
        "variables": {varname: variable},
    });
    fs::write(dir.join(filename), serde_json::to_string_pretty(&doc).unwrap()).unwrap();
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let text = format!(
        r#"
[MODEL_GRID]
filename = "domain.json"
mask_varname = "mask"
is_1d = false

[MODEL_TIME]
start_time = "2010-06-29"
end_time = "2010-07-01"

[TMIN]
filename = "data/tmin.*\\.json"
varname = "t2m_min"
is_1d = false

[TMAX]
filename = "data/tmax\\.json"
varname = "t2m_max"
is_1d = false

[PREC]
filename = "data/prec\\.json"
varname = "tp"
is_1d = false
units = "m day-1"

[OUTPUT]
directory = "out"
prefix = "site"
description = "Integration test"

{body}
"#
    );
    fs::write(&path, text).unwrap();
    path
}

fn write_domain(dir: &Path) {
    let doc = json!({
        "dims": {"lat": 2, "lon": 2},
        "coords": {
            "lat": {"dims": ["lat"], "values": LAT},
            "lon": {"dims": ["lon"], "values": LON},
        },
        "variables": {"mask": {"dims": ["lat", "lon"], "data": [1, 0, 1, 1]}},
    });
    fs::write(dir.join("domain.json"), doc.to_string()).unwrap();
}

/// Temperatures in Kelvin split over two files, precipitation in m/day.
fn write_common(dir: &Path) {
    let data = dir.join("data");
    fs::create_dir_all(&data).unwrap();
    write_domain(dir);
    write_grid(&data, "tmin_b.json", "t2m_min", Some("K"), &DATES[1..], |_, _| 288.15);
    write_grid(&data, "tmin_a.json", "t2m_min", Some("K"), &DATES[..1], |_, _| 287.15);
    write_grid(&data, "tmax.json", "t2m_max", Some("K"), &DATES, |_, _| 298.15);
    write_grid(&data, "prec.json", "tp", None, &DATES, |t, _| 0.001 * t as f64);
}

#[test]
fn file_supplied_et0_is_calibrated_and_passed_through() {
    let dir = TempDir::new().unwrap();
    write_common(dir.path());
    write_grid(
        &dir.path().join("data"),
        "pet.json",
        "pet",
        Some("mm day-1"),
        &DATES,
        |t, c| (t * 10 + c) as f64,
    );
    let config = write_config(
        dir.path(),
        r#"
[ET0]
preprocess = false
filename = 'data/pet\.json'
varname = "pet"
is_1d = false
factor = 2.0
offset = 0.5
"#,
    );

    let model = Model::from_config_file(&config).unwrap();
    assert_eq!(model.plan(), &Et0Plan::FromFile);
    assert_eq!(model.domain().nxy(), 3);

    let output = model.run().unwrap();
    let et0 = output.et0.values();
    assert_eq!(et0.dim(), (3, 3));
    // domain points are cells 0, 2 and 3 of the source grid
    for (p, cell) in [0usize, 2, 3].into_iter().enumerate() {
        for t in 0..3 {
            assert_abs_diff_eq!(et0[[t, p]], (t * 10 + cell) as f64 * 2.0 + 0.5);
        }
    }

    // the two TMIN files were joined in date order and converted to degC
    let tmin = output.inputs.require(QuantityName::Tmin);
    assert_abs_diff_eq!(tmin[[0, 0]], 14.0, epsilon = 1e-9);
    assert_abs_diff_eq!(tmin[[2, 0]], 15.0, epsilon = 1e-9);
    // precipitation converted from m/day
    let prec = output.inputs.require(QuantityName::Prec);
    assert_abs_diff_eq!(prec[[2, 1]], 2.0, epsilon = 1e-9);
}

#[test]
fn penman_monteith_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_common(dir.path());
    let data = dir.path().join("data");
    write_grid(&data, "rh.json", "rhmin", Some("1"), &DATES, |_, _| 0.4);
    write_grid(&data, "rhmax.json", "rhmax", Some("%"), &DATES, |_, _| 80.0);
    write_grid(&data, "ssrd.json", "ssrd", Some("W m-2"), &DATES, |_, _| 20.0 / 0.0864);
    write_grid(&data, "u10.json", "u10", Some("m s-1"), &DATES, |_, _| 1.2);
    write_grid(&data, "v10.json", "v10", Some("m s-1"), &DATES, |_, _| 1.6);
    write_grid(&data, "sp.json", "sp", Some("Pa"), &DATES, |_, _| 101300.0);
    let config = write_config(
        dir.path(),
        r#"
[ET0]
preprocess = true
method = "PenmanMonteith"
wind_height = 10.0

[RHMIN]
use = true
filename = 'data/rh\.json'
varname = "rhmin"
is_1d = false

[RHMAX]
use = true
filename = 'data/rhmax\.json'
varname = "rhmax"
is_1d = false

[SWDOWN]
use = true
filename = 'data/ssrd\.json'
varname = "ssrd"
is_1d = false

[WIND_U]
use = true
filename = 'data/u10\.json'
varname = "u10"
is_1d = false

[WIND_V]
use = true
filename = 'data/v10\.json'
varname = "v10"
is_1d = false

[SP]
use = true
filename = 'data/sp\.json'
varname = "sp"
is_1d = false
"#,
    );

    let model = Model::from_config_file(&config).unwrap();
    assert!(matches!(model.plan(), Et0Plan::PenmanMonteith(_)));

    let output = model.run().unwrap();
    for &et0 in output.et0.values().iter() {
        assert!((2.0..=8.0).contains(&et0), "et0 = {et0}");
    }

    let written = model.write_aquacrop_input(&output, None).unwrap();
    assert_eq!(written.len(), 3 * 4);
    let eto = fs::read_to_string(dir.path().join("out/site_x0000_y0000.ETo")).unwrap();
    let lines: Vec<&str> = eto.lines().collect();
    assert_eq!(lines[0], "Integration test");
    assert_eq!(lines[2], "   29  : First day of record");
    assert_eq!(lines[3], "    6  : First month of record");
    assert_eq!(lines.len(), 8 + 3);
    assert!(dir.path().join("out/site_x0001_y0001.CLI").exists());
}

#[test]
fn temperature_only_cannot_compute_penman_monteith() {
    let dir = TempDir::new().unwrap();
    write_common(dir.path());
    let config = write_config(
        dir.path(),
        r#"
[ET0]
preprocess = true
method = "penmanmonteith"
"#,
    );
    let err = Model::from_config_file(&config).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, Error::InsufficientData { .. }));
    assert!(message.contains("SWDOWN"));
    assert!(message.contains("SP or ELEV"));
    // each vapour pressure method reports its own missing inputs
    assert!(message.contains("FromDewpoint (missing TDEW)"));
    assert!(message.contains("FromMeanRelativeHumidity (missing RHMEAN)"));
    assert!(message.contains("FromSpecificHumidity (missing SH, SP or ELEV)"));
}

#[test]
fn unknown_method_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_common(dir.path());
    let config = write_config(
        dir.path(),
        r#"
[ET0]
preprocess = true
method = "Blaney-Criddle"
"#,
    );
    assert!(matches!(
        Model::from_config_file(&config),
        Err(Error::InvalidMethod(_))
    ));
}

#[test]
fn incompatible_unit_fails_the_load() {
    let dir = TempDir::new().unwrap();
    write_common(dir.path());
    write_grid(&dir.path().join("data"), "pet.json", "pet", Some("W m-2"), &DATES, |_, _| 1.0);
    let config = write_config(
        dir.path(),
        r#"
[ET0]
preprocess = false
filename = 'data/pet\.json'
varname = "pet"
is_1d = false
"#,
    );
    let model = Model::from_config_file(&config).unwrap();
    assert!(matches!(model.run(), Err(Error::UnitMismatch { .. })));
}

#[test]
fn missing_files_and_variables() {
    let dir = TempDir::new().unwrap();
    write_common(dir.path());
    write_grid(&dir.path().join("data"), "pet.json", "evap", None, &DATES, |_, _| 1.0);
    let config = write_config(
        dir.path(),
        r#"
[ET0]
preprocess = false
filename = 'data/pet\.json'
varname = "pet"
is_1d = false
"#,
    );
    let model = Model::from_config_file(&config).unwrap();
    assert!(matches!(model.run(), Err(Error::VariableNotFound { .. })));

    fs::remove_file(dir.path().join("data/pet.json")).unwrap();
    assert!(matches!(model.run(), Err(Error::DataNotFound { .. })));
}
