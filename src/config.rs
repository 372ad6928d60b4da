//! Typed run configuration read from TOML.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::dataset::Layout;
use crate::domain::Domain;
use crate::model::Error;
use crate::pet::resolve::VapourPressurePolicy;
use crate::quantity::{CapabilityFlags, QuantityName};
use crate::time::ModelTime;
use crate::units::Unit;

const REQUIRED_WEATHER: [QuantityName; 3] =
    [QuantityName::Tmin, QuantityName::Tmax, QuantityName::Prec];

const OPTIONAL_WEATHER: [QuantityName; 12] = [
    QuantityName::Tdew,
    QuantityName::RhMax,
    QuantityName::RhMin,
    QuantityName::RhMean,
    QuantityName::Sh,
    QuantityName::SwDown,
    QuantityName::LwDown,
    QuantityName::Wind,
    QuantityName::WindU,
    QuantityName::WindV,
    QuantityName::Sp,
    QuantityName::Elev,
];

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "MODEL_GRID")]
    model_grid: Option<RawGrid>,
    #[serde(rename = "MODEL_TIME")]
    model_time: Option<RawTime>,
    #[serde(rename = "ET0")]
    et0: Option<toml::Table>,
    #[serde(rename = "OUTPUT")]
    output: Option<RawOutput>,
    #[serde(flatten)]
    sections: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawGrid {
    filename: Option<String>,
    mask_varname: Option<String>,
    is_1d: Option<bool>,
    xy_dimname: Option<String>,
    x: Option<Vec<f64>>,
    y: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    start_time: Option<String>,
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWeather {
    #[serde(rename = "use")]
    enabled: Option<bool>,
    filename: Option<String>,
    varname: Option<String>,
    is_1d: Option<bool>,
    xy_dimname: Option<String>,
    factor: Option<f64>,
    offset: Option<f64>,
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEt0Options {
    preprocess: Option<bool>,
    method: Option<String>,
    wind_height: Option<f64>,
    #[serde(default)]
    vapour_pressure_policy: VapourPressurePolicy,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    directory: Option<String>,
    prefix: Option<String>,
    description: Option<String>,
}

/// Where one weather variable is read from and how it is calibrated.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherConfig {
    /// Directory searched for matching files.
    pub directory: PathBuf,
    /// Regular expression matched against file names in `directory`.
    pub pattern: String,
    pub varname: String,
    pub is_1d: bool,
    pub xy_dimname: Option<String>,
    pub factor: f64,
    pub offset: f64,
    /// Unit of the stored values, overriding the file's own attribute.
    pub units: Option<Unit>,
}

impl WeatherConfig {
    pub fn layout(&self) -> Layout<'_> {
        Layout {
            is_1d: self.is_1d,
            xy_dimname: self.xy_dimname.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridSource {
    File {
        path: PathBuf,
        mask_varname: String,
        is_1d: bool,
        xy_dimname: Option<String>,
    },
    Points {
        x: Vec<f64>,
        y: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Et0Config {
    pub preprocess: bool,
    pub method: Option<String>,
    /// Height above ground of the wind measurements, in metres.
    pub wind_height: f64,
    pub vapour_pressure_policy: VapourPressurePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub root: PathBuf,
    pub model_grid: GridSource,
    pub model_time: ModelTime,
    pub et0: Et0Config,
    pub output: OutputConfig,
    weather: BTreeMap<QuantityName, WeatherConfig>,
}

impl Configuration {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_toml_str(&text, &root)
    }

    /// Parse configuration text; relative paths are taken from `root`.
    pub fn from_toml_str(text: &str, root: &Path) -> Result<Self, Error> {
        let raw: RawConfig = toml::from_str(text)?;

        let model_grid = parse_grid(
            raw.model_grid
                .ok_or_else(|| missing_section("MODEL_GRID"))?,
            root,
        )?;
        let time = raw
            .model_time
            .ok_or_else(|| missing_section("MODEL_TIME"))?;
        let model_time = ModelTime::parse_daily(
            &time.start_time.ok_or_else(|| missing_entry("MODEL_TIME", "start_time"))?,
            &time.end_time.ok_or_else(|| missing_entry("MODEL_TIME", "end_time"))?,
        )?;

        let mut weather = BTreeMap::new();
        for name in REQUIRED_WEATHER {
            let section = raw
                .sections
                .get(name.key())
                .ok_or_else(|| missing_section(name.key()))?;
            weather.insert(name, parse_weather(name.key(), section.clone(), root)?);
        }
        for name in OPTIONAL_WEATHER {
            let Some(section) = raw.sections.get(name.key()) else {
                continue;
            };
            let enabled = section
                .get("use")
                .map(|v| {
                    v.as_bool().ok_or_else(|| {
                        Error::InvalidConfig(format!(
                            "`{}.use` must be a boolean",
                            name.key()
                        ))
                    })
                })
                .transpose()?
                .unwrap_or(false);
            if enabled {
                weather.insert(name, parse_weather(name.key(), section.clone(), root)?);
            }
        }
        for key in raw.sections.keys() {
            if !weather.keys().any(|n| n.key() == key) {
                debug!(section = %key, "ignoring configuration section");
            }
        }

        let et0_table = raw.et0.ok_or_else(|| missing_section("ET0"))?;
        let options: RawEt0Options = toml::Value::Table(et0_table.clone()).try_into()?;
        let preprocess = options
            .preprocess
            .ok_or_else(|| missing_entry("ET0", "preprocess"))?;
        if preprocess && options.method.is_none() {
            return Err(Error::InvalidConfig(String::from(
                "`ET0` section must have `method` if `preprocess` is true",
            )));
        }
        if !preprocess {
            weather.insert(
                QuantityName::Et0,
                parse_weather("ET0", toml::Value::Table(et0_table), root)?,
            );
        }
        let wind_height = options.wind_height.unwrap_or(10.0);
        // The logarithmic wind profile is undefined at or below this height.
        let min_height = (1.0 + 5.42) / 67.8;
        if wind_height <= min_height {
            return Err(Error::InvalidConfig(format!(
                "`ET0.wind_height` must be above {:.3} m (got {})",
                min_height, wind_height
            )));
        }
        let et0 = Et0Config {
            preprocess,
            method: options.method,
            wind_height,
            vapour_pressure_policy: options.vapour_pressure_policy,
        };

        let raw_output = raw.output.unwrap_or_default();
        let output = OutputConfig {
            directory: root.join(
                raw_output
                    .directory
                    .as_deref()
                    .unwrap_or("aquacrop_input"),
            ),
            prefix: raw_output.prefix.unwrap_or_else(|| String::from("point")),
            description: raw_output
                .description
                .unwrap_or_else(|| String::from("AquaCrop climate input")),
        };

        Ok(Configuration {
            root: root.to_path_buf(),
            model_grid,
            model_time,
            et0,
            output,
            weather,
        })
    }

    /// Availability of every quantity, fixed for the lifetime of the run.
    pub fn capabilities(&self) -> CapabilityFlags {
        CapabilityFlags::new(self.weather.keys().copied())
    }

    pub fn weather(&self, name: QuantityName) -> Option<&WeatherConfig> {
        self.weather.get(&name)
    }

    pub fn weather_configs(&self) -> &BTreeMap<QuantityName, WeatherConfig> {
        &self.weather
    }

    pub fn domain(&self) -> Result<Domain, Error> {
        match &self.model_grid {
            GridSource::File {
                path,
                mask_varname,
                is_1d,
                xy_dimname,
            } => Domain::from_dataset(
                path,
                mask_varname,
                Layout {
                    is_1d: *is_1d,
                    xy_dimname: xy_dimname.as_deref(),
                },
            ),
            GridSource::Points { x, y } => Domain::from_points(x.clone(), y.clone()),
        }
    }
}

fn missing_section(section: &str) -> Error {
    Error::InvalidConfig(format!("configuration has no `{}` section", section))
}

fn missing_entry(section: &str, entry: &str) -> Error {
    Error::InvalidConfig(format!("`{}` section must have `{}`", section, entry))
}

fn parse_grid(raw: RawGrid, root: &Path) -> Result<GridSource, Error> {
    if let (Some(x), Some(y)) = (&raw.x, &raw.y) {
        return Ok(GridSource::Points {
            x: x.clone(),
            y: y.clone(),
        });
    }
    let filename = raw
        .filename
        .ok_or_else(|| missing_entry("MODEL_GRID", "filename"))?;
    let mask_varname = raw
        .mask_varname
        .ok_or_else(|| missing_entry("MODEL_GRID", "mask_varname"))?;
    let is_1d = raw.is_1d.ok_or_else(|| missing_entry("MODEL_GRID", "is_1d"))?;
    if is_1d && raw.xy_dimname.is_none() {
        return Err(Error::InvalidConfig(String::from(
            "`MODEL_GRID` section must have `xy_dimname` if `is_1d` is true",
        )));
    }
    Ok(GridSource::File {
        path: root.join(filename),
        mask_varname,
        is_1d,
        xy_dimname: raw.xy_dimname,
    })
}

fn parse_weather(section: &str, value: toml::Value, root: &Path) -> Result<WeatherConfig, Error> {
    let raw: RawWeather = value.try_into()?;
    let filename = raw
        .filename
        .ok_or_else(|| missing_entry(section, "filename"))?;
    let varname = raw
        .varname
        .ok_or_else(|| missing_entry(section, "varname"))?;
    let is_1d = raw.is_1d.ok_or_else(|| missing_entry(section, "is_1d"))?;
    if is_1d && raw.xy_dimname.is_none() {
        return Err(Error::InvalidConfig(format!(
            "`{}` section must have `xy_dimname` if `is_1d` is true",
            section
        )));
    }
    let units = raw.units.as_deref().map(str::parse::<Unit>).transpose()?;
    if raw.enabled == Some(false) {
        debug!(section, "section parsed although `use` is false");
    }

    // The pattern applies to file names only; any directory part is fixed.
    let full = Path::new(&filename);
    let pattern = full
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::InvalidConfig(format!("`{}.filename` has no file name part", section))
        })?;
    let directory = root.join(full.parent().unwrap_or_else(|| Path::new("")));

    Ok(WeatherConfig {
        directory,
        pattern,
        varname,
        is_1d,
        xy_dimname: raw.xy_dimname,
        factor: raw.factor.unwrap_or(1.0),
        offset: raw.offset.unwrap_or(0.0),
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [MODEL_GRID]
        x = [0.0, 1.0]
        y = [10.0, 11.0]

        [MODEL_TIME]
        start_time = "2010-01-01"
        end_time = "2010-01-10"

        [TMIN]
        filename = "data/tmin_.*\\.json"
        varname = "t2m_min"
        is_1d = false
        units = "K"

        [TMAX]
        filename = "tmax.json"
        varname = "t2m_max"
        is_1d = false
        factor = 2.0
        offset = -1.0

        [PREC]
        filename = "prec.json"
        varname = "tp"
        is_1d = true
        xy_dimname = "station"

        [TDEW]
        use = true
        filename = "tdew.json"
        varname = "d2m"
        is_1d = false

        [RHMAX]
        use = false

        [ET0]
        preprocess = true
        method = "PenmanMonteith"
    "#;

    #[test]
    fn minimal_configuration() {
        let config = Configuration::from_toml_str(MINIMAL, Path::new("/cfg")).unwrap();
        assert_eq!(config.model_time.len(), 10);

        let tmin = config.weather(QuantityName::Tmin).unwrap();
        assert_eq!(tmin.directory, PathBuf::from("/cfg/data"));
        assert_eq!(tmin.pattern, "tmin_.*\\.json");
        assert_eq!(tmin.units, Some(Unit::Kelvin));
        assert_eq!(tmin.factor, 1.0);

        let tmax = config.weather(QuantityName::Tmax).unwrap();
        assert_eq!((tmax.factor, tmax.offset), (2.0, -1.0));

        let flags = config.capabilities();
        assert!(flags.has(QuantityName::Tdew));
        assert!(!flags.has(QuantityName::RhMax));
        assert!(!flags.has(QuantityName::Et0));

        assert_eq!(config.et0.wind_height, 10.0);
        assert_eq!(
            config.et0.vapour_pressure_policy,
            VapourPressurePolicy::PreferDewpoint
        );
        assert_eq!(config.output.directory, PathBuf::from("/cfg/aquacrop_input"));
        assert_eq!(config.domain().unwrap().nxy(), 2);
    }

    #[test]
    fn file_supplied_et0_is_a_weather_source() {
        let text = MINIMAL.replace(
            "preprocess = true\n        method = \"PenmanMonteith\"",
            "preprocess = false\n        filename = \"et0.json\"\n        varname = \"pet\"\n        is_1d = false",
        );
        let config = Configuration::from_toml_str(&text, Path::new("")).unwrap();
        assert!(config.capabilities().has(QuantityName::Et0));
        assert_eq!(config.weather(QuantityName::Et0).unwrap().varname, "pet");
    }

    #[test]
    fn method_required_when_preprocessing() {
        let text = MINIMAL.replace("method = \"PenmanMonteith\"", "");
        let err = Configuration::from_toml_str(&text, Path::new("")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn xy_dimname_required_for_1d() {
        let text = MINIMAL.replace("xy_dimname = \"station\"", "");
        let err = Configuration::from_toml_str(&text, Path::new("")).unwrap_err();
        assert!(err.to_string().contains("xy_dimname"));
    }

    #[test]
    fn required_section_missing() {
        let text = MINIMAL.replace("[PREC]", "[PRECIP]");
        let err = Configuration::from_toml_str(&text, Path::new("")).unwrap_err();
        assert!(err.to_string().contains("PREC"));
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let text = MINIMAL.replace("units = \"K\"", "units = \"furlongs\"");
        assert!(matches!(
            Configuration::from_toml_str(&text, Path::new("")),
            Err(Error::UnknownUnit(_))
        ));
    }

    #[test]
    fn legacy_vapour_policy() {
        let text = MINIMAL.replace(
            "preprocess = true",
            "preprocess = true\n        vapour_pressure_policy = \"last_applicable\"",
        );
        let config = Configuration::from_toml_str(&text, Path::new("")).unwrap();
        assert_eq!(
            config.et0.vapour_pressure_policy,
            VapourPressurePolicy::LastApplicable
        );
    }
}
