//! Fixed-column climate input files read by AquaCrop.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use ndarray::ArrayView1;
use tracing::debug;

use crate::model::Error;

const AQUACROP_VERSION: &str = "7.0";
const CO2_FILE: &str = "MaunaLoa.CO2";

/// Kind of daily climate record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateRecord {
    Temperature,
    ReferenceEt,
    Rainfall,
}

impl ClimateRecord {
    pub fn extension(self) -> &'static str {
        match self {
            ClimateRecord::Temperature => "Tnx",
            ClimateRecord::ReferenceEt => "ETo",
            ClimateRecord::Rainfall => "PLU",
        }
    }

    fn column_title(self) -> &'static str {
        match self {
            ClimateRecord::Temperature => "  Tmin (C)   TMax (C)",
            ClimateRecord::ReferenceEt => "  Average ETo (mm/day)",
            ClimateRecord::Rainfall => "  Total Rain (mm)",
        }
    }

    fn n_columns(self) -> usize {
        match self {
            ClimateRecord::Temperature => 2,
            ClimateRecord::ReferenceEt | ClimateRecord::Rainfall => 1,
        }
    }
}

fn header_line(out: &mut String, value: &str, label: &str) {
    out.push_str(&format!("{:>5}  : {}\n", value, label));
}

/// Header block of a daily record file starting on `start`.
pub fn climate_header(description: &str, start: NaiveDate) -> String {
    let mut out = format!("{}\n", description);
    header_line(&mut out, "1", "Daily records");
    header_line(&mut out, &start.day().to_string(), "First day of record");
    header_line(&mut out, &start.month().to_string(), "First month of record");
    header_line(&mut out, &start.year().to_string(), "First year of record");
    out.push('\n');
    out
}

/// Full text of a record file, one row per day.
///
/// # Panics
///
/// If the number or lengths of `columns` do not match `record`.
pub fn format_record(
    record: ClimateRecord,
    description: &str,
    start: NaiveDate,
    columns: &[ArrayView1<'_, f64>],
) -> String {
    assert_eq!(
        columns.len(),
        record.n_columns(),
        "{} files have {} columns",
        record.extension(),
        record.n_columns()
    );
    let n_days = columns[0].len();
    assert!(columns.iter().all(|c| c.len() == n_days), "columns differ in length");

    let mut out = climate_header(description, start);
    out.push_str(record.column_title());
    out.push('\n');
    out.push_str("=======================\n");
    for t in 0..n_days {
        for column in columns {
            out.push_str(&format!("{:10.2}", column[t]));
        }
        out.push('\n');
    }
    out
}

/// Text of the `.CLI` descriptor naming the record files of `stem`.
pub fn format_climate_descriptor(description: &str, stem: &str) -> String {
    let mut out = format!("{}\n", description);
    header_line(&mut out, AQUACROP_VERSION, "AquaCrop Version");
    for record in [
        ClimateRecord::Temperature,
        ClimateRecord::ReferenceEt,
        ClimateRecord::Rainfall,
    ] {
        out.push_str(&format!("{}.{}\n", stem, record.extension()));
    }
    out.push_str(CO2_FILE);
    out.push('\n');
    out
}

/// Writes the climate files of one model point into a directory.
#[derive(Debug, Clone)]
pub struct AquaCropInputWriter {
    directory: PathBuf,
    description: String,
}

impl AquaCropInputWriter {
    pub fn new(
        directory: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> Result<Self, Error> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(AquaCropInputWriter {
            directory,
            description: description.into(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn write_text(&self, filename: &str, text: &str) -> Result<PathBuf, Error> {
        let path = self.directory.join(filename);
        let mut file = BufWriter::new(File::create(&path)?);
        file.write_all(text.as_bytes())?;
        file.flush()?;
        debug!(path = %path.display(), "written");
        Ok(path)
    }

    pub fn write_record(
        &self,
        stem: &str,
        record: ClimateRecord,
        start: NaiveDate,
        columns: &[ArrayView1<'_, f64>],
    ) -> Result<PathBuf, Error> {
        let text = format_record(record, &self.description, start, columns);
        self.write_text(&format!("{}.{}", stem, record.extension()), &text)
    }

    pub fn write_climate_descriptor(&self, stem: &str) -> Result<PathBuf, Error> {
        let text = format_climate_descriptor(&self.description, stem);
        self.write_text(&format!("{}.CLI", stem), &text)
    }

    /// All four climate files of one point.
    pub fn write_point(
        &self,
        stem: &str,
        start: NaiveDate,
        tmin: ArrayView1<'_, f64>,
        tmax: ArrayView1<'_, f64>,
        et0: ArrayView1<'_, f64>,
        prec: ArrayView1<'_, f64>,
    ) -> Result<Vec<PathBuf>, Error> {
        Ok(vec![
            self.write_record(stem, ClimateRecord::Temperature, start, &[tmin, tmax])?,
            self.write_record(stem, ClimateRecord::ReferenceEt, start, &[et0])?,
            self.write_record(stem, ClimateRecord::Rainfall, start, &[prec])?,
            self.write_climate_descriptor(stem)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 3, 7).unwrap()
    }

    #[test]
    fn header_block() {
        let header = climate_header("Test site", start());
        assert_eq!(
            header,
            "Test site\n    1  : Daily records\n    7  : First day of record\n    3  : First month of record\n 2010  : First year of record\n\n"
        );
    }

    #[test]
    fn evapotranspiration_record() {
        let et0 = array![3.456, 0.0, 12.5];
        let text = format_record(ClimateRecord::ReferenceEt, "d", start(), &[et0.view()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[6], "  Average ETo (mm/day)");
        assert_eq!(lines[7], "=======================");
        assert_eq!(&lines[8..], &["      3.46", "      0.00", "     12.50"]);
    }

    #[test]
    fn temperature_record_has_two_columns() {
        let tmin = array![-1.0, 2.0];
        let tmax = array![10.0, 21.25];
        let text = format_record(
            ClimateRecord::Temperature,
            "d",
            start(),
            &[tmin.view(), tmax.view()],
        );
        assert!(text.ends_with("     -1.00     10.00\n      2.00     21.25\n"));
    }

    #[test]
    #[should_panic(expected = "columns")]
    fn wrong_column_count() {
        let x = array![1.0];
        format_record(ClimateRecord::Temperature, "d", start(), &[x.view()]);
    }

    #[test]
    fn point_files_on_disk() {
        let dir = TempDir::new().unwrap();
        let writer = AquaCropInputWriter::new(dir.path().join("out"), "Site A").unwrap();
        let v = array![1.0, 2.0];
        let paths = writer
            .write_point("point_000001", start(), v.view(), v.view(), v.view(), v.view())
            .unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));

        let cli = fs::read_to_string(dir.path().join("out/point_000001.CLI")).unwrap();
        assert_eq!(
            cli,
            "Site A\n  7.0  : AquaCrop Version\npoint_000001.Tnx\npoint_000001.ETo\npoint_000001.PLU\nMaunaLoa.CO2\n"
        );
    }
}
