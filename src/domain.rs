use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::dataset::{Dataset, Field, Geometry, Layout};
use crate::model::Error;

/// Identifier of a model point, used to name its output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointId {
    /// Position along the flat spatial dimension of an unstructured domain.
    Flat(usize),
    /// Column and row within a gridded domain.
    Cell { x: usize, y: usize },
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Flat(i) => write!(f, "{:06}", i),
            PointId::Cell { x, y } => write!(f, "x{:04}_y{:04}", x, y),
        }
    }
}

/// The set of spatial points the model runs on, flattened to one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    lat: Vec<f64>,
    lon: Vec<f64>,
    ids: Vec<PointId>,
}

impl Domain {
    /// Explicit point list, numbered from 1.
    pub fn from_points(lon: Vec<f64>, lat: Vec<f64>) -> Result<Self, Error> {
        if lon.len() != lat.len() {
            return Err(Error::InvalidConfig(format!(
                "{} longitudes but {} latitudes",
                lon.len(),
                lat.len()
            )));
        }
        let ids = (1..=lat.len()).map(PointId::Flat).collect();
        Self::checked(lat, lon, ids)
    }

    /// Cells of a regular grid where `mask` (row-major over `lat` x `lon`)
    /// is positive.
    pub fn from_grid(lon: &[f64], lat: &[f64], mask: &[f64]) -> Result<Self, Error> {
        if mask.len() != lat.len() * lon.len() {
            return Err(Error::InvalidConfig(format!(
                "mask has {} cells, grid has {}",
                mask.len(),
                lat.len() * lon.len()
            )));
        }
        let mut d_lat = Vec::new();
        let mut d_lon = Vec::new();
        let mut ids = Vec::new();
        for (y, &la) in lat.iter().enumerate() {
            for (x, &lo) in lon.iter().enumerate() {
                if mask[y * lon.len() + x] > 0.0 {
                    d_lat.push(la);
                    d_lon.push(lo);
                    ids.push(PointId::Cell { x, y });
                }
            }
        }
        Self::checked(d_lat, d_lon, ids)
    }

    /// Domain described by a mask variable in a dataset file. Points of a
    /// one-dimensional file are numbered from 1 by their position along
    /// the point dimension, as for an explicit point list.
    pub fn from_dataset(
        path: &Path,
        mask_varname: &str,
        layout: Layout<'_>,
    ) -> Result<Self, Error> {
        let dataset = Dataset::open(path, mask_varname)?;
        let field = Field::extract(&dataset, path, mask_varname, layout)?;
        let mask = field.values.row(0).to_vec();
        let domain = match field.geometry {
            Geometry::Grid { lat, lon } => Self::from_grid(&lon, &lat, &mask)?,
            Geometry::Points { lat, lon } => {
                let keep: Vec<usize> =
                    (0..mask.len()).filter(|&i| mask[i] > 0.0).collect();
                Self::checked(
                    keep.iter().map(|&i| lat[i]).collect(),
                    keep.iter().map(|&i| lon[i]).collect(),
                    keep.iter().map(|&i| PointId::Flat(i + 1)).collect(),
                )?
            }
        };
        debug!(
            path = %path.display(),
            n_points = domain.nxy(),
            "loaded model domain"
        );
        Ok(domain)
    }

    fn checked(lat: Vec<f64>, lon: Vec<f64>, ids: Vec<PointId>) -> Result<Self, Error> {
        if lat.is_empty() {
            return Err(Error::InvalidConfig(String::from(
                "model domain contains no points",
            )));
        }
        if let Some(bad) = lat.iter().find(|l| !(-90.0..=90.0).contains(*l)) {
            return Err(Error::InvalidConfig(format!(
                "latitude {} is outside [-90, 90]",
                bad
            )));
        }
        Ok(Domain { lat, lon, ids })
    }

    pub fn nxy(&self) -> usize {
        self.lat.len()
    }

    pub fn latitude(&self) -> &[f64] {
        &self.lat
    }

    pub fn longitude(&self) -> &[f64] {
        &self.lon
    }

    pub fn ids(&self) -> &[PointId] {
        &self.ids
    }
}
