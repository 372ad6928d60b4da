//! Nearest-neighbour alignment of source fields to the model's points and
//! days. No interpolation: every target takes the value of its closest
//! source cell and closest source date.

use chrono::NaiveDate;
use ndarray::Array2;
use tracing::warn;

use crate::dataset::{Field, Geometry};
use crate::domain::Domain;

/// Index of the value in `axis` closest to `target`. Ties go to the first.
pub fn nearest_index(axis: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &v) in axis.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

fn within(axis: &[f64], target: f64, tolerance: f64) -> bool {
    let lo = axis.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = axis.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    target >= lo - tolerance && target <= hi + tolerance
}

/// Half the largest gap between consecutive sorted coordinates: a target
/// this close to the covered range still has a legitimate nearest cell.
fn half_spacing(axis: &[f64]) -> f64 {
    let mut sorted = axis.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
        .windows(2)
        .map(|w| (w[1] - w[0]) / 2.0)
        .fold(0.0, f64::max)
}

/// Source cell for each model point, plus the number of points lying
/// outside the source's coverage.
pub fn nearest_cells(geometry: &Geometry, domain: &Domain) -> (Vec<usize>, usize) {
    let targets = domain.latitude().iter().zip(domain.longitude());
    match geometry {
        Geometry::Grid { lat, lon } => {
            let (tol_y, tol_x) = (half_spacing(lat), half_spacing(lon));
            let mut outside = 0;
            let cells = targets
                .map(|(&la, &lo)| {
                    if !within(lat, la, tol_y) || !within(lon, lo, tol_x) {
                        outside += 1;
                    }
                    nearest_index(lat, la) * lon.len() + nearest_index(lon, lo)
                })
                .collect();
            (cells, outside)
        }
        Geometry::Points { lat, lon } => {
            let radius = station_radius(lat, lon);
            let mut outside = 0;
            let cells = targets
                .map(|(&la, &lo)| {
                    let (best, distance) = nearest_station(lat, lon, la, lo);
                    if distance > radius {
                        outside += 1;
                    }
                    best
                })
                .collect();
            (cells, outside)
        }
    }
}

/// Closest station to `(la, lo)` and its distance in degrees. Ties go to
/// the first.
fn nearest_station(lat: &[f64], lon: &[f64], la: f64, lo: f64) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, (&sy, &sx)) in lat.iter().zip(lon).enumerate() {
        let dist = (sy - la).hypot(sx - lo);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    (best, best_dist)
}

/// Distance within which a station covers a target: half the diagonal of
/// the median spacing between neighbouring stations. A lone station only
/// covers its own position.
fn station_radius(lat: &[f64], lon: &[f64]) -> f64 {
    let mut spacing: Vec<f64> = (0..lat.len())
        .map(|i| {
            (0..lat.len())
                .filter(|&j| j != i)
                .map(|j| (lat[j] - lat[i]).hypot(lon[j] - lon[i]))
                .fold(f64::INFINITY, f64::min)
        })
        .filter(|d| d.is_finite())
        .collect();
    if spacing.is_empty() {
        return 1e-9;
    }
    spacing.sort_by(f64::total_cmp);
    spacing[spacing.len() / 2] * std::f64::consts::FRAC_1_SQRT_2
}

/// Source row for each model day, plus the number of days outside the
/// source's time range.
pub fn nearest_times(source: &[NaiveDate], target: &[NaiveDate]) -> (Vec<usize>, usize) {
    let (Some(first), Some(last)) = (source.first(), source.last()) else {
        return (vec![0; target.len()], target.len());
    };
    let mut outside = 0;
    let rows = target
        .iter()
        .map(|day| {
            if day < first || day > last {
                outside += 1;
            }
            let mut best = 0;
            let mut best_dist = i64::MAX;
            for (i, s) in source.iter().enumerate() {
                let dist = (*s - *day).num_days().abs();
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }
            best
        })
        .collect();
    (rows, outside)
}

/// Align `field` to `[target_times.len(), domain.nxy()]`. Static fields are
/// broadcast along time.
pub fn select(field: &Field, domain: &Domain, target_times: &[NaiveDate]) -> Array2<f64> {
    let (cells, outside_space) = nearest_cells(&field.geometry, domain);
    if outside_space > 0 {
        warn!(
            source = %field.source.display(),
            n_points = outside_space,
            "model points outside source coverage, using nearest boundary cell"
        );
    }

    let rows = match &field.times {
        Some(times) => {
            let (rows, outside_time) = nearest_times(times, target_times);
            if outside_time > 0 {
                warn!(
                    source = %field.source.display(),
                    n_days = outside_time,
                    "model days outside source time range, using nearest date"
                );
            }
            rows
        }
        None => vec![0; target_times.len()],
    };

    Array2::from_shape_fn((rows.len(), cells.len()), |(t, p)| {
        field.values[[rows[t], cells[p]]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 1, d).unwrap()
    }

    fn grid_field() -> Field {
        // lat descending, as in most reanalysis products
        Field {
            times: Some(vec![day(1), day(2)]),
            geometry: Geometry::Grid {
                lat: vec![11.0, 10.0],
                lon: vec![0.0, 1.0, 2.0],
            },
            values: Array2::from_shape_vec(
                (2, 6),
                (0..12).map(f64::from).collect(),
            )
            .unwrap(),
            units: None,
            source: PathBuf::from("grid.json"),
        }
    }

    #[test]
    fn nearest_index_ties_go_first() {
        assert_eq!(nearest_index(&[0.0, 1.0], 0.5), 0);
        assert_eq!(nearest_index(&[3.0, 2.0, 1.0], 1.2), 2);
    }

    #[test]
    fn grid_selection() {
        let domain = Domain::from_points(vec![1.9, 0.1], vec![10.2, 10.9]).unwrap();
        let out = select(&grid_field(), &domain, &[day(2), day(1)]);
        // point 0 -> (lat 10, lon 2) = cell 5, point 1 -> (lat 11, lon 0) = cell 0
        assert_eq!(out, ndarray::array![[11.0, 6.0], [5.0, 0.0]]);
    }

    #[test]
    fn selection_is_deterministic_inside_bounds() {
        let field = grid_field();
        let domain = Domain::from_points(vec![0.4, 1.6], vec![10.4, 10.6]).unwrap();
        let first = nearest_cells(&field.geometry, &domain);
        for _ in 0..10 {
            assert_eq!(nearest_cells(&field.geometry, &domain), first);
        }
        assert_eq!(first.1, 0);
    }

    #[test]
    fn outside_coverage_is_counted_not_fatal() {
        let field = grid_field();
        let domain = Domain::from_points(vec![25.0], vec![-30.0]).unwrap();
        let (cells, outside) = nearest_cells(&field.geometry, &domain);
        assert_eq!(cells, vec![5]);
        assert_eq!(outside, 1);

        let (rows, outside) = nearest_times(&[day(1), day(2)], &[day(2), day(20)]);
        assert_eq!(rows, vec![1, 1]);
        assert_eq!(outside, 1);
    }

    #[test]
    fn sparse_stations_report_distant_points() {
        // a dense cluster near the origin and one far station; the point
        // at (5, 5) sits inside the bounding box but far from every station
        let geometry = Geometry::Points {
            lat: vec![0.0, 0.0, 1.0, 1.0, 10.0],
            lon: vec![0.0, 1.0, 0.0, 1.0, 10.0],
        };
        let domain = Domain::from_points(vec![0.4, 5.0, 10.2], vec![0.4, 5.0, 10.1]).unwrap();
        let (cells, outside) = nearest_cells(&geometry, &domain);
        assert_eq!(cells, vec![0, 3, 4]);
        assert_eq!(outside, 1);
    }

    #[test]
    fn lone_station_covers_only_itself() {
        let geometry = Geometry::Points {
            lat: vec![45.0],
            lon: vec![7.0],
        };
        let here = Domain::from_points(vec![7.0], vec![45.0]).unwrap();
        assert_eq!(nearest_cells(&geometry, &here), (vec![0], 0));
        let elsewhere = Domain::from_points(vec![7.5], vec![45.0]).unwrap();
        assert_eq!(nearest_cells(&geometry, &elsewhere), (vec![0], 1));
    }

    #[test]
    fn static_field_broadcasts() {
        let field = Field {
            times: None,
            geometry: Geometry::Points {
                lat: vec![0.0, 5.0],
                lon: vec![0.0, 5.0],
            },
            values: ndarray::array![[100.0, 500.0]],
            units: Some(String::from("m")),
            source: PathBuf::from("elev.json"),
        };
        let domain = Domain::from_points(vec![4.0], vec![4.0]).unwrap();
        let out = select(&field, &domain, &[day(1), day(2), day(3)]);
        assert_eq!(out.column(0).to_vec(), vec![500.0; 3]);
    }
}
