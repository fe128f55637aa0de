//! Regular lon/lat node grid over the station footprint.
//!
//! Bounds snap outward to step multiples so the same station set and steps
//! always reproduce the same grid, regardless of input ordering.

use serde::{Deserialize, Serialize};

use crate::error::TomoError;
use crate::math::haversine_km;
use crate::tomo::select::SelectedPath;

/// Rectangular node lattice. Nodes are row-major by latitude:
/// index `j = iy * n_lon + ix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_step: f64,
    pub lat_step: f64,
    pub n_lon: usize,
    pub n_lat: usize,
}

impl Grid {
    pub fn n_nodes(&self) -> usize {
        self.n_lon * self.n_lat
    }

    pub fn node_lon(&self, j: usize) -> f64 {
        self.lon_min + (j % self.n_lon) as f64 * self.lon_step
    }

    pub fn node_lat(&self, j: usize) -> f64 {
        self.lat_min + (j / self.n_lon) as f64 * self.lat_step
    }

    /// Great-circle distance between two nodes, in km.
    pub fn node_distance_km(&self, i: usize, j: usize) -> f64 {
        haversine_km(
            self.node_lon(i),
            self.node_lat(i),
            self.node_lon(j),
            self.node_lat(j),
        )
    }

    /// Bilinear interpolation weights of `(lon, lat)` on the 4 surrounding
    /// nodes. Weights always sum to 1.
    ///
    /// Coordinates up to one step outside the lattice clamp to the edge
    /// (great-circle paths between in-grid stations can bulge slightly past
    /// the bounding box); anything farther out returns `None`.
    pub fn bilinear_weights(&self, lon: f64, lat: f64) -> Option<Vec<(usize, f64)>> {
        let fx = (lon - self.lon_min) / self.lon_step;
        let fy = (lat - self.lat_min) / self.lat_step;
        let (max_x, max_y) = ((self.n_lon - 1) as f64, (self.n_lat - 1) as f64);
        if fx < -1.0 || fx > max_x + 1.0 || fy < -1.0 || fy > max_y + 1.0 {
            return None;
        }
        let fx = fx.clamp(0.0, max_x);
        let fy = fy.clamp(0.0, max_y);

        let ix = (fx.floor() as usize).min(self.n_lon.saturating_sub(2));
        let iy = (fy.floor() as usize).min(self.n_lat.saturating_sub(2));
        let tx = if self.n_lon > 1 { fx - ix as f64 } else { 0.0 };
        let ty = if self.n_lat > 1 { fy - iy as f64 } else { 0.0 };

        let mut out = Vec::with_capacity(4);
        let mut push = |ixx: usize, iyy: usize, w: f64| {
            if w > 0.0 {
                out.push((iyy * self.n_lon + ixx, w));
            }
        };
        push(ix, iy, (1.0 - tx) * (1.0 - ty));
        if self.n_lon > 1 {
            push(ix + 1, iy, tx * (1.0 - ty));
        }
        if self.n_lat > 1 {
            push(ix, iy + 1, (1.0 - tx) * ty);
            if self.n_lon > 1 {
                push(ix + 1, iy + 1, tx * ty);
            }
        }
        Some(out)
    }
}

/// Build the grid spanning the stations of `paths`, snapped outward to step
/// multiples, with `margin_steps` extra steps on every side.
///
/// Fails with `InsufficientData` when fewer than 2 distinct station
/// positions remain: no tomography is possible on a degenerate footprint.
pub fn build_grid(
    paths: &[SelectedPath],
    lon_step: f64,
    lat_step: f64,
    margin_steps: f64,
) -> Result<Grid, TomoError> {
    let mut positions: Vec<(f64, f64)> = Vec::new();
    for p in paths {
        for pos in [(p.lon1, p.lat1), (p.lon2, p.lat2)] {
            if !positions
                .iter()
                .any(|q| (q.0 - pos.0).abs() < 1e-9 && (q.1 - pos.1).abs() < 1e-9)
            {
                positions.push(pos);
            }
        }
    }
    if positions.len() < 2 {
        return Err(TomoError::InsufficientData(format!(
            "{} distinct station position(s) after selection (need >= 2)",
            positions.len()
        )));
    }

    let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(lon, lat) in &positions {
        lon_min = lon_min.min(lon);
        lon_max = lon_max.max(lon);
        lat_min = lat_min.min(lat);
        lat_max = lat_max.max(lat);
    }

    let snap = |v: f64, step: f64, up: bool| -> f64 {
        // Small tolerance so stations sitting exactly on a multiple do not
        // spill into an extra cell through floating-point noise.
        let q = v / step;
        let q = if up {
            (q - 1e-9).ceil()
        } else {
            (q + 1e-9).floor()
        };
        q * step
    };
    let lon_lo = snap(lon_min, lon_step, false) - margin_steps * lon_step;
    let lon_hi = snap(lon_max, lon_step, true) + margin_steps * lon_step;
    let lat_lo = snap(lat_min, lat_step, false) - margin_steps * lat_step;
    let lat_hi = snap(lat_max, lat_step, true) + margin_steps * lat_step;

    let n_lon = ((lon_hi - lon_lo) / lon_step).round() as usize + 1;
    let n_lat = ((lat_hi - lat_lo) / lat_step).round() as usize + 1;

    Ok(Grid {
        lon_min: lon_lo,
        lat_min: lat_lo,
        lon_step,
        lat_step,
        n_lon,
        n_lat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PairKey;

    fn path(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> SelectedPath {
        SelectedPath {
            pair: PairKey::new("A", "B"),
            lon1,
            lat1,
            lon2,
            lat2,
            dist_km: haversine_km(lon1, lat1, lon2, lat2),
            vel: 3.0,
            sdev: None,
            weight: 1.0,
        }
    }

    #[test]
    fn half_degree_grid_over_two_degree_footprint_is_5x5() {
        let paths = vec![path(10.0, 40.0, 12.0, 42.0)];
        let grid = build_grid(&paths, 0.5, 0.5, 0.0).unwrap();
        assert_eq!((grid.n_lon, grid.n_lat), (5, 5));
        assert_eq!(grid.n_nodes(), 25);
        assert!((grid.lon_min - 10.0).abs() < 1e-9);
        assert!((grid.lat_min - 40.0).abs() < 1e-9);
    }

    #[test]
    fn off_step_stations_snap_outward() {
        let paths = vec![path(10.1, 40.1, 11.9, 41.9)];
        let grid = build_grid(&paths, 0.5, 0.5, 0.0).unwrap();
        assert!((grid.lon_min - 10.0).abs() < 1e-9);
        assert!((grid.lat_min - 40.0).abs() < 1e-9);
        assert_eq!((grid.n_lon, grid.n_lat), (5, 5));
    }

    #[test]
    fn margin_adds_steps_on_every_side() {
        let paths = vec![path(10.0, 40.0, 12.0, 42.0)];
        let grid = build_grid(&paths, 0.5, 0.5, 1.0).unwrap();
        assert_eq!((grid.n_lon, grid.n_lat), (7, 7));
        assert!((grid.lon_min - 9.5).abs() < 1e-9);
    }

    #[test]
    fn degenerate_footprint_is_rejected() {
        let paths = vec![path(10.0, 40.0, 10.0, 40.0)];
        let err = build_grid(&paths, 0.5, 0.5, 0.0).unwrap_err();
        assert!(matches!(err, TomoError::InsufficientData(_)));
        assert!(build_grid(&[], 0.5, 0.5, 0.0).is_err());
    }

    #[test]
    fn bilinear_weights_sum_to_one_and_clamp() {
        let grid = Grid {
            lon_min: 10.0,
            lat_min: 40.0,
            lon_step: 0.5,
            lat_step: 0.5,
            n_lon: 5,
            n_lat: 5,
        };
        for &(lon, lat) in &[(10.3, 40.7), (10.0, 40.0), (12.0, 42.0), (12.3, 42.3)] {
            let w = grid.bilinear_weights(lon, lat).unwrap();
            let sum: f64 = w.iter().map(|&(_, v)| v).sum();
            assert!((sum - 1.0).abs() < 1e-12, "sum {sum} at ({lon}, {lat})");
            for &(j, _) in &w {
                assert!(j < grid.n_nodes());
            }
        }
        // More than a step outside the lattice: no weights.
        assert!(grid.bilinear_weights(13.1, 41.0).is_none());
    }

    #[test]
    fn interior_point_interpolates_four_nodes() {
        let grid = Grid {
            lon_min: 0.0,
            lat_min: 0.0,
            lon_step: 1.0,
            lat_step: 1.0,
            n_lon: 3,
            n_lat: 3,
        };
        let w = grid.bilinear_weights(0.5, 0.5).unwrap();
        assert_eq!(w.len(), 4);
        for &(_, v) in &w {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }
}
