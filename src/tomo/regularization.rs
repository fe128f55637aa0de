//! Regularization operators for the damped inversion.
//!
//! Two penalty terms, following Barmin et al. (2001):
//!
//! - spatial smoothing `alpha * ||L m||^2` with `L = I - S`, where `S` is the
//!   row-normalized Gaussian kernel `exp(-d^2 / (2 sigma^2))` over inter-node
//!   great-circle distances and `sigma` is the correlation length. The kernel
//!   is truncated at `3 sigma`, which keeps L sparse and leaves the weights
//!   numerically unchanged.
//! - norm penalization `||W m||^2` with diagonal
//!   `w_j = beta * exp(-lambda * path_density_j)`: nodes few paths cross are
//!   damped toward the reference model, well-covered nodes are left free.
//!
//! Boundary treatment: edge nodes simply have fewer kernel neighbors; the
//! row normalization of `S` absorbs the truncation.

use crate::tomo::grid::Grid;
use crate::tomo::paths::SparseRow;

/// Build the smoothing operator `L = I - S` as sparse rows (one per node).
pub fn build_smoothing(grid: &Grid, correlation_length_km: f64) -> Vec<SparseRow> {
    let sigma = correlation_length_km;
    let cutoff = 3.0 * sigma;
    let two_sigma2 = 2.0 * sigma * sigma;

    // Conservative node-index search window around each node: convert the
    // distance cutoff to steps using the smallest km-per-degree across the
    // grid's latitude range (longitude circles shrink poleward).
    let lat_max_abs = grid
        .node_lat(0)
        .abs()
        .max(grid.node_lat(grid.n_nodes().saturating_sub(1)).abs());
    let cos_floor = lat_max_abs.to_radians().cos().max(0.1);
    let km_per_deg = crate::math::geo::KM_PER_DEG;
    let wx = ((cutoff / (grid.lon_step * km_per_deg * cos_floor)).ceil() as usize).max(1);
    let wy = ((cutoff / (grid.lat_step * km_per_deg)).ceil() as usize).max(1);

    let mut rows = Vec::with_capacity(grid.n_nodes());
    for i in 0..grid.n_nodes() {
        let (ix, iy) = (i % grid.n_lon, i / grid.n_lon);

        let mut neighbors: Vec<(usize, f64)> = Vec::new();
        let mut kernel_sum = 0.0;
        let y_lo = iy.saturating_sub(wy);
        let y_hi = (iy + wy).min(grid.n_lat - 1);
        let x_lo = ix.saturating_sub(wx);
        let x_hi = (ix + wx).min(grid.n_lon - 1);
        for jy in y_lo..=y_hi {
            for jx in x_lo..=x_hi {
                let j = jy * grid.n_lon + jx;
                if j == i {
                    continue;
                }
                let d = grid.node_distance_km(i, j);
                if d > cutoff {
                    continue;
                }
                let s = (-d * d / two_sigma2).exp();
                kernel_sum += s;
                neighbors.push((j, s));
            }
        }

        let mut row: SparseRow = Vec::with_capacity(neighbors.len() + 1);
        row.push((i, 1.0));
        if kernel_sum > 0.0 {
            for (j, s) in neighbors {
                row.push((j, -s / kernel_sum));
            }
        }
        row.sort_by_key(|&(j, _)| j);
        rows.push(row);
    }
    rows
}

/// Diagonal norm-penalty weights `w_j = beta * exp(-lambda * density_j)`.
pub fn build_norm_weights(density: &[f64], beta: f64, lambda_: f64) -> Vec<f64> {
    density
        .iter()
        .map(|&d| beta * (-lambda_ * d).exp())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid {
            lon_min: 10.0,
            lat_min: 40.0,
            lon_step: 0.5,
            lat_step: 0.5,
            n_lon: 5,
            n_lat: 5,
        }
    }

    #[test]
    fn smoothing_rows_have_unit_diagonal_and_zero_sum() {
        let rows = build_smoothing(&grid(), 100.0);
        assert_eq!(rows.len(), 25);
        for (i, row) in rows.iter().enumerate() {
            let diag = row.iter().find(|&&(j, _)| j == i).map(|&(_, v)| v);
            assert_eq!(diag, Some(1.0));
            let sum: f64 = row.iter().map(|&(_, v)| v).sum();
            // I minus a row-normalized kernel: the row annihilates constants.
            assert!(sum.abs() < 1e-9, "row {i} sums to {sum}");
            for &(j, v) in row {
                if j != i {
                    assert!(v < 0.0);
                }
            }
        }
    }

    #[test]
    fn closer_neighbors_get_stronger_coupling() {
        let g = grid();
        let rows = build_smoothing(&g, 60.0);
        // Center node: direct lateral neighbor vs diagonal neighbor.
        let center = 2 * g.n_lon + 2;
        let lateral = 2 * g.n_lon + 3;
        let diagonal = 3 * g.n_lon + 3;
        let row = &rows[center];
        let w = |j: usize| row.iter().find(|&&(k, _)| k == j).map(|&(_, v)| v.abs());
        assert!(w(lateral).unwrap() > w(diagonal).unwrap());
    }

    #[test]
    fn short_correlation_length_truncates_kernel() {
        // 3 sigma = 15 km, well below the ~40-55 km node spacing: every row
        // collapses to its bare diagonal.
        let rows = build_smoothing(&grid(), 5.0);
        for row in &rows {
            assert_eq!(row.len(), 1);
        }
    }

    #[test]
    fn norm_weights_decay_with_density() {
        let w = build_norm_weights(&[0.0, 1.0, 5.0], 50.0, 0.3);
        assert!((w[0] - 50.0).abs() < 1e-12);
        assert!(w[0] > w[1] && w[1] > w[2]);
        assert!((w[1] - 50.0 * (-0.3f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn zero_beta_disables_norm_penalty() {
        let w = build_norm_weights(&[0.0, 3.0], 0.0, 0.3);
        assert!(w.iter().all(|&v| v == 0.0));
    }
}
