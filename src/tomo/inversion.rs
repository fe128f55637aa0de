//! Damped weighted least-squares inversion producing a [`VelocityMap`].
//!
//! The objective, in slowness-anomaly space `m` about the reference slowness
//! `1/v0`:
//!
//! ```text
//! minimize ||W_d (G m - d)||^2 + alpha ||L m||^2 + ||W m||^2
//! ```
//!
//! solved through the normal equations
//!
//! ```text
//! (G' W_d G + alpha L' L + W' W) m = G' W_d d
//! ```
//!
//! The system matrix is symmetric positive (semi)definite, so we factor it
//! with Cholesky rather than forming an explicit inverse for the solve; the
//! factorization's inverse then doubles as the posterior covariance, and
//! `covariance * (G' W_d G)` is the resolution matrix.

use log::debug;
use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{DispersionCurve, PairKey, SkipSet, TomoConfig, VType};
use crate::error::TomoError;
use crate::tomo::grid::{build_grid, Grid};
use crate::tomo::paths::{build_path_matrix, SparseRow};
use crate::tomo::regularization::{build_norm_weights, build_smoothing};
use crate::tomo::select::{select_curves, SelectionDiagnostics};

/// One path retained by a finished inversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSummary {
    pub pair: PairKey,
    pub dist_km: f64,
    pub obs_vel: f64,
    pub obs_traveltime: f64,
    pub pred_traveltime: f64,
    pub weight: f64,
}

/// Result of one tomographic inversion. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityMap {
    pub period: f64,
    pub vtype: VType,
    pub grid: Grid,
    /// Paths that passed selection and matrix assembly, input order preserved.
    pub paths: Vec<PathSummary>,
    /// Weight-averaged reference velocity (km/s).
    pub ref_velocity: f64,
    /// Inverted velocity per grid node (km/s).
    pub velocities: Vec<f64>,
    /// Slowness-anomaly model vector (s/km), one entry per node.
    pub slowness_anomaly: Vec<f64>,
    /// Observed minus predicted travel time per path (s).
    pub traveltime_residuals: Vec<f64>,
    /// Paths with nonzero sensitivity at each node.
    pub path_density: Vec<f64>,
    /// Posterior model covariance (nodes x nodes).
    pub covariance: DMatrix<f64>,
    /// Resolution matrix (nodes x nodes).
    pub resolution: DMatrix<f64>,
    /// The resolved configuration this map was inverted with.
    pub params: TomoConfig,
}

impl VelocityMap {
    /// Observed minus predicted travel time per included path (s).
    pub fn traveltime_residuals(&self) -> &[f64] {
        &self.traveltime_residuals
    }

    /// Observed minus predicted velocity per included path (km/s).
    pub fn velocity_residuals(&self) -> Vec<f64> {
        self.paths
            .iter()
            .map(|p| p.obs_vel - p.dist_km / p.pred_traveltime)
            .collect()
    }

    /// Euclidean norm of the slowness-anomaly model.
    pub fn model_norm(&self) -> f64 {
        self.slowness_anomaly
            .iter()
            .map(|m| m * m)
            .sum::<f64>()
            .sqrt()
    }
}

/// Solution of the regularized normal-equations system.
#[derive(Debug, Clone)]
pub struct Solution {
    pub m: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub resolution: DMatrix<f64>,
}

/// Solve `(G' W_d G + alpha L' L + diag(w^2)) m = G' W_d d`.
///
/// `g_rows` and `l_rows` are sparse; the normal-equations matrix is dense
/// (smoothing couples neighborhoods) and `n_nodes` square.
pub fn solve_normal_equations(
    g_rows: &[SparseRow],
    data_weights: &[f64],
    d: &[f64],
    l_rows: &[SparseRow],
    alpha: f64,
    norm_weights: &[f64],
    n_nodes: usize,
) -> Result<Solution, TomoError> {
    debug_assert_eq!(g_rows.len(), data_weights.len());
    debug_assert_eq!(g_rows.len(), d.len());

    // G' W_d G and G' W_d d from sparse outer products.
    let mut gtwg = DMatrix::<f64>::zeros(n_nodes, n_nodes);
    let mut rhs = DVector::<f64>::zeros(n_nodes);
    for (i, row) in g_rows.iter().enumerate() {
        let wd = data_weights[i];
        for &(j1, g1) in row {
            rhs[j1] += wd * d[i] * g1;
            for &(j2, g2) in row {
                gtwg[(j1, j2)] += wd * g1 * g2;
            }
        }
    }

    let mut a = gtwg.clone();
    if alpha > 0.0 {
        for row in l_rows {
            for &(j1, l1) in row {
                for &(j2, l2) in row {
                    a[(j1, j2)] += alpha * l1 * l2;
                }
            }
        }
    }
    for (j, &w) in norm_weights.iter().enumerate() {
        a[(j, j)] += w * w;
    }

    let chol = Cholesky::new(a).ok_or_else(|| {
        TomoError::IllConditioned(
            "normal-equations matrix is singular or not positive definite".into(),
        )
    })?;
    let m = chol.solve(&rhs);
    if m.iter().any(|v| !v.is_finite()) {
        return Err(TomoError::IllConditioned(
            "non-finite solution from normal-equations solve".into(),
        ));
    }
    let covariance = chol.inverse();
    let resolution = &covariance * &gtwg;

    Ok(Solution {
        m,
        covariance,
        resolution,
    })
}

/// Run one full inversion: select curves, build the grid and matrices, solve,
/// and assemble the resulting map.
///
/// Recoverable failures (`InsufficientData`, `IllConditioned`) mean this
/// (period, parameter) unit cannot produce a map; the caller decides whether
/// to skip the period or abort a multi-pass run.
pub fn invert(
    curves: &[DispersionCurve],
    period: f64,
    config: &TomoConfig,
    skip_pairs: &SkipSet,
) -> Result<VelocityMap, TomoError> {
    let selection = select_curves(curves, period, config, skip_pairs);
    log_selection(period, &selection.diagnostics);
    if selection.paths.len() < config.min_paths {
        return Err(TomoError::InsufficientData(format!(
            "{} usable path(s) at period {period} s (need >= {})",
            selection.paths.len(),
            config.min_paths
        )));
    }

    let grid = build_grid(
        &selection.paths,
        config.lon_step,
        config.lat_step,
        config.grid_margin_steps,
    )?;
    if grid.n_nodes() < 2 {
        return Err(TomoError::InsufficientData(format!(
            "grid has {} node(s) (need >= 2)",
            grid.n_nodes()
        )));
    }

    let pm = build_path_matrix(&selection.paths, &grid);
    if !pm.rejected.is_empty() {
        debug!(
            "period {period} s: {} path(s) rejected during matrix assembly",
            pm.rejected.len()
        );
    }
    if pm.rows.len() < config.min_paths {
        return Err(TomoError::InsufficientData(format!(
            "{} path(s) left after matrix assembly at period {period} s (need >= {})",
            pm.rows.len(),
            config.min_paths
        )));
    }
    let kept: Vec<_> = pm.kept.iter().map(|&i| &selection.paths[i]).collect();

    // Reference velocity and travel-time anomalies.
    let weight_sum: f64 = kept.iter().map(|p| p.weight).sum();
    let ref_velocity = kept.iter().map(|p| p.weight * p.vel).sum::<f64>() / weight_sum;
    let d: Vec<f64> = kept
        .iter()
        .map(|p| p.dist_km / p.vel - p.dist_km / ref_velocity)
        .collect();
    let data_weights: Vec<f64> = kept.iter().map(|p| p.weight).collect();

    let l_rows = build_smoothing(&grid, config.correlation_length);
    let norm_weights = build_norm_weights(&pm.density, config.beta, config.lambda_);

    let solution = solve_normal_equations(
        &pm.rows,
        &data_weights,
        &d,
        &l_rows,
        config.alpha,
        &norm_weights,
        grid.n_nodes(),
    )?;

    let ref_slowness = 1.0 / ref_velocity;
    let velocities: Vec<f64> = solution
        .m
        .iter()
        .map(|&dm| 1.0 / (ref_slowness + dm))
        .collect();

    let mut paths = Vec::with_capacity(kept.len());
    let mut residuals = Vec::with_capacity(kept.len());
    for (row, (p, &di)) in pm.rows.iter().zip(kept.iter().zip(d.iter())) {
        let gm: f64 = row.iter().map(|&(j, g)| g * solution.m[j]).sum();
        let pred_tt = p.dist_km / ref_velocity + gm;
        residuals.push(di - gm);
        paths.push(PathSummary {
            pair: p.pair.clone(),
            dist_km: p.dist_km,
            obs_vel: p.vel,
            obs_traveltime: p.dist_km / p.vel,
            pred_traveltime: pred_tt,
            weight: p.weight,
        });
    }

    Ok(VelocityMap {
        period,
        vtype: config.vtype,
        grid,
        paths,
        ref_velocity,
        velocities,
        slowness_anomaly: solution.m.iter().copied().collect(),
        traveltime_residuals: residuals,
        path_density: pm.density,
        covariance: solution.covariance,
        resolution: solution.resolution,
        params: config.clone(),
    })
}

fn log_selection(period: f64, diag: &SelectionDiagnostics) {
    debug!(
        "period {period} s: {} included, {} no velocity, {} near-field, {} skipped, \
         {} high sdev, {} low SNR, {} missing branch",
        diag.n_included,
        diag.n_no_velocity,
        diag.n_near_field,
        diag.n_skipped,
        diag.n_high_sdev,
        diag.n_low_snr,
        diag.n_missing_branch
    );
}
