//! Path-sensitivity (design) matrix assembly.
//!
//! Each inter-station path is a great circle sampled at segment midpoints;
//! every midpoint scatters its segment length onto the 4 surrounding grid
//! nodes with bilinear weights. The resulting row of G is the line-integral
//! sensitivity of that path's travel time to node slowness:
//!
//! ```text
//! predicted_traveltime[i] = sum_j G[i][j] * slowness[j]
//! ```
//!
//! Because bilinear weights partition unity and segment lengths sum to the
//! path length, every row sums to the path length exactly.
//!
//! G is very sparse (each path touches a small band of nodes), so rows are
//! kept as `(node, weight)` pairs rather than dense vectors.

use std::collections::BTreeMap;

use crate::domain::PairKey;
use crate::math::{great_circle_points, geo::KM_PER_DEG};
use crate::tomo::grid::Grid;
use crate::tomo::select::SelectedPath;

/// One sparse row of the design matrix: `(node index, km of path length)`.
pub type SparseRow = Vec<(usize, f64)>;

/// Why a path was excluded from the matrix. Recorded, never a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    /// Measured inter-station distance is zero or negative.
    ZeroLength,
    /// The great circle strays more than one grid step outside the lattice.
    OutsideGrid,
}

/// Sparse design matrix plus per-node path density.
#[derive(Debug, Clone)]
pub struct PathMatrix {
    /// One sparse sensitivity row per kept path.
    pub rows: Vec<SparseRow>,
    /// Indices of the kept paths into the input selection, aligned with `rows`.
    pub kept: Vec<usize>,
    pub rejected: Vec<(PairKey, PathRejection)>,
    /// Number of paths with nonzero sensitivity at each node.
    pub density: Vec<f64>,
}

/// Midpoint sample spacing: a third of the finer grid step, converted to km.
fn sample_step_km(grid: &Grid) -> f64 {
    (grid.lon_step.min(grid.lat_step) * KM_PER_DEG / 3.0).max(1.0)
}

/// Discretize every selected path onto `grid`.
pub fn build_path_matrix(paths: &[SelectedPath], grid: &Grid) -> PathMatrix {
    let step_km = sample_step_km(grid);
    let n_nodes = grid.n_nodes();

    let mut rows = Vec::new();
    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    let mut density = vec![0.0; n_nodes];

    'path: for (i, p) in paths.iter().enumerate() {
        if !(p.dist_km.is_finite() && p.dist_km > 0.0) {
            rejected.push((p.pair.clone(), PathRejection::ZeroLength));
            continue;
        }

        let nseg = (p.dist_km / step_km).ceil().max(1.0) as usize;
        let seg_len = p.dist_km / nseg as f64;
        let midpoints = great_circle_points(
            p.lon1,
            p.lat1,
            p.lon2,
            p.lat2,
            (0..nseg).map(move |k| (k as f64 + 0.5) / nseg as f64),
        );

        let mut row: BTreeMap<usize, f64> = BTreeMap::new();
        for (lon, lat) in midpoints {
            let Some(weights) = grid.bilinear_weights(lon, lat) else {
                rejected.push((p.pair.clone(), PathRejection::OutsideGrid));
                continue 'path;
            };
            for (j, w) in weights {
                *row.entry(j).or_insert(0.0) += seg_len * w;
            }
        }
        if row.is_empty() {
            rejected.push((p.pair.clone(), PathRejection::OutsideGrid));
            continue;
        }

        for &j in row.keys() {
            density[j] += 1.0;
        }
        rows.push(row.into_iter().collect());
        kept.push(i);
    }

    PathMatrix {
        rows,
        kept,
        rejected,
        density,
    }
}
