//! Misfit statistics over travel-time residuals, and the outlier predicate
//! used by the multi-pass rejection loop.

/// Summary statistics of a residual vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualStats {
    pub n: usize,
    pub sum_abs: f64,
    pub mean: f64,
    /// Mean-centered population standard deviation.
    pub std: f64,
}

/// Compute misfit statistics. An empty vector yields all-zero stats.
pub fn residual_stats(residuals: &[f64]) -> ResidualStats {
    let n = residuals.len();
    if n == 0 {
        return ResidualStats {
            n: 0,
            sum_abs: 0.0,
            mean: 0.0,
            std: 0.0,
        };
    }
    let nf = n as f64;
    let sum_abs = residuals.iter().map(|r| r.abs()).sum::<f64>();
    let mean = residuals.iter().sum::<f64>() / nf;
    let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / nf;
    ResidualStats {
        n,
        sum_abs,
        mean,
        std: var.sqrt(),
    }
}

/// Outlier predicate: `|residual| > threshold`, strictly.
///
/// A residual exactly at the threshold is retained; only strictly larger
/// magnitudes are flagged for rejection.
pub fn is_outlier(residual: f64, threshold: f64) -> bool {
    residual.abs() > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_on_simple_vector() {
        let s = residual_stats(&[1.0, -1.0, 3.0, -3.0]);
        assert_eq!(s.n, 4);
        assert!((s.sum_abs - 8.0).abs() < 1e-12);
        assert!(s.mean.abs() < 1e-12);
        assert!((s.std - 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn std_is_mean_centered() {
        // Constant offset carries no spread.
        let s = residual_stats(&[2.0, 2.0, 2.0]);
        assert!(s.std.abs() < 1e-12);
        assert!((s.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_residuals_yield_zero_stats() {
        let s = residual_stats(&[]);
        assert_eq!(s.n, 0);
        assert_eq!(s.std, 0.0);
    }

    #[test]
    fn outlier_predicate_is_strict() {
        assert!(!is_outlier(3.0, 3.0));
        assert!(!is_outlier(-3.0, 3.0));
        assert!(is_outlier(3.0 + 1e-12, 3.0));
        assert!(is_outlier(-4.0, 3.0));
    }
}
