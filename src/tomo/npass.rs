//! Multi-pass inversion with between-pass outlier rejection.
//!
//! Pass `i` inverts with the current skip set; for every pass but the last,
//! paths whose travel-time residual magnitude exceeds 3 times the residual
//! standard deviation (strictly) are added to the skip set before pass
//! `i + 1`. The last pass's map is the result for the period.
//!
//! The skip set is an owned value: it starts from the caller's baseline,
//! grows monotonically across the passes of this period, and is never shared
//! with other periods (which run independently, possibly in parallel).
//!
//! Any recoverable inversion failure aborts the whole period: no partial map
//! is recorded, and the caller moves on to the next period.

use log::{debug, info};

use crate::domain::{DispersionCurve, PassParams, TomoConfig};
use crate::error::TomoError;
use crate::report::format_pass_header;
use crate::tomo::inversion::{invert, VelocityMap};
use crate::tomo::residuals::{is_outlier, residual_stats};

/// Residual rejection threshold, in standard deviations.
pub const REJECTION_SIGMA: f64 = 3.0;

/// Diagnostics from one completed pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassTrace {
    pub pass: usize,
    /// Skip-set size when the pass started.
    pub n_skipped_before: usize,
    /// Paths included in the pass's inversion.
    pub n_paths: usize,
    pub residual_std: f64,
    /// Paths rejected for the next pass (0 for the last pass).
    pub n_rejected: usize,
}

/// Tagged result of one period's multi-pass run: either the final map or an
/// abort reason. Callers branch on the tag; no exception-style control flow.
#[derive(Debug, Clone)]
pub enum PeriodOutcome {
    Map {
        map: Box<VelocityMap>,
        trace: Vec<PassTrace>,
    },
    Aborted {
        pass: usize,
        reason: TomoError,
    },
}

/// Run the N-pass inversion for one period.
///
/// Fatal configuration problems (empty pass list, invalid per-pass
/// parameters) surface as `Err` before any inversion runs; recoverable
/// inversion failures surface as `Ok(PeriodOutcome::Aborted)`.
pub fn run_period(
    curves: &[DispersionCurve],
    period: f64,
    config: &TomoConfig,
    passes: &[PassParams],
) -> Result<PeriodOutcome, TomoError> {
    if passes.is_empty() {
        return Err(TomoError::Configuration("need at least one pass".into()));
    }
    // Validate every pass's resolved configuration up front: a mis-specified
    // later pass must fail the setup, not a half-finished run.
    let configs: Vec<TomoConfig> = passes.iter().map(|p| p.apply(config)).collect();
    for cfg in &configs {
        cfg.validate()?;
    }

    let mut skip = config.baseline_skip_set();
    let mut trace = Vec::with_capacity(passes.len());

    for (i, cfg) in configs.iter().enumerate() {
        info!(
            "period {period} s: {}",
            format_pass_header(i + 1, skip.len(), &passes[i])
        );
        let map = match invert(curves, period, cfg, &skip) {
            Ok(map) => map,
            Err(e) if e.is_recoverable() => {
                info!("period {period} s: pass {} aborted: {e}", i + 1);
                return Ok(PeriodOutcome::Aborted { pass: i, reason: e });
            }
            Err(e) => return Err(e),
        };

        let stats = residual_stats(map.traveltime_residuals());
        let n_skipped_before = skip.len();
        let mut n_rejected = 0;

        if i < passes.len() - 1 {
            let threshold = REJECTION_SIGMA * stats.std;
            for (p, &r) in map.paths.iter().zip(map.traveltime_residuals()) {
                if is_outlier(r, threshold) && skip.insert(p.pair.clone()) {
                    n_rejected += 1;
                }
            }
            debug!(
                "period {period} s: pass {} rejected {} path(s) (threshold {:.4} s)",
                i + 1,
                n_rejected,
                threshold
            );
        }

        trace.push(PassTrace {
            pass: i,
            n_skipped_before,
            n_paths: map.paths.len(),
            residual_std: stats.std,
            n_rejected,
        });

        if i == passes.len() - 1 {
            return Ok(PeriodOutcome::Map {
                map: Box::new(map),
                trace,
            });
        }
    }
    unreachable!("loop returns on the last pass");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BranchSamples, PairKey, Station, TomoConfig};

    fn station(name: &str, lon: f64, lat: f64) -> Station {
        Station {
            name: name.to_string(),
            lon,
            lat,
        }
    }

    fn curve(s1: &Station, s2: &Station, vel: f64) -> DispersionCurve {
        let dist = crate::math::haversine_km(s1.lon, s1.lat, s2.lon, s2.lat);
        DispersionCurve {
            station1: s1.clone(),
            station2: s2.clone(),
            dist_km: dist,
            periods: vec![8.0],
            group: BranchSamples {
                vels: vec![Some(vel)],
                snrs: vec![Some(20.0)],
                trimesters: Vec::new(),
            },
            phase: None,
        }
    }

    /// 6 stations spread over 2x2 degrees, all 15 pairs measured at 3 km/s
    /// except one fast outlier pair.
    fn synthetic_curves() -> (Vec<DispersionCurve>, PairKey) {
        let stations = vec![
            station("S0", 10.0, 40.0),
            station("S1", 12.0, 40.0),
            station("S2", 10.0, 42.0),
            station("S3", 12.0, 42.0),
            station("S4", 11.0, 40.5),
            station("S5", 11.0, 41.5),
        ];
        let outlier = PairKey::new("S0", "S3");
        let mut curves = Vec::new();
        for i in 0..stations.len() {
            for j in (i + 1)..stations.len() {
                let pair = PairKey::new(&stations[i].name, &stations[j].name);
                let vel = if pair == outlier { 2.0 } else { 3.0 };
                curves.push(curve(&stations[i], &stations[j], vel));
            }
        }
        (curves, outlier)
    }

    fn config() -> TomoConfig {
        TomoConfig {
            min_snr_nosdev: 15.0,
            ..TomoConfig::default()
        }
    }

    /// Overdamped passes so residuals stay close to the raw anomalies.
    fn passes(n: usize) -> Vec<PassParams> {
        vec![
            PassParams {
                grid_step: 0.5,
                min_snr: 5.0,
                correlation_length: 100.0,
                alpha: 1e6,
                beta: 100.0,
                lambda_: 0.3,
            };
            n
        ]
    }

    #[test]
    fn outlier_pair_is_rejected_and_final_std_shrinks() {
        let (curves, outlier) = synthetic_curves();
        let outcome = run_period(&curves, 8.0, &config(), &passes(2)).unwrap();
        let PeriodOutcome::Map { map, trace } = outcome else {
            panic!("expected a map");
        };

        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].n_paths, 15);
        assert_eq!(trace[0].n_rejected, 1);
        assert_eq!(trace[1].n_skipped_before, 1);
        assert_eq!(trace[1].n_paths, 14);
        assert!(trace[1].residual_std <= trace[0].residual_std);
        assert!(map.paths.iter().all(|p| p.pair != outlier));
    }

    #[test]
    fn skip_set_grows_monotonically_across_passes() {
        let (curves, _) = synthetic_curves();
        let outcome = run_period(&curves, 8.0, &config(), &passes(3)).unwrap();
        let PeriodOutcome::Map { trace, .. } = outcome else {
            panic!("expected a map");
        };
        for w in trace.windows(2) {
            assert!(w[1].n_skipped_before >= w[0].n_skipped_before);
            assert_eq!(
                w[1].n_skipped_before,
                w[0].n_skipped_before + w[0].n_rejected
            );
        }
    }

    #[test]
    fn periods_do_not_leak_skip_sets() {
        // Two consecutive runs see identical baselines: the first run's
        // rejections must not contaminate the second.
        let (curves, _) = synthetic_curves();
        let cfg = config();
        let a = run_period(&curves, 8.0, &cfg, &passes(2)).unwrap();
        let b = run_period(&curves, 8.0, &cfg, &passes(2)).unwrap();
        let (PeriodOutcome::Map { trace: ta, .. }, PeriodOutcome::Map { trace: tb, .. }) = (a, b)
        else {
            panic!("expected maps");
        };
        assert_eq!(ta, tb);
        assert_eq!(ta[0].n_skipped_before, 0);
    }

    #[test]
    fn unusable_period_aborts_without_a_map() {
        let (curves, _) = synthetic_curves();
        // No curve carries a 99 s measurement.
        let outcome = run_period(&curves, 99.0, &config(), &passes(2)).unwrap();
        let PeriodOutcome::Aborted { pass, reason } = outcome else {
            panic!("expected an abort");
        };
        assert_eq!(pass, 0);
        assert!(matches!(reason, TomoError::InsufficientData(_)));
    }

    #[test]
    fn empty_pass_list_is_a_configuration_error() {
        let (curves, _) = synthetic_curves();
        let err = run_period(&curves, 8.0, &config(), &[]).unwrap_err();
        assert!(matches!(err, TomoError::Configuration(_)));
    }

    #[test]
    fn invalid_pass_parameters_fail_at_setup() {
        let (curves, _) = synthetic_curves();
        let mut bad = passes(2);
        bad[1].grid_step = -1.0;
        let err = run_period(&curves, 8.0, &config(), &bad).unwrap_err();
        assert!(matches!(err, TomoError::Configuration(_)));
    }
}
