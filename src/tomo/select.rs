//! Data-quality selection of dispersion measurements for one period.
//!
//! Per curve, inclusion requires all of:
//!
//! 1. `period <= dist_km * max_period_factor` (near-field exclusion)
//! 2. pair not in the skip set, neither station in the skip-stations list
//! 3. with a derived standard deviation: `sdev <= max_sdev` and
//!    `SNR >= min_snr`
//! 4. without one: `SNR >= min_snr_nosdev`
//!
//! The selector is a pure function of its inputs: deterministic, idempotent,
//! and side-effect free, so re-running it (e.g. on a later pass with a grown
//! skip set) is always safe.

use std::collections::BTreeSet;

use crate::domain::{DispersionCurve, PairKey, SkipSet, TomoConfig};

/// One measurement accepted for the inversion, with everything downstream
/// stages need (the immutable curve collection is not referenced again).
#[derive(Debug, Clone)]
pub struct SelectedPath {
    pub pair: PairKey,
    pub lon1: f64,
    pub lat1: f64,
    pub lon2: f64,
    pub lat2: f64,
    pub dist_km: f64,
    /// Observed velocity at the target period (km/s).
    pub vel: f64,
    /// Derived standard deviation, when one qualifies.
    pub sdev: Option<f64>,
    /// Inverse-variance data weight (filled after the default-sdev step).
    pub weight: f64,
}

/// Per-reason rejection counts, for diagnostics. Every excluded curve is
/// counted exactly once, under the first rule it fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionDiagnostics {
    pub n_included: usize,
    pub n_missing_branch: usize,
    pub n_no_velocity: usize,
    pub n_near_field: usize,
    pub n_skipped: usize,
    pub n_high_sdev: usize,
    pub n_low_snr: usize,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub paths: Vec<SelectedPath>,
    pub diagnostics: SelectionDiagnostics,
}

/// Filter `curves` down to the usable measurements at `period`.
///
/// Output order follows input order. Weights are `1/sdev^2` where an sdev
/// exists; measurements without one get the inverse square of the mean sdev
/// over the selected set (1.0 when no selected curve has an sdev).
pub fn select_curves(
    curves: &[DispersionCurve],
    period: f64,
    config: &TomoConfig,
    skip_pairs: &SkipSet,
) -> Selection {
    let skip_stations: BTreeSet<&str> =
        config.skip_stations.iter().map(String::as_str).collect();

    let mut diag = SelectionDiagnostics::default();
    let mut paths = Vec::new();

    for curve in curves {
        let Some(branch) = curve.branch(config.vtype) else {
            diag.n_missing_branch += 1;
            continue;
        };
        let vel = curve
            .period_index(period)
            .and_then(|idx| Some((idx, branch.vels.get(idx).copied().flatten()?)));
        let Some((idx, vel)) = vel else {
            diag.n_no_velocity += 1;
            continue;
        };
        if !(vel.is_finite() && vel > 0.0) {
            diag.n_no_velocity += 1;
            continue;
        }

        // Near-field exclusion: the measurement must span enough wavelengths.
        if period > curve.dist_km * config.max_period_factor {
            diag.n_near_field += 1;
            continue;
        }

        if skip_pairs.contains(&curve.pair())
            || skip_stations.contains(curve.station1.name.as_str())
            || skip_stations.contains(curve.station2.name.as_str())
        {
            diag.n_skipped += 1;
            continue;
        }

        let snr = branch.snrs.get(idx).copied().flatten();
        let sdev = branch.derived_sdev(idx, config.min_snr, config.min_trimester_count);

        match sdev {
            Some(sd) => {
                if sd > config.max_sdev {
                    diag.n_high_sdev += 1;
                    continue;
                }
                match snr {
                    Some(s) if s >= config.min_snr => {}
                    _ => {
                        diag.n_low_snr += 1;
                        continue;
                    }
                }
            }
            None => match snr {
                Some(s) if s >= config.min_snr_nosdev => {}
                _ => {
                    diag.n_low_snr += 1;
                    continue;
                }
            },
        }

        paths.push(SelectedPath {
            pair: curve.pair(),
            lon1: curve.station1.lon,
            lat1: curve.station1.lat,
            lon2: curve.station2.lon,
            lat2: curve.station2.lat,
            dist_km: curve.dist_km,
            vel,
            sdev,
            weight: 0.0,
        });
    }

    fill_weights(&mut paths);
    diag.n_included = paths.len();

    Selection {
        paths,
        diagnostics: diag,
    }
}

/// Inverse-variance weights, with the mean selected sdev standing in for
/// measurements that have none. Deterministic post-step so the selection
/// itself stays a pure per-curve filter.
fn fill_weights(paths: &mut [SelectedPath]) {
    let sdevs: Vec<f64> = paths.iter().filter_map(|p| p.sdev).collect();
    let default_sdev = if sdevs.is_empty() {
        1.0
    } else {
        sdevs.iter().sum::<f64>() / sdevs.len() as f64
    };
    for p in paths.iter_mut() {
        let sd = p.sdev.unwrap_or(default_sdev).max(1e-12);
        p.weight = 1.0 / (sd * sd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BranchSamples, Station, TrimesterSamples, VType};

    fn station(name: &str, lon: f64, lat: f64) -> Station {
        Station {
            name: name.to_string(),
            lon,
            lat,
        }
    }

    fn curve(
        name1: &str,
        name2: &str,
        dist_km: f64,
        vel: Option<f64>,
        snr: Option<f64>,
        trimester_vels: &[f64],
    ) -> DispersionCurve {
        DispersionCurve {
            station1: station(name1, 0.0, 0.0),
            station2: station(name2, 1.0, 1.0),
            dist_km,
            periods: vec![8.0],
            group: BranchSamples {
                vels: vec![vel],
                snrs: vec![snr],
                trimesters: trimester_vels
                    .iter()
                    .map(|&v| TrimesterSamples {
                        vels: vec![Some(v)],
                        snrs: vec![Some(10.0)],
                    })
                    .collect(),
            },
            phase: None,
        }
    }

    fn config() -> TomoConfig {
        TomoConfig {
            min_trimester_count: 3,
            max_sdev: 0.1,
            min_snr: 7.0,
            min_snr_nosdev: 15.0,
            ..TomoConfig::default()
        }
    }

    #[test]
    fn near_field_paths_are_excluded() {
        // max_period_factor = 1/12: an 8 s period needs dist >= 96 km.
        let curves = vec![
            curve("AA", "BB", 100.0, Some(3.0), Some(20.0), &[]),
            curve("AA", "CC", 90.0, Some(3.0), Some(20.0), &[]),
        ];
        let sel = select_curves(&curves, 8.0, &config(), &SkipSet::new());
        assert_eq!(sel.paths.len(), 1);
        assert_eq!(sel.diagnostics.n_near_field, 1);
        assert_eq!(sel.paths[0].pair, PairKey::new("AA", "BB"));
    }

    #[test]
    fn snr_gate_depends_on_sdev_presence() {
        // No sdev (no trimesters): needs SNR >= 15.
        let curves = vec![
            curve("AA", "BB", 200.0, Some(3.0), Some(10.0), &[]),
            curve("AA", "CC", 200.0, Some(3.0), Some(16.0), &[]),
            // With sdev: SNR >= 7 suffices.
            curve("AA", "DD", 200.0, Some(3.0), Some(10.0), &[3.0, 3.01, 2.99]),
        ];
        let sel = select_curves(&curves, 8.0, &config(), &SkipSet::new());
        assert_eq!(sel.paths.len(), 2);
        assert_eq!(sel.diagnostics.n_low_snr, 1);
    }

    #[test]
    fn high_sdev_is_excluded() {
        let curves = vec![curve(
            "AA",
            "BB",
            200.0,
            Some(3.0),
            Some(20.0),
            &[2.0, 3.0, 4.0], // population std ~0.82 > 0.1
        )];
        let sel = select_curves(&curves, 8.0, &config(), &SkipSet::new());
        assert!(sel.paths.is_empty());
        assert_eq!(sel.diagnostics.n_high_sdev, 1);
    }

    #[test]
    fn skip_set_and_skip_stations_apply() {
        let mut skip = SkipSet::new();
        skip.insert(PairKey::new("AA", "BB"));
        let mut cfg = config();
        cfg.skip_stations = vec!["DD".to_string()];

        let curves = vec![
            curve("AA", "BB", 200.0, Some(3.0), Some(20.0), &[]),
            curve("CC", "DD", 200.0, Some(3.0), Some(20.0), &[]),
            curve("CC", "EE", 200.0, Some(3.0), Some(20.0), &[]),
        ];
        let sel = select_curves(&curves, 8.0, &cfg, &skip);
        assert_eq!(sel.paths.len(), 1);
        assert_eq!(sel.diagnostics.n_skipped, 2);
    }

    #[test]
    fn weights_are_inverse_variance_with_mean_default() {
        let curves = vec![
            curve("AA", "BB", 200.0, Some(3.0), Some(20.0), &[3.0, 3.1, 2.9]),
            curve("AA", "CC", 200.0, Some(3.0), Some(20.0), &[]),
        ];
        let sel = select_curves(&curves, 8.0, &config(), &SkipSet::new());
        assert_eq!(sel.paths.len(), 2);

        let sd = sel.paths[0].sdev.unwrap();
        assert!((sel.paths[0].weight - 1.0 / (sd * sd)).abs() < 1e-9);
        // The sdev-less path inherits the mean sdev of the selected set.
        assert!((sel.paths[1].weight - sel.paths[0].weight).abs() < 1e-9);
    }

    #[test]
    fn selection_is_deterministic_and_idempotent() {
        let curves = vec![
            curve("AA", "BB", 200.0, Some(3.0), Some(20.0), &[3.0, 3.1, 2.9]),
            curve("AA", "CC", 90.0, Some(3.0), Some(20.0), &[]),
            curve("BB", "CC", 200.0, Some(3.1), Some(16.0), &[]),
        ];
        let a = select_curves(&curves, 8.0, &config(), &SkipSet::new());
        let b = select_curves(&curves, 8.0, &config(), &SkipSet::new());
        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.paths.len(), b.paths.len());
        for (x, y) in a.paths.iter().zip(b.paths.iter()) {
            assert_eq!(x.pair, y.pair);
            assert_eq!(x.vel, y.vel);
            assert_eq!(x.weight, y.weight);
        }
    }

    #[test]
    fn missing_phase_branch_is_counted() {
        let mut cfg = config();
        cfg.vtype = VType::Phase;
        let curves = vec![curve("AA", "BB", 200.0, Some(3.0), Some(20.0), &[])];
        let sel = select_curves(&curves, 8.0, &cfg, &SkipSet::new());
        assert!(sel.paths.is_empty());
        assert_eq!(sel.diagnostics.n_missing_branch, 1);
    }
}
