//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during the inversion passes
//! - loaded from / exported to JSON documents
//! - reloaded later for plotting or comparisons

use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::TomoError;

/// Which velocity branch of a dispersion curve to invert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VType {
    Group,
    Phase,
}

impl VType {
    pub fn display_name(self) -> &'static str {
        match self {
            VType::Group => "group",
            VType::Phase => "phase",
        }
    }
}

impl std::fmt::Display for VType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A seismic station with its geographic position (degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

/// Velocities measured on one 3-month sliding window, indexed by the parent
/// curve's period grid. Used only to derive measurement uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimesterSamples {
    pub vels: Vec<Option<f64>>,
    pub snrs: Vec<Option<f64>>,
}

/// One velocity branch (group or phase) of a dispersion curve: per-period
/// velocity and spectral SNR, plus the trimester estimates behind the
/// standard-deviation derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSamples {
    pub vels: Vec<Option<f64>>,
    pub snrs: Vec<Option<f64>>,
    pub trimesters: Vec<TrimesterSamples>,
}

impl BranchSamples {
    /// Standard deviation of the velocity at period index `idx`, derived from
    /// the spread of trimester velocities whose SNR >= `min_snr`.
    ///
    /// Returns `None` when fewer than `min_trimester_count` trimester
    /// estimates qualify: the measurement then has no usable uncertainty and
    /// falls under the no-sdev selection rule.
    ///
    /// Population standard deviation (divide by n, not n-1), matching the
    /// original derivation.
    pub fn derived_sdev(&self, idx: usize, min_snr: f64, min_trimester_count: usize) -> Option<f64> {
        let mut vels = Vec::new();
        for tri in &self.trimesters {
            let v = tri.vels.get(idx).copied().flatten();
            let snr = tri.snrs.get(idx).copied().flatten();
            if let (Some(v), Some(snr)) = (v, snr) {
                if v.is_finite() && snr >= min_snr {
                    vels.push(v);
                }
            }
        }
        if vels.len() < min_trimester_count.max(1) {
            return None;
        }
        let n = vels.len() as f64;
        let mean = vels.iter().sum::<f64>() / n;
        let var = vels.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(var.sqrt())
    }
}

/// An inter-station dispersion measurement. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersionCurve {
    pub station1: Station,
    pub station2: Station,
    /// Inter-station great-circle distance (km), as measured upstream.
    pub dist_km: f64,
    /// Period grid (s) shared by all sample arrays of this curve.
    pub periods: Vec<f64>,
    pub group: BranchSamples,
    /// Phase velocities are not always available.
    pub phase: Option<BranchSamples>,
}

impl DispersionCurve {
    /// Canonical identity of this station pair.
    pub fn pair(&self) -> PairKey {
        PairKey::new(&self.station1.name, &self.station2.name)
    }

    /// Index of `period` on this curve's period grid, within tolerance.
    pub fn period_index(&self, period: f64) -> Option<usize> {
        self.periods.iter().position(|p| (p - period).abs() < 1e-6)
    }

    pub fn branch(&self, vtype: VType) -> Option<&BranchSamples> {
        match vtype {
            VType::Group => Some(&self.group),
            VType::Phase => self.phase.as_ref(),
        }
    }
}

/// Canonical (lexicographically ordered) station-name pair, so that
/// (A, B) and (B, A) identify the same path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey(pub String, pub String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            PairKey(a.to_string(), b.to_string())
        } else {
            PairKey(b.to_string(), a.to_string())
        }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// Station pairs excluded from a pass. Grows monotonically across passes
/// within one period's run; each period owns its own copy (never shared).
pub type SkipSet = BTreeSet<PairKey>;

/// Process-wide tomography defaults, overridable per inversion call.
///
/// Defaults mirror the original configuration file; callers layer
/// [`TomoOverrides`] on top without mutating these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomoConfig {
    /// Internode longitude step (degrees).
    pub lon_step: f64,
    /// Internode latitude step (degrees).
    pub lat_step: f64,
    /// Extra grid margin around the station footprint, in steps.
    pub grid_margin_steps: f64,

    /// Minimum spectral SNR for velocities that have a standard deviation.
    /// Also the SNR gate applied to trimester estimates when deriving sdev.
    pub min_snr: f64,
    /// Minimum spectral SNR for velocities without a standard deviation.
    pub min_snr_nosdev: f64,
    /// Maximum accepted standard deviation (km/s).
    pub max_sdev: f64,
    /// Near-field exclusion: keep a measurement only if
    /// `period <= dist_km * max_period_factor`.
    pub max_period_factor: f64,
    /// Minimum number of qualifying trimester estimates for an sdev.
    pub min_trimester_count: usize,

    /// Spatial-smoothing correlation length (km).
    pub correlation_length: f64,
    /// Spatial-smoothing strength.
    pub alpha: f64,
    /// Norm-penalization strength.
    pub beta: f64,
    /// Norm-penalization path-density decay rate.
    pub lambda_: f64,

    pub vtype: VType,
    /// Minimum usable paths for an inversion to be attempted.
    pub min_paths: usize,

    /// Stations excluded wholesale from every pass.
    pub skip_stations: Vec<String>,
    /// Baseline pair skip set, copied into every period's run.
    pub skip_pairs: Vec<PairKey>,
}

impl Default for TomoConfig {
    fn default() -> Self {
        TomoConfig {
            lon_step: 1.0,
            lat_step: 1.0,
            grid_margin_steps: 0.0,
            min_snr: 7.0,
            min_snr_nosdev: 15.0,
            max_sdev: 0.1,
            max_period_factor: 1.0 / 12.0,
            min_trimester_count: 4,
            correlation_length: 150.0,
            alpha: 400.0,
            beta: 200.0,
            lambda_: 0.3,
            vtype: VType::Group,
            min_paths: 3,
            skip_stations: Vec::new(),
            skip_pairs: Vec::new(),
        }
    }
}

impl TomoConfig {
    /// Validate the setup before any inversion starts. Violations are fatal
    /// configuration errors, not per-pass aborts.
    pub fn validate(&self) -> Result<(), TomoError> {
        if !(self.lon_step.is_finite() && self.lon_step > 0.0)
            || !(self.lat_step.is_finite() && self.lat_step > 0.0)
        {
            return Err(TomoError::Configuration(format!(
                "grid steps must be finite and > 0 (lon_step={}, lat_step={})",
                self.lon_step, self.lat_step
            )));
        }
        if !(self.grid_margin_steps.is_finite() && self.grid_margin_steps >= 0.0) {
            return Err(TomoError::Configuration(format!(
                "grid margin must be finite and >= 0 (got {})",
                self.grid_margin_steps
            )));
        }
        if !(self.correlation_length.is_finite() && self.correlation_length > 0.0) {
            return Err(TomoError::Configuration(format!(
                "correlation length must be finite and > 0 (got {})",
                self.correlation_length
            )));
        }
        if !(self.max_period_factor.is_finite() && self.max_period_factor > 0.0) {
            return Err(TomoError::Configuration(format!(
                "max period factor must be finite and > 0 (got {})",
                self.max_period_factor
            )));
        }
        if self.min_trimester_count == 0 {
            return Err(TomoError::Configuration(
                "min trimester count must be >= 1".into(),
            ));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0)
            || !(self.beta.is_finite() && self.beta >= 0.0)
            || !(self.lambda_.is_finite() && self.lambda_ >= 0.0)
        {
            return Err(TomoError::Configuration(format!(
                "regularization strengths must be finite and >= 0 \
                 (alpha={}, beta={}, lambda={})",
                self.alpha, self.beta, self.lambda_
            )));
        }
        Ok(())
    }

    /// Layer explicit overrides on top of these defaults, returning the
    /// resolved configuration. `self` is never mutated.
    pub fn with_overrides(&self, ov: &TomoOverrides) -> TomoConfig {
        let mut out = self.clone();
        if let Some(v) = ov.lon_step {
            out.lon_step = v;
        }
        if let Some(v) = ov.lat_step {
            out.lat_step = v;
        }
        if let Some(v) = ov.min_snr {
            out.min_snr = v;
        }
        if let Some(v) = ov.min_snr_nosdev {
            out.min_snr_nosdev = v;
        }
        if let Some(v) = ov.max_sdev {
            out.max_sdev = v;
        }
        if let Some(v) = ov.max_period_factor {
            out.max_period_factor = v;
        }
        if let Some(v) = ov.min_trimester_count {
            out.min_trimester_count = v;
        }
        if let Some(v) = ov.correlation_length {
            out.correlation_length = v;
        }
        if let Some(v) = ov.alpha {
            out.alpha = v;
        }
        if let Some(v) = ov.beta {
            out.beta = v;
        }
        if let Some(v) = ov.lambda_ {
            out.lambda_ = v;
        }
        if let Some(v) = ov.vtype {
            out.vtype = v;
        }
        if let Some(ref v) = ov.skip_stations {
            out.skip_stations = v.clone();
        }
        if let Some(ref v) = ov.skip_pairs {
            out.skip_pairs = v.clone();
        }
        out
    }

    /// Baseline skip set for a new period's run.
    pub fn baseline_skip_set(&self) -> SkipSet {
        self.skip_pairs.iter().cloned().collect()
    }
}

/// Per-call override layer: every field optional, merged explicitly by
/// [`TomoConfig::with_overrides`].
#[derive(Debug, Clone, Default)]
pub struct TomoOverrides {
    pub lon_step: Option<f64>,
    pub lat_step: Option<f64>,
    pub min_snr: Option<f64>,
    pub min_snr_nosdev: Option<f64>,
    pub max_sdev: Option<f64>,
    pub max_period_factor: Option<f64>,
    pub min_trimester_count: Option<usize>,
    pub correlation_length: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub lambda_: Option<f64>,
    pub vtype: Option<VType>,
    pub skip_stations: Option<Vec<String>>,
    pub skip_pairs: Option<Vec<PairKey>>,
}

/// Tunables that vary between passes of a multi-pass inversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassParams {
    pub grid_step: f64,
    pub min_snr: f64,
    pub correlation_length: f64,
    pub alpha: f64,
    pub beta: f64,
    pub lambda_: f64,
}

impl PassParams {
    /// Resolve the base configuration with this pass's tunables applied.
    pub fn apply(&self, base: &TomoConfig) -> TomoConfig {
        let mut out = base.clone();
        out.lon_step = self.grid_step;
        out.lat_step = self.grid_step;
        out.min_snr = self.min_snr;
        out.correlation_length = self.correlation_length;
        out.alpha = self.alpha;
        out.beta = self.beta;
        out.lambda_ = self.lambda_;
        out
    }
}

/// Build per-pass parameter sets from per-tunable lists.
///
/// Length-1 lists broadcast to all passes (the original broadcasts scalars
/// with `np.ones(npass)`); any other length mismatch is a fatal
/// configuration error.
pub fn build_pass_params(
    npass: usize,
    grid_steps: &[f64],
    min_snrs: &[f64],
    corr_lengths: &[f64],
    alphas: &[f64],
    betas: &[f64],
    lambdas: &[f64],
) -> Result<Vec<PassParams>, TomoError> {
    if npass == 0 {
        return Err(TomoError::Configuration("need at least one pass".into()));
    }
    let pick = |name: &str, values: &[f64], i: usize| -> Result<f64, TomoError> {
        match values.len() {
            1 => Ok(values[0]),
            n if n == npass => Ok(values[i]),
            n => Err(TomoError::Configuration(format!(
                "{name}: got {n} values for {npass} passes (expected 1 or {npass})"
            ))),
        }
    };
    (0..npass)
        .map(|i| {
            Ok(PassParams {
                grid_step: pick("grid steps", grid_steps, i)?,
                min_snr: pick("min SNRs", min_snrs, i)?,
                correlation_length: pick("correlation lengths", corr_lengths, i)?,
                alpha: pick("alphas", alphas, i)?,
                beta: pick("betas", betas, i)?,
                lambda_: pick("lambdas", lambdas, i)?,
            })
        })
        .collect()
}
