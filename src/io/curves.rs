//! Load dispersion-curve collections from JSON documents.
//!
//! The input is an ordered sequence of [`DispersionCurve`] records (the
//! output of the upstream FTAN measurement step). Structurally broken
//! records are excluded and counted rather than failing the whole file:
//! a bad record costs one measurement, not a run.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::warn;

use crate::domain::DispersionCurve;
use crate::error::TomoError;

/// Result of loading one curve file.
#[derive(Debug)]
pub struct LoadedCurves {
    pub curves: Vec<DispersionCurve>,
    /// Records excluded by structural validation.
    pub n_malformed: usize,
}

/// Read and validate several curve files, concatenating them into one
/// working set in argument order (measurement campaigns are often split
/// across files upstream).
pub fn read_curve_files(paths: &[PathBuf]) -> Result<LoadedCurves, TomoError> {
    let mut merged = LoadedCurves {
        curves: Vec::new(),
        n_malformed: 0,
    };
    for path in paths {
        let loaded = read_curves(path)?;
        merged.curves.extend(loaded.curves);
        merged.n_malformed += loaded.n_malformed;
    }
    Ok(merged)
}

/// Read and validate a curve file.
pub fn read_curves(path: &Path) -> Result<LoadedCurves, TomoError> {
    let file = File::open(path)
        .map_err(|e| TomoError::Io(format!("failed to open curve file '{}': {e}", path.display())))?;
    let raw: Vec<DispersionCurve> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| TomoError::Io(format!("invalid curve file '{}': {e}", path.display())))?;

    let mut curves = Vec::with_capacity(raw.len());
    let mut n_malformed = 0;
    for (i, c) in raw.into_iter().enumerate() {
        match validate_record(&c) {
            Ok(()) => curves.push(c),
            Err(why) => {
                warn!("excluding malformed curve record #{i} ({}): {why}", c.pair());
                n_malformed += 1;
            }
        }
    }
    Ok(LoadedCurves {
        curves,
        n_malformed,
    })
}

/// Structural validation of one record. Selection-level quality rules do not
/// belong here; this only rejects records the engine cannot interpret.
fn validate_record(c: &DispersionCurve) -> Result<(), String> {
    if c.station1.name == c.station2.name {
        return Err("identical stations".into());
    }
    for st in [&c.station1, &c.station2] {
        if !(st.lon.is_finite() && st.lat.is_finite()) {
            return Err(format!("non-finite position for station {}", st.name));
        }
    }
    if !(c.dist_km.is_finite() && c.dist_km > 0.0) {
        return Err(format!("non-positive distance {}", c.dist_km));
    }
    if c.periods.is_empty() {
        return Err("empty period grid".into());
    }

    let np = c.periods.len();
    let check_branch = |label: &str, b: &crate::domain::BranchSamples| -> Result<(), String> {
        if b.vels.len() != np || b.snrs.len() != np {
            return Err(format!(
                "{label} arrays have {}/{} entries for {np} periods",
                b.vels.len(),
                b.snrs.len()
            ));
        }
        for tri in &b.trimesters {
            if tri.vels.len() != np || tri.snrs.len() != np {
                return Err(format!("{label} trimester arrays inconsistent with period grid"));
            }
        }
        Ok(())
    };
    check_branch("group", &c.group)?;
    if let Some(phase) = &c.phase {
        check_branch("phase", phase)?;
    }
    Ok(())
}
