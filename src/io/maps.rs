//! Write final velocity maps to a JSON document.
//!
//! The schema is the portable counterpart of the original per-file pickle:
//! one document per (input file, vtype) holding the final map of every
//! period that survived its multi-pass run.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::VType;
use crate::error::TomoError;
use crate::tomo::inversion::VelocityMap;

/// A saved map file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFile {
    pub tool: String,
    pub vtype: VType,
    /// Final map per period, sorted by period.
    pub maps: Vec<PeriodEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub period: f64,
    pub map: VelocityMap,
}

/// Write the final maps. `maps` need not be sorted; the document is.
pub fn write_maps(path: &Path, vtype: VType, maps: Vec<(f64, VelocityMap)>) -> Result<(), TomoError> {
    let mut entries: Vec<PeriodEntry> = maps
        .into_iter()
        .map(|(period, map)| PeriodEntry { period, map })
        .collect();
    entries.sort_by(|a, b| a.period.total_cmp(&b.period));

    let doc = MapFile {
        tool: "tomo".to_string(),
        vtype,
        maps: entries,
    };

    let file = File::create(path)
        .map_err(|e| TomoError::Io(format!("failed to create map file '{}': {e}", path.display())))?;
    serde_json::to_writer(BufWriter::new(file), &doc)
        .map_err(|e| TomoError::Io(format!("failed to write map file: {e}")))?;
    Ok(())
}

/// Read a map file back (for downstream plotting or comparisons).
pub fn read_maps(path: &Path) -> Result<MapFile, TomoError> {
    let file = File::open(path)
        .map_err(|e| TomoError::Io(format!("failed to open map file '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| TomoError::Io(format!("invalid map file '{}': {e}", path.display())))
}
