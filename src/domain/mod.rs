//! Shared domain types: dispersion-curve records, station-pair identities,
//! skip sets, and the tomography configuration surface.

mod types;

pub use types::*;
