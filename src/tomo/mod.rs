//! The tomographic inversion engine (Barmin et al., 2001).
//!
//! Pipeline, leaf to root:
//!
//! - [`select`]: quality-filter dispersion measurements for one period
//! - [`grid`]: regular lon/lat node grid over the station footprint
//! - [`paths`]: sparse path-sensitivity rows G and per-node path density
//! - [`regularization`]: smoothing operator L and norm-penalty weights
//! - [`inversion`]: damped weighted least-squares solve -> [`inversion::VelocityMap`]
//! - [`residuals`]: misfit statistics and the outlier predicate
//! - [`npass`]: the multi-pass outlier-rejection control loop
//!
//! Everything here is pure, synchronous and CPU-bound: no I/O, no shared
//! mutable state. Independent (period, parameter) units can run in parallel;
//! passes within one period are strictly sequential.

pub mod grid;
pub mod inversion;
pub mod npass;
pub mod paths;
pub mod regularization;
pub mod residuals;
pub mod select;
