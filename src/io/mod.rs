//! File I/O: dispersion-curve input documents and velocity-map output
//! documents. All engine code stays I/O-free; only drivers touch this module.

pub mod curves;
pub mod maps;
