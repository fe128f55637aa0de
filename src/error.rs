//! Error taxonomy for the tomography engine and its drivers.
//!
//! Two kinds of failures flow through the crate:
//!
//! - *recoverable* per-unit failures (`InsufficientData`, `IllConditioned`):
//!   a single (period, pass) inversion cannot proceed; the caller skips that
//!   unit and continues with the rest of the run
//! - *fatal* setup failures (`Configuration`, `Io`): detected before any
//!   inversion starts, abort the whole command
//!
//! Malformed input records are handled separately: the loader excludes and
//! counts them without raising (see `io::curves`).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TomoError {
    /// Inconsistent setup (bad grid steps, mismatched per-pass parameter
    /// lists, empty period list). Fatal before any inversion runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Too few stations, paths, or grid nodes to attempt an inversion.
    /// Recoverable: the caller abandons the period/pass and moves on.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The normal-equations matrix is singular or too ill-conditioned for a
    /// trustworthy solve. Recoverable, same caller policy as
    /// `InsufficientData`.
    #[error("ill-conditioned system: {0}")]
    IllConditioned(String),

    /// File-level I/O or (de)serialization failure.
    #[error("{0}")]
    Io(String),
}

impl TomoError {
    /// Process exit code for the binary (2 = setup, 3 = data, 4 = numerics).
    pub fn exit_code(&self) -> u8 {
        match self {
            TomoError::Configuration(_) | TomoError::Io(_) => 2,
            TomoError::InsufficientData(_) => 3,
            TomoError::IllConditioned(_) => 4,
        }
    }

    /// Whether a multi-period run should survive this failure and continue
    /// with the remaining periods/parameter sets.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TomoError::InsufficientData(_) | TomoError::IllConditioned(_)
        )
    }
}
