//! Command-line parsing for the tomography driver.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the numerical code. Comma-separated lists mirror
//! the per-pass / per-sweep parameter lists of the original drivers;
//! single-valued lists broadcast across passes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{PairKey, VType};
use crate::error::TomoError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "tomo",
    version,
    about = "Surface-wave travel-time tomography (Barmin et al., 2001)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the N-pass inversion over a set of periods and export the final
    /// velocity maps as JSON.
    Invert(InvertArgs),
    /// Sweep regularization hyperparameters with single-pass inversions and
    /// write one fixed-width (misfit, norm) line per combination.
    Lcurve(LcurveArgs),
}

/// Options for the multi-pass inversion.
#[derive(Debug, Parser, Clone)]
pub struct InvertArgs {
    /// Dispersion-curve JSON file (repeatable; files merge into one
    /// working set).
    #[arg(long = "input", value_name = "JSON", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output velocity-map JSON file.
    #[arg(long, value_name = "JSON")]
    pub output: PathBuf,

    /// Periods to invert (s).
    #[arg(long, value_delimiter = ',', required = true)]
    pub periods: Vec<f64>,

    /// Number of inversion passes.
    #[arg(long, default_value_t = 3)]
    pub passes: usize,

    /// Grid step per pass (degrees); a single value broadcasts.
    #[arg(long = "grid-step", value_delimiter = ',', default_values_t = [0.3])]
    pub grid_steps: Vec<f64>,

    /// Minimum spectral SNR per pass; a single value broadcasts.
    #[arg(long = "min-snr", value_delimiter = ',', default_values_t = [5.0])]
    pub min_snrs: Vec<f64>,

    /// Smoothing correlation length per pass (km); a single value broadcasts.
    #[arg(long = "corr-length", value_delimiter = ',', default_values_t = [100.0])]
    pub corr_lengths: Vec<f64>,

    /// Smoothing strength per pass; a single value broadcasts.
    #[arg(long = "alpha", value_delimiter = ',', default_values_t = [400.0, 250.0, 150.0])]
    pub alphas: Vec<f64>,

    /// Norm-penalization strength per pass; a single value broadcasts.
    #[arg(long = "beta", value_delimiter = ',', default_values_t = [50.0])]
    pub betas: Vec<f64>,

    /// Norm-penalization density decay per pass; a single value broadcasts.
    #[arg(long = "lambda", value_delimiter = ',', default_values_t = [0.3])]
    pub lambdas: Vec<f64>,

    /// Velocity branch to invert.
    #[arg(long, value_enum, default_value_t = VType::Group)]
    pub vtype: VType,

    /// Station to exclude wholesale (repeatable).
    #[arg(long = "skip-station", value_name = "NAME")]
    pub skip_stations: Vec<String>,

    /// Station pair to exclude from every pass, as STA1/STA2 (repeatable).
    #[arg(long = "skip-pair", value_name = "STA1/STA2")]
    pub skip_pairs: Vec<String>,
}

/// Options for the L-curve parameter sweep.
#[derive(Debug, Parser, Clone)]
pub struct LcurveArgs {
    /// Dispersion-curve JSON file (repeatable; files merge into one
    /// working set).
    #[arg(long = "input", value_name = "JSON", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output data file (one fixed-width line per combination).
    #[arg(long, value_name = "DAT")]
    pub output: PathBuf,

    /// Periods to sweep (s).
    #[arg(long, value_delimiter = ',', required = true)]
    pub periods: Vec<f64>,

    /// Grid steps to sweep (degrees).
    #[arg(long = "grid-steps", value_delimiter = ',', default_values_t = [0.3])]
    pub grid_steps: Vec<f64>,

    /// Minimum spectral SNRs to sweep.
    #[arg(long = "min-snrs", value_delimiter = ',', default_values_t = [7.0])]
    pub min_snrs: Vec<f64>,

    /// Correlation lengths to sweep (km).
    #[arg(long = "corr-lengths", value_delimiter = ',',
          default_values_t = [10.0, 30.0, 50.0, 100.0, 150.0])]
    pub corr_lengths: Vec<f64>,

    /// Smoothing strengths to sweep.
    #[arg(long = "alphas", value_delimiter = ',',
          default_values_t = [50.0, 100.0, 200.0, 400.0, 800.0])]
    pub alphas: Vec<f64>,

    /// Norm-penalization strengths to sweep.
    #[arg(long = "betas", value_delimiter = ',',
          default_values_t = [10.0, 20.0, 40.0, 80.0, 200.0])]
    pub betas: Vec<f64>,

    /// Density decay rates to sweep.
    #[arg(long = "lambdas", value_delimiter = ',', default_values_t = [0.15, 0.3])]
    pub lambdas: Vec<f64>,

    /// Velocity branch to invert.
    #[arg(long, value_enum, default_value_t = VType::Group)]
    pub vtype: VType,
}

/// Parse a `STA1/STA2` pair specification.
pub fn parse_pair(spec: &str) -> Result<PairKey, TomoError> {
    match spec.split_once('/') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok(PairKey::new(a, b)),
        _ => Err(TomoError::Configuration(format!(
            "invalid pair '{spec}' (expected STA1/STA2)"
        ))),
    }
}
