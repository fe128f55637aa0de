//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that
//! parses CLI arguments and dispatches to the pipeline.

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::error::TomoError;

pub mod pipeline;

/// Entry point for the `tomo` binary.
pub fn run() -> Result<(), TomoError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Invert(args) => pipeline::run_invert(&args),
        Command::Lcurve(args) => pipeline::run_lcurve(&args),
    }
}
