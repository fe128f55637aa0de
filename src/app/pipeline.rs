//! Shared pipeline logic behind the `invert` and `lcurve` subcommands.
//!
//! Both commands follow the same outer shape: load and validate the curve
//! file once, fan independent (period, parameter) units out over rayon, and
//! collect per-unit results without letting a recoverable failure kill the
//! run. All shared inputs are immutable; each unit owns its skip set.

use log::{info, warn};
use rayon::prelude::*;

use crate::cli::{parse_pair, InvertArgs, LcurveArgs};
use crate::domain::{build_pass_params, TomoConfig, TomoOverrides};
use crate::error::TomoError;
use crate::io::curves::read_curve_files;
use crate::io::maps::write_maps;
use crate::report::{format_period_summary, lcurve_line, ordinal};
use crate::tomo::inversion::invert;
use crate::tomo::npass::{run_period, PeriodOutcome};

/// Run the N-pass inversion over all requested periods and export the final
/// maps.
pub fn run_invert(args: &InvertArgs) -> Result<(), TomoError> {
    let passes = build_pass_params(
        args.passes,
        &args.grid_steps,
        &args.min_snrs,
        &args.corr_lengths,
        &args.alphas,
        &args.betas,
        &args.lambdas,
    )?;
    if args.periods.is_empty() {
        return Err(TomoError::Configuration("no periods requested".into()));
    }

    let mut config = TomoConfig {
        vtype: args.vtype,
        skip_stations: args.skip_stations.clone(),
        ..TomoConfig::default()
    };
    config.skip_pairs = args
        .skip_pairs
        .iter()
        .map(|s| parse_pair(s))
        .collect::<Result<_, _>>()?;
    config.validate()?;

    let loaded = read_curve_files(&args.inputs)?;
    info!(
        "loaded {} curve(s) from {} file(s) ({} malformed record(s) excluded)",
        loaded.curves.len(),
        args.inputs.len(),
        loaded.n_malformed
    );

    // Periods are independent: each unit reads the shared immutable curves
    // and owns its skip-set copy, so they parallelize freely. Passes within
    // a period stay sequential inside `run_period`.
    let results: Vec<(f64, Result<PeriodOutcome, TomoError>)> = args
        .periods
        .par_iter()
        .map(|&period| (period, run_period(&loaded.curves, period, &config, &passes)))
        .collect();

    let mut maps = Vec::new();
    let mut n_aborted = 0;
    for (period, result) in results {
        match result? {
            PeriodOutcome::Map { map, trace } => {
                print!("{}", format_period_summary(period, &trace));
                maps.push((period, *map));
            }
            PeriodOutcome::Aborted { pass, reason } => {
                println!("period {period} s: abandoned at {} pass: {reason}", ordinal(pass + 1));
                n_aborted += 1;
            }
        }
    }

    println!(
        "{} of {} period(s) inverted ({} abandoned); writing maps to {}",
        maps.len(),
        args.periods.len(),
        n_aborted,
        args.output.display()
    );
    write_maps(&args.output, config.vtype, maps)
}

/// Sweep the regularization hyperparameters with single-pass inversions and
/// write one L-curve line per combination.
pub fn run_lcurve(args: &LcurveArgs) -> Result<(), TomoError> {
    if args.periods.is_empty() {
        return Err(TomoError::Configuration("no periods requested".into()));
    }
    let config = TomoConfig {
        vtype: args.vtype,
        ..TomoConfig::default()
    };
    config.validate()?;

    let loaded = read_curve_files(&args.inputs)?;
    info!(
        "loaded {} curve(s) from {} file(s) ({} malformed record(s) excluded)",
        loaded.curves.len(),
        args.inputs.len(),
        loaded.n_malformed
    );

    // Cartesian product in a fixed nesting order, so the output file is
    // reproducible line for line.
    let mut combos = Vec::new();
    for &period in &args.periods {
        for &grid_step in &args.grid_steps {
            for &min_snr in &args.min_snrs {
                for &corr_length in &args.corr_lengths {
                    for &alpha in &args.alphas {
                        for &beta in &args.betas {
                            for &lambda_ in &args.lambdas {
                                combos.push((
                                    period, grid_step, min_snr, corr_length, alpha, beta, lambda_,
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    let lines: Vec<Option<String>> = combos
        .par_iter()
        .map(|&(period, grid_step, min_snr, corr_length, alpha, beta, lambda_)| {
            let ov = TomoOverrides {
                lon_step: Some(grid_step),
                lat_step: Some(grid_step),
                min_snr: Some(min_snr),
                correlation_length: Some(corr_length),
                alpha: Some(alpha),
                beta: Some(beta),
                lambda_: Some(lambda_),
                ..TomoOverrides::default()
            };
            let cfg = config.with_overrides(&ov);
            match invert(&loaded.curves, period, &cfg, &cfg.baseline_skip_set()) {
                Ok(map) => {
                    let misfit: f64 = map.velocity_residuals().iter().map(|r| r.abs()).sum();
                    Some(lcurve_line(
                        period,
                        grid_step,
                        min_snr,
                        corr_length,
                        alpha,
                        beta,
                        lambda_,
                        misfit,
                        map.model_norm(),
                        map.paths.len(),
                    ))
                }
                Err(e) => {
                    // Configuration problems were caught before the sweep, so
                    // anything surfacing here is a per-combination abort.
                    warn!("skipping combination at period {period} s: {e}");
                    None
                }
            }
        })
        .collect();

    let mut out = String::new();
    let mut n_written = 0;
    for line in lines.into_iter().flatten() {
        out.push_str(&line);
        out.push('\n');
        n_written += 1;
    }
    std::fs::write(&args.output, out).map_err(|e| {
        TomoError::Io(format!(
            "failed to write L-curve file '{}': {e}",
            args.output.display()
        ))
    })?;

    println!(
        "{n_written} of {} combination(s) written to {}",
        combos.len(),
        args.output.display()
    );
    Ok(())
}
