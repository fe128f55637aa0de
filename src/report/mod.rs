//! Formatted terminal/file output: L-curve data lines and per-pass run
//! summaries. Kept in one place so the numerical code stays clean and the
//! exact layouts are easy to snapshot-test.

use crate::domain::PassParams;
use crate::tomo::npass::PassTrace;

/// One fixed-width L-curve line: period, grid step, min SNR, correlation
/// length, alpha, beta, lambda, sum of absolute misfits, model norm, and the
/// path count after a tab. Downstream plotting scripts parse these columns
/// by position, so the layout is load-bearing.
#[allow(clippy::too_many_arguments)]
pub fn lcurve_line(
    period: f64,
    grid_step: f64,
    min_snr: f64,
    corr_length: f64,
    alpha: f64,
    beta: f64,
    lambda_: f64,
    sum_abs_misfit: f64,
    model_norm: f64,
    n_paths: usize,
) -> String {
    format!(
        "{period:5.1}{grid_step:5.1}{min_snr:5.1}{corr_length:8.1}{alpha:8.1}{beta:8.1}\
         {lambda_:8.2}{sum_abs_misfit:10.3}{model_norm:10.3}\t{n_paths}"
    )
}

/// English ordinal for 1-based pass numbers ("1st", "2nd", "3rd", "4th", ...).
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Summary printed when a pass starts.
pub fn format_pass_header(pass_1based: usize, n_skipped: usize, p: &PassParams) -> String {
    format!(
        "{} pass (rejecting {} pairs): grid step = {}, min SNR = {}, \
         corr. length = {} km, alpha = {}, beta = {}, lambda = {}",
        ordinal(pass_1based),
        n_skipped,
        p.grid_step,
        p.min_snr,
        p.correlation_length,
        p.alpha,
        p.beta,
        p.lambda_
    )
}

/// One line per completed pass of a finished period.
pub fn format_period_summary(period: f64, trace: &[PassTrace]) -> String {
    let mut out = String::new();
    out.push_str(&format!("period {period} s:\n"));
    for t in trace {
        out.push_str(&format!(
            "  {} pass: {} paths, residual std = {:.4} s, {} rejected for next pass\n",
            ordinal(t.pass + 1),
            t.n_paths,
            t.residual_std,
            t.n_rejected
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcurve_line_layout_is_fixed_width() {
        let line = lcurve_line(8.0, 0.3, 7.0, 100.0, 400.0, 50.0, 0.3, 12.345, 0.067, 42);
        assert_eq!(
            line,
            "  8.0  0.3  7.0   100.0   400.0    50.0    0.30    12.345     0.067\t42"
        );
        // Column boundaries survive value changes.
        let wide = lcurve_line(26.0, 0.3, 15.0, 1500.0, 800.0, 200.0, 0.15, 123.456, 12.3, 7);
        assert_eq!(wide[0..5].trim(), "26.0");
        assert_eq!(wide[15..23].trim(), "1500.0");
        assert!(wide.contains('\t'));
    }

    #[test]
    fn ordinals_follow_english_rules() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(21), "21st");
    }

    #[test]
    fn pass_header_mentions_skip_count() {
        let p = PassParams {
            grid_step: 0.3,
            min_snr: 5.0,
            correlation_length: 100.0,
            alpha: 400.0,
            beta: 50.0,
            lambda_: 0.3,
        };
        let s = format_pass_header(1, 4, &p);
        assert!(s.starts_with("1st pass (rejecting 4 pairs)"));
        assert!(s.contains("alpha = 400"));
    }
}
