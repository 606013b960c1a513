// Arithmetic shared by the derived metric formulas
//
// Every helper returns 0.0 instead of dividing by zero, so a unit whose
// counters have not moved yet still yields a full row.

use crate::error::{PmcError, Result};

pub const CACHELINE_BYTES: f64 = 64.0;

pub fn checked_ratio(metric: &str, numerator: f64, denominator: f64) -> Result<f64> {
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(PmcError::DivideByZeroMetric(metric.to_string()));
    }
    Ok(numerator / denominator)
}

pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    checked_ratio("ratio", numerator, denominator).unwrap_or(0.0)
}

pub fn percent(part: f64, whole: f64) -> f64 {
    ratio(part, whole) * 100.0
}

/// Events per thousand instructions
pub fn per_kilo(events: f64, instructions: f64) -> f64 {
    ratio(events, instructions) * 1000.0
}

/// GB/s moved by `lines` cache lines per second
pub fn bandwidth_gbps(lines: f64) -> f64 {
    lines * CACHELINE_BYTES / 1e9
}
