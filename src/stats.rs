//! Latency statistics over the successful samples of a run.
//!
//! Percentiles use the nearest-rank estimator rounded up:
//! `index = ceil(p / 100 * count) - 1` into the ascending samples. No
//! interpolation happens between neighbouring samples.

use std::time::Duration;

use crate::error::StatsError;

/// Returns the `p`-th percentile of `samples`. The input order does not matter.
pub fn percentile(samples: &[Duration], p: f64) -> Result<Duration, StatsError> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    percentile_sorted(&sorted, p)
}

/// Same as [`percentile`] for samples already sorted ascending.
pub fn percentile_sorted(sorted: &[Duration], p: f64) -> Result<Duration, StatsError> {
    if sorted.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    if !p.is_finite() || p <= 0.0 || p > 100.0 {
        return Err(StatsError::InvalidPercentile(p));
    }

    let rank = ((p / 100.0) * (sorted.len() as f64)).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Ok(sorted[index])
}

/// Arithmetic mean, exact to the nanosecond.
pub fn mean(samples: &[Duration]) -> Result<Duration, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let avg = total / (samples.len() as u128);
    Ok(Duration::from_nanos(avg as u64))
}
