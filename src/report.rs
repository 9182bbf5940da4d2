use std::fmt::{ self, Write };
use std::time::Duration;

use crate::error::StatsError;
use crate::runner::RunSummary;
use crate::stats::{ mean, percentile_sorted };

const FIELD_WIDTH: usize = 24; //  width of each field for the detailed view
const BUCKET_COUNT: usize = 10; // size of the histogram
const UNDEFINED_LATENCY: &str = "undefined (no successful requests)";

/// Latency figures over the successful requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p99: Duration,
    pub max: Duration,
    pub histogram: Vec<HistogramBucket>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    pub lower: Duration,
    pub upper: Duration,
    pub count: usize,
}

impl LatencyStats {
    pub fn from_samples(samples: &[Duration]) -> Result<Self, StatsError> {
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let mean = mean(&sorted)?;
        let p99 = percentile_sorted(&sorted, 99.0)?;
        Ok(LatencyStats {
            min: sorted[0],
            mean,
            p50: percentile_sorted(&sorted, 50.0)?,
            p75: percentile_sorted(&sorted, 75.0)?,
            p90: percentile_sorted(&sorted, 90.0)?,
            p99,
            max: sorted[sorted.len() - 1],
            histogram: histogram(&sorted),
        })
    }
}

/// Final, read-only view of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub total_requests: usize, // successful + failed
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub timeouts: usize,
    pub requested: usize,
    pub concurrency: usize,
    pub duration: Duration,
    pub latency: Result<LatencyStats, StatsError>, // Err(EmptyInput) when nothing succeeded
    pub throughput: Option<f64>, // requests per second, None for a zero duration
    pub cancelled: bool,
}

impl Report {
    pub fn build(summary: &RunSummary) -> Report {
        let aggregate = &summary.aggregate;
        let total_requests = aggregate.total_requests();

        let seconds = summary.elapsed.as_secs_f64();
        let throughput = if seconds > 0.0 {
            Some((total_requests as f64) / seconds)
        } else {
            None
        };

        Report {
            total_requests,
            successful_requests: aggregate.total_success,
            failed_requests: aggregate.total_failure,
            timeouts: aggregate.timeouts,
            requested: summary.requested,
            concurrency: summary.concurrency,
            duration: summary.elapsed,
            latency: LatencyStats::from_samples(&aggregate.latencies),
            throughput,
            cancelled: summary.cancelled,
        }
    }

    pub fn mean(&self) -> Result<Duration, StatsError> {
        self.latency.as_ref().map(|stats| stats.mean).map_err(|err| *err)
    }

    pub fn p99(&self) -> Result<Duration, StatsError> {
        self.latency.as_ref().map(|stats| stats.p99).map_err(|err| *err)
    }

    /// The summary followed by failure breakdown, distribution and histogram.
    pub fn render_detailed(&self) -> String {
        let mut out = self.to_string();
        // writing into a String cannot fail
        let _ = self.write_details(&mut out);
        out
    }

    /*-------------------==| Private/Helpers |==----------------------- */

    fn write_details(&self, out: &mut String) -> fmt::Result {
        writeln!(out)?;
        writeln!(
            out,
            "{:<field_width$}{}",
            "Concurrency Level:",
            self.concurrency,
            field_width = FIELD_WIDTH
        )?;
        if self.failed_requests > 0 {
            writeln!(
                out,
                "{:<field_width$}{} (including timeouts)",
                "Failed Requests:",
                self.failed_requests,
                field_width = FIELD_WIDTH
            )?;
            writeln!(
                out,
                "{:<field_width$}{}",
                "Timeouts:",
                self.timeouts,
                field_width = FIELD_WIDTH
            )?;
        }

        let stats = match &self.latency {
            Ok(stats) => stats,
            Err(_) => return Ok(()), // nothing succeeded, no distribution to show
        };

        writeln!(out)?;
        writeln!(out, "Latency Distribution:")?;
        writeln!(out, " min    {:.2} ms", as_millis(stats.min))?;
        writeln!(out, " 50%    {:.2} ms", as_millis(stats.p50))?;
        writeln!(out, " 75%    {:.2} ms", as_millis(stats.p75))?;
        writeln!(out, " 90%    {:.2} ms", as_millis(stats.p90))?;
        writeln!(out, " 99%    {:.2} ms", as_millis(stats.p99))?;
        writeln!(out, " max    {:.2} ms", as_millis(stats.max))?;

        writeln!(out)?;
        writeln!(out, "{:<15} {:<15} {:>10}", "Range (ms)", "Upper Bound", "Requests")?;
        for bucket in &stats.histogram {
            writeln!(
                out,
                "{:<15.2} {:<15.2} {:>10}",
                as_millis(bucket.lower),
                as_millis(bucket.upper),
                bucket.count
            )?;
        }
        Ok(())
    }
}

// Compatible summary layout, one figure per line.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Benchmark Results:")?;
        writeln!(f, "Total Requests: {}", self.total_requests)?;
        writeln!(f, "Successful Requests: {}", self.successful_requests)?;
        writeln!(f, "Failed Requests: {}", self.failed_requests)?;
        match self.mean() {
            Ok(mean) => writeln!(f, "Mean latency: {:.2} ms", as_millis(mean))?,
            Err(_) => writeln!(f, "Mean latency: {}", UNDEFINED_LATENCY)?,
        }
        match self.p99() {
            Ok(p99) => writeln!(f, "99p of latency: {:.2} ms", as_millis(p99))?,
            Err(_) => writeln!(f, "99p of latency: {}", UNDEFINED_LATENCY)?,
        }
        writeln!(f, "Duration: {:.6} s", self.duration.as_secs_f64())?;
        match self.throughput {
            Some(rps) => writeln!(f, "Transactions per Second: {:.2}", rps)?,
            None => writeln!(f, "Transactions per Second: undefined")?,
        }
        if self.cancelled {
            writeln!(
                f,
                "Interrupted: {} of {} requests were sent",
                self.total_requests,
                self.requested
            )?;
        }
        Ok(())
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Ten equal-width buckets from zero up to the slowest sample.
fn histogram(sorted: &[Duration]) -> Vec<HistogramBucket> {
    let max = sorted.last().copied().unwrap_or_default().as_secs_f64();
    let bucket_size = max / (BUCKET_COUNT as f64);

    let mut counts = vec![0usize; BUCKET_COUNT];
    for latency in sorted {
        let bucket = if bucket_size > 0.0 {
            ((latency.as_secs_f64() / bucket_size) as usize).min(BUCKET_COUNT - 1)
        } else {
            0 // every sample is zero
        };
        counts[bucket] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBucket {
            lower: Duration::from_secs_f64((i as f64) * bucket_size),
            upper: Duration::from_secs_f64(((i as f64) + 1.0) * bucket_size),
            count,
        })
        .collect()
}
