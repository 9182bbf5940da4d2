use std::time::Duration;
use clap::Parser;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUESTS: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Upper bound on concurrent workers; every worker may hold an open connection.
pub const MAX_CONCURRENCY: usize = 10_000;

// Command line configuration of a run
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "loadprobe", version, about = "Concurrent HTTP load generator")]
pub struct Config {
    /// URL to send GET requests to
    #[arg(short = 'u', long, default_value = DEFAULT_URL)]
    pub url: String,

    /// Total number of requests
    #[arg(short = 'n', long, default_value_t = DEFAULT_REQUESTS)]
    pub requests: usize,

    /// Number of concurrent workers (also bounds the connection pool)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Number of runtime worker threads (Default: one per CPU)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Timeout for the whole request/response cycle including DNS resolution
    #[arg(short = 'T', long, default_value = "25s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Timeout for establishing the connection only
    #[arg(short = 'C', long, default_value = "20s", value_parser = parse_duration)]
    pub connection_timeout: Duration,

    /// How long an idle pooled connection is kept
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub idle_timeout: Duration,

    /// Also print the latency distribution and histogram
    #[arg(short = 'd', long)]
    pub detailed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: DEFAULT_URL.to_string(),
            requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
            threads: None,
            timeout: Duration::from_secs(25),
            connection_timeout: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(1),
            detailed: false,
        }
    }
}

impl Config {
    /// Rejects configurations that cannot start a run.
    ///
    /// `requests == 0` is valid and produces an empty report.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        let parsed = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::ConcurrencyTooHigh {
                given: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::ZeroThreads);
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("timeout"));
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("connection-timeout"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("idle-timeout"));
        }
        Ok(())
    }
}

/// Parses `500ms`, `10s`, `1m` or `1h`. A bare number is taken as seconds.
pub fn parse_duration(duration_str: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(duration_str.to_string());

    let trimmed = duration_str.trim();
    // split into value and unit
    let (value_str, unit) = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, "s"),
    };
    let value: u64 = value_str.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs).ok_or_else(invalid),
        "h" => value.checked_mul(60 * 60).map(Duration::from_secs).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}
