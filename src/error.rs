use isahc::http::StatusCode;
use thiserror::Error;

/// Invalid command line configuration, rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("URL not provided")]
    EmptyUrl,
    #[error("Invalid URL \"{url}\": {reason}")]
    InvalidUrl {
        url: String,
        reason: String,
    },
    #[error("Unsupported URL scheme \"{0}\" (expected http or https)")]
    UnsupportedScheme(String),
    #[error("Invalid number of concurrent requests: must be at least 1")]
    ZeroConcurrency,
    #[error("Invalid number of concurrent requests: {given} exceeds the limit of {max}")]
    ConcurrencyTooHigh {
        given: usize,
        max: usize,
    },
    #[error("Invalid number of threads: must be at least 1")]
    ZeroThreads,
    #[error("Invalid value for {0}: must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("Invalid duration \"{0}\" (examples: 500ms, 10s, 1m, 1h)")]
    InvalidDuration(String),
}

/// Why a single probe was classified as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("non-OK HTTP status: {0}")]
    NonSuccessStatus(StatusCode),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

/// Statistics are undefined over an empty sample set.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StatsError {
    #[error("no latency samples")]
    EmptyInput,
    #[error("percentile {0} is outside (0, 100]")]
    InvalidPercentile(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("only {received} of {expected} workers reported their results")]
    MissingResults {
        expected: usize,
        received: usize,
    },
}

/// Top level failure of the binary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] isahc::Error),
    #[error("failed to create tokio runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Run(#[from] RunError),
}
