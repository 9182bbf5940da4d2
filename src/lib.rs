//! Concurrent HTTP load generator.
//!
//! A run hands `requests` work tokens to `concurrency` workers. Each worker
//! probes the target once per token, keeps its own counts and latencies, and
//! hands them over once the tokens run out. The merged result feeds the
//! nearest-rank percentile engine and the text report.

pub mod config;
pub mod error;
pub mod probe;
pub mod report;
pub mod runner;
pub mod stats;

pub use config::Config;
pub use error::{ ConfigError, Error, ProbeError, RunError, StatsError };
pub use probe::{ probe, HttpClient, IsahcClient, ProbeOutcome };
pub use report::Report;
pub use runner::{ AggregateResult, PartialResult, RunSummary, Runner };
