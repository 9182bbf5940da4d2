use std::io;
use std::time::Duration;
use async_trait::async_trait;
use isahc::{
    HttpClient as IsahcHttpClient,
    HttpClientBuilder,
    config::Configurable,
    error::ErrorKind,
    http::StatusCode,
    AsyncReadResponseExt,
};
use tokio::time::Instant;

use crate::config::Config;
use crate::error::ProbeError;

/// Transport used by the probe: one plain GET, body fully drained.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Returns the response status once the body has been read to the end,
    /// which releases the connection back to the pool.
    async fn get(&self, url: &str) -> Result<StatusCode, ProbeError>;
}

/// Result of one timed request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success(Duration),
    Failure(ProbeError),
}

/// Sends one GET to `url` and classifies it. Only a 200 counts as a success.
pub async fn probe<C>(client: &C, url: &str) -> ProbeOutcome where C: HttpClient + ?Sized {
    let start = Instant::now();
    let result = client.get(url).await;
    let latency = start.elapsed();

    match result {
        Ok(status) if status == StatusCode::OK => ProbeOutcome::Success(latency),
        Ok(status) => ProbeOutcome::Failure(ProbeError::NonSuccessStatus(status)),
        Err(err) => ProbeOutcome::Failure(err),
    }
}

/// [`HttpClient`] backed by isahc, with its pool sized to the concurrency level.
#[derive(Debug, Clone)]
pub struct IsahcClient {
    client: IsahcHttpClient,
}

impl IsahcClient {
    pub fn new(config: &Config) -> Result<Self, isahc::Error> {
        let client = HttpClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .max_connections_per_host(config.concurrency)
            .connection_cache_size(config.concurrency)
            .connection_cache_ttl(config.idle_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for IsahcClient {
    async fn get(&self, url: &str) -> Result<StatusCode, ProbeError> {
        let mut response = self.client.get_async(url).await.map_err(classify_error)?;
        response.consume().await.map_err(classify_body_error)?;
        Ok(response.status())
    }
}

fn classify_error(err: isahc::Error) -> ProbeError {
    if matches!(err.kind(), ErrorKind::Timeout) {
        ProbeError::Timeout(err.to_string())
    } else {
        ProbeError::Transport(err.to_string())
    }
}

// isahc surfaces failures while streaming the body as io errors
fn classify_body_error(err: io::Error) -> ProbeError {
    let timed_out = err.kind() == io::ErrorKind::TimedOut ||
        err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<isahc::Error>())
            .is_some_and(|inner| matches!(inner.kind(), ErrorKind::Timeout));

    if timed_out {
        ProbeError::Timeout(err.to_string())
    } else {
        ProbeError::Transport(err.to_string())
    }
}
