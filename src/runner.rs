use std::sync::{ Arc, atomic::{ AtomicBool, Ordering } };
use std::time::Duration;
use tokio::sync::{ mpsc, Mutex };
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{ debug, warn };

use crate::config::Config;
use crate::error::RunError;
use crate::probe::{ probe, HttpClient, ProbeOutcome };

const TOKEN_BUFFER: usize = 1024; // max tokens waiting in the queue at once

/// One request owed to the target. Only [`distribute`] creates them.
#[derive(Debug)]
pub struct WorkToken(());

/// Consumer side of the token stream, shared by all workers.
///
/// Every token is handed to exactly one caller of [`WorkQueue::next`].
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tokens: Arc<Mutex<mpsc::Receiver<WorkToken>>>,
}

impl WorkQueue {
    /// Next token, or `None` once all of them have been handed out.
    pub async fn next(&self) -> Option<WorkToken> {
        self.tokens.lock().await.recv().await
    }
}

/// Spawns a producer of exactly `total` tokens and closes the stream after the last one.
pub fn distribute(total: usize) -> (WorkQueue, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(total.clamp(1, TOKEN_BUFFER));

    let producer = tokio::spawn(async move {
        for _ in 0..total {
            if sender.send(WorkToken(())).await.is_err() {
                break; // every worker is gone (cancelled run)
            }
        }
        // sender dropped here, which closes the stream
    });

    (WorkQueue { tokens: Arc::new(Mutex::new(receiver)) }, producer)
}

/// Counts and latencies collected by a single worker.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartialResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub timeouts: usize, // failures caused by the client timeout
    pub latencies: Vec<Duration>, // successful requests only
}

impl PartialResult {
    pub fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success(latency) => {
                self.success_count += 1;
                self.latencies.push(latency);
            }
            ProbeOutcome::Failure(err) => {
                self.failure_count += 1;
                if err.is_timeout() {
                    self.timeouts += 1;
                }
            }
        }
    }
}

/// Merge of every worker's [`PartialResult`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregateResult {
    pub total_success: usize,
    pub total_failure: usize,
    pub timeouts: usize,
    pub latencies: Vec<Duration>,
}

impl AggregateResult {
    pub fn merge(&mut self, partial: PartialResult) {
        self.total_success += partial.success_count;
        self.total_failure += partial.failure_count;
        self.timeouts += partial.timeouts;
        self.latencies.extend(partial.latencies);
    }

    pub fn total_requests(&self) -> usize {
        self.total_success + self.total_failure
    }
}

/// Waits for `count` partial results and merges them.
///
/// Fails if the channel closes early, which happens when a worker died
/// without reporting.
pub async fn aggregate(
    results: &mut mpsc::Receiver<PartialResult>,
    count: usize
) -> Result<AggregateResult, RunError> {
    let mut merged = AggregateResult::default();
    for received in 0..count {
        match results.recv().await {
            Some(partial) => merged.merge(partial),
            None => {
                return Err(RunError::MissingResults { expected: count, received });
            }
        }
    }
    Ok(merged)
}

/// Everything the report needs from a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub aggregate: AggregateResult,
    pub requested: usize,
    pub concurrency: usize,
    pub elapsed: Duration, // from before the first token to after the last partial result
    pub cancelled: bool,
}

/// Drives one run: token producer, worker pool and the aggregation barrier.
pub struct Runner<C: ?Sized> {
    config: Config,
    client: Arc<C>,
    cancel: Arc<AtomicBool>,
}

impl<C> Runner<C> where C: HttpClient + ?Sized + 'static {
    /*------------------==| Public Functions |==-------------------------*/
    pub fn new(config: Config, client: Arc<C>) -> Self {
        Self {
            config,
            client,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked by workers between requests. Setting it stops the run early.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sends every request and returns once all workers have reported.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let concurrency = self.config.concurrency;
        debug!(requests = self.config.requests, concurrency, url = %self.config.url, "starting run");

        let start = Instant::now();
        let (queue, producer) = distribute(self.config.requests);
        let (result_sender, mut results) = mpsc::channel(concurrency.max(1));
        let url: Arc<str> = Arc::from(self.config.url.as_str());

        for id in 0..concurrency {
            tokio::spawn(
                Self::worker(
                    id,
                    self.client.clone(),
                    url.clone(),
                    queue.clone(),
                    self.cancel.clone(),
                    result_sender.clone()
                )
            );
        }
        // only the workers may keep these alive
        drop(queue);
        drop(result_sender);

        let merged = aggregate(&mut results, concurrency).await;
        let elapsed = start.elapsed();

        if let Err(err) = producer.await {
            warn!("token producer did not finish cleanly: {}", err);
        }

        let aggregate = merged?;
        debug!(
            success = aggregate.total_success,
            failure = aggregate.total_failure,
            elapsed_ms = elapsed.as_millis() as u64,
            "run finished"
        );

        Ok(RunSummary {
            aggregate,
            requested: self.config.requests,
            concurrency,
            elapsed,
            cancelled: self.cancel.load(Ordering::Relaxed),
        })
    }

    /*-------------------==| Private/Helpers |==----------------------- */

    async fn worker(
        id: usize,
        client: Arc<C>,
        url: Arc<str>,
        queue: WorkQueue,
        cancel: Arc<AtomicBool>,
        results: mpsc::Sender<PartialResult>
    ) {
        let mut partial = PartialResult::default();

        while !cancel.load(Ordering::Relaxed) {
            if queue.next().await.is_none() {
                break;
            }
            let outcome = probe(client.as_ref(), &url).await;
            if let ProbeOutcome::Failure(err) = &outcome {
                warn!(worker = id, "Error: {}", err);
            }
            partial.record(outcome);
        }
        drop(queue);

        debug!(
            worker = id,
            success = partial.success_count,
            failure = partial.failure_count,
            "worker drained"
        );
        if results.send(partial).await.is_err() {
            warn!(worker = id, "result receiver dropped before hand-off");
        }
    }
}
