use std::sync::Arc;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::time::Duration;
use async_trait::async_trait;
use isahc::http::StatusCode;
use loadprobe::runner::aggregate;
use loadprobe::{ Config, HttpClient, PartialResult, ProbeError, Report, RunError, Runner, StatsError };
use tokio::sync::mpsc;

// Helper: client whose reply depends on the 0-based call number.
struct ScriptedClient<F> {
    calls: AtomicUsize,
    delay: Duration,
    reply: F,
}

impl<F> ScriptedClient<F> where F: Fn(usize) -> Result<StatusCode, ProbeError> + Send + Sync {
    fn new(reply: F) -> Arc<Self> {
        Self::with_delay(Duration::ZERO, reply)
    }

    fn with_delay(delay: Duration, reply: F) -> Arc<Self> {
        Arc::new(ScriptedClient { calls: AtomicUsize::new(0), delay, reply })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> HttpClient for ScriptedClient<F>
    where F: Fn(usize) -> Result<StatusCode, ProbeError> + Send + Sync
{
    async fn get(&self, _url: &str) -> Result<StatusCode, ProbeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.reply)(call)
    }
}

fn config(requests: usize, concurrency: usize) -> Config {
    Config {
        url: "http://127.0.0.1:1/".to_string(),
        requests,
        concurrency,
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_ok_counts_every_request() {
    let client = ScriptedClient::new(|_: usize| Ok(StatusCode::OK));
    let runner = Runner::new(config(100, 10), client.clone());

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.aggregate.total_success, 100);
    assert_eq!(summary.aggregate.total_failure, 0);
    assert_eq!(summary.aggregate.latencies.len(), 100);
    assert_eq!(client.calls(), 100);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_always_500_yields_undefined_latency() {
    let client = ScriptedClient::new(|_: usize| Ok(StatusCode::INTERNAL_SERVER_ERROR));
    let runner = Runner::new(config(5, 1), client.clone());

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.aggregate.total_success, 0);
    assert_eq!(summary.aggregate.total_failure, 5);
    assert_eq!(client.calls(), 5);

    let report = Report::build(&summary);
    assert_eq!(report.mean(), Err(StatsError::EmptyInput));
    assert_eq!(report.p99(), Err(StatsError::EmptyInput));
    assert!(report.to_string().contains("Mean latency: undefined"));
}

#[tokio::test]
async fn test_zero_requests_produces_empty_report() {
    let client = ScriptedClient::new(|_: usize| Ok(StatusCode::OK));
    let runner = Runner::new(config(0, 4), client.clone());

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.aggregate.total_requests(), 0);
    assert_eq!(client.calls(), 0);

    let report = Report::build(&summary);
    assert_eq!(report.total_requests, 0);
    assert!(report.latency.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_token_lost_or_duplicated() {
    for (requests, concurrency) in [(1, 1), (7, 20), (10, 3), (257, 16), (2000, 64)] {
        let client = ScriptedClient::new(|call: usize| {
            if call % 3 == 0 {
                Err(ProbeError::Transport("connection reset".to_string()))
            } else {
                Ok(StatusCode::OK)
            }
        });
        let runner = Runner::new(config(requests, concurrency), client.clone());
        let summary = runner.run().await.unwrap();

        assert_eq!(
            summary.aggregate.total_requests(),
            requests,
            "n={requests} c={concurrency}"
        );
        assert_eq!(client.calls(), requests);
        assert_eq!(summary.aggregate.latencies.len(), summary.aggregate.total_success);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mixed_outcomes_are_classified() {
    let client = ScriptedClient::new(|call: usize| match call % 4 {
        0 => Ok(StatusCode::OK),
        1 => Ok(StatusCode::NOT_FOUND),
        2 => Err(ProbeError::Timeout("deadline".to_string())),
        _ => Ok(StatusCode::OK),
    });
    let runner = Runner::new(config(40, 5), client);

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.aggregate.total_success, 20);
    assert_eq!(summary.aggregate.total_failure, 20);
    assert_eq!(summary.aggregate.timeouts, 10);
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let client = ScriptedClient::new(|_: usize| Ok(StatusCode::OK));
    let runner = Runner::new(config(50, 5), client.clone());
    runner.cancel_handle().store(true, Ordering::SeqCst);

    let summary = runner.run().await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.aggregate.total_requests(), 0);
    assert_eq!(client.calls(), 0);
    assert!(Report::build(&summary).to_string().contains("Interrupted: 0 of 50"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_mid_run_stops_early() {
    let client = ScriptedClient::with_delay(Duration::from_millis(5), |_: usize| Ok(StatusCode::OK));
    let runner = Runner::new(config(10_000, 2), client.clone());
    let cancel = runner.cancel_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.store(true, Ordering::SeqCst);
    });

    let summary = runner.run().await.unwrap();
    assert!(summary.cancelled);
    assert!(summary.aggregate.total_requests() < 10_000);
    // every request that started was counted
    assert_eq!(summary.aggregate.total_requests(), client.calls());
}

#[tokio::test]
async fn test_dyn_client_is_accepted() {
    let client: Arc<dyn HttpClient> = ScriptedClient::new(|_: usize| Ok(StatusCode::OK));
    let runner = Runner::new(config(3, 2), client);
    let summary = runner.run().await.unwrap();
    assert_eq!(summary.aggregate.total_success, 3);
}

#[tokio::test]
async fn test_aggregate_is_order_independent() {
    let partials = vec![
        PartialResult {
            success_count: 2,
            failure_count: 0,
            timeouts: 0,
            latencies: vec![Duration::from_millis(5), Duration::from_millis(9)],
        },
        PartialResult {
            success_count: 0,
            failure_count: 3,
            timeouts: 1,
            latencies: vec![],
        },
        PartialResult {
            success_count: 1,
            failure_count: 1,
            timeouts: 0,
            latencies: vec![Duration::from_millis(2)],
        }
    ];

    let (tx, mut rx) = mpsc::channel(3);
    for partial in partials.iter().cloned() {
        tx.send(partial).await.unwrap();
    }
    let forward = aggregate(&mut rx, 3).await.unwrap();

    let (tx, mut rx) = mpsc::channel(3);
    for partial in partials.iter().rev().cloned() {
        tx.send(partial).await.unwrap();
    }
    let backward = aggregate(&mut rx, 3).await.unwrap();

    assert_eq!(forward.total_success, backward.total_success);
    assert_eq!(forward.total_failure, backward.total_failure);
    assert_eq!(forward.timeouts, backward.timeouts);

    let mut a = forward.latencies.clone();
    let mut b = backward.latencies.clone();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
}

#[tokio::test]
async fn test_aggregate_reports_missing_workers() {
    let (tx, mut rx) = mpsc::channel(3);
    tx.send(PartialResult::default()).await.unwrap();
    drop(tx);

    let err = aggregate(&mut rx, 3).await.unwrap_err();
    assert_eq!(err, RunError::MissingResults { expected: 3, received: 1 });
}
