use std::process::ExitCode;
use std::sync::{ Arc, atomic::Ordering };
use clap::Parser;
use tokio::runtime::{ Builder, Runtime };
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use loadprobe::{ Config, Error, IsahcClient, Report, Runner };

fn main() -> ExitCode {
    let config = Config::parse();
    if let Err(err) = config.validate() {
        eprintln!("{}\nUse --help for more info", err);
        return ExitCode::from(2);
    }

    // flushes buffered log lines when main returns
    let _log_guard = init_tracing();

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<(), Error> {
    let runtime = build_runtime(config.threads)?;
    let client = IsahcClient::new(&config)?;
    let runner = Runner::new(config, Arc::new(client));

    // first Ctrl+C stops handing out requests, the second one exits right away
    let cancel = runner.cancel_handle();
    let handler = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nInterrupted, waiting for in-flight requests (Ctrl+C again to quit)");
    });
    if let Err(err) = handler {
        tracing::warn!("Ctrl+C handler not installed: {}", err);
    }

    let config = runner.config();
    println!(
        "Starting benchmark with {} total requests, {} concurrent, targeting {}",
        config.requests,
        config.concurrency,
        config.url
    );

    let summary = runtime.block_on(runner.run())?;
    let report = Report::build(&summary);

    println!();
    if runner.config().detailed {
        print!("{}", report.render_detailed());
    } else {
        print!("{}", report);
    }
    Ok(())
}

/// Logs reach stderr through a background writer; lines are dropped while its buffer is full.
fn init_tracing() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber
        ::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        )
        .with_writer(writer)
        .init();
    guard
}

/// Multi-thread runtime, with an explicit worker count when one was given.
fn build_runtime(threads: Option<usize>) -> std::io::Result<Runtime> {
    let mut builder = Builder::new_multi_thread();
    if let Some(threads) = threads {
        builder.worker_threads(threads);
    }
    builder.enable_all().build()
}
