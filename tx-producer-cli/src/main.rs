use std::error::Error;
use std::fs::File;
use std::io;
use std::process;
use std::thread;

use clap::Parser;
use log::{error, info, warn};

use tx_producer::driver::{RunSummary, ShutdownHandle, StreamDriver};
use tx_producer::generator::RecordGenerator;
use tx_producer::kafka::{KafkaSink, KafkaSinkConfig, DEFAULT_BROKERS, DEFAULT_TOPIC};
use tx_producer::sink::{JsonLinesSink, Sink};

/// Exit status after a second interrupt, as a shell reports a process killed by SIGINT
const FORCED_EXIT_CODE: i32 = 130;

/// Generate mock financial transactions and stream them to Kafka
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Kafka bootstrap servers
    #[clap(short, long, default_value = DEFAULT_BROKERS)]
    pub(crate) bootstrap_servers: String,
    /// Kafka topic name
    #[clap(short, long, default_value = DEFAULT_TOPIC)]
    pub(crate) topic: String,
    /// Transactions per second
    #[clap(short, long, default_value_t = 1.0)]
    pub(crate) rate: f64,
    /// Maximum number of messages to send (unlimited when omitted)
    #[clap(short, long)]
    pub(crate) max_messages: Option<u64>,
    /// Send a burst of N transactions as fast as possible and exit
    #[clap(long)]
    pub(crate) burst: Option<u64>,
    /// Seed the generator for reproducible data
    #[clap(long)]
    pub(crate) seed: Option<u64>,
    /// Print transactions to stdout as JSON lines instead of publishing them
    #[clap(long, conflicts_with = "output")]
    pub(crate) dry_run: bool,
    /// Write transactions to this file as JSON lines instead of publishing them
    #[clap(long)]
    pub(crate) output: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let shutdown = ShutdownHandle::new();
    watch_for_shutdown(shutdown.clone())?;

    if cli.dry_run {
        run(&cli, JsonLinesSink::new(io::stdout()), shutdown)?;
    } else if let Some(path) = &cli.output {
        run(&cli, JsonLinesSink::new(File::create(path)?), shutdown)?;
    } else {
        let config = KafkaSinkConfig {
            brokers: cli.bootstrap_servers.clone(),
            topic: cli.topic.clone(),
            ..KafkaSinkConfig::default()
        };
        let sink = KafkaSink::connect(&config)?;
        if !shutdown.is_running() {
            info!("Shutdown requested while connecting, nothing was sent");
            return Ok(());
        }
        run(&cli, sink, shutdown)?;
    }

    Ok(())
}

fn run<S: Sink>(
    cli: &Cli,
    sink: S,
    shutdown: ShutdownHandle,
) -> Result<RunSummary, Box<dyn Error>> {
    let generator = match cli.seed {
        Some(seed) => RecordGenerator::from_seed(seed),
        None => RecordGenerator::from_entropy(),
    };
    let mut driver = StreamDriver::with_shutdown(generator, sink, shutdown);

    let summary = match cli.burst {
        Some(count) => driver.run_burst(count)?,
        None => {
            info!("Press Ctrl+C to stop...");
            driver.run_rate(cli.rate, cli.max_messages)?
        }
    };
    info!(
        "Sent {} transactions in {:.2?} ({:.1} TPS)",
        summary.messages_sent,
        summary.elapsed,
        summary.messages_per_second()
    );
    Ok(summary)
}

/// Flips `handle` on SIGINT, or SIGTERM on unix, from a background thread.
/// A second signal exits the process straight away, skipping the final flush.
fn watch_for_shutdown(handle: ShutdownHandle) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            runtime.block_on(wait_for_signal());
            warn!("Shutdown requested, finishing up (signal again to exit immediately)...");
            handle.shutdown();
            runtime.block_on(wait_for_signal());
            error!("Second shutdown request, exiting without flushing");
            process::exit(FORCED_EXIT_CODE);
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Unable to listen for SIGTERM: {e}");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
