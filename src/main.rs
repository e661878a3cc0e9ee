use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sbsmon::config::Config;
use sbsmon::queue::MessageQueue;
use sbsmon::shutdown::{self, Shutdown};
use sbsmon::window::AggregatorConfig;
use sbsmon::{daemon, feed, plugin, window};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Reception quality monitor for SBS BaseStation feeds")]
struct Args {
    /// Configuration file, built-in defaults apply when it does not exist
    #[clap(long, env = "SBSMON_CONFIG", default_value = "/etc/sbsmon.toml")]
    config: String,

    /// config, fg or daemon; a snapshot fetch when omitted
    mode: Option<String>,
}

fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match Config::load_or_default(Path::new(&args.config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sbsmon: {:#}", e);
            std::process::exit(1);
        }
    };

    match args.mode.as_deref() {
        Some("config") => print!("{}", plugin::config_block()),
        None => print!("{}", plugin::fetch(&config.snapshot_path)),
        Some("fg") => {
            init_stderr_logging();
            run_or_exit(config);
        }
        Some("daemon") => {
            // fork before any runtime thread exists
            if let Err(e) = daemon::detach(&config) {
                eprintln!("sbsmon: {:#}", e);
                std::process::exit(1);
            }
            let _guard = match daemon::init_file_logging(&config.log_path) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("sbsmon: {:#}", e);
                    std::process::exit(1);
                }
            };
            run_or_exit(config);
        }
        Some(other) => {
            eprintln!("sbsmon: unknown mode {:?}", other);
            eprint!("{}", plugin::usage());
            std::process::exit(1);
        }
    }
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();
}

fn run_or_exit(config: Config) {
    if let Err(e) = run(config) {
        error!("monitor failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(run_pipeline(config))
}

async fn run_pipeline(config: Config) -> Result<()> {
    if let Some(parent) = config.snapshot_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    info!(
        "watching feed at {}:{} with {}s windows",
        config.feed_host, config.feed_port, config.period_secs
    );
    info!("publishing snapshots to {}", config.snapshot_path.display());

    let (shutdown, ingest_shutdown) = Shutdown::new();
    let queue = MessageQueue::new();

    let ingest_queue = queue.clone();
    let host = config.feed_host.clone();
    let port = config.feed_port;
    let mut ingest_handle = tokio::spawn(async move {
        match feed::run_ingest(host, port, ingest_queue, ingest_shutdown).await {
            Ok(_) => info!("ingestion stopped"),
            Err(e) => error!("ingestion error: {:#}", e),
        }
    });

    let aggregator_config = AggregatorConfig {
        period_secs: config.period_secs,
        stale_after_secs: config.stale_after_secs,
        snapshot_path: config.snapshot_path.clone(),
    };
    let aggregator_shutdown = shutdown.subscribe();
    let mut aggregator_handle = tokio::spawn(async move {
        match window::run_aggregator(aggregator_config, queue, aggregator_shutdown).await {
            Ok(_) => info!("aggregator stopped"),
            Err(e) => error!("aggregator error: {:#}", e),
        }
    });

    tokio::select! {
        res = shutdown::wait_for_signal() => {
            if let Err(e) = res {
                error!("signal handling failed: {:#}", e);
            }
            info!("shutting down");
        }
        res = &mut ingest_handle => {
            error!("ingestion task exited unexpectedly: {:?}", res);
        }
        res = &mut aggregator_handle => {
            error!("aggregator task exited unexpectedly: {:?}", res);
        }
    }

    shutdown.trigger();
    shutdown::abort_and_await(&mut ingest_handle).await;
    shutdown::abort_and_await(&mut aggregator_handle).await;

    Ok(())
}
