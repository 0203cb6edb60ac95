//! Scenario Runner
//!
//! Replays a scenario file against a fresh order book and prints the resulting
//! depth.
//!
//! ```text
//! scenario_runner <scenario-file> [--config <json>] [--json] [--metrics-interval <secs>]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orderbook_matching_engine::{
    metrics::MetricsReporter, scenario, EngineConfig, OrderBook, OrderBookMetrics,
    OrderbookLevelInfos,
};

const USAGE: &str =
    "Usage: scenario_runner <scenario-file> [--config <json>] [--json] [--metrics-interval <secs>]";

#[derive(Debug)]
struct Args {
    scenario: PathBuf,
    config: Option<PathBuf>,
    json: bool,
    metrics_interval: Option<Duration>,
}

impl Args {
    fn parse(mut raw: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut scenario = None;
        let mut config = None;
        let mut json = false;
        let mut metrics_interval = None;

        while let Some(arg) = raw.next() {
            match arg.as_str() {
                "--config" => {
                    let path = raw.next().ok_or("--config needs a path")?;
                    config = Some(PathBuf::from(path));
                }
                "--json" => json = true,
                "--metrics-interval" => {
                    let secs = raw.next().ok_or("--metrics-interval needs seconds")?;
                    let secs: u64 = secs
                        .parse()
                        .map_err(|_| format!("invalid metrics interval '{}'", secs))?;
                    if secs == 0 {
                        return Err("metrics interval must be positive".to_string());
                    }
                    metrics_interval = Some(Duration::from_secs(secs));
                }
                flag if flag.starts_with("--") => return Err(format!("unknown flag '{}'", flag)),
                path if scenario.is_none() => scenario = Some(PathBuf::from(path)),
                extra => return Err(format!("unexpected argument '{}'", extra)),
            }
        }

        Ok(Self {
            scenario: scenario.ok_or("missing scenario file")?,
            config,
            json,
            metrics_interval,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}\n{}", message, USAGE);
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Replays are deterministic unless a config asks for expiry
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::without_expiry(),
    };

    let book = Arc::new(OrderBook::from_config(&config)?);
    let metrics = Arc::new(OrderBookMetrics::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = args.metrics_interval.map(|every| {
        let reporter = MetricsReporter::new(Arc::clone(&metrics), every);
        info!("Reporting metrics every {:?}", every);
        tokio::spawn(async move { reporter.run(shutdown_rx).await })
    });

    if !args.json {
        println!("{}", processing_banner(&args.scenario));
    }

    let replay = {
        let book = Arc::clone(&book);
        let metrics = Arc::clone(&metrics);
        let path = args.scenario.clone();
        tokio::task::spawn_blocking(move || scenario::replay_file(&book, &metrics, path)).await?
    };

    let _ = shutdown_tx.send(true);
    if let Some(task) = reporter {
        task.await?;
    }

    let summary = replay?;
    let infos = book.get_order_infos();

    if args.json {
        let out = serde_json::json!({
            "total_orders": book.size(),
            "levels": infos,
            "summary": summary,
            "metrics": metrics.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_results(book.size(), &infos);
    }

    Ok(())
}

fn processing_banner(path: &Path) -> String {
    format!("Processing scenario file: {}", path.display())
}

fn print_results(size: usize, infos: &OrderbookLevelInfos) {
    println!("\n--- Final State of the Order Book ---");
    println!("Total Orders Remaining: {}", size);

    println!("\n--- Bids (Buy Orders) --- [{} levels]", infos.bids().len());
    for level in infos.bids() {
        println!("Price: {},  Total Quantity: {}", level.price, level.quantity);
    }

    println!("\n--- Asks (Sell Orders) --- [{} levels]", infos.asks().len());
    for level in infos.asks() {
        println!("Price: {},  Total Quantity: {}", level.price, level.quantity);
    }
    println!("-------------------------------------");
}
