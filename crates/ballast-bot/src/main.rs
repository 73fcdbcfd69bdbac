//! Ballast rebalancing bot - entry point.

use anyhow::Result;
use ballast_broker::{AlpacaClient, BrokerGateway};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Automated portfolio rebalancing bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BALLAST_CONFIG env var)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log planned orders without submitting anything or touching state
    #[arg(long)]
    dry_run: bool,

    /// Rebalance immediately, bypassing drift and cooldown checks
    #[arg(long)]
    force_rebalance: bool,

    /// Write a performance report and exit
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    ballast_telemetry::init_logging()?;
    info!("Starting ballast v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > BALLAST_CONFIG env var > default.
    let config_path = args
        .config
        .or_else(|| std::env::var("BALLAST_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config/default.toml"));

    info!(config_path = %config_path.display(), "Loading configuration");
    let config = ballast_bot::AppConfig::from_file(&config_path)?;

    let broker: Arc<dyn BrokerGateway> = Arc::new(AlpacaClient::new(&config.broker)?);
    let orchestrator = ballast_bot::RebalanceOrchestrator::from_config(&config, broker)?;

    if args.report {
        let report = orchestrator.generate_report().await?;
        orchestrator.save_report(&report)?;
        return Ok(());
    }

    let ok = if args.force_rebalance {
        orchestrator.force_rebalance(args.dry_run).await
    } else {
        orchestrator.run_daily_check(args.dry_run).await
    };

    if !ok {
        anyhow::bail!("run finished with errors; see logs");
    }
    Ok(())
}
