//! rampd — the Rampline daemon.
//!
//! Reconciles every configured service once per tick: fetch the service
//! from the platform, decide the next traffic split from its health, and
//! push the result back. Services are reconciled in parallel; each worker
//! owns its metrics provider while the platform client is shared.
//!
//! # Usage
//!
//! ```text
//! rampd run --config rampline.toml
//! rampd run --config rampline.toml --once
//! rampd validate --config rampline.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use rampline_core::{RamplineConfig, ServiceRef, Strategy};
use rampline_metrics::PrometheusProvider;
use rampline_platform::{HttpPlatformClient, PlatformClient};
use rampline_rollout::{Reconciler, RolloutController};

#[derive(Parser)]
#[command(name = "rampd", about = "Rampline progressive-delivery daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the configured services until interrupted.
    Run {
        /// Path to the rampline.toml config file.
        #[arg(long, default_value = "rampline.toml")]
        config: PathBuf,

        /// Run a single pass over every service, then exit.
        #[arg(long)]
        once: bool,

        /// Override the tick interval from the config file, in seconds.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Parse and validate a config file, then exit.
    Validate {
        /// Path to the rampline.toml config file.
        #[arg(long, default_value = "rampline.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rampd=debug,rampline_rollout=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            once,
            interval,
        } => run(config, once, interval).await,
        Command::Validate { config } => validate(config),
    }
}

async fn run(path: PathBuf, once: bool, interval_override: Option<u64>) -> anyhow::Result<()> {
    let config = RamplineConfig::from_file(&path)?;
    let strategy = config.strategy()?;
    if config.services.is_empty() {
        anyhow::bail!("no services configured in {}", path.display());
    }

    let interval = Duration::from_secs(interval_override.unwrap_or(config.interval));
    let platform_timeout = config.platform.request_timeout()?;
    let metrics_timeout = config.metrics.request_timeout()?;
    let client: Arc<dyn PlatformClient> = Arc::new(
        HttpPlatformClient::new(&config.platform.base_url).with_request_timeout(platform_timeout),
    );

    info!(
        platform = %config.platform.base_url,
        metrics = %config.metrics.base_url,
        services = config.services.len(),
        interval_secs = interval.as_secs(),
        steps = ?strategy.steps,
        "rampd starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut shutdown = shutdown_rx;
    loop {
        run_tick(&config, &strategy, client.clone(), metrics_timeout, interval).await;
        if once {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("rampd stopping");
                break;
            }
        }
    }
    Ok(())
}

/// Reconcile every configured service once, in parallel workers.
async fn run_tick(
    config: &RamplineConfig,
    strategy: &Strategy,
    client: Arc<dyn PlatformClient>,
    metrics_timeout: Duration,
    pass_timeout: Duration,
) {
    let mut workers = Vec::with_capacity(config.services.len());
    for svc in &config.services {
        let client = client.clone();
        let strategy = strategy.clone();
        let metrics_config = config.metrics.clone();
        let svc = svc.clone();
        workers.push(tokio::spawn(async move {
            reconcile_one(svc, client, strategy, metrics_config, metrics_timeout, pass_timeout)
                .await;
        }));
    }
    for worker in workers {
        let _ = worker.await;
    }
}

async fn reconcile_one(
    svc: ServiceRef,
    client: Arc<dyn PlatformClient>,
    strategy: Strategy,
    metrics_config: rampline_core::MetricsConfig,
    metrics_timeout: Duration,
    pass_timeout: Duration,
) {
    let service = format!("{}/{}", svc.namespace, svc.name);
    // Candidate scoping is per-provider state, so each worker builds its
    // own provider instance.
    let provider = Arc::new(
        PrometheusProvider::new(&metrics_config, &service).with_request_timeout(metrics_timeout),
    );
    let reconciler = Reconciler::new(client, RolloutController::new(strategy, provider));

    // The pass-level deadline is the cancellation token: when it fires,
    // the dropped future aborts any in-flight platform or metrics call.
    match tokio::time::timeout(pass_timeout, reconciler.reconcile(&svc.namespace, &svc.name)).await
    {
        Ok(Ok(summary)) => {
            if summary.changed {
                info!(%service, "traffic updated");
            }
        }
        Ok(Err(e)) => error!(%service, error = %e, "reconcile failed"),
        Err(_) => error!(%service, timeout_secs = pass_timeout.as_secs(), "reconcile timed out"),
    }
}

fn validate(path: PathBuf) -> anyhow::Result<()> {
    let config = RamplineConfig::from_file(&path)?;
    let strategy = config.strategy()?;
    config.platform.request_timeout()?;
    config.metrics.request_timeout()?;
    println!(
        "{} ok: {} service(s), steps {:?}, {} health criteria, tick every {}s",
        path.display(),
        config.services.len(),
        strategy.steps,
        strategy.health_criteria.len(),
        config.interval
    );
    Ok(())
}
