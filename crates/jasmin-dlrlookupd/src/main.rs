//! `jasmin-dlrlookupd` (§2.1 supplement): a thin binary wiring the lookup
//! consumer to its own Redis/AMQP connections and its own UCS snapshot,
//! reusing `jasmin-router`'s DLR correlation path instead of reimplementing
//! it. Mirrors `dlrlookupd.py`'s `BaseDaemon.start`/`stop` lifecycle and its
//! `-c`/`-i` options, one Tokio task instead of Twisted's reactor.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jasmin_conf::SubmitDefaults;
use jasmin_dlrlookupd::InstanceLock;
use jasmin_router::RouterCore;
use jasmin_store::HotStore;
use jasmin_ucs::UserCredentialStore;
use tracing::info;

/// Standalone DLR lookup daemon for Jasmin
#[derive(Parser)]
#[command(name = "jasmin-dlrlookupd")]
#[command(version)]
struct Cli {
    /// Path to config file (overrides ./jasmin.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Daemon id; must be different for each dlrlookupd instance sharing a
    /// host (§2.1: "need to be different for each dlrlookupd daemon").
    #[arg(short, long, default_value = "master")]
    id: String,

    /// Print the loaded configuration and exit.
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) =
        jasmin_conf::loader::load_with_sources_from(cli.config.as_deref()).context("failed to load configuration")?;

    if cli.show_config {
        println!("# Configuration sources:");
        for path in &sources.files {
            println!("#   - {}", path.display());
        }
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.infra.telemetry.log_level.clone()))
        .init();

    let lock_path = config.infra.paths.lock_path("dlrlookupd", &cli.id);
    let _lock = InstanceLock::acquire(&lock_path)
        .with_context(|| format!("failed to acquire single-instance lock at {}", lock_path.display()))?;
    info!(path = %lock_path.display(), "acquired single-instance lock");

    let ucs = UserCredentialStore::load_or_empty(config.infra.paths.ucs_snapshot_path()).await;
    let snapshot_task = ucs.clone().spawn_periodic_snapshots(Duration::from_secs(30));

    let store = HotStore::connect(&config.infra.redis).context("failed to connect to redis")?;
    let bus = std::sync::Arc::new(
        jasmin_bus::MessageBus::connect(&config.infra.amqp).await.context("failed to connect to the message bus")?,
    );
    let router = RouterCore::new(ucs, store, bus, SubmitDefaults::default());

    info!("jasmin-dlrlookupd starting DLR lookup consumer");
    tokio::select! {
        result = jasmin_dlrlookupd::consume::run(router) => {
            result.context("dlr lookup consumer stopped with an error")?;
        }
        _ = shutdown_signal() => {
            info!("jasmin-dlrlookupd shutting down");
        }
    }

    snapshot_task.abort();
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("received SIGTERM");
        }
    }
}
