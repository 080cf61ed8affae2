//! `jasmingwd` (§1, §6.1): the main gateway daemon. Loads config, connects
//! to Redis/AMQP, builds the Router Core, then runs the HTTP API, the
//! deliver_sm/dlr throwers, and the admin RPC listener side by side until
//! a shutdown signal arrives. Each collaborator is spawned independently
//! and only the shutdown signal is awaited directly, so one service dying
//! doesn't implicitly race down the others through `select!` semantics.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jasmin_router::RouterCore;
use jasmin_store::HotStore;
use jasmin_throwers::ThrowerContext;
use jasmin_ucs::UserCredentialStore;
use tokio::net::UnixListener;
use tracing::{error, info};

/// The Jasmin gateway daemon
#[derive(Parser)]
#[command(name = "jasmingwd")]
#[command(version)]
struct Cli {
    /// Path to config file (overrides ./jasmin.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

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

    let ucs = UserCredentialStore::load_or_empty(config.infra.paths.ucs_snapshot_path()).await;
    let snapshot_task = ucs.clone().spawn_periodic_snapshots(Duration::from_secs(30));

    let store = HotStore::connect(&config.infra.redis).context("failed to connect to redis")?;
    let bus = std::sync::Arc::new(
        jasmin_bus::MessageBus::connect(&config.infra.amqp).await.context("failed to connect to the message bus")?,
    );
    let router = RouterCore::new(ucs.clone(), store, bus.clone(), config.defaults.submit.clone());

    let thrower_ctx =
        ThrowerContext::new(bus.clone(), ucs.clone(), router.bound_sessions.clone(), config.defaults.thrower.clone());

    let admin_socket_path = config.infra.admin.socket_path(&config.infra.paths);
    let _ = std::fs::remove_file(&admin_socket_path);
    let admin_listener = UnixListener::bind(&admin_socket_path)
        .with_context(|| format!("failed to bind admin socket at {}", admin_socket_path.display()))?;
    info!(path = %admin_socket_path.display(), "admin RPC listening");

    let http_config = config.infra.http.clone();
    let http_router = router.clone();
    let http_task = tokio::spawn(async move {
        if let Err(err) = jasmin_http::serve::run(&http_config, http_router).await {
            error!(error = %err, "HTTP API stopped with an error");
        }
    });

    let deliver_sm_task = tokio::spawn({
        let ctx = thrower_ctx.clone();
        async move {
            if let Err(err) = jasmin_throwers::deliver_sm::run(ctx).await {
                error!(error = %err, "deliver_sm thrower stopped with an error");
            }
        }
    });

    let dlr_task = tokio::spawn(async move {
        if let Err(err) = jasmin_throwers::dlr::run(thrower_ctx).await {
            error!(error = %err, "dlr thrower stopped with an error");
        }
    });

    let admin_task = tokio::spawn(jasmingwd::admin_server::run(admin_listener, ucs));

    info!("jasmingwd running: HTTP API, deliver_sm thrower, dlr thrower, admin RPC");
    shutdown_signal().await;
    info!("jasmingwd shutting down");

    http_task.abort();
    deliver_sm_task.abort();
    dlr_task.abort();
    admin_task.abort();
    snapshot_task.abort();
    let _ = std::fs::remove_file(&admin_socket_path);
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
