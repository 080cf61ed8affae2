//! The HTTP submission API server (§6): build a router, bind, serve with
//! graceful shutdown on SIGINT/SIGTERM.

use axum::routing::{get, post};
use axum::Router;
use jasmin_conf::HttpConfig;
use jasmin_router::RouterCore;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{balance, ping, rate, send};
use crate::state::AppState;

pub async fn run(config: &HttpConfig, router: RouterCore) -> anyhow::Result<()> {
    let state = AppState { router };

    let app = Router::new()
        .route("/ping", get(ping))
        .route("/send", post(send))
        .route("/rate", get(rate))
        .route("/balance", get(balance))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "jasmin-http listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("jasmin-http shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down jasmin-http");
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
            info!("received SIGTERM, shutting down jasmin-http");
        }
    }
}
