//! `jasminctl` (§6.1): a CLI front end to the admin JSON-RPC surface a
//! `jasmingwd` process exposes over a Unix domain socket. A `Cli`/
//! `Commands` pair, a global `--config`, one `commands::` function per
//! subcommand — no readline/telnet front-end, which stays out of scope.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jasmin_proto::{BindType, Connector, Direction, Group, Route, User};

use jasminctl::commands;

/// Admin CLI for the Jasmin gateway
#[derive(Parser)]
#[command(name = "jasminctl")]
#[command(version)]
struct Cli {
    /// Path to config file (overrides ./jasmin.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the admin socket path (default: read from config)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliDirection {
    Mt,
    Mo,
}

impl From<CliDirection> for Direction {
    fn from(d: CliDirection) -> Self {
        match d {
            CliDirection::Mt => Direction::Mt,
            CliDirection::Mo => Direction::Mo,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliBindType {
    Transceiver,
    Transmitter,
    Receiver,
}

impl From<CliBindType> for BindType {
    fn from(b: CliBindType) -> Self {
        match b {
            CliBindType::Transceiver => BindType::Transceiver,
            CliBindType::Transmitter => BindType::Transmitter,
            CliBindType::Receiver => BindType::Receiver,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a user
    AddUser {
        id: String,
        group: String,
        username: String,
        password: String,
    },
    /// Remove a user
    RemoveUser { id: String },
    /// Add a group
    AddGroup { id: String },
    /// Remove a group
    RemoveGroup { id: String },
    /// Add a route. `route_json` is a serialized `Route` (§3); the filter/
    /// destination shape is richer than flags can express cleanly, so this
    /// follows the same "accept a raw JSON payload" pattern as a ZMQ send.
    AddRoute {
        #[arg(value_enum)]
        direction: CliDirection,
        route_json: String,
    },
    /// Remove a route by priority
    RemoveRoute {
        #[arg(value_enum)]
        direction: CliDirection,
        priority: u32,
    },
    /// List routes, highest priority first
    ListRoutes {
        #[arg(value_enum)]
        direction: CliDirection,
    },
    /// Add a connector
    AddConnector {
        cid: String,
        host: String,
        port: u16,
        #[arg(value_enum)]
        bind_type: CliBindType,
    },
    /// Remove a connector (must be stopped first)
    RemoveConnector { cid: String },
    /// Start a connector
    StartConnector { cid: String },
    /// Stop a connector
    StopConnector { cid: String },
    /// List connectors
    ListConnectors,
    /// Force an immediate UCS snapshot write
    Persist,
    /// Reload UCS state from its on-disk snapshot
    Load,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let (config, _) =
        jasmin_conf::loader::load_with_sources_from(cli.config.as_deref()).context("failed to load configuration")?;
    let socket_path = cli.socket.unwrap_or_else(|| config.infra.admin.socket_path(&config.infra.paths));

    match cli.command {
        Commands::AddUser { id, group, username, password } => {
            commands::add_user(&socket_path, User::new(id, group, username, &password)).await?;
        }
        Commands::RemoveUser { id } => {
            commands::remove_user(&socket_path, jasmin_proto::UserId::new(id)).await?;
        }
        Commands::AddGroup { id } => {
            commands::add_group(&socket_path, Group::new(id)).await?;
        }
        Commands::RemoveGroup { id } => {
            commands::remove_group(&socket_path, jasmin_proto::GroupId::new(id)).await?;
        }
        Commands::AddRoute { direction, route_json } => {
            let route: Route = serde_json::from_str(&route_json).context("route_json is not a valid Route")?;
            commands::add_route(&socket_path, direction.into(), route).await?;
        }
        Commands::RemoveRoute { direction, priority } => {
            commands::remove_route(&socket_path, direction.into(), priority).await?;
        }
        Commands::ListRoutes { direction } => {
            commands::list_routes(&socket_path, direction.into()).await?;
        }
        Commands::AddConnector { cid, host, port, bind_type } => {
            commands::add_connector(&socket_path, Connector::new(cid, host, port, bind_type.into())).await?;
        }
        Commands::RemoveConnector { cid } => {
            commands::remove_connector(&socket_path, jasmin_proto::ConnectorId::new(cid)).await?;
        }
        Commands::StartConnector { cid } => {
            commands::start_connector(&socket_path, jasmin_proto::ConnectorId::new(cid)).await?;
        }
        Commands::StopConnector { cid } => {
            commands::stop_connector(&socket_path, jasmin_proto::ConnectorId::new(cid)).await?;
        }
        Commands::ListConnectors => {
            commands::list_connectors(&socket_path).await?;
        }
        Commands::Persist => {
            commands::persist(&socket_path).await?;
        }
        Commands::Load => {
            commands::load(&socket_path).await?;
        }
    }

    Ok(())
}
