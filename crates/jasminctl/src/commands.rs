//! One thin function per admin operation (§6.1): build the request, call
//! the socket, print the reply.

use std::path::Path;

use anyhow::{bail, Result};
use jasmin_proto::{AdminRequest, AdminResponse, Connector, Direction, Group, Route, User};

use crate::client;

async fn run(socket_path: &Path, request: AdminRequest) -> Result<AdminResponse> {
    let response = client::call(socket_path, request).await?;
    if let AdminResponse::Error { message } = &response {
        bail!("{message}");
    }
    Ok(response)
}

pub async fn add_user(socket_path: &Path, user: User) -> Result<()> {
    run(socket_path, AdminRequest::AddUser { user }).await?;
    println!("user added");
    Ok(())
}

pub async fn remove_user(socket_path: &Path, user_id: jasmin_proto::UserId) -> Result<()> {
    run(socket_path, AdminRequest::RemoveUser { user_id }).await?;
    println!("user removed");
    Ok(())
}

pub async fn add_group(socket_path: &Path, group: Group) -> Result<()> {
    run(socket_path, AdminRequest::AddGroup { group }).await?;
    println!("group added");
    Ok(())
}

pub async fn remove_group(socket_path: &Path, group_id: jasmin_proto::GroupId) -> Result<()> {
    run(socket_path, AdminRequest::RemoveGroup { group_id }).await?;
    println!("group removed");
    Ok(())
}

pub async fn add_route(socket_path: &Path, direction: Direction, route: Route) -> Result<()> {
    run(socket_path, AdminRequest::AddRoute { direction, route }).await?;
    println!("route added");
    Ok(())
}

pub async fn remove_route(socket_path: &Path, direction: Direction, priority: u32) -> Result<()> {
    run(socket_path, AdminRequest::RemoveRoute { direction, priority }).await?;
    println!("route removed");
    Ok(())
}

pub async fn list_routes(socket_path: &Path, direction: Direction) -> Result<()> {
    match run(socket_path, AdminRequest::ListRoutes { direction }).await? {
        AdminResponse::Routes { routes } => {
            for route in routes {
                println!("{}", serde_json::to_string(&route)?);
            }
        }
        other => bail!("unexpected reply to list-routes: {other:?}"),
    }
    Ok(())
}

pub async fn add_connector(socket_path: &Path, connector: Connector) -> Result<()> {
    run(socket_path, AdminRequest::AddConnector { connector }).await?;
    println!("connector added");
    Ok(())
}

pub async fn remove_connector(socket_path: &Path, cid: jasmin_proto::ConnectorId) -> Result<()> {
    run(socket_path, AdminRequest::RemoveConnector { cid }).await?;
    println!("connector removed");
    Ok(())
}

pub async fn start_connector(socket_path: &Path, cid: jasmin_proto::ConnectorId) -> Result<()> {
    run(socket_path, AdminRequest::StartConnector { cid }).await?;
    println!("connector started");
    Ok(())
}

pub async fn stop_connector(socket_path: &Path, cid: jasmin_proto::ConnectorId) -> Result<()> {
    run(socket_path, AdminRequest::StopConnector { cid }).await?;
    println!("connector stopped");
    Ok(())
}

pub async fn list_connectors(socket_path: &Path) -> Result<()> {
    match run(socket_path, AdminRequest::ListConnectors).await? {
        AdminResponse::Connectors { connectors } => {
            for connector in connectors {
                println!("{}", serde_json::to_string(&connector)?);
            }
        }
        other => bail!("unexpected reply to list-connectors: {other:?}"),
    }
    Ok(())
}

pub async fn persist(socket_path: &Path) -> Result<()> {
    run(socket_path, AdminRequest::Persist).await?;
    println!("snapshot persisted");
    Ok(())
}

pub async fn load(socket_path: &Path) -> Result<()> {
    run(socket_path, AdminRequest::Load).await?;
    println!("snapshot reloaded");
    Ok(())
}
