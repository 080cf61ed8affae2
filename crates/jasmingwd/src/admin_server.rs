//! The server half of §6.1's admin surface: a Unix-domain-socket listener
//! that accepts one connection per `jasminctl` invocation, reads one
//! newline-delimited `AdminRequestEnvelope`, dispatches it against the
//! live [`UserCredentialStore`], and writes back one `AdminResponseEnvelope`.
//! Mirrors `jasmin-smppd::listener::run`'s "accept loop, one task per
//! connection" shape.
//!
//! Scope note: this surface only ever touches UCS state. Starting or
//! stopping a connector here flips the same config+`started` flag the
//! original admin surface reads back on `list` — it does not drive a live
//! `jasmin-scm::ScmManager` session, because doing that needs a concrete
//! `SmppLink`/`LinkFactory` wired to a real SMPP codec, which this
//! workspace deliberately does not implement (§1: wire-byte parsing is
//! assumed to exist as an external library). `ScmManager` itself is built,
//! unit-tested, and ready for whichever crate eventually supplies that
//! codec to drive it.

use jasmin_proto::{AdminRequest, AdminRequestEnvelope, AdminResponse, AdminResponseEnvelope};
use jasmin_ucs::{UcsError, UserCredentialStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{error, warn};

pub async fn run(listener: UnixListener, ucs: UserCredentialStore) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                error!(error = %err, "admin socket accept failed, stopping admin listener");
                return;
            }
        };

        let ucs = ucs.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &ucs).await {
                warn!(error = %err, "admin connection ended with an error");
            }
        });
    }
}

async fn handle_connection(stream: tokio::net::UnixStream, ucs: &UserCredentialStore) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let reply = match serde_json::from_str::<AdminRequestEnvelope>(line.trim_end()) {
        Ok(envelope) => {
            let response = dispatch(ucs, envelope.request).await;
            AdminResponseEnvelope::new(envelope.id, response)
        }
        Err(err) => AdminResponseEnvelope::new(0, AdminResponse::Error { message: format!("malformed request: {err}") }),
    };

    let mut out = serde_json::to_string(&reply).unwrap_or_else(|_| {
        "{\"jsonrpc\":\"2.0\",\"id\":0,\"status\":\"error\",\"message\":\"failed to encode reply\"}".to_string()
    });
    out.push('\n');
    write_half.write_all(out.as_bytes()).await?;
    write_half.flush().await
}

async fn dispatch(ucs: &UserCredentialStore, request: AdminRequest) -> AdminResponse {
    let result: Result<AdminResponse, UcsError> = async {
        match request {
            AdminRequest::AddUser { user } => {
                ucs.add_user(user).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::RemoveUser { user_id } => {
                ucs.remove_user(&user_id).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::AddGroup { group } => {
                ucs.add_group(group).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::RemoveGroup { group_id } => {
                ucs.remove_group(&group_id).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::AddRoute { direction, route } => {
                ucs.add_route(direction, route).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::RemoveRoute { direction, priority } => {
                ucs.remove_route(direction, priority).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::ListRoutes { direction } => Ok(AdminResponse::Routes { routes: ucs.list_routes(direction).await }),
            AdminRequest::AddConnector { connector } => {
                ucs.add_connector(connector).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::RemoveConnector { cid } => {
                ucs.remove_connector(&cid).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::StartConnector { cid } => {
                ucs.start_connector(&cid).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::StopConnector { cid } => {
                ucs.stop_connector(&cid).await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::ListConnectors => Ok(AdminResponse::Connectors { connectors: ucs.list_connectors().await }),
            AdminRequest::Persist => {
                ucs.persist().await?;
                Ok(AdminResponse::Ok)
            }
            AdminRequest::Load => {
                ucs.reload().await?;
                Ok(AdminResponse::Ok)
            }
        }
    }
    .await;

    result.unwrap_or_else(|err| AdminResponse::Error { message: err.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_proto::{Connector, Group, User};

    fn store() -> UserCredentialStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        std::mem::forget(dir);
        UserCredentialStore::new(path)
    }

    #[tokio::test]
    async fn dispatch_add_group_then_add_user_succeeds() {
        let ucs = store();
        let reply = dispatch(&ucs, AdminRequest::AddGroup { group: Group::new("g1") }).await;
        assert!(matches!(reply, AdminResponse::Ok));

        let reply = dispatch(
            &ucs,
            AdminRequest::AddUser { user: User::new("u1", "g1", "alice", "pw") },
        )
        .await;
        assert!(matches!(reply, AdminResponse::Ok));
    }

    #[tokio::test]
    async fn dispatch_surfaces_ucs_errors_as_admin_response_error() {
        let ucs = store();
        let reply = dispatch(
            &ucs,
            AdminRequest::AddUser { user: User::new("u1", "missing-group", "alice", "pw") },
        )
        .await;
        assert!(matches!(reply, AdminResponse::Error { .. }));
    }

    #[tokio::test]
    async fn dispatch_list_connectors_reflects_additions() {
        let ucs = store();
        dispatch(
            &ucs,
            AdminRequest::AddConnector {
                connector: Connector::new("smsc1", "10.0.0.1", 2775, jasmin_proto::BindType::Transceiver),
            },
        )
        .await;

        match dispatch(&ucs, AdminRequest::ListConnectors).await {
            AdminResponse::Connectors { connectors } => assert_eq!(connectors.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
