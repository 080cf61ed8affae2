//! Integration test for the admin RPC surface: a real `UnixListener`, a real
//! `jasminctl::client::call`, and a `UserCredentialStore` backed by a temp
//! file — no mocked transport.

use jasmin_proto::{AdminRequest, AdminResponse, BindType, Connector, Group, User};
use jasmin_ucs::UserCredentialStore;
use jasmingwd::admin_server;

#[tokio::test]
async fn client_and_server_round_trip_add_group_add_user_and_list_connectors() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("admin.sock");
    let ucs = UserCredentialStore::new(dir.path().join("state.bin"));

    let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();
    let server = tokio::spawn(admin_server::run(listener, ucs));

    let reply = jasminctl::client::call(&socket_path, AdminRequest::AddGroup { group: Group::new("g1") })
        .await
        .unwrap();
    assert!(matches!(reply, AdminResponse::Ok));

    let reply =
        jasminctl::client::call(&socket_path, AdminRequest::AddUser { user: User::new("u1", "g1", "alice", "pw") })
            .await
            .unwrap();
    assert!(matches!(reply, AdminResponse::Ok));

    let reply = jasminctl::client::call(
        &socket_path,
        AdminRequest::AddConnector {
            connector: Connector::new("smsc1", "10.0.0.1", 2775, BindType::Transceiver),
        },
    )
    .await
    .unwrap();
    assert!(matches!(reply, AdminResponse::Ok));

    let reply = jasminctl::client::call(&socket_path, AdminRequest::ListConnectors).await.unwrap();
    match reply {
        AdminResponse::Connectors { connectors } => assert_eq!(connectors.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }

    server.abort();
}

#[tokio::test]
async fn client_sees_ucs_errors_surfaced_through_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("admin.sock");
    let ucs = UserCredentialStore::new(dir.path().join("state.bin"));

    let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();
    let server = tokio::spawn(admin_server::run(listener, ucs));

    let reply = jasminctl::client::call(
        &socket_path,
        AdminRequest::AddUser { user: User::new("u1", "missing-group", "alice", "pw") },
    )
    .await
    .unwrap();
    assert!(matches!(reply, AdminResponse::Error { .. }));

    server.abort();
}
