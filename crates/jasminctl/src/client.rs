//! The UDS JSON-RPC client half of §6.1: one connection, one request, one
//! reply, newline-delimited JSON over a Unix socket.

use std::path::Path;

use anyhow::{bail, Context, Result};
use jasmin_proto::{AdminRequest, AdminRequestEnvelope, AdminResponse, AdminResponseEnvelope};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send `request` to the admin listener at `socket_path` and return its
/// reply. Each call opens a fresh connection: `jasminctl` is a one-shot
/// CLI, not a persistent client.
pub async fn call(socket_path: &Path, request: AdminRequest) -> Result<AdminResponse> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("failed to connect to admin socket at {}", socket_path.display()))?;

    let envelope = AdminRequestEnvelope::new(1, request);
    let mut line = serde_json::to_string(&envelope).context("failed to encode admin request")?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await.context("failed to write admin request")?;
    stream.flush().await.context("failed to flush admin request")?;

    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut reply = String::new();
    let n = reader.read_line(&mut reply).await.context("failed to read admin reply")?;
    if n == 0 {
        bail!("admin listener closed the connection without replying");
    }

    let envelope: AdminResponseEnvelope =
        serde_json::from_str(reply.trim_end()).context("failed to decode admin reply")?;
    Ok(envelope.response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_proto::Connector;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn call_round_trips_a_request_and_reply() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("admin.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = tokio::spawn({
            let socket_path = socket_path.clone();
            async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap();
                let received: AdminRequestEnvelope = serde_json::from_slice(&buf[..n]).unwrap();
                assert!(matches!(received.request, AdminRequest::ListConnectors));

                let reply = AdminResponseEnvelope::new(
                    received.id,
                    AdminResponse::Connectors {
                        connectors: vec![Connector::new("smsc1", "10.0.0.1", 2775, jasmin_proto::BindType::Transceiver)],
                    },
                );
                let mut line = serde_json::to_string(&reply).unwrap();
                line.push('\n');
                stream.write_all(line.as_bytes()).await.unwrap();
                drop(socket_path);
            }
        });

        let response = call(&socket_path, AdminRequest::ListConnectors).await.unwrap();
        server.await.unwrap();

        match response {
            AdminResponse::Connectors { connectors } => assert_eq!(connectors.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
