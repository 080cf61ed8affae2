//! Admin RPC wire types (§6.1 supplement): the request/response pairs
//! carried over a Unix-domain-socket JSON-RPC surface between the
//! `jasminctl` client and a `jasmingwd` listener. Covers exactly the
//! operations §6.1 names: "add/remove user/group/route/connector,
//! start/stop/list connectors, persist/load".
//!
//! The envelope shape (a literal `"jsonrpc":"2.0"` marker plus a numeric
//! id for correlation) is deliberately trimmed down from a general
//! JSON-RPC 2.0 implementation: no batching, no notifications, no string
//! ids — a `jasminctl` invocation is always one request, one reply, one
//! process.

use serde::{Deserialize, Serialize};

use crate::connector::Connector;
use crate::filter::Direction;
use crate::ids::{ConnectorId, GroupId, UserId};
use crate::route::Route;
use crate::user::{Group, User};

/// Always serializes as the string `"2.0"`; deserialization rejects
/// anything else, a self-checking marker type rather than a bare `String`
/// field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!("expected JSON-RPC version '2.0', got '{s}'")))
        }
    }
}

/// One administrative operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdminRequest {
    AddUser { user: User },
    RemoveUser { user_id: UserId },
    AddGroup { group: Group },
    RemoveGroup { group_id: GroupId },
    AddRoute { direction: Direction, route: Route },
    RemoveRoute { direction: Direction, priority: u32 },
    ListRoutes { direction: Direction },
    AddConnector { connector: Connector },
    RemoveConnector { cid: ConnectorId },
    StartConnector { cid: ConnectorId },
    StopConnector { cid: ConnectorId },
    ListConnectors,
    /// Force a snapshot write now, instead of waiting for the periodic task.
    Persist,
    /// Reload the UCS state from its on-disk snapshot, discarding any
    /// in-memory changes made since the last persist.
    Load,
}

/// Reply to an [`AdminRequest`]. `Error` carries the `Display` text of
/// whatever `UcsError`/`JasminError` the operation failed with rather than
/// a structured error code — §7's taxonomy is already a `thiserror` enum
/// with precise messages, so re-encoding it as another error scheme here
/// would just be a lossy translation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok,
    Routes { routes: Vec<Route> },
    Connectors { connectors: Vec<Connector> },
    Error { message: String },
}

/// A request as it goes over the wire: the JSON-RPC envelope plus a
/// correlation id, flattened together with the operation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequestEnvelope {
    pub jsonrpc: JsonRpcVersion,
    pub id: u64,
    #[serde(flatten)]
    pub request: AdminRequest,
}

impl AdminRequestEnvelope {
    pub fn new(id: u64, request: AdminRequest) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, request }
    }
}

/// A reply as it goes over the wire, echoing the request's `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponseEnvelope {
    pub jsonrpc: JsonRpcVersion,
    pub id: u64,
    #[serde(flatten)]
    pub response: AdminResponse,
}

impl AdminResponseEnvelope {
    pub fn new(id: u64, response: AdminResponse) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, response }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_round_trips_through_json() {
        let envelope = AdminRequestEnvelope::new(1, AdminRequest::ListConnectors);
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        let back: AdminRequestEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 1);
        assert!(matches!(back.request, AdminRequest::ListConnectors));
    }

    #[test]
    fn bad_jsonrpc_version_is_rejected() {
        let err = serde_json::from_str::<AdminRequestEnvelope>(
            r#"{"jsonrpc":"1.0","id":1,"op":"list_connectors"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected JSON-RPC version"));
    }

    #[test]
    fn response_envelope_round_trips_through_json() {
        let envelope = AdminResponseEnvelope::new(7, AdminResponse::Ok);
        let json = serde_json::to_string(&envelope).unwrap();
        let back: AdminResponseEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 7);
        assert!(matches!(back.response, AdminResponse::Ok));
    }
}
