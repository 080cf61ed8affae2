//! SMPP client connector configuration (§3 Connector).

use serde::{Deserialize, Serialize};

use crate::ids::ConnectorId;

/// The SMPP bind mode a connector opens towards its remote SMSC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindType {
    Transceiver,
    Transmitter,
    Receiver,
}

/// Exponential reconnect policy (§3 Connector "reconnect policy"); shaped
/// to match `jasmin_bus::BackoffPolicy::exponential_for_attempt`'s
/// parameters so a connector's config maps onto it without translation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 60_000,
        }
    }
}

/// Per-error retry policy entry (§4.4 submit_error_retrial), keyed by the
/// SMPP command_status name it applies to. Mirrors the config crate's
/// bootstrap defaults of the same shape, which seed a connector's copy at
/// creation; from then on the connector owns its own policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrialRule {
    pub max_retries: u32,
    pub delay_secs: u64,
}

/// The lifecycle state a connector's SCM task reports (§5 Scheduling: "one
/// Tokio task per connector"). `Reconnecting` is a substate of `None`
/// entered automatically after an unexpected disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStatus {
    None,
    Connecting,
    BoundTx,
    BoundRx,
    BoundTrx,
    UnbindRequested,
    Reconnecting,
}

/// An SMPP client connector (§3 Connector): "cid unique; cannot be
/// re-added with same cid while present".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connector {
    pub cid: ConnectorId,
    pub host: String,
    pub port: u16,
    pub bind_type: BindType,
    pub system_id: String,
    pub password: String,
    /// 0 = unlimited (§4.4).
    pub submit_sm_throughput: u32,
    pub requeue_delay_secs: u64,
    pub submit_error_retrial: std::collections::HashMap<String, RetrialRule>,
    pub reconnect_policy: ReconnectPolicy,
    #[serde(default)]
    pub status: ConnectorStatus,
    /// Administratively started; independent from `status`, which tracks
    /// the live socket's view. Starting a connector flips this and lets
    /// its SCM task begin connecting; stopping flips it back without
    /// removing the connector's configuration (§3 lifecycle: "add ->
    /// start/stop (many cycles) -> remove").
    #[serde(default)]
    pub started: bool,
}

impl Default for ConnectorStatus {
    fn default() -> Self {
        Self::None
    }
}

impl Connector {
    pub fn new(cid: impl Into<ConnectorId>, host: impl Into<String>, port: u16, bind_type: BindType) -> Self {
        Self {
            cid: cid.into(),
            host: host.into(),
            port,
            bind_type,
            system_id: String::new(),
            password: String::new(),
            submit_sm_throughput: 0,
            requeue_delay_secs: 30,
            submit_error_retrial: std::collections::HashMap::new(),
            reconnect_policy: ReconnectPolicy::default(),
            status: ConnectorStatus::None,
            started: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connector_starts_unbound_and_stopped() {
        let c = Connector::new("smsc1", "10.0.0.1", 2775, BindType::Transceiver);
        assert_eq!(c.status, ConnectorStatus::None);
        assert!(!c.started);
    }
}
