//! The Router Core's "bound SMPP sessions" table (§4.8): lets
//! `jasmin-smppd` register a bound downstream session by `system_id` so
//! the deliver_sm/dlr throwers can address it (§4.4
//! "SmppServerSystemIdConnector") without either side knowing about the
//! other's transport.

use std::collections::HashMap;
use std::sync::Arc;

use smpp_pdu::DeliverSm;
use tokio::sync::{mpsc, RwLock};

/// A handle a thrower uses to forward one `deliver_sm` into a bound
/// session's outbound queue. `jasmin-smppd` owns the receiving end and
/// writes frames to the actual socket.
pub type SessionSender = mpsc::Sender<DeliverSm>;

#[derive(Debug, thiserror::Error)]
pub enum BoundSessionError {
    #[error("no bound session for system_id {0}")]
    NotBound(String),
    #[error("bound session for system_id {0} is no longer accepting deliveries")]
    Closed(String),
}

/// Registry of currently-bound SMPP server sessions, keyed by `system_id`
/// (§3 User: "username is immutable after creation", reused here as the
/// SMPPs bind identity). Shared via `Clone` like `RouterCore`'s other
/// collaborators; the map itself lives behind one `RwLock`.
#[derive(Clone, Default)]
pub struct BoundSessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionSender>>>,
}

impl BoundSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by `jasmin-smppd` once a bind completes successfully.
    pub async fn register(&self, system_id: impl Into<String>, sender: SessionSender) {
        self.sessions.write().await.insert(system_id.into(), sender);
    }

    /// Called on unbind or connection loss.
    pub async fn unregister(&self, system_id: &str) {
        self.sessions.write().await.remove(system_id);
    }

    pub async fn is_bound(&self, system_id: &str) -> bool {
        self.sessions.read().await.contains_key(system_id)
    }

    /// Hand a deliver_sm to the bound session's outbound queue; if absent
    /// (or the session's receiver was dropped), the caller treats this as
    /// a dropped delivery per §4.4 "if absent, drop".
    pub async fn forward(&self, system_id: &str, pdu: DeliverSm) -> Result<(), BoundSessionError> {
        let sender = {
            let sessions = self.sessions.read().await;
            sessions.get(system_id).cloned()
        };
        match sender {
            Some(sender) => sender
                .send(pdu)
                .await
                .map_err(|_| BoundSessionError::Closed(system_id.to_string())),
            None => Err(BoundSessionError::NotBound(system_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smpp_pdu::{Address, EsmClass};

    fn pdu() -> DeliverSm {
        DeliverSm {
            source_addr: Address::new("1234"),
            destination_addr: Address::new("5678"),
            esm_class: EsmClass::NORMAL,
            data_coding: 0,
            short_message: b"hi".to_vec(),
            concat: None,
        }
    }

    #[tokio::test]
    async fn forward_to_an_unbound_system_id_is_not_bound() {
        let registry = BoundSessionRegistry::new();
        let err = registry.forward("nobody", pdu()).await.unwrap_err();
        assert!(matches!(err, BoundSessionError::NotBound(id) if id == "nobody"));
    }

    #[tokio::test]
    async fn forward_delivers_to_the_registered_sender() {
        let registry = BoundSessionRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.register("user1", tx).await;
        assert!(registry.is_bound("user1").await);

        registry.forward("user1", pdu()).await.unwrap();
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn unregister_makes_the_session_unaddressable() {
        let registry = BoundSessionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        registry.register("user1", tx).await;
        registry.unregister("user1").await;
        assert!(!registry.is_bound("user1").await);
    }
}
