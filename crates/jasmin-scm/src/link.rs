//! The seam between the SCM's session logic and an actual SMPP wire
//! transport (§1: "parsing of SMPP PDU wire bytes itself ... assumed to
//! exist as a library"). A real deployment plugs in a codec-backed
//! implementation of [`SmppLink`]; this crate only drives the trait.

use async_trait::async_trait;
use smpp_pdu::{DeliverSm, SubmitSm, SubmitSmResp};

use jasmin_proto::Connector;

/// One bound (or binding) connection to a remote SMSC. A connector's
/// session task owns exactly one `SmppLink` at a time (§5: "the in-flight
/// table must remain owned by a single task per connector" extends to the
/// link itself).
#[async_trait]
pub trait SmppLink: Send {
    async fn bind(&mut self, connector: &Connector) -> Result<(), LinkError>;
    async fn submit(&mut self, pdu: SubmitSm) -> Result<SubmitSmResp, LinkError>;
    /// Non-blocking poll for an inbound deliver_sm (DLR or MO); `Ok(None)`
    /// means nothing is pending right now, not an error.
    async fn poll_deliver(&mut self) -> Result<Option<DeliverSm>, LinkError>;
    async fn enquire_link(&mut self) -> Result<(), LinkError>;
    async fn unbind(&mut self) -> Result<(), LinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("connection to SMSC lost")]
    Disconnected,
    #[error("SMSC rejected the request: {0}")]
    Rejected(smpp_pdu::CommandStatus),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Builds a fresh [`SmppLink`] for a connector. Implemented by whatever
/// crate owns the real codec/socket; `jasmin-scm` only depends on the
/// trait.
pub trait LinkFactory: Send + Sync {
    fn connect(&self, connector: &Connector) -> Box<dyn SmppLink>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use std::collections::VecDeque;

    /// An in-memory stand-in for a real wire transport: `submit` always
    /// succeeds with a synthesized SMSC id, `poll_deliver` drains a queue
    /// the test pushes into. Used by this crate's own tests and available
    /// to downstream crates under the `test-util` feature.
    #[derive(Default)]
    pub struct FakeLink {
        pub next_smsc_id: u64,
        pub pending_delivers: VecDeque<DeliverSm>,
        pub bound: bool,
    }

    #[async_trait]
    impl SmppLink for FakeLink {
        async fn bind(&mut self, _connector: &Connector) -> Result<(), LinkError> {
            self.bound = true;
            Ok(())
        }

        async fn submit(&mut self, pdu: SubmitSm) -> Result<SubmitSmResp, LinkError> {
            if !self.bound {
                return Err(LinkError::Disconnected);
            }
            self.next_smsc_id += 1;
            let _ = pdu;
            Ok(SubmitSmResp {
                command_status: smpp_pdu::CommandStatus::EsmeRok,
                sequence_number: self.next_smsc_id as u32,
                message_id: Some(format!("fake-{}", self.next_smsc_id)),
            })
        }

        async fn poll_deliver(&mut self) -> Result<Option<DeliverSm>, LinkError> {
            Ok(self.pending_delivers.pop_front())
        }

        async fn enquire_link(&mut self) -> Result<(), LinkError> {
            if self.bound {
                Ok(())
            } else {
                Err(LinkError::Disconnected)
            }
        }

        async fn unbind(&mut self) -> Result<(), LinkError> {
            self.bound = false;
            Ok(())
        }
    }

    /// Hands out a fresh [`FakeLink`] per connector, as a real
    /// [`LinkFactory`] would hand out a fresh socket.
    pub struct FakeLinkFactory;

    impl LinkFactory for FakeLinkFactory {
        fn connect(&self, _connector: &Connector) -> Box<dyn SmppLink> {
            Box::new(FakeLink::default())
        }
    }
}
