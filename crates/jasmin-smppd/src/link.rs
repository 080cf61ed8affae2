//! The seam between this crate's session logic and an actual SMPP server
//! transport (§1: PDU wire-byte parsing is assumed to exist as a library,
//! same boundary `jasmin-scm::link` draws on the client side). A real
//! deployment plugs in a codec-backed listener; this crate only drives
//! the traits.

use async_trait::async_trait;
use smpp_pdu::{BindRequest, DeliverSm, SubmitSm, SubmitSmResp};

/// One accepted-but-not-yet-bound (or bound) ESME connection.
#[async_trait]
pub trait ServerLink: Send {
    /// Wait for the bind PDU the ESME opens the connection with.
    async fn recv_bind(&mut self) -> Result<BindRequest, LinkError>;
    async fn send_bind_resp(&mut self, resp: smpp_pdu::BindResp) -> Result<(), LinkError>;
    /// Non-blocking poll for an inbound submit_sm; `Ok(None)` means
    /// nothing pending right now, not an error.
    async fn poll_submit(&mut self) -> Result<Option<(u32, SubmitSm)>, LinkError>;
    async fn send_submit_resp(&mut self, resp: SubmitSmResp) -> Result<(), LinkError>;
    /// Push a deliver_sm (MO or a DLR-as-deliver_sm) down to the bound
    /// ESME.
    async fn send_deliver(&mut self, pdu: DeliverSm) -> Result<(), LinkError>;
    async fn close(&mut self) -> Result<(), LinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("ESME connection lost")]
    Disconnected,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Accepts fresh [`ServerLink`]s as ESMEs connect. Implemented by whatever
/// crate owns the real listening socket/codec; this crate only depends on
/// the trait.
#[async_trait]
pub trait ServerTransport: Send {
    async fn accept(&mut self) -> Result<Box<dyn ServerLink>, LinkError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::mpsc;

    /// An in-memory stand-in for one accepted ESME connection: the test
    /// pushes a bind and any submit_sm PDUs it wants to simulate, and
    /// drains what the session sends back.
    pub struct FakeServerLink {
        pub pending_bind: Option<BindRequest>,
        pub pending_submits: VecDeque<(u32, SubmitSm)>,
        pub bind_resps: mpsc::UnboundedSender<smpp_pdu::BindResp>,
        pub submit_resps: mpsc::UnboundedSender<SubmitSmResp>,
        pub delivers: mpsc::UnboundedSender<DeliverSm>,
        pub closed: bool,
        /// Once every queued submit has been polled, report the
        /// connection as lost rather than idling forever — lets a test
        /// `.await` the whole session to completion.
        pub disconnect_once_drained: bool,
    }

    #[async_trait]
    impl ServerLink for FakeServerLink {
        async fn recv_bind(&mut self) -> Result<BindRequest, LinkError> {
            self.pending_bind.take().ok_or(LinkError::Disconnected)
        }

        async fn send_bind_resp(&mut self, resp: smpp_pdu::BindResp) -> Result<(), LinkError> {
            let _ = self.bind_resps.send(resp);
            Ok(())
        }

        async fn poll_submit(&mut self) -> Result<Option<(u32, SubmitSm)>, LinkError> {
            match self.pending_submits.pop_front() {
                Some(item) => Ok(Some(item)),
                None if self.disconnect_once_drained => Err(LinkError::Disconnected),
                None => Ok(None),
            }
        }

        async fn send_submit_resp(&mut self, resp: SubmitSmResp) -> Result<(), LinkError> {
            let _ = self.submit_resps.send(resp);
            Ok(())
        }

        async fn send_deliver(&mut self, pdu: DeliverSm) -> Result<(), LinkError> {
            self.delivers.send(pdu).map_err(|_| LinkError::Disconnected)
        }

        async fn close(&mut self) -> Result<(), LinkError> {
            self.closed = true;
            Ok(())
        }
    }
}
