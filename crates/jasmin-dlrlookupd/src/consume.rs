//! The lookup-queue consumer (§2.1 supplement): decodes a
//! `DlrLookupPayload` off `dlr.lookup.#` and runs it through the same
//! `RouterCore::handle_deliver` path an in-process SMPP Client Manager
//! would otherwise call directly.

use futures::StreamExt;
use jasmin_bus::{routing, Envelope};
use jasmin_router::{DeliverOutcome, DlrLookupPayload, RouterCore};
use lapin::options::BasicAckOptions;
use tracing::{debug, error, warn};

use crate::error::DlrLookupdError;

pub async fn run(router: RouterCore) -> Result<(), DlrLookupdError> {
    let queue_name = "dlrlookupd";
    router.bus.declare_queue(queue_name, routing::DLR_LOOKUP_WILDCARD).await?;
    let mut consumer = router.bus.consume(queue_name, "dlrlookupd").await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(err) => {
                warn!(error = %err, "dlrlookupd consumer error");
                continue;
            }
        };

        let envelope = Envelope::from_properties(&delivery.properties, delivery.data.clone());
        match bincode::deserialize::<DlrLookupPayload>(&envelope.body) {
            Ok(payload) => handle_one(&router, payload).await,
            Err(err) => error!(error = %err, "undecodable DlrLookupPayload, dropping"),
        }

        if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
            warn!(error = %err, "failed to ack dlrlookupd delivery");
        }
    }
    Ok(())
}

async fn handle_one(router: &RouterCore, payload: DlrLookupPayload) {
    match router.handle_deliver(&payload.origin_cid, payload.pdu).await {
        Ok(DeliverOutcome::DlrDropped { smsc_message_id }) => {
            debug!(smsc_message_id, "DLR had no known correlation, dropped");
        }
        Ok(_) => {}
        Err(err) => error!(error = %err, "DLR lookup failed"),
    }
}
