//! Deliver classification (§4.2 "Long content re-assembly", "Deliver
//! classification", "DLR state mapping"): reassembly, DLR vs. MO
//! classification, and handing each off to the message bus for the
//! throwers to pick up.

use chrono::Utc;
use jasmin_proto::{
    ConnectorId, Direction, DlrNotification, DlrOriginator, JasminError, MessageId, MoNotification, MoSubscriber,
    Originator, Routable, RouteDestination,
};
use serde::{Deserialize, Serialize};
use smpp_pdu::DeliverSm;
use tracing::debug;

use crate::core::RouterCore;
use crate::error::RouterError;

/// The wire payload for the `dlr.lookup.#` queue (§2.1 supplement): a raw
/// deliver_sm plus the connector it arrived on, for a standalone
/// `jasmin-dlrlookupd` process to feed straight into [`RouterCore::handle_deliver`]
/// instead of the owning SCM calling it in-process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlrLookupPayload {
    pub origin_cid: ConnectorId,
    pub pdu: DeliverSm,
}

#[derive(Debug, Clone)]
pub enum DeliverOutcome {
    /// One part of a concatenated message was buffered; reassembly is not
    /// yet complete.
    BufferedPart,
    /// A delivery receipt that had no known correlation (expired or never
    /// requested); logged and dropped per §8.
    DlrDropped { smsc_message_id: String },
    Dlr(DlrNotification),
    Mo(MoNotification),
}

impl RouterCore {
    /// Handle a single deliver_sm as received by a bound SMPP session on
    /// `origin_cid`.
    pub async fn handle_deliver(&self, origin_cid: &ConnectorId, pdu: DeliverSm) -> Result<DeliverOutcome, RouterError> {
        let content = match pdu.concat {
            Some(concat) => {
                let completed = self
                    .store
                    .insert_reassembly_part(
                        &pdu.source_addr.value,
                        &pdu.destination_addr.value,
                        concat.ref_num,
                        concat.total_segments,
                        concat.seq_num,
                        pdu.short_message.clone(),
                        self.submit_defaults.reassembly_ttl_secs,
                    )
                    .await?;
                match completed {
                    Some(full) => full,
                    None => return Ok(DeliverOutcome::BufferedPart),
                }
            }
            None => pdu.short_message.clone(),
        };

        if pdu.esm_class.is_delivery_receipt {
            self.classify_dlr(&content).await
        } else {
            self.classify_mo(origin_cid, &pdu, content).await
        }
    }

    async fn classify_dlr(&self, content: &[u8]) -> Result<DeliverOutcome, RouterError> {
        let (smsc_id, state, err) = DeliverSm::parse_dlr_body(content).ok_or_else(|| {
            RouterError::Core(JasminError::Validation {
                field: "deliver_sm.short_message".to_string(),
                message: "delivery receipt body could not be parsed".to_string(),
            })
        })?;

        let correlation = match self.store.get_dlr_by_smsc_id(&smsc_id).await? {
            Some(c) => c,
            None => {
                debug!(smsc_id = %smsc_id, "DLR has no known correlation, dropping");
                return Ok(DeliverOutcome::DlrDropped { smsc_message_id: smsc_id });
            }
        };

        if state.is_final() {
            if let Some(remainder) = correlation.pending_charge {
                self.ucs.settle_pending_charge(&correlation.user_id, remainder).await?;
            }
            self.store.delete_dlr_correlation(&correlation).await?;
        }

        let notification = DlrNotification {
            parent_message_id: correlation.parent_message_id.clone(),
            smsc_message_id: smsc_id,
            state,
            error_code: err,
            originator: correlation.originator,
            user_id: correlation.user_id,
        };
        self.publish_dlr_notification(&notification, correlation.level).await?;
        Ok(DeliverOutcome::Dlr(notification))
    }

    async fn classify_mo(
        &self,
        origin_cid: &ConnectorId,
        pdu: &DeliverSm,
        content: Vec<u8>,
    ) -> Result<DeliverOutcome, RouterError> {
        let routable = Routable {
            direction: Direction::Mo,
            originator: Originator::Connector { cid: origin_cid.clone() },
            source_addr: pdu.source_addr.value.clone(),
            destination_addr: pdu.destination_addr.value.clone(),
            content,
            tags: Default::default(),
            admitted_at: Utc::now(),
        };

        let state = self.ucs.snapshot().await;
        // The matched route gates admission (a misconfigured table with no
        // default is a Routing error, per §4.1); the publish *routing key*
        // is the origin connector's cid regardless of the matched route's
        // destination (§4.2: "publish to MB on `deliver.sm.<origin-cid>`"),
        // since the deliver_sm thrower consumes the `deliver.sm.#`
        // wildcard rather than per-destination queues. The resolved
        // destination still matters for *where the thrower forwards to*,
        // so it rides along on the notification itself.
        let route = state.mo_routes.resolve(&routable, Utc::now()).ok_or(JasminError::Routing)?;
        let subscriber = match &route.destination {
            RouteDestination::HttpSubscriber(url) => MoSubscriber::Http { url: url.clone() },
            RouteDestination::SmppSystemId(system_id) => MoSubscriber::Smpp { system_id: system_id.clone() },
            _ => {
                return Err(RouterError::Core(JasminError::Validation {
                    field: "mo_route.destination".to_string(),
                    message: "MO route destination must be HttpSubscriber or SmppSystemId".to_string(),
                }))
            }
        };

        let notification = MoNotification {
            origin_cid: origin_cid.clone(),
            source_addr: routable.source_addr,
            destination_addr: routable.destination_addr,
            data_coding: pdu.data_coding,
            content: routable.content,
            subscriber,
        };
        let body = bincode::serialize(&notification)?;
        let envelope = jasmin_bus::Envelope::new(MessageId::new().to_string(), body);
        self.bus.publish(&jasmin_bus::routing::deliver_sm(origin_cid), &envelope).await?;
        Ok(DeliverOutcome::Mo(notification))
    }

    async fn publish_dlr_notification(
        &self,
        notification: &DlrNotification,
        level: jasmin_proto::DlrLevel,
    ) -> Result<(), RouterError> {
        let body = bincode::serialize(notification)?;
        let mut envelope = jasmin_bus::Envelope::new(notification.parent_message_id.to_string(), body);
        envelope.dlr_level = Some(level as u8);
        if let DlrOriginator::Http { url, method } = &notification.originator {
            envelope.dlr_url = Some(url.clone());
            envelope.dlr_method = Some(
                match method {
                    jasmin_proto::DlrMethod::Get => "GET",
                    jasmin_proto::DlrMethod::Post => "POST",
                }
                .to_string(),
            );
        }
        self.bus
            .publish(&jasmin_bus::routing::dlr(&notification.parent_message_id), &envelope)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_conf::{AmqpConfig, RedisConfig, SubmitDefaults};
    use jasmin_store::HotStore;
    use jasmin_ucs::UserCredentialStore;
    use smpp_pdu::{Address, EsmClass};

    fn core(ucs: UserCredentialStore, store: HotStore, bus: std::sync::Arc<jasmin_bus::MessageBus>) -> RouterCore {
        RouterCore::new(ucs, store, bus, SubmitDefaults::default())
    }

    async fn connect() -> (UserCredentialStore, HotStore, std::sync::Arc<jasmin_bus::MessageBus>) {
        let ucs = UserCredentialStore::new(std::env::temp_dir().join("jasmin-router-deliver-test.bin"));
        let store = HotStore::connect(&RedisConfig::default()).unwrap();
        let bus = std::sync::Arc::new(jasmin_bus::MessageBus::connect(&AmqpConfig::default()).await.unwrap());
        (ucs, store, bus)
    }

    fn deliver_sm(esm_class: EsmClass, body: &[u8]) -> DeliverSm {
        DeliverSm {
            source_addr: Address::new("1234"),
            destination_addr: Address::new("5678"),
            esm_class,
            data_coding: 0,
            short_message: body.to_vec(),
            concat: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn dlr_with_no_known_correlation_is_dropped() {
        let (ucs, store, bus) = connect().await;
        let core = core(ucs, store, bus);
        let pdu = deliver_sm(
            EsmClass::delivery_receipt(),
            b"id:unknown-123 sub:001 dlvrd:001 submit date:2601010000 done date:2601010001 stat:DELIVRD err:000 text:",
        );

        let outcome = core.handle_deliver(&ConnectorId::new("smsc1"), pdu).await.unwrap();
        assert!(matches!(outcome, DeliverOutcome::DlrDropped { smsc_message_id } if smsc_message_id == "unknown-123"));
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn unrouteable_mo_is_a_routing_error() {
        let (ucs, store, bus) = connect().await;
        let core = core(ucs, store, bus);
        let pdu = deliver_sm(EsmClass::NORMAL, b"hello");

        let err = core.handle_deliver(&ConnectorId::new("smsc1"), pdu).await.unwrap_err();
        assert!(matches!(err, RouterError::Core(JasminError::Routing)));
    }
}
