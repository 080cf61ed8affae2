//! The per-connector session task (§4.3 SMPP Client Manager): state
//! machine, consumer loop over `submit.sm.<cid>`, throughput shaping,
//! in-flight tracking, error retrial, and periodic enquire-link, driven
//! by a `tokio::select!` background task over a connect/reconnect loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use jasmin_bus::{routing, BackoffPolicy, Envelope, MessageBus};
use jasmin_proto::{BindType, Connector, ConnectorId, ConnectorStatus, DlrNotification, DlrOriginator, MessageId, UserId};
use jasmin_router::RouterCore;
use jasmin_store::HotStore;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use smpp_pdu::SubmitSm;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::ScmError;
use crate::in_flight::InFlightTable;
use crate::link::{LinkError, LinkFactory, SmppLink};
use crate::throughput::ThroughputLimiter;

/// The collaborators one connector's task needs, bundled the way
/// `RouterCore` bundles the Router's (§4.2's `core.rs`).
pub struct SessionContext {
    pub bus: Arc<MessageBus>,
    pub store: HotStore,
    pub router: RouterCore,
    pub link_factory: Arc<dyn LinkFactory>,
    /// Baseline for submit-error retrial delay (§6 "fixed delay x
    /// attempt"); reconnect backoff instead comes from each connector's
    /// own `reconnect_policy`.
    pub backoff: BackoffPolicy,
    pub enquire_link_interval: Duration,
    pub deliver_poll_interval: Duration,
}

fn bound_status(bind_type: BindType) -> ConnectorStatus {
    match bind_type {
        BindType::Transmitter => ConnectorStatus::BoundTx,
        BindType::Receiver => ConnectorStatus::BoundRx,
        BindType::Transceiver => ConnectorStatus::BoundTrx,
    }
}

/// Drives one connector end-to-end until `shutdown` is signalled true.
/// Reconnects with an exponential backoff on bind failure or an
/// unexpected disconnect while bound (§4.3: "on connection loss, if
/// `reconnectOnConnectionLoss`, enter RECONNECTING").
pub async fn run(connector: Connector, ctx: SessionContext, status_tx: watch::Sender<ConnectorStatus>, mut shutdown: watch::Receiver<bool>) {
    let cid = connector.cid.clone();
    let mut attempt: u32 = 0;
    let reconnect_backoff = BackoffPolicy::new(
        Duration::from_millis(connector.reconnect_policy.base_delay_ms),
        Duration::from_millis(connector.reconnect_policy.max_delay_ms),
    );

    loop {
        if *shutdown.borrow() {
            let _ = status_tx.send(ConnectorStatus::None);
            return;
        }

        let _ = status_tx.send(ConnectorStatus::Connecting);
        let mut link = ctx.link_factory.connect(&connector);

        if let Err(err) = link.bind(&connector).await {
            warn!(cid = %cid, error = %err, attempt, "bind failed, backing off");
            let _ = status_tx.send(ConnectorStatus::Reconnecting);
            attempt += 1;
            if wait_or_shutdown(reconnect_backoff.exponential_for_attempt(attempt), &mut shutdown).await {
                let _ = status_tx.send(ConnectorStatus::None);
                return;
            }
            continue;
        }
        attempt = 0;
        info!(cid = %cid, "connector bound");
        let _ = status_tx.send(bound_status(connector.bind_type));

        match drive_bound_session(&cid, &connector, &ctx, link.as_mut(), &mut shutdown).await {
            Ok(()) => {
                let _ = status_tx.send(ConnectorStatus::None);
                return;
            }
            Err(err) => warn!(cid = %cid, error = %err, "session ended, reconnecting"),
        }

        let _ = status_tx.send(ConnectorStatus::Reconnecting);
        attempt += 1;
        if wait_or_shutdown(reconnect_backoff.exponential_for_attempt(attempt), &mut shutdown).await {
            let _ = status_tx.send(ConnectorStatus::None);
            return;
        }
    }
}

/// Sleep for `delay`, bailing out early (returning `true`, meaning "stop")
/// if shutdown is signalled while waiting.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        res = shutdown.changed() => res.is_err() || *shutdown.borrow(),
    }
}

/// The bound session's main loop: submit consumption, enquire-link, and
/// deliver polling, all through one `tokio::select!` so the in-flight
/// table and throughput limiter never need to be shared outside this
/// task (§5).
async fn drive_bound_session(
    cid: &ConnectorId,
    connector: &Connector,
    ctx: &SessionContext,
    link: &mut dyn SmppLink,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), ScmError> {
    let queue_name = format!("scm.{cid}");
    let routing_key = routing::submit_sm(cid);
    ctx.bus.declare_queue(&queue_name, &routing_key).await?;
    let mut consumer = ctx.bus.consume(&queue_name, &format!("scm-{cid}")).await?;

    let mut limiter = ThroughputLimiter::new(connector.submit_sm_throughput);
    let mut in_flight = InFlightTable::new();
    let mut next_seq: u32 = 0;

    let mut enquire_ticker = tokio::time::interval(ctx.enquire_link_interval);
    enquire_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut deliver_ticker = tokio::time::interval(ctx.deliver_poll_interval);
    deliver_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = link.unbind().await;
                    return Ok(());
                }
            }
            _ = enquire_ticker.tick() => {
                link.enquire_link().await.map_err(ScmError::Link)?;
            }
            _ = deliver_ticker.tick() => {
                while let Some(pdu) = link.poll_deliver().await.map_err(ScmError::Link)? {
                    match ctx.router.handle_deliver(cid, pdu).await {
                        Ok(outcome) => debug!(cid = %cid, ?outcome, "deliver_sm classified"),
                        Err(err) => error!(cid = %cid, error = %err, "deliver_sm classification failed"),
                    }
                }
            }
            delivery = consumer.next() => {
                let delivery = match delivery {
                    Some(Ok(d)) => d,
                    Some(Err(_)) | None => return Err(ScmError::Link(LinkError::Disconnected)),
                };

                let envelope = Envelope::from_properties(&delivery.properties, delivery.data.clone());

                let pdu: SubmitSm = match bincode::deserialize(&envelope.body) {
                    Ok(pdu) => pdu,
                    Err(err) => {
                        error!(cid = %cid, error = %err, "undecodable submit_sm, dropping");
                        ack(&delivery).await;
                        continue;
                    }
                };

                if is_expired(&pdu) {
                    debug!(cid = %cid, message_id = %envelope.message_id, "validity_period elapsed, dropping");
                    ack(&delivery).await;
                    continue;
                }

                if !limiter.try_acquire() {
                    ctx.bus
                        .requeue_with_delay(&routing_key, &envelope, connector.requeue_delay_secs * 1000)
                        .await?;
                    ack(&delivery).await;
                    continue;
                }

                next_seq = next_seq.wrapping_add(1);
                let message_id = MessageId::from(envelope.message_id.clone());
                let user_id = UserId::new(envelope.user_id.clone().unwrap_or_default());
                in_flight.insert(next_seq, message_id.clone(), 0);

                match link.submit(pdu).await {
                    Ok(resp) if resp.command_status.is_ok() => {
                        in_flight.resolve(next_seq);
                        if let Some(smsc_id) = resp.message_id {
                            settle_smsc_id(ctx, &message_id, &smsc_id).await;
                        }
                        let _ = ctx.store.increment_submit_sm_count(&user_id, 1).await;
                        ack(&delivery).await;
                    }
                    Ok(resp) => {
                        in_flight.resolve(next_seq);
                        handle_submit_failure(ctx, connector, &routing_key, &envelope, &message_id, resp.command_status).await?;
                        ack(&delivery).await;
                    }
                    Err(err) => {
                        in_flight.resolve(next_seq);
                        nack(&delivery).await;
                        return Err(ScmError::Link(err));
                    }
                }
            }
        }
    }
}

fn is_expired(pdu: &SubmitSm) -> bool {
    pdu.validity_period
        .as_deref()
        .and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
        .is_some_and(|expiry| expiry.with_timezone(&Utc) < Utc::now())
}

/// Record the SMSC-assigned id into the existing DLR correlation, if one
/// was requested at submit time (§4.3: "match, record SMSC message-id
/// into HS DLR correlation").
async fn settle_smsc_id(ctx: &SessionContext, message_id: &MessageId, smsc_id: &str) {
    let Ok(Some(mut correlation)) = ctx.store.get_dlr_by_parent(message_id).await else {
        return;
    };
    correlation.smsc_message_id = Some(smsc_id.to_string());
    let ttl = (correlation.expires_at - Utc::now()).num_seconds().max(1) as u64;
    if let Err(err) = ctx.store.put_dlr_correlation(&correlation, ttl).await {
        warn!(message_id = %message_id, error = %err, "failed to record smsc_message_id");
    }
}

/// A submit_sm_resp with a non-OK status (§4.3 "Error retrial"): retry
/// through the connector's `submit_error_retrial` table keyed by the
/// command status's debug name (e.g. `EsmeRthrottled`), or fail
/// permanently with a synthetic DLR. The attempt count travels on the
/// envelope itself (`Envelope::attempt`) since each requeue is a brand new
/// AMQP delivery with no memory of its own history otherwise.
async fn handle_submit_failure(
    ctx: &SessionContext,
    connector: &Connector,
    routing_key: &str,
    envelope: &Envelope,
    message_id: &MessageId,
    status: smpp_pdu::CommandStatus,
) -> Result<(), ScmError> {
    let attempt = envelope.attempt + 1;
    let key = format!("{status:?}");
    if let Some(rule) = connector.submit_error_retrial.get(&key) {
        if attempt <= rule.max_retries {
            let delay = ctx.backoff.fixed_for_attempt(attempt).max(Duration::from_secs(rule.delay_secs));
            warn!(message_id = %message_id, status = %status, attempt, "submit failed, requeueing for retrial");
            let mut retried = envelope.clone();
            retried.attempt = attempt;
            ctx.bus.requeue_with_delay(routing_key, &retried, delay.as_millis() as u64).await?;
            return Ok(());
        }
    }

    error!(message_id = %message_id, status = %status, attempt, "submit failed permanently, publishing synthetic DLR");
    publish_undeliverable(ctx, message_id, status).await
}

/// §4.3: "Otherwise fail permanently and publish a synthetic dlr with
/// state=UNDELIV." Only meaningful if the original submit requested one;
/// otherwise there is nothing downstream waiting on a correlation.
async fn publish_undeliverable(ctx: &SessionContext, message_id: &MessageId, status: smpp_pdu::CommandStatus) -> Result<(), ScmError> {
    let Some(correlation) = ctx.store.get_dlr_by_parent(message_id).await? else {
        return Ok(());
    };

    if let Some(remainder) = correlation.pending_charge {
        ctx.router.ucs.settle_pending_charge(&correlation.user_id, remainder).await?;
    }
    ctx.store.delete_dlr_correlation(&correlation).await?;

    let notification = DlrNotification {
        parent_message_id: correlation.parent_message_id.clone(),
        smsc_message_id: String::new(),
        state: smpp_pdu::MessageState::Undeliverable,
        error_code: status.code(),
        originator: correlation.originator.clone(),
        user_id: correlation.user_id.clone(),
    };
    let body = bincode::serialize(&notification)?;
    let mut out = Envelope::new(notification.parent_message_id.to_string(), body);
    out.dlr_level = Some(correlation.level as u8);
    if let DlrOriginator::Http { url, method } = &notification.originator {
        out.dlr_url = Some(url.clone());
        out.dlr_method = Some(match method {
            jasmin_proto::DlrMethod::Get => "GET",
            jasmin_proto::DlrMethod::Post => "POST",
        }.to_string());
    }
    ctx.bus.publish(&routing::dlr(&notification.parent_message_id), &out).await?;
    Ok(())
}

async fn ack(delivery: &lapin::message::Delivery) {
    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
        warn!(error = %err, "failed to ack delivery");
    }
}

async fn nack(delivery: &lapin::message::Delivery) {
    if let Err(err) = delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await {
        warn!(error = %err, "failed to nack delivery");
    }
}
