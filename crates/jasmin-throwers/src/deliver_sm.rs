//! The deliver_sm thrower (§4.4): consumes `deliver.sm.#`, forwards each
//! classified MO message to its subscriber — an HTTP URL (form POST with
//! retry) or a bound downstream SMPP session.

use futures::StreamExt;
use jasmin_bus::{routing, Envelope};
use jasmin_proto::{MessageId, MoNotification, MoSubscriber};
use lapin::options::BasicAckOptions;
use smpp_pdu::{Address, DeliverSm as DeliverSmPdu, EsmClass};
use tracing::{debug, error, warn};

use crate::context::ThrowerContext;
use crate::error::ThrowerError;

pub async fn run(ctx: ThrowerContext) -> Result<(), ThrowerError> {
    let queue_name = "deliver_sm_thrower";
    ctx.bus.declare_queue(queue_name, routing::DELIVER_SM_WILDCARD).await?;
    let mut consumer = ctx.bus.consume(queue_name, "deliver-sm-thrower").await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(err) => {
                warn!(error = %err, "deliver_sm thrower consumer error");
                continue;
            }
        };

        let envelope = Envelope::from_properties(&delivery.properties, delivery.data.clone());
        match bincode::deserialize::<MoNotification>(&envelope.body) {
            Ok(notification) => throw_one(&ctx, &notification).await,
            Err(err) => error!(error = %err, "undecodable MoNotification, dropping"),
        }

        if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
            warn!(error = %err, "failed to ack deliver_sm thrower delivery");
        }
    }
    Ok(())
}

async fn throw_one(ctx: &ThrowerContext, notification: &MoNotification) {
    match &notification.subscriber {
        MoSubscriber::Http { url } => throw_http(ctx, notification, url).await,
        MoSubscriber::Smpp { system_id } => throw_smpp(ctx, notification, system_id).await,
    }
}

/// §4.4: "POST with form-encoded fields ... `content` is decoded text if
/// possible, `binary` is hex. Success = HTTP 2xx ... On failure: retry up
/// to `max_retries` with `retry_delay` seconds; exhaustion is logged and
/// dropped."
async fn throw_http(ctx: &ThrowerContext, notification: &MoNotification, url: &str) {
    let message_id = MessageId::new();
    let content_text = String::from_utf8(notification.content.clone()).unwrap_or_default();
    let form = [
        ("id", message_id.to_string()),
        ("from", notification.source_addr.clone()),
        ("to", notification.destination_addr.clone()),
        ("origin-connector", notification.origin_cid.to_string()),
        ("coding", notification.data_coding.to_string()),
        ("binary", hex::encode(&notification.content)),
        ("content", content_text),
    ];

    for attempt in 0..=ctx.defaults.max_retries {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(ctx.defaults.retry_delay_secs)).await;
        }
        match ctx.http.post(url).form(&form).send().await {
            Ok(resp) if resp.status().is_success() => {
                if !ctx.defaults.require_ack_body {
                    debug!(url, message_id = %message_id, "MO thrown to HTTP subscriber");
                    return;
                }
                match resp.text().await {
                    Ok(body) if body.contains("ACK/Jasmin") => {
                        debug!(url, message_id = %message_id, "MO thrown to HTTP subscriber");
                        return;
                    }
                    _ => warn!(url, attempt, "subscriber accepted but ack body missing, retrying"),
                }
            }
            Ok(resp) => warn!(url, attempt, status = %resp.status(), "subscriber rejected MO, retrying"),
            Err(err) => warn!(url, attempt, error = %err, "MO POST failed, retrying"),
        }
    }
    error!(url, message_id = %message_id, "MO delivery to HTTP subscriber exhausted retries, dropping");
}

/// §4.4: "For SMPP targets ... find a bound session for system_id; if
/// absent, drop; if present, forward deliver_sm preserving fields."
async fn throw_smpp(ctx: &ThrowerContext, notification: &MoNotification, system_id: &str) {
    let pdu = DeliverSmPdu {
        source_addr: Address::new(notification.source_addr.clone()),
        destination_addr: Address::new(notification.destination_addr.clone()),
        esm_class: EsmClass::NORMAL,
        data_coding: notification.data_coding,
        short_message: notification.content.clone(),
        concat: None,
    };
    if let Err(err) = ctx.bound_sessions.forward(system_id, pdu).await {
        debug!(system_id, error = %err, "no bound session for MO forward, dropping");
    }
}
