//! The dlr thrower (§4.4): consumes `dlr.#`, forwards each delivery receipt
//! to whichever single channel its originator names — an HTTP callback
//! (GET/POST) or a bound downstream SMPP session — gated by the requested
//! `dlr_level`.

use chrono::Utc;
use futures::StreamExt;
use jasmin_proto::{DlrLevel, DlrMethod, DlrNotification, DlrOriginator};
use lapin::options::BasicAckOptions;
use smpp_pdu::{Address, DeliverSm as DeliverSmPdu, EsmClass};
use tracing::{debug, error, warn};

use jasmin_bus::{routing, Envelope};

use crate::context::ThrowerContext;
use crate::error::ThrowerError;

pub async fn run(ctx: ThrowerContext) -> Result<(), ThrowerError> {
    let queue_name = "dlr_thrower";
    ctx.bus.declare_queue(queue_name, routing::DLR_WILDCARD).await?;
    let mut consumer = ctx.bus.consume(queue_name, "dlr-thrower").await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(err) => {
                warn!(error = %err, "dlr thrower consumer error");
                continue;
            }
        };

        let envelope = Envelope::from_properties(&delivery.properties, delivery.data.clone());
        match bincode::deserialize::<DlrNotification>(&envelope.body) {
            Ok(notification) => throw_one(&ctx, &envelope, &notification).await,
            Err(err) => error!(error = %err, "undecodable DlrNotification, dropping"),
        }

        if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
            warn!(error = %err, "failed to ack dlr thrower delivery");
        }
    }
    Ok(())
}

/// The level only gates *whether* a throw happens; the single channel to
/// throw on is already fixed by which `DlrOriginator` variant the
/// correlation recorded, since a correlation is created for one submit from
/// one originator and can't retroactively become both an HTTP and an SMPP
/// subscriber (§3 DLR Correlation Record is per-submit, not per-channel).
async fn throw_one(ctx: &ThrowerContext, envelope: &Envelope, notification: &DlrNotification) {
    let level = match envelope.dlr_level.and_then(DlrLevel::from_u8) {
        Some(level) => level,
        None => {
            warn!(message_id = %notification.parent_message_id, "dlr with missing or invalid level, dropping");
            return;
        }
    };

    match &notification.originator {
        DlrOriginator::Http { url, method } => {
            if level.throws_to_http() {
                throw_http(ctx, notification, url, *method).await;
            } else {
                debug!(message_id = %notification.parent_message_id, "dlr level does not request an HTTP throw, dropping");
            }
        }
        DlrOriginator::Smpp { bound_session_user } => {
            if level.throws_to_smpp() {
                throw_smpp(ctx, notification, bound_session_user).await;
            } else {
                debug!(message_id = %notification.parent_message_id, "dlr level does not request an SMPP throw, dropping");
            }
        }
    }
}

/// §4.4: "GET with query params, or POST with form-encoded fields; same
/// field set as the MO throw plus `status`/`err`. Retry/backoff identical
/// to the deliver_sm thrower."
async fn throw_http(ctx: &ThrowerContext, notification: &DlrNotification, url: &str, method: DlrMethod) {
    let fields = [
        ("id", notification.parent_message_id.to_string()),
        ("id_smsc", notification.smsc_message_id.clone()),
        ("status", notification.state.as_str().to_string()),
        ("err", notification.error_code.to_string()),
    ];

    for attempt in 0..=ctx.defaults.max_retries {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(ctx.defaults.retry_delay_secs)).await;
        }
        let sent = match method {
            DlrMethod::Get => ctx.http.get(url).query(&fields).send().await,
            DlrMethod::Post => ctx.http.post(url).form(&fields).send().await,
        };
        match sent {
            Ok(resp) if resp.status().is_success() => {
                if !ctx.defaults.require_ack_body {
                    debug!(url, message_id = %notification.parent_message_id, "dlr thrown to HTTP subscriber");
                    return;
                }
                match resp.text().await {
                    Ok(body) if body.contains("ACK/Jasmin") => {
                        debug!(url, message_id = %notification.parent_message_id, "dlr thrown to HTTP subscriber");
                        return;
                    }
                    _ => warn!(url, attempt, "subscriber accepted dlr but ack body missing, retrying"),
                }
            }
            Ok(resp) => warn!(url, attempt, status = %resp.status(), "subscriber rejected dlr, retrying"),
            Err(err) => warn!(url, attempt, error = %err, "dlr request failed, retrying"),
        }
    }
    error!(url, message_id = %notification.parent_message_id, "dlr delivery to HTTP subscriber exhausted retries, dropping");
}

/// §4.4 "SmppServerSystemIdConnector": the correlation only records the
/// bound user's `UserId`, so the session it's forwarded to has to be
/// resolved back to a `system_id` (the registry's key, same as the
/// username a bound session authenticated with) via a UCS lookup.
///
/// `smpp-pdu` models `deliver_sm` only (no `data_sm`), so every
/// SMPP-forwarded DLR is thrown as a `deliver_sm` carrying the standard
/// `id:...sub:...dlvrd:...submit date:...done date:...stat:...err:...text:`
/// body regardless of a connector's configured `dlr_pdu` preference.
async fn throw_smpp(ctx: &ThrowerContext, notification: &DlrNotification, bound_session_user: &jasmin_proto::UserId) {
    let state = ctx.ucs.snapshot().await;
    let system_id = match state.users.get(bound_session_user) {
        Some(user) => user.username.clone(),
        None => {
            debug!(user_id = %bound_session_user, "dlr originator user no longer exists, dropping");
            return;
        }
    };

    let pdu = DeliverSmPdu {
        source_addr: Address::new(notification.smsc_message_id.clone()),
        destination_addr: Address::new(system_id.clone()),
        esm_class: EsmClass::delivery_receipt(),
        data_coding: 0,
        short_message: dlr_receipt_body(notification),
        concat: None,
    };
    if let Err(err) = ctx.bound_sessions.forward(&system_id, pdu).await {
        debug!(system_id, error = %err, "no bound session for dlr forward, dropping");
    }
}

/// The wire text a `deliver_sm`-carried delivery receipt uses (§4.2 "DLR
/// state mapping"); `submit date`/`done date` use the SMPP `YYMMDDhhmm`
/// short form since that's all the correlation record keeps.
fn dlr_receipt_body(notification: &DlrNotification) -> Vec<u8> {
    let now = Utc::now().format("%y%m%d%H%M").to_string();
    format!(
        "id:{} sub:001 dlvrd:001 submit date:{} done date:{} stat:{} err:{:03} text:",
        notification.smsc_message_id,
        now,
        now,
        notification.state.as_str(),
        notification.error_code,
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_proto::MessageId;
    use smpp_pdu::MessageState;

    #[test]
    fn receipt_body_carries_state_and_err() {
        let notification = DlrNotification {
            parent_message_id: MessageId::new(),
            smsc_message_id: "smsc-1".to_string(),
            state: MessageState::Delivered,
            error_code: 0,
            originator: DlrOriginator::Http {
                url: "http://h/r".to_string(),
                method: DlrMethod::Post,
            },
            user_id: jasmin_proto::UserId::new("u1"),
        };
        let body = String::from_utf8(dlr_receipt_body(&notification)).unwrap();
        assert!(body.contains("id:smsc-1"));
        assert!(body.contains("stat:DELIVRD"));
        assert!(body.contains("err:000"));
    }
}
