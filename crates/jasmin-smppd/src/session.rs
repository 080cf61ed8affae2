//! Drives one accepted ESME connection end-to-end (§4.8): authenticate
//! the bind against UCS SMPPs credentials, register with the Router
//! Core's bound-session table, then loop submit_sm ingestion against
//! outbound deliver_sm forwarding until the link drops or unbinds.
//!
//! Grounded on `jasmin-scm::session`'s `drive_bound_session` shape: one
//! `tokio::select!` loop owning everything the session needs, nothing
//! shared across tasks except through channels.

use std::collections::HashSet;

use jasmin_proto::{DlrLevel, JasminError, UserId};
use jasmin_router::{DlrRequest, DlrRequestOriginator, SubmitRequest};
use jasmin_ucs::UcsError;
use smpp_pdu::{BindResp, CommandStatus, SubmitSm, SubmitSmResp};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::SmppdContext;
use crate::error::SmppdError;
use crate::link::{LinkError, ServerLink};

/// How many queued outbound deliver_sm a bound session will buffer before
/// a slow ESME starts applying backpressure to the throwers.
const DELIVER_QUEUE_DEPTH: usize = 256;

fn bind_failure_status(err: &UcsError) -> CommandStatus {
    match err {
        UcsError::Quota(JasminError::Authentication { .. }) => CommandStatus::EsmeRinvpaswd,
        UcsError::Quota(JasminError::Authorization { .. }) => CommandStatus::EsmeRbindfail,
        UcsError::Quota(JasminError::Throughput { .. }) => CommandStatus::EsmeRthrottled,
        _ => CommandStatus::EsmeRbindfail,
    }
}

/// Accept one ESME's bind, authenticate it, and if successful drive its
/// session until it disconnects or unbinds. Bind failures are reported on
/// the wire via `bind_resp` rather than returned as an error: a rejected
/// bind is an expected outcome, not a transport fault.
pub async fn run(mut link: Box<dyn ServerLink>, ctx: SmppdContext) -> Result<(), SmppdError> {
    let bind = link.recv_bind().await?;

    let user_id = match ctx.ucs.try_bind(&bind.system_id, &bind.password).await {
        Ok(id) => id,
        Err(err) => {
            warn!(system_id = %bind.system_id, error = %err, "bind rejected");
            link.send_bind_resp(BindResp {
                command_status: bind_failure_status(&err),
                sequence_number: bind.sequence_number,
                system_id: bind.system_id.clone(),
            })
            .await?;
            return Ok(());
        }
    };

    link.send_bind_resp(BindResp {
        command_status: CommandStatus::EsmeRok,
        sequence_number: bind.sequence_number,
        system_id: bind.system_id.clone(),
    })
    .await?;
    info!(system_id = %bind.system_id, kind = ?bind.kind, "ESME bound");

    let (deliver_tx, mut deliver_rx) = mpsc::channel(DELIVER_QUEUE_DEPTH);
    ctx.router.bound_sessions.register(bind.system_id.clone(), deliver_tx).await;

    let result = drive_bound_session(&bind.system_id, &bind.password, &user_id, link.as_mut(), &ctx, &mut deliver_rx).await;

    ctx.router.bound_sessions.unregister(&bind.system_id).await;
    ctx.ucs.unbind(&user_id).await;
    info!(system_id = %bind.system_id, "ESME unbound");
    result
}

async fn drive_bound_session(
    system_id: &str,
    password: &str,
    user_id: &UserId,
    link: &mut dyn ServerLink,
    ctx: &SmppdContext,
    deliver_rx: &mut mpsc::Receiver<smpp_pdu::DeliverSm>,
) -> Result<(), SmppdError> {
    let mut poll_ticker = tokio::time::interval(std::time::Duration::from_millis(50));
    loop {
        tokio::select! {
            pdu = deliver_rx.recv() => {
                match pdu {
                    Some(pdu) => link.send_deliver(pdu).await?,
                    // Registry entry was dropped out from under us, which
                    // only happens once `unregister` already ran for this
                    // system_id — nothing left to deliver.
                    None => return Ok(()),
                }
            }
            _ = poll_ticker.tick() => {
                loop {
                    match link.poll_submit().await {
                        Ok(Some((sequence_number, pdu))) => {
                            let resp = handle_submit(system_id, password, user_id, pdu, ctx).await;
                            link.send_submit_resp(SubmitSmResp {
                                command_status: resp.0,
                                sequence_number,
                                message_id: resp.1,
                            })
                            .await?;
                        }
                        Ok(None) => break,
                        // A dropped connection ends the session normally;
                        // the listener already logs genuinely unexpected
                        // transport failures at the spawn site.
                        Err(LinkError::Disconnected) => return Ok(()),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }
}

async fn handle_submit(system_id: &str, password: &str, user_id: &UserId, pdu: SubmitSm, ctx: &SmppdContext) -> (CommandStatus, Option<String>) {
    let req = build_submit_request(system_id, password, user_id, &pdu);
    match ctx.router.submit(req).await {
        Ok(outcome) => (CommandStatus::EsmeRok, Some(outcome.message_id.to_string())),
        Err(err) => {
            debug!(system_id, error = %err, "submit_sm rejected");
            (submit_failure_status(&err), None)
        }
    }
}

fn submit_failure_status(err: &jasmin_router::RouterError) -> CommandStatus {
    let core: JasminError = match err {
        jasmin_router::RouterError::Core(e) => e.clone(),
        other => JasminError::Transport { reason: other.to_string() },
    };
    match core {
        JasminError::Authentication { .. } => CommandStatus::EsmeRinvpaswd,
        JasminError::Authorization { .. } => CommandStatus::EsmeRbindfail,
        JasminError::Validation { .. } => CommandStatus::EsmeRinvdstadr,
        JasminError::Routing => CommandStatus::EsmeRsyserr,
        JasminError::Charging { .. } | JasminError::Throughput { .. } => CommandStatus::EsmeRmsgqful,
        JasminError::Transport { .. } | JasminError::Remote { .. } | JasminError::Expired => CommandStatus::EsmeRsyserr,
    }
}

/// Admission re-authenticates on every submit regardless of transport
/// (§4.2 step 1), so the bind-time password travels with the session for
/// the lifetime of the bind rather than being discarded once the bind
/// succeeds.
fn build_submit_request(system_id: &str, password: &str, user_id: &UserId, pdu: &SubmitSm) -> SubmitRequest {
    let dlr = if pdu.registered_delivery != 0 {
        Some(DlrRequest {
            level: DlrLevel::SmscOnly,
            originator: DlrRequestOriginator::Smpp {
                bound_session_user: user_id.clone(),
            },
        })
    } else {
        None
    };

    SubmitRequest {
        username: system_id.to_string(),
        password: password.to_string(),
        source_addr: Some(pdu.source_addr.value.clone()),
        destination_addr: pdu.destination_addr.value.clone(),
        content: pdu.short_message.clone(),
        dlr,
        priority: pdu.priority_flag,
        validity_period_secs: None,
        schedule_delivery_time: pdu.schedule_delivery_time.clone(),
        tags: HashSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_conf::{AmqpConfig, RedisConfig, SubmitDefaults};
    use jasmin_proto::{Group, User};
    use jasmin_store::HotStore;
    use smpp_pdu::BindKind;

    fn bind_request() -> smpp_pdu::BindRequest {
        smpp_pdu::BindRequest {
            kind: BindKind::Transceiver,
            system_id: "alice".to_string(),
            password: "pw".to_string(),
            sequence_number: 1,
        }
    }

    async fn seeded_ucs() -> jasmin_ucs::UserCredentialStore {
        let ucs = jasmin_ucs::UserCredentialStore::new(std::env::temp_dir().join("jasmin-smppd-session-test.bin"));
        ucs.add_group(Group::new("g1")).await.unwrap();
        let mut user = User::new("u1", "g1", "alice", "pw");
        user.smpps_credential.bind_authorized = true;
        user.smpps_credential.max_bindings = Some(1);
        ucs.add_user(user).await.unwrap();
        ucs
    }

    #[test]
    fn bind_failure_status_maps_auth_errors() {
        assert_eq!(
            bind_failure_status(&UcsError::Quota(JasminError::Authentication { username: "a".to_string() })),
            CommandStatus::EsmeRinvpaswd
        );
        assert_eq!(
            bind_failure_status(&UcsError::Quota(JasminError::Authorization {
                username: "a".to_string(),
                action: "smpp_bind".to_string()
            })),
            CommandStatus::EsmeRbindfail
        );
        assert_eq!(
            bind_failure_status(&UcsError::Quota(JasminError::Throughput { surface: "smpp_bind:a".to_string() })),
            CommandStatus::EsmeRthrottled
        );
    }

    #[test]
    fn build_submit_request_requests_an_smpp_dlr_when_registered_delivery_is_set() {
        let pdu = SubmitSm {
            source_addr: smpp_pdu::Address::new("1234"),
            destination_addr: smpp_pdu::Address::new("5678"),
            esm_class: smpp_pdu::EsmClass::NORMAL,
            data_coding: 0,
            short_message: b"hi".to_vec(),
            registered_delivery: 1,
            validity_period: None,
            schedule_delivery_time: None,
            priority_flag: 0,
            concat: None,
        };
        let req = build_submit_request("alice", "pw", &UserId::new("u1"), &pdu);
        let dlr = req.dlr.expect("dlr requested");
        assert_eq!(dlr.level, DlrLevel::SmscOnly);
        assert!(matches!(dlr.originator, DlrRequestOriginator::Smpp { .. }));
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn unauthorized_bind_is_rejected_before_registration() {
        let ucs = jasmin_ucs::UserCredentialStore::new(std::env::temp_dir().join("jasmin-smppd-session-unauth.bin"));
        ucs.add_group(Group::new("g1")).await.unwrap();
        ucs.add_user(User::new("u1", "g1", "alice", "pw")).await.unwrap();

        let store = HotStore::connect(&RedisConfig::default()).unwrap();
        let bus = std::sync::Arc::new(jasmin_bus::MessageBus::connect(&AmqpConfig::default()).await.unwrap());
        let router = jasmin_router::RouterCore::new(ucs.clone(), store, bus, SubmitDefaults::default());
        let ctx = SmppdContext { ucs, router };

        let (bind_tx, mut bind_rx) = mpsc::unbounded_channel();
        let (submit_tx, _submit_rx) = mpsc::unbounded_channel();
        let (deliver_tx, _deliver_rx) = mpsc::unbounded_channel();
        let link: Box<dyn ServerLink> = Box::new(crate::link::test_util::FakeServerLink {
            pending_bind: Some(bind_request()),
            pending_submits: Default::default(),
            bind_resps: bind_tx,
            submit_resps: submit_tx,
            delivers: deliver_tx,
            closed: false,
            disconnect_once_drained: true,
        });

        run(link, ctx).await.unwrap();
        let resp = bind_rx.recv().await.unwrap();
        assert_eq!(resp.command_status, CommandStatus::EsmeRbindfail);
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn authorized_bind_registers_then_unbinds_on_disconnect() {
        let ucs = seeded_ucs().await;
        let store = HotStore::connect(&RedisConfig::default()).unwrap();
        let bus = std::sync::Arc::new(jasmin_bus::MessageBus::connect(&AmqpConfig::default()).await.unwrap());
        let router = jasmin_router::RouterCore::new(ucs.clone(), store, bus, SubmitDefaults::default());
        let ctx = SmppdContext { ucs, router };

        let (bind_tx, mut bind_rx) = mpsc::unbounded_channel();
        let (submit_tx, _submit_rx) = mpsc::unbounded_channel();
        let (deliver_tx, _deliver_rx) = mpsc::unbounded_channel();
        let link: Box<dyn ServerLink> = Box::new(crate::link::test_util::FakeServerLink {
            pending_bind: Some(bind_request()),
            pending_submits: Default::default(),
            bind_resps: bind_tx,
            submit_resps: submit_tx,
            delivers: deliver_tx,
            closed: false,
            disconnect_once_drained: true,
        });

        run(link, ctx.clone()).await.unwrap();
        let resp = bind_rx.recv().await.unwrap();
        assert_eq!(resp.command_status, CommandStatus::EsmeRok);
        assert!(!ctx.router.bound_sessions.is_bound("alice").await);
    }
}
