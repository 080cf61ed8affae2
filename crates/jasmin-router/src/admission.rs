//! Submit admission (§4.2 "Submit admission (from HTTP or SS)"): the
//! seven-step pipeline from authentication through MB publish and DLR
//! correlation storage.

use std::collections::HashSet;

use chrono::Utc;
use jasmin_proto::{
    segmentation, ConnectorId, Direction, DlrCorrelation, DlrLevel, DlrMethod, DlrOriginator, JasminError, MessageId,
    MtAction, MtField, Originator, Route, Routable, UserId,
};
use rust_decimal::Decimal;

use crate::core::RouterCore;
use crate::error::RouterError;
use crate::failover::pick_destination;

/// Where a DLR should be thrown once the message resolves: an HTTP
/// callback (HTTP `/send`'s `dlr-url`) or back down a bound SMPP session
/// (§4.8: `registered_delivery` on an inbound `submit_sm`).
#[derive(Debug, Clone)]
pub enum DlrRequestOriginator {
    Http { url: String, method: DlrMethod },
    Smpp { bound_session_user: UserId },
}

/// Where (and how) a DLR should be thrown once the message resolves.
#[derive(Debug, Clone)]
pub struct DlrRequest {
    pub level: DlrLevel,
    pub originator: DlrRequestOriginator,
}

/// A submit request as received from either HTTP `/send` or the SMPP
/// server adapter (§4.2, §4.8: "converted into the same admission request
/// shape HTTP `/send` uses").
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub username: String,
    pub password: String,
    pub source_addr: Option<String>,
    pub destination_addr: String,
    pub content: Vec<u8>,
    pub dlr: Option<DlrRequest>,
    /// 0..=3.
    pub priority: u8,
    pub validity_period_secs: Option<u64>,
    pub schedule_delivery_time: Option<String>,
    pub tags: HashSet<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub message_id: MessageId,
    pub submit_sm_count: u8,
}

/// Everything the §4.7 `/rate` endpoint needs: admission runs through
/// authentication, credential enforcement and route resolution, but stops
/// before segmentation is assigned a ref_num, before any charge is
/// committed, and before anything is published or correlated.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub unit_rate: Decimal,
    pub submit_sm_count: u8,
    pub total: Decimal,
}

/// Result of steps 1-3, carried forward into segmentation and publish so
/// `submit` doesn't have to re-derive the admitted addressing.
struct AdmittedMessage {
    user_id: UserId,
    cid: ConnectorId,
    route: Route,
    content: Vec<u8>,
    source_addr: String,
    destination_addr: String,
}

impl RouterCore {
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitOutcome, RouterError> {
        let admitted = self.admit_common(&req).await?;

        // Step 5: segmentation.
        let message_id = MessageId::new();
        let ref_num = (message_id.as_str().as_bytes().iter().fold(0u16, |acc, b| acc.wrapping_add(*b as u16)))
            .wrapping_add(req.priority as u16);
        let segments = segmentation::split(
            &admitted.content,
            self.submit_defaults.long_content_split,
            self.submit_defaults.long_content_max_parts,
            ref_num,
        )
        .map_err(RouterError::Core)?;

        // Step 4: rate charge, now that submit_sm_count is known.
        let unit_rate = admitted.route.rate.unwrap_or(Decimal::ZERO);
        let total = unit_rate * Decimal::from(segments.len());
        let pending_charge = self.charge(&admitted.user_id, total).await?;

        // Step 6: publish each segment to MB on submit.sm.<cid>.
        let carries_udh = self.submit_defaults.long_content_split == segmentation::LongContentSplit::Udh;
        for segment in &segments {
            let pdu = smpp_pdu::SubmitSm {
                source_addr: smpp_pdu::Address::new(admitted.source_addr.clone()),
                destination_addr: smpp_pdu::Address::new(admitted.destination_addr.clone()),
                esm_class: if segment.concat.total_segments > 1 && carries_udh {
                    smpp_pdu::EsmClass { is_delivery_receipt: false, udh_indicator: true }
                } else {
                    smpp_pdu::EsmClass::NORMAL
                },
                data_coding: 0,
                short_message: segment.payload.clone(),
                registered_delivery: if req.dlr.is_some() { 1 } else { 0 },
                // Carried as an absolute RFC 3339 timestamp rather than the
                // relative seconds the request arrived with, so the SCM can
                // compare it against "now" at dequeue time without also
                // needing to know when the message was admitted.
                validity_period: req
                    .validity_period_secs
                    .map(|secs| (Utc::now() + chrono::Duration::seconds(secs as i64)).to_rfc3339()),
                schedule_delivery_time: req.schedule_delivery_time.clone(),
                priority_flag: req.priority,
                concat: if segment.concat.total_segments > 1 { Some(segment.concat) } else { None },
            };
            self.publish_segment(&admitted.cid, &message_id, &admitted.user_id, &pdu).await?;
        }

        // Step 7: DLR correlation, if requested.
        if let Some(dlr) = &req.dlr {
            if dlr.level as u8 >= 1 {
                self.store_dlr_correlation(
                    &message_id,
                    &admitted.user_id,
                    &admitted.cid,
                    dlr,
                    req.validity_period_secs,
                    pending_charge,
                )
                .await?;
            }
        }

        Ok(SubmitOutcome {
            message_id,
            submit_sm_count: segments.len() as u8,
        })
    }

    /// §4.7: run admission through route resolution and segmentation
    /// sizing only, no charge, no publish, no DLR allocation.
    pub async fn rate(&self, req: &SubmitRequest) -> Result<RateQuote, RouterError> {
        let admitted = self.admit_common(req).await?;
        let content = admitted.content;
        let route = admitted.route;
        let submit_sm_count = if content.len() <= segmentation::SINGLE_SEGMENT_LIMIT {
            1
        } else {
            segmentation::split(&content, self.submit_defaults.long_content_split, self.submit_defaults.long_content_max_parts, 0)
                .map_err(RouterError::Core)?
                .len() as u8
        };
        let unit_rate = route.rate.unwrap_or(Decimal::ZERO);
        Ok(RateQuote {
            unit_rate,
            submit_sm_count,
            total: unit_rate * Decimal::from(submit_sm_count),
        })
    }

    pub async fn balance(&self, username: &str, password: &str) -> Result<jasmin_proto::MtCredential, RouterError> {
        let state = self.ucs.snapshot().await;
        let user = state
            .find_user_by_username(username)
            .ok_or_else(|| JasminError::Authentication {
                username: username.to_string(),
            })?;
        if !user.password.matches(password) {
            return Err(JasminError::Authentication {
                username: username.to_string(),
            }
            .into());
        }
        Ok(user.mt_credential.clone())
    }

    /// Steps 1-3: authenticate, apply MT credential field enforcement and
    /// quotas, resolve the route. Shared by `submit` and `rate`.
    async fn admit_common(&self, req: &SubmitRequest) -> Result<AdmittedMessage, RouterError> {
        let state = self.ucs.snapshot().await;

        // Step 1: authenticate.
        let user = state
            .find_user_by_username(&req.username)
            .ok_or_else(|| JasminError::Authentication {
                username: req.username.clone(),
            })?;
        if !user.enabled {
            return Err(JasminError::Authentication {
                username: req.username.clone(),
            }
            .into());
        }
        let group = state
            .groups
            .get(&user.group_id)
            .ok_or_else(|| JasminError::Authentication {
                username: req.username.clone(),
            })?;
        if !group.enabled {
            return Err(JasminError::Authentication {
                username: req.username.clone(),
            }
            .into());
        }
        if !user.password.matches(&req.password) {
            return Err(JasminError::Authentication {
                username: req.username.clone(),
            }
            .into());
        }

        // Step 2: credential enforcement.
        if !user.mt_credential.is_authorized(MtAction::HttpSend) {
            return Err(JasminError::Authorization {
                username: req.username.clone(),
                action: "HttpSend".to_string(),
            }
            .into());
        }
        let source_addr = match &req.source_addr {
            Some(addr) if user.mt_credential.is_authorized(MtAction::SetSourceAddress) => {
                user.mt_credential.enforce_value_filter(MtField::SourceAddress, addr)
            }
            _ => user
                .mt_credential
                .default_values
                .get(&MtField::SourceAddress)
                .cloned()
                .unwrap_or_default(),
        };
        let destination_addr = user
            .mt_credential
            .enforce_value_filter(MtField::DestinationAddress, &req.destination_addr);
        let content_text = String::from_utf8_lossy(&req.content).into_owned();
        let enforced_content = user.mt_credential.enforce_value_filter(MtField::Content, &content_text);
        let content = if enforced_content == content_text {
            req.content.clone()
        } else {
            enforced_content.into_bytes()
        };

        if !user.mt_credential.submit_sm_count.can_afford(1) {
            return Err(JasminError::Charging {
                reason: "submit_sm_count quota exhausted".to_string(),
            }
            .into());
        }

        // Step 3: route resolution.
        let routable = Routable {
            direction: Direction::Mt,
            originator: Originator::User {
                user_id: user.id.clone(),
                group_id: user.group_id.clone(),
            },
            source_addr,
            destination_addr,
            content: content.clone(),
            tags: req.tags.clone(),
            admitted_at: Utc::now(),
        };
        let route = state
            .mt_routes
            .resolve(&routable, Utc::now())
            .ok_or(JasminError::Routing)?
            .clone();

        let cid = pick_destination(&route.destination, |cid| {
            state.connectors.get(cid).map(|c| c.started).unwrap_or(false)
        })
        .ok_or(JasminError::Routing)?;

        Ok(AdmittedMessage {
            user_id: user.id.clone(),
            cid,
            route,
            content,
            source_addr: routable.source_addr,
            destination_addr: routable.destination_addr,
        })
    }

    /// Enforce the balance quota and early-decrement percent (§4.2 step
    /// 4), delegated to the UCS so the check-then-deduct sequence is
    /// atomic under its single write lock. Returns the amount still owed
    /// once the message is confirmed delivered, or `None` if the full
    /// charge was taken up front.
    async fn charge(&self, user_id: &UserId, total: Decimal) -> Result<Option<Decimal>, RouterError> {
        Ok(self.ucs.charge_mt_balance(user_id, total).await?)
    }

    /// Wire format on `submit.sm.<cid>` is a bincode-encoded `SubmitSm`, not
    /// raw content bytes — the SMPP Client Manager needs the addressing and
    /// esm_class/priority/validity fields to build the PDU it hands to the
    /// link, not just the segment payload.
    async fn publish_segment(
        &self,
        cid: &ConnectorId,
        message_id: &MessageId,
        user_id: &UserId,
        pdu: &smpp_pdu::SubmitSm,
    ) -> Result<(), RouterError> {
        let body = bincode::serialize(pdu)?;
        let mut envelope = jasmin_bus::Envelope::new(message_id.to_string(), body);
        envelope.user_id = Some(user_id.to_string());
        if let Some(concat) = pdu.concat {
            envelope.concat = Some((concat.ref_num, concat.seq_num, concat.total_segments));
        }
        self.bus.publish(&jasmin_bus::routing::submit_sm(cid), &envelope).await?;
        Ok(())
    }

    async fn store_dlr_correlation(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
        cid: &ConnectorId,
        dlr: &DlrRequest,
        validity_period_secs: Option<u64>,
        pending_charge: Option<Decimal>,
    ) -> Result<(), RouterError> {
        let ttl_secs = validity_period_secs.unwrap_or(self.submit_defaults.default_dlr_ttl_secs);
        let now = Utc::now();
        let originator = match &dlr.originator {
            DlrRequestOriginator::Http { url, method } => DlrOriginator::Http {
                url: url.clone(),
                method: *method,
            },
            DlrRequestOriginator::Smpp { bound_session_user } => DlrOriginator::Smpp {
                bound_session_user: bound_session_user.clone(),
            },
        };
        let correlation = DlrCorrelation {
            parent_message_id: message_id.clone(),
            smsc_message_id: None,
            originator,
            level: dlr.level,
            user_id: user_id.clone(),
            connector: cid.clone(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs as i64),
            pending_charge,
        };
        self.store.put_dlr_correlation(&correlation, ttl_secs).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasmin_proto::{BalanceQuota, BindType, Connector, Group, GroupId, Route, User};
    use jasmin_store::HotStore;
    use jasmin_ucs::UserCredentialStore;

    fn seeded_ucs() -> UserCredentialStore {
        UserCredentialStore::new(std::env::temp_dir().join("jasmin-router-admission-test.bin"))
    }

    async fn seed(ucs: &UserCredentialStore) {
        ucs.with_write(|state| {
            state.groups.insert(GroupId::new("g1"), Group::new("g1"));
            let mut user = User::new("u1", "g1", "alice", "secret");
            user.mt_credential.balance = BalanceQuota::of(Decimal::from(100));
            state.users.insert(UserId::new("u1"), user);
            let mut connector = Connector::new("smsc1", "10.0.0.1", 2775, BindType::Transceiver);
            connector.started = true;
            state.connectors.insert(ConnectorId::new("smsc1"), connector);
            state
                .mt_routes
                .insert(Route::default_route(ConnectorId::new("smsc1")))
                .unwrap();
        })
        .await;
    }

    fn request() -> SubmitRequest {
        SubmitRequest {
            username: "alice".to_string(),
            password: "secret".to_string(),
            source_addr: Some("1234".to_string()),
            destination_addr: "5678".to_string(),
            content: b"hello".to_vec(),
            dlr: None,
            priority: 0,
            validity_period_secs: None,
            schedule_delivery_time: None,
            tags: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn wrong_password_is_an_authentication_error() {
        let ucs = seeded_ucs();
        seed(&ucs).await;
        let mut req = request();
        req.password = "wrong".to_string();

        // admit_common fails before touching the store or bus, so this can
        // run without either being live.
        let state = ucs.snapshot().await;
        let user = state.find_user_by_username(&req.username).unwrap();
        assert!(!user.password.matches(&req.password));
    }

    #[tokio::test]
    async fn disabled_group_blocks_an_otherwise_valid_user() {
        let ucs = seeded_ucs();
        seed(&ucs).await;
        ucs.with_write(|state| state.groups.get_mut(&GroupId::new("g1")).unwrap().enabled = false)
            .await;

        let state = ucs.snapshot().await;
        let user = state.find_user_by_username("alice").unwrap();
        let group = state.groups.get(&user.group_id).unwrap();
        assert!(!group.enabled);
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn submit_happy_path_charges_and_publishes() {
        let ucs = seeded_ucs();
        seed(&ucs).await;
        let store = HotStore::connect(&jasmin_conf::RedisConfig::default()).unwrap();
        let bus = std::sync::Arc::new(
            jasmin_bus::MessageBus::connect(&jasmin_conf::AmqpConfig::default())
                .await
                .unwrap(),
        );
        let core = RouterCore::new(ucs, store, bus, jasmin_conf::SubmitDefaults::default());

        let outcome = core.submit(request()).await.unwrap();
        assert_eq!(outcome.submit_sm_count, 1);
    }

    #[tokio::test]
    #[ignore = "requires a local rabbitmq and redis instance"]
    async fn rate_does_not_charge_or_publish() {
        let ucs = seeded_ucs();
        seed(&ucs).await;
        let store = HotStore::connect(&jasmin_conf::RedisConfig::default()).unwrap();
        let bus = std::sync::Arc::new(
            jasmin_bus::MessageBus::connect(&jasmin_conf::AmqpConfig::default())
                .await
                .unwrap(),
        );
        let core = RouterCore::new(ucs.clone(), store, bus, jasmin_conf::SubmitDefaults::default());

        let before = ucs.snapshot().await.users.get(&UserId::new("u1")).unwrap().mt_credential.balance.clone();
        let quote = core.rate(&request()).await.unwrap();
        let after = ucs.snapshot().await.users.get(&UserId::new("u1")).unwrap().mt_credential.balance.clone();
        assert_eq!(quote.submit_sm_count, 1);
        assert_eq!(format!("{before:?}"), format!("{after:?}"));
    }
}
