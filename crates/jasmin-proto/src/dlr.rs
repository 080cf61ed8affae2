//! DLR correlation and concatenation reassembly state (§3 DLR Correlation
//! Record, Reassembly Buffer; kept in HS by `jasmin-store`, modeled here so
//! the router and SCM crates share one definition).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smpp_pdu::MessageState;

use crate::ids::{ConnectorId, MessageId, UserId};

/// How many channels a DLR should be thrown on (§4.2 "dlr requested at
/// level >= 1"; §4.4 "DLR level 2 (SMPP only), level 3 (HTTP only), or
/// level 1 (both)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DlrLevel {
    Both = 1,
    SmscOnly = 2,
    TerminalOnly = 3,
}

impl DlrLevel {
    pub fn throws_to_smpp(self) -> bool {
        matches!(self, Self::SmscOnly | Self::Both)
    }

    pub fn throws_to_http(self) -> bool {
        matches!(self, Self::TerminalOnly | Self::Both)
    }

    /// Recover the level from the raw value carried on `Envelope.dlr_level`
    /// (the correlation's `level as u8`); `None` for anything out of range,
    /// which the caller treats as "don't throw" rather than guessing.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Both),
            2 => Some(Self::SmscOnly),
            3 => Some(Self::TerminalOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DlrMethod {
    Get,
    Post,
}

/// Where a finished DLR (or MO, via the same correlation) is thrown back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DlrOriginator {
    Http {
        url: String,
        method: DlrMethod,
    },
    Smpp {
        bound_session_user: UserId,
    },
}

/// `msgid -> {originator, level, expiry, ...}` (§3 DLR Correlation Record).
/// Stored in HS keyed by both the parent message-id (set at submit
/// admission) and, once known, the SMSC-assigned id from submit_sm_resp
/// (§4.2 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlrCorrelation {
    pub parent_message_id: MessageId,
    pub smsc_message_id: Option<String>,
    pub originator: DlrOriginator,
    pub level: DlrLevel,
    pub user_id: UserId,
    pub connector: ConnectorId,
    pub created_at: DateTime<Utc>,
    /// TTL from submit's `validity_period`, or a configured default
    /// (§3: "TTL <= message validity_period").
    pub expires_at: DateTime<Utc>,
    /// Remainder of the rate owed once the message is confirmed
    /// delivered, when `early_decrement_balance_percent < 100` (§4.2 step
    /// 4: "remainder deducted on delivered DLR"). `None` once fully
    /// decremented up front.
    pub pending_charge: Option<Decimal>,
}

impl DlrCorrelation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A single concatenated-SMS segment as observed on the deliver path,
/// keyed into a `ReassemblyBuffer` by its `seq_num` (1-based, per SAR/UDH).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassemblyPart {
    pub seq_num: u8,
    pub content: Vec<u8>,
}

/// `(source_addr, dest_addr, ref_num) -> ordered parts` (§3 Reassembly
/// Buffer). Arrival order is not required (§8 invariant); parts are kept
/// indexed by sequence number so duplicates overwrite rather than
/// accumulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassemblyBuffer {
    pub source_addr: String,
    pub destination_addr: String,
    pub ref_num: u16,
    pub total_segments: u8,
    pub parts: BTreeMap<u8, Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl ReassemblyBuffer {
    pub fn new(
        source_addr: impl Into<String>,
        destination_addr: impl Into<String>,
        ref_num: u16,
        total_segments: u8,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_addr: source_addr.into(),
            destination_addr: destination_addr.into(),
            ref_num,
            total_segments,
            parts: BTreeMap::new(),
            created_at,
        }
    }

    /// Record (or overwrite) a part. Returns the fully concatenated body
    /// once every sequence number `1..=total_segments` is present.
    pub fn insert(&mut self, seq_num: u8, content: Vec<u8>) -> Option<Vec<u8>> {
        self.parts.insert(seq_num, content);
        self.try_concatenate()
    }

    pub fn is_complete(&self) -> bool {
        self.parts.len() as u8 == self.total_segments
            && (1..=self.total_segments).all(|n| self.parts.contains_key(&n))
    }

    fn try_concatenate(&self) -> Option<Vec<u8>> {
        if !self.is_complete() {
            return None;
        }
        let mut out = Vec::new();
        for n in 1..=self.total_segments {
            out.extend_from_slice(self.parts.get(&n).expect("checked complete"));
        }
        Some(out)
    }
}

/// Maps an SMPP DLR `stat:` token to the string used in HTTP callbacks
/// (§4.2 "DLR state mapping"). `MessageState` already carries the wire
/// token; this just documents the identity mapping at the type boundary
/// used by the throwers.
pub fn dlr_state_label(state: MessageState) -> &'static str {
    state.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembly_completes_out_of_order() {
        let mut buf = ReassemblyBuffer::new("061", "062", 7, 3, Utc::now());
        assert!(buf.insert(2, b"B".to_vec()).is_none());
        assert!(buf.insert(1, b"A".to_vec()).is_none());
        let done = buf.insert(3, b"C".to_vec());
        assert_eq!(done, Some(b"ABC".to_vec()));
    }

    #[test]
    fn duplicate_part_overwrites_not_accumulates() {
        let mut buf = ReassemblyBuffer::new("061", "062", 7, 2, Utc::now());
        buf.insert(1, b"A".to_vec());
        buf.insert(1, b"A2".to_vec());
        let done = buf.insert(2, b"B".to_vec());
        assert_eq!(done, Some(b"A2B".to_vec()));
    }

    #[test]
    fn dlr_level_channel_routing() {
        assert!(DlrLevel::SmscOnly.throws_to_smpp());
        assert!(!DlrLevel::SmscOnly.throws_to_http());
        assert!(!DlrLevel::TerminalOnly.throws_to_smpp());
        assert!(DlrLevel::TerminalOnly.throws_to_http());
        assert!(DlrLevel::Both.throws_to_smpp() && DlrLevel::Both.throws_to_http());
    }

    #[test]
    fn dlr_level_from_u8_matches_spec_numbering() {
        assert_eq!(DlrLevel::from_u8(1), Some(DlrLevel::Both));
        assert_eq!(DlrLevel::from_u8(2), Some(DlrLevel::SmscOnly));
        assert_eq!(DlrLevel::from_u8(3), Some(DlrLevel::TerminalOnly));
        assert_eq!(DlrLevel::from_u8(0), None);
        assert_eq!(DlrLevel::from_u8(4), None);
    }

    #[test]
    fn correlation_expiry() {
        let now = Utc::now();
        let corr = DlrCorrelation {
            parent_message_id: MessageId::new(),
            smsc_message_id: None,
            originator: DlrOriginator::Http {
                url: "http://h/r".to_string(),
                method: DlrMethod::Post,
            },
            level: DlrLevel::Both,
            user_id: UserId::new("u1"),
            connector: ConnectorId::new("c1"),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(60),
            pending_charge: None,
        };
        assert!(!corr.is_expired(now));
        assert!(corr.is_expired(now + chrono::Duration::seconds(61)));
    }
}
