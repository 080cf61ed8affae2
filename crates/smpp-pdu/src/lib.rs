//! Minimal SMPP 3.4 PDU types.
//!
//! The wire codec (bytes <-> PDU) is out of scope for the gateway: this
//! crate models the subset of SMPP 3.4 the routing/delivery plane actually
//! touches, as a facade a real codec crate would sit behind. Field layout
//! follows the SMPP v3.4 specification section numbers in comments.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 5.2.9 command_status values this gateway distinguishes. Unknown wire
/// values round-trip through `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    EsmeRok,
    EsmeRinvmsglen,
    EsmeRinvcmdlen,
    EsmeRinvcmdid,
    EsmeRinvbndsts,
    EsmeRalybnd,
    EsmeRsyserr,
    EsmeRinvsrcadr,
    EsmeRinvdstadr,
    EsmeRinvmsgid,
    EsmeRbindfail,
    EsmeRinvpaswd,
    EsmeRinvsysid,
    EsmeRcancelfail,
    EsmeRreplacefail,
    EsmeRmsgqful,
    EsmeRinvsertyp,
    EsmeRthrottled,
    Other(u32),
}

impl CommandStatus {
    pub fn code(&self) -> u32 {
        match self {
            Self::EsmeRok => 0x00000000,
            Self::EsmeRinvmsglen => 0x00000001,
            Self::EsmeRinvcmdlen => 0x00000002,
            Self::EsmeRinvcmdid => 0x00000003,
            Self::EsmeRinvbndsts => 0x00000004,
            Self::EsmeRalybnd => 0x00000005,
            Self::EsmeRsyserr => 0x00000008,
            Self::EsmeRinvsrcadr => 0x0000000A,
            Self::EsmeRinvdstadr => 0x0000000B,
            Self::EsmeRinvmsgid => 0x0000000C,
            Self::EsmeRbindfail => 0x0000000D,
            Self::EsmeRinvpaswd => 0x0000000E,
            Self::EsmeRinvsysid => 0x0000000F,
            Self::EsmeRcancelfail => 0x00000011,
            Self::EsmeRreplacefail => 0x00000013,
            Self::EsmeRmsgqful => 0x00000014,
            Self::EsmeRinvsertyp => 0x00000015,
            Self::EsmeRthrottled => 0x00000058,
            Self::Other(v) => *v,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::EsmeRok)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 5.2.28 message_state values carried in DLR `stat:` fields / the
/// `receipted_message_id`/`message_state` TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageState {
    Enroute,
    Delivered,
    Expired,
    Deleted,
    Undeliverable,
    Accepted,
    Unknown,
    Rejected,
}

impl MessageState {
    /// The literal token used in both the `stat:` DLR body field and the
    /// HTTP callback's `message_status` per §4.2 "DLR state mapping".
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enroute => "ENROUTE",
            Self::Delivered => "DELIVRD",
            Self::Expired => "EXPIRED",
            Self::Deleted => "DELETED",
            Self::Undeliverable => "UNDELIV",
            Self::Accepted => "ACCEPTD",
            Self::Unknown => "UNKNOWN",
            Self::Rejected => "REJECTD",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ENROUTE" => Self::Enroute,
            "DELIVRD" => Self::Delivered,
            "EXPIRED" => Self::Expired,
            "DELETED" => Self::Deleted,
            "UNDELIV" => Self::Undeliverable,
            "ACCEPTD" => Self::Accepted,
            "REJECTD" => Self::Rejected,
            _ => Self::Unknown,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Enroute | Self::Accepted)
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 5.2.12 esm_class, narrowed to the bits this gateway inspects: message
/// type (normal / delivery receipt) and concatenation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EsmClass {
    pub is_delivery_receipt: bool,
    pub udh_indicator: bool,
}

impl EsmClass {
    pub const NORMAL: Self = Self {
        is_delivery_receipt: false,
        udh_indicator: false,
    };

    pub fn delivery_receipt() -> Self {
        Self {
            is_delivery_receipt: true,
            udh_indicator: false,
        }
    }
}

/// 5.2.5 addr_ton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TypeOfNumber {
    #[default]
    Unknown,
    International,
    National,
    NetworkSpecific,
    Alphanumeric,
}

/// A short message address (source or destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub ton: TypeOfNumber,
    pub npi: u8,
    pub value: String,
}

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            ton: TypeOfNumber::Unknown,
            npi: 1,
            value: value.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Concatenation metadata, whichever scheme (SAR TLVs or inline UDH) carried
/// it — §4.2 "Long content re-assembly" is scheme-agnostic past this point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatInfo {
    pub ref_num: u16,
    pub total_segments: u8,
    pub seq_num: u8,
}

/// submit_sm (4.4.1), narrowed to the fields the Router Core consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSm {
    pub source_addr: Address,
    pub destination_addr: Address,
    pub esm_class: EsmClass,
    pub data_coding: u8,
    pub short_message: Vec<u8>,
    pub registered_delivery: u8,
    pub validity_period: Option<String>,
    pub schedule_delivery_time: Option<String>,
    pub priority_flag: u8,
    pub concat: Option<ConcatInfo>,
}

/// submit_sm_resp (4.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSmResp {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: Option<String>,
}

/// deliver_sm (4.6.1), narrowed the same way as SubmitSm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverSm {
    pub source_addr: Address,
    pub destination_addr: Address,
    pub esm_class: EsmClass,
    pub data_coding: u8,
    pub short_message: Vec<u8>,
    pub concat: Option<ConcatInfo>,
}

impl DeliverSm {
    /// Parse the `id:<smsc-id> sub:... dlvrd:... submit date:... done date:...
    /// stat:<state> err:<n> text:...` receipt body used when no
    /// `receipted_message_id`/`message_state` TLV is present.
    ///
    /// Returns `(smsc_id, state, err)`.
    pub fn parse_dlr_body(body: &[u8]) -> Option<(String, MessageState, u32)> {
        let text = String::from_utf8_lossy(body);
        let id = extract_field(&text, "id:")?;
        let stat = extract_field(&text, "stat:").unwrap_or_else(|| "UNKNOWN".to_string());
        let err = extract_field(&text, "err:")
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);
        Some((id, MessageState::from_str(&stat), err))
    }
}

/// Which of the three 2.8.1.1 bind operations an ESME sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindKind {
    Transceiver,
    Transmitter,
    Receiver,
}

/// bind_transceiver / bind_transmitter / bind_receiver (4.1.1, narrowed to
/// the fields the SMPP server adapter authenticates against).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindRequest {
    pub kind: BindKind,
    pub system_id: String,
    pub password: String,
    pub sequence_number: u32,
}

/// bind_transceiver_resp / bind_transmitter_resp / bind_receiver_resp
/// (4.1.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindResp {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub system_id: String,
}

fn extract_field(text: &str, key: &str) -> Option<String> {
    let start = text.find(key)? + key.len();
    let rest = &text[start..];
    let end = rest.find(' ').unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_state_round_trips_through_http_token() {
        for state in [
            MessageState::Delivered,
            MessageState::Expired,
            MessageState::Deleted,
            MessageState::Undeliverable,
            MessageState::Accepted,
            MessageState::Unknown,
            MessageState::Rejected,
            MessageState::Enroute,
        ] {
            assert_eq!(MessageState::from_str(state.as_str()), state);
        }
    }

    #[test]
    fn parses_classic_dlr_body() {
        let body = b"id:ABC123 sub:001 dlvrd:001 submit date:2601010101 done date:2601010102 stat:DELIVRD err:000 text:";
        let (id, state, err) = DeliverSm::parse_dlr_body(body).unwrap();
        assert_eq!(id, "ABC123");
        assert_eq!(state, MessageState::Delivered);
        assert_eq!(err, 0);
    }

    #[test]
    fn missing_id_field_yields_none() {
        let body = b"stat:DELIVRD err:000";
        assert!(DeliverSm::parse_dlr_body(body).is_none());
    }
}
