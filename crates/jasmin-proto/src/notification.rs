//! Wire payloads carried on the `dlr.<msgid>` and `deliver.sm.<cid>`
//! routing keys (§4.2 "Deliver classification"): what the Router Core
//! hands the throwers once a deliver_sm has been classified as a DLR or
//! an MO message.

use serde::{Deserialize, Serialize};
use smpp_pdu::MessageState;

use crate::dlr::DlrOriginator;
use crate::ids::{ConnectorId, MessageId, UserId};

/// A classified delivery receipt, ready for a thrower to forward to its
/// originator (§4.4 deliver_sm/dlr throwers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlrNotification {
    pub parent_message_id: MessageId,
    pub smsc_message_id: String,
    pub state: MessageState,
    pub error_code: u32,
    pub originator: DlrOriginator,
    pub user_id: UserId,
}

/// Where the deliver_sm thrower forwards a classified MO message, carried
/// on the notification itself since the bus routing key stays origin-cid
/// based regardless of subscriber target (§4.2's MO publish key decision).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MoSubscriber {
    Http { url: String },
    Smpp { system_id: String },
}

/// A classified mobile-originated message, routed per the MO route table
/// and handed to the `deliver.sm.#` consumer (§4.2 step "Otherwise it is
/// MO").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoNotification {
    pub origin_cid: ConnectorId,
    pub source_addr: String,
    pub destination_addr: String,
    pub data_coding: u8,
    pub content: Vec<u8>,
    pub subscriber: MoSubscriber,
}
