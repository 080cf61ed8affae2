//! Routing key construction for the `messaging` topic exchange (§6 AMQP
//! topology). Centralized so every crate that publishes or binds a queue
//! agrees on the exact key shape.

use jasmin_proto::{ConnectorId, MessageId};

pub fn submit_sm(cid: &ConnectorId) -> String {
    format!("submit.sm.{cid}")
}

pub fn submit_sm_resp(cid: &ConnectorId) -> String {
    format!("submit.sm.resp.{cid}")
}

pub fn deliver_sm(cid: &ConnectorId) -> String {
    format!("deliver.sm.{cid}")
}

pub fn dlr(msgid: &MessageId) -> String {
    format!("dlr.{msgid}")
}

/// Routing key for `jasmin-dlrlookupd`'s optional decoupled-correlation
/// topology (§2.1 supplement): a raw deliver_sm headed for DLR/MO
/// classification, keyed by the connector it arrived on.
pub fn dlr_lookup(cid: &ConnectorId) -> String {
    format!("dlr.lookup.{cid}")
}

/// The binding pattern a consumer uses to receive every deliver_sm
/// regardless of originating connector (§5 "Consumes `deliver.sm.#`").
pub const DELIVER_SM_WILDCARD: &str = "deliver.sm.#";

/// The binding pattern the dlr thrower uses to receive every dlr
/// regardless of message-id (§6: routing key `dlr.<msgid>`, one topic per
/// message; the thrower itself decides HTTP vs. SMPP per `dlr-level`).
pub const DLR_WILDCARD: &str = "dlr.#";

/// The binding pattern `jasmin-dlrlookupd` consumes, regardless of
/// originating connector.
pub const DLR_LOOKUP_WILDCARD: &str = "dlr.lookup.#";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_spec_shape() {
        let cid = ConnectorId::new("abc");
        assert_eq!(submit_sm(&cid), "submit.sm.abc");
        assert_eq!(submit_sm_resp(&cid), "submit.sm.resp.abc");
        assert_eq!(deliver_sm(&cid), "deliver.sm.abc");
        assert_eq!(dlr_lookup(&cid), "dlr.lookup.abc");
    }
}
