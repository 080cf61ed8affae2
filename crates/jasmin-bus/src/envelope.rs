//! The headers map carried on every MB message (§6: "Messages carry the
//! serialized PDU plus a headers map with at least `message-id`,
//! `submit_sm_resp_bill`, `dlr-level`, `dlr-url`, `dlr-method`,
//! `expiration`").

use lapin::{protocol::basic::AMQPProperties, types::AMQPValue, types::FieldTable};
use serde::{Deserialize, Serialize};

/// A message as handed to `MessageBus::publish`: a serialized PDU body
/// plus the correlation headers RC and SCM both read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: String,
    /// The user the submit is billed/accounted to, so the SCM can credit
    /// `submit_sm_count` on a `submit_sm_resp` without a DLR correlation
    /// lookup (which only exists when a DLR was actually requested).
    pub user_id: Option<String>,
    pub submit_sm_resp_bill: Option<String>,
    pub dlr_level: Option<u8>,
    pub dlr_url: Option<String>,
    pub dlr_method: Option<String>,
    /// Absolute expiration as an RFC 3339 timestamp; AMQP `expiration` is
    /// carried as a relative TTL on the header table instead (see
    /// `to_properties`), matching the field's use as a publish-time TTL.
    pub expiration: Option<String>,
    /// `(ref_num, seq_num, total_segments)` for one segment of a
    /// concatenated submit_sm, so the SMPP Client Manager can rebuild the
    /// UDH/SAR fields on the wire PDU without re-deriving them from the
    /// body.
    pub concat: Option<(u16, u8, u8)>,
    /// How many times this exact message has already been requeued for
    /// submit-error retrial (§4.3: "re-publish to MB with exponential-ish
    /// backoff"), since each republish is a distinct AMQP message with no
    /// memory of its own history otherwise.
    pub attempt: u32,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(message_id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: None,
            submit_sm_resp_bill: None,
            dlr_level: None,
            dlr_url: None,
            dlr_method: None,
            expiration: None,
            concat: None,
            attempt: 0,
            body,
        }
    }

    /// Build the AMQP basic properties (headers + content type) used for
    /// publish.
    pub fn to_properties(&self) -> AMQPProperties {
        let mut headers = FieldTable::default();
        headers.insert("message-id".into(), AMQPValue::LongString(self.message_id.clone().into()));
        if let Some(user_id) = &self.user_id {
            headers.insert("user-id".into(), AMQPValue::LongString(user_id.clone().into()));
        }
        if let Some(bill) = &self.submit_sm_resp_bill {
            headers.insert("submit_sm_resp_bill".into(), AMQPValue::LongString(bill.clone().into()));
        }
        if let Some(level) = self.dlr_level {
            headers.insert("dlr-level".into(), AMQPValue::ShortShortUInt(level));
        }
        if let Some(url) = &self.dlr_url {
            headers.insert("dlr-url".into(), AMQPValue::LongString(url.clone().into()));
        }
        if let Some(method) = &self.dlr_method {
            headers.insert("dlr-method".into(), AMQPValue::LongString(method.clone().into()));
        }
        if let Some(expiration) = &self.expiration {
            headers.insert("expiration".into(), AMQPValue::LongString(expiration.clone().into()));
        }
        if let Some((ref_num, seq_num, total_segments)) = self.concat {
            headers.insert("concat-ref".into(), AMQPValue::ShortUInt(ref_num));
            headers.insert("concat-seq".into(), AMQPValue::ShortShortUInt(seq_num));
            headers.insert("concat-total".into(), AMQPValue::ShortShortUInt(total_segments));
        }
        if self.attempt > 0 {
            headers.insert("attempt".into(), AMQPValue::LongUInt(self.attempt));
        }

        AMQPProperties::default()
            .with_content_type("application/octet-stream".into())
            .with_headers(headers)
            .with_message_id(self.message_id.clone().into())
    }

    /// Reconstruct an envelope from a received delivery's properties and
    /// body.
    pub fn from_properties(properties: &AMQPProperties, body: Vec<u8>) -> Self {
        let headers = properties.headers().clone().unwrap_or_default();
        let get_str = |key: &str| -> Option<String> {
            headers.inner().get(key).and_then(|v| match v {
                AMQPValue::LongString(s) => Some(s.to_string()),
                AMQPValue::ShortString(s) => Some(s.to_string()),
                _ => None,
            })
        };
        let get_u8 = |key: &str| -> Option<u8> {
            headers.inner().get(key).and_then(|v| match v {
                AMQPValue::ShortShortUInt(n) => Some(*n),
                _ => None,
            })
        };
        let get_u16 = |key: &str| -> Option<u16> {
            headers.inner().get(key).and_then(|v| match v {
                AMQPValue::ShortUInt(n) => Some(*n),
                _ => None,
            })
        };
        let get_u32 = |key: &str| -> Option<u32> {
            headers.inner().get(key).and_then(|v| match v {
                AMQPValue::LongUInt(n) => Some(*n),
                _ => None,
            })
        };

        let concat = match (get_u16("concat-ref"), get_u8("concat-seq"), get_u8("concat-total")) {
            (Some(r), Some(s), Some(t)) => Some((r, s, t)),
            _ => None,
        };

        Self {
            message_id: get_str("message-id").unwrap_or_default(),
            user_id: get_str("user-id"),
            submit_sm_resp_bill: get_str("submit_sm_resp_bill"),
            dlr_level: get_u8("dlr-level"),
            dlr_url: get_str("dlr-url"),
            dlr_method: get_str("dlr-method"),
            expiration: get_str("expiration"),
            concat,
            attempt: get_u32("attempt").unwrap_or(0),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_properties() {
        let mut env = Envelope::new("m-1", b"payload".to_vec());
        env.user_id = Some("u1".to_string());
        env.dlr_level = Some(3);
        env.dlr_url = Some("http://h/r".to_string());
        env.dlr_method = Some("POST".to_string());
        env.concat = Some((4242, 1, 3));
        env.attempt = 2;

        let props = env.to_properties();
        let restored = Envelope::from_properties(&props, b"payload".to_vec());

        assert_eq!(restored.message_id, "m-1");
        assert_eq!(restored.user_id.as_deref(), Some("u1"));
        assert_eq!(restored.dlr_level, Some(3));
        assert_eq!(restored.dlr_url.as_deref(), Some("http://h/r"));
        assert_eq!(restored.dlr_method.as_deref(), Some("POST"));
        assert_eq!(restored.concat, Some((4242, 1, 3)));
        assert_eq!(restored.attempt, 2);
        assert_eq!(restored.body, b"payload");
    }
}
