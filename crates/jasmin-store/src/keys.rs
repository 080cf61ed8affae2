//! Redis key layout for the hot store (§1 Hot Store, §3 DLR Correlation
//! Record, Reassembly Buffer).

use jasmin_proto::{MessageId, UserId};

pub fn dlr_by_parent(msgid: &MessageId) -> String {
    format!("dlr:parent:{msgid}")
}

pub fn dlr_by_smsc_id(smsc_id: &str) -> String {
    format!("dlr:smsc:{smsc_id}")
}

pub fn reassembly(source_addr: &str, destination_addr: &str, ref_num: u16) -> String {
    format!("reassembly:{source_addr}:{destination_addr}:{ref_num}")
}

pub fn counter_submit_sm(user_id: &UserId) -> String {
    format!("counter:{user_id}:submit_sm_count")
}

pub fn counter_deliver_sm(user_id: &UserId) -> String {
    format!("counter:{user_id}:deliver_sm_count")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let uid = UserId::new("u1");
        assert_eq!(counter_submit_sm(&uid), "counter:u1:submit_sm_count");
        assert_eq!(reassembly("061", "062", 7), "reassembly:061:062:7");
    }
}
