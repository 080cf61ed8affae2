//! Runtime defaults - seed newly-created connectors/credentials, then the
//! UCS/router own the values and admin mutation takes over (§3 Connector,
//! MT Credential, §4.2 step 5, §4.4 submit_error_retrial).

use jasmin_proto::LongContentSplit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-error retry policy entry (§4.4: "configurable `submit_error_retrial`
/// set (per-error max_retries and delay)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrialRule {
    pub max_retries: u32,
    pub delay_secs: u64,
}

/// `submit_error_retrial` keyed by the SMPP command_status name this
/// gateway distinguishes (matches `smpp_pdu::CommandStatus` variant names).
pub type SubmitErrorRetrial = HashMap<String, RetrialRule>;

fn default_submit_error_retrial() -> SubmitErrorRetrial {
    let mut m = HashMap::new();
    m.insert(
        "EsmeRsyserr".to_string(),
        RetrialRule {
            max_retries: 2,
            delay_secs: 30,
        },
    );
    m.insert(
        "EsmeRthrottled".to_string(),
        RetrialRule {
            max_retries: 3,
            delay_secs: 10,
        },
    );
    m
}

/// Defaults a newly-created `Connector` is seeded with (§3 Connector:
/// "throughput cap, requeue_delay, submit_error_retrial policy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorDefaults {
    /// 0 = unlimited (§4.4 "submit_sm_throughput >= 0 (0 = unlimited)").
    #[serde(default = "ConnectorDefaults::default_submit_sm_throughput")]
    pub submit_sm_throughput: u32,
    #[serde(default = "ConnectorDefaults::default_requeue_delay_secs")]
    pub requeue_delay_secs: u64,
    #[serde(default = "default_submit_error_retrial")]
    pub submit_error_retrial: SubmitErrorRetrial,
}

impl ConnectorDefaults {
    fn default_submit_sm_throughput() -> u32 {
        0
    }
    fn default_requeue_delay_secs() -> u64 {
        30
    }
}

impl Default for ConnectorDefaults {
    fn default() -> Self {
        Self {
            submit_sm_throughput: Self::default_submit_sm_throughput(),
            requeue_delay_secs: Self::default_requeue_delay_secs(),
            submit_error_retrial: default_submit_error_retrial(),
        }
    }
}

/// Submit-admission policy defaults (§4.2 steps 4-7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitDefaults {
    /// Segments beyond this for one message is a validation error.
    #[serde(default = "SubmitDefaults::default_long_content_max_parts")]
    pub long_content_max_parts: u8,
    /// Concatenation scheme used when a connector doesn't override it
    /// (§3 Connector config `long_content_split`).
    #[serde(default = "SubmitDefaults::default_long_content_split")]
    pub long_content_split: LongContentSplit,
    /// Used when a submit carries no `validity_period`.
    #[serde(default = "SubmitDefaults::default_validity_period_secs")]
    pub default_validity_period_secs: u64,
    /// DLR correlation TTL when validity_period is absent (§3 DLR
    /// Correlation Record: "TTL <= message validity_period").
    #[serde(default = "SubmitDefaults::default_dlr_ttl_secs")]
    pub default_dlr_ttl_secs: u64,
    /// Reassembly buffers are short-lived (§3 Reassembly Buffer: "TTL
    /// short (minutes)").
    #[serde(default = "SubmitDefaults::default_reassembly_ttl_secs")]
    pub reassembly_ttl_secs: u64,
    /// Node-visit budget for `EvalScript` filters (replaces the original's
    /// wall-clock VM timeout; see the filter model's design note).
    #[serde(default = "SubmitDefaults::default_eval_script_node_budget")]
    pub eval_script_node_budget: u32,
}

impl SubmitDefaults {
    fn default_long_content_max_parts() -> u8 {
        5
    }
    fn default_long_content_split() -> LongContentSplit {
        LongContentSplit::Sar
    }
    fn default_validity_period_secs() -> u64 {
        24 * 3600
    }
    fn default_dlr_ttl_secs() -> u64 {
        24 * 3600
    }
    fn default_reassembly_ttl_secs() -> u64 {
        5 * 60
    }
    fn default_eval_script_node_budget() -> u32 {
        10_000
    }
}

impl Default for SubmitDefaults {
    fn default() -> Self {
        Self {
            long_content_max_parts: Self::default_long_content_max_parts(),
            long_content_split: Self::default_long_content_split(),
            default_validity_period_secs: Self::default_validity_period_secs(),
            default_dlr_ttl_secs: Self::default_dlr_ttl_secs(),
            reassembly_ttl_secs: Self::default_reassembly_ttl_secs(),
            eval_script_node_budget: Self::default_eval_script_node_budget(),
        }
    }
}

/// Thrower retry defaults (§5 deliver_sm thrower / dlr thrower).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowerDefaults {
    #[serde(default = "ThrowerDefaults::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "ThrowerDefaults::default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "ThrowerDefaults::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// §4.4: "Success = HTTP 2xx with body \"ACK/Jasmin\" ... or any 2xx
    /// depending on config." `false` (the default) accepts any 2xx.
    #[serde(default = "ThrowerDefaults::default_require_ack_body")]
    pub require_ack_body: bool,
}

impl ThrowerDefaults {
    fn default_max_retries() -> u32 {
        3
    }
    fn default_retry_delay_secs() -> u64 {
        15
    }
    fn default_http_timeout_secs() -> u64 {
        30
    }
    fn default_require_ack_body() -> bool {
        false
    }
}

impl Default for ThrowerDefaults {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            retry_delay_secs: Self::default_retry_delay_secs(),
            http_timeout_secs: Self::default_http_timeout_secs(),
            require_ack_body: Self::default_require_ack_body(),
        }
    }
}

/// Defaults that seed new runtime objects; once a connector/credential is
/// created the UCS and admin RPC surface own its values (§3 "Bootstrap:
/// initial values that seed runtime state").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeDefaults {
    #[serde(default)]
    pub connector: ConnectorDefaults,
    #[serde(default)]
    pub submit: SubmitDefaults,
    #[serde(default)]
    pub thrower: ThrowerDefaults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_error_retrial_has_syserr_entry() {
        let retrial = default_submit_error_retrial();
        let rule = retrial.get("EsmeRsyserr").unwrap();
        assert_eq!(rule.max_retries, 2);
        assert_eq!(rule.delay_secs, 30);
    }

    #[test]
    fn submit_defaults_match_spec_constants() {
        let d = SubmitDefaults::default();
        assert_eq!(d.long_content_max_parts, 5);
    }
}
