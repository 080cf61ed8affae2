//! Groups, users and credentials (§3 Group, User, MT Credential, SMPPs
//! Credential).

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ids::{GroupId, UserId};
use crate::quota::{BalanceQuota, CountQuota};

/// A 16-byte password digest. Passwords are never stored in cleartext
/// (§3 invariant: "password stored only as digest").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordDigest([u8; 16]);

impl PasswordDigest {
    /// Derive a digest from a cleartext password. Truncates a SHA-256 hash
    /// to the 16 bytes the data model specifies.
    pub fn of(password: &str) -> Self {
        let full = Sha256::digest(password.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&full[..16]);
        Self(bytes)
    }

    pub fn matches(&self, password: &str) -> bool {
        *self == Self::of(password)
    }
}

/// A group of users. Disabling cascades to member users (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub enabled: bool,
}

impl Group {
    pub fn new(id: impl Into<GroupId>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
        }
    }
}

/// MT-side authorizable actions (value filters and authorizations both key
/// off these, per §3 MT Credential).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MtAction {
    HttpSend,
    HttpBalance,
    HttpRate,
    HttpLongContent,
    SetSourceAddress,
    SetPriority,
    SetValidityPeriod,
    SetScheduleDeliveryTime,
    SetDlr,
    SetTags,
}

/// MT-side fields that can be value-filtered or defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MtField {
    SourceAddress,
    DestinationAddress,
    Content,
}

/// `#[serde]`-friendly regex wrapper (so credential snapshots round-trip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRegex {
    pub pattern: String,
    #[serde(skip, default)]
    compiled: Option<Regex>,
}

impl FilterRegex {
    pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern)?;
        Ok(Self {
            pattern,
            compiled: Some(compiled),
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        match &self.compiled {
            Some(re) => re.is_match(value),
            // A regex deserialized without recompilation (e.g. from a
            // snapshot trailer the running binary doesn't fully understand)
            // fails closed rather than silently matching everything.
            None => false,
        }
    }
}

impl PartialEq for FilterRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// MT credential: authorizations, value filters, default overrides and
/// quotas (§3 MT Credential).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MtCredential {
    pub authorizations: HashMap<MtAction, bool>,
    pub value_filters: HashMap<MtField, FilterRegex>,
    pub default_values: HashMap<MtField, String>,
    pub balance: BalanceQuota,
    pub submit_sm_count: CountQuota,
    /// 0..=100. 100 means the full rate is deducted up front.
    pub early_decrement_balance_percent: u8,
    pub http_throughput: Option<u32>,
    pub smpps_throughput: Option<u32>,
}

impl MtCredential {
    pub fn is_authorized(&self, action: MtAction) -> bool {
        // Authorizations default to permitted unless explicitly denied,
        // matching the "authorizations (bool map)" being sparse in practice
        // (most users authorize most actions; admins deny the exceptions).
        *self.authorizations.get(&action).unwrap_or(&true)
    }

    /// Apply a configured value-filter to `value`; a field with no filter
    /// passes through untouched, one with a filter the value doesn't match
    /// is overwritten with the credential's default for that field (§4.2
    /// step 2: "overwrite forbidden fields with credential defaults").
    pub fn enforce_value_filter(&self, field: MtField, value: &str) -> String {
        match self.value_filters.get(&field) {
            Some(re) if !re.is_match(value) => self.default_values.get(&field).cloned().unwrap_or_default(),
            _ => value.to_string(),
        }
    }
}

/// SMPPs (server bind) credential (§3 SMPPs Credential).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmppsCredential {
    pub bind_authorized: bool,
    pub max_bindings: Option<u32>,
}

/// Connection status counters carried on `User` (§3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectionCounters {
    pub bound_sessions: u32,
    pub submit_sm_count: u64,
    pub deliver_sm_count: u64,
}

/// A UCS user (§3 User). `username` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub group_id: GroupId,
    pub username: String,
    pub password: PasswordDigest,
    pub enabled: bool,
    pub mt_credential: MtCredential,
    pub smpps_credential: SmppsCredential,
    pub counters: ConnectionCounters,
}

impl User {
    pub fn new(
        id: impl Into<UserId>,
        group_id: impl Into<GroupId>,
        username: impl Into<String>,
        password: &str,
    ) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            username: username.into(),
            password: PasswordDigest::of(password),
            enabled: true,
            mt_credential: MtCredential::default(),
            smpps_credential: SmppsCredential::default(),
            counters: ConnectionCounters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_digest_matches_only_correct_password() {
        let user = User::new("u1", "g1", "alice", "correct");
        assert!(user.password.matches("correct"));
        assert!(!user.password.matches("wrong"));
    }

    #[test]
    fn unspecified_authorization_defaults_to_allowed() {
        let cred = MtCredential::default();
        assert!(cred.is_authorized(MtAction::HttpSend));
    }

    #[test]
    fn explicit_denial_is_respected() {
        let mut cred = MtCredential::default();
        cred.authorizations.insert(MtAction::SetPriority, false);
        assert!(!cred.is_authorized(MtAction::SetPriority));
        assert!(cred.is_authorized(MtAction::HttpSend));
    }
}
