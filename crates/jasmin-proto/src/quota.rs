//! Quota values and the `+N` / `-N` / absolute mutation syntax (§3 MT
//! Credential, §4.6 supplement).
//!
//! `None` always means unlimited. A quota is mutated by parsing one of:
//! - `"unlimited"` — clears the cap
//! - `"120.5"` (or an integer literal for count quotas) — absolute set
//! - `"+20"` / `"-5"` — relative adjustment against the current value
//!
//! Applying a relative adjustment to an unlimited quota is a no-op (there is
//! nothing to adjust against); this mirrors the "quota `None` means
//! unlimited" invariant — you cannot partially spend an unlimited quota.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::JasminError;

/// A balance quota: decimal currency units, or unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BalanceQuota(pub Option<Decimal>);

/// A submit_sm_count quota: integer message count, or unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CountQuota(pub Option<i64>);

impl BalanceQuota {
    pub fn unlimited() -> Self {
        Self(None)
    }

    pub fn of(value: Decimal) -> Self {
        Self(Some(value))
    }

    pub fn is_unlimited(&self) -> bool {
        self.0.is_none()
    }

    /// True if `amount` can be charged without going negative; unlimited
    /// quotas always permit the charge.
    pub fn can_afford(&self, amount: Decimal) -> bool {
        match self.0 {
            None => true,
            Some(balance) => balance >= amount,
        }
    }

    /// Deduct `amount`; no-op on an unlimited quota.
    pub fn deduct(&mut self, amount: Decimal) {
        if let Some(balance) = self.0.as_mut() {
            *balance -= amount;
        }
    }

    /// Apply the `+N` / `-N` / absolute / `unlimited` mutation syntax.
    pub fn apply_update(&mut self, raw: &str) -> Result<(), JasminError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("unlimited") {
            self.0 = None;
            return Ok(());
        }
        if let Some(delta) = raw.strip_prefix('+') {
            let delta = parse_decimal(delta)?;
            if let Some(balance) = self.0.as_mut() {
                *balance += delta;
            }
            return Ok(());
        }
        if let Some(delta) = raw.strip_prefix('-') {
            let delta = parse_decimal(delta)?;
            if let Some(balance) = self.0.as_mut() {
                *balance -= delta;
            }
            return Ok(());
        }
        self.0 = Some(parse_decimal(raw)?);
        Ok(())
    }
}

impl CountQuota {
    pub fn unlimited() -> Self {
        Self(None)
    }

    pub fn of(value: i64) -> Self {
        Self(Some(value))
    }

    pub fn is_unlimited(&self) -> bool {
        self.0.is_none()
    }

    pub fn can_afford(&self, amount: i64) -> bool {
        match self.0 {
            None => true,
            Some(count) => count >= amount,
        }
    }

    pub fn deduct(&mut self, amount: i64) {
        if let Some(count) = self.0.as_mut() {
            *count -= amount;
        }
    }

    pub fn apply_update(&mut self, raw: &str) -> Result<(), JasminError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("unlimited") {
            self.0 = None;
            return Ok(());
        }
        if let Some(delta) = raw.strip_prefix('+') {
            let delta = parse_int(delta)?;
            if let Some(count) = self.0.as_mut() {
                *count += delta;
            }
            return Ok(());
        }
        if let Some(delta) = raw.strip_prefix('-') {
            let delta = parse_int(delta)?;
            if let Some(count) = self.0.as_mut() {
                *count -= delta;
            }
            return Ok(());
        }
        self.0 = Some(parse_int(raw)?);
        Ok(())
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, JasminError> {
    Decimal::from_str(raw).map_err(|_| JasminError::Validation {
        field: "quota".to_string(),
        message: format!("'{raw}' is not a valid decimal quota value"),
    })
}

fn parse_int(raw: &str) -> Result<i64, JasminError> {
    raw.parse::<i64>().map_err(|_| JasminError::Validation {
        field: "quota".to_string(),
        message: format!("'{raw}' is not a valid integer quota value"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_update_on_finite_balance() {
        let mut q = BalanceQuota::of(Decimal::new(1000, 2)); // 10.00
        q.apply_update("+5").unwrap();
        assert_eq!(q.0, Some(Decimal::new(1500, 2)));
        q.apply_update("-2.5").unwrap();
        assert_eq!(q.0, Some(Decimal::new(1250, 2)));
    }

    #[test]
    fn relative_update_on_unlimited_is_noop() {
        let mut q = BalanceQuota::unlimited();
        q.apply_update("+5").unwrap();
        assert!(q.is_unlimited());
    }

    #[test]
    fn absolute_update_replaces_value() {
        let mut q = BalanceQuota::of(Decimal::new(1000, 2));
        q.apply_update("42.0").unwrap();
        assert_eq!(q.0, Some(Decimal::new(420, 1)));
    }

    #[test]
    fn set_unlimited() {
        let mut q = BalanceQuota::of(Decimal::ONE);
        q.apply_update("unlimited").unwrap();
        assert!(q.is_unlimited());
    }

    #[test]
    fn count_quota_rejects_decimal_value() {
        let mut q = CountQuota::of(10);
        assert!(q.apply_update("+1.5").is_err());
    }

    #[test]
    fn can_afford_respects_unlimited() {
        assert!(BalanceQuota::unlimited().can_afford(Decimal::new(999_999, 0)));
        assert!(!BalanceQuota::of(Decimal::ONE).can_afford(Decimal::new(2, 0)));
    }
}
