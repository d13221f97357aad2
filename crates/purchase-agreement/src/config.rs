//! Authority configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Bounds on offer metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferLimits {
    /// Maximum item id length in bytes
    #[serde(default = "default_max_item_id_len")]
    pub max_item_id_len: usize,
    /// Maximum item name length in bytes
    #[serde(default = "default_max_item_name_len")]
    pub max_item_name_len: usize,
}

impl Default for OfferLimits {
    fn default() -> Self {
        Self {
            max_item_id_len: default_max_item_id_len(),
            max_item_name_len: default_max_item_name_len(),
        }
    }
}

/// How payments interact with the funds ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementMode {
    /// Move the price through escrow: payment, release, refund
    #[default]
    Ledger,
    /// Only check that the buyer could cover the price
    Check,
    /// Track agreement state only
    Off,
}

impl FromStr for SettlementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ledger" => Ok(Self::Ledger),
            "check" => Ok(Self::Check),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown settlement mode: {}", other)),
        }
    }
}

/// Configuration for an [`AgreementAuthority`](crate::AgreementAuthority)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default)]
    pub settlement: SettlementMode,

    #[serde(default)]
    pub limits: OfferLimits,
}

impl AuthorityConfig {
    /// Load configuration from environment variables (and `.env` if present)
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            settlement: env_or("PURCHASE_SETTLEMENT", defaults.settlement),
            limits: OfferLimits {
                max_item_id_len: env_or(
                    "PURCHASE_MAX_ITEM_ID_LEN",
                    defaults.limits.max_item_id_len,
                ),
                max_item_name_len: env_or(
                    "PURCHASE_MAX_ITEM_NAME_LEN",
                    defaults.limits.max_item_name_len,
                ),
            },
        }
    }

    /// Track agreement state without touching the ledger
    pub fn state_only() -> Self {
        Self {
            settlement: SettlementMode::Off,
            limits: OfferLimits::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn default_max_item_id_len() -> usize {
    64
}

fn default_max_item_name_len() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthorityConfig::default();
        assert_eq!(config.settlement, SettlementMode::Ledger);
        assert_eq!(config.limits.max_item_id_len, 64);
        assert_eq!(config.limits.max_item_name_len, 64);
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let config: AuthorityConfig = serde_json::from_str(r#"{ "settlement": "check" }"#).unwrap();
        assert_eq!(config.settlement, SettlementMode::Check);
        assert_eq!(config.limits, OfferLimits::default());
    }

    #[test]
    fn test_settlement_mode_parse() {
        assert_eq!("LEDGER".parse(), Ok(SettlementMode::Ledger));
        assert_eq!(" off ".parse(), Ok(SettlementMode::Off));
        assert!("sometimes".parse::<SettlementMode>().is_err());
    }

    #[test]
    fn test_from_env_reads_overrides() {
        std::env::set_var("PURCHASE_SETTLEMENT", "check");
        std::env::set_var("PURCHASE_MAX_ITEM_NAME_LEN", "32");
        std::env::set_var("PURCHASE_MAX_ITEM_ID_LEN", "lots");

        let config = AuthorityConfig::from_env();

        std::env::remove_var("PURCHASE_SETTLEMENT");
        std::env::remove_var("PURCHASE_MAX_ITEM_NAME_LEN");
        std::env::remove_var("PURCHASE_MAX_ITEM_ID_LEN");

        assert_eq!(config.settlement, SettlementMode::Check);
        assert_eq!(config.limits.max_item_name_len, 32);
        assert_eq!(config.limits.max_item_id_len, 64);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("PURCHASE_TEST_ENV_OR_GARBAGE", "not-a-number");
        assert_eq!(env_or("PURCHASE_TEST_ENV_OR_GARBAGE", 7usize), 7);
        std::env::set_var("PURCHASE_TEST_ENV_OR_GARBAGE", " 12 ");
        assert_eq!(env_or("PURCHASE_TEST_ENV_OR_GARBAGE", 7usize), 12);
        assert_eq!(
            env_or("PURCHASE_TEST_ENV_OR_MISSING", SettlementMode::Check),
            SettlementMode::Check
        );
    }
}
