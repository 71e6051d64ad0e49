//! # Vault Configuration & Constants
//!
//! Every magic number in Coffer lives here. If you're hardcoding a constant
//! somewhere else, move it here first.
//!
//! The numeric ceilings below are part of the vault's observable contract:
//! indexers and integrators compare against them, so changing one is a
//! breaking change.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::Amount;

// ---------------------------------------------------------------------------
// Numeric Limits
// ---------------------------------------------------------------------------

/// The largest amount the encoding can hold. Mint and conversion results
/// above this are overflow errors, never silently clamped.
pub const MAX_AMOUNT: Amount = u64::MAX;

/// An allowance of exactly this value is unlimited: delegated transfers
/// never decrement it.
pub const UNLIMITED_ALLOWANCE: Amount = u64::MAX;

/// Default cap for `max_deposit` / `max_mint`. One below the ceiling so a
/// request for `MAX_AMOUNT` is always rejected by the cap check.
pub const DEFAULT_OPERATION_CAP: Amount = MAX_AMOUNT - 1;

/// Virtual offset added to both sides of the exchange rate. Keeps the
/// empty vault at 1:1 and the division well-defined.
pub const RATE_OFFSET: u128 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Account identifier length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Operation selector length in bytes.
pub const SELECTOR_LENGTH: usize = 4;

/// Domain prefix mixed into seeded (deterministic) deployment addresses.
pub const DEPLOYMENT_PREFIX: u8 = 0xff;

/// Domain tag for nonce-based deployment addresses.
pub const NONCE_DEPLOYMENT_TAG: &[u8] = b"coffer/deploy/nonce";

// ---------------------------------------------------------------------------
// Display Defaults
// ---------------------------------------------------------------------------

/// Decimal places used when a config does not say otherwise. Display only;
/// the vault never divides by it.
pub const DEFAULT_DECIMALS: u8 = 8;

/// Default HTTP API port for the node.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default Prometheus metrics port for the node.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Static description of one vault instance.
///
/// The canonical JSON encoding of this struct doubles as the instantiation
/// code for deterministic deployment: two vaults with equal configs have
/// equal code digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Human-readable share name (e.g., "Coffer USD Vault").
    pub name: String,
    /// Share ticker symbol.
    pub symbol: String,
    /// Display decimals for the share unit.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Address of the external asset ledger the vault custodies.
    pub asset: Address,
    /// Whether the vault starts paused.
    #[serde(default)]
    pub paused: bool,
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

impl VaultConfig {
    /// Creates an unpaused config with default decimals.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, asset: Address) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: DEFAULT_DECIMALS,
            asset,
            paused: false,
        }
    }

    /// Canonical byte encoding used as the instantiation code.
    pub fn instantiation_code(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// BLAKE3 digest of [`instantiation_code`](Self::instantiation_code).
    pub fn code_digest(&self) -> Result<[u8; 32], serde_json::Error> {
        Ok(*blake3::hash(&self.instantiation_code()?).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_cap_below_ceiling() {
        assert_eq!(DEFAULT_OPERATION_CAP, u64::MAX - 1);
        assert!(DEFAULT_OPERATION_CAP < MAX_AMOUNT);
    }

    #[test]
    fn test_unlimited_allowance_is_ceiling() {
        assert_eq!(UNLIMITED_ALLOWANCE, MAX_AMOUNT);
    }

    #[test]
    fn test_identifier_sizes() {
        assert_eq!(ADDRESS_LENGTH, 20);
        assert_eq!(SELECTOR_LENGTH, 4);
    }

    #[test]
    fn test_ports_are_distinct() {
        assert_ne!(DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT);
    }

    #[test]
    fn test_config_defaults_when_fields_missing() {
        let json = format!(
            r#"{{"name":"Vault","symbol":"vUSD","asset":"{}"}}"#,
            Address::from_label("usd")
        );
        let config: VaultConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.decimals, DEFAULT_DECIMALS);
        assert!(!config.paused);
    }

    #[test]
    fn test_code_digest_tracks_config() {
        let a = VaultConfig::new("Vault", "vUSD", Address::from_label("usd"));
        let mut b = a.clone();
        assert_eq!(a.code_digest().unwrap(), b.code_digest().unwrap());

        b.symbol = "vEUR".into();
        assert_ne!(a.code_digest().unwrap(), b.code_digest().unwrap());
    }
}
