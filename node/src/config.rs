//! # Node Configuration
//!
//! The vault a node serves is described by a single JSON document: the
//! vault's own [`VaultConfig`], who administers it, who deploys it with
//! which seed, and the asset balances that exist at genesis.
//!
//! ```json
//! {
//!   "vault": { "name": "Coffer USD Vault", "symbol": "cUSD", "asset": "0x…" },
//!   "owner": "0x…",
//!   "deployer": "0x…",
//!   "seed": "0x01",
//!   "genesis": [{ "account": "0x…", "amount": 1000000 }]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use coffer_contracts::factory::{parse_seed, Seed};
use coffer_core::{Address, Amount, VaultConfig};

/// One funded account on the asset ledger at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub account: Address,
    pub amount: Amount,
}

/// Everything `coffer-node run` needs to stand up its vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub vault: VaultConfig,
    /// Administers the vault and the routing table.
    pub owner: Address,
    /// Seeds the deployment address. Defaults to the owner.
    #[serde(default)]
    pub deployer: Option<Address>,
    /// Hex seed, up to 32 bytes.
    #[serde(default = "default_seed")]
    pub seed: String,
    #[serde(default)]
    pub genesis: Vec<GenesisBalance>,
}

fn default_seed() -> String {
    "0x00".into()
}

impl NodeConfig {
    /// A throwaway devnet vault administered by the `owner` label.
    pub fn devnet() -> Self {
        Self {
            vault: VaultConfig::new(
                "Coffer Devnet Vault",
                "cDEV",
                Address::from_label("devnet-asset"),
            ),
            owner: Address::from_label("owner"),
            deployer: None,
            seed: default_seed(),
            genesis: Vec::new(),
        }
    }

    /// Reads `path`, or falls back to [`NodeConfig::devnet`] when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::devnet());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.seed()?;
        Ok(config)
    }

    pub fn deployer(&self) -> Address {
        self.deployer.unwrap_or(self.owner)
    }

    pub fn seed(&self) -> Result<Seed> {
        parse_seed(&self.seed).map_err(anyhow::Error::msg)
    }
}
