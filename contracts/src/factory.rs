//! # Vault Factory
//!
//! Creates vault instances at addresses anyone can compute before the
//! instance exists. Two addressing schemes are available:
//!
//! - **Seeded**: `hash(0xff || deployer || seed || code_digest)`. The same
//!   deployer, seed, and instantiation code always land on the same address,
//!   so a seed can be used only once per deployer.
//! - **Nonce**: `hash(tag || deployer || nonce)`, where the nonce counts the
//!   deployer's previous nonce deployments. Never collides with itself.
//!
//! The factory is generic over what it builds; it only stores the instance
//! and a [`Deployment`] record next to it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use coffer_core::config::{DEPLOYMENT_PREFIX, NONCE_DEPLOYMENT_TAG};
use coffer_core::Address;

/// 32 bytes chosen by the deployer.
pub type Seed = [u8; 32];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during deployment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FactoryError {
    /// This deployer already used this seed.
    #[error("seed {} already used by {deployer}", hex::encode(seed))]
    DuplicateSeed {
        /// The deployer that reused its seed.
        deployer: Address,
        /// The reused seed.
        seed: Seed,
    },

    /// Something already lives at the computed address.
    #[error("address {0} is already occupied")]
    AddressOccupied(Address),
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// BLAKE3 of the instantiation code.
pub fn code_digest(code: &[u8]) -> [u8; 32] {
    *blake3::hash(code).as_bytes()
}

/// Deterministic address for a seeded deployment. Pure; no state involved.
pub fn deployment_address(deployer: Address, seed: &Seed, code_digest: &[u8; 32]) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[DEPLOYMENT_PREFIX]);
    hasher.update(deployer.as_bytes());
    hasher.update(seed);
    hasher.update(code_digest);
    Address::from_digest(hasher.finalize().as_bytes())
}

/// Address of a deployer's `nonce`-th nonce deployment.
pub fn nonce_address(deployer: Address, nonce: u64) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NONCE_DEPLOYMENT_TAG);
    hasher.update(deployer.as_bytes());
    hasher.update(&nonce.to_be_bytes());
    Address::from_digest(hasher.finalize().as_bytes())
}

/// Parses a seed from hex (with or without `0x`). Shorter input is
/// left-padded with zeros.
pub fn parse_seed(text: &str) -> Result<Seed, String> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(digits).map_err(|e| format!("invalid seed hex: {e}"))?;
    if bytes.len() > 32 {
        return Err(format!("seed is {} bytes, at most 32 allowed", bytes.len()));
    }
    let mut seed = [0u8; 32];
    seed[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(seed)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a deployment's address was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    Seeded(Seed),
    Nonce(u64),
}

/// Bookkeeping for one deployed instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique record id.
    pub id: Uuid,
    pub address: Address,
    pub deployer: Address,
    pub addressing: Addressing,
    pub code_digest: [u8; 32],
    pub created_at: DateTime<Utc>,
}

/// Registry of deployed instances.
#[derive(Debug)]
pub struct VaultFactory<T> {
    instances: HashMap<Address, T>,
    records: Vec<Deployment>,
    used_seeds: HashSet<(Address, Seed)>,
    nonces: HashMap<Address, u64>,
}

impl<T> VaultFactory<T> {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            records: Vec::new(),
            used_seeds: HashSet::new(),
            nonces: HashMap::new(),
        }
    }

    /// Where [`deploy_with_seed`](Self::deploy_with_seed) would put `code`.
    pub fn calculate_address(&self, deployer: Address, seed: &Seed, code: &[u8]) -> Address {
        deployment_address(deployer, seed, &code_digest(code))
    }

    /// Where the deployer's next [`deploy`](Self::deploy) will land.
    pub fn next_nonce_address(&self, deployer: Address) -> Address {
        nonce_address(deployer, self.nonce_of(deployer))
    }

    /// Number of nonce deployments `deployer` has made.
    pub fn nonce_of(&self, deployer: Address) -> u64 {
        self.nonces.get(&deployer).copied().unwrap_or(0)
    }

    /// Deploys at the deployer's next nonce address.
    ///
    /// `build` receives the new address and returns the instance.
    pub fn deploy(
        &mut self,
        deployer: Address,
        code: &[u8],
        build: impl FnOnce(Address) -> T,
    ) -> Result<Address, FactoryError> {
        let nonce = self.nonce_of(deployer);
        let address = nonce_address(deployer, nonce);
        self.ensure_free(address)?;

        self.nonces.insert(deployer, nonce + 1);
        self.insert(address, deployer, Addressing::Nonce(nonce), code, build);
        Ok(address)
    }

    /// Deploys at the seeded address for `(deployer, seed, code)`.
    ///
    /// # Errors
    ///
    /// [`FactoryError::DuplicateSeed`] if `deployer` used `seed` before, even
    /// with different code.
    pub fn deploy_with_seed(
        &mut self,
        deployer: Address,
        seed: Seed,
        code: &[u8],
        build: impl FnOnce(Address) -> T,
    ) -> Result<Address, FactoryError> {
        if self.used_seeds.contains(&(deployer, seed)) {
            return Err(FactoryError::DuplicateSeed { deployer, seed });
        }
        let address = self.calculate_address(deployer, &seed, code);
        self.ensure_free(address)?;

        self.used_seeds.insert((deployer, seed));
        self.insert(address, deployer, Addressing::Seeded(seed), code, build);
        Ok(address)
    }

    pub fn get(&self, address: Address) -> Option<&T> {
        self.instances.get(&address)
    }

    pub fn get_mut(&mut self, address: Address) -> Option<&mut T> {
        self.instances.get_mut(&address)
    }

    /// The record for `address`, if the factory deployed it.
    pub fn record(&self, address: Address) -> Option<&Deployment> {
        self.records.iter().find(|r| r.address == address)
    }

    /// All records, in deployment order.
    pub fn deployments(&self) -> &[Deployment] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn ensure_free(&self, address: Address) -> Result<(), FactoryError> {
        if self.instances.contains_key(&address) {
            return Err(FactoryError::AddressOccupied(address));
        }
        Ok(())
    }

    fn insert(
        &mut self,
        address: Address,
        deployer: Address,
        addressing: Addressing,
        code: &[u8],
        build: impl FnOnce(Address) -> T,
    ) {
        let record = Deployment {
            id: Uuid::new_v4(),
            address,
            deployer,
            addressing,
            code_digest: code_digest(code),
            created_at: Utc::now(),
        };
        tracing::info!(%address, %deployer, id = %record.id, "instance deployed");
        self.instances.insert(address, build(address));
        self.records.push(record);
    }
}

impl<T> Default for VaultFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}
