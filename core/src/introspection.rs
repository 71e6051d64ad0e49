//! # Selectors & Interface Introspection
//!
//! Operations are named on the wire by a 4-byte [`Selector`]: the first four
//! bytes of the BLAKE3 hash of the operation's canonical signature, e.g.
//! `deposit(uint256,address)`. An [`InterfaceId`] is the XOR of every
//! selector in an interface, so one 4-byte value answers "do you speak this
//! whole interface?".
//!
//! Support is a static property of a type. It never depends on balances,
//! pause state, or anything else an instance holds.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::SELECTOR_LENGTH;

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// The introspection interface itself.
pub const INTROSPECTION_SIGNATURES: &[&str] = &["supportsInterface(bytes4)"];

/// Balance ledger interface.
pub const LEDGER_SIGNATURES: &[&str] = &[
    "totalSupply()",
    "balanceOf(address)",
    "allowance(address,address)",
    "transfer(address,uint256)",
    "approve(address,uint256)",
    "transferFrom(address,address,uint256)",
];

/// Ledger display metadata.
pub const METADATA_SIGNATURES: &[&str] = &["name()", "symbol()", "decimals()"];

/// Tokenized vault interface.
pub const VAULT_SIGNATURES: &[&str] = &[
    "asset()",
    "totalAssets()",
    "convertToShares(uint256)",
    "convertToAssets(uint256)",
    "maxDeposit(address)",
    "previewDeposit(uint256)",
    "deposit(uint256,address)",
    "maxMint(address)",
    "previewMint(uint256)",
    "mint(uint256,address)",
    "maxWithdraw(address)",
    "previewWithdraw(uint256)",
    "withdraw(uint256,address,address)",
    "maxRedeem(address)",
    "previewRedeem(uint256)",
    "redeem(uint256,address,address)",
];

/// Privileged vault settings.
pub const VAULT_ADMIN_SIGNATURES: &[&str] = &[
    "paused()",
    "pause()",
    "unpause()",
    "isRestricted(address)",
    "setRestricted(address,bool)",
];

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// A 4-byte operation identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub [u8; SELECTOR_LENGTH]);

impl Selector {
    /// Derives the selector of a canonical signature.
    pub fn from_signature(signature: &str) -> Self {
        let digest = blake3::hash(signature.as_bytes());
        let mut bytes = [0u8; SELECTOR_LENGTH];
        bytes.copy_from_slice(&digest.as_bytes()[..SELECTOR_LENGTH]);
        Self(bytes)
    }

    /// Selectors of a whole signature list, in order.
    pub fn all(signatures: &[&str]) -> Vec<Self> {
        signatures.iter().map(|s| Self::from_signature(s)).collect()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({self})")
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| format!("invalid selector hex: {e}"))?;
        let bytes: [u8; SELECTOR_LENGTH] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("selector must be 4 bytes, got {}", b.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// InterfaceId
// ---------------------------------------------------------------------------

/// XOR of all selectors in an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceId(pub [u8; SELECTOR_LENGTH]);

impl InterfaceId {
    /// Reserved id that no implementation may claim.
    pub const INVALID: InterfaceId = InterfaceId([0xff; SELECTOR_LENGTH]);

    /// Folds a signature list into its interface id.
    pub fn from_signatures(signatures: &[&str]) -> Self {
        let mut id = [0u8; SELECTOR_LENGTH];
        for selector in Selector::all(signatures) {
            for (acc, byte) in id.iter_mut().zip(selector.0) {
                *acc ^= byte;
            }
        }
        Self(id)
    }

    /// Id of [`INTROSPECTION_SIGNATURES`].
    pub fn introspection() -> Self {
        static ID: OnceLock<InterfaceId> = OnceLock::new();
        *ID.get_or_init(|| Self::from_signatures(INTROSPECTION_SIGNATURES))
    }

    /// Id of [`LEDGER_SIGNATURES`].
    pub fn ledger() -> Self {
        static ID: OnceLock<InterfaceId> = OnceLock::new();
        *ID.get_or_init(|| Self::from_signatures(LEDGER_SIGNATURES))
    }

    /// Id of [`METADATA_SIGNATURES`].
    pub fn metadata() -> Self {
        static ID: OnceLock<InterfaceId> = OnceLock::new();
        *ID.get_or_init(|| Self::from_signatures(METADATA_SIGNATURES))
    }

    /// Id of [`VAULT_SIGNATURES`].
    pub fn vault() -> Self {
        static ID: OnceLock<InterfaceId> = OnceLock::new();
        *ID.get_or_init(|| Self::from_signatures(VAULT_SIGNATURES))
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Static capability answers.
pub trait SupportsInterface {
    /// Interfaces this type implements, besides introspection itself.
    fn supported_interfaces(&self) -> Vec<InterfaceId>;

    /// `true` if the interface is implemented. [`InterfaceId::INVALID`] is
    /// always `false`; introspection is always `true`.
    fn supports_interface(&self, id: InterfaceId) -> bool {
        if id == InterfaceId::INVALID {
            return false;
        }
        id == InterfaceId::introspection() || self.supported_interfaces().contains(&id)
    }
}
