// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Coffer: Vault Accounting Core
//!
//! Coffer keeps the books for pooled fungible value. A share [`Ledger`]
//! tracks who owns how much of the pool; the [`Vault`] sits on top of it and
//! swaps an external asset for shares (and back) at a rate derived fresh on
//! every call from the share supply and the asset balance it custodies.
//!
//! ## Architecture
//!
//! ```text
//! ledger.rs      - balances, allowances, total supply, undo journal
//! conversion.rs  - share/asset exchange math with explicit rounding
//! vault/         - caps, hooks, and the four vault operations
//! events.rs      - append-only notification records
//! address.rs     - 20-byte account identifiers
//! access.rs      - the ownership gate privileged settings go through
//! introspection  - selectors and interface identifiers
//! config.rs      - constants and vault configuration
//! ```
//!
//! ## Ground Rules
//!
//! 1. Amounts are `u64` in smallest units. Products are taken in `u128`, so
//!    conversion math never wraps; a result that does not fit is an error.
//! 2. Every mutation checks before it writes. Multi-step operations run
//!    inside a checkpoint and roll back as a whole.
//! 3. Rounding always favors the pool.
//! 4. If it touches money, it has tests. Plural.

pub mod access;
pub mod address;
pub mod config;
pub mod conversion;
pub mod events;
pub mod introspection;
pub mod ledger;
pub mod vault;

pub use access::{NotOwner, OwnershipGate};
pub use address::Address;
pub use config::VaultConfig;
pub use conversion::{Conversion, Rounding};
pub use events::Event;
pub use introspection::{InterfaceId, Selector, SupportsInterface};
pub use ledger::{AssetLedger, Checkpoint, Ledger, LedgerError};
pub use vault::{
    AfterHook, HookCall, HookRejection, NoHooks, Operation, SlippageGuard, Vault, VaultError,
    VaultHooks,
};

/// Smallest-unit quantity of shares or assets.
pub type Amount = u64;
