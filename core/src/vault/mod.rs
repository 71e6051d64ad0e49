//! # Vault
//!
//! A tokenized vault over an external asset. The vault owns a share
//! [`Ledger`] and custodies asset units at its own address in an
//! [`AssetLedger`] it holds. The exchange rate between the two is never
//! stored; every conversion reads the share supply and the custodied asset
//! balance afresh (see [`Conversion`]).
//!
//! ## Layout
//!
//! ```text
//! mod.rs        - the Vault struct, reads, conversions, previews
//! caps.rs       - per-account maxima, pause, restriction
//! operations.rs - deposit / mint / withdraw / redeem, share transfers
//! hooks.rs      - extension points and stock hook policies
//! ```
//!
//! ## Rounding
//!
//! Exact-input operations (deposit, redeem) round the computed output down.
//! Exact-output operations (mint, withdraw) round the computed input up.
//! Either way the remainder stays in the pool.

mod caps;
mod hooks;
mod operations;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::access::{NotOwner, OwnershipGate};
use crate::address::Address;
use crate::config::VaultConfig;
use crate::conversion::{Conversion, Rounding};
use crate::events::Event;
use crate::introspection::{InterfaceId, SupportsInterface};
use crate::ledger::{AssetLedger, Ledger, LedgerError};
use crate::Amount;

pub use hooks::{AfterHook, HookCall, HookRejection, NoHooks, Operation, SlippageGuard, VaultHooks};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
///
/// Every one of them leaves the vault, its share ledger, and the asset ledger
/// exactly as they were before the call.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A share-ledger primitive or a conversion failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The request is larger than the account's current cap.
    #[error("{operation} of {requested} exceeds maximum {max} for {account}")]
    MaxExceeded {
        /// The vault operation that was refused.
        operation: Operation,
        /// Account the cap was computed for (receiver or owner).
        account: Address,
        /// Amount the caller asked for.
        requested: Amount,
        /// The cap at the time of the call.
        max: Amount,
    },

    /// The asset ledger refused to move funds.
    #[error("external asset transfer failed: {reason}")]
    ExternalTransferFailed {
        /// The asset ledger's own error, rendered.
        reason: String,
    },

    /// A hook vetoed the operation.
    #[error(transparent)]
    HookRejected(#[from] HookRejection),

    /// A privileged setting was changed by someone other than the owner.
    #[error(transparent)]
    NotOwner(#[from] NotOwner),
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Share ledger plus custody of one external asset.
///
/// `G` decides who may change the privileged settings. A bare [`Address`]
/// is a fixed owner; anything with a handover protocol can stand in.
pub struct Vault<A: AssetLedger, H: VaultHooks = NoHooks, G: OwnershipGate = Address> {
    /// The vault's own account in the asset ledger.
    address: Address,
    config: VaultConfig,
    shares: Ledger,
    asset: A,
    hooks: H,
    gate: G,
    paused: bool,
    restricted: BTreeSet<Address>,
}

impl<A: AssetLedger, G: OwnershipGate> Vault<A, NoHooks, G> {
    /// Creates an empty vault without hooks, administered through `gate`.
    pub fn new(address: Address, config: VaultConfig, asset: A, gate: G) -> Self {
        Self::with_hooks(address, config, asset, NoHooks, gate)
    }
}

impl<A: AssetLedger, H: VaultHooks, G: OwnershipGate> Vault<A, H, G> {
    /// Creates an empty vault that runs `hooks` around every operation.
    pub fn with_hooks(address: Address, config: VaultConfig, asset: A, hooks: H, gate: G) -> Self {
        let paused = config.paused;
        Self {
            address,
            config,
            shares: Ledger::new(),
            asset,
            hooks,
            gate,
            paused,
            restricted: BTreeSet::new(),
        }
    }

    // -- metadata -----------------------------------------------------------

    /// The vault's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    /// Address of the underlying asset ledger.
    pub fn asset(&self) -> Address {
        self.config.asset
    }

    // -- collaborators ------------------------------------------------------

    /// Read access to the share ledger.
    pub fn shares(&self) -> &Ledger {
        &self.shares
    }

    /// Direct write access to the share ledger, bypassing conversion.
    ///
    /// Minting or burning through this handle changes the exchange rate for
    /// everyone. It exists for embedders that implement their own share
    /// issuance (fee accrual, migrations) and for test setup.
    pub fn shares_mut(&mut self) -> &mut Ledger {
        &mut self.shares
    }

    /// The custodied asset ledger.
    pub fn asset_ledger(&self) -> &A {
        &self.asset
    }

    /// Mutable access to the asset ledger, for funding accounts and setting
    /// approvals from outside the vault.
    pub fn asset_ledger_mut(&mut self) -> &mut A {
        &mut self.asset
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Who may pause, unpause, and restrict.
    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Mutable access to the gate, for running its handover protocol.
    pub fn gate_mut(&mut self) -> &mut G {
        &mut self.gate
    }

    // -- share ledger reads -------------------------------------------------

    pub fn balance_of(&self, account: Address) -> Amount {
        self.shares.balance_of(account)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.shares.allowance(owner, spender)
    }

    pub fn total_supply(&self) -> Amount {
        self.shares.total_supply()
    }

    /// Share-ledger events followed by the vault's own, oldest first.
    pub fn events(&self) -> &[Event] {
        self.shares.events()
    }

    // -- conversion ---------------------------------------------------------

    /// Asset units currently custodied by the vault.
    pub fn total_assets(&self) -> Amount {
        self.asset.balance_of(self.address)
    }

    /// A fresh reading of supply and custodied assets.
    pub fn conversion(&self) -> Conversion {
        Conversion::new(self.shares.total_supply(), self.total_assets())
    }

    /// Shares `assets` are worth right now, rounded down.
    pub fn convert_to_shares(&self, assets: Amount) -> Result<Amount, VaultError> {
        Ok(self.conversion().to_shares(assets, Rounding::Down)?)
    }

    /// Assets `shares` are worth right now, rounded down.
    pub fn convert_to_assets(&self, shares: Amount) -> Result<Amount, VaultError> {
        Ok(self.conversion().to_assets(shares, Rounding::Down)?)
    }

    /// Shares a deposit of `assets` would mint.
    pub fn preview_deposit(&self, assets: Amount) -> Result<Amount, VaultError> {
        self.convert_to_shares(assets)
    }

    /// Assets a mint of `shares` would pull from the caller. Rounds up.
    pub fn preview_mint(&self, shares: Amount) -> Result<Amount, VaultError> {
        Ok(self.conversion().to_assets(shares, Rounding::Up)?)
    }

    /// Shares a withdrawal of `assets` would burn. Rounds up.
    pub fn preview_withdraw(&self, assets: Amount) -> Result<Amount, VaultError> {
        Ok(self.conversion().to_shares(assets, Rounding::Up)?)
    }

    /// Assets a redemption of `shares` would release.
    pub fn preview_redeem(&self, shares: Amount) -> Result<Amount, VaultError> {
        self.convert_to_assets(shares)
    }
}

impl<A: AssetLedger, H: VaultHooks, G: OwnershipGate> SupportsInterface for Vault<A, H, G> {
    fn supported_interfaces(&self) -> Vec<InterfaceId> {
        vec![
            InterfaceId::ledger(),
            InterfaceId::metadata(),
            InterfaceId::vault(),
        ]
    }
}

impl<A, H, G> std::fmt::Debug for Vault<A, H, G>
where
    A: AssetLedger,
    H: VaultHooks,
    G: OwnershipGate,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("address", &self.address)
            .field("symbol", &self.config.symbol)
            .field("total_supply", &self.shares.total_supply())
            .field("total_assets", &self.total_assets())
            .field("paused", &self.paused)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
