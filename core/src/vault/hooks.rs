//! # Vault Hooks
//!
//! Extension points a vault calls at fixed moments of every operation:
//!
//! ```text
//! deposit / mint:    cap -> convert -> before_deposit  -> pull assets -> mint  -> after_deposit  -> event
//! withdraw / redeem: cap -> convert -> before_withdraw -> burn -> release     -> after_withdraw -> event
//! ```
//!
//! A hook that returns [`HookRejection`] aborts the whole operation; the
//! vault rolls back whatever already happened. Hooks see the share ledger
//! read-only and cannot re-enter the vault.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::ledger::Ledger;
use crate::Amount;

/// The four vault entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Exact assets in, shares out.
    Deposit,
    /// Exact shares out, assets in.
    Mint,
    /// Exact assets out, shares burned.
    Withdraw,
    /// Exact shares burned, assets out.
    Redeem,
}

impl Operation {
    /// `true` for operations that bring assets into the vault.
    pub fn is_entry(&self) -> bool {
        matches!(self, Operation::Deposit | Operation::Mint)
    }

    /// `true` when the caller names the asset amount.
    pub fn exact_in_assets(&self) -> bool {
        matches!(self, Operation::Deposit | Operation::Withdraw)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deposit => write!(f, "deposit"),
            Operation::Mint => write!(f, "mint"),
            Operation::Withdraw => write!(f, "withdraw"),
            Operation::Redeem => write!(f, "redeem"),
        }
    }
}

/// Everything a hook gets to know about the operation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookCall {
    pub operation: Operation,
    pub caller: Address,
    /// Who receives the output: shares for deposit/mint, assets for
    /// withdraw/redeem.
    pub receiver: Address,
    /// Whose shares are burned. Equal to `receiver` for deposit/mint.
    pub owner: Address,
    pub assets: Amount,
    pub shares: Amount,
}

impl HookCall {
    /// The amount the caller named.
    pub fn exact_amount(&self) -> Amount {
        if self.operation.exact_in_assets() {
            self.assets
        } else {
            self.shares
        }
    }

    /// The amount the vault derived from it.
    pub fn computed_amount(&self) -> Amount {
        if self.operation.exact_in_assets() {
            self.shares
        } else {
            self.assets
        }
    }
}

/// A hook's veto.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("hook rejected operation: {reason}")]
pub struct HookRejection {
    pub reason: String,
}

impl HookRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Policy injected into a vault at construction.
///
/// Every method defaults to accepting, so an implementation overrides only
/// the moments it cares about.
pub trait VaultHooks {
    /// Before assets are pulled for a deposit or mint.
    fn before_deposit(&mut self, _shares: &Ledger, _call: &HookCall) -> Result<(), HookRejection> {
        Ok(())
    }

    /// After shares are minted for a deposit or mint.
    fn after_deposit(&mut self, _shares: &Ledger, _call: &HookCall) -> Result<(), HookRejection> {
        Ok(())
    }

    /// Before shares are burned for a withdraw or redeem.
    fn before_withdraw(&mut self, _shares: &Ledger, _call: &HookCall) -> Result<(), HookRejection> {
        Ok(())
    }

    /// After assets are released for a withdraw or redeem.
    fn after_withdraw(&mut self, _shares: &Ledger, _call: &HookCall) -> Result<(), HookRejection> {
        Ok(())
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl VaultHooks for NoHooks {}

/// Runs one closure as the "after" hook of every operation.
pub struct AfterHook<F>(pub F);

impl<F> VaultHooks for AfterHook<F>
where
    F: FnMut(&Ledger, &HookCall) -> Result<(), HookRejection>,
{
    fn after_deposit(&mut self, shares: &Ledger, call: &HookCall) -> Result<(), HookRejection> {
        (self.0)(shares, call)
    }

    fn after_withdraw(&mut self, shares: &Ledger, call: &HookCall) -> Result<(), HookRejection> {
        (self.0)(shares, call)
    }
}

/// Minimum-output / maximum-input protection.
///
/// For deposit and redeem the computed side is what the caller receives and
/// must be at least `min_out`. For mint and withdraw it is what the caller
/// pays and must be at most `max_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageGuard {
    pub min_out: Amount,
    pub max_in: Amount,
}

impl Default for SlippageGuard {
    fn default() -> Self {
        Self {
            min_out: 0,
            max_in: Amount::MAX,
        }
    }
}

impl SlippageGuard {
    fn check(&self, call: &HookCall) -> Result<(), HookRejection> {
        let computed = call.computed_amount();
        match call.operation {
            Operation::Deposit | Operation::Redeem if computed < self.min_out => {
                Err(HookRejection::new(format!(
                    "{} yields {computed}, below minimum {}",
                    call.operation, self.min_out
                )))
            }
            Operation::Mint | Operation::Withdraw if computed > self.max_in => {
                Err(HookRejection::new(format!(
                    "{} costs {computed}, above maximum {}",
                    call.operation, self.max_in
                )))
            }
            _ => Ok(()),
        }
    }
}

impl VaultHooks for SlippageGuard {
    fn after_deposit(&mut self, _shares: &Ledger, call: &HookCall) -> Result<(), HookRejection> {
        self.check(call)
    }

    fn after_withdraw(&mut self, _shares: &Ledger, call: &HookCall) -> Result<(), HookRejection> {
        self.check(call)
    }
}
