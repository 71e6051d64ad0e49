//! # Notification Events
//!
//! Every observable effect of the ledger and the vault is recorded as an
//! [`Event`]. The log is append-only and ordered; external indexers replay
//! it, so the field order of each variant is part of the contract.
//!
//! Mints and burns do not have variants of their own. They are transfers
//! from and to [`Address::ZERO`].

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::Amount;

/// A single notification emitted by a committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Shares moved between accounts (or were minted / burned).
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },
    /// An allowance was set to `amount`.
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    /// Assets entered the vault and shares were minted to `owner`.
    Deposit {
        caller: Address,
        owner: Address,
        assets: Amount,
        shares: Amount,
    },
    /// Shares of `owner` were burned and assets left for `receiver`.
    Withdraw {
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: Amount,
        shares: Amount,
    },
}

impl Event {
    /// Short name used in logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Transfer { from, .. } if from.is_zero() => "mint",
            Event::Transfer { to, .. } if to.is_zero() => "burn",
            Event::Transfer { .. } => "transfer",
            Event::Approval { .. } => "approval",
            Event::Deposit { .. } => "deposit",
            Event::Withdraw { .. } => "withdraw",
        }
    }
}
