//! # Share / Asset Conversion
//!
//! The exchange rate is never stored. It is derived on every call from two
//! readings, the share supply `S` and the custodied asset balance `A`:
//!
//! ```text
//! shares = assets * (S + 1) / (A + 1)
//! assets = shares * (A + 1) / (S + 1)
//! ```
//!
//! The `+ 1` offsets keep the denominator non-zero and make an empty vault
//! trade at exactly 1:1 without a special case anywhere else.
//!
//! Products are formed in `u128`. Both factors are at most `2^64`, so the
//! product cannot wrap; only the final narrowing back to `u64` can fail.

use serde::{Deserialize, Serialize};

use crate::config::RATE_OFFSET;
use crate::ledger::LedgerError;
use crate::Amount;

/// Which way to resolve a fractional result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Toward zero. Used when the caller names the input amount.
    Down,
    /// Away from zero. Used when the caller names the output amount, so the
    /// input they pay is never short.
    Up,
}

/// `x * numerator / denominator`, rounded as requested.
///
/// `denominator` must be non-zero; every caller in this crate passes a value
/// offset by [`RATE_OFFSET`].
pub fn mul_div(
    x: Amount,
    numerator: u128,
    denominator: u128,
    rounding: Rounding,
    operation: &'static str,
) -> Result<Amount, LedgerError> {
    debug_assert!(denominator != 0);
    let product = (x as u128)
        .checked_mul(numerator)
        .ok_or(LedgerError::Overflow { operation })?;
    let mut quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != 0 {
        quotient += 1;
    }
    Amount::try_from(quotient).map_err(|_| LedgerError::Overflow { operation })
}

/// A point-in-time reading of the two quantities the rate depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Share supply `S`.
    pub total_supply: Amount,
    /// Asset balance held by the vault, `A`.
    pub total_assets: Amount,
}

impl Conversion {
    /// Captures a reading.
    pub fn new(total_supply: Amount, total_assets: Amount) -> Self {
        Self {
            total_supply,
            total_assets,
        }
    }

    fn supply_offset(&self) -> u128 {
        self.total_supply as u128 + RATE_OFFSET
    }

    fn assets_offset(&self) -> u128 {
        self.total_assets as u128 + RATE_OFFSET
    }

    /// Shares worth `assets` at this reading.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if the share amount does not fit in `u64`.
    pub fn to_shares(&self, assets: Amount, rounding: Rounding) -> Result<Amount, LedgerError> {
        mul_div(
            assets,
            self.supply_offset(),
            self.assets_offset(),
            rounding,
            "convert_to_shares",
        )
    }

    /// Assets worth `shares` at this reading.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if the asset amount does not fit in `u64`.
    pub fn to_assets(&self, shares: Amount, rounding: Rounding) -> Result<Amount, LedgerError> {
        mul_div(
            shares,
            self.assets_offset(),
            self.supply_offset(),
            rounding,
            "convert_to_assets",
        )
    }

    /// Assets per share as a float. Display only; never feed this back into
    /// accounting.
    pub fn assets_per_share(&self) -> f64 {
        self.assets_offset() as f64 / self.supply_offset() as f64
    }
}
