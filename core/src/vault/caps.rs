//! Per-account operation limits and the privileged settings that tighten
//! them. Caps are recomputed on every call; nothing here is cached.

use tracing::info;

use super::{Vault, VaultError, VaultHooks};
use crate::access::OwnershipGate;
use crate::address::Address;
use crate::config::{DEFAULT_OPERATION_CAP, MAX_AMOUNT};
use crate::conversion::Rounding;
use crate::ledger::AssetLedger;
use crate::Amount;

impl<A: AssetLedger, H: VaultHooks, G: OwnershipGate> Vault<A, H, G> {
    /// `true` when caps are forced to zero for `account`.
    fn frozen(&self, account: Address) -> bool {
        self.paused || self.restricted.contains(&account)
    }

    /// Largest deposit `receiver` may make.
    pub fn max_deposit(&self, receiver: Address) -> Amount {
        if self.frozen(receiver) {
            0
        } else {
            DEFAULT_OPERATION_CAP
        }
    }

    /// Largest mint `receiver` may make.
    pub fn max_mint(&self, receiver: Address) -> Amount {
        if self.frozen(receiver) {
            0
        } else {
            DEFAULT_OPERATION_CAP
        }
    }

    /// Assets `owner`'s whole share balance is worth right now.
    pub fn max_withdraw(&self, owner: Address) -> Amount {
        if self.frozen(owner) {
            return 0;
        }
        // A balance never exceeds the supply, so this is at most
        // total_assets and always fits.
        self.conversion()
            .to_assets(self.shares.balance_of(owner), Rounding::Down)
            .unwrap_or(MAX_AMOUNT)
    }

    /// `owner`'s share balance.
    pub fn max_redeem(&self, owner: Address) -> Amount {
        if self.frozen(owner) {
            0
        } else {
            self.shares.balance_of(owner)
        }
    }

    // -- privileged settings ------------------------------------------------

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn is_restricted(&self, account: Address) -> bool {
        self.restricted.contains(&account)
    }

    /// Restricted accounts, ordered.
    pub fn restricted_accounts(&self) -> Vec<Address> {
        self.restricted.iter().copied().collect()
    }

    /// Zeroes every cap until [`unpause`](Self::unpause).
    pub fn pause(&mut self, caller: Address) -> Result<(), VaultError> {
        self.gate.require_owner(caller)?;
        self.paused = true;
        info!(vault = %self.address, %caller, "vault paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> Result<(), VaultError> {
        self.gate.require_owner(caller)?;
        self.paused = false;
        info!(vault = %self.address, %caller, "vault unpaused");
        Ok(())
    }

    /// Adds `account` to, or removes it from, the restricted set.
    pub fn set_restricted(
        &mut self,
        caller: Address,
        account: Address,
        restricted: bool,
    ) -> Result<(), VaultError> {
        self.gate.require_owner(caller)?;
        if restricted {
            self.restricted.insert(account);
        } else {
            self.restricted.remove(&account);
        }
        info!(vault = %self.address, %caller, %account, restricted, "restriction updated");
        Ok(())
    }
}
