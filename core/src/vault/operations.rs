//! The four vault operations and the share-ledger passthroughs.
//!
//! Each operation runs inside one checkpoint spanning both ledgers. The
//! closure either returns `Ok` and everything commits, or returns `Err` and
//! both ledgers, including their event logs, are put back as they were.

use tracing::{debug, warn};

use super::{HookCall, Operation, Vault, VaultError, VaultHooks};
use crate::access::OwnershipGate;
use crate::address::Address;
use crate::events::Event;
use crate::ledger::{AssetLedger, Checkpoint};
use crate::Amount;

impl<A: AssetLedger, H: VaultHooks, G: OwnershipGate> Vault<A, H, G> {
    // -- entry --------------------------------------------------------------

    /// Takes exactly `assets` from `caller` and mints the shares they are
    /// worth to `receiver`. Returns the shares minted.
    ///
    /// `caller` must have approved the vault's address for at least `assets`
    /// on the asset ledger.
    pub fn deposit(
        &mut self,
        caller: Address,
        assets: Amount,
        receiver: Address,
    ) -> Result<Amount, VaultError> {
        self.atomically(Operation::Deposit, caller, |vault| {
            vault.check_cap(Operation::Deposit, receiver, assets, vault.max_deposit(receiver))?;
            let shares = vault.preview_deposit(assets)?;
            vault.enter(HookCall {
                operation: Operation::Deposit,
                caller,
                receiver,
                owner: receiver,
                assets,
                shares,
            })?;
            Ok(shares)
        })
    }

    /// Mints exactly `shares` to `receiver`, taking whatever assets they
    /// cost from `caller`. Returns the assets taken.
    pub fn mint(
        &mut self,
        caller: Address,
        shares: Amount,
        receiver: Address,
    ) -> Result<Amount, VaultError> {
        self.atomically(Operation::Mint, caller, |vault| {
            vault.check_cap(Operation::Mint, receiver, shares, vault.max_mint(receiver))?;
            let assets = vault.preview_mint(shares)?;
            vault.enter(HookCall {
                operation: Operation::Mint,
                caller,
                receiver,
                owner: receiver,
                assets,
                shares,
            })?;
            Ok(assets)
        })
    }

    // -- exit ---------------------------------------------------------------

    /// Sends exactly `assets` to `receiver`, burning the shares they cost
    /// from `owner`. Returns the shares burned.
    ///
    /// When `caller != owner` the burn spends `caller`'s share allowance.
    pub fn withdraw(
        &mut self,
        caller: Address,
        assets: Amount,
        receiver: Address,
        owner: Address,
    ) -> Result<Amount, VaultError> {
        self.atomically(Operation::Withdraw, caller, |vault| {
            vault.check_cap(Operation::Withdraw, owner, assets, vault.max_withdraw(owner))?;
            let shares = vault.preview_withdraw(assets)?;
            vault.exit(HookCall {
                operation: Operation::Withdraw,
                caller,
                receiver,
                owner,
                assets,
                shares,
            })?;
            Ok(shares)
        })
    }

    /// Burns exactly `shares` from `owner` and sends the assets they are
    /// worth to `receiver`. Returns the assets sent.
    pub fn redeem(
        &mut self,
        caller: Address,
        shares: Amount,
        receiver: Address,
        owner: Address,
    ) -> Result<Amount, VaultError> {
        self.atomically(Operation::Redeem, caller, |vault| {
            vault.check_cap(Operation::Redeem, owner, shares, vault.max_redeem(owner))?;
            let assets = vault.preview_redeem(shares)?;
            vault.exit(HookCall {
                operation: Operation::Redeem,
                caller,
                receiver,
                owner,
                assets,
                shares,
            })?;
            Ok(assets)
        })
    }

    // -- share ledger -------------------------------------------------------

    /// Moves shares from `caller` to `to`.
    pub fn transfer(&mut self, caller: Address, to: Address, amount: Amount) -> Result<(), VaultError> {
        Ok(self.shares.transfer(caller, to, amount)?)
    }

    /// Sets `caller`'s share allowance for `spender`.
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), VaultError> {
        Ok(self.shares.approve(caller, spender, amount)?)
    }

    /// Moves `from`'s shares on `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), VaultError> {
        Ok(self.shares.transfer_from(caller, from, to, amount)?)
    }

    /// Raises `caller`'s share allowance for `spender` by `added`.
    pub fn increase_allowance(
        &mut self,
        caller: Address,
        spender: Address,
        added: Amount,
    ) -> Result<(), VaultError> {
        Ok(self.shares.increase_allowance(caller, spender, added)?)
    }

    /// Lowers `caller`'s share allowance for `spender` by `subtracted`.
    pub fn decrease_allowance(
        &mut self,
        caller: Address,
        spender: Address,
        subtracted: Amount,
    ) -> Result<(), VaultError> {
        Ok(self.shares.decrease_allowance(caller, spender, subtracted)?)
    }

    // -- internals ----------------------------------------------------------

    fn check_cap(
        &self,
        operation: Operation,
        account: Address,
        requested: Amount,
        max: Amount,
    ) -> Result<(), VaultError> {
        if requested > max {
            return Err(VaultError::MaxExceeded {
                operation,
                account,
                requested,
                max,
            });
        }
        Ok(())
    }

    /// Pull assets, mint shares, run hooks, record the deposit.
    fn enter(&mut self, call: HookCall) -> Result<(), VaultError> {
        self.hooks.before_deposit(&self.shares, &call)?;
        self.asset
            .transfer_from(self.address, call.caller, self.address, call.assets)
            .map_err(external)?;
        self.shares.mint(call.receiver, call.shares)?;
        self.hooks.after_deposit(&self.shares, &call)?;
        self.shares.emit(Event::Deposit {
            caller: call.caller,
            owner: call.receiver,
            assets: call.assets,
            shares: call.shares,
        });
        Ok(())
    }

    /// Spend allowance, burn shares, release assets, run hooks, record the
    /// withdrawal.
    fn exit(&mut self, call: HookCall) -> Result<(), VaultError> {
        self.hooks.before_withdraw(&self.shares, &call)?;
        if call.caller != call.owner {
            self.shares.spend_allowance(call.owner, call.caller, call.shares)?;
        }
        self.shares.burn(call.owner, call.shares)?;
        self.asset
            .transfer(self.address, call.receiver, call.assets)
            .map_err(external)?;
        self.hooks.after_withdraw(&self.shares, &call)?;
        self.shares.emit(Event::Withdraw {
            caller: call.caller,
            receiver: call.receiver,
            owner: call.owner,
            assets: call.assets,
            shares: call.shares,
        });
        Ok(())
    }

    fn atomically<T>(
        &mut self,
        operation: Operation,
        caller: Address,
        body: impl FnOnce(&mut Self) -> Result<T, VaultError>,
    ) -> Result<T, VaultError>
    where
        T: std::fmt::Display,
    {
        self.shares.begin();
        self.asset.begin();

        let result = body(self);
        match &result {
            Ok(amount) => {
                self.asset.commit();
                self.shares.commit();
                debug!(
                    %operation,
                    %caller,
                    computed = %amount,
                    total_supply = self.shares.total_supply(),
                    total_assets = self.total_assets(),
                    "vault operation committed"
                );
            }
            Err(error) => {
                self.asset.rollback();
                self.shares.rollback();
                warn!(%operation, %caller, %error, "vault operation rolled back");
            }
        }
        result
    }
}

fn external(error: impl std::error::Error) -> VaultError {
    VaultError::ExternalTransferFailed {
        reason: error.to_string(),
    }
}
