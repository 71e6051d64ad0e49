//! # Vault Module
//!
//! Puts a [`Vault`] administered by a [`SafeOwnable`] behind the router's
//! [`Module`] interface. Arguments arrive as positional JSON arrays and are decoded per
//! selector; amounts are JSON numbers, addresses and selectors are `0x` hex
//! strings.
//!
//! The vault custodies a plain [`Ledger`] as its asset. The `asset*`
//! selectors give callers access to that ledger, so they can fund accounts
//! and approve the vault without a second module.

use std::collections::HashMap;

use serde_json::{json, Value};

use coffer_core::introspection::{
    LEDGER_SIGNATURES, METADATA_SIGNATURES, VAULT_ADMIN_SIGNATURES, VAULT_SIGNATURES,
};
use coffer_core::{
    Address, Amount, Event, InterfaceId, Ledger, NoHooks, Selector, SupportsInterface, Vault,
    VaultConfig, VaultError, VaultHooks,
};

use crate::ownership::{ownership_interface, OwnershipError, SafeOwnable, OWNERSHIP_SIGNATURES};
use crate::router::{decode, Call, Module, ModuleError};

/// Share allowance adjustments.
pub const ALLOWANCE_SIGNATURES: &[&str] = &[
    "increaseAllowance(address,uint256)",
    "decreaseAllowance(address,uint256)",
];

/// Access to the custodied asset ledger.
pub const ASSET_SIGNATURES: &[&str] = &[
    "assetBalanceOf(address)",
    "assetAllowance(address,address)",
    "assetTransfer(address,uint256)",
    "assetApprove(address,uint256)",
];

impl From<VaultError> for ModuleError {
    fn from(error: VaultError) -> Self {
        ModuleError::Failed(error.into())
    }
}

impl From<OwnershipError> for ModuleError {
    fn from(error: OwnershipError) -> Self {
        ModuleError::Failed(error.into())
    }
}

/// The vault type a module routes to.
pub type OwnedVault<H> = Vault<Ledger, H, SafeOwnable>;

/// A vault plus ownership, routable by selector.
pub struct VaultModule<H: VaultHooks = NoHooks> {
    vault: OwnedVault<H>,
    signatures: HashMap<Selector, &'static str>,
}

impl VaultModule<NoHooks> {
    /// A hookless vault at `address` over `asset`, administered by `owner`.
    pub fn new(address: Address, config: VaultConfig, asset: Ledger, owner: Address) -> Self {
        Self::from_vault(Vault::new(address, config, asset, SafeOwnable::new(owner)))
    }
}

impl<H: VaultHooks> VaultModule<H> {
    pub fn from_vault(vault: OwnedVault<H>) -> Self {
        let signatures = Self::all_signatures()
            .map(|s| (Selector::from_signature(s), s))
            .collect();
        Self { vault, signatures }
    }

    fn all_signatures() -> impl Iterator<Item = &'static str> {
        LEDGER_SIGNATURES
            .iter()
            .chain(METADATA_SIGNATURES)
            .chain(VAULT_SIGNATURES)
            .chain(VAULT_ADMIN_SIGNATURES)
            .chain(OWNERSHIP_SIGNATURES)
            .chain(ALLOWANCE_SIGNATURES)
            .chain(ASSET_SIGNATURES)
            .copied()
    }

    pub fn vault(&self) -> &OwnedVault<H> {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut OwnedVault<H> {
        &mut self.vault
    }

    pub fn ownership(&self) -> &SafeOwnable {
        self.vault.gate()
    }

    fn signature(&self, call: &Call) -> Result<&'static str, ModuleError> {
        self.signatures
            .get(&call.selector)
            .copied()
            .ok_or(ModuleError::UnknownSelector(call.selector))
    }

    fn view(&self, signature: &str, args: &Value) -> Option<Result<Value, ModuleError>> {
        let vault = &self.vault;
        let answer = match signature {
            // ledger
            "totalSupply()" => Ok(json!(vault.total_supply())),
            "balanceOf(address)" => decode::<(Address,)>(args).map(|(a,)| json!(vault.balance_of(a))),
            "allowance(address,address)" => {
                decode::<(Address, Address)>(args).map(|(o, s)| json!(vault.allowance(o, s)))
            }
            // metadata
            "name()" => Ok(json!(vault.name())),
            "symbol()" => Ok(json!(vault.symbol())),
            "decimals()" => Ok(json!(vault.decimals())),
            // vault
            "asset()" => Ok(json!(vault.asset())),
            "totalAssets()" => Ok(json!(vault.total_assets())),
            "convertToShares(uint256)" => amount_arg(args, |x| vault.convert_to_shares(x)),
            "convertToAssets(uint256)" => amount_arg(args, |x| vault.convert_to_assets(x)),
            "previewDeposit(uint256)" => amount_arg(args, |x| vault.preview_deposit(x)),
            "previewMint(uint256)" => amount_arg(args, |x| vault.preview_mint(x)),
            "previewWithdraw(uint256)" => amount_arg(args, |x| vault.preview_withdraw(x)),
            "previewRedeem(uint256)" => amount_arg(args, |x| vault.preview_redeem(x)),
            "maxDeposit(address)" => decode::<(Address,)>(args).map(|(a,)| json!(vault.max_deposit(a))),
            "maxMint(address)" => decode::<(Address,)>(args).map(|(a,)| json!(vault.max_mint(a))),
            "maxWithdraw(address)" => decode::<(Address,)>(args).map(|(a,)| json!(vault.max_withdraw(a))),
            "maxRedeem(address)" => decode::<(Address,)>(args).map(|(a,)| json!(vault.max_redeem(a))),
            // admin
            "paused()" => Ok(json!(vault.paused())),
            "isRestricted(address)" => {
                decode::<(Address,)>(args).map(|(a,)| json!(vault.is_restricted(a)))
            }
            // ownership
            "owner()" => Ok(json!(vault.gate().owner())),
            "nomineeOwner()" => Ok(json!(vault.gate().nominee().unwrap_or(Address::ZERO))),
            // asset
            "assetBalanceOf(address)" => {
                decode::<(Address,)>(args).map(|(a,)| json!(vault.asset_ledger().balance_of(a)))
            }
            "assetAllowance(address,address)" => decode::<(Address, Address)>(args)
                .map(|(o, s)| json!(vault.asset_ledger().allowance(o, s))),
            _ => return None,
        };
        Some(answer)
    }

    fn mutate(&mut self, signature: &str, caller: Address, args: &Value) -> Result<Value, ModuleError> {
        let vault = &mut self.vault;
        match signature {
            // ledger
            "transfer(address,uint256)" => {
                let (to, amount) = decode::<(Address, Amount)>(args)?;
                vault.transfer(caller, to, amount)?;
                Ok(json!(true))
            }
            "approve(address,uint256)" => {
                let (spender, amount) = decode::<(Address, Amount)>(args)?;
                vault.approve(caller, spender, amount)?;
                Ok(json!(true))
            }
            "transferFrom(address,address,uint256)" => {
                let (from, to, amount) = decode::<(Address, Address, Amount)>(args)?;
                vault.transfer_from(caller, from, to, amount)?;
                Ok(json!(true))
            }
            "increaseAllowance(address,uint256)" => {
                let (spender, added) = decode::<(Address, Amount)>(args)?;
                vault.increase_allowance(caller, spender, added)?;
                Ok(json!(true))
            }
            "decreaseAllowance(address,uint256)" => {
                let (spender, subtracted) = decode::<(Address, Amount)>(args)?;
                vault.decrease_allowance(caller, spender, subtracted)?;
                Ok(json!(true))
            }
            // vault
            "deposit(uint256,address)" => {
                let (assets, receiver) = decode::<(Amount, Address)>(args)?;
                Ok(json!(vault.deposit(caller, assets, receiver)?))
            }
            "mint(uint256,address)" => {
                let (shares, receiver) = decode::<(Amount, Address)>(args)?;
                Ok(json!(vault.mint(caller, shares, receiver)?))
            }
            "withdraw(uint256,address,address)" => {
                let (assets, receiver, owner) = decode::<(Amount, Address, Address)>(args)?;
                Ok(json!(vault.withdraw(caller, assets, receiver, owner)?))
            }
            "redeem(uint256,address,address)" => {
                let (shares, receiver, owner) = decode::<(Amount, Address, Address)>(args)?;
                Ok(json!(vault.redeem(caller, shares, receiver, owner)?))
            }
            // admin
            "pause()" => {
                vault.pause(caller)?;
                Ok(Value::Null)
            }
            "unpause()" => {
                vault.unpause(caller)?;
                Ok(Value::Null)
            }
            "setRestricted(address,bool)" => {
                let (account, restricted) = decode::<(Address, bool)>(args)?;
                vault.set_restricted(caller, account, restricted)?;
                Ok(Value::Null)
            }
            // ownership
            "transferOwnership(address)" => {
                let (nominee,) = decode::<(Address,)>(args)?;
                vault.gate_mut().transfer_ownership(caller, nominee)?;
                Ok(Value::Null)
            }
            "acceptOwnership()" => {
                let record = vault.gate_mut().accept_ownership(caller)?;
                Ok(json!(record))
            }
            // asset
            "assetTransfer(address,uint256)" => {
                let (to, amount) = decode::<(Address, Amount)>(args)?;
                vault.asset_ledger_mut().transfer(caller, to, amount).map_err(anyhow::Error::from)?;
                Ok(json!(true))
            }
            "assetApprove(address,uint256)" => {
                let (spender, amount) = decode::<(Address, Amount)>(args)?;
                vault.asset_ledger_mut().approve(caller, spender, amount).map_err(anyhow::Error::from)?;
                Ok(json!(true))
            }
            _ => Err(ModuleError::InvalidArguments(format!("{signature} is not callable"))),
        }
    }
}

fn amount_arg(
    args: &Value,
    f: impl FnOnce(Amount) -> Result<Amount, VaultError>,
) -> Result<Value, ModuleError> {
    let (amount,) = decode::<(Amount,)>(args)?;
    Ok(json!(f(amount)?))
}

impl<H: VaultHooks> SupportsInterface for VaultModule<H> {
    fn supported_interfaces(&self) -> Vec<InterfaceId> {
        let mut ids = self.vault.supported_interfaces();
        ids.push(ownership_interface());
        ids
    }
}

impl<H> Module for VaultModule<H>
where
    H: VaultHooks + Send + Sync,
{
    fn name(&self) -> &str {
        self.vault.symbol()
    }

    fn selectors(&self) -> Vec<Selector> {
        let mut selectors: Vec<_> = self.signatures.keys().copied().collect();
        selectors.sort();
        selectors
    }

    fn query(&self, call: &Call) -> Option<Result<Value, ModuleError>> {
        match self.signature(call) {
            Ok(signature) => self.view(signature, &call.args),
            Err(error) => Some(Err(error)),
        }
    }

    fn execute(&mut self, call: &Call) -> Result<Value, ModuleError> {
        let signature = self.signature(call)?;
        if let Some(answer) = self.view(signature, &call.args) {
            return answer;
        }
        self.mutate(signature, call.caller, &call.args)
    }

    fn events(&self) -> &[Event] {
        self.vault.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_label("owner")
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn vault_address() -> Address {
        Address::from_label("vault")
    }

    fn module() -> VaultModule {
        let mut asset = Ledger::new();
        asset.mint(alice(), 1_000).unwrap();
        VaultModule::new(
            vault_address(),
            VaultConfig::new("Module Vault", "cMOD", Address::from_label("asset")),
            asset,
            owner(),
        )
    }

    fn call(module: &mut VaultModule, caller: Address, signature: &str, args: Value) -> Result<Value, ModuleError> {
        module.execute(&Call::new(signature, caller, args))
    }

    #[test]
    fn deposit_flow_through_selectors() {
        let mut m = module();
        call(&mut m, alice(), "assetApprove(address,uint256)", json!([vault_address(), 500])).unwrap();
        let shares = call(&mut m, alice(), "deposit(uint256,address)", json!([300, alice()])).unwrap();

        assert_eq!(shares, json!(300));
        assert_eq!(call(&mut m, alice(), "balanceOf(address)", json!([alice()])).unwrap(), json!(300));
        assert_eq!(call(&mut m, alice(), "totalAssets()", Value::Null).unwrap(), json!(300));
        assert_eq!(
            call(&mut m, alice(), "assetBalanceOf(address)", json!([alice()])).unwrap(),
            json!(700)
        );
    }

    #[test]
    fn views_are_queries_and_mutations_are_not() {
        let m = module();
        assert!(m.query(&Call::new("totalSupply()", alice(), Value::Null)).is_some());
        assert!(m
            .query(&Call::new("deposit(uint256,address)", alice(), json!([1, alice()])))
            .is_none());
    }

    #[test]
    fn bad_arguments_are_invalid_arguments() {
        let mut m = module();
        let result = call(&mut m, alice(), "deposit(uint256,address)", json!(["lots", alice()]));
        assert!(matches!(result, Err(ModuleError::InvalidArguments(_))));
    }

    #[test]
    fn vault_failures_surface_as_failed() {
        let mut m = module();
        // No approval on the asset ledger.
        let result = call(&mut m, alice(), "deposit(uint256,address)", json!([10, alice()]));
        let Err(ModuleError::Failed(error)) = result else {
            panic!("expected a failed call");
        };
        assert!(error.downcast_ref::<VaultError>().is_some());
    }

    #[test]
    fn pause_requires_owner_and_handover_moves_it() {
        let mut m = module();
        assert!(call(&mut m, alice(), "pause()", Value::Null).is_err());

        call(&mut m, owner(), "transferOwnership(address)", json!([alice()])).unwrap();
        assert_eq!(call(&mut m, owner(), "nomineeOwner()", Value::Null).unwrap(), json!(alice()));
        call(&mut m, alice(), "acceptOwnership()", Value::Null).unwrap();

        call(&mut m, alice(), "pause()", Value::Null).unwrap();
        assert_eq!(call(&mut m, alice(), "paused()", Value::Null).unwrap(), json!(true));
        assert_eq!(call(&mut m, alice(), "maxDeposit(address)", json!([alice()])).unwrap(), json!(0));
        assert!(call(&mut m, owner(), "unpause()", Value::Null).is_err());
        assert_eq!(m.ownership().owner(), alice());
    }

    #[test]
    fn outsider_cannot_pause_or_restrict() {
        let mut m = module();
        let mallory = Address::from_label("mallory");

        let Err(ModuleError::Failed(error)) = call(&mut m, mallory, "pause()", Value::Null) else {
            panic!("expected a failed call");
        };
        assert!(matches!(
            error.downcast_ref::<VaultError>(),
            Some(VaultError::NotOwner(_))
        ));
        assert!(call(&mut m, mallory, "setRestricted(address,bool)", json!([alice(), true])).is_err());
        assert_eq!(call(&mut m, mallory, "paused()", Value::Null).unwrap(), json!(false));
        assert_eq!(
            call(&mut m, mallory, "isRestricted(address)", json!([alice()])).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn module_declares_every_interface_it_answers() {
        let m = module();
        assert!(m.supports_interface(InterfaceId::vault()));
        assert!(m.supports_interface(InterfaceId::ledger()));
        assert!(m.supports_interface(ownership_interface()));
        assert_eq!(
            m.selectors().len(),
            VaultModule::<NoHooks>::all_signatures().count()
        );
    }

    #[test]
    fn unknown_selector_rejected() {
        let mut m = module();
        assert!(matches!(
            call(&mut m, alice(), "selfDestruct()", Value::Null),
            Err(ModuleError::UnknownSelector(_))
        ));
    }
}
