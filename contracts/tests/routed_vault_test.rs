//! Integration tests for a factory-deployed, router-fronted vault.
//!
//! These tests wire the crate together the way the node does: the factory
//! picks the address, the router fronts the vault module at that address,
//! and every interaction goes through selectors.

use serde_json::{json, Value};

use coffer_contracts::factory::{Seed, VaultFactory};
use coffer_contracts::router::{Call, FacetCut, Module, Router, RouterError};
use coffer_contracts::vault_module::VaultModule;
use coffer_core::{Address, Event, InterfaceId, Ledger, Selector, VaultConfig};

const SEED: Seed = [0x42; 32];

fn owner() -> Address {
    Address::from_label("owner")
}

fn alice() -> Address {
    Address::from_label("alice")
}

fn bob() -> Address {
    Address::from_label("bob")
}

fn config() -> VaultConfig {
    VaultConfig::new("Routed Vault", "cRTV", Address::from_label("asset"))
}

/// Deploys one routed vault with alice funded on the asset ledger.
fn deploy() -> (VaultFactory<Router>, Address) {
    let mut factory = VaultFactory::new();
    let code = config().instantiation_code().unwrap();
    let address = factory
        .deploy_with_seed(owner(), SEED, &code, |address| {
            let mut asset = Ledger::new();
            asset.mint(alice(), 10_000).unwrap();
            let module = VaultModule::new(address, config(), asset, owner());
            let mut router = Router::new(owner());
            router.mount(owner(), address, Box::new(module)).unwrap();
            router
        })
        .unwrap();
    (factory, address)
}

fn send(router: &mut Router, caller: Address, signature: &str, args: Value) -> Result<Value, RouterError> {
    router.dispatch(&Call::new(signature, caller, args))
}

fn view(router: &Router, signature: &str, args: Value) -> Value {
    router.query(&Call::new(signature, owner(), args)).unwrap()
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[test]
fn vault_lands_at_precomputed_address() {
    let predicted = VaultFactory::<Router>::new().calculate_address(
        owner(),
        &SEED,
        &config().instantiation_code().unwrap(),
    );
    let (factory, address) = deploy();

    assert_eq!(address, predicted);
    let router = factory.get(address).unwrap();
    assert_eq!(router.module_addresses(), vec![address]);
    assert_eq!(view(router, "asset()", Value::Null), json!(Address::from_label("asset")));
}

// ---------------------------------------------------------------------------
// Operations through selectors
// ---------------------------------------------------------------------------

#[test]
fn deposit_transfer_redeem_round_trip() {
    let (mut factory, vault) = deploy();
    let router = factory.get_mut(vault).unwrap();

    send(router, alice(), "assetApprove(address,uint256)", json!([vault, 5_000])).unwrap();
    let shares = send(router, alice(), "deposit(uint256,address)", json!([5_000, alice()])).unwrap();
    assert_eq!(shares, json!(5_000));

    send(router, alice(), "transfer(address,uint256)", json!([bob(), 2_000])).unwrap();
    let assets = send(router, bob(), "redeem(uint256,address,address)", json!([2_000, bob(), bob()])).unwrap();
    assert_eq!(assets, json!(2_000));

    assert_eq!(view(router, "totalAssets()", Value::Null), json!(3_000));
    assert_eq!(view(router, "totalSupply()", Value::Null), json!(3_000));
    assert_eq!(view(router, "assetBalanceOf(address)", json!([bob()])), json!(2_000));
}

#[test]
fn failed_operation_leaves_no_trace() {
    let (mut factory, vault) = deploy();
    let router = factory.get_mut(vault).unwrap();
    send(router, alice(), "assetApprove(address,uint256)", json!([vault, 100])).unwrap();
    let before = router.events_since(vault, 0).len();

    // Allowance covers 100, the deposit asks for 200.
    assert!(send(router, alice(), "deposit(uint256,address)", json!([200, alice()])).is_err());

    assert_eq!(view(router, "totalSupply()", Value::Null), json!(0));
    assert_eq!(view(router, "assetBalanceOf(address)", json!([alice()])), json!(10_000));
    assert_eq!(router.events_since(vault, 0).len(), before);
}

#[test]
fn events_stream_in_operation_order() {
    let (mut factory, vault) = deploy();
    let router = factory.get_mut(vault).unwrap();
    send(router, alice(), "assetApprove(address,uint256)", json!([vault, 1_000])).unwrap();
    let from = router.events_since(vault, 0).len();

    send(router, alice(), "deposit(uint256,address)", json!([1_000, bob()])).unwrap();

    let names: Vec<_> = router.events_since(vault, from).iter().map(Event::name).collect();
    assert_eq!(names, vec!["mint", "deposit"]);
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[test]
fn pause_blocks_entry_through_router() {
    let (mut factory, vault) = deploy();
    let router = factory.get_mut(vault).unwrap();
    send(router, alice(), "assetApprove(address,uint256)", json!([vault, 1_000])).unwrap();

    assert!(send(router, alice(), "pause()", Value::Null).is_err());
    assert_eq!(view(router, "paused()", Value::Null), json!(false));

    send(router, owner(), "pause()", Value::Null).unwrap();
    assert!(send(router, alice(), "deposit(uint256,address)", json!([10, alice()])).is_err());
    assert_eq!(view(router, "maxDeposit(address)", json!([alice()])), json!(0));

    send(router, owner(), "unpause()", Value::Null).unwrap();
    assert!(send(router, alice(), "deposit(uint256,address)", json!([10, alice()])).is_ok());
}

#[test]
fn handover_moves_the_right_to_cut() {
    let mut router = Router::new(owner());
    let vault = Address::from_label("vault");
    router
        .mount(
            owner(),
            vault,
            Box::new(VaultModule::new(vault, config(), Ledger::new(), owner())),
        )
        .unwrap();
    let paused = Selector::from_signature("paused()");

    router.transfer_ownership(owner(), alice()).unwrap();
    // Still the owner until alice accepts.
    router
        .apply_cuts(owner(), &[FacetCut::remove(vec![paused])])
        .unwrap();

    router.accept_ownership(alice()).unwrap();
    let cut = [FacetCut::add(vault, vec![paused])];
    assert!(matches!(
        router.apply_cuts(owner(), &cut),
        Err(RouterError::NotOwner(_))
    ));
    router.apply_cuts(alice(), &cut).unwrap();
    assert_eq!(router.module_for(paused), vault);
}

#[test]
fn router_reports_module_interfaces() {
    let (factory, vault) = deploy();
    let router = factory.get(vault).unwrap();
    let supports = |id: InterfaceId| {
        view(router, "supportsInterface(bytes4)", json!([Selector(id.0)]))
    };

    assert_eq!(supports(InterfaceId::vault()), json!(true));
    assert_eq!(supports(InterfaceId::ledger()), json!(true));
    assert_eq!(supports(InterfaceId::INVALID), json!(false));
    assert_eq!(
        router.module(vault).map(|m| m.name().to_string()),
        Some("cRTV".to_string())
    );
}
