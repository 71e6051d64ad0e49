//! # Dispatch Router
//!
//! One entry point, many modules. The router keeps a table from 4-byte
//! [`Selector`] to the address of the module that answers it, and forwards
//! each [`Call`] accordingly.
//!
//! The table is edited with batches of [`FacetCut`]s. A batch is validated
//! against a staged copy of the table and swapped in only if every cut in it
//! is valid; a bad cut anywhere leaves the table untouched.
//!
//! The router answers the introspection and loupe selectors itself. Those
//! selectors are reserved and cannot be routed to a module.
//!
//! Cuts are gated by the router's own [`SafeOwnable`]; handing it over moves
//! the right to cut.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use coffer_core::introspection::INTROSPECTION_SIGNATURES;
use coffer_core::{
    Address, Event, InterfaceId, NotOwner, OwnershipGate, Selector, SupportsInterface,
};

use crate::ownership::{OwnershipError, OwnershipTransferred, SafeOwnable};

/// Routing-table queries.
pub const LOUPE_SIGNATURES: &[&str] = &[
    "facets()",
    "facetFunctionSelectors(address)",
    "facetAddresses()",
    "facetAddress(bytes4)",
];

/// Id of [`LOUPE_SIGNATURES`].
pub fn loupe_interface() -> InterfaceId {
    static ID: OnceLock<InterfaceId> = OnceLock::new();
    *ID.get_or_init(|| InterfaceId::from_signatures(LOUPE_SIGNATURES))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a module refused a call.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module does not implement this selector.
    #[error("unknown selector {0}")]
    UnknownSelector(Selector),

    /// The arguments did not decode.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The call decoded but the operation failed.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Errors that can occur while routing or cutting.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    NotOwner(#[from] NotOwner),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    /// No module is installed at this address.
    #[error("no module installed at {0}")]
    UnknownModule(Address),

    /// A module is already installed at this address.
    #[error("a module is already installed at {0}")]
    ModuleExists(Address),

    /// Add of a selector that is already routed.
    #[error("selector {selector} already routed to {module}")]
    SelectorExists { selector: Selector, module: Address },

    /// Replace or Remove of a selector that is not routed.
    #[error("selector {0} is not routed")]
    SelectorMissing(Selector),

    /// Replace that would not change anything.
    #[error("selector {selector} already routed to {module}; replace needs a different module")]
    SameModule { selector: Selector, module: Address },

    /// Introspection and loupe selectors belong to the router.
    #[error("selector {0} is reserved by the router")]
    Reserved(Selector),

    /// Nothing answers this selector.
    #[error("no route for selector {0}")]
    NoRoute(Selector),

    /// The module answering this selector mutates state.
    #[error("selector {0} is not a read-only call")]
    NotQuery(Selector),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One routed invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub selector: Selector,
    pub caller: Address,
    /// Positional arguments as a JSON array (or `null` for none).
    #[serde(default)]
    pub args: Value,
}

impl Call {
    /// Builds a call from a canonical signature such as
    /// `deposit(uint256,address)`.
    pub fn new(signature: &str, caller: Address, args: Value) -> Self {
        Self {
            selector: Selector::from_signature(signature),
            caller,
            args,
        }
    }
}

/// Something the router can forward calls to.
pub trait Module: SupportsInterface + Send + Sync {
    /// Short human-readable name.
    fn name(&self) -> &str;

    /// Every selector this module can answer.
    fn selectors(&self) -> Vec<Selector>;

    /// Answers a read-only call. `None` means the selector mutates state and
    /// must go through [`execute`](Self::execute).
    fn query(&self, call: &Call) -> Option<Result<Value, ModuleError>>;

    /// Answers any call, mutating or not.
    fn execute(&mut self, call: &Call) -> Result<Value, ModuleError>;

    /// Committed notifications, oldest first.
    fn events(&self) -> &[Event] {
        &[]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutAction {
    Add,
    Replace,
    Remove,
}

/// One edit of the routing table. `module` is ignored for `Remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCut {
    pub module: Address,
    pub action: CutAction,
    pub selectors: Vec<Selector>,
}

impl FacetCut {
    pub fn add(module: Address, selectors: Vec<Selector>) -> Self {
        Self {
            module,
            action: CutAction::Add,
            selectors,
        }
    }

    pub fn replace(module: Address, selectors: Vec<Selector>) -> Self {
        Self {
            module,
            action: CutAction::Replace,
            selectors,
        }
    }

    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            module: Address::ZERO,
            action: CutAction::Remove,
            selectors,
        }
    }
}

/// A module and the selectors currently routed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub module: Address,
    pub selectors: Vec<Selector>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    ownership: SafeOwnable,
    modules: BTreeMap<Address, Box<dyn Module>>,
    routes: BTreeMap<Selector, Address>,
}

impl Router {
    /// An empty router whose table only `owner` may cut.
    pub fn new(owner: Address) -> Self {
        Self {
            ownership: SafeOwnable::new(owner),
            modules: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }

    pub fn ownership(&self) -> &SafeOwnable {
        &self.ownership
    }

    /// Nominates the next holder of the right to cut.
    pub fn transfer_ownership(&mut self, caller: Address, nominee: Address) -> Result<(), RouterError> {
        Ok(self.ownership.transfer_ownership(caller, nominee)?)
    }

    pub fn accept_ownership(&mut self, caller: Address) -> Result<OwnershipTransferred, RouterError> {
        Ok(self.ownership.accept_ownership(caller)?)
    }

    fn reserved(selector: Selector) -> bool {
        INTROSPECTION_SIGNATURES
            .iter()
            .chain(LOUPE_SIGNATURES)
            .any(|s| Selector::from_signature(s) == selector)
    }

    /// Makes `module` available at `address`. Nothing is routed to it yet.
    pub fn install_module(
        &mut self,
        address: Address,
        module: Box<dyn Module>,
    ) -> Result<(), RouterError> {
        if self.modules.contains_key(&address) {
            return Err(RouterError::ModuleExists(address));
        }
        tracing::debug!(%address, name = module.name(), "module installed");
        self.modules.insert(address, module);
        Ok(())
    }

    /// Installs `module` and routes every selector it declares to it.
    pub fn mount(
        &mut self,
        caller: Address,
        address: Address,
        module: Box<dyn Module>,
    ) -> Result<(), RouterError> {
        self.ownership.require_owner(caller)?;
        let selectors = module.selectors();
        self.install_module(address, module)?;
        if let Err(error) = self.apply_cuts(caller, &[FacetCut::add(address, selectors)]) {
            self.modules.remove(&address);
            return Err(error);
        }
        Ok(())
    }

    /// Applies `cuts` as one batch. Either every cut takes effect or none.
    pub fn apply_cuts(&mut self, caller: Address, cuts: &[FacetCut]) -> Result<(), RouterError> {
        self.ownership.require_owner(caller)?;

        let mut staged = self.routes.clone();
        for cut in cuts {
            for &selector in &cut.selectors {
                if Self::reserved(selector) {
                    return Err(RouterError::Reserved(selector));
                }
                match cut.action {
                    CutAction::Add => {
                        self.require_module(cut.module)?;
                        if let Some(&module) = staged.get(&selector) {
                            return Err(RouterError::SelectorExists { selector, module });
                        }
                        staged.insert(selector, cut.module);
                    }
                    CutAction::Replace => {
                        self.require_module(cut.module)?;
                        match staged.get(&selector) {
                            None => return Err(RouterError::SelectorMissing(selector)),
                            Some(&module) if module == cut.module => {
                                return Err(RouterError::SameModule { selector, module })
                            }
                            Some(_) => {
                                staged.insert(selector, cut.module);
                            }
                        }
                    }
                    CutAction::Remove => {
                        if staged.remove(&selector).is_none() {
                            return Err(RouterError::SelectorMissing(selector));
                        }
                    }
                }
            }
        }

        self.routes = staged;
        tracing::info!(%caller, cuts = cuts.len(), routes = self.routes.len(), "routing table cut");
        Ok(())
    }

    fn require_module(&self, address: Address) -> Result<(), RouterError> {
        if self.modules.contains_key(&address) {
            Ok(())
        } else {
            Err(RouterError::UnknownModule(address))
        }
    }

    // -- loupe --------------------------------------------------------------

    /// Addresses of modules with at least one routed selector.
    pub fn module_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<_> = self.routes.values().copied().collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }

    /// Selectors routed to `module`; empty for unknown modules.
    pub fn module_selectors(&self, module: Address) -> Vec<Selector> {
        self.routes
            .iter()
            .filter(|(_, m)| **m == module)
            .map(|(s, _)| *s)
            .collect()
    }

    /// The module answering `selector`, or [`Address::ZERO`].
    pub fn module_for(&self, selector: Selector) -> Address {
        self.routes.get(&selector).copied().unwrap_or(Address::ZERO)
    }

    pub fn facets(&self) -> Vec<Facet> {
        self.module_addresses()
            .into_iter()
            .map(|module| Facet {
                module,
                selectors: self.module_selectors(module),
            })
            .collect()
    }

    /// Borrow an installed module.
    pub fn module(&self, address: Address) -> Option<&dyn Module> {
        self.modules.get(&address).map(|m| m.as_ref())
    }

    /// Events of the module at `address` from position `from` on.
    pub fn events_since(&self, address: Address, from: usize) -> &[Event] {
        self.modules
            .get(&address)
            .and_then(|m| m.events().get(from..))
            .unwrap_or(&[])
    }

    // -- dispatch -----------------------------------------------------------

    /// Answers a read-only call without taking `&mut self`.
    pub fn query(&self, call: &Call) -> Result<Value, RouterError> {
        if let Some(answer) = self.answer_builtin(call) {
            return answer;
        }
        let module = self.route(call.selector)?;
        match self.modules.get(&module) {
            Some(m) => m
                .query(call)
                .ok_or(RouterError::NotQuery(call.selector))?
                .map_err(RouterError::from),
            None => Err(RouterError::UnknownModule(module)),
        }
    }

    /// Forwards any call to the module it is routed to.
    pub fn dispatch(&mut self, call: &Call) -> Result<Value, RouterError> {
        if let Some(answer) = self.answer_builtin(call) {
            return answer;
        }
        let module = self.route(call.selector)?;
        match self.modules.get_mut(&module) {
            Some(m) => Ok(m.execute(call)?),
            None => Err(RouterError::UnknownModule(module)),
        }
    }

    fn route(&self, selector: Selector) -> Result<Address, RouterError> {
        self.routes
            .get(&selector)
            .copied()
            .ok_or(RouterError::NoRoute(selector))
    }

    fn answer_builtin(&self, call: &Call) -> Option<Result<Value, RouterError>> {
        let signature = INTROSPECTION_SIGNATURES
            .iter()
            .chain(LOUPE_SIGNATURES)
            .find(|s| Selector::from_signature(s) == call.selector)?;

        let answer = match *signature {
            "supportsInterface(bytes4)" => {
                decode::<(Selector,)>(&call.args).map(|(id,)| json!(self.supports_interface(InterfaceId(id.0))))
            }
            "facets()" => Ok(json!(self.facets())),
            "facetAddresses()" => Ok(json!(self.module_addresses())),
            "facetFunctionSelectors(address)" => {
                decode::<(Address,)>(&call.args).map(|(m,)| json!(self.module_selectors(m)))
            }
            "facetAddress(bytes4)" => {
                decode::<(Selector,)>(&call.args).map(|(s,)| json!(self.module_for(s)))
            }
            _ => Err(ModuleError::UnknownSelector(call.selector)),
        };
        Some(answer.map_err(RouterError::from))
    }
}

impl SupportsInterface for Router {
    fn supported_interfaces(&self) -> Vec<InterfaceId> {
        let mut ids = vec![loupe_interface()];
        for address in self.module_addresses() {
            if let Some(module) = self.modules.get(&address) {
                ids.extend(module.supported_interfaces());
            }
        }
        ids
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("routes", &self.routes.len())
            .finish()
    }
}

/// Decodes positional JSON arguments into a tuple.
pub fn decode<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ModuleError> {
    serde_json::from_value(args.clone()).map_err(|e| ModuleError::InvalidArguments(e.to_string()))
}
