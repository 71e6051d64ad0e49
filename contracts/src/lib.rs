// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Coffer Contracts
//!
//! The deployable side of Coffer. `coffer-core` knows how to account for a
//! single vault; this crate knows how vaults are created, addressed, and
//! reached:
//!
//! - **Factory**: deploys vault instances at deterministic addresses, either
//!   from a deployer-chosen seed or from a per-deployer nonce.
//! - **Router**: a selector-keyed dispatch table in front of any number of
//!   modules, edited with all-or-nothing batches of cuts.
//! - **Vault Module**: a vault and its ownership exposed to the router.
//! - **Ownership**: two-phase handover that gates every administrative call.
//!
//! ## Design Principles
//!
//! 1. Privileged calls check the caller against the [`OwnershipGate`] the
//!    vault or router holds before touching state.
//! 2. A failed batch changes nothing: cuts are staged, vault operations run
//!    inside a checkpoint.
//! 3. Every public record is serializable (serde) so the node can hand it out
//!    as JSON unchanged.
//!
//! [`OwnershipGate`]: coffer_core::OwnershipGate

pub mod factory;
pub mod ownership;
pub mod router;
pub mod vault_module;
