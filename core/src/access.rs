//! # Ownership Gate
//!
//! Privileged vault settings (pausing, restricting accounts) are not decided
//! here. The vault holds an [`OwnershipGate`], fixed at construction, and
//! asks it whether the caller may proceed; the two-phase ownership handover
//! itself lives with the collaborator that implements the trait.

use thiserror::Error;

use crate::address::Address;

/// The caller is not the current owner.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("caller {caller} is not the owner")]
pub struct NotOwner {
    /// The rejected caller.
    pub caller: Address,
}

/// Answers "may this caller perform a privileged operation?".
pub trait OwnershipGate {
    /// Succeeds only for the current owner.
    fn require_owner(&self, caller: Address) -> Result<(), NotOwner>;
}

/// A fixed owner. Useful where no handover is ever needed.
impl OwnershipGate for Address {
    fn require_owner(&self, caller: Address) -> Result<(), NotOwner> {
        if *self == caller && !caller.is_zero() {
            Ok(())
        } else {
            Err(NotOwner { caller })
        }
    }
}
