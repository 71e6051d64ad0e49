//! # Two-Phase Ownership
//!
//! Ownership of a vault changes hands in two steps: the current owner
//! nominates a successor, and the successor accepts. Until acceptance the old
//! owner keeps every privilege and may re-nominate (or nominate nobody, by
//! nominating the zero address). A mistyped nominee therefore can never lock
//! the vault out of its own administration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coffer_core::{Address, InterfaceId, NotOwner, OwnershipGate};

/// Ownership interface as seen through the router.
pub const OWNERSHIP_SIGNATURES: &[&str] = &[
    "owner()",
    "nomineeOwner()",
    "transferOwnership(address)",
    "acceptOwnership()",
];

/// Id of [`OWNERSHIP_SIGNATURES`].
pub fn ownership_interface() -> InterfaceId {
    InterfaceId::from_signatures(OWNERSHIP_SIGNATURES)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ownership handover.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OwnershipError {
    /// Only the current owner may nominate.
    #[error(transparent)]
    NotOwner(#[from] NotOwner),

    /// Only the nominee may accept.
    #[error("caller {caller} is not the nominated owner")]
    NotNominee {
        /// The rejected caller.
        caller: Address,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Emitted when a handover completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransferred {
    pub previous_owner: Address,
    pub new_owner: Address,
    pub at: DateTime<Utc>,
}

/// Owner plus pending nominee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeOwnable {
    owner: Address,
    nominee: Option<Address>,
    history: Vec<OwnershipTransferred>,
}

impl SafeOwnable {
    /// Starts with `owner` in charge and nobody nominated.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            nominee: None,
            history: Vec::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The pending successor, if any.
    pub fn nominee(&self) -> Option<Address> {
        self.nominee
    }

    /// Completed handovers, oldest first.
    pub fn history(&self) -> &[OwnershipTransferred] {
        &self.history
    }

    /// Nominates `new_owner`. Ownership does not move yet.
    ///
    /// Nominating [`Address::ZERO`] clears a pending nomination.
    ///
    /// # Errors
    ///
    /// [`OwnershipError::NotOwner`] unless `caller` is the owner.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), OwnershipError> {
        self.require_owner(caller)?;
        self.nominee = (!new_owner.is_zero()).then_some(new_owner);
        tracing::info!(owner = %self.owner, nominee = %new_owner, "ownership nominated");
        Ok(())
    }

    /// Completes the handover to the nominee.
    ///
    /// # Errors
    ///
    /// [`OwnershipError::NotNominee`] unless `caller` is the nominee.
    pub fn accept_ownership(&mut self, caller: Address) -> Result<OwnershipTransferred, OwnershipError> {
        if self.nominee != Some(caller) {
            return Err(OwnershipError::NotNominee { caller });
        }

        let record = OwnershipTransferred {
            previous_owner: self.owner,
            new_owner: caller,
            at: Utc::now(),
        };
        self.owner = caller;
        self.nominee = None;
        self.history.push(record.clone());
        tracing::info!(
            previous = %record.previous_owner,
            owner = %record.new_owner,
            "ownership transferred"
        );
        Ok(record)
    }
}

impl OwnershipGate for SafeOwnable {
    fn require_owner(&self, caller: Address) -> Result<(), NotOwner> {
        self.owner.require_owner(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_label("owner")
    }

    fn nominee() -> Address {
        Address::from_label("nominee")
    }

    fn stranger() -> Address {
        Address::from_label("stranger")
    }

    #[test]
    fn nomination_does_not_move_ownership() {
        let mut ownable = SafeOwnable::new(owner());
        ownable.transfer_ownership(owner(), nominee()).unwrap();

        assert_eq!(ownable.owner(), owner());
        assert_eq!(ownable.nominee(), Some(nominee()));
        assert!(ownable.require_owner(owner()).is_ok());
        assert!(ownable.require_owner(nominee()).is_err());
    }

    #[test]
    fn acceptance_completes_handover() {
        let mut ownable = SafeOwnable::new(owner());
        ownable.transfer_ownership(owner(), nominee()).unwrap();
        let record = ownable.accept_ownership(nominee()).unwrap();

        assert_eq!(record.previous_owner, owner());
        assert_eq!(record.new_owner, nominee());
        assert_eq!(ownable.owner(), nominee());
        assert_eq!(ownable.nominee(), None);
        assert_eq!(ownable.history().len(), 1);
        assert!(ownable.require_owner(owner()).is_err());
    }

    #[test]
    fn only_owner_nominates() {
        let mut ownable = SafeOwnable::new(owner());
        assert_eq!(
            ownable.transfer_ownership(stranger(), stranger()),
            Err(OwnershipError::NotOwner(NotOwner { caller: stranger() }))
        );
        assert_eq!(ownable.nominee(), None);
    }

    #[test]
    fn only_nominee_accepts() {
        let mut ownable = SafeOwnable::new(owner());
        ownable.transfer_ownership(owner(), nominee()).unwrap();

        assert_eq!(
            ownable.accept_ownership(stranger()),
            Err(OwnershipError::NotNominee { caller: stranger() })
        );
        // The owner cannot shortcut its own nomination either.
        assert!(ownable.accept_ownership(owner()).is_err());
        assert_eq!(ownable.owner(), owner());
    }

    #[test]
    fn nominating_zero_clears_pending() {
        let mut ownable = SafeOwnable::new(owner());
        ownable.transfer_ownership(owner(), nominee()).unwrap();
        ownable.transfer_ownership(owner(), Address::ZERO).unwrap();

        assert_eq!(ownable.nominee(), None);
        assert!(ownable.accept_ownership(nominee()).is_err());
    }
}
