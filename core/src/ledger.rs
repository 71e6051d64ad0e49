//! # Share Ledger
//!
//! Balances, allowances, and total supply for one fungible unit, plus the
//! append-only event log that records every change.
//!
//! ## Invariants
//!
//! - `sum(balances) == total_supply` after every call, successful or not.
//! - Zero balances and zero allowances are not stored. Absence and zero are
//!   the same thing.
//! - An allowance equal to [`UNLIMITED_ALLOWANCE`] is never decremented.
//!
//! ## Atomicity
//!
//! Single primitives check everything before the first write, so a failed
//! call changes nothing. Callers composing several primitives (the vault)
//! open a [`Checkpoint`]: while one is open every write records the value it
//! replaced, and [`Checkpoint::rollback`] replays those records backwards and
//! truncates the event log. Checkpoints nest.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::config::UNLIMITED_ALLOWANCE;
use crate::events::Event;
use crate::introspection::{InterfaceId, SupportsInterface};
use crate::Amount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A balance, the total supply, or an allowance would exceed `u64::MAX`.
    #[error("amount overflow in {operation}: result exceeds u64::MAX")]
    Overflow {
        /// The primitive that overflowed.
        operation: &'static str,
    },

    /// The account holds less than the requested amount.
    #[error("insufficient balance: {account} has {available}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its current balance.
        available: Amount,
        /// Amount the caller tried to move or burn.
        requested: Amount,
    },

    /// The spender's allowance does not cover the requested amount.
    #[error(
        "insufficient allowance: {spender} may move {available} from {owner}, requested {requested}"
    )]
    InsufficientAllowance {
        /// Account whose funds are being spent.
        owner: Address,
        /// Account doing the spending.
        spender: Address,
        /// Current allowance.
        available: Amount,
        /// Amount the spender tried to move.
        requested: Amount,
    },

    /// The sentinel zero address cannot hold balances or allowances.
    #[error("{operation} involving the zero address")]
    ZeroAddress {
        /// The primitive that was called.
        operation: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// All-or-nothing scoping for multi-step mutations.
///
/// Every `begin` must be matched by exactly one `commit` or `rollback`.
/// Nested scopes are allowed; committing an inner scope folds its changes
/// into the outer one, so an outer rollback still undoes them.
pub trait Checkpoint {
    /// Opens a new scope.
    fn begin(&mut self);
    /// Keeps everything written since the matching `begin`.
    fn commit(&mut self);
    /// Undoes everything written since the matching `begin`.
    fn rollback(&mut self);
}

/// The external asset as seen by a vault.
///
/// A ledger of the same shape as [`Ledger`], owned by someone else. The
/// vault only ever reads balances and asks for transfers; it relies on
/// [`Checkpoint`] to take a transfer back when a later step fails.
pub trait AssetLedger: Checkpoint {
    /// Why a transfer was refused.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current balance of `account`.
    fn balance_of(&self, account: Address) -> Amount;

    /// Moves `amount` from `sender` to `to`, acting as `sender`.
    fn transfer(&mut self, sender: Address, to: Address, amount: Amount)
        -> Result<(), Self::Error>;

    /// Moves `amount` from `from` to `to` on `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        account: Address,
        previous: Amount,
    },
    Allowance {
        owner: Address,
        spender: Address,
        previous: Amount,
    },
    Supply(Amount),
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    journal_len: usize,
    events_len: usize,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Balance, allowance, and supply bookkeeping for one fungible unit.
///
/// The ledger is a plain owned value: pass it by `&mut` to mutate it. It is
/// not `Sync`-shared internally; serialization of callers is the owner's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Non-zero balances keyed by holder.
    balances: HashMap<Address, Amount>,
    /// Non-zero allowances: `owner -> (spender -> amount)`.
    allowances: HashMap<Address, HashMap<Address, Amount>>,
    /// Sum of all balances.
    total_supply: Amount,
    /// Append-only notification log.
    events: Vec<Event>,
    #[serde(skip)]
    journal: Vec<JournalEntry>,
    #[serde(skip)]
    frames: Vec<Frame>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // -- reads --------------------------------------------------------------

    /// Balance of `account`; zero if it never held anything.
    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Amount `spender` may still move out of `owner`'s balance.
    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&owner)
            .and_then(|by_spender| by_spender.get(&spender))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// All holders with a non-zero balance, ordered by address.
    pub fn accounts(&self) -> Vec<(Address, Amount)> {
        let mut holders: Vec<_> = self.balances.iter().map(|(a, b)| (*a, *b)).collect();
        holders.sort_unstable_by_key(|(address, _)| *address);
        holders
    }

    /// The full event log, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events appended at or after position `from`.
    pub fn events_since(&self, from: usize) -> &[Event] {
        self.events.get(from..).unwrap_or(&[])
    }

    /// Returns `true` while a checkpoint is open.
    pub fn in_checkpoint(&self) -> bool {
        !self.frames.is_empty()
    }

    // -- primitives ---------------------------------------------------------

    /// Creates `amount` new units in `account`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAddress`] when minting to the sentinel account.
    /// [`LedgerError::Overflow`] when the supply or the balance would exceed
    /// `u64::MAX`.
    pub fn mint(&mut self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        if account.is_zero() {
            return Err(LedgerError::ZeroAddress { operation: "mint" });
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { operation: "mint" })?;
        let balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { operation: "mint" })?;

        self.write_supply(supply);
        self.write_balance(account, balance);
        self.emit(Event::Transfer {
            from: Address::ZERO,
            to: account,
            amount,
        });
        Ok(())
    }

    /// Destroys `amount` units held by `account`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] if the account holds less.
    pub fn burn(&mut self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        if account.is_zero() {
            return Err(LedgerError::ZeroAddress { operation: "burn" });
        }
        let available = self.balance_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account,
                available,
                requested: amount,
            });
        }

        self.write_balance(account, available - amount);
        self.write_supply(self.total_supply - amount);
        self.emit(Event::Transfer {
            from: account,
            to: Address::ZERO,
            amount,
        });
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// A self-transfer checks the balance and emits the event but leaves the
    /// balance untouched.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] if `from` holds less than
    /// `amount`. [`LedgerError::ZeroAddress`] if either side is the sentinel.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        let (from_balance, to_balance) = self.check_transfer(from, to, amount)?;
        self.apply_transfer(from, to, amount, from_balance, to_balance);
        Ok(())
    }

    /// Sets `owner`'s allowance for `spender` to exactly `amount`.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<(), LedgerError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(LedgerError::ZeroAddress { operation: "approve" });
        }
        self.write_allowance(owner, spender, amount);
        self.emit(Event::Approval {
            owner,
            spender,
            amount,
        });
        Ok(())
    }

    /// Raises an allowance by `added`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if the new allowance would exceed
    /// `u64::MAX`.
    pub fn increase_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        added: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.allowance(owner, spender);
        let next = current.checked_add(added).ok_or(LedgerError::Overflow {
            operation: "increase_allowance",
        })?;
        self.approve(owner, spender, next)
    }

    /// Lowers an allowance by `subtracted`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientAllowance`] if the allowance is smaller
    /// than `subtracted`.
    pub fn decrease_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        subtracted: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.allowance(owner, spender);
        if current < subtracted {
            return Err(LedgerError::InsufficientAllowance {
                owner,
                spender,
                available: current,
                requested: subtracted,
            });
        }
        self.approve(owner, spender, current - subtracted)
    }

    /// Consumes `amount` of `spender`'s allowance over `owner`.
    ///
    /// Unlimited allowances are left as they are. A finite allowance is
    /// lowered and an `Approval` event records the new value.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.check_allowance(owner, spender, amount)?;
        self.apply_spend(owner, spender, amount, current);
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientAllowance`] if the allowance is finite and
    /// too small; [`LedgerError::InsufficientBalance`] per
    /// [`transfer`](Self::transfer). Either way nothing changes.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let current = self.check_allowance(from, spender, amount)?;
        let (from_balance, to_balance) = self.check_transfer(from, to, amount)?;

        self.apply_spend(from, spender, amount, current);
        self.apply_transfer(from, to, amount, from_balance, to_balance);
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn check_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        let current = self.allowance(owner, spender);
        if current != UNLIMITED_ALLOWANCE && current < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner,
                spender,
                available: current,
                requested: amount,
            });
        }
        Ok(current)
    }

    fn apply_spend(&mut self, owner: Address, spender: Address, amount: Amount, current: Amount) {
        if current == UNLIMITED_ALLOWANCE {
            return;
        }
        let remaining = current - amount;
        self.write_allowance(owner, spender, remaining);
        self.emit(Event::Approval {
            owner,
            spender,
            amount: remaining,
        });
    }

    fn check_transfer(
        &self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(Amount, Amount), LedgerError> {
        if from.is_zero() || to.is_zero() {
            return Err(LedgerError::ZeroAddress { operation: "transfer" });
        }
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                available: from_balance,
                requested: amount,
            });
        }
        let to_balance = if from == to {
            from_balance
        } else {
            self.balance_of(to)
                .checked_add(amount)
                .ok_or(LedgerError::Overflow { operation: "transfer" })?
        };
        Ok((from_balance, to_balance))
    }

    fn apply_transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
        from_balance: Amount,
        to_balance: Amount,
    ) {
        if from != to {
            self.write_balance(from, from_balance - amount);
            self.write_balance(to, to_balance);
        }
        self.emit(Event::Transfer { from, to, amount });
    }

    fn write_balance(&mut self, account: Address, value: Amount) {
        let previous = if value == 0 {
            self.balances.remove(&account)
        } else {
            self.balances.insert(account, value)
        };
        if self.in_checkpoint() {
            self.journal.push(JournalEntry::Balance {
                account,
                previous: previous.unwrap_or(0),
            });
        }
    }

    fn write_allowance(&mut self, owner: Address, spender: Address, value: Amount) {
        let previous = if value == 0 {
            let by_spender = self.allowances.get_mut(&owner);
            let previous = by_spender.and_then(|m| m.remove(&spender));
            if self.allowances.get(&owner).is_some_and(|m| m.is_empty()) {
                self.allowances.remove(&owner);
            }
            previous
        } else {
            self.allowances.entry(owner).or_default().insert(spender, value)
        };
        if self.in_checkpoint() {
            self.journal.push(JournalEntry::Allowance {
                owner,
                spender,
                previous: previous.unwrap_or(0),
            });
        }
    }

    fn write_supply(&mut self, value: Amount) {
        let previous = std::mem::replace(&mut self.total_supply, value);
        if self.in_checkpoint() {
            self.journal.push(JournalEntry::Supply(previous));
        }
    }

    /// Appends a record to the log. The vault uses this for its own events
    /// so they roll back with the ledger writes they describe.
    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

impl Checkpoint for Ledger {
    fn begin(&mut self) {
        self.frames.push(Frame {
            journal_len: self.journal.len(),
            events_len: self.events.len(),
        });
    }

    fn commit(&mut self) {
        if self.frames.pop().is_none() {
            tracing::warn!("ledger commit without an open checkpoint");
        }
        if self.frames.is_empty() {
            self.journal.clear();
        }
    }

    fn rollback(&mut self) {
        let Some(frame) = self.frames.pop() else {
            tracing::warn!("ledger rollback without an open checkpoint");
            return;
        };

        // Frames stay pushed below us, so restore writes without journaling.
        let undo = self.journal.split_off(frame.journal_len);
        for entry in undo.into_iter().rev() {
            match entry {
                JournalEntry::Balance { account, previous } => {
                    if previous == 0 {
                        self.balances.remove(&account);
                    } else {
                        self.balances.insert(account, previous);
                    }
                }
                JournalEntry::Allowance {
                    owner,
                    spender,
                    previous,
                } => {
                    if previous == 0 {
                        if let Some(by_spender) = self.allowances.get_mut(&owner) {
                            by_spender.remove(&spender);
                            if by_spender.is_empty() {
                                self.allowances.remove(&owner);
                            }
                        }
                    } else {
                        self.allowances.entry(owner).or_default().insert(spender, previous);
                    }
                }
                JournalEntry::Supply(previous) => self.total_supply = previous,
            }
        }
        self.events.truncate(frame.events_len);
    }
}

impl AssetLedger for Ledger {
    type Error = LedgerError;

    fn balance_of(&self, account: Address) -> Amount {
        Ledger::balance_of(self, account)
    }

    fn transfer(&mut self, sender: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        Ledger::transfer(self, sender, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        Ledger::transfer_from(self, spender, from, to, amount)
    }
}

impl SupportsInterface for Ledger {
    fn supported_interfaces(&self) -> Vec<InterfaceId> {
        vec![InterfaceId::ledger()]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    fn carol() -> Address {
        Address::from_label("carol")
    }

    fn sum_of_balances(ledger: &Ledger) -> u128 {
        ledger.accounts().iter().map(|(_, b)| *b as u128).sum()
    }

    #[test]
    fn mint_increases_supply_and_balance() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 1_000).unwrap();

        assert_eq!(ledger.total_supply(), 1_000);
        assert_eq!(ledger.balance_of(alice()), 1_000);
        assert_eq!(
            ledger.events(),
            &[Event::Transfer {
                from: Address::ZERO,
                to: alice(),
                amount: 1_000
            }]
        );
    }

    #[test]
    fn mint_overflow_rejected_without_side_effects() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), u64::MAX).unwrap();

        let result = ledger.mint(bob(), 1);
        assert_eq!(result, Err(LedgerError::Overflow { operation: "mint" }));
        assert_eq!(ledger.total_supply(), u64::MAX);
        assert_eq!(ledger.balance_of(bob()), 0);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn mint_to_zero_address_rejected() {
        let mut ledger = Ledger::new();
        assert!(matches!(
            ledger.mint(Address::ZERO, 5),
            Err(LedgerError::ZeroAddress { .. })
        ));
    }

    #[test]
    fn burn_decreases_supply_and_balance() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 1_000).unwrap();
        ledger.burn(alice(), 400).unwrap();

        assert_eq!(ledger.total_supply(), 600);
        assert_eq!(ledger.balance_of(alice()), 600);
        assert_eq!(ledger.events().last().unwrap().name(), "burn");
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 100).unwrap();

        let result = ledger.burn(alice(), 200);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientBalance {
                account: alice(),
                available: 100,
                requested: 200
            })
        );
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn burn_to_zero_prunes_holder() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 10).unwrap();
        ledger.burn(alice(), 10).unwrap();
        assert!(ledger.accounts().is_empty());
    }

    #[test]
    fn transfer_moves_amount() {
        let mut ledger = Ledger::new();
        ledger.mint(bob(), 2).unwrap();
        ledger.transfer(bob(), alice(), 2).unwrap();

        assert_eq!(ledger.balance_of(alice()), 2);
        assert_eq!(ledger.balance_of(bob()), 0);
        assert_eq!(ledger.total_supply(), 2);
    }

    #[test]
    fn self_transfer_keeps_balance() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 50).unwrap();
        ledger.transfer(alice(), alice(), 30).unwrap();

        assert_eq!(ledger.balance_of(alice()), 50);
        assert_eq!(ledger.total_supply(), 50);
    }

    #[test]
    fn self_transfer_still_checks_balance() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 5).unwrap();
        assert!(ledger.transfer(alice(), alice(), 6).is_err());
    }

    #[test]
    fn approve_overwrites() {
        let mut ledger = Ledger::new();
        ledger.approve(alice(), bob(), 2).unwrap();
        ledger.approve(alice(), bob(), 7).unwrap();

        assert_eq!(ledger.allowance(alice(), bob()), 7);
        assert_eq!(
            ledger.events().last(),
            Some(&Event::Approval {
                owner: alice(),
                spender: bob(),
                amount: 7
            })
        );
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 2).unwrap();
        ledger.approve(alice(), bob(), 2).unwrap();
        ledger.transfer_from(bob(), alice(), carol(), 2).unwrap();

        assert_eq!(ledger.balance_of(alice()), 0);
        assert_eq!(ledger.balance_of(bob()), 0);
        assert_eq!(ledger.balance_of(carol()), 2);
        assert_eq!(ledger.allowance(alice(), bob()), 0);
    }

    #[test]
    fn transfer_from_over_allowance_changes_nothing() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 10).unwrap();
        ledger.approve(alice(), bob(), 1).unwrap();
        let events_before = ledger.events().len();

        let result = ledger.transfer_from(bob(), alice(), carol(), 2);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientAllowance {
                owner: alice(),
                spender: bob(),
                available: 1,
                requested: 2
            })
        );
        assert_eq!(ledger.allowance(alice(), bob()), 1);
        assert_eq!(ledger.balance_of(alice()), 10);
        assert_eq!(ledger.balance_of(carol()), 0);
        assert_eq!(ledger.events().len(), events_before);
    }

    #[test]
    fn transfer_from_over_balance_keeps_allowance() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 1).unwrap();
        ledger.approve(alice(), bob(), 5).unwrap();

        let result = ledger.transfer_from(bob(), alice(), carol(), 3);
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(ledger.allowance(alice(), bob()), 5);
    }

    #[test]
    fn unlimited_allowance_never_drains() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 1_000).unwrap();
        ledger.approve(alice(), bob(), UNLIMITED_ALLOWANCE).unwrap();

        for _ in 0..10 {
            ledger.transfer_from(bob(), alice(), carol(), 100).unwrap();
            assert_eq!(ledger.allowance(alice(), bob()), UNLIMITED_ALLOWANCE);
        }
        assert_eq!(ledger.balance_of(carol()), 1_000);
    }

    #[test]
    fn increase_and_decrease_allowance() {
        let mut ledger = Ledger::new();
        ledger.increase_allowance(alice(), bob(), 5).unwrap();
        ledger.increase_allowance(alice(), bob(), 3).unwrap();
        assert_eq!(ledger.allowance(alice(), bob()), 8);

        ledger.decrease_allowance(alice(), bob(), 8).unwrap();
        assert_eq!(ledger.allowance(alice(), bob()), 0);
        assert!(ledger.decrease_allowance(alice(), bob(), 1).is_err());

        ledger.approve(alice(), bob(), u64::MAX - 1).unwrap();
        assert_eq!(
            ledger.increase_allowance(alice(), bob(), 2),
            Err(LedgerError::Overflow {
                operation: "increase_allowance"
            })
        );
    }

    #[test]
    fn conservation_holds_across_mixed_operations() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 500).unwrap();
        ledger.mint(bob(), 300).unwrap();
        ledger.transfer(alice(), carol(), 120).unwrap();
        ledger.burn(bob(), 50).unwrap();
        let _ = ledger.transfer(carol(), bob(), 10_000);
        ledger.transfer(bob(), alice(), 250).unwrap();

        assert_eq!(sum_of_balances(&ledger), ledger.total_supply() as u128);
    }

    #[test]
    fn rollback_restores_balances_supply_and_events() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 100).unwrap();
        ledger.approve(alice(), bob(), 40).unwrap();
        let events_before = ledger.events().len();

        ledger.begin();
        ledger.mint(carol(), 7).unwrap();
        ledger.transfer_from(bob(), alice(), carol(), 40).unwrap();
        ledger.burn(alice(), 60).unwrap();
        ledger.rollback();

        assert_eq!(ledger.balance_of(alice()), 100);
        assert_eq!(ledger.balance_of(carol()), 0);
        assert_eq!(ledger.allowance(alice(), bob()), 40);
        assert_eq!(ledger.total_supply(), 100);
        assert_eq!(ledger.events().len(), events_before);
        assert!(!ledger.in_checkpoint());
    }

    #[test]
    fn nested_commit_is_undone_by_outer_rollback() {
        let mut ledger = Ledger::new();
        ledger.begin();
        ledger.mint(alice(), 10).unwrap();
        ledger.begin();
        ledger.mint(bob(), 5).unwrap();
        ledger.commit();
        ledger.rollback();

        assert_eq!(ledger.total_supply(), 0);
        assert!(ledger.accounts().is_empty());
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn inner_rollback_keeps_outer_writes() {
        let mut ledger = Ledger::new();
        ledger.begin();
        ledger.mint(alice(), 10).unwrap();
        ledger.begin();
        ledger.mint(bob(), 5).unwrap();
        ledger.rollback();
        ledger.commit();

        assert_eq!(ledger.total_supply(), 10);
        assert_eq!(ledger.balance_of(bob()), 0);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn ledger_reports_ledger_interface_only() {
        let ledger = Ledger::new();
        assert!(ledger.supports_interface(InterfaceId::ledger()));
        assert!(ledger.supports_interface(InterfaceId::introspection()));
        assert!(!ledger.supports_interface(InterfaceId::vault()));
    }

    #[test]
    fn serialization_roundtrip_keeps_state() {
        let mut ledger = Ledger::new();
        ledger.mint(alice(), 42).unwrap();
        ledger.approve(alice(), bob(), 3).unwrap();

        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: Ledger = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(recovered.balance_of(alice()), 42);
        assert_eq!(recovered.allowance(alice(), bob()), 3);
        assert_eq!(recovered.total_supply(), 42);
        assert_eq!(recovered.events().len(), 2);
    }
}
