//! Ledger state machine
//!
//! [`TokenState`] owns the balance and allowance tables together with the
//! notification log. Every mutating method validates all preconditions
//! before touching any table, so a rejected operation leaves the state and
//! the log exactly as they were.
//!
//! # Invariants
//!
//! - Supply conservation: Σ(balances) == total_supply for all time
//! - No negative quantities: amounts are unsigned, arithmetic is checked
//! - One notification per accepted mutation, appended after the mutation
//! - Zero entries are pruned; an absent key reads as zero

use crate::events::{EventKind, EventLog, LedgerEvent, Operation};
use crate::types::{Address, Amount, TokenMetadata};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Balances, allowances and the notification log of one token
#[derive(Debug, Clone)]
pub struct TokenState {
    metadata: TokenMetadata,
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    log: EventLog,
}

impl TokenState {
    /// Deploy a fresh token, crediting the whole supply to `deployer`
    pub fn deploy(deployer: Address) -> Self {
        let metadata = TokenMetadata::default();
        let mut balances = HashMap::new();
        if !metadata.total_supply.is_zero() {
            balances.insert(deployer, metadata.total_supply);
        }

        Self {
            metadata,
            balances,
            allowances: HashMap::new(),
            log: EventLog::new(),
        }
    }

    /// Move `amount` from `sender` to `recipient`
    pub fn transfer(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<&LedgerEvent> {
        if recipient.is_zero() {
            return Err(Error::InvalidRecipient(recipient));
        }
        self.ensure_balance(sender, amount)?;

        self.move_units(sender, recipient, amount)?;

        Ok(self.log.append(
            Operation::Transfer,
            EventKind::Transfer {
                from: sender,
                to: recipient,
                value: amount,
            },
        ))
    }

    /// Set the allowance of `spender` over `owner`'s balance to `amount`
    ///
    /// The previous allowance is overwritten, not added to. A spender that
    /// sees a pending change can still draw the old allowance first; owners
    /// that care should approve zero before approving a new nonzero value.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<&LedgerEvent> {
        if spender.is_zero() {
            return Err(Error::InvalidSpender(spender));
        }

        set_or_prune(&mut self.allowances, (owner, spender), amount);

        Ok(self.log.append(
            Operation::Approve,
            EventKind::Approval {
                owner,
                spender,
                value: amount,
            },
        ))
    }

    /// Move `amount` from `owner` to `recipient` on behalf of `spender`
    ///
    /// Consumes `amount` of the `(owner, spender)` allowance. Only a
    /// `Transfer` notification is emitted.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<&LedgerEvent> {
        if recipient.is_zero() {
            return Err(Error::InvalidRecipient(recipient));
        }
        self.ensure_balance(owner, amount)?;

        let allowance = self.allowance(owner, spender);
        let remaining = allowance
            .checked_sub(amount)
            .ok_or(Error::InsufficientAllowance {
                owner,
                spender,
                allowance,
                requested: amount,
            })?;

        self.move_units(owner, recipient, amount)?;
        set_or_prune(&mut self.allowances, (owner, spender), remaining);

        Ok(self.log.append(
            Operation::TransferFrom,
            EventKind::Transfer {
                from: owner,
                to: recipient,
                value: amount,
            },
        ))
    }

    /// Balance of `account` (zero if never credited)
    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(Amount::ZERO)
    }

    /// Remaining allowance of `spender` over `owner`'s balance
    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Fixed total supply
    pub fn total_supply(&self) -> Amount {
        self.metadata.total_supply
    }

    /// Token name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Token symbol
    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    /// Decimal places
    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    /// Full metadata
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Notification log
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Accounts holding a nonzero balance
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Check supply conservation
    ///
    /// Recomputes Σ(balances) with checked addition and compares it with
    /// the fixed total supply.
    pub fn check_conservation(&self) -> Result<()> {
        let mut sum = Amount::ZERO;
        for balance in self.balances.values() {
            sum = sum.checked_add(*balance).ok_or_else(|| {
                Error::InvariantViolation("sum of balances overflows".to_string())
            })?;
        }

        if sum != self.metadata.total_supply {
            return Err(Error::InvariantViolation(format!(
                "sum of balances {} != total supply {}",
                sum, self.metadata.total_supply
            )));
        }

        Ok(())
    }

    /// Serializable copy of metadata and tables, ordered by address
    pub fn snapshot(&self) -> StateSnapshot {
        let mut allowances: Vec<AllowanceEntry> = self
            .allowances
            .iter()
            .map(|((owner, spender), value)| AllowanceEntry {
                owner: *owner,
                spender: *spender,
                value: *value,
            })
            .collect();
        allowances.sort_by_key(|entry| (entry.owner, entry.spender));

        StateSnapshot {
            metadata: self.metadata.clone(),
            balances: self.balances.iter().map(|(k, v)| (*k, *v)).collect(),
            allowances,
            last_sequence: self.log.last().map(|e| e.sequence).unwrap_or(0),
        }
    }

    fn ensure_balance(&self, account: Address, amount: Amount) -> Result<()> {
        let balance = self.balance_of(account);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                account,
                balance,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Debit then credit. Callers have already checked the debit.
    fn move_units(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        let debited = self
            .balance_of(from)
            .checked_sub(amount)
            .ok_or_else(|| Error::InvariantViolation(format!("debit of {} underflows", from)))?;
        // Credit is computed against the post-debit table so a self-transfer
        // nets to zero.
        let to_before = if from == to { debited } else { self.balance_of(to) };
        let credited = to_before
            .checked_add(amount)
            .ok_or_else(|| Error::InvariantViolation(format!("credit of {} overflows", to)))?;

        set_or_prune(&mut self.balances, from, debited);
        set_or_prune(&mut self.balances, to, credited);
        Ok(())
    }
}

fn set_or_prune<K: std::hash::Hash + Eq>(table: &mut HashMap<K, Amount>, key: K, value: Amount) {
    if value.is_zero() {
        table.remove(&key);
    } else {
        table.insert(key, value);
    }
}

/// Point-in-time copy of ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Token metadata
    pub metadata: TokenMetadata,

    /// Nonzero balances
    pub balances: BTreeMap<Address, Amount>,

    /// Nonzero allowances
    pub allowances: Vec<AllowanceEntry>,

    /// Sequence of the last notification (0 if none)
    pub last_sequence: u64,
}

/// One allowance table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    /// Balance owner
    pub owner: Address,
    /// Authorized spender
    pub spender: Address,
    /// Remaining allowance
    pub value: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u128) -> Amount {
        Amount::from_tokens(n).unwrap()
    }

    fn accounts() -> (Address, Address, Address) {
        (
            Address::from_low_u64(1),
            Address::from_low_u64(2),
            Address::from_low_u64(3),
        )
    }

    #[test]
    fn test_deploy_credits_deployer() {
        let (deployer, receiver, _) = accounts();
        let state = TokenState::deploy(deployer);

        assert_eq!(state.total_supply(), tokens(1_000_000));
        assert_eq!(state.balance_of(deployer), tokens(1_000_000));
        assert_eq!(state.balance_of(receiver), Amount::ZERO);
        assert_eq!(state.holder_count(), 1);
        assert!(state.log().is_empty());
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_transfer_moves_balance() {
        let (deployer, receiver, _) = accounts();
        let mut state = TokenState::deploy(deployer);

        let event = state.transfer(deployer, receiver, tokens(100)).unwrap().clone();

        assert_eq!(state.balance_of(deployer), tokens(999_900));
        assert_eq!(state.balance_of(receiver), tokens(100));
        assert_eq!(event.operation, Operation::Transfer);
        assert_eq!(
            event.kind,
            EventKind::Transfer {
                from: deployer,
                to: receiver,
                value: tokens(100),
            }
        );
        assert_eq!(state.log().len(), 1);
    }

    #[test]
    fn test_transfer_rejects_zero_recipient_before_balance() {
        let (_, receiver, _) = accounts();
        let mut state = TokenState::deploy(Address::from_low_u64(1));

        // receiver has nothing, yet the recipient check wins
        let err = state
            .transfer(receiver, Address::ZERO, tokens(10))
            .unwrap_err();
        assert_eq!(err, Error::InvalidRecipient(Address::ZERO));
        assert!(state.log().is_empty());
    }

    #[test]
    fn test_transfer_rejects_insufficient_balance() {
        let (deployer, receiver, _) = accounts();
        let mut state = TokenState::deploy(deployer);

        let err = state
            .transfer(deployer, receiver, tokens(100_000_000))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));

        let err = state.transfer(receiver, deployer, tokens(10)).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientBalance {
                account: receiver,
                balance: Amount::ZERO,
                requested: tokens(10),
            }
        );

        assert_eq!(state.balance_of(deployer), tokens(1_000_000));
        assert!(state.log().is_empty());
    }

    #[test]
    fn test_self_transfer_keeps_balance() {
        let (deployer, _, _) = accounts();
        let mut state = TokenState::deploy(deployer);

        state.transfer(deployer, deployer, tokens(5)).unwrap();
        assert_eq!(state.balance_of(deployer), tokens(1_000_000));
        assert_eq!(state.log().len(), 1);
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_zero_transfer_emits_event() {
        let (deployer, receiver, _) = accounts();
        let mut state = TokenState::deploy(deployer);

        state.transfer(deployer, receiver, Amount::ZERO).unwrap();
        assert_eq!(state.balance_of(receiver), Amount::ZERO);
        assert_eq!(state.holder_count(), 1);
        assert_eq!(state.log().len(), 1);
    }

    #[test]
    fn test_full_balance_transfer_prunes_sender() {
        let (deployer, receiver, _) = accounts();
        let mut state = TokenState::deploy(deployer);

        state
            .transfer(deployer, receiver, tokens(1_000_000))
            .unwrap();
        assert_eq!(state.balance_of(deployer), Amount::ZERO);
        assert_eq!(state.holder_count(), 1);
        assert!(state.snapshot().balances.get(&deployer).is_none());
    }

    #[test]
    fn test_approve_overwrites() {
        let (deployer, _, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);

        state.approve(deployer, exchange, tokens(100)).unwrap();
        assert_eq!(state.allowance(deployer, exchange), tokens(100));

        let event = state.approve(deployer, exchange, tokens(40)).unwrap().clone();
        assert_eq!(state.allowance(deployer, exchange), tokens(40));
        assert_eq!(event.operation, Operation::Approve);
        assert_eq!(
            event.kind,
            EventKind::Approval {
                owner: deployer,
                spender: exchange,
                value: tokens(40),
            }
        );
    }

    #[test]
    fn test_approve_rejects_zero_spender() {
        let (deployer, _, _) = accounts();
        let mut state = TokenState::deploy(deployer);

        let err = state.approve(deployer, Address::ZERO, tokens(100)).unwrap_err();
        assert_eq!(err, Error::InvalidSpender(Address::ZERO));
        assert!(state.log().is_empty());
    }

    #[test]
    fn test_approve_may_exceed_balance() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);

        state.approve(receiver, exchange, tokens(50)).unwrap();
        assert_eq!(state.allowance(receiver, exchange), tokens(50));

        let err = state
            .transfer_from(exchange, receiver, deployer, tokens(1))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.approve(deployer, exchange, tokens(100)).unwrap();

        let event = state
            .transfer_from(exchange, deployer, receiver, tokens(100))
            .unwrap()
            .clone();

        assert_eq!(state.balance_of(deployer), tokens(999_900));
        assert_eq!(state.balance_of(receiver), tokens(100));
        assert_eq!(state.allowance(deployer, exchange), Amount::ZERO);
        assert_eq!(event.operation, Operation::TransferFrom);
        assert_eq!(
            event.kind,
            EventKind::Transfer {
                from: deployer,
                to: receiver,
                value: tokens(100),
            }
        );
        // approve + transfer_from, no extra Approval for the decrement
        assert_eq!(state.log().len(), 2);
    }

    #[test]
    fn test_transfer_from_partial_allowance() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.approve(deployer, exchange, tokens(100)).unwrap();

        state
            .transfer_from(exchange, deployer, receiver, tokens(30))
            .unwrap();
        assert_eq!(state.allowance(deployer, exchange), tokens(70));
    }

    #[test]
    fn test_transfer_from_rejects_over_allowance() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.approve(deployer, exchange, tokens(100)).unwrap();

        let err = state
            .transfer_from(exchange, deployer, receiver, tokens(101))
            .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientAllowance {
                owner: deployer,
                spender: exchange,
                allowance: tokens(100),
                requested: tokens(101),
            }
        );
        assert_eq!(state.balance_of(deployer), tokens(1_000_000));
        assert_eq!(state.allowance(deployer, exchange), tokens(100));
        assert_eq!(state.log().len(), 1);
    }

    #[test]
    fn test_transfer_from_checks_balance_before_allowance() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.approve(deployer, exchange, tokens(100)).unwrap();

        let err = state
            .transfer_from(exchange, deployer, receiver, tokens(100_000_000))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
    }

    #[test]
    fn test_transfer_from_rejects_zero_recipient() {
        let (deployer, _, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.approve(deployer, exchange, tokens(100)).unwrap();

        let err = state
            .transfer_from(exchange, deployer, Address::ZERO, tokens(100))
            .unwrap_err();
        assert_eq!(err, Error::InvalidRecipient(Address::ZERO));
        assert_eq!(state.allowance(deployer, exchange), tokens(100));
    }

    #[test]
    fn test_allowance_is_per_spender() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.approve(deployer, exchange, tokens(100)).unwrap();

        let err = state
            .transfer_from(receiver, deployer, receiver, tokens(1))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_snapshot_lists_tables() {
        let (deployer, receiver, exchange) = accounts();
        let mut state = TokenState::deploy(deployer);
        state.transfer(deployer, receiver, tokens(1)).unwrap();
        state.approve(deployer, exchange, tokens(2)).unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.balances.len(), 2);
        assert_eq!(
            snapshot.allowances,
            vec![AllowanceEntry {
                owner: deployer,
                spender: exchange,
                value: tokens(2),
            }]
        );
        assert_eq!(snapshot.last_sequence, 2);
    }
}
