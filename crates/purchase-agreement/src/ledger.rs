//! Funds ledger - balances that back agreement payments
//!
//! The ledger is:
//! - Account-keyed by party, plus one escrow account per agreement
//! - Double-entry (every debit has a matching credit)
//! - Append-only (entries are never rewritten)
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. A transfer applies both sides or neither

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use purchase_types::{AgreementError, AgreementId, Amount, PartyId, Result};

/// A ledger account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountId {
    Party(PartyId),
    /// Holds a buyer's payment until release or refund
    Escrow(AgreementId),
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Party(party) => write!(f, "party:{}", party),
            Self::Escrow(agreement_id) => write!(f, "escrow:{}", agreement_id),
        }
    }
}

impl From<PartyId> for AccountId {
    fn from(party: PartyId) -> Self {
        Self::Party(party)
    }
}

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Credit,
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Funds supplied by the host
    Deposit,
    /// Buyer paid into escrow
    Payment { agreement_id: AgreementId },
    /// Escrow released to the seller
    Release { agreement_id: AgreementId },
    /// Escrow returned to the buyer
    Refund { agreement_id: AgreementId },
}

/// One side of a ledger movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: AccountId,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<AccountId, Amount>,
    entries: Vec<LedgerEntry>,
}

impl LedgerState {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(Amount::zero())
    }

    fn record(
        &mut self,
        account: &AccountId,
        entry_type: EntryType,
        amount: Amount,
        balance_after: Amount,
        reason: EntryReason,
    ) -> EntryId {
        let entry = LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            entry_type,
            amount,
            balance_after,
            reason,
            created_at: Utc::now(),
        };
        let entry_id = entry.entry_id.clone();
        self.balances.insert(account.clone(), balance_after);
        self.entries.push(entry);
        entry_id
    }
}

/// In-memory funds ledger
///
/// Cheap to clone; clones share the same balances.
#[derive(Clone, Default)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.state.read().balance(account)
    }

    /// Credit funds from outside the ledger
    pub fn deposit(&self, account: &AccountId, amount: Amount) -> Result<Amount> {
        require_positive(amount)?;

        let mut state = self.state.write();
        let new_balance = state
            .balance(account)
            .checked_add(amount)
            .ok_or(AgreementError::AmountOverflow)?;
        state.record(
            account,
            EntryType::Credit,
            amount,
            new_balance,
            EntryReason::Deposit,
        );

        debug!(account = %account, amount = amount.0, balance = new_balance.0, "Deposit recorded");
        Ok(new_balance)
    }

    /// Fail unless `account` can cover `amount`
    pub fn ensure_funds(&self, account: &AccountId, amount: Amount) -> Result<()> {
        let available = self.balance(account);
        if available < amount {
            return Err(AgreementError::InsufficientFunds {
                available: available.0,
                required: amount.0,
            });
        }
        Ok(())
    }

    /// Move `amount` between two accounts
    ///
    /// Both balances are computed before either is written, so a failed
    /// transfer leaves the ledger untouched.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<(EntryId, EntryId)> {
        require_positive(amount)?;
        if from == to {
            return Err(AgreementError::InvalidAmount {
                message: format!("Cannot transfer from {} to itself", from),
            });
        }

        let mut state = self.state.write();

        let available = state.balance(from);
        let from_after = available
            .checked_sub(amount)
            .ok_or(AgreementError::InsufficientFunds {
                available: available.0,
                required: amount.0,
            })?;
        let to_after = state
            .balance(to)
            .checked_add(amount)
            .ok_or(AgreementError::AmountOverflow)?;

        let debit = state.record(from, EntryType::Debit, amount, from_after, reason.clone());
        let credit = state.record(to, EntryType::Credit, amount, to_after, reason);

        debug!(
            from = %from,
            to = %to,
            amount = amount.0,
            "Ledger transfer applied"
        );
        Ok((debit, credit))
    }

    /// All entries touching `account`, oldest first
    pub fn account_entries(&self, account: &AccountId) -> Vec<LedgerEntry> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Sum of all balances; constant across transfers
    pub fn total_supply(&self) -> u128 {
        self.state
            .read()
            .balances
            .values()
            .map(|amount| amount.0 as u128)
            .sum()
    }
}

fn require_positive(amount: Amount) -> Result<()> {
    if amount.is_zero() {
        return Err(AgreementError::InvalidAmount {
            message: "Amount must be greater than zero".to_string(),
        });
    }
    Ok(())
}
