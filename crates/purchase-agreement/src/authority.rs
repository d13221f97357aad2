//! Agreement Authority - hosts agreements and commits transitions
//!
//! The authority owns every agreement record. Sellers and buyers only hold
//! handles; all mutation goes through the validator and the state machine.
//!
//! # Commit protocol
//!
//! Each agreement sits behind its own mutex, so transitions on one
//! agreement are applied one at a time while different agreements never
//! contend. Under that lock:
//!
//! 1. Validate guards
//! 2. Compute the next record
//! 3. Hash the next record for the journal
//! 4. Settle funds (atomic in the ledger)
//! 5. Write the record and chain the journal entry
//!
//! Any failure before step 5 leaves the record, the ledger and the journal
//! exactly as they were.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use purchase_types::{
    Agreement, AgreementError, AgreementId, AgreementSnapshot, AgreementStatus, Amount, ItemId,
    OfferTerms, Operation, OperationKind, PartyId, Result, Timestamp,
};

use crate::config::{AuthorityConfig, SettlementMode};
use crate::journal::{self, Journal, JournalEntry, JournalRecord};
use crate::ledger::{AccountId, EntryReason, Ledger};
use crate::machine::{self, Effect};
use crate::validator::TransitionValidator;

/// What a committed transition did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub agreement_id: AgreementId,
    pub operation: OperationKind,
    pub from: Option<AgreementStatus>,
    pub to: AgreementStatus,
    pub effect: Effect,
    pub journal_sequence: u64,
    pub journal_hash: String,
}

impl TransitionReceipt {
    fn from_entry(entry: &JournalEntry) -> Self {
        Self {
            agreement_id: entry.agreement_id.clone(),
            operation: entry.operation,
            from: entry.from,
            to: entry.to,
            effect: entry.effect.clone(),
            journal_sequence: entry.sequence,
            journal_hash: entry.hash.clone(),
        }
    }
}

type Slot = Arc<Mutex<Agreement>>;

/// In-memory authority serializing transitions per agreement
pub struct AgreementAuthority {
    config: AuthorityConfig,
    validator: TransitionValidator,
    agreements: RwLock<HashMap<AgreementId, Slot>>,
    ledger: Ledger,
    journal: Journal,
}

impl AgreementAuthority {
    pub fn new(config: AuthorityConfig) -> Self {
        Self::with_ledger(config, Ledger::new())
    }

    /// Create an authority that settles against an existing ledger
    pub fn with_ledger(config: AuthorityConfig, ledger: Ledger) -> Self {
        let validator = TransitionValidator::new(config.limits);
        Self {
            config,
            validator,
            agreements: RwLock::new(HashMap::new()),
            ledger,
            journal: Journal::new(),
        }
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Post a new offer on behalf of `seller`
    pub fn initialize_agreement(
        &self,
        seller: &PartyId,
        item_id: ItemId,
        item_name: impl Into<String>,
        price: i64,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<AgreementId> {
        let terms = OfferTerms {
            seller: seller.clone(),
            item_id,
            item_name: item_name.into(),
            price,
            start_time,
            end_time,
        };
        self.initialize(seller, terms)
    }

    /// Post a new offer; `caller` must be the seller named in `terms`
    pub fn initialize(&self, caller: &PartyId, terms: OfferTerms) -> Result<AgreementId> {
        // Initialization is not time-gated; the window start stands in for `now`
        let operation = Operation::Initialize(terms.clone());
        if let Err(err) = self
            .validator
            .validate(None, &operation, caller, terms.start_time)
        {
            warn!(
                operation = %OperationKind::InitializeAgreement,
                caller = %caller,
                item_id = %terms.item_id,
                error = %err,
                "Offer rejected"
            );
            return Err(err);
        }

        let agreement = machine::create(&terms)?;
        let snapshot_hash = journal::snapshot_hash(&agreement)?;
        let agreement_id = AgreementId::new();

        let mut agreements = self.agreements.write();
        let entry = self.journal.append(JournalRecord {
            agreement_id: agreement_id.clone(),
            operation: OperationKind::InitializeAgreement,
            caller: caller.clone(),
            now: None,
            from: None,
            to: agreement.status,
            effect: Effect::None,
            snapshot_hash,
        });

        info!(
            agreement_id = %agreement_id,
            seller = %agreement.seller,
            item_id = %agreement.item_id,
            price = agreement.price.0,
            start_time = agreement.start_time.as_secs(),
            end_time = agreement.end_time.as_secs(),
            journal_sequence = entry.sequence,
            "Agreement initialized"
        );

        agreements.insert(agreement_id.clone(), Arc::new(Mutex::new(agreement)));
        Ok(agreement_id)
    }

    /// Pay for the offer; `buyer` becomes the agreement's buyer
    pub fn make_payment(
        &self,
        agreement_id: &AgreementId,
        buyer: &PartyId,
        now: Timestamp,
    ) -> Result<TransitionReceipt> {
        self.execute(agreement_id, Operation::MakePayment, buyer, now)
    }

    /// Seller confirms the item was handed over
    pub fn confirm_transfer(
        &self,
        agreement_id: &AgreementId,
        seller: &PartyId,
        now: Timestamp,
    ) -> Result<TransitionReceipt> {
        self.execute(agreement_id, Operation::ConfirmTransfer, seller, now)
    }

    /// Cancel after expiry, or ask for (or complete) a mutual cancellation
    pub fn cancel(
        &self,
        agreement_id: &AgreementId,
        caller: &PartyId,
        now: Timestamp,
    ) -> Result<TransitionReceipt> {
        self.execute(agreement_id, Operation::Cancel, caller, now)
    }

    fn execute(
        &self,
        agreement_id: &AgreementId,
        operation: Operation,
        caller: &PartyId,
        now: Timestamp,
    ) -> Result<TransitionReceipt> {
        let slot = self.slot(agreement_id)?;
        let mut agreement = slot.lock();

        if let Err(err) = self
            .validator
            .validate(Some(&*agreement), &operation, caller, now)
        {
            warn!(
                agreement_id = %agreement_id,
                operation = %operation.kind(),
                caller = %caller,
                status = %agreement.status,
                now = now.as_secs(),
                error = %err,
                "Transition rejected"
            );
            return Err(err);
        }

        let transition = machine::apply(&agreement, &operation, caller, now)?;
        let snapshot_hash = journal::snapshot_hash(&transition.next)?;

        if let Err(err) = self.settle(agreement_id, &transition.effect) {
            warn!(
                agreement_id = %agreement_id,
                operation = %operation.kind(),
                caller = %caller,
                error = %err,
                "Settlement failed, transition not committed"
            );
            return Err(err);
        }

        let entry = self.journal.append(JournalRecord {
            agreement_id: agreement_id.clone(),
            operation: operation.kind(),
            caller: caller.clone(),
            now: Some(now),
            from: Some(transition.from),
            to: transition.to,
            effect: transition.effect.clone(),
            snapshot_hash,
        });
        *agreement = transition.next;

        info!(
            agreement_id = %agreement_id,
            operation = %entry.operation,
            caller = %caller,
            from = %transition.from,
            to = %transition.to,
            journal_sequence = entry.sequence,
            "Transition committed"
        );

        Ok(TransitionReceipt::from_entry(&entry))
    }

    fn settle(&self, agreement_id: &AgreementId, effect: &Effect) -> Result<()> {
        let escrow = AccountId::Escrow(agreement_id.clone());

        let (from, to, amount, reason) = match effect {
            Effect::Payment { from, amount } => (
                AccountId::Party(from.clone()),
                escrow,
                *amount,
                EntryReason::Payment {
                    agreement_id: agreement_id.clone(),
                },
            ),
            Effect::Release { to, amount } => (
                escrow,
                AccountId::Party(to.clone()),
                *amount,
                EntryReason::Release {
                    agreement_id: agreement_id.clone(),
                },
            ),
            Effect::Refund { to, amount } => (
                escrow,
                AccountId::Party(to.clone()),
                *amount,
                EntryReason::Refund {
                    agreement_id: agreement_id.clone(),
                },
            ),
            Effect::None | Effect::CancelConsentRecorded { .. } => return Ok(()),
        };

        if amount.is_zero() {
            return Ok(());
        }

        match self.config.settlement {
            SettlementMode::Ledger => {
                self.ledger.transfer(&from, &to, amount, reason)?;
            }
            // Only a buyer's payment is checked; escrow is never funded here
            SettlementMode::Check if matches!(effect, Effect::Payment { .. }) => {
                self.ledger.ensure_funds(&from, amount)?;
            }
            SettlementMode::Check | SettlementMode::Off => {}
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Read-only view of an agreement
    pub fn get_state(&self, agreement_id: &AgreementId) -> Result<AgreementSnapshot> {
        let slot = self.slot(agreement_id)?;
        let agreement = slot.lock().clone();
        Ok(AgreementSnapshot::new(agreement_id.clone(), agreement))
    }

    pub fn agreement_ids(&self) -> Vec<AgreementId> {
        let mut ids: Vec<AgreementId> = self.agreements.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn agreement_count(&self) -> usize {
        self.agreements.read().len()
    }

    /// Journal entries for one agreement, oldest first
    pub fn history(&self, agreement_id: &AgreementId) -> Vec<JournalEntry> {
        self.journal.entries_for(agreement_id)
    }

    /// Verify the journal chain, then that every live record still hashes
    /// to its latest journal entry
    pub fn verify_journal(&self) -> Result<()> {
        self.journal.verify_chain()?;

        let slots: Vec<(AgreementId, Slot)> = self
            .agreements
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        for (agreement_id, slot) in slots {
            let agreement = slot.lock();
            let latest = self.journal.entries_for(&agreement_id).pop().ok_or(
                AgreementError::RecordMismatch {
                    agreement_id: agreement_id.clone(),
                    sequence: 0,
                },
            )?;
            if journal::snapshot_hash(&agreement)? != latest.snapshot_hash {
                return Err(AgreementError::RecordMismatch {
                    agreement_id,
                    sequence: latest.sequence,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Funds
    // ========================================================================

    /// Credit a party's ledger account
    pub fn deposit(&self, party: &PartyId, amount: Amount) -> Result<Amount> {
        self.ledger.deposit(&AccountId::Party(party.clone()), amount)
    }

    pub fn balance(&self, party: &PartyId) -> Amount {
        self.ledger.balance(&AccountId::Party(party.clone()))
    }

    /// Funds currently held for an agreement
    pub fn escrow_balance(&self, agreement_id: &AgreementId) -> Amount {
        self.ledger
            .balance(&AccountId::Escrow(agreement_id.clone()))
    }

    fn slot(&self, agreement_id: &AgreementId) -> Result<Slot> {
        self.agreements
            .read()
            .get(agreement_id)
            .cloned()
            .ok_or_else(|| AgreementError::AgreementNotFound {
                agreement_id: agreement_id.clone(),
            })
    }
}

impl Default for AgreementAuthority {
    fn default() -> Self {
        Self::new(AuthorityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000;

    fn seller() -> PartyId {
        PartyId::new("seller")
    }

    fn buyer() -> PartyId {
        PartyId::new("buyer")
    }

    fn post_mug(authority: &AgreementAuthority) -> AgreementId {
        authority
            .initialize_agreement(
                &seller(),
                ItemId::new("6nzTzVZAVq4E5iuPMhcir8ESF9dLjCDgRV7yRgkU8Vbz"),
                "Mug",
                10,
                Timestamp(T),
                Timestamp(T + 3600),
            )
            .unwrap()
    }

    #[test]
    fn test_initialize_journals_creation() {
        let authority = AgreementAuthority::default();
        let id = post_mug(&authority);

        let history = authority.history(&id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operation, OperationKind::InitializeAgreement);
        assert_eq!(history[0].from, None);
        assert_eq!(history[0].now, None);
        assert_eq!(authority.agreement_count(), 1);
    }

    #[test]
    fn test_rejected_offer_not_registered() {
        let authority = AgreementAuthority::default();
        let result = authority.initialize_agreement(
            &seller(),
            ItemId::new("item"),
            "Mug",
            -10,
            Timestamp(T),
            Timestamp(T + 3600),
        );
        assert!(matches!(
            result,
            Err(AgreementError::InvalidOfferParameters { .. })
        ));
        assert_eq!(authority.agreement_count(), 0);
        assert!(authority.journal().is_empty());
    }

    #[test]
    fn test_initialize_by_other_party_rejected() {
        let authority = AgreementAuthority::default();
        let terms = OfferTerms {
            seller: seller(),
            item_id: ItemId::new("item"),
            item_name: "Mug".to_string(),
            price: 10,
            start_time: Timestamp(T),
            end_time: Timestamp(T + 3600),
        };
        let result = authority.initialize(&buyer(), terms);
        assert!(matches!(result, Err(AgreementError::NotAuthorized { .. })));
    }

    #[test]
    fn test_verify_journal_detects_edited_record() {
        let authority = AgreementAuthority::default();
        authority.deposit(&buyer(), Amount::new(100)).unwrap();
        let id = post_mug(&authority);
        authority.make_payment(&id, &buyer(), Timestamp(T + 10)).unwrap();
        assert!(authority.verify_journal().is_ok());

        authority.slot(&id).unwrap().lock().price = Amount::new(1);

        assert_eq!(
            authority.verify_journal(),
            Err(AgreementError::RecordMismatch {
                agreement_id: id,
                sequence: 1,
            })
        );
    }

    #[test]
    fn test_unknown_agreement() {
        let authority = AgreementAuthority::default();
        let id = AgreementId::new();
        assert!(matches!(
            authority.get_state(&id),
            Err(AgreementError::AgreementNotFound { .. })
        ));
        assert!(matches!(
            authority.make_payment(&id, &buyer(), Timestamp(T)),
            Err(AgreementError::AgreementNotFound { .. })
        ));
    }

    #[test]
    fn test_payment_moves_price_into_escrow() {
        let authority = AgreementAuthority::default();
        let id = post_mug(&authority);
        authority.deposit(&buyer(), Amount::new(100)).unwrap();

        let receipt = authority.make_payment(&id, &buyer(), Timestamp(T + 10)).unwrap();

        assert_eq!(receipt.to, AgreementStatus::PaymentDone);
        assert_eq!(authority.balance(&buyer()), Amount::new(90));
        assert_eq!(authority.escrow_balance(&id), Amount::new(10));
        assert_eq!(authority.balance(&seller()), Amount::zero());
    }

    #[test]
    fn test_payment_without_funds_rejected() {
        let authority = AgreementAuthority::default();
        let id = post_mug(&authority);
        authority.deposit(&buyer(), Amount::new(5)).unwrap();
        let before = authority.get_state(&id).unwrap();

        let result = authority.make_payment(&id, &buyer(), Timestamp(T + 10));

        assert_eq!(
            result.unwrap_err(),
            AgreementError::InsufficientFunds {
                available: 5,
                required: 10
            }
        );
        assert_eq!(authority.get_state(&id).unwrap(), before);
        assert_eq!(authority.history(&id).len(), 1);
    }

    #[test]
    fn test_check_mode_does_not_move_funds() {
        let authority = AgreementAuthority::new(AuthorityConfig {
            settlement: SettlementMode::Check,
            ..Default::default()
        });
        let id = post_mug(&authority);
        authority.deposit(&buyer(), Amount::new(10)).unwrap();

        authority.make_payment(&id, &buyer(), Timestamp(T + 10)).unwrap();
        authority.confirm_transfer(&id, &seller(), Timestamp(T + 20)).unwrap();

        assert_eq!(authority.balance(&buyer()), Amount::new(10));
        assert_eq!(authority.balance(&seller()), Amount::zero());
    }

    #[test]
    fn test_check_mode_rejects_short_buyer() {
        let authority = AgreementAuthority::new(AuthorityConfig {
            settlement: SettlementMode::Check,
            ..Default::default()
        });
        let id = post_mug(&authority);

        assert!(matches!(
            authority.make_payment(&id, &buyer(), Timestamp(T + 10)),
            Err(AgreementError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_state_only_mode_ignores_funds() {
        let authority = AgreementAuthority::new(AuthorityConfig::state_only());
        let id = post_mug(&authority);

        let receipt = authority.make_payment(&id, &buyer(), Timestamp(T + 10)).unwrap();
        assert_eq!(receipt.to, AgreementStatus::PaymentDone);
        assert_eq!(authority.ledger().entry_count(), 0);
    }

    #[test]
    fn test_zero_price_settles_without_ledger_entries() {
        let authority = AgreementAuthority::default();
        let id = authority
            .initialize_agreement(
                &seller(),
                ItemId::new("freebie"),
                "Sticker",
                0,
                Timestamp(T),
                Timestamp(T + 60),
            )
            .unwrap();

        authority.make_payment(&id, &buyer(), Timestamp(T + 1)).unwrap();
        authority.confirm_transfer(&id, &seller(), Timestamp(T + 2)).unwrap();

        assert_eq!(
            authority.get_state(&id).unwrap().status(),
            AgreementStatus::ItemTransferred
        );
        assert_eq!(authority.ledger().entry_count(), 0);
    }

    #[test]
    fn test_receipts_follow_journal() {
        let authority = AgreementAuthority::new(AuthorityConfig::state_only());
        let id = post_mug(&authority);

        let receipt = authority.make_payment(&id, &buyer(), Timestamp(T + 10)).unwrap();

        assert_eq!(receipt.journal_sequence, 1);
        assert_eq!(receipt.journal_hash, authority.journal().head_hash());
        assert!(authority.verify_journal().is_ok());
    }
}
