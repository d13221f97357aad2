//! Transition Validator - guard checks for every agreement operation
//!
//! Guards run in a fixed order so a rejection is deterministic:
//!
//! 1. Identity: the caller holds the role the operation requires
//! 2. State: the agreement is in the operation's source status
//! 3. Temporal: `now` satisfies the operation's time bound
//! 4. Value: offer terms are well formed
//!
//! Guards are pure. They never mutate the agreement and never panic on
//! malformed input; committing state is the caller's job.

use purchase_types::{
    Agreement, AgreementError, AgreementStatus, Amount, OfferTerms, Operation, OperationKind,
    PartyId, RejectionReason, Result, Timestamp, ValidityWindow,
};

use crate::config::OfferLimits;

/// Guard logic for agreement transitions
#[derive(Debug, Clone, Default)]
pub struct TransitionValidator {
    limits: OfferLimits,
}

impl TransitionValidator {
    pub fn new(limits: OfferLimits) -> Self {
        Self { limits }
    }

    /// Check whether `caller` may apply `operation` to `agreement` at `now`
    ///
    /// `agreement` is `None` when nothing has been created yet; only
    /// [`Operation::Initialize`] is admitted in that case.
    pub fn validate(
        &self,
        agreement: Option<&Agreement>,
        operation: &Operation,
        caller: &PartyId,
        now: Timestamp,
    ) -> Result<()> {
        match (operation, agreement) {
            (Operation::Initialize(terms), existing) => {
                self.validate_initialize(existing, terms, caller)
            }
            (_, None) => Err(AgreementError::NotInitialized {
                operation: operation.kind(),
            }),
            (Operation::MakePayment, Some(agreement)) => {
                validate_payment(agreement, caller, now)
            }
            (Operation::ConfirmTransfer, Some(agreement)) => {
                validate_confirm(agreement, caller)
            }
            (Operation::Cancel, Some(agreement)) => validate_cancel(agreement, caller, now),
        }
    }

    fn validate_initialize(
        &self,
        existing: Option<&Agreement>,
        terms: &OfferTerms,
        caller: &PartyId,
    ) -> Result<()> {
        let operation = OperationKind::InitializeAgreement;

        require_identity(caller, operation)?;
        if caller != &terms.seller {
            return Err(not_authorized(
                caller,
                operation,
                "only the seller can post an offer",
            ));
        }

        if let Some(existing) = existing {
            return Err(AgreementError::InvalidStateTransition {
                operation,
                status: existing.status,
                reason: RejectionReason::AlreadyInitialized,
            });
        }

        self.validate_terms(terms)
    }

    /// Value checks on offer terms
    pub fn validate_terms(&self, terms: &OfferTerms) -> Result<()> {
        if Amount::from_signed(terms.price).is_none() {
            return Err(AgreementError::invalid_offer(format!(
                "price must be non-negative, got {}",
                terms.price
            )));
        }

        if ValidityWindow::new(terms.start_time, terms.end_time).is_none() {
            return Err(AgreementError::invalid_offer(format!(
                "start_time {} must precede end_time {}",
                terms.start_time.as_secs(),
                terms.end_time.as_secs()
            )));
        }

        if terms.item_id.is_blank() {
            return Err(AgreementError::invalid_offer("item_id must not be blank"));
        }
        if terms.item_id.as_str().len() > self.limits.max_item_id_len {
            return Err(AgreementError::invalid_offer(format!(
                "item_id exceeds {} bytes",
                self.limits.max_item_id_len
            )));
        }

        if terms.item_name.trim().is_empty() {
            return Err(AgreementError::invalid_offer("item_name must not be blank"));
        }
        if terms.item_name.len() > self.limits.max_item_name_len {
            return Err(AgreementError::invalid_offer(format!(
                "item_name exceeds {} bytes",
                self.limits.max_item_name_len
            )));
        }

        Ok(())
    }
}

fn validate_payment(agreement: &Agreement, caller: &PartyId, now: Timestamp) -> Result<()> {
    let operation = OperationKind::MakePayment;

    require_identity(caller, operation)?;
    if caller == &agreement.seller {
        return Err(not_authorized(
            caller,
            operation,
            "the seller cannot pay for their own offer",
        ));
    }

    match agreement.status {
        AgreementStatus::ItemNotTransferred if agreement.buyer.is_none() => {}
        AgreementStatus::ItemNotTransferred | AgreementStatus::PaymentDone => {
            return Err(invalid_transition(
                agreement,
                operation,
                RejectionReason::AlreadyPaid,
            ))
        }
        AgreementStatus::ItemTransferred | AgreementStatus::Cancelled => {
            return Err(invalid_transition(
                agreement,
                operation,
                RejectionReason::AlreadyFinalized,
            ))
        }
    }

    if !agreement.window().contains(now) {
        return Err(outside_window(agreement, now));
    }

    Ok(())
}

fn validate_confirm(agreement: &Agreement, caller: &PartyId) -> Result<()> {
    let operation = OperationKind::ConfirmTransfer;

    require_identity(caller, operation)?;
    if caller != &agreement.seller {
        return Err(not_authorized(
            caller,
            operation,
            "only the seller can confirm the transfer",
        ));
    }

    match agreement.status {
        AgreementStatus::PaymentDone => Ok(()),
        AgreementStatus::ItemNotTransferred => Err(invalid_transition(
            agreement,
            operation,
            RejectionReason::PaymentNotReceived,
        )),
        AgreementStatus::ItemTransferred | AgreementStatus::Cancelled => Err(invalid_transition(
            agreement,
            operation,
            RejectionReason::AlreadyFinalized,
        )),
    }
}

fn validate_cancel(agreement: &Agreement, caller: &PartyId, now: Timestamp) -> Result<()> {
    let operation = OperationKind::Cancel;

    require_identity(caller, operation)?;
    if !agreement.is_party(caller) {
        return Err(not_authorized(
            caller,
            operation,
            "only the seller or the paying buyer can cancel",
        ));
    }

    if agreement.status.is_terminal() {
        return Err(invalid_transition(
            agreement,
            operation,
            RejectionReason::AlreadyFinalized,
        ));
    }

    // Before expiry a cancellation needs every bound party's consent; a
    // caller asking twice is still waiting on the counterparty.
    if !agreement.window().has_expired(now)
        && agreement.cancel_requested_by.as_ref() == Some(caller)
    {
        return Err(invalid_transition(
            agreement,
            operation,
            RejectionReason::CancelAlreadyRequested,
        ));
    }

    Ok(())
}

fn require_identity(caller: &PartyId, operation: OperationKind) -> Result<()> {
    if caller.is_blank() {
        return Err(not_authorized(caller, operation, "caller identity is blank"));
    }
    Ok(())
}

fn not_authorized(caller: &PartyId, operation: OperationKind, reason: &str) -> AgreementError {
    AgreementError::NotAuthorized {
        caller: caller.clone(),
        operation,
        reason: reason.to_string(),
    }
}

fn invalid_transition(
    agreement: &Agreement,
    operation: OperationKind,
    reason: RejectionReason,
) -> AgreementError {
    AgreementError::InvalidStateTransition {
        operation,
        status: agreement.status,
        reason,
    }
}

fn outside_window(agreement: &Agreement, now: Timestamp) -> AgreementError {
    AgreementError::OutsideValidityWindow {
        now,
        start_time: agreement.start_time,
        end_time: agreement.end_time,
    }
}
