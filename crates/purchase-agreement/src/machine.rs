//! Agreement State Machine - pure state updates
//!
//! ```text
//!                    make_payment              confirm_transfer
//! ItemNotTransferred ------------> PaymentDone ----------------> ItemTransferred
//!          |                           |
//!          | cancel                    | cancel (expiry or both parties)
//!          v                           v
//!      Cancelled <---------------------+
//! ```
//!
//! Nothing here checks guards. Callers run the
//! [`TransitionValidator`](crate::TransitionValidator) first and only apply
//! a transition that passed.

use serde::{Deserialize, Serialize};

use purchase_types::{
    Agreement, AgreementError, AgreementStatus, Amount, OfferTerms, Operation, PartyId,
    RejectionReason, Result, Timestamp,
};

/// Funds movement implied by a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    None,
    /// Buyer pays the price into the agreement's escrow
    Payment { from: PartyId, amount: Amount },
    /// Escrowed price released to the seller
    Release { to: PartyId, amount: Amount },
    /// Escrowed price returned to the buyer
    Refund { to: PartyId, amount: Amount },
    /// First half of a mutual-consent cancellation; no status change
    CancelConsentRecorded { by: PartyId },
}

/// Outcome of applying an operation to an agreement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: AgreementStatus,
    pub to: AgreementStatus,
    pub effect: Effect,
    /// The record to commit
    pub next: Agreement,
}

/// Build a fresh agreement from validated offer terms
pub fn create(terms: &OfferTerms) -> Result<Agreement> {
    let price = Amount::from_signed(terms.price).ok_or_else(|| {
        AgreementError::invalid_offer(format!("price must be non-negative, got {}", terms.price))
    })?;

    Ok(Agreement {
        seller: terms.seller.clone(),
        buyer: None,
        item_id: terms.item_id.clone(),
        item_name: terms.item_name.clone(),
        price,
        start_time: terms.start_time,
        end_time: terms.end_time,
        status: AgreementStatus::ItemNotTransferred,
        cancel_requested_by: None,
    })
}

/// Compute the transition `caller` triggers on `agreement` at `now`
pub fn apply(
    agreement: &Agreement,
    operation: &Operation,
    caller: &PartyId,
    now: Timestamp,
) -> Result<Transition> {
    let from = agreement.status;
    let mut next = agreement.clone();

    let effect = match operation {
        Operation::Initialize(_) => {
            return Err(AgreementError::InvalidStateTransition {
                operation: operation.kind(),
                status: from,
                reason: RejectionReason::AlreadyInitialized,
            })
        }
        Operation::MakePayment => {
            next.buyer = Some(caller.clone());
            next.status = AgreementStatus::PaymentDone;
            Effect::Payment {
                from: caller.clone(),
                amount: agreement.price,
            }
        }
        Operation::ConfirmTransfer => {
            next.status = AgreementStatus::ItemTransferred;
            next.cancel_requested_by = None;
            Effect::Release {
                to: agreement.seller.clone(),
                amount: agreement.price,
            }
        }
        Operation::Cancel => cancel(agreement, &mut next, caller, now),
    };

    Ok(Transition {
        from,
        to: next.status,
        effect,
        next,
    })
}

fn cancel(agreement: &Agreement, next: &mut Agreement, caller: &PartyId, now: Timestamp) -> Effect {
    let expired = agreement.window().has_expired(now);

    match (&agreement.buyer, agreement.status) {
        (Some(buyer), AgreementStatus::PaymentDone) => {
            let counterparty_consented = agreement.cancel_requested_by.is_some()
                && agreement.cancel_requested_by.as_ref() == agreement.counterparty_of(caller);

            if expired || counterparty_consented {
                next.status = AgreementStatus::Cancelled;
                next.cancel_requested_by = None;
                Effect::Refund {
                    to: buyer.clone(),
                    amount: agreement.price,
                }
            } else {
                next.cancel_requested_by = Some(caller.clone());
                Effect::CancelConsentRecorded { by: caller.clone() }
            }
        }
        // Unpaid offer: the seller is the only bound party
        _ => {
            next.status = AgreementStatus::Cancelled;
            Effect::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purchase_types::ItemId;

    const T: i64 = 1_700_000_000;

    fn terms() -> OfferTerms {
        OfferTerms {
            seller: PartyId::new("seller"),
            item_id: ItemId::new("6nzTzVZAVq4E5iuPMhcir8ESF9dLjCDgRV7yRgkU8Vbz"),
            item_name: "Mug".to_string(),
            price: 10,
            start_time: Timestamp(T),
            end_time: Timestamp(T + 3600),
        }
    }

    fn paid() -> Agreement {
        let agreement = create(&terms()).unwrap();
        apply(
            &agreement,
            &Operation::MakePayment,
            &PartyId::new("buyer"),
            Timestamp(T + 10),
        )
        .unwrap()
        .next
    }

    #[test]
    fn test_create_starts_open_without_buyer() {
        let agreement = create(&terms()).unwrap();
        assert_eq!(agreement.status, AgreementStatus::ItemNotTransferred);
        assert_eq!(agreement.buyer, None);
        assert_eq!(agreement.price, Amount::new(10));
        assert_eq!(agreement.item_name, "Mug");
    }

    #[test]
    fn test_payment_sets_buyer() {
        let agreement = create(&terms()).unwrap();
        let buyer = PartyId::new("buyer");
        let transition = apply(&agreement, &Operation::MakePayment, &buyer, Timestamp(T + 10)).unwrap();

        assert_eq!(transition.from, AgreementStatus::ItemNotTransferred);
        assert_eq!(transition.to, AgreementStatus::PaymentDone);
        assert_eq!(transition.next.buyer, Some(buyer.clone()));
        assert_eq!(
            transition.effect,
            Effect::Payment {
                from: buyer,
                amount: Amount::new(10)
            }
        );
        // Terms untouched
        assert_eq!(transition.next.price, agreement.price);
        assert_eq!(transition.next.end_time, agreement.end_time);
    }

    #[test]
    fn test_confirm_releases_to_seller() {
        let transition = apply(
            &paid(),
            &Operation::ConfirmTransfer,
            &PartyId::new("seller"),
            Timestamp(T + 30),
        )
        .unwrap();
        assert_eq!(transition.to, AgreementStatus::ItemTransferred);
        assert_eq!(
            transition.effect,
            Effect::Release {
                to: PartyId::new("seller"),
                amount: Amount::new(10)
            }
        );
    }

    #[test]
    fn test_cancel_after_expiry_refunds_buyer() {
        let transition = apply(
            &paid(),
            &Operation::Cancel,
            &PartyId::new("buyer"),
            Timestamp(T + 3600),
        )
        .unwrap();
        assert_eq!(transition.to, AgreementStatus::Cancelled);
        assert_eq!(
            transition.effect,
            Effect::Refund {
                to: PartyId::new("buyer"),
                amount: Amount::new(10)
            }
        );
        assert_eq!(transition.next.buyer, Some(PartyId::new("buyer")));
    }

    #[test]
    fn test_cancel_before_expiry_needs_both_parties() {
        let first = apply(
            &paid(),
            &Operation::Cancel,
            &PartyId::new("buyer"),
            Timestamp(T + 100),
        )
        .unwrap();
        assert_eq!(first.to, AgreementStatus::PaymentDone);
        assert_eq!(first.next.cancel_requested_by, Some(PartyId::new("buyer")));
        assert!(matches!(first.effect, Effect::CancelConsentRecorded { .. }));

        let second = apply(
            &first.next,
            &Operation::Cancel,
            &PartyId::new("seller"),
            Timestamp(T + 200),
        )
        .unwrap();
        assert_eq!(second.to, AgreementStatus::Cancelled);
        assert_eq!(second.next.cancel_requested_by, None);
        assert!(matches!(second.effect, Effect::Refund { .. }));
    }

    #[test]
    fn test_confirm_clears_pending_cancel_request() {
        let requested = apply(
            &paid(),
            &Operation::Cancel,
            &PartyId::new("buyer"),
            Timestamp(T + 20),
        )
        .unwrap()
        .next;
        assert_eq!(requested.cancel_requested_by, Some(PartyId::new("buyer")));

        let transition = apply(
            &requested,
            &Operation::ConfirmTransfer,
            &PartyId::new("seller"),
            Timestamp(T + 30),
        )
        .unwrap();
        assert_eq!(transition.to, AgreementStatus::ItemTransferred);
        assert_eq!(transition.next.cancel_requested_by, None);
    }

    #[test]
    fn test_seller_withdraws_unpaid_offer() {
        let agreement = create(&terms()).unwrap();
        let transition = apply(
            &agreement,
            &Operation::Cancel,
            &PartyId::new("seller"),
            Timestamp(T + 5),
        )
        .unwrap();
        assert_eq!(transition.to, AgreementStatus::Cancelled);
        assert_eq!(transition.effect, Effect::None);
        assert_eq!(transition.next.buyer, None);
    }

    #[test]
    fn test_apply_initialize_is_rejected() {
        let agreement = create(&terms()).unwrap();
        let result = apply(
            &agreement,
            &Operation::Initialize(terms()),
            &PartyId::new("seller"),
            Timestamp(T),
        );
        assert!(matches!(
            result,
            Err(AgreementError::InvalidStateTransition { .. })
        ));
    }
}
