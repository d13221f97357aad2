//! Agreement types
//!
//! An agreement is the persistent record of one seller's offer and the
//! buyer who paid for it. It is only ever mutated by a validated
//! transition committed by the authority that owns it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AgreementId, Amount, ItemId, PartyId, Timestamp, ValidityWindow};

/// Status of an agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementStatus {
    /// Offer is open, no payment yet
    ItemNotTransferred,
    /// Buyer has paid, item not yet handed over
    PaymentDone,
    /// Seller confirmed the hand-off
    ItemTransferred,
    /// Expired or cancelled by consent
    Cancelled,
}

impl AgreementStatus {
    /// Terminal statuses accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ItemTransferred | Self::Cancelled)
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ItemNotTransferred => "item_not_transferred",
            Self::PaymentDone => "payment_done",
            Self::ItemTransferred => "item_transferred",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Availability of the item, derived from the agreement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Active,
    Sold,
    NotAvailable,
}

/// A purchase agreement between a seller and (eventually) a buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub seller: PartyId,
    pub buyer: Option<PartyId>,
    pub item_id: ItemId,
    pub item_name: String,
    pub price: Amount,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: AgreementStatus,
    /// First party to ask for a cancellation before expiry
    pub cancel_requested_by: Option<PartyId>,
}

impl Agreement {
    pub fn window(&self) -> ValidityWindow {
        ValidityWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn item_status(&self) -> ItemStatus {
        match self.status {
            AgreementStatus::ItemNotTransferred => ItemStatus::Active,
            AgreementStatus::PaymentDone | AgreementStatus::ItemTransferred => ItemStatus::Sold,
            AgreementStatus::Cancelled => ItemStatus::NotAvailable,
        }
    }

    /// Whether `party` is bound to this agreement as seller or buyer
    pub fn is_party(&self, party: &PartyId) -> bool {
        &self.seller == party || self.buyer.as_ref() == Some(party)
    }

    /// The other bound party, if there is one
    pub fn counterparty_of(&self, party: &PartyId) -> Option<&PartyId> {
        if &self.seller == party {
            self.buyer.as_ref()
        } else if self.buyer.as_ref() == Some(party) {
            Some(&self.seller)
        } else {
            None
        }
    }
}

/// Read-only view of an agreement returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementSnapshot {
    pub id: AgreementId,
    pub agreement: Agreement,
    pub item_status: ItemStatus,
}

impl AgreementSnapshot {
    pub fn new(id: AgreementId, agreement: Agreement) -> Self {
        let item_status = agreement.item_status();
        Self {
            id,
            agreement,
            item_status,
        }
    }

    pub fn status(&self) -> AgreementStatus {
        self.agreement.status
    }
}
