//! Operations that can be requested against an agreement

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ItemId, PartyId, Timestamp};

/// Terms of a new offer as submitted by the seller
///
/// `price` is signed so that a negative price can be submitted and rejected
/// rather than being unrepresentable at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub seller: PartyId,
    pub item_id: ItemId,
    pub item_name: String,
    pub price: i64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// A requested transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Initialize(OfferTerms),
    MakePayment,
    ConfirmTransfer,
    Cancel,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Initialize(_) => OperationKind::InitializeAgreement,
            Self::MakePayment => OperationKind::MakePayment,
            Self::ConfirmTransfer => OperationKind::ConfirmTransfer,
            Self::Cancel => OperationKind::Cancel,
        }
    }
}

/// Field-less mirror of [`Operation`] for errors, logs and the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    InitializeAgreement,
    MakePayment,
    ConfirmTransfer,
    Cancel,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitializeAgreement => "initialize_agreement",
            Self::MakePayment => "make_payment",
            Self::ConfirmTransfer => "confirm_transfer",
            Self::Cancel => "cancel",
        };
        write!(f, "{}", name)
    }
}
