//! Error types for purchase agreements
//!
//! Every rejection is returned to the caller as a typed error and leaves the
//! agreement untouched. Nothing here is fatal.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{AgreementId, AgreementStatus, OperationKind, PartyId, Timestamp};

/// Result type for agreement operations
pub type Result<T> = std::result::Result<T, AgreementError>;

/// Why an operation is not permitted from the agreement's current status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Payment was already accepted
    AlreadyPaid,
    /// Agreement is in a terminal status
    AlreadyFinalized,
    /// Item cannot be handed over before payment
    PaymentNotReceived,
    /// Caller already asked to cancel and is waiting on the counterparty
    CancelAlreadyRequested,
    /// An agreement already exists under this handle
    AlreadyInitialized,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::AlreadyPaid => "already paid",
            Self::AlreadyFinalized => "already finalized",
            Self::PaymentNotReceived => "payment not received",
            Self::CancelAlreadyRequested => "cancellation already requested by caller",
            Self::AlreadyInitialized => "already initialized",
        };
        write!(f, "{}", reason)
    }
}

/// Agreement errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgreementError {
    // ========================================================================
    // Guard Errors
    // ========================================================================

    /// Caller does not hold the role the operation requires
    #[error("{caller} is not authorized to {operation}: {reason}")]
    NotAuthorized {
        caller: PartyId,
        operation: OperationKind,
        reason: String,
    },

    /// Operation is not permitted from the current status
    #[error("Cannot {operation} from status {status}: {reason}")]
    InvalidStateTransition {
        operation: OperationKind,
        status: AgreementStatus,
        reason: RejectionReason,
    },

    /// `now` falls outside the bound the operation requires
    #[error("Time {now} is outside the validity window [{start_time}, {end_time})")]
    OutsideValidityWindow {
        now: Timestamp,
        start_time: Timestamp,
        end_time: Timestamp,
    },

    /// Offer terms rejected at creation
    #[error("Invalid offer parameters: {message}")]
    InvalidOfferParameters { message: String },

    // ========================================================================
    // Lookup Errors
    // ========================================================================

    #[error("Agreement {agreement_id} not found")]
    AgreementNotFound { agreement_id: AgreementId },

    /// Only initialization is permitted with no prior agreement
    #[error("No agreement exists to {operation}")]
    NotInitialized { operation: OperationKind },

    // ========================================================================
    // Funds Errors
    // ========================================================================

    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    // ========================================================================
    // Journal Errors
    // ========================================================================

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Journal corrupted at sequence {sequence}")]
    JournalCorrupted { sequence: u64 },

    /// Live record no longer hashes to its latest journal entry
    #[error("Agreement {agreement_id} does not match journal entry {sequence}")]
    RecordMismatch {
        agreement_id: AgreementId,
        sequence: u64,
    },
}

impl AgreementError {
    /// Rejections against a terminal agreement can never succeed on retry
    ///
    /// Identity is checked before state, so a caller without a role on a
    /// terminal agreement gets `NotAuthorized`, which is not reported as
    /// permanent. Retrying as the right party then yields the permanent
    /// `InvalidStateTransition`.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateTransition { status, .. } if status.is_terminal()
        )
    }

    pub fn invalid_offer(message: impl Into<String>) -> Self {
        Self::InvalidOfferParameters {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AgreementError {
    fn from(e: serde_json::Error) -> Self {
        AgreementError::Serialization {
            message: e.to_string(),
        }
    }
}
