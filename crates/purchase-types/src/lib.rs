//! Purchase Types - Canonical types for two-party purchase agreements
//!
//! This crate contains the foundational types with zero dependencies on
//! other purchase crates:
//!
//! - Identity types (PartyId, ItemId, AgreementId)
//! - Amounts and timestamps, with the half-open validity window
//! - The Agreement record and its status enumeration
//! - Operation descriptors and the error taxonomy
//!
//! # Invariants
//!
//! 1. Status only advances along the transition graph
//! 2. No buyer while the offer is open; a buyer once paid
//! 3. Offer terms never change after creation
//! 4. At most one successful payment per agreement

pub mod identity;
pub mod amount;
pub mod time;
pub mod agreement;
pub mod operation;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use time::*;
pub use agreement::*;
pub use operation::*;
pub use error::*;
