//! Purchase Agreement - two-party purchase protocol
//!
//! A seller posts an offer, a buyer pays inside the offer's validity window,
//! and the seller confirms the hand-off. This crate implements:
//!
//! - TransitionValidator: identity, state, time and value guards
//! - State machine: pure record updates applied after the guards pass
//! - Ledger: balances and per-agreement escrow backing each payment
//! - Journal: hash-chained record of every committed transition
//! - AgreementAuthority: hosts agreements and serializes their transitions
//!
//! # Invariants
//!
//! 1. A rejected transition mutates nothing
//! 2. Payment is accepted at most once per agreement
//! 3. Payment is only accepted inside `[start_time, end_time)`
//! 4. Only the seller and the paying buyer ever move an agreement

pub mod config;
pub mod validator;
pub mod machine;
pub mod ledger;
pub mod journal;
pub mod authority;

pub use config::*;
pub use validator::*;
pub use machine::{Effect, Transition};
pub use ledger::{AccountId, EntryId, EntryReason, EntryType, Ledger, LedgerEntry};
pub use journal::{verify_entries, Journal, JournalEntry, JournalRecord, GENESIS_HASH};
pub use authority::*;

pub use purchase_types;
