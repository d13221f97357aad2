//! Tamper-evident journal of committed transitions
//!
//! Each entry carries the hash of its predecessor, so rewriting any entry
//! (or dropping one) breaks every later link. Rejected transitions are never
//! journaled.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use purchase_types::{
    Agreement, AgreementError, AgreementId, AgreementStatus, OperationKind, PartyId, Result,
    Timestamp,
};

use crate::machine::Effect;

/// Hash that links the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Content of a committed transition, before it is chained
#[derive(Debug, Clone)]
pub struct JournalRecord {
    pub agreement_id: AgreementId,
    pub operation: OperationKind,
    pub caller: PartyId,
    /// `None` for initialization, which is not time-gated
    pub now: Option<Timestamp>,
    pub from: Option<AgreementStatus>,
    pub to: AgreementStatus,
    pub effect: Effect,
    /// Hash of the agreement record as committed
    pub snapshot_hash: String,
}

/// A chained journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub agreement_id: AgreementId,
    pub operation: OperationKind,
    pub caller: PartyId,
    pub now: Option<Timestamp>,
    pub from: Option<AgreementStatus>,
    pub to: AgreementStatus,
    pub effect: Effect,
    pub snapshot_hash: String,
    pub previous_hash: String,
    pub hash: String,
}

impl JournalEntry {
    /// Compute hash of this entry
    pub fn compute_hash(&self) -> String {
        let content = format!(
            "{}:{}:{}:{}:{}:{:?}:{:?}:{:?}:{:?}:{}",
            self.sequence,
            self.previous_hash,
            self.agreement_id,
            self.operation,
            self.caller,
            self.now.map(|now| now.as_secs()),
            self.from,
            self.to,
            self.effect,
            self.snapshot_hash,
        );
        sha256_hex(content.as_bytes())
    }

    /// Verify the entry hash
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Hash of an agreement record's canonical JSON form
pub fn snapshot_hash(agreement: &Agreement) -> Result<String> {
    let bytes = serde_json::to_vec(agreement)?;
    Ok(sha256_hex(&bytes))
}

/// Check hashes and links of a sequence of entries, oldest first
pub fn verify_entries(entries: &[JournalEntry]) -> Result<()> {
    let mut expected_previous = GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64
            || entry.previous_hash != expected_previous
            || !entry.verify()
        {
            return Err(AgreementError::JournalCorrupted {
                sequence: index as u64,
            });
        }
        expected_previous = entry.hash.clone();
    }

    Ok(())
}

/// Append-only, hash-chained journal
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain `record` onto the journal
    pub fn append(&self, record: JournalRecord) -> JournalEntry {
        let mut entries = self.entries.write();

        let previous_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut entry = JournalEntry {
            sequence: entries.len() as u64,
            agreement_id: record.agreement_id,
            operation: record.operation,
            caller: record.caller,
            now: record.now,
            from: record.from,
            to: record.to,
            effect: record.effect,
            snapshot_hash: record.snapshot_hash,
            previous_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();

        entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().clone()
    }

    pub fn entries_for(&self, agreement_id: &AgreementId) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| &e.agreement_id == agreement_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn head_hash(&self) -> String {
        self.entries
            .read()
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    /// Verify the chain
    pub fn verify_chain(&self) -> Result<()> {
        verify_entries(&self.entries.read())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
