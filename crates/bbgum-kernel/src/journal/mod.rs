//! Verdict journal
//!
//! Every terminal transition a controller decides is appended as a
//! [`VerdictRecord`]. Each record hashes its own fields together with the
//! previous record's hash, so rewriting, dropping or reordering persisted
//! records is caught by [`Journal::verify_integrity`].

use crate::error::JournalError;
use crate::types::{ElementId, Timestamp, VariantTag, Verdict};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One terminal transition, as handed to report writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    /// Position in the journal, starting at 0
    pub seq: u64,
    /// Element whose flow terminated
    pub element: ElementId,
    /// Variant of that element
    pub variant: VariantTag,
    /// Verdict fixed at termination
    pub verdict: Verdict,
    /// Observation time of the deciding action
    pub decided_at: Timestamp,
    /// Recorded mismatch, if any
    pub detail: Option<String>,
    /// Hash of the previous record, zeroes for the first
    pub prev_hash: [u8; 32],
    /// SHA-256 over this record's fields and `prev_hash`
    pub hash: [u8; 32],
}

impl VerdictRecord {
    /// Hex form of the record hash.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Append-only, hash-chained journal of verdicts across flows.
#[derive(Debug, Default)]
pub struct Journal {
    inner: Mutex<Vec<VerdictRecord>>,
}

impl Journal {
    /// Empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a journal from persisted records. Call
    /// [`Journal::verify_integrity`] before trusting it.
    #[must_use]
    pub fn from_records(records: Vec<VerdictRecord>) -> Self {
        Self {
            inner: Mutex::new(records),
        }
    }

    /// Append a record chained to the last one; returns its sequence number.
    pub fn append(
        &self,
        element: ElementId,
        variant: VariantTag,
        verdict: Verdict,
        decided_at: Timestamp,
        detail: Option<String>,
    ) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map(|r| r.hash).unwrap_or([0u8; 32]);
        let mut record = VerdictRecord {
            seq: guard.len() as u64,
            element,
            variant,
            verdict,
            decided_at,
            detail,
            prev_hash,
            hash: [0u8; 32],
        };
        record.hash = compute_hash(&record);
        let seq = record.seq;
        guard.push(record);
        seq
    }

    /// Copy of every record, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<VerdictRecord> {
        self.inner.lock().clone()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no verdict was journaled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Recompute the chain.
    ///
    /// # Errors
    /// [`JournalError::IntegrityViolation`] naming the first record whose
    /// sequence number, link or hash does not match.
    pub fn verify_integrity(&self) -> Result<(), JournalError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (index, r) in guard.iter().enumerate() {
            let seq = index as u64;
            if r.seq != seq || r.prev_hash != prev || r.hash != compute_hash(r) {
                return Err(JournalError::IntegrityViolation { seq });
            }
            prev = r.hash;
        }
        Ok(())
    }
}

fn compute_hash(record: &VerdictRecord) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record.seq.to_le_bytes());
    hasher.update(record.element.0.as_bytes());
    hasher.update(record.variant.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(record.verdict.code().to_le_bytes());
    hasher.update(record.decided_at.as_millis().to_le_bytes());
    match &record.detail {
        Some(detail) => {
            hasher.update([1]);
            hasher.update(detail.as_bytes());
        }
        None => hasher.update([0]),
    }
    hasher.update([0]);
    hasher.update(record.prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_records() {
        let journal = Journal::new();
        let a = journal.append(ElementId::new(), VariantTag::BlackBox, Verdict::Pass, Timestamp(1), None);
        let b = journal.append(
            ElementId::new(),
            VariantTag::Exchange,
            Verdict::Fail,
            Timestamp(2),
            Some("reply mismatch".into()),
        );
        assert_eq!((a, b), (0, 1));
        let records = journal.records();
        assert_eq!(records[1].prev_hash, records[0].hash);
        assert!(journal.verify_integrity().is_ok());
    }

    #[test]
    fn detects_rewritten_verdict() {
        let journal = Journal::new();
        journal.append(ElementId::new(), VariantTag::BlackBox, Verdict::Fail, Timestamp(1), None);
        let mut records = journal.records();
        records[0].verdict = Verdict::Pass;
        let restored = Journal::from_records(records);
        assert_eq!(
            restored.verify_integrity(),
            Err(JournalError::IntegrityViolation { seq: 0 })
        );
    }

    #[test]
    fn empty_detail_differs_from_missing_detail() {
        let journal = Journal::new();
        journal.append(ElementId::new(), VariantTag::Quiescence, Verdict::Pass, Timestamp(1), None);
        let mut records = journal.records();
        records[0].detail = Some(String::new());
        assert_eq!(
            Journal::from_records(records).verify_integrity(),
            Err(JournalError::IntegrityViolation { seq: 0 })
        );
    }
}
