use std::collections::HashMap;

use vrl_types::{Identity, LedgerEntry, Sequence};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::Submission;

/// Chain bookkeeping shared by the ledger implementations.
///
/// Entries are kept in inclusion order, which is also sequence order.
pub(crate) struct ChainState {
    entries: Vec<LedgerEntry>,
    nonces: HashMap<Identity, u64>,
    entries_per_block: u32,
}

impl ChainState {
    pub(crate) fn new(entries_per_block: u32) -> Self {
        Self {
            entries: Vec::new(),
            nonces: HashMap::new(),
            entries_per_block: entries_per_block.max(1),
        }
    }

    pub(crate) fn head(&self) -> Sequence {
        self.entries
            .last()
            .map(|e| e.sequence)
            .unwrap_or(Sequence::GENESIS)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn next_nonce(&self, sender: &Identity) -> u64 {
        self.nonces.get(sender).copied().unwrap_or(0)
    }

    /// Validate a submission against the sender's expected nonce.
    pub(crate) fn check(&self, submission: &Submission) -> LedgerResult<()> {
        if submission.payload.is_empty() {
            return Err(LedgerError::EmptyPayload);
        }
        let expected = self.next_nonce(&submission.sender);
        if submission.nonce != expected {
            return Err(LedgerError::NonceConflict {
                sender: submission.sender,
                expected,
                got: submission.nonce,
            });
        }
        Ok(())
    }

    /// Position the next included entry will occupy.
    pub(crate) fn next_sequence(&self) -> Sequence {
        match self.entries.last() {
            None => Sequence::new(1, 0),
            Some(last) if last.sequence.index + 1 < self.entries_per_block => {
                Sequence::new(last.sequence.height, last.sequence.index + 1)
            }
            Some(last) => Sequence::new(last.sequence.height + 1, 0),
        }
    }

    /// Build the entry that including this payload would create.
    pub(crate) fn prepare(
        &self,
        sender: Identity,
        recipient: Option<Identity>,
        payload: Vec<u8>,
    ) -> LedgerEntry {
        LedgerEntry {
            sequence: self.next_sequence(),
            sender,
            recipient,
            payload,
        }
    }

    /// Record an included entry and bump its sender's nonce.
    pub(crate) fn push(&mut self, entry: LedgerEntry) {
        *self.nonces.entry(entry.sender).or_insert(0) += 1;
        self.entries.push(entry);
    }

    pub(crate) fn range(&self, from: Sequence, limit: usize) -> Vec<LedgerEntry> {
        let start = self.entries.partition_point(|e| e.sequence < from);
        self.entries[start..]
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }
}
