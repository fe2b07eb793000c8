use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use vrl_types::{Identity, LedgerEntry, Sequence};

use crate::error::{LedgerError, LedgerResult};
use crate::state::ChainState;
use crate::traits::{Ledger, Submission};

/// In-memory ledger for tests, local demos, and embedding.
///
/// Behaves like a single auto-mining node: every accepted submission is
/// included immediately (after an optional confirmation delay). Fault
/// injection hooks simulate nonce conflicts, outages, foreign transfers, and
/// malformed payloads written by other tools.
pub struct InMemoryLedger {
    inner: RwLock<ChainState>,
    faults: Mutex<Faults>,
    inclusion_delay: Option<Duration>,
}

struct Faults {
    available: bool,
    conflicts_remaining: u32,
}

impl InMemoryLedger {
    /// A ledger that mines one entry per block.
    pub fn new() -> Self {
        Self::with_block_size(1)
    }

    /// A ledger that packs up to `entries_per_block` entries per block.
    pub fn with_block_size(entries_per_block: u32) -> Self {
        Self {
            inner: RwLock::new(ChainState::new(entries_per_block)),
            faults: Mutex::new(Faults {
                available: true,
                conflicts_remaining: 0,
            }),
            inclusion_delay: None,
        }
    }

    /// Wait this long between accepting a submission and including it.
    pub fn with_inclusion_delay(mut self, delay: Duration) -> Self {
        self.inclusion_delay = Some(delay);
        self
    }

    /// Make the next `count` appends fail with a nonce conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.faults.lock().expect("faults lock poisoned").conflicts_remaining = count;
    }

    /// Simulate losing (or regaining) connectivity.
    pub fn set_available(&self, available: bool) {
        self.faults.lock().expect("faults lock poisoned").available = available;
    }

    /// Include an entry directly, bypassing nonce checks.
    ///
    /// Used to place transfers (`recipient` set) and arbitrary payloads,
    /// including malformed ones, on the ledger.
    pub fn submit_raw(
        &self,
        sender: Identity,
        recipient: Option<Identity>,
        payload: Vec<u8>,
    ) -> Sequence {
        let mut state = self.inner.write().expect("ledger lock poisoned");
        let entry = state.prepare(sender, recipient, payload);
        let sequence = entry.sequence;
        state.push(entry);
        sequence
    }

    /// Number of included entries.
    pub fn len(&self) -> usize {
        self.inner.read().expect("ledger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> LedgerResult<()> {
        if self.faults.lock().expect("faults lock poisoned").available {
            Ok(())
        } else {
            Err(LedgerError::Unavailable("in-memory ledger is offline".into()))
        }
    }

    fn take_injected_conflict(&self, submission: &Submission) -> LedgerResult<()> {
        let mut faults = self.faults.lock().expect("faults lock poisoned");
        if faults.conflicts_remaining > 0 {
            faults.conflicts_remaining -= 1;
            return Err(LedgerError::NonceConflict {
                sender: submission.sender,
                expected: submission.nonce + 1,
                got: submission.nonce,
            });
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(&self, submission: Submission) -> LedgerResult<Sequence> {
        self.ensure_available()?;
        self.take_injected_conflict(&submission)?;
        self.inner
            .read()
            .expect("ledger lock poisoned")
            .check(&submission)?;

        if let Some(delay) = self.inclusion_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.inner.write().expect("ledger lock poisoned");
        // The nonce may have been consumed while we waited for inclusion.
        state.check(&submission)?;
        let entry = state.prepare(submission.sender, None, submission.payload);
        let sequence = entry.sequence;
        state.push(entry);

        debug!(submission = %submission.id, %sequence, "entry included");
        Ok(sequence)
    }

    async fn iterate(&self, from: Sequence, limit: usize) -> LedgerResult<Vec<LedgerEntry>> {
        self.ensure_available()?;
        Ok(self
            .inner
            .read()
            .expect("ledger lock poisoned")
            .range(from, limit))
    }

    async fn head(&self) -> LedgerResult<Sequence> {
        self.ensure_available()?;
        Ok(self.inner.read().expect("ledger lock poisoned").head())
    }

    async fn next_nonce(&self, sender: &Identity) -> LedgerResult<u64> {
        self.ensure_available()?;
        Ok(self
            .inner
            .read()
            .expect("ledger lock poisoned")
            .next_nonce(sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::derive("alice")
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequences() {
        let ledger = InMemoryLedger::new();
        let s1 = ledger
            .append(Submission::new(alice(), 0, b"{\"vin\":\"V1\"}".to_vec()))
            .await
            .unwrap();
        let s2 = ledger
            .append(Submission::new(alice(), 1, b"{\"vin\":\"V2\"}".to_vec()))
            .await
            .unwrap();
        assert!(s1 < s2);
        assert_eq!(ledger.head().await.unwrap(), s2);
        assert_eq!(ledger.next_nonce(&alice()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stale_nonce_is_a_conflict() {
        let ledger = InMemoryLedger::new();
        ledger
            .append(Submission::new(alice(), 0, b"a".to_vec()))
            .await
            .unwrap();
        let err = ledger
            .append(Submission::new(alice(), 0, b"b".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::NonceConflict {
                sender: alice(),
                expected: 1,
                got: 0
            }
        );
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let ledger = InMemoryLedger::new();
        ledger.inject_conflicts(2);
        for _ in 0..2 {
            let err = ledger
                .append(Submission::new(alice(), 0, b"a".to_vec()))
                .await
                .unwrap_err();
            assert!(err.is_conflict());
        }
        ledger
            .append(Submission::new(alice(), 0, b"a".to_vec()))
            .await
            .unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn offline_ledger_fails_every_call() {
        let ledger = InMemoryLedger::new();
        ledger.set_available(false);
        assert!(ledger.head().await.unwrap_err().is_unavailable());
        assert!(ledger
            .iterate(Sequence::GENESIS, 10)
            .await
            .unwrap_err()
            .is_unavailable());
        assert!(ledger
            .append(Submission::new(alice(), 0, b"a".to_vec()))
            .await
            .unwrap_err()
            .is_unavailable());
        ledger.set_available(true);
        assert_eq!(ledger.head().await.unwrap(), Sequence::GENESIS);
    }

    #[tokio::test]
    async fn iterate_is_restartable_and_sees_growth() {
        let ledger = InMemoryLedger::with_block_size(2);
        for i in 0..3u64 {
            ledger
                .append(Submission::new(alice(), i, vec![b'a' + i as u8]))
                .await
                .unwrap();
        }
        let first = ledger.iterate(Sequence::GENESIS, 10).await.unwrap();
        assert_eq!(first.len(), 3);
        let again = ledger.iterate(Sequence::GENESIS, 10).await.unwrap();
        assert_eq!(first, again);

        let tail_from = first[2].sequence.successor();
        assert!(ledger.iterate(tail_from, 10).await.unwrap().is_empty());
        ledger.submit_raw(alice(), Some(Identity::derive("bob")), Vec::new());
        let tail = ledger.iterate(tail_from, 10).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert!(!tail[0].is_data_only());
    }

    #[tokio::test]
    async fn entry_lookup_by_exact_sequence() {
        let ledger = InMemoryLedger::new();
        let seq = ledger.submit_raw(alice(), None, b"x".to_vec());
        assert_eq!(ledger.entry(seq).await.unwrap().unwrap().payload, b"x");
        assert!(ledger.entry(seq.successor()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delayed_inclusion_detects_consumed_nonce() {
        let ledger = std::sync::Arc::new(
            InMemoryLedger::new().with_inclusion_delay(Duration::from_millis(20)),
        );
        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .append(Submission::new(alice(), 0, b"a".to_vec()))
                    .await
            })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .append(Submission::new(alice(), 0, b"b".to_vec()))
                    .await
            })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(ledger.len(), 1);
    }
}
