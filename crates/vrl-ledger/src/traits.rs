use async_trait::async_trait;
use uuid::Uuid;
use vrl_types::{Identity, LedgerEntry, Sequence};

use crate::error::LedgerResult;

/// A data-only entry waiting to be included.
///
/// `nonce` is the sender's sequencing metadata: the ledger only accepts a
/// submission whose nonce equals the sender's next expected nonce. A retry
/// after a conflict is a fresh submission with a fresh nonce and the same
/// payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub id: Uuid,
    pub sender: Identity,
    pub nonce: u64,
    pub payload: Vec<u8>,
}

impl Submission {
    pub fn new(sender: Identity, nonce: u64, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender,
            nonce,
            payload,
        }
    }
}

/// Boundary to the append-only ledger.
///
/// Implementations must guarantee:
/// - Sequence order is total and never changes once observed.
/// - Entries are never mutated or removed.
/// - `iterate` is restartable from any position and may be called again
///   later to continue as the ledger grows.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a data-only entry and wait until it is included.
    ///
    /// Returns the sequence the ledger assigned. Not atomic against entries
    /// submitted concurrently by other identities.
    async fn append(&self, submission: Submission) -> LedgerResult<Sequence>;

    /// Up to `limit` entries with `sequence >= from`, in ascending order.
    async fn iterate(&self, from: Sequence, limit: usize) -> LedgerResult<Vec<LedgerEntry>>;

    /// The highest included sequence, or [`Sequence::GENESIS`] when empty.
    async fn head(&self) -> LedgerResult<Sequence>;

    /// The nonce the next submission from `sender` must carry.
    async fn next_nonce(&self, sender: &Identity) -> LedgerResult<u64>;

    /// Fetch a single entry by exact sequence.
    async fn entry(&self, sequence: Sequence) -> LedgerResult<Option<LedgerEntry>> {
        let page = self.iterate(sequence, 1).await?;
        Ok(page.into_iter().find(|e| e.sequence == sequence))
    }
}
