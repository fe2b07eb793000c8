use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::sequence::Sequence;

/// One immutable, sequenced entry in the ledger.
///
/// Entries are created only by successful inclusion and are never mutated
/// or deleted. `recipient` is `None` for data-only entries; entries with a
/// recipient are ordinary transfers and never carry records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: Sequence,
    pub sender: Identity,
    pub recipient: Option<Identity>,
    pub payload: Vec<u8>,
}

impl LedgerEntry {
    /// Returns `true` if this entry is a data-only entry (no recipient).
    pub fn is_data_only(&self) -> bool {
        self.recipient.is_none()
    }

    /// BLAKE3 hash of the payload bytes.
    pub fn digest(&self) -> [u8; 32] {
        *blake3::hash(&self.payload).as_bytes()
    }

    /// Short hex form of [`Self::digest`] for logs.
    pub fn short_digest(&self) -> String {
        hex::encode(&self.digest()[..6])
    }
}
